//! DineSphere client library.
//!
//! Offline cache and pending-action queue for the DineSphere restaurant
//! app, plus a typed client for its PHP backend.
//!
//! Listings are served from a local `SQLite` cache first and refreshed
//! from the backend when online. Save/unsave while offline is queued
//! together with an optimistic cache update and replayed, in order, when
//! connectivity returns.
//!
//! # Entry point
//!
//! [`state::AppState`] opens the store, builds the backend client and
//! hands out the services in [`services`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use config::ClientConfig;
pub use connectivity::Connectivity;
pub use error::AppError;
pub use state::AppState;
