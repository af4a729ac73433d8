//! DineSphere Core - Shared types library.
//!
//! This crate provides common types used across all DineSphere components:
//! - `client` - Offline cache, pending-action queue and backend client
//! - `cli` - Command-line front end for the client flows and migrations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//! The optional `sqlite` feature adds `sqlx` encode/decode support for the
//! id newtypes so they can be bound directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, user identifiers, emails, action
//!   kinds, prices and distances

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
