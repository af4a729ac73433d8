//! Core types for DineSphere.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod action;
pub mod email;
pub mod geo;
pub mod id;
pub mod price;
pub mod user;

pub use action::ActionKind;
pub use email::{Email, EmailError};
pub use geo::{Coordinates, DistanceKm, NEARBY_RADIUS_KM};
pub use id::*;
pub use price::Price;
pub use user::{UserId, UserIdError};
