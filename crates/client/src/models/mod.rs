//! Domain models for the DineSphere client.
//!
//! Cached models (`restaurant`, `menu`, `pending_action`) mirror rows of the
//! local store; `account` holds remote-only data that is never cached.

pub mod account;
pub mod menu;
pub mod pending_action;
pub mod restaurant;

pub use account::{
    ExistingReview, LocationUpdate, Notification, ProfileImage, ProfileUpdate, Review, ReviewDraft,
    ReviewOutcome, UserLocation, UserProfile,
};
pub use menu::{CachedCategory, CachedMenuItem};
pub use pending_action::PendingAction;
pub use restaurant::CachedRestaurant;
