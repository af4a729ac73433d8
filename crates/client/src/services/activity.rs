//! Reviews and notifications. Remote only, never cached.

use dinesphere_core::{RestaurantId, UserId};
use tracing::{info, instrument};

use super::{require_online, require_user};
use crate::api::BackendClient;
use crate::connectivity::Connectivity;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{ExistingReview, Notification, Review, ReviewDraft, ReviewOutcome};

/// Reviews and notifications for the logged-in user.
#[derive(Debug, Clone)]
pub struct ActivityService {
    store: Store,
    api: BackendClient,
    connectivity: Connectivity,
}

impl ActivityService {
    /// Create a new activity service.
    #[must_use]
    pub const fn new(store: Store, api: BackendClient, connectivity: Connectivity) -> Self {
        Self {
            store,
            api,
            connectivity,
        }
    }

    /// Reviews the user has written, plus visits waiting for a rating.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotLoggedIn`, `AppError::Offline` or
    /// `AppError::Api`.
    pub async fn reviews(&self) -> Result<Vec<Review>, AppError> {
        let user_id = self.online_user().await?;
        Ok(self.api.reviews(&user_id).await?)
    }

    /// Reviews still waiting for a star rating.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reviews`].
    pub async fn pending_reviews(&self) -> Result<Vec<Review>, AppError> {
        Ok(self
            .reviews()
            .await?
            .into_iter()
            .filter(|r| r.rating == 0)
            .collect())
    }

    /// The user's existing review of a restaurant, used to prefill the form.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reviews`].
    pub async fn existing_review(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Option<ExistingReview>, AppError> {
        let user_id = self.online_user().await?;
        Ok(self.api.existing_review(&user_id, restaurant_id).await?)
    }

    /// Submit or replace a review.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a rating outside 1-5, otherwise
    /// the same as [`Self::reviews`].
    #[instrument(skip(self, draft), fields(restaurant_id = %draft.restaurant_id, rating = draft.rating))]
    pub async fn submit_review(&self, draft: &ReviewDraft) -> Result<ReviewOutcome, AppError> {
        if !draft.has_valid_rating() {
            return Err(AppError::BadRequest(format!(
                "Rating must be between {} and {}",
                ReviewDraft::MIN_RATING,
                ReviewDraft::MAX_RATING
            )));
        }
        let user_id = self.online_user().await?;
        let outcome = self.api.submit_review(&user_id, draft).await?;
        info!(?outcome, "Review submitted");
        Ok(outcome)
    }

    /// Promotional notifications, newest first as the backend sends them.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reviews`].
    pub async fn notifications(&self) -> Result<Vec<Notification>, AppError> {
        let user_id = self.online_user().await?;
        Ok(self.api.notifications(&user_id).await?)
    }

    async fn online_user(&self) -> Result<UserId, AppError> {
        require_online(&self.connectivity)?;
        require_user(&self.store).await
    }
}
