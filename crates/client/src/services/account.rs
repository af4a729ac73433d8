//! Session, account details and push device token.

use dinesphere_core::{Email, UserId};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use super::cache::SavedIds;
use super::sync::SyncService;
use super::{require_online, require_user};
use crate::api::BackendClient;
use crate::connectivity::Connectivity;
use crate::db::{DEVICE_TOKEN_KEY, DEVICE_TOKEN_PENDING_KEY, Store};
use crate::error::AppError;
use crate::models::{LocationUpdate, ProfileUpdate, UserLocation, UserProfile};

/// Shortest password accepted for signup and password changes.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Check a new password and its confirmation.
///
/// # Errors
///
/// Returns `AppError::BadRequest` with a user-facing message.
pub fn validate_new_password(password: &SecretString, confirm: &SecretString) -> Result<(), AppError> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(AppError::BadRequest("Please fill in all fields".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm.expose_secret() {
        return Err(AppError::BadRequest("Passwords do not match".into()));
    }
    Ok(())
}

/// Login, logout and everything tied to the account.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: Store,
    api: BackendClient,
    connectivity: Connectivity,
    saved_ids: SavedIds,
    sync: SyncService,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub const fn new(
        store: Store,
        api: BackendClient,
        connectivity: Connectivity,
        saved_ids: SavedIds,
        sync: SyncService,
    ) -> Self {
        Self {
            store,
            api,
            connectivity,
            saved_ids,
            sync,
        }
    }

    /// Log in and persist the session.
    ///
    /// The saved-id set is loaded and a device token still waiting for
    /// upload is sent. Failures of either are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Offline` without network, `AppError::Api` if the
    /// backend refuses, or `AppError::Database` if the session write fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<UserId, AppError> {
        require_online(&self.connectivity)?;
        let user_id = self.api.login(email, password).await?;
        self.start_session(&user_id).await?;
        info!(user_id = %user_id, "Logged in");
        Ok(user_id)
    }

    /// Create an account and log into it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid password, otherwise
    /// the same as [`Self::login`].
    #[instrument(skip(self, password, confirm), fields(email = %email))]
    pub async fn signup(
        &self,
        email: &Email,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<UserId, AppError> {
        validate_new_password(password, confirm)?;
        require_online(&self.connectivity)?;
        let user_id = self.api.signup(email, password).await?;
        self.start_session(&user_id).await?;
        info!(user_id = %user_id, "Account created");
        Ok(user_id)
    }

    /// Forget the session, the saved-id set and any queued actions.
    ///
    /// Queued actions belong to the user who made them and are not
    /// replayed for the next one. The queue and the session go in one
    /// transaction; on failure the user stays logged in with the queue
    /// intact.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the local write fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AppError> {
        // A pass already replaying as this user finishes first.
        let _replay = self.sync.hold_replay().await;
        let dropped = self.store.sessions().end().await?;
        if dropped > 0 {
            warn!(dropped, "Discarded queued actions on logout");
        }
        self.saved_ids.clear();
        info!("Logged out");
        Ok(())
    }

    /// The logged-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the session read fails.
    pub async fn current_user(&self) -> Result<Option<UserId>, AppError> {
        Ok(self.store.sessions().get().await?)
    }

    /// Set a new password for `email`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid password,
    /// `AppError::Offline` without network, or `AppError::Api` if the
    /// backend refuses.
    #[instrument(skip(self, password, confirm), fields(email = %email))]
    pub async fn update_password(
        &self,
        email: &Email,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<(), AppError> {
        validate_new_password(password, confirm)?;
        require_online(&self.connectivity)?;
        self.api.update_password(email, password).await?;
        Ok(())
    }

    /// The user's saved location, if one is on file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotLoggedIn`, `AppError::Offline` or
    /// `AppError::Api`.
    pub async fn location(&self) -> Result<Option<UserLocation>, AppError> {
        let user_id = self.online_user().await?;
        Ok(self.api.user_location(&user_id).await?)
    }

    /// Store a new location.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for unset coordinates,
    /// `AppError::NotLoggedIn`, `AppError::Offline` or `AppError::Api`.
    #[instrument(skip(self, update))]
    pub async fn update_location(&self, update: &LocationUpdate) -> Result<(), AppError> {
        if !update.coordinates.is_set() {
            return Err(AppError::BadRequest("Please pick a location".into()));
        }
        let user_id = self.online_user().await?;
        self.api.update_location(&user_id, update).await?;
        Ok(())
    }

    /// The user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotLoggedIn`, `AppError::Offline` or
    /// `AppError::Api`.
    pub async fn profile(&self) -> Result<UserProfile, AppError> {
        let user_id = self.online_user().await?;
        Ok(self.api.user_profile(&user_id).await?)
    }

    /// Update the profile. Returns the new avatar reference, if the
    /// backend sent one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if a name or the phone is blank,
    /// otherwise the same as [`Self::profile`].
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Option<String>, AppError> {
        if [&update.first_name, &update.last_name, &update.phone]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AppError::BadRequest("Please fill in all required fields".into()));
        }
        let user_id = self.online_user().await?;
        Ok(self.api.update_profile(&user_id, update).await?)
    }

    /// Remember the push token and send it when possible.
    ///
    /// The token is stored locally first. If it cannot be sent now (no
    /// session, offline, or the call fails) it is marked pending and sent
    /// on the next login or [`Self::flush_device_token`].
    ///
    /// Returns whether the token reached the backend.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty token or
    /// `AppError::Database` if the local write fails.
    #[instrument(skip(self, token))]
    pub async fn register_device_token(&self, token: &str) -> Result<bool, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::BadRequest("Device token is empty".into()));
        }

        let preferences = self.store.preferences();
        if preferences.get(DEVICE_TOKEN_KEY).await?.as_deref() == Some(token)
            && !preferences.flag(DEVICE_TOKEN_PENDING_KEY).await?
        {
            debug!("Device token unchanged");
            return Ok(true);
        }

        preferences.set(DEVICE_TOKEN_KEY, token).await?;
        preferences.set_flag(DEVICE_TOKEN_PENDING_KEY, true).await?;
        self.flush_device_token().await
    }

    /// Send a pending device token.
    ///
    /// Returns `true` when nothing is pending afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the preference store fails. Remote
    /// failures are logged and leave the token pending.
    pub async fn flush_device_token(&self) -> Result<bool, AppError> {
        let preferences = self.store.preferences();
        if !preferences.flag(DEVICE_TOKEN_PENDING_KEY).await? {
            return Ok(true);
        }
        let Some(token) = preferences.get(DEVICE_TOKEN_KEY).await? else {
            preferences.set_flag(DEVICE_TOKEN_PENDING_KEY, false).await?;
            return Ok(true);
        };
        let user_id = match self.online_user().await {
            Ok(user_id) => user_id,
            Err(AppError::Offline | AppError::NotLoggedIn) => {
                debug!("Device token upload postponed");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        match self.api.update_device_token(&user_id, &token).await {
            Ok(()) => {
                preferences.set_flag(DEVICE_TOKEN_PENDING_KEY, false).await?;
                info!("Device token uploaded");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Device token upload failed");
                Ok(false)
            }
        }
    }

    async fn online_user(&self) -> Result<UserId, AppError> {
        require_online(&self.connectivity)?;
        require_user(&self.store).await
    }

    async fn start_session(&self, user_id: &UserId) -> Result<(), AppError> {
        self.store.sessions().put(user_id).await?;

        if let Err(e) = self.sync.refresh_saved_ids(user_id).await {
            warn!(error = %e, "Failed to load saved restaurants after login");
        }
        if let Err(e) = self.flush_device_token().await {
            warn!(error = %e, "Failed to flush device token after login");
        }
        Ok(())
    }
}
