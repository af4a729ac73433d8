//! Session and account commands.
//!
//! Passwords are read from stdin so they stay out of shell history.

use dinesphere_client::AppState;
use dinesphere_client::models::{LocationUpdate, ProfileImage, ProfileUpdate};
use dinesphere_core::{Coordinates, Email};

use super::{CliError, read_secret, say};

/// Log in with `email`.
///
/// # Errors
///
/// Returns `CliError` if the login fails.
pub async fn login(state: &AppState, email: &str) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let password = read_secret("Password")?;
    let user_id = state.account().login(&email, &password).await?;
    say(format!("Logged in as user {user_id}"));
    Ok(())
}

/// Create an account and log into it.
///
/// # Errors
///
/// Returns `CliError` if validation or signup fails.
pub async fn signup(state: &AppState, email: &str) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let password = read_secret("Password")?;
    let confirm = read_secret("Confirm password")?;
    let user_id = state.account().signup(&email, &password, &confirm).await?;
    say(format!("Account created, logged in as user {user_id}"));
    Ok(())
}

/// Set a new password.
///
/// # Errors
///
/// Returns `CliError` if validation or the update fails.
pub async fn change_password(state: &AppState, email: &str) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let password = read_secret("New password")?;
    let confirm = read_secret("Confirm password")?;
    state
        .account()
        .update_password(&email, &password, &confirm)
        .await?;
    say("Password updated");
    Ok(())
}

/// Log out and drop queued actions.
///
/// # Errors
///
/// Returns `CliError` if the local store fails.
pub async fn logout(state: &AppState) -> Result<(), CliError> {
    state.account().logout().await?;
    say("Logged out");
    Ok(())
}

/// Print the logged-in user.
///
/// # Errors
///
/// Returns `CliError` if the session cannot be read.
pub async fn whoami(state: &AppState) -> Result<(), CliError> {
    match state.account().current_user().await? {
        Some(user_id) => say(format!("user {user_id}")),
        None => say("not logged in"),
    }
    Ok(())
}

/// Print or change the saved location.
///
/// # Errors
///
/// Returns `CliError` if the backend call fails.
pub async fn location(
    state: &AppState,
    set: Option<(f64, f64)>,
    address: Option<String>,
) -> Result<(), CliError> {
    let account = state.account();

    if let Some((latitude, longitude)) = set {
        let update = LocationUpdate {
            coordinates: Coordinates::new(latitude, longitude),
            address: address.unwrap_or_default(),
        };
        account.update_location(&update).await?;
        say("Location updated");
        return Ok(());
    }

    match account.location().await? {
        Some(location) => say(format!(
            "{:.5}, {:.5}  {}",
            location.coordinates.latitude,
            location.coordinates.longitude,
            location.display_address()
        )),
        None => say("No location on file"),
    }
    Ok(())
}

/// Print the profile.
///
/// # Errors
///
/// Returns `CliError` if the backend call fails.
pub async fn profile(state: &AppState) -> Result<(), CliError> {
    let profile = state.account().profile().await?;
    say(profile.display_name());
    for (label, value) in [
        ("email", &profile.email),
        ("phone", &profile.phone),
        ("gender", &profile.gender),
        ("address", &profile.address),
        ("image", &profile.profile_image_url),
    ] {
        if let Some(value) = value {
            say(format!("  {label:<8} {value}"));
        }
    }
    Ok(())
}

/// Fields for a profile update.
#[derive(Debug)]
pub struct ProfileArgs {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Phone number.
    pub phone: String,
    /// Gender, free form.
    pub gender: String,
    /// Path of a new avatar image.
    pub image: Option<std::path::PathBuf>,
}

/// Update the profile.
///
/// # Errors
///
/// Returns `CliError` if the image cannot be read or the update fails.
pub async fn update_profile(state: &AppState, args: ProfileArgs) -> Result<(), CliError> {
    let image = match args.image {
        Some(path) => Some(ProfileImage::Upload(tokio::fs::read(path).await?)),
        None => None,
    };
    let update = ProfileUpdate {
        first_name: args.first_name,
        last_name: args.last_name,
        phone: args.phone,
        gender: args.gender,
        image,
    };

    match state.account().update_profile(&update).await? {
        Some(url) => say(format!("Profile updated, image at {url}")),
        None => say("Profile updated"),
    }
    Ok(())
}

/// Register a push device token.
///
/// # Errors
///
/// Returns `CliError` if the token is empty or the local store fails.
pub async fn device_token(state: &AppState, token: &str) -> Result<(), CliError> {
    if state.account().register_device_token(token).await? {
        say("Device token registered");
    } else {
        say("Device token stored, upload pending");
    }
    Ok(())
}
