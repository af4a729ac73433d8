//! Command implementations.
//!
//! Each command works on an [`AppState`] and prints plain text to stdout.
//! Logs go to stderr through `tracing`.

use std::io::BufRead;

use dinesphere_client::AppError;
use dinesphere_client::api::ApiError;
use dinesphere_client::config::ConfigError;
use dinesphere_client::db::RepositoryError;
use dinesphere_client::models::CachedRestaurant;
use dinesphere_core::EmailError;
use secrecy::SecretString;
use thiserror::Error;

pub mod account;
pub mod activity;
pub mod browse;
pub mod migrate;
pub mod saved;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Client operation failed.
    #[error("{}", .0.user_message())]
    App(#[from] AppError),

    /// Invalid email argument.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Reading interactive input failed.
    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),

    /// Invalid argument combination.
    #[error("{0}")]
    Usage(String),
}

impl From<RepositoryError> for CliError {
    fn from(e: RepositoryError) -> Self {
        Self::App(e.into())
    }
}

impl From<ApiError> for CliError {
    fn from(e: ApiError) -> Self {
        Self::App(e.into())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::App(e.into())
    }
}

/// Print one line to stdout.
#[allow(clippy::print_stdout)]
pub fn say(line: impl std::fmt::Display) {
    println!("{line}");
}

/// Read a secret line from stdin, prompting on stderr.
///
/// # Errors
///
/// Returns `CliError::Input` if stdin cannot be read.
#[allow(clippy::print_stderr)]
pub fn read_secret(prompt: &str) -> Result<SecretString, CliError> {
    eprint!("{prompt}: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// One listing line for a restaurant.
pub fn restaurant_line(r: &CachedRestaurant) -> String {
    let saved = if r.is_saved { "*" } else { " " };
    let discount = r
        .discount
        .as_deref()
        .map(|d| format!("  [{d}]"))
        .unwrap_or_default();
    format!(
        "{saved} {:>5}  {:<32} {:>4.1}  {}{discount}",
        r.id.as_i32(), r.name, r.rating, r.distance
    )
}
