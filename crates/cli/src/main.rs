//! DineSphere CLI - local cache management and client flows.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the local cache database
//! dinesphere migrate
//!
//! # Log in (password read from stdin)
//! dinesphere login -e diner@example.com
//!
//! # Home feed around a location
//! dinesphere home --lat 31.52 --lon 74.35
//!
//! # Save a restaurant without network, then replay the queue
//! dinesphere --offline save 42
//! dinesphere sync
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run local store migrations
//! - `login` / `signup` / `logout` / `whoami` / `password` - Session
//! - `home` / `menu` / `search` - Listings, cache first
//! - `save` / `unsave` / `toggle` / `saved` - Saved restaurants
//! - `queue` / `sync` - Inspect and replay the offline queue
//! - `reviews` / `review` / `notifications` - Activity
//! - `location` / `profile` / `edit-profile` / `device-token` - Account
//!
//! # Environment Variables
//!
//! See `ClientConfig::from_env`. `RUST_LOG` overrides the log filter.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dinesphere_client::{AppState, ClientConfig, Connectivity};
use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "dinesphere")]
#[command(author, version, about = "DineSphere client CLI")]
struct Cli {
    /// Behave as if there were no network
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run local store migrations
    Migrate {
        /// Drop every table first (destroys cached data and the queue)
        #[arg(long)]
        reset: bool,
    },
    /// Log in
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Create an account
    Signup {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Change the account password
    Password {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Log out and discard queued actions
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Nearby and other restaurants
    Home {
        /// Latitude (defaults to the saved location)
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude (defaults to the saved location)
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Menu categories of a restaurant, or items of one category
    Menu {
        /// Restaurant id
        restaurant_id: i32,
        /// Category id
        #[arg(short, long)]
        category: Option<i32>,
    },
    /// Search cached restaurants (or menu items)
    Search {
        /// Text to look for
        query: String,
        /// Search menu items instead of restaurants
        #[arg(long)]
        menu: bool,
    },
    /// Save a restaurant
    Save {
        /// Restaurant id
        restaurant_id: i32,
    },
    /// Unsave a restaurant
    Unsave {
        /// Restaurant id
        restaurant_id: i32,
    },
    /// Flip the saved state of a restaurant
    Toggle {
        /// Restaurant id
        restaurant_id: i32,
    },
    /// List saved restaurants
    Saved,
    /// Show queued offline actions
    Queue,
    /// Replay queued offline actions now
    Sync,
    /// List your reviews
    Reviews {
        /// Only visits waiting for a rating
        #[arg(long)]
        pending: bool,
    },
    /// Review a restaurant
    Review {
        /// Restaurant id
        restaurant_id: i32,
        /// Stars, 1-5
        #[arg(short, long)]
        rating: u8,
        /// Review text
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// List notifications
    Notifications,
    /// Show or set the saved location
    Location {
        /// New latitude
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// New longitude
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Address for the new location
        #[arg(long)]
        address: Option<String>,
    },
    /// Show the profile
    Profile,
    /// Update the profile
    EditProfile {
        /// Given name
        #[arg(long)]
        first_name: String,
        /// Family name
        #[arg(long)]
        last_name: String,
        /// Phone number
        #[arg(long)]
        phone: String,
        /// Gender
        #[arg(long, default_value = "")]
        gender: String,
        /// New avatar image file
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Register a push device token
    DeviceToken {
        /// Token issued by the push provider
        token: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.expose_secret(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(config: &ClientConfig) {
    // Defaults to info level for the client if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dinesphere_client=info,dinesphere=info".into());

    let json_layer = config.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!config.log_json)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Configuration error: {e}");
            }
            std::process::exit(2);
        }
    };

    // Sentry first so the tracing layer has a client to report to
    let _sentry_guard = init_sentry(&config);
    init_tracing(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    if let Commands::Migrate { reset } = cli.command {
        return commands::migrate::run(&config, reset).await;
    }

    let connectivity = Connectivity::new(!cli.offline);
    let state = AppState::open(config, connectivity).await?;

    let result = dispatch(&state, cli.command).await;
    state.close().await;
    result
}

async fn dispatch(state: &AppState, command: Commands) -> Result<(), CliError> {
    use commands::{account, activity, browse, saved};

    match command {
        Commands::Migrate { .. } => {
            return Err(CliError::Usage("migrate runs before the store is opened".into()));
        }
        Commands::Login { email } => account::login(state, &email).await?,
        Commands::Signup { email } => account::signup(state, &email).await?,
        Commands::Password { email } => account::change_password(state, &email).await?,
        Commands::Logout => account::logout(state).await?,
        Commands::Whoami => account::whoami(state).await?,
        Commands::Home { lat, lon } => browse::home(state, lat.zip(lon)).await?,
        Commands::Menu {
            restaurant_id,
            category,
        } => browse::menu(state, restaurant_id, category).await?,
        Commands::Search { query, menu } => browse::search(state, &query, menu).await?,
        Commands::Save { restaurant_id } => saved::set(state, restaurant_id, Some(true)).await?,
        Commands::Unsave { restaurant_id } => saved::set(state, restaurant_id, Some(false)).await?,
        Commands::Toggle { restaurant_id } => saved::set(state, restaurant_id, None).await?,
        Commands::Saved => saved::list(state).await?,
        Commands::Queue => saved::queue(state).await?,
        Commands::Sync => saved::sync(state).await?,
        Commands::Reviews { pending } => activity::reviews(state, pending).await?,
        Commands::Review {
            restaurant_id,
            rating,
            comment,
        } => activity::review(state, restaurant_id, rating, comment).await?,
        Commands::Notifications => activity::notifications(state).await?,
        Commands::Location { lat, lon, address } => {
            account::location(state, lat.zip(lon), address).await?;
        }
        Commands::Profile => account::profile(state).await?,
        Commands::EditProfile {
            first_name,
            last_name,
            phone,
            gender,
            image,
        } => {
            account::update_profile(
                state,
                account::ProfileArgs {
                    first_name,
                    last_name,
                    phone,
                    gender,
                    image,
                },
            )
            .await?;
        }
        Commands::DeviceToken { token } => account::device_token(state, &token).await?,
    }
    Ok(())
}
