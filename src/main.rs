//! Snippy CLI - URL shortener client
//!
//! A terminal client for the Snippy link shortener.

mod api;
mod auth;
mod config;
mod models;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "snippy")]
#[command(about = "CLI client for the Snippy URL shortener", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        /// Display name for the new account
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },

    /// Sign in with email/password or Google
    Login {
        /// Email address
        #[arg(short, long, required_unless_present = "google")]
        email: Option<String>,

        /// Password
        #[arg(short, long, required_unless_present = "google")]
        password: Option<String>,

        /// Sign in with a Google account instead
        #[arg(short, long)]
        google: bool,
    },

    /// Log out and clear cached credentials
    Logout,

    /// Send a password reset email
    ForgotPassword {
        /// Email address of the account
        email: String,
    },

    /// Show current authentication status
    Status,

    /// Show current user info (verify auth works)
    Whoami,

    /// Create a shortened link
    Shorten {
        /// URL to shorten
        url: String,

        /// Custom slug instead of a generated one
        #[arg(short, long)]
        slug: Option<String>,

        /// Description shown in listings
        #[arg(short, long)]
        description: Option<String>,

        /// Expiry as RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        expires: Option<String>,

        /// Deactivate the link after its first visit
        #[arg(long)]
        one_time: bool,
    },

    /// List your links
    Links,

    /// Show analytics for a link
    Stats {
        /// Link slug (from `links` output)
        slug: String,
    },

    /// Deactivate a link without deleting it
    Deactivate {
        /// Link slug (from `links` output)
        slug: String,
    },

    /// Delete a link permanently
    Delete {
        /// Link slug (from `links` output)
        slug: String,
    },

    /// Download a link's QR code image
    Qr {
        /// Link slug (from `links` output)
        slug: String,

        /// Output file (defaults to qr-<slug>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Get/set the UI theme preference
    Theme {
        /// New theme: light or dark
        #[arg(short, long)]
        set: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => {
            tracing::info!("Creating account...");
            auth::register(name, email, password).await?;
        }
        Commands::Login {
            email,
            password,
            google,
        } => {
            tracing::info!("Starting authentication flow...");
            auth::login(email, password, google).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::ForgotPassword { email } => {
            auth::forgot_password(email).await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Whoami => {
            api::whoami().await?;
        }
        Commands::Shorten {
            url,
            slug,
            description,
            expires,
            one_time,
        } => {
            api::shorten(url, slug, description, expires, one_time).await?;
        }
        Commands::Links => {
            tracing::info!("Fetching links...");
            api::links().await?;
        }
        Commands::Stats { slug } => {
            api::stats(slug).await?;
        }
        Commands::Deactivate { slug } => {
            api::deactivate(slug).await?;
        }
        Commands::Delete { slug } => {
            api::delete(slug).await?;
        }
        Commands::Qr { slug, output } => {
            api::qr(slug, output).await?;
        }
        Commands::Theme { set } => {
            config::theme_preference(set)?;
        }
    }

    Ok(())
}
