//! Leadflow CLI - drive the CRM API access layer from the terminal
//!
//! Issues requests through the same client the application uses, so caching,
//! credential refresh, and retries behave exactly as they do in production.

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::process::ExitCode;

mod commands;
mod output;

use commands::{auth, request};

/// Command-line driver for the Leadflow API
#[derive(Parser)]
#[command(name = "leadflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a leadflow.toml (searched in the standard locations otherwise)
    #[arg(short, long, global = true, env = "LEADFLOW_CONFIG")]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Send requests without credentials
    #[arg(long, global = true)]
    skip_auth: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a resource
    Get {
        /// Endpoint path relative to the base URL
        path: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = request::parse_query_pair)]
        query: Vec<(String, String)>,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Create a resource
    Post {
        /// Endpoint path relative to the base URL
        path: String,

        /// JSON body, or @file to read it from a file
        #[arg(short, long)]
        body: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = request::parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Replace a resource
    Put {
        /// Endpoint path relative to the base URL
        path: String,

        /// JSON body, or @file to read it from a file
        #[arg(short, long)]
        body: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = request::parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Update part of a resource
    Patch {
        /// Endpoint path relative to the base URL
        path: String,

        /// JSON body, or @file to read it from a file
        #[arg(short, long)]
        body: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = request::parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Delete a resource
    Delete {
        /// Endpoint path relative to the base URL
        path: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = request::parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Store a token pair issued by the login flow
    Login {
        /// Access token
        #[arg(long, env = "LEADFLOW_ACCESS_TOKEN")]
        access_token: String,

        /// Refresh token
        #[arg(long, env = "LEADFLOW_REFRESH_TOKEN")]
        refresh_token: String,
    },

    /// Forget stored credentials
    Logout,

    /// Show whether credentials are stored
    Token,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = commands::Context::load(cli.config.as_deref(), cli.verbose, &cli.format)?;
    let skip_auth = cli.skip_auth;

    match cli.command {
        Commands::Get {
            path,
            query,
            no_cache,
        } => {
            let call = request::Call::get(path, query).no_cache(no_cache);
            request::run(&ctx, call.skip_auth(skip_auth)).await
        }
        Commands::Delete { path, query } => {
            request::run(&ctx, request::Call::delete(path, query).skip_auth(skip_auth)).await
        }
        Commands::Post { path, body, query } => {
            let call = request::Call::post(path, query).with_body(body.as_deref())?;
            request::run(&ctx, call.skip_auth(skip_auth)).await
        }
        Commands::Put { path, body, query } => {
            let call = request::Call::put(path, query).with_body(body.as_deref())?;
            request::run(&ctx, call.skip_auth(skip_auth)).await
        }
        Commands::Patch { path, body, query } => {
            let call = request::Call::patch(path, query).with_body(body.as_deref())?;
            request::run(&ctx, call.skip_auth(skip_auth)).await
        }
        Commands::Login {
            access_token,
            refresh_token,
        } => auth::login(&ctx, access_token, refresh_token),
        Commands::Logout => auth::logout(&ctx),
        Commands::Token => auth::status(&ctx),
    }
}
