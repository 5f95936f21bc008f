use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use credmint_core::CredmintError;

mod args;
mod cmd;
mod config;
mod io;
mod output;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = args::Cli::parse();
    output::init(cli.json);
    init_tracing(cli.json);

    match cmd::dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

/// Engine errors print as a structured payload; anything else as plain text.
fn report(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<CredmintError>() {
        Some(err) => {
            let payload = json!({
                "error": err.kind().as_str(),
                "operation": err.operation(),
                "message": err.to_string(),
                "retryable": err.is_retryable(),
            });
            if output::print(&payload).is_err() {
                eprintln!("{err}");
            }
            if err.is_retryable() {
                ExitCode::from(3)
            } else {
                ExitCode::from(2)
            }
        }
        None => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
