use clap::Parser;
use solscribe::cli::{self, App, Cli, Outcome};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Entry point: one command per invocation.
///
/// Exit codes: 0 success, 1 fatal error, 2 disbursement aborted part way,
/// 3 issuance entities abandoned.
#[tokio::main]
async fn main() -> ExitCode {
    // Secrets may come from a local .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Usage errors exit 1 so that 2 keeps meaning a partial disbursement
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(cli::parse_error_code(&e));
        }
    };
    let result: anyhow::Result<Outcome> = async {
        let app = App::from_cli(&cli).await?;
        app.execute(&cli.command).await
    }
    .await;

    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("{} failed: {:#}", cli.command.name(), e);
            ExitCode::from(1)
        }
    }
}
