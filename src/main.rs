use loadwatch::config::Config;
use loadwatch::errors::Result;
use loadwatch::runner::TestRunner;

use std::process;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    match run().await {
        // Exit explicitly: a stdin read may still be parked on a blocking thread
        Ok(code) => process::exit(code),
        Err(e) => {
            // Logging may not be initialized yet when configuration fails
            eprintln!("loadwatch: {}", e);
            process::exit(1);
        }
    }
}

/// Main application logic
async fn run() -> Result<i32> {
    // Parse and validate configuration
    let config = Config::from_args()?;

    // Initialize logging based on verbosity
    init_logging(config.output.verbose);

    info!("loadwatch - streaming load test monitor");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let mut runner = TestRunner::new(config);
    let outcome = runner.run().await.map_err(|e| {
        error!("Test run failed: {}", e);
        e
    })?;

    Ok(outcome.exit_code)
}

/// Initialize logging based on configuration
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("loadwatch={}", level)
                    .parse()
                    .expect("Invalid filter directive"),
            ),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    if verbose {
        info!("Verbose logging enabled");
    }
}
