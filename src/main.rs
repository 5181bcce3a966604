mod burn;
mod cancel;
mod cli;
mod error;
mod report;
mod util;

use anyhow::Result;
use burn::{BurnManager, RunConfig};
use cancel::{CancelToken, Watchers};
use cli::Cli;
use error::ConfigError;
use log::{debug, error, LevelFilter};

const EXIT_RUNTIME: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("{err:#}");
        let code = if err.downcast_ref::<ConfigError>().is_some() {
            EXIT_CONFIG
        } else {
            EXIT_RUNTIME
        };
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli);

    debug!("CLI arguments: {:?}", cli);
    let config = RunConfig::try_from(cli)?;

    let cancel = CancelToken::new();
    let mut watchers = Watchers::new();
    watchers.signals(cancel.clone());

    let manager = BurnManager::new(config, cancel)?;
    let summary = manager.run().await;
    drop(watchers);

    debug!(
        "run finished after {:.1}s: {} bytes, {}",
        summary.elapsed_secs(),
        summary.bytes_total,
        summary.reason
    );
    Ok(())
}

fn init_logger(cli: &Cli) {
    use env_logger::Env;

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.filter_level(log_level(cli));
    if !cli.verbose {
        builder.format_timestamp_secs();
    }
    let _ = builder.try_init();
}

// quiet still admits warn! records for fetch failures
fn log_level(cli: &Cli) -> LevelFilter {
    if cli.quiet {
        LevelFilter::Warn
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
