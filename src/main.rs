use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Log filter directives, e.g. `SHARESTORE_LOG=sharestore=debug`.
const LOG_ENV: &str = "SHARESTORE_LOG";

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("warning: {e:#}");
    }
    match sharestore::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
