use devprobe::config::load_config;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so stdout stays the report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = load_config();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = devprobe::run(&config, &mut out).and_then(|_| out.flush()) {
        // A closed pipe is not worth a non-zero exit
        tracing::debug!(error = %err, "Could not write report");
    }
}
