//! tracing subscriber setup.

use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &[
    "tandem",
    "tandem_config",
    "tandem_engine",
    "tandem_fs",
    "tandem_registry",
];

/// Filter directives for a `-v` count: warnings by default, debug for `-v`,
/// trace for `-vv` and above. Only tandem's own crates get louder.
pub fn directives(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .without_time()
        .init();
}
