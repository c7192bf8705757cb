//! `tracing` subscriber setup (`spec.md` ambient stack; teacher's
//! `tracing_subscriber::fmt::init()` generalized to honor `-v`/`-q` and
//! `JIRI_LOG`).

use tracing_subscriber::EnvFilter;

pub fn init(verbose: u8, quiet: bool) {
    let default_directive = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_env("JIRI_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
