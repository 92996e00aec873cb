use clap::Args;
use env_logger::{Builder, Env};
use log::LevelFilter;

/// Overrides the default log filter, e.g. `GJ_LOG=guji=trace`.
pub const LOG_ENV: &str = "GJ_LOG";

#[derive(Debug, Args, Clone, Copy, Default)]
pub struct LogArgs {
    /// Log requests and resolved settings to stderr
    #[arg(long)]
    pub verbose: bool,
    /// Silence everything on stderr except fatal errors
    #[arg(long)]
    pub quiet: bool,
}

impl LogArgs {
    pub fn level(self) -> Option<LevelFilter> {
        if self.quiet {
            Some(LevelFilter::Off)
        } else if self.verbose {
            Some(LevelFilter::Debug)
        } else {
            None
        }
    }
}

/// Installs the stderr logger; later calls are no-ops.
pub fn init(args: LogArgs) {
    let mut builder = Builder::from_env(Env::default().filter_or(LOG_ENV, "warn"));
    if let Some(level) = args.level() {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).format_target(false);
    let _ = builder.try_init();
}
