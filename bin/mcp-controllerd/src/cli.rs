use clap::Parser;

/// Machine-config pool controller daemon.
#[derive(Parser, Debug)]
#[command(name = "mcp-controllerd")]
#[command(about = "Reconciles machine-config pools against the object store")]
pub struct Args {
    /// Minimum time a node spends draining before it is reported DrainStuck.
    #[arg(long, value_name = "SECONDS", default_value_t = 600)]
    pub drain_timeout_seconds: i64,

    /// Grace period given to evictable pods before a drain retries eviction.
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub eviction_grace_seconds: i64,

    /// Verbose (debug-level) logging. Overridden by `RUST_LOG` if set.
    #[arg(short, long)]
    pub verbose: bool,
}
