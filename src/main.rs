use clap::Parser;

/// UCI chess engine. With no subcommand, reads UCI commands from stdin.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Transposition table size in megabytes.
    #[arg(long, default_value_t = anthracite::types::DEFAULT_HASH_MB)]
    hash: usize,

    /// Search threads (Lazy-SMP).
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Path to a Syzygy tablebase directory.
    #[arg(long)]
    syzygy_path: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    anthracite::board::init();

    let mut config = anthracite::types::EngineConfig::default();
    config.hash_mb = cli.hash;
    config.threads = cli.threads;
    config.syzygy_path = cli.syzygy_path;

    anthracite::uci::run(config);
}
