//! crud-bench binary.

use clap::Parser;
use crud_bench::{Args, BenchConfig, Harness, OutputFormat, Progress};
use tracing::info;

fn main() {
    // Logs go to stderr so stdout carries only the report (and progress in table mode).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crud_bench=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = BenchConfig::from(args);

    info!(
        host = %config.connection.host,
        port = config.connection.port,
        database = %config.connection.database,
        records = ?config.record_counts,
        "Starting benchmark"
    );

    let mut harness = Harness::new(config)?.with_progress(Progress::from(args.format));

    let version = harness.server_version()?;
    info!(%version, "Connected");

    let results = harness.run_trials()?;

    if args.format == OutputFormat::Table {
        println!();
    }
    println!("{}", results.render(args.format));

    Ok(())
}
