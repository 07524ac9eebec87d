//! # logpack CLI
//!
//! Command-line interface for the logpack library.

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use logpack::cancel::{CancellationToken, cancel_on_shutdown};
use logpack::cli::Args;
use logpack::{LogpackError, Pipeline, PipelineError};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let shutdown = CancellationToken::new();
    if let Err(e) = cancel_on_shutdown(shutdown.clone()) {
        warn!(error = %e, "signal handlers unavailable; Ctrl-C will not stop cleanly");
    }

    let outcome = match tokio::task::spawn_blocking(move || run(shutdown)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "conversion task failed");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Config(e)) => {
            eprintln!("❌ Error: {e}");
            ExitCode::FAILURE
        }
        Err(Failure::Pipeline(e)) => {
            eprintln!("❌ Error: {}", e.source);
            eprintln!("   Stage:            {}", e.stage);
            eprintln!("   Completed chunks: {}", e.progress.chunks_completed.len());
            eprintln!("   Rows written:     {}", e.progress.rows_written);
            eprintln!("   Malformed lines:  {}", e.progress.malformed_lines);
            ExitCode::FAILURE
        }
    }
}

enum Failure {
    Config(LogpackError),
    Pipeline(PipelineError),
}

/// Logs go to stderr; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(shutdown: CancellationToken) -> Result<(), Failure> {
    let start = Instant::now();
    let args = Args::parse();
    let config = args.to_config().map_err(Failure::Config)?;

    println!("📦 logpack v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Input:   {}", config.input.display());
    println!("💾 Output:  {}", config.output_dir.display());
    println!("📄 Rows:    {} per chunk", config.rows_per_chunk);
    if config.schema_mode.is_dynamic() {
        println!("🧩 Schema:  from first record");
    } else {
        println!("🧩 Schema:  fixed column list");
    }
    println!();

    let manifest = Pipeline::new(config)
        .with_cancellation(shutdown)
        .run()
        .map_err(Failure::Pipeline)?;

    if let Some(path) = &args.manifest {
        manifest.write_json(path).map_err(Failure::Config)?;
    }

    let elapsed = start.elapsed();

    println!("✅ Done! {} file(s) written:", manifest.chunk_count());
    for chunk in &manifest.chunks {
        println!("   {} ({} rows)", chunk.path.display(), chunk.rows);
    }

    println!();
    println!("📊 Summary:");
    println!("   Records:    {}", manifest.total_records);
    println!("   Malformed:  {}", manifest.malformed_lines);
    println!("   Columns:    {}", manifest.schema.len());
    if !manifest.dropped_keys.is_empty() {
        println!("   Dropped:    {}", manifest.dropped_keys.join(", "));
    }
    for warning in &manifest.warnings {
        println!("⚠️  {warning}");
    }

    println!();
    println!("⚡ Performance:");
    println!("   Total time:  {:.2}s", elapsed.as_secs_f64());
    let rows_per_sec = manifest.total_records as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("   Throughput:  {rows_per_sec:.0} rows/sec");

    Ok(())
}
