//! Baton - Offload Bridge for Blocking Parses
//!
//! CLI entry point: parses blueprint files through the event loop and runs a
//! dispatch stress benchmark.

use anyhow::{bail, Context, Result};
use baton::{
    logging, BatonConfig, EventLoop, HostArg, PoolConfig, TransitionLog, WorkerPool,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "baton")]
#[command(version)]
#[command(about = "Offload blocking parses to a worker pool", long_about = None)]
struct Cli {
    /// Config file (default: nearest baton.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (overrides config and BATON_THREADPOOL_SIZE)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse blueprint files and print one result per file
    Parse {
        /// Input files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Fail when the blueprint has no API name
        #[arg(long)]
        require_name: bool,

        /// Include source maps in the output
        #[arg(long)]
        sourcemap: bool,

        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
    },

    /// Submit many parses at once and verify delivery
    Bench {
        /// Number of concurrent submissions
        #[arg(short, long, default_value = "1000")]
        count: usize,

        /// Record and verify every lifecycle transition
        #[arg(long)]
        verify: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), cli.workers)?;
    logging::init(&config.logging);

    match cli.command {
        Commands::Parse {
            files,
            require_name,
            sourcemap,
            compact,
        } => {
            let failed = cmd_parse(&config.pool, &files, require_name, sourcemap, compact)?;
            if failed > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Bench { count, verify } => cmd_bench(&config.pool, count, verify),
    }
}

fn load_config(path: Option<&Path>, workers: Option<usize>) -> Result<BatonConfig> {
    let mut config = match path {
        Some(path) => BatonConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => BatonConfig::load_from_cwd().context("Failed to load baton.toml")?,
    };
    config.apply_env();
    if let Some(workers) = workers {
        config.pool.workers = workers;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn event_loop(pool: &PoolConfig) -> Result<EventLoop> {
    let pool = WorkerPool::new(pool).context("Failed to start worker pool")?;
    Ok(EventLoop::builder().pool(Arc::new(pool)).build()?)
}

/// Returns the number of files whose parse reported an error.
fn cmd_parse(
    pool: &PoolConfig,
    files: &[PathBuf],
    require_name: bool,
    sourcemap: bool,
    compact: bool,
) -> Result<usize> {
    let mut event_loop = event_loop(pool)?;

    let mut options = Map::new();
    if require_name {
        options.insert("requireBlueprintName".into(), Value::Bool(true));
    }
    if sourcemap {
        options.insert("exportSourcemap".into(), Value::Bool(true));
    }

    let results: Rc<RefCell<Vec<Option<Value>>>> = Rc::new(RefCell::new(vec![None; files.len()]));
    let mut failed = 0;

    for (index, path) in files.iter().enumerate() {
        let source = fs::read(path)
            .with_context(|| format!("Failed to read input: {}", path.display()))?;
        let source = String::from_utf8(source)
            .with_context(|| format!("Input is not valid UTF-8: {}", path.display()))?;
        let sink = Rc::clone(&results);
        let name = path.display().to_string();

        event_loop.parse(vec![
            HostArg::text(source),
            HostArg::value(Value::Object(options.clone())),
            HostArg::function(move |error, result| {
                sink.borrow_mut()[index] = Some(json!({
                    "file": name,
                    "error": error,
                    "result": result,
                }));
            }),
        ])?;
    }

    event_loop.run();

    for entry in results.borrow().iter().flatten() {
        if !entry["error"].is_null() {
            failed += 1;
        }
        let text = if compact {
            serde_json::to_string(entry)?
        } else {
            serde_json::to_string_pretty(entry)?
        };
        println!("{}", text);
    }

    Ok(failed)
}

const BENCH_SOURCE: &str = "\
# Notes API

Notes service.

# Group Notes

## Notes Collection [/notes]

### List Notes [GET]

### Create a Note [POST]

## Note [/notes/{id}]

### Retrieve a Note [GET]

### Delete a Note [DELETE]
";

fn cmd_bench(pool: &PoolConfig, count: usize, verify: bool) -> Result<()> {
    println!("Baton Dispatch Benchmark");
    println!("========================");
    println!("Workers: {}", pool.workers);
    println!("Submissions: {}\n", count);

    let log = TransitionLog::new();
    let pool = WorkerPool::new(pool).context("Failed to start worker pool")?;
    let mut builder = EventLoop::builder().pool(Arc::new(pool));
    if verify {
        builder = builder.observer(log.clone());
    }
    let mut event_loop = builder.build()?;

    let delivered = Rc::new(RefCell::new(vec![0u32; count]));
    let start = Instant::now();

    for index in 0..count {
        let sink = Rc::clone(&delivered);
        event_loop.parse_text(BENCH_SOURCE, None, move |error, result| {
            let ast = &result["ast"];
            if error.is_none()
                && ast["name"] == "Notes API"
                && ast["resourceGroups"][0]["name"] == "Notes"
                && ast["resourceGroups"][0]["resources"][1]["actions"][1]["method"] == "DELETE"
            {
                sink.borrow_mut()[index] += 1;
            }
        })?;
    }
    let submitted = start.elapsed();
    let dispatched = event_loop.run();
    let elapsed = start.elapsed();

    let delivered = delivered.borrow();
    let missing = delivered.iter().filter(|&&n| n != 1).count();
    let stats = event_loop.stats();

    println!("  Submit time: {:?}", submitted);
    println!("  Total time: {:?}", elapsed);
    println!(
        "  Throughput: {:.0} parses/s",
        count as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("  Dispatched: {}", dispatched);
    println!("  Disposed: {}", stats.disposed);

    if missing > 0 {
        bail!("{} submissions were not delivered exactly once", missing);
    }
    if stats.outstanding() != 0 {
        bail!("{} batons were never disposed", stats.outstanding());
    }
    if verify {
        let checked = log
            .verify(thread::current().id())
            .map_err(|e| anyhow::anyhow!("Lifecycle check failed: {}", e))?;
        println!("  Verified lifecycles: {}", checked);
    }

    Ok(())
}
