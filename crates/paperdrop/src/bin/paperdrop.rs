use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use paperdrop::jobs::JobStore;
use paperdrop::logging::{init_logging, LogFormat};
use paperdrop::{
    load_config, ChainConfig, Config, Database, ExtractorChain, JobError, JobTracker, MediaType,
    Upload,
};

/// Extract text from PDFs and images, directly or as background jobs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output: compact or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the extractor chain on one file and print the result
    Extract {
        file: PathBuf,

        /// Declared media type; guessed from the extension when omitted
        #[arg(long)]
        media_type: Option<String>,
    },

    /// Submit files as jobs and poll until each one finishes
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, default_value_t = 250)]
        poll_interval_ms: u64,

        /// Skip the database and keep jobs in memory only
        #[arg(long)]
        no_db: bool,
    },

    /// Print the stored status of a job
    Status { job_id: String },

    /// Delete finished jobs older than the result TTL
    Purge,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Extract { file, media_type } => extract(&config, &file, media_type),
        Command::Submit {
            files,
            poll_interval_ms,
            no_db,
        } => submit(
            &config,
            files,
            Duration::from_millis(poll_interval_ms),
            no_db,
        ),
        Command::Status { job_id } => status(&config, &job_id),
        Command::Purge => purge(&config),
    }
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config
        .database_path()
        .context("No database path configured and no home directory found")?;
    Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn extract(config: &Config, file: &Path, media_type: Option<String>) -> anyhow::Result<()> {
    let media_type = media_type
        .or_else(|| MediaType::guess_from_path(file))
        .with_context(|| format!("Cannot guess media type of {}", file.display()))?;

    // The chain removes its input, so run it on a scratch copy.
    let scratch = tempfile::tempdir()?;
    let copy = scratch.path().join(
        file.file_name()
            .context("Input path has no file name")?,
    );
    std::fs::copy(file, &copy).with_context(|| format!("Failed to read {}", file.display()))?;

    let chain = ExtractorChain::from_config(&ChainConfig::from_config(config));
    let result = chain.run(&copy, &media_type)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn submit(
    config: &Config,
    files: Vec<PathBuf>,
    poll_interval: Duration,
    no_db: bool,
) -> anyhow::Result<()> {
    let db = if no_db {
        None
    } else {
        Some(open_database(config)?)
    };
    let tracker = JobTracker::new(config, db)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut job_ids = Vec::with_capacity(files.len());
    for file in files {
        match tracker.submit(Upload::from_path(&file, None)) {
            Ok(receipt) => {
                println!("{}", serde_json::to_string(&receipt)?);
                job_ids.push(receipt.job_id);
            }
            Err(e) => eprintln!("{}: {}", file.display(), e),
        }
    }

    let max_wait = Duration::from_secs(config.job_timeout_secs).saturating_add(Duration::from_secs(5));
    for job_id in &job_ids {
        let started = Instant::now();
        let view = loop {
            let view = tracker.get_status(job_id)?;
            if view.status().is_finished()
                || interrupted.load(Ordering::SeqCst)
                || started.elapsed() >= max_wait
            {
                break view;
            }
            std::thread::sleep(poll_interval);
        };

        println!(
            "{}",
            serde_json::json!({ "jobId": job_id, "result": view })
        );
        if interrupted.load(Ordering::SeqCst) {
            eprintln!("Interrupted, waiting for running jobs to finish");
            break;
        }
    }

    tracker.shutdown();
    Ok(())
}

fn status(config: &Config, job_id: &str) -> anyhow::Result<()> {
    let store = JobStore::new(Duration::from_secs(config.result_ttl_secs));
    store.set_database(open_database(config)?);

    match store.get(job_id) {
        Some(job) => {
            println!("{}", serde_json::to_string_pretty(&job.view())?);
            Ok(())
        }
        None => bail!(JobError::NotFound(job_id.to_string())),
    }
}

fn purge(config: &Config) -> anyhow::Result<()> {
    let store = JobStore::new(Duration::from_secs(config.result_ttl_secs));
    store.set_database(open_database(config)?);

    let removed = store.purge_expired()?;
    println!("Removed {} expired job(s)", removed);
    Ok(())
}
