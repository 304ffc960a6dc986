//! Terminal host: uploads one video and follows its analysis until the job
//! reaches a terminal phase. Ctrl-C cancels monitoring.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use log::LevelFilter;
use monitor_logging::{monitor_info, LogDestination};
use progress_core::{JobView, Phase, UploadMetadata};
use progress_engine::{JobSession, LoggingObserver, MonitorConfig, UploadFile};

const CONFIG_ENV: &str = "MONITOR_CONFIG";

#[derive(Parser)]
#[command(name = "monitor_app", version, about = "Upload a video and follow its analysis")]
struct Cli {
    /// Video file to upload
    video: PathBuf,
    /// Title shown in the backend; defaults to the file name
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// Recording date, YYYY-MM-DD
    #[arg(long, requires_all = ["start", "end"])]
    date: Option<NaiveDate>,
    /// Recording start, HH:MM:SS
    #[arg(long, requires = "date")]
    start: Option<NaiveTime>,
    /// Recording end, HH:MM:SS
    #[arg(long, requires = "date")]
    end: Option<NaiveTime>,
    /// RON config file; falls back to $MONITOR_CONFIG, then built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn metadata(&self) -> UploadMetadata {
        UploadMetadata {
            title: self.title.clone().unwrap_or_default(),
            location_id: self.location.clone(),
            recorded_on: self.date,
            start_time: self.start,
            end_time: self.end,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    monitor_logging::initialize(destination, level);

    let config = load_config(cli.config.as_deref())?;
    let session = JobSession::connect(config).context("failed to set up the backend client")?;
    session.add_observer(LoggingObserver);
    let mut updates = session.subscribe();

    let file = UploadFile::from_path(&cli.video)
        .with_context(|| format!("cannot read {}", cli.video.display()))?;
    let job_id = tokio::select! {
        submitted = session.submit(file, cli.metadata()) => submitted?,
        _ = tokio::signal::ctrl_c() => {
            session.teardown();
            bail!("interrupted during upload");
        }
    };
    println!("Monitoring job {job_id}");

    let last = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break session.view();
                }
                let view = updates.borrow_and_update().clone();
                render(&view);
                if view.is_terminal() {
                    break view;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if session.cancel().is_err() {
                    break session.view();
                }
            }
        }
    };
    session.teardown();

    match last.phase() {
        Phase::Completed => {
            monitor_info!("Job {} completed", job_id);
            Ok(())
        }
        Phase::Cancelled => {
            println!("Monitoring cancelled at {}%", last.state.progress_percent);
            Ok(())
        }
        _ => bail!("job {job_id} failed: {}", last.state.message),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<MonitorConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    match path {
        Some(path) => MonitorConfig::load(&path)
            .with_context(|| format!("cannot load config {}", path.display())),
        None => Ok(MonitorConfig::default()),
    }
}

fn render(view: &JobView) {
    let marker = if view.has_degraded_channel() { " (degraded)" } else { "" };
    println!(
        "[{:>3}%] {:?}{} {}",
        view.display_percent(),
        view.phase(),
        marker,
        view.state.message
    );
}
