//! index2-fetch
//!
//! Retrieves Index-II documents for one property from the IGR Maharashtra free
//! search portal and prints the run report as JSON on stdout. Progress is
//! logged to stderr (`RUST_LOG` controls verbosity, default `info`).

use anyhow::Context;
use clap::Parser;
use index2_fetch::browser::{BrowserSession, ConnectionOptions, LaunchOptions};
use index2_fetch::config::Settings;
use index2_fetch::portal::{
    ArtifactStore, FolderArchive, LocalOnly, Orchestrator, PortalContext, RunOptions, SearchCriteria, TesseractCli,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "index2-fetch")]
#[command(version)]
#[command(about = "Fetch Index-II property documents from the IGR Maharashtra portal", long_about = None)]
struct Cli {
    /// Registration year (value of the year dropdown)
    #[arg(long)]
    year: String,

    /// District name as listed on the portal
    #[arg(long)]
    district: String,

    /// Taluka name as listed on the portal
    #[arg(long)]
    taluka: String,

    /// Village name as listed on the portal
    #[arg(long)]
    village: String,

    /// Property number to search for
    #[arg(long)]
    property_number: String,

    /// Only walk the result pages and record the rows
    #[arg(long, conflicts_with = "download_all")]
    navigation_only: bool,

    /// Extract every row even if the results carry no row actions
    #[arg(long)]
    download_all: bool,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// WebSocket endpoint URL of an already running browser
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// TOML settings file
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root directory for downloaded documents
    #[arg(long, value_name = "DIR")]
    downloads_dir: Option<PathBuf>,

    /// Copy accepted documents into this folder archive
    #[arg(long, value_name = "DIR")]
    archive_dir: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long, value_name = "PATH")]
    tesseract: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(dir) = cli.downloads_dir {
        settings.output.downloads_dir = dir;
    }
    if let Some(path) = cli.tesseract {
        settings.captcha.tesseract = path;
    }

    let criteria = SearchCriteria::new(cli.year, cli.district, cli.taluka, cli.village, cli.property_number)?;
    let options = RunOptions { navigation_only: cli.navigation_only, download_all: cli.download_all };

    let session = match cli.ws_endpoint {
        Some(endpoint) => {
            log::info!("Connecting to browser at {}", endpoint);
            BrowserSession::connect(ConnectionOptions::new(endpoint))
        }
        None => {
            let mut launch = LaunchOptions::new().headless(!cli.headed);
            if let Some(path) = cli.chrome_path {
                launch = launch.chrome_path(path);
            }
            log::info!("Launching browser ({})", if launch.headless { "headless" } else { "headed" });
            BrowserSession::launch(launch)
        }
    }
    .context("Failed to start browser session")?;

    let ocr = TesseractCli::new(&settings.captcha.tesseract, settings.captcha.whitelist.clone());
    let store: Box<dyn ArtifactStore> = match cli.archive_dir {
        Some(dir) => Box::new(FolderArchive::new(dir)),
        None => Box::new(LocalOnly),
    };

    let report = {
        let ctx = PortalContext::new(&session, &settings, &ocr, store.as_ref());
        Orchestrator::new(ctx).run(&criteria, options)
    };

    // Each run owns its browser; tear it down whatever the outcome
    if let Err(e) = session.close() {
        log::warn!("Failed to close browser cleanly: {}", e);
    }

    let report = report?;
    log::info!("Run finished with {} entries", report.count());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
