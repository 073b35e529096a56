//! # index2-fetch
//!
//! Browser automation that retrieves Index-II property registration documents
//! from the IGR Maharashtra free search portal, a session-bound HTML workflow
//! with no programmatic API.
//!
//! ## Features
//!
//! - **Resilient navigation**: bootstrap with exponential backoff, cascading dropdowns resolved by name
//! - **Captcha solving**: grayscale + threshold preprocessing, OCR through Tesseract
//! - **Submit state machine**: secondary captcha handling and portal error-code recovery
//! - **Pagination**: walks the results grid without holding element references across re-renders
//! - **Document capture**: native print-to-PDF in a scoped window, with print/markup fallbacks
//!
//! ## Command Line
//!
//! ```bash
//! index2-fetch --year 2015 --district पुणे --taluka हवेली --village भोर --property-number 123
//!
//! # Only list the rows of every result page
//! index2-fetch --year 2015 --district पुणे --taluka हवेली --village भोर --property-number 123 --navigation-only
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use index2_fetch::{BrowserSession, LaunchOptions, Settings};
//! use index2_fetch::portal::{LocalOnly, Orchestrator, PortalContext, RunOptions, SearchCriteria, TesseractCli};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let settings = Settings::default();
//! let ocr = TesseractCli::new(&settings.captcha.tesseract, settings.captcha.whitelist.clone());
//!
//! let ctx = PortalContext::new(&session, &settings, &ocr, &LocalOnly);
//! let criteria = SearchCriteria::new("2015", "पुणे", "हवेली", "भोर", "123")?;
//! let report = Orchestrator::new(ctx).run(&criteria, RunOptions::default())?;
//! println!("{} documents", report.count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: the [`Driver`] capability trait, locators, bounded waits and the Chrome session
//! - [`dom`]: page-side read scripts and the table/dropdown snapshots they return
//! - [`portal`]: the retrieval workflow components
//! - [`config`]: all tunables, loadable from TOML
//! - [`error`]: error types and result aliases

pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod portal;

pub use browser::{BrowserSession, ConnectionOptions, Driver, LaunchOptions, Locator};
pub use config::Settings;
pub use dom::{DropdownOption, TableSnapshot};
pub use error::{BrowserError, Result, WorkflowError, WorkflowResult};
pub use portal::{Orchestrator, PortalContext, RunOptions, RunReport, SearchCriteria};
