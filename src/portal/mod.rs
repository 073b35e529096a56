//! The Index-II retrieval workflow.
//!
//! Components, leaf first:
//! - [`captcha::CaptchaSolver`]: capture, binarize, OCR, normalize
//! - [`form::FormNavigator`]: bootstrap with backoff and the cascading dropdowns
//! - [`submit::SearchSubmitter`]: submit, settle, classify and recover
//! - [`paginate::ResultPaginator`]: row enumeration across grid pages
//! - [`extract::DocumentExtractor`]: per-row document capture in a scoped window
//! - [`orchestrate::Orchestrator`]: sequences all of the above
//!
//! Every component receives the browser through [`PortalContext`]; none of
//! them holds on to it.

pub mod captcha;
pub mod diagnostics;
pub mod extract;
pub mod form;
pub mod model;
pub mod names;
pub mod orchestrate;
pub mod paginate;
pub mod storage;
pub mod submit;

pub use captcha::{CaptchaSolver, OcrEngine, TesseractCli};
pub use diagnostics::Diagnostics;
pub use extract::{DocumentExtractor, WindowScope};
pub use form::{FormNavigator, MatchKind, resolve_option};
pub use model::{
    CaptchaAttempt, CascadeSelection, DownloadOutcome, PropertyInfo, RunOptions, RunReport, SearchCriteria,
    SearchResultRow,
};
pub use orchestrate::Orchestrator;
pub use paginate::{PageRow, ResultPage, ResultPaginator};
pub use storage::{ArtifactStore, FolderArchive, LocalOnly};
pub use submit::{Classification, Observation, SearchSubmitter, SubmitOutcome, classify};

use crate::browser::{Driver, wait_until};
use crate::config::Settings;
use std::time::Duration;

/// Capabilities and settings shared by every workflow component
pub struct PortalContext<'a> {
    pub driver: &'a dyn Driver,
    pub settings: &'a Settings,
    pub ocr: &'a dyn OcrEngine,
    pub store: &'a dyn ArtifactStore,
    pub diagnostics: Diagnostics,
}

impl<'a> PortalContext<'a> {
    pub fn new(driver: &'a dyn Driver, settings: &'a Settings, ocr: &'a dyn OcrEngine, store: &'a dyn ArtifactStore) -> Self {
        let diagnostics = Diagnostics::new(settings.output.diagnostics_dir(), settings.output.save_diagnostics);
        Self { driver, settings, ocr, store, diagnostics }
    }

    /// Bounded wait using the configured poll interval
    pub fn wait<F>(&self, timeout: Duration, condition: F) -> bool
    where
        F: FnMut() -> crate::error::Result<bool>,
    {
        wait_until(timeout, self.settings.timeouts.poll_interval, condition)
    }
}
