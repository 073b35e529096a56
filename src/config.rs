//! Workflow configuration
//!
//! Every tunable of the workflow lives here: the portal address and locator
//! catalogue, the known error codes, all bounded waits, the retry policies, the
//! PDF geometry and the output layout. `Settings::default()` describes the live
//! portal; a TOML file may override any subset of it.

use crate::browser::{Locator, PrintGeometry};
use crate::error::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serialize a `Duration` as whole milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub portal: PortalSettings,
    pub selectors: Selectors,
    pub timeouts: Timeouts,
    pub bootstrap: RetryPolicy,
    pub submit: SubmitPolicy,
    pub captcha: CaptchaSettings,
    pub pdf: PrintGeometry,
    pub output: OutputSettings,
}

impl Settings {
    /// Load settings from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> WorkflowResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkflowError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> WorkflowResult<Self> {
        toml::from_str(content).map_err(|e| WorkflowError::Config(e.to_string()))
    }
}

/// Portal address and the text markers the workflow reacts to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub url: String,

    /// Page content that identifies a browser error page instead of the portal
    pub unreachable_markers: Vec<String>,

    /// Banner code meaning the captcha was read wrong; answered with a free refresh
    pub captcha_mismatch_code: String,

    /// Banner code that may be shown alongside valid results
    pub results_with_error_code: String,

    /// Substring of pager hrefs that carries the page number
    pub page_marker: String,

    /// Label of the pager link that reveals further page links
    pub ellipsis_label: String,

    /// URL fragment of the single-document report page
    pub document_url_marker: String,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            url: "https://freesearchigrservice.maharashtra.gov.in/".to_string(),
            unreachable_markers: vec!["ERR_NAME_NOT_RESOLVED".to_string(), "can't be reached".to_string()],
            captcha_mismatch_code: "1259".to_string(),
            results_with_error_code: "3046".to_string(),
            page_marker: "Page$".to_string(),
            ellipsis_label: "...".to_string(),
            document_url_marker: "isaritaHTMLReportSuchiKramank2".to_string(),
        }
    }
}

/// Locator catalogue. Lists are fallback chains evaluated first-match-wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub interstitial_close: Locator,
    pub entry_point: Locator,
    pub year: Locator,
    pub district: Locator,
    pub taluka: Locator,
    pub village: Locator,
    pub property_number: Locator,
    pub captcha_images: Vec<Locator>,
    pub captcha_input: Locator,
    pub captcha_refresh: Locator,
    pub secondary_captcha_image: Locator,
    pub submit: Vec<Locator>,
    pub loading_indicator: Locator,
    pub error_banner: Locator,
    pub results_grid: Locator,
    pub row_action: Locator,
    pub legacy_actions: Vec<Locator>,
    pub print_controls: Vec<Locator>,
    pub frames: Locator,
}

fn chain(items: &[&str]) -> Vec<Locator> {
    items.iter().map(|s| Locator::from(*s)).collect()
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            interstitial_close: "a.btnclose.btn.btn-danger".into(),
            entry_point: "#btnOtherdistrictSearch".into(),
            year: "#ddlFromYear1".into(),
            district: "#ddlDistrict1".into(),
            taluka: "#ddltahsil".into(),
            village: "#ddlvillage".into(),
            property_number: "#txtAttributeValue1".into(),
            captcha_images: chain(&[
                "#imgCaptcha_new",
                "#imgCaptcha",
                "img[src*='Handler.ashx']",
                "img[src*='captcha']",
                "img[src*='Captcha']",
                "img[id*='captcha']",
            ]),
            captcha_input: "#txtImg1".into(),
            captcha_refresh: "#btnRefreshCaptcha".into(),
            secondary_captcha_image: "#imgCaptcha_new".into(),
            submit: chain(&[
                "#btnSearch_RestMaha",
                "input[value='Search']",
                "input[value*='Search']",
                "input[onclick*='Search']",
                "button[onclick*='Search']",
                "//input[contains(@value, 'Search')]",
                "//button[contains(text(), 'Search')]",
            ]),
            loading_indicator: "//img[@src='Images/ajax-loader1.gif']".into(),
            error_banner: "span[style*='color:Red']".into(),
            results_grid: "#RegistrationGrid".into(),
            row_action: "input[value='IndexII']".into(),
            legacy_actions: chain(&[
                "input[value='IndexII']",
                "//*[contains(text(),'IndexII') or contains(@value,'IndexII')]",
            ]),
            print_controls: chain(&[
                "#btnPrint",
                "#ContentPlaceHolder1_btnPrint",
                "//input[@value='Print']",
                "//button[contains(text(), 'Print')]",
                "button.print-button",
                "a.print-button",
                "[onclick*='print']",
            ]),
            frames: "iframe".into(),
        }
    }
}

/// Bounds of every wait and settle delay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    #[serde(with = "duration_ms")]
    pub page_load: Duration,
    #[serde(with = "duration_ms")]
    pub document_ready: Duration,
    #[serde(with = "duration_ms")]
    pub interstitial: Duration,
    #[serde(with = "duration_ms")]
    pub entry_point: Duration,
    #[serde(with = "duration_ms")]
    pub form_ready: Duration,
    #[serde(with = "duration_ms")]
    pub cascade_ready: Duration,
    #[serde(with = "duration_ms")]
    pub cascade_settle: Duration,
    #[serde(with = "duration_ms")]
    pub village_settle: Duration,
    #[serde(with = "duration_ms")]
    pub field_settle: Duration,
    #[serde(with = "duration_ms")]
    pub post_submit_settle: Duration,
    #[serde(with = "duration_ms")]
    pub secondary_captcha_settle: Duration,
    #[serde(with = "duration_ms")]
    pub captcha_refresh_settle: Duration,
    #[serde(with = "duration_ms")]
    pub loader_appear: Duration,
    #[serde(with = "duration_ms")]
    pub loader_disappear: Duration,
    #[serde(with = "duration_ms")]
    pub results: Duration,
    #[serde(with = "duration_ms")]
    pub new_window: Duration,
    #[serde(with = "duration_ms")]
    pub staleness: Duration,
    #[serde(with = "duration_ms")]
    pub grid_ready: Duration,
    #[serde(with = "duration_ms")]
    pub page_settle: Duration,
    #[serde(with = "duration_ms")]
    pub row_settle: Duration,
    #[serde(with = "duration_ms")]
    pub return_settle: Duration,
    #[serde(with = "duration_ms")]
    pub print_dialog: Duration,
    #[serde(with = "duration_ms")]
    pub document_url: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            poll_interval: ms(500),
            page_load: ms(120_000),
            document_ready: ms(60_000),
            interstitial: ms(10_000),
            entry_point: ms(20_000),
            form_ready: ms(30_000),
            cascade_ready: ms(30_000),
            cascade_settle: ms(3_000),
            village_settle: ms(10_000),
            field_settle: ms(3_000),
            post_submit_settle: ms(10_000),
            secondary_captcha_settle: ms(40_000),
            captcha_refresh_settle: ms(2_000),
            loader_appear: ms(10_000),
            loader_disappear: ms(120_000),
            results: ms(30_000),
            new_window: ms(30_000),
            staleness: ms(30_000),
            grid_ready: ms(30_000),
            page_settle: ms(3_000),
            row_settle: ms(1_000),
            return_settle: ms(2_000),
            print_dialog: ms(5_000),
            document_url: ms(60_000),
        }
    }
}

impl Timeouts {
    /// Every wait reduced to a single probe and every settle delay removed
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            page_load: Duration::from_millis(1),
            document_ready: Duration::ZERO,
            interstitial: Duration::ZERO,
            entry_point: Duration::ZERO,
            form_ready: Duration::ZERO,
            cascade_ready: Duration::ZERO,
            cascade_settle: Duration::ZERO,
            village_settle: Duration::ZERO,
            field_settle: Duration::ZERO,
            post_submit_settle: Duration::ZERO,
            secondary_captcha_settle: Duration::ZERO,
            captcha_refresh_settle: Duration::ZERO,
            loader_appear: Duration::ZERO,
            loader_disappear: Duration::ZERO,
            results: Duration::ZERO,
            new_window: Duration::ZERO,
            staleness: Duration::ZERO,
            grid_ready: Duration::ZERO,
            page_settle: Duration::ZERO,
            row_settle: Duration::ZERO,
            return_settle: Duration::ZERO,
            print_dialog: Duration::ZERO,
            document_url: Duration::ZERO,
        }
    }
}

/// Exponential backoff retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { initial_delay: Duration::from_secs(10), max_delay: Duration::from_secs(60), max_attempts: 3 }
    }
}

/// Bounds of the submit loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitPolicy {
    /// Outer attempts before the search is declared failed
    pub max_attempts: u32,

    /// Free captcha refreshes allowed inside one attempt
    pub max_captcha_refreshes: u32,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, max_captcha_refreshes: 5 }
    }
}

/// Captcha preprocessing and OCR options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaSettings {
    /// Pixels darker than this luminance become black, the rest white
    pub threshold: u8,

    /// Tesseract executable
    pub tesseract: PathBuf,

    /// Characters the OCR engine may emit
    pub whitelist: String,
}

impl Default for CaptchaSettings {
    fn default() -> Self {
        Self {
            threshold: 140,
            tesseract: PathBuf::from("tesseract"),
            whitelist: "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789".to_string(),
        }
    }
}

/// Where artifacts and diagnostics are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub downloads_dir: PathBuf,

    /// Defaults to `<downloads_dir>/diagnostics`
    pub diagnostics_dir: Option<PathBuf>,

    /// Persist screenshots and markup at fatal conditions and captcha debug images
    pub save_diagnostics: bool,

    /// Artifacts at or below this size are rejected
    pub min_artifact_bytes: u64,

    /// Upper bound on result pages walked in one run
    pub max_pages: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            diagnostics_dir: None,
            save_diagnostics: true,
            min_artifact_bytes: 1000,
            max_pages: 500,
        }
    }
}

impl OutputSettings {
    pub fn diagnostics_dir(&self) -> PathBuf {
        self.diagnostics_dir.clone().unwrap_or_else(|| self.downloads_dir.join("diagnostics"))
    }
}
