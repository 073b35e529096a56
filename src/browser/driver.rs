//! The browser capability surface consumed by the workflow.
//!
//! Every workflow component receives a `&dyn Driver` explicitly. The driver owns
//! the notion of the "current window"; components that open other windows are
//! responsible for switching back (see [`crate::portal::extract::WindowScope`]).

use crate::browser::locator::Locator;
use crate::dom::{DropdownOption, TableSnapshot};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque identifier of a browser window/tab
pub type WindowHandle = String;

/// Token returned by [`Driver::mark`], later used to test for staleness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMark(pub String);

/// Page geometry for native print-to-PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintGeometry {
    pub landscape: bool,
    pub print_background: bool,
    /// Paper width in inches
    pub paper_width: f64,
    /// Paper height in inches
    pub paper_height: f64,
    /// Symmetric margin in inches
    pub margin: f64,
    pub scale: f64,
    pub prefer_css_page_size: bool,
}

impl Default for PrintGeometry {
    fn default() -> Self {
        // A4
        Self {
            landscape: false,
            print_background: true,
            paper_width: 8.27,
            paper_height: 11.69,
            margin: 0.4,
            scale: 0.9,
            prefer_css_page_size: true,
        }
    }
}

/// Browser operations required by the Index-II workflow
pub trait Driver {
    /// Navigate the current window and wait for the load to finish
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// URL of the current window
    fn current_url(&self) -> Result<String>;

    /// Readiness probe (`document.readyState` is `complete`)
    fn is_document_ready(&self) -> Result<bool>;

    /// Full markup of the current document
    fn page_source(&self) -> Result<String>;

    /// Number of elements matching the locator
    fn count(&self, locator: &Locator) -> Result<usize>;

    /// Whether the first match is rendered
    fn is_displayed(&self, locator: &Locator) -> Result<bool>;

    /// Click the `nth` match
    fn click(&self, locator: &Locator, nth: usize) -> Result<()>;

    /// Clear the first matching input and type `text` into it
    fn fill(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Current value of the first matching input
    fn value_of(&self, locator: &Locator) -> Result<String>;

    /// Visible text of every match
    fn texts(&self, locator: &Locator) -> Result<Vec<String>>;

    /// Options of the first matching `<select>`
    fn options(&self, locator: &Locator) -> Result<Vec<DropdownOption>>;

    /// Select an option by value and fire the change event
    fn select_value(&self, locator: &Locator, value: &str) -> Result<()>;

    /// Currently selected option of the first matching `<select>`
    fn selected_option(&self, locator: &Locator) -> Result<Option<DropdownOption>>;

    /// Snapshot of the first matching table; `action` locates row-level action
    /// controls inside each row
    fn read_table(&self, table: &Locator, action: &Locator) -> Result<Option<TableSnapshot>>;

    /// PNG screenshot of the first matching element
    fn capture_element(&self, locator: &Locator) -> Result<Vec<u8>>;

    /// PNG screenshot of the viewport
    fn capture_page(&self) -> Result<Vec<u8>>;

    /// Evaluate a script in the current window
    fn execute_script(&self, script: &str) -> Result<serde_json::Value>;

    /// Native print-to-PDF of the current window
    fn print_to_pdf(&self, geometry: &PrintGeometry) -> Result<Vec<u8>>;

    /// Handles of every open window
    fn window_handles(&self) -> Result<Vec<WindowHandle>>;

    /// Handle of the window operations currently apply to
    fn current_window(&self) -> Result<WindowHandle>;

    /// Make `handle` the current window
    fn switch_to_window(&self, handle: &str) -> Result<()>;

    /// Close the current window. The caller must switch to another window afterwards.
    fn close_current_window(&self) -> Result<()>;

    /// Tag the first match so that its replacement can be detected later
    fn mark(&self, locator: &Locator) -> Result<Option<ElementMark>>;

    /// Whether the marked element is no longer attached to the live document
    fn is_stale(&self, mark: &ElementMark) -> Result<bool>;

    /// Markup of the `nth` embedded frame, if it exists and is readable
    fn frame_source(&self, frames: &Locator, nth: usize) -> Result<Option<String>>;
}
