//! Best-effort diagnostic snapshots.
//!
//! Nothing here ever returns an error: a failed snapshot is logged and the
//! caller carries on with whatever it was doing.

use crate::browser::Driver;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: PathBuf,
    enabled: bool,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self { dir: dir.into(), enabled }
    }

    /// Persist a screenshot and the markup of the current window as `{label}.png` / `{label}.html`
    pub fn snapshot(&self, driver: &dyn Driver, label: &str) {
        if !self.enabled {
            return;
        }

        match driver.capture_page() {
            Ok(png) => self.save_bytes(&format!("{}.png", label), &png),
            Err(e) => log::debug!("Snapshot {} screenshot unavailable: {}", label, e),
        }
        match driver.page_source() {
            Ok(html) => self.save_bytes(&format!("{}.html", label), html.as_bytes()),
            Err(e) => log::debug!("Snapshot {} markup unavailable: {}", label, e),
        }
    }

    /// Write `bytes` to `{dir}/{name}`
    pub fn save_bytes(&self, name: &str, bytes: &[u8]) {
        if !self.enabled {
            return;
        }

        let path = self.dir.join(name);
        let written = std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, bytes));
        match written {
            Ok(()) => log::debug!("Saved diagnostic {}", path.display()),
            Err(e) => log::warn!("Failed to save diagnostic {}: {}", path.display(), e),
        }
    }
}
