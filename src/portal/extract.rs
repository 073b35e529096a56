//! Per-document capture.
//!
//! A row's action control usually opens the document in a new window. That
//! window lives inside a [`WindowScope`], which closes it and switches back to
//! the results window on every exit path, including errors and panics.

use crate::browser::{Driver, Locator, WindowHandle, first_present, settle};
use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::PortalContext;
use crate::portal::model::{CascadeSelection, DownloadOutcome, PropertyInfo, SearchCriteria};
use crate::portal::names;
use crate::portal::paginate::PageRow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Guard over a window opened by a click.
///
/// On drop the opened window (if any) is closed and the original window becomes
/// current again.
pub struct WindowScope<'d> {
    driver: &'d dyn Driver,
    original: WindowHandle,
    opened: Option<WindowHandle>,
}

impl<'d> WindowScope<'d> {
    /// Run `trigger` and switch to the window it opens, if one opens within the `new_window` timeout
    pub fn open<F>(ctx: &PortalContext<'d>, trigger: F) -> WorkflowResult<Self>
    where
        F: FnOnce() -> crate::error::Result<()>,
    {
        let driver = ctx.driver;
        let original = driver.current_window()?;
        let before: HashSet<WindowHandle> = driver.window_handles()?.into_iter().collect();

        trigger()?;

        let mut opened = None;
        ctx.wait(ctx.settings.timeouts.new_window, || {
            opened = driver.window_handles()?.into_iter().find(|handle| !before.contains(handle));
            Ok(opened.is_some())
        });

        let scope = Self { driver, original, opened };
        match &scope.opened {
            Some(handle) => {
                driver.switch_to_window(handle)?;
                log::info!("Switched to new window {}", handle);
            }
            None => log::info!("No new window opened, continuing in the current one"),
        }
        Ok(scope)
    }
}

impl Drop for WindowScope<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.opened.take() {
            let closed = self.driver.switch_to_window(&handle).and_then(|_| self.driver.close_current_window());
            if let Err(e) = closed {
                log::warn!("Failed to close window {}: {}", handle, e);
            }
        }
        if let Err(e) = self.driver.switch_to_window(&self.original) {
            log::error!("Failed to switch back to window {}: {}", self.original, e);
        }
    }
}

pub struct DocumentExtractor;

impl DocumentExtractor {
    /// Extract the document behind one results row. Never fails; failures become outcomes.
    pub fn extract_row(
        &self,
        ctx: &PortalContext<'_>,
        criteria: &SearchCriteria,
        selection: &CascadeSelection,
        row: &PageRow,
    ) -> DownloadOutcome {
        let info = PropertyInfo::for_row(criteria, selection, &row.record);
        let file_name = names::artifact_file_name(&info, "pdf");
        log::info!("Extracting document {} (page {})", info.property_number, row.record.page);

        let Some(action_index) = row.action_index else {
            log::warn!("No action control in row for document {}", row.record.doc_number);
            return DownloadOutcome::failed(&info, file_name, None, "row has no action control");
        };

        let action = &ctx.settings.selectors.row_action;
        let outcome = self
            .within_opened_window(ctx, &info, || ctx.driver.click(action, action_index))
            .unwrap_or_else(|e| {
                log::error!("Extraction of {} failed: {}", info.property_number, e);
                DownloadOutcome::failed(&info, file_name, None, e.to_string())
            });

        self.return_to_results(ctx);
        outcome
    }

    /// Extract the single document reached through `control` when the results have no per-row actions
    pub fn extract_single(&self, ctx: &PortalContext<'_>, info: &PropertyInfo, control: &Locator) -> WorkflowResult<DownloadOutcome> {
        log::info!("Opening document via {}", control);
        self.within_opened_window(ctx, info, || ctx.driver.click(control, 0))
    }

    fn within_opened_window<F>(&self, ctx: &PortalContext<'_>, info: &PropertyInfo, trigger: F) -> WorkflowResult<DownloadOutcome>
    where
        F: FnOnce() -> crate::error::Result<()>,
    {
        let _scope = WindowScope::open(ctx, trigger)?;

        let marker = &ctx.settings.portal.document_url_marker;
        if !ctx.wait(ctx.settings.timeouts.document_url, || Ok(ctx.driver.current_url()?.contains(marker.as_str()))) {
            log::debug!("Document URL does not contain {}", marker);
        }
        if !ctx.wait(ctx.settings.timeouts.document_ready, || ctx.driver.is_document_ready()) {
            log::warn!("Document page did not finish loading");
        }

        self.capture(ctx, info)
    }

    /// Render the current window into the artifact directory of `info`
    pub fn capture(&self, ctx: &PortalContext<'_>, info: &PropertyInfo) -> WorkflowResult<DownloadOutcome> {
        let dir = names::artifact_dir(&ctx.settings.output.downloads_dir, info);
        std::fs::create_dir_all(&dir)?;

        let pdf_name = names::artifact_file_name(info, "pdf");
        let pdf_path = dir.join(&pdf_name);

        match self.render_pdf(ctx) {
            Ok(bytes) => {
                std::fs::write(&pdf_path, &bytes)?;
                log::info!("Saved PDF {}", pdf_path.display());
                Ok(self.accept(ctx, info, &dir, &pdf_path, &pdf_name))
            }
            Err(e) => {
                log::warn!("Native PDF rendering failed: {}", e);
                self.fallback(ctx, info, &dir)
            }
        }
    }

    fn render_pdf(&self, ctx: &PortalContext<'_>) -> WorkflowResult<Vec<u8>> {
        let bytes = ctx.driver.print_to_pdf(&ctx.settings.pdf)?;
        if bytes.is_empty() {
            return Err(WorkflowError::ExtractionFailure("renderer returned no data".to_string()));
        }
        Ok(bytes)
    }

    /// Keep the artifact only if it is big enough, then hand it to the store
    fn accept(&self, ctx: &PortalContext<'_>, info: &PropertyInfo, dir: &Path, path: &Path, file_name: &str) -> DownloadOutcome {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let local = path.exists().then(|| path.display().to_string());

        if size <= ctx.settings.output.min_artifact_bytes {
            log::warn!("Artifact {} is too small ({} bytes)", path.display(), size);
            self.salvage_frame(ctx, info, dir);
            return DownloadOutcome::failed(info, file_name, local, format!("artifact too small ({} bytes)", size));
        }

        match ctx.store.archive(path, info) {
            Ok(id) => DownloadOutcome::succeeded(info, file_name, id),
            Err(e) => {
                log::error!("Archiving {} failed: {}", path.display(), e);
                DownloadOutcome::failed(info, file_name, local, e.to_string())
            }
        }
    }

    /// Print control, then the generic print call, then the raw markup as HTML
    fn fallback(&self, ctx: &PortalContext<'_>, info: &PropertyInfo, dir: &Path) -> WorkflowResult<DownloadOutcome> {
        let driver = ctx.driver;

        match first_present(driver, &ctx.settings.selectors.print_controls) {
            Some(control) => {
                log::info!("Clicking print control {}", control);
                if let Err(e) = driver.click(control, 0) {
                    log::warn!("Print control click failed: {}", e);
                }
            }
            None => {
                log::info!("No print control found, invoking window.print()");
                if let Err(e) = driver.execute_script("window.print();") {
                    log::warn!("window.print() failed: {}", e);
                }
            }
        }
        settle(ctx.settings.timeouts.print_dialog);

        // A print dialog produces nothing readable here; keep the markup instead
        let html_name = names::artifact_file_name(info, "html");
        let html_path: PathBuf = dir.join(&html_name);
        let markup = driver.page_source()?;
        std::fs::write(&html_path, markup)?;
        log::warn!("Saved page markup to {} instead of a PDF", html_path.display());

        self.salvage_frame(ctx, info, dir);
        Ok(DownloadOutcome::failed(
            info,
            html_name,
            Some(html_path.display().to_string()),
            "PDF rendering failed; page markup saved instead",
        ))
    }

    /// Save the markup of the first embedded frame next to the failed artifact
    fn salvage_frame(&self, ctx: &PortalContext<'_>, info: &PropertyInfo, dir: &Path) {
        match ctx.driver.frame_source(&ctx.settings.selectors.frames, 0) {
            Ok(Some(markup)) => {
                let path = dir.join(names::frame_file_name(info));
                match std::fs::write(&path, markup) {
                    Ok(()) => log::info!("Saved frame content to {}", path.display()),
                    Err(e) => log::warn!("Failed to save frame content: {}", e),
                }
            }
            Ok(None) => log::debug!("No readable frame to salvage"),
            Err(e) => log::debug!("Frame lookup failed: {}", e),
        }
    }

    /// Re-confirm the results grid after coming back from a document
    fn return_to_results(&self, ctx: &PortalContext<'_>) {
        let timeouts = &ctx.settings.timeouts;
        settle(timeouts.return_settle);
        let grid = &ctx.settings.selectors.results_grid;
        if !ctx.wait(timeouts.grid_ready, || Ok(ctx.driver.count(grid)? > 0)) {
            log::warn!("Results grid not visible after returning from the document");
        }
        settle(timeouts.row_settle);
    }
}
