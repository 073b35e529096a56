use crate::browser::{Locator, first_present};
use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::PortalContext;
use crate::portal::extract::DocumentExtractor;
use crate::portal::form::FormNavigator;
use crate::portal::model::{CascadeSelection, PropertyInfo, RunOptions, RunReport, SearchCriteria, SearchResultRow};
use crate::portal::paginate::ResultPaginator;
use crate::portal::submit::SearchSubmitter;
use std::path::PathBuf;

/// Runs one search from the landing page to the final report
pub struct Orchestrator<'a> {
    ctx: PortalContext<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: PortalContext<'a>) -> Self {
        Self { ctx }
    }

    /// Bootstrap, fill, submit, then enumerate or extract according to `options`
    pub fn run(&self, criteria: &SearchCriteria, options: RunOptions) -> WorkflowResult<RunReport> {
        criteria.validate()?;
        log::info!(
            "Starting {} for property {}",
            if options.navigation_only { "navigation run" } else { "download run" },
            criteria.property_number
        );

        let result = self.run_steps(criteria, options);
        if let Err(e) = &result {
            log::error!("Run aborted: {}", e);
            self.ctx.diagnostics.snapshot(self.ctx.driver, "run_aborted");
        }
        result
    }

    fn run_steps(&self, criteria: &SearchCriteria, options: RunOptions) -> WorkflowResult<RunReport> {
        let ctx = &self.ctx;

        FormNavigator.bootstrap(ctx)?;
        let filled = FormNavigator.fill(ctx, criteria)?;
        let submitted = SearchSubmitter.submit(ctx, criteria)?;
        log::info!(
            "Search completed after {} attempt(s), {} captcha refresh(es)",
            submitted.attempts_used,
            submitted.captcha_refreshes
        );

        let selection = self.current_selection().unwrap_or(filled);

        if options.navigation_only {
            let records = ResultPaginator.enumerate(ctx)?;
            let results_file = self.persist_records(&records);
            return Ok(RunReport::Navigation { records, results_file });
        }

        let action_controls = ctx.driver.count(&ctx.settings.selectors.row_action)?;
        if options.download_all || action_controls > 0 {
            log::info!("Downloading every row ({} action controls on the first page)", action_controls);
            let mut outcomes = Vec::new();
            ResultPaginator.walk(ctx, |page| {
                for row in &page.rows {
                    outcomes.push(DocumentExtractor.extract_row(ctx, criteria, &selection, row));
                }
                Ok(())
            })?;
            let succeeded = outcomes.iter().filter(|o| o.success).count();
            log::info!("Extracted {}/{} documents", succeeded, outcomes.len());
            return Ok(RunReport::Downloads { outcomes });
        }

        log::info!("No row actions found, trying the single-document path");
        let control = first_present(ctx.driver, &ctx.settings.selectors.legacy_actions)
            .ok_or_else(|| WorkflowError::Fatal("no action controls and no document link in the results".to_string()))?;
        let info = PropertyInfo::for_criteria(criteria, &selection);
        let outcome = DocumentExtractor.extract_single(ctx, &info, control)?;
        Ok(RunReport::Downloads { outcomes: vec![outcome] })
    }

    /// Labels shown in the dropdowns now; the portal keeps them after a search
    fn current_selection(&self) -> Option<CascadeSelection> {
        let driver = self.ctx.driver;
        let selectors = &self.ctx.settings.selectors;
        let label = |locator: &Locator| -> Option<String> {
            driver
                .selected_option(locator)
                .ok()
                .flatten()
                .filter(|o| !o.is_placeholder())
                .map(|o| o.label.trim().to_string())
        };

        Some(CascadeSelection {
            district: label(&selectors.district)?,
            taluka: label(&selectors.taluka)?,
            village: label(&selectors.village)?,
        })
    }

    /// Write the enumerated records as pretty JSON; failures are logged only
    fn persist_records(&self, records: &[SearchResultRow]) -> Option<String> {
        let dir = &self.ctx.settings.output.downloads_dir;
        let path: PathBuf = dir.join("navigation_results.json");

        let written = std::fs::create_dir_all(dir)
            .map_err(WorkflowError::from)
            .and_then(|_| Ok(serde_json::to_string_pretty(records)?))
            .and_then(|json| Ok(std::fs::write(&path, json)?));

        match written {
            Ok(()) => {
                log::info!("Saved {} records to {}", records.len(), path.display());
                Some(path.display().to_string())
            }
            Err(e) => {
                log::warn!("Failed to save navigation results: {}", e);
                None
            }
        }
    }
}
