//! Search submission state machine.
//!
//! One outer attempt walks FillingForm → Submitted → AwaitingLoad (with the
//! secondary captcha check) → AwaitingResults → Classifying. Captcha mismatch
//! banners are answered in place with a refresh that does not use up an
//! attempt; everything else that is not a success ends the attempt.

use crate::browser::{first_present, settle};
use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::PortalContext;
use crate::portal::captcha::CaptchaSolver;
use crate::portal::model::SearchCriteria;

/// What the page showed once results settled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Texts of the error banners, in document order
    pub banners: Vec<String>,
    /// Row-level action controls on the page
    pub action_controls: usize,
    /// Rows of the results grid, header included; `None` without a grid
    pub grid_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Captcha was read wrong; refresh it and resubmit within the same attempt
    RefreshCaptcha,
    /// End this attempt, carrying the observed cause
    Retry(String),
}

/// Decide the outcome of one submit from what the page shows.
///
/// Only the first non-empty banner is matched against the known codes. The
/// results-with-error code counts as success only when action controls were
/// rendered alongside it.
pub fn classify(observation: &Observation, captcha_mismatch_code: &str, results_with_error_code: &str) -> Classification {
    let banners: Vec<&str> = observation.banners.iter().map(|b| b.trim()).filter(|b| !b.is_empty()).collect();

    if let Some(first) = banners.first() {
        if first.contains(captcha_mismatch_code) {
            return Classification::RefreshCaptcha;
        }
        if first.contains(results_with_error_code) && observation.action_controls > 0 {
            return Classification::Success;
        }
        return Classification::Retry(format!("Search error: {}", banners.join(", ")));
    }

    if observation.action_controls > 0 {
        return Classification::Success;
    }

    match observation.grid_rows {
        Some(rows) if rows > 1 => Classification::Success,
        Some(_) => Classification::Retry("results grid has no data rows".to_string()),
        None => Classification::Retry("neither results nor an error were shown".to_string()),
    }
}

/// Result of a successful search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub attempts_used: u32,
    pub captcha_refreshes: u32,
}

enum Submitted {
    Clicked,
    /// No submit control, but results are already on the page
    ResultsAlreadyShown,
}

pub struct SearchSubmitter;

impl SearchSubmitter {
    /// Submit the filled form until the portal shows results or attempts run out
    pub fn submit(&self, ctx: &PortalContext<'_>, criteria: &SearchCriteria) -> WorkflowResult<SubmitOutcome> {
        let max_attempts = ctx.settings.submit.max_attempts.max(1);
        let mut refreshes = 0;
        let mut last_cause = String::new();

        for attempt in 1..=max_attempts {
            log::info!("Search attempt {}/{}", attempt, max_attempts);

            match self.attempt(ctx, criteria, &mut refreshes) {
                Ok(()) => {
                    log::info!("Search succeeded on attempt {}", attempt);
                    return Ok(SubmitOutcome { attempts_used: attempt, captcha_refreshes: refreshes });
                }
                Err(WorkflowError::TransientPortal(cause)) => {
                    log::warn!("Attempt {} needs a retry: {}", attempt, cause);
                    last_cause = cause;
                }
                Err(e) => {
                    log::warn!("Attempt {} failed: {}", attempt, e);
                    ctx.diagnostics.snapshot(ctx.driver, &format!("search_error_attempt_{}", attempt));
                    last_cause = e.to_string();
                }
            }
        }

        log::error!("Search failed after {} attempts", max_attempts);
        ctx.diagnostics.snapshot(ctx.driver, "search_failed");
        Err(WorkflowError::Fatal(format!(
            "search failed after {} attempts; last error: {}",
            max_attempts, last_cause
        )))
    }

    /// One outer attempt. [`WorkflowError::TransientPortal`] asks for another one.
    fn attempt(&self, ctx: &PortalContext<'_>, criteria: &SearchCriteria, total_refreshes: &mut u32) -> WorkflowResult<()> {
        let settings = ctx.settings;
        self.revalidate(ctx, criteria)?;

        let mut refreshes = 0;
        loop {
            if let Submitted::ResultsAlreadyShown = self.click_submit(ctx)? {
                log::info!("Row actions already present, treating search as complete");
                return Ok(());
            }

            self.await_load(ctx);
            if !self.await_results(ctx) {
                ctx.diagnostics.snapshot(ctx.driver, "results_timeout");
                return Err(WorkflowError::TransientPortal("timed out waiting for results".to_string()));
            }

            let observation = self.observe(ctx)?;
            log::debug!("Observed {:?}", observation);
            match classify(&observation, &settings.portal.captcha_mismatch_code, &settings.portal.results_with_error_code) {
                Classification::Success => return Ok(()),
                Classification::Retry(cause) => return Err(WorkflowError::TransientPortal(cause)),
                Classification::RefreshCaptcha if refreshes < settings.submit.max_captcha_refreshes => {
                    refreshes += 1;
                    *total_refreshes += 1;
                    log::info!("Captcha rejected, refreshing ({}/{})", refreshes, settings.submit.max_captcha_refreshes);
                    self.refresh_captcha(ctx)?;
                }
                Classification::RefreshCaptcha => {
                    return Err(WorkflowError::TransientPortal(format!(
                        "captcha still rejected after {} refreshes",
                        refreshes
                    )));
                }
            }
        }
    }

    /// The portal sometimes clears fields between submits
    fn revalidate(&self, ctx: &PortalContext<'_>, criteria: &SearchCriteria) -> WorkflowResult<()> {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;

        if driver.value_of(&selectors.property_number)?.trim().is_empty() {
            log::warn!("Property number field is empty, refilling");
            driver.fill(&selectors.property_number, &criteria.property_number)?;
        }

        if driver.value_of(&selectors.captcha_input)?.trim().is_empty() {
            log::warn!("Captcha field is empty, solving a new captcha");
            let captcha = CaptchaSolver.solve(ctx);
            driver.fill(&selectors.captcha_input, &captcha.text)?;
        }
        Ok(())
    }

    fn click_submit(&self, ctx: &PortalContext<'_>) -> WorkflowResult<Submitted> {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;

        match first_present(driver, &selectors.submit) {
            Some(button) => {
                driver.click(button, 0)?;
                log::info!("Clicked search via {}", button);
                Ok(Submitted::Clicked)
            }
            None if driver.count(&selectors.row_action)? > 0 => Ok(Submitted::ResultsAlreadyShown),
            None => Err(WorkflowError::ElementNotFound("no search control and no results displayed".to_string())),
        }
    }

    /// Settle, then answer a secondary captcha if the portal injected one
    fn await_load(&self, ctx: &PortalContext<'_>) {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;
        settle(ctx.settings.timeouts.post_submit_settle);

        let secondary = driver.is_displayed(&selectors.secondary_captcha_image).unwrap_or(false)
            && driver.is_displayed(&selectors.captcha_input).unwrap_or(false);
        if !secondary {
            return;
        }

        log::info!("Secondary captcha detected, solving it");
        let captcha = CaptchaSolver.solve(ctx);
        let resubmitted = driver.fill(&selectors.captcha_input, &captcha.text).and_then(|_| {
            match first_present(driver, &selectors.submit) {
                Some(button) => driver.click(button, 0),
                None => Ok(()),
            }
        });
        match resubmitted {
            Ok(()) => settle(ctx.settings.timeouts.secondary_captcha_settle),
            Err(e) => log::warn!("Could not submit secondary captcha: {}", e),
        }
    }

    /// Loader appear/disappear are advisory; returns whether any terminal state showed up
    fn await_results(&self, ctx: &PortalContext<'_>) -> bool {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;
        let timeouts = &ctx.settings.timeouts;

        if !ctx.wait(timeouts.loader_appear, || Ok(driver.count(&selectors.loading_indicator)? > 0)) {
            log::debug!("Loading indicator did not appear");
        }
        if !ctx.wait(timeouts.loader_disappear, || Ok(!driver.is_displayed(&selectors.loading_indicator)?)) {
            log::warn!("Loading indicator did not disappear within {:?}", timeouts.loader_disappear);
        }

        ctx.wait(timeouts.results, || {
            Ok(driver.count(&selectors.results_grid)? > 0
                || driver.count(&selectors.error_banner)? > 0
                || driver.count(&selectors.row_action)? > 0)
        })
    }

    fn observe(&self, ctx: &PortalContext<'_>) -> WorkflowResult<Observation> {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;

        let banners = driver.texts(&selectors.error_banner)?;
        let action_controls = driver.count(&selectors.row_action)?;
        let grid_rows = if driver.count(&selectors.results_grid)? > 0 {
            driver.read_table(&selectors.results_grid, &selectors.row_action)?.map(|table| table.row_count())
        } else {
            None
        };

        Ok(Observation { banners, action_controls, grid_rows })
    }

    fn refresh_captcha(&self, ctx: &PortalContext<'_>) -> WorkflowResult<()> {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;

        if let Err(e) = driver.click(&selectors.captcha_refresh, 0) {
            log::warn!("Captcha refresh control unavailable: {}", e);
        }
        settle(ctx.settings.timeouts.captcha_refresh_settle);

        let captcha = CaptchaSolver.solve(ctx);
        driver.fill(&selectors.captcha_input, &captcha.text)?;
        Ok(())
    }
}
