//! Page bootstrap and the cascading search form

use crate::browser::{Backoff, Locator, settle};
use crate::dom::DropdownOption;
use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::PortalContext;
use crate::portal::captcha::CaptchaSolver;
use crate::portal::model::{CascadeSelection, SearchCriteria};

/// How a dropdown option was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Trimmed label equals the wanted name
    Exact,
    /// Label contains the wanted name, ignoring case
    Substring,
    /// Nothing matched; first real option
    FirstAvailable,
}

/// Pick the option for `wanted`: exact label, then case-insensitive substring,
/// then the first real option. Placeholders are never chosen.
pub fn resolve_option<'o>(options: &'o [DropdownOption], wanted: &str) -> Option<(&'o DropdownOption, MatchKind)> {
    let wanted = wanted.trim();
    let real = || options.iter().filter(|o| !o.is_placeholder());

    if !wanted.is_empty() {
        if let Some(option) = real().find(|o| o.label.trim() == wanted) {
            return Some((option, MatchKind::Exact));
        }

        let lowered = wanted.to_lowercase();
        if let Some(option) = real().find(|o| o.label.trim().to_lowercase().contains(&lowered)) {
            return Some((option, MatchKind::Substring));
        }
    }

    real().next().map(|option| (option, MatchKind::FirstAvailable))
}

/// Drives the portal from its landing page to a filled search form
pub struct FormNavigator;

impl FormNavigator {
    /// Load the portal and open the search form, retrying with exponential backoff
    pub fn bootstrap(&self, ctx: &PortalContext<'_>) -> WorkflowResult<()> {
        let policy = &ctx.settings.bootstrap;
        let attempts = policy.max_attempts.max(1);
        let mut backoff = Backoff::new(policy.initial_delay, policy.max_delay);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = backoff.next_delay();
                log::info!("Waiting {:?} before retrying the portal", delay);
                settle(delay);
            }

            log::info!("Loading {} (attempt {}/{})", ctx.settings.portal.url, attempt, attempts);
            match self.try_bootstrap(ctx) {
                Ok(()) => {
                    log::info!("Search form loaded");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Bootstrap attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                }
            }
        }

        log::error!("Portal unavailable after {} attempts", attempts);
        ctx.diagnostics.snapshot(ctx.driver, "bootstrap_failure");
        Err(WorkflowError::NavigationTimeout(format!(
            "search form not reachable after {} attempts: {}",
            attempts, last_error
        )))
    }

    fn try_bootstrap(&self, ctx: &PortalContext<'_>) -> WorkflowResult<()> {
        let driver = ctx.driver;
        let timeouts = &ctx.settings.timeouts;
        let selectors = &ctx.settings.selectors;

        driver.navigate(&ctx.settings.portal.url, timeouts.page_load)?;
        if !ctx.wait(timeouts.document_ready, || driver.is_document_ready()) {
            return Err(WorkflowError::NavigationTimeout("document never became ready".to_string()));
        }

        self.dismiss_interstitial(ctx);

        let source = driver.page_source()?;
        if let Some(marker) = ctx.settings.portal.unreachable_markers.iter().find(|m| source.contains(m.as_str())) {
            return Err(WorkflowError::NavigationTimeout(format!("error page detected ({})", marker)));
        }

        self.open_entry_point(ctx)?;

        if !ctx.wait(timeouts.form_ready, || Ok(driver.count(&selectors.year)? > 0)) {
            return Err(WorkflowError::NavigationTimeout(format!("{} never appeared", selectors.year)));
        }
        Ok(())
    }

    /// Close the announcement dialog if one shows up; its absence is fine
    fn dismiss_interstitial(&self, ctx: &PortalContext<'_>) {
        let close = &ctx.settings.selectors.interstitial_close;
        if !ctx.wait(ctx.settings.timeouts.interstitial, || ctx.driver.is_displayed(close)) {
            log::debug!("No interstitial dialog");
            return;
        }
        match ctx.driver.click(close, 0) {
            Ok(()) => log::info!("Closed interstitial dialog"),
            Err(e) => log::warn!("Could not close interstitial dialog: {}", e),
        }
    }

    fn open_entry_point(&self, ctx: &PortalContext<'_>) -> WorkflowResult<()> {
        let driver = ctx.driver;
        let entry = &ctx.settings.selectors.entry_point;

        if !ctx.wait(ctx.settings.timeouts.entry_point, || Ok(driver.count(entry)? > 0)) {
            return Err(WorkflowError::ElementNotFound(entry.to_string()));
        }

        if let Err(e) = driver.click(entry, 0) {
            log::warn!("Click on {} failed ({}), trying script click", entry, e);
            driver.execute_script(&format!("{}[0].click()", entry.js_nodes()))?;
        }
        Ok(())
    }

    /// Fill year, cascade, property number and captcha. Returns the labels actually selected.
    pub fn fill(&self, ctx: &PortalContext<'_>, criteria: &SearchCriteria) -> WorkflowResult<CascadeSelection> {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;
        let timeouts = &ctx.settings.timeouts;

        log::info!("Filling search form for property {}", criteria.property_number);

        let years = driver.options(&selectors.year)?;
        let year = years
            .iter()
            .find(|o| o.value.trim() == criteria.year)
            .ok_or_else(|| WorkflowError::ElementNotFound(format!("year {} in {}", criteria.year, selectors.year)))?;
        driver.select_value(&selectors.year, &year.value)?;
        settle(timeouts.field_settle);

        let district = self.select_level(ctx, &selectors.district, &criteria.district, Some(&selectors.taluka))?;
        let taluka = self.select_level(ctx, &selectors.taluka, &criteria.taluka, Some(&selectors.village))?;
        let village = self.select_level(ctx, &selectors.village, &criteria.village, None)?;
        settle(timeouts.village_settle);

        driver.fill(&selectors.property_number, &criteria.property_number)?;
        settle(timeouts.field_settle);

        let captcha = CaptchaSolver.solve(ctx);
        driver.fill(&selectors.captcha_input, &captcha.text)?;

        log::info!("Search form filled");
        Ok(CascadeSelection { district, taluka, village })
    }

    /// Select `wanted` in one cascade level, then wait for `next` to repopulate
    fn select_level(
        &self,
        ctx: &PortalContext<'_>,
        select: &Locator,
        wanted: &str,
        next: Option<&Locator>,
    ) -> WorkflowResult<String> {
        let driver = ctx.driver;
        let options = driver.options(select)?;
        let (option, kind) = resolve_option(&options, wanted)
            .ok_or_else(|| WorkflowError::ElementNotFound(format!("no selectable option in {}", select)))?;

        match kind {
            MatchKind::Exact => log::info!("Selected '{}' by exact match", option.label),
            MatchKind::Substring => log::info!("Selected '{}' by partial match for '{}'", option.label, wanted),
            MatchKind::FirstAvailable => {
                log::warn!("'{}' not found in {}, selecting first available '{}'", wanted, select, option.label)
            }
        }
        driver.select_value(select, &option.value)?;

        if let Some(next) = next {
            let timeouts = &ctx.settings.timeouts;
            settle(timeouts.cascade_settle);
            if !ctx.wait(timeouts.cascade_ready, || Ok(driver.options(next)?.len() > 1)) {
                ctx.diagnostics.snapshot(driver, "cascade_timeout");
                return Err(WorkflowError::NavigationTimeout(format!(
                    "{} did not repopulate after selecting '{}'",
                    next, option.label
                )));
            }
            settle(timeouts.cascade_settle);
        }

        Ok(option.label.trim().to_string())
    }
}
