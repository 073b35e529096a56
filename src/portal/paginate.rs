//! Results grid traversal.
//!
//! Rows are re-read from a fresh table snapshot on every page; nothing keeps a
//! reference to an element across a re-render. The walk stops when there is no
//! forward pager link, when the grid can no longer be read or an advance cannot
//! be confirmed, when a page would be visited twice, or at the configured page
//! cap. Only a grid missing from the start is an error.

use crate::browser::settle;
use crate::dom::{PagerTarget, TableSnapshot};
use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::PortalContext;
use crate::portal::model::SearchResultRow;
use std::collections::HashSet;

/// One data row and the ordinal of its action control among the page's action controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub record: SearchResultRow,
    pub action_index: Option<usize>,
}

/// Data rows of one grid page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    pub number: usize,
    pub rows: Vec<PageRow>,
}

impl ResultPage {
    pub fn from_snapshot(table: &TableSnapshot, number: usize, page_marker: &str) -> Self {
        let mut next_action = 0;
        let rows = table
            .data_rows(page_marker)
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let action_index = (row.action_count > 0).then_some(next_action);
                next_action += row.action_count;
                PageRow { record: SearchResultRow::from_cells(&row.cells, index, number), action_index }
            })
            .collect();
        Self { number, rows }
    }
}

pub struct ResultPaginator;

impl ResultPaginator {
    /// Every row of every page, in order, without extracting anything
    pub fn enumerate(&self, ctx: &PortalContext<'_>) -> WorkflowResult<Vec<SearchResultRow>> {
        let mut records = Vec::new();
        let pages = self.walk(ctx, |page| {
            records.extend(page.rows.iter().map(|row| row.record.clone()));
            Ok(())
        })?;
        log::info!("Enumerated {} records across {} pages", records.len(), pages);
        Ok(records)
    }

    /// Call `visit` once for each page, advancing through the pager until it is exhausted.
    ///
    /// Returns the number of pages visited.
    pub fn walk<F>(&self, ctx: &PortalContext<'_>, mut visit: F) -> WorkflowResult<usize>
    where
        F: FnMut(&ResultPage) -> WorkflowResult<()>,
    {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;
        let portal = &ctx.settings.portal;

        if driver.count(&selectors.results_grid)? == 0 {
            log::error!("No search results table found");
            ctx.diagnostics.snapshot(driver, "no_results_table");
            return Err(WorkflowError::Fatal("no search results table found".to_string()));
        }

        let mut visited = HashSet::from([1]);
        let mut current = 1;

        loop {
            let table = self.read(ctx)?;
            let page = ResultPage::from_snapshot(&table, current, &portal.page_marker);
            log::info!("Processing page {} ({} rows)", current, page.rows.len());
            visit(&page)?;

            if visited.len() >= ctx.settings.output.max_pages {
                log::warn!("Stopping at the page limit of {}", ctx.settings.output.max_pages);
                break;
            }

            // The visitor may have re-rendered the grid
            let table = match self.read(ctx) {
                Ok(table) => table,
                Err(e) => {
                    log::warn!("Results grid unreadable after page {}: {}, stopping", current, e);
                    ctx.diagnostics.snapshot(driver, &format!("navigation_error_page{}", current));
                    break;
                }
            };
            let Some(target) = table.pager_target(current, &portal.page_marker, &portal.ellipsis_label) else {
                log::info!("No more pages after page {}", current);
                break;
            };

            if !visited.insert(target.page()) {
                log::warn!("Page {} was already processed, stopping", target.page());
                break;
            }

            match self.advance(ctx, &table, &target) {
                Ok(true) => {
                    current = target.page();
                    log::info!("Navigated to page {}", current);
                }
                Ok(false) => {
                    log::warn!("Could not confirm navigation to page {}, stopping", target.page());
                    ctx.diagnostics.snapshot(driver, &format!("navigation_error_page{}", current));
                    visited.remove(&target.page());
                    break;
                }
                Err(e) => {
                    log::warn!("Error navigating to page {}: {}", target.page(), e);
                    ctx.diagnostics.snapshot(driver, &format!("navigation_error_page{}", current));
                    visited.remove(&target.page());
                    break;
                }
            }
        }

        Ok(visited.len())
    }

    fn read(&self, ctx: &PortalContext<'_>) -> WorkflowResult<TableSnapshot> {
        let selectors = &ctx.settings.selectors;
        ctx.driver
            .read_table(&selectors.results_grid, &selectors.row_action)?
            .ok_or_else(|| WorkflowError::ElementNotFound(selectors.results_grid.to_string()))
    }

    /// Click the pager link and wait for the grid to be replaced by one with data rows
    fn advance(&self, ctx: &PortalContext<'_>, table: &TableSnapshot, target: &PagerTarget) -> WorkflowResult<bool> {
        let driver = ctx.driver;
        let selectors = &ctx.settings.selectors;
        let timeouts = &ctx.settings.timeouts;

        let link = table
            .pager_row(&ctx.settings.portal.page_marker)
            .and_then(|pager| pager.links.get(target.link_index()))
            .ok_or_else(|| WorkflowError::ElementNotFound(format!("pager link for page {}", target.page())))?;
        let locator = selectors.results_grid.link_with_href(&link.href);

        let mark = driver.mark(&selectors.results_grid)?;
        log::debug!("Clicking pager link '{}' ({:?})", link.text, target);
        driver.click(&locator, 0)?;

        if let Some(mark) = mark {
            if !ctx.wait(timeouts.staleness, || driver.is_stale(&mark)) {
                log::warn!("Results grid was not replaced within {:?}", timeouts.staleness);
                return Ok(false);
            }
        }
        if !ctx.wait(timeouts.grid_ready, || Ok(driver.count(&selectors.results_grid)? > 0)) {
            log::warn!("Results grid did not reappear within {:?}", timeouts.grid_ready);
            return Ok(false);
        }
        settle(timeouts.page_settle);

        Ok(self.read(ctx).map(|t| t.has_data()).unwrap_or(false))
    }
}
