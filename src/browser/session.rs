use crate::{browser::config::{ConnectionOptions, LaunchOptions},
            browser::driver::{Driver, ElementMark, PrintGeometry, WindowHandle},
            browser::locator::Locator,
            dom::{self, DropdownOption, TableSnapshot},
            error::{BrowserError, Result}};
use headless_chrome::{Browser, Element, Tab, protocol::cdp::Page::CaptureScreenshotFormatOption, types::PrintToPdfOptions};
use std::{ffi::OsStr,
          sync::{Arc, Mutex, atomic::{AtomicU64, Ordering}},
          time::Duration};

/// Browser session that manages a Chrome/Chromium instance.
///
/// The session tracks the current window explicitly: it is only changed by
/// [`Driver::switch_to_window`] and [`Driver::close_current_window`], never
/// inferred from focus.
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,

    /// Window that driver operations apply to
    current: Mutex<Arc<Tab>>,

    /// Counter for staleness marks
    marks: AtomicU64,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Ignore default arguments to prevent detection by anti-bot services
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));
        launch_opts.args.push(OsStr::new("--disable-popup-blocking"));
        launch_opts.args.push(OsStr::new("--disable-infobars"));

        // Portal pages can keep a single run busy for a long time
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));

        if let Some(path) = options.chrome_path {
            launch_opts.path = Some(path);
        }

        if let Some(dir) = options.user_data_dir {
            launch_opts.user_data_dir = Some(dir);
        }

        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let tab = browser.new_tab().map_err(|e| BrowserError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        Ok(Self::with_tab(browser, tab))
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect_with_timeout(options.ws_url, Duration::from_millis(options.idle_timeout))
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        let existing = browser
            .get_tabs()
            .lock()
            .map_err(|e| BrowserError::ConnectionFailed(format!("Failed to get tabs: {}", e)))?
            .first()
            .cloned();

        let tab = match existing {
            Some(tab) => tab,
            None => browser
                .new_tab()
                .map_err(|e| BrowserError::ConnectionFailed(format!("Failed to create tab: {}", e)))?,
        };

        Ok(Self::with_tab(browser, tab))
    }

    fn with_tab(browser: Browser, tab: Arc<Tab>) -> Self {
        Self { browser, current: Mutex::new(tab), marks: AtomicU64::new(0) }
    }

    /// The window driver operations currently apply to
    pub fn tab(&self) -> Result<Arc<Tab>> {
        self.current
            .lock()
            .map(|tab| tab.clone())
            .map_err(|e| BrowserError::TabOperationFailed(format!("Current tab lock poisoned: {}", e)))
    }

    /// Get all tabs
    pub fn get_tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to get tabs: {}", e)))?
            .clone();

        Ok(tabs)
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close every tab. The browser process exits when the session is dropped.
    pub fn close(&self) -> Result<()> {
        let tabs = self.get_tabs()?;
        for tab in tabs {
            let _ = tab.close(false); // Ignore errors on individual tab closes
        }
        Ok(())
    }

    /// Evaluate a script and return its value (`None` for `undefined`)
    fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>> {
        self.tab()?
            .evaluate(script, false)
            .map(|remote| remote.value)
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))
    }

    /// Evaluate `body` with `nodes` bound to the locator's matches
    fn evaluate_on(&self, locator: &Locator, body: &str) -> Result<Option<serde_json::Value>> {
        self.evaluate(&format!("(function(nodes){{{}}})({})", body, locator.js_nodes()))
    }

    fn find_all<'a>(&self, tab: &'a Arc<Tab>, locator: &Locator) -> Result<Vec<Element<'a>>> {
        let found = match locator {
            Locator::Css(s) => tab.find_elements(s),
            Locator::XPath(s) => tab.find_elements_by_xpath(s),
        };
        found.map_err(|e| BrowserError::ElementNotFound(format!("{} not found: {}", locator, e)))
    }

    fn find_nth<'a>(&self, tab: &'a Arc<Tab>, locator: &Locator, nth: usize) -> Result<Element<'a>> {
        self.find_all(tab, locator)?
            .into_iter()
            .nth(nth)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{} has no match #{}", locator, nth)))
    }

    fn tab_by_handle(&self, handle: &str) -> Result<Arc<Tab>> {
        self.get_tabs()?
            .into_iter()
            .find(|tab| tab.get_target_id().as_str() == handle)
            .ok_or_else(|| BrowserError::TabOperationFailed(format!("No window with handle {}", handle)))
    }
}

impl Driver for BrowserSession {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let tab = self.tab()?;
        tab.set_default_timeout(timeout);
        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| BrowserError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.tab()?.get_url())
    }

    fn is_document_ready(&self) -> Result<bool> {
        Ok(self.evaluate("document.readyState === 'complete'")?.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn page_source(&self) -> Result<String> {
        self.tab()?.get_content().map_err(|e| BrowserError::EvaluationFailed(format!("Failed to read page source: {}", e)))
    }

    fn count(&self, locator: &Locator) -> Result<usize> {
        let value = self.evaluate(&format!("{}.length", locator.js_nodes()))?;
        Ok(value.and_then(|v| v.as_u64()).unwrap_or(0) as usize)
    }

    fn is_displayed(&self, locator: &Locator) -> Result<bool> {
        let value = self.evaluate_on(
            locator,
            "var n = nodes[0]; if (!n) return false; \
             var s = window.getComputedStyle(n); \
             return s.display !== 'none' && s.visibility !== 'hidden' && n.getClientRects().length > 0;",
        )?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn click(&self, locator: &Locator, nth: usize) -> Result<()> {
        let tab = self.tab()?;
        let native = self.find_nth(&tab, locator, nth).and_then(|element| {
            element
                .click()
                .map(|_| ())
                .map_err(|e| BrowserError::TabOperationFailed(format!("Click on {} failed: {}", locator, e)))
        });

        if let Err(e) = native {
            // Overlays and off-screen controls reject synthetic mouse events; a script click still fires handlers
            log::debug!("Native click failed ({}), falling back to script click", e);
            let clicked = self.evaluate_on(
                locator,
                &format!("var n = nodes[{}]; if (!n) return false; n.click(); return true;", nth),
            )?;
            if !clicked.and_then(|v| v.as_bool()).unwrap_or(false) {
                return Err(BrowserError::ElementNotFound(format!("{} has no match #{}", locator, nth)));
            }
        }
        Ok(())
    }

    fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let tab = self.tab()?;
        let element = self.find_nth(&tab, locator, 0)?;
        element
            .call_js_fn("function() { this.value = ''; }", vec![], false)
            .map_err(|e| BrowserError::EvaluationFailed(format!("Failed to clear {}: {}", locator, e)))?;
        element
            .type_into(text)
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to type into {}: {}", locator, e)))?;
        Ok(())
    }

    fn value_of(&self, locator: &Locator) -> Result<String> {
        let value = self.evaluate_on(locator, "var n = nodes[0]; return n ? (n.value || '') : null;")?;
        match value {
            Some(serde_json::Value::String(s)) => Ok(s),
            _ => Err(BrowserError::ElementNotFound(locator.to_string())),
        }
    }

    fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let value = self.evaluate_on(
            locator,
            "return JSON.stringify(nodes.map(function(n) { return (n.innerText || n.textContent || '').trim(); }));",
        )?;
        Ok(dom::parse_script_json(value)?.unwrap_or_default())
    }

    fn options(&self, locator: &Locator) -> Result<Vec<DropdownOption>> {
        let value = self.evaluate(&format!("{}({}[0], false)", dom::READ_OPTIONS_JS, locator.js_nodes()))?;
        dom::parse_script_json(value)?.ok_or_else(|| BrowserError::ElementNotFound(locator.to_string()))
    }

    fn select_value(&self, locator: &Locator, value: &str) -> Result<()> {
        let quoted = serde_json::to_string(value).map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;
        let selected = self.evaluate_on(
            locator,
            &format!(
                "var s = nodes[0]; if (!s) return false; s.value = {v}; \
                 if (s.value !== {v}) return false; \
                 s.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;",
                v = quoted
            ),
        )?;
        if selected.and_then(|v| v.as_bool()).unwrap_or(false) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(format!("Option {} in {}", value, locator)))
        }
    }

    fn selected_option(&self, locator: &Locator) -> Result<Option<DropdownOption>> {
        let value = self.evaluate(&format!("{}({}[0], true)", dom::READ_OPTIONS_JS, locator.js_nodes()))?;
        let options: Option<Vec<DropdownOption>> = dom::parse_script_json(value)?;
        Ok(options.and_then(|o| o.into_iter().next()))
    }

    fn read_table(&self, table: &Locator, action: &Locator) -> Result<Option<TableSnapshot>> {
        let script = format!(
            "{}({}[0], function(row) {{ return {}; }})",
            dom::READ_TABLE_JS,
            table.js_nodes(),
            action.js_nodes_within("row")
        );
        dom::parse_script_json(self.evaluate(&script)?)
    }

    fn capture_element(&self, locator: &Locator) -> Result<Vec<u8>> {
        let tab = self.tab()?;
        self.find_nth(&tab, locator, 0)?
            .capture_screenshot(CaptureScreenshotFormatOption::Png)
            .map_err(|e| BrowserError::ScreenshotFailed(format!("{}: {}", locator, e)))
    }

    fn capture_page(&self) -> Result<Vec<u8>> {
        self.tab()?
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
    }

    fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        Ok(self.evaluate(script)?.unwrap_or(serde_json::Value::Null))
    }

    fn print_to_pdf(&self, geometry: &PrintGeometry) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            landscape: Some(geometry.landscape),
            print_background: Some(geometry.print_background),
            paper_width: Some(geometry.paper_width),
            paper_height: Some(geometry.paper_height),
            margin_top: Some(geometry.margin),
            margin_bottom: Some(geometry.margin),
            margin_left: Some(geometry.margin),
            margin_right: Some(geometry.margin),
            scale: Some(geometry.scale),
            prefer_css_page_size: Some(geometry.prefer_css_page_size),
            ..Default::default()
        };

        self.tab()?.print_to_pdf(Some(options)).map_err(|e| BrowserError::PdfFailed(e.to_string()))
    }

    fn window_handles(&self) -> Result<Vec<WindowHandle>> {
        Ok(self.get_tabs()?.iter().map(|tab| tab.get_target_id().to_string()).collect())
    }

    fn current_window(&self) -> Result<WindowHandle> {
        Ok(self.tab()?.get_target_id().to_string())
    }

    fn switch_to_window(&self, handle: &str) -> Result<()> {
        let tab = self.tab_by_handle(handle)?;
        tab.activate()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to activate {}: {}", handle, e)))?;

        let mut current = self
            .current
            .lock()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Current tab lock poisoned: {}", e)))?;
        *current = tab;
        Ok(())
    }

    fn close_current_window(&self) -> Result<()> {
        self.tab()?
            .close(true)
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }

    fn mark(&self, locator: &Locator) -> Result<Option<ElementMark>> {
        let token = format!("m{}", self.marks.fetch_add(1, Ordering::Relaxed));
        let value = self.evaluate_on(
            locator,
            &format!(
                "var n = nodes[0]; if (!n) return false; \
                 window.__index2Marks = window.__index2Marks || {{}}; \
                 window.__index2Marks['{t}'] = n; return true;",
                t = token
            ),
        )?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false).then(|| ElementMark(token)))
    }

    fn is_stale(&self, mark: &ElementMark) -> Result<bool> {
        let quoted = serde_json::to_string(&mark.0).map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;
        let value = self.evaluate(&format!(
            "(function() {{ var m = window.__index2Marks && window.__index2Marks[{}]; return !m || !m.isConnected; }})()",
            quoted
        ))?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(true))
    }

    fn frame_source(&self, frames: &Locator, nth: usize) -> Result<Option<String>> {
        let value = self.evaluate_on(
            frames,
            &format!(
                "var f = nodes[{}]; if (!f) return null; \
                 try {{ var d = f.contentDocument; return d && d.documentElement ? d.documentElement.outerHTML : null; }} \
                 catch (e) {{ return null; }}",
                nth
            ),
        )?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }
}
