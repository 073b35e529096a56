//! Scripted in-memory portal used by the workflow tests
#![allow(dead_code)]

use image::{ImageOutputFormat, Rgb, RgbImage};
use index2_fetch::browser::{Driver, ElementMark, Locator, PrintGeometry, WindowHandle};
use index2_fetch::config::{Selectors, Settings, Timeouts};
use index2_fetch::dom::{DropdownOption, TableRow, TableSnapshot};
use index2_fetch::error::{BrowserError, Result};
use index2_fetch::portal::{LocalOnly, OcrEngine, PortalContext};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::time::Duration;
use tempfile::TempDir;

pub const MAIN: &str = "main";
pub const PORTAL_URL: &str = "https://freesearchigrservice.maharashtra.gov.in/";

/// What the portal shows after a click on the search control
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Results,
    HeaderOnly,
    Banner(String),
    BannerWithResults(String),
    /// A second captcha is injected; the next submit click shows results
    SecondaryCaptcha,
    /// Nothing ever renders
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Blank,
    ErrorPage,
    Landing,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    Hidden,
    HeaderOnly,
    Rows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfMode {
    Bytes(usize),
    Fail,
}

#[derive(Debug, Clone)]
pub struct Doc {
    pub number: String,
    pub kind: String,
    pub date: String,
    pub sro: String,
}

impl Doc {
    pub fn new(number: &str, date: &str) -> Self {
        Self { number: number.to_string(), kind: "Sale Deed".to_string(), date: date.to_string(), sro: "हवेली 1".to_string() }
    }
}

#[derive(Debug)]
pub struct PortalState {
    // Scenario
    pub unreachable_loads: u32,
    pub interstitial: bool,
    pub entry_point_present: bool,
    pub submit_present: bool,
    pub years: Vec<DropdownOption>,
    pub districts: Vec<DropdownOption>,
    pub talukas: HashMap<String, Vec<DropdownOption>>,
    pub villages: HashMap<String, Vec<DropdownOption>>,
    pub responses: VecDeque<Response>,
    pub default_response: Response,
    pub clear_fields_on_error: bool,
    pub pages: Vec<Vec<Doc>>,
    pub pager_block: usize,
    pub frozen_pager: bool,
    pub row_actions: bool,
    pub legacy_present: bool,
    pub pdf: PdfMode,
    pub doc_source_fails: bool,
    pub frame_markup: Option<String>,
    /// The document replaces the results page instead of opening a window
    pub inline_documents: bool,
    pub print_control_present: bool,
    /// The results grid disappears once this many documents were opened
    pub hide_grid_after_docs: Option<usize>,

    // Live page
    pub stage: Stage,
    pub interstitial_visible: bool,
    pub selected: HashMap<String, String>,
    pub property_value: String,
    pub captcha_value: String,
    pub banner: Option<String>,
    pub grid: Grid,
    pub secondary_pending: bool,
    pub current_page: usize,
    pub generation: u64,
    pub windows: Vec<WindowHandle>,
    pub current: WindowHandle,
    pub window_docs: HashMap<WindowHandle, String>,

    // Observations
    pub navigations: u32,
    pub submits: u32,
    pub secondary_submits: u32,
    pub refresh_clicks: u32,
    pub print_clicks: u32,
    pub submitted_captchas: Vec<String>,
    pub pages_shown: Vec<usize>,
    pub opened_docs: Vec<String>,
    pub closed_windows: Vec<WindowHandle>,
    pub scripts: Vec<String>,
}

fn options(items: &[(&str, &str)]) -> Vec<DropdownOption> {
    items.iter().map(|(v, l)| DropdownOption::new(*v, *l)).collect()
}

impl Default for PortalState {
    fn default() -> Self {
        Self {
            unreachable_loads: 0,
            interstitial: true,
            entry_point_present: true,
            submit_present: true,
            years: options(&[("0", "--Select Year--"), ("2014", "2014"), ("2015", "2015"), ("2016", "2016")]),
            districts: options(&[("0", "--Select District--"), ("1", "पुणे"), ("2", "मुंबई उपनगर")]),
            talukas: HashMap::from([("1".to_string(), options(&[("0", "--Select--"), ("11", "हवेली"), ("12", "मुळशी")]))]),
            villages: HashMap::from([("11".to_string(), options(&[("0", "--Select--"), ("111", "भोर"), ("112", "वाघोली")]))]),
            responses: VecDeque::new(),
            default_response: Response::Results,
            clear_fields_on_error: false,
            pages: vec![vec![Doc::new("4521", "12/03/2015"), Doc::new("4522", "18/07/2015")]],
            pager_block: 10,
            frozen_pager: false,
            row_actions: true,
            legacy_present: false,
            pdf: PdfMode::Bytes(4096),
            doc_source_fails: false,
            frame_markup: None,
            inline_documents: false,
            print_control_present: false,
            hide_grid_after_docs: None,

            stage: Stage::Blank,
            interstitial_visible: false,
            selected: HashMap::new(),
            property_value: String::new(),
            captcha_value: String::new(),
            banner: None,
            grid: Grid::Hidden,
            secondary_pending: false,
            current_page: 1,
            generation: 0,
            windows: vec![MAIN.to_string()],
            current: MAIN.to_string(),
            window_docs: HashMap::new(),

            navigations: 0,
            submits: 0,
            secondary_submits: 0,
            refresh_clicks: 0,
            print_clicks: 0,
            submitted_captchas: Vec::new(),
            pages_shown: Vec::new(),
            opened_docs: Vec::new(),
            closed_windows: Vec::new(),
            scripts: Vec::new(),
        }
    }
}

impl PortalState {
    /// `count` pages of `per_page` rows each, doc numbers numbered from 1000
    pub fn with_pages(mut self, count: usize, per_page: usize, block: usize) -> Self {
        self.pages = (0..count)
            .map(|p| (0..per_page).map(|r| Doc::new(&format!("{}", 1000 + p * per_page + r), "01/01/2015")).collect())
            .collect();
        self.pager_block = block;
        self
    }

    pub fn with_responses(mut self, responses: Vec<Response>) -> Self {
        self.responses = responses.into();
        self
    }

    fn on_main(&self) -> bool {
        self.current == MAIN
    }

    fn on_form(&self) -> bool {
        self.on_main() && self.stage == Stage::Form
    }

    fn page_docs(&self) -> &[Doc] {
        match self.grid {
            Grid::Rows => self.pages.get(self.current_page - 1).map(|p| p.as_slice()).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// ASP.NET style numeric pager: one block of page links with `...` on either side
    fn pager_links(&self) -> Vec<(String, usize)> {
        let total = self.pages.len();
        let block = self.pager_block.max(1);
        let start = (self.current_page - 1) / block * block;
        let mut links = Vec::new();
        if start > 0 {
            links.push(("...".to_string(), start));
        }
        for page in start + 1..=(start + block).min(total) {
            if page != self.current_page {
                links.push((page.to_string(), page));
            }
        }
        if start + block < total {
            links.push(("...".to_string(), start + block + 1));
        }
        links
    }

    fn href(page: usize) -> String {
        format!("javascript:__doPostBack('RegistrationGrid','Page${}')", page)
    }

    fn table(&self) -> Option<TableSnapshot> {
        if !self.on_main() || self.grid == Grid::Hidden {
            return None;
        }

        let mut rows = vec![TableRow::new(vec![]).with_html("<th>Doc No</th><th>Type</th><th>Date</th><th>SRO</th><th></th>")];
        for doc in self.page_docs() {
            let cells = vec![doc.number.clone(), doc.kind.clone(), doc.date.clone(), doc.sro.clone(), String::new()];
            let row = TableRow::new(cells).with_html(format!("<td>{}</td>", doc.number));
            rows.push(if self.row_actions { row.with_actions(1) } else { row });
        }

        if self.grid == Grid::Rows && self.pages.len() > 1 {
            let mut pager = TableRow::new(vec![]);
            let mut html = format!("<td><table><tr><td><span>{}</span></td>", self.current_page);
            for (text, page) in self.pager_links() {
                html.push_str(&format!("<td><a href=\"{}\">{}</a></td>", Self::href(page), text));
                pager = pager.with_link(text, Self::href(page));
            }
            html.push_str("</tr></table></td>");
            rows.push(pager.with_html(html));
        }
        Some(TableSnapshot::new(rows))
    }

    fn open_window(&mut self, doc: String) {
        self.opened_docs.push(doc.clone());
        if self.hide_grid_after_docs.is_some_and(|n| self.opened_docs.len() >= n) {
            self.grid = Grid::Hidden;
        }

        if self.inline_documents {
            self.window_docs.insert(MAIN.to_string(), doc);
            return;
        }
        let handle = format!("doc-{}", self.opened_docs.len());
        self.windows.push(handle.clone());
        self.window_docs.insert(handle, doc);
    }

    fn in_document(&self) -> bool {
        self.window_docs.contains_key(&self.current)
    }

    fn submit(&mut self) {
        if self.secondary_pending {
            self.secondary_pending = false;
            self.secondary_submits += 1;
            self.show_results(Grid::Rows);
            return;
        }

        self.submits += 1;
        self.submitted_captchas.push(self.captcha_value.clone());
        self.banner = None;
        self.grid = Grid::Hidden;

        let response = self.responses.pop_front().unwrap_or_else(|| self.default_response.clone());
        match response {
            Response::Results => self.show_results(Grid::Rows),
            Response::HeaderOnly => self.show_results(Grid::HeaderOnly),
            Response::Banner(text) => {
                self.banner = Some(text);
                if self.clear_fields_on_error {
                    self.captcha_value.clear();
                    self.property_value.clear();
                }
            }
            Response::BannerWithResults(text) => {
                self.banner = Some(text);
                self.show_results(Grid::Rows);
            }
            Response::SecondaryCaptcha => self.secondary_pending = true,
            Response::Silent => {}
        }
    }

    fn show_results(&mut self, grid: Grid) {
        self.grid = grid;
        self.current_page = 1;
        self.generation += 1;
        self.pages_shown.push(1);
    }
}

pub struct FakePortal {
    state: RefCell<PortalState>,
    selectors: Selectors,
    marks: Cell<u64>,
    mark_generations: RefCell<HashMap<String, u64>>,
}

impl FakePortal {
    pub fn new(state: PortalState) -> Self {
        Self {
            state: RefCell::new(state),
            selectors: Selectors::default(),
            marks: Cell::new(0),
            mark_generations: RefCell::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> Ref<'_, PortalState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, PortalState> {
        self.state.borrow_mut()
    }

    fn not_found(locator: &Locator) -> BrowserError {
        BrowserError::ElementNotFound(locator.to_string())
    }

    fn is_pager_link(&self, locator: &Locator) -> Option<usize> {
        let value = locator.value();
        let prefix = format!("{} a[href=", self.selectors.results_grid.value());
        if !value.starts_with(&prefix) {
            return None;
        }
        index2_fetch::dom::page_number_in(value, "Page$")
    }

    fn select_list(&self, locator: &Locator) -> Option<&'static str> {
        let s = &self.selectors;
        if locator == &s.year {
            Some("year")
        } else if locator == &s.district {
            Some("district")
        } else if locator == &s.taluka {
            Some("taluka")
        } else if locator == &s.village {
            Some("village")
        } else {
            None
        }
    }

    fn list_options(&self, state: &PortalState, list: &str) -> Vec<DropdownOption> {
        let selected = |key: &str| state.selected.get(key).cloned().unwrap_or_default();
        match list {
            "year" => state.years.clone(),
            "district" => state.districts.clone(),
            "taluka" => state.talukas.get(&selected("district")).cloned().unwrap_or_else(|| options(&[("0", "--Select--")])),
            "village" => state.villages.get(&selected("taluka")).cloned().unwrap_or_else(|| options(&[("0", "--Select--")])),
            _ => Vec::new(),
        }
    }
}

impl Driver for FakePortal {
    fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.navigations += 1;
        assert_eq!(url, PORTAL_URL);
        if s.navigations <= s.unreachable_loads {
            s.stage = Stage::ErrorPage;
        } else {
            s.stage = Stage::Landing;
            s.interstitial_visible = s.interstitial;
        }
        s.grid = Grid::Hidden;
        s.banner = None;
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        let s = self.state.borrow();
        Ok(match s.window_docs.get(&s.current) {
            Some(doc) => format!("{}isaritaHTMLReportSuchiKramank2_RegLive.aspx?doc={}", PORTAL_URL, doc),
            None => PORTAL_URL.to_string(),
        })
    }

    fn is_document_ready(&self) -> Result<bool> {
        Ok(true)
    }

    fn page_source(&self) -> Result<String> {
        let s = self.state.borrow();
        if let Some(doc) = s.window_docs.get(&s.current) {
            if s.doc_source_fails {
                return Err(BrowserError::EvaluationFailed("target closed".to_string()));
            }
            return Ok(format!("<html><body><h1>सूची क्र.2</h1><p>{}</p></body></html>", doc));
        }
        Ok(match s.stage {
            Stage::ErrorPage => "<html><body>This site can't be reached. ERR_NAME_NOT_RESOLVED</body></html>".to_string(),
            _ => "<html><body>IGR Maharashtra free search</body></html>".to_string(),
        })
    }

    fn count(&self, locator: &Locator) -> Result<usize> {
        let s = self.state.borrow();
        let sel = &self.selectors;

        if s.in_document() {
            if locator == &sel.frames {
                return Ok(s.frame_markup.is_some() as usize);
            }
            if locator == &sel.print_controls[0] {
                return Ok(s.print_control_present as usize);
            }
        }
        if !s.on_main() {
            return Ok(0);
        }

        let n = if locator == &sel.interstitial_close {
            (s.stage == Stage::Landing && s.interstitial_visible) as usize
        } else if locator == &sel.entry_point {
            (s.stage == Stage::Landing && s.entry_point_present) as usize
        } else if self.select_list(locator).is_some() || locator == &sel.property_number || locator == &sel.captcha_input {
            s.on_form() as usize
        } else if locator == &sel.submit[0] {
            (s.on_form() && s.submit_present) as usize
        } else if locator == &sel.captcha_refresh {
            s.on_form() as usize
        } else if locator == &sel.secondary_captcha_image {
            s.secondary_pending as usize
        } else if locator == &sel.captcha_images[1] {
            s.on_form() as usize
        } else if locator == &sel.error_banner {
            s.banner.is_some() as usize
        } else if locator == &sel.results_grid {
            (s.grid != Grid::Hidden) as usize
        } else if locator == &sel.row_action {
            if s.row_actions { s.page_docs().len() } else { 0 }
        } else if locator == &sel.legacy_actions[1] {
            s.legacy_present as usize
        } else if let Some(page) = self.is_pager_link(locator) {
            s.pager_links().iter().any(|(_, p)| *p == page) as usize
        } else {
            0
        };
        Ok(n)
    }

    fn is_displayed(&self, locator: &Locator) -> Result<bool> {
        if locator == &self.selectors.loading_indicator {
            return Ok(false);
        }
        Ok(self.count(locator)? > 0)
    }

    fn click(&self, locator: &Locator, nth: usize) -> Result<()> {
        if self.count(locator)? <= nth {
            return Err(Self::not_found(locator));
        }

        let mut s = self.state.borrow_mut();
        let sel = &self.selectors;

        if locator == &sel.interstitial_close {
            s.interstitial_visible = false;
        } else if locator == &sel.entry_point {
            s.stage = Stage::Form;
        } else if locator == &sel.submit[0] {
            s.submit();
        } else if locator == &sel.captcha_refresh {
            s.refresh_clicks += 1;
            s.captcha_value.clear();
        } else if locator == &sel.print_controls[0] {
            s.print_clicks += 1;
        } else if locator == &sel.row_action {
            let doc = s.page_docs()[nth].number.clone();
            s.open_window(doc);
        } else if locator == &sel.legacy_actions[1] {
            s.open_window("legacy".to_string());
        } else if let Some(page) = self.is_pager_link(locator) {
            if !s.frozen_pager {
                s.current_page = page;
                s.generation += 1;
                s.pages_shown.push(page);
            }
        } else {
            return Err(Self::not_found(locator));
        }
        Ok(())
    }

    fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if !s.on_form() {
            return Err(Self::not_found(locator));
        }
        if locator == &self.selectors.property_number {
            s.property_value = text.to_string();
        } else if locator == &self.selectors.captcha_input {
            s.captcha_value = text.to_string();
        } else {
            return Err(Self::not_found(locator));
        }
        Ok(())
    }

    fn value_of(&self, locator: &Locator) -> Result<String> {
        let s = self.state.borrow();
        if locator == &self.selectors.property_number {
            Ok(s.property_value.clone())
        } else if locator == &self.selectors.captcha_input {
            Ok(s.captcha_value.clone())
        } else {
            Err(Self::not_found(locator))
        }
    }

    fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let s = self.state.borrow();
        if locator == &self.selectors.error_banner {
            return Ok(s.banner.iter().cloned().collect());
        }
        Ok(Vec::new())
    }

    fn options(&self, locator: &Locator) -> Result<Vec<DropdownOption>> {
        let list = self.select_list(locator).ok_or_else(|| Self::not_found(locator))?;
        let s = self.state.borrow();
        if !s.on_form() {
            return Err(Self::not_found(locator));
        }
        Ok(self.list_options(&s, list))
    }

    fn select_value(&self, locator: &Locator, value: &str) -> Result<()> {
        let list = self.select_list(locator).ok_or_else(|| Self::not_found(locator))?;
        let available = self.options(locator)?;
        if !available.iter().any(|o| o.value == value) {
            return Err(Self::not_found(locator));
        }

        let mut s = self.state.borrow_mut();
        s.selected.insert(list.to_string(), value.to_string());
        // Selecting a level resets every level below it
        let below: &[&str] = match list {
            "district" => &["taluka", "village"],
            "taluka" => &["village"],
            _ => &[],
        };
        for key in below {
            s.selected.remove(*key);
        }
        Ok(())
    }

    fn selected_option(&self, locator: &Locator) -> Result<Option<DropdownOption>> {
        let list = self.select_list(locator).ok_or_else(|| Self::not_found(locator))?;
        let s = self.state.borrow();
        let Some(value) = s.selected.get(list) else {
            return Ok(None);
        };
        Ok(self.list_options(&s, list).into_iter().find(|o| &o.value == value))
    }

    fn read_table(&self, table: &Locator, _action: &Locator) -> Result<Option<TableSnapshot>> {
        if table != &self.selectors.results_grid {
            return Ok(None);
        }
        Ok(self.state.borrow().table())
    }

    fn capture_element(&self, locator: &Locator) -> Result<Vec<u8>> {
        if self.count(locator)? == 0 {
            return Err(Self::not_found(locator));
        }
        Ok(sample_png())
    }

    fn capture_page(&self) -> Result<Vec<u8>> {
        Ok(sample_png())
    }

    fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        self.state.borrow_mut().scripts.push(script.to_string());
        Ok(serde_json::Value::Null)
    }

    fn print_to_pdf(&self, _geometry: &PrintGeometry) -> Result<Vec<u8>> {
        let s = self.state.borrow();
        if !s.window_docs.contains_key(&s.current) {
            return Err(BrowserError::PdfFailed("not a document window".to_string()));
        }
        match s.pdf {
            PdfMode::Bytes(size) => {
                let mut pdf = b"%PDF-1.4\n".to_vec();
                pdf.resize(size.max(pdf.len()), b' ');
                Ok(pdf)
            }
            PdfMode::Fail => Err(BrowserError::PdfFailed("Printing failed".to_string())),
        }
    }

    fn window_handles(&self) -> Result<Vec<WindowHandle>> {
        Ok(self.state.borrow().windows.clone())
    }

    fn current_window(&self) -> Result<WindowHandle> {
        let s = self.state.borrow();
        if !s.windows.contains(&s.current) {
            return Err(BrowserError::TabOperationFailed("current window was closed".to_string()));
        }
        Ok(s.current.clone())
    }

    fn switch_to_window(&self, handle: &str) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if !s.windows.iter().any(|w| w == handle) {
            return Err(BrowserError::TabOperationFailed(format!("no window {}", handle)));
        }
        s.current = handle.to_string();
        Ok(())
    }

    fn close_current_window(&self) -> Result<()> {
        let mut s = self.state.borrow_mut();
        let current = s.current.clone();
        s.windows.retain(|w| *w != current);
        s.closed_windows.push(current);
        Ok(())
    }

    fn mark(&self, locator: &Locator) -> Result<Option<ElementMark>> {
        if self.count(locator)? == 0 {
            return Ok(None);
        }
        let id = self.marks.get();
        self.marks.set(id + 1);
        let token = format!("m{}", id);
        self.mark_generations.borrow_mut().insert(token.clone(), self.state.borrow().generation);
        Ok(Some(ElementMark(token)))
    }

    fn is_stale(&self, mark: &ElementMark) -> Result<bool> {
        let generation = self.state.borrow().generation;
        Ok(self.mark_generations.borrow().get(&mark.0).is_none_or(|g| *g != generation))
    }

    fn frame_source(&self, frames: &Locator, nth: usize) -> Result<Option<String>> {
        if nth > 0 || self.count(frames)? == 0 {
            return Ok(None);
        }
        Ok(self.state.borrow().frame_markup.clone())
    }
}

/// OCR stand-in that always reads the same text and counts its calls
pub struct FixedOcr {
    pub text: String,
    pub calls: Cell<usize>,
}

impl FixedOcr {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string(), calls: Cell::new(0) }
    }
}

impl OcrEngine for FixedOcr {
    fn recognize(&self, _png: &[u8]) -> String {
        self.calls.set(self.calls.get() + 1);
        format!(" {}\n", self.text)
    }
}

pub fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(12, 6, |x, _| if x % 3 == 0 { Rgb([20, 20, 20]) } else { Rgb([230, 230, 230]) });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png).expect("encode png");
    out.into_inner()
}

/// Settings with every wait reduced to one probe and output under `dir`
pub fn fast_settings(dir: &std::path::Path) -> Settings {
    let mut settings = Settings::default();
    settings.timeouts = Timeouts::immediate();
    settings.bootstrap.initial_delay = Duration::ZERO;
    settings.bootstrap.max_delay = Duration::ZERO;
    settings.output.downloads_dir = dir.join("downloads");
    settings
}

pub struct Harness {
    pub portal: FakePortal,
    pub settings: Settings,
    pub ocr: FixedOcr,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(state: PortalState) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        Self { portal: FakePortal::new(state), settings: fast_settings(dir.path()), ocr: FixedOcr::new("Ab12"), dir }
    }

    pub fn ctx(&self) -> PortalContext<'_> {
        PortalContext::new(&self.portal, &self.settings, &self.ocr, &LocalOnly)
    }

    pub fn downloads(&self) -> std::path::PathBuf {
        self.settings.output.downloads_dir.clone()
    }

    /// Drive the fake to the filled search form
    pub fn open_form(&self) {
        let mut s = self.portal.state_mut();
        s.stage = Stage::Form;
        s.property_value = "123".to_string();
        s.captcha_value = "Ab12".to_string();
    }

    /// Drive the fake straight to a results grid
    pub fn show_results(&self) {
        self.open_form();
        self.portal.state_mut().show_results(Grid::Rows);
    }
}
