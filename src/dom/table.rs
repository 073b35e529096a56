use serde::{Deserialize, Serialize};

/// A link found inside a table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLink {
    /// Visible text of the link
    #[serde(default)]
    pub text: String,

    /// Raw `href` attribute (ASP.NET pagers use `javascript:__doPostBack(...,'Page$N')`)
    #[serde(default)]
    pub href: String,
}

/// One `<tr>` of a results table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRow {
    /// Text of each `<td>` (header rows use `<th>` and therefore have no cells)
    #[serde(default)]
    pub cells: Vec<String>,

    /// Inner markup of the row
    #[serde(default)]
    pub html: String,

    /// Number of row-level action controls inside the row
    #[serde(default)]
    pub action_count: usize,

    /// Links inside the row, in document order
    #[serde(default)]
    pub links: Vec<TableLink>,
}

/// Snapshot of a rendered table, read in one script evaluation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSnapshot {
    #[serde(default)]
    pub rows: Vec<TableRow>,
}

/// Where the pager should go next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerTarget {
    /// Direct link to the following page
    Next { link_index: usize, page: usize },
    /// "..." link revealing further page links
    Ellipsis { link_index: usize, page: usize },
}

impl PagerTarget {
    pub fn link_index(&self) -> usize {
        match self {
            PagerTarget::Next { link_index, .. } | PagerTarget::Ellipsis { link_index, .. } => *link_index,
        }
    }

    /// Page number the link leads to
    pub fn page(&self) -> usize {
        match self {
            PagerTarget::Next { page, .. } | PagerTarget::Ellipsis { page, .. } => *page,
        }
    }
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells, ..Default::default() }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn with_actions(mut self, count: usize) -> Self {
        self.action_count = count;
        self
    }

    pub fn with_link(mut self, text: impl Into<String>, href: impl Into<String>) -> Self {
        self.links.push(TableLink { text: text.into(), href: href.into() });
        self
    }

    /// Text of the cell at `index`, trimmed
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|c| c.trim())
    }
}

/// Parse the page number out of a pager href such as `__doPostBack('Grid','Page$12')`
pub fn page_number_in(href: &str, marker: &str) -> Option<usize> {
    let start = href.find(marker)? + marker.len();
    let digits: String = href[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl TableSnapshot {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    /// Total number of `<tr>` elements, header included
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds more than the header row
    pub fn has_data(&self) -> bool {
        self.rows.len() > 1
    }

    /// The trailing pager row, if the table has one.
    ///
    /// A trailing row is a pager when the table has more than two rows and the
    /// row's markup contains the page-link marker.
    pub fn pager_row(&self, marker: &str) -> Option<&TableRow> {
        if self.rows.len() > 2 {
            self.rows.last().filter(|row| row.html.contains(marker))
        } else {
            None
        }
    }

    /// Data rows: everything except the header and, when present, the pager row
    pub fn data_rows(&self, marker: &str) -> &[TableRow] {
        if self.rows.is_empty() {
            return &[];
        }
        if self.pager_row(marker).is_some() {
            &self.rows[1..self.rows.len() - 1]
        } else {
            &self.rows[1..]
        }
    }

    /// Find the link that advances past `current_page`.
    ///
    /// A link addressed to exactly `current_page + 1` wins. Otherwise an
    /// ellipsis link is used, but only one pointing forward, so that the
    /// "previous block" ellipsis can never send the walk backwards.
    pub fn pager_target(&self, current_page: usize, marker: &str, ellipsis: &str) -> Option<PagerTarget> {
        let pager = self.pager_row(marker)?;
        let wanted = current_page + 1;

        let next = pager
            .links
            .iter()
            .position(|link| page_number_in(&link.href, marker) == Some(wanted));
        if let Some(link_index) = next {
            return Some(PagerTarget::Next { link_index, page: wanted });
        }

        pager.links.iter().enumerate().find_map(|(link_index, link)| {
            if link.text.trim() != ellipsis {
                return None;
            }
            match page_number_in(&link.href, marker) {
                Some(page) if page > current_page => Some(PagerTarget::Ellipsis { link_index, page }),
                Some(_) => None,
                // Unaddressed ellipsis: only trust the trailing one
                None if link_index + 1 == pager.links.len() => Some(PagerTarget::Ellipsis { link_index, page: wanted }),
                None => None,
            }
        })
    }
}
