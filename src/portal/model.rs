use crate::error::{WorkflowError, WorkflowResult};
use crate::portal::names;
use serde::{Deserialize, Serialize};

/// Caller-supplied search input, immutable for the whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Registration year as shown in the year dropdown (its option value)
    pub year: String,
    pub district: String,
    pub taluka: String,
    pub village: String,
    pub property_number: String,
}

impl SearchCriteria {
    pub fn new(
        year: impl Into<String>,
        district: impl Into<String>,
        taluka: impl Into<String>,
        village: impl Into<String>,
        property_number: impl Into<String>,
    ) -> WorkflowResult<Self> {
        let criteria = Self {
            year: year.into().trim().to_string(),
            district: district.into().trim().to_string(),
            taluka: taluka.into().trim().to_string(),
            village: village.into().trim().to_string(),
            property_number: property_number.into().trim().to_string(),
        };
        criteria.validate()?;
        Ok(criteria)
    }

    /// Reject criteria that could never produce a usable search or storage path
    pub fn validate(&self) -> WorkflowResult<()> {
        if names::digits_only(&self.year).is_empty() {
            return Err(WorkflowError::InvalidCriteria(format!("year `{}` contains no digits", self.year)));
        }
        if self.property_number.is_empty() {
            return Err(WorkflowError::InvalidCriteria("property number is empty".to_string()));
        }
        Ok(())
    }
}

/// One captcha challenge and what the OCR engine read from it
#[derive(Debug, Clone, Default)]
pub struct CaptchaAttempt {
    /// PNG capture of the challenge, empty when it could not be captured
    pub image: Vec<u8>,
    pub text: String,
}

/// Labels currently selected in the cascade dropdowns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSelection {
    pub district: String,
    pub taluka: String,
    pub village: String,
}

impl CascadeSelection {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self {
            district: criteria.district.clone(),
            taluka: criteria.taluka.clone(),
            village: criteria.village.clone(),
        }
    }
}

/// One data row of the results grid.
///
/// Only `(page, row)` identifies a row; nothing here refers to a live element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultRow {
    pub doc_number: String,
    pub doc_type: String,
    pub reg_date: String,
    pub sro_name: String,
    pub page: usize,
}

impl SearchResultRow {
    /// Build a record from the cell texts of the `index`-th data row of `page`
    pub fn from_cells(cells: &[String], index: usize, page: usize) -> Self {
        let cell = |i: usize| cells.get(i).map(|c| c.trim()).filter(|c| !c.is_empty());
        Self {
            doc_number: cell(0).map(str::to_string).unwrap_or_else(|| format!("Unknown_{}", index + 1)),
            doc_type: cell(1).unwrap_or("Unknown").to_string(),
            reg_date: cell(2).unwrap_or("Unknown").to_string(),
            sro_name: cell(3).unwrap_or("Unknown").to_string(),
            page,
        }
    }
}

/// Extraction and storage key of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    /// Always digits only
    pub year: String,
    pub district: String,
    pub taluka: String,
    pub village: String,
    pub property_number: String,
    pub doc_number: Option<String>,
    pub doc_type: Option<String>,
    pub reg_date: Option<String>,
    pub sro_name: Option<String>,
    pub page: Option<usize>,
}

impl PropertyInfo {
    /// Key for a document reached through a results row
    pub fn for_row(criteria: &SearchCriteria, selection: &CascadeSelection, row: &SearchResultRow) -> Self {
        let year = names::year_from_date(&row.reg_date).unwrap_or_else(|| names::digits_only(&criteria.year));
        Self {
            year,
            district: selection.district.clone(),
            taluka: selection.taluka.clone(),
            village: selection.village.clone(),
            property_number: format!("{}_{}", criteria.property_number, row.doc_number),
            doc_number: Some(row.doc_number.clone()),
            doc_type: Some(row.doc_type.clone()),
            reg_date: Some(row.reg_date.clone()),
            sro_name: Some(row.sro_name.clone()),
            page: Some(row.page),
        }
    }

    /// Key for the single document reached without a results grid
    pub fn for_criteria(criteria: &SearchCriteria, selection: &CascadeSelection) -> Self {
        Self {
            year: names::digits_only(&criteria.year),
            district: selection.district.clone(),
            taluka: selection.taluka.clone(),
            village: selection.village.clone(),
            property_number: criteria.property_number.clone(),
            doc_number: None,
            doc_type: None,
            reg_date: None,
            sro_name: None,
            page: None,
        }
    }
}

/// Terminal result of one extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub success: bool,
    /// Archive identifier on success, otherwise the local path of whatever was produced
    pub artifact: Option<String>,
    pub file_name: String,
    pub property_number: String,
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadOutcome {
    pub fn succeeded(info: &PropertyInfo, file_name: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            success: true,
            artifact: Some(artifact.into()),
            file_name: file_name.into(),
            property_number: info.property_number.clone(),
            page: info.page,
            error: None,
        }
    }

    pub fn failed(info: &PropertyInfo, file_name: impl Into<String>, artifact: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            artifact,
            file_name: file_name.into(),
            property_number: info.property_number.clone(),
            page: info.page,
            error: Some(error.into()),
        }
    }
}

/// Mode flags of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Enumerate rows across all pages without extracting anything
    pub navigation_only: bool,
    /// Extract every row even when the legacy single-document path would apply
    pub download_all: bool,
}

/// Aggregate result of one run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunReport {
    Navigation {
        records: Vec<SearchResultRow>,
        /// Where the records were persisted
        results_file: Option<String>,
    },
    Downloads {
        outcomes: Vec<DownloadOutcome>,
    },
}

impl RunReport {
    pub fn count(&self) -> usize {
        match self {
            RunReport::Navigation { records, .. } => records.len(),
            RunReport::Downloads { outcomes } => outcomes.len(),
        }
    }
}
