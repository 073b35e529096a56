//! Name and path helpers for stored artifacts

use crate::portal::model::PropertyInfo;
use std::path::{Path, PathBuf};

pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Year of a `DD/MM/YYYY` registration date
pub fn year_from_date(date: &str) -> Option<String> {
    let (_, last) = date.trim().rsplit_once('/')?;
    let year = digits_only(last);
    (!year.is_empty()).then_some(year)
}

/// Make a label safe to use as a single path component
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" => "Unknown".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

/// `{root}/{year}/{district}/{taluka}/{village}/{property_number}`
pub fn artifact_dir(root: &Path, info: &PropertyInfo) -> PathBuf {
    [&info.year, &info.district, &info.taluka, &info.village, &info.property_number]
        .iter()
        .fold(root.to_path_buf(), |path, part| path.join(sanitize_component(part)))
}

/// `Index-2_{district}_{village}_{property_number}_{year}.{extension}`
pub fn artifact_file_name(info: &PropertyInfo, extension: &str) -> String {
    format!("Index-2_{}.{}", file_stem_suffix(info), extension)
}

/// File name of salvaged frame markup
pub fn frame_file_name(info: &PropertyInfo) -> String {
    format!("Index-2_iframe_{}.html", file_stem_suffix(info))
}

fn file_stem_suffix(info: &PropertyInfo) -> String {
    format!(
        "{}_{}_{}_{}",
        sanitize_component(&info.district),
        sanitize_component(&info.village),
        sanitize_component(&info.property_number),
        sanitize_component(&info.year)
    )
}
