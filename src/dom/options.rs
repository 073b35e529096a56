use serde::{Deserialize, Serialize};

/// One `<option>` of a `<select>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub value: String,
    pub label: String,
}

impl DropdownOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }

    /// Placeholder entries ("--Select--") carry an empty or zero value
    pub fn is_placeholder(&self) -> bool {
        let value = self.value.trim();
        value.is_empty() || value == "0"
    }
}
