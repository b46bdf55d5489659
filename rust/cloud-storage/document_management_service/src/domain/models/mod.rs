//! Domain models

mod account;
mod analytics;
mod audit;
mod conversion;
mod directory;
mod document;
mod folder;
mod share;

pub use account::*;
pub use analytics::*;
pub use audit::*;
pub use conversion::*;
pub use directory::*;
pub use document::*;
pub use folder::*;
pub use share::*;

use crate::domain::error::{Result, VaultError};

/// Trims `value` and checks it is between 1 and `max` characters
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VaultError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(VaultError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Like [required_text] but blank input becomes `None`
pub(crate) fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => required_text(field, value, max).map(Some),
    }
}
