// Request field validation helpers

use once_cell::sync::Lazy;
use regex::Regex;

/// URL-safe tenant slug: lowercase alphanumerics and hyphens, no leading or
/// trailing hyphen
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex must compile"));

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= 100 && SLUG_RE.is_match(slug)
}

/// Trim a required field; empty after trimming is an error carrying the
/// field name
pub fn trim_and_validate_field(value: &str, field: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional field; a blank value collapses to None
pub fn trim_optional_field(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
