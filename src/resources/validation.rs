//! Pre-flight field checks shared by the resource kinds.
//!
//! Each check returns an actionable reason naming the offending value and an
//! example of an accepted one.

use super::PREVIEW_PREFIX;

/// Longest display name the remote accepts.
pub const MAX_DISPLAY_NAME_CHARS: usize = 255;

const SITE_ID_LEN: usize = 24;

/// Checks a site identifier: 24 lowercase hex characters, or a dry-run
/// preview identifier.
///
/// # Errors
///
/// Returns the reason when the identifier is empty or malformed.
pub fn site_id(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(String::from(
            "site id is required; find it under Site settings > General (e.g. 5f0c8c9e1c9d440000e8d8c4)",
        ));
    }
    if value.starts_with(PREVIEW_PREFIX) {
        return Ok(());
    }
    let is_hex = value
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, 'a'..='f'));
    if value.len() != SITE_ID_LEN || !is_hex {
        return Err(format!(
            "site id must be {SITE_ID_LEN} lowercase hexadecimal characters, got `{value}` (e.g. 5f0c8c9e1c9d440000e8d8c4)"
        ));
    }
    Ok(())
}

/// Checks a redirect path: non-empty, rooted at `/`, and limited to
/// `[A-Za-z0-9-_/.]`.
///
/// # Errors
///
/// Returns the reason when the path is empty, relative, or contains other
/// characters.
pub fn url_path(label: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!(
            "{label} is required; use a path starting with '/' such as /old-page"
        ));
    }
    if !value.starts_with('/') {
        return Err(format!(
            "{label} must start with '/', got `{value}` (e.g. /blog/2024)"
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '/' | '.')))
    {
        return Err(format!(
            "{label} contains `{bad}` in `{value}`; only letters, digits, '-', '_', '/' and '.' are allowed"
        ));
    }
    Ok(())
}

/// Checks a redirect status code: 301 (permanent) or 302 (temporary).
///
/// # Errors
///
/// Returns the reason for any other code.
pub fn redirect_status(code: u16) -> Result<(), String> {
    match code {
        301 | 302 => Ok(()),
        other => Err(format!(
            "status code must be 301 (permanent) or 302 (temporary), got {other}"
        )),
    }
}

/// Checks that a required identifier is present.
///
/// # Errors
///
/// Returns the reason when the value is blank.
pub fn required(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{label} is required"));
    }
    Ok(())
}

/// Checks a site display name: 1 to 255 characters.
///
/// # Errors
///
/// Returns the reason when the name is blank or too long.
pub fn display_name(value: &str) -> Result<(), String> {
    required("display name", value)?;
    let length = value.chars().count();
    if length > MAX_DISPLAY_NAME_CHARS {
        return Err(format!(
            "display name is {length} characters; the limit is {MAX_DISPLAY_NAME_CHARS}"
        ));
    }
    Ok(())
}

/// Checks a site short name: a lowercase slug such as `my-site-2`.
///
/// # Errors
///
/// Returns the reason when the value is not a slug.
pub fn short_name(value: &str) -> Result<(), String> {
    let is_slug = !value.is_empty()
        && value
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit()));
    if !is_slug {
        return Err(format!(
            "short name must be lowercase letters and digits joined by single hyphens, got `{value}` (e.g. my-site)"
        ));
    }
    Ok(())
}
