//! Input checks shared by several handlers.

use crate::error::{ApiError, ApiResult};

/// Usernames double as page paths, so these are taken by the site itself.
const RESERVED_USERNAMES: &[&str] = &[
    "api", "dashboard", "explore", "login", "logout", "register", "settings", "uploads", "robots.txt",
    "sitemap.xml", "favicon.ico",
];

pub const USERNAME_MAX_LEN: usize = 32;

pub fn username(value: &str) -> ApiResult<()> {
    let len = value.chars().count();
    if !(3..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ApiError::validation(format!("username must be 3-{USERNAME_MAX_LEN} characters")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ApiError::validation(
            "username may only contain lowercase letters, digits, '_' and '-'",
        ));
    }
    if RESERVED_USERNAMES.contains(&value) {
        return Err(ApiError::validation("username is reserved"));
    }
    Ok(())
}

/// Light syntactic check: one '@', non-empty local part, dotted domain.
pub fn email(value: &str) -> ApiResult<()> {
    let invalid = || ApiError::validation(format!("invalid email address: {value}"));
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(())
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn max_len(field: &str, value: &str, max: usize) -> ApiResult<()> {
    if value.chars().count() > max {
        return Err(ApiError::validation(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

pub fn required(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Absolute http(s) URL or a path into our own upload store.
pub fn image_url(field: &str, value: &str) -> ApiResult<()> {
    if value.starts_with("https://") || value.starts_with("http://") || value.starts_with("/uploads/") {
        return Ok(());
    }
    Err(ApiError::validation(format!("{field} must be an http(s) URL")))
}
