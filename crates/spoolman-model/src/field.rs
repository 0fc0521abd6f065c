// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const NAME_MAX_LEN: usize = 64;
pub const COMMENT_MAX_LEN: usize = 1024;
pub const SETTING_KEY_MAX_LEN: usize = 64;
pub const EXTRA_KEY_MAX_LEN: usize = 64;
pub const COLOR_HEX_MAX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    Empty(&'static str),
    TooLong(&'static str, usize),
    NotPositive(&'static str, f64),
    InvalidFormat(&'static str),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(name) => write!(f, "{name} must not be empty"),
            Self::TooLong(name, max) => write!(f, "{name} exceeds max length {max}"),
            Self::NotPositive(name, value) => write!(f, "{name} must be > 0, got {value}"),
            Self::InvalidFormat(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// Short identifying text: names, materials, locations, lot numbers.
pub fn validate_short_text(field: &'static str, value: &str) -> Result<(), ParseError> {
    validate_text(field, value, NAME_MAX_LEN)
}

pub fn validate_text(field: &'static str, value: &str, max: usize) -> Result<(), ParseError> {
    if value.chars().count() > max {
        return Err(ParseError::TooLong(field, max));
    }
    Ok(())
}

pub fn validate_positive(field: &'static str, value: f64) -> Result<(), ParseError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParseError::NotPositive(field, value));
    }
    Ok(())
}

pub fn parse_setting_key(input: &str) -> Result<String, ParseError> {
    if input.is_empty() {
        return Err(ParseError::Empty("setting key"));
    }
    if input.len() > SETTING_KEY_MAX_LEN {
        return Err(ParseError::TooLong("setting key", SETTING_KEY_MAX_LEN));
    }
    if !input
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(ParseError::InvalidFormat(
            "setting key must be alphanumeric with '_', '-' or '.'",
        ));
    }
    Ok(input.to_string())
}

/// RGB or RGBA hex color without a leading `#`, lowercased.
pub fn parse_color_hex(input: &str) -> Result<String, ParseError> {
    let raw = input.strip_prefix('#').unwrap_or(input);
    if raw.len() != 6 && raw.len() != COLOR_HEX_MAX_LEN {
        return Err(ParseError::InvalidFormat(
            "color_hex must be 6 or 8 hex digits",
        ));
    }
    if !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidFormat(
            "color_hex must be 6 or 8 hex digits",
        ));
    }
    Ok(raw.to_ascii_lowercase())
}

/// Extra fields replace as a whole map; every key is length- and
/// charset-checked before any row is written.
pub fn validate_extra(extra: &BTreeMap<String, String>) -> Result<(), ParseError> {
    for key in extra.keys() {
        if key.is_empty() {
            return Err(ParseError::Empty("extra field key"));
        }
        if key.len() > EXTRA_KEY_MAX_LEN {
            return Err(ParseError::TooLong("extra field key", EXTRA_KEY_MAX_LEN));
        }
    }
    Ok(())
}
