//! Interface name canonicalization.
//!
//! Requests name ports either the way they are printed on the chassis
//! (`GigabitEthernet0/13`) or the way the CLI abbreviates them (`Gi0/13`).
//! Listings on the device use the abbreviation, so both forms collapse to
//! the two-letter media prefix followed by the slot/port numbers.

use thiserror::Error;

/// Reasons a submitted interface name cannot be canonicalized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("interface name is empty")]
    Empty,

    #[error("interface '{0}' has no media-type prefix")]
    MissingPrefix(String),

    #[error("interface '{0}' has no port number")]
    MissingNumber(String),

    #[error("interface '{0}' has an invalid port number")]
    InvalidNumber(String),
}

/// Canonicalize to `<Xx><numbers>`, e.g. `GigabitEthernet 0/13` → `Gi0/13`.
///
/// Whitespace is dropped. The prefix is the first two letters of the media
/// word (first upper, second lower); the suffix starts at the first digit
/// and may contain digits, `/`, `.` and `:`.
pub fn normalize_interface(raw: &str) -> Result<String, InterfaceError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(InterfaceError::Empty);
    }

    let Some(split) = compact.find(|c: char| c.is_ascii_digit()) else {
        return Err(InterfaceError::MissingNumber(raw.trim().to_string()));
    };
    let (media, number) = compact.split_at(split);

    let mut letters = media.chars().filter(|c| c.is_ascii_alphabetic());
    let (Some(first), Some(second)) = (letters.next(), letters.next()) else {
        return Err(InterfaceError::MissingPrefix(raw.trim().to_string()));
    };
    if !media
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == '-')
    {
        return Err(InterfaceError::MissingPrefix(raw.trim().to_string()));
    }

    if !number
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '/' | '.' | ':'))
        || number.ends_with(['/', '.', ':'])
    {
        return Err(InterfaceError::InvalidNumber(raw.trim().to_string()));
    }

    Ok(format!(
        "{}{}{}",
        first.to_ascii_uppercase(),
        second.to_ascii_lowercase(),
        number
    ))
}
