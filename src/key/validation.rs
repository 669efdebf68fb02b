//! Input validation for key material, provider ids, and metadata.
//!
//! Grounded on the original `apikeyrouter.infrastructure.utils.validation`
//! module: same length bounds, same injection-pattern denylist, same
//! metadata shape rules, reimplemented as idiomatic Rust validators.

use super::model::{Metadata, MetadataValue};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("key material cannot be empty")]
    EmptyKeyMaterial,
    #[error("key material must be at least 10 characters")]
    KeyMaterialTooShort,
    #[error("key material must be 500 characters or less")]
    KeyMaterialTooLong,
    #[error("key material contains invalid control characters")]
    KeyMaterialControlChars,
    #[error("key material contains potentially malicious content")]
    KeyMaterialInjection,
    #[error("provider id cannot be empty")]
    EmptyProviderId,
    #[error("provider id must be 100 characters or less")]
    ProviderIdTooLong,
    #[error("provider id must contain only lowercase letters, numbers, underscore, and hyphen")]
    ProviderIdFormat,
    #[error("metadata must have 100 keys or less")]
    MetadataTooManyKeys,
    #[error("metadata nesting must not exceed 4 levels")]
    MetadataTooDeep,
    #[error("metadata keys must be alphanumeric with underscore/hyphen only")]
    MetadataKeyFormat,
    #[error("metadata list values must have 100 entries or less")]
    MetadataListTooLong,
    #[error("metadata values must be primitive types or lists thereof")]
    MetadataValueType,
    #[error("metadata contains potentially malicious content")]
    MetadataInjection,
}

const INJECTION_PATTERNS: &[&str] = &[
    "' or '",
    "' OR '",
    "drop table",
    "union select",
    "$where",
    "$ne",
    "$gt",
    ";",
    "|",
    "$(",
    "<script",
    "javascript:",
    "..",
];

/// Returns true if `value` contains any of the fixed injection-pattern
/// substrings defined in the glossary.
pub fn detect_injection_attempt(value: &str) -> bool {
    let lower = value.to_lowercase();
    INJECTION_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

pub fn validate_key_material(material: &str) -> Result<(), ValidationError> {
    if material.trim().is_empty() {
        return Err(ValidationError::EmptyKeyMaterial);
    }
    if material.chars().any(|c| c.is_control()) {
        return Err(ValidationError::KeyMaterialControlChars);
    }
    let len = material.len();
    if len < 10 {
        return Err(ValidationError::KeyMaterialTooShort);
    }
    if len > 500 {
        return Err(ValidationError::KeyMaterialTooLong);
    }
    if detect_injection_attempt(material) {
        return Err(ValidationError::KeyMaterialInjection);
    }
    Ok(())
}

pub fn validate_provider_id(provider_id: &str) -> Result<(), ValidationError> {
    if provider_id.trim().is_empty() {
        return Err(ValidationError::EmptyProviderId);
    }
    if provider_id.len() > 100 {
        return Err(ValidationError::ProviderIdTooLong);
    }
    let valid_format = provider_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid_format {
        return Err(ValidationError::ProviderIdFormat);
    }
    Ok(())
}

fn validate_metadata_key(key: &str) -> Result<(), ValidationError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ValidationError::MetadataKeyFormat);
    }
    Ok(())
}

fn validate_metadata_value(value: &MetadataValue, depth: usize) -> Result<(), ValidationError> {
    if depth > 4 {
        return Err(ValidationError::MetadataTooDeep);
    }
    match value {
        MetadataValue::String(s) => {
            if detect_injection_attempt(s) {
                return Err(ValidationError::MetadataInjection);
            }
        }
        MetadataValue::Integer(_) | MetadataValue::Float(_) | MetadataValue::Bool(_) => {}
        MetadataValue::List(items) => {
            if items.len() > 100 {
                return Err(ValidationError::MetadataListTooLong);
            }
            for item in items {
                validate_metadata_value(item, depth + 1)?;
            }
        }
        MetadataValue::Map(map) => {
            if map.len() > 100 {
                return Err(ValidationError::MetadataTooManyKeys);
            }
            for (k, v) in map {
                validate_metadata_key(k)?;
                validate_metadata_value(v, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Validate top-level metadata: at most 100 entries, at most 4 levels of
/// nesting, keys alphanumeric (+ underscore/hyphen), values primitive or
/// lists/maps thereof bounded by the same rules.
pub fn validate_metadata(metadata: &Metadata) -> Result<(), ValidationError> {
    if metadata.len() > 100 {
        return Err(ValidationError::MetadataTooManyKeys);
    }
    for (key, value) in metadata {
        validate_metadata_key(key)?;
        validate_metadata_value(value, 1)?;
    }
    Ok(())
}
