use crate::error::DomainError;

/// Checks DNS syntax of a name. A single trailing dot is allowed, the
/// root name alone is not.
pub fn validate_dns_name(name: &str) -> Result<(), DomainError> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() {
        return Err(DomainError::Empty);
    }
    if trimmed.len() > 253 {
        return Err(DomainError::TooLong(name.to_string()));
    }
    for label in trimmed.split('.') {
        if label.is_empty() {
            return Err(DomainError::EmptyLabel(name.to_string()));
        }
        if label.len() > 63 {
            return Err(DomainError::LabelTooLong(label.to_string()));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainError::Hyphen(label.to_string()));
        }
        // underscore labels are common in SPF hosts (_spf.google.com)
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidChars(label.to_string()));
        }
    }

    Ok(())
}
