//! Input checks run before anything is dispatched.
//!
//! A rejected input never reaches a store, so no state changes and no
//! request is issued.

use crate::actions::{SignInRequest, SignUpRequest};
use crate::error::ValidationError;

/// Longest accepted todo description, in characters
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Shortest accepted password, in characters
pub const MIN_PASSWORD_LEN: usize = 6;

/// Validates a todo description and returns it trimmed.
///
/// # Errors
///
/// [`ValidationError::EmptyDescription`] for blank input,
/// [`ValidationError::DescriptionTooLong`] past [`MAX_DESCRIPTION_LEN`].
pub fn description(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Whether `email` looks like `local@domain.tld`.
///
/// No whitespace, exactly one `@`, a non-empty local part, and a domain with
/// a dot that has characters on both sides.
///
/// ```
/// use tasksync_client::validation::is_valid_email;
///
/// assert!(is_valid_email("jo@example.com"));
/// assert!(!is_valid_email("jo@example"));
/// assert!(!is_valid_email("jo @example.com"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Validates sign-in credentials.
///
/// # Errors
///
/// The first failing rule: missing field, malformed email, short password.
pub fn sign_in(request: &SignInRequest) -> Result<(), ValidationError> {
    required("email", &request.email)?;
    required("password", request.password.expose())?;
    credentials(&request.email, request.password.expose())
}

/// Validates registration data.
///
/// # Errors
///
/// The first failing rule: missing field, malformed email, short password.
pub fn sign_up(request: &SignUpRequest) -> Result<(), ValidationError> {
    required("name", &request.name)?;
    required("email", &request.email)?;
    required("password", request.password.expose())?;
    credentials(&request.email, request.password.expose())
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}
