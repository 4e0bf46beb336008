/// Controllers behind the user route table.
///
/// `users` holds the account CRUD handlers (signup, profile, admin); `session` holds the
/// login/logout pair that issues and ends tokens.
pub mod session;
pub mod users;

use crate::error::AppError;

const MAX_PSEUDO_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;

/// Trims a pseudo and checks its length.
pub(crate) fn validate_pseudo(raw: &str) -> Result<String, AppError> {
    let pseudo = raw.trim();
    if pseudo.is_empty() {
        return Err(AppError::invalid_input("A user must have a pseudo"));
    }
    if pseudo.chars().count() > MAX_PSEUDO_LEN {
        return Err(AppError::invalid_input(format!(
            "A pseudo must have at most {MAX_PSEUDO_LEN} characters"
        )));
    }
    Ok(pseudo.to_string())
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid_input(format!(
            "A password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Normalizes an email to lowercase and applies a basic format check.
pub(crate) fn validate_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::invalid_input("Please provide a valid email"));
    }
    Ok(email)
}

/// Trims free-text optional fields; blank values count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
