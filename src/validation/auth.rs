use crate::error::{AppError, Result};

/// Validates a signup or login credential pair.
///
/// # Arguments
///
/// * `username` - The username to validate.
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the credentials are acceptable.
pub fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required.".to_string(),
        ));
    }

    if username.len() > 100 {
        return Err(AppError::Validation(
            "Username must be at most 100 characters".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_credentials() {
        assert!(validate_credentials("maria", "hunter2hunter2").is_ok());
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(validate_credentials("", "password").is_err());
        assert!(validate_credentials("maria", "").is_err());
        assert!(validate_credentials("   ", "password").is_err());
    }

    #[test]
    fn rejects_oversized_fields() {
        assert!(validate_credentials(&"u".repeat(101), "password").is_err());
        assert!(validate_credentials("maria", &"p".repeat(129)).is_err());
    }
}
