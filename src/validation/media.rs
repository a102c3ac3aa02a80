use crate::error::{AppError, Result};

/// Validates a client-supplied image filename before it reaches any path
/// construction. The ownership check in the database is the real gate;
/// this keeps traversal attempts from ever touching the filesystem.
///
/// # Arguments
///
/// * `filename` - The filename to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the filename is safe to use.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(AppError::Validation("Filename required".to_string()));
    }

    if filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.contains('\0')
    {
        return Err(AppError::Validation("Invalid filename".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_generated_filenames() {
        assert!(validate_filename("img_20250101120000.png").is_ok());
        assert!(validate_filename("img_20250101120000_caption.json").is_ok());
    }

    #[test]
    fn rejects_empty_and_traversal_attempts() {
        assert!(validate_filename("").is_err());
        assert!(validate_filename("../secret.png").is_err());
        assert!(validate_filename("a/b.png").is_err());
        assert!(validate_filename("a\\b.png").is_err());
        assert!(validate_filename("img\0.png").is_err());
    }
}
