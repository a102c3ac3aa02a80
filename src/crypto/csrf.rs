use crate::error::Result;
use rand::RngCore;
use rand::rngs::OsRng;
use base64::{Engine as _, engine::general_purpose};
use subtle::ConstantTimeEq;

/// The size of the CSRF token in bytes.
const CSRF_TOKEN_SIZE: usize = 32;

/// Generates a new random CSRF token.
///
/// # Returns
///
/// A URL-safe base64-encoded CSRF token.
pub fn generate_csrf_token() -> Result<String> {
    let mut token = [0u8; CSRF_TOKEN_SIZE];
    OsRng
        .fill_bytes(&mut token);

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(token))
}

/// Compares the cookie and header copies of the token in constant time.
pub fn tokens_match(cookie_token: &str, header_token: &str) -> bool {
    cookie_token
        .as_bytes()
        .ct_eq(header_token.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_csrf_token().unwrap();
        let b = generate_csrf_token().unwrap();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn matching_is_exact() {
        let token = generate_csrf_token().unwrap();
        assert!(tokens_match(&token, &token));
        assert!(!tokens_match(&token, "something-else"));
        assert!(!tokens_match(&token, &token[..token.len() - 1]));
    }
}
