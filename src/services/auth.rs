use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, Rng, RngCore};
use zeroize::Zeroize;

use crate::error::{AppError, Result};
use crate::models::user::{PointsSnapshot, User};
use crate::repositories::user as user_repo;
use crate::state::AppState;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 6;

/// Points granted to every fresh account.
const SIGNUP_POINTS: i32 = 15;
/// Points granted to both sides of a referral.
const REFERRAL_BONUS: i32 = 5;
/// Length of the referral code handed to a new account.
const REFERRAL_CODE_LEN: usize = 8;

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the hashed password.
fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Encryption(format!("Hash parse error: {}", e)))?;
    let argon2 = Argon2::default();
    let result = argon2
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Generates an 8-character referral code, uppercase letters and digits.
fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect()
}

/// Creates a new account.
///
/// Every account starts with the signup point grant and mirrors its
/// credentials into the vault for publishing. When a valid referral code is
/// given, both sides receive the bonus and the returned snapshot already
/// includes it.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `username` - The new user's username.
/// * `password` - The new user's password.
/// * `referral_code` - An optional referral code from an existing user.
///
/// # Returns
///
/// A `Result` containing the created `User` and their point balance.
pub async fn signup(
    state: &AppState,
    username: &str,
    password: &str,
    referral_code: Option<&str>,
) -> Result<(User, PointsSnapshot)> {
    tracing::debug!("🔐 Creating user: {}", username);

    if user_repo::find_by_username(&state.db, username).await?.is_some() {
        return Err(AppError::UsernameTaken);
    }

    let password_hash = hash_password(password)?;
    let vaulted_password = state.vault.encrypt(password)?;
    let own_code = generate_referral_code();

    let user = user_repo::create_user(
        &state.db,
        username,
        &password_hash,
        &own_code,
        SIGNUP_POINTS,
        &vaulted_password,
    )
    .await?;
    tracing::info!("✅ User created with ID: {}", user.id);

    let mut points = user.points();

    if let Some(code) = referral_code.map(str::trim).filter(|c| !c.is_empty()) {
        let code = code.to_uppercase();
        if let Some(referrer) = user_repo::find_by_referral_code(&state.db, &code).await? {
            user_repo::award_referral(&state.db, &referrer.id, &user.id, REFERRAL_BONUS).await?;
            tracing::info!(
                "🎁 Referral bonus applied: {} referred by {}",
                user.username,
                referrer.username
            );
            if let Some(updated) = user_repo::get_points(&state.db, &user.id).await? {
                points = updated;
            }
        } else {
            tracing::debug!("Referral code {} did not match any user", code);
        }
    }

    Ok((user, points))
}

/// Authenticates a user.
///
/// A successful login refreshes the vaulted publishing credentials and
/// records the login event.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `username` - The user's username.
/// * `password` - The user's password.
///
/// # Returns
///
/// A `Result` containing the authenticated `User`.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<User> {
    tracing::debug!("🔐 Authenticating user: {}", username);

    let user = user_repo::find_by_username(&state.db, username)
        .await?
        .ok_or(AppError::UnknownUser)?;

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::IncorrectPassword);
    }

    let vaulted_password = state.vault.encrypt(password)?;
    user_repo::update_platform_credentials(&state.db, &user.id, username, &vaulted_password)
        .await?;
    user_repo::record_login(&state.db, &user.id).await?;

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn referral_codes_are_uppercase_alphanumeric() {
        for _ in 0..20 {
            let code = generate_referral_code();
            assert_eq!(code.len(), REFERRAL_CODE_LEN);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn signup_points_cover_three_generations() {
        assert_eq!(SIGNUP_POINTS / crate::services::generation::GENERATION_COST, 3);
    }
}
