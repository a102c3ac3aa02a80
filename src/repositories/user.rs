use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::Result,
    models::user::{PointsSnapshot, User},
};

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        points_used: row.try_get("points_used")?,
        total_points: row.try_get("total_points")?,
        is_premium: row.try_get("is_premium")?,
        referral_code: row.try_get("referral_code")?,
        referred_by: row.try_get("referred_by")?,
        referrals_count: row.try_get("referrals_count")?,
        insta_username: row.try_get("insta_username")?,
        insta_password: row.try_get("insta_password")?,
        ig_device_id: row.try_get("ig_device_id")?,
        ig_guid: row.try_get("ig_guid")?,
        ig_challenge_context: row.try_get("ig_challenge_context")?,
        ig_session_settings: row.try_get("ig_session_settings")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Creates a new user.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `username` - The new user's username.
/// * `password_hash` - The Argon2id hash of the user's password.
/// * `referral_code` - The referral code handed to the new user.
/// * `initial_points` - The point grant the account starts with.
/// * `insta_password` - The vault token of the platform password.
///
/// # Returns
///
/// A `Result` containing the created `User`.
pub async fn create_user(
    pool: &Pool,
    username: &str,
    password_hash: &str,
    referral_code: &str,
    initial_points: i32,
    insta_password: &str,
) -> Result<User> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO users (username, password_hash, referral_code, total_points, insta_username, insta_password)
            VALUES ($1, $2, $3, $4, $1, $5)
            RETURNING *
            "#,
            &[&username, &password_hash, &referral_code, &initial_points, &insta_password],
        )
        .await?;
    row_to_user(&row)
}

/// Finds a user by their username.
pub async fn find_by_username(pool: &Pool, username: &str) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM users
            WHERE username = $1
            "#,
            &[&username],
        )
        .await?;
    row.map(|r| row_to_user(&r)).transpose()
}

/// Finds a user by their ID.
pub async fn find_by_id(pool: &Pool, user_id: &Uuid) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM users
            WHERE id = $1
            "#,
            &[&user_id],
        )
        .await?;
    row.map(|r| row_to_user(&r)).transpose()
}

/// Finds a user by their referral code. Codes are stored uppercase.
pub async fn find_by_referral_code(pool: &Pool, referral_code: &str) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM users
            WHERE referral_code = $1
            "#,
            &[&referral_code],
        )
        .await?;
    row.map(|r| row_to_user(&r)).transpose()
}

/// Overwrites the stored platform credentials. Called on every login so the
/// publishing credentials track the account password.
pub async fn update_platform_credentials(
    pool: &Pool,
    user_id: &Uuid,
    insta_username: &str,
    insta_password: &str,
) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE users
            SET insta_username = $2, insta_password = $3
            WHERE id = $1
            "#,
            &[&user_id, &insta_username, &insta_password],
        )
        .await?;
    Ok(())
}

/// Records a login event.
pub async fn record_login(pool: &Pool, user_id: &Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            INSERT INTO logins (user_id)
            VALUES ($1)
            "#,
            &[&user_id],
        )
        .await?;
    Ok(())
}

/// Awards the referral bonus on signup: the referrer gains points and a
/// referral count, the referee gains points, and one referral row links
/// them. Runs in a transaction.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `referrer_id` - The user whose code was used.
/// * `referee_id` - The freshly signed-up user.
/// * `points` - The bonus awarded to each side.
pub async fn award_referral(
    pool: &Pool,
    referrer_id: &Uuid,
    referee_id: &Uuid,
    points: i32,
) -> Result<()> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    tx.execute(
        r#"
        UPDATE users
        SET total_points = total_points + $2, referrals_count = referrals_count + 1
        WHERE id = $1
        "#,
        &[&referrer_id, &points],
    )
    .await?;
    tx.execute(
        r#"
        UPDATE users
        SET total_points = total_points + $2, referred_by = $3
        WHERE id = $1
        "#,
        &[&referee_id, &points, &referrer_id],
    )
    .await?;
    tx.execute(
        r#"
        INSERT INTO referrals (referrer_id, referee_id, points_awarded)
        VALUES ($1, $2, $3)
        "#,
        &[&referrer_id, &referee_id, &points],
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Reads the user's point balance.
pub async fn get_points(pool: &Pool, user_id: &Uuid) -> Result<Option<PointsSnapshot>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT total_points, points_used
            FROM users
            WHERE id = $1
            "#,
            &[&user_id],
        )
        .await?;
    row.map(|r| {
        let total: i32 = r.try_get("total_points")?;
        let used: i32 = r.try_get("points_used")?;
        Ok(PointsSnapshot {
            total,
            used,
            available: total - used,
        })
    })
    .transpose()
}

/// Debits points for a generation, guarded so the balance can never go
/// negative. Returns the post-debit snapshot, or `None` when the guard
/// rejected the debit.
pub async fn debit_points(
    pool: &Pool,
    user_id: &Uuid,
    cost: i32,
) -> Result<Option<PointsSnapshot>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            UPDATE users
            SET points_used = points_used + $2
            WHERE id = $1 AND total_points - points_used >= $2
            RETURNING total_points, points_used
            "#,
            &[&user_id, &cost],
        )
        .await?;
    row.map(|r| {
        let total: i32 = r.try_get("total_points")?;
        let used: i32 = r.try_get("points_used")?;
        Ok(PointsSnapshot {
            total,
            used,
            available: total - used,
        })
    })
    .transpose()
}

/// Persists the platform session artifact: the encrypted settings blob plus
/// the device/installation identifiers it was established under. Identifiers
/// are only filled in, never cleared, so an artifact without them keeps the
/// stored identity stable.
pub async fn save_session_artifact(
    pool: &Pool,
    user_id: &Uuid,
    settings_token: &str,
    device_id: Option<&str>,
    install_id: Option<&str>,
) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE users
            SET ig_session_settings = $2,
                ig_device_id = COALESCE($3, ig_device_id),
                ig_guid = COALESCE($4, ig_guid)
            WHERE id = $1
            "#,
            &[&user_id, &settings_token, &device_id, &install_id],
        )
        .await?;
    Ok(())
}

/// Persists a pending challenge: the identity the challenge was raised under
/// and the encrypted opaque context. Overwrites any prior pending challenge
/// for the user.
pub async fn persist_challenge(
    pool: &Pool,
    user_id: &Uuid,
    device_id: &str,
    install_id: &str,
    context_token: &str,
) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE users
            SET ig_device_id = $2, ig_guid = $3, ig_challenge_context = $4
            WHERE id = $1
            "#,
            &[&user_id, &device_id, &install_id, &context_token],
        )
        .await?;
    Ok(())
}

/// Clears the pending challenge context after a successful resolution.
pub async fn clear_challenge_context(pool: &Pool, user_id: &Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE users
            SET ig_challenge_context = NULL
            WHERE id = $1
            "#,
            &[&user_id],
        )
        .await?;
    Ok(())
}
