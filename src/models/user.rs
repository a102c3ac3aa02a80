use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a user in the system.
///
/// ⚠️ IMPORTANT: `insta_password`, `ig_session_settings` and
/// `ig_challenge_context` hold vault tokens, NOT plaintext. They must go
/// through the credential vault before any use.
#[derive(Debug, Clone)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's username.
    pub username: String,
    /// The user's hashed password (Argon2id PHC string).
    pub password_hash: String,
    /// Points the user has spent on generations.
    pub points_used: i32,
    /// Points the user has earned in total.
    pub total_points: i32,
    /// Whether the user has a premium plan.
    pub is_premium: bool,
    /// The user's own referral code, handed out at signup.
    pub referral_code: String,
    /// The user who referred this one, if any.
    pub referred_by: Option<Uuid>,
    /// How many signups this user has referred.
    pub referrals_count: i32,
    /// The user's Instagram username.
    pub insta_username: Option<String>,
    /// ⚠️ The user's Instagram password, as a vault token.
    pub insta_password: Option<String>,
    /// Device identifier pinned to the saved Instagram session.
    pub ig_device_id: Option<String>,
    /// Installation identifier pinned to the saved Instagram session.
    pub ig_guid: Option<String>,
    /// ⚠️ Pending challenge context, as a vault token. Null when no
    /// challenge is pending.
    pub ig_challenge_context: Option<String>,
    /// ⚠️ Serialized Instagram session settings, as a vault token.
    pub ig_session_settings: Option<String>,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

/// Point balance summary as reported to the client.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PointsSnapshot {
    /// Points earned in total.
    pub total: i32,
    /// Points already spent.
    pub used: i32,
    /// Points still spendable.
    pub available: i32,
}

impl User {
    /// The user's current point balance.
    pub fn points(&self) -> PointsSnapshot {
        PointsSnapshot {
            total: self.total_points,
            used: self.points_used,
            available: self.total_points - self.points_used,
        }
    }
}
