use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle state of a scheduled post.
///
/// `Scheduled` and `OtpRequired` flip back and forth while the user works
/// through a verification challenge. `Completed` and `Failed` are terminal:
/// the delivery loop never picks a post up again once it reaches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    /// Waiting for its scheduled time.
    Scheduled,
    /// Publishing hit an OTP challenge; waiting for the user's code.
    OtpRequired,
    /// Published successfully.
    Completed,
    /// Publishing failed for a non-challenge reason.
    Failed,
}

impl ScheduleStatus {
    /// The status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::OtpRequired => "otp_required",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    /// Parses a stored status string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(ScheduleStatus::Scheduled),
            "otp_required" => Some(ScheduleStatus::OtpRequired),
            "completed" => Some(ScheduleStatus::Completed),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// Represents a deferred publish request, consumed by the delivery loop.
#[derive(Debug, Clone)]
pub struct ScheduledPost {
    /// The unique identifier for the scheduled post.
    pub id: Uuid,
    /// The user who scheduled it.
    pub user_id: Uuid,
    /// Caption to publish with.
    pub caption: String,
    /// Image filename to publish, if any.
    pub image_filename: Option<String>,
    /// When the post should go out.
    pub scheduled_time: DateTime<Utc>,
    /// Target platform. Only "instagram" is handled today.
    pub platform: String,
    /// Current lifecycle state.
    pub status: ScheduleStatus,
    /// Error detail from the last failed or challenged attempt.
    pub error_message: Option<String>,
    /// The timestamp when the post was scheduled.
    pub created_at: DateTime<Utc>,
    /// When the post was published, for completed posts.
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            ScheduleStatus::Scheduled,
            ScheduleStatus::OtpRequired,
            ScheduleStatus::Completed,
            ScheduleStatus::Failed,
        ] {
            assert_eq!(ScheduleStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_does_not_parse() {
        assert_eq!(ScheduleStatus::parse("posting"), None);
        assert_eq!(ScheduleStatus::parse(""), None);
    }
}
