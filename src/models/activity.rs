use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents one generated artifact and its lifecycle record.
///
/// The `(user_id, image_filename)` pair is the authorization boundary for
/// every file operation: a filename may only be served, captioned, posted
/// or downloaded by the user whose activity row references it.
#[derive(Debug, Clone)]
pub struct Activity {
    /// The unique identifier for the activity.
    pub id: Uuid,
    /// The user who generated the artifact.
    pub user_id: Uuid,
    /// The prompt that produced it.
    pub prompt: String,
    /// Image filename under the user's media directory.
    pub image_filename: Option<String>,
    /// The caption as produced by the generative API.
    pub generated_caption: Option<String>,
    /// The caption after the user edited it, if they did.
    pub modified_caption: Option<String>,
    /// Caption sidecar filename under the user's caption directory.
    pub caption_filename: Option<String>,
    /// Points spent on this generation.
    pub points_used: i32,
    /// Whether the user downloaded the image.
    pub was_downloaded: bool,
    /// Whether the image was published to the platform.
    pub was_posted: bool,
    /// When the image was downloaded.
    pub download_time: Option<DateTime<Utc>>,
    /// When the image was published.
    pub post_time: Option<DateTime<Utc>>,
    /// The timestamp when the activity was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the activity was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}
