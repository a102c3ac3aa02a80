//! The scheduled delivery loop.
//!
//! A single background task polls for due posts and runs each through the
//! publish executor. The loop never exits: a cycle that fails (database
//! down, bridge unreachable) is logged and the next cycle runs on schedule.
//! Individual post outcomes land on the `scheduled_posts` row, so the user
//! polls their list to see what happened.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::repositories::scheduled_post as scheduled_repo;
use crate::services::publish::{self, PublishOrigin};
use crate::state::AppState;

/// Upper bound of the due window for one cycle. Posts scheduled up to
/// `lookahead_secs` past now go out in this cycle instead of landing a full
/// poll interval late.
fn due_cutoff(now: DateTime<Utc>, lookahead_secs: u64) -> DateTime<Utc> {
    now + Duration::seconds(lookahead_secs as i64)
}

/// Runs the delivery loop forever.
pub async fn run(state: AppState) {
    let poll = std::time::Duration::from_secs(state.config.scheduler_poll_secs);
    tracing::info!(
        "⏰ Delivery loop started (poll {}s, lookahead {}s)",
        state.config.scheduler_poll_secs,
        state.config.scheduler_lookahead_secs
    );

    loop {
        if let Err(e) = poll_once(&state).await {
            tracing::error!("Scheduler error: {}", e);
        }
        tokio::time::sleep(poll).await;
    }
}

/// One polling cycle: collect due posts, publish each.
async fn poll_once(state: &AppState) -> Result<()> {
    let cutoff = due_cutoff(Utc::now(), state.config.scheduler_lookahead_secs);
    let due = scheduled_repo::due_before(&state.db, &cutoff).await?;

    for post in due {
        tracing::info!("[Scheduler] Processing scheduled post: {}", post.id);
        let filename = post.image_filename.as_deref().unwrap_or("");
        match publish::execute(
            state,
            &post.user_id,
            filename,
            &post.caption,
            true,
            PublishOrigin::Scheduled(post.id),
        )
        .await
        {
            Ok(_) => tracing::info!("[Scheduler] Posted scheduled post {}", post.id),
            Err(e) => tracing::error!("[Scheduler] Failed scheduled post {}: {}", post.id, e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_extends_now_by_the_lookahead() {
        let now = Utc::now();
        assert_eq!(due_cutoff(now, 10) - now, Duration::seconds(10));
        assert_eq!(due_cutoff(now, 0), now);
    }

    #[test]
    fn post_beyond_the_lookahead_window_is_not_due() {
        let now = Utc::now();
        let cutoff = due_cutoff(now, 10);
        let scheduled_time = now + Duration::seconds(15);
        assert!(scheduled_time > cutoff);
    }

    #[test]
    fn posts_inside_the_window_and_overdue_posts_are_due() {
        let now = Utc::now();
        let cutoff = due_cutoff(now, 10);
        assert!(now + Duration::seconds(5) <= cutoff);
        assert!(now - Duration::seconds(120) <= cutoff);
    }
}
