//! Periodic tasks that run beside request handling.
//!
//! Neither task ever surfaces an error: failures are logged and the loop
//! carries on with the next tick.

use crate::session::SessionAuthority;
use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(14 * 60);
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Issues one keep-alive request. Returns whether the target answered with a
/// success status.
pub async fn ping(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(url, status = %response.status(), "Keep-alive ping succeeded");
            true
        }
        Ok(response) => {
            tracing::warn!(url, status = %response.status(), "Keep-alive ping returned non-success status");
            false
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "Keep-alive ping failed");
            false
        }
    }
}

/// Pings `url` every [`KEEPALIVE_INTERVAL`] so an idle free-tier host is not
/// put to sleep.
pub fn spawn_keepalive_task(url: String) {
    tracing::info!(url = %url, interval_secs = KEEPALIVE_INTERVAL.as_secs(), "Starting keep-alive task");

    let client = reqwest::Client::builder()
        .user_agent(concat!("gallery-keepalive/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default();

    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            ping(&client, &url).await;
        }
    });
}

pub fn spawn_session_sweeper(sessions: Arc<SessionAuthority>) {
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + SESSION_SWEEP_INTERVAL, SESSION_SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            let removed = sessions.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, remaining = sessions.len(), "Purged expired sessions");
            }
        }
    });
}
