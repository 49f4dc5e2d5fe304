//! Best-effort change announcements

use std::time::Duration;

use huddle_core::Config;
use huddle_net::{Change, FeedClient, FeedEvent};
use tokio::time::timeout;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Publish a change to the feed so watching members refresh.
///
/// Local state is already committed, so a missing feed only costs other
/// viewers their live update.
pub async fn announce(config: &Config, change: Change) {
    let addr = config.realtime.addr.as_str();
    let mut client = match timeout(CONNECT_TIMEOUT, FeedClient::connect(addr)).await {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "Change feed unreachable");
            return;
        }
        Err(_) => {
            debug!(%addr, "Change feed connect timed out");
            return;
        }
    };

    if let Err(e) = client.publish(change).await {
        warn!(error = %e, "Failed to publish change");
    }
    client.disconnect().await;

    // Wait for the queued frame to be written before the runtime exits
    let drained = timeout(CONNECT_TIMEOUT, async {
        while let Some(event) = client.next_event().await {
            if event == FeedEvent::Disconnected {
                break;
            }
        }
    })
    .await;
    if drained.is_err() {
        debug!("Change feed did not close in time");
    }
}
