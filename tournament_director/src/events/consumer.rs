//! Consumer loop shared by every service.

use super::bus::{EventBus, Subscription};
use super::envelope::{EventEnvelope, Topic, TournamentEvent};
use super::errors::BusResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};

/// Error returned by a handler. Logged by the consumer loop, never fatal.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// One service's reaction to inbound events.
///
/// Delivery is at-least-once, so `handle` must be idempotent.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Consumer group name; each group sees every event once
    fn group(&self) -> &'static str;

    /// Topics this group consumes
    fn topics(&self) -> &'static [Topic];

    /// React to one decoded event
    async fn handle(
        &self,
        envelope: &EventEnvelope,
        event: TournamentEvent,
    ) -> Result<(), HandlerError>;
}

/// Decode an envelope and hand it to `handler`, logging every failure.
///
/// Returns `true` if the handler ran and succeeded.
pub async fn dispatch(handler: &dyn EventHandler, envelope: &EventEnvelope) -> bool {
    let event = match envelope.decode() {
        Ok(Some(event)) => event,
        Ok(None) => {
            log::debug!(
                "[{}] Ignoring event type {}",
                handler.group(),
                envelope.event_type
            );
            return false;
        }
        Err(e) => {
            log::warn!(
                "[{}] Skipping undecodable event {}: {}",
                handler.group(),
                envelope.event_id,
                e
            );
            return false;
        }
    };

    metrics::counter!(
        "events_consumed_total",
        "group" => handler.group(),
        "event_type" => event.event_type()
    )
    .increment(1);

    match handler.handle(envelope, event).await {
        Ok(()) => true,
        Err(e) => {
            log::error!(
                "[{}] Handler failed for {} {}: {}",
                handler.group(),
                envelope.event_type,
                envelope.event_id,
                e
            );
            false
        }
    }
}

/// Subscribe `handler` to each of its topics and consume them in background
/// tasks until `shutdown` flips to `true`.
///
/// Each topic is consumed sequentially, in publish order.
///
/// # Errors
///
/// * `BusError::Unavailable` - a subscription could not be established
pub async fn spawn_consumer(
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    shutdown: watch::Receiver<bool>,
) -> BusResult<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();
    for &topic in handler.topics() {
        let subscription = bus.subscribe(topic, handler.group()).await?;
        log::info!("[{}] Consuming {}", handler.group(), topic);
        handles.push(tokio::spawn(consume(
            subscription,
            handler.clone(),
            shutdown.clone(),
        )));
    }
    Ok(handles)
}

async fn consume(
    mut subscription: Subscription,
    handler: Arc<dyn EventHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            next = subscription.next() => {
                match next {
                    Some(envelope) => {
                        dispatch(handler.as_ref(), &envelope).await;
                    }
                    None => break,
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!(
        "[{}] Stopped consuming {}",
        handler.group(),
        subscription.topic()
    );
}
