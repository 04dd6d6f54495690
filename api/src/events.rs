//! In-process publish/subscribe for live tournament updates.
//!
//! Events are delivered synchronously to whoever is listening at the moment
//! of emission. Nothing is buffered or replayed, and there is no cap on the
//! number of listeners per tournament.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use payloads::TournamentId;
use payloads::responses::TournamentEvent;
use serde_json::Value;

use crate::time::TimeSource;

/// Callback receiving every event emitted for a tournament.
pub type Listener = Arc<dyn Fn(&TournamentEvent) + Send + Sync>;

/// Name of the channel carrying events for `tournament_id`.
pub fn channel_key(tournament_id: &TournamentId) -> String {
    format!("tournament:{tournament_id}")
}

struct Shared {
    /// Listeners per channel, in subscription order.
    channels: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
    next_listener_id: AtomicU64,
    time_source: TimeSource,
}

impl Shared {
    fn channels(&self) -> MutexGuard<'_, HashMap<String, Vec<(u64, Listener)>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, channel: &str, listener_id: u64) {
        let mut channels = self.channels();
        if let Some(listeners) = channels.get_mut(channel) {
            listeners.retain(|(id, _)| *id != listener_id);
            if listeners.is_empty() {
                channels.remove(channel);
            }
        }
    }
}

/// The tournament event bus. Clones share the same listeners.
///
/// The server creates one at startup and hands it to the routes as
/// `web::Data<EventBus>`; tests create their own.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.shared.channels().len())
            .finish()
    }
}

impl EventBus {
    pub fn new(time_source: TimeSource) -> Self {
        Self {
            shared: Arc::new(Shared {
                channels: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(0),
                time_source,
            }),
        }
    }

    /// Subscribe `listener` to the events of one tournament.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped, so `let _ = bus.on_tournament(..)` registers
    /// nothing lasting. Call [`Subscription::detach`] to keep the listener
    /// until [`EventBus::shutdown`].
    pub fn on_tournament(
        &self,
        tournament_id: &TournamentId,
        listener: impl Fn(&TournamentEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let channel = channel_key(tournament_id);
        let listener_id =
            self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .channels()
            .entry(channel.clone())
            .or_default()
            .push((listener_id, Arc::new(listener)));
        tracing::debug!(%channel, listener_id, "listener subscribed");

        Subscription {
            shared: Arc::downgrade(&self.shared),
            channel,
            listener_id,
        }
    }

    /// Build an event stamped with the current time and deliver it to every
    /// listener of the tournament, in subscription order. Returns the number
    /// of listeners reached.
    pub fn emit_tournament(
        &self,
        tournament_id: &TournamentId,
        kind: impl Into<String>,
        payload: Option<Value>,
    ) -> usize {
        self.deliver(&self.new_event(tournament_id, kind, payload))
    }

    /// An event for `tournament_id` stamped with the bus clock.
    pub fn new_event(
        &self,
        tournament_id: &TournamentId,
        kind: impl Into<String>,
        payload: Option<Value>,
    ) -> TournamentEvent {
        TournamentEvent {
            kind: kind.into(),
            tournament_id: tournament_id.clone(),
            payload,
            timestamp: self.shared.time_source.now(),
        }
    }

    /// Deliver an already built event.
    pub fn deliver(&self, event: &TournamentEvent) -> usize {
        let channel = channel_key(&event.tournament_id);
        // Listeners are called without the lock held so they may subscribe
        // or unsubscribe themselves.
        let listeners: Vec<Listener> = self
            .shared
            .channels()
            .get(&channel)
            .map(|listeners| {
                listeners.iter().map(|(_, l)| l.clone()).collect()
            })
            .unwrap_or_default();

        for listener in &listeners {
            listener(event);
        }
        tracing::debug!(
            %channel,
            kind = %event.kind,
            delivered = listeners.len(),
            "tournament event emitted"
        );
        listeners.len()
    }

    pub fn listener_count(&self, tournament_id: &TournamentId) -> usize {
        self.shared
            .channels()
            .get(&channel_key(tournament_id))
            .map_or(0, Vec::len)
    }

    /// Drop every listener. The bus stays usable, but events emitted
    /// afterwards only reach listeners subscribed after the shutdown.
    pub fn shutdown(&self) {
        let dropped = std::mem::take(&mut *self.shared.channels());
        tracing::info!(channels = dropped.len(), "event bus shut down");
    }
}

/// Handle to a registered listener.
///
/// Dropping it unsubscribes the listener, so hold on to it for as long as
/// events should arrive.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    shared: Weak<Shared>,
    channel: String,
    listener_id: u64,
}

impl Subscription {
    /// Remove exactly this listener.
    pub fn unsubscribe(self) {}

    /// Give up the handle without unsubscribing. The listener then lives
    /// until the bus shuts down.
    pub fn detach(mut self) {
        tracing::debug!(
            channel = %self.channel,
            listener_id = self.listener_id,
            "listener detached"
        );
        self.shared = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.remove(&self.channel, self.listener_id);
            tracing::debug!(
                channel = %self.channel,
                listener_id = self.listener_id,
                "listener unsubscribed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[cfg(feature = "mock-time")]
    fn bus() -> EventBus {
        EventBus::new(TimeSource::new("2025-01-01T00:00:00Z".parse().unwrap()))
    }

    #[cfg(not(feature = "mock-time"))]
    fn bus() -> EventBus {
        EventBus::new(TimeSource::new())
    }

    type Received = Arc<Mutex<Vec<TournamentEvent>>>;

    fn recorder() -> (Received, impl Fn(&TournamentEvent) + Send + Sync) {
        let received = Received::default();
        let sink = received.clone();
        (received, move |event: &TournamentEvent| {
            sink.lock().unwrap().push(event.clone())
        })
    }

    #[test]
    fn listener_receives_event_envelope() {
        let bus = bus();
        let id = TournamentId::from("test-tournament-123");
        let (received, listener) = recorder();
        let _subscription = bus.on_tournament(&id, listener);

        let delivered =
            bus.emit_tournament(&id, "MATCH_UPDATE", Some(json!({ "matchId": "m1" })));

        assert_eq!(delivered, 1);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, "MATCH_UPDATE");
        assert_eq!(received[0].tournament_id, id);
        assert_eq!(received[0].payload, Some(json!({ "matchId": "m1" })));
    }

    #[cfg(feature = "mock-time")]
    #[test]
    fn events_are_stamped_with_bus_clock() {
        let time_source = TimeSource::new("2025-03-01T12:00:00Z".parse().unwrap());
        let bus = EventBus::new(time_source.clone());
        let id = TournamentId::from("clock");
        let (received, listener) = recorder();
        let _subscription = bus.on_tournament(&id, listener);

        bus.emit_tournament(&id, "A", None);
        time_source.advance(jiff::Span::new().minutes(5));
        bus.emit_tournament(&id, "B", None);

        let received = received.lock().unwrap();
        assert_eq!(received[0].timestamp.to_string(), "2025-03-01T12:00:00Z");
        assert_eq!(received[1].timestamp.to_string(), "2025-03-01T12:05:00Z");
    }

    #[test]
    fn unsubscribed_listener_receives_nothing_more() {
        let bus = bus();
        let id = TournamentId::from("unsub-test");
        let (received, listener) = recorder();
        let subscription = bus.on_tournament(&id, listener);

        bus.emit_tournament(&id, "EVENT_1", None);
        subscription.unsubscribe();
        assert_eq!(bus.emit_tournament(&id, "EVENT_2", None), 0);

        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count(&id), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = bus();
        let id = TournamentId::from("drop-test");
        let (received, listener) = recorder();
        drop(bus.on_tournament(&id, listener));

        bus.emit_tournament(&id, "EVENT", None);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn detached_listener_outlives_its_handle() {
        let bus = bus();
        let id = TournamentId::from("detach-test");
        let (received, listener) = recorder();
        bus.on_tournament(&id, listener).detach();

        assert_eq!(bus.listener_count(&id), 1);
        assert_eq!(bus.emit_tournament(&id, "EVENT", None), 1);
        assert_eq!(received.lock().unwrap().len(), 1);

        bus.shutdown();
        assert_eq!(bus.listener_count(&id), 0);
    }

    #[test]
    fn events_are_isolated_by_tournament() {
        let bus = bus();
        let (received_a, listener_a) = recorder();
        let (received_b, listener_b) = recorder();
        let _a = bus.on_tournament(&"tournament-A".into(), listener_a);
        let _b = bus.on_tournament(&"tournament-B".into(), listener_b);

        bus.emit_tournament(&"tournament-A".into(), "TEST", None);

        assert_eq!(received_a.lock().unwrap().len(), 1);
        assert!(received_b.lock().unwrap().is_empty());
    }

    #[test]
    fn emit_without_payload_leaves_it_empty() {
        let bus = bus();
        let id = TournamentId::from("no-payload");
        let (received, listener) = recorder();
        let _subscription = bus.on_tournament(&id, listener);

        bus.emit_tournament(&id, "TOURNAMENT_START", None);

        assert_eq!(received.lock().unwrap()[0].payload, None);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let bus = bus();
        let id = TournamentId::from("multi-listener");
        let order = Arc::new(Mutex::new(Vec::new()));
        let subscriptions: Vec<_> = (1..=3)
            .map(|n| {
                let order = order.clone();
                bus.on_tournament(&id, move |_| order.lock().unwrap().push(n))
            })
            .collect();

        let delivered =
            bus.emit_tournament(&id, "BROADCAST", Some(json!({ "message": "Hello" })));

        assert_eq!(delivered, 3);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
        drop(subscriptions);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let bus = bus();
        let id = TournamentId::from("shared");
        let (first, first_listener) = recorder();
        let (second, second_listener) = recorder();
        let subscription = bus.on_tournament(&id, first_listener);
        let _kept = bus.on_tournament(&id, second_listener);

        subscription.unsubscribe();
        bus.emit_tournament(&id, "EVENT", None);

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count(&id), 1);
    }

    #[test]
    fn late_subscriber_sees_no_past_events() {
        let bus = bus();
        let id = TournamentId::from("late");
        assert_eq!(bus.emit_tournament(&id, "EARLY", None), 0);

        let (received, listener) = recorder();
        let _subscription = bus.on_tournament(&id, listener);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn listener_may_subscribe_during_delivery() {
        let bus = bus();
        let id = TournamentId::from("reentrant");
        let nested = Arc::new(Mutex::new(Vec::new()));
        let inner = bus.clone();
        let held = nested.clone();
        let _subscription = bus.on_tournament(&id, move |event| {
            let subscription = inner.on_tournament(&event.tournament_id, |_| {});
            held.lock().unwrap().push(subscription);
        });

        assert_eq!(bus.emit_tournament(&id, "EVENT", None), 1);
        assert_eq!(bus.listener_count(&id), 2);
    }

    #[test]
    fn clones_share_listeners() {
        let bus = bus();
        let clone = bus.clone();
        let id = TournamentId::from("shared-registry");
        let (received, listener) = recorder();
        let _subscription = bus.on_tournament(&id, listener);

        assert_eq!(clone.emit_tournament(&id, "EVENT", None), 1);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn shutdown_drops_all_listeners() {
        let bus = bus();
        let id = TournamentId::from("shutdown");
        let (received, listener) = recorder();
        let subscription = bus.on_tournament(&id, listener);

        bus.shutdown();

        assert_eq!(bus.emit_tournament(&id, "EVENT", None), 0);
        assert!(received.lock().unwrap().is_empty());
        // unsubscribing after shutdown is a no-op
        subscription.unsubscribe();
        assert_eq!(bus.listener_count(&id), 0);
    }
}
