//! Event bus
//!
//! Synchronous publish/subscribe keyed by event kind. Subscribers run in
//! registration order on the reducer context, after the mutation that
//! caused the event. A subscriber may issue actions (they enqueue) but
//! must never block on another event.

use reborn_core::{DisconnectReason, NpcId, PlayerId};
use std::collections::{HashMap, HashSet};

/// Typed payload delivered to a file subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum FilePayload {
    /// `.nw` level text
    LevelText(String),
    /// `.gmap` map text
    GmapText(String),
    /// Anything else
    Blob(Vec<u8>),
}

/// Everything the reducer can announce
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    LoggedIn,
    Disconnected { reason: DisconnectReason },
    Reconnected,

    PlayerAdded { id: PlayerId },
    PlayerRemoved { id: PlayerId },
    OtherPlayerUpdate { id: PlayerId },
    PlayerPropsUpdate,
    ChatMessage { id: PlayerId, message: String },
    PrivateMessage { id: PlayerId, message: String },
    ServerText { text: String },
    AdminMessage { text: String },

    LevelEntered { name: String },
    LevelBoardLoaded { name: String },
    FileReceived { name: String, payload: FilePayload },

    NpcAdded { id: NpcId },
    NpcMoved { id: NpcId },
    NpcRemoved { id: NpcId },

    BombAdded { owner: PlayerId, x: f32, y: f32 },
    BombExploded { x: f32, y: f32 },
    ArrowAdded { owner: PlayerId },
    PlayerHurt { attacker: PlayerId, damage: f32 },

    FlagSet { name: String, value: String },
    FlagDeleted { name: String },
}

/// Subscription key derived from each event variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    LoggedIn,
    Disconnected,
    Reconnected,
    PlayerAdded,
    PlayerRemoved,
    OtherPlayerUpdate,
    PlayerPropsUpdate,
    ChatMessage,
    PrivateMessage,
    ServerText,
    AdminMessage,
    LevelEntered,
    LevelBoardLoaded,
    FileReceived,
    NpcAdded,
    NpcMoved,
    NpcRemoved,
    BombAdded,
    BombExploded,
    ArrowAdded,
    PlayerHurt,
    FlagSet,
    FlagDeleted,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connected => EventKind::Connected,
            Event::LoggedIn => EventKind::LoggedIn,
            Event::Disconnected { .. } => EventKind::Disconnected,
            Event::Reconnected => EventKind::Reconnected,
            Event::PlayerAdded { .. } => EventKind::PlayerAdded,
            Event::PlayerRemoved { .. } => EventKind::PlayerRemoved,
            Event::OtherPlayerUpdate { .. } => EventKind::OtherPlayerUpdate,
            Event::PlayerPropsUpdate => EventKind::PlayerPropsUpdate,
            Event::ChatMessage { .. } => EventKind::ChatMessage,
            Event::PrivateMessage { .. } => EventKind::PrivateMessage,
            Event::ServerText { .. } => EventKind::ServerText,
            Event::AdminMessage { .. } => EventKind::AdminMessage,
            Event::LevelEntered { .. } => EventKind::LevelEntered,
            Event::LevelBoardLoaded { .. } => EventKind::LevelBoardLoaded,
            Event::FileReceived { .. } => EventKind::FileReceived,
            Event::NpcAdded { .. } => EventKind::NpcAdded,
            Event::NpcMoved { .. } => EventKind::NpcMoved,
            Event::NpcRemoved { .. } => EventKind::NpcRemoved,
            Event::BombAdded { .. } => EventKind::BombAdded,
            Event::BombExploded { .. } => EventKind::BombExploded,
            Event::ArrowAdded { .. } => EventKind::ArrowAdded,
            Event::PlayerHurt { .. } => EventKind::PlayerHurt,
            Event::FlagSet { .. } => EventKind::FlagSet,
            Event::FlagDeleted { .. } => EventKind::FlagDeleted,
        }
    }
}

/// Handle returned by subscribe; unsubscribing is O(1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Callback = Box<dyn FnMut(&Event) + Send>;

struct Subscriber {
    token: SubscriptionToken,
    callback: Callback,
}

/// Synchronous event registry
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<Subscriber>>,
    /// Tombstones consumed lazily during emit
    removed: HashSet<SubscriptionToken>,
    next_token: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        self.subscribers.entry(kind).or_default().push(Subscriber {
            token,
            callback: Box::new(callback),
        });
        token
    }

    /// Drop a subscription. O(1): the slot is tombstoned and reclaimed
    /// on the next emit for that kind.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) {
        self.removed.insert(token);
    }

    /// Deliver an event to its subscribers in registration order.
    pub fn emit(&mut self, event: &Event) {
        let Some(subscribers) = self.subscribers.get_mut(&event.kind()) else {
            return;
        };
        if !self.removed.is_empty() {
            subscribers.retain(|s| !self.removed.remove(&s.token));
        }
        for subscriber in subscribers.iter_mut() {
            (subscriber.callback)(event);
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .get(&kind)
            .map(|subs| subs.iter().filter(|s| !self.removed.contains(&s.token)).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscribers_run_in_registration_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        for tag in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::LoggedIn, move |_| order.lock().push(tag));
        }

        bus.emit(&Event::LoggedIn);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();

        let counter = Arc::clone(&count);
        let token = bus.subscribe(EventKind::ChatMessage, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let event = Event::ChatMessage {
            id: PlayerId::new(1),
            message: "hi".into(),
        };
        bus.emit(&event);
        bus.unsubscribe(token);
        bus.emit(&event);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventKind::ChatMessage), 0);
    }

    #[test]
    fn test_events_only_reach_their_kind() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();
        let counter = Arc::clone(&count);
        bus.subscribe(EventKind::LevelEntered, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&Event::LoggedIn);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        bus.emit(&Event::LevelEntered { name: "a.nw".into() });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(
            Event::Disconnected {
                reason: reborn_core::DisconnectReason::ConnectionLost
            }
            .kind(),
            EventKind::Disconnected
        );
        assert_eq!(
            Event::FileReceived {
                name: "a.gmap".into(),
                payload: FilePayload::Blob(vec![])
            }
            .kind(),
            EventKind::FileReceived
        );
    }
}
