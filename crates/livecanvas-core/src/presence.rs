//! Cursor presence, chat and ephemeral reactions.

use crate::config::SyncConfig;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl From<Point> for CursorPosition {
    fn from(point: Point) -> Self {
        Self { x: point.x, y: point.y }
    }
}

/// What a peer publishes about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Local cursor overlay state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CursorMode {
    #[default]
    Hidden,
    /// Composing a chat message next to the cursor.
    Chat {
        previous_message: Option<String>,
        message: String,
    },
    /// Reaction picker open.
    ReactionSelector,
    /// Emitting `reaction` while the pointer is pressed.
    Reaction { reaction: String, is_pressed: bool },
}

/// A reaction shown on screen until it expires.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub point: Point,
    pub value: String,
    pub timestamp: Instant,
}

/// Broadcast payload of a reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub value: String,
    pub x: f64,
    pub y: f64,
}

/// Ephemeral presence and broadcast transport.
pub trait PresenceChannel {
    /// Send an event to every other peer.
    fn broadcast(&mut self, event: &ReactionEvent);

    /// Take the events received from other peers.
    fn drain_events(&mut self) -> Vec<ReactionEvent>;

    fn my_presence(&self) -> &Presence;

    /// Replace the local presence and publish it.
    fn update_presence(&mut self, presence: Presence);

    /// Presence of the other peers, by peer id.
    fn others(&self) -> Vec<(u64, Presence)>;
}

/// A fixed-period timer polled with an explicit clock.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period: Duration,
    last: Instant,
}

impl Interval {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self { period, last: start }
    }

    /// True once per elapsed period.
    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.period {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Emits reactions while the pointer is held and expires old ones.
#[derive(Debug, Clone)]
pub struct ReactionBroadcaster {
    emit: Interval,
    prune: Interval,
    ttl: Duration,
    reactions: Vec<Reaction>,
}

impl ReactionBroadcaster {
    pub fn new(config: &SyncConfig, now: Instant) -> Self {
        Self {
            emit: Interval::new(config.reaction_emit_interval(), now),
            prune: Interval::new(config.reaction_prune_interval(), now),
            ttl: config.reaction_ttl(),
            reactions: Vec::new(),
        }
    }

    /// Reactions younger than the TTL at `now`.
    pub fn live_reactions(&self, now: Instant) -> impl Iterator<Item = &Reaction> {
        self.reactions
            .iter()
            .filter(move |r| now.saturating_duration_since(r.timestamp) < self.ttl)
    }

    /// Number of reactions held, expired ones included until the next prune.
    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    /// Advance both timers.
    pub fn tick<P: PresenceChannel + ?Sized>(
        &mut self,
        now: Instant,
        mode: &CursorMode,
        cursor: Option<CursorPosition>,
        channel: &mut P,
    ) {
        if self.emit.ready(now) {
            if let (CursorMode::Reaction { reaction, is_pressed: true }, Some(cursor)) = (mode, cursor) {
                let event = ReactionEvent {
                    value: reaction.clone(),
                    x: cursor.x,
                    y: cursor.y,
                };
                channel.broadcast(&event);
                self.receive(event, now);
            }
        }

        if self.prune.ready(now) {
            let ttl = self.ttl;
            self.reactions
                .retain(|r| now.saturating_duration_since(r.timestamp) < ttl);
        }
    }

    /// Record a reaction, local or from a peer.
    pub fn receive(&mut self, event: ReactionEvent, now: Instant) {
        self.reactions.push(Reaction {
            point: Point::new(event.x, event.y),
            value: event.value,
            timestamp: now,
        });
    }
}
