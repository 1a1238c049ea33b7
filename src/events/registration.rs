//! The reaction-driven registration protocol (§4.F "Reaction-registration
//! protocol", §5 "Reaction events on the same event record are serialized
//! through a single asynchronous lock"). Grounded on
//! `original_source/app/cogs/guild_events.py`'s reaction handlers, with the
//! "ignore-removal" hint reimplemented per §9 Design Notes as a bounded-TTL
//! map guarded by the same per-event lock rather than a separate timing hack.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::{EventId, EventStatus, MemberId, RegistrationBook, RegistrationKind};

/// §4.F: "Record an ignore-removal hint for 3 seconds for the other two
/// markers to suppress auto-removal echoes."
pub const IGNORE_REMOVAL_HINT: Duration = Duration::from_secs(3);

/// The three configured emoji markers for an event's reaction protocol.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    pub presence: String,
    pub tentative: String,
    pub absence: String,
}

impl MarkerSet {
    /// Classifies a raw emoji string; non-matching reactions are ignored
    /// per §4.F ("If the reaction is not one of the three markers, ignore").
    pub fn classify(&self, emoji: &str) -> Option<RegistrationKind> {
        if emoji == self.presence {
            Some(RegistrationKind::Presence)
        } else if emoji == self.tentative {
            Some(RegistrationKind::Tentative)
        } else if emoji == self.absence {
            Some(RegistrationKind::Absence)
        } else {
            None
        }
    }
}

fn other_kinds(kind: RegistrationKind) -> [RegistrationKind; 2] {
    match kind {
        RegistrationKind::Presence => [RegistrationKind::Tentative, RegistrationKind::Absence],
        RegistrationKind::Tentative => [RegistrationKind::Presence, RegistrationKind::Absence],
        RegistrationKind::Absence => [RegistrationKind::Presence, RegistrationKind::Tentative],
    }
}

/// Per-event hint state, held inside the same mutex that guards the
/// registration book's mutation (§5 ordering guarantee).
#[derive(Debug, Default)]
pub struct HintMap {
    ignore_until: HashMap<(MemberId, RegistrationKind), Instant>,
}

impl HintMap {
    fn mark_ignore(&mut self, member: MemberId, kind: RegistrationKind) {
        self.ignore_until.insert((member, kind), Instant::now() + IGNORE_REMOVAL_HINT);
    }

    /// Consumes a pending hint if present and still live; a stale or
    /// absent hint never suppresses a genuine user-initiated removal.
    fn consume_if_live(&mut self, member: MemberId, kind: RegistrationKind) -> bool {
        match self.ignore_until.remove(&(member, kind)) {
            Some(expiry) => Instant::now() < expiry,
            None => false,
        }
    }
}

/// Registers per-event `tokio::sync::Mutex`-guarded hint maps, keyed by
/// event id, so reaction handling for distinct events proceeds in parallel
/// while same-event churn is serialized (§5).
#[derive(Default)]
pub struct EventLocks {
    locks: DashMap<EventId, Arc<Mutex<HintMap>>>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, event_id: EventId) -> Arc<Mutex<HintMap>> {
        self.locks.entry(event_id).or_insert_with(|| Arc::new(Mutex::new(HintMap::default()))).clone()
    }
}

/// On reaction add: moves `member` into `kind`, removing it from the other
/// two sets, and records an ignore-removal hint on those two (§4.F). Caller
/// is responsible for the persist-then-edit-embed ordering after this
/// returns (§5).
pub fn apply_reaction_add(book: &mut RegistrationBook, hints: &mut HintMap, member: MemberId, kind: RegistrationKind) {
    book.set(member, kind);
    for other in other_kinds(kind) {
        hints.mark_ignore(member, other);
    }
}

/// On reaction remove: ignored outright if the event is `Closed` (§9 open
/// question: "the source ignores late removes when status is Closed").
/// A removal that lands inside a live ignore-removal hint window is
/// suppressed (echo of the add's implicit reaction-clearing); otherwise
/// the member is dropped from `kind`. Returns whether the book changed,
/// so the caller knows whether a persist + embed edit is required.
pub fn apply_reaction_remove(
    status: EventStatus,
    book: &mut RegistrationBook,
    hints: &mut HintMap,
    member: MemberId,
    kind: RegistrationKind,
) -> bool {
    if status == EventStatus::Closed {
        return false;
    }
    if hints.consume_if_live(member, kind) {
        return false;
    }
    book.remove(member, kind);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> MarkerSet {
        MarkerSet {
            presence: "✅".to_string(),
            tentative: "❔".to_string(),
            absence: "❌".to_string(),
        }
    }

    #[test]
    fn unrecognized_emoji_classifies_to_none() {
        assert_eq!(markers().classify("🎉"), None);
    }

    #[test]
    fn add_then_switch_keeps_exclusivity() {
        let mut book = RegistrationBook::default();
        let mut hints = HintMap::default();
        let user = MemberId(1);
        apply_reaction_add(&mut book, &mut hints, user, RegistrationKind::Presence);
        assert!(book.presence.contains(&user));
        apply_reaction_add(&mut book, &mut hints, user, RegistrationKind::Absence);
        assert!(!book.presence.contains(&user));
        assert!(book.absence.contains(&user));
        assert!(book.is_exclusive());
    }

    #[test]
    fn removal_within_hint_window_is_suppressed() {
        let mut book = RegistrationBook::default();
        let mut hints = HintMap::default();
        let user = MemberId(1);
        apply_reaction_add(&mut book, &mut hints, user, RegistrationKind::Presence);
        // The switch hinted presence/tentative removal-suppression; simulate
        // an echoed removal of the marker just vacated (absence, tentative).
        let changed = apply_reaction_remove(EventStatus::Planned, &mut book, &mut hints, user, RegistrationKind::Tentative);
        assert!(!changed);
    }

    #[test]
    fn genuine_removal_outside_hint_window_applies() {
        let mut book = RegistrationBook::default();
        let mut hints = HintMap::default();
        let user = MemberId(1);
        book.set(user, RegistrationKind::Presence);
        let changed = apply_reaction_remove(EventStatus::Planned, &mut book, &mut hints, user, RegistrationKind::Presence);
        assert!(changed);
        assert!(!book.presence.contains(&user));
    }

    #[test]
    fn removal_on_closed_event_is_ignored() {
        let mut book = RegistrationBook::default();
        let mut hints = HintMap::default();
        let user = MemberId(1);
        book.set(user, RegistrationKind::Presence);
        let changed = apply_reaction_remove(EventStatus::Closed, &mut book, &mut hints, user, RegistrationKind::Presence);
        assert!(!changed);
        assert!(book.presence.contains(&user));
    }
}
