//! Domain types shared across the cache, store, reconciliation and event
//! modules: the relational projections of `guild_members`, `events_data`,
//! `guild_static_groups` and their supporting catalogue tables (§6).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(pub i32);

/// Role/class taxonomy used by the Group Former's scoring rules (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberClass {
    Tank,
    Healer,
    MeleeDps,
    RangedDps,
    Flanker,
    Unknown,
}

impl MemberClass {
    /// Used by the Group Former's 0.5-weight "DPS-family" class match rule.
    pub fn is_dps_family(self) -> bool {
        matches!(
            self,
            MemberClass::MeleeDps | MemberClass::RangedDps | MemberClass::Flanker
        )
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "Tank" => MemberClass::Tank,
            "Healer" => MemberClass::Healer,
            "Melee DPS" => MemberClass::MeleeDps,
            "Ranged DPS" => MemberClass::RangedDps,
            "Flanker" => MemberClass::Flanker,
            _ => MemberClass::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: GuildId,
    pub guild_lang: String,
    pub guild_name: String,
    pub guild_game: GameId,
    pub guild_server: Option<String>,
    pub initialized: bool,
    pub premium: bool,
    pub guild_ptb: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildRoles {
    pub members: Option<i64>,
    pub absent_members: Option<i64>,
    pub rules_ok: Option<i64>,
    pub guild_master: Option<i64>,
    pub officer: Option<i64>,
    pub guardian: Option<i64>,
    pub allies: Option<i64>,
    pub diplomats: Option<i64>,
    pub friends: Option<i64>,
    pub applicant: Option<i64>,
    pub config_ok: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildChannels {
    pub events_channel: Option<i64>,
    pub members_channel: Option<i64>,
    pub members_m1: Option<i64>,
    pub members_m2: Option<i64>,
    pub members_m3: Option<i64>,
    pub members_m4: Option<i64>,
    pub members_m5: Option<i64>,
    pub rules_channel: Option<i64>,
    pub rules_message: Option<i64>,
    pub abs_channel: Option<i64>,
    pub forum_members_channel: Option<i64>,
    pub groups_channel: Option<i64>,
    pub statics_channel: Option<i64>,
    pub statics_message: Option<i64>,
    pub notifications_channel: Option<i64>,
    pub create_room_channel: Option<i64>,
    pub external_recruitment_channel: Option<i64>,
    pub external_recruitment_message: Option<i64>,
    pub voice_war_channel: Option<i64>,
}

/// The Roster Projection row: `guild_members` joined against its derived
/// class, keyed (guild, member) as the data model requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub guild_id: GuildId,
    pub member_id: MemberId,
    pub username: String,
    pub language: String,
    pub gs: i32,
    pub build: Option<String>,
    pub weapons: String,
    pub class: String,
    pub dkp: i64,
    pub nb_events: i32,
    pub registrations: i32,
    pub attendances: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Planned,
    Confirmed,
    Closed,
    Canceled,
}

/// The three disjoint registration sets; membership in at most one is an
/// invariant enforced by `RegistrationBook::set` (§3, §8 property 6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationBook {
    pub presence: HashSet<MemberId>,
    pub tentative: HashSet<MemberId>,
    pub absence: HashSet<MemberId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationKind {
    Presence,
    Tentative,
    Absence,
}

impl RegistrationBook {
    /// Moves `member` into `kind`, first removing it from the other two
    /// sets so the exclusivity invariant holds at every call boundary.
    pub fn set(&mut self, member: MemberId, kind: RegistrationKind) {
        self.presence.remove(&member);
        self.tentative.remove(&member);
        self.absence.remove(&member);
        match kind {
            RegistrationKind::Presence => self.presence.insert(member),
            RegistrationKind::Tentative => self.tentative.insert(member),
            RegistrationKind::Absence => self.absence.insert(member),
        };
    }

    pub fn remove(&mut self, member: MemberId, kind: RegistrationKind) {
        match kind {
            RegistrationKind::Presence => self.presence.remove(&member),
            RegistrationKind::Tentative => self.tentative.remove(&member),
            RegistrationKind::Absence => self.absence.remove(&member),
        };
    }

    pub fn kind_of(&self, member: MemberId) -> Option<RegistrationKind> {
        if self.presence.contains(&member) {
            Some(RegistrationKind::Presence)
        } else if self.tentative.contains(&member) {
            Some(RegistrationKind::Tentative)
        } else if self.absence.contains(&member) {
            Some(RegistrationKind::Absence)
        } else {
            None
        }
    }

    /// §8 property 6: exactly-one-or-zero membership across all three sets.
    pub fn is_exclusive(&self) -> bool {
        let all: Vec<&MemberId> = self
            .presence
            .iter()
            .chain(self.tentative.iter())
            .chain(self.absence.iter())
            .collect();
        let unique: HashSet<&MemberId> = all.iter().copied().collect();
        all.len() == unique.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub guild_id: GuildId,
    pub event_id: EventId,
    pub name: String,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub duration_minutes: i32,
    pub dkp_value: i64,
    pub dkp_inscription_cost: i64,
    pub status: EventStatus,
    pub registrations: RegistrationBook,
    pub initial_members: Vec<MemberId>,
    pub actual_presence: Vec<MemberId>,
    pub game_id: GameId,
}

impl EventRecord {
    /// Combined local start instant; the close/remind windows of §4.F are
    /// evaluated against this rather than the date and time fields apart.
    pub fn start_naive(&self) -> chrono::NaiveDateTime {
        self.event_date.and_time(self.event_time)
    }

    pub fn end_naive(&self) -> chrono::NaiveDateTime {
        self.start_naive() + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticGroup {
    pub id: i64,
    pub guild_id: GuildId,
    pub group_name: String,
    pub leader_id: MemberId,
    pub is_active: bool,
    pub members: Vec<MemberId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponCombination {
    pub game_id: GameId,
    pub weapon1: String,
    pub weapon2: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMeta {
    pub id: GameId,
    pub game_name: String,
    pub max_members: i32,
}

/// Static catalogue data consumed by the roster reconciler's weapon
/// normalization step (§4.E.5-6): the valid weapon codes for a game and its
/// sorted-pair → class lookup.
#[derive(Debug, Clone, Default)]
pub struct GameCatalogue {
    pub valid_weapons: HashSet<String>,
    pub combinations: HashMap<(String, String), String>,
}

impl GameCatalogue {
    pub fn class_for(&self, weapon1: &str, weapon2: &str) -> Option<&str> {
        self.combinations
            .get(&(weapon1.to_string(), weapon2.to_string()))
            .map(String::as_str)
    }
}

/// A member as seen from the chat platform's live roster, before it is
/// diffed against the store snapshot (§4.E step 1).
#[derive(Debug, Clone)]
pub struct LiveMember {
    pub member_id: MemberId,
    pub display_name: String,
    pub is_bot: bool,
}

/// Per-member data supplied by the onboarding flow, used to seed inserts
/// for members present live but absent from the store (§4.E step 4).
#[derive(Debug, Clone, Default)]
pub struct OnboardingSnapshot {
    pub locale: Option<String>,
    pub gs: Option<i32>,
    pub weapons: Option<String>,
    pub build: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReconcileCounters {
    pub deleted: u64,
    pub updated: u64,
    pub inserted: u64,
}

pub type Timestamp = DateTime<Utc>;
