//! The Cache Loader (§4.B): idempotent per-category hydration from the
//! store into the Cache Engine. Dispatch is a closed enumeration over
//! `LoadableCategory`, one loader function per variant, rather than an
//! open string-keyed dictionary (§9 Design Notes). Grounded on the
//! teacher's `DataIngestionService`: one method per entity, failures
//! logged per-row without aborting the sibling loaders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use tracing::{error, warn};

use crate::errors::CoreError;
use crate::models::*;
use crate::store::{QueryKind, StoreGateway};

use super::category::Category;
use super::engine::{CacheEngine, PreloadSource};

/// The subset of `Category` that the store can hydrate. `discord_entities`
/// and `temporary` have no backing table and are never touched by the
/// loader (§3: "caller-supplied" / "short-lived scratch").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadableCategory {
    GuildData,
    UserData,
    EventsData,
    RosterData,
    StaticData,
}

pub const ALL_LOADABLE: [LoadableCategory; 5] = [
    LoadableCategory::GuildData,
    LoadableCategory::UserData,
    LoadableCategory::EventsData,
    LoadableCategory::RosterData,
    LoadableCategory::StaticData,
];

impl From<LoadableCategory> for Category {
    fn from(c: LoadableCategory) -> Self {
        match c {
            LoadableCategory::GuildData => Category::GuildData,
            LoadableCategory::UserData => Category::UserData,
            LoadableCategory::EventsData => Category::EventsData,
            LoadableCategory::RosterData => Category::RosterData,
            LoadableCategory::StaticData => Category::StaticData,
        }
    }
}

#[derive(Debug, FromRow)]
struct GuildSettingsRow {
    guild_id: i64,
    guild_lang: String,
    guild_name: String,
    guild_game: i32,
    guild_server: Option<String>,
    initialized: bool,
    premium: bool,
    guild_ptb: bool,
}

impl From<GuildSettingsRow> for GuildSettings {
    fn from(r: GuildSettingsRow) -> Self {
        GuildSettings {
            guild_id: GuildId(r.guild_id),
            guild_lang: r.guild_lang,
            guild_name: r.guild_name,
            guild_game: GameId(r.guild_game),
            guild_server: r.guild_server,
            initialized: r.initialized,
            premium: r.premium,
            guild_ptb: r.guild_ptb,
        }
    }
}

#[derive(Debug, FromRow)]
struct RosterMemberRow {
    guild_id: i64,
    member_id: i64,
    username: String,
    language: String,
    gs: i32,
    build: Option<String>,
    weapons: String,
    class: String,
    dkp: i64,
    nb_events: i32,
    registrations: i32,
    attendances: i32,
}

impl From<RosterMemberRow> for RosterMember {
    fn from(r: RosterMemberRow) -> Self {
        RosterMember {
            guild_id: GuildId(r.guild_id),
            member_id: MemberId(r.member_id),
            username: r.username,
            language: r.language,
            gs: r.gs,
            build: r.build,
            weapons: r.weapons,
            class: r.class,
            dkp: r.dkp,
            nb_events: r.nb_events,
            registrations: r.registrations,
            attendances: r.attendances,
        }
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    guild_id: i64,
    event_id: i64,
    name: String,
    event_date: NaiveDate,
    event_time: NaiveTime,
    duration: i32,
    dkp_value: i64,
    dkp_ins: i64,
    status: String,
    initial_members: JsonValue,
    registrations: JsonValue,
    actual_presence: JsonValue,
    game_id: i32,
}

/// JSON columns carry a strict schema; malformed blobs are rejected rather
/// than silently coerced to empty (§9 Design Notes: "JSON columns").
fn parse_member_id_array(value: &JsonValue, column: &str) -> Result<Vec<MemberId>, CoreError> {
    value
        .as_array()
        .ok_or_else(|| CoreError::Validation(format!("{column} is not a JSON array")))?
        .iter()
        .map(|v| {
            v.as_i64()
                .map(MemberId)
                .ok_or_else(|| CoreError::Validation(format!("{column} contains a non-integer member id")))
        })
        .collect()
}

fn parse_registration_book(value: &JsonValue) -> Result<RegistrationBook, CoreError> {
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::Validation("registrations is not a JSON object".to_string()))?;
    let mut book = RegistrationBook::default();
    for (field, kind) in [
        ("presence", RegistrationKind::Presence),
        ("tentative", RegistrationKind::Tentative),
        ("absence", RegistrationKind::Absence),
    ] {
        if let Some(ids) = obj.get(field) {
            for id in parse_member_id_array(ids, field)? {
                book.set(id, kind);
            }
        }
    }
    Ok(book)
}

fn parse_status(s: &str) -> Result<EventStatus, CoreError> {
    match s {
        "Planned" => Ok(EventStatus::Planned),
        "Confirmed" => Ok(EventStatus::Confirmed),
        "Closed" => Ok(EventStatus::Closed),
        "Canceled" => Ok(EventStatus::Canceled),
        other => Err(CoreError::Validation(format!("unknown event status {other}"))),
    }
}

impl TryFrom<EventRow> for EventRecord {
    type Error = CoreError;

    fn try_from(r: EventRow) -> Result<Self, Self::Error> {
        Ok(EventRecord {
            guild_id: GuildId(r.guild_id),
            event_id: EventId(r.event_id),
            name: r.name,
            event_date: r.event_date,
            event_time: r.event_time,
            duration_minutes: r.duration,
            dkp_value: r.dkp_value,
            dkp_inscription_cost: r.dkp_ins,
            status: parse_status(&r.status)?,
            registrations: parse_registration_book(&r.registrations)?,
            initial_members: parse_member_id_array(&r.initial_members, "initial_members")?,
            actual_presence: parse_member_id_array(&r.actual_presence, "actual_presence")?,
            game_id: GameId(r.game_id),
        })
    }
}

#[derive(Debug, FromRow)]
struct WeaponRow {
    game_id: i32,
    code: String,
}

#[derive(Debug, FromRow)]
struct CombinationRow {
    game_id: i32,
    weapon1: String,
    weapon2: String,
    role: String,
}

#[derive(Debug, FromRow)]
struct WelcomeMessageRow {
    guild_id: i64,
    member_id: i64,
    channel_id: i64,
    message_id: i64,
}

pub struct CacheLoader {
    engine: Arc<CacheEngine>,
    store: Arc<StoreGateway>,
    loaded: [AtomicBool; 5],
}

fn loadable_index(c: LoadableCategory) -> usize {
    ALL_LOADABLE.iter().position(|x| *x == c).expect("closed enum")
}

impl CacheLoader {
    pub fn new(engine: Arc<CacheEngine>, store: Arc<StoreGateway>) -> Self {
        Self {
            engine,
            store,
            loaded: Default::default(),
        }
    }

    fn is_loaded(&self, category: LoadableCategory) -> bool {
        self.loaded[loadable_index(category)].load(Ordering::Acquire)
    }

    fn mark_loaded(&self, category: LoadableCategory) {
        self.loaded[loadable_index(category)].store(true, Ordering::Release);
    }

    /// Clears the loaded marker so the next `ensure_loaded` call re-hydrates.
    pub fn reload(&self, category: LoadableCategory) {
        self.loaded[loadable_index(category)].store(false, Ordering::Release);
    }

    pub async fn ensure_loaded(&self, category: LoadableCategory) -> Result<(), CoreError> {
        if self.is_loaded(category) {
            return Ok(());
        }
        self.load_one(category).await
    }

    async fn load_one(&self, category: LoadableCategory) -> Result<(), CoreError> {
        let result = match category {
            LoadableCategory::GuildData => self.load_guild_data().await,
            LoadableCategory::UserData => self.load_user_data().await,
            LoadableCategory::EventsData => self.load_events_data().await,
            LoadableCategory::RosterData => self.load_roster_data().await,
            LoadableCategory::StaticData => self.load_static_data().await,
        };
        match &result {
            Ok(()) => self.mark_loaded(category),
            Err(e) => error!(category = ?category, error = %e, "category load failed, not marking loaded"),
        }
        result
    }

    /// Runs every per-category loader in parallel; aggregates errors into
    /// logs without aborting siblings (§4.B). Safe to call repeatedly —
    /// already-loaded categories are no-ops.
    pub async fn load_all(&self) {
        let results = futures::future::join_all(
            ALL_LOADABLE.iter().map(|c| self.ensure_loaded(*c)),
        )
        .await;
        for (category, result) in ALL_LOADABLE.iter().zip(results) {
            if let Err(e) = result {
                warn!(category = ?category, error = %e, "cache bootstrap: category failed to load");
            }
        }
    }

    async fn load_guild_data(&self) -> Result<(), CoreError> {
        let rows: Vec<GuildSettingsRow> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM guild_settings", &[])
            .await?;
        for row in rows {
            let settings: GuildSettings = row.into();
            let guild_id = settings.guild_id.0.to_string();
            self.engine
                .set(Category::GuildData, &settings, &[Some(guild_id)], None);
        }
        Ok(())
    }

    async fn load_roster_data(&self) -> Result<(), CoreError> {
        let rows: Vec<RosterMemberRow> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM guild_members", &[])
            .await?;
        let mut by_guild: std::collections::HashMap<i64, Vec<RosterMember>> = std::collections::HashMap::new();
        for row in rows {
            let member: RosterMember = row.into();
            by_guild.entry(member.guild_id.0).or_default().push(member);
        }
        for (guild_id, members) in by_guild {
            self.engine.set(
                Category::RosterData,
                &members,
                &[Some(guild_id.to_string())],
                None,
            );
        }
        Ok(())
    }

    async fn load_events_data(&self) -> Result<(), CoreError> {
        let rows: Vec<EventRow> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM events_data", &[])
            .await?;
        for row in rows {
            let guild_id = row.guild_id;
            let event_id = row.event_id;
            match EventRecord::try_from(row) {
                Ok(record) => {
                    self.engine.set(
                        Category::EventsData,
                        &record,
                        &[Some(guild_id.to_string()), Some(event_id.to_string())],
                        None,
                    );
                }
                Err(e) => {
                    error!(guild_id, event_id, error = %e, "events_data row failed validation, flagged for manual repair");
                }
            }
        }
        Ok(())
    }

    async fn load_static_data(&self) -> Result<(), CoreError> {
        let weapons: Vec<WeaponRow> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM weapons", &[])
            .await?;
        let combos: Vec<CombinationRow> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM weapons_combinations", &[])
            .await?;
        let games: Vec<GameMeta> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM games_list", &[])
            .await?;

        let mut by_game: std::collections::HashMap<i32, GameCatalogue> = std::collections::HashMap::new();
        for w in weapons {
            by_game.entry(w.game_id).or_default().valid_weapons.insert(w.code.to_uppercase());
        }
        for c in combos {
            by_game
                .entry(c.game_id)
                .or_default()
                .combinations
                .insert((c.weapon1.clone(), c.weapon2.clone()), c.role);
        }
        for (game_id, catalogue) in &by_game {
            self.engine.set(
                Category::StaticData,
                &catalogue_to_json(catalogue),
                &[Some(game_id.to_string())],
                None,
            );
        }
        for game in games {
            self.engine
                .set(Category::StaticData, &game, &[Some(format!("meta:{}", game.id.0))], None);
        }
        Ok(())
    }

    async fn load_user_data(&self) -> Result<(), CoreError> {
        let rows: Vec<WelcomeMessageRow> = self
            .store
            .fetch_all(QueryKind::Select, "SELECT * FROM welcome_messages", &[])
            .await?;
        for row in rows {
            self.engine.set(
                Category::UserData,
                &(row.channel_id, row.message_id),
                &[Some(row.guild_id.to_string()), Some(row.member_id.to_string())],
                None,
            );
        }
        Ok(())
    }
}

/// `GameCatalogue` isn't `Serialize` directly (its map key is a tuple);
/// flatten it to a JSON-friendly shape before handing it to the engine.
fn catalogue_to_json(catalogue: &GameCatalogue) -> JsonValue {
    serde_json::json!({
        "valid_weapons": catalogue.valid_weapons.iter().collect::<Vec<_>>(),
        "combinations": catalogue
            .combinations
            .iter()
            .map(|((a, b), role)| serde_json::json!({"weapon1": a, "weapon2": b, "role": role}))
            .collect::<Vec<_>>(),
    })
}

#[async_trait]
impl PreloadSource for CacheLoader {
    /// Refreshes a single key by category prefix (§4.A: "selected by key
    /// prefix"). No per-row query exists for any category, so this
    /// re-runs the category's full bulk loader and lets the preload task
    /// observe whether the key came back populated.
    async fn refresh_key(&self, category: Category, key: &str) -> bool {
        let result = match category {
            Category::GuildData => self.load_guild_data().await,
            Category::RosterData => self.load_roster_data().await,
            Category::EventsData => self.load_events_data().await,
            Category::StaticData => self.load_static_data().await,
            Category::UserData => self.load_user_data().await,
            Category::DiscordEntities | Category::Temporary => {
                warn!(%key, "no bulk-loader hook for this category, skipping preload");
                Ok(())
            }
        };
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loadable_category_maps_onto_engine_category() {
        assert_eq!(Category::from(LoadableCategory::RosterData), Category::RosterData);
    }

    #[test]
    fn malformed_registrations_blob_is_rejected_not_coerced() {
        let bad = serde_json::json!({"presence": "not-an-array"});
        assert!(parse_registration_book(&bad).is_err());
    }

    #[test]
    fn well_formed_registrations_blob_parses() {
        let good = serde_json::json!({"presence": [1, 2], "tentative": [], "absence": [3]});
        let book = parse_registration_book(&good).unwrap();
        assert_eq!(book.presence.len(), 2);
        assert_eq!(book.absence.len(), 1);
        assert!(book.is_exclusive());
    }
}
