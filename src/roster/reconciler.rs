//! The Roster Reconciler (§4.E): diffs the live chat-platform roster
//! against the store snapshot and applies the result as a single
//! transactional batch, then refreshes the cache projection.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::cache::{Category, CacheEngine};
use crate::errors::CoreError;
use crate::models::{
    GameCatalogue, GuildId, LiveMember, MemberId, OnboardingSnapshot, ReconcileCounters, RosterMember,
};
use crate::store::{QueryKind, SqlParam, Statement, StoreGateway};

use super::weapons::{derive_class, normalize_weapons};

/// Operations above this count are logged but not refused (§4.E:
/// "advisory and logged when exceeded but not refused").
const ADVISORY_OPERATION_CAP: usize = 1000;

/// Columns a reconciliation UPDATE is allowed to touch. Enforcing this
/// allow-list is what prevents SET-clause injection via dynamically
/// assembled SQL (§4.E: "Contracts").
const UPDATABLE_COLUMNS: &[&str] = &["username", "language", "gs", "build", "weapons", "class"];

fn base_language(code: &str) -> String {
    code.split(['-', '_']).next().unwrap_or(code).to_ascii_lowercase()
}

#[derive(Debug, Default, Clone)]
struct FieldChanges {
    username: Option<String>,
    language: Option<String>,
    gs: Option<i32>,
    build: Option<Option<String>>,
    weapons: Option<String>,
    class: Option<String>,
}

impl FieldChanges {
    fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.language.is_none()
            && self.gs.is_none()
            && self.build.is_none()
            && self.weapons.is_none()
            && self.class.is_none()
    }
}

fn diff_member(
    existing: &RosterMember,
    live_name: &str,
    onboarding: Option<&OnboardingSnapshot>,
    catalogue: &GameCatalogue,
) -> FieldChanges {
    let mut changes = FieldChanges::default();

    if existing.username != live_name {
        changes.username = Some(live_name.to_string());
    }

    let target_lang = onboarding
        .and_then(|o| o.locale.as_deref())
        .map(base_language)
        .unwrap_or_else(|| existing.language.clone());
    if target_lang != existing.language {
        changes.language = Some(target_lang);
    }

    let target_gs = onboarding.and_then(|o| o.gs).unwrap_or(0);
    if target_gs != existing.gs {
        changes.gs = Some(target_gs);
    }

    let target_build = onboarding.and_then(|o| o.build.clone());
    if target_build != existing.build {
        changes.build = Some(target_build);
    }

    if let Some(raw_weapons) = onboarding.and_then(|o| o.weapons.as_deref()) {
        let normalized = normalize_weapons(raw_weapons, catalogue);
        if normalized != existing.weapons {
            let class = derive_class(&normalized, catalogue);
            changes.weapons = Some(normalized);
            changes.class = Some(class);
        }
    }

    changes
}

fn build_insert_record(
    guild_id: GuildId,
    member_id: MemberId,
    live_name: &str,
    onboarding: Option<&OnboardingSnapshot>,
    catalogue: &GameCatalogue,
) -> RosterMember {
    let language = onboarding
        .and_then(|o| o.locale.as_deref())
        .map(base_language)
        .unwrap_or_else(|| "en".to_string());
    let gs = onboarding.and_then(|o| o.gs).unwrap_or(0);
    let build = onboarding.and_then(|o| o.build.clone());
    let weapons = onboarding
        .and_then(|o| o.weapons.as_deref())
        .map(|w| normalize_weapons(w, catalogue))
        .unwrap_or_else(|| "NULL".to_string());
    let class = derive_class(&weapons, catalogue);
    RosterMember {
        guild_id,
        member_id,
        username: live_name.to_string(),
        language,
        gs,
        build,
        weapons,
        class,
        dkp: 0,
        nb_events: 0,
        registrations: 0,
        attendances: 0,
    }
}

fn update_statement(guild_id: GuildId, member_id: MemberId, changes: &FieldChanges) -> Statement {
    let mut set_clauses = Vec::new();
    let mut params = Vec::new();
    let mut next_param = 1;

    macro_rules! push_field {
        ($column:literal, $value:expr) => {
            debug_assert!(UPDATABLE_COLUMNS.contains(&$column));
            set_clauses.push(format!("{} = ${}", $column, next_param));
            params.push($value);
            next_param += 1;
        };
    }

    if let Some(v) = &changes.username {
        push_field!("username", SqlParam::Str(v.clone()));
    }
    if let Some(v) = &changes.language {
        push_field!("language", SqlParam::Str(v.clone()));
    }
    if let Some(v) = changes.gs {
        push_field!("gs", SqlParam::I32(v));
    }
    if let Some(v) = &changes.build {
        push_field!(
            "build",
            v.clone().map(SqlParam::Str).unwrap_or(SqlParam::Null)
        );
    }
    if let Some(v) = &changes.weapons {
        push_field!("weapons", SqlParam::Str(v.clone()));
    }
    if let Some(v) = &changes.class {
        push_field!("class", SqlParam::Str(v.clone()));
    }

    let guild_param = next_param;
    let member_param = next_param + 1;
    params.push(SqlParam::I64(guild_id.0));
    params.push(SqlParam::I64(member_id.0));
    let sql = format!(
        "UPDATE guild_members SET {} WHERE guild_id = ${} AND member_id = ${}",
        set_clauses.join(", "),
        guild_param,
        member_param
    );
    Statement::new(sql, params, QueryKind::Update)
}

fn insert_statement(member: &RosterMember) -> Statement {
    Statement::new(
        "INSERT INTO guild_members (guild_id, member_id, username, language, gs, build, weapons, class, dkp, nb_events, registrations, attendances) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (guild_id, member_id) DO UPDATE SET \
         username = EXCLUDED.username, language = EXCLUDED.language, gs = EXCLUDED.gs, \
         build = EXCLUDED.build, weapons = EXCLUDED.weapons, class = EXCLUDED.class",
        vec![
            SqlParam::I64(member.guild_id.0),
            SqlParam::I64(member.member_id.0),
            SqlParam::Str(member.username.clone()),
            SqlParam::Str(member.language.clone()),
            SqlParam::I32(member.gs),
            member.build.clone().map(SqlParam::Str).unwrap_or(SqlParam::Null),
            SqlParam::Str(member.weapons.clone()),
            SqlParam::Str(member.class.clone()),
            SqlParam::I64(member.dkp),
            SqlParam::I32(member.nb_events),
            SqlParam::I32(member.registrations),
            SqlParam::I32(member.attendances),
        ],
        QueryKind::Insert,
    )
}

fn delete_statement(guild_id: GuildId, ids: &[MemberId]) -> Statement {
    let placeholders: Vec<String> = (2..=ids.len() + 1).map(|i| format!("${i}")).collect();
    let sql = format!(
        "DELETE FROM guild_members WHERE guild_id = $1 AND member_id IN ({})",
        placeholders.join(", ")
    );
    let mut params = vec![SqlParam::I64(guild_id.0)];
    params.extend(ids.iter().map(|id| SqlParam::I64(id.0)));
    Statement::new(sql, params, QueryKind::Delete)
}

/// Runs the full diff-and-apply pipeline of §4.E. On transaction failure
/// returns `(0, 0, 0)` and leaves both store and cache untouched (§8
/// property 9, §4.E "Failure semantics").
pub async fn reconcile(
    store: &StoreGateway,
    engine: &CacheEngine,
    guild_id: GuildId,
    live_members: &[LiveMember],
    store_snapshot: &[RosterMember],
    onboarding: &HashMap<MemberId, OnboardingSnapshot>,
    catalogue: &GameCatalogue,
) -> ReconcileCounters {
    let actual: HashMap<MemberId, &LiveMember> = live_members
        .iter()
        .filter(|m| !m.is_bot)
        .map(|m| (m.member_id, m))
        .collect();
    let actual_ids: HashSet<MemberId> = actual.keys().copied().collect();

    let store_by_id: HashMap<MemberId, &RosterMember> =
        store_snapshot.iter().map(|m| (m.member_id, m)).collect();
    let store_ids: HashSet<MemberId> = store_by_id.keys().copied().collect();

    let to_delete: Vec<MemberId> = store_ids.difference(&actual_ids).copied().collect();
    let to_update: Vec<MemberId> = store_ids.intersection(&actual_ids).copied().collect();
    let to_insert: Vec<MemberId> = actual_ids.difference(&store_ids).copied().collect();

    let mut statements = Vec::new();
    if !to_delete.is_empty() {
        statements.push(delete_statement(guild_id, &to_delete));
    }

    let mut updated = 0u64;
    for member_id in &to_update {
        let existing = store_by_id[member_id];
        let live = actual[member_id];
        let changes = diff_member(existing, &live.display_name, onboarding.get(member_id), catalogue);
        if changes.is_empty() {
            continue;
        }
        statements.push(update_statement(guild_id, *member_id, &changes));
        updated += 1;
    }

    let mut inserted_records = Vec::new();
    for member_id in &to_insert {
        let live = actual[member_id];
        let record = build_insert_record(guild_id, *member_id, &live.display_name, onboarding.get(member_id), catalogue);
        statements.push(insert_statement(&record));
        inserted_records.push(record);
    }

    let total_ops = to_delete.len() + to_update.len() + to_insert.len();
    if total_ops > ADVISORY_OPERATION_CAP {
        warn!(guild_id = guild_id.0, total_ops, "reconciliation batch exceeds advisory operation cap");
    }

    if statements.is_empty() {
        return ReconcileCounters::default();
    }

    match store.execute_batch(&statements).await {
        Ok(()) => {
            info!(
                guild_id = guild_id.0,
                deleted = to_delete.len(),
                updated,
                inserted = to_insert.len(),
                "roster reconciliation applied"
            );
            engine.invalidate_category(Category::RosterData);
            engine.invalidate_related(Category::RosterData);
            ReconcileCounters {
                deleted: to_delete.len() as u64,
                updated,
                inserted: to_insert.len() as u64,
            }
        }
        Err(e) => {
            warn!(guild_id = guild_id.0, error = %e, "roster reconciliation batch failed, no state changed");
            ReconcileCounters::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet as HS;

    fn catalogue() -> GameCatalogue {
        let mut valid_weapons = HS::new();
        valid_weapons.insert("SNS".to_string());
        valid_weapons.insert("GS".to_string());
        let mut combinations = HashMap::new();
        combinations.insert(("GS".to_string(), "SNS".to_string()), "Tank".to_string());
        GameCatalogue {
            valid_weapons,
            combinations,
        }
    }

    #[test]
    fn base_language_strips_region_subtag() {
        assert_eq!(base_language("fr-FR"), "fr");
        assert_eq!(base_language("en_US"), "en");
    }

    #[test]
    fn insert_record_uses_onboarding_data_when_present() {
        let cat = catalogue();
        let onboarding = OnboardingSnapshot {
            locale: Some("fr-FR".to_string()),
            gs: Some(2500),
            weapons: Some("sns/gs".to_string()),
            build: None,
        };
        let record = build_insert_record(GuildId(1), MemberId(4), "Newcomer", Some(&onboarding), &cat);
        assert_eq!(record.language, "fr");
        assert_eq!(record.gs, 2500);
        assert_eq!(record.weapons, "GS/SNS");
        assert_eq!(record.class, "Tank");
    }

    #[test]
    fn insert_record_zeroes_defaults_without_onboarding() {
        let cat = catalogue();
        let record = build_insert_record(GuildId(1), MemberId(5), "Plain", None, &cat);
        assert_eq!(record.gs, 0);
        assert_eq!(record.weapons, "NULL");
        assert_eq!(record.class, "NULL");
    }

    #[test]
    fn diff_detects_no_changes_for_identical_member() {
        let cat = catalogue();
        let existing = RosterMember {
            guild_id: GuildId(1),
            member_id: MemberId(2),
            username: "Same".to_string(),
            language: "en".to_string(),
            gs: 1000,
            build: None,
            weapons: "NULL".to_string(),
            class: "NULL".to_string(),
            dkp: 0,
            nb_events: 0,
            registrations: 0,
            attendances: 0,
        };
        let changes = diff_member(&existing, "Same", None, &cat);
        assert!(changes.is_empty());
    }
}
