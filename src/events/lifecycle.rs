//! The Event Lifecycle state machine (§4.F): announce → confirm → close →
//! (group formation) → remind/delete. Grounded on
//! `original_source/app/cogs/guild_events.py`'s `event_close_cron`,
//! `event_reminder_cron` and `event_delete_cron`, and on `monitor.rs`'s
//! periodic-check shape.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::cache::{Category, CacheEngine};
use crate::errors::CoreError;
use crate::groups::{form_groups, Candidate};
use crate::models::{EventId, EventRecord, EventStatus, GuildId, MemberId, RegistrationBook, RosterMember, StaticGroup};
use crate::platform::MessageGateway;
use crate::store::{QueryKind, SqlParam, Statement, StoreGateway};

/// Europe/Paris is the pinned timezone for all close/remind/delete window
/// comparisons (§9 open question: the source's string-compared
/// `event_date` must be pinned to a timezone and compared as a date).
pub fn now_in_guild_tz() -> NaiveDateTime {
    Utc::now().with_timezone(&chrono_tz::Europe::Paris).naive_local()
}

/// The DKP-accounting collaborator the close procedure hands the
/// finalized registration book to (§4.F); out of scope for this core, so
/// only the boundary is defined here, mirroring `platform`'s trait-only
/// contracts.
#[async_trait]
pub trait AttendanceCollaborator: Send + Sync {
    async fn record_attendance(&self, event_id: EventId, book: &RegistrationBook, groups: &[Vec<Candidate>]) -> Result<(), CoreError>;
}

/// `Planned` → `Confirmed` (§4.F transition table).
pub fn confirm(event: &mut EventRecord) -> Result<(), CoreError> {
    if event.status != EventStatus::Planned {
        return Err(CoreError::Validation(format!(
            "cannot confirm event {} from status {:?}",
            event.event_id.0, event.status
        )));
    }
    event.status = EventStatus::Confirmed;
    Ok(())
}

/// `Planned` / `Confirmed` → `Canceled`.
pub fn cancel(event: &mut EventRecord) -> Result<(), CoreError> {
    if !matches!(event.status, EventStatus::Planned | EventStatus::Confirmed) {
        return Err(CoreError::Validation(format!(
            "cannot cancel event {} from status {:?}",
            event.event_id.0, event.status
        )));
    }
    event.status = EventStatus::Canceled;
    Ok(())
}

/// §4.F close-window trigger: start within `[-60 min, +15 min]` around `now`.
pub fn within_close_window(start: NaiveDateTime, now: NaiveDateTime) -> bool {
    let lower = now - chrono::Duration::minutes(60);
    let upper = now + chrono::Duration::minutes(15);
    start >= lower && start <= upper
}

fn upsert_statement(event: &EventRecord) -> Statement {
    let registrations = serde_json::json!({
        "presence": event.registrations.presence.iter().map(|m| m.0).collect::<Vec<_>>(),
        "tentative": event.registrations.tentative.iter().map(|m| m.0).collect::<Vec<_>>(),
        "absence": event.registrations.absence.iter().map(|m| m.0).collect::<Vec<_>>(),
    });
    let initial_members: Vec<i64> = event.initial_members.iter().map(|m| m.0).collect();
    let actual_presence: Vec<i64> = event.actual_presence.iter().map(|m| m.0).collect();
    let status_str = match event.status {
        EventStatus::Planned => "Planned",
        EventStatus::Confirmed => "Confirmed",
        EventStatus::Closed => "Closed",
        EventStatus::Canceled => "Canceled",
    };
    Statement::new(
        "INSERT INTO events_data (guild_id, event_id, name, event_date, event_time, duration, dkp_value, dkp_ins, status, initial_members, registrations, actual_presence, game_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (guild_id, event_id) DO UPDATE SET \
         name = EXCLUDED.name, event_date = EXCLUDED.event_date, event_time = EXCLUDED.event_time, \
         duration = EXCLUDED.duration, dkp_value = EXCLUDED.dkp_value, dkp_ins = EXCLUDED.dkp_ins, \
         status = EXCLUDED.status, initial_members = EXCLUDED.initial_members, \
         registrations = EXCLUDED.registrations, actual_presence = EXCLUDED.actual_presence, game_id = EXCLUDED.game_id",
        vec![
            SqlParam::I64(event.guild_id.0),
            SqlParam::I64(event.event_id.0),
            SqlParam::Str(event.name.clone()),
            SqlParam::Str(event.event_date.to_string()),
            SqlParam::Str(event.event_time.to_string()),
            SqlParam::I32(event.duration_minutes),
            SqlParam::I64(event.dkp_value),
            SqlParam::I64(event.dkp_inscription_cost),
            SqlParam::Str(status_str.to_string()),
            SqlParam::Json(serde_json::Value::Array(initial_members.into_iter().map(serde_json::Value::from).collect())),
            SqlParam::Json(registrations),
            SqlParam::Json(serde_json::Value::Array(actual_presence.into_iter().map(serde_json::Value::from).collect())),
            SqlParam::I32(event.game_id.0),
        ],
        QueryKind::Insert,
    )
}

fn delete_statement(guild_id: GuildId, event_ids: &[EventId]) -> Statement {
    let placeholders: Vec<String> = (2..=event_ids.len() + 1).map(|i| format!("${i}")).collect();
    let sql = format!(
        "DELETE FROM events_data WHERE guild_id = $1 AND event_id IN ({})",
        placeholders.join(", ")
    );
    let mut params = vec![SqlParam::I64(guild_id.0)];
    params.extend(event_ids.iter().map(|id| SqlParam::I64(id.0)));
    Statement::new(sql, params, QueryKind::Delete)
}

async fn refresh_event_cache(engine: &CacheEngine, event: &EventRecord) {
    engine.set(
        Category::EventsData,
        event,
        &[Some(event.guild_id.0.to_string()), Some(event.event_id.0.to_string())],
        None,
    );
}

pub struct CloseOutcome {
    pub event_id: EventId,
    pub groups: Vec<Vec<Candidate>>,
}

/// Runs the scheduled close procedure for one guild's events (§4.F "Close
/// procedure"): closes whatever is in the window, clears reactions,
/// invokes the Group Former and hands the book to the attendance
/// collaborator.
pub async fn run_close_procedure(
    store: &StoreGateway,
    engine: &CacheEngine,
    events_channel_id: i64,
    events: &mut [EventRecord],
    roster: &HashMap<MemberId, RosterMember>,
    static_groups: &[StaticGroup],
    messages: &dyn MessageGateway,
    attendance: &dyn AttendanceCollaborator,
    now: NaiveDateTime,
) -> Vec<CloseOutcome> {
    let mut outcomes = Vec::new();
    for event in events.iter_mut() {
        if !matches!(event.status, EventStatus::Planned | EventStatus::Confirmed) {
            continue;
        }
        if !within_close_window(event.start_naive(), now) {
            continue;
        }

        event.status = EventStatus::Closed;
        if let Err(e) = messages.clear_reactions(events_channel_id, event.event_id.0).await {
            warn!(event_id = event.event_id.0, error = %e, "failed to clear reactions on close");
        }

        let presence: Vec<MemberId> = event.registrations.presence.iter().copied().collect();
        let tentative: Vec<MemberId> = event.registrations.tentative.iter().copied().collect();
        let groups = form_groups(&presence, &tentative, roster, static_groups);
        event.actual_presence = presence;

        match store.execute_batch(std::slice::from_ref(&upsert_statement(event))).await {
            Ok(()) => {
                refresh_event_cache(engine, event).await;
                info!(event_id = event.event_id.0, groups = groups.len(), "event closed and grouped");
            }
            Err(e) => warn!(event_id = event.event_id.0, error = %e, "failed to persist closed event"),
        }

        if let Err(e) = attendance.record_attendance(event.event_id, &event.registrations, &groups).await {
            warn!(event_id = event.event_id.0, error = %e, "attendance collaborator failed");
        }

        outcomes.push(CloseOutcome {
            event_id: event.event_id,
            groups,
        });
    }
    outcomes
}

/// Runs the scheduled reminder procedure (§4.F "Reminder procedure") for
/// one guild's `Confirmed` events scheduled for `today`.
pub async fn run_reminder_procedure(
    notifications_channel_id: i64,
    events: &[EventRecord],
    current_members_with_role: &HashSet<MemberId>,
    members_direct_message: &dyn crate::platform::MemberGateway,
    messages: &dyn MessageGateway,
    today: NaiveDate,
) {
    for event in events {
        if event.status != EventStatus::Confirmed || event.event_date != today {
            continue;
        }
        let registered: HashSet<MemberId> = event
            .registrations
            .presence
            .iter()
            .chain(event.registrations.tentative.iter())
            .chain(event.registrations.absence.iter())
            .copied()
            .collect();
        let to_remind: Vec<MemberId> = current_members_with_role.difference(&registered).copied().collect();

        let mut reminded = 0;
        for member_id in &to_remind {
            match members_direct_message
                .direct_message(*member_id, &format!("Reminder: {} needs your response.", event.name))
                .await
            {
                Ok(()) => reminded += 1,
                Err(e) => warn!(member_id = member_id.0, event_id = event.event_id.0, error = %e, "failed to DM reminder"),
            }
        }

        let summary = if reminded > 0 {
            format!("Event **{}**: {reminded} member(s) reminded.", event.name)
        } else {
            format!("Event **{}**: all members have responded.", event.name)
        };
        if let Err(e) = messages.send(notifications_channel_id, &summary, None).await {
            warn!(event_id = event.event_id.0, error = %e, "failed to post reminder summary");
        }
    }
}

/// Runs the scheduled delete procedure (§4.F "Delete procedure"): removes
/// the announcement for events whose end instant has passed, dropping the
/// store record only when the event was `Canceled` (§8 property; records
/// kept for `Closed` events until their end, then just the announcement
/// goes away).
pub async fn run_delete_procedure(
    store: &StoreGateway,
    engine: &CacheEngine,
    guild_id: GuildId,
    events_channel_id: i64,
    events: &mut Vec<EventRecord>,
    messages: &dyn MessageGateway,
    now: NaiveDateTime,
) -> usize {
    let mut to_hard_delete = Vec::new();
    let mut deleted_announcements = 0usize;
    let mut keep = Vec::with_capacity(events.len());

    for event in events.drain(..) {
        if event.end_naive() >= now {
            keep.push(event);
            continue;
        }

        match messages.fetch(events_channel_id, event.event_id.0).await {
            Ok(()) => match messages.delete(events_channel_id, event.event_id.0).await {
                Ok(()) => deleted_announcements += 1,
                Err(e) => warn!(event_id = event.event_id.0, error = %e, "failed to delete expired event announcement"),
            },
            Err(CoreError::NotFound(_)) => {
                // Already gone; proceed with record cleanup regardless (§4.F "Failure semantics").
                deleted_announcements += 1;
            }
            Err(e) => {
                warn!(event_id = event.event_id.0, error = %e, "transport error fetching announcement, retrying next tick");
                keep.push(event);
                continue;
            }
        }

        if event.status == EventStatus::Canceled {
            to_hard_delete.push(event.event_id);
            engine.delete(
                Category::EventsData,
                &[Some(event.guild_id.0.to_string()), Some(event.event_id.0.to_string())],
            );
        } else {
            keep.push(event);
        }
    }

    if !to_hard_delete.is_empty() {
        if let Err(e) = store.execute_batch(&[delete_statement(guild_id, &to_hard_delete)]).await {
            warn!(guild_id = guild_id.0, error = %e, "failed to batch-delete canceled events");
        }
    }

    *events = keep;
    deleted_announcements
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn sample_event(status: EventStatus) -> EventRecord {
        EventRecord {
            guild_id: GuildId(1),
            event_id: EventId(100),
            name: "Raid".to_string(),
            event_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            event_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            duration_minutes: 90,
            dkp_value: 10,
            dkp_inscription_cost: 1,
            status,
            registrations: RegistrationBook::default(),
            initial_members: Vec::new(),
            actual_presence: Vec::new(),
            game_id: crate::models::GameId(1),
        }
    }

    #[test]
    fn confirm_transitions_planned_to_confirmed() {
        let mut event = sample_event(EventStatus::Planned);
        confirm(&mut event).unwrap();
        assert_eq!(event.status, EventStatus::Confirmed);
    }

    #[test]
    fn confirm_rejects_non_planned_source_state() {
        let mut event = sample_event(EventStatus::Closed);
        assert!(confirm(&mut event).is_err());
    }

    #[test]
    fn cancel_allowed_from_confirmed() {
        let mut event = sample_event(EventStatus::Confirmed);
        cancel(&mut event).unwrap();
        assert_eq!(event.status, EventStatus::Canceled);
    }

    #[test]
    fn close_window_covers_sixty_minutes_before_and_fifteen_after() {
        let now = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap().and_hms_opt(20, 0, 0).unwrap();
        assert!(within_close_window(now - chrono::Duration::minutes(59), now));
        assert!(within_close_window(now + chrono::Duration::minutes(14), now));
        assert!(!within_close_window(now - chrono::Duration::minutes(61), now));
        assert!(!within_close_window(now + chrono::Duration::minutes(16), now));
    }
}
