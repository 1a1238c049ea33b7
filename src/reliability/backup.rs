//! Data backup manager (§4.D, contract only): serializes a guild's
//! store-side rows to a JSON file and restores them as a transactional
//! batch through the Store Gateway.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::CoreError;
use crate::models::GuildId;
use crate::store::{QueryKind, SqlParam, Statement, StoreGateway};

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupDocument {
    pub guild_id: i64,
    pub guild_members: Vec<serde_json::Value>,
    pub events_data: Vec<serde_json::Value>,
}

pub struct BackupManager<'a> {
    store: &'a StoreGateway,
}

impl<'a> BackupManager<'a> {
    pub fn new(store: &'a StoreGateway) -> Self {
        Self { store }
    }

    pub async fn backup_guild(&self, guild_id: GuildId, path: &Path) -> Result<(), CoreError> {
        let members: Vec<serde_json::Value> = self
            .store
            .fetch_all(
                QueryKind::Select,
                "SELECT row_to_json(t) AS doc FROM (SELECT * FROM guild_members WHERE guild_id = $1) t",
                &[SqlParam::I64(guild_id.0)],
            )
            .await
            .unwrap_or_default();
        let events: Vec<serde_json::Value> = self
            .store
            .fetch_all(
                QueryKind::Select,
                "SELECT row_to_json(t) AS doc FROM (SELECT * FROM events_data WHERE guild_id = $1) t",
                &[SqlParam::I64(guild_id.0)],
            )
            .await
            .unwrap_or_default();
        let doc = BackupDocument {
            guild_id: guild_id.0,
            guild_members: members,
            events_data: events,
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| CoreError::Validation(format!("failed to serialize backup: {e}")))?;
        fs::write(path, json)
            .await
            .map_err(|e| CoreError::StoreTimeout(format!("failed to write backup file: {e}")))?;
        Ok(())
    }

    /// Replays a backup document in order as a single transactional batch
    /// (§4.D: "restore replays them in order as a transactional batch").
    pub async fn restore_guild(&self, path: &Path) -> Result<(), CoreError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| CoreError::StoreTimeout(format!("failed to read backup file: {e}")))?;
        let doc: BackupDocument = serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::Validation(format!("corrupt backup document: {e}")))?;

        let mut statements = Vec::with_capacity(doc.guild_members.len() + doc.events_data.len());
        for member_row in &doc.guild_members {
            statements.push(Statement::new(
                "INSERT INTO guild_members SELECT * FROM jsonb_populate_record(NULL::guild_members, $1) \
                 ON CONFLICT (guild_id, member_id) DO UPDATE SET username = EXCLUDED.username",
                vec![SqlParam::Json(member_row.clone())],
                QueryKind::Insert,
            ));
        }
        for event_row in &doc.events_data {
            statements.push(Statement::new(
                "INSERT INTO events_data SELECT * FROM jsonb_populate_record(NULL::events_data, $1) \
                 ON CONFLICT (guild_id, event_id) DO UPDATE SET name = EXCLUDED.name",
                vec![SqlParam::Json(event_row.clone())],
                QueryKind::Insert,
            ));
        }
        self.store.execute_batch(&statements).await
    }
}
