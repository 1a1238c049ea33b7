//! Chat-platform contracts consumed by the core (§6). The platform client
//! and command/interaction dispatch are out of scope; this module only
//! defines the boundary the Event Lifecycle, Roster Reconciler and Group
//! Former depend on, so they can be driven by a real client or a test
//! double without the core depending on any concrete transport crate.
//! Grounded on `rpc/mod.rs`: a thin module that re-exports a
//! boundary shape rather than an implementation.

use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::{EventId, GuildId, LiveMember, MemberId};

/// An embed, or the richer structured content a platform message carries
/// alongside plain text. Kept opaque to the core: callers build whatever
/// their platform's SDK requires and hand it through as JSON.
pub type EmbedPayload = serde_json::Value;

/// Message operations (§6: "Text message: send, edit, delete, fetch-by-id,
/// clear-reactions, add-reaction").
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, channel_id: i64, content: &str, embed: Option<EmbedPayload>) -> Result<i64, CoreError>;
    async fn edit(&self, channel_id: i64, message_id: i64, content: Option<&str>, embed: Option<EmbedPayload>) -> Result<(), CoreError>;
    async fn delete(&self, channel_id: i64, message_id: i64) -> Result<(), CoreError>;
    /// Fetch-by-id; a platform 404 MUST be reported as `CoreError::NotFound`
    /// so the caller can treat it as already-gone (§4.F "Failure semantics").
    async fn fetch(&self, channel_id: i64, message_id: i64) -> Result<(), CoreError>;
    async fn clear_reactions(&self, channel_id: i64, message_id: i64) -> Result<(), CoreError>;
    async fn add_reaction(&self, channel_id: i64, message_id: i64, emoji: &str) -> Result<(), CoreError>;
}

/// Member roster access (§6: "Members: fetch-all, fetch-one, role
/// membership, display-name edit").
#[async_trait]
pub trait MemberGateway: Send + Sync {
    async fn fetch_all(&self, guild_id: GuildId) -> Result<Vec<LiveMember>, CoreError>;
    async fn fetch_one(&self, guild_id: GuildId, member_id: MemberId) -> Result<LiveMember, CoreError>;
    async fn has_role(&self, guild_id: GuildId, member_id: MemberId, role_id: i64) -> Result<bool, CoreError>;
    async fn set_display_name(&self, guild_id: GuildId, member_id: MemberId, name: &str) -> Result<(), CoreError>;
    async fn direct_message(&self, member_id: MemberId, content: &str) -> Result<(), CoreError>;
}

/// Scheduled-event creation (§6: "Scheduled events: create with
/// start/end/location"). Distinct from the core's own `EventRecord` — this
/// is the platform-native calendar entry mirroring it.
#[async_trait]
pub trait ScheduledEventGateway: Send + Sync {
    async fn create(
        &self,
        guild_id: GuildId,
        name: &str,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
        location: &str,
    ) -> Result<EventId, CoreError>;
}

/// Roles and channels (§6: "fetch-by-id; presence checks") plus the
/// permission checks required before issuing a message or scheduled event
/// (§6 Permissions table).
#[async_trait]
pub trait PermissionGateway: Send + Sync {
    async fn can_send_message(&self, guild_id: GuildId, channel_id: i64) -> Result<bool, CoreError>;
    async fn can_read_reactions(&self, guild_id: GuildId, channel_id: i64) -> Result<bool, CoreError>;
    async fn can_create_scheduled_event(&self, guild_id: GuildId) -> Result<bool, CoreError>;
}
