//! The closed category set of §3 and the one-hop invalidation rule graph.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    GuildData,
    UserData,
    EventsData,
    RosterData,
    StaticData,
    DiscordEntities,
    Temporary,
}

pub const ALL_CATEGORIES: [Category; 7] = [
    Category::GuildData,
    Category::UserData,
    Category::EventsData,
    Category::RosterData,
    Category::StaticData,
    Category::DiscordEntities,
    Category::Temporary,
];

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::GuildData => "guild_data",
            Category::UserData => "user_data",
            Category::EventsData => "events_data",
            Category::RosterData => "roster_data",
            Category::StaticData => "static_data",
            Category::DiscordEntities => "discord_entities",
            Category::Temporary => "temporary",
        }
    }

    /// Default TTL per §3's category table.
    pub fn default_ttl(self) -> Duration {
        match self {
            Category::GuildData => Duration::from_secs(86_400),
            Category::UserData => Duration::from_secs(3_600),
            Category::EventsData => Duration::from_secs(3_600),
            Category::RosterData => Duration::from_secs(3_600),
            Category::StaticData => Duration::from_secs(3_600),
            Category::DiscordEntities => Duration::from_secs(3_600),
            Category::Temporary => Duration::from_secs(300),
        }
    }

    /// One-hop edges of the invalidation rule graph. Traversal MUST NOT
    /// recurse past this set (§3: "non-transitive by design").
    pub fn related(self) -> &'static [Category] {
        match self {
            Category::RosterData => &[Category::EventsData],
            Category::GuildData => &[Category::RosterData, Category::EventsData],
            Category::UserData => &[Category::RosterData],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_edges_match_the_rule_graph() {
        assert_eq!(Category::RosterData.related(), &[Category::EventsData]);
        assert_eq!(
            Category::GuildData.related(),
            &[Category::RosterData, Category::EventsData]
        );
        assert_eq!(Category::UserData.related(), &[Category::RosterData]);
        assert!(Category::EventsData.related().is_empty());
    }

    #[test]
    fn ttls_match_the_category_table() {
        assert_eq!(Category::GuildData.default_ttl(), Duration::from_secs(86_400));
        assert_eq!(Category::Temporary.default_ttl(), Duration::from_secs(300));
    }
}
