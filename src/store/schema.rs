//! DDL for the relational schema of §6, run once at startup via
//! `sqlx::migrate!`-style bootstrapping in development/test contexts.
//! Grounded on the `const &'static str` DDL pattern of `db/schema.rs`.

pub const CREATE_GUILD_SETTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS guild_settings (
    guild_id BIGINT PRIMARY KEY,
    guild_lang TEXT NOT NULL DEFAULT 'en-US',
    guild_name TEXT NOT NULL,
    guild_game INTEGER NOT NULL,
    guild_server TEXT,
    initialized BOOLEAN NOT NULL DEFAULT FALSE,
    premium BOOLEAN NOT NULL DEFAULT FALSE,
    guild_ptb BOOLEAN NOT NULL DEFAULT FALSE
)"#;

pub const CREATE_GUILD_ROLES: &str = r#"
CREATE TABLE IF NOT EXISTS guild_roles (
    guild_id BIGINT PRIMARY KEY REFERENCES guild_settings(guild_id),
    members BIGINT,
    absent_members BIGINT,
    rules_ok BIGINT,
    guild_master BIGINT,
    officer BIGINT,
    guardian BIGINT,
    allies BIGINT,
    diplomats BIGINT,
    friends BIGINT,
    applicant BIGINT,
    config_ok BIGINT
)"#;

pub const CREATE_GUILD_CHANNELS: &str = r#"
CREATE TABLE IF NOT EXISTS guild_channels (
    guild_id BIGINT PRIMARY KEY REFERENCES guild_settings(guild_id),
    events_channel BIGINT,
    members_channel BIGINT,
    members_m1 BIGINT,
    members_m2 BIGINT,
    members_m3 BIGINT,
    members_m4 BIGINT,
    members_m5 BIGINT,
    rules_channel BIGINT,
    rules_message BIGINT,
    abs_channel BIGINT,
    forum_members_channel BIGINT,
    groups_channel BIGINT,
    statics_channel BIGINT,
    statics_message BIGINT,
    notifications_channel BIGINT,
    create_room_channel BIGINT,
    external_recruitment_channel BIGINT,
    external_recruitment_message BIGINT,
    voice_war_channel BIGINT
)"#;

pub const CREATE_GUILD_MEMBERS: &str = r#"
CREATE TABLE IF NOT EXISTS guild_members (
    guild_id BIGINT NOT NULL,
    member_id BIGINT NOT NULL,
    username TEXT NOT NULL,
    language TEXT NOT NULL DEFAULT 'en',
    gs INTEGER NOT NULL DEFAULT 0,
    build TEXT,
    weapons TEXT NOT NULL DEFAULT 'NULL',
    class TEXT NOT NULL DEFAULT 'NULL',
    dkp BIGINT NOT NULL DEFAULT 0,
    nb_events INTEGER NOT NULL DEFAULT 0,
    registrations INTEGER NOT NULL DEFAULT 0,
    attendances INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (guild_id, member_id)
)"#;

pub const CREATE_EVENTS_DATA: &str = r#"
CREATE TABLE IF NOT EXISTS events_data (
    guild_id BIGINT NOT NULL,
    event_id BIGINT NOT NULL,
    name TEXT NOT NULL,
    event_date DATE NOT NULL,
    event_time TIME NOT NULL,
    duration INTEGER NOT NULL,
    dkp_value BIGINT NOT NULL DEFAULT 0,
    dkp_ins BIGINT NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    initial_members JSONB NOT NULL DEFAULT '[]',
    registrations JSONB NOT NULL DEFAULT '{}',
    actual_presence JSONB NOT NULL DEFAULT '[]',
    game_id INTEGER NOT NULL,
    PRIMARY KEY (guild_id, event_id)
)"#;

pub const CREATE_ABSENCE_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS absence_messages (
    guild_id BIGINT NOT NULL,
    message_id BIGINT NOT NULL,
    member_id BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (guild_id, message_id)
)"#;

pub const CREATE_WELCOME_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS welcome_messages (
    guild_id BIGINT NOT NULL,
    member_id BIGINT NOT NULL,
    channel_id BIGINT NOT NULL,
    message_id BIGINT NOT NULL,
    PRIMARY KEY (guild_id, member_id)
)"#;

pub const CREATE_GUILD_STATIC_GROUPS: &str = r#"
CREATE TABLE IF NOT EXISTS guild_static_groups (
    id BIGSERIAL PRIMARY KEY,
    guild_id BIGINT NOT NULL,
    group_name TEXT NOT NULL,
    leader_id BIGINT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
)"#;

pub const CREATE_GUILD_STATIC_MEMBERS: &str = r#"
CREATE TABLE IF NOT EXISTS guild_static_members (
    group_id BIGINT NOT NULL REFERENCES guild_static_groups(id),
    member_id BIGINT NOT NULL,
    position_order INTEGER NOT NULL,
    PRIMARY KEY (group_id, member_id)
)"#;

pub const CREATE_GUILD_IDEAL_STAFF: &str = r#"
CREATE TABLE IF NOT EXISTS guild_ideal_staff (
    guild_id BIGINT NOT NULL,
    class_name TEXT NOT NULL,
    ideal_count INTEGER NOT NULL,
    PRIMARY KEY (guild_id, class_name)
)"#;

pub const CREATE_WEAPONS: &str = r#"
CREATE TABLE IF NOT EXISTS weapons (
    game_id INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (game_id, code)
)"#;

pub const CREATE_WEAPONS_COMBINATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS weapons_combinations (
    game_id INTEGER NOT NULL,
    weapon1 TEXT NOT NULL,
    weapon2 TEXT NOT NULL,
    role TEXT NOT NULL,
    PRIMARY KEY (game_id, weapon1, weapon2)
)"#;

pub const CREATE_GAMES_LIST: &str = r#"
CREATE TABLE IF NOT EXISTS games_list (
    id INTEGER PRIMARY KEY,
    game_name TEXT NOT NULL,
    max_members INTEGER NOT NULL
)"#;

pub const ALL_DDL: &[&str] = &[
    CREATE_GUILD_SETTINGS,
    CREATE_GUILD_ROLES,
    CREATE_GUILD_CHANNELS,
    CREATE_GUILD_MEMBERS,
    CREATE_EVENTS_DATA,
    CREATE_ABSENCE_MESSAGES,
    CREATE_WELCOME_MESSAGES,
    CREATE_GUILD_STATIC_GROUPS,
    CREATE_GUILD_STATIC_MEMBERS,
    CREATE_GUILD_IDEAL_STAFF,
    CREATE_WEAPONS,
    CREATE_WEAPONS_COMBINATIONS,
    CREATE_GAMES_LIST,
];
