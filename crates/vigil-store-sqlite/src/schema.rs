//! SQL schema for the Vigil SQLite store.
//!
//! Executed on every connection open; the DDL is idempotent. `PRAGMA
//! user_version` records the schema revision so future migrations can gate
//! on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id            TEXT PRIMARY KEY,
    email                 TEXT NOT NULL UNIQUE,
    phone                 TEXT,
    display_name          TEXT,
    push_token            TEXT,
    state                 TEXT NOT NULL DEFAULT 'ONBOARDING',
    last_confirmed_at     TEXT,             -- ISO 8601 UTC; NULL until first check-in
    checkin_interval_secs INTEGER NOT NULL DEFAULT 86400,
    grace_period_secs     INTEGER NOT NULL DEFAULT 3600,
    vacation_mode         INTEGER NOT NULL DEFAULT 0,
    reminder_enabled      INTEGER NOT NULL DEFAULT 1,
    reminder_offset_secs  INTEGER NOT NULL DEFAULT 1800,
    sound_enabled         INTEGER NOT NULL DEFAULT 1,
    alert_sound           TEXT NOT NULL DEFAULT 'default',
    alert_volume          INTEGER NOT NULL DEFAULT 80,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    contact_id        TEXT PRIMARY KEY,
    owner_id          TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    name              TEXT NOT NULL,
    channel           TEXT NOT NULL,    -- 'PUSH' | 'EMAIL' | 'SMS'
    destination       TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'PENDING',
    linked_subject_id TEXT REFERENCES subjects(subject_id) ON DELETE SET NULL,
    invite_sent_at    TEXT,
    created_at        TEXT NOT NULL
);

-- Events and deliveries are strictly append-only.
-- No UPDATE or DELETE is ever issued against these tables except the
-- ON DELETE CASCADE from account deletion.
CREATE TABLE IF NOT EXISTS notification_events (
    event_id   TEXT PRIMARY KEY,
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    meta       TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_deliveries (
    delivery_id          TEXT PRIMARY KEY,
    event_id             TEXT NOT NULL REFERENCES notification_events(event_id) ON DELETE CASCADE,
    channel              TEXT,             -- NULL when no channel was usable
    destination          TEXT NOT NULL,
    status               TEXT NOT NULL,    -- 'SENT' | 'FAILED' | 'SKIPPED'
    error                TEXT,
    delivered_at         TEXT,
    recipient_subject_id TEXT,
    created_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS state_events (
    state_event_id TEXT PRIMARY KEY,
    subject_id     TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    to_state       TEXT NOT NULL,
    reason         TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS api_tokens (
    token_hash TEXT PRIMARY KEY,          -- SHA-256 hex of the bearer token
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS contacts_owner_idx        ON contacts(owner_id);
CREATE INDEX IF NOT EXISTS contacts_destination_idx  ON contacts(destination);
CREATE INDEX IF NOT EXISTS contacts_linked_idx       ON contacts(linked_subject_id);
CREATE INDEX IF NOT EXISTS events_subject_idx        ON notification_events(subject_id);
CREATE INDEX IF NOT EXISTS deliveries_event_idx      ON notification_deliveries(event_id);
CREATE INDEX IF NOT EXISTS deliveries_dest_time_idx  ON notification_deliveries(destination, created_at);
CREATE INDEX IF NOT EXISTS state_events_subject_idx  ON state_events(subject_id);

PRAGMA user_version = 1;
";
