//! SQL schema for the triage SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

use triage_core::observable::DEFAULT_OBSERVABLE_TYPES;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS alerts (
    alert_id      TEXT PRIMARY KEY,
    organisation  TEXT NOT NULL,
    alert_type    TEXT NOT NULL,
    source        TEXT NOT NULL,
    source_ref    TEXT NOT NULL,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    severity      TEXT NOT NULL,
    tlp           TEXT NOT NULL,
    date          TEXT NOT NULL,
    tags          TEXT NOT NULL DEFAULT '[]',
    custom_fields TEXT NOT NULL DEFAULT '{}',
    status        TEXT NOT NULL,   -- 'New' | 'Updated' | 'Ignored' | 'Imported'
    read          INTEGER NOT NULL,
    follow        INTEGER NOT NULL,
    case_id       TEXT,
    case_template TEXT,
    created_by    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_by    TEXT,
    updated_at    TEXT,
    UNIQUE (organisation, alert_type, source, source_ref)
);

-- Content-addressed: the primary key is the SHA-256 of `data`.
CREATE TABLE IF NOT EXISTS blobs (
    hash       TEXT PRIMARY KEY,
    size       INTEGER NOT NULL,
    data       BLOB NOT NULL,
    created_at TEXT NOT NULL
);

-- Owners are polymorphic (alert or case), so owner_id carries no FK.
CREATE TABLE IF NOT EXISTS observables (
    observable_id           TEXT PRIMARY KEY,
    owner_kind              TEXT NOT NULL,   -- 'alert' | 'case'
    owner_id                TEXT NOT NULL,
    data_type               TEXT NOT NULL,
    value                   TEXT,
    attachment_hash         TEXT REFERENCES blobs(hash),
    attachment_name         TEXT,
    attachment_content_type TEXT,
    attachment_size         INTEGER,
    message                 TEXT,
    tags                    TEXT NOT NULL DEFAULT '[]',
    ioc                     INTEGER NOT NULL,
    sighted                 INTEGER NOT NULL,
    tlp                     TEXT NOT NULL,
    position                INTEGER NOT NULL,
    created_by              TEXT NOT NULL,
    created_at              TEXT NOT NULL,
    CHECK ((value IS NULL) != (attachment_hash IS NULL))
);

CREATE TABLE IF NOT EXISTS cases (
    case_id       TEXT PRIMARY KEY,
    organisation  TEXT NOT NULL,
    number        INTEGER NOT NULL,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    severity      TEXT NOT NULL,
    tlp           TEXT NOT NULL,
    tags          TEXT NOT NULL DEFAULT '[]',
    flag          INTEGER NOT NULL,
    custom_fields TEXT NOT NULL DEFAULT '{}',
    status        TEXT NOT NULL,
    case_template TEXT,
    created_by    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_by    TEXT,
    updated_at    TEXT,
    UNIQUE (organisation, number)
);

CREATE TABLE IF NOT EXISTS case_templates (
    organisation  TEXT NOT NULL,
    name          TEXT NOT NULL,
    title_prefix  TEXT,
    description   TEXT,
    severity      TEXT,
    tlp           TEXT,
    tags          TEXT NOT NULL DEFAULT '[]',
    flag          INTEGER NOT NULL,
    custom_fields TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (organisation, name)
);

CREATE TABLE IF NOT EXISTS observable_types (
    name          TEXT PRIMARY KEY,
    is_attachment INTEGER NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id    TEXT PRIMARY KEY,
    operation   TEXT NOT NULL,
    target_id   TEXT NOT NULL,
    actor       TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    outcome     TEXT NOT NULL    -- JSON-encoded AuditOutcome
);

CREATE INDEX IF NOT EXISTS alerts_org_created_idx ON alerts(organisation, created_at);
CREATE INDEX IF NOT EXISTS observables_owner_idx  ON observables(owner_kind, owner_id);
CREATE INDEX IF NOT EXISTS observables_hash_idx   ON observables(attachment_hash);
CREATE INDEX IF NOT EXISTS audit_target_idx       ON audit_log(target_id);

PRAGMA user_version = 1;
";

/// Rows for the observable-type catalog of a fresh store.
pub fn default_observable_types() -> impl Iterator<Item = (&'static str, bool)> {
  DEFAULT_OBSERVABLE_TYPES.iter().copied()
}
