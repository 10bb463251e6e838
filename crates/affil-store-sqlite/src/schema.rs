//! SQL schema for the affiliation store.
//!
//! Executed at every open; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
//! Timestamps are fixed-width UTC text (`YYYY-MM-DDTHH:MM:SS.ffffffZ`), so
//! comparing them as strings compares them in time.

pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS countries (
    code   TEXT PRIMARY KEY,           -- ISO-3166 alpha-2
    name   TEXT NOT NULL,
    alpha3 TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS uidentities (
    uuid          TEXT PRIMARY KEY,
    last_modified TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    uuid         TEXT PRIMARY KEY REFERENCES uidentities(uuid) ON DELETE CASCADE,
    name         TEXT,
    email        TEXT,
    gender       TEXT,                 -- 'male' | 'female'
    gender_acc   INTEGER,
    is_bot       INTEGER NOT NULL DEFAULT 0,
    country_code TEXT REFERENCES countries(code),
    CHECK (gender IS NULL OR gender IN ('male', 'female')),
    CHECK (gender_acc IS NULL OR (gender IS NOT NULL AND gender_acc BETWEEN 1 AND 100)),
    CHECK (is_bot IN (0, 1))
);

-- id is the SHA-1 of source:email:name:username.
CREATE TABLE IF NOT EXISTS identities (
    id            TEXT PRIMARY KEY,
    uuid          TEXT REFERENCES uidentities(uuid) ON DELETE CASCADE,
    source        TEXT NOT NULL,
    name          TEXT,
    email         TEXT,
    username      TEXT,
    last_modified TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS organizations (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS domains_organizations (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    organization_id INTEGER NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    domain          TEXT NOT NULL,
    is_top_domain   INTEGER NOT NULL DEFAULT 0,
    UNIQUE (organization_id, domain)
);

CREATE TABLE IF NOT EXISTS enrollments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid            TEXT NOT NULL REFERENCES uidentities(uuid) ON DELETE CASCADE,
    organization_id INTEGER NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    start           TEXT NOT NULL,
    `end`           TEXT NOT NULL,
    UNIQUE (uuid, organization_id, start, `end`),
    CHECK  (start <= `end`)
);

CREATE TABLE IF NOT EXISTS matching_blacklist (
    excluded TEXT PRIMARY KEY
);

-- Archive twins: same columns plus archived_at, no constraints. Rows written
-- by one multi-step operation share one archived_at.
CREATE TABLE IF NOT EXISTS uidentities_archive (
    archive_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid          TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    archived_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles_archive (
    archive_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid         TEXT NOT NULL,
    name         TEXT,
    email        TEXT,
    gender       TEXT,
    gender_acc   INTEGER,
    is_bot       INTEGER NOT NULL,
    country_code TEXT,
    archived_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS identities_archive (
    archive_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    id            TEXT NOT NULL,
    uuid          TEXT,
    source        TEXT NOT NULL,
    name          TEXT,
    email         TEXT,
    username      TEXT,
    last_modified TEXT NOT NULL,
    archived_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments_archive (
    archive_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    id              INTEGER NOT NULL,
    uuid            TEXT NOT NULL,
    organization_id INTEGER NOT NULL,
    start           TEXT NOT NULL,
    `end`           TEXT NOT NULL,
    archived_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS organizations_archive (
    archive_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    id          INTEGER NOT NULL,
    name        TEXT NOT NULL,
    archived_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS identities_uuid_idx     ON identities(uuid);
CREATE INDEX IF NOT EXISTS identities_email_idx    ON identities(email);
CREATE INDEX IF NOT EXISTS profiles_email_idx      ON profiles(email);
CREATE INDEX IF NOT EXISTS enrollments_uuid_idx    ON enrollments(uuid, organization_id);
CREATE INDEX IF NOT EXISTS uidentities_archive_idx ON uidentities_archive(uuid, archived_at);
CREATE INDEX IF NOT EXISTS profiles_archive_idx    ON profiles_archive(uuid, archived_at);
CREATE INDEX IF NOT EXISTS identities_archive_idx  ON identities_archive(id, archived_at);
CREATE INDEX IF NOT EXISTS identities_archive_uidx ON identities_archive(uuid, archived_at);
CREATE INDEX IF NOT EXISTS enrollments_archive_idx ON enrollments_archive(id, archived_at);
CREATE INDEX IF NOT EXISTS enrollments_archive_uidx ON enrollments_archive(uuid, archived_at);

PRAGMA user_version = 1;
";
