//! SQL schema for the trial store.
//!
//! Run on every open by the first connection of a store. Every statement is
//! idempotent, so reopening an existing database leaves it untouched.
//! `user_version` is stamped but not yet read back.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS trial (
    trial_id                INTEGER PRIMARY KEY,
    nct_id                  TEXT NOT NULL UNIQUE,
    brief_title             TEXT,
    official_title          TEXT,
    overall_status          TEXT,
    phase                   TEXT,
    study_type              TEXT,
    eligibility_criteria    TEXT,
    gender                  TEXT,
    minimum_age             TEXT,
    maximum_age             TEXT,
    start_date              TEXT,   -- YYYY-MM-DD
    primary_completion_date TEXT,
    completion_date         TEXT,
    first_posted            TEXT,
    last_update_posted      TEXT,
    detailed_description    TEXT,   -- opaque JSON
    arms_groups             TEXT,
    outcomes                TEXT,
    contacts                TEXT,
    created_at              TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS condition (
    condition_id    INTEGER PRIMARY KEY,
    name            TEXT NOT NULL,   -- first raw spelling seen
    normalized_name TEXT NOT NULL UNIQUE,
    created_at      TEXT NOT NULL
);

-- An absent type is stored as normalized_type = '' so the UNIQUE pair
-- still deduplicates untyped interventions.
CREATE TABLE IF NOT EXISTS intervention (
    intervention_id   INTEGER PRIMARY KEY,
    name              TEXT NOT NULL,
    normalized_name   TEXT NOT NULL,
    intervention_type TEXT,
    normalized_type   TEXT NOT NULL DEFAULT '',
    description       TEXT,
    created_at        TEXT NOT NULL,
    UNIQUE (normalized_name, normalized_type)
);

CREATE TABLE IF NOT EXISTS location (
    location_id INTEGER PRIMARY KEY,
    trial_id    INTEGER NOT NULL REFERENCES trial(trial_id) ON DELETE CASCADE,
    facility    TEXT,
    city        TEXT,
    state       TEXT,
    country     TEXT,
    country_key TEXT,   -- normalized country, for lookups
    latitude    REAL CHECK (latitude  IS NULL OR latitude  BETWEEN -90  AND 90),
    longitude   REAL CHECK (longitude IS NULL OR longitude BETWEEN -180 AND 180)
);

CREATE TABLE IF NOT EXISTS trial_condition (
    trial_id     INTEGER NOT NULL REFERENCES trial(trial_id) ON DELETE CASCADE,
    condition_id INTEGER NOT NULL REFERENCES condition(condition_id) ON DELETE CASCADE,
    PRIMARY KEY (trial_id, condition_id)
);

CREATE TABLE IF NOT EXISTS trial_intervention (
    trial_id        INTEGER NOT NULL REFERENCES trial(trial_id) ON DELETE CASCADE,
    intervention_id INTEGER NOT NULL REFERENCES intervention(intervention_id) ON DELETE CASCADE,
    PRIMARY KEY (trial_id, intervention_id)
);

CREATE INDEX IF NOT EXISTS location_trial_idx      ON location(trial_id);
CREATE INDEX IF NOT EXISTS location_country_idx    ON location(country_key);
CREATE INDEX IF NOT EXISTS trial_condition_rev_idx ON trial_condition(condition_id);
CREATE INDEX IF NOT EXISTS trial_intervention_rev_idx
    ON trial_intervention(intervention_id);
CREATE INDEX IF NOT EXISTS intervention_name_idx   ON intervention(normalized_name);

PRAGMA user_version = 1;
";

/// Settings applied to every connection, including those opened after the
/// schema exists.
pub const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";
