//! SQL schema for the eKYC SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema generation for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

-- One current profile per subject; each run overwrites it.
CREATE TABLE IF NOT EXISTS identity_profiles (
    subject_id     TEXT PRIMARY KEY REFERENCES subjects(subject_id),
    identity_json  TEXT NOT NULL,    -- ExtractedIdentity as JSON
    selfie_image   TEXT,
    updated_at     TEXT NOT NULL
);

-- Verification records are append-only. The only UPDATE ever issued is a
-- human review touching the verification_* columns and updated_at.
CREATE TABLE IF NOT EXISTS verification_records (
    record_id            TEXT PRIMARY KEY,
    subject_user_id      TEXT NOT NULL REFERENCES subjects(subject_id),
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    match_status         TEXT NOT NULL,   -- 'PENDING' | 'MATCHED' | 'NOT_MATCHED' | 'ERROR'
    similarity_score     REAL,
    extracted_json       TEXT NOT NULL,
    document_image_ref   TEXT,
    selfie_image_ref     TEXT,
    raw_transcription    TEXT,
    verification_status  TEXT,            -- 'APPROVED' | 'REJECTED' or NULL
    verification_note    TEXT,
    verified_at          TEXT,
    verified_by          TEXT,
    CHECK (similarity_score IS NULL OR (similarity_score >= 0.0 AND similarity_score <= 1.0))
);

CREATE INDEX IF NOT EXISTS records_subject_idx ON verification_records(subject_user_id);

PRAGMA user_version = 1;
";
