//! SQLite schema for the package store.
//!
//! Applied through `PRAGMA user_version` so existing databases are only
//! migrated forward.

pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    id INTEGER PRIMARY KEY,
    package_id TEXT NOT NULL COLLATE NOCASE,
    version TEXT NOT NULL COLLATE NOCASE,
    title TEXT,
    description TEXT,
    summary TEXT,
    tags TEXT,
    authors TEXT,
    copyright TEXT,
    icon_url TEXT,
    license_url TEXT,
    project_url TEXT,
    release_notes TEXT,
    require_license_acceptance INTEGER NOT NULL DEFAULT 0,
    is_prerelease INTEGER NOT NULL DEFAULT 0,
    is_latest_version INTEGER NOT NULL DEFAULT 0,
    is_absolute_latest_version INTEGER NOT NULL DEFAULT 0,
    listed INTEGER NOT NULL DEFAULT 1,
    dependencies JSONB,
    package_hash TEXT,
    package_hash_algorithm TEXT,
    package_size INTEGER NOT NULL DEFAULT 0,
    archive_path TEXT,
    version_download_count INTEGER NOT NULL DEFAULT 0,
    download_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (package_id, version)
);

CREATE INDEX IF NOT EXISTS idx_packages_package_id ON packages (package_id);
CREATE INDEX IF NOT EXISTS idx_packages_prerelease ON packages (is_prerelease);
CREATE INDEX IF NOT EXISTS idx_packages_created_at ON packages (created_at);
"#;
