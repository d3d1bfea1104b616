//! The package record as stored and served by the feed.

use chrono::{DateTime, Utc};
use nufeed_db::{from_optional_json, FromRow};
use rusqlite::{types::Value, Row};
use serde::{Deserialize, Serialize};

/// A single declared dependency of a package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
}

impl Dependency {
    /// Wire form used inside the `Dependencies` feed property:
    /// `Id:Version` or `Id:Version:TargetFramework`.
    pub fn to_wire(&self) -> String {
        match &self.target_framework {
            Some(fw) => format!("{}:{}:{}", self.id, self.version, fw),
            None => format!("{}:{}", self.id, self.version),
        }
    }
}

/// One published package version.
///
/// `version` is an opaque string: ordering between versions of an id is by
/// `created_at` (publish order), never by parsing the version.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub id: i64,
    pub package_id: String,
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<String>,
    pub authors: Option<String>,
    pub copyright: Option<String>,
    pub icon_url: Option<String>,
    pub license_url: Option<String>,
    pub project_url: Option<String>,
    pub release_notes: Option<String>,
    pub require_license_acceptance: bool,
    pub is_prerelease: bool,
    pub is_latest_version: bool,
    pub is_absolute_latest_version: bool,
    pub listed: bool,
    pub dependencies: Option<Vec<Dependency>>,
    pub package_hash: Option<String>,
    pub package_hash_algorithm: Option<String>,
    pub package_size: i64,
    pub archive_path: Option<String>,
    pub version_download_count: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PackageRecord {
    /// Lowercased, trimmed form of the version string.
    pub fn normalized_version(&self) -> String {
        self.version.trim().to_lowercase()
    }

    /// Pipe-joined wire form of the dependency list, empty when there are none.
    pub fn dependencies_string(&self) -> String {
        match &self.dependencies {
            Some(deps) => deps
                .iter()
                .map(Dependency::to_wire)
                .collect::<Vec<_>>()
                .join("|"),
            None => String::new(),
        }
    }

    /// Reads one column of this record as a SQLite value.
    ///
    /// This mirrors what the store sees for the same column and backs the
    /// in-memory evaluation of query predicates.
    pub fn column_value(&self, column: &str) -> Value {
        fn text(value: &Option<String>) -> Value {
            match value {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            }
        }

        match column {
            "id" => Value::Integer(self.id),
            "package_id" => Value::Text(self.package_id.clone()),
            "version" => Value::Text(self.version.clone()),
            "title" => text(&self.title),
            "description" => text(&self.description),
            "summary" => text(&self.summary),
            "tags" => text(&self.tags),
            "authors" => text(&self.authors),
            "copyright" => text(&self.copyright),
            "icon_url" => text(&self.icon_url),
            "license_url" => text(&self.license_url),
            "project_url" => text(&self.project_url),
            "release_notes" => text(&self.release_notes),
            "require_license_acceptance" => Value::Integer(self.require_license_acceptance as i64),
            "is_prerelease" => Value::Integer(self.is_prerelease as i64),
            "is_latest_version" => Value::Integer(self.is_latest_version as i64),
            "is_absolute_latest_version" => {
                Value::Integer(self.is_absolute_latest_version as i64)
            }
            "listed" => Value::Integer(self.listed as i64),
            "package_hash" => text(&self.package_hash),
            "package_hash_algorithm" => text(&self.package_hash_algorithm),
            "package_size" => Value::Integer(self.package_size),
            "archive_path" => text(&self.archive_path),
            "version_download_count" => Value::Integer(self.version_download_count),
            "download_count" => Value::Integer(self.download_count),
            "created_at" => Value::Text(crate::store::format_timestamp(&self.created_at)),
            "updated_at" => Value::Text(crate::store::format_timestamp(&self.updated_at)),
            _ => Value::Null,
        }
    }
}

impl FromRow for PackageRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            package_id: row.get("package_id")?,
            version: row.get("version")?,
            title: row.get("title")?,
            description: row.get("description")?,
            summary: row.get("summary")?,
            tags: row.get("tags")?,
            authors: row.get("authors")?,
            copyright: row.get("copyright")?,
            icon_url: row.get("icon_url")?,
            license_url: row.get("license_url")?,
            project_url: row.get("project_url")?,
            release_notes: row.get("release_notes")?,
            require_license_acceptance: row.get("require_license_acceptance")?,
            is_prerelease: row.get("is_prerelease")?,
            is_latest_version: row.get("is_latest_version")?,
            is_absolute_latest_version: row.get("is_absolute_latest_version")?,
            listed: row.get("listed")?,
            dependencies: from_optional_json(row.get("dependencies")),
            package_hash: row.get("package_hash")?,
            package_hash_algorithm: row.get("package_hash_algorithm")?,
            package_size: row.get("package_size")?,
            archive_path: row.get("archive_path")?,
            version_download_count: row.get("version_download_count")?,
            download_count: row.get("download_count")?,
            created_at: parse_timestamp(row, "created_at")?,
            updated_at: parse_timestamp(row, "updated_at")?,
        })
    }
}

fn parse_timestamp(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

/// Input for [`crate::store::PackageStore::save`]: a package version as the
/// upload path hands it over, before the store assigns a row id and
/// recomputes the latest-version flags.
#[derive(Debug, Clone, Default)]
pub struct PackageDraft {
    pub package_id: String,
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<String>,
    pub authors: Option<String>,
    pub copyright: Option<String>,
    pub icon_url: Option<String>,
    pub license_url: Option<String>,
    pub project_url: Option<String>,
    pub release_notes: Option<String>,
    pub require_license_acceptance: bool,
    pub is_prerelease: bool,
    pub listed: bool,
    pub dependencies: Option<Vec<Dependency>>,
    pub package_hash: Option<String>,
    pub package_hash_algorithm: Option<String>,
    pub package_size: i64,
    pub archive_path: Option<String>,
    /// Publish instant; `None` means "now". Explicit values keep the publish
    /// order under control in fixtures and imports.
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_wire_format() {
        let plain = Dependency {
            id: "Newtonsoft.Json".into(),
            version: "12.0.3".into(),
            target_framework: None,
        };
        assert_eq!(plain.to_wire(), "Newtonsoft.Json:12.0.3");

        let framed = Dependency {
            target_framework: Some("net45".into()),
            ..plain
        };
        assert_eq!(framed.to_wire(), "Newtonsoft.Json:12.0.3:net45");
    }
}
