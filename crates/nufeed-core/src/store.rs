//! The package store: all reads and writes against the `packages` table.
//!
//! Queries are described by [`StoreQuery`], an immutable value assembled by the
//! OData translator and the search assembler, and only lowered to SQL here.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, SecondsFormat, Utc};
use nufeed_db::{
    define_entity, expr::Col, to_json, CmpOp, InsertQuery, Predicate, SelectQuery, SortOrder,
};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::{
    error::FeedError,
    model::{Dependency, PackageDraft, PackageRecord},
    schema::{SCHEMA, SCHEMA_VERSION},
    FeedResult,
};

define_entity!(
    packages {
        table: "packages",
        columns: {
            ID: i64 => "id",
            PACKAGE_ID: String => "package_id",
            VERSION: String => "version",
            TITLE: Option<String> => "title",
            DESCRIPTION: Option<String> => "description",
            SUMMARY: Option<String> => "summary",
            TAGS: Option<String> => "tags",
            AUTHORS: Option<String> => "authors",
            COPYRIGHT: Option<String> => "copyright",
            ICON_URL: Option<String> => "icon_url",
            LICENSE_URL: Option<String> => "license_url",
            PROJECT_URL: Option<String> => "project_url",
            RELEASE_NOTES: Option<String> => "release_notes",
            REQUIRE_LICENSE_ACCEPTANCE: bool => "require_license_acceptance",
            IS_PRERELEASE: bool => "is_prerelease",
            IS_LATEST_VERSION: bool => "is_latest_version",
            IS_ABSOLUTE_LATEST_VERSION: bool => "is_absolute_latest_version",
            LISTED: bool => "listed",
            DEPENDENCIES: Option<Vec<Dependency>> => "dependencies",
            PACKAGE_HASH: Option<String> => "package_hash",
            PACKAGE_HASH_ALGORITHM: Option<String> => "package_hash_algorithm",
            PACKAGE_SIZE: i64 => "package_size",
            ARCHIVE_PATH: Option<String> => "archive_path",
            VERSION_DOWNLOAD_COUNT: i64 => "version_download_count",
            DOWNLOAD_COUNT: i64 => "download_count",
            CREATED_AT: String => "created_at",
            UPDATED_AT: String => "updated_at"
        }
    }
);

/// Timestamp text stored in SQLite. Fixed width with microseconds and a `Z`
/// suffix, so lexical order equals chronological order.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// An immutable description of a filtered, ordered package query.
///
/// The value holds no connection: it can be cloned, narrowed, counted and
/// paged without re-translating the client's query parameters.
#[derive(Debug, Clone, Default)]
pub struct StoreQuery {
    pub predicate: Option<Predicate>,
    pub order: Vec<(&'static str, SortOrder)>,
}

impl StoreQuery {
    /// Returns a new query with `predicate` AND-ed onto the existing one.
    pub fn narrow(self, predicate: Predicate) -> Self {
        let combined = match self.predicate {
            Some(existing) => existing.and(predicate),
            None => predicate,
        };
        Self {
            predicate: Some(combined),
            order: self.order,
        }
    }
}

pub struct PackageStore {
    db: Arc<Mutex<Connection>>,
}

impl PackageStore {
    pub fn open<P: AsRef<Path>>(path: P) -> FeedResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> FeedResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> FeedResult<()> {
        let conn = self.lock()?;
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn lock(&self) -> FeedResult<std::sync::MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| FeedError::PoisonError)
    }

    /// Starts a query over all package versions.
    pub fn query(
        &self,
        predicate: Option<Predicate>,
        order: Vec<(&'static str, SortOrder)>,
    ) -> StoreQuery {
        StoreQuery { predicate, order }
    }

    fn select(&self, query: &StoreQuery) -> SelectQuery<PackageRecord> {
        let mut select = SelectQuery::<PackageRecord>::from(self.db.clone(), packages::TABLE);
        if let Some(predicate) = &query.predicate {
            select = select.filter(predicate.clone());
        }
        for (column, direction) in query.order.iter().copied() {
            select = select.order_by(Col::<String>::new(column), matches!(direction, SortOrder::Desc));
        }
        // Stable tail keys keep pagination deterministic whatever the caller
        // ordered by.
        select
            .order_by(packages::CREATED_AT, false)
            .order_by(packages::ID, false)
    }

    /// Materializes one page of the query. `skip`/`top` are optional bounds;
    /// a `skip` past the end yields an empty page.
    pub fn page(
        &self,
        query: &StoreQuery,
        skip: Option<u32>,
        top: Option<u32>,
    ) -> FeedResult<Vec<PackageRecord>> {
        let mut select = self.select(query);
        if let Some(top) = top {
            select = select.limit(top);
        }
        if let Some(skip) = skip {
            select = select.offset(skip);
        }
        Ok(select.fetch()?)
    }

    /// Unbounded count of the filtered set, ignoring any paging.
    pub fn count(&self, query: &StoreQuery) -> FeedResult<u64> {
        let mut select = SelectQuery::<PackageRecord>::from(self.db.clone(), packages::TABLE);
        if let Some(predicate) = &query.predicate {
            select = select.filter(predicate.clone());
        }
        Ok(select.count()?)
    }

    /// The count reported next to a materialized page: the unbounded filtered
    /// count when inline counts were requested, otherwise the page length.
    pub fn resolve_count(
        &self,
        query: &StoreQuery,
        inline_requested: bool,
        page_len: usize,
    ) -> FeedResult<u64> {
        if inline_requested {
            self.count(query)
        } else {
            Ok(page_len as u64)
        }
    }

    pub fn find_one(&self, package_id: &str, version: &str) -> FeedResult<Option<PackageRecord>> {
        let record = SelectQuery::<PackageRecord>::from(self.db.clone(), packages::TABLE)
            .filter(
                Predicate::cmp("package_id", CmpOp::Eq, package_id.to_string()).and(
                    Predicate::cmp("version", CmpOp::Eq, version.to_string()),
                ),
            )
            .fetch_one()?;
        Ok(record)
    }

    /// All versions of an id in publish order.
    pub fn all_versions(&self, package_id: &str) -> FeedResult<Vec<PackageRecord>> {
        let query = StoreQuery {
            predicate: Some(Predicate::cmp(
                "package_id",
                CmpOp::Eq,
                package_id.to_string(),
            )),
            order: vec![],
        };
        self.page(&query, None, None)
    }

    /// The most recently published version of an id, optionally restricted to
    /// stable versions. "Most recent" is by `created_at`; ties fall to the
    /// highest row id, so the last write wins. Version strings are never
    /// compared.
    pub fn latest_version(
        &self,
        package_id: &str,
        include_prerelease: bool,
    ) -> FeedResult<Option<PackageRecord>> {
        let mut predicate = Predicate::cmp("package_id", CmpOp::Eq, package_id.to_string());
        if !include_prerelease {
            predicate = predicate.and(Predicate::cmp("is_prerelease", CmpOp::Eq, false));
        }
        let record = SelectQuery::<PackageRecord>::from(self.db.clone(), packages::TABLE)
            .filter(predicate)
            .order_by(packages::CREATED_AT, true)
            .order_by(packages::ID, true)
            .fetch_one()?;
        Ok(record)
    }

    /// Counts one download of `record`: bumps the per-version counter on the
    /// exact row and the per-id counter on every version of the id. Both are
    /// atomic in-place updates inside one transaction, so concurrent downloads
    /// cannot lose increments.
    pub fn increment_download_counters(&self, record: &PackageRecord) -> FeedResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE packages SET version_download_count = version_download_count + 1
             WHERE package_id = ?1 AND version = ?2",
            params![record.package_id, record.version],
        )?;
        tx.execute(
            "UPDATE packages SET download_count = download_count + 1 WHERE package_id = ?1",
            params![record.package_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Persists a new package version and recomputes the latest-version flags
    /// for its id. Used by the upload path and by fixtures; the feed endpoints
    /// only read.
    pub fn save(&self, draft: &PackageDraft) -> FeedResult<PackageRecord> {
        let created_at = draft.created_at.unwrap_or_else(Utc::now);
        let timestamp = format_timestamp(&created_at);

        let row_id = InsertQuery::into(self.db.clone(), packages::TABLE)
            .set(packages::PACKAGE_ID, draft.package_id.clone())
            .set(packages::VERSION, draft.version.clone())
            .set(packages::TITLE, draft.title.clone())
            .set(packages::DESCRIPTION, draft.description.clone())
            .set(packages::SUMMARY, draft.summary.clone())
            .set(packages::TAGS, draft.tags.clone())
            .set(packages::AUTHORS, draft.authors.clone())
            .set(packages::COPYRIGHT, draft.copyright.clone())
            .set(packages::ICON_URL, draft.icon_url.clone())
            .set(packages::LICENSE_URL, draft.license_url.clone())
            .set(packages::PROJECT_URL, draft.project_url.clone())
            .set(packages::RELEASE_NOTES, draft.release_notes.clone())
            .set(
                packages::REQUIRE_LICENSE_ACCEPTANCE,
                draft.require_license_acceptance,
            )
            .set(packages::IS_PRERELEASE, draft.is_prerelease)
            .set(packages::LISTED, draft.listed)
            .set(
                packages::DEPENDENCIES,
                draft.dependencies.as_ref().map(to_json),
            )
            .set(packages::PACKAGE_HASH, draft.package_hash.clone())
            .set(
                packages::PACKAGE_HASH_ALGORITHM,
                draft.package_hash_algorithm.clone(),
            )
            .set(packages::PACKAGE_SIZE, draft.package_size)
            .set(packages::ARCHIVE_PATH, draft.archive_path.clone())
            .set(packages::CREATED_AT, timestamp.clone())
            .set(packages::UPDATED_AT, timestamp)
            .execute()?;

        self.recompute_latest_flags(&draft.package_id)?;

        debug!(
            "saved package {} {} as row {}",
            draft.package_id, draft.version, row_id
        );

        let record = SelectQuery::<PackageRecord>::from(self.db.clone(), packages::TABLE)
            .filter(Predicate::cmp("id", CmpOp::Eq, row_id))
            .fetch_one()?
            .ok_or_else(|| FeedError::Custom("saved package row disappeared".into()))?;
        Ok(record)
    }

    fn recompute_latest_flags(&self, package_id: &str) -> FeedResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE packages SET is_latest_version = 0, is_absolute_latest_version = 0
             WHERE package_id = ?1",
            params![package_id],
        )?;
        tx.execute(
            "UPDATE packages SET is_absolute_latest_version = 1 WHERE id =
               (SELECT id FROM packages WHERE package_id = ?1
                ORDER BY created_at DESC, id DESC LIMIT 1)",
            params![package_id],
        )?;
        tx.execute(
            "UPDATE packages SET is_latest_version = 1 WHERE id =
               (SELECT id FROM packages WHERE package_id = ?1 AND is_prerelease = 0
                ORDER BY created_at DESC, id DESC LIMIT 1)",
            params![package_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use nufeed_db::{CmpOp, Predicate};

    use super::test_support::publish;
    use super::*;

    #[test]
    fn test_page_window() {
        let store = PackageStore::open_in_memory().unwrap();
        for (i, version) in ["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0"].iter().enumerate() {
            publish(&store, "Pager", version, i as i64, false);
        }

        let query = store.query(None, vec![]);
        let page = store.page(&query, Some(1), Some(2)).unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].version, "1.1.0");
        assert_eq!(page[1].version, "1.2.0");
    }

    #[test]
    fn test_resolve_count_inline_vs_page() {
        let store = PackageStore::open_in_memory().unwrap();
        for i in 0..7 {
            publish(&store, "Counted", &format!("1.0.{i}"), i, false);
        }
        publish(&store, "Other", "9.0.0", 100, false);

        let query = store.query(
            Some(Predicate::cmp(
                "package_id",
                CmpOp::Eq,
                "Counted".to_string(),
            )),
            vec![],
        );
        let page = store.page(&query, None, Some(3)).unwrap();
        assert_eq!(page.len(), 3);

        assert_eq!(store.resolve_count(&query, true, page.len()).unwrap(), 7);
        assert_eq!(store.resolve_count(&query, false, page.len()).unwrap(), 3);

        // Past-the-end skip: empty page, inline count still unbounded.
        let empty = store.page(&query, Some(20), Some(3)).unwrap();
        assert!(empty.is_empty());
        assert_eq!(store.resolve_count(&query, true, empty.len()).unwrap(), 7);
    }

    #[test]
    fn test_download_counters() {
        let store = PackageStore::open_in_memory().unwrap();
        publish(&store, "P", "1.0.0", 0, false);
        publish(&store, "P", "2.0.0", 1, false);
        publish(&store, "Q", "1.0.0", 2, false);

        let downloaded = store.find_one("P", "2.0.0").unwrap().unwrap();
        store.increment_download_counters(&downloaded).unwrap();

        let p1 = store.find_one("P", "1.0.0").unwrap().unwrap();
        let p2 = store.find_one("P", "2.0.0").unwrap().unwrap();
        let q1 = store.find_one("Q", "1.0.0").unwrap().unwrap();

        assert_eq!(p2.version_download_count, 1);
        assert_eq!(p1.version_download_count, 0);
        assert_eq!(p1.download_count, 1);
        assert_eq!(p2.download_count, 1);
        assert_eq!(q1.version_download_count, 0);
        assert_eq!(q1.download_count, 0);
    }

    #[test]
    fn test_latest_flags_follow_publish_order() {
        let store = PackageStore::open_in_memory().unwrap();
        publish(&store, "A", "1.0.0", 0, false);
        publish(&store, "A", "1.1.0", 1, false);
        publish(&store, "A", "2.0.0-beta", 2, true);

        let stable = store.find_one("A", "1.1.0").unwrap().unwrap();
        assert!(stable.is_latest_version);
        assert!(!stable.is_absolute_latest_version);

        let beta = store.find_one("A", "2.0.0-beta").unwrap().unwrap();
        assert!(!beta.is_latest_version);
        assert!(beta.is_absolute_latest_version);

        let old = store.find_one("A", "1.0.0").unwrap().unwrap();
        assert!(!old.is_latest_version);
        assert!(!old.is_absolute_latest_version);
    }

    #[test]
    fn test_latest_version_uses_publish_order_not_version_strings() {
        let store = PackageStore::open_in_memory().unwrap();
        // "10.0.0" sorts before "2.0.0" lexically; publish order must win.
        publish(&store, "Lex", "10.0.0", 0, false);
        publish(&store, "Lex", "2.0.0", 1, false);

        let latest = store.latest_version("Lex", false).unwrap().unwrap();
        assert_eq!(latest.version, "2.0.0");
    }

    #[test]
    fn test_all_versions_in_publish_order() {
        let store = PackageStore::open_in_memory().unwrap();
        publish(&store, "Multi", "10.0.0", 0, false);
        publish(&store, "Multi", "2.0.0", 1, false);
        publish(&store, "Solo", "1.0.0", 2, false);

        let versions: Vec<String> = store
            .all_versions("Multi")
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec!["10.0.0".to_string(), "2.0.0".to_string()]);
    }

    #[test]
    fn test_find_one_is_case_insensitive() {
        let store = PackageStore::open_in_memory().unwrap();
        publish(&store, "Newtonsoft.Json", "12.0.3", 0, false);

        let found = store.find_one("newtonsoft.json", "12.0.3").unwrap();
        assert!(found.is_some());
    }
}
