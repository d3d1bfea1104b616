//! Update resolution for `GetUpdates()`.
//!
//! For each installed (id, version) pair the client reports, find the latest
//! qualifying version in the store and include it when it differs from the
//! installed one. "Latest" is publish order; version strings are only ever
//! compared for plain inequality.

use crate::{error::FeedError, model::PackageRecord, params, store::PackageStore, FeedResult};

/// Resolves available updates for the pipe-delimited `packageIds`/`versions`
/// parameters. The two lists must be the same length; a mismatch aborts before
/// any store query runs.
pub fn resolve_updates(
    store: &PackageStore,
    package_ids: &str,
    versions: &str,
    include_prerelease: bool,
) -> FeedResult<Vec<PackageRecord>> {
    let ids = params::split_pipe_list(package_ids);
    let installed = params::split_pipe_list(versions);

    if ids.len() != installed.len() {
        return Err(FeedError::MismatchedUpdateParameters);
    }

    let mut updates = Vec::new();
    for (id, installed_version) in ids.iter().zip(&installed) {
        let latest = match store.latest_version(id, include_prerelease)? {
            Some(record) => record,
            // Ids we have never seen are skipped, not reported.
            None => continue,
        };
        if latest.version != *installed_version {
            updates.push(latest);
        }
    }
    Ok(updates)
}
