//! The NuGet V2 HTTP surface.
//!
//! OData resource segments carry parentheses (`Packages()`,
//! `Packages(Id='x',Version='y')`), which no path router pattern-matches, so
//! a single `/{segment}` route dispatches on the parsed segment name. Unknown
//! segments answer with the canonical segment-not-found error document.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use nufeed_core::{
    error::FeedError,
    feed::{
        build_entry, build_error, build_feed, metadata_document, render_single_entry,
        resource_not_found, selected_properties, service_document,
    },
    odata, params, registry, search, updates, FeedResult, PackageStore, StoreQuery,
};
use tracing::error;

use crate::config::Config;

const XML_CONTENT_TYPE: &str = "application/xml;charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PackageStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: PackageStore, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_root))
        .route("/{segment}", get(dispatch_segment))
        .route("/{segment}/{action}", get(dispatch_action))
        .route("/package/{id}/{version}", get(download))
        .with_state(state)
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

/// Maps a failure onto the single OData error shape. Internal failures keep
/// their detail in the log, not in the response.
fn error_response(err: FeedError) -> Response {
    let doc = match &err {
        FeedError::UnsupportedFilterSyntax(_) => build_error(err.to_string(), "en-US", 400),
        FeedError::MismatchedUpdateParameters => build_error("Invalid version count", "en-US", 301),
        FeedError::RecordNotFound(segment) => resource_not_found(segment),
        _ => {
            error!("request failed: {err}");
            build_error("An internal error occurred.", "en-US", 500)
        }
    };
    let status =
        StatusCode::from_u16(doc.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    xml_response(status, doc.render())
}

fn respond(result: FeedResult<Response>) -> Response {
    result.unwrap_or_else(error_response)
}

async fn service_root(State(state): State<AppState>) -> Response {
    xml_response(StatusCode::OK, service_document(&state.config.base_url()))
}

async fn dispatch_segment(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match segment.as_str() {
        "Packages" | "Packages()" => respond(packages_feed(&state, &params)),
        "Search" | "Search()" => respond(search_feed(&state, &params)),
        "GetUpdates" | "GetUpdates()" => respond(updates_feed(&state, &params)),
        "$metadata" => xml_response(StatusCode::OK, metadata_document()),
        other => match parse_package_resource(other) {
            Some((id, version)) => respond(package_entry(&state, &id, &version)),
            None => {
                let doc = resource_not_found(segment_name(other));
                xml_response(StatusCode::NOT_FOUND, doc.render())
            }
        },
    }
}

async fn dispatch_action(
    State(state): State<AppState>,
    Path((segment, action)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match (segment.as_str(), action.as_str()) {
        ("Search" | "Search()", "$count" | "count") => respond(search_count(&state, &params)),
        (segment, _) => {
            let doc = resource_not_found(segment_name(segment));
            xml_response(StatusCode::NOT_FOUND, doc.render())
        }
    }
}

/// `Packages(Id='…',Version='…')` resource addressing.
fn parse_package_resource(segment: &str) -> Option<(String, String)> {
    let inner = segment.strip_prefix("Packages(")?.strip_suffix(')')?;
    let mut id = None;
    let mut version = None;
    for part in inner.split(',') {
        let (key, value) = part.split_once('=')?;
        let value = value.trim().trim_matches('\'');
        match key.trim() {
            "Id" => id = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            _ => return None,
        }
    }
    Some((id?, version?))
}

fn segment_name(segment: &str) -> &str {
    segment.split('(').next().unwrap_or(segment)
}

fn packages_feed(state: &AppState, params: &HashMap<String, String>) -> FeedResult<Response> {
    let query = odata::build_packages_query(
        param(params, "$filter"),
        param(params, "$orderby"),
        param(params, "id"),
    )?;
    feed_response(state, &query, "Packages", params)
}

fn search_feed(state: &AppState, params: &HashMap<String, String>) -> FeedResult<Response> {
    let query = build_search(params)?;
    feed_response(state, &query, "Search", params)
}

/// The bare `$count` action runs the exact same assembled query as the search
/// feed, so the number can never drift from the materialized results.
fn search_count(state: &AppState, params: &HashMap<String, String>) -> FeedResult<Response> {
    let query = build_search(params)?;
    let count = state.store.count(&query)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain;charset=utf-8")],
        count.to_string(),
    )
        .into_response())
}

fn build_search(params: &HashMap<String, String>) -> FeedResult<StoreQuery> {
    // targetFramework is accepted but not used for filtering.
    search::build_search_query(
        param(params, "$filter"),
        param(params, "$orderby"),
        param(params, "searchTerm"),
        params::parse_flag(param(params, "includePrerelease")),
    )
}

fn updates_feed(state: &AppState, params: &HashMap<String, String>) -> FeedResult<Response> {
    let records = updates::resolve_updates(
        &state.store,
        param(params, "packageIds").unwrap_or(""),
        param(params, "versions").unwrap_or(""),
        params::parse_flag(param(params, "includePrerelease")),
    )?;

    let properties = selected_properties(param(params, "$select"));
    let base = state.config.base_url();
    // Inline counts are not honored here: the count is always the number of
    // materialized entries.
    let feed = build_feed(
        format!("{base}/GetUpdates"),
        "GetUpdates",
        Utc::now(),
        Some(records.len() as u64),
        &records,
        &properties,
    )?;
    Ok(xml_response(StatusCode::OK, feed.render(&base)))
}

fn feed_response(
    state: &AppState,
    query: &StoreQuery,
    title: &str,
    params: &HashMap<String, String>,
) -> FeedResult<Response> {
    let top = params::parse_page_bound(param(params, "$top"));
    let skip = params::parse_page_bound(param(params, "$skip"));
    let records = state.store.page(query, skip, top)?;

    let inline = params::parse_inline_count(param(params, "$inlinecount"));
    let count = state.store.resolve_count(query, inline, records.len())?;

    let properties = selected_properties(param(params, "$select"));
    let base = state.config.base_url();
    let feed = build_feed(
        format!("{base}/{title}"),
        title,
        Utc::now(),
        Some(count),
        &records,
        &properties,
    )?;
    Ok(xml_response(StatusCode::OK, feed.render(&base)))
}

fn package_entry(state: &AppState, id: &str, version: &str) -> FeedResult<Response> {
    let record = state
        .store
        .find_one(id, version)?
        .ok_or_else(|| FeedError::RecordNotFound("Packages".into()))?;

    let properties = registry::all_queryable_names();
    let entry = build_entry(&record, &properties)?;
    let base = state.config.base_url();
    Ok(xml_response(StatusCode::OK, render_single_entry(&entry, &base)))
}

/// Streams the package archive and counts the download.
async fn download(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, String)>,
) -> Response {
    let record = match state.store.find_one(&id, &version) {
        Ok(Some(record)) => record,
        Ok(None) => return (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(err) => return error_response(err),
    };

    if let Err(err) = state.store.increment_download_counters(&record) {
        return error_response(err);
    }

    let file_name = record
        .archive_path
        .clone()
        .unwrap_or_else(|| format!("{}.{}.nupkg", record.package_id, record.version));
    let path = PathBuf::from(&state.config.packages_path).join(&file_name);

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => error_response(FeedError::IoError {
            action: format!("reading archive {}", path.display()),
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, TimeZone, Utc};
    use http_body_util::BodyExt;
    use nufeed_core::PackageDraft;
    use tower::ServiceExt;

    use super::*;

    const BASE: &str = "http://feed.test/api/v2";

    fn test_state(packages_path: &str) -> AppState {
        let store = PackageStore::open_in_memory().unwrap();
        let config = Config {
            packages_path: packages_path.into(),
            external_url: Some(BASE.into()),
            ..Default::default()
        };
        AppState::new(store, config)
    }

    fn publish(state: &AppState, package_id: &str, version: &str, minutes: i64, prerelease: bool) {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        state
            .store
            .save(&PackageDraft {
                package_id: package_id.into(),
                version: version.into(),
                title: Some(format!("{package_id} title")),
                listed: true,
                is_prerelease: prerelease,
                created_at: Some(base + Duration::minutes(minutes)),
                ..Default::default()
            })
            .unwrap();
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, String) {
        let response = router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_service_document_at_root() {
        let state = test_state("packages");
        let (status, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<service"));
        assert!(body.contains("<collection href=\"Packages\">"));
    }

    #[tokio::test]
    async fn test_packages_feed_with_filter_and_count() {
        let state = test_state("packages");
        publish(&state, "A", "1.0.0", 0, false);
        publish(&state, "A", "1.1.0", 1, false);
        publish(&state, "B", "2.0.0", 2, false);

        let (status, body) = get(
            &state,
            "/Packages()?$filter=IsLatestVersion%20eq%20true&$inlinecount=allpages",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<m:count>2</m:count>"));
        assert!(body.contains("Packages(Id='A',Version='1.1.0')"));
        assert!(body.contains("Packages(Id='B',Version='2.0.0')"));
        assert!(!body.contains("Version='1.0.0'"));
    }

    #[tokio::test]
    async fn test_packages_top_skip_without_inline_count() {
        let state = test_state("packages");
        for (i, version) in ["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0"]
            .iter()
            .enumerate()
        {
            publish(&state, "Pager", version, i as i64, false);
        }

        let (status, body) = get(&state, "/Packages()?$top=2&$skip=1").await;
        assert_eq!(status, StatusCode::OK);
        // Without $inlinecount, the count reflects the page.
        assert!(body.contains("<m:count>2</m:count>"));
        assert!(body.contains("Version='1.1.0'"));
        assert!(body.contains("Version='1.2.0'"));
        assert!(!body.contains("Version='1.0.0'"));
    }

    #[tokio::test]
    async fn test_select_restricts_rendered_properties() {
        let state = test_state("packages");
        publish(&state, "A", "1.0.0", 0, false);

        let (_, body) = get(&state, "/Packages()?$select=Title,Version").await;
        assert!(body.contains("<d:Title>"));
        assert!(body.contains("<d:Version>"));
        assert!(!body.contains("<d:Id>"));
        assert!(!body.contains("<d:DownloadCount"));
    }

    #[tokio::test]
    async fn test_unsupported_filter_yields_error_document() {
        let state = test_state("packages");
        let (status, body) = get(&state, "/Packages()?$filter=substringof('x',Tags)").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("<m:error"));
        assert!(body.contains("Unsupported filter syntax"));
    }

    #[tokio::test]
    async fn test_package_resource_and_missing_resource() {
        let state = test_state("packages");
        publish(&state, "A", "1.0.0", 0, false);

        let (status, body) = get(&state, "/Packages(Id='A',Version='1.0.0')").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<entry xml:base=\"http://feed.test/api/v2\""));
        assert!(body.contains("<d:Id>A</d:Id>"));

        let (status, body) = get(&state, "/Packages(Id='A',Version='9.9.9')").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("Resource not found for the segment 'Packages'."));
    }

    #[tokio::test]
    async fn test_unknown_segment_is_a_segment_error() {
        let state = test_state("packages");
        let (status, body) = get(&state, "/Bogus()").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("Resource not found for the segment 'Bogus'."));
    }

    #[tokio::test]
    async fn test_search_and_count_agree() {
        let state = test_state("packages");
        publish(&state, "Json.Stable", "1.0.0", 0, false);
        publish(&state, "Json.Pre", "1.0.0-rc", 1, true);
        publish(&state, "Xml.Stable", "1.0.0", 2, false);

        let uri = "/Search()?searchTerm='json'&includePrerelease=false";
        let (status, body) = get(&state, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Json.Stable"));
        assert!(!body.contains("Json.Pre"));
        assert!(!body.contains("Xml.Stable"));

        let (status, count_body) =
            get(&state, "/Search()/$count?searchTerm='json'&includePrerelease=false").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count_body, "1");
    }

    #[tokio::test]
    async fn test_updates_endpoint() {
        let state = test_state("packages");
        publish(&state, "A", "1.0.0", 0, false);
        publish(&state, "A", "1.1.0", 1, false);
        publish(&state, "B", "2.0.0", 2, false);

        let (status, body) = get(
            &state,
            "/GetUpdates()?packageIds='A%7CB'&versions='1.0.0%7C2.0.0'&includePrerelease=false",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<title type=\"text\">GetUpdates</title>"));
        assert!(body.contains("<m:count>1</m:count>"));
        assert!(body.contains("Packages(Id='A',Version='1.1.0')"));
        assert!(!body.contains("Version='2.0.0'"));
    }

    #[tokio::test]
    async fn test_updates_mismatch_is_an_error_document() {
        let state = test_state("packages");
        publish(&state, "A", "1.0.0", 0, false);

        let (status, body) = get(
            &state,
            "/GetUpdates()?packageIds='A%7CB'&versions='1.0.0'",
        )
        .await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert!(body.contains("<m:message xml:lang=\"en-US\">Invalid version count</m:message>"));
    }

    #[tokio::test]
    async fn test_metadata_document() {
        let state = test_state("packages");
        let (status, body) = get(&state, "/$metadata").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<edmx:Edmx"));
        assert!(body.contains("Name=\"IsPrerelease\""));
    }

    #[tokio::test]
    async fn test_download_streams_archive_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("P.2.0.0.nupkg"), b"zip-bytes").unwrap();

        let state = test_state(dir.path().to_str().unwrap());
        publish(&state, "P", "1.0.0", 0, false);
        state
            .store
            .save(&PackageDraft {
                package_id: "P".into(),
                version: "2.0.0".into(),
                listed: true,
                archive_path: Some("P.2.0.0.nupkg".into()),
                created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap()),
                ..Default::default()
            })
            .unwrap();

        let (status, body) = get(&state, "/package/P/2.0.0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "zip-bytes");

        let exact = state.store.find_one("P", "2.0.0").unwrap().unwrap();
        let sibling = state.store.find_one("P", "1.0.0").unwrap().unwrap();
        assert_eq!(exact.version_download_count, 1);
        assert_eq!(exact.download_count, 1);
        assert_eq!(sibling.version_download_count, 0);
        assert_eq!(sibling.download_count, 1);

        let (status, body) = get(&state, "/package/Missing/1.0.0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "not found");
    }

    #[test]
    fn test_parse_package_resource() {
        assert_eq!(
            parse_package_resource("Packages(Id='A.B',Version='1.0.0-rc1')"),
            Some(("A.B".to_string(), "1.0.0-rc1".to_string()))
        );
        assert_eq!(
            parse_package_resource("Packages(Version='1.0',Id='X')"),
            Some(("X".to_string(), "1.0".to_string()))
        );
        assert_eq!(parse_package_resource("Packages(Id='A')"), None);
        assert_eq!(parse_package_resource("Packages()"), None);
        assert_eq!(parse_package_resource("Search()"), None);
    }
}
