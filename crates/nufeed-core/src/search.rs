//! Assembly of the `Search()` query.
//!
//! Starts from the translated `$filter`/`$orderby`, then widens with the
//! free-text term and narrows with the prerelease gate. The `$count` action
//! must run through the same assembly so its result can never drift from the
//! materialized search results.

use nufeed_db::{CmpOp, Predicate};

use crate::{odata, params, store::StoreQuery, FeedResult};

/// Text columns the free-text search matches against.
const SEARCH_COLUMNS: &[&str] = &[
    "package_id",
    "title",
    "description",
    "summary",
    "tags",
    "authors",
];

/// Builds the search query: translated filter and ordering, an OR-chain of
/// case-insensitive substring matches for the (quote-trimmed) search term, and
/// the prerelease gate.
pub fn build_search_query(
    filter: Option<&str>,
    order_by: Option<&str>,
    search_term: Option<&str>,
    include_prerelease: bool,
) -> FeedResult<StoreQuery> {
    let mut query = StoreQuery {
        predicate: odata::parse_filter(filter)?,
        order: odata::parse_order_by(order_by)?,
    };

    let term = params::trim_odata_literal(search_term.unwrap_or(""));
    if !term.is_empty() {
        let matches_term = SEARCH_COLUMNS[1..]
            .iter()
            .fold(Predicate::contains(SEARCH_COLUMNS[0], term), |acc, column| {
                acc.or(Predicate::contains(*column, term))
            });
        query = query.narrow(matches_term);
    }

    if !include_prerelease {
        query = query.narrow(Predicate::cmp("is_prerelease", CmpOp::Eq, false));
    }

    Ok(query)
}
