//! Explicit parsing of the recognized wire query parameters.
//!
//! Every parameter has a total parse function: a typed value comes out or a
//! documented default does. Nothing downstream ever sees a raw string it has
//! to coerce.

/// Parses `$top`/`$skip`: an optional non-negative integer. Malformed values
/// are treated as absent, matching how permissive real clients are handled.
pub fn parse_page_bound(raw: Option<&str>) -> Option<u32> {
    raw?.trim().parse::<u32>().ok()
}

/// `$inlinecount` requests the unbounded count only with the exact value
/// `allpages`.
pub fn parse_inline_count(raw: Option<&str>) -> bool {
    raw == Some("allpages")
}

/// Boolean parameters (`includePrerelease`, ...) are true only for the literal
/// string `true`.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw == Some("true")
}

/// Strips the quoting NuGet clients put around string parameters: surrounding
/// whitespace plus literal single quotes, in any order.
pub fn trim_odata_literal(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\'')
}

/// Splits a pipe-delimited parameter (`packageIds`, `versions`) after
/// stripping the outer quoting.
pub fn split_pipe_list(raw: &str) -> Vec<String> {
    trim_odata_literal(raw)
        .split('|')
        .map(str::to_string)
        .collect()
}

/// Parses `$select` into the requested property names. Absent input means "no
/// selection"; the caller falls back to all queryable properties.
pub fn parse_select(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?;
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
