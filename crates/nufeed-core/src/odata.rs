//! Translation of the restricted OData `$filter`/`$orderby` surface.
//!
//! NuGet clients issue a handful of fixed shapes (`IsLatestVersion eq true`,
//! `IsAbsoluteLatestVersion eq true`, ...), so the grammar is deliberately
//! small: comparisons over queryable properties and string/boolean/integer
//! literals, combined with `and`/`or` and parentheses. Anything else fails
//! with [`FeedError::UnsupportedFilterSyntax`] and becomes a 400-class error
//! document, never a panic.

use nufeed_db::{CmpOp, Predicate, SortOrder};
use rusqlite::types::Value;

use crate::{error::FeedError, params, registry, store::StoreQuery, FeedResult};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
}

fn unsupported(detail: impl Into<String>) -> FeedError {
    FeedError::UnsupportedFilterSyntax(detail.into())
}

fn tokenize(input: &str) -> FeedResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => {
                            // A doubled quote is an escaped quote.
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                literal.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(c) => literal.push(c),
                        None => return Err(unsupported("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut number = String::new();
                if c == '-' {
                    number.push(c);
                    chars.next();
                }
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: i64 = number
                    .parse()
                    .map_err(|_| unsupported(format!("invalid number '{number}'")))?;
                tokens.push(Token::Int(value));
            }
            other => return Err(unsupported(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(ident)) if ident == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> FeedResult<Predicate> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FeedResult<Predicate> {
        let mut left = self.parse_primary()?;
        while self.eat_keyword("and") {
            let right = self.parse_primary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> FeedResult<Predicate> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.parse_or()?;
            match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(unsupported("expected ')'")),
            }
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> FeedResult<Predicate> {
        let property = match self.next() {
            Some(Token::Ident(name)) => name,
            other => return Err(unsupported(format!("expected property name, got {other:?}"))),
        };
        let column = filterable_column(&property)?;

        let op = match self.next() {
            Some(Token::Ident(op)) => match op.as_str() {
                "eq" => CmpOp::Eq,
                "ne" => CmpOp::Ne,
                "gt" => CmpOp::Gt,
                "ge" => CmpOp::Gte,
                "lt" => CmpOp::Lt,
                "le" => CmpOp::Lte,
                other => return Err(unsupported(format!("unknown operator '{other}'"))),
            },
            other => return Err(unsupported(format!("expected operator, got {other:?}"))),
        };

        let value = match self.next() {
            Some(Token::Str(s)) => Value::Text(s),
            Some(Token::Int(i)) => Value::Integer(i),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Value::Integer(1),
                "false" => Value::Integer(0),
                other => return Err(unsupported(format!("expected literal, got '{other}'"))),
            },
            other => return Err(unsupported(format!("expected literal, got {other:?}"))),
        };

        Ok(Predicate::cmp(column, op, value))
    }
}

/// Maps a property name from a query option to its store column, rejecting
/// names outside the registry and derived properties that have no column.
fn filterable_column(property: &str) -> FeedResult<&'static str> {
    if !registry::is_queryable(property) {
        return Err(unsupported(format!("unknown property '{property}'")));
    }
    registry::column_for(property)
        .ok_or_else(|| unsupported(format!("property '{property}' cannot be queried")))
}

/// Parses a `$filter` value. Absent or blank input means "no filter".
pub fn parse_filter(raw: Option<&str>) -> FeedResult<Option<Predicate>> {
    let input = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(None),
    };

    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let predicate = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(unsupported("trailing tokens after expression"));
    }
    Ok(Some(predicate))
}

/// Parses a `$orderby` value into ordering keys. Absent or blank input keeps
/// the default store order.
pub fn parse_order_by(raw: Option<&str>) -> FeedResult<Vec<(&'static str, SortOrder)>> {
    let input = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(vec![]),
    };

    let mut keys = Vec::new();
    for part in input.split(',') {
        let mut words = part.split_whitespace();
        let property = words
            .next()
            .ok_or_else(|| unsupported("empty ordering key"))?;
        let column = filterable_column(property)?;
        let direction = match words.next() {
            None => SortOrder::Asc,
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(unsupported(format!("unknown sort direction '{other}'")))
            }
        };
        if words.next().is_some() {
            return Err(unsupported("trailing tokens in ordering key"));
        }
        keys.push((column, direction));
    }
    Ok(keys)
}

/// The `Packages()` query: translated `$filter`/`$orderby` plus the optional
/// `id` parameter (quote-trimmed, exact match on the package identifier).
pub fn build_packages_query(
    filter: Option<&str>,
    order_by: Option<&str>,
    id: Option<&str>,
) -> FeedResult<StoreQuery> {
    let mut query = StoreQuery {
        predicate: parse_filter(filter)?,
        order: parse_order_by(order_by)?,
    };

    if let Some(id) = id {
        let id = params::trim_odata_literal(id);
        if !id.is_empty() {
            query = query.narrow(Predicate::cmp("package_id", CmpOp::Eq, id.to_string()));
        }
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use nufeed_db::traits::Expression as _;

    use super::*;
    use crate::store::{test_support::publish, PackageStore};

    #[test]
    fn test_canonical_latest_version_filter() {
        let pred = parse_filter(Some("IsLatestVersion eq true")).unwrap().unwrap();
        let mut params = vec![];
        assert_eq!(pred.to_sql(&mut params), "is_latest_version = ?");
        assert_eq!(params, vec![Value::Integer(1)]);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let pred = parse_filter(Some(
            "IsPrerelease eq false or IsListed eq true and DownloadCount gt 5",
        ));
        // IsListed is not a property; the parse must fail, not guess.
        assert!(pred.is_err());

        let pred = parse_filter(Some(
            "IsPrerelease eq false or Listed eq true and DownloadCount gt 5",
        ))
        .unwrap()
        .unwrap();
        let mut params = vec![];
        assert_eq!(
            pred.to_sql(&mut params),
            "(is_prerelease = ? OR (listed = ? AND download_count > ?))"
        );
    }

    #[test]
    fn test_parenthesized_expression() {
        let pred = parse_filter(Some("(Id eq 'A' or Id eq 'B') and IsPrerelease eq false"))
            .unwrap()
            .unwrap();
        let mut params = vec![];
        assert_eq!(
            pred.to_sql(&mut params),
            "((package_id = ? OR package_id = ?) AND is_prerelease = ?)"
        );
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        let pred = parse_filter(Some("Title eq 'O''Brien'")).unwrap().unwrap();
        let mut params = vec![];
        pred.to_sql(&mut params);
        assert_eq!(params, vec![Value::Text("O'Brien".into())]);
    }

    #[test]
    fn test_unsupported_shapes_are_errors() {
        for filter in [
            "substringof('json', Tags)",
            "IsPrerelease",
            "IsPrerelease eq",
            "IsPrerelease like true",
            "NoSuchProperty eq true",
            "PackageSize gt 10",
            "Id eq 'A' garbage",
            "Id eq 'unterminated",
        ] {
            assert!(
                matches!(
                    parse_filter(Some(filter)),
                    Err(FeedError::UnsupportedFilterSyntax(_))
                ),
                "expected failure for {filter:?}"
            );
        }
    }

    #[test]
    fn test_absent_filter_is_none() {
        assert!(parse_filter(None).unwrap().is_none());
        assert!(parse_filter(Some("   ")).unwrap().is_none());
    }

    #[test]
    fn test_packages_query_with_id_parameter() {
        let store = PackageStore::open_in_memory().unwrap();
        publish(&store, "Wanted", "1.0.0", 0, false);
        publish(&store, "Wanted", "1.1.0", 1, false);
        publish(&store, "Noise", "1.0.0", 2, false);

        let query = build_packages_query(None, None, Some("'Wanted'")).unwrap();
        let records = store.page(&query, None, None).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.package_id == "Wanted"));

        // Blank id leaves the query unfiltered.
        let query = build_packages_query(None, None, Some("''")).unwrap();
        assert_eq!(store.page(&query, None, None).unwrap().len(), 3);
    }

    #[test]
    fn test_order_by_keys() {
        let keys = parse_order_by(Some("DownloadCount desc, Id")).unwrap();
        assert_eq!(
            keys,
            vec![("download_count", SortOrder::Desc), ("package_id", SortOrder::Asc)]
        );

        assert!(parse_order_by(Some("DownloadCount sideways")).is_err());
        assert!(parse_order_by(Some("Dependencies desc")).is_err());
        assert!(parse_order_by(None).unwrap().is_empty());
    }

    /// The lowered predicate must select exactly what a naive in-memory filter
    /// selects, both through the store and through `Predicate::matches`.
    #[test]
    fn test_translator_matches_naive_filter() {
        let store = PackageStore::open_in_memory().unwrap();
        publish(&store, "A", "1.0.0", 0, false);
        publish(&store, "A", "2.0.0-beta", 1, true);
        publish(&store, "B", "1.0.0", 2, false);
        publish(&store, "C", "0.1.0-alpha", 3, true);

        let all = store.page(&store.query(None, vec![]), None, None).unwrap();
        assert_eq!(all.len(), 4);

        let predicate = parse_filter(Some("IsPrerelease eq false or Id eq 'C'"))
            .unwrap()
            .unwrap();

        let naive: Vec<String> = all
            .iter()
            .filter(|r| !r.is_prerelease || r.package_id == "C")
            .map(|r| format!("{} {}", r.package_id, r.version))
            .collect();

        let in_memory: Vec<String> = all
            .iter()
            .filter(|r| predicate.matches(&|column| r.column_value(column)))
            .map(|r| format!("{} {}", r.package_id, r.version))
            .collect();

        let through_store: Vec<String> = store
            .page(&store.query(Some(predicate), vec![]), None, None)
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.package_id, r.version))
            .collect();

        assert_eq!(naive, in_memory);
        assert_eq!(naive, through_store);
    }
}
