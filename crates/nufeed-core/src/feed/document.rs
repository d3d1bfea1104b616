//! Feed and entry document assembly.
//!
//! Documents are built as plain values first and rendered to XML second, so
//! the selection and typing logic stays independent of the serialization.

use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;

use crate::{
    model::PackageRecord,
    params,
    registry::{self, PropertyValue, XmlType},
    FeedResult,
};

use super::xml::XmlWriter;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const DATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";
pub const METADATA_NS: &str =
    "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";

/// Characters escaped when a package id or version becomes a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn path_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

fn atom_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `Edm.DateTime` property rendering, millisecond precision, no offset.
fn edm_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// One typed property carried by an entry.
#[derive(Debug, Clone)]
pub struct EntryProperty {
    pub name: &'static str,
    pub xml_type: XmlType,
    pub value: PropertyValue,
}

/// One ATOM entry: a single package version.
#[derive(Debug, Clone)]
pub struct EntryDocument {
    pub package_id: String,
    pub version: String,
    pub summary: Option<String>,
    pub authors: Option<String>,
    pub updated: DateTime<Utc>,
    pub properties: Vec<EntryProperty>,
}

/// The feed envelope around zero or more entries.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub id: String,
    pub title: String,
    pub updated: DateTime<Utc>,
    pub count: Option<u64>,
    pub entries: Vec<EntryDocument>,
}

/// Resolves the property names a response will carry: the `$select` list
/// intersected with the queryable names (unknown names are dropped, not
/// errors), or every queryable name when the client selected nothing.
pub fn selected_properties(select: Option<&str>) -> Vec<&'static str> {
    match params::parse_select(select) {
        Some(requested) => requested
            .iter()
            .filter_map(|name| {
                let known = registry::mapping(name).filter(|m| m.queryable);
                if known.is_none() {
                    debug!("dropping unknown $select property '{}'", name);
                }
                known.map(|m| m.name)
            })
            .collect(),
        None => registry::all_queryable_names(),
    }
}

/// Builds one entry, resolving each requested property against the record.
pub fn build_entry(
    record: &PackageRecord,
    properties: &[&'static str],
) -> FeedResult<EntryDocument> {
    let mut resolved = Vec::with_capacity(properties.len());
    for &name in properties {
        resolved.push(EntryProperty {
            name,
            xml_type: registry::xml_type(name)?,
            value: registry::resolve_value(record, name)?,
        });
    }

    Ok(EntryDocument {
        package_id: record.package_id.clone(),
        version: record.version.clone(),
        summary: record.summary.clone(),
        authors: record.authors.clone(),
        updated: record.updated_at,
        properties: resolved,
    })
}

/// Builds the feed envelope for a page of records.
pub fn build_feed(
    id: impl Into<String>,
    title: impl Into<String>,
    updated: DateTime<Utc>,
    count: Option<u64>,
    records: &[PackageRecord],
    properties: &[&'static str],
) -> FeedResult<FeedDocument> {
    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        entries.push(build_entry(record, properties)?);
    }

    Ok(FeedDocument {
        id: id.into(),
        title: title.into(),
        updated,
        count,
        entries,
    })
}

impl EntryDocument {
    fn render_into(&self, w: &mut XmlWriter, base: &str) {
        w.open("entry", &[]);
        self.render_body(w, base);
        w.close("entry");
    }

    fn render_body(&self, w: &mut XmlWriter, base: &str) {
        let entry_id = format!(
            "{}/Packages(Id='{}',Version='{}')",
            base, self.package_id, self.version
        );
        let content_src = format!(
            "{}/package/{}/{}",
            base,
            path_segment(&self.package_id),
            path_segment(&self.version)
        );

        w.text_element("id", &[], &entry_id);
        w.text_element("title", &[("type", "text")], &self.package_id);
        w.text_element(
            "summary",
            &[("type", "text")],
            self.summary.as_deref().unwrap_or(""),
        );
        w.text_element("updated", &[], &atom_timestamp(&self.updated));
        w.open("author", &[]);
        w.text_element("name", &[], self.authors.as_deref().unwrap_or(""));
        w.close("author");
        w.empty(
            "content",
            &[("type", "application/zip"), ("src", &content_src)],
        );

        w.open("m:properties", &[]);
        for property in &self.properties {
            render_property(w, property);
        }
        w.close("m:properties");
    }
}

fn render_property(w: &mut XmlWriter, property: &EntryProperty) {
    let tag = format!("d:{}", property.name);
    let type_attr = property.xml_type.type_attr();

    let mut attrs: Vec<(&str, &str)> = Vec::new();
    if let Some(edm) = type_attr {
        attrs.push(("m:type", edm));
    }

    let text = match &property.value {
        PropertyValue::Null => {
            attrs.push(("m:null", "true"));
            w.empty(&tag, &attrs);
            return;
        }
        PropertyValue::Text(s) => s.clone(),
        PropertyValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        PropertyValue::Int(i) => i.to_string(),
        PropertyValue::DateTime(dt) => edm_timestamp(dt),
    };
    w.text_element(&tag, &attrs, &text);
}

impl FeedDocument {
    /// Renders the feed with `base` as the service root; entry and self links
    /// are relative to it via `xml:base`.
    pub fn render(&self, base: &str) -> String {
        let mut w = XmlWriter::new();
        w.open(
            "feed",
            &[
                ("xml:base", base),
                ("xmlns", ATOM_NS),
                ("xmlns:d", DATA_NS),
                ("xmlns:m", METADATA_NS),
            ],
        );
        w.text_element("title", &[("type", "text")], &self.title);
        w.text_element("id", &[], &self.id);
        w.text_element("updated", &[], &atom_timestamp(&self.updated));
        w.empty(
            "link",
            &[("rel", "self"), ("title", &self.title), ("href", &self.title)],
        );
        if let Some(count) = self.count {
            w.text_element("m:count", &[], &count.to_string());
        }
        for entry in &self.entries {
            entry.render_into(&mut w, base);
        }
        w.close("feed");
        w.into_string()
    }
}

/// Renders a single entry as a standalone document (the package metadata
/// resource), with the namespaces on the entry element itself.
pub fn render_single_entry(entry: &EntryDocument, base: &str) -> String {
    let mut w = XmlWriter::new();
    w.open(
        "entry",
        &[
            ("xml:base", base),
            ("xmlns", ATOM_NS),
            ("xmlns:d", DATA_NS),
            ("xmlns:m", METADATA_NS),
        ],
    );
    entry.render_body(&mut w, base);
    w.close("entry");
    w.into_string()
}
