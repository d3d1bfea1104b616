//! The feed property registry.
//!
//! Every property a feed entry can carry is declared here, with its EDM type
//! and the way its value is obtained from a [`PackageRecord`]: either a direct
//! column read or a derived accessor. The table is the single source of truth
//! for `$filter`/`$orderby`/`$select` validation and for `$metadata`.

use chrono::{DateTime, Utc};

use crate::{error::FeedError, model::PackageRecord, FeedResult};

/// EDM type tag attached to a property in the feed XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlType {
    String,
    Boolean,
    Int32,
    Int64,
    DateTime,
}

impl XmlType {
    /// The `m:type` attribute value, `None` for strings (the OData default).
    pub fn type_attr(self) -> Option<&'static str> {
        match self {
            Self::String => None,
            Self::Boolean => Some("Edm.Boolean"),
            Self::Int32 => Some("Edm.Int32"),
            Self::Int64 => Some("Edm.Int64"),
            Self::DateTime => Some("Edm.DateTime"),
        }
    }

    /// The full EDM name, as used in the `$metadata` document.
    pub fn edm_name(self) -> &'static str {
        match self {
            Self::String => "Edm.String",
            Self::Boolean => "Edm.Boolean",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::DateTime => "Edm.DateTime",
        }
    }
}

/// Derived accessors: property values computed from a record rather than read
/// from a column. Dispatch is a closed match, not a name lookup.
#[derive(Debug, Clone, Copy)]
pub enum Computed {
    NormalizedVersion,
    DependenciesString,
    PackageSize,
}

/// How a property's value is obtained from a record.
#[derive(Debug, Clone, Copy)]
pub enum Accessor {
    Field(&'static str),
    Computed(Computed),
}

pub struct PropertyMapping {
    pub name: &'static str,
    pub queryable: bool,
    pub xml_type: XmlType,
    pub accessor: Accessor,
}

/// A resolved, typed property value ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Boolean(bool),
    Int(i64),
    DateTime(DateTime<Utc>),
    Null,
}

pub static PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping {
        name: "Id",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("package_id"),
    },
    PropertyMapping {
        name: "Version",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("version"),
    },
    PropertyMapping {
        name: "NormalizedVersion",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Computed(Computed::NormalizedVersion),
    },
    PropertyMapping {
        name: "Title",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("title"),
    },
    PropertyMapping {
        name: "Authors",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("authors"),
    },
    PropertyMapping {
        name: "Copyright",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("copyright"),
    },
    PropertyMapping {
        name: "Created",
        queryable: true,
        xml_type: XmlType::DateTime,
        accessor: Accessor::Field("created_at"),
    },
    PropertyMapping {
        name: "Dependencies",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Computed(Computed::DependenciesString),
    },
    PropertyMapping {
        name: "Description",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("description"),
    },
    PropertyMapping {
        name: "DownloadCount",
        queryable: true,
        xml_type: XmlType::Int32,
        accessor: Accessor::Field("download_count"),
    },
    PropertyMapping {
        name: "IconUrl",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("icon_url"),
    },
    PropertyMapping {
        name: "IsAbsoluteLatestVersion",
        queryable: true,
        xml_type: XmlType::Boolean,
        accessor: Accessor::Field("is_absolute_latest_version"),
    },
    PropertyMapping {
        name: "IsLatestVersion",
        queryable: true,
        xml_type: XmlType::Boolean,
        accessor: Accessor::Field("is_latest_version"),
    },
    PropertyMapping {
        name: "IsPrerelease",
        queryable: true,
        xml_type: XmlType::Boolean,
        accessor: Accessor::Field("is_prerelease"),
    },
    PropertyMapping {
        name: "LastUpdated",
        queryable: true,
        xml_type: XmlType::DateTime,
        accessor: Accessor::Field("updated_at"),
    },
    PropertyMapping {
        name: "LicenseUrl",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("license_url"),
    },
    PropertyMapping {
        name: "Listed",
        queryable: true,
        xml_type: XmlType::Boolean,
        accessor: Accessor::Field("listed"),
    },
    PropertyMapping {
        name: "PackageHash",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("package_hash"),
    },
    PropertyMapping {
        name: "PackageHashAlgorithm",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("package_hash_algorithm"),
    },
    PropertyMapping {
        name: "PackageSize",
        queryable: true,
        xml_type: XmlType::Int64,
        accessor: Accessor::Computed(Computed::PackageSize),
    },
    PropertyMapping {
        name: "ProjectUrl",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("project_url"),
    },
    PropertyMapping {
        name: "Published",
        queryable: true,
        xml_type: XmlType::DateTime,
        accessor: Accessor::Field("created_at"),
    },
    PropertyMapping {
        name: "ReleaseNotes",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("release_notes"),
    },
    PropertyMapping {
        name: "RequireLicenseAcceptance",
        queryable: true,
        xml_type: XmlType::Boolean,
        accessor: Accessor::Field("require_license_acceptance"),
    },
    PropertyMapping {
        name: "Summary",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("summary"),
    },
    PropertyMapping {
        name: "Tags",
        queryable: true,
        xml_type: XmlType::String,
        accessor: Accessor::Field("tags"),
    },
    PropertyMapping {
        name: "VersionDownloadCount",
        queryable: true,
        xml_type: XmlType::Int32,
        accessor: Accessor::Field("version_download_count"),
    },
];

/// Looks up a property by its feed name. Case-sensitive, like the protocol.
pub fn mapping(name: &str) -> Option<&'static PropertyMapping> {
    PROPERTIES.iter().find(|p| p.name == name)
}

pub fn is_queryable(name: &str) -> bool {
    mapping(name).map(|p| p.queryable).unwrap_or(false)
}

/// All queryable property names, in declaration order.
pub fn all_queryable_names() -> Vec<&'static str> {
    PROPERTIES
        .iter()
        .filter(|p| p.queryable)
        .map(|p| p.name)
        .collect()
}

pub fn xml_type(name: &str) -> FeedResult<XmlType> {
    mapping(name)
        .map(|p| p.xml_type)
        .ok_or_else(|| FeedError::UnknownProperty(name.to_string()))
}

/// The store column behind a property, when it has one. Derived accessors
/// have no column and cannot be used in `$filter`/`$orderby`.
pub fn column_for(name: &str) -> Option<&'static str> {
    match mapping(name)?.accessor {
        Accessor::Field(column) => Some(column),
        Accessor::Computed(_) => None,
    }
}

/// Resolves a property value from a record. Always re-reads the record:
/// values such as download counts change between requests.
pub fn resolve_value(record: &PackageRecord, name: &str) -> FeedResult<PropertyValue> {
    let mapping = mapping(name).ok_or_else(|| FeedError::UnknownProperty(name.to_string()))?;
    let value = match mapping.accessor {
        Accessor::Field(column) => field_value(record, column)?,
        Accessor::Computed(computed) => match computed {
            Computed::NormalizedVersion => PropertyValue::Text(record.normalized_version()),
            Computed::DependenciesString => PropertyValue::Text(record.dependencies_string()),
            Computed::PackageSize => PropertyValue::Int(record.package_size),
        },
    };
    Ok(value)
}

fn field_value(record: &PackageRecord, column: &str) -> FeedResult<PropertyValue> {
    fn text(value: &Option<String>) -> PropertyValue {
        match value {
            Some(s) => PropertyValue::Text(s.clone()),
            None => PropertyValue::Null,
        }
    }

    let value = match column {
        "package_id" => PropertyValue::Text(record.package_id.clone()),
        "version" => PropertyValue::Text(record.version.clone()),
        "title" => text(&record.title),
        "description" => text(&record.description),
        "summary" => text(&record.summary),
        "tags" => text(&record.tags),
        "authors" => text(&record.authors),
        "copyright" => text(&record.copyright),
        "icon_url" => text(&record.icon_url),
        "license_url" => text(&record.license_url),
        "project_url" => text(&record.project_url),
        "release_notes" => text(&record.release_notes),
        "require_license_acceptance" => {
            PropertyValue::Boolean(record.require_license_acceptance)
        }
        "is_prerelease" => PropertyValue::Boolean(record.is_prerelease),
        "is_latest_version" => PropertyValue::Boolean(record.is_latest_version),
        "is_absolute_latest_version" => {
            PropertyValue::Boolean(record.is_absolute_latest_version)
        }
        "listed" => PropertyValue::Boolean(record.listed),
        "package_size" => PropertyValue::Int(record.package_size),
        "version_download_count" => PropertyValue::Int(record.version_download_count),
        "download_count" => PropertyValue::Int(record.download_count),
        "created_at" => PropertyValue::DateTime(record.created_at),
        "updated_at" => PropertyValue::DateTime(record.updated_at),
        "package_hash" => text(&record.package_hash),
        "package_hash_algorithm" => text(&record.package_hash_algorithm),
        other => return Err(FeedError::UnknownProperty(other.to_string())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{Dependency, PackageRecord};

    fn record() -> PackageRecord {
        PackageRecord {
            id: 1,
            package_id: "Fixture".into(),
            version: "1.0.0-RC1".into(),
            title: Some("Fixture Title".into()),
            description: Some("A fixture".into()),
            summary: None,
            tags: Some("test fixture".into()),
            authors: Some("Someone".into()),
            copyright: None,
            icon_url: None,
            license_url: None,
            project_url: None,
            release_notes: None,
            require_license_acceptance: false,
            is_prerelease: true,
            is_latest_version: false,
            is_absolute_latest_version: true,
            listed: true,
            dependencies: Some(vec![Dependency {
                id: "Dep".into(),
                version: "2.0.0".into(),
                target_framework: Some("net45".into()),
            }]),
            package_hash: None,
            package_hash_algorithm: Some("SHA512".into()),
            package_size: 2048,
            archive_path: None,
            version_download_count: 3,
            download_count: 9,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_every_queryable_name_resolves() {
        let record = record();
        for name in all_queryable_names() {
            resolve_value(&record, name).unwrap();
        }
    }

    #[test]
    fn test_unknown_property_is_an_error() {
        assert!(matches!(
            resolve_value(&record(), "NoSuchProperty"),
            Err(FeedError::UnknownProperty(_))
        ));
        assert!(!is_queryable("NoSuchProperty"));
    }

    #[test]
    fn test_computed_accessors() {
        let record = record();
        assert_eq!(
            resolve_value(&record, "NormalizedVersion").unwrap(),
            PropertyValue::Text("1.0.0-rc1".into())
        );
        assert_eq!(
            resolve_value(&record, "Dependencies").unwrap(),
            PropertyValue::Text("Dep:2.0.0:net45".into())
        );
        assert_eq!(
            resolve_value(&record, "PackageSize").unwrap(),
            PropertyValue::Int(2048)
        );
        assert_eq!(column_for("PackageSize"), None);
        assert_eq!(column_for("Id"), Some("package_id"));
    }

    #[test]
    fn test_typed_values() {
        let record = record();
        assert_eq!(
            resolve_value(&record, "IsPrerelease").unwrap(),
            PropertyValue::Boolean(true)
        );
        assert_eq!(
            resolve_value(&record, "DownloadCount").unwrap(),
            PropertyValue::Int(9)
        );
        assert_eq!(
            resolve_value(&record, "Summary").unwrap(),
            PropertyValue::Null
        );
        assert_eq!(xml_type("IsPrerelease").unwrap(), XmlType::Boolean);
        assert!(xml_type("Bogus").is_err());
    }
}
