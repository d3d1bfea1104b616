//! The service document and the `$metadata` EDMX document.

use crate::registry;

use super::{
    document::{ATOM_NS, METADATA_NS},
    xml::XmlWriter,
};

const APP_NS: &str = "http://www.w3.org/2007/app";
const EDMX_NS: &str = "http://schemas.microsoft.com/ado/2007/06/edmx";
const EDM_NS: &str = "http://schemas.microsoft.com/ado/2006/04/edm";

/// The AtomPub service document clients fetch from the feed root.
pub fn service_document(base: &str) -> String {
    let mut w = XmlWriter::new();
    w.open(
        "service",
        &[
            ("xml:base", base),
            ("xmlns", APP_NS),
            ("xmlns:atom", ATOM_NS),
        ],
    );
    w.open("workspace", &[]);
    w.text_element("atom:title", &[], "Default");
    w.open("collection", &[("href", "Packages")]);
    w.text_element("atom:title", &[], "Packages");
    w.close("collection");
    w.close("workspace");
    w.close("service");
    w.into_string()
}

/// The `$metadata` document, generated from the property registry so the
/// advertised schema can never drift from what entries actually carry.
pub fn metadata_document() -> String {
    let mut w = XmlWriter::new();
    w.open(
        "edmx:Edmx",
        &[("Version", "1.0"), ("xmlns:edmx", EDMX_NS)],
    );
    w.open(
        "edmx:DataServices",
        &[("xmlns:m", METADATA_NS), ("m:DataServiceVersion", "2.0")],
    );
    w.open(
        "Schema",
        &[("Namespace", "NuFeed"), ("xmlns", EDM_NS)],
    );
    w.open("EntityType", &[("Name", "Package"), ("m:HasStream", "true")]);
    w.open("Key", &[]);
    w.empty("PropertyRef", &[("Name", "Id")]);
    w.empty("PropertyRef", &[("Name", "Version")]);
    w.close("Key");
    for property in registry::PROPERTIES {
        let nullable = if matches!(property.name, "Id" | "Version") {
            "false"
        } else {
            "true"
        };
        w.empty(
            "Property",
            &[
                ("Name", property.name),
                ("Type", property.xml_type.edm_name()),
                ("Nullable", nullable),
            ],
        );
    }
    w.close("EntityType");
    w.open(
        "EntityContainer",
        &[("Name", "FeedContext"), ("m:IsDefaultEntityContainer", "true")],
    );
    w.empty(
        "EntitySet",
        &[("Name", "Packages"), ("EntityType", "NuFeed.Package")],
    );
    w.close("EntityContainer");
    w.close("Schema");
    w.close("edmx:DataServices");
    w.close("edmx:Edmx");
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_document_shape() {
        let xml = service_document("http://feed.test/api/v2");
        assert!(xml.contains("<service xml:base=\"http://feed.test/api/v2\""));
        assert!(xml.contains("xmlns=\"http://www.w3.org/2007/app\""));
        assert!(xml.contains("<collection href=\"Packages\">"));
        assert!(xml.contains("<atom:title>Packages</atom:title>"));
    }

    #[test]
    fn test_metadata_lists_every_registry_property() {
        let xml = metadata_document();
        for property in crate::registry::PROPERTIES {
            assert!(
                xml.contains(&format!("Name=\"{}\"", property.name)),
                "missing {}",
                property.name
            );
        }
        assert!(xml.contains("Type=\"Edm.Boolean\""));
        assert!(xml.contains("<EntitySet Name=\"Packages\" EntityType=\"NuFeed.Package\"/>"));
    }
}
