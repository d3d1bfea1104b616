//! The OData error document.
//!
//! Every user-visible failure renders through this one shape, so clients see a
//! single consistent XML error envelope regardless of which component failed.

use super::{document::METADATA_NS, xml::XmlWriter};

#[derive(Debug, Clone)]
pub struct ErrorDocument {
    pub message: String,
    pub language: String,
    pub status: u16,
}

impl ErrorDocument {
    pub fn render(&self) -> String {
        let mut w = XmlWriter::new();
        w.open("m:error", &[("xmlns:m", METADATA_NS)]);
        w.text_element("m:code", &[], "");
        w.text_element("m:message", &[("xml:lang", &self.language)], &self.message);
        w.close("m:error");
        w.into_string()
    }
}

pub fn build_error(message: impl Into<String>, language: impl Into<String>, status: u16) -> ErrorDocument {
    ErrorDocument {
        message: message.into(),
        language: language.into(),
        status,
    }
}

/// The canonical 404 document for an unknown resource segment.
pub fn resource_not_found(segment: &str) -> ErrorDocument {
    build_error(
        format!("Resource not found for the segment '{segment}'."),
        "en-US",
        404,
    )
}
