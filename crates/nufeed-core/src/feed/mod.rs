//! ATOM/OData document assembly and rendering.

pub mod document;
pub mod error;
pub mod service;
pub mod xml;

pub use document::{
    build_entry, build_feed, render_single_entry, selected_properties, EntryDocument,
    FeedDocument,
};
pub use error::{build_error, resource_not_found, ErrorDocument};
pub use service::{metadata_document, service_document};
