use error::FeedError;

pub mod error;
pub mod feed;
pub mod model;
pub mod odata;
pub mod params;
pub mod registry;
pub mod schema;
pub mod search;
pub mod store;
pub mod updates;

pub use model::{Dependency, PackageDraft, PackageRecord};
pub use store::{PackageStore, StoreQuery};

pub type FeedResult<T> = std::result::Result<T, FeedError>;
