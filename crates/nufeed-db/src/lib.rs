pub mod expr;
pub mod helpers;
pub mod macros;
pub mod predicate;
pub mod query;
pub mod traits;

pub use helpers::*;
pub use predicate::{CmpOp, Predicate, SortOrder};
pub use query::*;
pub use traits::FromRow;
