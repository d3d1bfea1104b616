//! Macros for defining entity schemas.
//!
//! The [`define_entity!`] macro generates column constants for a table,
//! tying database column names to Rust types.

/// Defines a module with typed column constants for a database table.
///
/// This macro generates a public module containing `const` declarations
/// for each column, making it easy to reference columns in queries.
///
/// # Syntax
///
/// ```ignore
/// define_entity!(
///     packages {
///         table: "packages",
///         columns: {
///             ID: i64 => "id",
///             VERSION: String => "version"
///         }
///     }
/// );
/// ```
///
/// This expands to:
///
/// ```ignore
/// pub mod packages {
///     pub const TABLE: &str = "packages";
///     pub const ID: nufeed_db::Col<i64> = nufeed_db::Col::new("id");
///     pub const VERSION: nufeed_db::Col<String> = nufeed_db::Col::new("version");
/// }
/// ```
#[macro_export]
macro_rules! define_entity {
    (
        $entity:ident {
            table: $table:literal,
            columns: {
                $($col_name:ident: $col_type:ty => $db_col:literal),* $(,)?
            }
        }
    ) => {
        pub mod $entity {
            use super::*;
            use $crate::expr::column::Col;

            pub const TABLE: &str = $table;

            $(
                $crate::define_column!($col_name, $col_type, $db_col);
            )*
        }
    };
}

#[macro_export]
macro_rules! define_column {
    // JSON detection - Vec<T>
    ($name:ident, Vec<$inner:ty>, $db_col:literal) => {
        pub const $name: Col<String> = Col::json($db_col);
    };

    // JSON detection - Option<Vec<T>>
    ($name:ident, Option<Vec<$inner:ty>>, $db_col:literal) => {
        pub const $name: Col<Option<String>> = Col::json($db_col);
    };

    // Optional regular types
    ($name:ident, Option<$inner:ty>, $db_col:literal) => {
        pub const $name: Col<Option<$inner>> = Col::new($db_col);
    };

    // Regular types (fallback)
    ($name:ident, $type:ty, $db_col:literal) => {
        pub const $name: Col<$type> = Col::new($db_col);
    };
}
