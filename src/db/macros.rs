//! Declarative helpers for building statement parameters.

/// Build a `Vec<QueryParam>` from heterogeneous values.
///
/// Every argument goes through `QueryParam::from`, so `None::<T>` binds NULL.
///
/// # Example
///
/// ```ignore
/// let params = params![42, "ada", None::<String>];
/// service.update("INSERT INTO users VALUES (?, ?, ?)", params);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::models::QueryParam>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::models::QueryParam::from($value)),+]
    };
}

pub use params;
