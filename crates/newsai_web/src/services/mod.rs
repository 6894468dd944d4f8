//! Business logic between the handlers and the storage traits.

pub mod articles;
pub mod fields;
pub mod interests;
pub mod sessions;
pub mod users;
