//! Repository layer for database operations
//!
//! Functions take the caller's [`Runner`](crate::db::Runner), so they join
//! whatever transaction or pinned connection the caller has open.

pub mod books;
pub mod users;
