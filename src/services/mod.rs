//! Business logic services
//!
//! Services are free functions over a [`Runner`](crate::db::Runner): the
//! caller decides whether they run on the pool, a pinned connection or inside
//! a transaction.

pub mod auth;
pub mod catalog;
