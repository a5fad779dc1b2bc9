//! Data models for the bookstore

pub mod book;
pub mod user;

pub use book::{BookDetails, BookInfoLibrarian, BookInfoMember, BookStatus, MAX_ROW_LIMIT};
pub use user::UserRole;
