//! Book catalogue models
//!
//! Record structs are filled from result rows by column name, so the SQL
//! aliases every column to the exact field name (`book_id::text AS "BookId"`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::record_mapping;

/// Upper bound on rows returned by one listing; a requested limit of 0 means this
pub const MAX_ROW_LIMIT: i64 = 50;

/// Book lending status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum BookStatus {
    Unknown = 0,
    Available = 1,
    Borrowed = 2,
}

impl From<i64> for BookStatus {
    fn from(v: i64) -> Self {
        match v {
            1 => BookStatus::Available,
            2 => BookStatus::Borrowed,
            _ => BookStatus::Unknown,
        }
    }
}

impl From<BookStatus> for i64 {
    fn from(s: BookStatus) -> Self {
        s as i64
    }
}

/// Single book, as returned by `GET /books/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BookDetails {
    pub book_id: String,
    pub book_name: String,
    pub author_name: String,
    pub publisher: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

record_mapping!(BookDetails {
    "BookId" => book_id: String,
    "BookName" => book_name: String,
    "AuthorName" => author_name: String,
    "Publisher" => publisher: String,
    "Description" => description: Option<String>,
});

/// Listing entry seen by librarians
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BookInfoLibrarian {
    pub book_id: String,
    pub book_name: String,
    pub author_name: String,
    pub publisher: String,
    pub status: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrower: Option<String>,
}

record_mapping!(BookInfoLibrarian {
    "BookId" => book_id: String,
    "BookName" => book_name: String,
    "AuthorName" => author_name: String,
    "Publisher" => publisher: String,
    "Status" => status: i64,
    "Borrower" => borrower: Option<String>,
});

/// Listing entry seen by members
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BookInfoMember {
    pub book_id: String,
    pub book_name: String,
    pub author_name: String,
    pub publisher: String,
}

record_mapping!(BookInfoMember {
    "BookId" => book_id: String,
    "BookName" => book_name: String,
    "AuthorName" => author_name: String,
    "Publisher" => publisher: String,
});

/// Listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive match on book name or author name
    pub search: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateBook {
    pub book_name: String,
    pub author_name: String,
    pub publisher: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBookResponse {
    pub book_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpdateBook {
    pub book_id: String,
    pub book_name: String,
    pub author_name: String,
    pub publisher: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateBookResponse {
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase", default)]
pub struct BorrowRequest {
    pub book_id: String,
}

/// Listing rows in the shape the caller's role is allowed to see
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum BookListing {
    Member(Vec<BookInfoMember>),
    Librarian(Vec<BookInfoLibrarian>),
}

impl BookListing {
    pub fn len(&self) -> usize {
        match self {
            BookListing::Member(rows) => rows.len(),
            BookListing::Librarian(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BookListMeta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub search_term: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub row_offset: i64,
    pub row_limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookList {
    pub data: BookListing,
    pub meta: BookListMeta,
}
