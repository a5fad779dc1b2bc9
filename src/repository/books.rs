//! Book queries
//!
//! Every column is aliased to the record field it fills.

use chrono::{DateTime, Utc};

use crate::{
    args,
    db::{Context, DbResult, Runner},
    models::book::{BookDetails, BookInfoLibrarian, BookInfoMember, BookStatus},
};

const SEARCH_FILTER: &str = r#"
    ($1 = '' OR b.book_name ILIKE '%' || $1 || '%' OR b.author_name ILIKE '%' || $1 || '%')
"#;

/// Insert a book and return its id
pub async fn create(
    run: &mut Runner,
    ctx: &Context,
    book_name: &str,
    author_name: &str,
    publisher: &str,
    description: Option<&str>,
) -> DbResult<Option<String>> {
    let row = run
        .query_row(
            ctx,
            r#"
            INSERT INTO book (book_name, author_name, publisher, description, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING book_id::text AS "BookId"
            "#,
            &args![book_name, author_name, publisher, description, i64::from(BookStatus::Available)],
        )
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_read_string(0)?)),
        None => Ok(None),
    }
}

pub async fn get(run: &mut Runner, ctx: &Context, book_id: &str) -> DbResult<Option<BookDetails>> {
    let row = run
        .query_row(
            ctx,
            r#"
            SELECT b.book_id::text AS "BookId",
                   b.book_name     AS "BookName",
                   b.author_name   AS "AuthorName",
                   b.publisher     AS "Publisher",
                   b.description   AS "Description"
            FROM book b
            WHERE b.book_id = $1::uuid
            "#,
            &args![book_id],
        )
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut book = BookDetails::default();
    row.try_populate(&mut book)?;
    Ok(Some(book))
}

pub async fn list_for_member(
    run: &mut Runner,
    ctx: &Context,
    search: &str,
    offset: i64,
    limit: i64,
) -> DbResult<Vec<BookInfoMember>> {
    let sql = format!(
        r#"
        SELECT b.book_id::text AS "BookId",
               b.book_name     AS "BookName",
               b.author_name   AS "AuthorName",
               b.publisher     AS "Publisher"
        FROM book b
        WHERE {SEARCH_FILTER}
        ORDER BY b.book_name, b.book_id
        OFFSET $2 LIMIT $3
        "#
    );
    let params = args![search, offset, limit];
    // the reader borrows `sql` and `params`, so it must be gone before they are
    let books = run.query(ctx, &sql, &params).await?.collect_records().await;
    books
}

pub async fn list_for_librarian(
    run: &mut Runner,
    ctx: &Context,
    search: &str,
    offset: i64,
    limit: i64,
) -> DbResult<Vec<BookInfoLibrarian>> {
    let sql = format!(
        r#"
        SELECT b.book_id::text AS "BookId",
               b.book_name     AS "BookName",
               b.author_name   AS "AuthorName",
               b.publisher     AS "Publisher",
               b.status        AS "Status",
               u.username      AS "Borrower"
        FROM book b
        LEFT JOIN library_user u ON u.user_id = b.borrower_id
        WHERE {SEARCH_FILTER}
        ORDER BY b.book_name, b.book_id
        OFFSET $2 LIMIT $3
        "#
    );
    let params = args![search, offset, limit];
    let books = run.query(ctx, &sql, &params).await?.collect_records().await;
    books
}

/// New `updated_at`, or `None` when no such book exists
pub async fn update(
    run: &mut Runner,
    ctx: &Context,
    book_id: &str,
    book_name: &str,
    author_name: &str,
    publisher: &str,
    description: Option<&str>,
) -> DbResult<Option<DateTime<Utc>>> {
    let row = run
        .query_row(
            ctx,
            r#"
            UPDATE book
            SET book_name = $2, author_name = $3, publisher = $4, description = $5, updated_at = now()
            WHERE book_id = $1::uuid
            RETURNING updated_at AS "UpdatedAt"
            "#,
            &args![book_id, book_name, author_name, publisher, description],
        )
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_read_time(0)?)),
        None => Ok(None),
    }
}

/// Number of rows deleted
pub async fn delete(run: &mut Runner, ctx: &Context, book_id: &str) -> DbResult<u64> {
    let result = run
        .exec(ctx, "DELETE FROM book WHERE book_id = $1::uuid", &args![book_id])
        .await?;
    Ok(result.rows_affected)
}

/// Status and borrower of a book, locking its row until the transaction ends
pub async fn lock_status(
    run: &mut Runner,
    ctx: &Context,
    book_id: &str,
) -> DbResult<Option<(BookStatus, Option<String>)>> {
    let row = run
        .query_row(
            ctx,
            r#"
            SELECT status AS "Status", borrower_id::text AS "BorrowerId"
            FROM book
            WHERE book_id = $1::uuid
            FOR UPDATE
            "#,
            &args![book_id],
        )
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let status = BookStatus::from(row.try_read_i64(0)?);
    let borrower = match row.values().get(1) {
        Some(value) if !value.is_null() => Some(row.try_read_string(1)?),
        _ => None,
    };
    Ok(Some((status, borrower)))
}

pub async fn change_status(
    run: &mut Runner,
    ctx: &Context,
    book_id: &str,
    status: BookStatus,
    borrower_id: Option<&str>,
) -> DbResult<u64> {
    let result = run
        .exec(
            ctx,
            r#"
            UPDATE book
            SET status = $2, borrower_id = $3::uuid, updated_at = now()
            WHERE book_id = $1::uuid
            "#,
            &args![book_id, i64::from(status), borrower_id],
        )
        .await?;
    Ok(result.rows_affected)
}
