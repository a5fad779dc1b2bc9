//! Catalogue management service

use uuid::Uuid;

use crate::{
    db::{Context, Runner, TxOptions},
    error::{AppError, AppResult},
    models::{
        book::{
            BookDetails, BookList, BookListMeta, BookListing, BookQuery, BookStatus, BorrowRequest, CreateBook,
            CreateBookResponse, UpdateBook, UpdateBookResponse, MAX_ROW_LIMIT,
        },
        user::UserRole,
    },
    repository::{books, users},
};

/// Trimmed, canonical form of a book id
fn parse_book_id(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::validation("Invalid value for book id parameter"));
    }
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| AppError::validation("Invalid value for book id parameter"))
}

fn required<'a>(value: &'a str, cause: &str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(cause));
    }
    Ok(value)
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn create_book(run: &mut Runner, ctx: &Context, request: CreateBook) -> AppResult<CreateBookResponse> {
    let book_name = required(&request.book_name, "Trying to create a book with empty name")?;
    let author_name = required(&request.author_name, "Trying to create a book with empty author name")?;
    let publisher = required(&request.publisher, "Trying to create a book with empty publisher name")?;

    let book_id = books::create(run, ctx, book_name, author_name, publisher, optional(&request.description))
        .await
        .map_err(AppError::database("Failed to create book"))?
        .ok_or_else(|| AppError::Internal("Insert returned no book id".to_string()))?;

    tracing::info!("Created book {} ({})", book_id, book_name);
    Ok(CreateBookResponse { book_id })
}

pub async fn get_book(run: &mut Runner, ctx: &Context, book_id: &str) -> AppResult<BookDetails> {
    let book_id = parse_book_id(book_id)?;
    books::get(run, ctx, &book_id)
        .await
        .map_err(AppError::database("Failed to get book"))?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

/// One page of the catalogue in the view allowed for `role`
pub async fn get_all_books(run: &mut Runner, ctx: &Context, query: BookQuery, role: UserRole) -> AppResult<BookList> {
    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::validation("Invalid value for row offset parameter"));
    }

    let limit = match query.limit.unwrap_or(0) {
        limit if !(0..=MAX_ROW_LIMIT).contains(&limit) => {
            return Err(AppError::validation("Invalid value for row limit parameter"));
        }
        0 => MAX_ROW_LIMIT,
        limit => limit,
    };

    let search = query.search.unwrap_or_default();
    let data = match role {
        UserRole::Member => books::list_for_member(run, ctx, &search, offset, limit)
            .await
            .map(BookListing::Member),
        _ => books::list_for_librarian(run, ctx, &search, offset, limit)
            .await
            .map(BookListing::Librarian),
    }
    .map_err(AppError::database("Failed to get all books"))?;

    Ok(BookList {
        data,
        meta: BookListMeta {
            search_term: search,
            row_offset: offset,
            row_limit: limit,
        },
    })
}

pub async fn update_book(run: &mut Runner, ctx: &Context, request: UpdateBook) -> AppResult<UpdateBookResponse> {
    let book_id = parse_book_id(&request.book_id)?;
    let book_name = required(&request.book_name, "Invalid value for book name parameter")?;
    let author_name = required(&request.author_name, "Invalid value for author name parameter")?;
    let publisher = required(&request.publisher, "Invalid value for publisher name parameter")?;

    let updated_at = books::update(
        run,
        ctx,
        &book_id,
        book_name,
        author_name,
        publisher,
        optional(&request.description),
    )
    .await
    .map_err(AppError::database("Failed to update book"))?
    .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    Ok(UpdateBookResponse { updated_at })
}

pub async fn delete_book(run: &mut Runner, ctx: &Context, book_id: &str) -> AppResult<()> {
    let book_id = parse_book_id(book_id)?;
    let deleted = books::delete(run, ctx, &book_id)
        .await
        .map_err(AppError::database("Failed to delete book"))?;

    if deleted == 0 {
        return Err(AppError::NotFound("Book not found".to_string()));
    }
    tracing::info!("Deleted book {}", book_id);
    Ok(())
}

/// Borrow an available book, or hand back a book the caller has borrowed.
///
/// The status read and the status change happen in one transaction, with the
/// book row locked in between.
pub async fn borrow_or_return_book(
    run: &mut Runner,
    ctx: &Context,
    token: &str,
    request: BorrowRequest,
) -> AppResult<BookStatus> {
    let book_id = parse_book_id(&request.book_id)?;
    let token = token.trim().to_string();

    run.transact(ctx, TxOptions::default(), move |run, ctx| {
        Box::pin(async move {
            let (status, borrower) = books::lock_status(run, ctx, &book_id)
                .await
                .map_err(AppError::database("Failed to get book status"))?
                .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

            let user_id = users::id_for_token(run, ctx, &token)
                .await
                .map_err(AppError::database("Failed to get user id"))?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

            let (new_status, new_borrower) = match status {
                BookStatus::Available => (BookStatus::Borrowed, Some(user_id.as_str())),
                BookStatus::Borrowed if borrower.as_deref() == Some(user_id.as_str()) => {
                    (BookStatus::Available, None)
                }
                BookStatus::Borrowed => return Err(AppError::NotFound("Book not available".to_string())),
                BookStatus::Unknown => return Err(AppError::NotFound("Book not found".to_string())),
            };

            books::change_status(run, ctx, &book_id, new_status, new_borrower)
                .await
                .map_err(AppError::database("Failed to change book status"))?;

            tracing::info!("Book {} is now {:?}", book_id, new_status);
            Ok::<_, AppError>(new_status)
        })
    })
    .await
}
