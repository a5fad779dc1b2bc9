//! Book catalogue endpoints
//!
//! Each handler authorizes the caller and runs the operation on one pinned
//! connection.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::book::{
        BookDetails, BookList, BookQuery, BookStatus, BorrowRequest, CreateBook, CreateBookResponse, UpdateBook,
        UpdateBookResponse,
    },
    services::{auth, catalog},
};

use super::{ApiJson, BearerToken, UnitOfWork};

/// List books, optionally filtered by name or author
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "One page of books, shaped by the caller's role", body = BookList),
        (status = 400, description = "Invalid offset or limit", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown token", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    BearerToken(token): BearerToken,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookList>> {
    let list = run
        .conn(&ctx, move |run, ctx| {
            Box::pin(async move {
                let role = auth::authorize_user(run, ctx, &token).await?;
                Ok::<_, AppError>(catalog::get_all_books(run, ctx, query, role).await?)
            })
        })
        .await?;
    Ok(Json(list))
}

/// Get book details by id
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book id")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 400, description = "Invalid book id", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> AppResult<Json<BookDetails>> {
    let book = run
        .conn(&ctx, move |run, ctx| {
            Box::pin(async move {
                auth::authorize_user(run, ctx, &token).await?;
                Ok::<_, AppError>(catalog::get_book(run, ctx, &id).await?)
            })
        })
        .await?;
    Ok(Json(book))
}

/// Add a book to the catalogue
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = CreateBookResponse),
        (status = 400, description = "Missing required field", body = crate::error::ErrorResponse),
        (status = 403, description = "Librarian role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    BearerToken(token): BearerToken,
    ApiJson(request): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<CreateBookResponse>)> {
    let created = run
        .conn(&ctx, move |run, ctx| {
            Box::pin(async move {
                auth::authorize_user(run, ctx, &token).await?.require_librarian()?;
                Ok::<_, AppError>(catalog::create_book(run, ctx, request).await?)
            })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a book's descriptive fields
#[utoipa::path(
    put,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = UpdateBookResponse),
        (status = 403, description = "Librarian role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    BearerToken(token): BearerToken,
    ApiJson(request): ApiJson<UpdateBook>,
) -> AppResult<Json<UpdateBookResponse>> {
    let updated = run
        .conn(&ctx, move |run, ctx| {
            Box::pin(async move {
                auth::authorize_user(run, ctx, &token).await?.require_librarian()?;
                Ok::<_, AppError>(catalog::update_book(run, ctx, request).await?)
            })
        })
        .await?;
    Ok(Json(updated))
}

/// Remove a book from the catalogue
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book id")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Librarian role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    run.conn(&ctx, move |run, ctx| {
        Box::pin(async move {
            auth::authorize_user(run, ctx, &token).await?.require_librarian()?;
            catalog::delete_book(run, ctx, &id).await?;
            Ok::<_, AppError>(())
        })
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrow an available book, or return one borrowed by the caller
#[utoipa::path(
    post,
    path = "/books/borrow",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "New status of the book", body = BookStatus),
        (status = 404, description = "Book not found or borrowed by someone else", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_or_return_book(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    BearerToken(token): BearerToken,
    ApiJson(request): ApiJson<BorrowRequest>,
) -> AppResult<Json<BookStatus>> {
    let status = run
        .conn(&ctx, move |run, ctx| {
            Box::pin(async move {
                auth::authorize_user(run, ctx, &token).await?;
                Ok::<_, AppError>(catalog::borrow_or_return_book(run, ctx, &token, request).await?)
            })
        })
        .await?;
    Ok(Json(status))
}
