use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Redirect,
    Json,
};
use bookshelf_http::error::AppError;

use super::models::{
    BookCreated, BookDeleted, BookForm, BookFormData, BookList, BookListing, ListParams, SortKey,
    BOOK_FORM_FIELDS,
};
use crate::modules::CatalogState;
use crate::repository::RepositoryError;
use crate::utils;

pub(super) async fn list_books(
    State(state): State<CatalogState>,
    Query(params): Query<ListParams>,
) -> Result<Json<BookList>, AppError> {
    let query = params.to_query();
    let books = state.repository.list_books(&query).await?;

    Ok(Json(BookList {
        q: query.search.unwrap_or_default(),
        sort: query.sort,
        scope: query.scope,
        books,
    }))
}

/// Keeps `/sort/{key}` links working by redirecting to the listing with the
/// search term preserved.
pub(super) async fn sort_books(
    Path(sort_key): Path<String>,
    Query(params): Query<ListParams>,
) -> Redirect {
    let sort = SortKey::parse_or_default(&sort_key);
    let mut location = format!("/api/{}?sort={}", super::MODULE_NAME, sort.as_str());
    if let Some(q) = utils::non_blank(params.q.as_deref()) {
        location.push_str("&q=");
        location.push_str(&urlencoding::encode(q));
    }
    Redirect::to(&location)
}

pub(super) async fn new_book_form(
    State(state): State<CatalogState>,
) -> Result<Json<BookFormData>, AppError> {
    Ok(Json(BookFormData {
        authors: state.repository.list_authors().await?,
        current_year: utils::current_year(),
        fields: &BOOK_FORM_FIELDS,
    }))
}

pub(super) async fn create_book(
    State(state): State<CatalogState>,
    payload: Result<Json<BookForm>, JsonRejection>,
) -> Result<(StatusCode, Json<BookCreated>), AppError> {
    let Json(form) = payload?;
    let mut new_book = form.validate(utils::current_year())?;

    // Reject what is known to fail before spending an outbound lookup on it.
    match state.repository.get_author(new_book.author_id).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            return Err(AppError::invalid_field(
                "author_id",
                "Please choose an existing author.",
            ))
        }
        Err(err) => return Err(err.into()),
    }
    if state.repository.isbn_exists(&new_book.isbn).await? {
        return Err(RepositoryError::Conflict {
            field: "isbn",
            message: "This ISBN already exists. Please use a unique ISBN.".to_string(),
        }
        .into());
    }

    new_book.summary = state.summaries.fetch_summary(&new_book.isbn).await;

    let book = state.repository.create_book(&new_book).await?;
    tracing::info!(
        book_id = book.id,
        isbn = %book.isbn,
        author_id = book.author_id,
        has_summary = book.summary.is_some(),
        "book added"
    );

    Ok((
        StatusCode::CREATED,
        Json(BookCreated {
            message: format!("Book '{}' was added successfully.", book.title),
            book,
        }),
    ))
}

pub(super) async fn book_detail(
    State(state): State<CatalogState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookListing>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.repository.get_book(id).await?))
}

pub(super) async fn delete_book(
    State(state): State<CatalogState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookDeleted>, AppError> {
    let Path(id) = id?;
    let deleted = state.repository.delete_book(id).await?;

    tracing::info!(
        book_id = deleted.book.id,
        author_id = deleted.book.author_id,
        author_removed = deleted.author_removed,
        "book deleted"
    );

    Ok(Json(deleted.into()))
}
