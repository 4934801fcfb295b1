use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use bookshelf_http::error::AppError;

use super::models::{
    Author, AuthorCreated, AuthorDetail, AuthorForm, AuthorFormData, AUTHOR_FORM_FIELDS,
};
use crate::modules::CatalogState;

pub(super) async fn list_authors(
    State(state): State<CatalogState>,
) -> Result<Json<Vec<Author>>, AppError> {
    Ok(Json(state.repository.list_authors().await?))
}

pub(super) async fn new_author_form() -> Json<AuthorFormData> {
    Json(AuthorFormData {
        fields: &AUTHOR_FORM_FIELDS,
    })
}

pub(super) async fn create_author(
    State(state): State<CatalogState>,
    payload: Result<Json<AuthorForm>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthorCreated>), AppError> {
    let Json(form) = payload?;
    let new_author = form.validate()?;

    let author = state.repository.create_author(&new_author).await?;
    tracing::info!(author_id = author.id, name = %author.name, "author added");

    Ok((
        StatusCode::CREATED,
        Json(AuthorCreated {
            message: format!("Author '{}' was added successfully.", author.name),
            author,
        }),
    ))
}

pub(super) async fn author_detail(
    State(state): State<CatalogState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AuthorDetail>, AppError> {
    let Path(id) = id?;
    let author = state.repository.get_author(id).await?;
    let books = state.repository.books_by_author(id).await?;
    Ok(Json(AuthorDetail { author, books }))
}
