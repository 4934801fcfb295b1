//! Persistence of authors and books.
//!
//! [`LibraryRepository`] is the port the request handlers talk to; the SQLite
//! implementation lives in [`sqlite`]. Cross-entity rules such as removing an
//! author together with their last book belong to the repository, so they can
//! be exercised without HTTP.

pub mod sqlite;

use async_trait::async_trait;
use bookshelf_http::error::AppError;
use serde_json::json;
use thiserror::Error;

use crate::modules::authors::models::{Author, NewAuthor};
use crate::modules::books::models::{Book, BookListing, BookQuery, DeletedBook, NewBook};

pub use sqlite::SqliteLibraryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => AppError::not_found(err.to_string()),
            RepositoryError::Conflict { field, message } => {
                AppError::conflict(vec![json!({"field": field, "error": message})], message)
            }
            RepositoryError::Validation { field, message } => AppError::invalid_field(field, message),
            RepositoryError::Database(err) => {
                AppError::Internal(anyhow::Error::new(err).context("database operation failed"))
            }
        }
    }
}

#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Returns `Validation` if the name is blank.
    async fn create_author(&self, author: &NewAuthor) -> Result<Author, RepositoryError>;

    async fn get_author(&self, id: i64) -> Result<Author, RepositoryError>;

    /// All authors ordered by name.
    async fn list_authors(&self) -> Result<Vec<Author>, RepositoryError>;

    /// Books of one author ordered by title.
    async fn books_by_author(&self, author_id: i64) -> Result<Vec<Book>, RepositoryError>;

    /// Returns `Conflict` when the ISBN is taken and `Validation` when a
    /// required field is blank or the author does not exist. Nothing is
    /// written on failure.
    async fn create_book(&self, book: &NewBook) -> Result<Book, RepositoryError>;

    async fn get_book(&self, id: i64) -> Result<BookListing, RepositoryError>;

    async fn isbn_exists(&self, isbn: &str) -> Result<bool, RepositoryError>;

    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookListing>, RepositoryError>;

    /// Delete a book and, when it was the author's last one, the author.
    ///
    /// Both deletions commit together. Returns `NotFound` and leaves the
    /// store untouched if the book does not exist.
    async fn delete_book(&self, id: i64) -> Result<DeletedBook, RepositoryError>;
}
