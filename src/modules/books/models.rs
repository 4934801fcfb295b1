use serde::{Deserialize, Serialize};

use crate::modules::authors::models::Author;
use crate::utils::{self, FieldErrors, FormField};
use bookshelf_http::error::AppError;

/// A stored book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub isbn: String,
    pub publication_year: Option<i64>,
    pub summary: Option<String>,
    pub author_id: i64,
}

/// A book joined with its author's name, as shown in lists and detail views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub book: Book,
    pub author_name: String,
}

/// Validated input for creating a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub isbn: String,
    pub publication_year: Option<i64>,
    pub summary: Option<String>,
    pub author_id: i64,
}

/// Result of deleting a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedBook {
    pub book: Book,
    /// The author had no books left and was removed with it.
    pub author_removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Title,
    Author,
}

impl SortKey {
    /// Unknown keys fall back to sorting by title.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "author" => SortKey::Author,
            _ => SortKey::Title,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Author => "author",
        }
    }
}

/// Which columns a search term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Title or author name.
    #[default]
    Any,
    Title,
    Author,
}

impl SearchScope {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => SearchScope::Title,
            "author" => SearchScope::Author,
            _ => SearchScope::Any,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    pub sort: SortKey,
    pub search: Option<String>,
    pub scope: SearchScope,
}

impl BookQuery {
    pub fn search(term: impl Into<String>, scope: SearchScope) -> Self {
        Self {
            search: Some(term.into()),
            scope,
            ..Self::default()
        }
    }

    pub fn sorted(sort: SortKey) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }
}

/// Query string of the home view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub scope: Option<String>,
}

impl ListParams {
    pub fn to_query(&self) -> BookQuery {
        BookQuery {
            sort: self
                .sort
                .as_deref()
                .map(SortKey::parse_or_default)
                .unwrap_or_default(),
            search: utils::non_blank(self.q.as_deref()).map(str::to_string),
            scope: self
                .scope
                .as_deref()
                .map(SearchScope::parse_or_default)
                .unwrap_or_default(),
        }
    }
}

/// Add-book submission as posted by the form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookForm {
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub publication_year: Option<String>,
    #[serde(default, deserialize_with = "utils::lenient_text")]
    pub author_id: Option<String>,
}

pub const BOOK_FORM_FIELDS: [FormField; 4] = [
    FormField::required("title", "text"),
    FormField::required("isbn", "text"),
    FormField::optional("publication_year", "number"),
    FormField::required("author_id", "select"),
];

impl BookForm {
    /// Check required fields and coerce numbers. The returned book has no
    /// summary yet.
    pub fn validate(&self, current_year: i32) -> Result<NewBook, AppError> {
        let mut errors = FieldErrors::default();

        let title = utils::non_blank(self.title.as_deref());
        if title.is_none() {
            errors.add("title", "Title is required.");
        }

        let isbn = utils::non_blank(self.isbn.as_deref()).map(utils::normalize_isbn);
        if isbn.as_deref().map_or(true, str::is_empty) {
            errors.add("isbn", "ISBN is required.");
        }

        let publication_year = match utils::non_blank(self.publication_year.as_deref()) {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(year) if (0..=i64::from(current_year)).contains(&year) => Some(year),
                Ok(_) => {
                    errors.add(
                        "publication_year",
                        format!("Publication year must be between 0 and {}.", current_year),
                    );
                    None
                }
                Err(_) => {
                    errors.add("publication_year", "Publication year must be a whole number.");
                    None
                }
            },
        };

        let author_id = match utils::non_blank(self.author_id.as_deref()) {
            None => {
                errors.add("author_id", "Please choose an author.");
                None
            }
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("author_id", "Author must be a valid identifier.");
                    None
                }
            },
        };

        errors.finish("Please correct the highlighted book fields.")?;

        Ok(NewBook {
            title: title.unwrap_or_default().to_string(),
            isbn: isbn.unwrap_or_default(),
            publication_year,
            summary: None,
            author_id: author_id.unwrap_or_default(),
        })
    }
}

/// Home view: the books plus the effective search and sort.
#[derive(Debug, Serialize)]
pub struct BookList {
    pub q: String,
    pub sort: SortKey,
    pub scope: SearchScope,
    pub books: Vec<BookListing>,
}

#[derive(Debug, Serialize)]
pub struct BookCreated {
    pub book: Book,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BookDeleted {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub author_removed: bool,
    pub message: String,
}

impl From<DeletedBook> for BookDeleted {
    fn from(deleted: DeletedBook) -> Self {
        let message = if deleted.author_removed {
            format!(
                "Book '{}' was deleted; its author had no other books and was removed too.",
                deleted.book.title
            )
        } else {
            format!("Book '{}' was deleted successfully.", deleted.book.title)
        };

        Self {
            id: deleted.book.id,
            title: deleted.book.title,
            author_id: deleted.book.author_id,
            author_removed: deleted.author_removed,
            message,
        }
    }
}

/// Data needed to render the add-book form.
#[derive(Debug, Serialize)]
pub struct BookFormData {
    pub authors: Vec<Author>,
    pub current_year: i32,
    pub fields: &'static [FormField],
}
