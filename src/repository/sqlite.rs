use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{LibraryRepository, RepositoryError};
use crate::modules::authors::models::{Author, NewAuthor};
use crate::modules::books::models::{
    Book, BookListing, BookQuery, DeletedBook, NewBook, SearchScope, SortKey,
};

const AUTHOR_COLUMNS: &str = "id, name, birth_date, date_of_death";
const BOOK_COLUMNS: &str = "id, title, isbn, publication_year, summary, author_id";
const LISTING_SELECT: &str = "SELECT b.id, b.title, b.isbn, b.publication_year, b.summary, \
     b.author_id, a.name AS author_name \
     FROM books b JOIN authors a ON a.id = b.author_id";

/// [`LibraryRepository`] over a SQLite pool with foreign keys enabled.
#[derive(Debug, Clone)]
pub struct SqliteLibraryRepository {
    pool: SqlitePool,
}

impl SqliteLibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), RepositoryError> {
    if value.trim().is_empty() {
        return Err(RepositoryError::Validation {
            field,
            message: format!("{} is required", field),
        });
    }
    Ok(())
}

/// Case-insensitive substring match of a lowercased `needle` against the
/// columns named by `scope`.
fn matches_search(listing: &BookListing, needle: &str, scope: SearchScope) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(needle);
    match scope {
        SearchScope::Title => contains(&listing.book.title),
        SearchScope::Author => contains(&listing.author_name),
        SearchScope::Any => contains(&listing.book.title) || contains(&listing.author_name),
    }
}

fn insert_book_error(err: sqlx::Error, book: &NewBook) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict {
                field: "isbn",
                message: format!("A book with ISBN {} already exists.", book.isbn),
            };
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Validation {
                field: "author_id",
                message: format!("author {} does not exist", book.author_id),
            };
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl LibraryRepository for SqliteLibraryRepository {
    async fn create_author(&self, author: &NewAuthor) -> Result<Author, RepositoryError> {
        require("name", &author.name)?;

        let created = sqlx::query_as::<_, Author>(&format!(
            "INSERT INTO authors (name, birth_date, date_of_death) VALUES (?, ?, ?) RETURNING {}",
            AUTHOR_COLUMNS
        ))
        .bind(author.name.trim())
        .bind(author.birth_date)
        .bind(author.date_of_death)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(author_id = created.id, "author inserted");
        Ok(created)
    }

    async fn get_author(&self, id: i64) -> Result<Author, RepositoryError> {
        sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors WHERE id = ?",
            AUTHOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound {
            entity: "author",
            id,
        })
    }

    async fn list_authors(&self) -> Result<Vec<Author>, RepositoryError> {
        let authors = sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors ORDER BY name ASC, id ASC",
            AUTHOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn books_by_author(&self, author_id: i64) -> Result<Vec<Book>, RepositoryError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE author_id = ? ORDER BY title ASC, id ASC",
            BOOK_COLUMNS
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn create_book(&self, book: &NewBook) -> Result<Book, RepositoryError> {
        require("title", &book.title)?;
        require("isbn", &book.isbn)?;

        let created = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books (title, isbn, publication_year, summary, author_id) \
             VALUES (?, ?, ?, ?, ?) RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(book.title.trim())
        .bind(&book.isbn)
        .bind(book.publication_year)
        .bind(book.summary.as_deref())
        .bind(book.author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| insert_book_error(err, book))?;

        tracing::debug!(book_id = created.id, isbn = %created.isbn, "book inserted");
        Ok(created)
    }

    async fn get_book(&self, id: i64) -> Result<BookListing, RepositoryError> {
        sqlx::query_as::<_, BookListing>(&format!("{} WHERE b.id = ?", LISTING_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound { entity: "book", id })
    }

    async fn isbn_exists(&self, isbn: &str) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE isbn = ?)")
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn list_books(&self, query: &BookQuery) -> Result<Vec<BookListing>, RepositoryError> {
        let order = match query.sort {
            SortKey::Title => " ORDER BY b.title ASC, b.id ASC",
            SortKey::Author => " ORDER BY a.name ASC, b.title ASC, b.id ASC",
        };

        let books = sqlx::query_as::<_, BookListing>(&format!("{}{}", LISTING_SELECT, order))
            .fetch_all(&self.pool)
            .await?;

        // SQLite's LOWER() folds ASCII only, so matching happens here.
        let Some(term) = query.search.as_deref() else {
            return Ok(books);
        };
        let needle = term.to_lowercase();
        Ok(books
            .into_iter()
            .filter(|listing| matches_search(listing, &needle, query.scope))
            .collect())
    }

    async fn delete_book(&self, id: i64) -> Result<DeletedBook, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Delete before counting so the write lock is held for the count.
        let book = sqlx::query_as::<_, Book>(&format!(
            "DELETE FROM books WHERE id = ? RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound { entity: "book", id })?;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE author_id = ?")
            .bind(book.author_id)
            .fetch_one(&mut *tx)
            .await?;

        let author_removed = remaining == 0;
        if author_removed {
            sqlx::query("DELETE FROM authors WHERE id = ?")
                .bind(book.author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if author_removed {
            tracing::info!(
                book_id = book.id,
                author_id = book.author_id,
                "last book deleted, orphaned author removed"
            );
        }

        Ok(DeletedBook {
            book,
            author_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_db::Database;
    use bookshelf_kernel::settings::DatabaseSettings;
    use time::macros::date;

    async fn repository() -> SqliteLibraryRepository {
        let db = Database::in_memory().await.unwrap();
        db.migrate(&crate::modules::schema_migrations())
            .await
            .unwrap();
        SqliteLibraryRepository::new(db.pool().clone())
    }

    async fn author(repo: &SqliteLibraryRepository, name: &str) -> Author {
        repo.create_author(&NewAuthor::named(name)).await.unwrap()
    }

    async fn book(repo: &SqliteLibraryRepository, author: &Author, title: &str, isbn: &str) -> Book {
        repo.create_book(&NewBook {
            title: title.to_string(),
            isbn: isbn.to_string(),
            publication_year: None,
            summary: None,
            author_id: author.id,
        })
        .await
        .unwrap()
    }

    async fn count(repo: &SqliteLibraryRepository, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&repo.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn author_round_trips_dates() {
        let repo = repository().await;
        let created = repo
            .create_author(&NewAuthor {
                name: "Leo Tolstoy".to_string(),
                birth_date: Some(date!(1828 - 09 - 09)),
                date_of_death: Some(date!(1910 - 11 - 20)),
            })
            .await
            .unwrap();

        let loaded = repo.get_author(created.id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.birth_date, Some(date!(1828 - 09 - 09)));
    }

    #[tokio::test]
    async fn author_without_books_may_exist() {
        let repo = repository().await;
        let lonely = author(&repo, "Nobody Yet").await;

        assert!(repo.books_by_author(lonely.id).await.unwrap().is_empty());
        assert_eq!(repo.get_author(lonely.id).await.unwrap().name, "Nobody Yet");
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let repo = repository().await;
        let err = repo.create_author(&NewAuthor::named("  ")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Validation { field: "name", .. }));
        assert_eq!(count(&repo, "authors").await, 0);
    }

    #[tokio::test]
    async fn duplicate_isbn_conflicts_without_writing() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        book(&repo, &tolstoy, "War and Peace", "9780140447934").await;

        let err = repo
            .create_book(&NewBook {
                title: "Another Title".to_string(),
                isbn: "9780140447934".to_string(),
                publication_year: Some(1900),
                summary: None,
                author_id: tolstoy.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict { field: "isbn", .. }));
        assert_eq!(count(&repo, "books").await, 1);
        assert!(repo.isbn_exists("9780140447934").await.unwrap());
        assert!(!repo.isbn_exists("0000000000").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_author_is_a_validation_error() {
        let repo = repository().await;
        let err = repo
            .create_book(&NewBook {
                title: "Ghost".to_string(),
                isbn: "1".to_string(),
                publication_year: None,
                summary: None,
                author_id: 999,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Validation { field: "author_id", .. }));
        assert_eq!(count(&repo, "books").await, 0);
    }

    #[tokio::test]
    async fn deleting_last_book_removes_author() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        let war = book(&repo, &tolstoy, "War and Peace", "1").await;

        let deleted = repo.delete_book(war.id).await.unwrap();

        assert!(deleted.author_removed);
        assert_eq!(deleted.book, war);
        assert!(repo.get_book(war.id).await.unwrap_err().is_not_found());
        assert!(repo.get_author(tolstoy.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn deleting_one_of_several_keeps_author() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        let war = book(&repo, &tolstoy, "War and Peace", "1").await;
        let anna = book(&repo, &tolstoy, "Anna Karenina", "2").await;

        let deleted = repo.delete_book(war.id).await.unwrap();

        assert!(!deleted.author_removed);
        assert_eq!(repo.get_author(tolstoy.id).await.unwrap(), tolstoy);
        assert_eq!(repo.books_by_author(tolstoy.id).await.unwrap(), vec![anna]);
    }

    #[tokio::test]
    async fn deleting_missing_book_changes_nothing() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        book(&repo, &tolstoy, "War and Peace", "1").await;

        let err = repo.delete_book(4242).await.unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound { entity: "book", id: 4242 }));
        assert_eq!(count(&repo, "books").await, 1);
        assert_eq!(count(&repo, "authors").await, 1);
    }

    #[tokio::test]
    async fn title_search_is_case_insensitive_substring() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        let austen = author(&repo, "Jane Austen").await;
        book(&repo, &tolstoy, "War and Peace", "1").await;
        book(&repo, &austen, "Pride and Prejudice", "2").await;
        book(&repo, &austen, "Emma", "3").await;
        book(&repo, &tolstoy, "Peacetime Stories", "4").await;

        let found = repo
            .list_books(&BookQuery::search("PEACE", SearchScope::Title))
            .await
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|b| b.book.title.as_str()).collect();
        assert_eq!(titles, vec!["Peacetime Stories", "War and Peace"]);
    }

    #[tokio::test]
    async fn search_scopes_cover_author_names() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        let austen = author(&repo, "Jane Austen").await;
        book(&repo, &tolstoy, "War and Peace", "1").await;
        book(&repo, &austen, "Emma", "2").await;
        book(&repo, &austen, "Leo's Diary", "3").await;

        let by_author = repo
            .list_books(&BookQuery::search("leo", SearchScope::Author))
            .await
            .unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].author_name, "Leo Tolstoy");

        let any = repo
            .list_books(&BookQuery::search("leo", SearchScope::Any))
            .await
            .unwrap();
        assert_eq!(any.len(), 2);
    }

    #[tokio::test]
    async fn wildcards_in_search_are_literal() {
        let repo = repository().await;
        let someone = author(&repo, "Someone").await;
        book(&repo, &someone, "100% Rust", "1").await;
        book(&repo, &someone, "100 Years", "2").await;
        book(&repo, &someone, "snake_case", "3").await;
        book(&repo, &someone, "snakescase", "4").await;

        let percent = repo
            .list_books(&BookQuery::search("0%", SearchScope::Title))
            .await
            .unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].book.title, "100% Rust");

        let underscore = repo
            .list_books(&BookQuery::search("e_c", SearchScope::Title))
            .await
            .unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].book.title, "snake_case");
    }

    #[tokio::test]
    async fn sorting_by_title_and_author() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        let austen = author(&repo, "Jane Austen").await;
        let woolf = author(&repo, "Virginia Woolf").await;
        book(&repo, &woolf, "Orlando", "1").await;
        book(&repo, &tolstoy, "Anna Karenina", "2").await;
        book(&repo, &austen, "Persuasion", "3").await;
        book(&repo, &tolstoy, "War and Peace", "4").await;
        book(&repo, &austen, "Emma", "5").await;

        let by_title = repo.list_books(&BookQuery::sorted(SortKey::Title)).await.unwrap();
        let titles: Vec<&str> = by_title.iter().map(|b| b.book.title.as_str()).collect();
        assert!(titles.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(titles.len(), 5);

        let by_author = repo.list_books(&BookQuery::sorted(SortKey::Author)).await.unwrap();
        let names: Vec<&str> = by_author.iter().map(|b| b.author_name.as_str()).collect();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(by_author[0].book.title, "Emma");
        assert_eq!(by_author[1].book.title, "Persuasion");
    }

    #[tokio::test]
    async fn listing_carries_author_name_and_summary() {
        let repo = repository().await;
        let tolstoy = author(&repo, "Leo Tolstoy").await;
        let created = repo
            .create_book(&NewBook {
                title: "War and Peace".to_string(),
                isbn: "9780140447934".to_string(),
                publication_year: Some(1869),
                summary: Some("Napoleon invades Russia.".to_string()),
                author_id: tolstoy.id,
            })
            .await
            .unwrap();

        let listing = repo.get_book(created.id).await.unwrap();
        assert_eq!(listing.author_name, "Leo Tolstoy");
        assert_eq!(listing.book.summary.as_deref(), Some("Napoleon invades Russia."));
        assert_eq!(listing.book.publication_year, Some(1869));
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let repo = repository().await;
        let zola = author(&repo, "Émile Zola").await;
        let bergson = author(&repo, "Henri Bergson").await;
        book(&repo, &zola, "Germinal", "1").await;
        book(&repo, &bergson, "Élan Vital", "2").await;

        let titles = repo
            .list_books(&BookQuery::search("élan", SearchScope::Title))
            .await
            .unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].book.title, "Élan Vital");

        let authors = repo
            .list_books(&BookQuery::search("ÉMILE", SearchScope::Author))
            .await
            .unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].book.title, "Germinal");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deletes_remove_author_exactly_once() {
        let dir = std::env::temp_dir().join(format!("bookshelf-deletes-{}", std::process::id()));
        let db = Database::connect(&DatabaseSettings {
            path: dir.join("library.sqlite").to_string_lossy().into_owned(),
            ..DatabaseSettings::default()
        })
        .await
        .unwrap();
        db.migrate(&crate::modules::schema_migrations())
            .await
            .unwrap();
        let repo = SqliteLibraryRepository::new(db.pool().clone());

        for round in 0..5 {
            let tolstoy = author(&repo, "Leo Tolstoy").await;
            let mut ids = Vec::new();
            for n in 0..5 {
                let isbn = format!("{}-{}", round, n);
                ids.push(book(&repo, &tolstoy, &format!("Volume {}", n), &isbn).await.id);
            }

            let deletes: Vec<_> = ids
                .into_iter()
                .map(|id| {
                    let repo = repo.clone();
                    tokio::spawn(async move { repo.delete_book(id).await })
                })
                .collect();

            let mut removals = 0;
            for delete in deletes {
                if delete.await.unwrap().unwrap().author_removed {
                    removals += 1;
                }
            }

            assert_eq!(removals, 1, "round {}", round);
            assert!(repo.get_author(tolstoy.id).await.unwrap_err().is_not_found());
        }

        assert_eq!(count(&repo, "books").await, 0);
        assert_eq!(count(&repo, "authors").await, 0);

        db.close().await;
        let _ = std::fs::remove_dir_all(dir);
    }
}
