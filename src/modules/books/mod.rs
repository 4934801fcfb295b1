pub mod models;
mod routes;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use super::CatalogState;
use models::BookQuery;

pub const MODULE_NAME: &str = "books";

/// Books module: the home listing, add-book with summary lookup, detail and
/// delete with orphaned-author cleanup.
pub struct BooksModule {
    state: CatalogState,
}

impl BooksModule {
    pub fn new(state: CatalogState) -> Self {
        Self { state }
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE IF NOT EXISTS books (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                isbn             TEXT NOT NULL UNIQUE,
                title            TEXT NOT NULL CHECK (length(trim(title)) > 0),
                publication_year INTEGER,
                summary          TEXT,
                author_id        INTEGER NOT NULL REFERENCES authors (id)
            );
            CREATE INDEX IF NOT EXISTS books_author_id ON books (author_id);
            CREATE INDEX IF NOT EXISTS books_title ON books (title);
            "#,
    }]
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            summaries_enabled = ctx.settings.summary.enabled,
            "books module initialized"
        );
        Ok(())
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = self
            .state
            .repository
            .list_books(&BookQuery::default())
            .await
            .context("books table is not readable")?;

        let summary = &ctx.settings.summary;
        tracing::info!(
            module = self.name(),
            books = books.len(),
            summary_endpoint = ?summary.enabled.then_some(summary.base_url.as_str()),
            "books module ready"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_books).post(routes::create_book))
            .route("/new", get(routes::new_book_form))
            .route("/sort/{sort_key}", get(routes::sort_books))
            .route("/{id}", get(routes::book_detail).delete(routes::delete_book))
            .route("/{id}/delete", post(routes::delete_book))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let id_param = json!({
            "name": "id", "in": "path", "required": true, "schema": { "type": "integer" }
        });
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let delete = json!({
            "summary": "Delete a book; its author goes too when no books remain",
            "tags": ["Books"],
            "parameters": [id_param.clone()],
            "responses": {
                "200": { "description": "Book deleted" },
                "404": error("Book not found")
            }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List, search and sort books",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "q", "in": "query", "schema": { "type": "string" } },
                            { "name": "sort", "in": "query", "schema": { "type": "string", "enum": ["title", "author"] } },
                            { "name": "scope", "in": "query", "schema": { "type": "string", "enum": ["any", "title", "author"] } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Matching books",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookList" }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Add a book and look up its summary",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookForm" }
                                }
                            }
                        },
                        "responses": {
                            "201": { "description": "Book created" },
                            "409": error("ISBN already exists"),
                            "422": error("Validation error")
                        }
                    }
                },
                "/new": {
                    "get": {
                        "summary": "Add-book form: authors and fields",
                        "tags": ["Books"],
                        "responses": { "200": { "description": "Form description" } }
                    }
                },
                "/sort/{sort_key}": {
                    "get": {
                        "summary": "Redirect to the listing sorted by the given key",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "sort_key", "in": "path", "required": true, "schema": { "type": "string" } },
                            { "name": "q", "in": "query", "schema": { "type": "string" } }
                        ],
                        "responses": { "303": { "description": "Redirect to the listing" } }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Book detail including summary",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "responses": {
                            "200": {
                                "description": "Book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": error("Book not found")
                        }
                    },
                    "delete": delete.clone()
                },
                "/{id}/delete": {
                    "post": delete
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": { "type": "string" },
                            "isbn": { "type": "string" },
                            "publication_year": { "type": ["integer", "null"] },
                            "summary": { "type": ["string", "null"] },
                            "author_id": { "type": "integer" },
                            "author_name": { "type": "string" }
                        },
                        "required": ["id", "title", "isbn", "author_id"]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "q": { "type": "string" },
                            "sort": { "type": "string" },
                            "scope": { "type": "string" },
                            "books": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
                        }
                    },
                    "BookForm": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "isbn": { "type": "string" },
                            "publication_year": { "type": "string" },
                            "author_id": { "type": "string" }
                        },
                        "required": ["title", "isbn", "author_id"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(state: CatalogState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(state))
}
