pub mod models;
mod routes;

use async_trait::async_trait;
use axum::{routing::get, Router};
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use super::CatalogState;

pub const MODULE_NAME: &str = "authors";

/// Authors: creation, listing and the detail page with their books.
pub struct AuthorsModule {
    state: CatalogState,
}

impl AuthorsModule {
    pub fn new(state: CatalogState) -> Self {
        Self { state }
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE IF NOT EXISTS authors (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                name          TEXT NOT NULL CHECK (length(trim(name)) > 0),
                birth_date    TEXT,
                date_of_death TEXT
            );
            CREATE INDEX IF NOT EXISTS authors_name ON authors (name);
            "#,
    }]
}

#[async_trait]
impl Module for AuthorsModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "authors module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_authors).post(routes::create_author))
            .route("/new", get(routes::new_author_form))
            .route("/{id}", get(routes::author_detail))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List authors by name",
                        "tags": ["Authors"],
                        "responses": {
                            "200": {
                                "description": "Authors",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Author" }
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Add an author",
                        "tags": ["Authors"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/AuthorForm" }
                                }
                            }
                        },
                        "responses": {
                            "201": { "description": "Author created" },
                            "422": {
                                "description": "Validation error",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/new": {
                    "get": {
                        "summary": "Add-author form fields",
                        "tags": ["Authors"],
                        "responses": { "200": { "description": "Form description" } }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Author detail with books",
                        "tags": ["Authors"],
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } }
                        ],
                        "responses": {
                            "200": { "description": "Author and books" },
                            "404": {
                                "description": "Author not found",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Author": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "name": { "type": "string" },
                            "birth_date": { "type": ["string", "null"], "format": "date" },
                            "date_of_death": { "type": ["string", "null"], "format": "date" }
                        },
                        "required": ["id", "name"]
                    },
                    "AuthorForm": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "birth_date": { "type": "string", "description": "YYYY-MM-DD" },
                            "date_of_death": { "type": "string", "description": "YYYY-MM-DD" }
                        },
                        "required": ["name"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "authors module stopped");
        Ok(())
    }
}

/// Create a new instance of the authors module
pub fn create_module(state: CatalogState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuthorsModule::new(state))
}
