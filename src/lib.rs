//! Bookshelf application library
//!
//! Wires the catalog modules, the SQLite store and the summary source into a
//! runnable [`App`].

use std::sync::Arc;

use anyhow::Context;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub mod modules;
pub mod repository;
pub mod summary;
pub mod utils;

use modules::CatalogState;
use repository::SqliteLibraryRepository;

/// A bootstrapped application: settings, open database and initialized modules.
pub struct App {
    pub settings: Settings,
    pub database: Database,
    pub registry: ModuleRegistry,
}

/// Open the store, apply pending migrations and initialize every module.
pub async fn bootstrap(settings: Settings) -> anyhow::Result<App> {
    let database = Database::connect(&settings.database).await?;
    let summaries = summary::from_settings(&settings.summary)?;
    let state = CatalogState::new(
        Arc::new(SqliteLibraryRepository::new(database.pool().clone())),
        summaries,
    );

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, state);

    let applied = database
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply schema migrations")?;

    registry
        .init_modules(&InitCtx {
            settings: &settings,
        })
        .await?;

    tracing::info!(
        modules = registry.module_count(),
        migrations_applied = applied,
        "bookshelf bootstrap complete"
    );

    Ok(App {
        settings,
        database,
        registry,
    })
}

impl App {
    /// Serve HTTP until a shutdown signal, then stop modules and close the store.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.registry
            .start_modules(&InitCtx {
                settings: &self.settings,
            })
            .await?;

        let served = bookshelf_http::start_server(&self.registry, &self.settings).await;

        if let Err(err) = self.registry.stop_modules().await {
            tracing::warn!(error = %err, "module shutdown reported an error");
        }
        self.database.close().await;

        served
    }
}
