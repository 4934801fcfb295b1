//! The catalog's unit of composition.
//!
//! A [`Module`] owns one slice of the HTTP surface (mounted under
//! `/api/{name}`), the tables behind it and their OpenAPI description. The
//! [`crate::ModuleRegistry`] drives every module through the same sequence:
//!
//! 1. migrations from [`Module::migrations`] are applied by the database crate;
//! 2. [`Module::init`] runs against the migrated schema;
//! 3. [`Module::routes`] and [`Module::openapi`] are collected into the router;
//! 4. [`Module::start`] runs right before the listener accepts requests;
//! 5. [`Module::stop`] runs after the server drains, in reverse order.

use async_trait::async_trait;
use axum::Router;

use crate::settings::Settings;

/// Borrowed view of the application handed to lifecycle hooks.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
}

/// Schema migration contributed by a module.
///
/// `up` may hold several SQL statements; it is applied as one script inside
/// a transaction and recorded under `(module name, id)` so it runs only once.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

#[async_trait]
pub trait Module: Sync + Send {
    /// Mount point under `/api` and key in `schema_migrations`.
    fn name(&self) -> &'static str;

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with paths relative to the mount point.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Applied in the order returned.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Last chance to check the module's state before traffic arrives; an
    /// error aborts startup.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
