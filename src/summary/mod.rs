//! Book summary lookups by ISBN.

mod open_library;

use std::sync::Arc;

use async_trait::async_trait;
use bookshelf_kernel::settings::SummarySettings;

pub use open_library::{extract_description, OpenLibraryClient};

/// Source of book summaries.
///
/// Lookups never fail: any problem reaching or reading the provider yields
/// `None`, and the book is stored without a summary.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn fetch_summary(&self, isbn: &str) -> Option<String>;
}

/// Provider used when lookups are switched off in the settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSummaryProvider;

#[async_trait]
impl SummaryProvider for DisabledSummaryProvider {
    async fn fetch_summary(&self, _isbn: &str) -> Option<String> {
        None
    }
}

pub fn from_settings(settings: &SummarySettings) -> anyhow::Result<Arc<dyn SummaryProvider>> {
    if !settings.enabled {
        tracing::info!("summary lookups disabled");
        return Ok(Arc::new(DisabledSummaryProvider));
    }

    Ok(Arc::new(OpenLibraryClient::new(settings)?))
}
