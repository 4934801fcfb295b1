pub mod authors;
pub mod books;

use std::sync::Arc;

use bookshelf_kernel::{Migration, ModuleRegistry};

use crate::repository::LibraryRepository;
use crate::summary::SummaryProvider;

/// Shared handler state: the store and the summary source.
#[derive(Clone)]
pub struct CatalogState {
    pub repository: Arc<dyn LibraryRepository>,
    pub summaries: Arc<dyn SummaryProvider>,
}

impl CatalogState {
    pub fn new(
        repository: Arc<dyn LibraryRepository>,
        summaries: Arc<dyn SummaryProvider>,
    ) -> Self {
        Self {
            repository,
            summaries,
        }
    }
}

/// Register all catalog modules with the registry.
///
/// Authors come first: the books table references theirs.
pub fn register_all(registry: &mut ModuleRegistry, state: CatalogState) {
    registry.register(authors::create_module(state.clone()));
    registry.register(books::create_module(state));
}

/// Every table migration, in the order `register_all` would apply them.
pub fn schema_migrations() -> Vec<(String, Migration)> {
    let authors = authors::migrations()
        .into_iter()
        .map(|m| (authors::MODULE_NAME.to_string(), m));
    let books = books::migrations()
        .into_iter()
        .map(|m| (books::MODULE_NAME.to_string(), m));
    authors.chain(books).collect()
}
