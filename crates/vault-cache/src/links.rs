//! Wiki-link resolution over the metadata index.

use std::sync::Arc;

use tracing::debug;

use crate::model::IndexedFile;
use crate::store::Store;

/// Resolves note names and slugs against indexed documents.
///
/// Reads only the local index; never touches the network.
#[derive(Clone)]
pub struct LinkResolver {
    store: Arc<Store>,
}

impl LinkResolver {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Resolve a wiki link (`"My Note"`, `"My Note#Heading"`, an alias) to a slug.
    pub async fn resolve(&self, link: &str) -> Option<String> {
        let slug = wiki_links::resolve_link(link, &self.documents().await);
        if slug.is_none() {
            debug!(link, "Unresolved wiki link");
        }
        slug
    }

    /// The indexed document a wiki link resolves to.
    pub async fn resolve_document(&self, link: &str) -> Option<IndexedFile> {
        let documents = self.documents().await;
        wiki_links::resolve_link_candidate(link, &documents).cloned()
    }

    /// Remote id of the first document whose slug matches.
    pub async fn slug_to_id(&self, slug: &str) -> Option<String> {
        let documents = self.documents().await;
        wiki_links::slug_to_id(slug, &documents).map(str::to_string)
    }

    // Folders can carry a document-like name; keep them out of resolution
    async fn documents(&self) -> Vec<IndexedFile> {
        let mut files = self.store.files.all().await;
        files.retain(IndexedFile::is_document);
        files
    }
}
