//! Collaborator traits: document repository and article search
//!
//! Both are consumed generically by the dispatcher, so they use
//! `trait_variant` to produce `Send` futures without boxing.

use uuid::Uuid;

use crate::{Article, ArticleQuery, ContractError, Document, WriteResult};

/// Feed/Webhook document repository
///
/// Writes go through the store's revision check; the repository never locks.
#[trait_variant::make(FeedRepository: Send)]
pub trait LocalFeedRepository {
    /// Load every document of kind `D`
    async fn get_all<D: Document>(&self) -> Result<Vec<D>, ContractError>;

    /// Load documents of kind `D` by ID
    ///
    /// Missing IDs are silently absent from the result.
    async fn get_by_keys<D: Document>(&self, ids: &[Uuid]) -> Result<Vec<D>, ContractError>;

    /// Write documents, each carrying the revision it was read at
    ///
    /// Returns one [`WriteResult`] per document. A stale revision is reported
    /// as a per-document conflict, not as an `Err`.
    async fn bulk_update<D: Document>(
        &self,
        documents: Vec<D>,
    ) -> Result<Vec<WriteResult>, ContractError>;
}

/// Article search service
#[trait_variant::make(ArticleSearch: Send)]
pub trait LocalArticleSearch {
    /// Query articles matching the filter, ordered and capped as requested
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>, ContractError>;
}
