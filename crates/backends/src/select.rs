//! Backend selection by configured kind

use std::path::Path;

use contracts::{
    Article, ArticleQuery, ArticleSearch, BackendKind, ContractError, Document, FeedRepository,
    RepositoryConfig, SearchConfig, WriteResult,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    BackendError, CouchRepository, ElasticArticleSearch, Fixtures, MemoryRepository, MemorySearch,
};

/// Repository chosen by `repository.kind`
pub enum RepositoryBackend {
    Couch(CouchRepository),
    Memory(MemoryRepository),
}

impl RepositoryBackend {
    pub fn from_config(config: &RepositoryConfig) -> Result<Self, BackendError> {
        match config.kind {
            BackendKind::Remote => {
                info!(database = %config.database, "Using CouchDB repository");
                Ok(Self::Couch(CouchRepository::new(config)?))
            }
            BackendKind::Memory => {
                let fixtures = load_fixtures(config.fixtures.as_deref())?;
                info!(
                    feeds = fixtures.feeds.len(),
                    webhooks = fixtures.webhooks.len(),
                    "Using in-memory repository"
                );
                MemoryRepository::from_fixtures(&fixtures)
                    .map(Self::Memory)
                    .map_err(|e| BackendError::fixtures("repository", e.to_string()))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Couch(_) => BackendKind::Remote,
            Self::Memory(_) => BackendKind::Memory,
        }
    }
}

impl FeedRepository for RepositoryBackend {
    async fn get_all<D: Document>(&self) -> Result<Vec<D>, ContractError> {
        match self {
            Self::Couch(repository) => repository.get_all().await,
            Self::Memory(repository) => repository.get_all().await,
        }
    }

    async fn get_by_keys<D: Document>(&self, ids: &[Uuid]) -> Result<Vec<D>, ContractError> {
        match self {
            Self::Couch(repository) => repository.get_by_keys(ids).await,
            Self::Memory(repository) => repository.get_by_keys(ids).await,
        }
    }

    async fn bulk_update<D: Document>(
        &self,
        documents: Vec<D>,
    ) -> Result<Vec<WriteResult>, ContractError> {
        match self {
            Self::Couch(repository) => repository.bulk_update(documents).await,
            Self::Memory(repository) => repository.bulk_update(documents).await,
        }
    }
}

/// Article search chosen by `search.kind`
pub enum SearchBackend {
    Elastic(ElasticArticleSearch),
    Memory(MemorySearch),
}

impl SearchBackend {
    pub fn from_config(config: &SearchConfig) -> Result<Self, BackendError> {
        match config.kind {
            BackendKind::Remote => {
                info!(index = %config.index, "Using Elasticsearch article search");
                Ok(Self::Elastic(ElasticArticleSearch::new(config)?))
            }
            BackendKind::Memory => {
                let fixtures = load_fixtures(config.fixtures.as_deref())?;
                info!(articles = fixtures.articles.len(), "Using in-memory article search");
                Ok(Self::Memory(MemorySearch::from_fixtures(&fixtures)))
            }
        }
    }
}

impl ArticleSearch for SearchBackend {
    async fn query(&self, query: &ArticleQuery) -> Result<Vec<Article>, ContractError> {
        match self {
            Self::Elastic(search) => search.query(query).await,
            Self::Memory(search) => search.query(query).await,
        }
    }
}

fn load_fixtures(path: Option<&Path>) -> Result<Fixtures, BackendError> {
    let path = path.ok_or_else(|| {
        BackendError::fixtures("", "memory backend configured without a fixtures file")
    })?;
    Fixtures::load(path)
}
