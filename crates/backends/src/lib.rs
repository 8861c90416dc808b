//! # Backends
//!
//! Feed/Webhook 仓库与文章检索的具体实现。
//!
//! - `CouchRepository`: CouchDB 文档仓库（修订号乐观并发）
//! - `ElasticArticleSearch`: Elasticsearch 文章检索
//! - `MemoryRepository` / `MemorySearch`: 内存实现，用于测试与离线运行
//! - `RepositoryBackend` / `SearchBackend`: 按配置的 `kind` 选择实现

pub mod couch;
pub mod elastic;
pub mod error;
pub mod fixtures;
pub mod memory;
pub mod select;

pub use couch::CouchRepository;
pub use elastic::ElasticArticleSearch;
pub use error::BackendError;
pub use fixtures::Fixtures;
pub use memory::{MemoryFailures, MemoryRepository, MemorySearch};
pub use select::{RepositoryBackend, SearchBackend};
