//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the dispatch engine.
//! Business crates depend on this crate only, never on each other's internals.
//!
//! ## Collaborators
//! - [`FeedRepository`]: document store with revision tokens (feeds, webhooks)
//! - [`ArticleSearch`]: article query service
//! - [`Connector`]: per-provider format/send/validate capability

mod article;
mod blueprint;
mod connector;
mod datetime;
mod document;
mod error;
mod feed;
mod report;
mod repository;
mod webhook;

pub use article::*;
pub use blueprint::*;
pub use connector::{Connector, ProviderPayload, SendReport};
pub use datetime::parse_timestamp;
pub use document::*;
pub use error::*;
pub use feed::*;
pub use report::*;
pub use repository::{ArticleSearch, FeedRepository, LocalArticleSearch, LocalFeedRepository};
pub use webhook::*;
