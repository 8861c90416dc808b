//! # Dispatcher
//!
//! Feed webhook 分发引擎。
//!
//! 负责：
//! - 拉取每个 feed 的最新文章窗口，并按游标截取新文章
//! - 解析 feed 与 webhook 的绑定关系
//! - 并发 fan-out 到各 connector，隔离单个失败
//! - 以乐观并发方式提交游标（有限次重试）

pub mod bindings;
pub mod commit;
pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod fetcher;

pub use bindings::{resolve_bindings, Bindings};
pub use commit::{CommitManager, PendingCursor};
pub use contracts::{CommitSummary, RunReport, SendOutcome};
pub use cursor::resolve_new;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use fetcher::ArticleFetcher;
