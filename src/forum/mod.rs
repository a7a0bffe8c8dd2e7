//! Proposal discussion engine.
//!
//! Comments form one tree per proposal, hanging from a `ROOT` sentinel. The
//! structure lives in a closure table ([`closure`]); reads fetch a shallow
//! window of it ([`query`]), rebuild the nesting ([`tree`]), trim every level
//! to its own page size ([`paginate`]) and redact per viewer
//! ([`visibility`]). Writes ([`comment`], [`proposal`], [`user`]) are
//! transactional and return tagged [`ActionError`](crate::error::ActionError)s.

pub mod closure;
pub mod comment;
pub mod notify;
pub mod paginate;
pub mod policy;
pub mod proposal;
pub mod query;
pub mod tree;
pub mod user;
pub mod visibility;

use std::sync::Arc;

use sqlx::{Sqlite, SqlitePool, Transaction};

use self::{
    notify::{LogNotifier, Notification, Notifier},
    policy::{Authorizer, ForumPolicy},
};

/// Immutable thread configuration, fixed when the engine is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSettings {
    /// Replies may only be posted under a parent shallower than this.
    pub max_depth: i64,
    /// Page size for each nesting level, top level first.
    pub page_sizes: Vec<usize>,
}

impl ThreadSettings {
    pub const DEFAULT_MAX_DEPTH: i64 = 5;
    pub const DEFAULT_PAGE_SIZES: [usize; 4] = [10, 5, 3, 3];

    /// Deepest generation fetched below the thread root in one read.
    /// Top-level replies are generation 1 and fetched separately.
    pub fn fetch_depth(&self) -> i64 {
        self.page_sizes.len().max(1) as i64
    }
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            page_sizes: Self::DEFAULT_PAGE_SIZES.to_vec(),
        }
    }
}

/// Handle to the forum engine. Cheap to clone; holds no mutable state of its
/// own, all consistency comes from store transactions.
#[derive(Clone)]
pub struct Forum {
    pool: SqlitePool,
    settings: Arc<ThreadSettings>,
    policy: Arc<dyn Authorizer>,
    notifier: Arc<dyn Notifier>,
}

impl Forum {
    pub fn new(pool: SqlitePool, settings: ThreadSettings) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
            policy: Arc::new(ForumPolicy),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_policy(mut self, policy: impl Authorizer + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> &ThreadSettings {
        &self.settings
    }

    /// Opens a write transaction holding SQLite's write lock from the start,
    /// so a read-then-write sequence never fails on lock upgrade. Concurrent
    /// writers queue on the connection's busy timeout instead.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    /// Fire-and-forget: the mutation that triggered it has already committed.
    fn notify(&self, notification: Notification) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(notification).await;
        });
    }
}
