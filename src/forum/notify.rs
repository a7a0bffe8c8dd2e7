use async_trait::async_trait;

/// Events the engine announces after a mutation commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    CommentCreated { comment_id: i64, parent_id: i64, user_id: i64 },
    CommentLiked { comment_id: i64, user_id: i64 },
    CommentBanned { comment_id: i64, admin_id: i64 },
    ProposalLiked { proposal_id: String, user_id: i64 },
}

/// Notification collaborator. Calls are spawned and never awaited by the
/// mutation, so implementations must not rely on ordering or delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Writes notifications to the log; the default until a mailer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        tracing::info!(?notification, "forum notification");
    }
}
