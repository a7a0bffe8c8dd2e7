use crate::models::{comment::Comment, proposal::Proposal, user::User};

/// Verbs the engine asks permission for before mutating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Comment,
    Delete,
    Like,
    Unlike,
    Ban,
    Unban,
    /// KYC review verbs; the forum never grants them on discussion content.
    Approve,
    Reject,
    SetStage,
}

/// What an action is performed on, with the actor-specific facts the policy
/// needs (whether the actor already liked it).
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Comment { comment: &'a Comment, liked: bool },
    Proposal { proposal: &'a Proposal, liked: bool },
}

impl<'a> Subject<'a> {
    pub fn comment(comment: &'a Comment) -> Self {
        Subject::Comment { comment, liked: false }
    }
}

/// Authorization collaborator: `can(actor, verb, subject)`.
pub trait Authorizer: Send + Sync {
    fn can(&self, actor: &User, action: Action, subject: &Subject<'_>) -> bool;
}

/// Default forum rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForumPolicy;

impl Authorizer for ForumPolicy {
    fn can(&self, actor: &User, action: Action, subject: &Subject<'_>) -> bool {
        match (action, subject) {
            (Action::Comment, Subject::Comment { .. }) => true,
            (Action::Delete, Subject::Comment { comment, .. }) => {
                !comment.is_root() && comment.user_id == actor.id
            }
            (Action::Like, Subject::Comment { liked, .. } | Subject::Proposal { liked, .. }) => !liked,
            (Action::Unlike, Subject::Comment { liked, .. } | Subject::Proposal { liked, .. }) => *liked,
            (Action::Ban | Action::Unban, Subject::Comment { comment, .. }) => {
                actor.is_forum_admin && !comment.is_root()
            }
            (Action::SetStage, Subject::Proposal { .. }) => actor.is_forum_admin,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stage::Stage;
    use chrono::Utc;

    fn user(id: i64, is_forum_admin: bool) -> User {
        User {
            id,
            address: format!("0x{:040x}", id),
            uid: id,
            is_forum_admin,
            created_at: Utc::now(),
        }
    }

    fn comment(id: i64, parent_id: Option<i64>, user_id: i64) -> Comment {
        Comment {
            id,
            parent_id,
            user_id,
            body: "hello".into(),
            stage: Stage::Idea,
            likes: 0,
            is_banned: false,
            discarded_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_the_author_deletes() {
        let c = comment(2, Some(1), 7);
        assert!(ForumPolicy.can(&user(7, false), Action::Delete, &Subject::comment(&c)));
        assert!(!ForumPolicy.can(&user(8, true), Action::Delete, &Subject::comment(&c)));
    }

    #[test]
    fn root_sentinel_cannot_be_deleted_or_banned() {
        let root = comment(1, None, 7);
        assert!(!ForumPolicy.can(&user(7, true), Action::Delete, &Subject::comment(&root)));
        assert!(!ForumPolicy.can(&user(7, true), Action::Ban, &Subject::comment(&root)));
    }

    #[test]
    fn likes_follow_current_like_state() {
        let c = comment(2, Some(1), 7);
        let actor = user(9, false);
        let liked = Subject::Comment { comment: &c, liked: true };
        let fresh = Subject::Comment { comment: &c, liked: false };
        assert!(ForumPolicy.can(&actor, Action::Like, &fresh));
        assert!(!ForumPolicy.can(&actor, Action::Like, &liked));
        assert!(ForumPolicy.can(&actor, Action::Unlike, &liked));
        assert!(!ForumPolicy.can(&actor, Action::Unlike, &fresh));
    }

    #[test]
    fn kyc_verbs_are_never_granted_on_comments() {
        let c = comment(2, Some(1), 7);
        let admin = user(1, true);
        assert!(!ForumPolicy.can(&admin, Action::Approve, &Subject::comment(&c)));
        assert!(!ForumPolicy.can(&admin, Action::Reject, &Subject::comment(&c)));
    }
}
