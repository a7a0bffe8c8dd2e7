// tests/comment_engine_tests.rs

mod common;

use std::time::Duration;

use async_trait::async_trait;
use forum_backend::{
    ThreadSettings,
    error::ActionError,
    forum::{
        closure::{self, ClosureError},
        notify::{Notification, Notifier},
        paginate::Page,
        query::{SortOrder, ThreadCriteria},
    },
    models::{comment::CommentView, stage::Stage},
};
use tokio::sync::mpsc;

fn ids(page: &Page<CommentView>) -> Vec<i64> {
    page.data.iter().map(|c| c.id).collect()
}

fn oldest_first() -> ThreadCriteria {
    ThreadCriteria::default()
}

#[tokio::test]
async fn closure_rows_match_generation_counts() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let root = proposal.comment_id;

    let a = common::reply(&forum, &alice, root, "a").await;
    let _b = common::reply(&forum, &alice, root, "b").await;
    let a1 = common::reply(&forum, &alice, a.id, "a1").await;
    let _a2 = common::reply(&forum, &alice, a.id, "a2").await;
    let _a11 = common::reply(&forum, &alice, a1.id, "a11").await;

    let mut conn = forum.pool().acquire().await.unwrap();
    assert_eq!(closure::descendants_within(&mut *conn, root, 1).await.unwrap().len(), 2);
    assert_eq!(closure::descendants_within(&mut *conn, root, 2).await.unwrap().len(), 4);
    assert_eq!(closure::descendants_within(&mut *conn, root, 3).await.unwrap().len(), 5);
    assert_eq!(closure::descendants_within(&mut *conn, a.id, 9).await.unwrap().len(), 3);

    // Exactly one ancestor row per generation.
    let ancestors = closure::ancestors(&mut *conn, a1.id).await.unwrap();
    let generations: Vec<i64> = ancestors.iter().map(|h| h.generations).collect();
    assert_eq!(generations, vec![1, 2]);
    assert_eq!(ancestors[1].ancestor_id, root);
}

#[tokio::test]
async fn reply_depth_is_parent_depth_plus_one() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let mut parent = proposal.comment_id;
    let mut conn = forum.pool().acquire().await.unwrap();
    assert_eq!(closure::depth(&mut *conn, parent).await.unwrap(), Some(0));
    drop(conn);

    for _ in 0..3 {
        let child = common::reply(&forum, &alice, parent, "deeper").await;
        let mut conn = forum.pool().acquire().await.unwrap();
        let parent_depth = closure::depth(&mut *conn, parent).await.unwrap().unwrap();
        let child_depth = closure::depth(&mut *conn, child.id).await.unwrap().unwrap();
        assert_eq!(child_depth, parent_depth + 1);
        assert_eq!(closure::root_of(&mut *conn, child.id).await.unwrap(), Some(proposal.comment_id));
        parent = child.id;
    }
}

#[tokio::test]
async fn closure_insert_is_all_or_nothing() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let a = common::reply(&forum, &alice, proposal.comment_id, "a").await;

    let mut conn = forum.pool().acquire().await.unwrap();

    let missing = closure::insert(&mut *conn, a.id + 100, Some(a.id + 200)).await;
    assert!(matches!(missing, Err(ClosureError::MissingParent(_))));

    let relinked = closure::insert(&mut *conn, a.id, Some(proposal.comment_id)).await;
    assert!(matches!(relinked, Err(ClosureError::Cycle(_))));

    let self_parent = closure::insert(&mut *conn, a.id, Some(a.id)).await;
    assert!(matches!(self_parent, Err(ClosureError::Cycle(_))));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment_hierarchies")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    // root self-row + a's self-row + (root, a).
    assert_eq!(rows, 3);
}

#[tokio::test]
async fn comment_at_max_depth_is_rejected() {
    let forum = common::forum_with(ThreadSettings {
        max_depth: 2,
        page_sizes: vec![10, 5, 3, 3],
    })
    .await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let a = common::reply(&forum, &alice, proposal.comment_id, "depth 1").await;
    let b = common::reply(&forum, &alice, a.id, "depth 2").await;

    let count = |pool: sqlx::SqlitePool| async move {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
            .fetch_one(&pool)
            .await
            .unwrap()
    };
    let before = count(forum.pool().clone()).await;

    let result = forum.comment(&alice, b.id, "depth 3").await;
    assert!(matches!(result, Err(ActionError::MaximumCommentDepth)));
    assert_eq!(count(forum.pool().clone()).await, before);
}

#[tokio::test]
async fn reply_without_proposal_is_not_linked() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;

    let orphan_root: i64 = sqlx::query_scalar(
        "INSERT INTO comments (parent_id, user_id, body, stage, created_at) VALUES (NULL, ?, 'ROOT', 'idea', ?) RETURNING id",
    )
    .bind(alice.id)
    .bind(chrono::Utc::now())
    .fetch_one(forum.pool())
    .await
    .unwrap();

    let mut conn = forum.pool().acquire().await.unwrap();
    closure::insert(&mut *conn, orphan_root, None).await.unwrap();
    drop(conn);

    let result = forum.comment(&alice, orphan_root, "hello").await;
    assert!(matches!(result, Err(ActionError::CommentNotLinked)));
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let too_long = "x".repeat(10_001);
    let result = forum.comment(&alice, proposal.comment_id, &too_long).await;
    assert!(matches!(result, Err(ActionError::InvalidData(_))));

    let result = forum.comment(&alice, proposal.comment_id, "").await;
    assert!(matches!(result, Err(ActionError::InvalidData(_))));

    let result = forum.comment(&alice, 9_999, "hello").await;
    assert!(matches!(result, Err(ActionError::NotFound(_))));

    let longest = "x".repeat(10_000);
    assert!(forum.comment(&alice, proposal.comment_id, &longest).await.is_ok());
}

#[tokio::test]
async fn body_limit_counts_submitted_characters() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    // Escaping would make these far longer than the limit.
    let ampersands = "&".repeat(10_000);
    let stored = forum.comment(&alice, proposal.comment_id, &ampersands).await.unwrap();
    assert_eq!(stored.body, ampersands);

    let too_many = "<".repeat(10_001);
    let result = forum.comment(&alice, proposal.comment_id, &too_many).await;
    assert!(matches!(result, Err(ActionError::InvalidData(_))));
}

#[tokio::test]
async fn bodies_are_stored_as_submitted_and_served_sanitized() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let comment = common::reply(&forum, &alice, proposal.comment_id, "1 < 2 & 3 > 2").await;
    assert_eq!(forum.find_comment(comment.id).await.unwrap().body, "1 < 2 & 3 > 2");

    let page = forum
        .thread(proposal.comment_id, None, Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(page.data[0].body.as_deref(), Some("1 &lt; 2 &amp; 3 &gt; 2"));

    // Nothing would be left to show.
    let result = forum.comment(&alice, proposal.comment_id, "<script>x</script>").await;
    assert!(matches!(result, Err(ActionError::InvalidData(_))));
}

#[tokio::test]
async fn replies_inherit_the_proposal_stage() {
    let forum = common::forum().await;
    let admin = common::admin(&forum).await;
    let proposal = common::proposal(&forum, &admin).await;

    let early = common::reply(&forum, &admin, proposal.comment_id, "idea stage").await;
    assert_eq!(early.stage, Stage::Idea);

    forum
        .update_proposal_stage(&admin, &proposal.proposal_id, Stage::Commit)
        .await
        .unwrap();

    let late = common::reply(&forum, &admin, proposal.comment_id, "commit stage").await;
    assert_eq!(late.stage, Stage::Commit);

    // Replies to an idea-stage comment still take the proposal's current stage.
    let nested = common::reply(&forum, &admin, early.id, "nested").await;
    assert_eq!(nested.stage, Stage::Commit);

    let commit = forum
        .thread(proposal.comment_id, Some(&admin), Stage::Commit, oldest_first())
        .await
        .unwrap();
    assert_eq!(ids(&commit), vec![late.id]);

    let idea = forum
        .thread(proposal.comment_id, Some(&admin), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(ids(&idea), vec![early.id]);
    // The commit-stage reply below it is filtered out of the idea-stage read.
    assert!(idea.data[0].replies.data.is_empty());
}

#[tokio::test]
async fn delete_twice_returns_already_deleted() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "oops").await;

    let deleted = forum.delete(&alice, comment.id).await.unwrap();
    assert!(deleted.is_discarded());

    let again = forum.delete(&alice, comment.id).await;
    assert!(matches!(again, Err(ActionError::AlreadyDeleted)));

    let stored = forum.find_comment(comment.id).await.unwrap();
    assert_eq!(stored.discarded_at, deleted.discarded_at);
}

#[tokio::test]
async fn only_the_author_can_delete() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let bob = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "mine").await;

    let result = forum.delete(&bob, comment.id).await;
    assert!(matches!(result, Err(ActionError::UnauthorizedAction)));
    assert!(!forum.find_comment(comment.id).await.unwrap().is_discarded());
}

#[tokio::test]
async fn deleted_comments_keep_their_replies() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let bob = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let parent = common::reply(&forum, &alice, proposal.comment_id, "parent").await;
    let child = common::reply(&forum, &bob, parent.id, "child").await;
    forum.delete(&alice, parent.id).await.unwrap();

    // Still commentable.
    let late = common::reply(&forum, &bob, parent.id, "late reply").await;

    let page = forum
        .thread(proposal.comment_id, Some(&bob), Stage::Idea, oldest_first())
        .await
        .unwrap();

    let shown = &page.data[0];
    assert_eq!(shown.id, parent.id);
    assert_eq!(shown.body, None);
    assert_eq!(ids(&shown.replies), vec![child.id, late.id]);
    assert_eq!(shown.replies.data[0].body.as_deref(), Some("child"));
}

#[tokio::test]
async fn likes_are_counted_and_toggled() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let bob = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "like me").await;

    let liked = forum.like(&bob, comment.id).await.unwrap();
    assert_eq!(liked.likes, 1);

    let again = forum.like(&bob, comment.id).await;
    assert!(matches!(again, Err(ActionError::AlreadyLiked)));

    let page = forum
        .thread(proposal.comment_id, Some(&bob), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(page.data[0].likes, Some(1));
    assert_eq!(page.data[0].liked, Some(true));
    assert!(page.data[0].like_id.is_some());

    let page = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(page.data[0].liked, Some(false));

    let unliked = forum.unlike(&bob, comment.id).await.unwrap();
    assert_eq!(unliked.likes, 0);

    let again = forum.unlike(&bob, comment.id).await;
    assert!(matches!(again, Err(ActionError::NotLiked)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_are_all_counted() {
    const LIKERS: usize = 20;

    // File database with several connections, as the server runs it.
    let (forum, _database) = common::file_forum(5).await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "popular").await;

    let mut likers = Vec::new();
    for _ in 0..LIKERS {
        likers.push(common::user(&forum).await);
    }

    let handles: Vec<_> = likers
        .into_iter()
        .map(|user| {
            let forum = forum.clone();
            let proposal_id = proposal.proposal_id.clone();
            tokio::spawn(async move {
                forum.like(&user, comment.id).await?;
                forum.like_proposal(&user, &proposal_id).await?;
                forum.comment(&user, comment.id, "me too").await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = forum.find_comment(comment.id).await.unwrap();
    assert_eq!(stored.likes, LIKERS as i64);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?")
        .bind(comment.id)
        .fetch_one(forum.pool())
        .await
        .unwrap();
    assert_eq!(rows, LIKERS as i64);

    let liked = forum.find_proposal(&proposal.proposal_id, None).await.unwrap();
    assert_eq!(liked.proposal.likes, LIKERS as i64);

    let replies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE parent_id = ?")
        .bind(comment.id)
        .fetch_one(forum.pool())
        .await
        .unwrap();
    assert_eq!(replies, LIKERS as i64);
}

#[tokio::test]
async fn ban_hides_content_from_members_only() {
    let forum = common::forum().await;
    let admin = common::admin(&forum).await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "spam").await;

    let denied = forum.ban(&alice, comment.id).await;
    assert!(matches!(denied, Err(ActionError::UnauthorizedAction)));

    let banned = forum.ban(&admin, comment.id).await.unwrap();
    assert!(banned.is_banned);
    assert!(banned.is_discarded());

    let twice = forum.ban(&admin, comment.id).await;
    assert!(matches!(twice, Err(ActionError::CommentAlreadyBanned)));

    let member_view = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(member_view.data[0].body, None);
    assert_eq!(member_view.data[0].is_banned, None);

    let admin_view = forum
        .thread(proposal.comment_id, Some(&admin), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(admin_view.data[0].body.as_deref(), Some("spam"));
    assert_eq!(admin_view.data[0].is_banned, Some(true));

    let unbanned = forum.unban(&admin, comment.id).await.unwrap();
    assert!(!unbanned.is_banned);
    assert!(!unbanned.is_discarded());

    let twice = forum.unban(&admin, comment.id).await;
    assert!(matches!(twice, Err(ActionError::CommentAlreadyUnbanned)));

    let member_view = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(member_view.data[0].body.as_deref(), Some("spam"));
}

#[tokio::test]
async fn anonymous_readers_get_null_likes() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "hi").await;
    forum.like(&alice, comment.id).await.unwrap();

    let page = forum
        .thread(proposal.comment_id, None, Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(page.data[0].likes, None);
    assert_eq!(page.data[0].liked, None);
    assert_eq!(page.data[0].like_id, None);
    assert_eq!(page.data[0].body.as_deref(), Some("hi"));
}

#[tokio::test]
async fn each_level_is_paged_independently() {
    let forum = common::forum_with(ThreadSettings {
        max_depth: 5,
        page_sizes: vec![2, 1],
    })
    .await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    for i in 0..3 {
        let child = common::reply(&forum, &alice, proposal.comment_id, &format!("child {i}")).await;
        common::reply(&forum, &alice, child.id, &format!("reply {i}")).await;
    }

    let page = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();

    assert!(page.has_more);
    assert_eq!(page.data.len(), 2);
    for node in &page.data {
        assert_eq!(node.replies.data.len(), 1);
        assert!(!node.replies.has_more);
    }
}

#[tokio::test]
async fn same_page_twice_is_identical() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    for i in 0..4 {
        let child = common::reply(&forum, &alice, proposal.comment_id, &format!("c{i}")).await;
        for j in 0..2 {
            common::reply(&forum, &alice, child.id, &format!("c{i}.{j}")).await;
        }
    }

    let criteria = ThreadCriteria {
        last_seen_id: None,
        sort: SortOrder::Latest,
    };
    let first = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, criteria)
        .await
        .unwrap();
    let second = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, criteria)
        .await
        .unwrap();

    let flatten = |page: &Page<CommentView>| -> Vec<i64> {
        page.data
            .iter()
            .flat_map(|c| std::iter::once(c.id).chain(c.replies.data.iter().map(|r| r.id)))
            .collect()
    };
    assert_eq!(flatten(&first), flatten(&second));
    assert_eq!(flatten(&first).len(), 12);
}

#[tokio::test]
async fn latest_sorting_only_applies_to_the_top_level() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let first = common::reply(&forum, &alice, proposal.comment_id, "first").await;
    let second = common::reply(&forum, &alice, proposal.comment_id, "second").await;
    let older = common::reply(&forum, &alice, first.id, "older").await;
    let newer = common::reply(&forum, &alice, first.id, "newer").await;

    let latest = ThreadCriteria {
        last_seen_id: None,
        sort: SortOrder::Latest,
    };
    let page = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, latest)
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![second.id, first.id]);
    assert_eq!(ids(&page.data[1].replies), vec![older.id, newer.id]);

    let page = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![first.id, second.id]);
}

#[tokio::test]
async fn last_seen_id_pages_through_the_top_level() {
    let forum = common::forum_with(ThreadSettings {
        max_depth: 5,
        page_sizes: vec![2, 2],
    })
    .await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    let mut children = Vec::new();
    for i in 0..3 {
        children.push(common::reply(&forum, &alice, proposal.comment_id, &format!("c{i}")).await.id);
    }

    let first = forum
        .thread(proposal.comment_id, None, Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(ids(&first), children[..2].to_vec());
    assert!(first.has_more);

    let next = ThreadCriteria {
        last_seen_id: first.data.last().map(|c| c.id),
        sort: SortOrder::Oldest,
    };
    let second = forum
        .thread(proposal.comment_id, None, Stage::Idea, next)
        .await
        .unwrap();
    assert_eq!(ids(&second), vec![children[2]]);
    assert!(!second.has_more);

    // Newest first walks the other way.
    let latest = ThreadCriteria {
        last_seen_id: Some(children[2]),
        sort: SortOrder::Latest,
    };
    let page = forum
        .thread(proposal.comment_id, None, Stage::Idea, latest)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![children[1], children[0]]);
}

#[tokio::test]
async fn deep_replies_load_from_a_deeper_root() {
    let forum = common::forum().await;
    let alice = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;

    // Generations 1 through 5 below the proposal root.
    let mut chain = Vec::new();
    let mut parent = proposal.comment_id;
    for depth in 1..=5 {
        let c = common::reply(&forum, &alice, parent, &format!("depth {depth}")).await;
        chain.push(c.id);
        parent = c.id;
    }

    let page = forum
        .thread(proposal.comment_id, Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();

    let mut node = &page.data[0];
    for expected in &chain[1..4] {
        assert_eq!(node.replies.data.len(), 1);
        node = &node.replies.data[0];
        assert_eq!(node.id, *expected);
    }
    // Generation 5 is outside the fetched window.
    assert!(node.replies.data.is_empty());

    let more = forum
        .thread(chain[3], Some(&alice), Stage::Idea, oldest_first())
        .await
        .unwrap();
    assert_eq!(ids(&more), vec![chain[4]]);
}

struct ChannelNotifier(mpsc::UnboundedSender<Notification>);

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) {
        let _ = self.0.send(notification);
    }
}

#[tokio::test]
async fn likes_trigger_notifications() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let forum = common::forum().await.with_notifier(ChannelNotifier(tx));
    let alice = common::user(&forum).await;
    let bob = common::user(&forum).await;
    let proposal = common::proposal(&forum, &alice).await;
    let comment = common::reply(&forum, &alice, proposal.comment_id, "notify me").await;

    forum.like(&bob, comment.id).await.unwrap();

    let mut seen = Vec::new();
    while seen.len() < 2 {
        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification not delivered")
            .expect("channel closed");
        seen.push(next);
    }

    assert!(seen.contains(&Notification::CommentLiked {
        comment_id: comment.id,
        user_id: bob.id,
    }));
    assert!(seen.contains(&Notification::CommentCreated {
        comment_id: comment.id,
        parent_id: proposal.comment_id,
        user_id: alice.id,
    }));
}
