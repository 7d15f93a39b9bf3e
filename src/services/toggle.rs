//! Toggle engine for binary relations (likes and subscriptions).
//!
//! A toggle is a single conditional write guarded by the relation table's
//! unique key: `INSERT ... ON CONFLICT DO NOTHING`, and only when nothing was
//! inserted, `DELETE` the existing row. The insert-vs-delete branch is decided
//! by the constraint, never by a prior read, so two concurrent toggles from
//! the same actor cannot create a duplicate row.

use crate::{
    models::like::LikeTarget,
    services::{ServiceError, ServiceResult, aggregate::Link},
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Which relation a toggle flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Like(LikeTarget),
    Subscription,
}

/// Storage layout of one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RelationLayout {
    table: &'static str,
    target_column: &'static str,
    actor_column: &'static str,
    discriminator: Option<(&'static str, &'static str)>,
    /// Table the target id must exist in.
    target_table: &'static str,
    target_label: &'static str,
}

impl Relation {
    fn layout(self) -> RelationLayout {
        match self {
            Relation::Like(target) => RelationLayout {
                table: "likes",
                target_column: "target_id",
                actor_column: "liked_by",
                discriminator: Some(("target_kind", target.as_str())),
                target_table: target.table(),
                target_label: target.label(),
            },
            Relation::Subscription => RelationLayout {
                table: "subscriptions",
                target_column: "channel_id",
                actor_column: "subscriber_id",
                discriminator: None,
                target_table: "users",
                target_label: "Channel",
            },
        }
    }

    /// Edge from the relation's target rows to their actors: counts likes on a
    /// video, subscribers of a channel; filters "liked by" / "subscribed by".
    pub fn target_link(self) -> Link {
        let layout = self.layout();
        Link {
            table: layout.table,
            member_column: layout.target_column,
            key_column: layout.actor_column,
            discriminator: layout.discriminator,
        }
    }

    /// Edge from actors to their targets: counts the channels a user
    /// subscribes to.
    pub fn actor_link(self) -> Link {
        let layout = self.layout();
        Link {
            table: layout.table,
            member_column: layout.actor_column,
            key_column: layout.target_column,
            discriminator: layout.discriminator,
        }
    }
}

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    /// True when the relation now exists (liked / subscribed).
    pub created: bool,
    /// Relation rows for the target after the toggle.
    pub total: i64,
}

#[derive(Clone)]
pub struct ToggleEngine {
    pub db: Arc<SqlitePool>,
}

impl ToggleEngine {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Flip the relation between `actor` and `target`.
    ///
    /// Fails with `NotFound` when the target row does not exist. Storage
    /// failures surface as `ServiceError::Storage` and are not retried.
    pub async fn toggle(
        &self,
        relation: Relation,
        target: Uuid,
        actor: Uuid,
    ) -> ServiceResult<ToggleOutcome> {
        let layout = relation.layout();
        self.ensure_target_exists(&layout, target).await?;

        let mut tx = self.db.begin().await?;

        let mut insert = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {} (id, {}, {}, created_at",
            layout.table, layout.target_column, layout.actor_column
        ));
        if let Some((column, _)) = layout.discriminator {
            insert.push(", ").push(column);
        }
        insert.push(") VALUES (");
        insert.push_bind(Uuid::new_v4());
        insert.push(", ").push_bind(target);
        insert.push(", ").push_bind(actor);
        insert.push(", ").push_bind(Utc::now());
        if let Some((_, value)) = layout.discriminator {
            insert.push(", ").push_bind(value);
        }
        insert.push(") ON CONFLICT DO NOTHING");

        let inserted = insert.build().execute(&mut *tx).await?.rows_affected();
        let created = inserted == 1;

        if !created {
            let mut delete = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE ", layout.table));
            push_pair_match(&mut delete, &layout, target);
            delete.push(" AND ").push(layout.actor_column).push(" = ").push_bind(actor);
            let removed = delete.build().execute(&mut *tx).await?.rows_affected();
            tracing::debug!(table = layout.table, removed, "toggle removed relation");
        }

        let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE ", layout.table));
        push_pair_match(&mut count, &layout, target);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        tx.commit().await?;

        tracing::info!(
            table = layout.table,
            %target,
            %actor,
            created,
            total,
            "relation toggled"
        );
        Ok(ToggleOutcome { created, total })
    }

    /// Current number of relation rows pointing at `target`.
    pub async fn count(&self, relation: Relation, target: Uuid) -> ServiceResult<i64> {
        let layout = relation.layout();
        let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE ", layout.table));
        push_pair_match(&mut count, &layout, target);
        Ok(count.build_query_scalar().fetch_one(&*self.db).await?)
    }

    async fn ensure_target_exists(&self, layout: &RelationLayout, target: Uuid) -> ServiceResult<()> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE id = ", layout.target_table));
        query.push_bind(target);
        let found: i64 = query.build_query_scalar().fetch_one(&*self.db).await?;
        if found == 0 {
            return Err(ServiceError::not_found(format!(
                "{} not found",
                layout.target_label
            )));
        }
        Ok(())
    }
}

/// `target_column = ? [AND discriminator = ?]`
fn push_pair_match(builder: &mut QueryBuilder<'_, Sqlite>, layout: &RelationLayout, target: Uuid) {
    builder.push(layout.target_column).push(" = ").push_bind(target);
    if let Some((column, value)) = layout.discriminator {
        builder.push(" AND ").push(column).push(" = ").push_bind(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::repository::Repository, test_support};

    async fn setup() -> (Repository, ToggleEngine) {
        let db = Arc::new(crate::db::test_pool().await);
        (Repository::new(db.clone()), ToggleEngine::new(db))
    }

    #[tokio::test]
    async fn like_twice_then_once_more() {
        let (repo, engine) = setup().await;
        let u1 = test_support::seed_user(&repo, "uploader").await;
        let u2 = test_support::seed_user(&repo, "viewer").await;
        let video = test_support::seed_video(&repo, u1.id, "intro").await;
        let like = Relation::Like(LikeTarget::Video);

        let first = engine.toggle(like, video.id, u2.id).await.unwrap();
        assert_eq!(first, ToggleOutcome { created: true, total: 1 });

        let second = engine.toggle(like, video.id, u2.id).await.unwrap();
        assert_eq!(second, ToggleOutcome { created: false, total: 0 });

        let third = engine.toggle(like, video.id, u2.id).await.unwrap();
        assert_eq!(third, ToggleOutcome { created: true, total: 1 });
        assert_eq!(engine.count(like, video.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn toggle_pair_restores_count_with_other_likers() {
        let (repo, engine) = setup().await;
        let owner = test_support::seed_user(&repo, "poster").await;
        let a = test_support::seed_user(&repo, "a-fan").await;
        let b = test_support::seed_user(&repo, "b-fan").await;
        let tweet = test_support::seed_tweet(&repo, owner.id, "hi").await;
        let like = Relation::Like(LikeTarget::Tweet);

        engine.toggle(like, tweet.id, a.id).await.unwrap();
        let before = engine.count(like, tweet.id).await.unwrap();

        engine.toggle(like, tweet.id, b.id).await.unwrap();
        engine.toggle(like, tweet.id, b.id).await.unwrap();
        assert_eq!(engine.count(like, tweet.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn like_kinds_do_not_collide() {
        let (repo, engine) = setup().await;
        let owner = test_support::seed_user(&repo, "multi").await;
        let video = test_support::seed_video(&repo, owner.id, "v").await;
        let comment = test_support::seed_comment(&repo, video.id, owner.id, "c").await;

        engine
            .toggle(Relation::Like(LikeTarget::Comment), comment.id, owner.id)
            .await
            .unwrap();
        assert_eq!(
            engine
                .count(Relation::Like(LikeTarget::Video), video.id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            engine
                .count(Relation::Like(LikeTarget::Comment), comment.id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn subscription_toggle_and_missing_target() {
        let (repo, engine) = setup().await;
        let channel = test_support::seed_user(&repo, "channel").await;
        let subscriber = test_support::seed_user(&repo, "subscriber").await;

        let on = engine
            .toggle(Relation::Subscription, channel.id, subscriber.id)
            .await
            .unwrap();
        assert!(on.created);
        assert_eq!(on.total, 1);

        let off = engine
            .toggle(Relation::Subscription, channel.id, subscriber.id)
            .await
            .unwrap();
        assert!(!off.created);
        assert_eq!(off.total, 0);

        let missing = engine
            .toggle(Relation::Subscription, Uuid::new_v4(), subscriber.id)
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(msg)) if msg == "Channel not found"));
    }

    #[tokio::test]
    async fn unique_key_blocks_duplicate_rows() {
        let (repo, engine) = setup().await;
        let owner = test_support::seed_user(&repo, "dup-owner").await;
        let video = test_support::seed_video(&repo, owner.id, "dup").await;
        engine
            .toggle(Relation::Like(LikeTarget::Video), video.id, owner.id)
            .await
            .unwrap();

        let raw = sqlx::query(
            "INSERT INTO likes (id, target_kind, target_id, liked_by, created_at) VALUES (?, 'video', ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(video.id)
        .bind(owner.id)
        .bind(Utc::now())
        .execute(&*repo.db)
        .await;
        assert!(raw.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_keep_one_row_per_pair() {
        let path = std::env::temp_dir().join(format!("videotube-toggle-{}.db", Uuid::new_v4()));
        let pool = crate::db::connect(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        let db = Arc::new(pool);
        let repo = Repository::new(db.clone());
        let engine = ToggleEngine::new(db.clone());
        let like = Relation::Like(LikeTarget::Video);

        let owner = test_support::seed_user(&repo, "popular").await;
        let video = test_support::seed_video(&repo, owner.id, "viral").await;
        let mut fans = Vec::new();
        for i in 0..20 {
            fans.push(test_support::seed_user(&repo, &format!("fan{}", i)).await.id);
        }

        let handles: Vec<_> = fans
            .into_iter()
            .map(|fan| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.toggle(like, video.id, fan).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().created);
        }
        assert_eq!(engine.count(like, video.id).await.unwrap(), 20);

        let eager = test_support::seed_user(&repo, "eager").await;
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.toggle(like, video.id, eager.id).await })
            })
            .collect();
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE liked_by = ?")
            .bind(eager.id)
            .fetch_one(&*db)
            .await
            .unwrap();
        assert!(rows <= 1);
        assert_eq!(created - (5 - created), rows);
        assert_eq!(engine.count(like, video.id).await.unwrap(), 20 + rows);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
