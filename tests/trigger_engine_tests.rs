//! Trigger engine against the SQLite-backed repositories.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use meter::models::rule::{CreateRule, RuleOperator, RulePosition, RuleResource, UpdateRule};
use meter::repositories::{IssueRepository, NewUser, RuleRepository, UserRepository};
use meter::server::build_engine;
use meter::trigger::{PassStats, RuleStore};
use sea_orm::DatabaseConnection;
use test_utils::{RecordingNotifier, insert_grid, insert_reservoir, insert_seismic, setup_test_db, test_config};

struct Fixture {
    db: Arc<DatabaseConnection>,
    rules: RuleRepository,
    user_id: i32,
    notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    async fn new() -> Self {
        let db = Arc::new(setup_test_db().await.unwrap());
        let user = UserRepository::new(db.clone())
            .with_hash_cost(4)
            .create(NewUser {
                name: "owner".to_string(),
                email: "owner@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        Self {
            rules: RuleRepository::new(db.clone()),
            db,
            user_id: user.id,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    async fn rule(
        &self,
        position: RulePosition,
        resource: RuleResource,
        operator: RuleOperator,
        value: f64,
    ) -> i32 {
        self.rules
            .create(
                self.user_id,
                CreateRule {
                    name: None,
                    position,
                    resource,
                    operator,
                    value,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn run(&self) -> PassStats {
        build_engine(&test_config(), self.db.clone(), self.notifier.clone())
            .run()
            .await
            .unwrap()
    }

    async fn watermark(&self, rule_id: i32) -> Option<i64> {
        self.rules
            .find_for_user(self.user_id, rule_id)
            .await
            .unwrap()
            .last_triggered_by
    }

    async fn issue_count(&self) -> usize {
        IssueRepository::new(self.db.clone())
            .list_for_user(self.user_id, Default::default())
            .await
            .unwrap()
            .len()
    }
}

#[tokio::test]
async fn pass_covers_every_domain() {
    let fx = Fixture::new().await;
    insert_reservoir(&fx.db, "曾文水庫", 500, 9000.0, 12.0)
        .await
        .unwrap();
    insert_grid(&fx.db, 600, 100.0, 103.0).await.unwrap();
    insert_seismic(&fx.db, 700, [0, 4, 2]).await.unwrap();

    let dam = fx
        .rule(
            RulePosition::ZengwenReservoir,
            RuleResource::Percent,
            RuleOperator::LessThanOrEqualTo,
            15.0,
        )
        .await;
    let grid = fx
        .rule(
            RulePosition::CentralElectricity,
            RuleResource::RecvRate,
            RuleOperator::LessThan,
            5.0,
        )
        .await;
    let quake = fx
        .rule(
            RulePosition::TaichungEarthquake,
            RuleResource::Intensity,
            RuleOperator::GreaterThanOrEqualTo,
            4.0,
        )
        .await;
    let quiet = fx
        .rule(
            RulePosition::TainanEarthquake,
            RuleResource::Intensity,
            RuleOperator::GreaterThan,
            2.0,
        )
        .await;

    let stats = fx.run().await;

    assert_eq!(
        stats,
        PassStats {
            evaluated: 4,
            matched: 3,
            failed: 0,
            deferred: 0,
        }
    );
    assert_eq!(fx.watermark(dam).await, Some(500));
    assert_eq!(fx.watermark(grid).await, Some(600));
    assert_eq!(fx.watermark(quake).await, Some(700));
    assert_eq!(fx.watermark(quiet).await, None);
    assert_eq!(fx.issue_count().await, 3);
    assert_eq!(fx.notifier.subjects().len(), 3);
}

#[tokio::test]
async fn second_pass_without_new_data_is_quiet() {
    let fx = Fixture::new().await;
    insert_reservoir(&fx.db, "石門水庫", 100, 1000.0, 10.0)
        .await
        .unwrap();
    fx.rule(
        RulePosition::ShimenReservoir,
        RuleResource::Storage,
        RuleOperator::LessThan,
        2000.0,
    )
    .await;

    assert_eq!(fx.run().await.matched, 1);
    assert_eq!(fx.run().await.matched, 0);

    insert_reservoir(&fx.db, "石門水庫", 200, 1100.0, 11.0)
        .await
        .unwrap();
    assert_eq!(fx.run().await.matched, 1);
    assert_eq!(fx.issue_count().await, 2);
}

#[tokio::test]
async fn unavailable_readings_never_match() {
    let fx = Fixture::new().await;
    insert_reservoir(&fx.db, "石門水庫", 100, -1.0, -1.0)
        .await
        .unwrap();
    let rule = fx
        .rule(
            RulePosition::ShimenReservoir,
            RuleResource::Percent,
            RuleOperator::LessThan,
            50.0,
        )
        .await;

    let stats = fx.run().await;

    assert_eq!(stats.matched, 0);
    assert_eq!(stats.failed, 0);
    assert_eq!(fx.watermark(rule).await, None);
}

#[tokio::test]
async fn disabled_rules_are_skipped_by_the_pass() {
    let fx = Fixture::new().await;
    insert_reservoir(&fx.db, "石門水庫", 100, 1000.0, 10.0)
        .await
        .unwrap();
    let rule = fx
        .rule(
            RulePosition::ShimenReservoir,
            RuleResource::Percent,
            RuleOperator::LessThan,
            50.0,
        )
        .await;
    fx.rules
        .set_enabled(fx.user_id, rule, false)
        .await
        .unwrap();

    let stats = fx.run().await;

    assert_eq!(stats.evaluated, 0);
    assert_eq!(fx.issue_count().await, 0);
}

#[tokio::test]
async fn watermark_update_is_conditional() {
    let fx = Fixture::new().await;
    let rule = fx
        .rule(
            RulePosition::NorthElectricity,
            RuleResource::Load,
            RuleOperator::GreaterThan,
            1.0,
        )
        .await;

    assert!(fx.rules.advance_watermark(rule, 300).await.unwrap());
    assert!(!fx.rules.advance_watermark(rule, 200).await.unwrap());
    assert!(!fx.rules.advance_watermark(rule, 300).await.unwrap());
    assert_eq!(fx.watermark(rule).await, Some(300));

    assert_eq!(
        fx.rules.owner_email(fx.user_id).await.unwrap().as_deref(),
        Some("owner@example.com")
    );
}

#[tokio::test]
async fn editing_a_rule_does_not_resurface_old_events() {
    let fx = Fixture::new().await;
    insert_seismic(&fx.db, 3000, [1, 2, 3]).await.unwrap();
    insert_seismic(&fx.db, 2000, [5, 1, 1]).await.unwrap();
    let rule = fx
        .rule(
            RulePosition::HsinchuEarthquake,
            RuleResource::Intensity,
            RuleOperator::GreaterThanOrEqualTo,
            4.0,
        )
        .await;

    assert_eq!(fx.run().await.matched, 1);
    assert_eq!(fx.watermark(rule).await, Some(2000));

    let updated = fx
        .rules
        .update(
            fx.user_id,
            rule,
            UpdateRule {
                value: Some(4.0),
                operator: Some(RuleOperator::GreaterThanOrEqualTo),
                ..UpdateRule::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.last_triggered_by, Some(2000));

    assert_eq!(fx.run().await.matched, 0);
    assert_eq!(fx.watermark(rule).await, Some(2000));
    assert_eq!(fx.issue_count().await, 1);
}
