//! Evaluation pass orchestration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::evaluator::{Resolution, RuleEvaluator, bounded};
use super::issue_service::IssueService;
use super::store::{IssueStore, ReportStore, RuleStore};
use super::{PassStats, TriggerError, TriggerOutcome};
use crate::config::TriggerConfig;
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Periodic pass: the rule must still be enabled when reloaded
    Scheduled,
    /// Requested through the API: runs regardless of `is_enable`
    Manual,
}

/// Drives rule evaluation and its side effects.
///
/// Each rule runs resolve, create issue, notify, advance watermark while
/// holding that rule's lock, so a scheduled pass and a manual trigger never
/// interleave on the same rule.
pub struct TriggerEngine {
    evaluator: RuleEvaluator,
    rules: Arc<dyn RuleStore>,
    issues: IssueService,
    notifier: Arc<dyn Notifier>,
    store_timeout: Duration,
    pass_deadline: Duration,
    rule_locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl TriggerEngine {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        rules: Arc<dyn RuleStore>,
        issues: Arc<dyn IssueStore>,
        notifier: Arc<dyn Notifier>,
        config: &TriggerConfig,
    ) -> Self {
        Self {
            evaluator: RuleEvaluator::new(reports, config.store_timeout()),
            rules,
            issues: IssueService::new(issues),
            notifier,
            store_timeout: config.store_timeout(),
            pass_deadline: config.pass_deadline(),
            rule_locks: Mutex::new(HashMap::new()),
        }
    }

    /// One pass over every enabled rule.
    ///
    /// Only a failure to list the rules fails the pass; per-rule errors are
    /// logged and counted.
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<PassStats, TriggerError> {
        let started = Instant::now();
        let deadline = started + self.pass_deadline;
        let mut stats = PassStats::default();

        let rules = bounded(
            "load enabled rules",
            self.store_timeout,
            self.rules.all_enabled(),
        )
        .await?;

        for rule in rules {
            if Instant::now() >= deadline {
                stats.deferred += 1;
                continue;
            }

            stats.evaluated += 1;
            counter!("trigger_rules_evaluated_total").increment(1);

            match self.process(rule.id, Mode::Scheduled).await {
                Ok(outcome) if outcome.triggered => {
                    stats.matched += 1;
                    counter!("trigger_rules_matched_total").increment(1);
                }
                Ok(_) => {}
                Err(err) => {
                    stats.failed += 1;
                    counter!("trigger_rules_failed_total").increment(1);
                    error!(
                        rule_id = rule.id,
                        position = %rule.position,
                        permanent = err.is_permanent(),
                        error = %err,
                        "Rule processing failed"
                    );
                }
            }
        }

        if stats.deferred > 0 {
            warn!(
                deferred = stats.deferred,
                deadline_ms = self.pass_deadline.as_millis() as u64,
                "Pass deadline reached; remaining rules deferred to next tick"
            );
        }

        self.prune_locks().await;

        let elapsed = started.elapsed();
        histogram!("trigger_pass_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);
        info!(
            evaluated = stats.evaluated,
            matched = stats.matched,
            failed = stats.failed,
            deferred = stats.deferred,
            elapsed_ms = elapsed.as_millis() as u64,
            "Trigger pass completed"
        );

        Ok(stats)
    }

    /// Evaluate a single rule on demand, whether or not it is enabled.
    #[instrument(skip(self))]
    pub async fn trigger_rule(&self, rule_id: i32) -> Result<TriggerOutcome, TriggerError> {
        let result = self.process(rule_id, Mode::Manual).await;
        match &result {
            Ok(outcome) => info!(
                rule_id,
                triggered = outcome.triggered,
                timestamp = ?outcome.timestamp,
                "Manual trigger finished"
            ),
            Err(err) => error!(rule_id, error = %err, "Manual trigger failed"),
        }
        result
    }

    async fn process(&self, rule_id: i32, mode: Mode) -> Result<TriggerOutcome, TriggerError> {
        let lock = self.rule_lock(rule_id).await;
        let _guard = lock.lock().await;

        // Reload under the lock: the listing may be stale by now.
        let rule = bounded("reload rule", self.store_timeout, self.rules.find(rule_id)).await?;
        let rule = match (rule, mode) {
            (Some(rule), Mode::Manual) => rule,
            (Some(rule), Mode::Scheduled) if rule.is_enable => rule,
            (Some(_), Mode::Scheduled) | (None, Mode::Scheduled) => {
                debug!(rule_id, "Rule disabled or removed since listing; skipping");
                return Ok(TriggerOutcome::not_triggered());
            }
            (None, Mode::Manual) => return Err(TriggerError::RuleNotFound(rule_id)),
        };

        let trigger = match self.evaluator.resolve(&rule).await? {
            Resolution::Matched(trigger) => trigger,
            Resolution::NoMatch | Resolution::NoData => {
                return Ok(TriggerOutcome::not_triggered());
            }
        };

        let issue = tokio::time::timeout(self.store_timeout, self.issues.create(&rule, &trigger))
            .await
            .map_err(|_| TriggerError::Timeout {
                operation: "create issue",
                timeout: self.store_timeout,
            })?
            .map_err(|source| TriggerError::Storage {
                operation: "create issue",
                source,
            })?;

        match bounded(
            "load owner email",
            self.store_timeout,
            self.rules.owner_email(rule.user_id),
        )
        .await
        {
            Ok(Some(email)) => {
                self.notifier
                    .send_async(vec![email], issue.title.clone(), issue.content.clone());
            }
            Ok(None) => {
                warn!(
                    rule_id,
                    user_id = rule.user_id,
                    "Rule owner has no active account; notification skipped"
                );
            }
            Err(err) => {
                warn!(rule_id, error = %err, "Could not resolve rule owner; notification skipped");
            }
        }

        let advanced = bounded(
            "advance watermark",
            self.store_timeout,
            self.rules.advance_watermark(rule.id, trigger.timestamp),
        )
        .await?;
        if !advanced {
            warn!(
                rule_id,
                timestamp = trigger.timestamp,
                "Watermark already at or beyond matched timestamp"
            );
        }

        info!(
            rule_id,
            position = %rule.position,
            timestamp = trigger.timestamp,
            value = trigger.value,
            issue_id = issue.id,
            "Rule triggered"
        );

        Ok(TriggerOutcome {
            triggered: true,
            issue_id: Some(issue.id),
            timestamp: Some(trigger.timestamp),
        })
    }

    async fn rule_lock(&self, rule_id: i32) -> Arc<Mutex<()>> {
        let mut locks = self.rule_locks.lock().await;
        Arc::clone(locks.entry(rule_id).or_default())
    }

    /// Drop locks nobody is holding or waiting on.
    async fn prune_locks(&self) {
        let mut locks = self.rule_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
