//! Issue creation for satisfied rules.

use std::sync::Arc;

use chrono::DateTime;

use super::evaluator::Trigger;
use super::store::{IssueStore, StoreError};
use crate::models::issue::{self, NewIssue};
use crate::models::rule;

#[derive(Clone)]
pub struct IssueService {
    store: Arc<dyn IssueStore>,
}

impl IssueService {
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self { store }
    }

    /// Persists a CREATED issue for `rule`, owned by the rule's owner.
    pub async fn create(
        &self,
        rule: &rule::Model,
        trigger: &Trigger,
    ) -> Result<issue::Model, StoreError> {
        self.store.create(render(rule, trigger)).await
    }
}

/// Title and body for an issue raised by `rule`.
pub fn render(rule: &rule::Model, trigger: &Trigger) -> NewIssue {
    let rule_name = rule.display_name();
    let observed_at = DateTime::from_timestamp(trigger.timestamp, 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| trigger.timestamp.to_string());

    let content = format!(
        "Rule {rule_name} was triggered.\n\
         \n\
         Condition: {position} {resource} {op} {threshold}\n\
         Observed: {value} at {observed_at}\n",
        position = rule.position,
        resource = rule.resource,
        op = rule.operator.symbol(),
        threshold = rule.value,
        value = trigger.value,
    );

    NewIssue {
        user_id: rule.user_id,
        rule_id: rule.id,
        title: format!("Rule {rule_name} triggered"),
        content,
    }
}
