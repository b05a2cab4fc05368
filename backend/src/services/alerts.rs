//! Alert subscriptions and the scheduled evaluator
//!
//! Rule lifecycle: `Active -> Triggered -> Active` once the cooldown has
//! passed, and `Active | Triggered -> Cancelled` on unsubscribe. A rule that
//! re-arms is not evaluated on the same tick.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{
    AlertCondition, AlertEvent, AlertPreset, AlertRule, AlertState, Consensus, Location,
};

use crate::error::{AppError, AppResult};
use crate::services::aggregation::AggregationService;
use crate::services::notification::{alert_message, AlertOutbox, NotificationSink};

/// Preset satisfied by the current consensus
#[derive(Debug, Clone, Serialize)]
pub struct Advisory {
    pub preset: AlertPreset,
    pub description: &'static str,
    pub observed_value: f64,
    pub confidence: f64,
}

/// What one scheduler tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub evaluated: usize,
    pub triggered: usize,
    pub rearmed: usize,
    pub failed: usize,
}

pub struct AlertEvaluator {
    rules: RwLock<HashMap<Uuid, AlertRule>>,
    aggregation: Arc<AggregationService>,
    sink: Arc<dyn NotificationSink>,
    outbox: AlertOutbox,
    cooldown: Duration,
}

impl AlertEvaluator {
    pub fn new(
        aggregation: Arc<AggregationService>,
        sink: Arc<dyn NotificationSink>,
        cooldown_secs: i64,
    ) -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            aggregation,
            sink,
            outbox: AlertOutbox::new(),
            cooldown: Duration::seconds(cooldown_secs.max(0)),
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn subscribe_preset(
        &self,
        user_id: &str,
        location: Location,
        preset: AlertPreset,
    ) -> AppResult<AlertRule> {
        self.subscribe(user_id, location, preset.condition(), Some(preset))
            .await
    }

    pub async fn subscribe_custom(
        &self,
        user_id: &str,
        location: Location,
        condition: AlertCondition,
    ) -> AppResult<AlertRule> {
        shared::validate_threshold(condition.metric, condition.threshold)
            .map_err(|msg| AppError::validation("threshold", msg))?;
        self.subscribe(user_id, location, condition, None).await
    }

    async fn subscribe(
        &self,
        user_id: &str,
        location: Location,
        condition: AlertCondition,
        preset: Option<AlertPreset>,
    ) -> AppResult<AlertRule> {
        let mut rules = self.rules.write().await;

        let duplicate = rules.values().any(|r| {
            r.is_active()
                && r.user_id == user_id
                && r.location == location
                && r.condition == condition
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "Already subscribed to '{}' at {}",
                condition,
                location.label()
            )));
        }

        let rule = AlertRule::new(user_id, location, condition, preset);
        tracing::info!(rule_id = %rule.id, user_id = %user_id, "Alert subscription created: {}", rule.describe());
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    /// Cancel a rule owned by `user_id`; the rule is kept for history
    pub async fn cancel(&self, user_id: &str, rule_id: Uuid, now: DateTime<Utc>) -> AppResult<AlertRule> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&rule_id)
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Alert subscription".to_string()))?;

        if !rule.is_active() {
            return Err(AppError::Conflict("Alert subscription is already cancelled".into()));
        }
        rule.state = AlertState::Cancelled { cancelled_at: now };
        tracing::info!(rule_id = %rule_id, "Alert subscription cancelled");
        Ok(rule.clone())
    }

    pub async fn rules_for_user(&self, user_id: &str) -> Vec<AlertRule> {
        let rules = self.rules.read().await;
        let mut owned: Vec<AlertRule> = rules
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|r| r.created_at);
        owned
    }

    pub async fn rule(&self, rule_id: Uuid) -> Option<AlertRule> {
        self.rules.read().await.get(&rule_id).cloned()
    }

    pub async fn events_for_user(&self, user_id: &str) -> Vec<AlertEvent> {
        self.outbox.for_user(user_id).await
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Every preset the current consensus at `location` satisfies
    pub async fn advisories(&self, location: &Location) -> AppResult<Vec<Advisory>> {
        let consensus = self.aggregation.current_consensus(location).await?;
        Ok(AlertPreset::ALL
            .iter()
            .filter_map(|preset| {
                let condition = preset.condition();
                let observed_value = condition.evaluate(&consensus)?;
                Some(Advisory {
                    preset: *preset,
                    description: preset.description(),
                    observed_value,
                    confidence: consensus
                        .metric(condition.metric)
                        .map(|m| m.confidence)
                        .unwrap_or_default(),
                })
            })
            .collect())
    }

    /// Run one scheduler pass at `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        // Re-arm rules whose cooldown has passed; they wait for the next tick
        let armed: Vec<AlertRule> = {
            let mut rules = self.rules.write().await;
            let mut armed = Vec::new();
            for rule in rules.values_mut() {
                match rule.state {
                    AlertState::Triggered { cooldown_until } if now >= cooldown_until => {
                        rule.state = AlertState::Active;
                        report.rearmed += 1;
                        tracing::debug!(rule_id = %rule.id, "Alert rule re-armed");
                    }
                    AlertState::Active => armed.push(rule.clone()),
                    _ => {}
                }
            }
            armed
        };

        let mut snapshots: HashMap<shared::LocationKey, Consensus> = HashMap::new();
        for rule in armed {
            report.evaluated += 1;
            let key = rule.location.key();
            let consensus = match snapshots.get(&key) {
                Some(c) => c.clone(),
                None => match self.aggregation.current_consensus(&rule.location).await {
                    Ok(c) => {
                        snapshots.insert(key, c.clone());
                        c
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(rule_id = %rule.id, "Alert evaluation skipped: {}", e);
                        continue;
                    }
                },
            };

            let Some(observed_value) = rule.condition.evaluate(&consensus) else {
                continue;
            };
            if self.fire(&rule, &consensus, observed_value, now).await {
                report.triggered += 1;
            }
        }

        if report.triggered > 0 || report.failed > 0 {
            tracing::info!(
                evaluated = report.evaluated,
                triggered = report.triggered,
                rearmed = report.rearmed,
                failed = report.failed,
                "Alert tick completed"
            );
        }
        report
    }

    /// Emit an event and move the rule into cooldown.
    ///
    /// Returns false when the rule changed state since the snapshot.
    async fn fire(
        &self,
        rule: &AlertRule,
        consensus: &Consensus,
        observed_value: f64,
        now: DateTime<Utc>,
    ) -> bool {
        {
            let mut rules = self.rules.write().await;
            match rules.get_mut(&rule.id) {
                Some(current) if current.state == AlertState::Active => {
                    current.state = AlertState::Triggered {
                        cooldown_until: now + self.cooldown,
                    };
                }
                _ => return false,
            }
        }

        let mut event = AlertEvent {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            user_id: rule.user_id.clone(),
            location: rule.location.clone(),
            condition: rule.condition,
            observed_value,
            confidence: consensus
                .metric(rule.condition.metric)
                .map(|m| m.confidence)
                .unwrap_or_default(),
            consensus_computed_at: consensus.computed_at,
            triggered_at: now,
            delivered: false,
            message: alert_message(
                &rule.location.label(),
                &rule.describe(),
                observed_value,
                rule.condition.metric.unit(),
            ),
        };

        event.delivered = match self.sink.deliver(&event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(rule_id = %rule.id, "Alert delivery failed: {}", e);
                false
            }
        };
        self.outbox.record(event).await;
        true
    }
}
