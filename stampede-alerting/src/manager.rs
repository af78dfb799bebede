//! Alert, trigger and template lifecycle with per-alert cooldown

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use stampede_config::AlertingConfig;
use stampede_core::{
    validate_test_id, Alert, AlertId, AlertTemplate, AlertTrigger, ComparisonOperator, EntityKind,
    Notification, RealTimeMetrics, Result, Severity, StampedeError, TemplateId, TriggerId,
    ValidationError,
};
use stampede_notify::{AlertNotifier, TemplateEngine};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::evaluator::{extract_metric_value, is_known_metric, parse_condition};

/// Request to create an alert.
///
/// Either `condition` (e.g. `error_rate>=5`) or all of `metric`, `operator`
/// and `threshold` must be given. Explicit fields take precedence over the
/// parsed condition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAlert {
    #[serde(default)]
    pub test_id: String,
    pub name: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub operator: Option<ComparisonOperator>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Falls back to the configured default cooldown
    #[serde(default, with = "humantime_serde")]
    pub cooldown_period: Option<Duration>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewAlert {
    /// Check name and condition without creating anything. The test ID is
    /// not checked, so requests can be validated before one is assigned.
    pub fn validate(&self) -> Result<()> {
        require_name(&self.name)?;
        resolve_condition(
            &self.condition,
            self.metric.clone(),
            self.operator,
            self.threshold,
        )?;
        Ok(())
    }
}

/// Partial alert update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertUpdate {
    pub name: Option<String>,
    pub condition: Option<String>,
    pub metric: Option<String>,
    pub operator: Option<ComparisonOperator>,
    pub threshold: Option<f64>,
    pub notifications: Option<Vec<Notification>>,
    #[serde(default, with = "humantime_serde")]
    pub cooldown_period: Option<Duration>,
    pub severity: Option<Severity>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Request to create an alert template
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub operator: Option<ComparisonOperator>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default, with = "humantime_serde")]
    pub cooldown_period: Option<Duration>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub metric: Option<String>,
    pub operator: Option<ComparisonOperator>,
    pub threshold: Option<f64>,
    #[serde(default, with = "humantime_serde")]
    pub cooldown_period: Option<Duration>,
    pub severity: Option<Severity>,
    pub tags: Option<Vec<String>>,
}

/// Alert counts, for one test or across all tests
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertStats {
    pub total_alerts: usize,
    pub active_alerts: usize,
    pub total_triggers: usize,
    pub unresolved_triggers: usize,
    pub triggers_by_severity: BTreeMap<Severity, usize>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
struct ResolvedCondition {
    condition: String,
    metric: String,
    operator: ComparisonOperator,
    threshold: f64,
}

/// Fill metric, operator and threshold from `condition` where not given
/// explicitly, then rebuild the condition text from the final triple.
fn resolve_condition(
    condition: &str,
    metric: Option<String>,
    operator: Option<ComparisonOperator>,
    threshold: Option<f64>,
) -> Result<ResolvedCondition> {
    let condition = condition.trim();
    let parsed = if condition.is_empty() {
        None
    } else {
        Some(parse_condition(condition)?)
    };

    let metric = metric
        .or_else(|| parsed.as_ref().map(|p| p.metric.clone()))
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let operator = operator.or_else(|| parsed.as_ref().map(|p| p.operator));
    let threshold = threshold.or_else(|| parsed.as_ref().map(|p| p.threshold));

    let (Some(metric), Some(operator), Some(threshold)) = (metric, operator, threshold) else {
        return Err(ValidationError::new(
            "condition",
            condition,
            "required",
            "either a condition or metric, operator and threshold are required",
        )
        .into());
    };

    if !is_known_metric(&metric) {
        return Err(StampedeError::unsupported(format!(
            "unknown metric: '{}'",
            metric
        )));
    }
    if !threshold.is_finite() {
        return Err(ValidationError::new(
            "threshold",
            threshold,
            "finite",
            "threshold must be a finite number",
        )
        .into());
    }

    Ok(ResolvedCondition {
        condition: format!("{}{}{}", metric, operator, threshold),
        metric,
        operator,
        threshold,
    })
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::new("name", name, "required", "name is required").into());
    }
    Ok(name.to_string())
}

/// Values available to the trigger message template
#[derive(Serialize)]
struct MessageContext<'a> {
    alert_name: &'a str,
    test_id: &'a str,
    metric: &'a str,
    operator: &'static str,
    threshold: String,
    value: String,
    severity: &'static str,
}

#[derive(Default)]
struct AlertStore {
    alerts: HashMap<AlertId, Alert>,
    triggers: Vec<AlertTrigger>,
    templates: HashMap<TemplateId, AlertTemplate>,
}

/// Owns alerts, their trigger log and templates.
///
/// An alert fires at most once per cooldown period no matter how often it is
/// evaluated. Firings are handed to the notifier after the store lock is
/// released; delivery failures never fail an evaluation.
pub struct AlertManager {
    store: RwLock<AlertStore>,
    notifier: Arc<dyn AlertNotifier>,
    config: AlertingConfig,
    templates: TemplateEngine,
}

impl AlertManager {
    pub fn new(config: AlertingConfig, notifier: Arc<dyn AlertNotifier>) -> Result<Self> {
        let templates = TemplateEngine::new();
        templates.validate(&config.message_template).map_err(|e| {
            ValidationError::new(
                "message_template",
                &config.message_template,
                "template",
                e.to_string(),
            )
        })?;

        Ok(Self {
            store: RwLock::new(AlertStore::default()),
            notifier,
            config,
            templates,
        })
    }

    pub fn config(&self) -> &AlertingConfig {
        &self.config
    }

    pub async fn create_alert(&self, request: NewAlert) -> Result<Alert> {
        validate_test_id(&request.test_id)?;
        let name = require_name(&request.name)?;
        let resolved = resolve_condition(
            &request.condition,
            request.metric,
            request.operator,
            request.threshold,
        )?;

        let now = Utc::now();
        let alert = Alert {
            id: AlertId::new(),
            test_id: request.test_id,
            name,
            condition: resolved.condition,
            threshold: resolved.threshold,
            operator: resolved.operator,
            metric: resolved.metric,
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
            last_triggered: None,
            trigger_count: 0,
            notifications: request.notifications,
            cooldown_period: request
                .cooldown_period
                .unwrap_or(self.config.default_cooldown),
            severity: request.severity,
            tags: request.tags,
        };

        info!(
            alert_id = %alert.id,
            test_id = %alert.test_id,
            condition = %alert.condition,
            "Created alert"
        );
        self.store
            .write()
            .await
            .alerts
            .insert(alert.id, alert.clone());
        Ok(alert)
    }

    pub async fn get_alert(&self, alert_id: AlertId) -> Result<Alert> {
        self.store
            .read()
            .await
            .alerts
            .get(&alert_id)
            .cloned()
            .ok_or_else(|| StampedeError::not_found(EntityKind::Alert, alert_id))
    }

    /// Apply a partial update. Nothing changes if any field is rejected.
    pub async fn update_alert(&self, alert_id: AlertId, update: AlertUpdate) -> Result<Alert> {
        let mut store = self.store.write().await;
        let alert = store
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Alert, alert_id))?;

        let mut updated = alert.clone();
        if let Some(name) = update.name {
            updated.name = require_name(&name)?;
        }

        let touches_condition = update.condition.is_some()
            || update.metric.is_some()
            || update.operator.is_some()
            || update.threshold.is_some();
        if touches_condition {
            let resolved = match update.condition {
                Some(condition) => {
                    resolve_condition(&condition, update.metric, update.operator, update.threshold)?
                }
                None => resolve_condition(
                    "",
                    Some(update.metric.unwrap_or(updated.metric.clone())),
                    Some(update.operator.unwrap_or(updated.operator)),
                    Some(update.threshold.unwrap_or(updated.threshold)),
                )?,
            };
            updated.condition = resolved.condition;
            updated.metric = resolved.metric;
            updated.operator = resolved.operator;
            updated.threshold = resolved.threshold;
        }

        if let Some(notifications) = update.notifications {
            updated.notifications = notifications;
        }
        if let Some(cooldown) = update.cooldown_period {
            updated.cooldown_period = cooldown;
        }
        if let Some(severity) = update.severity {
            updated.severity = severity;
        }
        if let Some(tags) = update.tags {
            updated.tags = tags;
        }
        if let Some(is_active) = update.is_active {
            updated.is_active = is_active;
        }
        updated.updated_at = Utc::now();

        *alert = updated.clone();
        debug!(alert_id = %alert_id, "Updated alert");
        Ok(updated)
    }

    /// Remove an alert. Its past triggers stay in the log.
    pub async fn delete_alert(&self, alert_id: AlertId) -> Result<Alert> {
        let removed = self
            .store
            .write()
            .await
            .alerts
            .remove(&alert_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Alert, alert_id))?;
        info!(alert_id = %alert_id, test_id = %removed.test_id, "Deleted alert");
        Ok(removed)
    }

    /// All alerts, oldest first
    pub async fn list_alerts(&self) -> Vec<Alert> {
        let store = self.store.read().await;
        sorted_by_creation(store.alerts.values().cloned().collect())
    }

    pub async fn get_alerts_for_test(&self, test_id: &str) -> Vec<Alert> {
        let store = self.store.read().await;
        sorted_by_creation(
            store
                .alerts
                .values()
                .filter(|alert| alert.test_id == test_id)
                .cloned()
                .collect(),
        )
    }

    /// Evaluate every active alert scoped to `test_id` against `metrics`.
    ///
    /// Alerts still in cooldown are skipped. An alert whose metric cannot be
    /// read is logged and skipped. Returns the triggers created by this call.
    pub async fn evaluate_alerts(
        &self,
        test_id: &str,
        metrics: &RealTimeMetrics,
    ) -> Vec<AlertTrigger> {
        self.evaluate_at(test_id, metrics, Utc::now()).await
    }

    async fn evaluate_at(
        &self,
        test_id: &str,
        metrics: &RealTimeMetrics,
        now: DateTime<Utc>,
    ) -> Vec<AlertTrigger> {
        let mut fired: Vec<(Alert, AlertTrigger)> = Vec::new();
        {
            let mut store = self.store.write().await;
            let AlertStore {
                alerts, triggers, ..
            } = &mut *store;

            for alert in alerts
                .values_mut()
                .filter(|alert| alert.is_active && alert.test_id == test_id)
            {
                if alert.in_cooldown(now) {
                    debug!(alert_id = %alert.id, test_id, "Alert in cooldown, skipping");
                    continue;
                }

                let value = match extract_metric_value(&alert.metric, metrics) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(alert_id = %alert.id, test_id, error = %e, "Cannot evaluate alert");
                        continue;
                    }
                };
                if !alert.operator.compare(value, alert.threshold) {
                    continue;
                }

                let trigger = AlertTrigger {
                    id: TriggerId::new(),
                    alert_id: alert.id,
                    test_id: test_id.to_string(),
                    triggered_at: now,
                    value,
                    threshold: alert.threshold,
                    message: self.render_message(alert, value),
                    is_resolved: false,
                };
                alert.last_triggered = Some(now);
                alert.trigger_count += 1;

                info!(
                    alert_id = %alert.id,
                    test_id,
                    severity = %alert.severity,
                    value,
                    threshold = alert.threshold,
                    "Alert triggered"
                );
                triggers.push(trigger.clone());
                fired.push((alert.clone(), trigger));
            }
        }

        join_all(
            fired
                .iter()
                .map(|(alert, trigger)| self.notifier.notify(alert, trigger)),
        )
        .await;

        fired.into_iter().map(|(_, trigger)| trigger).collect()
    }

    fn render_message(&self, alert: &Alert, value: f64) -> String {
        let context = MessageContext {
            alert_name: &alert.name,
            test_id: &alert.test_id,
            metric: &alert.metric,
            operator: alert.operator.as_str(),
            threshold: alert.threshold.to_string(),
            value: format!("{:.2}", value),
            severity: alert.severity.as_str(),
        };
        match self.templates.render(&self.config.message_template, &context) {
            Ok(message) => message,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Falling back to default alert message");
                format!(
                    "Alert '{}' triggered: {} is {:.2} ({} {})",
                    alert.name, alert.metric, value, alert.operator, alert.threshold
                )
            }
        }
    }

    /// Triggers for one test, in firing order
    pub async fn get_alert_triggers(&self, test_id: &str) -> Vec<AlertTrigger> {
        self.store
            .read()
            .await
            .triggers
            .iter()
            .filter(|trigger| trigger.test_id == test_id)
            .cloned()
            .collect()
    }

    pub async fn get_triggers_for_alert(&self, alert_id: AlertId) -> Vec<AlertTrigger> {
        self.store
            .read()
            .await
            .triggers
            .iter()
            .filter(|trigger| trigger.alert_id == alert_id)
            .cloned()
            .collect()
    }

    pub async fn resolve_trigger(&self, trigger_id: TriggerId) -> Result<AlertTrigger> {
        let mut store = self.store.write().await;
        let trigger = store
            .triggers
            .iter_mut()
            .find(|trigger| trigger.id == trigger_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::AlertTrigger, trigger_id))?;
        trigger.is_resolved = true;
        Ok(trigger.clone())
    }

    /// Counts over one test's alerts, or over everything when `test_id` is `None`.
    /// Triggers of deleted alerts are counted but carry no severity.
    pub async fn get_alert_stats(&self, test_id: Option<&str>) -> AlertStats {
        let store = self.store.read().await;
        let in_scope = |id: &str| test_id.map_or(true, |wanted| wanted == id);

        let mut stats = AlertStats::default();
        for alert in store.alerts.values().filter(|a| in_scope(&a.test_id)) {
            stats.total_alerts += 1;
            if alert.is_active {
                stats.active_alerts += 1;
            }
        }

        for trigger in store.triggers.iter().filter(|t| in_scope(&t.test_id)) {
            stats.total_triggers += 1;
            if !trigger.is_resolved {
                stats.unresolved_triggers += 1;
            }
            if let Some(alert) = store.alerts.get(&trigger.alert_id) {
                *stats.triggers_by_severity.entry(alert.severity).or_default() += 1;
            }
        }

        stats
    }

    pub async fn create_template(&self, request: NewTemplate) -> Result<AlertTemplate> {
        let name = require_name(&request.name)?;
        let resolved = resolve_condition(
            &request.condition,
            request.metric,
            request.operator,
            request.threshold,
        )?;

        let now = Utc::now();
        let template = AlertTemplate {
            id: TemplateId::new(),
            name,
            description: request.description,
            condition: resolved.condition,
            threshold: resolved.threshold,
            operator: resolved.operator,
            metric: resolved.metric,
            cooldown_period: request
                .cooldown_period
                .unwrap_or(self.config.default_cooldown),
            severity: request.severity,
            tags: request.tags,
            created_at: now,
            updated_at: now,
        };

        debug!(template_id = %template.id, name = %template.name, "Created alert template");
        self.store
            .write()
            .await
            .templates
            .insert(template.id, template.clone());
        Ok(template)
    }

    pub async fn get_template(&self, template_id: TemplateId) -> Result<AlertTemplate> {
        self.store
            .read()
            .await
            .templates
            .get(&template_id)
            .cloned()
            .ok_or_else(|| StampedeError::not_found(EntityKind::AlertTemplate, template_id))
    }

    pub async fn update_template(
        &self,
        template_id: TemplateId,
        update: TemplateUpdate,
    ) -> Result<AlertTemplate> {
        let mut store = self.store.write().await;
        let template = store
            .templates
            .get_mut(&template_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::AlertTemplate, template_id))?;

        let mut updated = template.clone();
        if let Some(name) = update.name {
            updated.name = require_name(&name)?;
        }
        if let Some(description) = update.description {
            updated.description = description;
        }

        let resolved = match update.condition {
            Some(condition) => Some(resolve_condition(
                &condition,
                update.metric,
                update.operator,
                update.threshold,
            )?),
            None if update.metric.is_some()
                || update.operator.is_some()
                || update.threshold.is_some() =>
            {
                Some(resolve_condition(
                    "",
                    Some(update.metric.unwrap_or(updated.metric.clone())),
                    Some(update.operator.unwrap_or(updated.operator)),
                    Some(update.threshold.unwrap_or(updated.threshold)),
                )?)
            }
            None => None,
        };
        if let Some(resolved) = resolved {
            updated.condition = resolved.condition;
            updated.metric = resolved.metric;
            updated.operator = resolved.operator;
            updated.threshold = resolved.threshold;
        }

        if let Some(cooldown) = update.cooldown_period {
            updated.cooldown_period = cooldown;
        }
        if let Some(severity) = update.severity {
            updated.severity = severity;
        }
        if let Some(tags) = update.tags {
            updated.tags = tags;
        }
        updated.updated_at = Utc::now();

        *template = updated.clone();
        Ok(updated)
    }

    pub async fn delete_template(&self, template_id: TemplateId) -> Result<AlertTemplate> {
        self.store
            .write()
            .await
            .templates
            .remove(&template_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::AlertTemplate, template_id))
    }

    pub async fn list_templates(&self) -> Vec<AlertTemplate> {
        let store = self.store.read().await;
        let mut templates: Vec<AlertTemplate> = store.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    /// Instantiate a template as an alert on `test_id`. The alert is
    /// independent of the template afterwards.
    pub async fn create_alert_from_template(
        &self,
        template_id: TemplateId,
        test_id: &str,
        notifications: Vec<Notification>,
    ) -> Result<Alert> {
        let template = self.get_template(template_id).await?;
        self.create_alert(NewAlert {
            test_id: test_id.to_string(),
            name: template.name,
            condition: template.condition,
            metric: Some(template.metric),
            operator: Some(template.operator),
            threshold: Some(template.threshold),
            notifications,
            cooldown_period: Some(template.cooldown_period),
            severity: template.severity,
            tags: template.tags,
            is_active: true,
        })
        .await
    }
}

fn sorted_by_creation(mut alerts: Vec<Alert>) -> Vec<Alert> {
    alerts.sort_by_key(|alert| alert.created_at);
    alerts
}
