//! Alerts evaluated against live runs, delivered to mock notification endpoints

use anyhow::Result;
use stampede_alerting::{AlertManager, AlertMonitor, NewAlert};
use stampede_config::{AlertingConfig, EngineConfig, HttpConfig, SmsGatewayConfig};
use stampede_core::{
    ChannelType, HttpMethod, LoadTestConfig, Notification, NotificationChannel, Severity,
    TestState,
};
use stampede_engine::LoadTestEngine;
use stampede_notify::NotificationDispatcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn failing_target() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

fn webhook(url: String) -> Notification {
    Notification::new(NotificationChannel::Webhook {
        url,
        method: HttpMethod::Post,
        headers: HashMap::from([("X-Source".to_string(), "stampede".to_string())]),
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_alert_fires_once_and_reaches_every_channel() -> Result<()> {
    let target = failing_target().await;
    let hooks = MockServer::start().await;

    // Slack rejects the message, the webhook and SMS gateway accept it
    Mock::given(method("POST"))
        .and(path("/slack"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&hooks)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "event": "alert.triggered",
            "test_id": "checkout-errors",
            "severity": "critical",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&hooks)
        .await;
    Mock::given(method("POST"))
        .and(path("/sms"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&hooks)
        .await;

    let alerting = AlertingConfig {
        sms: Some(SmsGatewayConfig {
            api_url: format!("{}/sms", hooks.uri()),
            api_key: Some("test-key".to_string()),
            sender: "STAMPEDE".to_string(),
        }),
        ..AlertingConfig::default()
    };
    let dispatcher = Arc::new(NotificationDispatcher::from_config(&alerting)?);
    let manager = Arc::new(AlertManager::new(alerting, dispatcher.clone())?);

    let alert = manager
        .create_alert(NewAlert {
            test_id: "checkout-errors".to_string(),
            name: "Checkout failing".to_string(),
            condition: "error_rate>=50".to_string(),
            cooldown_period: Some(Duration::from_secs(600)),
            severity: Severity::Critical,
            notifications: vec![
                Notification::new(NotificationChannel::Slack {
                    webhook_url: format!("{}/slack", hooks.uri()),
                    channel: Some("#load".to_string()),
                    username: None,
                }),
                webhook(format!("{}/hook", hooks.uri())),
                Notification::new(NotificationChannel::Sms {
                    phone_numbers: vec!["+15550100".to_string()],
                }),
            ],
            is_active: true,
            ..NewAlert::default()
        })
        .await?;

    let http = HttpConfig {
        timeout: Duration::from_secs(5),
        ..HttpConfig::default()
    };
    let engine = LoadTestEngine::with_http(&http, EngineConfig::default())?;
    let config = LoadTestConfig::new(format!("{}/checkout", target.uri()), 3)
        .with_duration(Duration::from_millis(1500))
        .with_request_delay(Duration::from_millis(50));
    engine.start_load_test("checkout-errors", config).await?;

    let monitor = AlertMonitor::watch(
        engine.clone(),
        manager.clone(),
        "checkout-errors",
        Duration::from_millis(200),
    );
    let fired = monitor.await?;

    // Evaluated several times while failing, fired once thanks to the cooldown
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].alert_id, alert.id);
    assert_eq!(fired[0].value, 100.0);
    assert!(fired[0].message.contains("Checkout failing"));

    let alert = manager.get_alert(alert.id).await?;
    assert_eq!(alert.trigger_count, 1);
    assert!(alert.last_triggered.is_some());

    let status = engine.get_test_status("checkout-errors").await?;
    assert!(status.is_terminal());
    assert_ne!(status.status, TestState::Failed);

    // One failing channel did not stop the other two
    let aggregate = dispatcher.metrics().get_aggregate_metrics().await;
    assert_eq!(aggregate.total_deliveries, 3);
    assert_eq!(aggregate.successful_deliveries, 2);
    assert_eq!(aggregate.failed_deliveries, 1);
    let slack = dispatcher
        .metrics()
        .get_channel_metrics(ChannelType::Slack)
        .await
        .map(|m| m.failure_count())
        .unwrap_or_default();
    assert_eq!(slack, 1);

    let stats = manager.get_alert_stats(Some("checkout-errors")).await;
    assert_eq!(stats.total_triggers, 1);
    assert_eq!(stats.unresolved_triggers, 1);
    assert_eq!(stats.triggers_by_severity.get(&Severity::Critical), Some(&1));

    manager.resolve_trigger(fired[0].id).await?;
    assert_eq!(
        manager
            .get_alert_stats(Some("checkout-errors"))
            .await
            .unresolved_triggers,
        0
    );

    hooks.verify().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_healthy_run_fires_nothing() -> Result<()> {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&hooks)
        .await;

    let dispatcher = Arc::new(NotificationDispatcher::from_config(&AlertingConfig::default())?);
    let manager = Arc::new(AlertManager::new(AlertingConfig::default(), dispatcher)?);
    manager
        .create_alert(NewAlert {
            test_id: "healthy-run".to_string(),
            name: "Any error".to_string(),
            condition: "failed_requests>0".to_string(),
            notifications: vec![webhook(format!("{}/hook", hooks.uri()))],
            is_active: true,
            ..NewAlert::default()
        })
        .await?;

    let engine = LoadTestEngine::with_http(&HttpConfig::default(), EngineConfig::default())?;
    let config = LoadTestConfig::new(format!("{}/", target.uri()), 2)
        .with_duration(Duration::from_millis(600))
        .with_request_delay(Duration::from_millis(50));
    engine.start_load_test("healthy-run", config).await?;

    let fired = AlertMonitor::watch(
        engine.clone(),
        manager.clone(),
        "healthy-run",
        Duration::from_millis(100),
    )
    .await?;
    assert!(fired.is_empty());
    assert!(manager.get_alert_triggers("healthy-run").await.is_empty());

    hooks.verify().await;
    Ok(())
}
