//! Boss supervisor tests on a paused clock
//!
//! Covers the startup health check and the idle watchdog: fire when idle,
//! defer while a pipeline executes, stay silent after dispose.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{count, drain, wait_for, Harness, ScriptedAgents};
use ticket_coordination::{NewTicket, SchedulerConfig, SchedulerEvent, TicketStatus};

const IDLE_EVENT: &str = "boss:idle_watchdog_triggered";

fn one_minute_watchdog() -> SchedulerConfig {
    SchedulerConfig {
        boss_idle_timeout_minutes: 1,
        boss_startup_delay_secs: 3,
        ..SchedulerConfig::default()
    }
}

/// Test: Health check runs once after the startup delay, then the watchdog fires when idle
#[tokio::test(start_paused = true)]
async fn test_idle_watchdog_fires_when_idle() {
    let h = Harness::new(one_minute_watchdog(), ScriptedAgents::new());
    let mut events = h.bus.subscribe();
    h.scheduler.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.agents.health_checks(), 0);

    let event = wait_for(&mut events, IDLE_EVENT, Duration::from_secs(120)).await;
    match event {
        SchedulerEvent::IdleWatchdogTriggered { idle_minutes, .. } => assert_eq!(idle_minutes, 1),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.agents.health_checks(), 1);
    assert!(h.log.contains("[Boss] Health check: All systems nominal"));
    assert!(h.log.contains("[Boss] Idle for 1 minute(s)"));

    // Re-armed after firing
    wait_for(&mut events, IDLE_EVENT, Duration::from_secs(61)).await;
    assert_eq!(h.agents.health_checks(), 1);
    h.scheduler.dispose();
}

/// Test: The watchdog defers while a pipeline is executing
#[tokio::test(start_paused = true)]
async fn test_idle_watchdog_defers_while_busy() {
    let h = Harness::new(one_minute_watchdog(), ScriptedAgents::gated());
    let mut events = h.bus.subscribe();
    h.scheduler.start().await.unwrap();

    let ticket = h.ticket(NewTicket::new("Coding: long running")).await;
    h.scheduler.admit_ticket(&ticket.id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(count(&drain(&mut events), IDLE_EVENT), 0);
    assert!(h.scheduler.status().general_processing);

    h.agents.open_gate();
    h.scheduler.until_idle().await;
    assert_eq!(h.reload(&ticket).await.status, TicketStatus::Resolved);

    wait_for(&mut events, IDLE_EVENT, Duration::from_secs(120)).await;
    h.scheduler.dispose();
}

/// Test: Nothing fires once the scheduler is disposed
#[tokio::test(start_paused = true)]
async fn test_no_watchdog_after_dispose() {
    let h = Harness::new(one_minute_watchdog(), ScriptedAgents::new());
    let mut events = h.bus.subscribe();
    h.scheduler.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.scheduler.supervisor().watchdog().is_armed());
    h.scheduler.dispose();
    assert!(!h.scheduler.supervisor().is_running());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(count(&drain(&mut events), IDLE_EVENT), 0);
    assert_eq!(h.scheduler.supervisor().watchdog().fired(), 0);
}

/// Test: Dispose during the startup delay skips the health check entirely
#[tokio::test(start_paused = true)]
async fn test_dispose_before_health_check() {
    let h = Harness::new(one_minute_watchdog(), ScriptedAgents::new());
    h.scheduler.start().await.unwrap();
    h.scheduler.dispose();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.agents.health_checks(), 0);
}

/// Test: Lifecycle events refresh the last-activity timestamp
#[tokio::test]
async fn test_activity_events_refresh_last_activity() {
    let h = Harness::new(SchedulerConfig::default(), ScriptedAgents::new());
    h.scheduler.start().await.unwrap();
    let before = h.scheduler.status().last_activity;

    h.bus.publish(SchedulerEvent::TaskCompleted {
        task_id: Some("task-1".into()),
        timestamp: Utc::now(),
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.scheduler.status().last_activity >= before);
    assert!(h.agents.calls().is_empty());
    h.scheduler.dispose();
}

/// Test: The idle event reports the configured minutes, including after a live update
#[tokio::test(start_paused = true)]
async fn test_idle_minutes_follow_config() {
    let config = SchedulerConfig {
        boss_idle_timeout_minutes: 2,
        boss_startup_delay_secs: 0,
        ..SchedulerConfig::default()
    };
    let h = Harness::new(config.clone(), ScriptedAgents::new());
    let mut events = h.bus.subscribe();
    h.scheduler.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(count(&drain(&mut events), IDLE_EVENT), 0);

    match wait_for(&mut events, IDLE_EVENT, Duration::from_secs(60)).await {
        SchedulerEvent::IdleWatchdogTriggered { idle_minutes, .. } => assert_eq!(idle_minutes, 2),
        other => panic!("unexpected event {other:?}"),
    }
    assert!(h.log.contains("[Boss] Idle for 2 minute(s)"));

    h.scheduler.update_config(SchedulerConfig {
        boss_idle_timeout_minutes: 3,
        ..config
    });
    // The countdown already pending keeps its two minutes; the next one uses three
    match wait_for(&mut events, IDLE_EVENT, Duration::from_secs(130)).await {
        SchedulerEvent::IdleWatchdogTriggered { idle_minutes, .. } => assert_eq!(idle_minutes, 2),
        other => panic!("unexpected event {other:?}"),
    }
    match wait_for(&mut events, IDLE_EVENT, Duration::from_secs(190)).await {
        SchedulerEvent::IdleWatchdogTriggered { idle_minutes, .. } => assert_eq!(idle_minutes, 3),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.scheduler.supervisor().watchdog().timeout_minutes(), 3);
    h.scheduler.dispose();
}
