//! Scheduler integration tests: warm start, manual triggers, and trigger
//! coalescing behind an in-flight run.

mod common;

use std::time::Duration;

use tempfile::TempDir;

use common::ScriptedGateway;
use marketpulse::core::{Scheduler, TriggerStatus};
use marketpulse::domain::{keys, PhaseName};
use marketpulse::store::ArtifactStore;

async fn wait_for_runs(store: &ArtifactStore, phase: PhaseName, at_least: usize) {
    for _ in 0..100 {
        let count = store
            .runs()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.phase == phase)
            .count();
        if count >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("phase {} never reached {} runs", phase, at_least);
}

#[tokio::test]
async fn test_warm_start_runs_each_phase_once() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let mut config = common::test_config(temp.path());
    config.warm_start = true;
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    let scheduler = Scheduler::new(executor);
    scheduler.start();

    for phase in PhaseName::ALL {
        wait_for_runs(&store, phase, 1).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // One warm run per phase, nothing queued behind it
    let runs = store.runs().await.unwrap();
    for phase in PhaseName::ALL {
        assert_eq!(
            runs.iter().filter(|r| r.phase == phase).count(),
            1,
            "phase {} should have exactly one warm run",
            phase
        );
    }
}

#[tokio::test]
async fn test_without_warm_start_nothing_runs() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    let scheduler = Scheduler::new(executor);
    scheduler.start();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(store.runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_trigger_runs_the_phase() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::ok();
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    let scheduler = Scheduler::new(executor);
    scheduler.start();

    assert_eq!(
        scheduler.trigger(PhaseName::IndicesFetch),
        TriggerStatus::Accepted
    );

    wait_for_runs(&store, PhaseName::IndicesFetch, 1).await;
    assert!(store.get(keys::INDICES_LATEST).await.unwrap().is_some());
}

#[tokio::test]
async fn test_triggers_during_a_run_coalesce_to_one_follow_up() {
    let temp = TempDir::new().unwrap();
    let gateway = ScriptedGateway::with_delay(Duration::from_millis(300));
    let config = common::test_config(temp.path());
    let (store, executor) = common::test_executor(&temp, gateway, config).await;

    let scheduler = Scheduler::new(executor);
    scheduler.start();

    assert_eq!(
        scheduler.trigger(PhaseName::IndicesFetch),
        TriggerStatus::Accepted
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Both land while the first run is still in flight; the second permit
    // is absorbed into the first
    assert_eq!(
        scheduler.trigger(PhaseName::IndicesFetch),
        TriggerStatus::AlreadyRunning
    );
    assert_eq!(
        scheduler.trigger(PhaseName::IndicesFetch),
        TriggerStatus::AlreadyRunning
    );

    wait_for_runs(&store, PhaseName::IndicesFetch, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let runs: Vec<_> = store
        .runs()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.phase == PhaseName::IndicesFetch)
        .collect();
    assert_eq!(runs.len(), 2, "two pending triggers must coalesce into one");

    // The follow-up never overlaps the first run
    assert!(runs[1].started_at >= runs[0].finished_at);
}
