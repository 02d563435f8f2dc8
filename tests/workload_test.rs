//! Integration tests for workload aggregation and candidate ranking
//!
//! These tests validate:
//! - Active counts per queue and the availability score bounds
//! - Completed-today counting against the configured workday
//! - Ranking order and the overload cap under randomized loads

mod common;

use chrono::Duration;
use common::{assigned, load_worker, loading, pick, setup, tenant, wid, WAREHOUSE};
use rand::Rng;
use warehouse_dispatch::core::{DispatchError, WorkerRole};
use warehouse_dispatch::util::clock::now;
use warehouse_dispatch::util::ids::WarehouseId;

// ============================================================================
// SNAPSHOTS
// ============================================================================

#[tokio::test]
async fn test_idle_worker_scores_full_availability() {
    let env = setup(&["acme"], &[("acme", "w1")]).await;
    let snapshot = env
        .dispatcher
        .within(&tenant("acme"), env.dispatcher.compute_workload(&wid("w1")))
        .await
        .unwrap();
    assert_eq!(snapshot.total_tasks, 0);
    assert_eq!(snapshot.completed_today, 0);
    assert_eq!(snapshot.availability_score, 100);
}

#[tokio::test]
async fn test_score_floors_at_zero() {
    let env = setup(&["acme"], &[("acme", "w1")]).await;
    let d = &env.dispatcher;
    let snapshot = d
        .within(&tenant("acme"), async {
            load_worker(d, "w1", 12).await;
            d.compute_workload(&wid("w1")).await
        })
        .await
        .unwrap();
    assert_eq!(snapshot.put_away_tasks, 12);
    assert_eq!(snapshot.total_tasks, 12);
    assert_eq!(snapshot.availability_score, 0);
}

#[tokio::test]
async fn test_counts_span_every_queue() {
    let env = setup(&["acme"], &[("acme", "w1"), ("acme", "w2")]).await;
    let d = &env.dispatcher;
    let snapshot = d
        .within(&tenant("acme"), async {
            assigned(d, pick("sku-1", "A-01", 1), "w1").await;
            assigned(d, common::put_away(), "w1").await;
            assigned(d, common::cycle_count(4), "w1").await;
            let dock = d.create_task(loading(2)).await?;
            d.assign_worker(dock.id, &wid("w1")).await?;
            d.compute_workload(&wid("w1")).await
        })
        .await
        .unwrap();
    assert_eq!(snapshot.pick_tasks, 1);
    assert_eq!(snapshot.put_away_tasks, 1);
    assert_eq!(snapshot.count_tasks, 1);
    assert_eq!(snapshot.cross_dock_tasks, 0);
    assert_eq!(snapshot.loading_tasks, 1);
    assert_eq!(snapshot.total_tasks, 4);
    assert_eq!(snapshot.availability_score, 60);
}

#[tokio::test]
async fn test_completed_today_resets_next_day() {
    let env = setup(&["acme"], &[("acme", "w1")]).await;
    let d = &env.dispatcher;
    let (today, tomorrow) = d
        .within(&tenant("acme"), async {
            let task = assigned(d, pick("sku-1", "A-01", 1), "w1").await;
            d.start(task, &wid("w1")).await?;
            d.complete(task, &wid("w1")).await?;
            let today = d.compute_workload(&wid("w1")).await?;
            let tomorrow = d
                .compute_workload_at(&wid("w1"), now() + Duration::days(1))
                .await?;
            Ok((today, tomorrow))
        })
        .await
        .unwrap();
    assert_eq!(today.total_tasks, 0);
    assert_eq!(today.completed_today, 1);
    assert_eq!(tomorrow.completed_today, 0);
}

#[tokio::test]
async fn test_unknown_worker_is_not_found() {
    let env = setup(&["acme"], &[]).await;
    let err = env
        .dispatcher
        .within(&tenant("acme"), env.dispatcher.compute_workload(&wid("ghost")))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound { entity: "worker", .. }));
}

// ============================================================================
// RANKING
// ============================================================================

#[tokio::test]
async fn test_ranking_is_least_loaded_first_under_random_loads() {
    let names: Vec<String> = (0..10).map(|i| format!("w{i:02}")).collect();
    let pairs: Vec<(&str, &str)> = names.iter().map(|n| ("acme", n.as_str())).collect();
    let env = setup(&["acme"], &pairs).await;
    let d = &env.dispatcher;
    let cap = d.config().overload_cap;

    let mut rng = rand::rng();
    let loads: Vec<usize> = names.iter().map(|_| rng.random_range(0..12)).collect();
    let ranked = d
        .within(&tenant("acme"), async {
            for (name, load) in names.iter().zip(&loads) {
                load_worker(d, name, *load).await;
            }
            d.list_available_workers(&WarehouseId::from(WAREHOUSE), None, None)
                .await
        })
        .await
        .unwrap();

    let expected = loads.iter().filter(|l| (**l as u64) < u64::from(cap)).count();
    assert_eq!(ranked.len(), expected);
    for pair in ranked.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.workload.total_tasks, &a.worker.id) < (b.workload.total_tasks, &b.worker.id),
            "{} ({}) ranked before {} ({})",
            a.worker.id,
            a.workload.total_tasks,
            b.worker.id,
            b.workload.total_tasks
        );
        assert!(a.workload.availability_score >= b.workload.availability_score);
    }
}

#[tokio::test]
async fn test_role_and_cap_overrides() {
    let env = setup(&["acme"], &[("acme", "w1"), ("acme", "w2")]).await;
    env.store.insert_worker(warehouse_dispatch::core::Worker {
        id: "boss".into(),
        tenant_id: "acme".into(),
        warehouse_id: WAREHOUSE.into(),
        role: WorkerRole::Supervisor,
    });
    let d = &env.dispatcher;
    let (floor, supervisors) = d
        .within(&tenant("acme"), async {
            load_worker(d, "w1", 2).await;
            let floor = d
                .list_available_workers(&WarehouseId::from(WAREHOUSE), None, Some(2))
                .await?;
            let supervisors = d
                .list_available_workers(&WarehouseId::from(WAREHOUSE), Some(WorkerRole::Supervisor), None)
                .await?;
            Ok((floor, supervisors))
        })
        .await
        .unwrap();
    assert_eq!(floor.len(), 1);
    assert_eq!(floor[0].worker.id, wid("w2"));
    assert_eq!(supervisors.len(), 1);
    assert_eq!(supervisors[0].worker.id, wid("boss"));
}
