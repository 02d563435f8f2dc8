//! Cross-queue workload aggregation.
//!
//! A worker's load is the number of active items across all five queues.
//! The per-queue "active" status sets come from [`TaskKind::active_statuses`]
//! and [`AssignmentStatus::ACTIVE`]; the assignment engine ranks candidates
//! with the same numbers.
//!
//! Snapshots are read-only and not transactional: the sub-queries run
//! concurrently and may straddle a completion happening in between.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::core::store::{AssignmentFilter, TaskFilter, TaskStore, WorkerDirectory, WorkerFilter};
use crate::core::task::{AssignmentStatus, TaskKind, Worker, WorkerRole};
use crate::core::DispatchError;
use crate::util::clock::{day_window, now};
use crate::util::ids::{WarehouseId, WorkerId};

/// Point-in-time load of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    /// Worker the snapshot describes.
    pub worker_id: WorkerId,
    /// Active pick tasks.
    pub pick_tasks: u64,
    /// Active put-away tasks.
    pub put_away_tasks: u64,
    /// Active cycle counts.
    pub count_tasks: u64,
    /// Active cross-dock transfers.
    pub cross_dock_tasks: u64,
    /// Active loading assignments.
    pub loading_tasks: u64,
    /// Sum of the five active counts.
    pub total_tasks: u64,
    /// Work finished during the local day.
    pub completed_today: u64,
    /// Spare capacity, 0 to `max_score`.
    pub availability_score: u32,
}

/// A worker together with the load it was ranked by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedWorker {
    /// Directory entry.
    pub worker: Worker,
    /// Load at ranking time.
    pub workload: WorkloadSnapshot,
}

/// Computes workload snapshots through a (tenant-isolated) store.
pub struct WorkloadAggregator<S> {
    store: S,
    config: Arc<DispatchConfig>,
}

impl<S: Clone> Clone for WorkloadAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> WorkloadAggregator<S>
where
    S: TaskStore + WorkerDirectory,
{
    /// Create an aggregator over `store`.
    pub const fn new(store: S, config: Arc<DispatchConfig>) -> Self {
        Self { store, config }
    }

    /// Load of `worker_id` right now.
    pub async fn compute_workload(
        &self,
        worker_id: &WorkerId,
    ) -> Result<WorkloadSnapshot, DispatchError> {
        self.compute_workload_at(worker_id, now()).await
    }

    /// Load of `worker_id`, with `completed_today` measured against the day containing `at`.
    ///
    /// Fails with `NotFound` if the worker does not exist in the current tenant.
    pub async fn compute_workload_at(
        &self,
        worker_id: &WorkerId,
        at: DateTime<Utc>,
    ) -> Result<WorkloadSnapshot, DispatchError> {
        let filter = WorkerFilter {
            id: Some(worker_id.clone()),
            ..WorkerFilter::default()
        };
        if self.store.find_workers(&filter).await?.is_empty() {
            return Err(DispatchError::worker_not_found(worker_id));
        }
        self.snapshot(worker_id, at).await
    }

    async fn active_count(&self, worker_id: &WorkerId, kind: TaskKind) -> Result<u64, DispatchError> {
        if kind.is_multi_assignee() {
            let filter =
                AssignmentFilter::for_worker(worker_id.clone()).statuses(&AssignmentStatus::ACTIVE);
            return self.store.count_assignments(&filter).await;
        }
        let filter = TaskFilter::of_kind(kind)
            .assignee(worker_id.clone())
            .statuses(kind.active_statuses());
        self.store.count_tasks(&filter).await
    }

    async fn completed_count(
        &self,
        worker_id: &WorkerId,
        kind: TaskKind,
        (start, end): (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<u64, DispatchError> {
        if kind.is_multi_assignee() {
            let filter = AssignmentFilter::for_worker(worker_id.clone())
                .statuses(&[AssignmentStatus::Completed])
                .completed_between(start, end);
            return self.store.count_assignments(&filter).await;
        }
        let filter = TaskFilter::of_kind(kind)
            .assignee(worker_id.clone())
            .statuses(kind.done_statuses())
            .completed_between(start, end);
        self.store.count_tasks(&filter).await
    }

    async fn snapshot(
        &self,
        worker_id: &WorkerId,
        at: DateTime<Utc>,
    ) -> Result<WorkloadSnapshot, DispatchError> {
        let window = day_window(at, self.config.utc_offset_minutes);
        let active = async {
            tokio::try_join!(
                self.active_count(worker_id, TaskKind::Pick),
                self.active_count(worker_id, TaskKind::PutAway),
                self.active_count(worker_id, TaskKind::CycleCount),
                self.active_count(worker_id, TaskKind::CrossDock),
                self.active_count(worker_id, TaskKind::Loading),
            )
        };
        let completed = try_join_all(
            TaskKind::ALL
                .into_iter()
                .map(|kind| self.completed_count(worker_id, kind, window)),
        );
        let ((pick, put_away, count, cross_dock, loading), done) =
            tokio::try_join!(active, completed)?;

        let total_tasks = pick + put_away + count + cross_dock + loading;
        Ok(WorkloadSnapshot {
            worker_id: worker_id.clone(),
            pick_tasks: pick,
            put_away_tasks: put_away,
            count_tasks: count,
            cross_dock_tasks: cross_dock,
            loading_tasks: loading,
            total_tasks,
            completed_today: done.iter().sum(),
            availability_score: self.config.availability_score(total_tasks),
        })
    }

    /// Workers in `warehouse_id` below the overload cap, least loaded first.
    ///
    /// `role` defaults to the configured assignable role and `overload_cap`
    /// to the configured cap. Ties are broken by worker id.
    pub async fn list_available_workers(
        &self,
        warehouse_id: &WarehouseId,
        role: Option<WorkerRole>,
        overload_cap: Option<u32>,
    ) -> Result<Vec<RankedWorker>, DispatchError> {
        let cap = u64::from(overload_cap.unwrap_or(self.config.overload_cap));
        let filter = WorkerFilter {
            warehouse_id: Some(warehouse_id.clone()),
            role: Some(role.unwrap_or(self.config.worker_role)),
            ..WorkerFilter::default()
        };
        let workers = self.store.find_workers(&filter).await?;
        let at = now();
        let loads = try_join_all(workers.iter().map(|w| self.snapshot(&w.id, at))).await?;

        let mut ranked: Vec<RankedWorker> = workers
            .into_iter()
            .zip(loads)
            .filter(|(_, load)| load.total_tasks < cap)
            .map(|(worker, workload)| RankedWorker { worker, workload })
            .collect();
        ranked.sort_by(|a, b| {
            a.workload
                .total_tasks
                .cmp(&b.workload.total_tasks)
                .then_with(|| a.worker.id.cmp(&b.worker.id))
        });
        tracing::debug!(
            warehouse = %warehouse_id,
            candidates = ranked.len(),
            cap,
            "ranked available workers"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::isolation::Isolated;
    use crate::core::store::{AssignmentOp, TaskCommit};
    use crate::core::task::{NewTask, TaskDetail, TaskStatus};
    use crate::core::tenant::{scope, TenantContext};
    use crate::infra::store::memory::InMemoryStore;

    fn worker(id: &str) -> Worker {
        Worker {
            id: id.into(),
            tenant_id: "acme".into(),
            warehouse_id: "wh-1".into(),
            role: WorkerRole::WarehouseWorker,
        }
    }

    fn put_away() -> NewTask {
        NewTask::new(
            "wh-1",
            TaskDetail::PutAway {
                item: "sku-1".into(),
                to_location: "B-02".into(),
                quantity: 5,
            },
        )
    }

    async fn assigned_put_away(store: &Isolated<InMemoryStore>, worker: &str) {
        let task = store.create_task(put_away()).await.unwrap();
        store
            .commit(TaskCommit::new(
                &task,
                vec![AssignmentOp::Assign(worker.into())],
                Some(TaskStatus::Assigned),
                now(),
            ))
            .await
            .unwrap();
    }

    fn setup() -> (Isolated<InMemoryStore>, WorkloadAggregator<Isolated<InMemoryStore>>) {
        let backend = InMemoryStore::new();
        for id in ["w1", "w2", "w3"] {
            backend.insert_worker(worker(id));
        }
        let store = Isolated::new(Arc::new(backend));
        let aggregator = WorkloadAggregator::new(store.clone(), Arc::new(DispatchConfig::default()));
        (store, aggregator)
    }

    #[tokio::test]
    async fn test_idle_worker_scores_full() {
        let (_, aggregator) = setup();
        let ctx = TenantContext::begin("acme").unwrap();
        let snap = scope(ctx, aggregator.compute_workload(&"w1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.total_tasks, 0);
        assert_eq!(snap.availability_score, 100);
    }

    #[tokio::test]
    async fn test_unknown_worker_not_found() {
        let (_, aggregator) = setup();
        let ctx = TenantContext::begin("acme").unwrap();
        let err = scope(ctx, aggregator.compute_workload(&"ghost".into()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { entity: "worker", .. }));
    }

    #[tokio::test]
    async fn test_ranking_orders_by_load_then_id() {
        let (store, aggregator) = setup();
        let ctx = TenantContext::begin("acme").unwrap();
        let ranked = scope(ctx, async {
            assigned_put_away(&store, "w1").await;
            assigned_put_away(&store, "w1").await;
            assigned_put_away(&store, "w3").await;
            aggregator
                .list_available_workers(&"wh-1".into(), None, None)
                .await
                .unwrap()
        })
        .await
        .unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.worker.id.as_str()).collect();
        assert_eq!(order, vec!["w2", "w3", "w1"]);
        assert_eq!(ranked[2].workload.put_away_tasks, 2);
        assert_eq!(ranked[2].workload.availability_score, 80);
    }

    #[tokio::test]
    async fn test_overload_cap_filters_busy_workers() {
        let (store, aggregator) = setup();
        let ctx = TenantContext::begin("acme").unwrap();
        let ranked = scope(ctx, async {
            assigned_put_away(&store, "w1").await;
            assigned_put_away(&store, "w1").await;
            aggregator
                .list_available_workers(&"wh-1".into(), None, Some(2))
                .await
                .unwrap()
        })
        .await
        .unwrap();
        assert!(ranked.iter().all(|r| r.worker.id.as_str() != "w1"));
        assert_eq!(ranked.len(), 2);
    }
}
