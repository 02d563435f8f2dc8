//! # Warehouse Dispatch
//!
//! Tenant-isolated workload balancing and task assignment for warehouse
//! operations.
//!
//! A warehouse runs five independent task queues: picking, put-away, cycle
//! counting, cross-dock transfers and dock loading. This crate is the part of
//! the back end that decides who does what:
//!
//! - **Tenant isolation**: every store call runs inside a tenant unit of work
//!   ([`core::tenant::scope`]) and goes through [`core::isolation::Isolated`],
//!   which injects or enforces the tenant filter and fails closed without one.
//! - **Workload balancing**: [`core::workload::WorkloadAggregator`] counts a
//!   worker's active items across all five queues and ranks candidates.
//! - **Assignment**: [`core::assignment::AssignmentEngine`] staffs tasks with
//!   the least-loaded workers using versioned commits, so concurrent callers
//!   never over-assign.
//! - **Lifecycle**: [`core::lifecycle::TaskLifecycle`] enforces the status
//!   graph and applies completion effects (inventory adjustments and movement
//!   records) exactly once.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warehouse_dispatch::builders::build_in_memory;
//! use warehouse_dispatch::config::DispatchConfig;
//! use warehouse_dispatch::core::{NewTask, TaskDetail, Tenant};
//!
//! let env = build_in_memory(DispatchConfig::from_env()?)?;
//! env.dispatcher
//!     .register_tenant(Tenant { id: "acme".into(), name: "Acme".into() })
//!     .await?;
//!
//! let outcome = env
//!     .dispatcher
//!     .within(&"acme".into(), async {
//!         let task = env.dispatcher.create_task(NewTask::new("wh-1", detail)).await?;
//!         env.dispatcher.auto_assign(task.id).await
//!     })
//!     .await?;
//! ```

/// Tenant isolation, workload balancing, assignment, and lifecycle.
pub mod core;
/// Dispatch tuning and environment loading.
pub mod config;
/// Builders to construct a dispatcher from configuration.
pub mod builders;
/// Infrastructure adapters for task storage and the inventory ledger.
pub mod infra;
/// API surface: request/response models and handlers.
pub mod runtime;
/// Shared utilities.
pub mod util;
