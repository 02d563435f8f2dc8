//! Loading and unloading plans derived from a shipment's shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::task::{LoadingDirection, NewTask, TaskDetail};
use crate::util::ids::{Priority, ShipmentRef, WarehouseId};

/// Most workers a single dock task is staffed with.
pub const MAX_DOCK_CREW: u32 = 4;
/// Fewest workers a dock task is staffed with.
pub const MIN_DOCK_CREW: u32 = 2;

/// What the planner needs to know about a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentProfile {
    /// Shipment reference.
    pub shipment: ShipmentRef,
    /// Dock warehouse.
    pub warehouse_id: WarehouseId,
    /// Gross weight in pounds.
    pub weight_lbs: u32,
    /// Pallets on the trailer.
    pub pallet_count: u32,
    /// Hazardous materials on board.
    pub hazmat: bool,
    /// Planned dock appointment.
    pub scheduled_start: Option<DateTime<Utc>>,
}

/// Duration, crew size and priority for one dock task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingPlan {
    /// Dock direction.
    pub direction: LoadingDirection,
    /// Planned minutes.
    pub estimated_minutes: u32,
    /// Crew size.
    pub required_workers: u32,
    /// Scheduling priority.
    pub priority: Priority,
}

impl LoadingPlan {
    /// Plan the dock work for `profile`.
    pub fn for_shipment(profile: &ShipmentProfile, direction: LoadingDirection) -> Self {
        Self {
            direction,
            estimated_minutes: estimate_minutes(profile, direction),
            required_workers: crew_size(profile),
            priority: priority_for(profile),
        }
    }

    /// Task creation request carrying this plan.
    pub fn to_new_task(&self, profile: &ShipmentProfile) -> NewTask {
        let task = NewTask::new(
            profile.warehouse_id.clone(),
            TaskDetail::Loading {
                shipment: profile.shipment.clone(),
                direction: self.direction,
                estimated_minutes: self.estimated_minutes,
            },
        )
        .with_required_workers(self.required_workers)
        .with_priority(self.priority);
        match profile.scheduled_start {
            Some(at) => task.with_scheduled_start(at),
            None => task,
        }
    }
}

/// Unloading runs longer than loading; weight adds 5 minutes per started
/// 1000 lb, each pallet 10 minutes, and hazmat half again.
fn estimate_minutes(profile: &ShipmentProfile, direction: LoadingDirection) -> u32 {
    let base: u32 = match direction {
        LoadingDirection::Loading => 30,
        LoadingDirection::Unloading => 45,
    };
    let minutes = base
        .saturating_add(profile.weight_lbs.div_ceil(1000).saturating_mul(5))
        .saturating_add(profile.pallet_count.saturating_mul(10));
    if profile.hazmat {
        // x * 1.5 rounded half up, saturating
        let scaled = (u64::from(minutes) * 3).div_ceil(2);
        u32::try_from(scaled).unwrap_or(u32::MAX)
    } else {
        minutes
    }
}

fn crew_size(profile: &ShipmentProfile) -> u32 {
    let mut crew = MIN_DOCK_CREW;
    if profile.weight_lbs > 5000 {
        crew = crew.max(profile.weight_lbs.div_ceil(2500));
    }
    if profile.pallet_count > 5 {
        crew = crew.max(profile.pallet_count.div_ceil(3));
    }
    crew.min(MAX_DOCK_CREW)
}

fn priority_for(profile: &ShipmentProfile) -> Priority {
    if profile.hazmat || profile.weight_lbs > 10_000 || profile.pallet_count > 10 {
        Priority::High
    } else if profile.weight_lbs > 5000 || profile.pallet_count > 5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(weight_lbs: u32, pallet_count: u32, hazmat: bool) -> ShipmentProfile {
        ShipmentProfile {
            shipment: "shp-1".into(),
            warehouse_id: "wh-1".into(),
            weight_lbs,
            pallet_count,
            hazmat,
            scheduled_start: None,
        }
    }

    #[test]
    fn test_small_shipment_plan() {
        let plan = LoadingPlan::for_shipment(&profile(800, 2, false), LoadingDirection::Loading);
        assert_eq!(plan.estimated_minutes, 30 + 5 + 20);
        assert_eq!(plan.required_workers, 2);
        assert_eq!(plan.priority, Priority::Low);
    }

    #[test]
    fn test_unloading_takes_longer() {
        let p = profile(0, 0, false);
        let load = LoadingPlan::for_shipment(&p, LoadingDirection::Loading);
        let unload = LoadingPlan::for_shipment(&p, LoadingDirection::Unloading);
        assert_eq!(load.estimated_minutes, 30);
        assert_eq!(unload.estimated_minutes, 45);
    }

    #[test]
    fn test_hazmat_adds_half_and_rounds_up() {
        // 30 + 5 (1 lb rounds up to one thousand) = 35 -> 52.5 -> 53
        let plan = LoadingPlan::for_shipment(&profile(1, 0, true), LoadingDirection::Loading);
        assert_eq!(plan.estimated_minutes, 53);
        assert_eq!(plan.priority, Priority::High);
    }

    #[test]
    fn test_crew_scales_with_weight_and_pallets_and_caps() {
        let medium = LoadingPlan::for_shipment(&profile(7000, 0, false), LoadingDirection::Loading);
        assert_eq!(medium.required_workers, 3);
        assert_eq!(medium.priority, Priority::Medium);

        let pallets = LoadingPlan::for_shipment(&profile(0, 8, false), LoadingDirection::Loading);
        assert_eq!(pallets.required_workers, 3);

        let huge = LoadingPlan::for_shipment(&profile(40_000, 30, false), LoadingDirection::Loading);
        assert_eq!(huge.required_workers, MAX_DOCK_CREW);
        assert_eq!(huge.priority, Priority::High);
    }

    #[test]
    fn test_extreme_shipment_saturates() {
        let plan = LoadingPlan::for_shipment(
            &profile(u32::MAX, 500_000_000, true),
            LoadingDirection::Unloading,
        );
        assert_eq!(plan.estimated_minutes, u32::MAX);
        assert_eq!(plan.required_workers, MAX_DOCK_CREW);
        assert_eq!(plan.priority, Priority::High);

        let pallets = LoadingPlan::for_shipment(
            &profile(0, u32::MAX, false),
            LoadingDirection::Loading,
        );
        assert_eq!(pallets.estimated_minutes, u32::MAX);
    }

    #[test]
    fn test_new_task_carries_plan() {
        let p = profile(7000, 0, false);
        let plan = LoadingPlan::for_shipment(&p, LoadingDirection::Unloading);
        let task = plan.to_new_task(&p);
        assert_eq!(task.required_workers, 3);
        assert_eq!(task.priority, Priority::Medium);
        assert!(matches!(
            task.detail,
            TaskDetail::Loading {
                direction: LoadingDirection::Unloading,
                ..
            }
        ));
    }
}
