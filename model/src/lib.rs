#[macro_use]
extern crate anyhow;

mod ingest;
mod metrics;
mod trajectory;
mod window;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;

pub use self::ingest::parse_timestamp;
pub use self::metrics::{
    aggregate, compute_metrics, derive_segments, AggregateMetrics, Segment, SpeedMode,
};
pub use self::trajectory::{Sample, Trajectory};
pub use self::window::{filter_window, WindowedView};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct VehicleName(pub String);

impl std::fmt::Display for VehicleName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All ingested trajectories, keyed by vehicle. Populated once at load and read-only
/// after; every narrowing operation hands back a fresh view.
pub struct Model {
    trajectories: BTreeMap<VehicleName, Trajectory>,
}

impl Model {
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self> {
        let trajectories = ingest::load(reader)?;
        Ok(Self { trajectories })
    }

    /// Vehicles in sorted order, empty trajectories included.
    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleName> {
        self.trajectories.keys()
    }

    pub fn trajectory(&self, vehicle: &VehicleName) -> Result<&Trajectory> {
        self.trajectories
            .get(vehicle)
            .ok_or_else(|| anyhow!("unknown vehicle {}", vehicle))
    }

    /// Vehicles whose span between first and last sample is at least `min_minutes`.
    /// Fewer than 2 samples counts as zero active time.
    pub fn filter_active(&self, min_minutes: f64) -> Vec<VehicleName> {
        self.trajectories
            .iter()
            .filter(|(_, trajectory)| {
                trajectory.active_duration_seconds() >= min_minutes * 60.0
            })
            .map(|(vehicle, _)| vehicle.clone())
            .collect()
    }
}
