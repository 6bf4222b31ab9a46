use chrono::NaiveDateTime;
use geo::Point;

/// One position report for one vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub time: NaiveDateTime,
    pub x: f64,
    pub z: f64,
    /// Speed reading carried by the feed itself, in distance-units/hour. Kept
    /// separate from position-derived speeds; metrics never mix the two.
    pub speed: Option<f64>,
}

impl Sample {
    /// The z axis is inverted to match the physical site layout.
    pub fn position(&self) -> Point<f64> {
        Point::new(self.x, -self.z)
    }
}

/// The full time-ordered position history of one vehicle. Never mutated after load.
#[derive(Clone, Debug)]
pub struct Trajectory {
    inner: Vec<Sample>,
}

impl Trajectory {
    /// Sorts by time once, here. Ties keep their original relative order, and
    /// anything downstream can rely on the ordering without re-checking.
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.time);
        Self { inner: samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.inner.first().map(|s| s.time)
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.inner.last().map(|s| s.time)
    }

    /// Span between the first and last sample. A trajectory with fewer than 2
    /// samples was never observably moving, so its active duration is 0.
    pub fn active_duration_seconds(&self) -> f64 {
        if self.inner.len() < 2 {
            return 0.0;
        }
        let (first, last) = (self.inner[0].time, self.inner[self.inner.len() - 1].time);
        (last - first).num_milliseconds() as f64 / 1000.0
    }
}
