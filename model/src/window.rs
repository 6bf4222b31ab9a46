use anyhow::Result;
use chrono::NaiveDateTime;

use crate::{Sample, Trajectory};

/// A trajectory restricted to a closed time interval. Views are independent
/// copies; the trajectory they came from is never touched, so any number of
/// them can coexist.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowedView {
    samples: Vec<Sample>,
}

/// Keeps exactly the samples with `t_start <= time <= t_end`, in order. An
/// empty result is valid. An inverted range is the caller's bug, so it fails
/// rather than silently swapping the bounds.
pub fn filter_window(
    trajectory: &Trajectory,
    t_start: NaiveDateTime,
    t_end: NaiveDateTime,
) -> Result<WindowedView> {
    clip(trajectory.samples(), t_start, t_end)
}

impl WindowedView {
    /// The whole trajectory, unrestricted.
    pub fn full(trajectory: &Trajectory) -> Self {
        Self {
            samples: trajectory.samples().to_vec(),
        }
    }

    /// Re-filter an existing view. Filtering twice with the same bounds is a
    /// no-op.
    pub fn narrow(&self, t_start: NaiveDateTime, t_end: NaiveDateTime) -> Result<WindowedView> {
        clip(&self.samples, t_start, t_end)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock span of the view; 0 for fewer than 2 samples.
    pub fn elapsed_seconds(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let (first, last) = (
            self.samples[0].time,
            self.samples[self.samples.len() - 1].time,
        );
        (last - first).num_milliseconds() as f64 / 1000.0
    }
}

fn clip(samples: &[Sample], t_start: NaiveDateTime, t_end: NaiveDateTime) -> Result<WindowedView> {
    if t_start > t_end {
        bail!("invalid window: start {} is after end {}", t_start, t_end);
    }
    // Samples are sorted by time, so the window is one contiguous run
    let lo = samples.partition_point(|s| s.time < t_start);
    let hi = samples.partition_point(|s| s.time <= t_end);
    Ok(WindowedView {
        samples: samples[lo..hi].to_vec(),
    })
}
