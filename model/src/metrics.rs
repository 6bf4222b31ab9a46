use anyhow::Result;
use geo::EuclideanDistance;
use log::warn;

use crate::WindowedView;

/// Speeds are computed in distance-units/second internally and reported in
/// distance-units/hour.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// The transition between two consecutive samples of a view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// Planar Euclidean distance between the two positions, using the (x, -z)
    /// convention. Always >= 0.
    pub displacement: f64,
    /// Always >= 0; out-of-order timestamps get clamped, not propagated.
    pub duration_seconds: f64,
    /// Position-derived, distance-units/second. 0 when no time elapsed.
    pub speed: f64,
}

/// Which question "average speed" answers: distance over the whole window, or
/// distance over only the time spent moving. The two diverge whenever a
/// vehicle idles, so callers pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedMode {
    Wallclock,
    Moving,
}

impl std::str::FromStr for SpeedMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wallclock" => Ok(Self::Wallclock),
            "moving" => Ok(Self::Moving),
            x => bail!("unknown speed mode \"{}\"; expected wallclock or moving", x),
        }
    }
}

/// Summary of one view. All speeds in distance-units/hour. Every field is 0
/// for views too small to measure; none of these cases are errors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AggregateMetrics {
    pub total_distance: f64,
    /// The estimator the caller selected, equal to one of the two below.
    pub avg_speed: f64,
    pub avg_speed_wallclock: f64,
    pub avg_speed_moving: f64,
    /// Max of position-derived segment speeds, not of the feed's own readings.
    pub max_speed: f64,
    pub active_duration_seconds: f64,
}

/// One segment per consecutive sample pair: length = max(0, n - 1).
pub fn derive_segments(view: &WindowedView) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut clamped = 0;
    for pair in view.samples().windows(2) {
        let displacement = pair[0].position().euclidean_distance(&pair[1].position());
        let mut duration_seconds = (pair[1].time - pair[0].time).num_milliseconds() as f64 / 1000.0;
        if duration_seconds < 0.0 {
            // Upstream clock skew. The sorted invariant should prevent this;
            // treat it as a data-quality event, not a failure.
            clamped += 1;
            duration_seconds = 0.0;
        }
        let speed = if duration_seconds > 0.0 {
            displacement / duration_seconds
        } else {
            0.0
        };
        segments.push(Segment {
            displacement,
            duration_seconds,
            speed,
        });
    }
    if clamped > 0 {
        warn!(
            "{} segment(s) had out-of-order timestamps; durations clamped to 0",
            clamped
        );
    }
    segments
}

/// Runs the whole pipeline over one view: segments, the running
/// distance-so-far series (one entry per sample, starting at 0), and the
/// summary. Both average-speed estimators come out of the same pass.
pub fn compute_metrics(
    view: &WindowedView,
    mode: SpeedMode,
) -> (Vec<Segment>, Vec<f64>, AggregateMetrics) {
    let segments = derive_segments(view);

    let mut cumulative = Vec::with_capacity(view.len());
    if !view.is_empty() {
        cumulative.push(0.0);
    }
    let mut totals = Totals::default();
    for segment in &segments {
        totals.add(segment);
        cumulative.push(totals.distance);
    }

    let metrics = totals.finish(view.elapsed_seconds(), mode);
    (segments, cumulative, metrics)
}

/// Reduce an already-derived segment sequence. `compute_metrics` is the usual
/// entry point; this exists for callers that keep the segments around.
pub fn aggregate(view: &WindowedView, segments: &[Segment], mode: SpeedMode) -> AggregateMetrics {
    let mut totals = Totals::default();
    for segment in segments {
        totals.add(segment);
    }
    totals.finish(view.elapsed_seconds(), mode)
}

#[derive(Default)]
struct Totals {
    distance: f64,
    max_speed: f64,
    moving_seconds: f64,
}

impl Totals {
    fn add(&mut self, segment: &Segment) {
        self.distance += segment.displacement;
        self.max_speed = self.max_speed.max(segment.speed);
        if segment.speed > 0.0 {
            self.moving_seconds += segment.duration_seconds;
        }
    }

    fn finish(self, elapsed_seconds: f64, mode: SpeedMode) -> AggregateMetrics {
        let per_hour = |distance: f64, seconds: f64| {
            if seconds > 0.0 {
                distance / seconds * SECONDS_PER_HOUR
            } else {
                0.0
            }
        };
        let avg_speed_wallclock = per_hour(self.distance, elapsed_seconds);
        let avg_speed_moving = per_hour(self.distance, self.moving_seconds);
        AggregateMetrics {
            total_distance: self.distance,
            avg_speed: match mode {
                SpeedMode::Wallclock => avg_speed_wallclock,
                SpeedMode::Moving => avg_speed_moving,
            },
            avg_speed_wallclock,
            avg_speed_moving,
            max_speed: self.max_speed * SECONDS_PER_HOUR,
            active_duration_seconds: elapsed_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    use crate::{filter_window, Sample, Trajectory};

    use super::*;

    fn time(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    fn view(samples: &[(i64, f64, f64)]) -> WindowedView {
        WindowedView::full(&Trajectory::new(
            samples
                .iter()
                .map(|(secs, x, z)| Sample {
                    time: time(*secs),
                    x: *x,
                    z: *z,
                    speed: None,
                })
                .collect(),
        ))
    }

    #[test]
    fn one_segment_per_sample_pair() {
        for n in 0usize..5 {
            let samples: Vec<(i64, f64, f64)> = (0..n).map(|i| (i as i64, 0.0, 0.0)).collect();
            assert_eq!(derive_segments(&view(&samples)).len(), n.saturating_sub(1));
        }
    }

    // Positions are (x, -z): the vehicle drives 10 units in 10s, then sits
    // still for 10s.
    #[test]
    fn drive_then_idle() {
        let view = view(&[(0, 0.0, 0.0), (10, 0.0, -10.0), (20, 0.0, -10.0)]);
        let (segments, cumulative, metrics) = compute_metrics(&view, SpeedMode::Wallclock);

        assert_eq!(segments.len(), 2);
        assert_relative_eq!(segments[0].displacement, 10.0);
        assert_relative_eq!(segments[0].speed, 1.0);
        assert_relative_eq!(segments[1].displacement, 0.0);
        assert_relative_eq!(segments[1].speed, 0.0);

        assert_eq!(cumulative, vec![0.0, 10.0, 10.0]);

        assert_relative_eq!(metrics.total_distance, 10.0);
        assert_relative_eq!(metrics.avg_speed_wallclock, 0.5 * 3600.0);
        assert_relative_eq!(metrics.avg_speed_moving, 1.0 * 3600.0);
        assert_relative_eq!(metrics.max_speed, 1.0 * 3600.0);
        assert_relative_eq!(metrics.active_duration_seconds, 20.0);
        assert_relative_eq!(metrics.avg_speed, metrics.avg_speed_wallclock);

        let moving = aggregate(&view, &segments, SpeedMode::Moving);
        assert_relative_eq!(moving.avg_speed, moving.avg_speed_moving);
    }

    #[test]
    fn segments_never_negative() {
        let view = view(&[
            (0, 3.0, 4.0),
            (10, -3.0, -4.0),
            // Duplicate timestamp, different position: zero duration, zero speed
            (10, 0.0, 0.0),
        ]);
        for segment in derive_segments(&view) {
            assert!(segment.displacement >= 0.0);
            assert!(segment.duration_seconds >= 0.0);
            assert!(segment.speed >= 0.0);
            assert!(segment.speed.is_finite());
        }
    }

    #[test]
    fn tiny_views_yield_zeros() {
        for samples in [vec![], vec![(5, 1.0, 2.0)]] {
            let (segments, cumulative, metrics) = compute_metrics(&view(&samples), SpeedMode::Moving);
            assert!(segments.is_empty());
            assert_eq!(cumulative.len(), samples.len());
            assert_eq!(metrics.total_distance, 0.0);
            assert_eq!(metrics.avg_speed_wallclock, 0.0);
            assert_eq!(metrics.avg_speed_moving, 0.0);
            assert_eq!(metrics.max_speed, 0.0);
            assert_eq!(metrics.active_duration_seconds, 0.0);
        }
    }

    #[test]
    fn widening_the_window_never_loses_distance() {
        let trajectory = Trajectory::new(
            [(0, 0.0, 0.0), (10, 5.0, 0.0), (20, 5.0, -5.0), (30, 0.0, -5.0)]
                .into_iter()
                .map(|(secs, x, z)| Sample {
                    time: time(secs),
                    x,
                    z,
                    speed: None,
                })
                .collect(),
        );
        let mut last_distance = 0.0;
        for end in [5, 15, 25, 35] {
            let view = filter_window(&trajectory, time(0), time(end)).unwrap();
            let (_, _, metrics) = compute_metrics(&view, SpeedMode::Wallclock);
            assert!(metrics.total_distance >= last_distance);
            last_distance = metrics.total_distance;
        }
        assert_relative_eq!(last_distance, 15.0);
    }

    #[test]
    fn mode_strings() {
        assert_eq!("wallclock".parse::<SpeedMode>().unwrap(), SpeedMode::Wallclock);
        assert_eq!("moving".parse::<SpeedMode>().unwrap(), SpeedMode::Moving);
        assert!("average".parse::<SpeedMode>().is_err());
    }
}
