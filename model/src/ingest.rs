use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::{Sample, Trajectory, VehicleName};

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<VehicleName, Trajectory>> {
    let mut samples_per_vehicle: BTreeMap<VehicleName, Vec<Sample>> = BTreeMap::new();
    for (idx, rec) in csv::Reader::from_reader(reader).deserialize().enumerate() {
        // Line 1 is the header
        let line = idx + 2;
        let rec: Row = rec.with_context(|| format!("malformed row at line {}", line))?;
        let time = parse_timestamp(&rec.time)
            .with_context(|| format!("bad Tiempo \"{}\" at line {}", rec.time, line))?;
        samples_per_vehicle
            .entry(rec.vehicle)
            .or_insert_with(Vec::new)
            .push(Sample {
                time,
                x: rec.x,
                z: rec.z,
                speed: rec.speed,
            });
    }

    Ok(samples_per_vehicle
        .into_iter()
        .map(|(vehicle, samples)| (vehicle, Trajectory::new(samples)))
        .collect())
}

/// Feeds disagree on whether Tiempo carries a date. Time-of-day stamps get
/// pinned to a fixed base date so intervals still subtract cleanly.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime);
    }
    let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")?;
    Ok(base_date().and_time(time))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

#[derive(Deserialize)]
struct Row {
    #[serde(rename = "Vehiculo")]
    vehicle: VehicleName,
    #[serde(rename = "Tiempo")]
    time: String,
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Z")]
    z: f64,
    #[serde(rename = "Velocidad")]
    speed: Option<f64>,
}
