//! Fan curve engine for temperature-based fan control
//!
//! A curve is an ordered table of temperature -> speed breakpoints. Lookups
//! between two breakpoints are linearly interpolated; outside the table the
//! first or last speed is held.
//!
//! Speeds need not be monotonic: some presets dip before rising again.

use serde::{Deserialize, Serialize};

use crate::constants::{control, presets};
use crate::data::{validate_breakpoints, Breakpoint};
use crate::error::{Result, UccError};
use ucc_protocol::CurvePoint;

/// Immutable temperature -> speed table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Breakpoint>", into = "Vec<Breakpoint>")]
pub struct FanCurve {
    breakpoints: Vec<Breakpoint>,
}

impl FanCurve {
    /// Build a curve from an explicit breakpoint table
    ///
    /// Fails on an empty table, a decreasing temperature or a speed outside 0-100.
    pub fn new(breakpoints: Vec<Breakpoint>) -> Result<Self> {
        validate_breakpoints(&breakpoints)?;
        Ok(Self { breakpoints })
    }

    /// Build a curve from wire-format points
    pub fn from_curve_points(points: Vec<CurvePoint>) -> Result<Self> {
        Self::new(points.into_iter().map(Breakpoint::from).collect())
    }

    /// Expand sparse `(temp, speed)` key points into a dense table covering 0..=100 °C
    ///
    /// Below the first key point its speed is used, above the last the last
    /// speed. Between key points speeds are interpolated with integer
    /// arithmetic, so preset tables are exact.
    pub fn from_key_points(key_points: &[(i32, i32)]) -> Self {
        let mut keys: Vec<(i32, i32)> = key_points
            .iter()
            .map(|&(t, s)| (t, s.clamp(control::MIN_PERCENT, control::MAX_PERCENT)))
            .collect();
        keys.sort_by_key(|&(t, _)| t);

        let breakpoints = (0..=presets::TABLE_MAX_TEMP_C)
            .map(|temp| Breakpoint::new(temp, expand_key_points(&keys, temp)))
            .collect();

        Self { breakpoints }
    }

    /// Speed in percent for a temperature in °C
    pub fn lookup(&self, temp: i32) -> i32 {
        // Non-empty by construction
        let (first, last) = match (self.breakpoints.first(), self.breakpoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return control::MAX_PERCENT,
        };

        if temp <= first.temp {
            return first.speed;
        }
        if temp >= last.temp {
            return last.speed;
        }

        self.breakpoints
            .windows(2)
            .find(|w| w[0].temp < temp && temp <= w[1].temp)
            .map(|w| interpolate(w[0], w[1], temp))
            .unwrap_or(last.speed)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn to_curve_points(&self) -> Vec<CurvePoint> {
        self.breakpoints.iter().copied().map(CurvePoint::from).collect()
    }
}

fn interpolate(prev: Breakpoint, next: Breakpoint, temp: i32) -> i32 {
    if next.temp == prev.temp {
        return prev.speed;
    }
    let ratio = (f64::from(temp) - f64::from(prev.temp)) / (f64::from(next.temp) - f64::from(prev.temp));
    prev.speed + (f64::from(next.speed - prev.speed) * ratio).round() as i32
}

fn expand_key_points(keys: &[(i32, i32)], temp: i32) -> i32 {
    let Some(&(first_temp, first_speed)) = keys.first() else {
        return 0;
    };
    if temp <= first_temp {
        return first_speed;
    }

    for pair in keys.windows(2) {
        let ((t1, s1), (t2, s2)) = (pair[0], pair[1]);
        if temp > t1 && temp <= t2 {
            return if t2 > t1 {
                let step = i64::from(s2 - s1) * (i64::from(temp) - i64::from(t1))
                    / (i64::from(t2) - i64::from(t1));
                s1 + step as i32
            } else {
                s1
            };
        }
    }

    keys.last().map(|&(_, s)| s).unwrap_or(0)
}

impl TryFrom<Vec<Breakpoint>> for FanCurve {
    type Error = UccError;

    fn try_from(breakpoints: Vec<Breakpoint>) -> Result<Self> {
        Self::new(breakpoints)
    }
}

impl From<FanCurve> for Vec<Breakpoint> {
    fn from(curve: FanCurve) -> Self {
        curve.breakpoints
    }
}
