//! # Steel Area Diagram
//!
//! Piecewise-linear curve of required steel area (m²) against station (m).
//! Placing steel *reduces* the curve: every point drops by the inserted area,
//! exact zero crossings are added, negative values clamp to zero and interior
//! zero points with zero neighbours are collapsed. What stays positive is
//! still uncovered demand.
//!
//! The diagram keeps a frozen copy of its original points. Peak and trough
//! queries always read that copy so they keep describing the demand, not
//! what is left of it.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::geometry::{Diagram, Period};
//!
//! let mut diagram = Diagram::new(
//!     vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
//!     vec![3.0, 0.0, 0.0, 0.0, 5.0, 4.0, 3.0, 1.0, 0.0, 4.0],
//! ).unwrap();
//!
//! let periods = diagram.insert_additional(1.0);
//! assert_eq!(periods, vec![Period::new(0.0, 1.0), Period::new(3.0, 9.0)]);
//! assert_eq!(diagram.periods().len(), 3);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LayoutError, LayoutResult};
use crate::geometry::period::{Period, Side};

/// One vertex of a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub station: f64,
    pub area: f64,
}

impl Point {
    pub fn new(station: f64, area: f64) -> Self {
        Point { station, area }
    }
}

/// Piecewise-linear station → area curve with strictly increasing stations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagram {
    points: Vec<Point>,
    original_points: Vec<Point>,
}

impl Diagram {
    /// Build a diagram from parallel station/area lists.
    pub fn new(stations: Vec<f64>, areas: Vec<f64>) -> LayoutResult<Self> {
        if stations.len() != areas.len() {
            return Err(LayoutError::invalid_input(
                "areas",
                format!("{} values", areas.len()),
                format!("expected one area per station ({} stations)", stations.len()),
            ));
        }
        if stations.len() < 2 {
            return Err(LayoutError::invalid_input(
                "stations",
                format!("{} values", stations.len()),
                "a diagram needs at least two stations",
            ));
        }
        if stations.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LayoutError::invalid_input(
                "stations",
                format!("{:?}", stations),
                "stations must be strictly increasing",
            ));
        }
        let points: Vec<Point> = stations
            .into_iter()
            .zip(areas)
            .map(|(station, area)| Point::new(station, area))
            .collect();
        Ok(Diagram {
            original_points: points.clone(),
            points,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn stations(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.station).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.area).collect()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn original_points(&self) -> &[Point] {
        &self.original_points
    }

    /// First and last station.
    pub fn bounds(&self) -> Period {
        let first = self.points.first().map_or(0.0, |p| p.station);
        let last = self.points.last().map_or(0.0, |p| p.station);
        Period::new(first, last)
    }

    /// Whether any point still carries uncovered demand.
    pub fn is_positive(&self) -> bool {
        self.points.iter().any(|p| p.area > 0.0)
    }

    /// Stretches of the current curve that are above zero.
    ///
    /// A stretch opens at the first point when it is positive, or at any
    /// point whose successor is positive. It closes at the last point or where
    /// a point and its successor are both exactly zero.
    pub fn periods(&self) -> Vec<Period> {
        let points = &self.points;
        let last = points.len().saturating_sub(1);
        let mut periods = Vec::new();
        let mut open: Option<f64> = None;
        for i in 0..points.len() {
            match open {
                None => {
                    if (i == 0 && points[i].area > 0.0) || (i < last && points[i + 1].area > 0.0) {
                        open = Some(points[i].station);
                    }
                }
                Some(start) => {
                    if i == last || (points[i].area == 0.0 && points[i + 1].area == 0.0) {
                        periods.push(Period::new(start, points[i].station));
                        open = None;
                    }
                }
            }
        }
        periods
    }

    /// Length of a zero-zero segment at either end of the curve, the larger one.
    pub fn side_distance(&self) -> f64 {
        let points = &self.points;
        let n = points.len();
        if n < 2 {
            return 0.0;
        }
        let mut start_dist = 0.0;
        let mut end_dist = 0.0;
        if points[0].area == 0.0 && points[1].area == 0.0 {
            start_dist = points[1].station - points[0].station;
        }
        if points[n - 1].area == 0.0 && points[n - 2].area == 0.0 {
            end_dist = points[n - 1].station - points[n - 2].station;
        }
        f64::max(start_dist, end_dist)
    }

    /// Longest zero-zero segment away from both ends, 0 when there is none.
    pub fn middle_distance(&self) -> f64 {
        let points = &self.points;
        if points.len() < 3 {
            return 0.0;
        }
        (1..points.len() - 2)
            .filter(|&i| points[i].area == 0.0 && points[i + 1].area == 0.0)
            .map(|i| points[i + 1].station - points[i].station)
            .fold(0.0, f64::max)
    }

    /// Peak of the original demand within `period`.
    ///
    /// Period ends that fall strictly between two original points compete
    /// with their interpolated value. Ties keep the first point found.
    pub fn max_point(&self, period: &Period) -> Option<Point> {
        self.extreme_point(period, |candidate, best| candidate > best)
    }

    /// Trough of the original demand within `period`.
    pub fn min_point(&self, period: &Period) -> Option<Point> {
        self.extreme_point(period, |candidate, best| candidate < best)
    }

    fn extreme_point(&self, period: &Period, better: impl Fn(f64, f64) -> bool) -> Option<Point> {
        let points = &self.original_points;
        let mut best: Option<Point> = None;
        let mut consider = |station: f64, area: f64| match best {
            Some(b) if !better(area, b.area) => {}
            _ => best = Some(Point::new(station, area)),
        };
        for (i, point) in points.iter().enumerate() {
            if period.contains(point.station) {
                consider(point.station, point.area);
            }
            if let Some(next) = points.get(i + 1) {
                for station in [period.start, period.end] {
                    if point.station < station && station < next.station {
                        consider(station, interpolate(point, next, station));
                    }
                }
            }
        }
        best
    }

    /// Value of the current curve at `station`, `None` outside the bounds.
    pub fn value_at(&self, station: f64) -> Option<f64> {
        value_on(&self.points, station)
    }

    /// Value of the original curve at `station`, `None` outside the bounds.
    pub fn original_value_at(&self, station: f64) -> Option<f64> {
        value_on(&self.original_points, station)
    }

    // ========================================================================
    // Steel insertion
    // ========================================================================

    /// Insert typical steel with total area `amount` over the whole length.
    pub fn insert_typical(&mut self, amount: f64) {
        self.insert(amount);
    }

    /// Insert one row of additional bars with area `area`.
    ///
    /// Returns the positive stretches as they were *before* the insertion,
    /// which are the theoretical periods of the new row.
    pub fn insert_additional(&mut self, area: f64) -> Vec<Period> {
        let periods = self.periods();
        self.insert(area);
        periods
    }

    fn insert(&mut self, amount: f64) {
        self.reduce(amount);
        self.add_intersection_points();
        self.clamp_negative_points();
        self.remove_consecutive_zeros();
    }

    fn reduce(&mut self, amount: f64) {
        for point in &mut self.points {
            point.area -= amount;
        }
    }

    fn add_intersection_points(&mut self) {
        let points = &mut self.points;
        let mut i = 0;
        while i + 1 < points.len() {
            if points[i].area * points[i + 1].area < 0.0 {
                let crossing = interpolate_zero_line(&points[i], &points[i + 1]);
                points.insert(i + 1, crossing);
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    fn clamp_negative_points(&mut self) {
        for point in &mut self.points {
            if point.area < 0.0 {
                point.area = 0.0;
            }
        }
    }

    fn remove_consecutive_zeros(&mut self) {
        let points = &mut self.points;
        let mut i = 1;
        while i + 1 < points.len() {
            if points[i - 1].area == 0.0 && points[i].area == 0.0 && points[i + 1].area == 0.0 {
                points.remove(i);
            } else {
                i += 1;
            }
        }
    }

    // ========================================================================
    // Shape edits
    // ========================================================================

    /// Add a trapezoid of height `value` to the curve.
    ///
    /// `stations` holds the break points of the trapezoid: four when neither
    /// end is bent (ramp up, flat, ramp down), two when exactly one end is
    /// bent (the bent end jumps straight to full height), none when both are.
    pub fn increase_area(&mut self, bent_start: bool, bent_end: bool, stations: &[f64], value: f64) -> LayoutResult<()> {
        let expected = match (bent_start, bent_end) {
            (true, true) => 0,
            (false, false) => 4,
            _ => 2,
        };
        if stations.len() != expected {
            return Err(LayoutError::contract(
                "increase_area",
                format!("expected {} break stations, got {}", expected, stations.len()),
            ));
        }

        for &station in stations {
            self.insert_interpolated(station);
        }

        for point in &mut self.points {
            let s = point.station;
            let flat = match (bent_start, bent_end) {
                (true, false) => s <= stations[0],
                (false, true) => s >= stations[1],
                (true, true) => true,
                (false, false) => stations[1] <= s && s <= stations[2],
            };
            if flat {
                point.area += value;
            }
        }

        if !bent_end {
            let (lo, hi) = (stations[stations.len() - 2], stations[stations.len() - 1]);
            for point in &mut self.points {
                if lo < point.station && point.station < hi {
                    point.area += value * (hi - point.station) / (hi - lo);
                }
            }
        }
        if !bent_start {
            let (lo, hi) = (stations[0], stations[1]);
            for point in &mut self.points {
                if lo < point.station && point.station < hi {
                    point.area += value * (point.station - lo) / (hi - lo);
                }
            }
        }
        Ok(())
    }

    /// Cut the curve down to zero over `period`.
    ///
    /// The ends of the period keep their interpolated value and the curve
    /// falls to zero within 1% of the period length on each side.
    pub fn trim_period(&mut self, period: &Period) -> LayoutResult<()> {
        if !period.is_subset_of(&self.bounds()) {
            return Err(LayoutError::contract(
                "trim_period",
                format!("period {} is outside diagram bounds {}", period, self.bounds()),
            ));
        }
        let offset = period.length() / 100.0;
        let stations = [period.start, period.start + offset, period.end - offset, period.end];

        for (k, &station) in stations.iter().enumerate() {
            let inner = k == 1 || k == 2;
            let points = &mut self.points;
            let mut i = 0;
            while i < points.len() {
                if points[i].station == station {
                    if inner {
                        points[i].area = 0.0;
                    }
                    break;
                }
                if i + 1 < points.len() && points[i].station < station && station < points[i + 1].station {
                    let area = if inner { 0.0 } else { interpolate(&points[i], &points[i + 1], station) };
                    points.insert(i + 1, Point::new(station, area));
                    break;
                }
                i += 1;
            }
        }

        self.points.retain(|p| {
            let s = p.station;
            !((stations[0] < s && s < stations[1])
                || (stations[1] < s && s < stations[2])
                || (stations[2] < s && s < stations[3]))
        });
        Ok(())
    }

    /// Replace the curve over `period` with a straight line between its ends.
    ///
    /// The period is clamped to the diagram bounds first.
    pub fn linearize_period(&mut self, period: &Period) {
        let bounds = self.bounds();
        let period = Period::new(period.start.max(bounds.start), period.end.min(bounds.end));
        self.insert_interpolated(period.start);
        self.insert_interpolated(period.end);
        self.points
            .retain(|p| !(period.start < p.station && p.station < period.end));
    }

    /// Cap every value in `period` at the curve's value at the given end.
    pub fn minimize_period(&mut self, period: &Period, side: Side) {
        let Some(cap) = self.value_at(period.side(side)) else {
            return;
        };
        for point in &mut self.points {
            if period.contains(point.station) {
                point.area = point.area.min(cap);
            }
        }
    }

    /// Insert an interpolated point at `station` unless it already exists
    /// or lies outside the curve.
    fn insert_interpolated(&mut self, station: f64) {
        let points = &mut self.points;
        if let Some(i) = (0..points.len().saturating_sub(1))
            .find(|&i| points[i].station < station && station < points[i + 1].station)
        {
            let area = interpolate(&points[i], &points[i + 1], station);
            points.insert(i + 1, Point::new(station, area));
        }
    }
}

impl std::fmt::Display for Diagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for point in &self.points {
            writeln!(f, "station: {}, area: {}", point.station, point.area)?;
        }
        Ok(())
    }
}

/// Linear interpolation of the area at `station` between two points.
pub fn interpolate(p1: &Point, p2: &Point, station: f64) -> f64 {
    p1.area + ((station - p1.station) / (p2.station - p1.station)) * (p2.area - p1.area)
}

/// Zero crossing of the segment between two points of opposite sign.
fn interpolate_zero_line(p1: &Point, p2: &Point) -> Point {
    let y1 = p1.area.abs();
    let y2 = p2.area.abs();
    let d = y1 * (p2.station - p1.station) / (y2 + y1);
    Point::new(p1.station + d, 0.0)
}

fn value_on(points: &[Point], station: f64) -> Option<f64> {
    for (i, point) in points.iter().enumerate() {
        if point.station == station {
            return Some(point.area);
        }
        if let Some(next) = points.get(i + 1) {
            if point.station < station && station < next.station {
                return Some(interpolate(point, next, station));
            }
        }
    }
    None
}

/// Piecewise-linear interpolation with flat extrapolation past both ends.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|&s| s <= x).saturating_sub(1);
    let (x1, x2, y1, y2) = (xs[i], xs[i + 1], ys[i], ys[i + 1]);
    if x2 == x1 {
        return y1;
    }
    y1 + (x - x1) * (y2 - y1) / (x2 - x1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn assert_all_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!(approx_eq(*a, *e), "{:?} vs {:?}", actual, expected);
        }
    }

    fn diagram() -> Diagram {
        Diagram::new(
            (0..10).map(f64::from).collect(),
            vec![3.0, 0.0, 0.0, 0.0, 5.0, 4.0, 3.0, 1.0, 0.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        assert!(Diagram::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(Diagram::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_periods_before_insertion() {
        assert_eq!(diagram().periods(), vec![Period::new(0.0, 1.0), Period::new(3.0, 9.0)]);
    }

    #[test]
    fn test_max_point_uses_interpolated_bounds() {
        let d = diagram();
        assert_eq!(d.max_point(&Period::new(3.2, 5.0)), Some(Point::new(4.0, 5.0)));
        assert_eq!(d.max_point(&Period::new(4.5, 7.0)), Some(Point::new(4.5, 4.5)));
    }

    #[test]
    fn test_min_point() {
        let d = diagram();
        let min = d.min_point(&Period::new(4.0, 9.0)).unwrap();
        assert!(approx_eq(min.station, 8.0));
        assert!(approx_eq(min.area, 0.0));
    }

    #[test]
    fn test_interpolate_zero_line() {
        let p = interpolate_zero_line(&Point::new(5.0, 3.0), &Point::new(8.0, -6.0));
        assert_eq!(p, Point::new(6.0, 0.0));
        let p = interpolate_zero_line(&Point::new(5.0, -6.0), &Point::new(8.0, 3.0));
        assert_eq!(p, Point::new(7.0, 0.0));
    }

    #[test]
    fn test_insertion_steps() {
        let mut d = diagram();
        d.reduce(1.0);
        d.add_intersection_points();
        assert_all_close(
            &d.stations(),
            &[0.0, 2.0 / 3.0, 1.0, 2.0, 3.0, 3.2, 4.0, 5.0, 6.0, 7.0, 8.0, 8.25, 9.0],
        );
        assert_all_close(
            &d.values(),
            &[2.0, 0.0, -1.0, -1.0, -1.0, 0.0, 4.0, 3.0, 2.0, 0.0, -1.0, 0.0, 3.0],
        );

        d.clamp_negative_points();
        assert!(d.values().iter().all(|&v| v >= 0.0));

        d.remove_consecutive_zeros();
        assert_all_close(&d.stations(), &[0.0, 2.0 / 3.0, 3.2, 4.0, 5.0, 6.0, 7.0, 8.25, 9.0]);
        assert_all_close(&d.values(), &[2.0, 0.0, 0.0, 4.0, 3.0, 2.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_insert_additional_returns_periods_before() {
        let mut d = diagram();
        let periods = d.insert_additional(1.0);
        assert_eq!(periods, vec![Period::new(0.0, 1.0), Period::new(3.0, 9.0)]);
        assert_all_close(&d.stations(), &[0.0, 2.0 / 3.0, 3.2, 4.0, 5.0, 6.0, 7.0, 8.25, 9.0]);
        assert_eq!(
            d.periods(),
            vec![Period::new(0.0, 2.0 / 3.0), Period::new(3.2, 7.0), Period::new(8.25, 9.0)]
        );
    }

    #[test]
    fn test_side_distance() {
        let mut stations: Vec<f64> = (0..9).map(f64::from).collect();
        stations.push(12.0);
        let d = Diagram::new(stations, vec![0.0, 0.0, 4.0, 5.0, 6.0, 5.0, 4.0, 1.0, 0.0, 0.0]).unwrap();
        assert!(approx_eq(d.side_distance(), 4.0));
    }

    #[test]
    fn test_middle_distance() {
        let mut d = diagram();
        d.remove_consecutive_zeros();
        assert!(approx_eq(d.middle_distance(), 2.0));

        d.insert(2.0);
        assert!(approx_eq(d.middle_distance(), 3.4 - 1.0 / 3.0));
    }

    #[test]
    fn test_is_positive_and_bounds() {
        let mut d = diagram();
        assert!(d.is_positive());
        assert_eq!(d.bounds(), Period::new(0.0, 9.0));
        d.insert_typical(5.0);
        assert!(!d.is_positive());
    }

    #[test]
    fn test_increase_area() {
        let mut d = Diagram::new(vec![0.0, 10.0], vec![0.0, 0.0]).unwrap();
        d.increase_area(false, false, &[1.0, 2.0, 5.0, 6.0], 1.0).unwrap();
        d.increase_area(true, false, &[3.0, 5.0], 2.0).unwrap();
        d.increase_area(false, true, &[5.0, 6.0], 3.0).unwrap();
        d.increase_area(true, true, &[], 1.0).unwrap();
        assert_all_close(&d.stations(), &[0.0, 1.0, 2.0, 3.0, 5.0, 6.0, 10.0]);
        assert_all_close(&d.values(), &[3.0, 3.0, 4.0, 4.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn test_increase_area_rejects_wrong_station_count() {
        let mut d = Diagram::new(vec![0.0, 10.0], vec![0.0, 0.0]).unwrap();
        assert!(d.increase_area(true, false, &[1.0, 2.0, 3.0, 4.0], 1.0).is_err());
    }

    #[test]
    fn test_trim_period() {
        let mut d = diagram();
        d.trim_period(&Period::new(3.2, 5.3)).unwrap();
        assert_all_close(
            &d.stations(),
            &[0.0, 1.0, 2.0, 3.0, 3.2, 3.221, 5.279, 5.3, 6.0, 7.0, 8.0, 9.0],
        );
        assert_all_close(
            &d.values(),
            &[3.0, 0.0, 0.0, 0.0, 1.0000000000000009, 0.0, 0.0, 0.08737864077669863, 3.0, 1.0, 0.0, 4.0],
        );
    }

    #[test]
    fn test_trim_period_outside_bounds() {
        let mut d = diagram();
        assert!(d.trim_period(&Period::new(8.0, 10.0)).is_err());
    }

    #[test]
    fn test_linearize_period() {
        let mut d = diagram();
        d.linearize_period(&Period::new(2.0, 5.5));
        assert_all_close(&d.stations(), &[0.0, 1.0, 2.0, 5.5, 6.0, 7.0, 8.0, 9.0]);
        assert_all_close(&d.values(), &[3.0, 0.0, 0.0, 3.5, 3.0, 1.0, 0.0, 4.0]);
    }

    #[test]
    fn test_linearize_period_clamps_to_bounds() {
        let mut d = diagram();
        d.linearize_period(&Period::new(-2.0, 2.0));
        assert_all_close(&d.stations(), &[0.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_minimize_period_caps_values() {
        let mut d = diagram();
        d.minimize_period(&Period::new(4.0, 6.5), Side::End);
        // value at 6.5 is 2.0
        assert_all_close(&d.values(), &[3.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 1.0, 0.0, 4.0]);
    }

    #[test]
    fn test_interp() {
        let xs = [0.0, 1.0, 3.0];
        let ys = [0.0, 2.0, 0.0];
        assert!(approx_eq(interp(0.5, &xs, &ys), 1.0));
        assert!(approx_eq(interp(2.0, &xs, &ys), 1.0));
        assert!(approx_eq(interp(-1.0, &xs, &ys), 0.0));
        assert!(approx_eq(interp(5.0, &xs, &ys), 0.0));
    }
}
