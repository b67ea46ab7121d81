use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One recorded sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Relative change between two windows of samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    /// Percent change, rounded to one decimal
    pub change: f64,
    pub direction: TrendDirection,
}

/// Bounded per-metric sample history
#[derive(Debug, Clone, Default)]
pub struct MetricsHistory {
    series: HashMap<String, VecDeque<MetricPoint>>,
}

impl MetricsHistory {
    /// Samples kept per metric; older ones are dropped first
    pub const MAX_POINTS: usize = 100;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, name: &str, value: f64, timestamp: DateTime<Utc>) {
        let points = self.series.entry(name.to_string()).or_default();
        points.push_back(MetricPoint { value, timestamp });
        while points.len() > Self::MAX_POINTS {
            points.pop_front();
        }
    }

    /// Samples for `name`, oldest first
    pub fn series(&self, name: &str) -> Vec<MetricPoint> {
        self.series
            .get(name)
            .map(|points| points.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Compare the mean of the last `periods` samples with the `periods` before
    ///
    /// Returns `None` when there are fewer than `periods` samples, when no
    /// older samples exist to compare against or when the older mean is zero.
    pub fn trend(&self, name: &str, periods: usize) -> Option<Trend> {
        if periods == 0 {
            return None;
        }
        let points = self.series.get(name)?;
        if points.len() < periods {
            return None;
        }

        let split = points.len() - periods;
        let older_start = split.saturating_sub(periods);
        let recent = mean(points.range(split..))?;
        let older = mean(points.range(older_start..split))?;
        if older == 0.0 {
            return None;
        }

        let change = ((recent - older) / older * 1000.0).round() / 10.0;
        let direction = if change > 0.0 {
            TrendDirection::Up
        } else if change < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        };
        Some(Trend { change, direction })
    }
}

fn mean<'a>(points: impl ExactSizeIterator<Item = &'a MetricPoint>) -> Option<f64> {
    let len = points.len();
    if len == 0 {
        return None;
    }
    Some(points.map(|p| p.value).sum::<f64>() / len as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(name: &str, values: &[f64]) -> MetricsHistory {
        let mut history = MetricsHistory::new();
        for value in values {
            history.add_point(name, *value, Utc::now());
        }
        history
    }

    #[test]
    fn test_keeps_last_hundred_points() {
        let values: Vec<f64> = (0..150).map(f64::from).collect();
        let history = sampled("load", &values);

        let series = history.series("load");
        assert_eq!(series.len(), MetricsHistory::MAX_POINTS);
        assert_eq!(series[0].value, 50.0);
        assert_eq!(series[99].value, 149.0);
        assert!(history.series("missing").is_empty());
    }

    #[test]
    fn test_trend_compares_windows() {
        let history = sampled("rsvps", &[10.0, 10.0, 12.0, 12.0]);
        let trend = history.trend("rsvps", 2).unwrap();
        assert_eq!(trend.change, 20.0);
        assert_eq!(trend.direction, TrendDirection::Up);

        let history = sampled("errors", &[3.0, 2.0]);
        let trend = history.trend("errors", 1).unwrap();
        assert_eq!(trend.change, -33.3);
        assert_eq!(trend.direction, TrendDirection::Down);

        let flat = sampled("load", &[5.0, 5.0]);
        assert_eq!(flat.trend("load", 1).unwrap().direction, TrendDirection::Stable);
    }

    #[test]
    fn test_trend_needs_enough_data() {
        let history = sampled("load", &[1.0, 2.0, 3.0]);
        assert!(history.trend("load", 5).is_none());
        assert!(history.trend("load", 3).is_none());
        assert!(history.trend("load", 0).is_none());
        assert!(history.trend("missing", 1).is_none());

        let from_zero = sampled("load", &[0.0, 4.0]);
        assert!(from_zero.trend("load", 1).is_none());
    }

    #[test]
    fn test_trend_uses_partial_older_window() {
        // older window holds only [4.0]
        let history = sampled("events", &[4.0, 6.0, 6.0]);
        let trend = history.trend("events", 2).unwrap();
        assert_eq!(trend.change, 50.0);
    }
}
