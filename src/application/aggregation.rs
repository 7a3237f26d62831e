// Bucketing and aggregation of panel readings into chart series
use crate::domain::bucket::{all_buckets, bucket_for, BucketKey, Granularity};
use crate::domain::reading::{Metric, Phase, Reading};
use crate::domain::series::{CombinedPowerPoint, Series, SeriesPoint};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashMap};

/// Anything positioned on a time-of-day bucket
pub trait Bucketed {
    fn bucket(&self) -> BucketKey;
}

impl Bucketed for SeriesPoint {
    fn bucket(&self) -> BucketKey {
        self.time
    }
}

impl Bucketed for CombinedPowerPoint {
    fn bucket(&self) -> BucketKey {
        self.time
    }
}

/// Arithmetic mean of the values observed in one bucket.
/// Returns `None` for an empty slice rather than inventing a value.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / values.len() as f64)
}

/// Build a full day of points for one metric and phase.
///
/// Every bucket of the granularity is present in ascending order. Buckets with
/// observations carry their mean, the rest are zero. Readings outside `date`
/// (in `tz`) or without the requested value are ignored.
pub fn assemble_series(
    readings: &[Reading],
    date: NaiveDate,
    tz: &Tz,
    granularity: Granularity,
    metric: Metric,
    phase: Phase,
) -> Series {
    let mut observed: HashMap<BucketKey, Vec<f64>> = HashMap::new();
    for reading in readings {
        let Some(value) = reading.value(metric, phase) else {
            continue;
        };
        let Some(key) = bucket_for(reading.timestamp, date, tz, granularity) else {
            continue;
        };
        observed.entry(key).or_default().push(value);
    }

    all_buckets(granularity)
        .into_iter()
        .map(|key| {
            let value = observed
                .get(&key)
                .and_then(|values| mean(values))
                .unwrap_or(0.0);
            SeriesPoint::new(key, value)
        })
        .collect()
}

/// Merge per-panel series on the union of their bucket keys.
///
/// Panels keep the order given; a panel without a point at some bucket
/// contributes zero there. Output is sorted by (hour, minute).
pub fn combine_panels(panels: &[(String, Series)]) -> Vec<CombinedPowerPoint> {
    let lookups: Vec<(&str, HashMap<BucketKey, f64>)> = panels
        .iter()
        .map(|(key, series)| {
            let values = series.iter().map(|p| (p.time, p.value)).collect();
            (key.as_str(), values)
        })
        .collect();

    let keys: BTreeSet<BucketKey> = panels
        .iter()
        .flat_map(|(_, series)| series.iter().map(|p| p.time))
        .collect();

    keys.into_iter()
        .map(|time| {
            let values = lookups
                .iter()
                .map(|(key, values)| (key.to_string(), values.get(&time).copied().unwrap_or(0.0)))
                .collect();
            CombinedPowerPoint::new(time, values)
        })
        .collect()
}

/// Last bucket to show for `date`, or `None` when the whole day is shown.
///
/// Only the current day (per `now` in `tz`) is cut. The cut sits at the bucket
/// of `latest`, or at midnight when nothing has been observed today yet.
pub fn current_day_cutoff(
    date: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
    granularity: Granularity,
    latest: Option<DateTime<Utc>>,
) -> Option<BucketKey> {
    if now.with_timezone(tz).date_naive() != date {
        return None;
    }

    let Some(latest) = latest else {
        return Some(BucketKey::MIDNIGHT);
    };

    match bucket_for(latest, date, tz, granularity) {
        Some(key) => Some(key),
        // A reading stamped after today means the clocks disagree; keep the full day
        None if latest.with_timezone(tz).date_naive() > date => None,
        None => Some(BucketKey::MIDNIGHT),
    }
}

/// Drop every point strictly after `cutoff`
pub fn truncate_after<P: Bucketed>(points: Vec<P>, cutoff: Option<BucketKey>) -> Vec<P> {
    match cutoff {
        Some(cutoff) => points.into_iter().filter(|p| p.bucket() <= cutoff).collect(),
        None => points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Jakarta;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn voltage(ts: &str, value: f64) -> Reading {
        Reading::new(utc(ts), "33kva".to_string()).with_value(Metric::Voltage, Phase::R, value)
    }

    fn key(s: &str) -> BucketKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[218.0, 220.0, 222.0]), Some(220.0));
        assert_eq!(mean(&[1.5]), Some(1.5));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_assemble_averages_within_bucket() {
        // 09:07, 09:22 and 09:51 in Jakarta
        let readings = vec![
            voltage("2025-04-17T02:07:00Z", 218.0),
            voltage("2025-04-17T02:22:00Z", 220.0),
            voltage("2025-04-17T02:51:00Z", 222.0),
        ];

        let series = assemble_series(
            &readings,
            date("2025-04-17"),
            &Jakarta,
            Granularity::Hour,
            Metric::Voltage,
            Phase::R,
        );

        assert_eq!(series.len(), 24);
        assert_eq!(series[9].time, key("09:00"));
        assert_eq!(series[9].value, 220.0);
    }

    #[test]
    fn test_assemble_full_day_is_complete_and_ordered() {
        let readings = vec![voltage("2025-04-17T10:15:00Z", 230.0)];

        let series = assemble_series(
            &readings,
            date("2025-04-17"),
            &Jakarta,
            Granularity::Hour,
            Metric::Voltage,
            Phase::R,
        );

        let keys: Vec<String> = series.iter().map(|p| p.time.to_string()).collect();
        let expected: Vec<String> = (0..24).map(|h| format!("{:02}:00", h)).collect();
        assert_eq!(keys, expected);
        assert_eq!(series[17].value, 230.0);
        assert_eq!(series.iter().filter(|p| p.value != 0.0).count(), 1);
    }

    #[test]
    fn test_assemble_zero_fills_empty_day() {
        let series = assemble_series(
            &[],
            date("2025-04-17"),
            &Jakarta,
            Granularity::Minute,
            Metric::Power,
            Phase::S,
        );

        assert_eq!(series.len(), 1440);
        assert!(series.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn test_assemble_ignores_other_days_and_missing_values() {
        let readings = vec![
            // 2025-04-16 23:30 local, previous day
            voltage("2025-04-16T16:30:00Z", 500.0),
            // right metric, wrong phase
            Reading::new(utc("2025-04-17T03:00:00Z"), "33kva".to_string())
                .with_value(Metric::Voltage, Phase::S, 999.0),
            voltage("2025-04-17T03:10:00Z", 221.0),
        ];

        let series = assemble_series(
            &readings,
            date("2025-04-17"),
            &Jakarta,
            Granularity::Hour,
            Metric::Voltage,
            Phase::R,
        );

        assert_eq!(series[10].value, 221.0);
        assert_eq!(series[23].value, 0.0);
        assert_eq!(series.iter().map(|p| p.value).sum::<f64>(), 221.0);
    }

    #[test]
    fn test_combine_sums_panels() {
        let a = vec![
            SeriesPoint::new(key("00:00"), 1.1),
            SeriesPoint::new(key("01:00"), 2.2),
        ];
        let b = vec![
            SeriesPoint::new(key("00:00"), 3.3),
            SeriesPoint::new(key("01:00"), 0.0),
        ];

        let combined = combine_panels(&[
            ("panelAPower".to_string(), a),
            ("panelBPower".to_string(), b),
        ]);

        assert_eq!(combined.len(), 2);
        for point in &combined {
            let a = point.panel_value("panelAPower").unwrap();
            let b = point.panel_value("panelBPower").unwrap();
            assert_eq!(point.total_power, a + b);
        }
        assert_eq!(combined[0].total_power, 1.1 + 3.3);
    }

    #[test]
    fn test_combine_orders_numerically_and_fills_missing_keys() {
        let a = vec![
            SeriesPoint::new(key("10:00"), 10.0),
            SeriesPoint::new(key("9:00"), 9.0),
            SeriesPoint::new(key("11:00"), 11.0),
        ];
        let b = vec![
            SeriesPoint::new(key("11:00"), 1.0),
            SeriesPoint::new(key("2:00"), 2.0),
        ];

        let combined = combine_panels(&[("a".to_string(), a), ("b".to_string(), b)]);

        let keys: Vec<String> = combined.iter().map(|p| p.time.to_string()).collect();
        assert_eq!(keys, vec!["02:00", "09:00", "10:00", "11:00"]);
        assert_eq!(combined[0].panel_value("a"), Some(0.0));
        assert_eq!(combined[0].total_power, 2.0);
        assert_eq!(combined[3].total_power, 12.0);
    }

    #[test]
    fn test_cutoff_at_latest_reading_today() {
        // 14:50 local now, latest reading 14:37 local
        let now = utc("2025-04-17T07:50:00Z");
        let latest = utc("2025-04-17T07:37:00Z");

        let cutoff = current_day_cutoff(
            date("2025-04-17"),
            now,
            &Jakarta,
            Granularity::Hour,
            Some(latest),
        );
        assert_eq!(cutoff, Some(key("14:00")));

        let series = assemble_series(
            &[],
            date("2025-04-17"),
            &Jakarta,
            Granularity::Hour,
            Metric::Power,
            Phase::R,
        );
        let truncated = truncate_after(series, cutoff);
        assert_eq!(truncated.len(), 15);
        assert_eq!(truncated.last().unwrap().time, key("14:00"));
    }

    #[test]
    fn test_cutoff_minute_granularity() {
        let now = utc("2025-04-17T07:50:00Z");
        let latest = utc("2025-04-17T07:37:00Z");

        let cutoff = current_day_cutoff(
            date("2025-04-17"),
            now,
            &Jakarta,
            Granularity::Minute,
            Some(latest),
        );
        assert_eq!(cutoff, Some(key("14:37")));
    }

    #[test]
    fn test_cutoff_without_reading_today_is_midnight() {
        let now = utc("2025-04-17T07:50:00Z");
        // Yesterday's reading
        let latest = utc("2025-04-16T12:00:00Z");

        assert_eq!(
            current_day_cutoff(date("2025-04-17"), now, &Jakarta, Granularity::Hour, None),
            Some(BucketKey::MIDNIGHT)
        );
        assert_eq!(
            current_day_cutoff(
                date("2025-04-17"),
                now,
                &Jakarta,
                Granularity::Hour,
                Some(latest)
            ),
            Some(BucketKey::MIDNIGHT)
        );
    }

    #[test]
    fn test_cutoff_other_days_show_full_day() {
        let now = utc("2025-04-17T07:50:00Z");
        let latest = utc("2025-04-17T07:37:00Z");

        let cutoff = current_day_cutoff(
            date("2025-04-10"),
            now,
            &Jakarta,
            Granularity::Hour,
            Some(latest),
        );
        assert_eq!(cutoff, None);

        let series = assemble_series(
            &[],
            date("2025-04-10"),
            &Jakarta,
            Granularity::Hour,
            Metric::Power,
            Phase::R,
        );
        assert_eq!(truncate_after(series, cutoff).len(), 24);
    }

    #[test]
    fn test_cutoff_ignores_readings_ahead_of_clock() {
        let now = utc("2025-04-17T07:50:00Z");
        // Already 2025-04-18 in Jakarta
        let latest = utc("2025-04-17T18:00:00Z");

        assert_eq!(
            current_day_cutoff(
                date("2025-04-17"),
                now,
                &Jakarta,
                Granularity::Hour,
                Some(latest)
            ),
            None
        );
    }
}
