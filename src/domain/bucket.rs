// Time-of-day buckets and the hour bucketer
use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    #[default]
    Hour,
    Minute,
}

impl Granularity {
    pub fn bucket_count(&self) -> usize {
        match self {
            Granularity::Hour => 24,
            Granularity::Minute => 24 * 60,
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(Granularity::Hour),
            "minute" => Ok(Granularity::Minute),
            _ => Err(s.to_string()),
        }
    }
}

/// A time-of-day slot, ordered by (hour, minute) and rendered as `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    hour: u8,
    minute: u8,
}

impl BucketKey {
    pub const MIDNIGHT: BucketKey = BucketKey { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for BucketKey {
    type Err = String;

    /// Accepts `HH:MM` as well as unpadded hours such as `9:00`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid bucket key: {}", s))?;
        let hour = hour
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid bucket hour: {}", s))?;
        let minute = minute
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid bucket minute: {}", s))?;
        BucketKey::new(hour, minute).ok_or_else(|| format!("bucket key out of range: {}", s))
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Bucket a timestamp into the target date's time-of-day slots.
///
/// The instant is rendered in `tz` before the hour is taken, so UTC-stored
/// readings land in the local hour they were observed in. Returns `None` when
/// the local date differs from `date`.
pub fn bucket_for(
    timestamp: DateTime<Utc>,
    date: NaiveDate,
    tz: &Tz,
    granularity: Granularity,
) -> Option<BucketKey> {
    let local = timestamp.with_timezone(tz);
    if local.date_naive() != date {
        return None;
    }

    let hour = local.hour() as u8;
    let minute = match granularity {
        Granularity::Hour => 0,
        Granularity::Minute => local.minute() as u8,
    };
    BucketKey::new(hour, minute)
}

/// Every bucket of a day in ascending order
pub fn all_buckets(granularity: Granularity) -> Vec<BucketKey> {
    let mut keys = Vec::with_capacity(granularity.bucket_count());
    for hour in 0..24u8 {
        match granularity {
            Granularity::Hour => keys.push(BucketKey { hour, minute: 0 }),
            Granularity::Minute => {
                keys.extend((0..60u8).map(|minute| BucketKey { hour, minute }));
            }
        }
    }
    keys
}

/// UTC bounds `[start, end)` of a calendar day in `tz`
pub fn day_window(date: NaiveDate, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_day_start(date, tz)?;
    let end = local_day_start(date.succ_opt()?, tz)?;
    Some((start, end))
}

fn local_day_start(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    // Some zones skip local midnight on DST changes; the day then starts at the first valid hour
    for hour in 0..3 {
        let naive = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }
    None
}
