use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn day_name(day: Weekday) -> &'static str {
    DAY_NAMES[day.num_days_from_monday() as usize]
}

/// A recurring (day-of-week, hour-of-day) slot, labelled `"{Day}_{HH}"`.
///
/// Ordering is chronological within a week: Monday 00 first, Sunday 23 last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow {
    day: Weekday,
    hour: u32,
}

impl TimeWindow {
    pub fn new(day: Weekday, hour: u32) -> EngineResult<Self> {
        if hour > 23 {
            return Err(EngineError::MalformedTimeWindow(format!(
                "{}_{hour:02}",
                day_name(day)
            )));
        }
        Ok(Self { day, hour })
    }

    pub fn of(sent_at: DateTime<Utc>) -> Self {
        Self {
            day: sent_at.weekday(),
            hour: sent_at.hour(),
        }
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:02}", day_name(self.day), self.hour)
    }
}

impl FromStr for TimeWindow {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EngineError::MalformedTimeWindow(s.to_string());

        let (day, hour) = s.trim().split_once('_').ok_or_else(malformed)?;
        let day = DAY_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(day))
            .map(|idx| WEEKDAYS[idx])
            .ok_or_else(malformed)?;
        let hour: u32 = hour.parse().map_err(|_| malformed())?;
        if hour > 23 {
            return Err(malformed());
        }

        Ok(Self { day, hour })
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(value: TimeWindow) -> Self {
        value.to_string()
    }
}

impl Ord for TimeWindow {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.day.num_days_from_monday(), self.hour)
            .cmp(&(other.day.num_days_from_monday(), other.hour))
    }
}

impl PartialOrd for TimeWindow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn labels_pad_the_hour() {
        let sent_at = Utc.with_ymd_and_hms(2021, 10, 6, 7, 46, 49).unwrap();
        assert_eq!(TimeWindow::of(sent_at).label(), "Wednesday_07");
    }

    #[test]
    fn parses_labels_back() {
        let w: TimeWindow = "Saturday_23".parse().unwrap();
        assert_eq!(w.day(), Weekday::Sat);
        assert_eq!(w.hour(), 23);
        assert_eq!(w.to_string(), "Saturday_23");
    }

    #[test]
    fn rejects_malformed_labels() {
        for bad in ["Monday", "Funday_10", "Monday_24", "Monday_xx", ""] {
            assert!(
                matches!(bad.parse::<TimeWindow>(), Err(EngineError::MalformedTimeWindow(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn orders_chronologically_within_the_week() {
        let mut windows: Vec<TimeWindow> = ["Sunday_01", "Monday_09", "Monday_08", "Friday_00"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        windows.sort();
        let labels: Vec<String> = windows.iter().map(TimeWindow::label).collect();
        assert_eq!(labels, ["Monday_08", "Monday_09", "Friday_00", "Sunday_01"]);
    }

    #[test]
    fn serializes_as_label() {
        let w: TimeWindow = "Tuesday_05".parse().unwrap();
        assert_eq!(serde_json::to_string(&w).unwrap(), "\"Tuesday_05\"");
        let back: TimeWindow = serde_json::from_str("\"Tuesday_05\"").unwrap();
        assert_eq!(back, w);
    }
}
