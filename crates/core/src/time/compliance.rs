use crate::domain::window::{day_name, TimeWindow};
use crate::error::{EngineError, EngineResult};
use crate::time::timestamp::format_send_time;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Recommendations land in the week of Monday 2021-10-04 unless COMPLIANCE_WEEK_START says otherwise.
const DEFAULT_WEEK_START: (i32, u32, u32) = (2021, 10, 4);

const BUILTIN_HOURS: [(&str, HourWindow); 3] = [
    ("CA", HourWindow { open: 9, close: 17 }),
    ("NZ", HourWindow { open: 9, close: 18 }),
    ("UK", HourWindow { open: 8, close: 20 }),
];

/// Inclusive contact window for one country, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub open: u32,
    pub close: u32,
}

impl HourWindow {
    pub fn new(open: u32, close: u32) -> EngineResult<Self> {
        if open > close || close > 23 {
            return Err(EngineError::InvalidConfiguration(format!(
                "compliant hours must satisfy open <= close <= 23 (got {open}-{close})"
            )));
        }
        Ok(Self { open, close })
    }

    /// Hours before opening move to opening, hours after closing move to closing.
    pub fn compliant_hour(&self, hour: u32) -> u32 {
        hour.clamp(self.open, self.close)
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.open..=self.close).contains(&hour)
    }
}

/// Reference week (Monday to Friday) plus per-country contact hours.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceCalendar {
    week_start: NaiveDate,
    dates: [NaiveDate; 5],
    hours: BTreeMap<String, HourWindow>,
}

impl ComplianceCalendar {
    pub fn new(week_start: NaiveDate, hours: BTreeMap<String, HourWindow>) -> EngineResult<Self> {
        if week_start.weekday() != Weekday::Mon {
            return Err(EngineError::InvalidConfiguration(format!(
                "compliance week must start on a Monday (got {week_start}, a {})",
                day_name(week_start.weekday())
            )));
        }
        if hours.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "at least one country needs compliant hours".to_string(),
            ));
        }

        let dates = [0, 1, 2, 3, 4].map(|offset| week_start + Duration::days(offset));
        let hours = hours
            .into_iter()
            .map(|(country, window)| (country_key(&country), window))
            .collect();
        Ok(Self {
            week_start,
            dates,
            hours,
        })
    }

    pub fn builtin() -> Self {
        let week_start = NaiveDate::from_ymd_opt(
            DEFAULT_WEEK_START.0,
            DEFAULT_WEEK_START.1,
            DEFAULT_WEEK_START.2,
        )
        .unwrap_or_default();
        let dates = [0, 1, 2, 3, 4].map(|offset| week_start + Duration::days(offset));
        Self {
            week_start,
            dates,
            hours: builtin_hours(),
        }
    }

    /// Built-in calendar adjusted by `COMPLIANCE_WEEK_START` (YYYY-MM-DD, a Monday) and
    /// `COMPLIANCE_HOURS` ("CC:open-close,..."; entries add to or replace built-in countries).
    pub fn from_env() -> EngineResult<Self> {
        let week_start = std::env::var("COMPLIANCE_WEEK_START").ok();
        let hours = std::env::var("COMPLIANCE_HOURS").ok();
        Self::from_overrides(week_start.as_deref(), hours.as_deref())
    }

    pub fn from_overrides(week_start: Option<&str>, hours: Option<&str>) -> EngineResult<Self> {
        let builtin = Self::builtin();

        let week_start = match week_start.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                EngineError::InvalidConfiguration(format!("COMPLIANCE_WEEK_START is not a date: {s:?}"))
            })?,
            None => builtin.week_start,
        };

        let mut table = builtin.hours;
        if let Some(spec) = hours {
            for (country, window) in parse_hour_overrides(spec)? {
                table.insert(country, window);
            }
        }

        Self::new(week_start, table)
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn countries(&self) -> impl Iterator<Item = (&str, &HourWindow)> {
        self.hours.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn hour_window(&self, country: &str) -> EngineResult<HourWindow> {
        self.hours
            .get(&country_key(country))
            .copied()
            .ok_or_else(|| EngineError::UnsupportedCountry(country.to_string()))
    }

    pub fn compliant_date(&self, day: Weekday) -> EngineResult<NaiveDate> {
        match day {
            Weekday::Sat | Weekday::Sun => {
                Err(EngineError::UnsupportedDay(day_name(day).to_string()))
            }
            _ => Ok(self.dates[day.num_days_from_monday() as usize]),
        }
    }

    pub fn compliant_hour(&self, country: &str, hour: u32) -> EngineResult<u32> {
        Ok(self.hour_window(country)?.compliant_hour(hour))
    }

    /// Maps a time window onto the reference week at the country's nearest compliant hour.
    pub fn resolve(&self, window: &TimeWindow, country: &str) -> EngineResult<DateTime<Utc>> {
        let date = self.compliant_date(window.day())?;
        let hour = self.compliant_hour(country, window.hour())?;
        date.and_hms_opt(hour, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| EngineError::InvalidConfiguration(format!("hour {hour} is out of range")))
    }

    pub fn resolve_label(&self, label: &str, country: &str) -> EngineResult<String> {
        let window: TimeWindow = label.parse()?;
        self.resolve(&window, country).map(format_send_time)
    }
}

impl Default for ComplianceCalendar {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The customer's own country wins; the client's country is the fallback.
pub fn resolve_country<'a>(
    customer_id: i64,
    customer_country: Option<&'a str>,
    client_country: Option<&'a str>,
) -> EngineResult<&'a str> {
    let pick = |v: Option<&'a str>| v.map(str::trim).filter(|s| !s.is_empty());
    pick(customer_country)
        .or_else(|| pick(client_country))
        .ok_or(EngineError::MissingCountry { customer_id })
}

// Country codes compare trimmed and case-insensitively.
fn country_key(country: &str) -> String {
    country.trim().to_ascii_uppercase()
}

fn builtin_hours() -> BTreeMap<String, HourWindow> {
    BUILTIN_HOURS
        .iter()
        .map(|(country, window)| (country.to_string(), *window))
        .collect()
}

fn parse_hour_overrides(spec: &str) -> EngineResult<Vec<(String, HourWindow)>> {
    let invalid = |part: &str| {
        EngineError::InvalidConfiguration(format!(
            "COMPLIANCE_HOURS entry must look like CC:open-close (got {part:?})"
        ))
    };

    let mut out = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (country, range) = part.split_once(':').ok_or_else(|| invalid(part))?;
        let (open, close) = range.split_once('-').ok_or_else(|| invalid(part))?;
        let open: u32 = open.trim().parse().map_err(|_| invalid(part))?;
        let close: u32 = close.trim().parse().map_err(|_| invalid(part))?;
        let country = country_key(country);
        if country.is_empty() {
            return Err(invalid(part));
        }
        out.push((country, HourWindow::new(open, close)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(label: &str) -> TimeWindow {
        label.parse().unwrap()
    }

    #[test]
    fn clamps_hours_to_country_window() {
        let cal = ComplianceCalendar::builtin();
        assert_eq!(cal.compliant_hour("CA", 2).unwrap(), 9);
        assert_eq!(cal.compliant_hour("CA", 20).unwrap(), 17);
        assert_eq!(cal.compliant_hour("UK", 14).unwrap(), 14);
        assert_eq!(cal.compliant_hour("NZ", 24).unwrap(), 18);
        assert_eq!(cal.compliant_hour("UK", 0).unwrap(), 8);
    }

    #[test]
    fn maps_weekdays_onto_reference_week() {
        let cal = ComplianceCalendar::builtin();
        assert_eq!(
            cal.compliant_date(Weekday::Mon).unwrap(),
            NaiveDate::from_ymd_opt(2021, 10, 4).unwrap()
        );
        assert_eq!(
            cal.compliant_date(Weekday::Fri).unwrap(),
            NaiveDate::from_ymd_opt(2021, 10, 8).unwrap()
        );
    }

    #[test]
    fn weekend_windows_fail_fast() {
        let cal = ComplianceCalendar::builtin();
        assert_eq!(
            cal.compliant_date(Weekday::Sat).unwrap_err(),
            EngineError::UnsupportedDay("Saturday".to_string())
        );
        assert_eq!(
            cal.resolve(&window("Sunday_10"), "UK").unwrap_err(),
            EngineError::UnsupportedDay("Sunday".to_string())
        );
    }

    #[test]
    fn unknown_country_is_unsupported() {
        let cal = ComplianceCalendar::builtin();
        assert_eq!(
            cal.resolve(&window("Monday_10"), "FR").unwrap_err(),
            EngineError::UnsupportedCountry("FR".to_string())
        );
    }

    #[test]
    fn resolves_labels_to_timestamp_strings() {
        let cal = ComplianceCalendar::builtin();
        assert_eq!(
            cal.resolve_label("Monday_02", "CA").unwrap(),
            "2021-10-04 09:00:00.000000+00:00"
        );
        assert_eq!(
            cal.resolve_label("Friday_23", "NZ").unwrap(),
            "2021-10-08 18:00:00.000000+00:00"
        );
        assert_eq!(
            cal.resolve_label("Wednesday_14", "UK").unwrap(),
            "2021-10-06 14:00:00.000000+00:00"
        );
    }

    #[test]
    fn resolution_is_repeatable() {
        let cal = ComplianceCalendar::builtin();
        let first = cal.resolve_label("Thursday_19", "CA").unwrap();
        for _ in 0..10 {
            assert_eq!(cal.resolve_label("Thursday_19", "CA").unwrap(), first);
        }
    }

    #[test]
    fn every_weekday_hour_lands_inside_the_window() {
        let cal = ComplianceCalendar::builtin();
        for (country, hours) in cal.countries() {
            for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
                for hour in 0..24 {
                    let w = TimeWindow::new(day, hour).unwrap();
                    let at = cal.resolve(&w, country).unwrap();
                    assert!(hours.contains(chrono::Timelike::hour(&at)));
                }
            }
        }
    }

    #[test]
    fn country_falls_back_to_client() {
        assert_eq!(resolve_country(1, Some("UK"), Some("CA")).unwrap(), "UK");
        assert_eq!(resolve_country(1, None, Some("CA")).unwrap(), "CA");
        assert_eq!(resolve_country(1, Some("  "), Some("NZ")).unwrap(), "NZ");
        assert_eq!(
            resolve_country(7, None, None).unwrap_err(),
            EngineError::MissingCountry { customer_id: 7 }
        );
    }

    #[test]
    fn overrides_move_the_week_and_add_countries() {
        let cal = ComplianceCalendar::from_overrides(Some("2024-01-01"), Some("us:9-17, CA:10-16"))
            .unwrap();
        assert_eq!(
            cal.compliant_date(Weekday::Wed).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert_eq!(cal.compliant_hour("US", 7).unwrap(), 9);
        assert_eq!(cal.compliant_hour("CA", 9).unwrap(), 10);
        assert_eq!(cal.compliant_hour("UK", 21).unwrap(), 20);
    }

    #[test]
    fn country_codes_ignore_case_and_padding() {
        let cal = ComplianceCalendar::from_overrides(None, Some("us:9-17")).unwrap();
        assert_eq!(cal.compliant_hour("uk", 21).unwrap(), 20);
        assert_eq!(cal.compliant_hour(" Nz ", 3).unwrap(), 9);
        assert_eq!(cal.compliant_hour("Us", 18).unwrap(), 17);
        assert_eq!(
            cal.resolve_label("Monday_02", "ca").unwrap(),
            "2021-10-04 09:00:00.000000+00:00"
        );

        let mut hours = BTreeMap::new();
        hours.insert(" ie ".to_string(), HourWindow::new(8, 18).unwrap());
        let week = NaiveDate::from_ymd_opt(2021, 10, 4).unwrap();
        let custom = ComplianceCalendar::new(week, hours).unwrap();
        assert_eq!(custom.compliant_hour("IE", 23).unwrap(), 18);
        assert!(matches!(
            custom.compliant_hour("UK", 9),
            Err(EngineError::UnsupportedCountry(_))
        ));
    }

    #[test]
    fn rejects_bad_overrides() {
        assert!(ComplianceCalendar::from_overrides(Some("2024-01-02"), None).is_err());
        assert!(ComplianceCalendar::from_overrides(None, Some("US:18-9")).is_err());
        assert!(ComplianceCalendar::from_overrides(None, Some("US9-17")).is_err());
        assert!(ComplianceCalendar::from_overrides(None, Some("US:9-24")).is_err());
    }
}
