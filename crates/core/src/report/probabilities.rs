use crate::domain::message::NormalizedMessage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementStats {
    pub group_size: usize,
    pub number_of_clicks: usize,
    pub number_of_conversions: usize,
    pub number_of_conversions_without_click: usize,
    pub probability_of_click: f64,
    pub probability_of_conversion: f64,
    /// `P(conversion) / P(click)`. Only a conditional probability when every conversion was clicked.
    pub conversion_to_click_ratio: Option<f64>,
    /// `P(conversion and click) / P(click)`.
    pub probability_of_conversion_given_clicked: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementReport {
    /// Grouping name → group value → stats.
    pub groups: BTreeMap<String, BTreeMap<String, EngagementStats>>,
    pub conversions_without_click: usize,
}

#[derive(Default)]
struct Tally {
    size: usize,
    clicks: usize,
    conversions: usize,
    clicked_conversions: usize,
}

impl Tally {
    fn add(&mut self, m: &NormalizedMessage) {
        self.size += 1;
        self.clicks += usize::from(m.clicked);
        self.conversions += usize::from(m.converted);
        self.clicked_conversions += usize::from(m.clicked && m.converted);
    }

    fn stats(&self) -> EngagementStats {
        let n = self.size as f64;
        let p_click = self.clicks as f64 / n;
        let p_conversion = self.conversions as f64 / n;
        let has_clicks = self.clicks > 0;

        EngagementStats {
            group_size: self.size,
            number_of_clicks: self.clicks,
            number_of_conversions: self.conversions,
            number_of_conversions_without_click: self.conversions - self.clicked_conversions,
            probability_of_click: p_click,
            probability_of_conversion: p_conversion,
            conversion_to_click_ratio: has_clicks.then(|| p_conversion / p_click),
            probability_of_conversion_given_clicked: has_clicks
                .then(|| self.clicked_conversions as f64 / self.clicks as f64),
        }
    }
}

type Grouping = (&'static str, fn(&NormalizedMessage) -> String);

/// Click and conversion rates by day of week, hour of day and time window.
pub fn engagement_report(messages: &[NormalizedMessage]) -> EngagementReport {
    let groupings: [Grouping; 3] = [
        ("messageSentAtDayOfWeek", |m| m.day_of_week_name().to_string()),
        ("messageSentAtHour", |m| m.hour.to_string()),
        ("messageTimeWindow", |m| m.time_window.label()),
    ];

    let mut groups = BTreeMap::new();
    for (name, key_of) in groupings {
        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        for m in messages {
            tallies.entry(key_of(m)).or_default().add(m);
        }
        let stats = tallies.into_iter().map(|(k, t)| (k, t.stats())).collect();
        groups.insert(name.to_string(), stats);
    }

    let conversions_without_click = messages.iter().filter(|m| m.converted && !m.clicked).count();
    if conversions_without_click > 0 {
        tracing::warn!(
            conversions_without_click,
            "conversions recorded without a click; P(conversion)/P(click) is not P(conversion | click)"
        );
    }

    EngagementReport {
        groups,
        conversions_without_click,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::window::TimeWindow;
    use chrono::{Datelike, TimeZone, Timelike, Utc};

    fn message(hour: u32, clicked: bool, converted: bool) -> NormalizedMessage {
        let sent_at = Utc.with_ymd_and_hms(2021, 10, 4, hour, 0, 0).unwrap();
        NormalizedMessage {
            message_id: 0,
            customer_id: 1,
            client_id: None,
            customer_country: None,
            client_country: None,
            sent_at,
            year: sent_at.year(),
            month: sent_at.month(),
            day: sent_at.day(),
            hour: sent_at.hour(),
            minute: 0,
            second: 0,
            microsecond: 0,
            day_of_week: sent_at.weekday(),
            days_since_customer_created: None,
            time_window: TimeWindow::of(sent_at),
            clicked,
            converted,
        }
    }

    #[test]
    fn ratio_and_conditional_agree_when_conversions_imply_clicks() {
        let messages = vec![
            message(9, true, true),
            message(9, true, false),
            message(9, false, false),
            message(9, false, false),
        ];
        let report = engagement_report(&messages);
        let s = &report.groups["messageTimeWindow"]["Monday_09"];

        assert_eq!(s.group_size, 4);
        assert_eq!(s.probability_of_click, 0.5);
        assert_eq!(s.probability_of_conversion, 0.25);
        assert_eq!(s.conversion_to_click_ratio, Some(0.5));
        assert_eq!(s.probability_of_conversion_given_clicked, Some(0.5));
        assert_eq!(report.conversions_without_click, 0);
    }

    #[test]
    fn flags_conversions_without_click() {
        let messages = vec![
            message(10, true, false),
            message(10, false, true),
            message(10, false, true),
        ];
        let report = engagement_report(&messages);
        let s = &report.groups["messageSentAtHour"]["10"];

        // 2/3 over 1/3 is 2.0, which is not a probability.
        assert!((s.conversion_to_click_ratio.unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(s.probability_of_conversion_given_clicked, Some(0.0));
        assert_eq!(s.number_of_conversions_without_click, 2);
        assert_eq!(report.conversions_without_click, 2);
    }

    #[test]
    fn groups_without_clicks_have_no_ratio() {
        let report = engagement_report(&[message(3, false, false)]);
        let s = &report.groups["messageSentAtDayOfWeek"]["Monday"];
        assert_eq!(s.conversion_to_click_ratio, None);
        assert_eq!(s.probability_of_conversion_given_clicked, None);
    }
}
