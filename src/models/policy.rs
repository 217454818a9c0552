use anyhow::Context;
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::config::AppConfig;
use crate::models::Slot;

/// Static booking policy: business hours, open days and slot
/// granularity. Parsed once from config at startup.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub business_start: NaiveTime,
    pub business_end: NaiveTime,
    pub days_open: Vec<Weekday>,
    pub slot_minutes: i64,
}

impl BookingPolicy {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let business_start = NaiveTime::parse_from_str(&config.business_start, "%H:%M")
            .with_context(|| format!("invalid BUSINESS_START: {}", config.business_start))?;
        let business_end = NaiveTime::parse_from_str(&config.business_end, "%H:%M")
            .with_context(|| format!("invalid BUSINESS_END: {}", config.business_end))?;
        anyhow::ensure!(
            business_start < business_end,
            "BUSINESS_START must be before BUSINESS_END"
        );
        anyhow::ensure!(
            config.slot_minutes > 0 && config.slot_minutes <= 24 * 60,
            "SLOT_MINUTES out of range: {}",
            config.slot_minutes
        );

        let mut days_open = Vec::new();
        for day in config.days_open.split(',') {
            days_open.push(parse_weekday(day.trim())?);
        }
        anyhow::ensure!(!days_open.is_empty(), "DAYS_OPEN must not be empty");

        Ok(Self {
            business_start,
            business_end,
            days_open,
            slot_minutes: config.slot_minutes,
        })
    }

    pub fn slot_for(&self, instant: NaiveDateTime) -> Slot {
        Slot {
            start: instant,
            minutes: self.slot_minutes,
        }
    }

    pub fn is_open_day(&self, instant: &NaiveDateTime) -> bool {
        self.days_open.contains(&instant.weekday())
    }

    /// The whole slot must fit within business hours, so the latest
    /// valid start is `business_end - slot_minutes`.
    pub fn within_hours(&self, instant: &NaiveDateTime) -> bool {
        let time = instant.time();
        let slot_end = self.slot_for(*instant).end();
        time >= self.business_start
            && slot_end.date() == instant.date()
            && slot_end.time() <= self.business_end
    }

    /// Starts must align to the slot granularity measured from midnight.
    pub fn is_aligned(&self, instant: &NaiveDateTime) -> bool {
        let minutes_from_midnight =
            i64::from(instant.hour()) * 60 + i64::from(instant.minute());
        instant.second() == 0 && minutes_from_midnight % self.slot_minutes == 0
    }

    pub fn to_human_readable(&self) -> String {
        let days = self
            .days_open
            .iter()
            .map(weekday_label)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} {}-{} ({}-minute slots)",
            days,
            self.business_start.format("%H:%M"),
            self.business_end.format("%H:%M"),
            self.slot_minutes
        )
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday in DAYS_OPEN: {s}")),
    }
}

fn weekday_label(day: &Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}
