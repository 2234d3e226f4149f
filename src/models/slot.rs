use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    pub fn new(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(duration_minutes),
        }
    }

    /// Half-open overlap: touching intervals do not conflict.
    pub fn overlaps(&self, busy: &BusyInterval) -> bool {
        self.start < busy.end && self.end > busy.start
    }
}

/// An occupied range in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// Busy period as reported by the aggregate free/busy feed.
#[derive(Debug, Clone, Deserialize)]
pub struct BusyPeriod {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl EventTime {
    pub fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// Event as listed by the calendar; either bound may be missing in a malformed feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
}

/// Parses an RFC 3339 instant (converted into `offset`) or an all-day
/// `YYYY-MM-DD` date (local midnight).
pub fn parse_calendar_time(raw: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(offset).naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl BusyPeriod {
    pub fn to_interval(&self, offset: &FixedOffset) -> Option<BusyInterval> {
        let start = parse_calendar_time(&self.start, offset)?;
        let end = parse_calendar_time(&self.end, offset)?;
        (end > start).then_some(BusyInterval { start, end })
    }
}

impl EventRecord {
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("Untitled")
    }

    pub fn to_interval(&self, offset: &FixedOffset) -> Option<BusyInterval> {
        let start = parse_calendar_time(self.start.as_ref()?.value()?, offset)?;
        let end = parse_calendar_time(self.end.as_ref()?.value()?, offset)?;
        (end > start).then_some(BusyInterval { start, end })
    }
}

/// "Wednesday at 02:00 PM"
pub fn format_slot(slot: &NaiveDateTime) -> String {
    slot.format("%A at %I:%M %p").to_string()
}

pub fn format_slots(slots: &[NaiveDateTime]) -> Vec<String> {
    slots.iter().map(format_slot).collect()
}
