use std::sync::Arc;

use chrono::{
    Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Weekday,
};

use crate::errors::CallError;
use crate::models::{BusyInterval, TimeSlot, TimeWindow};
use crate::services::calendar::CalendarBackend;

const GRID_MINUTES: i64 = 30;
const FALLBACK_DAYS: usize = 3;
const FALLBACK_HOURS: [u32; 2] = [10, 14];

#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub lookahead_days: i64,
    pub slot_minutes: i64,
    pub business_start: NaiveTime,
    pub business_end: NaiveTime,
    pub max_slots: usize,
    pub max_candidates: usize,
    /// Pins the owner's UTC offset. `None` follows the host time zone,
    /// resolved per search and per booking so DST changes are honoured.
    pub utc_offset: Option<FixedOffset>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 3,
            slot_minutes: 30,
            business_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            business_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            max_slots: 5,
            max_candidates: 10,
            utc_offset: None,
        }
    }
}

impl SchedulingConfig {
    /// Offset in effect at the given local wall-clock time.
    pub fn offset_at(&self, local: NaiveDateTime) -> FixedOffset {
        if let Some(offset) = self.utc_offset {
            return offset;
        }
        Local
            .from_local_datetime(&local)
            .earliest()
            .map(|t| *t.offset())
            .unwrap_or_else(|| *Local::now().offset())
    }

    fn day_start(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.business_start)
    }

    fn is_business_day(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

pub struct SchedulingEngine {
    calendar: Arc<dyn CalendarBackend>,
    config: SchedulingConfig,
}

impl SchedulingEngine {
    pub fn new(calendar: Arc<dyn CalendarBackend>, config: SchedulingConfig) -> Self {
        Self { calendar, config }
    }

    /// Free callback slots starting from `now`. Never fails: when the calendar
    /// cannot be read the deterministic fallback set is returned instead.
    pub async fn free_slots(&self, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        match self.search(now).await {
            Ok(slots) => {
                tracing::info!(count = slots.len(), "found free slots");
                slots
            }
            Err(e) => {
                tracing::warn!(error = %e, "calendar unavailable, using fallback slots");
                fallback_slots(now, &self.config)
            }
        }
    }

    async fn search(&self, now: NaiveDateTime) -> Result<Vec<NaiveDateTime>, CallError> {
        let offset = self.config.offset_at(now);
        let window = local_window(now, Duration::days(self.config.lookahead_days), offset)?;

        let busy = self
            .calendar
            .query_busy(&window)
            .await
            .map_err(|e| CallError::TransientService(format!("free/busy query: {e:#}")))?;
        let events = self
            .calendar
            .list_events(&window)
            .await
            .map_err(|e| CallError::TransientService(format!("event listing: {e:#}")))?;

        let mut intervals = Vec::with_capacity(busy.len() + events.len());
        for period in &busy {
            match period.to_interval(&offset) {
                Some(interval) => intervals.push(interval),
                None => tracing::warn!(start = %period.start, end = %period.end, "skipping malformed busy period"),
            }
        }
        for event in &events {
            match event.to_interval(&offset) {
                Some(interval) => intervals.push(interval),
                None => tracing::warn!(title = event.title(), "skipping malformed event"),
            }
        }

        let window_end = window.end.naive_local();
        Ok(find_free_slots(now, window_end, &intervals, &self.config))
    }

    pub async fn book(
        &self,
        start: NaiveDateTime,
        label: &str,
        notes: &str,
    ) -> Result<Option<String>, CallError> {
        let offset = self.config.offset_at(start);
        let window = local_window(start, Duration::minutes(self.config.slot_minutes), offset)?;
        self.calendar
            .create_event(&window, label, notes)
            .await
            .map_err(|e| CallError::TransientService(format!("event creation: {e:#}")))
    }
}

fn local_window(
    start: NaiveDateTime,
    length: Duration,
    offset: FixedOffset,
) -> Result<TimeWindow, CallError> {
    let start = offset
        .from_local_datetime(&start)
        .single()
        .ok_or_else(|| CallError::TransientService(format!("invalid local time {start}")))?;
    Ok(TimeWindow {
        start,
        end: start + length,
    })
}

/// Rounds up onto the half-hour grid; times already on the grid stay put.
fn ceil_to_grid(t: NaiveDateTime) -> NaiveDateTime {
    let minutes = (t.hour() * 60 + t.minute()) as i64;
    let on_grid = minutes % GRID_MINUTES == 0 && t.second() == 0 && t.nanosecond() == 0;
    let target = if on_grid {
        minutes
    } else {
        (minutes / GRID_MINUTES + 1) * GRID_MINUTES
    };
    t.date().and_time(NaiveTime::MIN) + Duration::minutes(target)
}

/// Walks a cursor through business hours and collects slots that overlap no
/// busy interval. A conflict moves the cursor to the end of the blocking interval.
pub fn find_free_slots(
    now: NaiveDateTime,
    window_end: NaiveDateTime,
    busy: &[BusyInterval],
    config: &SchedulingConfig,
) -> Vec<NaiveDateTime> {
    let mut free = Vec::new();
    let mut cursor = ceil_to_grid(now);

    if cursor.time() >= config.business_end {
        cursor = config.day_start(cursor.date() + Duration::days(1));
    }

    while cursor < window_end && free.len() < config.max_candidates {
        if cursor.time() < config.business_start {
            cursor = config.day_start(cursor.date());
            continue;
        }
        if cursor.time() >= config.business_end
            || !SchedulingConfig::is_business_day(cursor.date())
        {
            cursor = config.day_start(cursor.date() + Duration::days(1));
            continue;
        }

        let slot = TimeSlot::new(cursor, config.slot_minutes);
        match busy.iter().find(|b| slot.overlaps(b)) {
            Some(blocking) => {
                tracing::debug!(slot = %cursor, busy_until = %blocking.end, "slot conflicts");
                cursor = ceil_to_grid(blocking.end);
            }
            None => {
                free.push(cursor);
                cursor = slot.end;
            }
        }
    }

    free.truncate(config.max_slots);
    free
}

/// Two slots (10:00 and 14:00) on each of the next business days.
pub fn fallback_slots(now: NaiveDateTime, config: &SchedulingConfig) -> Vec<NaiveDateTime> {
    let mut slots = Vec::new();
    let mut date = now.date();
    let mut days = 0;

    while days < FALLBACK_DAYS {
        date += Duration::days(1);
        if !SchedulingConfig::is_business_day(date) {
            continue;
        }
        days += 1;
        slots.extend(
            FALLBACK_HOURS
                .iter()
                .filter_map(|h| date.and_hms_opt(*h, 0, 0)),
        );
    }

    slots.truncate(config.max_slots);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusyPeriod, EventRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn config() -> SchedulingConfig {
        SchedulingConfig {
            utc_offset: FixedOffset::east_opt(0),
            ..SchedulingConfig::default()
        }
    }

    fn busy(start: &str, end: &str) -> BusyInterval {
        BusyInterval {
            start: dt(start),
            end: dt(end),
        }
    }

    fn search(now: &str, intervals: &[BusyInterval]) -> Vec<NaiveDateTime> {
        let cfg = config();
        let now = dt(now);
        find_free_slots(now, now + Duration::days(cfg.lookahead_days), intervals, &cfg)
    }

    fn assert_business_hours(slots: &[NaiveDateTime]) {
        for s in slots {
            assert!(!matches!(s.weekday(), Weekday::Sat | Weekday::Sun), "{s} on weekend");
            assert!(s.hour() >= 9 && s.hour() < 17, "{s} outside hours");
        }
    }

    // 2025-06-16 is a Monday

    #[test]
    fn test_empty_calendar_from_morning() {
        let slots = search("2025-06-16 08:10", &[]);
        assert_eq!(
            slots,
            vec![
                dt("2025-06-16 09:00"),
                dt("2025-06-16 09:30"),
                dt("2025-06-16 10:00"),
                dt("2025-06-16 10:30"),
                dt("2025-06-16 11:00"),
            ]
        );
    }

    #[test]
    fn test_cursor_rounds_up_to_grid() {
        let slots = search("2025-06-16 10:17", &[]);
        assert_eq!(slots[0], dt("2025-06-16 10:30"));
    }

    #[test]
    fn test_after_hours_starts_next_business_day() {
        // Friday evening rolls over the weekend
        let slots = search("2025-06-20 17:45", &[]);
        assert_eq!(slots[0], dt("2025-06-23 09:00"));
        assert_business_hours(&slots);
    }

    #[test]
    fn test_skips_busy_interval_from_either_feed() {
        let intervals = [
            busy("2025-06-16 09:00", "2025-06-16 10:00"),
            busy("2025-06-16 10:30", "2025-06-16 11:15"),
        ];
        let slots = search("2025-06-16 09:00", &intervals);
        assert_eq!(
            slots,
            vec![
                dt("2025-06-16 10:00"),
                dt("2025-06-16 11:30"),
                dt("2025-06-16 12:00"),
                dt("2025-06-16 12:30"),
                dt("2025-06-16 13:00"),
            ]
        );
        for s in &slots {
            let slot = TimeSlot::new(*s, 30);
            assert!(intervals.iter().all(|b| !slot.overlaps(b)));
        }
    }

    #[test]
    fn test_all_day_busy_moves_to_next_day() {
        let intervals = [busy("2025-06-16 00:00", "2025-06-17 00:00")];
        let slots = search("2025-06-16 09:00", &intervals);
        assert_eq!(slots[0], dt("2025-06-17 09:00"));
    }

    #[test]
    fn test_fully_booked_window_is_empty() {
        let intervals = [busy("2025-06-16 00:00", "2025-06-30 00:00")];
        assert!(search("2025-06-16 09:00", &intervals).is_empty());
    }

    #[test]
    fn test_late_afternoon_invariants() {
        let slots = search("2025-06-18 16:20", &[busy("2025-06-19 09:00", "2025-06-19 12:00")]);
        assert!(slots.len() <= 5);
        assert_eq!(slots[0], dt("2025-06-18 16:30"));
        assert_eq!(slots[1], dt("2025-06-19 12:00"));
        assert_business_hours(&slots);
    }

    #[test]
    fn test_fallback_skips_weekend() {
        // Thursday: Friday, Monday, Tuesday
        let slots = fallback_slots(dt("2025-06-19 12:00"), &config());
        assert_eq!(
            slots,
            vec![
                dt("2025-06-20 10:00"),
                dt("2025-06-20 14:00"),
                dt("2025-06-23 10:00"),
                dt("2025-06-23 14:00"),
                dt("2025-06-24 10:00"),
            ]
        );
    }

    struct FakeCalendar {
        busy: anyhow::Result<Vec<BusyPeriod>>,
        events: Vec<EventRecord>,
        windows: Mutex<Vec<TimeWindow>>,
        created: Mutex<Vec<TimeWindow>>,
    }

    #[async_trait]
    impl CalendarBackend for FakeCalendar {
        async fn query_busy(&self, window: &TimeWindow) -> anyhow::Result<Vec<BusyPeriod>> {
            self.windows.lock().unwrap().push(*window);
            match &self.busy {
                Ok(b) => Ok(b.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }

        async fn list_events(&self, _window: &TimeWindow) -> anyhow::Result<Vec<EventRecord>> {
            Ok(self.events.clone())
        }

        async fn create_event(
            &self,
            window: &TimeWindow,
            _label: &str,
            _notes: &str,
        ) -> anyhow::Result<Option<String>> {
            self.created.lock().unwrap().push(*window);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_outage_returns_fallback() {
        let calendar = FakeCalendar {
            busy: Err(anyhow::anyhow!("401 unauthorized")),
            events: vec![],
            windows: Mutex::new(vec![]),
            created: Mutex::new(vec![]),
        };
        let engine = SchedulingEngine::new(Arc::new(calendar), config());
        let slots = engine.free_slots(dt("2025-06-16 09:00")).await;
        assert_eq!(slots, fallback_slots(dt("2025-06-16 09:00"), &config()));
        assert!(!slots.is_empty());
    }

    #[tokio::test]
    async fn test_both_feeds_checked_and_malformed_skipped() {
        let events: Vec<EventRecord> = serde_json::from_value(serde_json::json!([
            {"summary": "Dentist", "start": {"dateTime": "2025-06-16T09:30:00Z"}, "end": {"dateTime": "2025-06-16T10:00:00Z"}},
            {"summary": "Broken", "start": {"dateTime": "not a time"}, "end": {"dateTime": "2025-06-16T12:00:00Z"}}
        ]))
        .unwrap();
        let calendar = Arc::new(FakeCalendar {
            busy: Ok(vec![
                BusyPeriod {
                    start: "2025-06-16T09:00:00Z".into(),
                    end: "2025-06-16T09:30:00Z".into(),
                },
                BusyPeriod {
                    start: "garbage".into(),
                    end: "2025-06-16T17:00:00Z".into(),
                },
            ]),
            events,
            windows: Mutex::new(vec![]),
            created: Mutex::new(vec![]),
        });
        let engine = SchedulingEngine::new(calendar.clone(), config());
        let slots = engine.free_slots(dt("2025-06-16 09:00")).await;

        assert_eq!(slots[0], dt("2025-06-16 10:00"));
        assert_eq!(slots.len(), 5);

        let windows = calendar.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end - windows[0].start, Duration::days(3));
    }

    #[tokio::test]
    async fn test_booking_carries_owner_offset() {
        let calendar = Arc::new(FakeCalendar {
            busy: Ok(vec![]),
            events: vec![],
            windows: Mutex::new(vec![]),
            created: Mutex::new(vec![]),
        });
        let cfg = SchedulingConfig {
            utc_offset: FixedOffset::west_opt(4 * 3600),
            ..SchedulingConfig::default()
        };
        let engine = SchedulingEngine::new(calendar.clone(), cfg);
        engine
            .book(dt("2025-06-17 14:00"), "Dentist", "notes")
            .await
            .unwrap();

        let created = calendar.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].start.to_rfc3339(), "2025-06-17T14:00:00-04:00");
        assert_eq!(created[0].end.to_rfc3339(), "2025-06-17T14:30:00-04:00");
    }

    #[test]
    fn test_host_offset_resolved_for_each_date() {
        let cfg = SchedulingConfig::default();
        for local in [dt("2025-01-15 10:00"), dt("2025-07-15 10:00")] {
            let expected = Local
                .from_local_datetime(&local)
                .earliest()
                .map(|t| *t.offset())
                .unwrap();
            assert_eq!(cfg.offset_at(local), expected);
        }
        assert_eq!(config().offset_at(dt("2025-07-15 10:00")), FixedOffset::east_opt(0).unwrap());
    }
}
