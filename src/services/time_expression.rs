use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};
use regex::Regex;

fn weekday_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(mon(?:day)?|tue(?:s(?:day)?)?|wed(?:nesday)?|thu(?:r(?:s(?:day)?)?)?|fri(?:day)?|sat(?:urday)?|sun(?:day)?)\b",
        )
        .expect("weekday pattern is valid")
    })
}

fn meridiem_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)(?:\W|$)")
            .expect("meridiem pattern is valid")
    })
}

fn clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("clock pattern is valid"))
}

fn weekday_from(token: &str) -> Option<Weekday> {
    let t = token.to_lowercase();
    let day = match &t[..3] {
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Hour and minute in 24-hour form.
fn time_of_day(text: &str) -> Option<(u32, u32)> {
    if let Some(caps) = meridiem_re().captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        if !(1..=12).contains(&hour) || minute > 59 {
            return None;
        }
        let pm = caps[3].to_lowercase().starts_with('p');
        let hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
        return Some((hour, minute));
    }

    let caps = clock_re().captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

/// Finds a weekday plus time of day in `utterance` and projects it to the next
/// occurrence strictly after today. Relative phrases ("tomorrow") are not
/// understood; both a day and a time are required.
pub fn parse_requested_time(utterance: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let day = weekday_re()
        .captures(utterance)
        .and_then(|caps| weekday_from(&caps[1]))?;
    let (hour, minute) = time_of_day(utterance)?;

    let today = now.weekday().num_days_from_monday() as i64;
    let mut days_ahead = day.num_days_from_monday() as i64 - today;
    if days_ahead <= 0 {
        days_ahead += 7;
    }

    (now.date() + Duration::days(days_ahead)).and_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    // 2025-06-16 is a Monday
    const MONDAY_9AM: &str = "2025-06-16 09:00";

    #[test]
    fn test_weekday_and_pm() {
        let got = parse_requested_time("can we do Wednesday at 2pm", dt(MONDAY_9AM));
        assert_eq!(got, Some(dt("2025-06-18 14:00")));
    }

    #[test]
    fn test_minutes_and_abbreviation() {
        let got = parse_requested_time("how about thu 10:30 am?", dt(MONDAY_9AM));
        assert_eq!(got, Some(dt("2025-06-19 10:30")));
    }

    #[test]
    fn test_24_hour_clock() {
        let got = parse_requested_time("Friday 15:45 works", dt(MONDAY_9AM));
        assert_eq!(got, Some(dt("2025-06-20 15:45")));
    }

    #[test]
    fn test_same_weekday_goes_to_next_week() {
        // Monday 17:00 has not passed yet, still next Monday
        let got = parse_requested_time("Monday at 5pm", dt(MONDAY_9AM));
        assert_eq!(got, Some(dt("2025-06-23 17:00")));
    }

    #[test]
    fn test_passed_weekday_goes_to_next_week() {
        // 2025-06-19 is a Thursday
        let got = parse_requested_time("tuesday 9 a.m.", dt("2025-06-19 12:00"));
        assert_eq!(got, Some(dt("2025-06-24 09:00")));
    }

    #[test]
    fn test_noon_and_midnight() {
        assert_eq!(
            parse_requested_time("Wednesday 12pm", dt(MONDAY_9AM)),
            Some(dt("2025-06-18 12:00"))
        );
        assert_eq!(
            parse_requested_time("Wednesday 12am", dt(MONDAY_9AM)),
            Some(dt("2025-06-18 00:00"))
        );
    }

    #[test]
    fn test_requires_day_and_time() {
        assert_eq!(parse_requested_time("Wednesday works", dt(MONDAY_9AM)), None);
        assert_eq!(parse_requested_time("at 2pm please", dt(MONDAY_9AM)), None);
        assert_eq!(parse_requested_time("tomorrow at 2pm", dt(MONDAY_9AM)), None);
    }

    #[test]
    fn test_ignores_words_containing_day_names() {
        assert_eq!(parse_requested_time("next month at 3pm", dt(MONDAY_9AM)), None);
        assert_eq!(parse_requested_time("sunny, 3pm", dt(MONDAY_9AM)), None);
    }

    #[test]
    fn test_out_of_range_time() {
        assert_eq!(parse_requested_time("Friday at 13pm", dt(MONDAY_9AM)), None);
        assert_eq!(parse_requested_time("Friday 25:00", dt(MONDAY_9AM)), None);
    }
}
