use chrono::NaiveDateTime;

/// Picks the offered slot closest to `requested`, or the first slot when the
/// caller named no time. Ties keep the earlier-listed slot.
pub fn best_slot(
    slots: &[NaiveDateTime],
    requested: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let first = *slots.first()?;
    let Some(requested) = requested else {
        return Some(first);
    };

    let mut best = first;
    let mut best_diff = (first - requested).num_seconds().abs();
    for slot in &slots[1..] {
        let diff = (*slot - requested).num_seconds().abs();
        if diff < best_diff {
            best = *slot;
            best_diff = diff;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn offered() -> Vec<NaiveDateTime> {
        // Mon 10:00, Mon 14:00, Tue 10:00
        vec![
            dt("2025-06-16 10:00"),
            dt("2025-06-16 14:00"),
            dt("2025-06-17 10:00"),
        ]
    }

    #[test]
    fn test_nearest_slot() {
        let got = best_slot(&offered(), Some(dt("2025-06-16 13:30")));
        assert_eq!(got, Some(dt("2025-06-16 14:00")));
    }

    #[test]
    fn test_no_request_takes_first() {
        assert_eq!(best_slot(&offered(), None), Some(dt("2025-06-16 10:00")));
    }

    #[test]
    fn test_tie_keeps_earliest_listed() {
        // 12:00 is two hours from both Monday slots
        let got = best_slot(&offered(), Some(dt("2025-06-16 12:00")));
        assert_eq!(got, Some(dt("2025-06-16 10:00")));
    }

    #[test]
    fn test_far_request_still_matches() {
        let got = best_slot(&offered(), Some(dt("2025-06-27 10:00")));
        assert_eq!(got, Some(dt("2025-06-17 10:00")));
    }

    #[test]
    fn test_empty() {
        assert_eq!(best_slot(&[], Some(dt("2025-06-16 12:00"))), None);
    }
}
