//! Time-bin mapping: a UTC instant maps to one of 192 weekly buckets
//! (96 fifteen-minute slots x {weekday, weekend}).

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

pub const SLOTS_PER_DAY: u16 = 96;
pub const BIN_COUNT: u16 = 192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    fn offset(self) -> u16 {
        match self {
            DayType::Weekday => 0,
            DayType::Weekend => SLOTS_PER_DAY,
        }
    }
}

/// Maps a UTC instant (and an optional per-observation holiday flag) to a
/// bin id in `[0, 192)`. Pure function, no I/O.
///
/// `day_type` is `Weekend` if the UTC weekday is Saturday/Sunday or
/// `is_holiday` is true. `slot_of_day` is `floor((hour*60 + minute) / 15)`,
/// closed on the start of the minute and open at the end.
pub fn bin_of(t_utc: DateTime<Utc>, is_holiday: bool) -> u16 {
    let is_weekend = matches!(t_utc.weekday(), Weekday::Sat | Weekday::Sun);
    let day_type = if is_weekend || is_holiday {
        DayType::Weekend
    } else {
        DayType::Weekday
    };
    day_type.offset() + slot_of_day(t_utc)
}

fn slot_of_day(t_utc: DateTime<Utc>) -> u16 {
    let minutes_since_midnight = t_utc.hour() * 60 + t_utc.minute();
    (minutes_since_midnight / 15) as u16
}

/// Decomposes a bin id back into `(day_type, slot_of_day)`. Used by
/// reporting and tests; `bin_of` is the only path that should ever be used
/// to derive a bin id from a timestamp.
pub fn decompose(bin_id: u16) -> (DayType, u16) {
    if bin_id < SLOTS_PER_DAY {
        (DayType::Weekday, bin_id)
    } else {
        (DayType::Weekend, bin_id - SLOTS_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn bin_is_total_and_in_range() {
        for h in 0..24 {
            for mi in (0..60).step_by(7) {
                let bin = bin_of(dt(2026, 7, 27, h, mi, 0), false);
                assert!(bin < BIN_COUNT);
            }
        }
    }

    #[test]
    fn monday_boundary_at_14_30() {
        // 2026-07-27 is a Monday.
        assert_eq!(bin_of(dt(2026, 7, 27, 14, 29, 59), false), 58);
        assert_eq!(bin_of(dt(2026, 7, 27, 14, 30, 0), false), 58);
        assert_eq!(bin_of(dt(2026, 7, 27, 14, 30, 1), false), 58);
    }

    #[test]
    fn saturday_midnight_is_first_weekend_bin() {
        // 2026-08-01 is a Saturday.
        assert_eq!(bin_of(dt(2026, 8, 1, 0, 0, 0), false), 96);
    }

    #[test]
    fn holiday_flag_forces_weekend_bucket() {
        // 2026-07-27 is a Monday, normally a weekday bin.
        let weekday_bin = bin_of(dt(2026, 7, 27, 10, 0, 0), false);
        let holiday_bin = bin_of(dt(2026, 7, 27, 10, 0, 0), true);
        assert!(weekday_bin < SLOTS_PER_DAY);
        assert!(holiday_bin >= SLOTS_PER_DAY);
        assert_eq!(holiday_bin - SLOTS_PER_DAY, weekday_bin);
    }

    #[test]
    fn equal_day_type_and_slot_always_map_to_same_bin() {
        // Two different weekdays at the same slot collide onto one bin.
        let monday = bin_of(dt(2026, 7, 27, 9, 5, 0), false);
        let wednesday = bin_of(dt(2026, 7, 29, 9, 5, 0), false);
        assert_eq!(monday, wednesday);
    }
}
