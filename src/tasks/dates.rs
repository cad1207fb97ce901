//! Calendar validation and sort keys for the date/time values tasks carry.

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
            if leap {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `(year, month, day)` from `YYYY-MM-DD` or `DD-MM-YYYY`.
pub fn parse_date(date: &str) -> Option<(i32, u32, u32)> {
    let parts: Vec<&str> = date.split('-').collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    let (year, month, day) = match (a.len(), b.len(), c.len()) {
        (4, 2, 2) => (digits(a)?, digits(b)?, digits(c)?),
        (2, 2, 4) => (digits(c)?, digits(b)?, digits(a)?),
        _ => return None,
    };
    let year = year as i32;
    if !(1..=12).contains(&month) {
        return None;
    }
    if day < 1 || day > days_in_month(year, month) {
        return None;
    }
    Some((year, month, day))
}

pub fn is_valid_date(date: &str) -> bool {
    parse_date(date).is_some()
}

/// `HH:MM` (or `H:MM`) as minutes since midnight.
pub fn parse_clock(raw: &str) -> Option<u32> {
    let (h, m) = raw.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let h = digits(h)?;
    let m = digits(m)?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// A date optionally followed by `/HH:MM`, `THH:MM` or ` HH:MM`.
pub fn parse_date_time(raw: &str) -> Option<(i32, u32, u32, u32)> {
    let raw = raw.trim();
    let (date, clock) = match raw.find(&['/', 'T', ' '][..]) {
        Some(idx) => (&raw[..idx], Some(&raw[idx + 1..])),
        None => (raw, None),
    };
    let (y, m, d) = parse_date(date)?;
    let minutes = match clock {
        Some(c) => parse_clock(c)?,
        None => 0,
    };
    Some((y, m, d, minutes))
}

pub fn is_valid_date_time(raw: &str) -> bool {
    parse_date_time(raw).is_some()
}

/// Start minute of a time range. Only the part before the first `-` is
/// considered.
pub fn time_range_start(raw: &str) -> Option<u32> {
    let start = raw.split('-').next().unwrap_or(raw);
    parse_clock(start)
}

/// `HH:MM - HH:MM`, `HH:MM-HH:MM` or a bare `HH:MM`.
pub fn is_valid_time_range(raw: &str) -> bool {
    let mut parts = raw.split('-');
    let Some(start) = parts.next() else {
        return false;
    };
    if parse_clock(start).is_none() {
        return false;
    }
    match (parts.next(), parts.next()) {
        (None, _) => true,
        (Some(end), None) => parse_clock(end).is_some(),
        _ => false,
    }
}

/// Reminders are a date, a date and a clock time, or just a clock time.
pub fn is_valid_reminder(raw: &str) -> bool {
    parse_date_time(raw).is_some() || parse_clock(raw).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_calendar_dates_in_both_orders() {
        assert_eq!(parse_date("2024-02-29"), Some((2024, 2, 29)));
        assert_eq!(parse_date("29-02-2024"), Some((2024, 2, 29)));
        assert!(!is_valid_date("2023-02-29"));
        assert!(!is_valid_date("2024-13-45"));
        assert!(!is_valid_date("2024-1-05"));
        assert!(!is_valid_date("tomorrow"));
    }

    #[test]
    fn date_time_suffixes() {
        assert_eq!(parse_date_time("2024-09-21/12:20"), Some((2024, 9, 21, 740)));
        assert_eq!(parse_date_time("2024-09-21T08:05"), Some((2024, 9, 21, 485)));
        assert_eq!(parse_date_time("2024-09-21"), Some((2024, 9, 21, 0)));
        assert!(parse_date_time("2024-09-21/25:00").is_none());
    }

    #[test]
    fn time_ranges() {
        assert_eq!(time_range_start("09:00 - 10:00"), Some(540));
        assert_eq!(time_range_start("9:30-10:00"), Some(570));
        assert_eq!(time_range_start("24:00 - 25:00"), None);
        assert!(is_valid_time_range("09:00 - 10:00"));
        assert!(is_valid_time_range("14:15"));
        assert!(!is_valid_time_range("09:00 - 10:00 - 11:00"));
        assert!(!is_valid_time_range("morning"));
    }
}
