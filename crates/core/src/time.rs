//! TIME / DATE / TIME_OF_DAY / DATE_AND_TIME literal parsing
//!
//! Shared by the tokenizer (literal recognition) and the evaluator's
//! numeric coercion (strings prefixed `T#` convert through here).
//!
//! Unit convention: durations and times of day are milliseconds, dates
//! are whole days since 1970-01-01 UTC, DATE_AND_TIME is milliseconds
//! since 1970-01-01 UTC. No calendar crate: the civil-date math is a
//! few lines and keeps the core dependency-free.

/// Strip one of several case-insensitive prefixes, longest first
fn strip_prefix_ci<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    for p in prefixes {
        if text.len() >= p.len()
            && text.is_char_boundary(p.len())
            && text[..p.len()].eq_ignore_ascii_case(p)
        {
            return Some(&text[p.len()..]);
        }
    }
    None
}

/// Parse a TIME literal (`T#...` or `TIME#...`) to milliseconds.
///
/// Units `d`, `h`, `m`, `s`, `ms` may appear in any combination and any
/// order; each accepts a decimal value and `_` digit separators. `ms`
/// must be tested before `m` or `s` so `T#500ms` is 500 ms and not
/// 500 minutes followed by a stray `s`.
pub fn parse_time(text: &str) -> Option<f64> {
    let body = strip_prefix_ci(text, &["TIME#", "T#"])?;
    parse_duration_body(body)
}

/// Parse the unit/value body of a TIME literal (no prefix)
pub fn parse_duration_body(body: &str) -> Option<f64> {
    if body.is_empty() {
        return None;
    }

    let bytes = body.as_bytes();
    let mut i = 0;
    let mut total_ms = 0.0f64;
    let mut saw_component = false;

    while i < bytes.len() {
        // Digit separators between components
        while i < bytes.len() && bytes[i] == b'_' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let num_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.' || bytes[i] == b'_')
        {
            i += 1;
        }
        if i == num_start {
            return None;
        }
        let num_str: String = body[num_start..i].chars().filter(|c| *c != '_').collect();
        let value: f64 = num_str.parse().ok()?;

        // Unit: ms before m or s
        let multiplier = if i + 1 < bytes.len()
            && bytes[i].to_ascii_lowercase() == b'm'
            && bytes[i + 1].to_ascii_lowercase() == b's'
        {
            i += 2;
            1.0
        } else if i < bytes.len() {
            let unit = bytes[i].to_ascii_lowercase();
            i += 1;
            match unit {
                b'd' => 86_400_000.0,
                b'h' => 3_600_000.0,
                b'm' => 60_000.0,
                b's' => 1_000.0,
                _ => return None,
            }
        } else {
            return None;
        };

        total_ms += value * multiplier;
        saw_component = true;
    }

    if saw_component { Some(total_ms) } else { None }
}

/// Parse a DATE literal (`D#YYYY-MM-DD` or `DATE#...`) to days since
/// 1970-01-01 UTC
pub fn parse_date(text: &str) -> Option<i64> {
    let body = strip_prefix_ci(text, &["DATE#", "D#"])?;
    parse_civil_body(body)
}

fn parse_civil_body(body: &str) -> Option<i64> {
    let mut parts = body.splitn(3, '-');
    let year: i64 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(days_from_civil(year, month, day))
}

/// Parse a TIME_OF_DAY literal (`TOD#HH:MM:SS[.mmm]` or
/// `TIME_OF_DAY#...`) to milliseconds since midnight
pub fn parse_time_of_day(text: &str) -> Option<f64> {
    let body = strip_prefix_ci(text, &["TIME_OF_DAY#", "TOD#"])?;
    parse_clock_body(body)
}

fn parse_clock_body(body: &str) -> Option<f64> {
    let mut parts = body.splitn(3, ':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if hours > 23 || minutes > 59 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(f64::from(hours) * 3_600_000.0 + f64::from(minutes) * 60_000.0 + seconds * 1_000.0)
}

/// Parse a DATE_AND_TIME literal (`DT#YYYY-MM-DD-HH:MM:SS[.mmm]` or
/// `DATE_AND_TIME#...`) to milliseconds since 1970-01-01 UTC
pub fn parse_date_and_time(text: &str) -> Option<f64> {
    let body = strip_prefix_ci(text, &["DATE_AND_TIME#", "DT#"])?;

    // Split on the third '-': YYYY-MM-DD-HH:MM:SS
    let mut dash_count = 0;
    let mut split_at = None;
    for (idx, ch) in body.char_indices() {
        if ch == '-' {
            dash_count += 1;
            if dash_count == 3 {
                split_at = Some(idx);
                break;
            }
        }
    }
    let split_at = split_at?;
    let days = parse_civil_body(&body[..split_at])?;
    let clock_ms = parse_clock_body(&body[split_at + 1..])?;
    Some(days as f64 * 86_400_000.0 + clock_ms)
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
/// Howard Hinnant's days_from_civil, valid for all i64-representable years.
pub fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 } as i64;
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`]: (year, month, day)
pub fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}

/// Render a millisecond duration in TIME literal form, e.g. `T#1h30m`.
/// Zero renders as `T#0ms`; sub-millisecond fractions stay on the ms part.
pub fn format_time(ms: f64) -> String {
    if !ms.is_finite() {
        return format!("T#{}ms", ms);
    }
    let negative = ms < 0.0;
    let mut remaining = ms.abs();
    let mut out = String::from(if negative { "T#-" } else { "T#" });

    let units: [(&str, f64); 4] = [
        ("d", 86_400_000.0),
        ("h", 3_600_000.0),
        ("m", 60_000.0),
        ("s", 1_000.0),
    ];
    for (suffix, unit_ms) in units {
        let count = (remaining / unit_ms).floor();
        if count >= 1.0 {
            out.push_str(&format!("{}{}", count as i64, suffix));
            remaining -= count * unit_ms;
        }
    }
    if remaining > 0.0 || out.ends_with('#') || out.ends_with('-') {
        if remaining.fract() == 0.0 {
            out.push_str(&format!("{}ms", remaining as i64));
        } else {
            out.push_str(&format!("{}ms", remaining));
        }
    }
    out
}

/// Render days-since-epoch in DATE literal form, e.g. `D#2024-01-15`
pub fn format_date(days: i64) -> String {
    let (y, m, d) = civil_from_days(days);
    format!("D#{:04}-{:02}-{:02}", y, m, d)
}

/// Render ms-since-midnight in TOD literal form, e.g. `TOD#14:30:00.500`
pub fn format_time_of_day(ms: f64) -> String {
    let total = ms.max(0.0) as i64;
    let hours = total / 3_600_000;
    let minutes = (total % 3_600_000) / 60_000;
    let seconds = (total % 60_000) / 1_000;
    let millis = total % 1_000;
    if millis == 0 {
        format!("TOD#{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!(
            "TOD#{:02}:{:02}:{:02}.{:03}",
            hours, minutes, seconds, millis
        )
    }
}

/// Render ms-since-epoch in DT literal form,
/// e.g. `DT#2024-01-15-14:30:00.500`
pub fn format_date_and_time(ms: f64) -> String {
    let days = (ms / 86_400_000.0).floor() as i64;
    let clock = ms - days as f64 * 86_400_000.0;
    let (y, m, d) = civil_from_days(days);
    let tod = format_time_of_day(clock);
    format!("DT#{:04}-{:02}-{:02}-{}", y, m, d, &tod[4..])
}
