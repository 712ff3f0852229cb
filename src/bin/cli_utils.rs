use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

/// Line reader for IP lists using memchr to find line ends.
/// Lines are trimmed; blank lines are skipped. A final line without a
/// trailing newline is still returned.
pub struct LineScanner<R: BufRead> {
    reader: R,
    partial: Vec<u8>,
    eof: bool,
}

impl<R: BufRead> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            partial: Vec::new(),
            eof: false,
        }
    }

    /// Next non-blank line, or `None` at end of input
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.eof {
                if self.partial.is_empty() {
                    return Ok(None);
                }
                let line = take_trimmed(&mut self.partial);
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            let buffer = self.reader.fill_buf()?;
            if buffer.is_empty() {
                self.eof = true;
                continue;
            }

            match memchr::memchr(b'\n', buffer) {
                Some(pos) => {
                    self.partial.extend_from_slice(&buffer[..pos]);
                    self.reader.consume(pos + 1);
                    let line = take_trimmed(&mut self.partial);
                    if !line.is_empty() {
                        return Ok(Some(line));
                    }
                }
                None => {
                    let consumed = buffer.len();
                    self.partial.extend_from_slice(buffer);
                    self.reader.consume(consumed);
                }
            }
        }
    }
}

fn take_trimmed(bytes: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(bytes.trim_ascii()).into_owned();
    bytes.clear();
    line
}

/// Every non-blank line of a reader
pub fn read_lines<R: BufRead>(reader: R) -> io::Result<Vec<String>> {
    let mut scanner = LineScanner::new(reader);
    let mut lines = Vec::new();
    while let Some(line) = scanner.next_line()? {
        lines.push(line);
    }
    Ok(lines)
}

/// Pretty JSON with two-space indentation
pub fn to_pretty_json(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to encode JSON")
}

/// Write pretty JSON to a file
pub fn write_json_file(path: &Path, value: &Value) -> Result<()> {
    fs::write(path, to_pretty_json(value)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Languages the way they are listed in text output: `[en de]`
pub fn format_languages(languages: &[String]) -> String {
    format!("[{}]", languages.join(" "))
}

const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

struct UtcTime {
    year: u64,
    month: u64,
    day: u64,
    hours: u64,
    minutes: u64,
    seconds: u64,
    weekday: usize,
}

fn utc_time(timestamp: u64) -> UtcTime {
    let days = timestamp / 86400;
    let remaining = timestamp % 86400;
    let (year, month, day) = days_to_ymd(days);
    UtcTime {
        year,
        month,
        day,
        hours: remaining / 3600,
        minutes: (remaining % 3600) / 60,
        seconds: remaining % 60,
        // 1970-01-01 was a Thursday
        weekday: (days % 7) as usize,
    }
}

/// `Tue, 14 Nov 2023 22:13:20 UTC`
pub fn format_rfc1123(timestamp: u64) -> String {
    let t = utc_time(timestamp);
    format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} UTC",
        WEEKDAYS[t.weekday],
        t.day,
        MONTHS[(t.month - 1) as usize],
        t.year,
        t.hours,
        t.minutes,
        t.seconds
    )
}

/// `2023-11-14T22:13:20Z`
pub fn format_rfc3339(timestamp: u64) -> String {
    let t = utc_time(timestamp);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        t.year, t.month, t.day, t.hours, t.minutes, t.seconds
    )
}

// Convert days since Unix epoch to year/month/day
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    let mut remaining_days = days;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for &days_in_month in &days_in_months {
        if remaining_days < days_in_month {
            break;
        }
        remaining_days -= days_in_month;
        month += 1;
    }

    (year, month, remaining_days + 1)
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps() {
        assert_eq!(format_rfc1123(0), "Thu, 01 Jan 1970 00:00:00 UTC");
        assert_eq!(format_rfc3339(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_rfc1123(1_700_000_000), "Tue, 14 Nov 2023 22:13:20 UTC");
        assert_eq!(format_rfc3339(1_700_000_000), "2023-11-14T22:13:20Z");
        // Leap day
        assert_eq!(format_rfc3339(951_782_400), "2000-02-29T00:00:00Z");
    }

    #[test]
    fn test_line_scanner() {
        let input = b"1.2.3.4\n\n  8.8.8.8  \r\n::1" as &[u8];
        let lines = read_lines(input).unwrap();
        assert_eq!(lines, vec!["1.2.3.4", "8.8.8.8", "::1"]);
    }

    #[test]
    fn test_languages() {
        assert_eq!(format_languages(&["en".to_string(), "de".to_string()]), "[en de]");
    }
}
