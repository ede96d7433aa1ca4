//! Human-readable formatting for command output.

/// Token amounts are integers in hundredths of a unit.
const DECIMAL_PLACES: u32 = 2;

/// Format a signed integer amount with two decimal places (`6400` → `64.00`).
pub fn format_amount(amount: i64) -> String {
    let scale = 10i64.pow(DECIMAL_PLACES);
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!(
        "{sign}{}.{:0width$}",
        abs / scale as u64,
        abs % scale as u64,
        width = DECIMAL_PLACES as usize
    )
}

/// Format a duration in seconds as its non-zero units (`3725` → `1h 2m 5s`).
pub fn format_duration(secs: u64) -> String {
    let units = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];
    let mut rest = secs;
    let mut parts = Vec::new();
    for (size, suffix) in units {
        if rest >= size {
            parts.push(format!("{}{suffix}", rest / size));
            rest %= size;
        }
    }
    if parts.is_empty() {
        return "0s".to_string();
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_have_two_decimals() {
        assert_eq!(format_amount(6400), "64.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(-1010), "-10.10");
        assert_eq!(format_amount(0), "0.00");
    }

    #[test]
    fn durations_pick_the_largest_unit() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
        assert_eq!(format_duration(86_400 + 60), "1d 1m");
    }
}
