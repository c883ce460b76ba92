const FIELD_DELIMITER: char = ':';
const TOKEN_DELIMITER: char = ' ';
const TIMING_MARKER: &str = "time";

const MARKER_FIELD: usize = 2;
const TIME_FIELD: usize = 3;
const MARKER_TOKEN: usize = 2;
const SECONDS_TOKEN: usize = 1;
const SUBSECOND_TOKEN: usize = 2;

/// Extract the send timestamp from a send-side log line.
///
/// The sub-second digits are right-justified to `subsecond_width` digits
/// (and truncated to it) so logs printing `1234` and `001234` agree.
///
/// # Examples
/// ```
/// use relaytrace_core::decode::text::parse_send_line;
///
/// let ts = parse_send_line("12:00:pkt send time: 1400000000 1234us", 6).unwrap();
/// assert!((ts - 1_400_000_000.001234).abs() < 1e-6);
/// assert!(parse_send_line("12:00:01 heartbeat", 6).is_none());
/// ```
pub fn parse_send_line(line: &str, subsecond_width: usize) -> Option<f64> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() <= TIME_FIELD {
        return None;
    }

    let marker = fields[MARKER_FIELD].split(TOKEN_DELIMITER).nth(MARKER_TOKEN)?;
    if marker != TIMING_MARKER {
        return None;
    }

    let tokens: Vec<&str> = fields[TIME_FIELD].split(TOKEN_DELIMITER).collect();
    let seconds = digits(tokens.get(SECONDS_TOKEN)?);
    let subsecond = digits(tokens.get(SUBSECOND_TOKEN)?);
    if seconds.is_empty() || subsecond.is_empty() {
        return None;
    }

    let seconds: f64 = seconds.parse().ok()?;
    let subsecond = normalize_subsecond(&subsecond, subsecond_width);
    let fraction: f64 = subsecond.parse().ok()?;
    Some(seconds + fraction / 10f64.powi(subsecond_width as i32))
}

fn digits(token: &str) -> String {
    token.chars().filter(char::is_ascii_digit).collect()
}

fn normalize_subsecond(digits: &str, width: usize) -> String {
    let mut padded = format!("{digits:0>width$}");
    padded.truncate(width);
    padded
}
