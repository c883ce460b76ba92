use crate::record::ForwardingClass;

const FIELD_DELIMITER: char = ',';
const TIMESTAMP_FIELD: usize = 1;
const CLASS_FIELD: usize = 2;

/// One timing line of a receiver-side log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiverLine {
    pub observed_time: f64,
    pub class: ForwardingClass,
}

/// Parse a comma-delimited receiver log line.
///
/// Only the first `timestamp_width` characters of the timestamp column are
/// read. The class column's digits map `1` to in-flight and `2` to tagged
/// redirection; anything else is direct delivery.
///
/// # Examples
/// ```
/// use relaytrace_core::ForwardingClass;
/// use relaytrace_core::decode::text::parse_receiver_line;
///
/// let line = parse_receiver_line("7,1400000000.123456,type=2", 17).unwrap();
/// assert_eq!(line.class, ForwardingClass::TaggedRedirect);
/// assert!(parse_receiver_line("# header", 17).is_none());
/// ```
pub fn parse_receiver_line(line: &str, timestamp_width: usize) -> Option<ReceiverLine> {
    if !line.chars().next()?.is_ascii_digit() {
        return None;
    }

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    let raw_time = fields.get(TIMESTAMP_FIELD)?;
    let prefix: String = raw_time.chars().take(timestamp_width).collect();
    let observed_time: f64 = prefix.trim().parse().ok()?;
    if !observed_time.is_finite() {
        return None;
    }

    let class_digits: String = fields
        .get(CLASS_FIELD)
        .map(|field| field.chars().filter(char::is_ascii_digit).collect())
        .unwrap_or_default();

    Some(ReceiverLine {
        observed_time,
        class: class_from_digits(&class_digits),
    })
}

fn class_from_digits(digits: &str) -> ForwardingClass {
    match digits {
        "1" => ForwardingClass::InFlightRedirect,
        "2" => ForwardingClass::TaggedRedirect,
        _ => ForwardingClass::Direct,
    }
}
