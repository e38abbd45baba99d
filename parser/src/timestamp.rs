use chrono::{DateTime, FixedOffset, NaiveDate};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `DD/Mon/YYYY:HH:MM:SS +HHMM`
pub const APACHE_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Parse an Apache log timestamp such as `01/Aug/1995:00:00:08 -0400`.
///
/// The zone is kept as a fixed offset. Returns `None` for anything that is
/// not exactly in the expected layout.
pub fn parse_apache_time(s: &str) -> Option<DateTime<FixedOffset>> {
    let b = s.as_bytes();
    if b.len() != 26
        || b[2] != b'/'
        || b[6] != b'/'
        || b[11] != b':'
        || b[14] != b':'
        || b[17] != b':'
        || b[20] != b' '
    {
        return None;
    }

    let day = digits(&b[0..2])?;
    let month = MONTHS.iter().position(|m| m.as_bytes() == &b[3..6])? as u32 + 1;
    let year = digits(&b[7..11])? as i32;
    let hour = digits(&b[12..14])?;
    let minute = digits(&b[15..17])?;
    let second = digits(&b[18..20])?;

    let sign = match b[21] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let off_hours = digits(&b[22..24])? as i32;
    let off_minutes = digits(&b[24..26])? as i32;
    if off_minutes >= 60 {
        return None;
    }
    let offset = FixedOffset::east_opt(sign * (off_hours * 3600 + off_minutes * 60))?;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second)?
        .and_local_timezone(offset)
        .single()
}

/// Render a date-time back into the Apache log layout.
pub fn format_apache_time(dt: &DateTime<FixedOffset>) -> String {
    dt.format(APACHE_TIME_FORMAT).to_string()
}

fn digits(b: &[u8]) -> Option<u32> {
    b.iter().try_fold(0u32, |acc, &c| {
        c.is_ascii_digit().then(|| acc * 10 + u32::from(c - b'0'))
    })
}
