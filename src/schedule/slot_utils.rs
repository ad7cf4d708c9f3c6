use crate::records::Timeslot;

/// Parses a time string (HH:MM or HH:MM:SS) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let mut parts = time_str.trim().split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: u32 = seconds.trim().parse().ok()?;
        if seconds >= 60 {
            return None;
        }
    }
    if parts.next().is_some() || hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Formats minutes since midnight to time string (HH:MM)
pub fn minutes_to_time_string(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{:02}:{:02}", hours % 24, mins)
}

/// Normalizes a clock time to HH:MM, leaving unparseable text as it was
pub fn display_time(time_str: &str) -> String {
    parse_time_to_minutes(time_str)
        .map(minutes_to_time_string)
        .unwrap_or_else(|| time_str.trim().to_string())
}

/// Column header for a timeslot: "start - end"
pub fn timeslot_label(timeslot: &Timeslot) -> String {
    format!("{} - {}", display_time(&timeslot.start), display_time(&timeslot.end))
}
