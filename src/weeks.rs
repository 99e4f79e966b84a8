use chrono::{Duration, NaiveDate};

pub const DEFAULT_MAX_WEEKS: usize = 20;

const TERM_DATE_FORMAT: &str = "%d-%m-%Y";

pub fn parse_term_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), TERM_DATE_FORMAT).ok()
}

/// Probable-week labels between two `dd-mm-yyyy` term dates, at most `cap`
/// weeks. Each week is seven days, the last one is cut at the term end.
pub fn generate_week_options(start: &str, end: &str, cap: usize) -> Vec<String> {
    let (Some(start), Some(end)) = (parse_term_date(start), parse_term_date(end)) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }
    let days = (end - start).num_days() as usize;
    let count = days.div_ceil(7).min(cap);

    (0..count)
        .map(|i| {
            let week_start = start + Duration::days(7 * i as i64);
            let week_end = (week_start + Duration::days(6)).min(end);
            format!(
                "Week {} ({} - {})",
                i + 1,
                week_start.format(TERM_DATE_FORMAT),
                week_end.format(TERM_DATE_FORMAT)
            )
        })
        .collect()
}
