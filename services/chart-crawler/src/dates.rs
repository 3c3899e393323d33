//!
//! src/dates.rs
//!
//! Release / creation dates show up in a handful of textual shapes,
//! this folds them into a NaiveDate or gives up quietly
//!

use chrono::NaiveDate;

/// Tried in order, first hit wins
pub const ACCEPTED_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%y", "%d/%m/%Y"];

pub fn normalize(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    ACCEPTED_FORMATS.iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Stored form of a canonical date, empty when unknown
pub fn to_iso(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

pub fn from_iso(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan_9() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 1, 9)
    }

    #[test]
    fn accepted_shapes_agree() {
        assert_eq!(normalize(Some("2026-01-09")), jan_9());
        assert_eq!(normalize(Some("09.01.26")), jan_9());
        assert_eq!(normalize(Some("09/01/2026")), jan_9());
        assert_eq!(normalize(Some("  2026-01-09 ")), jan_9());
    }

    #[test]
    fn unparseable_is_none() {
        assert_eq!(normalize(Some("")), None);
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some("garbage")), None);
        assert_eq!(normalize(Some("2026-13-40")), None);
        assert_eq!(normalize(Some("01/09")), None);
    }

    #[test]
    fn iso_round_trip() {
        assert_eq!(to_iso(jan_9()), "2026-01-09");
        assert_eq!(to_iso(None), "");
        assert_eq!(from_iso("2026-01-09"), jan_9());
        assert_eq!(from_iso(""), None);
    }
}
