// Field validators used by application step gates
//
// All validators are pure and never fail loudly: a bad value is simply "not valid yet" and
// the step gate stays closed.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn email_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").ok()
    })
    .as_ref()
}

fn passport_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]{1,2}[0-9]{6,9}$").ok()).as_ref()
}

fn phone_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").ok()).as_ref()
}

pub fn is_filled(s: &str) -> bool {
    !s.trim().is_empty()
}

pub fn is_valid_email(s: &str) -> bool {
    email_re().is_some_and(|re| re.is_match(s.trim()))
}

/// One or two letters followed by 6-9 digits (e.g. `AB1234567`).
pub fn is_valid_passport_number(s: &str) -> bool {
    passport_re().is_some_and(|re| re.is_match(s.trim()))
}

/// Optional leading `+`, digits separated by spaces or dashes, 7-15 digits total.
pub fn is_valid_phone(s: &str) -> bool {
    let s = s.trim();
    if !phone_re().is_some_and(|re| re.is_match(s)) {
        return false;
    }
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn is_valid_iso_date(s: &str) -> bool {
    parse_iso_date(s).is_some()
}

/// 24h `HH:MM`.
pub fn is_valid_time_hhmm(s: &str) -> bool {
    parse_time_hhmm(s).is_some()
}

/// Minutes since midnight for a 24h `HH:MM` string.
pub fn parse_time_hhmm(s: &str) -> Option<u32> {
    let (hh, mm) = s.trim().split_once(':')?;
    if hh.len() != 2 || mm.len() != 2 {
        return None;
    }
    let hh = hh.parse::<u32>().ok()?;
    let mm = mm.parse::<u32>().ok()?;
    if hh <= 23 && mm <= 59 {
        Some(hh * 60 + mm)
    } else {
        None
    }
}
