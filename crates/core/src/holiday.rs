//! Public-holiday calendars and the forward-looking holiday window check.
//!
//! Calendars are rule tables evaluated per year: fixed dates, nth or last
//! weekday of a month, and offsets from Gregorian Easter. Observed-day
//! shifting (a holiday falling on a weekend moved to a weekday) is not
//! modelled.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use thiserror::Error;
use tracing::warn;

use crate::config::DEFAULT_REGION;

/// Number of consecutive days, starting at the reference date, that are checked.
pub const HOLIDAY_WINDOW_DAYS: u64 = 8;

const FIRST_SUPPORTED_YEAR: i32 = 1583;
const LAST_SUPPORTED_YEAR: i32 = 9999;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HolidayLookupError {
    #[error("reference date `{0}` is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("holiday window starting {0} runs past the supported date range")]
    DateOutOfRange(NaiveDate),
    #[error("no holiday calendar is available for year {0}")]
    CalendarUnavailable(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    Ru,
    Us,
    Gb,
    De,
    Fr,
}

#[derive(Clone, Copy, Debug)]
enum HolidayRule {
    Fixed { month: u32, day: u32 },
    FixedSince { month: u32, day: u32, since: i32 },
    NthWeekday { month: u32, weekday: Weekday, nth: u8 },
    LastWeekday { month: u32, weekday: Weekday },
    Easter { offset_days: i64 },
}

use HolidayRule::{Easter, Fixed, FixedSince, LastWeekday, NthWeekday};

const RU_RULES: &[HolidayRule] = &[
    Fixed { month: 1, day: 1 },
    Fixed { month: 1, day: 2 },
    Fixed { month: 1, day: 3 },
    Fixed { month: 1, day: 4 },
    Fixed { month: 1, day: 5 },
    Fixed { month: 1, day: 6 },
    Fixed { month: 1, day: 7 },
    Fixed { month: 1, day: 8 },
    Fixed { month: 2, day: 23 },
    Fixed { month: 3, day: 8 },
    Fixed { month: 5, day: 1 },
    Fixed { month: 5, day: 9 },
    Fixed { month: 6, day: 12 },
    Fixed { month: 11, day: 4 },
];

const US_RULES: &[HolidayRule] = &[
    Fixed { month: 1, day: 1 },
    NthWeekday { month: 1, weekday: Weekday::Mon, nth: 3 },
    NthWeekday { month: 2, weekday: Weekday::Mon, nth: 3 },
    LastWeekday { month: 5, weekday: Weekday::Mon },
    FixedSince { month: 6, day: 19, since: 2021 },
    Fixed { month: 7, day: 4 },
    NthWeekday { month: 9, weekday: Weekday::Mon, nth: 1 },
    NthWeekday { month: 10, weekday: Weekday::Mon, nth: 2 },
    Fixed { month: 11, day: 11 },
    NthWeekday { month: 11, weekday: Weekday::Thu, nth: 4 },
    Fixed { month: 12, day: 25 },
];

const GB_RULES: &[HolidayRule] = &[
    Fixed { month: 1, day: 1 },
    Easter { offset_days: -2 },
    Easter { offset_days: 1 },
    NthWeekday { month: 5, weekday: Weekday::Mon, nth: 1 },
    LastWeekday { month: 5, weekday: Weekday::Mon },
    LastWeekday { month: 8, weekday: Weekday::Mon },
    Fixed { month: 12, day: 25 },
    Fixed { month: 12, day: 26 },
];

const DE_RULES: &[HolidayRule] = &[
    Fixed { month: 1, day: 1 },
    Easter { offset_days: -2 },
    Easter { offset_days: 1 },
    Fixed { month: 5, day: 1 },
    Easter { offset_days: 39 },
    Easter { offset_days: 50 },
    Fixed { month: 10, day: 3 },
    Fixed { month: 12, day: 25 },
    Fixed { month: 12, day: 26 },
];

const FR_RULES: &[HolidayRule] = &[
    Fixed { month: 1, day: 1 },
    Easter { offset_days: 1 },
    Fixed { month: 5, day: 1 },
    Fixed { month: 5, day: 8 },
    Easter { offset_days: 39 },
    Easter { offset_days: 50 },
    Fixed { month: 7, day: 14 },
    Fixed { month: 8, day: 15 },
    Fixed { month: 11, day: 1 },
    Fixed { month: 11, day: 11 },
    Fixed { month: 12, day: 25 },
];

impl Region {
    /// Case-insensitive lookup of a supported region code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "RU" => Some(Self::Ru),
            "US" => Some(Self::Us),
            "GB" | "UK" => Some(Self::Gb),
            "DE" => Some(Self::De),
            "FR" => Some(Self::Fr),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "RU",
            Self::Us => "US",
            Self::Gb => "GB",
            Self::De => "DE",
            Self::Fr => "FR",
        }
    }

    fn rules(self) -> &'static [HolidayRule] {
        match self {
            Self::Ru => RU_RULES,
            Self::Us => US_RULES,
            Self::Gb => GB_RULES,
            Self::De => DE_RULES,
            Self::Fr => FR_RULES,
        }
    }

    /// All listed holidays of `year`, in rule order.
    pub fn holidays_in_year(self, year: i32) -> Result<Vec<NaiveDate>, HolidayLookupError> {
        if !(FIRST_SUPPORTED_YEAR..=LAST_SUPPORTED_YEAR).contains(&year) {
            return Err(HolidayLookupError::CalendarUnavailable(year));
        }
        Ok(self.rules().iter().filter_map(|rule| rule.date_in(year)).collect())
    }

    pub fn is_holiday(self, date: NaiveDate) -> Result<bool, HolidayLookupError> {
        Ok(self.holidays_in_year(date.year())?.contains(&date))
    }
}

impl HolidayRule {
    fn date_in(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day),
            FixedSince { month, day, since } => {
                (year >= since).then(|| NaiveDate::from_ymd_opt(year, month, day)).flatten()
            }
            NthWeekday { month, weekday, nth } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth)
            }
            LastWeekday { month, weekday } => last_weekday_of_month(year, month, weekday),
            Easter { offset_days } => {
                let easter = easter_sunday(year)?;
                if offset_days >= 0 {
                    easter.checked_add_days(Days::new(offset_days.unsigned_abs()))
                } else {
                    easter.checked_sub_days(Days::new(offset_days.unsigned_abs()))
                }
            }
        }
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (last.weekday().num_days_from_monday() + 7 - weekday.num_days_from_monday()) % 7;
    last.checked_sub_days(Days::new(u64::from(back)))
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Resolves region codes against a fallback calendar and answers
/// holiday-window questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HolidayCalendar {
    fallback: Region,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self { fallback: Region::Ru }
    }
}

impl HolidayCalendar {
    /// A calendar whose unrecognised codes resolve to `default_region`, or to
    /// `RU` when that code is itself unsupported.
    pub fn new(default_region: &str) -> Self {
        let fallback = Region::from_code(default_region)
            .or_else(|| Region::from_code(DEFAULT_REGION))
            .unwrap_or(Region::Ru);
        Self { fallback }
    }

    pub fn fallback(&self) -> Region {
        self.fallback
    }

    pub fn resolve(&self, region_code: &str) -> Region {
        Region::from_code(region_code).unwrap_or(self.fallback)
    }

    /// Whether any of the [`HOLIDAY_WINDOW_DAYS`] days starting at
    /// `reference_date` is a holiday of the resolved region.
    pub fn lookup(
        &self,
        region_code: &str,
        reference_date: NaiveDate,
    ) -> Result<bool, HolidayLookupError> {
        let region = self.resolve(region_code);
        let window = (0..HOLIDAY_WINDOW_DAYS)
            .map(|offset| reference_date.checked_add_days(Days::new(offset)))
            .collect::<Option<Vec<_>>>()
            .ok_or(HolidayLookupError::DateOutOfRange(reference_date))?;

        for day in window {
            if region.is_holiday(day)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// [`HolidayCalendar::lookup`] with failures logged and read as "no holiday".
    pub fn is_holiday_window(&self, region_code: &str, reference_date: NaiveDate) -> bool {
        self.lookup(region_code, reference_date).unwrap_or_else(|error| {
            warn!(
                event_name = "holiday.lookup.failed",
                region = %region_code,
                reference_date = %reference_date,
                error = %error,
                "holiday lookup failed; treating the window as non-holiday"
            );
            false
        })
    }
}

/// Holiday-window check for a textual `YYYY-MM-DD` reference date against the
/// default calendar. Never fails: bad input is logged and reads as `false`.
pub fn is_holiday_window(region_code: &str, reference_date: &str) -> bool {
    match NaiveDate::parse_from_str(reference_date.trim(), "%Y-%m-%d") {
        Ok(date) => HolidayCalendar::default().is_holiday_window(region_code, date),
        Err(_) => {
            let error = HolidayLookupError::InvalidDate(reference_date.to_string());
            warn!(
                event_name = "holiday.lookup.failed",
                region = %region_code,
                error = %error,
                "holiday lookup failed; treating the window as non-holiday"
            );
            false
        }
    }
}
