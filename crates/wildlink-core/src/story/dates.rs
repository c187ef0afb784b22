//! Date token rewriter.
//!
//! Finds date mentions in narrative text and re-renders the ones that denote
//! the old admission date, keeping each mention's own style.
//!
//! Four pattern families are recognised, each with its own matcher:
//!
//! | Family          | Example                          |
//! |-----------------|----------------------------------|
//! | `DayMonthName`  | `15 June, 2024`, `15th of Jun`   |
//! | `MonthNameDay`  | `June 15, 2024`, `Jun. 15th`     |
//! | `YearMonthDay`  | `2024/06/15`, `2024-06-15`       |
//! | `NumericSlash`  | `06/15/2024`, `15/6`             |
//!
//! Matches that cannot be parsed, or that denote some other date, pass
//! through untouched.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const LONG_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const SHORT_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Month names that are also common lowercase English words.
const AMBIGUOUS_LOWERCASE: [&str; 2] = ["may", "march"];

/// Long names first so `june` wins over `jun`.
const MONTH_TOKEN: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec";

/// Optional trailing years are limited to 1900-2099 so counts such as
/// `June 15, 2500 fish` keep their number.
const YEAR_TOKEN: &str = r"(?:19|20)\d{2}";

static DAY_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<day>\d{{1,2}})(?P<suffix>st|nd|rd|th)?\s+(?:of\s+)?(?P<month>{MONTH_TOKEN})\b(?:,?\s+(?P<year>{YEAR_TOKEN})\b)?"
    ))
    .unwrap()
});

static MONTH_NAME_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<month>{MONTH_TOKEN})\.?\s+(?P<day>\d{{1,2}})(?P<suffix>st|nd|rd|th)?\b(?:,?\s+(?P<year>{YEAR_TOKEN})\b)?"
    ))
    .unwrap()
});

static YEAR_MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<year>\d{4})(?P<sep1>[/-])(?P<month>\d{1,2})(?P<sep2>[/-])(?P<day>\d{1,2})\b")
        .unwrap()
});

static NUMERIC_SLASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?P<first>\d{{1,2}})/(?P<second>\d{{1,2}})(?:/(?P<year>{YEAR_TOKEN}))?\b"
    ))
    .unwrap()
});

/// The four date families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePattern {
    /// `<day> <Month>[, <year>]`
    DayMonthName,
    /// `<Month> <day>[, <year>]`
    MonthNameDay,
    /// `<yyyy>/<mm>/<dd>`
    YearMonthDay,
    /// `<d>/<d>[/<yyyy>]`
    NumericSlash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateOrder {
    DayFirst,
    MonthFirst,
    YearFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthForm {
    /// Three-letter abbreviation
    Short,
    /// Full month name
    Long,
    /// Month number
    Numeric,
}

/// Capitalisation of a month name as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterCase {
    Title,
    Upper,
    Lower,
}

/// How one date mention was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateStyle {
    pub order: DateOrder,
    pub month_form: MonthForm,
    pub year_present: bool,
    pub month_case: LetterCase,
    /// Day written with a leading zero
    pub padded_day: bool,
    /// Day carries an ordinal suffix ("15th")
    pub ordinal: bool,
}

/// Byte ranges of the date components, relative to the match start.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Parts {
    day: Range<usize>,
    month: Range<usize>,
    year: Option<Range<usize>>,
    suffix: Option<Range<usize>>,
}

/// A date mention located in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePatternMatch {
    /// Byte offset of the match in the scanned text
    pub offset: usize,
    pub matched: String,
    pub pattern: DatePattern,
    pub style: DateStyle,
    pub day: u32,
    pub month: u32,
    pub year: Option<i32>,
    parts: Parts,
}

impl DatePatternMatch {
    /// Byte offset one past the match.
    pub fn end(&self) -> usize {
        self.offset + self.matched.len()
    }

    /// True when this mention refers to `date`. Year-less mentions match on
    /// day and month alone.
    pub fn denotes(&self, date: NaiveDate) -> bool {
        self.day == date.day()
            && self.month == date.month()
            && self.year.map_or(true, |year| year == date.year())
    }

    /// Write `date` in this mention's style.
    pub fn render(&self, date: NaiveDate) -> String {
        let day = if self.style.padded_day {
            format!("{:02}", date.day())
        } else {
            date.day().to_string()
        };
        let index = date.month0() as usize;
        let month = match self.style.month_form {
            MonthForm::Long => apply_case(LONG_MONTHS[index], self.style.month_case),
            MonthForm::Short => apply_case(SHORT_MONTHS[index], self.style.month_case),
            MonthForm::Numeric => format!("{:02}", date.month()),
        };

        let mut pieces = vec![(self.parts.day.clone(), day), (self.parts.month.clone(), month)];
        if let Some(range) = &self.parts.year {
            pieces.push((range.clone(), format!("{:04}", date.year())));
        }
        if let Some(range) = &self.parts.suffix {
            let written = &self.matched[range.clone()];
            let suffix = ordinal_suffix(date.day());
            let suffix = if written.chars().all(|c| c.is_ascii_uppercase()) {
                suffix.to_uppercase()
            } else {
                suffix.to_string()
            };
            pieces.push((range.clone(), suffix));
        }
        pieces.sort_by_key(|(range, _)| range.start);

        let mut out = String::with_capacity(self.matched.len() + 8);
        let mut cursor = 0;
        for (range, text) in pieces {
            out.push_str(&self.matched[cursor..range.start]);
            out.push_str(&text);
            cursor = range.end;
        }
        out.push_str(&self.matched[cursor..]);
        out
    }
}

impl DatePattern {
    pub const ALL: [DatePattern; 4] = [
        DatePattern::DayMonthName,
        DatePattern::MonthNameDay,
        DatePattern::YearMonthDay,
        DatePattern::NumericSlash,
    ];

    fn regex(&self) -> &'static Regex {
        match self {
            DatePattern::DayMonthName => &DAY_MONTH_NAME,
            DatePattern::MonthNameDay => &MONTH_NAME_DAY,
            DatePattern::YearMonthDay => &YEAR_MONTH_DAY,
            DatePattern::NumericSlash => &NUMERIC_SLASH,
        }
    }

    /// Turn one regex hit into a match. `anchor` breaks day/month ties in
    /// all-numeric dates.
    fn parse(&self, text: &str, caps: &Captures<'_>, anchor: Option<NaiveDate>) -> Option<DatePatternMatch> {
        let whole = caps.get(0)?;
        let start = whole.start();
        let rel = |m: regex::Match<'_>| (m.start() - start)..(m.end() - start);

        let year_match = caps.name("year");
        let year = match year_match {
            Some(m) => Some(m.as_str().parse::<i32>().ok()?),
            None => None,
        };

        let (day, month, parts, style) = match self {
            DatePattern::DayMonthName | DatePattern::MonthNameDay => {
                let day_match = caps.name("day")?;
                let month_match = caps.name("month")?;
                let (month, month_form) = parse_month_token(month_match.as_str())?;
                let day: u32 = day_match.as_str().parse().ok()?;
                let suffix = caps.name("suffix");

                let style = DateStyle {
                    order: if *self == DatePattern::DayMonthName {
                        DateOrder::DayFirst
                    } else {
                        DateOrder::MonthFirst
                    },
                    month_form,
                    year_present: year.is_some(),
                    month_case: letter_case(month_match.as_str()),
                    padded_day: day_match.as_str().len() == 2 && day_match.as_str().starts_with('0'),
                    ordinal: suffix.is_some(),
                };
                let parts = Parts {
                    day: rel(day_match),
                    month: rel(month_match),
                    year: year_match.map(rel),
                    suffix: suffix.map(rel),
                };
                (day, month, parts, style)
            }
            DatePattern::YearMonthDay => {
                if caps.name("sep1")?.as_str() != caps.name("sep2")?.as_str() {
                    return None;
                }
                if !numeric_neighbors_ok(text, whole.range()) {
                    return None;
                }
                let day_match = caps.name("day")?;
                let month_match = caps.name("month")?;
                let parts = Parts {
                    day: rel(day_match),
                    month: rel(month_match),
                    year: year_match.map(rel),
                    suffix: None,
                };
                (
                    day_match.as_str().parse().ok()?,
                    month_match.as_str().parse().ok()?,
                    parts,
                    numeric_style(DateOrder::YearFirst, true),
                )
            }
            DatePattern::NumericSlash => {
                if !numeric_neighbors_ok(text, whole.range()) {
                    return None;
                }
                let first_match = caps.name("first")?;
                let second_match = caps.name("second")?;
                let first: u32 = first_match.as_str().parse().ok()?;
                let second: u32 = second_match.as_str().parse().ok()?;

                let order = numeric_order(first, second, year, anchor)?;
                let (day, month, day_range, month_range) = match order {
                    DateOrder::DayFirst => (first, second, rel(first_match), rel(second_match)),
                    _ => (second, first, rel(second_match), rel(first_match)),
                };
                let parts = Parts {
                    day: day_range,
                    month: month_range,
                    year: year_match.map(rel),
                    suffix: None,
                };
                (day, month, parts, numeric_style(order, year.is_some()))
            }
        };

        if !is_valid_date(day, month, year) {
            return None;
        }

        Some(DatePatternMatch {
            offset: start,
            matched: whole.as_str().to_string(),
            pattern: *self,
            style,
            day,
            month,
            year,
            parts,
        })
    }
}

/// Result of a date rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRewrite {
    pub text: String,
    /// Number of mentions rewritten
    pub rewritten: usize,
}

/// Locate date mentions, leftmost first, without overlaps.
///
/// `anchor` is the date the caller expects to find; it only decides the
/// day/month order of ambiguous all-numeric dates such as `06/07`.
pub fn find_dates(text: &str, anchor: Option<NaiveDate>) -> Vec<DatePatternMatch> {
    without_overlaps(candidates(text, anchor))
}

fn candidates(text: &str, anchor: Option<NaiveDate>) -> Vec<DatePatternMatch> {
    DatePattern::ALL
        .iter()
        .flat_map(|pattern| {
            pattern
                .regex()
                .captures_iter(text)
                .filter_map(move |caps| pattern.parse(text, &caps, anchor))
        })
        .collect()
}

/// Leftmost first, longest first at the same offset.
fn without_overlaps(mut found: Vec<DatePatternMatch>) -> Vec<DatePatternMatch> {
    found.sort_by(|a, b| {
        a.offset
            .cmp(&b.offset)
            .then_with(|| b.matched.len().cmp(&a.matched.len()))
    });

    let mut kept: Vec<DatePatternMatch> = Vec::with_capacity(found.len());
    for candidate in found {
        if kept.last().map_or(true, |last| candidate.offset >= last.end()) {
            kept.push(candidate);
        }
    }
    kept
}

/// Rewrite every mention of `old` as `new`, each in its own style.
///
/// Without an old date there is nothing to anchor on and the text is
/// returned unchanged.
pub fn rewrite_dates(text: &str, old: Option<NaiveDate>, new: NaiveDate) -> DateRewrite {
    let Some(old) = old else {
        return DateRewrite {
            text: text.to_string(),
            rewritten: 0,
        };
    };

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut rewritten = 0;

    // Only mentions of the old date compete for overlapping spans.
    let mentions = candidates(text, Some(old))
        .into_iter()
        .filter(|mention| mention.denotes(old))
        .collect();

    for mention in without_overlaps(mentions) {
        out.push_str(&text[cursor..mention.offset]);
        out.push_str(&mention.render(new));
        cursor = mention.end();
        rewritten += 1;
    }
    out.push_str(&text[cursor..]);

    tracing::debug!(%old, %new, rewritten, "Rewrote admission date mentions");

    DateRewrite {
        text: out,
        rewritten,
    }
}

fn parse_month_token(token: &str) -> Option<(u32, MonthForm)> {
    let lower = token.to_lowercase();
    if token == lower && AMBIGUOUS_LOWERCASE.contains(&lower.as_str()) {
        return None;
    }
    if let Some(index) = LONG_MONTHS.iter().position(|m| m.eq_ignore_ascii_case(token)) {
        return Some((index as u32 + 1, MonthForm::Long));
    }
    SHORT_MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(token))
        .map(|index| (index as u32 + 1, MonthForm::Short))
}

fn letter_case(token: &str) -> LetterCase {
    if token.len() > 1 && token.chars().all(|c| c.is_uppercase()) {
        LetterCase::Upper
    } else if token.chars().all(|c| c.is_lowercase()) {
        LetterCase::Lower
    } else {
        LetterCase::Title
    }
}

fn apply_case(name: &str, case: LetterCase) -> String {
    match case {
        LetterCase::Title => name.to_string(),
        LetterCase::Upper => name.to_uppercase(),
        LetterCase::Lower => name.to_lowercase(),
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

fn numeric_style(order: DateOrder, year_present: bool) -> DateStyle {
    DateStyle {
        order,
        month_form: MonthForm::Numeric,
        year_present,
        month_case: LetterCase::Title,
        padded_day: true,
        ordinal: false,
    }
}

/// Day/month order of `first/second`. A component above 12 settles it;
/// otherwise the reading that equals the anchor wins, month-first on a tie.
fn numeric_order(first: u32, second: u32, year: Option<i32>, anchor: Option<NaiveDate>) -> Option<DateOrder> {
    let month_first = is_valid_date(second, first, year);
    let day_first = is_valid_date(first, second, year);

    match (month_first, day_first) {
        (true, false) => Some(DateOrder::MonthFirst),
        (false, true) => Some(DateOrder::DayFirst),
        (false, false) => None,
        (true, true) => {
            let denotes = |day: u32, month: u32| {
                anchor.is_some_and(|date| {
                    date.day() == day
                        && date.month() == month
                        && year.map_or(true, |y| y == date.year())
                })
            };
            if denotes(first, second) && !denotes(second, first) {
                Some(DateOrder::DayFirst)
            } else {
                Some(DateOrder::MonthFirst)
            }
        }
    }
}

/// Numeric dates glued to further slashes or dashes (`1/2/3`, `15/3-4`) are
/// not dates.
fn numeric_neighbors_ok(text: &str, range: Range<usize>) -> bool {
    let bytes = text.as_bytes();
    let before = range.start.checked_sub(1).and_then(|i| bytes.get(i));
    let after = bytes.get(range.end);
    let glued = |b: Option<&u8>| matches!(b, Some(b'/') | Some(b'-'));
    !glued(before) && !glued(after)
}

/// Year-less dates are checked against a leap year so "29 Feb" stays valid.
fn is_valid_date(day: u32, month: u32, year: Option<i32>) -> bool {
    NaiveDate::from_ymd_opt(year.unwrap_or(2000), month, day).is_some()
}
