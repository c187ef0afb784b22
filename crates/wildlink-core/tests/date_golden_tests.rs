//! Golden tests for the admission date rewriter.
//!
//! Each case rewrites mentions of one old admission date and checks the
//! exact output text.

use chrono::NaiveDate;
use proptest::prelude::*;
use wildlink_core::story::{find_dates, rewrite_dates, DateOrder, DatePattern, MonthForm};

/// Test case from golden file.
struct GoldenCase {
    id: &'static str,
    old: Option<(i32, u32, u32)>,
    new: (i32, u32, u32),
    input: &'static str,
    expected: &'static str,
    expected_rewritten: usize,
}

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "day-first-long-with-year",
            old: Some((2024, 6, 15)),
            new: (2024, 7, 3),
            input: "The eagle arrived on 15 June, 2024 after a storm.",
            expected: "The eagle arrived on 3 July, 2024 after a storm.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "mixed-styles-each-kept",
            old: Some((2024, 6, 15)),
            new: (2024, 7, 3),
            input: "Admitted 06/15/2024. By Jun 15 the wing was wrapped.",
            expected: "Admitted 07/03/2024. By Jul 3 the wing was wrapped.",
            expected_rewritten: 2,
        },
        GoldenCase {
            id: "non-date-number-run",
            old: Some((2024, 6, 15)),
            new: (2024, 7, 3),
            input: "It flew 15/300 meters before landing.",
            expected: "It flew 15/300 meters before landing.",
            expected_rewritten: 0,
        },
        GoldenCase {
            id: "month-first-long",
            old: Some((2024, 3, 28)),
            new: (2024, 4, 2),
            input: "On March 28, 2024, BAEA 083 was found near Campbell River.",
            expected: "On April 2, 2024, BAEA 083 was found near Campbell River.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "iso-dash",
            old: Some((2024, 3, 28)),
            new: (2024, 11, 9),
            input: "Intake record 2024-03-28 filed.",
            expected: "Intake record 2024-11-09 filed.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "iso-slash",
            old: Some((2024, 3, 28)),
            new: (2025, 1, 2),
            input: "Intake record 2024/03/28 filed.",
            expected: "Intake record 2025/01/02 filed.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "day-first-numeric",
            old: Some((2024, 3, 28)),
            new: (2024, 4, 2),
            input: "Logged 28/3/2024 and 28/03.",
            expected: "Logged 02/04/2024 and 02/04.",
            expected_rewritten: 2,
        },
        GoldenCase {
            id: "ordinal-of",
            old: Some((2024, 3, 28)),
            new: (2024, 4, 1),
            input: "Since the 28th of March the raccoon has eaten well.",
            expected: "Since the 1st of April the raccoon has eaten well.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "year-changes-across-new-year",
            old: Some((2023, 12, 30)),
            new: (2024, 1, 2),
            input: "Found Dec 30, 2023; by Dec 30 it was warm.",
            expected: "Found Jan 2, 2024; by Jan 2 it was warm.",
            expected_rewritten: 2,
        },
        GoldenCase {
            id: "other-year-untouched",
            old: Some((2024, 6, 15)),
            new: (2024, 7, 3),
            input: "Last seen June 15, 2023, admitted June 15, 2024.",
            expected: "Last seen June 15, 2023, admitted July 3, 2024.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "modal-may-untouched",
            old: Some((2024, 5, 2)),
            new: (2024, 5, 9),
            input: "The otter may 2 times a day refuse fish. Admitted May 2.",
            expected: "The otter may 2 times a day refuse fish. Admitted May 9.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "no-old-date",
            old: None,
            new: (2024, 7, 3),
            input: "Admitted on 15 June, 2024.",
            expected: "Admitted on 15 June, 2024.",
            expected_rewritten: 0,
        },
        GoldenCase {
            id: "other-date-overlapping-old-date",
            old: Some((2024, 6, 15)),
            new: (2024, 7, 3),
            input: "Cage 3 June 15, 2024 checks.",
            expected: "Cage 3 July 3, 2024 checks.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "count-after-date-is-not-a-year",
            old: Some((2024, 6, 15)),
            new: (2024, 7, 3),
            input: "By June 15, 2500 fish were released.",
            expected: "By July 3, 2500 fish were released.",
            expected_rewritten: 1,
        },
        GoldenCase {
            id: "uppercase-short",
            old: Some((2024, 9, 1)),
            new: (2024, 9, 21),
            input: "ADMITTED 1 SEP 2024",
            expected: "ADMITTED 21 SEP 2024",
            expected_rewritten: 1,
        },
    ]
}

#[test]
fn test_golden_cases() {
    for case in get_golden_cases() {
        let result = rewrite_dates(case.input, case.old.map(ymd), ymd(case.new));
        assert_eq!(result.text, case.expected, "case {}", case.id);
        assert_eq!(result.rewritten, case.expected_rewritten, "case {} count", case.id);
    }
}

#[test]
fn test_detected_styles() {
    let text = "15 June, 2024 and Jun 15 and 2024/06/15 and 06/15/2024";
    let found = find_dates(text, None);
    assert_eq!(found.len(), 4);

    assert_eq!(found[0].pattern, DatePattern::DayMonthName);
    assert_eq!(found[0].style.order, DateOrder::DayFirst);
    assert_eq!(found[0].style.month_form, MonthForm::Long);
    assert!(found[0].style.year_present);

    assert_eq!(found[1].pattern, DatePattern::MonthNameDay);
    assert_eq!(found[1].style.month_form, MonthForm::Short);
    assert!(!found[1].style.year_present);

    assert_eq!(found[2].pattern, DatePattern::YearMonthDay);
    assert_eq!(found[2].style.order, DateOrder::YearFirst);

    assert_eq!(found[3].pattern, DatePattern::NumericSlash);
    assert_eq!(found[3].style.order, DateOrder::MonthFirst);

    for m in &found {
        assert_eq!(&text[m.offset..m.end()], m.matched);
    }
}

proptest! {
    #[test]
    fn prop_rewriter_never_panics(text in "\\PC{0,200}", d in 1u32..=28, m in 1u32..=12) {
        let old = NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        let new = NaiveDate::from_ymd_opt(2025, 13 - m, 29 - d).unwrap();
        let _ = rewrite_dates(&text, Some(old), new);
        let _ = find_dates(&text, Some(old));
    }

    #[test]
    fn prop_text_without_digits_untouched(text in "[^0-9]{0,200}") {
        let old = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let new = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        let result = rewrite_dates(&text, Some(old), new);
        prop_assert_eq!(result.text, text);
        prop_assert_eq!(result.rewritten, 0);
    }

    #[test]
    fn prop_no_old_date_is_identity(text in "\\PC{0,200}") {
        let new = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        prop_assert_eq!(rewrite_dates(&text, None, new).text, text);
    }

    #[test]
    fn prop_same_date_is_identity(d in 1u32..=28, m in 1u32..=12) {
        let date = NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        let text = format!(
            "Seen {}, and {}, and {}.",
            date.format("%-d %B, %Y"),
            date.format("%b %-d"),
            date.format("%m/%d/%Y"),
        );
        prop_assert_eq!(rewrite_dates(&text, Some(date), date).text, text);
    }
}
