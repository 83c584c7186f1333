//! Token-level extraction helpers used by the rule interpreter.
//!
//! Everything here is pure: no clock access (callers pass `today`), no I/O.

use chrono::{Datelike, Duration, NaiveDate};

/// Returns the first contiguous run of ASCII digits as an integer.
///
/// Runs too long for `i64` saturate to `i64::MAX`.
pub fn first_digit_run(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some(digits.parse().unwrap_or(i64::MAX))
}

fn unit_value(word: &str) -> Option<i64> {
    let value = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        _ => return None,
    };
    Some(value)
}

fn tens_value(word: &str) -> Option<i64> {
    let value = match word {
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(value)
}

/// Splits into lowercase word tokens, treating hyphens as separators.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == '-')
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Parses the first spelled-out English number in `text`.
///
/// Handles `zero`..`nineteen`, tens, compounds (`twenty one`, `forty-two`)
/// and a trailing `hundred` multiplier.
pub fn first_number_word(text: &str) -> Option<i64> {
    let tokens = words(text);
    let start = tokens
        .iter()
        .position(|w| unit_value(w).is_some() || tens_value(w).is_some())?;

    let mut current = 0i64;
    for word in &tokens[start..] {
        if let Some(t) = tens_value(word) {
            if current % 100 != 0 {
                break;
            }
            current += t;
        } else if let Some(u) = unit_value(word) {
            if current % 10 != 0 || (current % 100 >= 10 && current % 100 < 20) {
                break;
            }
            current += u;
        } else if word == "hundred" {
            current = current.max(1) * 100;
        } else if word == "and" && current >= 100 {
            continue;
        } else {
            break;
        }
    }
    Some(current)
}

/// True when the words of `phrase` appear contiguously in `text`.
///
/// Matching is on whole words, so "No" does not match "I don't know".
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let needle = words(phrase);
    if needle.is_empty() {
        return false;
    }
    words(text).windows(needle.len()).any(|w| w == needle.as_slice())
}

const NUMERIC_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

fn month_number(word: &str) -> Option<u32> {
    let month = match word {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses a day-of-month token such as `9`, `09`, `21st` or `3rd`.
fn day_number(token: &str) -> Option<u32> {
    let digits = token
        .strip_suffix("st")
        .or_else(|| token.strip_suffix("nd"))
        .or_else(|| token.strip_suffix("rd"))
        .or_else(|| token.strip_suffix("th"))
        .unwrap_or(token);
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|d| (1..=31).contains(d))
}

fn year_number(token: &str) -> Option<i32> {
    if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// Extracts a calendar date from free text.
///
/// Recognises relative words (`today`, `tomorrow`, `yesterday`), numeric
/// forms (ISO, `MM/DD/YYYY`, `DD.MM.YYYY`) and month-name forms
/// (`March 9, 2024`, `9th of March 2024`, `March 9`). A month-name form
/// without a year takes the year of `today`. Returns `None` when no
/// date-like token exists or the date does not exist on the calendar.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let tokens = words(text);

    for token in &tokens {
        match token.as_str() {
            "today" => return Some(today),
            "tomorrow" => return today.checked_add_signed(Duration::days(1)),
            "yesterday" => return today.checked_sub_signed(Duration::days(1)),
            _ => {}
        }
    }

    for raw in text.split_whitespace() {
        let token = raw.trim_matches(|c: char| !(c.is_ascii_digit()));
        for format in NUMERIC_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(token, format) {
                return Some(date);
            }
        }
    }

    let month_at = tokens.iter().position(|t| month_number(t).is_some())?;
    let month = month_number(&tokens[month_at])?;

    let day = tokens
        .get(month_at + 1)
        .and_then(|t| day_number(t))
        .or_else(|| {
            // "9th of March" / "9 March"
            let before = tokens[..month_at]
                .iter()
                .rev()
                .find(|t| t.as_str() != "of")?;
            day_number(before)
        })?;

    let year = tokens[month_at..]
        .iter()
        .find_map(|t| year_number(t))
        .unwrap_or_else(|| today.year());

    NaiveDate::from_ymd_opt(year, month, day)
}
