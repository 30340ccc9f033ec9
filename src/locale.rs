//! Language handling for the generated report.
//!
//! The report only distinguishes Arabic from everything else: `ar` switches
//! the document to right-to-left with Arabic labels and digits, any other
//! language code renders left-to-right in English.

use chrono::{Datelike, NaiveDate};

/// Writing direction of the rendered document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    /// Value used for the `dir` attribute and the CSS `direction` property.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }

    /// Matching CSS `text-align` value.
    pub fn text_align(self) -> &'static str {
        match self {
            Self::Ltr => "left",
            Self::Rtl => "right",
        }
    }
}

/// UI language selected by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Language(String);

impl Language {
    /// Creates a language from a code such as `ar` or `en`.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Arabic language.
    pub fn arabic() -> Self {
        Self::new("ar")
    }

    /// English language.
    pub fn english() -> Self {
        Self::new("en")
    }

    /// The raw language code as supplied.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Whether Arabic labels and right-to-left layout apply.
    pub fn is_arabic(&self) -> bool {
        self.0 == "ar"
    }

    /// Writing direction for this language.
    pub fn direction(&self) -> TextDirection {
        if self.is_arabic() {
            TextDirection::Rtl
        } else {
            TextDirection::Ltr
        }
    }

    /// Picks the Arabic or English variant of a label.
    pub fn pick<'a>(&self, arabic: &'a str, english: &'a str) -> &'a str {
        if self.is_arabic() {
            arabic
        } else {
            english
        }
    }

    /// Human readable label of a reporting period.
    pub fn period_label(&self, period: &str) -> String {
        if self.is_arabic() {
            return match period {
                "week" => "أسبوع",
                "month" => "شهر",
                "quarter" => "ربع سنوي",
                _ => "سنة",
            }
            .to_owned();
        }

        let mut chars = period.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Formats a number with locale digit grouping and at most three decimals.
    pub fn format_number(&self, value: f64) -> String {
        let formatted = group_number(value);
        if self.is_arabic() {
            to_arabic_digits(&formatted)
        } else {
            formatted
        }
    }

    /// Formats a calendar date the way the report header shows it.
    pub fn format_date(&self, date: NaiveDate) -> String {
        if self.is_arabic() {
            to_arabic_digits(&format!("{}/{}/{}", date.day(), date.month(), date.year()))
        } else {
            format!("{}/{}/{}", date.month(), date.day(), date.year())
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::english()
    }
}

impl From<&str> for Language {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

fn group_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_owned();
    }

    let rounded = (value * 1000.0).round() / 1000.0;
    let negative = rounded < 0.0;
    let text = format!("{:.3}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let mut result = String::new();
    if negative && (integer != "0" || !fraction.is_empty()) {
        result.push('-');
    }
    result.push_str(&grouped);
    if !fraction.is_empty() {
        result.push('.');
        result.push_str(fraction);
    }
    result
}

fn to_arabic_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '0'..='9' => char::from_u32(0x0660 + (c as u32 - '0' as u32)).unwrap_or(c),
            ',' => '٬',
            '.' => '٫',
            other => other,
        })
        .collect()
}
