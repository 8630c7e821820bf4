//! Price normalization
//!
//! Catalog prices are shown with `.` as thousands separator and `,` as decimal
//! separator (e.g. "$ 1.234,56"). The normalized value is only used for
//! comparison and export; display always uses the scraped string.

use std::fmt;

/// A normalized price, stored as hundredths of the currency unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_cents(cents: i64) -> Self {
        Price(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// A zero price is a placeholder or failed extraction, never a real product price
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Numeric value for spreadsheet export
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Parses a locale-formatted price string into a comparable value.
///
/// Everything except digits and separators is dropped. The last `,` splits the
/// integer part from the fraction; `.` inside the integer part is a thousands
/// separator. Only two fractional digits are kept. Input without digits
/// normalizes to [`Price::ZERO`].
pub fn normalize(raw: &str) -> Price {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let (int_part, frac_part) = match cleaned.rfind(',') {
        Some(pos) => (&cleaned[..pos], &cleaned[pos + 1..]),
        None => (cleaned.as_str(), ""),
    };

    let units = int_part
        .chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(d as i64));

    let mut frac_digits = frac_part.chars().filter_map(|c| c.to_digit(10));
    let tenths = frac_digits.next().unwrap_or(0) as i64;
    let hundredths = frac_digits.next().unwrap_or(0) as i64;

    Price(
        units
            .saturating_mul(100)
            .saturating_add(tenths * 10 + hundredths),
    )
}

/// Normalizes an optional price; absence counts as zero
pub fn normalize_opt(raw: Option<&str>) -> Price {
    raw.map(normalize).unwrap_or(Price::ZERO)
}

#[cfg(test)]
#[path = "price_tests.rs"]
mod tests;
