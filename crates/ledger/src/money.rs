use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Rounds `n / d` half away from zero (`d > 0`).
///
/// This is the HALF_UP mode used for reporting-currency conversion.
const fn div_half_up(n: i128, d: i128) -> i128 {
    if n >= 0 {
        (n + d / 2).div_euclid(d)
    } else {
        -((-n + d / 2).div_euclid(d))
    }
}

/// Rounds `n / d` toward positive infinity (`d > 0`).
///
/// This is the CEILING mode used for unit-price derivation.
const fn div_ceiling(n: i128, d: i128) -> i128 {
    (n + d - 1).div_euclid(d)
}

/// Signed money amount represented as **integer minor units** (cents).
///
/// Use this type for **all** balance and transaction amounts to avoid
/// floating-point drift. UAH, USD and EUR all use 2 fraction digits.
///
/// The value is signed:
/// - positive = deposit / sale / credit
/// - negative = withdrawal / purchase / debit
///
/// # Examples
///
/// ```rust
/// use ledger::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects
/// more than 2 decimals):
///
/// ```rust
/// use ledger::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Converts the amount through a 6-digit exchange rate, rounding HALF_UP
    /// (half away from zero) at cents.
    ///
    /// `10.00 * 0.920000 = 9.20`. Returns `None` on overflow.
    ///
    /// ```rust
    /// use ledger::{MoneyCents, RateMicros};
    ///
    /// let usd = MoneyCents::new(10_00);
    /// let rate = RateMicros::new(920_000);
    /// assert_eq!(usd.convert(rate), Some(MoneyCents::new(9_20)));
    /// ```
    #[must_use]
    pub fn convert(self, rate: RateMicros) -> Option<MoneyCents> {
        let product = i128::from(self.0) * i128::from(rate.micros());
        i64::try_from(div_half_up(product, 1_000_000)).ok().map(MoneyCents)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl FromStr for MoneyCents {
    type Err = LedgerError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading
    /// `+`/`-`; rejects more than 2 fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_point(s, 2).map(MoneyCents)
    }
}

/// Exchange rate or unit price with **6 fraction digits**, stored as integer
/// micro units.
///
/// `RateMicros::ONE` is the identity rate used for the reporting currency.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct RateMicros(i64);

impl RateMicros {
    pub const ONE: RateMicros = RateMicros(1_000_000);

    #[must_use]
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    /// Returns the raw value in micro units.
    #[must_use]
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Returns `true` for rates a store may persist (`rate > 0`).
    #[must_use]
    pub const fn is_valid_rate(self) -> bool {
        self.0 > 0
    }

    /// Derives a unit price from a total and a quantity, rounding CEILING at
    /// 6 digits.
    ///
    /// Returns `None` when `quantity <= 0` or on overflow.
    ///
    /// ```rust
    /// use ledger::{MoneyCents, RateMicros};
    ///
    /// // 10.00 over 3 units = 3.333334 (ceiling).
    /// let unit = RateMicros::unit_price(MoneyCents::new(10_00), 3);
    /// assert_eq!(unit, Some(RateMicros::new(3_333_334)));
    /// ```
    #[must_use]
    pub fn unit_price(total: MoneyCents, quantity: i64) -> Option<RateMicros> {
        if quantity <= 0 {
            return None;
        }
        // cents -> micro major units is a factor of 10_000.
        let scaled = i128::from(total.cents()).checked_mul(10_000)?;
        i64::try_from(div_ceiling(scaled, i128::from(quantity)))
            .ok()
            .map(RateMicros)
    }
}

impl fmt::Display for RateMicros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:06}", abs / 1_000_000, abs % 1_000_000)
    }
}

impl FromStr for RateMicros {
    type Err = LedgerError;

    /// Parses a decimal string into micro units (max 6 fractional digits).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_point(s, 6).map(RateMicros)
    }
}

/// Parses a signed decimal string into an integer scaled by `10^scale`.
fn parse_fixed_point(s: &str, scale: u32) -> Result<i64, LedgerError> {
    let empty = || LedgerError::Validation("empty amount".to_string());
    let invalid = || LedgerError::Validation("invalid amount".to_string());
    let overflow = || LedgerError::Validation("amount too large".to_string());

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (-1i64, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (1i64, stripped)
    } else {
        (1i64, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let whole_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next();

    if parts.next().is_some() {
        return Err(invalid());
    }

    if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = whole_str.parse().map_err(|_| invalid())?;

    let frac: i64 = match frac_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            if frac.len() > scale as usize {
                return Err(LedgerError::Validation("too many decimals".to_string()));
            }
            let parsed: i64 = frac.parse().map_err(|_| invalid())?;
            parsed * 10i64.pow(scale - frac.len() as u32)
        }
    };

    let total = whole
        .checked_mul(10i64.pow(scale))
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(overflow)?;

    if sign < 0 {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_cents() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("10,50".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("-0.01".parse::<MoneyCents>().unwrap().cents(), -1);
        assert_eq!("  2.30 ".parse::<MoneyCents>().unwrap().cents(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<MoneyCents>().is_err());
        assert!("0.001".parse::<MoneyCents>().is_err());
    }

    #[test]
    fn parse_rate_up_to_six_decimals() {
        assert_eq!("0.92".parse::<RateMicros>().unwrap().micros(), 920_000);
        assert_eq!("1".parse::<RateMicros>().unwrap(), RateMicros::ONE);
        assert_eq!("0.000001".parse::<RateMicros>().unwrap().micros(), 1);
        assert!("0.0000001".parse::<RateMicros>().is_err());
    }

    #[test]
    fn convert_rounds_half_up() {
        let rate = RateMicros::new(920_000);
        assert_eq!(
            MoneyCents::new(10_00).convert(rate),
            Some(MoneyCents::new(9_20))
        );
        // 0.005 -> 0.01 (half away from zero), both signs.
        let half = RateMicros::new(500_000);
        assert_eq!(MoneyCents::new(1).convert(half), Some(MoneyCents::new(1)));
        assert_eq!(MoneyCents::new(-1).convert(half), Some(MoneyCents::new(-1)));
        assert_eq!(
            MoneyCents::new(-10_00).convert(rate),
            Some(MoneyCents::new(-9_20))
        );
    }

    #[test]
    fn convert_identity_rate_is_exact() {
        assert_eq!(
            MoneyCents::new(123_45).convert(RateMicros::ONE),
            Some(MoneyCents::new(123_45))
        );
    }

    #[test]
    fn unit_price_rounds_ceiling() {
        assert_eq!(
            RateMicros::unit_price(MoneyCents::new(10_00), 3),
            Some(RateMicros::new(3_333_334))
        );
        // Exact division has nothing to round.
        assert_eq!(
            RateMicros::unit_price(MoneyCents::new(10_00), 4),
            Some(RateMicros::new(2_500_000))
        );
        assert_eq!(RateMicros::unit_price(MoneyCents::new(10_00), 0), None);
    }
}
