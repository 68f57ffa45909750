use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::SplitError;

/// Ratio of a stock split: `shares_out` new shares for every `shares_in` old
/// shares. A 2-for-1 split is `SplitRatio::new(2, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRatio {
    shares_out: Decimal,
    shares_in: Decimal,
}

impl Default for SplitRatio {
    fn default() -> Self {
        SplitRatio::identity()
    }
}

impl SplitRatio {
    pub fn new(
        shares_out: impl Into<Decimal>,
        shares_in: impl Into<Decimal>,
    ) -> Result<Self, SplitError> {
        let shares_out = shares_out.into();
        let shares_in = shares_in.into();
        if shares_out <= Decimal::ZERO || shares_in <= Decimal::ZERO {
            return Err(SplitError::NonPositiveRatio {
                shares_out: shares_out.to_string(),
                shares_in: shares_in.to_string(),
            });
        }
        Ok(SplitRatio {
            shares_out,
            shares_in,
        })
    }

    pub fn identity() -> Self {
        SplitRatio {
            shares_out: Decimal::ONE,
            shares_in: Decimal::ONE,
        }
    }

    pub fn shares_out(&self) -> Decimal {
        self.shares_out
    }

    pub fn shares_in(&self) -> Decimal {
        self.shares_in
    }

    pub fn is_identity(&self) -> bool {
        self.shares_out == self.shares_in
    }

    /// Ratio as a single decimal, rounded to `scale` places.
    pub fn ratio(&self, scale: u32) -> Decimal {
        (self.shares_out / self.shares_in).round_dp(scale)
    }

    /// Combines two splits. Numerators and denominators are kept apart so
    /// compounding stays exact and order independent.
    pub fn compound(&self, other: &SplitRatio) -> SplitRatio {
        SplitRatio {
            shares_out: self.shares_out * other.shares_out,
            shares_in: self.shares_in * other.shares_in,
        }
    }

    /// Re-expresses pre-split shares in post-split terms (unrounded).
    pub fn apply(&self, shares: Decimal) -> Decimal {
        shares * self.shares_out / self.shares_in
    }

    /// Re-expresses post-split shares in pre-split terms (unrounded).
    pub fn revert(&self, shares: Decimal) -> Decimal {
        shares * self.shares_in / self.shares_out
    }
}

/// A split effective on one date for the owning security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSplit {
    pub date: NaiveDate,
    pub ratio: SplitRatio,
}

/// Which ends of a `[from, to]` date interval count a split dated exactly on
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplitBoundary {
    /// Splits on either end date are counted.
    #[default]
    Inclusive,
    /// A split on the start (purchase) date is already reflected in the shares.
    ExcludeStart,
    /// A split on the end (sale) date is not yet reflected in the shares.
    ExcludeEnd,
    /// Only splits strictly between the two dates are counted.
    Exclusive,
}

impl SplitBoundary {
    /// Whether a split on `date` falls in the interval. An open `to` means
    /// "up to today".
    pub fn contains(&self, date: NaiveDate, from: NaiveDate, to: Option<NaiveDate>) -> bool {
        let after_start = match self {
            SplitBoundary::Inclusive | SplitBoundary::ExcludeEnd => date >= from,
            SplitBoundary::ExcludeStart | SplitBoundary::Exclusive => date > from,
        };
        let before_end = match (self, to) {
            (_, None) => true,
            (SplitBoundary::Inclusive | SplitBoundary::ExcludeStart, Some(to)) => date <= to,
            (SplitBoundary::ExcludeEnd | SplitBoundary::Exclusive, Some(to)) => date < to,
        };
        after_start && before_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_ratio() {
        assert!(SplitRatio::new(dec!(0), dec!(1)).is_err());
        assert!(SplitRatio::new(dec!(2), dec!(-1)).is_err());
        assert!(SplitRatio::new(dec!(3), dec!(2)).is_ok());
    }

    #[test]
    fn test_compound_is_order_independent() {
        let two_for_one = SplitRatio::new(2, 1).unwrap();
        let one_for_three = SplitRatio::new(1, 3).unwrap();
        let three_for_two = SplitRatio::new(3, 2).unwrap();

        let left = two_for_one.compound(&one_for_three).compound(&three_for_two);
        let right = three_for_two.compound(&two_for_one.compound(&one_for_three));
        assert_eq!(left.apply(dec!(12)), right.apply(dec!(12)));
        assert_eq!(left.ratio(6), dec!(1));
    }

    #[test]
    fn test_apply_and_revert() {
        let ratio = SplitRatio::new(3, 2).unwrap();
        assert_eq!(ratio.apply(dec!(10)), dec!(15));
        assert_eq!(ratio.revert(dec!(15)), dec!(10));
    }

    #[test]
    fn test_boundary_inclusive() {
        let from = date(2020, 1, 1);
        let to = Some(date(2020, 12, 31));
        assert!(SplitBoundary::Inclusive.contains(from, from, to));
        assert!(SplitBoundary::Inclusive.contains(date(2020, 12, 31), from, to));
        assert!(!SplitBoundary::Inclusive.contains(date(2021, 1, 1), from, to));
    }

    #[test]
    fn test_boundary_exclusive_variants() {
        let from = date(2020, 1, 1);
        let end = date(2020, 12, 31);
        let to = Some(end);
        assert!(!SplitBoundary::ExcludeStart.contains(from, from, to));
        assert!(SplitBoundary::ExcludeStart.contains(end, from, to));
        assert!(SplitBoundary::ExcludeEnd.contains(from, from, to));
        assert!(!SplitBoundary::ExcludeEnd.contains(end, from, to));
        assert!(!SplitBoundary::Exclusive.contains(from, from, to));
        assert!(!SplitBoundary::Exclusive.contains(end, from, to));
        assert!(SplitBoundary::Exclusive.contains(date(2020, 6, 1), from, to));
    }

    #[test]
    fn test_open_interval_has_no_end() {
        assert!(SplitBoundary::Exclusive.contains(date(2099, 1, 1), date(2020, 1, 1), None));
    }
}
