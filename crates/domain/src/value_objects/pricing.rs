use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Supported billing durations. Anything else fails closed to a single month
/// with no discount.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum BillingDuration {
    #[default]
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl BillingDuration {
    pub fn months(&self) -> i32 {
        match self {
            BillingDuration::Monthly => 1,
            BillingDuration::Quarterly => 3,
            BillingDuration::SemiAnnual => 6,
            BillingDuration::Annual => 12,
        }
    }

    pub fn from_code(value: &str) -> Self {
        match value {
            "monthly" => BillingDuration::Monthly,
            "quarterly" => BillingDuration::Quarterly,
            "semiannual" => BillingDuration::SemiAnnual,
            "annual" => BillingDuration::Annual,
            _ => BillingDuration::Monthly,
        }
    }

    pub fn from_months(months: i32) -> Self {
        match months {
            1 => BillingDuration::Monthly,
            3 => BillingDuration::Quarterly,
            6 => BillingDuration::SemiAnnual,
            12 => BillingDuration::Annual,
            _ => BillingDuration::Monthly,
        }
    }
}

impl Display for BillingDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            BillingDuration::Monthly => "monthly",
            BillingDuration::Quarterly => "quarterly",
            BillingDuration::SemiAnnual => "semiannual",
            BillingDuration::Annual => "annual",
        };
        write!(f, "{}", code)
    }
}

/// Duration discounts in whole percent, supplied by configuration.
/// One month is never discounted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscountTable {
    pub quarterly: i32,
    pub semi_annual: i32,
    pub annual: i32,
}

impl DiscountTable {
    pub fn new(quarterly: i32, semi_annual: i32, annual: i32) -> Self {
        Self {
            quarterly: quarterly.clamp(0, 100),
            semi_annual: semi_annual.clamp(0, 100),
            annual: annual.clamp(0, 100),
        }
    }

    pub fn percent_for(&self, duration: BillingDuration) -> i32 {
        match duration {
            BillingDuration::Monthly => 0,
            BillingDuration::Quarterly => self.quarterly,
            BillingDuration::SemiAnnual => self.semi_annual,
            BillingDuration::Annual => self.annual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub total_minor: i64,
    pub discount_minor: i64,
    pub final_minor: i64,
    pub discount_percent: i32,
}

/// Computes the charge for a plan over a billing duration. Integer arithmetic
/// in minor currency units throughout; the discount is floored, so
/// `final_minor + discount_minor == total_minor` always holds.
pub fn quote(monthly_price_minor: i64, duration: BillingDuration, discounts: &DiscountTable) -> PriceQuote {
    let months = i64::from(duration.months());
    let discount_percent = discounts.percent_for(duration);

    let total_minor = monthly_price_minor * months;
    let discount_minor = total_minor * i64::from(discount_percent) / 100;
    let final_minor = total_minor - discount_minor;

    PriceQuote {
        total_minor,
        discount_minor,
        final_minor,
        discount_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarterly_quote_applies_floored_discount() {
        let discounts = DiscountTable::new(10, 15, 25);
        let quote = quote(24900, BillingDuration::Quarterly, &discounts);

        assert_eq!(quote.total_minor, 74700);
        assert_eq!(quote.discount_minor, 7470);
        assert_eq!(quote.final_minor, 67230);
        assert_eq!(quote.discount_percent, 10);
    }

    #[test]
    fn monthly_quote_is_never_discounted() {
        let discounts = DiscountTable::new(10, 15, 25);
        let quote = quote(24900, BillingDuration::Monthly, &discounts);

        assert_eq!(quote.total_minor, 24900);
        assert_eq!(quote.discount_minor, 0);
        assert_eq!(quote.final_minor, 24900);
    }

    #[test]
    fn discount_never_exceeds_total() {
        let discounts = DiscountTable::new(33, 67, 100);
        for duration in [
            BillingDuration::Monthly,
            BillingDuration::Quarterly,
            BillingDuration::SemiAnnual,
            BillingDuration::Annual,
        ] {
            let q = quote(19999, duration, &discounts);
            assert!(q.final_minor <= q.total_minor);
            assert!(q.final_minor >= 0);
            assert_eq!(q.final_minor + q.discount_minor, q.total_minor);
        }
    }

    #[test]
    fn out_of_range_percentages_are_clamped() {
        let discounts = DiscountTable::new(-5, 150, 25);
        assert_eq!(discounts.quarterly, 0);
        assert_eq!(discounts.semi_annual, 100);
        assert_eq!(discounts.annual, 25);
    }

    #[test]
    fn unknown_duration_codes_fail_closed_to_monthly() {
        assert_eq!(BillingDuration::from_code("weekly"), BillingDuration::Monthly);
        assert_eq!(BillingDuration::from_months(9), BillingDuration::Monthly);
        assert_eq!(BillingDuration::from_code("annual"), BillingDuration::Annual);
    }
}
