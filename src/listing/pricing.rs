use super::models::ListingDraft;
use serde::Serialize;

/// Flat amount added to the source price before the multiplier.
pub const BASE_MARKUP: f64 = 360.0;

pub const MULTIPLIERS: [f64; 4] = [2.0, 2.5, 3.5, 4.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceOption {
    pub multiplier: f64,
    pub price: f64,
}

/// `(source + 360) * multiplier`, rounded to the nearest hundred.
pub fn price_for(source_price: f64, multiplier: f64) -> f64 {
    (((source_price + BASE_MARKUP) * multiplier) / 100.0).round() * 100.0
}

pub fn options(source_price: f64) -> Vec<PriceOption> {
    MULTIPLIERS
        .iter()
        .map(|&multiplier| PriceOption {
            multiplier,
            price: price_for(source_price, multiplier),
        })
        .collect()
}

/// A positive custom price wins; otherwise the chosen multiplier applies.
/// `None` until the operator has picked one of the two.
pub fn final_price(source_price: f64, draft: &ListingDraft) -> Option<f64> {
    if let Some(custom) = draft.custom_price.filter(|p| *p > 0.0) {
        return Some(custom);
    }
    draft
        .multiplier
        .filter(|m| *m > 0.0)
        .map(|m| price_for(source_price, m))
}

pub fn is_offered(multiplier: f64) -> bool {
    MULTIPLIERS.iter().any(|m| (m - multiplier).abs() < f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_hundred() {
        // (1240 + 360) * 2.5 = 4000
        assert_eq!(price_for(1240.0, 2.5), 4000.0);
        // (999 + 360) * 3.5 = 4756.5 -> 4800
        assert_eq!(price_for(999.0, 3.5), 4800.0);
        // (100 + 360) * 2 = 920 -> 900
        assert_eq!(price_for(100.0, 2.0), 900.0);
    }

    #[test]
    fn offers_every_multiplier_in_order() {
        let offered: Vec<f64> = options(640.0).iter().map(|o| o.price).collect();
        assert_eq!(offered, vec![2000.0, 2500.0, 3500.0, 4000.0]);
    }

    #[test]
    fn custom_price_overrides_multiplier() {
        let mut draft = ListingDraft {
            multiplier: Some(2.0),
            ..ListingDraft::default()
        };
        assert_eq!(final_price(640.0, &draft), Some(2000.0));
        draft.custom_price = Some(1750.0);
        assert_eq!(final_price(640.0, &draft), Some(1750.0));
        assert_eq!(final_price(640.0, &ListingDraft::default()), None);
    }

    #[test]
    fn only_listed_multipliers_are_offered() {
        assert!(is_offered(3.5));
        assert!(!is_offered(3.0));
    }
}
