//! Soil grid risk combination.
//!
//! A small deterministic state machine that folds the farm-level risk from
//! the anomaly scorer together with a probe's soil-moisture category into a
//! probe-level risk. Pure functions; identical inputs always produce
//! identical output.

use crate::types::{RiskLevel, SoilCategory};

/// Map a soil-moisture percentage to its category.
///
/// `< 30` → Dry, `30..60` → Moderate, `>= 60` → Wet.
pub fn soil_category(moisture_pct: f64) -> SoilCategory {
    if moisture_pct < 30.0 {
        SoilCategory::Dry
    } else if moisture_pct < 60.0 {
        SoilCategory::Moderate
    } else {
        SoilCategory::Wet
    }
}

/// Combine farm-level risk with a probe's soil moisture into a probe risk.
///
/// Wet soil escalates a non-normal farm risk by one step; dry soil relaxes
/// it by one step. A NORMAL farm never raises probe risk.
pub fn grid_risk(farm_risk: RiskLevel, moisture_pct: f64) -> RiskLevel {
    use RiskLevel::{High, Normal, Warning, Watch};
    use SoilCategory::{Dry, Moderate, Wet};

    match (farm_risk, soil_category(moisture_pct)) {
        (Normal, _) => Normal,

        (Watch, Dry) => Normal,
        (Watch, Moderate) => Watch,
        (Watch, Wet) => Warning,

        (Warning, Dry) => Watch,
        (Warning, Moderate) => Warning,
        (Warning, Wet) => High,

        (High, Dry) => Warning,
        (High, Moderate) | (High, Wet) => High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RiskLevel::{High, Normal, Warning, Watch};

    #[test]
    fn test_category_boundaries() {
        assert_eq!(soil_category(0.0), SoilCategory::Dry);
        assert_eq!(soil_category(29.99), SoilCategory::Dry);
        assert_eq!(soil_category(30.0), SoilCategory::Moderate);
        assert_eq!(soil_category(59.99), SoilCategory::Moderate);
        assert_eq!(soil_category(60.0), SoilCategory::Wet);
        assert_eq!(soil_category(100.0), SoilCategory::Wet);
    }

    #[test]
    fn test_full_transition_table() {
        // (farm risk, dry, moderate, wet)
        let table = [
            (Normal, Normal, Normal, Normal),
            (Watch, Normal, Watch, Warning),
            (Warning, Watch, Warning, High),
            (High, Warning, High, High),
        ];

        for (farm, dry, moderate, wet) in table {
            assert_eq!(grid_risk(farm, 15.0), dry, "{farm:?} x DRY");
            assert_eq!(grid_risk(farm, 45.0), moderate, "{farm:?} x MODERATE");
            assert_eq!(grid_risk(farm, 80.0), wet, "{farm:?} x WET");
        }
    }

    #[test]
    fn test_cited_cases() {
        assert_eq!(grid_risk(Warning, 15.0), Watch);
        assert_eq!(grid_risk(High, 70.0), High);
        assert_eq!(grid_risk(Normal, 95.0), Normal);
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert_eq!(grid_risk(Watch, 61.0), Warning);
        }
    }
}
