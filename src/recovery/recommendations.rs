//! Fixed recommendation table
//!
//! Recommendations are looked up from the (zone, edge-cases) tuple. This is a
//! decision table, not generated text: identical inputs always yield the same
//! list in the same order.

use super::edge_cases::EdgeCases;
use crate::types::RecoveryZone;

/// Base recommendations per zone
fn zone_recommendations(zone: RecoveryZone) -> &'static [&'static str] {
    match zone {
        RecoveryZone::Red => &[
            "Prioritize rest today",
            "Keep movement to an easy walk",
            "Target an earlier bedtime tonight",
        ],
        RecoveryZone::Yellow => &[
            "Favor moderate intensity today",
            "Hold off on adding new training stress",
        ],
        RecoveryZone::Green => &[
            "Good day for higher intensity",
            "Keep your normal wind-down routine",
        ],
    }
}

/// Recommendations for the day, from the fixed decision table
pub fn recommendations_for(zone: RecoveryZone, edge_cases: &EdgeCases) -> Vec<&'static str> {
    let mut recommendations: Vec<&'static str> = zone_recommendations(zone).to_vec();

    if edge_cases.alcohol_pattern {
        recommendations.push("Skip alcohol tonight and front-load hydration");
    }
    if edge_cases.illness_risk {
        recommendations.push("Watch for symptoms; keep intensity low and hydrate");
    }
    if edge_cases.travel_suspected {
        recommendations.push("Anchor to local daylight and keep caffeine early");
    }
    if edge_cases.menstrual_adjustment {
        recommendations.push("Elevated temperature is expected this phase");
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_rows() {
        assert_eq!(recommendations_for(RecoveryZone::Red, &EdgeCases::default()).len(), 3);
        assert_eq!(
            recommendations_for(RecoveryZone::Yellow, &EdgeCases::default()).len(),
            2
        );
        assert_eq!(
            recommendations_for(RecoveryZone::Green, &EdgeCases::default()).len(),
            2
        );
    }

    #[test]
    fn test_edge_cases_append_in_fixed_order() {
        let edge = EdgeCases {
            alcohol_pattern: true,
            illness_risk: true,
            travel_suspected: false,
            menstrual_adjustment: false,
        };
        let recommendations = recommendations_for(RecoveryZone::Red, &edge);
        assert_eq!(recommendations.len(), 5);
        assert_eq!(
            recommendations[3],
            "Skip alcohol tonight and front-load hydration"
        );
        assert_eq!(
            recommendations[4],
            "Watch for symptoms; keep intensity low and hydrate"
        );
    }

    #[test]
    fn test_deterministic() {
        let edge = EdgeCases {
            travel_suspected: true,
            ..EdgeCases::default()
        };
        let a = recommendations_for(RecoveryZone::Yellow, &edge);
        let b = recommendations_for(RecoveryZone::Yellow, &edge);
        assert_eq!(a, b);
    }
}
