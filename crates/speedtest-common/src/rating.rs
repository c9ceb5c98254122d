//! Qualitative tiers for measured throughput and latency.
//!
//! Throughput thresholds are inclusive lower bounds (highest matching tier
//! wins); latency thresholds are inclusive upper bounds (lowest matching
//! tier wins). Latency has no `VeryPoor` tier.

use serde::{Deserialize, Serialize};

use crate::models::TestType;

/// Human-facing performance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingTier {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl RatingTier {
    /// Tier for a throughput figure in Mbps.
    pub fn for_throughput(speed_mbps: f64) -> Self {
        if speed_mbps >= 1000.0 {
            RatingTier::Excellent
        } else if speed_mbps >= 500.0 {
            RatingTier::VeryGood
        } else if speed_mbps >= 100.0 {
            RatingTier::Good
        } else if speed_mbps >= 25.0 {
            RatingTier::Fair
        } else if speed_mbps >= 5.0 {
            RatingTier::Poor
        } else {
            RatingTier::VeryPoor
        }
    }

    /// Tier for a latency figure in milliseconds.
    pub fn for_latency(latency_ms: f64) -> Self {
        if latency_ms <= 20.0 {
            RatingTier::Excellent
        } else if latency_ms <= 50.0 {
            RatingTier::VeryGood
        } else if latency_ms <= 100.0 {
            RatingTier::Good
        } else if latency_ms <= 200.0 {
            RatingTier::Fair
        } else {
            RatingTier::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RatingTier::Excellent => "Excellent",
            RatingTier::VeryGood => "Very Good",
            RatingTier::Good => "Good",
            RatingTier::Fair => "Fair",
            RatingTier::Poor => "Poor",
            RatingTier::VeryPoor => "Very Poor",
        }
    }
}

impl std::fmt::Display for RatingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A tier together with its display color and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rating {
    pub rating: RatingTier,
    pub color: &'static str,
    pub description: &'static str,
}

impl Rating {
    /// Classify `value` as a throughput (download/upload, Mbps) or latency
    /// (ms) figure depending on `test_type`.
    pub fn classify(value: f64, test_type: TestType) -> Self {
        match test_type {
            TestType::Download | TestType::Upload => Self::throughput(value),
            TestType::Latency => Self::latency(value),
        }
    }

    pub fn throughput(speed_mbps: f64) -> Self {
        let tier = RatingTier::for_throughput(speed_mbps);
        let (color, description) = match tier {
            RatingTier::Excellent => ("#00ff00", "Gigabit+ speed - Perfect for all activities"),
            RatingTier::VeryGood => ("#80ff00", "Great for 4K streaming, large downloads"),
            RatingTier::Good => ("#ffff00", "Good for HD streaming, video calls"),
            RatingTier::Fair => ("#ff8000", "Adequate for basic streaming, browsing"),
            RatingTier::Poor => ("#ff4000", "Limited to basic web browsing"),
            RatingTier::VeryPoor => ("#ff0000", "May have connectivity issues"),
        };
        Self {
            rating: tier,
            color,
            description,
        }
    }

    pub fn latency(latency_ms: f64) -> Self {
        let tier = RatingTier::for_latency(latency_ms);
        let (color, description) = match tier {
            RatingTier::Excellent => ("#00ff00", "Perfect for gaming and real-time apps"),
            RatingTier::VeryGood => ("#80ff00", "Great for most online activities"),
            RatingTier::Good => ("#ffff00", "Good for general use"),
            RatingTier::Fair => ("#ff8000", "Noticeable delay in interactive apps"),
            // for_latency never yields VeryPoor
            RatingTier::Poor | RatingTier::VeryPoor => {
                ("#ff0000", "High latency may affect performance")
            }
        };
        Self {
            rating: tier,
            color,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_boundaries_are_inclusive_lower_bounds() {
        assert_eq!(Rating::classify(1000.0, TestType::Download).rating, RatingTier::Excellent);
        assert_eq!(Rating::classify(999.9, TestType::Download).rating, RatingTier::VeryGood);
        assert_eq!(RatingTier::for_throughput(500.0), RatingTier::VeryGood);
        assert_eq!(RatingTier::for_throughput(100.0), RatingTier::Good);
        assert_eq!(RatingTier::for_throughput(25.0), RatingTier::Fair);
        assert_eq!(RatingTier::for_throughput(5.0), RatingTier::Poor);
        assert_eq!(RatingTier::for_throughput(4.99), RatingTier::VeryPoor);
        assert_eq!(RatingTier::for_throughput(0.0), RatingTier::VeryPoor);
    }

    #[test]
    fn latency_boundaries_are_inclusive_upper_bounds() {
        assert_eq!(Rating::classify(20.0, TestType::Latency).rating, RatingTier::Excellent);
        assert_eq!(Rating::classify(20.1, TestType::Latency).rating, RatingTier::VeryGood);
        assert_eq!(RatingTier::for_latency(50.0), RatingTier::VeryGood);
        assert_eq!(RatingTier::for_latency(100.0), RatingTier::Good);
        assert_eq!(RatingTier::for_latency(200.0), RatingTier::Fair);
        assert_eq!(RatingTier::for_latency(200.1), RatingTier::Poor);
        assert_eq!(RatingTier::for_latency(10_000.0), RatingTier::Poor);
    }

    #[test]
    fn upload_uses_throughput_scale() {
        assert_eq!(Rating::classify(30.0, TestType::Upload), Rating::throughput(30.0));
    }

    #[test]
    fn poor_differs_by_domain() {
        let slow = Rating::throughput(6.0);
        let laggy = Rating::latency(300.0);
        assert_eq!(slow.rating, laggy.rating);
        assert_eq!(slow.color, "#ff4000");
        assert_eq!(laggy.color, "#ff0000");
        assert_ne!(slow.description, laggy.description);
    }

    #[test]
    fn serializes_display_labels() {
        let json = serde_json::to_value(Rating::throughput(600.0)).unwrap();
        assert_eq!(json["rating"], "Very Good");
        assert_eq!(json["color"], "#80ff00");
        assert_eq!(json["description"], "Great for 4K streaming, large downloads");
    }
}
