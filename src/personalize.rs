//! Personalization strategy interface.

use serde::Serialize;
use serde_json::{Value, json};

use crate::store::models::{Tier, User};

/// Result of one recommendation pass.
#[derive(Debug, Clone, Serialize)]
pub struct Personalization {
    pub recommendations: Vec<String>,
    pub personalized_content: Value,
}

/// Pure function of the user (tier included) and their stated preferences.
/// Implementations must be idempotent; callers may re-invoke freely.
pub trait PersonalizationStrategy: Send + Sync {
    fn recommend(&self, user: &User, preferences: &Value) -> Personalization;
}

/// Default strategy: tier-driven content depth plus topic echoes from the
/// submitted preferences.
pub struct TierStrategy;

impl PersonalizationStrategy for TierStrategy {
    fn recommend(&self, user: &User, preferences: &Value) -> Personalization {
        let depth = match user.tier {
            Tier::Lightweight => "introductory",
            Tier::Full => "intermediate",
            Tier::Premium => "advanced",
        };

        let topics: Vec<String> = preferences
            .get("topics")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let recommendations = if topics.is_empty() {
            vec![format!("Start with the {depth} track")]
        } else {
            topics
                .iter()
                .map(|t| format!("Explore {depth} material on {t}"))
                .collect()
        };

        Personalization {
            recommendations,
            personalized_content: json!({
                "depth": depth,
                "topics": topics,
            }),
        }
    }
}
