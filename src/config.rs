use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sqlx::PgPool;

/// The five fixed rubric dimensions a judge scores and comments on
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedbackCategory {
    Technique,
    Musicality,
    PerformanceExpression,
    Choreography,
    OverallImpression,
}

impl FeedbackCategory {
    pub const ALL: [FeedbackCategory; 5] = [
        FeedbackCategory::Technique,
        FeedbackCategory::Musicality,
        FeedbackCategory::PerformanceExpression,
        FeedbackCategory::Choreography,
        FeedbackCategory::OverallImpression,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FeedbackCategory::Technique => "technique",
            FeedbackCategory::Musicality => "musicality",
            FeedbackCategory::PerformanceExpression => "performance_expression",
            FeedbackCategory::Choreography => "choreography",
            FeedbackCategory::OverallImpression => "overall_impression",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedbackCategory::Technique => "Technique",
            FeedbackCategory::Musicality => "Musicality",
            FeedbackCategory::PerformanceExpression => "Performance & Expression",
            FeedbackCategory::Choreography => "Choreography",
            FeedbackCategory::OverallImpression => "Overall Impression",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == value)
    }
}

impl Serialize for FeedbackCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for FeedbackCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        FeedbackCategory::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown feedback category: {value}")))
    }
}

/// Per-category sentence banks that drive the composer's canned choices.
/// Seeded from the compiled-in defaults, editable by administrators.
#[derive(Clone, Debug, Default)]
pub struct RubricSettings {
    banks: HashMap<FeedbackCategory, Vec<String>>,
}

impl RubricSettings {
    pub async fn ensure_defaults(pool: &PgPool) -> Result<()> {
        for category in FeedbackCategory::ALL {
            let sentences = serde_json::to_value(default_bank(category))?;
            sqlx::query(
                "INSERT INTO rubric_configs (category, sentences) VALUES ($1, $2)
                 ON CONFLICT (category) DO NOTHING",
            )
            .bind(category.key())
            .bind(&sentences)
            .execute(pool)
            .await
            .with_context(|| format!("failed to seed rubric bank for {}", category.key()))?;
        }

        Ok(())
    }

    pub async fn load(pool: &PgPool) -> Result<Self> {
        let rows = sqlx::query_as::<_, RubricConfigRow>(
            "SELECT category, sentences FROM rubric_configs",
        )
        .fetch_all(pool)
        .await
        .context("failed to load rubric configuration from database")?;

        let mut settings = RubricSettings::default();
        for row in rows {
            let category = FeedbackCategory::parse(&row.category)
                .ok_or_else(|| anyhow!("unknown rubric category found: {}", row.category))?;
            let sentences: Vec<String> = serde_json::from_value(row.sentences)
                .map_err(|err| anyhow!("failed to parse rubric bank for {}: {err}", row.category))?;
            settings.banks.insert(category, sentences);
        }

        for category in FeedbackCategory::ALL {
            if !settings.banks.contains_key(&category) {
                return Err(anyhow!("rubric bank missing for {}", category.key()));
            }
        }

        Ok(settings)
    }

    pub fn bank(&self, category: FeedbackCategory) -> &[String] {
        self.banks
            .get(&category)
            .map(|sentences| sentences.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, category: FeedbackCategory, sentence: &str) -> bool {
        self.bank(category).iter().any(|known| known == sentence)
    }
}

#[derive(sqlx::FromRow)]
struct RubricConfigRow {
    category: String,
    sentences: Value,
}

pub async fn update_bank(
    pool: &PgPool,
    category: FeedbackCategory,
    sentences: &[String],
) -> Result<()> {
    let payload = serde_json::to_value(sentences)
        .map_err(|err| anyhow!("failed to serialize rubric bank payload: {err}"))?;
    let result = sqlx::query(
        "UPDATE rubric_configs SET sentences = $2, updated_at = NOW() WHERE category = $1",
    )
    .bind(category.key())
    .bind(payload)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!(
            "rubric configuration not found for {}",
            category.key()
        ));
    }
    Ok(())
}

pub fn default_bank(category: FeedbackCategory) -> Vec<String> {
    let sentences: &[&str] = match category {
        FeedbackCategory::Technique => &[
            "Strong, controlled lines throughout the routine.",
            "Footwork precision needs attention in the faster sections.",
            "Excellent balance and core stability in turns.",
            "Extensions could reach further to complete each shape.",
            "Clean, confident execution of the technical elements.",
            "Landings from jumps need softer, quieter control.",
            "Posture and alignment stay consistent under pressure.",
            "Transitions between steps occasionally lose clarity.",
        ],
        FeedbackCategory::Musicality => &[
            "Movement sits beautifully inside the music's phrasing.",
            "Accents land exactly on the beat.",
            "Try playing with dynamics instead of hitting every count evenly.",
            "The choreography breathes with the music's rises and falls.",
            "Some sections drift ahead of the tempo.",
            "Strong rhythmic awareness in the percussive passages.",
            "Quiet moments in the music deserve quieter movement.",
            "Musical interpretation feels personal and committed.",
        ],
        FeedbackCategory::PerformanceExpression => &[
            "Your presence pulls the viewer in from the first count.",
            "Facial expression reads as genuine, not rehearsed.",
            "Keep the energy alive through the slower passages.",
            "Eye line drops to the floor during difficult steps.",
            "The storytelling intention comes through clearly.",
            "Keep performing through small mistakes; recovery is part of the show.",
            "Great projection for camera framing.",
            "Emotional commitment stays constant from start to finish.",
        ],
        FeedbackCategory::Choreography => &[
            "Inventive use of levels and direction changes.",
            "The structure builds logically to a satisfying finish.",
            "Some phrases repeat without development; vary them.",
            "Smart use of the available space.",
            "The highlight moment arrives too early; save a peak for the end.",
            "Movement vocabulary matches the chosen genre well.",
            "Transitions feel choreographed, not improvised.",
            "Consider a stronger opening image to set the tone.",
        ],
        FeedbackCategory::OverallImpression => &[
            "A polished, competition-ready performance.",
            "Clear potential; consistent practice will sharpen the details.",
            "The piece leaves a strong, lasting impression.",
            "Solid foundation with room to grow in confidence.",
            "A memorable performance with a distinct personal voice.",
            "Keep refining; the hard work is already visible.",
            "Technical skill and artistry are developing in balance.",
            "An enjoyable watch from beginning to end.",
        ],
    };

    sentences.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_keys_round_trip() {
        for category in FeedbackCategory::ALL {
            assert_eq!(FeedbackCategory::parse(category.key()), Some(category));
        }
        assert!(FeedbackCategory::parse("stagecraft").is_none());
    }

    #[test]
    fn default_banks_are_non_empty_and_distinct() {
        for category in FeedbackCategory::ALL {
            let bank = default_bank(category);
            assert!(!bank.is_empty(), "{} bank is empty", category.key());
            let mut deduped = bank.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), bank.len(), "{} bank repeats", category.key());
        }
    }

    #[test]
    fn bank_membership_check() {
        let mut settings = RubricSettings::default();
        settings.banks.insert(
            FeedbackCategory::Technique,
            vec!["Strong lines.".to_string()],
        );
        assert!(settings.contains(FeedbackCategory::Technique, "Strong lines."));
        assert!(!settings.contains(FeedbackCategory::Technique, "Weak lines."));
        assert!(!settings.contains(FeedbackCategory::Musicality, "Strong lines."));
    }
}
