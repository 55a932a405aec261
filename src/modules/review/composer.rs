use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::FeedbackCategory;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;
const CATEGORY_SEPARATOR: &str = "\n\n---\n\n";

/// One rubric category's draft state: a half-point score plus the selected
/// canned sentences and an optional free-text note.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryFeedback {
    pub score: f64,
    pub selected_sentences: Vec<String>,
    pub comment: String,
}

impl Default for CategoryFeedback {
    fn default() -> Self {
        Self {
            score: 5.0,
            selected_sentences: Vec::new(),
            comment: String::new(),
        }
    }
}

impl CategoryFeedback {
    /// A category counts as complete once it carries at least one selected
    /// sentence or a non-empty comment.
    pub fn is_complete(&self) -> bool {
        !self.selected_sentences.is_empty() || !self.comment.trim().is_empty()
    }
}

/// Local precondition failures of the composer. None of these reach the
/// database.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerError {
    AlreadySubmitted,
    InvalidScore(f64),
    UnknownSentence(FeedbackCategory),
    IncompleteCategory(FeedbackCategory),
}

impl fmt::Display for ComposerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposerError::AlreadySubmitted => {
                write!(f, "This feedback has already been submitted.")
            }
            ComposerError::InvalidScore(value) => write!(
                f,
                "Score {value} is invalid; scores run from 0 to 10 in half-point steps."
            ),
            ComposerError::UnknownSentence(category) => write!(
                f,
                "That sentence is not part of the {} bank.",
                category.label()
            ),
            ComposerError::IncompleteCategory(category) => write!(
                f,
                "The {} category needs at least one selected sentence or a comment.",
                category.label()
            ),
        }
    }
}

impl std::error::Error for ComposerError {}

/// Everything derived at submit time: the compiled text block, the display
/// aggregate, and the 0-100 sub-scores that go to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFeedback {
    pub text: String,
    pub aggregate_score: f64,
    pub sub_scores: BTreeMap<FeedbackCategory, i16>,
    pub overall: i16,
}

/// Draft state of one judge's evaluation of one performance. All edits are
/// refused once the submitted latch is set; the latch itself is only set by
/// the caller after the feedback has been persisted.
#[derive(Debug, Clone)]
pub struct FeedbackComposer {
    categories: BTreeMap<FeedbackCategory, CategoryFeedback>,
    submitted: bool,
}

impl Default for FeedbackComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackComposer {
    pub fn new() -> Self {
        let categories = FeedbackCategory::ALL
            .into_iter()
            .map(|category| (category, CategoryFeedback::default()))
            .collect();
        Self {
            categories,
            submitted: false,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn category(&self, category: FeedbackCategory) -> &CategoryFeedback {
        &self.categories[&category]
    }

    pub fn categories(&self) -> impl Iterator<Item = (FeedbackCategory, &CategoryFeedback)> {
        self.categories
            .iter()
            .map(|(category, feedback)| (*category, feedback))
    }

    pub fn set_score(
        &mut self,
        category: FeedbackCategory,
        value: f64,
    ) -> Result<(), ComposerError> {
        self.ensure_editable()?;
        if !score_on_grid(value) {
            return Err(ComposerError::InvalidScore(value));
        }
        self.entry(category).score = value;
        Ok(())
    }

    /// Add the sentence to the category's selection, or remove it if already
    /// selected. Returns whether the sentence is selected afterwards.
    pub fn toggle_sentence(
        &mut self,
        category: FeedbackCategory,
        sentence: &str,
        bank: &[String],
    ) -> Result<bool, ComposerError> {
        self.ensure_editable()?;
        if !bank.iter().any(|known| known == sentence) {
            return Err(ComposerError::UnknownSentence(category));
        }

        let selected = &mut self.entry(category).selected_sentences;
        if let Some(position) = selected.iter().position(|s| s == sentence) {
            selected.remove(position);
            Ok(false)
        } else {
            selected.push(sentence.to_string());
            Ok(true)
        }
    }

    pub fn set_comment(
        &mut self,
        category: FeedbackCategory,
        text: impl Into<String>,
    ) -> Result<(), ComposerError> {
        self.ensure_editable()?;
        self.entry(category).comment = text.into();
        Ok(())
    }

    pub fn incomplete_categories(&self) -> Vec<FeedbackCategory> {
        FeedbackCategory::ALL
            .into_iter()
            .filter(|category| !self.categories[category].is_complete())
            .collect()
    }

    /// Validate the draft and derive the submission artifact. Does not set
    /// the latch; call `mark_submitted` after the writes have succeeded.
    pub fn compose(&self) -> Result<ComposedFeedback, ComposerError> {
        if self.submitted {
            return Err(ComposerError::AlreadySubmitted);
        }
        if let Some(category) = self.incomplete_categories().into_iter().next() {
            return Err(ComposerError::IncompleteCategory(category));
        }

        let mut blocks = Vec::with_capacity(FeedbackCategory::ALL.len());
        let mut sub_scores = BTreeMap::new();
        let mut total = 0.0;

        for category in FeedbackCategory::ALL {
            let feedback = &self.categories[&category];
            total += feedback.score;
            sub_scores.insert(category, rescale(feedback.score));
            blocks.push(render_category(category, feedback));
        }

        let mean = total / FeedbackCategory::ALL.len() as f64;
        let aggregate_score = round_to_tenth(mean);

        Ok(ComposedFeedback {
            text: blocks.join(CATEGORY_SEPARATOR),
            aggregate_score,
            sub_scores,
            overall: rescale(aggregate_score),
        })
    }

    /// Flip the latch after a successful submission, locking further edits.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    fn ensure_editable(&self) -> Result<(), ComposerError> {
        if self.submitted {
            return Err(ComposerError::AlreadySubmitted);
        }
        Ok(())
    }

    fn entry(&mut self, category: FeedbackCategory) -> &mut CategoryFeedback {
        self.categories
            .get_mut(&category)
            .expect("composer holds every category")
    }
}

/// Scores move on the half-point grid within [0, 10] only. Half points are
/// exactly representable, so the doubled value must be a whole number.
fn score_on_grid(value: f64) -> bool {
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        return false;
    }
    (value * 2.0).fract() == 0.0
}

fn rescale(score: f64) -> i16 {
    (score * 10.0).round() as i16
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.1}")
    }
}

fn render_category(category: FeedbackCategory, feedback: &CategoryFeedback) -> String {
    let mut block = format!(
        "{} ({}/10)",
        category.label(),
        format_score(feedback.score)
    );

    for sentence in &feedback.selected_sentences {
        block.push_str("\n- ");
        block.push_str(sentence);
    }

    let comment = feedback.comment.trim();
    if !comment.is_empty() {
        block.push_str("\nNote: ");
        block.push_str(comment);
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_bank;

    fn complete_composer(score: f64) -> FeedbackComposer {
        let mut composer = FeedbackComposer::new();
        for category in FeedbackCategory::ALL {
            let bank = default_bank(category);
            composer.set_score(category, score).unwrap();
            composer.toggle_sentence(category, &bank[0], &bank).unwrap();
        }
        composer
    }

    #[test]
    fn new_composer_is_empty_and_editable() {
        let composer = FeedbackComposer::new();
        assert!(!composer.is_submitted());
        assert_eq!(composer.incomplete_categories().len(), 5);
    }

    #[test]
    fn scores_stay_on_the_half_point_grid() {
        let mut composer = FeedbackComposer::new();
        composer
            .set_score(FeedbackCategory::Technique, 7.5)
            .unwrap();
        composer.set_score(FeedbackCategory::Technique, 0.0).unwrap();
        composer
            .set_score(FeedbackCategory::Technique, 10.0)
            .unwrap();

        assert_eq!(
            composer.set_score(FeedbackCategory::Technique, 10.5),
            Err(ComposerError::InvalidScore(10.5))
        );
        assert_eq!(
            composer.set_score(FeedbackCategory::Technique, -0.5),
            Err(ComposerError::InvalidScore(-0.5))
        );
        assert_eq!(
            composer.set_score(FeedbackCategory::Technique, 7.25),
            Err(ComposerError::InvalidScore(7.25))
        );
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut composer = FeedbackComposer::new();
        let bank = default_bank(FeedbackCategory::Musicality);

        let selected = composer
            .toggle_sentence(FeedbackCategory::Musicality, &bank[1], &bank)
            .unwrap();
        assert!(selected);
        assert!(composer.category(FeedbackCategory::Musicality).is_complete());

        let selected = composer
            .toggle_sentence(FeedbackCategory::Musicality, &bank[1], &bank)
            .unwrap();
        assert!(!selected);
        assert!(!composer.category(FeedbackCategory::Musicality).is_complete());
    }

    #[test]
    fn out_of_bank_sentence_is_rejected() {
        let mut composer = FeedbackComposer::new();
        let bank = default_bank(FeedbackCategory::Choreography);
        let result =
            composer.toggle_sentence(FeedbackCategory::Choreography, "Made-up praise.", &bank);
        assert_eq!(
            result,
            Err(ComposerError::UnknownSentence(
                FeedbackCategory::Choreography
            ))
        );
    }

    #[test]
    fn whitespace_comment_does_not_complete_a_category() {
        let mut composer = FeedbackComposer::new();
        composer
            .set_comment(FeedbackCategory::Technique, "   \n")
            .unwrap();
        assert!(!composer.category(FeedbackCategory::Technique).is_complete());

        composer
            .set_comment(FeedbackCategory::Technique, "Watch the landings.")
            .unwrap();
        assert!(composer.category(FeedbackCategory::Technique).is_complete());
    }

    #[test]
    fn compose_rejects_an_incomplete_category() {
        let mut composer = complete_composer(8.0);
        // Empty out choreography again: deselect its only sentence.
        let bank = default_bank(FeedbackCategory::Choreography);
        composer
            .toggle_sentence(FeedbackCategory::Choreography, &bank[0], &bank)
            .unwrap();

        assert_eq!(
            composer.compose(),
            Err(ComposerError::IncompleteCategory(
                FeedbackCategory::Choreography
            ))
        );
    }

    #[test]
    fn straight_eights_produce_eighty_across_the_board() {
        let composer = complete_composer(8.0);
        let composed = composer.compose().unwrap();

        assert_eq!(composed.aggregate_score, 8.0);
        assert_eq!(composed.overall, 80);
        for category in FeedbackCategory::ALL {
            assert_eq!(composed.sub_scores[&category], 80);
        }
    }

    #[test]
    fn mixed_scores_average_to_one_decimal() {
        let mut composer = FeedbackComposer::new();
        let scores = [7.5, 8.0, 9.0, 6.5, 10.0];
        for (category, score) in FeedbackCategory::ALL.into_iter().zip(scores) {
            let bank = default_bank(category);
            composer.set_score(category, score).unwrap();
            composer.toggle_sentence(category, &bank[0], &bank).unwrap();
        }

        let composed = composer.compose().unwrap();
        assert_eq!(composed.aggregate_score, 8.2);
        assert_eq!(composed.overall, 82);
        assert_eq!(composed.sub_scores[&FeedbackCategory::Technique], 75);
        assert_eq!(
            composed.sub_scores[&FeedbackCategory::OverallImpression],
            100
        );
    }

    #[test]
    fn compiled_text_lists_sentences_and_notes() {
        let mut composer = FeedbackComposer::new();
        for category in FeedbackCategory::ALL {
            let bank = default_bank(category);
            composer.set_score(category, 8.0).unwrap();
            composer.toggle_sentence(category, &bank[0], &bank).unwrap();
        }
        composer
            .set_score(FeedbackCategory::Technique, 7.5)
            .unwrap();
        composer
            .set_comment(FeedbackCategory::Technique, "Keep the knees soft.")
            .unwrap();

        let composed = composer.compose().unwrap();
        let technique_bank = default_bank(FeedbackCategory::Technique);
        let expected_head = format!(
            "Technique (7.5/10)\n- {}\nNote: Keep the knees soft.",
            technique_bank[0]
        );

        assert!(composed.text.starts_with(&expected_head));
        assert!(composed.text.contains("\n\n---\n\nMusicality (8/10)\n"));
    }

    #[test]
    fn latch_blocks_edits_and_resubmission() {
        let mut composer = complete_composer(8.0);
        composer.compose().unwrap();
        composer.mark_submitted();

        assert_eq!(composer.compose(), Err(ComposerError::AlreadySubmitted));
        assert_eq!(
            composer.set_score(FeedbackCategory::Technique, 9.0),
            Err(ComposerError::AlreadySubmitted)
        );
        assert_eq!(
            composer.set_comment(FeedbackCategory::Technique, "late edit"),
            Err(ComposerError::AlreadySubmitted)
        );
        let bank = default_bank(FeedbackCategory::Technique);
        assert_eq!(
            composer.toggle_sentence(FeedbackCategory::Technique, &bank[0], &bank),
            Err(ComposerError::AlreadySubmitted)
        );
    }
}
