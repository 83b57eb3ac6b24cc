//! Answer payloads and question kinds.
//!
//! The platform's question types carry structurally different answers: a
//! single choice is one string, an ordering is a list, a matching
//! exercise is a key→key map. Instead of sniffing the shape at read
//! time, the variant is closed and tagged — [`AnswerValue`] — and each
//! [`QuestionKind`] knows which variant it expects and when that variant
//! counts as "answered".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::QuestionId;

// ---------------------------------------------------------------------------
// AnswerValue
// ---------------------------------------------------------------------------

/// The value of one answer, tagged by shape.
///
/// Adjacently tagged JSON, e.g. `{"type": "scalar", "value": "b"}` or
/// `{"type": "paired", "value": {"berlin": "germany"}}`. `Paired` uses a
/// `BTreeMap` so serialization order is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// A single value: choice id or free text.
    Scalar(String),
    /// An ordered list: multi-choice selections or an ordering exercise.
    Ordered(Vec<String>),
    /// A key→key mapping: matching (left→right) or categorization
    /// (option→category).
    Paired(BTreeMap<String, String>),
}

impl AnswerValue {
    /// Returns `true` if the value carries no content at all.
    ///
    /// An empty value never satisfies any question kind; the UI treats
    /// it the same as "no answer yet".
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.trim().is_empty(),
            Self::Ordered(items) => items.is_empty(),
            Self::Paired(map) => map.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// AnswerSlot
// ---------------------------------------------------------------------------

/// What the student has recorded against one question: an optional
/// answer value plus the review flag.
///
/// A slot can exist with `value: None` — the student flagged the
/// question for review without answering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnswerSlot {
    #[serde(default)]
    pub value: Option<AnswerValue>,
    #[serde(default)]
    pub flagged: bool,
}

// ---------------------------------------------------------------------------
// QuestionKind
// ---------------------------------------------------------------------------

/// The closed set of question types, each carrying the option data the
/// completeness rule needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice { options: Vec<String> },
    MultiChoice { options: Vec<String> },
    FreeText,
    /// Arrange `items` into an order.
    Ordering { items: Vec<String> },
    /// Match each `left` item to one of `right`.
    Matching { left: Vec<String>, right: Vec<String> },
    /// Assign every option to one of `categories`.
    Categorization { options: Vec<String>, categories: Vec<String> },
}

impl QuestionKind {
    /// The answer shape this kind expects, as an empty template.
    pub fn blank_answer(&self) -> AnswerValue {
        match self {
            Self::SingleChoice { .. } | Self::FreeText => {
                AnswerValue::Scalar(String::new())
            }
            Self::MultiChoice { .. } | Self::Ordering { .. } => {
                AnswerValue::Ordered(Vec::new())
            }
            Self::Matching { .. } | Self::Categorization { .. } => {
                AnswerValue::Paired(BTreeMap::new())
            }
        }
    }

    /// Whether `value` fully answers a question of this kind.
    ///
    /// Cardinality rules per kind:
    /// - scalar and list kinds: non-empty is enough;
    /// - matching: one entry per left-side item;
    /// - categorization: every option assigned to a category.
    ///
    /// A value of the wrong shape never counts as answered.
    pub fn is_answered(&self, value: &AnswerValue) -> bool {
        match (self, value) {
            (Self::SingleChoice { .. }, AnswerValue::Scalar(_))
            | (Self::FreeText, AnswerValue::Scalar(_))
            | (Self::MultiChoice { .. }, AnswerValue::Ordered(_))
            | (Self::Ordering { .. }, AnswerValue::Ordered(_)) => {
                !value.is_empty()
            }
            (Self::Matching { left, .. }, AnswerValue::Paired(map)) => {
                left.iter().all(|item| map.contains_key(item))
            }
            (
                Self::Categorization { options, .. },
                AnswerValue::Paired(map),
            ) => options.iter().all(|option| map.contains_key(option)),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One exam question as delivered by the session load.
///
/// Rendering (prompt markup, media) is the UI layer's concern; the core
/// only needs identity and the kind's completeness data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// Whether `slot` fully answers this question.
    pub fn is_answered_by(&self, slot: Option<&AnswerSlot>) -> bool {
        slot.and_then(|s| s.value.as_ref())
            .is_some_and(|value| self.kind.is_answered(value))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The completeness rules gate the submit affordance; each kind's
    //! cardinality rule gets its own case.

    use super::*;

    fn paired(entries: &[(&str, &str)]) -> AnswerValue {
        AnswerValue::Paired(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_scalar_answered_when_non_empty() {
        let kind = QuestionKind::SingleChoice {
            options: vec!["a".into(), "b".into()],
        };
        assert!(kind.is_answered(&AnswerValue::Scalar("b".into())));
        assert!(!kind.is_answered(&AnswerValue::Scalar("".into())));
        assert!(!kind.is_answered(&AnswerValue::Scalar("   ".into())));
    }

    #[test]
    fn test_free_text_answered_when_non_empty() {
        assert!(QuestionKind::FreeText
            .is_answered(&AnswerValue::Scalar("an essay".into())));
        assert!(!QuestionKind::FreeText
            .is_answered(&AnswerValue::Scalar(String::new())));
    }

    #[test]
    fn test_multi_choice_requires_at_least_one_selection() {
        let kind = QuestionKind::MultiChoice {
            options: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(kind.is_answered(&AnswerValue::Ordered(vec!["a".into()])));
        assert!(!kind.is_answered(&AnswerValue::Ordered(vec![])));
    }

    #[test]
    fn test_matching_requires_entry_per_left_item() {
        let kind = QuestionKind::Matching {
            left: vec!["berlin".into(), "paris".into()],
            right: vec!["germany".into(), "france".into()],
        };
        assert!(!kind.is_answered(&paired(&[("berlin", "germany")])));
        assert!(kind.is_answered(&paired(&[
            ("berlin", "germany"),
            ("paris", "france"),
        ])));
    }

    #[test]
    fn test_categorization_requires_every_option_assigned() {
        let kind = QuestionKind::Categorization {
            options: vec!["cat".into(), "oak".into()],
            categories: vec!["animal".into(), "plant".into()],
        };
        assert!(!kind.is_answered(&paired(&[("cat", "animal")])));
        assert!(kind.is_answered(&paired(&[
            ("cat", "animal"),
            ("oak", "plant"),
        ])));
    }

    #[test]
    fn test_wrong_shape_never_counts_as_answered() {
        let kind = QuestionKind::SingleChoice {
            options: vec!["a".into()],
        };
        assert!(!kind.is_answered(&AnswerValue::Ordered(vec!["a".into()])));
        assert!(!kind.is_answered(&paired(&[("a", "b")])));
    }

    #[test]
    fn test_answer_value_json_shape() {
        let json = serde_json::to_value(&AnswerValue::Scalar("b".into()))
            .unwrap();
        assert_eq!(json["type"], "scalar");
        assert_eq!(json["value"], "b");

        let json = serde_json::to_value(&paired(&[("x", "y")])).unwrap();
        assert_eq!(json["type"], "paired");
        assert_eq!(json["value"]["x"], "y");
    }

    #[test]
    fn test_question_kind_flattens_into_question() {
        // The kind tag sits at the question's top level on the wire.
        let q = Question {
            id: QuestionId(1),
            prompt: "Pick one".into(),
            kind: QuestionKind::SingleChoice {
                options: vec!["a".into()],
            },
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "single_choice");
        assert_eq!(json["options"][0], "a");

        let decoded: Question = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, q);
    }

    #[test]
    fn test_question_answered_by_slot() {
        let q = Question {
            id: QuestionId(1),
            prompt: "Pick one".into(),
            kind: QuestionKind::SingleChoice {
                options: vec!["a".into()],
            },
        };
        assert!(!q.is_answered_by(None));
        assert!(!q.is_answered_by(Some(&AnswerSlot {
            value: None,
            flagged: true,
        })));
        assert!(q.is_answered_by(Some(&AnswerSlot {
            value: Some(AnswerValue::Scalar("a".into())),
            flagged: false,
        })));
    }

    #[test]
    fn test_blank_answer_matches_expected_shape() {
        let kind = QuestionKind::Matching {
            left: vec!["l".into()],
            right: vec!["r".into()],
        };
        assert!(matches!(kind.blank_answer(), AnswerValue::Paired(_)));
        assert!(kind.blank_answer().is_empty());
    }
}
