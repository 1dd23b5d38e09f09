use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::schemas::{Choice, Question, QuestionKind};
use crate::session::errors::SessionError;

/// How a question collects its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionInput {
    ExclusiveChoice { choices: Vec<Choice> },
    SetChoice { choices: Vec<Choice> },
    Pairing { left: Vec<Choice>, right: Vec<Choice> },
    Ordering { items: Vec<Choice> },
    Text,
}

impl QuestionInput {
    fn for_question(question: &Question) -> Self {
        match question.kind {
            QuestionKind::SingleChoice => Self::ExclusiveChoice { choices: question.choices.clone() },
            QuestionKind::MultiChoice => Self::SetChoice { choices: question.choices.clone() },
            QuestionKind::Matching => {
                let columns = question.matching.clone().unwrap_or_default();
                Self::Pairing { left: columns.left, right: columns.right }
            }
            QuestionKind::Ranking => Self::Ordering { items: question.choices.clone() },
            QuestionKind::FreeText => Self::Text,
        }
    }
}

/// Current answer of one question.
///
/// `Opaque` holds a saved value that could not be read as the question's kind; it is
/// sent back unchanged until the student replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Single(Option<String>),
    Multi(Vec<String>),
    Matching(BTreeMap<String, String>),
    Ranking(Vec<String>),
    Text(String),
    Opaque(String),
}

impl AnswerValue {
    pub fn empty_for(question: &Question) -> Self {
        match question.kind {
            QuestionKind::SingleChoice => Self::Single(None),
            QuestionKind::MultiChoice => Self::Multi(Vec::new()),
            QuestionKind::Matching => Self::Matching(BTreeMap::new()),
            QuestionKind::Ranking => {
                Self::Ranking(question.choices.iter().map(|choice| choice.id.clone()).collect())
            }
            QuestionKind::FreeText => Self::Text(String::new()),
        }
    }

    /// Reads a saved answer. Composite kinds accept either structured JSON or a JSON
    /// string; anything unreadable becomes `Opaque`.
    pub fn restore(kind: QuestionKind, saved: &Value) -> Option<Self> {
        let restored = match (kind, saved) {
            (_, Value::Null) => return None,
            (QuestionKind::SingleChoice, Value::String(raw)) => Self::Single(Some(raw.clone())),
            (QuestionKind::SingleChoice, Value::Number(number)) => {
                Self::Single(Some(number.to_string()))
            }
            (QuestionKind::FreeText, Value::String(raw)) => Self::Text(raw.clone()),
            (QuestionKind::MultiChoice, _) => parse_list(saved).map_or_else(opaque(saved), Self::Multi),
            (QuestionKind::Ranking, _) => parse_list(saved).map_or_else(opaque(saved), Self::Ranking),
            (QuestionKind::Matching, _) => {
                parse_pairs(saved).map_or_else(opaque(saved), Self::Matching)
            }
            (QuestionKind::SingleChoice | QuestionKind::FreeText, other) => {
                Self::Opaque(other.to_string())
            }
        };

        Some(restored)
    }

    /// Wire form sent to the save endpoint: scalars raw, composites as JSON text.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Single(choice) => choice.clone().unwrap_or_default(),
            Self::Multi(items) | Self::Ranking(items) => {
                serde_json::to_string(items).unwrap_or_default()
            }
            Self::Matching(pairs) => serde_json::to_string(pairs).unwrap_or_default(),
            Self::Text(text) | Self::Opaque(text) => text.clone(),
        }
    }

    pub fn fits(&self, kind: QuestionKind) -> bool {
        matches!(
            (self, kind),
            (Self::Single(_), QuestionKind::SingleChoice)
                | (Self::Multi(_), QuestionKind::MultiChoice)
                | (Self::Matching(_), QuestionKind::Matching)
                | (Self::Ranking(_), QuestionKind::Ranking)
                | (Self::Text(_), QuestionKind::FreeText)
                | (Self::Opaque(_), _)
        )
    }
}

fn opaque(saved: &Value) -> impl FnOnce() -> AnswerValue + '_ {
    move || match saved {
        Value::String(raw) => AnswerValue::Opaque(raw.clone()),
        other => AnswerValue::Opaque(other.to_string()),
    }
}

fn parse_list(saved: &Value) -> Option<Vec<String>> {
    match saved {
        Value::String(raw) => serde_json::from_str(raw).ok(),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

fn parse_pairs(saved: &Value) -> Option<BTreeMap<String, String>> {
    let structured = match saved {
        Value::String(raw) => serde_json::from_str::<Value>(raw).ok()?,
        other => other.clone(),
    };

    if let Ok(pairs) = serde_json::from_value::<BTreeMap<String, String>>(structured.clone()) {
        return Some(pairs);
    }

    // [[left, right], ...]
    serde_json::from_value::<Vec<(String, String)>>(structured)
        .ok()
        .map(|pairs| pairs.into_iter().collect())
}

/// Per-question presentation state for one attempt.
#[derive(Debug, Clone)]
pub struct QuestionModel {
    question_id: String,
    kind: QuestionKind,
    input: QuestionInput,
    answer: AnswerValue,
    touched: bool,
}

impl QuestionModel {
    pub fn new(question: &Question, saved: Option<&Value>) -> Self {
        let restored = saved.and_then(|value| AnswerValue::restore(question.kind, value));
        let touched = restored.is_some();

        Self {
            question_id: question.id.clone(),
            kind: question.kind,
            input: QuestionInput::for_question(question),
            answer: restored.unwrap_or_else(|| AnswerValue::empty_for(question)),
            touched,
        }
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    pub fn input(&self) -> &QuestionInput {
        &self.input
    }

    pub fn answer(&self) -> &AnswerValue {
        &self.answer
    }

    pub fn set_answer(&mut self, value: AnswerValue) -> Result<(), SessionError> {
        if !value.fits(self.kind) {
            return Err(SessionError::AnswerShape {
                question_id: self.question_id.clone(),
                kind: self.kind.as_str(),
            });
        }

        self.answer = value;
        self.touched = true;
        Ok(())
    }

    pub fn is_answered(&self) -> bool {
        match &self.answer {
            AnswerValue::Single(choice) => choice.is_some(),
            AnswerValue::Multi(items) => !items.is_empty(),
            AnswerValue::Matching(pairs) => !pairs.is_empty(),
            // A ranking always holds a full order; it counts once restored or edited.
            AnswerValue::Ranking(_) => self.touched,
            AnswerValue::Text(text) => !text.trim().is_empty(),
            AnswerValue::Opaque(raw) => !raw.is_empty(),
        }
    }
}

pub fn build_models(
    questions: &[Question],
    saved: &BTreeMap<String, Value>,
) -> HashMap<String, QuestionModel> {
    questions
        .iter()
        .map(|question| {
            (question.id.clone(), QuestionModel::new(question, saved.get(&question.id)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{matching_question, question};
    use serde_json::json;

    #[test]
    fn restores_multi_choice_from_structured_array() {
        let questions = vec![question("q1", QuestionKind::MultiChoice, None)];
        let saved = BTreeMap::from([("q1".to_string(), json!(["opt2", "opt3"]))]);

        let models = build_models(&questions, &saved);
        let model = &models["q1"];
        assert_eq!(model.answer(), &AnswerValue::Multi(vec!["opt2".into(), "opt3".into()]));
        assert!(model.is_answered());
    }

    #[test]
    fn restores_multi_choice_from_json_string() {
        let questions = vec![question("q1", QuestionKind::MultiChoice, None)];
        let saved = BTreeMap::from([("q1".to_string(), json!("[\"opt2\",\"opt3\"]"))]);

        let models = build_models(&questions, &saved);
        assert_eq!(models["q1"].answer(), &AnswerValue::Multi(vec!["opt2".into(), "opt3".into()]));
    }

    #[test]
    fn unparsable_composite_answer_becomes_opaque() {
        let questions = vec![
            question("q1", QuestionKind::MultiChoice, None),
            question("q2", QuestionKind::Ranking, None),
            question("q3", QuestionKind::FreeText, None),
        ];
        let saved = BTreeMap::from([
            ("q1".to_string(), json!("opt2,opt3")),
            ("q2".to_string(), json!({"not": "a list"})),
            ("q3".to_string(), json!("plain text stays text")),
        ]);

        let models = build_models(&questions, &saved);
        assert_eq!(models.len(), 3);
        assert_eq!(models["q1"].answer(), &AnswerValue::Opaque("opt2,opt3".into()));
        assert_eq!(models["q1"].answer().to_wire(), "opt2,opt3");
        assert_eq!(models["q2"].answer(), &AnswerValue::Opaque("{\"not\":\"a list\"}".into()));
        assert_eq!(models["q3"].answer(), &AnswerValue::Text("plain text stays text".into()));
    }

    #[test]
    fn matching_accepts_object_or_pair_list() {
        let questions = vec![matching_question("q1"), matching_question("q2")];
        let saved = BTreeMap::from([
            ("q1".to_string(), json!("{\"l1\":\"r2\"}")),
            ("q2".to_string(), json!([["l1", "r1"], ["l2", "r2"]])),
        ]);

        let models = build_models(&questions, &saved);
        assert_eq!(
            models["q1"].answer(),
            &AnswerValue::Matching(BTreeMap::from([("l1".into(), "r2".into())]))
        );
        assert_eq!(
            models["q2"].answer(),
            &AnswerValue::Matching(BTreeMap::from([
                ("l1".into(), "r1".into()),
                ("l2".into(), "r2".into()),
            ]))
        );
        assert!(matches!(models["q2"].input(), QuestionInput::Pairing { left, .. } if left.len() == 2));
    }

    #[test]
    fn unanswered_questions_get_empty_values() {
        let questions = vec![
            question("q1", QuestionKind::SingleChoice, None),
            question("q2", QuestionKind::Ranking, None),
            question("q3", QuestionKind::FreeText, None),
        ];

        let models = build_models(&questions, &BTreeMap::new());
        assert_eq!(models["q1"].answer(), &AnswerValue::Single(None));
        assert_eq!(
            models["q2"].answer(),
            &AnswerValue::Ranking(vec!["q2-a".into(), "q2-b".into(), "q2-c".into()])
        );
        assert!(models.values().all(|model| !model.is_answered()));
    }

    #[test]
    fn set_answer_rejects_wrong_shape() {
        let q = question("q1", QuestionKind::SingleChoice, None);
        let mut model = QuestionModel::new(&q, None);

        let err = model.set_answer(AnswerValue::Text("free".into())).expect_err("shape");
        assert!(matches!(err, SessionError::AnswerShape { kind: "single_choice", .. }));

        model.set_answer(AnswerValue::Single(Some("q1-b".into()))).expect("fits");
        assert_eq!(model.answer().to_wire(), "q1-b");
    }

    #[test]
    fn wire_form_round_trips_through_restore() {
        let value = AnswerValue::Ranking(vec!["c".into(), "a".into(), "b".into()]);
        let wire = value.to_wire();
        assert_eq!(wire, "[\"c\",\"a\",\"b\"]");
        assert_eq!(AnswerValue::restore(QuestionKind::Ranking, &json!(wire)), Some(value));
    }
}
