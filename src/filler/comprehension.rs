use super::{Accumulator, InteractionError};
use crate::models::{Answer, ComprehensionFields, Mcq, PassageBlock};
use std::collections::BTreeMap;

/// Independent single-select per MCQ; the last selection wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComprehensionState {
    question_id: String,
    passage: Vec<PassageBlock>,
    mcqs: Vec<Mcq>,
    selected: BTreeMap<String, String>,
}

impl ComprehensionState {
    pub fn new(question_id: &str, fields: &ComprehensionFields, acc: &mut Accumulator) -> Self {
        let state = Self {
            question_id: question_id.to_string(),
            passage: fields.passage_blocks.clone(),
            mcqs: fields.mcqs.clone(),
            selected: BTreeMap::new(),
        };
        acc.record(&state.question_id, state.answer());
        state
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub fn passage(&self) -> &[PassageBlock] {
        &self.passage
    }

    pub fn mcqs(&self) -> &[Mcq] {
        &self.mcqs
    }

    pub fn selection(&self, mcq_id: &str) -> Option<&str> {
        self.selected.get(mcq_id).map(String::as_str)
    }

    pub fn answer(&self) -> Answer {
        Answer::Comprehension(self.selected.clone())
    }

    pub fn select_option(&mut self, mcq_id: &str, option: &str, acc: &mut Accumulator) -> Result<(), InteractionError> {
        let mcq = self
            .mcqs
            .iter()
            .find(|m| m.id == mcq_id)
            .ok_or_else(|| InteractionError::UnknownMcq(mcq_id.to_string()))?;
        if !mcq.options.iter().any(|o| o == option) {
            return Err(InteractionError::UnknownOption {
                mcq_id: mcq_id.to_string(),
                option: option.to_string(),
            });
        }
        self.selected.insert(mcq_id.to_string(), option.to_string());
        acc.record(&self.question_id, self.answer());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> ComprehensionFields {
        ComprehensionFields {
            passage_blocks: vec![PassageBlock::Text { content: "Owls hunt at night.".into() }],
            mcqs: vec![
                Mcq {
                    id: "m1".into(),
                    question: "When do owls hunt?".into(),
                    options: vec!["day".into(), "night".into()],
                    correct_answer: Some("night".into()),
                },
                Mcq {
                    id: "m2".into(),
                    question: "Are owls birds?".into(),
                    options: vec!["yes".into(), "no".into()],
                    correct_answer: None,
                },
            ],
        }
    }

    #[test]
    fn last_selection_wins() {
        let mut acc = Accumulator::new();
        let mut state = ComprehensionState::new("q", &fields(), &mut acc);
        state.select_option("m1", "day", &mut acc).unwrap();
        state.select_option("m1", "night", &mut acc).unwrap();

        match acc.get("q") {
            Some(Answer::Comprehension(map)) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.get("m1").map(String::as_str), Some("night"));
                assert!(!map.contains_key("m2"));
            }
            other => panic!("unexpected answer {other:?}"),
        }
        assert_eq!(state.selection("m2"), None);
    }

    #[test]
    fn unknown_mcq_or_option_is_rejected() {
        let mut acc = Accumulator::new();
        let mut state = ComprehensionState::new("q", &fields(), &mut acc);
        assert_eq!(
            state.select_option("m9", "yes", &mut acc),
            Err(InteractionError::UnknownMcq("m9".into()))
        );
        assert_eq!(
            state.select_option("m2", "maybe", &mut acc),
            Err(InteractionError::UnknownOption { mcq_id: "m2".into(), option: "maybe".into() })
        );
        assert_eq!(acc.get("q"), Some(&Answer::Comprehension(BTreeMap::new())));
    }
}
