//! Respondent-side interaction: one state machine per question, all writing
//! into a single accumulator owned by [`Filler`].

pub mod categorize;
pub mod cloze;
pub mod comprehension;
pub mod session;

use crate::models::{Answer, Form, Question, QuestionBody, QuestionKind};
use crate::submission::{assemble, Submission};
use categorize::CategorizeState;
use cloze::ClozeState;
use comprehension::ComprehensionState;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error("no question with id {0}")]
    UnknownQuestion(String),
    #[error("question {question_id} is a {actual} question, the event targets {expected}")]
    WrongKind {
        question_id: String,
        expected: QuestionKind,
        actual: QuestionKind,
    },
    #[error("unknown item {0}")]
    UnknownItem(String),
    #[error("item {0} is already assigned")]
    ItemAlreadyAssigned(String),
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("blank {index} is out of range ({count} blanks)")]
    BlankOutOfRange { index: usize, count: usize },
    #[error("word bank index {index} is out of range ({len} words)")]
    WordOutOfRange { index: usize, len: usize },
    #[error("unknown mcq {0}")]
    UnknownMcq(String),
    #[error("{option:?} is not an option of mcq {mcq_id}")]
    UnknownOption { mcq_id: String, option: String },
}

/// Current answer of every question, keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    answers: HashMap<String, Answer>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, question_id: &str, answer: Answer) {
        self.answers.insert(question_id.to_string(), answer);
    }

    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionState {
    Categorize(CategorizeState),
    Cloze(ClozeState),
    Comprehension(ComprehensionState),
}

impl InteractionState {
    /// Builds the state machine for `question` and seeds its answer.
    pub fn for_question(question: &Question, acc: &mut Accumulator) -> Self {
        match &question.body {
            QuestionBody::Categorize(fields) => {
                InteractionState::Categorize(CategorizeState::new(&question.id, fields, acc))
            }
            QuestionBody::Cloze(fields) => InteractionState::Cloze(ClozeState::new(&question.id, fields, acc)),
            QuestionBody::Comprehension(fields) => {
                InteractionState::Comprehension(ComprehensionState::new(&question.id, fields, acc))
            }
        }
    }

    pub fn question_id(&self) -> &str {
        match self {
            InteractionState::Categorize(s) => s.question_id(),
            InteractionState::Cloze(s) => s.question_id(),
            InteractionState::Comprehension(s) => s.question_id(),
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            InteractionState::Categorize(_) => QuestionKind::Categorize,
            InteractionState::Cloze(_) => QuestionKind::Cloze,
            InteractionState::Comprehension(_) => QuestionKind::Comprehension,
        }
    }
}

/// A respondent input, addressed to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillerEvent {
    SelectItem { question_id: String, item_id: String },
    SelectCategory { question_id: String, category: String },
    SelectBlank { question_id: String, blank: usize },
    SelectWord { question_id: String, bank_index: usize },
    SelectOption { question_id: String, mcq_id: String, option: String },
}

impl FillerEvent {
    pub fn question_id(&self) -> &str {
        match self {
            FillerEvent::SelectItem { question_id, .. }
            | FillerEvent::SelectCategory { question_id, .. }
            | FillerEvent::SelectBlank { question_id, .. }
            | FillerEvent::SelectWord { question_id, .. }
            | FillerEvent::SelectOption { question_id, .. } => question_id,
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            FillerEvent::SelectItem { .. } | FillerEvent::SelectCategory { .. } => QuestionKind::Categorize,
            FillerEvent::SelectBlank { .. } | FillerEvent::SelectWord { .. } => QuestionKind::Cloze,
            FillerEvent::SelectOption { .. } => QuestionKind::Comprehension,
        }
    }
}

/// Top-level filler controller for one loaded form.
#[derive(Debug, Clone)]
pub struct Filler {
    form: Form,
    states: Vec<InteractionState>,
    accumulator: Accumulator,
}

impl Filler {
    pub fn new(form: Form) -> Self {
        let mut accumulator = Accumulator::new();
        let states = form
            .questions
            .iter()
            .map(|q| InteractionState::for_question(q, &mut accumulator))
            .collect();
        Self {
            form,
            states,
            accumulator,
        }
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn state(&self, question_id: &str) -> Option<&InteractionState> {
        self.states.iter().find(|s| s.question_id() == question_id)
    }

    /// Runs one event to completion. A rejected event leaves every state and
    /// the accumulator unchanged.
    pub fn apply(&mut self, event: FillerEvent) -> Result<(), InteractionError> {
        let accumulator = &mut self.accumulator;
        let state = self
            .states
            .iter_mut()
            .find(|s| s.question_id() == event.question_id())
            .ok_or_else(|| InteractionError::UnknownQuestion(event.question_id().to_string()))?;

        match (state, event) {
            (InteractionState::Categorize(s), FillerEvent::SelectItem { item_id, .. }) => {
                s.select_item(&item_id)
            }
            (InteractionState::Categorize(s), FillerEvent::SelectCategory { category, .. }) => {
                s.select_category(&category, accumulator)
            }
            (InteractionState::Cloze(s), FillerEvent::SelectBlank { blank, .. }) => s.select_blank(blank, accumulator),
            (InteractionState::Cloze(s), FillerEvent::SelectWord { bank_index, .. }) => {
                s.select_word(bank_index, accumulator)
            }
            (InteractionState::Comprehension(s), FillerEvent::SelectOption { mcq_id, option, .. }) => {
                s.select_option(&mcq_id, &option, accumulator)
            }
            (state, event) => Err(InteractionError::WrongKind {
                question_id: event.question_id().to_string(),
                expected: event.kind(),
                actual: state.kind(),
            }),
        }
    }

    pub fn submission(&self) -> Submission {
        assemble(&self.form, &self.accumulator)
    }
}
