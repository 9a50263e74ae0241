use crate::filler::Accumulator;
use crate::models::{Answer, Form};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AnswerEntry {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub answer: Answer,
}

/// Body of `POST /api/forms/:id/responses`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Submission {
    pub answers: Vec<AnswerEntry>,
}

/// One entry per question, in form order. Questions the accumulator has no
/// answer for get their kind's empty answer; nothing here blocks submission.
pub fn assemble(form: &Form, accumulator: &Accumulator) -> Submission {
    let answers = form
        .questions
        .iter()
        .map(|question| AnswerEntry {
            question_id: question.id.clone(),
            answer: accumulator
                .get(&question.id)
                .cloned()
                .unwrap_or_else(|| Answer::empty_for(question)),
        })
        .collect();
    Submission { answers }
}
