use super::{Filler, FillerEvent, InteractionError};
use crate::gateway::{FormGateway, GatewayError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("response already submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// A respondent filling one form: load, interact, submit.
pub struct FillerSession<G> {
    gateway: G,
    form_id: String,
    filler: Filler,
    submitted: bool,
}

impl<G: FormGateway> FillerSession<G> {
    /// Fetches the form. When it is missing or unreachable no session starts.
    pub async fn load(gateway: G, form_id: &str) -> Result<Self, GatewayError> {
        let form = match gateway.fetch_form(form_id).await {
            Ok(form) => form,
            Err(err) => {
                warn!(form_id, "failed to load form: {}", err);
                return Err(err);
            }
        };
        info!(form_id, questions = form.questions.len(), "form loaded");
        Ok(Self {
            gateway,
            form_id: form_id.to_string(),
            filler: Filler::new(form),
            submitted: false,
        })
    }

    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    pub fn filler(&self) -> &Filler {
        &self.filler
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn apply(&mut self, event: FillerEvent) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        Ok(self.filler.apply(event)?)
    }

    /// Posts the current answers. On failure every answer is kept and the
    /// call can be repeated.
    pub async fn submit(&mut self) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        let submission = self.filler.submission();
        if let Err(err) = self.gateway.submit_response(&self.form_id, &submission).await {
            warn!(form_id = %self.form_id, "failed to submit response: {}", err);
            return Err(err.into());
        }
        self.submitted = true;
        info!(form_id = %self.form_id, answers = submission.answers.len(), "response submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::MemoryGateway;
    use crate::models::{ComprehensionFields, Form, Mcq, Question, QuestionBody, QuestionKind};
    use serde_json::json;
    use std::sync::Arc;

    fn comprehension_form() -> Form {
        let mut q = Question::new("q1", QuestionKind::Comprehension);
        q.body = QuestionBody::Comprehension(ComprehensionFields {
            passage_blocks: Vec::new(),
            mcqs: vec![Mcq {
                id: "m1".into(),
                question: "Pick one".into(),
                options: vec!["a".into(), "b".into()],
                correct_answer: None,
            }],
        });
        Form {
            id: "form-1".into(),
            title: "Reading".into(),
            header_image: None,
            questions: vec![q],
        }
    }

    #[tokio::test]
    async fn missing_form_starts_no_session() {
        let gateway = Arc::new(MemoryGateway::default());
        let err = FillerSession::load(gateway, "nope").await.err().unwrap();
        assert!(matches!(err, GatewayError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn unanswered_form_still_submits() {
        let gateway = Arc::new(MemoryGateway::with_form(comprehension_form()));
        let mut session = FillerSession::load(Arc::clone(&gateway), "form-1").await.unwrap();
        session.submit().await.unwrap();
        assert!(session.is_submitted());

        let submissions = gateway.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0].1,
            json!({"answers": [{"questionId": "q1", "answer": {}}]})
        );
    }

    #[tokio::test]
    async fn failed_submit_keeps_answers_for_retry() {
        let gateway = Arc::new(MemoryGateway::with_form(comprehension_form()));
        let mut session = FillerSession::load(Arc::clone(&gateway), "form-1").await.unwrap();
        session
            .apply(FillerEvent::SelectOption {
                question_id: "q1".into(),
                mcq_id: "m1".into(),
                option: "b".into(),
            })
            .unwrap();

        gateway.set_offline(true);
        assert!(matches!(session.submit().await, Err(SessionError::Gateway(_))));
        assert!(!session.is_submitted());

        gateway.set_offline(false);
        session.submit().await.unwrap();
        let submissions = gateway.submissions.lock().unwrap();
        assert_eq!(submissions[0].1["answers"][0]["answer"], json!({"m1": "b"}));
    }

    #[tokio::test]
    async fn submitted_session_is_read_only() {
        let gateway = Arc::new(MemoryGateway::with_form(comprehension_form()));
        let mut session = FillerSession::load(gateway, "form-1").await.unwrap();
        session.submit().await.unwrap();
        let event = FillerEvent::SelectOption {
            question_id: "q1".into(),
            mcq_id: "m1".into(),
            option: "a".into(),
        };
        assert!(matches!(session.apply(event), Err(SessionError::AlreadySubmitted)));
        assert!(matches!(session.submit().await, Err(SessionError::AlreadySubmitted)));
    }
}
