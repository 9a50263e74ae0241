//! Client side of the persistence API, used by the form builder and the filler.

use crate::models::Form;
use crate::submission::Submission;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("form {0} not found")]
    NotFound(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid base url {0}")]
    InvalidBaseUrl(String),
}

#[async_trait]
pub trait FormGateway: Send + Sync {
    /// Persists a new form and returns it with its assigned ids.
    async fn create_form(&self, form: &Form) -> Result<Form, GatewayError>;

    async fn fetch_form(&self, form_id: &str) -> Result<Form, GatewayError>;

    async fn submit_response(&self, form_id: &str, submission: &Submission) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: FormGateway + ?Sized> FormGateway for Arc<T> {
    async fn create_form(&self, form: &Form) -> Result<Form, GatewayError> {
        (**self).create_form(form).await
    }

    async fn fetch_form(&self, form_id: &str) -> Result<Form, GatewayError> {
        (**self).fetch_form(form_id).await
    }

    async fn submit_response(&self, form_id: &str, submission: &Submission) -> Result<(), GatewayError> {
        (**self).submit_response(form_id, submission).await
    }
}

#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let base_url = std::env::var("FORM_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:5000".to_string());
        Self::new(base_url)
    }

    /// Appends path segments to the base url, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, GatewayError> {
        let invalid = || GatewayError::InvalidBaseUrl(self.base_url.clone());
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn rejected(resp: reqwest::Response) -> GatewayError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    GatewayError::Rejected { status, message }
}

#[async_trait]
impl FormGateway for HttpGateway {
    async fn create_form(&self, form: &Form) -> Result<Form, GatewayError> {
        let resp = self.client.post(self.endpoint(&["api", "forms"])?).json(form).send().await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(resp.json::<Form>().await?)
    }

    async fn fetch_form(&self, form_id: &str) -> Result<Form, GatewayError> {
        let resp = self
            .client
            .get(self.endpoint(&["api", "forms", form_id])?)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(form_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(resp.json::<Form>().await?)
    }

    async fn submit_response(&self, form_id: &str, submission: &Submission) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.endpoint(&["api", "forms", form_id, "responses"])?)
            .json(submission)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(form_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::new_id;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Gateway double keeping forms and submissions in memory.
    #[derive(Default)]
    pub struct MemoryGateway {
        pub forms: Mutex<HashMap<String, Form>>,
        pub submissions: Mutex<Vec<(String, serde_json::Value)>>,
        pub offline: AtomicBool,
    }

    impl MemoryGateway {
        pub fn with_form(form: Form) -> Self {
            let gateway = Self::default();
            gateway.forms.lock().unwrap().insert(form.id.clone(), form);
            gateway
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check_online(&self) -> Result<(), GatewayError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(GatewayError::Rejected {
                    status: 503,
                    message: "service unavailable".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl FormGateway for MemoryGateway {
        async fn create_form(&self, form: &Form) -> Result<Form, GatewayError> {
            self.check_online()?;
            let mut stored = form.clone();
            stored.id = new_id();
            stored.assign_missing_ids();
            self.forms.lock().unwrap().insert(stored.id.clone(), stored.clone());
            Ok(stored)
        }

        async fn fetch_form(&self, form_id: &str) -> Result<Form, GatewayError> {
            self.check_online()?;
            self.forms
                .lock()
                .unwrap()
                .get(form_id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(form_id.to_string()))
        }

        async fn submit_response(&self, form_id: &str, submission: &Submission) -> Result<(), GatewayError> {
            self.check_online()?;
            let value = serde_json::to_value(submission).expect("submission serializes");
            self.submissions.lock().unwrap().push((form_id.to_string(), value));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_ids_are_encoded_as_one_path_segment() {
        let gateway = HttpGateway::new("http://localhost:5000/");
        let url = gateway.endpoint(&["api", "forms", "x?y/z", "responses"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/forms/x%3Fy%2Fz/responses");
        assert!(url.query().is_none());
    }

    #[test]
    fn base_path_is_kept() {
        let gateway = HttpGateway::new("http://forms.example/backend");
        let url = gateway.endpoint(&["api", "forms"]).unwrap();
        assert_eq!(url.as_str(), "http://forms.example/backend/api/forms");
    }

    #[test]
    fn unusable_base_url_is_reported() {
        let gateway = HttpGateway::new("not a url");
        assert!(matches!(
            gateway.endpoint(&["api", "forms"]),
            Err(GatewayError::InvalidBaseUrl(_))
        ));
    }
}
