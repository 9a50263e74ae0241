use crate::config::AppConfig;
use crate::models::{new_id, Form, SubmittedAnswer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::{fs, path::Path};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRecord {
    #[serde(flatten)]
    pub form: Form,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    #[serde(rename = "formId")]
    pub form_id: String,
    pub answers: Vec<SubmittedAnswer>,
    #[serde(rename = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
}

pub struct InMemoryDb {
    pub forms: RwLock<HashMap<String, FormRecord>>,
    /// form id -> responses in submission order
    pub responses: RwLock<HashMap<String, Vec<ResponseRecord>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistentSnapshot {
    forms: HashMap<String, FormRecord>,
    responses: HashMap<String, Vec<ResponseRecord>>,
}

impl InMemoryDb {
    pub fn new(snapshot_path: Option<&str>) -> Self {
        let snapshot = snapshot_path.and_then(|path| {
            let raw = fs::read_to_string(path).ok()?;
            match serde_json::from_str::<PersistentSnapshot>(&raw) {
                Ok(s) => Some(s),
                Err(err) => {
                    warn!("failed to read local snapshot {}: {}", path, err);
                    None
                }
            }
        });

        let (forms, responses) = snapshot
            .map(|s| (s.forms, s.responses))
            .unwrap_or_default();

        Self {
            forms: RwLock::new(forms),
            responses: RwLock::new(responses),
        }
    }

    async fn snapshot(&self) -> PersistentSnapshot {
        PersistentSnapshot {
            forms: self.forms.read().await.clone(),
            responses: self.responses.read().await.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<InMemoryDb>,
    pub local_state_path: Option<String>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let local_state_path = config.local_state_path.clone();
        Self {
            db: Arc::new(InMemoryDb::new(local_state_path.as_deref())),
            local_state_path,
        }
    }

    /// Stores a validated form under a fresh id.
    pub async fn create_form(&self, mut form: Form) -> FormRecord {
        form.id = new_id();
        form.assign_missing_ids();
        let now = Utc::now();
        let record = FormRecord {
            form,
            created_at: now,
            updated_at: now,
        };
        self.db
            .forms
            .write()
            .await
            .insert(record.form.id.clone(), record.clone());
        if let Err(err) = self.persist_core_data().await {
            warn!("failed to persist local state after create_form: {}", err);
        }
        record
    }

    pub async fn replace_form(&self, id: &str, mut form: Form) -> Option<FormRecord> {
        let mut forms = self.db.forms.write().await;
        let record = forms.get_mut(id)?;
        form.id = id.to_string();
        form.assign_missing_ids();
        record.form = form;
        record.updated_at = Utc::now();
        let updated = record.clone();
        drop(forms);
        if let Err(err) = self.persist_core_data().await {
            warn!("failed to persist local state after replace_form: {}", err);
        }
        Some(updated)
    }

    pub async fn delete_form(&self, id: &str) -> bool {
        let removed = self.db.forms.write().await.remove(id).is_some();
        if removed {
            self.db.responses.write().await.remove(id);
            if let Err(err) = self.persist_core_data().await {
                warn!("failed to persist local state after delete_form: {}", err);
            }
        }
        removed
    }

    pub async fn record_response(&self, form_id: &str, answers: Vec<SubmittedAnswer>) -> ResponseRecord {
        let record = ResponseRecord {
            id: new_id(),
            form_id: form_id.to_string(),
            answers,
            submitted_at: Utc::now(),
        };
        self.db
            .responses
            .write()
            .await
            .entry(form_id.to_string())
            .or_default()
            .push(record.clone());
        if let Err(err) = self.persist_core_data().await {
            warn!("failed to persist local state after record_response: {}", err);
        }
        record
    }

    pub async fn persist_core_data(&self) -> anyhow::Result<()> {
        let Some(path) = self.local_state_path.as_ref() else {
            return Ok(());
        };
        let snapshot = self.db.snapshot().await;
        let serialized = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serialized).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionKind};
    use serde_json::json;

    fn sample_form() -> Form {
        Form {
            id: String::new(),
            title: "Snapshot".into(),
            header_image: None,
            questions: vec![Question::new("", QuestionKind::Comprehension)],
        }
    }

    #[tokio::test]
    async fn create_assigns_ids_and_delete_drops_responses() {
        let state = AppState::new(&AppConfig::in_memory());
        let record = state.create_form(sample_form()).await;
        assert!(!record.form.id.is_empty());
        assert!(!record.form.questions[0].id.is_empty());

        state.record_response(&record.form.id, Vec::new()).await;
        assert_eq!(state.db.responses.read().await[&record.form.id].len(), 1);

        assert!(state.delete_form(&record.form.id).await);
        assert!(!state.delete_form(&record.form.id).await);
        assert!(state.db.responses.read().await.get(&record.form.id).is_none());
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let path = std::env::temp_dir().join(format!("formcraft-{}.json", new_id()));
        let mut config = AppConfig::in_memory();
        config.local_state_path = Some(path.to_string_lossy().into_owned());

        let state = AppState::new(&config);
        let record = state.create_form(sample_form()).await;
        let question_id = record.form.questions[0].id.clone();
        state
            .record_response(
                &record.form.id,
                vec![SubmittedAnswer { question_id, answer: json!({}) }],
            )
            .await;

        let reloaded = AppState::new(&config);
        let forms = reloaded.db.forms.read().await;
        assert_eq!(forms[&record.form.id].form.title, "Snapshot");
        assert_eq!(reloaded.db.responses.read().await[&record.form.id].len(), 1);
        drop(forms);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_empty() {
        let path = std::env::temp_dir().join(format!("formcraft-{}.json", new_id()));
        std::fs::write(&path, b"{not json").unwrap();
        let db = InMemoryDb::new(path.to_str());
        assert!(db.forms.read().await.is_empty());
        let _ = std::fs::remove_file(path);
    }
}
