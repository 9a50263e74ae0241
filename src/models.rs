use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use validator::{Validate, ValidationError};

/// Placeholder token marking a fill position in a cloze sentence.
pub const BLANK_MARKER: &str = "__BLANK__";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    Categorize,
    Cloze,
    Comprehension,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionKind::Categorize => "Categorize",
            QuestionKind::Cloze => "Cloze",
            QuestionKind::Comprehension => "Comprehension",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategorizeItem {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Expected category, if the author keyed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CategorizeItem {
    pub fn answer_key(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mcq {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer", default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl Mcq {
    pub fn answer_key(&self) -> Option<&str> {
        self.correct_answer.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PassageBlock {
    Text {
        #[serde(default)]
        content: String,
    },
    Image {
        #[serde(default)]
        url: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CategorizeFields {
    pub categories: Vec<String>,
    pub items: Vec<CategorizeItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClozeFields {
    pub sentence: String,
    pub options: Vec<String>,
}

impl ClozeFields {
    pub fn blank_count(&self) -> usize {
        self.sentence.matches(BLANK_MARKER).count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "ComprehensionInput")]
pub struct ComprehensionFields {
    pub passage_blocks: Vec<PassageBlock>,
    pub mcqs: Vec<Mcq>,
}

/// Accepted input shape. Older builders send the passage as plain text.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ComprehensionInput {
    passage: Option<String>,
    passage_blocks: Vec<PassageBlock>,
    mcqs: Vec<Mcq>,
}

impl From<ComprehensionInput> for ComprehensionFields {
    fn from(input: ComprehensionInput) -> Self {
        let mut passage_blocks = input.passage_blocks;
        if let Some(text) = input.passage.filter(|p| !p.trim().is_empty()) {
            let already_leading = matches!(
                passage_blocks.first(),
                Some(PassageBlock::Text { content }) if *content == text
            );
            if !already_leading {
                passage_blocks.insert(0, PassageBlock::Text { content: text });
            }
        }
        Self {
            passage_blocks,
            mcqs: input.mcqs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum QuestionBody {
    Categorize(CategorizeFields),
    Cloze(ClozeFields),
    Comprehension(ComprehensionFields),
}

impl QuestionBody {
    pub fn empty(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Categorize => QuestionBody::Categorize(CategorizeFields::default()),
            QuestionKind::Cloze => QuestionBody::Cloze(ClozeFields::default()),
            QuestionKind::Comprehension => QuestionBody::Comprehension(ComprehensionFields::default()),
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionBody::Categorize(_) => QuestionKind::Categorize,
            QuestionBody::Cloze(_) => QuestionKind::Cloze,
            QuestionBody::Comprehension(_) => QuestionKind::Comprehension,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "questionText", default)]
    pub question_text: String,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    pub fn new(id: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            image: None,
            question_text: String::new(),
            body: QuestionBody::empty(kind),
        }
    }

    pub fn kind(&self) -> QuestionKind {
        self.body.kind()
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Form {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[serde(rename = "headerImage", default, skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Form {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Fills every empty question, item and MCQ id with a fresh one and drops
    /// empty image references.
    pub fn assign_missing_ids(&mut self) {
        if self.header_image.as_deref().is_some_and(|s| s.trim().is_empty()) {
            self.header_image = None;
        }
        for question in &mut self.questions {
            if question.id.trim().is_empty() {
                question.id = new_id();
            }
            if question.image.as_deref().is_some_and(|s| s.trim().is_empty()) {
                question.image = None;
            }
            match &mut question.body {
                QuestionBody::Categorize(fields) => {
                    for item in &mut fields.items {
                        if item.id.trim().is_empty() {
                            item.id = new_id();
                        }
                    }
                }
                QuestionBody::Cloze(_) => {}
                QuestionBody::Comprehension(fields) => {
                    for mcq in &mut fields.mcqs {
                        if mcq.id.trim().is_empty() {
                            mcq.id = new_id();
                        }
                    }
                }
            }
        }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Per-question answer, shaped by the question kind.
///
/// Serialized untagged: categorize and comprehension answers are JSON objects,
/// cloze answers are arrays. Decoding needs the question, see [`Answer::decode`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Answer {
    /// item id -> category label
    Categorize(BTreeMap<String, String>),
    /// one entry per blank, `""` when unfilled
    Cloze(Vec<String>),
    /// mcq id -> selected option
    Comprehension(BTreeMap<String, String>),
}

impl Answer {
    pub fn empty_for(question: &Question) -> Self {
        match &question.body {
            QuestionBody::Categorize(_) => Answer::Categorize(BTreeMap::new()),
            QuestionBody::Cloze(fields) => Answer::Cloze(vec![String::new(); fields.blank_count()]),
            QuestionBody::Comprehension(_) => Answer::Comprehension(BTreeMap::new()),
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Answer::Categorize(_) => QuestionKind::Categorize,
            Answer::Cloze(_) => QuestionKind::Cloze,
            Answer::Comprehension(_) => QuestionKind::Comprehension,
        }
    }

    pub fn decode(question: &Question, value: &Value) -> Result<Self, String> {
        match question.kind() {
            QuestionKind::Categorize => serde_json::from_value(value.clone())
                .map(Answer::Categorize)
                .map_err(|e| format!("must map item ids to categories: {e}")),
            QuestionKind::Cloze => serde_json::from_value(value.clone())
                .map(Answer::Cloze)
                .map_err(|e| format!("must be a list of blank contents: {e}")),
            QuestionKind::Comprehension => serde_json::from_value(value.clone())
                .map(Answer::Comprehension)
                .map_err(|e| format!("must map mcq ids to options: {e}")),
        }
    }
}

/// Answer as received by the persistence API, kept raw until it is checked
/// against the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub answer: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

fn issue(field: impl Into<String>, text: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        field: field.into(),
        issue: text.into(),
    }
}

pub fn validate_form(form: &Form) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if let Err(errors) = form.validate() {
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let text = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                issues.push(issue(field.to_string(), text));
            }
        }
    }

    let mut question_ids = HashSet::new();
    for (i, q) in form.questions.iter().enumerate() {
        if !q.id.is_empty() && !question_ids.insert(q.id.as_str()) {
            issues.push(issue(format!("questions[{i}].id"), "must be unique"));
        }
        match &q.body {
            QuestionBody::Categorize(fields) => {
                let mut item_ids = HashSet::new();
                for (j, item) in fields.items.iter().enumerate() {
                    if !item.id.is_empty() && !item_ids.insert(item.id.as_str()) {
                        issues.push(issue(format!("questions[{i}].items[{j}].id"), "must be unique"));
                    }
                    if let Some(key) = item.answer_key() {
                        if !fields.categories.iter().any(|c| c == key) {
                            issues.push(issue(
                                format!("questions[{i}].items[{j}].category"),
                                "must reference an existing category",
                            ));
                        }
                    }
                }
            }
            QuestionBody::Cloze(_) => {}
            QuestionBody::Comprehension(fields) => {
                let mut mcq_ids = HashSet::new();
                for (j, mcq) in fields.mcqs.iter().enumerate() {
                    if !mcq.id.is_empty() && !mcq_ids.insert(mcq.id.as_str()) {
                        issues.push(issue(format!("questions[{i}].mcqs[{j}].id"), "must be unique"));
                    }
                    if let Some(key) = mcq.answer_key() {
                        if !mcq.options.iter().any(|o| o == key) {
                            issues.push(issue(
                                format!("questions[{i}].mcqs[{j}].correctAnswer"),
                                "must be one of the options",
                            ));
                        }
                    }
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Checks a submitted response against its form. Any subset of questions may
/// be answered; what is answered must fit the question.
pub fn validate_response(form: &Form, answers: &[SubmittedAnswer]) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for (i, entry) in answers.iter().enumerate() {
        let field = format!("answers[{i}]");
        if !seen.insert(entry.question_id.as_str()) {
            issues.push(issue(format!("{field}.questionId"), "must be unique"));
            continue;
        }
        let Some(question) = form.question(&entry.question_id) else {
            issues.push(issue(format!("{field}.questionId"), "must reference a question of the form"));
            continue;
        };
        match Answer::decode(question, &entry.answer) {
            Ok(answer) => check_answer_refs(question, &answer, &field, &mut issues),
            Err(text) => issues.push(issue(format!("{field}.answer"), text)),
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_answer_refs(question: &Question, answer: &Answer, field: &str, issues: &mut Vec<ValidationIssue>) {
    match (&question.body, answer) {
        (QuestionBody::Categorize(fields), Answer::Categorize(assignments)) => {
            for (item_id, category) in assignments {
                if !fields.items.iter().any(|it| &it.id == item_id) {
                    issues.push(issue(format!("{field}.answer.{item_id}"), "unknown item"));
                } else if !fields.categories.iter().any(|c| c == category) {
                    issues.push(issue(format!("{field}.answer.{item_id}"), "unknown category"));
                }
            }
        }
        (QuestionBody::Cloze(fields), Answer::Cloze(words)) => {
            let blanks = fields.blank_count();
            if words.len() != blanks {
                issues.push(issue(
                    format!("{field}.answer"),
                    format!("must have {blanks} entries, one per blank"),
                ));
            }
            let mut bank: HashMap<&str, usize> = HashMap::new();
            for option in &fields.options {
                *bank.entry(option.as_str()).or_default() += 1;
            }
            for (i, word) in words.iter().enumerate().filter(|(_, w)| !w.is_empty()) {
                match bank.get_mut(word.as_str()) {
                    Some(left) if *left > 0 => *left -= 1,
                    _ => issues.push(issue(format!("{field}.answer[{i}]"), "word is not in the word bank")),
                }
            }
        }
        (QuestionBody::Comprehension(fields), Answer::Comprehension(selected)) => {
            for (mcq_id, option) in selected {
                match fields.mcqs.iter().find(|m| &m.id == mcq_id) {
                    None => issues.push(issue(format!("{field}.answer.{mcq_id}"), "unknown mcq")),
                    Some(mcq) if !mcq.options.iter().any(|o| o == option) => {
                        issues.push(issue(format!("{field}.answer.{mcq_id}"), "unknown option"))
                    }
                    Some(_) => {}
                }
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionScore {
    pub correct: u32,
    pub total: u32,
}

impl QuestionScore {
    pub fn correct_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.correct as f64) * 100.0 / (self.total as f64)
        }
    }
}

/// Scores one answer against the keys the author set. `None` when the
/// question has no keys; cloze questions are never keyed.
pub fn score_answer(question: &Question, answer: &Answer) -> Option<QuestionScore> {
    let mut score = QuestionScore::default();
    match &question.body {
        QuestionBody::Categorize(fields) => {
            let assigned = match answer {
                Answer::Categorize(map) => Some(map),
                _ => None,
            };
            for item in &fields.items {
                let Some(key) = item.answer_key() else { continue };
                score.total += 1;
                if assigned.and_then(|m| m.get(&item.id)).is_some_and(|c| c == key) {
                    score.correct += 1;
                }
            }
        }
        QuestionBody::Cloze(_) => {}
        QuestionBody::Comprehension(fields) => {
            let selected = match answer {
                Answer::Comprehension(map) => Some(map),
                _ => None,
            };
            for mcq in &fields.mcqs {
                let Some(key) = mcq.answer_key() else { continue };
                score.total += 1;
                if selected.and_then(|m| m.get(&mcq.id)).is_some_and(|o| o == key) {
                    score.correct += 1;
                }
            }
        }
    }
    (score.total > 0).then_some(score)
}

/// Sums [`score_answer`] over the form. Unanswered or undecodable answers
/// count as empty.
pub fn score_response(form: &Form, answers: &[SubmittedAnswer]) -> Option<QuestionScore> {
    let mut total: Option<QuestionScore> = None;
    for question in &form.questions {
        let answer = answers
            .iter()
            .find(|a| a.question_id == question.id)
            .and_then(|a| Answer::decode(question, &a.answer).ok())
            .unwrap_or_else(|| Answer::empty_for(question));
        if let Some(s) = score_answer(question, &answer) {
            let acc = total.get_or_insert_with(QuestionScore::default);
            acc.correct += s.correct;
            acc.total += s.total;
        }
    }
    total
}
