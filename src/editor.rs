//! Author-side editing. Every question edit is pure: it takes the current
//! question and returns a replacement, leaving sibling questions untouched.

use crate::gateway::{FormGateway, GatewayError};
use crate::media::ImageSlot;
use crate::models::{
    new_id, CategorizeItem, Form, Mcq, PassageBlock, Question, QuestionBody, QuestionKind,
};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    QuestionText,
    Image,
    Sentence,
}

impl fmt::Display for ScalarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarField::QuestionText => "questionText",
            ScalarField::Image => "image",
            ScalarField::Sentence => "sentence",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListField {
    Categories,
    Items,
    Options,
    Mcqs,
    PassageBlocks,
}

impl fmt::Display for ListField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListField::Categories => "categories",
            ListField::Items => "items",
            ListField::Options => "options",
            ListField::Mcqs => "mcqs",
            ListField::PassageBlocks => "passage_blocks",
        })
    }
}

/// One element of a question's list field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    Category(String),
    Item(CategorizeItem),
    Option(String),
    Mcq(Mcq),
    PassageBlock(PassageBlock),
}

impl ListItem {
    /// The element the builder appends when the author clicks "add".
    pub fn blank(field: ListField) -> Self {
        match field {
            ListField::Categories => ListItem::Category(String::new()),
            ListField::Items => ListItem::Item(CategorizeItem {
                id: new_id(),
                ..CategorizeItem::default()
            }),
            ListField::Options => ListItem::Option(String::new()),
            ListField::Mcqs => ListItem::Mcq(Mcq {
                id: new_id(),
                options: vec![String::new(), String::new()],
                ..Mcq::default()
            }),
            ListField::PassageBlocks => ListItem::PassageBlock(PassageBlock::Text {
                content: String::new(),
            }),
        }
    }

    pub fn field(&self) -> ListField {
        match self {
            ListItem::Category(_) => ListField::Categories,
            ListItem::Item(_) => ListField::Items,
            ListItem::Option(_) => ListField::Options,
            ListItem::Mcq(_) => ListField::Mcqs,
            ListItem::PassageBlock(_) => ListField::PassageBlocks,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("{field} index {index} is out of range (len {len})")]
    IndexOutOfRange { field: ListField, index: usize, len: usize },
    #[error("{field} does not apply to a {kind} question")]
    FieldNotApplicable { field: String, kind: QuestionKind },
    #[error("a {item} element cannot be stored in {field}")]
    ItemMismatch { field: ListField, item: ListField },
    #[error("question index {index} is out of range (len {len})")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("no question with id {0}")]
    UnknownQuestion(String),
    #[error("form title must not be empty")]
    MissingTitle,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Replaces a scalar field. An empty image value clears the image.
pub fn update_field(question: &Question, field: ScalarField, value: &str) -> Result<Question, EditError> {
    let mut updated = question.clone();
    match field {
        ScalarField::QuestionText => updated.question_text = value.to_string(),
        ScalarField::Image => {
            updated.image = (!value.trim().is_empty()).then(|| value.to_string());
        }
        ScalarField::Sentence => match &mut updated.body {
            QuestionBody::Cloze(fields) => fields.sentence = value.to_string(),
            _ => {
                return Err(EditError::FieldNotApplicable {
                    field: field.to_string(),
                    kind: question.kind(),
                })
            }
        },
    }
    Ok(updated)
}

pub fn add_list_item(question: &Question, field: ListField, value: ListItem) -> Result<Question, EditError> {
    edit_list(question, field, ListOp::Push(value))
}

pub fn update_list_item(
    question: &Question,
    field: ListField,
    index: usize,
    value: ListItem,
) -> Result<Question, EditError> {
    edit_list(question, field, ListOp::Replace(index, value))
}

/// Removes the element at `index`; later elements shift down by one.
pub fn remove_list_item(question: &Question, field: ListField, index: usize) -> Result<Question, EditError> {
    edit_list(question, field, ListOp::Remove(index))
}

/// Switches the question to another kind. The kind-specific fields start
/// over; id, image and prompt text carry across.
pub fn change_kind(question: &Question, kind: QuestionKind) -> Question {
    if question.kind() == kind {
        return question.clone();
    }
    Question {
        body: QuestionBody::empty(kind),
        ..question.clone()
    }
}

enum ListOp {
    Push(ListItem),
    Replace(usize, ListItem),
    Remove(usize),
}

fn edit_list(question: &Question, field: ListField, op: ListOp) -> Result<Question, EditError> {
    let mut updated = question.clone();
    match (field, &mut updated.body) {
        (ListField::Categories, QuestionBody::Categorize(f)) => apply_op(&mut f.categories, field, op, |item| match item {
            ListItem::Category(c) => Ok(c),
            other => Err(other),
        })?,
        (ListField::Items, QuestionBody::Categorize(f)) => apply_op(&mut f.items, field, op, |item| match item {
            ListItem::Item(i) => Ok(i),
            other => Err(other),
        })?,
        (ListField::Options, QuestionBody::Cloze(f)) => apply_op(&mut f.options, field, op, |item| match item {
            ListItem::Option(o) => Ok(o),
            other => Err(other),
        })?,
        (ListField::Mcqs, QuestionBody::Comprehension(f)) => apply_op(&mut f.mcqs, field, op, |item| match item {
            ListItem::Mcq(m) => Ok(m),
            other => Err(other),
        })?,
        (ListField::PassageBlocks, QuestionBody::Comprehension(f)) => {
            apply_op(&mut f.passage_blocks, field, op, |item| match item {
                ListItem::PassageBlock(b) => Ok(b),
                other => Err(other),
            })?
        }
        _ => {
            return Err(EditError::FieldNotApplicable {
                field: field.to_string(),
                kind: question.kind(),
            })
        }
    }
    Ok(updated)
}

fn apply_op<T>(
    list: &mut Vec<T>,
    field: ListField,
    op: ListOp,
    extract: impl Fn(ListItem) -> Result<T, ListItem>,
) -> Result<(), EditError> {
    let element = |item: ListItem| {
        extract(item).map_err(|other| EditError::ItemMismatch {
            field,
            item: other.field(),
        })
    };
    let len = list.len();
    match op {
        ListOp::Push(item) => list.push(element(item)?),
        ListOp::Replace(index, item) => {
            let value = element(item)?;
            let slot = list
                .get_mut(index)
                .ok_or(EditError::IndexOutOfRange { field, index, len })?;
            *slot = value;
        }
        ListOp::Remove(index) => {
            if index >= len {
                return Err(EditError::IndexOutOfRange { field, index, len });
            }
            list.remove(index);
        }
    }
    Ok(())
}

/// The form an author is building, before it is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    title: String,
    header_image: Option<String>,
    questions: Vec<Question>,
}

impl FormDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn header_image(&self) -> Option<&str> {
        self.header_image.as_deref()
    }

    pub fn set_header_image(&mut self, url: Option<String>) {
        self.header_image = url;
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Result<&Question, EditError> {
        self.questions.get(index).ok_or(EditError::QuestionOutOfRange {
            index,
            len: self.questions.len(),
        })
    }

    /// Appends an empty question of `kind` and returns its index.
    pub fn add_question(&mut self, kind: QuestionKind) -> usize {
        self.questions.push(Question::new(new_id(), kind));
        self.questions.len() - 1
    }

    pub fn replace_question(&mut self, index: usize, question: Question) -> Result<(), EditError> {
        let len = self.questions.len();
        let slot = self
            .questions
            .get_mut(index)
            .ok_or(EditError::QuestionOutOfRange { index, len })?;
        *slot = question;
        Ok(())
    }

    /// Runs a pure edit against the question at `index` and stores the result.
    pub fn edit_question(
        &mut self,
        index: usize,
        edit: impl FnOnce(&Question) -> Result<Question, EditError>,
    ) -> Result<(), EditError> {
        let updated = edit(self.question(index)?)?;
        self.replace_question(index, updated)
    }

    pub fn remove_question(&mut self, index: usize) -> Result<Question, EditError> {
        if index >= self.questions.len() {
            return Err(EditError::QuestionOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        Ok(self.questions.remove(index))
    }

    /// Stores the result of an image upload. `None` means the upload produced
    /// nothing and the current image stays as it is.
    pub fn apply_uploaded_image(&mut self, slot: &ImageSlot, url: Option<String>) -> Result<(), EditError> {
        let Some(url) = url else {
            return Ok(());
        };
        match slot {
            ImageSlot::Header => self.header_image = Some(url),
            ImageSlot::Question(id) => {
                let question = self
                    .questions
                    .iter_mut()
                    .find(|q| &q.id == id)
                    .ok_or_else(|| EditError::UnknownQuestion(id.clone()))?;
                question.image = Some(url);
            }
        }
        Ok(())
    }

    pub fn to_form(&self) -> Result<Form, EditError> {
        if self.title.trim().is_empty() {
            return Err(EditError::MissingTitle);
        }
        Ok(Form {
            id: String::new(),
            title: self.title.clone(),
            header_image: self.header_image.clone(),
            questions: self.questions.clone(),
        })
    }

    /// Saves through the gateway. The draft is left as it was whatever the
    /// outcome, so a failed save can be retried.
    pub async fn save<G: FormGateway + ?Sized>(&self, gateway: &G) -> Result<Form, SaveError> {
        let form = self.to_form()?;
        match gateway.create_form(&form).await {
            Ok(saved) => {
                info!(form_id = %saved.id, "form saved");
                Ok(saved)
            }
            Err(err) => {
                warn!("failed to save form: {}", err);
                Err(err.into())
            }
        }
    }
}
