use super::{Accumulator, InteractionError};
use crate::models::{Answer, ClozeFields};

/// Select a blank, then a word from the bank to drop into it. Clicking a
/// filled blank sends its word back to the end of the bank.
///
/// Words only move between the bank and the blanks, so their multiset always
/// equals the configured options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClozeState {
    question_id: String,
    placed: Vec<Option<String>>,
    bank: Vec<String>,
    selected: Option<usize>,
}

impl ClozeState {
    pub fn new(question_id: &str, fields: &ClozeFields, acc: &mut Accumulator) -> Self {
        let state = Self {
            question_id: question_id.to_string(),
            placed: vec![None; fields.blank_count()],
            bank: fields.options.clone(),
            selected: None,
        };
        state.emit(acc);
        state
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub fn blank_count(&self) -> usize {
        self.placed.len()
    }

    pub fn selected_blank(&self) -> Option<usize> {
        self.selected
    }

    pub fn word_bank(&self) -> &[String] {
        &self.bank
    }

    pub fn placed(&self, blank: usize) -> Option<&str> {
        self.placed.get(blank).and_then(|w| w.as_deref())
    }

    pub fn answer(&self) -> Vec<String> {
        self.placed
            .iter()
            .map(|w| w.clone().unwrap_or_default())
            .collect()
    }

    pub fn select_blank(&mut self, index: usize, acc: &mut Accumulator) -> Result<(), InteractionError> {
        let count = self.placed.len();
        let slot = self
            .placed
            .get_mut(index)
            .ok_or(InteractionError::BlankOutOfRange { index, count })?;

        if let Some(word) = slot.take() {
            self.bank.push(word);
            self.selected = None;
            self.emit(acc);
        } else if self.selected == Some(index) {
            self.selected = None;
        } else {
            self.selected = Some(index);
        }
        Ok(())
    }

    /// Moves the bank word at `bank_index` into the selected blank. Ignored
    /// while no blank is selected.
    pub fn select_word(&mut self, bank_index: usize, acc: &mut Accumulator) -> Result<(), InteractionError> {
        let Some(blank) = self.selected else {
            return Ok(());
        };
        if bank_index >= self.bank.len() {
            return Err(InteractionError::WordOutOfRange {
                index: bank_index,
                len: self.bank.len(),
            });
        }
        let word = self.bank.remove(bank_index);
        // a selected blank is always empty; keep any occupant in play anyway
        if let Some(previous) = self.placed[blank].replace(word) {
            self.bank.push(previous);
        }
        self.selected = None;
        self.emit(acc);
        Ok(())
    }

    fn emit(&self, acc: &mut Accumulator) {
        acc.record(&self.question_id, Answer::Cloze(self.answer()));
    }
}
