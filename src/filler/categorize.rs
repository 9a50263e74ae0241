use super::{Accumulator, InteractionError};
use crate::models::{Answer, CategorizeFields, CategorizeItem};
use std::collections::BTreeMap;

/// Select an unassigned item, then a category to drop it in.
///
/// Assigned items leave the selectable pool and cannot be moved again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizeState {
    question_id: String,
    items: Vec<CategorizeItem>,
    categories: Vec<String>,
    selected: Option<String>,
    assignments: BTreeMap<String, String>,
}

impl CategorizeState {
    pub fn new(question_id: &str, fields: &CategorizeFields, acc: &mut Accumulator) -> Self {
        let state = Self {
            question_id: question_id.to_string(),
            items: fields.items.clone(),
            categories: fields.categories.clone(),
            selected: None,
            assignments: BTreeMap::new(),
        };
        state.emit(acc);
        state
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub fn selected_item(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn assignments(&self) -> &BTreeMap<String, String> {
        &self.assignments
    }

    /// Items still waiting for a category, in authoring order.
    pub fn unassigned(&self) -> impl Iterator<Item = &CategorizeItem> + '_ {
        self.items
            .iter()
            .filter(move |item| !self.assignments.contains_key(&item.id))
    }

    pub fn assigned_to<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a CategorizeItem> + 'a {
        self.items
            .iter()
            .filter(move |item| self.assignments.get(&item.id).is_some_and(|c| c == category))
    }

    pub fn answer(&self) -> Answer {
        Answer::Categorize(self.assignments.clone())
    }

    /// Toggles the selection of an unassigned item.
    pub fn select_item(&mut self, item_id: &str) -> Result<(), InteractionError> {
        if !self.items.iter().any(|item| item.id == item_id) {
            return Err(InteractionError::UnknownItem(item_id.to_string()));
        }
        if self.assignments.contains_key(item_id) {
            return Err(InteractionError::ItemAlreadyAssigned(item_id.to_string()));
        }
        if self.selected.as_deref() == Some(item_id) {
            self.selected = None;
        } else {
            self.selected = Some(item_id.to_string());
        }
        Ok(())
    }

    /// Assigns the selected item to `category`; a no-op when nothing is selected.
    pub fn select_category(&mut self, category: &str, acc: &mut Accumulator) -> Result<(), InteractionError> {
        if !self.categories.iter().any(|c| c == category) {
            return Err(InteractionError::UnknownCategory(category.to_string()));
        }
        let Some(item_id) = self.selected.take() else {
            return Ok(());
        };
        self.assignments.insert(item_id, category.to_string());
        self.emit(acc);
        Ok(())
    }

    fn emit(&self, acc: &mut Accumulator) {
        acc.record(&self.question_id, self.answer());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fields(items: &[(&str, &str)], categories: &[&str]) -> CategorizeFields {
        CategorizeFields {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            items: items
                .iter()
                .map(|(id, text)| CategorizeItem {
                    id: id.to_string(),
                    text: text.to_string(),
                    category: None,
                })
                .collect(),
        }
    }

    #[test]
    fn select_item_then_category_assigns() {
        let mut acc = Accumulator::new();
        let mut state = CategorizeState::new("q", &fields(&[("1", "Apple")], &["Fruit", "Veg"]), &mut acc);
        assert_eq!(acc.get("q"), Some(&Answer::Categorize(BTreeMap::new())));

        state.select_item("1").unwrap();
        assert_eq!(state.selected_item(), Some("1"));
        state.select_category("Fruit", &mut acc).unwrap();

        assert_eq!(state.selected_item(), None);
        assert_eq!(state.assignments().get("1").map(String::as_str), Some("Fruit"));
        assert_eq!(state.unassigned().count(), 0);
        assert_eq!(state.assigned_to("Fruit").map(|i| i.text.as_str()).collect::<Vec<_>>(), ["Apple"]);
        assert_eq!(
            acc.get("q"),
            Some(&Answer::Categorize(BTreeMap::from([("1".to_string(), "Fruit".to_string())])))
        );
    }

    #[test]
    fn reselecting_same_item_toggles_off_without_assigning() {
        let mut acc = Accumulator::new();
        let mut state = CategorizeState::new("q", &fields(&[("1", "Apple")], &["Fruit"]), &mut acc);
        state.select_item("1").unwrap();
        state.select_item("1").unwrap();
        assert_eq!(state.selected_item(), None);
        assert!(state.assignments().is_empty());

        // category click with nothing selected does nothing
        state.select_category("Fruit", &mut acc).unwrap();
        assert!(state.assignments().is_empty());
        assert_eq!(acc.get("q"), Some(&Answer::Categorize(BTreeMap::new())));
    }

    #[test]
    fn selecting_another_item_moves_the_selection() {
        let mut acc = Accumulator::new();
        let mut state = CategorizeState::new("q", &fields(&[("1", "a"), ("2", "b")], &["X"]), &mut acc);
        state.select_item("1").unwrap();
        state.select_item("2").unwrap();
        state.select_category("X", &mut acc).unwrap();
        assert_eq!(state.assignments().keys().collect::<Vec<_>>(), ["2"]);
    }

    #[test]
    fn assigned_and_unknown_targets_are_rejected() {
        let mut acc = Accumulator::new();
        let mut state = CategorizeState::new("q", &fields(&[("1", "a")], &["X"]), &mut acc);
        state.select_item("1").unwrap();
        state.select_category("X", &mut acc).unwrap();

        assert_eq!(
            state.select_item("1"),
            Err(InteractionError::ItemAlreadyAssigned("1".into()))
        );
        assert_eq!(state.select_item("9"), Err(InteractionError::UnknownItem("9".into())));
        assert_eq!(
            state.select_category("Y", &mut acc),
            Err(InteractionError::UnknownCategory("Y".into()))
        );
    }

    #[derive(Clone, Copy, Debug)]
    enum Step {
        Item(usize),
        Category(usize),
    }

    fn check_partition(state: &CategorizeState, all_ids: &HashSet<String>) {
        let pool: HashSet<String> = state.unassigned().map(|i| i.id.clone()).collect();
        let assigned: HashSet<String> = state.assignments().keys().cloned().collect();
        assert!(pool.is_disjoint(&assigned));
        let union: HashSet<String> = pool.union(&assigned).cloned().collect();
        assert_eq!(&union, all_ids);
    }

    fn explore(state: &CategorizeState, acc: &Accumulator, depth: usize, ids: &HashSet<String>, steps: &[Step]) {
        check_partition(state, ids);
        assert_eq!(acc.get("q"), Some(&state.answer()));
        if depth == 0 {
            return;
        }
        for step in steps {
            let mut next = state.clone();
            let mut next_acc = acc.clone();
            let result = match *step {
                Step::Item(i) => next.select_item(&i.to_string()),
                Step::Category(c) => next.select_category(&format!("c{c}"), &mut next_acc),
            };
            if result.is_err() {
                assert_eq!(&next, state, "rejected {step:?} changed state");
                assert_eq!(&next_acc, acc);
            }
            explore(&next, &next_acc, depth - 1, ids, steps);
        }
    }

    #[test]
    fn pool_and_assignments_always_partition_the_items() {
        let f = fields(&[("0", "a"), ("1", "b"), ("2", "c")], &["c0", "c1"]);
        let ids: HashSet<String> = f.items.iter().map(|i| i.id.clone()).collect();
        let mut acc = Accumulator::new();
        let state = CategorizeState::new("q", &f, &mut acc);
        let steps = [
            Step::Item(0),
            Step::Item(1),
            Step::Item(2),
            Step::Item(3),
            Step::Category(0),
            Step::Category(1),
        ];
        explore(&state, &acc, 5, &ids, &steps);
    }
}
