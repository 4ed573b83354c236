//! Tabular action values keyed by [`State`]

use serde_json::{Map, Value};
use std::collections::hash_map::{self, HashMap};
use std::fmt::Write as _;

use crate::{Action, ArenaError, State};

/// Q-values for every action of one state.
///
/// Always holds a value for each of the [`Action::COUNT`] actions, so a
/// state in a table is never partially populated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionValues([f32; Action::COUNT]);

impl ActionValues {
    /// Build from values in ordinal order
    #[must_use]
    pub fn from_array(values: [f32; Action::COUNT]) -> Self {
        Self(values)
    }

    /// Value of `action`
    #[must_use]
    pub fn get(&self, action: Action) -> f32 {
        self.0[action.index()]
    }

    /// Set the value of `action`
    pub fn set(&mut self, action: Action, value: f32) {
        self.0[action.index()] = value;
    }

    /// Mutable access to the value of `action`
    pub fn get_mut(&mut self, action: Action) -> &mut f32 {
        &mut self.0[action.index()]
    }

    /// Largest value over all actions
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Action with the largest value. Ties go to the lowest ordinal.
    #[must_use]
    pub fn best_action(&self) -> Action {
        let mut best = Action::ALL[0];
        let mut best_value = self.get(best);
        for action in Action::ALL.into_iter().skip(1) {
            if self.get(action) > best_value {
                best = action;
                best_value = self.get(action);
            }
        }
        best
    }

    /// `(action, value)` pairs in ordinal order
    pub fn iter(&self) -> impl Iterator<Item = (Action, f32)> + '_ {
        Action::ALL.into_iter().map(move |a| (a, self.get(a)))
    }

    /// Values in ordinal order
    #[must_use]
    pub fn as_array(&self) -> &[f32; Action::COUNT] {
        &self.0
    }
}

/// Mapping from state to per-action values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    entries: HashMap<State, ActionValues>,
}

impl QTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of states
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no state has been observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `state` has been observed
    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        self.entries.contains_key(state)
    }

    /// Values of `state`, if observed
    #[must_use]
    pub fn get(&self, state: &State) -> Option<&ActionValues> {
        self.entries.get(state)
    }

    /// Mutable values of `state`, if observed
    pub fn get_mut(&mut self, state: &State) -> Option<&mut ActionValues> {
        self.entries.get_mut(state)
    }

    /// Values of `state`, initializing every action to 0.0 on first lookup
    pub fn entry_or_default(&mut self, state: State) -> &mut ActionValues {
        self.entries.entry(state).or_default()
    }

    /// Insert or replace all values of `state`
    pub fn insert(&mut self, state: State, values: ActionValues) {
        self.entries.insert(state, values);
    }

    /// Single value lookup; `None` for unseen states
    #[must_use]
    pub fn value(&self, state: &State, action: Action) -> Option<f32> {
        self.entries.get(state).map(|v| v.get(action))
    }

    /// Iterate over all states (in no particular order)
    pub fn iter(&self) -> hash_map::Iter<'_, State, ActionValues> {
        self.entries.iter()
    }

    /// Nested document form: state key -> { action ordinal -> value }.
    ///
    /// Outer keys are sorted so the same table always produces the same
    /// document.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut keyed: Vec<(String, &ActionValues)> = self
            .entries
            .iter()
            .map(|(state, values)| (state.to_key(), values))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut root = Map::new();
        for (key, values) in keyed {
            let actions: Map<String, Value> = values
                .iter()
                .map(|(action, q)| (action.ordinal().to_string(), Value::from(q)))
                .collect();
            root.insert(key, Value::Object(actions));
        }
        Value::Object(root)
    }

    /// Serialize the document form to JSON text
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Rebuild a table from its document form.
    ///
    /// The whole document is rejected if any state key, action key or value
    /// is malformed. Actions missing from an inner object are filled with 0.0.
    pub fn from_document(document: &Value) -> crate::Result<Self> {
        let root = document
            .as_object()
            .ok_or_else(|| ArenaError::MalformedTable("top level is not an object".to_string()))?;

        let mut table = QTable::new();
        for (key, actions) in root {
            let state = State::from_key(key)?;
            let actions = actions.as_object().ok_or_else(|| {
                ArenaError::MalformedTable(format!("values for state {key} are not an object"))
            })?;

            let mut values = ActionValues::default();
            for (action_key, q) in actions {
                let action: Action = action_key.parse()?;
                let q = q.as_f64().ok_or_else(|| {
                    ArenaError::MalformedTable(format!(
                        "value for state {key}, action {action_key} is not a number"
                    ))
                })?;
                #[allow(clippy::cast_possible_truncation)]
                values.set(action, q as f32);
            }
            table.insert(state, values);
        }
        Ok(table)
    }

    /// Parse JSON text produced by [`QTable::to_json`]
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_document(&document)
    }

    /// Human-readable dump, one block per state in key order
    #[must_use]
    pub fn describe(&self) -> String {
        let mut states: Vec<(&State, &ActionValues)> = self.entries.iter().collect();
        states.sort_by_key(|(state, _)| state.to_key());

        let mut out = String::new();
        let _ = writeln!(out, "========= Q TABLE ({} states) =========", self.len());
        for (state, values) in states {
            let _ = writeln!(out, "State: {state}");
            for (action, q) in values.iter() {
                let _ = writeln!(out, "   {:<6}: {q:.2}", action.name());
            }
        }
        out
    }
}

impl FromIterator<(State, ActionValues)> for QTable {
    fn from_iter<I: IntoIterator<Item = (State, ActionValues)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
