//! Epsilon-greedy tabular Q-learning

use arena_rl_core::{Action, Policy, QTable, State, Transition};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::LearningConfig;

/// On-device learner owning its [`QTable`]
#[derive(Debug)]
pub struct TabularPolicy {
    table: QTable,
    params: LearningConfig,
    rng: StdRng,
}

impl TabularPolicy {
    /// Create a policy with an empty table
    #[must_use]
    pub fn new(params: LearningConfig) -> Self {
        Self::with_table(QTable::new(), params)
    }

    /// Create a policy starting from an existing table
    #[must_use]
    pub fn with_table(table: QTable, params: LearningConfig) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { table, params, rng }
    }

    /// Hyperparameters in use
    #[must_use]
    pub fn params(&self) -> &LearningConfig {
        &self.params
    }

    /// Owned table
    #[must_use]
    pub fn q_table(&self) -> &QTable {
        &self.table
    }

    /// Give up the table, e.g. for persistence at teardown
    #[must_use]
    pub fn into_table(self) -> QTable {
        self.table
    }

    /// Epsilon-greedy selection. With probability `epsilon` any action is
    /// returned uniformly; otherwise the best known action for `state`,
    /// ties going to the lowest ordinal. Unseen states are zero-initialized
    /// first.
    pub fn choose_action(&mut self, state: &State, epsilon: f32) -> Action {
        let values = *self.table.entry_or_default(*state);
        if self.rng.gen::<f32>() < epsilon {
            Action::ALL[self.rng.gen_range(0..Action::COUNT)]
        } else {
            values.best_action()
        }
    }

    /// Bellman update of `Q[prev][action]` towards
    /// `reward + gamma * max Q[next]`.
    ///
    /// No-op when `prev` has never been seen. `next` is zero-initialized
    /// when absent.
    pub fn update(
        &mut self,
        prev: &State,
        action: Action,
        reward: f32,
        next: &State,
        alpha: f32,
        gamma: f32,
    ) {
        if !self.table.contains(prev) {
            debug!(state = %prev, "skipping update for unseen state");
            return;
        }
        let max_future = self.table.entry_or_default(*next).max_value();
        if let Some(values) = self.table.get_mut(prev) {
            let q = values.get_mut(action);
            *q += alpha * (reward + gamma * max_future - *q);
        }
    }
}

impl Policy for TabularPolicy {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn select_action(&mut self, state: &State) -> Action {
        self.choose_action(state, self.params.epsilon)
    }

    fn observe(&mut self, transition: &Transition) {
        let LearningConfig { alpha, gamma, .. } = self.params;
        self.update(
            &transition.state,
            transition.action,
            transition.reward,
            &transition.next_state,
            alpha,
            gamma,
        );
    }

    fn table(&self) -> Option<&QTable> {
        Some(&self.table)
    }
}
