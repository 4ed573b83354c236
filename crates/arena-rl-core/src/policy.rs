//! Policy abstraction shared by the on-device and remote learners

use async_trait::async_trait;

use crate::{Action, QTable, State};

/// One observed decision: the state it was taken in, the action, the reward
/// collected until its effect was observable, and the resulting state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// State snapshot at decision time
    pub state: State,
    /// Action taken
    pub action: Action,
    /// Summed shaped reward
    pub reward: f32,
    /// State after the action concluded
    pub next_state: State,
    /// Whether the episode ended with this transition
    pub done: bool,
}

/// Action selection and learning as seen by the decision cycle
#[async_trait]
pub trait Policy: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Called once before the first cycle with the initial state
    fn begin(&mut self, _initial: &State) {}

    /// Choose the action for a new cycle. Must return promptly.
    fn select_action(&mut self, state: &State) -> Action;

    /// Learn from (or forward) a completed transition
    fn observe(&mut self, transition: &Transition);

    /// End the episode without a final transition, e.g. when the agent is
    /// removed while alive
    fn finish(&mut self, _state: &State, _reward: f32) {}

    /// The value table, for policies that keep one
    fn table(&self) -> Option<&QTable> {
        None
    }

    /// Release any resources held by the policy
    async fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }
}
