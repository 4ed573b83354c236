//! Policy that delegates selection and learning to an external process

use arena_rl_core::protocol::TransitionMessage;
use arena_rl_core::{Action, ArenaError, Policy, State, Transition};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::RemoteConfig;
use crate::transport::Transport;

/// Client side of the external policy.
///
/// Without a live transport (connect failed, or the peer went away) every
/// selection is [`Action::Wait`] and transitions are dropped.
#[derive(Debug, Default)]
pub struct RemotePolicy {
    transport: Option<Transport>,
}

impl RemotePolicy {
    /// Connect to the configured endpoint. A failed connect is logged and
    /// yields a degraded policy rather than an error.
    pub async fn connect(config: &RemoteConfig) -> Self {
        match Transport::connect(config).await {
            Ok(transport) => Self::with_transport(transport),
            Err(e) => {
                error!(address = %config.address(), error = %e, "policy server unreachable, agent will only wait");
                Self::degraded()
            }
        }
    }

    /// Policy without a connection
    #[must_use]
    pub fn degraded() -> Self {
        Self { transport: None }
    }

    /// Policy over an existing transport
    #[must_use]
    pub fn with_transport(transport: Transport) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// Whether a live connection is held
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_connected)
    }

    fn send(&mut self, message: &TransitionMessage) {
        let Some(transport) = &self.transport else {
            return;
        };
        if let Err(e) = transport.send_transition(message) {
            self.drop_transport(&e);
        } else {
            debug!(reward = message.reward, done = message.done, "sent transition");
        }
    }

    fn drop_transport(&mut self, reason: &ArenaError) {
        warn!(error = %reason, "policy connection lost, agent will only wait");
        self.transport = None;
    }
}

#[async_trait]
impl Policy for RemotePolicy {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn begin(&mut self, initial: &State) {
        self.send(&TransitionMessage {
            state: initial.to_vector(),
            reward: 0.0,
            done: false,
        });
    }

    fn select_action(&mut self, _state: &State) -> Action {
        let Some(transport) = self.transport.as_mut() else {
            return Action::Wait;
        };
        match transport.try_recv_action_id() {
            Ok(Some(id)) => Action::try_from(id).unwrap_or_else(|e| {
                warn!(error = %e, "rejecting action id from policy server");
                Action::Wait
            }),
            Ok(None) => {
                debug!("no action pending");
                Action::Wait
            }
            Err(e) => {
                self.drop_transport(&e);
                Action::Wait
            }
        }
    }

    fn observe(&mut self, transition: &Transition) {
        self.send(&TransitionMessage::from_transition(transition));
    }

    fn finish(&mut self, state: &State, reward: f32) {
        self.send(&TransitionMessage {
            state: state.to_vector(),
            reward,
            done: true,
        });
    }

    async fn close(&mut self) -> arena_rl_core::Result<()> {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            info!("policy connection closed");
        }
        Ok(())
    }
}
