// Stand-in policy server for exercising the wire protocol

use anyhow::{Context, Result};
use arena_rl_core::protocol::{self, TransitionMessage};
use arena_rl_core::{Action, ArenaError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Accept one agent, answer its handshake, then reply to every transition
/// with a random action id until the episode ends or the agent hangs up
pub async fn serve(host: &str, port: u16, seed: Option<u64>) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!(%host, port, "waiting for an agent");

    let (socket, peer) = listener.accept().await.context("Failed to accept")?;
    info!(%peer, "agent connected");

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let total = answer(socket, rng).await?;
    println!("Episode ended, total reward {total:.2}");
    Ok(())
}

async fn answer(mut socket: TcpStream, mut rng: StdRng) -> Result<f32> {
    let mut total = 0.0;
    let mut transitions = 0usize;

    loop {
        let payload = match protocol::read_frame(&mut socket).await {
            Ok(payload) => payload,
            Err(ArenaError::Disconnected) => {
                info!(transitions, "agent disconnected");
                return Ok(total);
            }
            Err(e) => return Err(e).context("Failed to read frame"),
        };

        let value: Value = serde_json::from_slice(&payload).context("Frame is not JSON")?;
        if value.get("ping").is_some() {
            info!(hello = %value, "handshake");
            let pong = json!({
                "pong": "hello from arenactl",
                "received_states": value.get("NumStates"),
                "received_actions": value.get("NumActions"),
            });
            protocol::write_frame(&mut socket, &serde_json::to_vec(&pong)?).await?;
            continue;
        }

        let message: TransitionMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "ignoring frame that is not a transition");
                continue;
            }
        };
        if transitions > 0 {
            total += message.reward;
        }
        transitions += 1;

        let action = Action::ALL[rng.gen_range(0..Action::COUNT)];
        debug!(reward = message.reward, done = message.done, %action, "answering transition");
        protocol::write_action_id(&mut socket, action.ordinal()).await?;

        if message.done {
            info!(transitions, "terminal transition received");
            return Ok(total);
        }
    }
}
