mod common;

use arena_rl_agent::{AgentConfig, CombatAgent, PolicyVariant, TableStore, World};
use arena_rl_core::protocol::{self, TransitionMessage};
use arena_rl_core::Action;
use arena_rl_env::Outcome;
use std::time::Duration;
use tokio::net::TcpListener;

fn remote_config(port: u16) -> AgentConfig {
    let mut config = AgentConfig::named("Puppet");
    config.policy = PolicyVariant::Remote;
    config.remote.host = "127.0.0.1".into();
    config.remote.port = port;
    config
}

/// Policy server that answers the handshake, replies `Attack` to every
/// transition and returns everything it received once the episode ends
async fn attack_server(listener: TcpListener) -> Vec<TransitionMessage> {
    let (mut socket, _) = listener.accept().await.unwrap();

    let hello = protocol::read_frame(&mut socket).await.unwrap();
    let hello: serde_json::Value = serde_json::from_slice(&hello).unwrap();
    assert!(hello["ping"].is_string());
    assert_eq!(hello["NumStates"], "8");
    assert_eq!(hello["NumActions"], "5");
    protocol::write_frame(&mut socket, br#"{"pong":"ok"}"#)
        .await
        .unwrap();

    let mut received = Vec::new();
    loop {
        let payload = protocol::read_frame(&mut socket).await.unwrap();
        let message = protocol::decode_transition(&payload).unwrap();
        let done = message.done;
        received.push(message);
        if done {
            return received;
        }
        protocol::write_action_id(&mut socket, Action::Attack.ordinal())
            .await
            .unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_agent_streams_transitions() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(attack_server(listener));

    let dir = tempfile::tempdir().unwrap();
    let world = World::new(TableStore::new(dir.path()));
    let mut arena = common::arena(30);
    let mut agent = CombatAgent::start(remote_config(port), &world, &arena)
        .await
        .unwrap();
    assert!(agent.table().is_none());

    while !arena.is_over() && arena.elapsed() < 20.0 {
        common::step(&mut agent, &mut arena);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let stats = agent.cycle().stats();
    let died = arena.outcome() == Some(Outcome::KnightWon);
    assert!(stats.decisions > 0);

    assert!(agent.shutdown(&arena).await.unwrap().is_none());
    let received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();

    let first = &received[0];
    assert_eq!(first.reward, 0.0);
    assert!(!first.done);
    assert!(received.last().unwrap().done);
    assert_eq!(received.iter().filter(|m| m.done).count(), 1);

    let expected = if died {
        1 + stats.completions
    } else {
        2 + stats.completions
    };
    assert_eq!(received.len() as u64, expected);
}

#[tokio::test]
async fn unreachable_server_leaves_agent_waiting() {
    // Grab a free port, then close it so nothing is listening
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let dir = tempfile::tempdir().unwrap();
    let world = World::new(TableStore::new(dir.path()));
    let mut arena = common::arena(31);
    let mut agent = CombatAgent::start(remote_config(port), &world, &arena)
        .await
        .unwrap();

    for _ in 0..100 {
        common::step(&mut agent, &mut arena);
    }
    assert!(agent.cycle().stats().decisions > 0);
    assert_eq!(agent.cycle().chosen_action(), Action::Wait);
    assert!(agent.shutdown(&arena).await.unwrap().is_none());
}
