#![allow(dead_code)]

use arena_rl_agent::CombatAgent;
use arena_rl_env::{Arena, ArenaConfig, ArenaEvent};

pub const DT: f32 = 0.05;

pub fn arena(seed: u64) -> Arena {
    Arena::new(ArenaConfig {
        seed: Some(seed),
        ..ArenaConfig::default()
    })
}

/// One tick of agent and arena with event routing
pub fn step(agent: &mut CombatAgent, arena: &mut Arena) {
    agent.tick(DT, arena);
    for event in arena.tick(DT) {
        match event {
            ArenaEvent::Combat(event) => agent.record(event),
            ArenaEvent::ActionFinished(ticket) => {
                agent.complete_action(ticket, &*arena);
            }
            ArenaEvent::EnemyDied => agent.on_death(&*arena),
            ArenaEvent::KnightDied => {}
        }
    }
}

/// Step until the duel ends or `max_seconds` pass
pub fn run(agent: &mut CombatAgent, arena: &mut Arena, max_seconds: f32) {
    while !arena.is_over() && arena.elapsed() < max_seconds {
        step(agent, arena);
    }
}
