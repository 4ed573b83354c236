// Tick loop binding agents to their arenas

use arena_rl_agent::{CombatAgent, CycleStats};
use arena_rl_env::{Arena, ArenaEvent, Outcome};
use std::time::Duration;

/// One agent in its own duel
pub struct Duel {
    pub agent: CombatAgent,
    pub arena: Arena,
}

/// How a duel went
#[derive(Debug, Clone, Copy)]
pub struct DuelReport {
    pub outcome: Option<Outcome>,
    pub seconds: f32,
    pub stats: CycleStats,
    pub states: usize,
}

impl Duel {
    /// Advance agent and arena by one tick and route the arena's events
    /// back into the agent
    pub fn step(&mut self, dt: f32) {
        if self.arena.is_over() {
            return;
        }
        self.agent.tick(dt, &mut self.arena);

        for event in self.arena.tick(dt) {
            match event {
                ArenaEvent::Combat(event) => self.agent.record(event),
                ArenaEvent::ActionFinished(ticket) => {
                    self.agent.complete_action(ticket, &self.arena);
                }
                ArenaEvent::EnemyDied => self.agent.on_death(&self.arena),
                ArenaEvent::KnightDied => {}
            }
        }
    }

    pub fn report(&self) -> DuelReport {
        DuelReport {
            outcome: self.arena.outcome(),
            seconds: self.arena.elapsed(),
            stats: self.agent.cycle().stats(),
            states: self.agent.table().map_or(0, |t| t.len()),
        }
    }
}

/// Step every duel until all are over or `max_seconds` of simulated time
/// pass. With `pace` set the loop sleeps one tick of wall time per step,
/// which gives a remote policy server time to answer.
pub async fn run_all(duels: &mut [Duel], dt: f32, max_seconds: f32, pace: bool) {
    let mut elapsed = 0.0;
    while elapsed < max_seconds && duels.iter().any(|d| !d.arena.is_over()) {
        for duel in duels.iter_mut() {
            duel.step(dt);
        }
        elapsed += dt;

        if pace {
            tokio::time::sleep(Duration::from_secs_f32(dt)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
