//! Two-phase decision cycle
//!
//! On a fixed cadence the cycle snapshots the live state, asks the policy
//! for an action and triggers it in the host (phase one). It then waits,
//! across ticks, for the host to report that the action concluded or for
//! the watchdog to expire, whichever comes first (phase two). Completing
//! resamples the state, drains the pending rewards and hands the
//! transition to the policy.
//!
//! Nothing here blocks: "awaiting completion" is a phase checked on later
//! ticks, and every timer runs on the tick clock.

use arena_rl_core::{
    Action, ActionTicket, CombatEvent, CombatHost, Completion, Policy, RewardAccumulator,
    RewardShaping, State, StateTracker, Timers, Transition,
};
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, CycleConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CycleTimer {
    Watchdog,
}

/// Where the cycle is between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready for the next decision
    Idle,
    /// An action is in flight
    AwaitingCompletion,
    /// The agent died or was shut down
    Finished,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Actions triggered
    pub decisions: u64,
    /// Transitions handed to the policy
    pub completions: u64,
    /// Completions forced by the watchdog
    pub watchdog_recoveries: u64,
    /// Completion signals ignored because their cycle already ended
    pub stale_completions: u64,
}

/// Decision state machine of one agent
pub struct DecisionCycle {
    settings: CycleConfig,
    interval: f32,
    shaping: RewardShaping,
    policy: Box<dyn Policy>,
    tracker: StateTracker,
    rewards: RewardAccumulator,
    timers: Timers<CycleTimer>,
    phase: Phase,
    prev_state: State,
    chosen: Action,
    previous: Action,
    repeat_count: u32,
    ticket: Option<ActionTicket>,
    next_ticket: u64,
    since_decision: f32,
    terminal_sent: bool,
    stats: CycleStats,
}

impl DecisionCycle {
    /// Build a cycle for `config` driving `policy`
    #[must_use]
    pub fn new(config: &AgentConfig, policy: Box<dyn Policy>) -> Self {
        Self {
            settings: config.cycle,
            interval: config.decision_interval(),
            shaping: config.rewards,
            policy,
            tracker: StateTracker::new(config.cycle.hit_recently_duration),
            rewards: RewardAccumulator::new(),
            timers: Timers::new(),
            phase: Phase::Idle,
            prev_state: State::default(),
            chosen: Action::Wait,
            previous: Action::Wait,
            repeat_count: 0,
            ticket: None,
            next_ticket: 1,
            since_decision: 0.0,
            terminal_sent: false,
            stats: CycleStats::default(),
        }
    }

    /// Take the first observation and let the policy announce it
    pub fn begin(&mut self, host: &dyn CombatHost) {
        let initial = self.sample(host);
        self.prev_state = initial;
        self.policy.begin(&initial);
        info!(policy = self.policy.name(), state = %initial, "decision cycle started");
    }

    /// Advance by `dt` seconds. Returns promptly on every call.
    pub fn tick(&mut self, dt: f32, host: &mut dyn CombatHost) {
        if self.phase == Phase::Finished {
            return;
        }
        self.tracker.advance(dt);

        for fired in self.timers.advance(dt) {
            match fired {
                CycleTimer::Watchdog if self.phase == Phase::AwaitingCompletion => {
                    warn!(
                        action = %self.chosen,
                        ticket = ?self.ticket,
                        "no completion signal before watchdog, forcing completion"
                    );
                    self.stats.watchdog_recoveries += 1;
                    self.finish_cycle(host, false);
                }
                CycleTimer::Watchdog => {}
            }
        }

        self.since_decision += dt;
        if self.since_decision >= self.interval {
            self.since_decision %= self.interval;
            if self.phase == Phase::Idle {
                self.start_cycle(host);
            }
        }
    }

    /// Host signal that the action behind `ticket` concluded. Returns
    /// whether it closed the current cycle; stale tickets are ignored.
    pub fn complete_action(&mut self, ticket: ActionTicket, host: &dyn CombatHost) -> bool {
        if self.phase != Phase::AwaitingCompletion || self.ticket != Some(ticket) {
            debug!(%ticket, current = ?self.ticket, "ignoring stale completion");
            self.stats.stale_completions += 1;
            return false;
        }
        if self.chosen == Action::Dodge {
            self.rewards.add(self.shaping.dodge_completed);
        }
        self.finish_cycle(host, false);
        true
    }

    /// Route an environment outcome into the pending rewards
    pub fn record(&mut self, event: CombatEvent) {
        if self.phase == Phase::Finished {
            return;
        }
        if event == CombatEvent::GotHit {
            self.tracker.mark_hit_recently();
        }
        self.rewards.add(self.shaping.reward_for(event));
    }

    /// Agent death: apply the death penalty, force a terminal transition and
    /// stop all timers
    pub fn on_death(&mut self, host: &dyn CombatHost) {
        if self.phase == Phase::Finished {
            return;
        }
        self.rewards.add(self.shaping.death);
        self.finish_cycle(host, true);
        self.terminal_sent = true;
        self.halt();
        info!(
            decisions = self.stats.decisions,
            recoveries = self.stats.watchdog_recoveries,
            "agent died, decision cycle finished"
        );
    }

    /// Agent removal: stop all timers and, unless a terminal transition was
    /// already sent, end the episode with what is pending
    pub fn shutdown(&mut self, host: &dyn CombatHost) {
        if !self.terminal_sent {
            let state = self.sample(host);
            let reward = self.rewards.drain();
            self.policy.finish(&state, reward);
            self.terminal_sent = true;
        }
        self.halt();
    }

    fn halt(&mut self) {
        self.timers.clear();
        self.tracker.cancel_timers();
        self.ticket = None;
        self.phase = Phase::Finished;
    }

    fn sample(&mut self, host: &dyn CombatHost) -> State {
        self.tracker.sample(host, self.settings.attack_radius)
    }

    fn start_cycle(&mut self, host: &mut dyn CombatHost) {
        let state = self.sample(host);
        self.prev_state = state;
        self.previous = self.chosen;
        self.chosen = self.policy.select_action(&state);
        self.track_repeats();

        let ticket = ActionTicket(self.next_ticket);
        self.next_ticket += 1;
        self.ticket = Some(ticket);
        self.phase = Phase::AwaitingCompletion;
        self.stats.decisions += 1;
        debug!(%ticket, action = %self.chosen, state = %state, "triggering action");

        self.shape_trigger(host);
        match host.begin_action(self.chosen, ticket) {
            Completion::Immediate => {
                if self.chosen == Action::Heal {
                    self.shape_heal_outcome(host);
                }
                self.finish_cycle(host, false);
            }
            Completion::Deferred => {
                self.timers
                    .set(CycleTimer::Watchdog, self.settings.watchdog_timeout);
            }
        }
    }

    fn track_repeats(&mut self) {
        if self.chosen != self.previous {
            self.repeat_count = 0;
            return;
        }
        self.repeat_count += 1;
        if self.repeat_count > self.settings.repeat_threshold {
            let penalty = self.shaping.repeat_penalty(self.repeat_count);
            debug!(action = %self.chosen, count = self.repeat_count, penalty, "repeated action");
            self.rewards.add(penalty);
        }
    }

    /// Rewards that depend only on the situation when the action starts
    fn shape_trigger(&mut self, host: &dyn CombatHost) {
        let distance = host.distance_to_target();
        match self.chosen {
            Action::Attack => {
                let in_range = distance.is_some_and(|d| d < self.settings.attack_radius);
                self.rewards.add(if in_range {
                    self.shaping.attack_in_range
                } else {
                    self.shaping.attack_out_of_range
                });
            }
            Action::Guard => {
                if let Some(d) = distance {
                    if d > self.settings.combat_radius {
                        self.rewards.add(self.shaping.guard_outside_combat_range);
                    } else if d > self.settings.attack_radius {
                        self.rewards.add(self.shaping.guard_outside_attack_range);
                    }
                }
            }
            Action::Heal => {
                if host.self_status().heals_left == 0 {
                    self.rewards.add(self.shaping.heal_with_no_potions);
                }
            }
            Action::Wait => self.rewards.add(self.shaping.wait),
            Action::Dodge => {}
        }
    }

    fn shape_heal_outcome(&mut self, host: &dyn CombatHost) {
        let health = host.self_status().health;
        if health > 0.75 {
            self.rewards.add(self.shaping.healed_at_high_health);
        } else if health < 0.5 {
            self.rewards.add(self.shaping.healed_at_low_health);
        }
    }

    fn finish_cycle(&mut self, host: &dyn CombatHost, done: bool) {
        self.timers.cancel(CycleTimer::Watchdog);
        let next_state = self.sample(host);
        let transition = Transition {
            state: self.prev_state,
            action: self.chosen,
            reward: self.rewards.drain(),
            next_state,
            done,
        };
        debug!(
            action = %transition.action,
            reward = transition.reward,
            from = %transition.state,
            to = %transition.next_state,
            done,
            "cycle complete"
        );
        self.policy.observe(&transition);

        self.ticket = None;
        self.phase = Phase::Idle;
        self.stats.completions += 1;
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ticket of the action in flight
    #[must_use]
    pub fn pending_ticket(&self) -> Option<ActionTicket> {
        self.ticket
    }

    /// Most recently chosen action
    #[must_use]
    pub fn chosen_action(&self) -> Action {
        self.chosen
    }

    /// Consecutive repeats of the current action
    #[must_use]
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Live state as last sampled or updated
    #[must_use]
    pub fn current_state(&self) -> State {
        self.tracker.current()
    }

    /// Sum of rewards collected in the current cycle
    #[must_use]
    pub fn pending_reward(&self) -> f32 {
        self.rewards.peek()
    }

    /// Seconds between decisions
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Diagnostic counters
    #[must_use]
    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// The policy being driven
    #[must_use]
    pub fn policy(&self) -> &dyn Policy {
        self.policy.as_ref()
    }

    /// Mutable access to the policy
    pub fn policy_mut(&mut self) -> &mut dyn Policy {
        self.policy.as_mut()
    }
}

impl std::fmt::Debug for DecisionCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCycle")
            .field("policy", &self.policy.name())
            .field("phase", &self.phase)
            .field("chosen", &self.chosen)
            .field("repeat_count", &self.repeat_count)
            .field("ticket", &self.ticket)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
