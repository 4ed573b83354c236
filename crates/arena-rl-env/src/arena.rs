//! One-on-one duel between the agent's body and a scripted knight
//!
//! Everything is one-dimensional: the only geometry is the distance between
//! the two fighters. The agent's body chases the knight whenever it is idle;
//! the knight stands its ground, swings on a jittered cadence and reacts to
//! incoming attacks by guarding or dodging at random. Attack, guard and
//! dodge take time and are reported finished through [`ArenaEvent`]s.

use arena_rl_core::environment::first_primary_target;
use arena_rl_core::{
    Action, ActionTicket, CombatEvent, CombatHost, Completion, SelfStatus, TargetStatus,
    Targetable, Timers,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Duel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Seed for the knight's behavior, random when unset
    pub seed: Option<u64>,
    /// Initial distance between the fighters
    pub start_distance: f32,
    /// Chase speed of the agent's body, units per second
    pub chase_speed: f32,
    /// Closest the body gets while chasing
    pub chase_stop_distance: f32,
    /// Reach of a swing, for both fighters
    pub reach: f32,
    /// Agent body maximum health
    pub enemy_max_health: f32,
    /// Agent body heal items
    pub enemy_heals: u32,
    /// Health restored per heal item
    pub heal_amount: f32,
    /// Damage of the body's attacks
    pub enemy_damage: f32,
    /// Knight maximum health
    pub knight_max_health: f32,
    /// Damage of the knight's attacks
    pub knight_damage: f32,
    /// Mean seconds between knight attacks
    pub knight_attack_interval: f32,
    /// Seconds between a knight swing starting and landing
    pub knight_windup: f32,
    /// Chance the knight guards an incoming attack
    pub knight_guard_chance: f32,
    /// Chance the knight dodges an incoming attack it does not guard
    pub knight_dodge_chance: f32,
    /// Seconds an attack takes
    pub attack_duration: f32,
    /// Seconds a guard is held
    pub guard_duration: f32,
    /// Seconds a dodge takes
    pub dodge_duration: f32,
    /// Never report the body's actions as finished, as if their animation
    /// end notifications got lost
    pub stall_completions: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            seed: None,
            start_distance: 800.0,
            chase_speed: 300.0,
            chase_stop_distance: 150.0,
            reach: 300.0,
            enemy_max_health: 100.0,
            enemy_heals: 3,
            heal_amount: 30.0,
            enemy_damage: 20.0,
            knight_max_health: 100.0,
            knight_damage: 15.0,
            knight_attack_interval: 2.5,
            knight_windup: 0.5,
            knight_guard_chance: 0.25,
            knight_dodge_chance: 0.15,
            attack_duration: 0.8,
            guard_duration: 1.0,
            dodge_duration: 0.6,
            stall_completions: false,
        }
    }
}

/// Something that happened during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArenaEvent {
    /// A combat outcome concerning the agent
    Combat(CombatEvent),
    /// The body's action behind this ticket ended
    ActionFinished(ActionTicket),
    /// The agent's body died
    EnemyDied,
    /// The knight died
    KnightDied,
}

/// How a duel ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The agent killed the knight
    EnemyWon,
    /// The knight killed the agent
    KnightWon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ArenaTimer {
    EnemyAction,
    KnightAttack,
    KnightWindup,
    KnightStance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stance {
    Idle,
    WindingUp,
    Guarding,
    Dodging,
}

#[derive(Debug, Clone)]
struct Fighter {
    name: &'static str,
    primary: bool,
    health: f32,
    max_health: f32,
}

impl Fighter {
    fn alive(&self) -> bool {
        self.health > 0.0
    }

    fn fraction(&self) -> f32 {
        (self.health / self.max_health).clamp(0.0, 1.0)
    }
}

impl Targetable for Fighter {
    fn is_primary_target(&self) -> bool {
        self.primary
    }
}

/// Simulated duel implementing [`CombatHost`]
#[derive(Debug)]
pub struct Arena {
    config: ArenaConfig,
    rng: StdRng,
    timers: Timers<ArenaTimer>,
    elapsed: f32,
    distance: f32,
    body: Fighter,
    heals_left: u32,
    in_flight: Option<(Action, ActionTicket)>,
    fighters: Vec<Fighter>,
    target: Option<usize>,
    stance: Stance,
    events: Vec<ArenaEvent>,
    outcome: Option<Outcome>,
}

impl Arena {
    /// Set up a fresh duel
    #[must_use]
    pub fn new(config: ArenaConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fighters = vec![
            Fighter {
                name: "training dummy",
                primary: false,
                health: 1.0,
                max_health: 1.0,
            },
            Fighter {
                name: "knight",
                primary: true,
                health: config.knight_max_health,
                max_health: config.knight_max_health,
            },
        ];
        let target = first_primary_target(&fighters)
            .and_then(|t| fighters.iter().position(|f| std::ptr::eq(f, t)));

        let mut arena = Self {
            body: Fighter {
                name: "enemy",
                primary: false,
                health: config.enemy_max_health,
                max_health: config.enemy_max_health,
            },
            heals_left: config.enemy_heals,
            distance: config.start_distance,
            rng,
            timers: Timers::new(),
            elapsed: 0.0,
            in_flight: None,
            fighters,
            target,
            stance: Stance::Idle,
            events: Vec::new(),
            outcome: None,
            config,
        };
        arena.schedule_knight_attack();
        arena
    }

    /// Seconds simulated so far
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// How the duel ended, if it has
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether one side has died
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Current distance between the fighters
    #[must_use]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Knight health as a fraction
    #[must_use]
    pub fn knight_health(&self) -> f32 {
        self.knight().map_or(0.0, Fighter::fraction)
    }

    /// Agent body health as a fraction
    #[must_use]
    pub fn enemy_health(&self) -> f32 {
        self.body.fraction()
    }

    /// Advance the duel and return what happened, in order. Combat outcomes
    /// of an action come before its [`ArenaEvent::ActionFinished`].
    pub fn tick(&mut self, dt: f32) -> Vec<ArenaEvent> {
        if self.is_over() {
            return Vec::new();
        }
        self.elapsed += dt;
        self.chase(dt);

        for fired in self.timers.advance(dt) {
            if self.is_over() {
                break;
            }
            match fired {
                ArenaTimer::EnemyAction => self.finish_body_action(),
                ArenaTimer::KnightAttack => self.start_knight_swing(),
                ArenaTimer::KnightWindup => self.land_knight_swing(),
                ArenaTimer::KnightStance => self.stance = Stance::Idle,
            }
        }
        if self.is_over() {
            self.timers.clear();
        }
        std::mem::take(&mut self.events)
    }

    fn knight(&self) -> Option<&Fighter> {
        self.target.and_then(|i| self.fighters.get(i))
    }

    fn knight_mut(&mut self) -> Option<&mut Fighter> {
        self.target.and_then(|i| self.fighters.get_mut(i))
    }

    fn knight_alive(&self) -> bool {
        self.knight().is_some_and(Fighter::alive)
    }

    fn chase(&mut self, dt: f32) {
        if self.in_flight.is_none() && self.distance > self.config.chase_stop_distance {
            self.distance =
                (self.distance - self.config.chase_speed * dt).max(self.config.chase_stop_distance);
        }
    }

    fn schedule_knight_attack(&mut self) {
        let mean = self.config.knight_attack_interval;
        let delay = self.rng.gen_range(mean * 0.75..=mean * 1.25);
        self.timers.set(ArenaTimer::KnightAttack, delay);
    }

    fn start_knight_swing(&mut self) {
        if self.stance == Stance::Idle && self.knight_alive() {
            trace!("knight winds up");
            self.stance = Stance::WindingUp;
            self.timers
                .set(ArenaTimer::KnightWindup, self.config.knight_windup);
        } else {
            self.schedule_knight_attack();
        }
    }

    fn land_knight_swing(&mut self) {
        self.stance = Stance::Idle;
        self.schedule_knight_attack();

        let defending = self.in_flight.map(|(action, _)| action);
        let event = if self.distance > self.config.reach {
            CombatEvent::TargetAttackMissed
        } else if defending == Some(Action::Guard) {
            CombatEvent::BlockedTargetAttack
        } else if defending == Some(Action::Dodge) {
            CombatEvent::DodgedTargetAttack
        } else {
            self.body.health -= self.config.knight_damage;
            CombatEvent::GotHit
        };
        debug!(?event, enemy_health = self.body.health, "knight swing landed");
        self.events.push(ArenaEvent::Combat(event));

        if !self.body.alive() {
            debug!(victim = self.body.name, "fighter died");
            self.in_flight = None;
            self.events.push(ArenaEvent::EnemyDied);
            self.outcome = Some(Outcome::KnightWon);
        }
    }

    fn react_to_attack(&mut self) {
        if self.stance != Stance::Idle {
            return;
        }
        let roll: f32 = self.rng.gen();
        if roll < self.config.knight_guard_chance {
            self.stance = Stance::Guarding;
            self.timers
                .set(ArenaTimer::KnightStance, self.config.guard_duration);
        } else if roll < self.config.knight_guard_chance + self.config.knight_dodge_chance {
            self.stance = Stance::Dodging;
            self.timers
                .set(ArenaTimer::KnightStance, self.config.dodge_duration);
        }
    }

    fn finish_body_action(&mut self) {
        let Some((action, ticket)) = self.in_flight.take() else {
            return;
        };
        if action == Action::Attack {
            self.resolve_body_attack();
        }
        if !self.config.stall_completions {
            self.events.push(ArenaEvent::ActionFinished(ticket));
        }
    }

    fn resolve_body_attack(&mut self) {
        let event = if self.distance > self.config.reach {
            CombatEvent::AttackMissed
        } else {
            match self.stance {
                Stance::Guarding => CombatEvent::AttackBlocked,
                Stance::Dodging => CombatEvent::AttackMissed,
                Stance::Idle | Stance::WindingUp => {
                    let damage = self.config.enemy_damage;
                    if let Some(knight) = self.knight_mut() {
                        knight.health -= damage;
                    }
                    CombatEvent::AttackHit
                }
            }
        };
        self.events.push(ArenaEvent::Combat(event));

        if event == CombatEvent::AttackHit && !self.knight_alive() {
            if let Some(knight) = self.knight() {
                debug!(victim = knight.name, "fighter died");
            }
            self.events.push(ArenaEvent::Combat(CombatEvent::KilledTarget));
            self.events.push(ArenaEvent::KnightDied);
            self.outcome = Some(Outcome::EnemyWon);
        }
    }
}

impl CombatHost for Arena {
    fn target_status(&self) -> Option<TargetStatus> {
        let knight = self.knight().filter(|k| k.alive())?;
        Some(TargetStatus {
            health: knight.fraction(),
            attacking: self.stance == Stance::WindingUp,
            guarding: self.stance == Stance::Guarding,
            dodging: self.stance == Stance::Dodging,
        })
    }

    fn self_status(&self) -> SelfStatus {
        SelfStatus {
            health: self.body.fraction(),
            heals_left: self.heals_left,
        }
    }

    fn distance_to_target(&self) -> Option<f32> {
        self.knight_alive().then_some(self.distance)
    }

    fn begin_action(&mut self, action: Action, ticket: ActionTicket) -> Completion {
        if self.is_over() {
            return Completion::Immediate;
        }
        let duration = match action {
            Action::Attack => self.config.attack_duration,
            Action::Guard => self.config.guard_duration,
            Action::Dodge => self.config.dodge_duration,
            Action::Heal => {
                if self.heals_left > 0 {
                    self.heals_left -= 1;
                    self.body.health =
                        (self.body.health + self.config.heal_amount).min(self.body.max_health);
                }
                return Completion::Immediate;
            }
            Action::Wait => return Completion::Immediate,
        };

        if action == Action::Attack {
            self.react_to_attack();
        }
        self.in_flight = Some((action, ticket));
        self.timers.set(ArenaTimer::EnemyAction, duration);
        Completion::Deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn calm_config() -> ArenaConfig {
        ArenaConfig {
            seed: Some(11),
            start_distance: 200.0,
            knight_attack_interval: 1000.0,
            knight_guard_chance: 0.0,
            knight_dodge_chance: 0.0,
            ..ArenaConfig::default()
        }
    }

    fn run(arena: &mut Arena, seconds: f32) -> Vec<ArenaEvent> {
        let mut events = Vec::new();
        let steps = (seconds / 0.1).round() as usize;
        for _ in 0..steps {
            events.extend(arena.tick(0.1));
        }
        events
    }

    #[test]
    fn finds_the_knight_as_target() {
        let arena = Arena::new(calm_config());
        assert!(arena.target_status().is_some());
        assert_relative_eq!(arena.knight_health(), 1.0);
    }

    #[test]
    fn attack_in_reach_hits_then_finishes() {
        let mut arena = Arena::new(calm_config());
        let ticket = ActionTicket(1);
        assert_eq!(arena.begin_action(Action::Attack, ticket), Completion::Deferred);

        let events = run(&mut arena, 1.0);
        assert_eq!(
            events,
            vec![
                ArenaEvent::Combat(CombatEvent::AttackHit),
                ArenaEvent::ActionFinished(ticket),
            ]
        );
        assert_relative_eq!(arena.knight_health(), 0.8);
    }

    #[test]
    fn attack_out_of_reach_misses() {
        let mut arena = Arena::new(ArenaConfig {
            start_distance: 2000.0,
            chase_speed: 0.0,
            ..calm_config()
        });
        arena.begin_action(Action::Attack, ActionTicket(1));
        let events = run(&mut arena, 1.0);
        assert_eq!(events[0], ArenaEvent::Combat(CombatEvent::AttackMissed));
    }

    #[test]
    fn heal_and_wait_are_immediate() {
        let mut arena = Arena::new(calm_config());
        assert_eq!(arena.begin_action(Action::Wait, ActionTicket(1)), Completion::Immediate);
        assert_eq!(arena.begin_action(Action::Heal, ActionTicket(2)), Completion::Immediate);
        assert_eq!(arena.self_status().heals_left, 2);
        assert!(run(&mut arena, 1.0).is_empty());
    }

    #[test]
    fn knight_swing_hits_idle_body() {
        let mut arena = Arena::new(ArenaConfig {
            knight_attack_interval: 1.0,
            ..calm_config()
        });
        let events = run(&mut arena, 2.0);
        assert!(events.contains(&ArenaEvent::Combat(CombatEvent::GotHit)));
        assert!(arena.enemy_health() < 1.0);
    }

    #[test]
    fn guard_blocks_knight_swing() {
        let mut arena = Arena::new(ArenaConfig {
            knight_attack_interval: 1.0,
            guard_duration: 5.0,
            ..calm_config()
        });
        arena.begin_action(Action::Guard, ActionTicket(1));
        let events = run(&mut arena, 2.0);
        assert!(events.contains(&ArenaEvent::Combat(CombatEvent::BlockedTargetAttack)));
        assert_relative_eq!(arena.enemy_health(), 1.0);
    }

    #[test]
    fn body_chases_when_idle() {
        let mut arena = Arena::new(ArenaConfig {
            start_distance: 800.0,
            ..calm_config()
        });
        run(&mut arena, 1.0);
        assert!(arena.distance() < 800.0);
        run(&mut arena, 10.0);
        assert_relative_eq!(arena.distance(), 150.0);
    }

    #[test]
    fn killing_the_knight_ends_the_duel() {
        let mut arena = Arena::new(ArenaConfig {
            knight_max_health: 20.0,
            ..calm_config()
        });
        arena.begin_action(Action::Attack, ActionTicket(1));
        let events = run(&mut arena, 1.0);

        assert!(events.contains(&ArenaEvent::Combat(CombatEvent::KilledTarget)));
        assert_eq!(events.last(), Some(&ArenaEvent::ActionFinished(ActionTicket(1))));
        assert_eq!(arena.outcome(), Some(Outcome::EnemyWon));
        assert!(arena.target_status().is_none());
        assert!(arena.tick(1.0).is_empty());
    }

    #[test]
    fn stalled_completions_are_never_reported() {
        let mut arena = Arena::new(ArenaConfig {
            stall_completions: true,
            ..calm_config()
        });
        arena.begin_action(Action::Dodge, ActionTicket(1));
        let events = run(&mut arena, 2.0);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ArenaEvent::ActionFinished(_))));
    }

    #[test]
    fn config_from_partial_json() {
        let config: ArenaConfig =
            serde_json::from_str(r#"{ "seed": 5, "stall_completions": true }"#).unwrap();
        assert_eq!(config.seed, Some(5));
        assert!(config.stall_completions);
        assert_relative_eq!(config.reach, 300.0);
    }
}
