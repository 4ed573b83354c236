//! Reward accumulation and shaping

use serde::{Deserialize, Serialize};

/// Mailbox of shaped reward contributions between two decision points.
///
/// Producers are environment callbacks that may fire at any point of the
/// tick; the total is a plain sum, so their order does not matter.
#[derive(Debug, Clone, Default)]
pub struct RewardAccumulator {
    pending: Vec<f32>,
}

impl RewardAccumulator {
    /// Empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a contribution
    pub fn add(&mut self, value: f32) {
        self.pending.push(value);
    }

    /// Sum of pending contributions, emptying the buffer
    pub fn drain(&mut self) -> f32 {
        let total = self.peek();
        self.pending.clear();
        total
    }

    /// Sum of pending contributions without clearing
    #[must_use]
    pub fn peek(&self) -> f32 {
        self.pending.iter().sum()
    }

    /// Number of pending contributions
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Environment outcomes that carry a shaped reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatEvent {
    /// The agent took damage
    GotHit,
    /// The agent's attack connected
    AttackHit,
    /// The agent's attack hit nothing
    AttackMissed,
    /// The agent's attack was guarded
    AttackBlocked,
    /// The target's attack missed the agent
    TargetAttackMissed,
    /// The agent dodged through the target's attack
    DodgedTargetAttack,
    /// The agent guarded the target's attack
    BlockedTargetAttack,
    /// The agent killed its target
    KilledTarget,
}

/// Shaping constants for combat outcomes and action triggers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardShaping {
    /// Killing the target
    pub kill: f32,
    /// Taking a hit
    pub got_hit: f32,
    /// Landing an attack
    pub attack_hit: f32,
    /// Attacking into nothing
    pub attack_miss: f32,
    /// Attack absorbed by the target's guard
    pub attack_blocked: f32,
    /// Starting an attack with the target in range
    pub attack_in_range: f32,
    /// Starting an attack with the target out of range
    pub attack_out_of_range: f32,
    /// Target's attack missed
    pub target_attack_missed: f32,
    /// Dodged the target's attack
    pub dodged_target_attack: f32,
    /// Finished a dodge
    pub dodge_completed: f32,
    /// Guarding with the target inside combat range but outside attack range
    pub guard_outside_attack_range: f32,
    /// Guarding with the target outside combat range
    pub guard_outside_combat_range: f32,
    /// Guarded the target's attack
    pub blocked_target_attack: f32,
    /// Healing below half health
    pub healed_at_low_health: f32,
    /// Healing above three quarters health
    pub healed_at_high_health: f32,
    /// Dying
    pub death: f32,
    /// Choosing to wait
    pub wait: f32,
    /// Trying to heal with no heal items left
    pub heal_with_no_potions: f32,
    /// Per-repeat penalty once the repeat threshold is exceeded
    pub repeated_action: f32,
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self {
            kill: 8.0,
            got_hit: -0.9,
            attack_hit: 1.5,
            attack_miss: -0.75,
            attack_blocked: -0.25,
            attack_in_range: 0.5,
            attack_out_of_range: -0.6,
            target_attack_missed: 0.5,
            dodged_target_attack: 1.15,
            dodge_completed: 0.01,
            guard_outside_attack_range: -0.1,
            guard_outside_combat_range: -1.5,
            blocked_target_attack: 0.75,
            healed_at_low_health: 1.0,
            healed_at_high_health: -0.5,
            death: -7.5,
            wait: -0.1,
            heal_with_no_potions: -2.0,
            repeated_action: -0.3,
        }
    }
}

impl RewardShaping {
    /// Reward for an environment outcome
    #[must_use]
    pub fn reward_for(&self, event: CombatEvent) -> f32 {
        match event {
            CombatEvent::GotHit => self.got_hit,
            CombatEvent::AttackHit => self.attack_hit,
            CombatEvent::AttackMissed => self.attack_miss,
            CombatEvent::AttackBlocked => self.attack_blocked,
            CombatEvent::TargetAttackMissed => self.target_attack_missed,
            CombatEvent::DodgedTargetAttack => self.dodged_target_attack,
            CombatEvent::BlockedTargetAttack => self.blocked_target_attack,
            CombatEvent::KilledTarget => self.kill,
        }
    }

    /// Escalating penalty for the `count`-th consecutive repeat
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn repeat_penalty(&self, count: u32) -> f32 {
        self.repeated_action * count as f32
    }
}
