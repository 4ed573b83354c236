//! Live observation that the decision cycle snapshots into [`State`]s

use tracing::trace;

use crate::environment::{CombatHost, TargetStatus};
use crate::state::quantize_percent;
use crate::{State, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TrackerTimer {
    HitRecently,
}

/// Mutable "current" state, updated by collaborator callbacks and periodic
/// re-sampling of the host.
///
/// The hit-recency flag clears itself once `hit_recently_duration` seconds
/// of tick time pass without another hit.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: State,
    hit_recently_duration: f32,
    timers: Timers<TrackerTimer>,
}

impl StateTracker {
    /// Create a tracker starting from the zero state
    #[must_use]
    pub fn new(hit_recently_duration: f32) -> Self {
        Self {
            current: State::default(),
            hit_recently_duration,
            timers: Timers::new(),
        }
    }

    /// Copy of the live state
    #[must_use]
    pub fn current(&self) -> State {
        self.current
    }

    /// Update the target-derived fields. `target_health` is a fraction.
    pub fn update_from_target(
        &mut self,
        target_health: f32,
        attacking: bool,
        guarding: bool,
        dodging: bool,
    ) {
        self.current.target_health_percent = quantize_percent(target_health);
        self.current.target_attacking = attacking;
        self.current.target_guarding = guarding;
        self.current.target_dodging = dodging;
    }

    /// Update own health (a fraction) and heal items
    pub fn update_self(&mut self, health: f32, heals_left: u32) {
        self.current.health_percent = quantize_percent(health);
        self.current.heals_left = u8::try_from(heals_left).unwrap_or(u8::MAX);
    }

    /// Update the attack-range flag
    pub fn update_distance(&mut self, in_range: bool) {
        self.current.in_attack_range = in_range;
    }

    /// Set the hit-recency flag and restart its clear timer
    pub fn mark_hit_recently(&mut self) {
        self.current.was_hit_recently = true;
        self.timers
            .set(TrackerTimer::HitRecently, self.hit_recently_duration);
    }

    /// Advance the tracker's timers by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        for fired in self.timers.advance(dt) {
            match fired {
                TrackerTimer::HitRecently => {
                    trace!("hit-recency window elapsed");
                    self.current.was_hit_recently = false;
                }
            }
        }
    }

    /// Re-sample target, self and distance from the host and return the
    /// resulting snapshot. Target fields keep their last value while the
    /// host reports no target.
    pub fn sample(&mut self, host: &dyn CombatHost, attack_radius: f32) -> State {
        if let Some(TargetStatus {
            health,
            attacking,
            guarding,
            dodging,
        }) = host.target_status()
        {
            self.update_from_target(health, attacking, guarding, dodging);
        }

        let own = host.self_status();
        self.update_self(own.health, own.heals_left);

        if let Some(distance) = host.distance_to_target() {
            self.update_distance(distance < attack_radius);
        }

        self.current
    }

    /// Cancel the hit-recency timer
    pub fn cancel_timers(&mut self) {
        self.timers.clear();
    }
}
