//! Damage-absorbing shields (base Shield and the Fortress evolution).
//!
//! A shield holds a pool of absorb points. Damage at or above the current pool
//! breaks it: the excess passes through and a full recharge is scheduled.

use super::{ProjectileView, TickContext, VisualKind, WeaponOutput};

const SHIELD_BASE_CAPACITY: f32 = 20.0;
const SHIELD_CAPACITY_PER_LEVEL: f32 = 10.0;
const SHIELD_RECHARGE_DELAY: f64 = 5.0;

const FORTRESS_BASE_CAPACITY: f32 = 60.0;
const FORTRESS_CAPACITY_PER_LEVEL: f32 = 15.0;
const FORTRESS_RECHARGE_DELAY: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ShieldState {
    pub capacity: f32,
    pub current: f32,
    pub broken: bool,
    pub recharge_at: f64,
    recharge_delay: f64,
}

impl ShieldState {
    pub fn new(capacity: f32, recharge_delay: f64) -> Self {
        Self {
            capacity,
            current: capacity,
            broken: false,
            recharge_at: 0.0,
            recharge_delay,
        }
    }

    pub fn basic(level: u8) -> Self {
        Self::new(Self::basic_capacity(level), SHIELD_RECHARGE_DELAY)
    }

    pub fn fortress(level: u8) -> Self {
        Self::new(Self::fortress_capacity(level), FORTRESS_RECHARGE_DELAY)
    }

    pub fn basic_capacity(level: u8) -> f32 {
        SHIELD_BASE_CAPACITY + SHIELD_CAPACITY_PER_LEVEL * level.saturating_sub(1) as f32
    }

    pub fn fortress_capacity(level: u8) -> f32 {
        FORTRESS_BASE_CAPACITY + FORTRESS_CAPACITY_PER_LEVEL * level.saturating_sub(1) as f32
    }

    /// Level-up: raise the pool by the capacity gained.
    pub fn set_capacity(&mut self, capacity: f32) {
        let gained = capacity - self.capacity;
        self.capacity = capacity;
        if !self.broken {
            self.current = (self.current + gained).clamp(0.0, capacity);
        }
    }

    /// Restore the pool once the recharge time has passed.
    pub fn refresh(&mut self, now: f64) {
        if self.broken && now >= self.recharge_at {
            self.broken = false;
            self.current = self.capacity;
        }
    }

    /// Absorb as much of `damage` as possible; return the overflow.
    pub fn absorb(&mut self, damage: f32, now: f64) -> f32 {
        self.refresh(now);
        if self.broken || damage <= 0.0 {
            return damage.max(0.0);
        }
        if damage >= self.current {
            let overflow = damage - self.current;
            self.current = 0.0;
            self.broken = true;
            self.recharge_at = now + self.recharge_delay;
            overflow
        } else {
            self.current -= damage;
            0.0
        }
    }

    pub fn is_up(&self) -> bool {
        !self.broken && self.current > 0.0
    }

    pub(super) fn update(&mut self, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.refresh(ctx.now);
        if self.is_up() {
            out.projectiles.push(ProjectileView::circle(
                VisualKind::Shield,
                ctx.owner.id,
                ctx.owner.pos,
                ctx.owner.radius + 8.0,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_absorb() {
        let mut s = ShieldState::basic(1);
        assert_eq!(s.absorb(8.0, 0.0), 0.0);
        assert!((s.current - 12.0).abs() < 1e-6);
        assert!(!s.broken);
    }

    #[test]
    fn test_break_passes_overflow_and_schedules_recharge() {
        let mut s = ShieldState::basic(1);
        let overflow = s.absorb(25.0, 10.0);
        assert!((overflow - 5.0).abs() < 1e-6);
        assert!(s.broken);
        assert_eq!(s.recharge_at, 15.0);

        // Broken shield absorbs nothing
        assert_eq!(s.absorb(3.0, 12.0), 3.0);

        s.refresh(15.0);
        assert!(!s.broken);
        assert_eq!(s.current, s.capacity);
    }

    #[test]
    fn test_exact_hit_breaks() {
        let mut s = ShieldState::basic(1);
        assert_eq!(s.absorb(20.0, 0.0), 0.0);
        assert!(s.broken);
    }

    #[test]
    fn test_capacity_scales_with_level() {
        assert_eq!(ShieldState::basic_capacity(1), 20.0);
        assert_eq!(ShieldState::basic_capacity(3), 40.0);
        assert_eq!(ShieldState::fortress_capacity(2), 75.0);

        let mut s = ShieldState::basic(1);
        s.absorb(5.0, 0.0);
        s.set_capacity(ShieldState::basic_capacity(2));
        assert!((s.current - 25.0).abs() < 1e-6);
    }
}
