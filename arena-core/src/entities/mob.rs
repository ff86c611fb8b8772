//! Neutral monsters.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{MobId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MobKind {
    Crawler,
    Wraith,
    Brute,
}

/// Fixed per-kind stat block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobStats {
    pub hp: i32,
    pub xp: u32,
    pub radius: f32,
    pub speed: f32,
    pub contact_damage: i32,
    pub spawn_weight: u32,
}

impl MobKind {
    pub const ALL: [MobKind; 3] = [MobKind::Crawler, MobKind::Wraith, MobKind::Brute];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Crawler => "Crawler",
            Self::Wraith => "Wraith",
            Self::Brute => "Brute",
        }
    }

    pub fn stats(&self) -> MobStats {
        match self {
            Self::Crawler => MobStats {
                hp: 20,
                xp: 2,
                radius: 12.0,
                speed: 70.0,
                contact_damage: 4,
                spawn_weight: 60,
            },
            Self::Wraith => MobStats {
                hp: 40,
                xp: 5,
                radius: 16.0,
                speed: 95.0,
                contact_damage: 7,
                spawn_weight: 28,
            },
            Self::Brute => MobStats {
                hp: 80,
                xp: 9,
                radius: 24.0,
                speed: 45.0,
                contact_damage: 12,
                spawn_weight: 12,
            },
        }
    }

    /// Weighted pick across all kinds.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let total: u32 = Self::ALL.iter().map(|k| k.stats().spawn_weight).sum();
        let mut pick = rng.gen_range(0..total);
        for kind in Self::ALL {
            let w = kind.stats().spawn_weight;
            if pick < w {
                return kind;
            }
            pick -= w;
        }
        MobKind::Crawler
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MobState {
    Wander,
    Chase(PlayerId),
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub id: MobId,
    pub kind: MobKind,
    pub pos: Vec2,
    pub hp: i32,
    pub max_hp: i32,
    pub radius: f32,
    pub speed: f32,
    pub contact_damage: i32,
    pub xp: u32,
    pub state: MobState,
    pub wander_angle: f32,
    /// Seconds until a new wander heading is picked
    pub wander_timer: f64,
    pub last_hit_by: Option<PlayerId>,
}

impl Mob {
    pub fn new(id: MobId, kind: MobKind, pos: Vec2) -> Self {
        let s = kind.stats();
        Self {
            id,
            kind,
            pos,
            hp: s.hp,
            max_hp: s.hp,
            radius: s.radius,
            speed: s.speed,
            contact_damage: s.contact_damage,
            xp: s.xp,
            state: MobState::Wander,
            wander_angle: 0.0,
            wander_timer: 0.0,
            last_hit_by: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Returns true if this hit killed the mob. Dead mobs ignore further hits.
    pub fn take_damage(&mut self, amount: i32, attacker: PlayerId) -> bool {
        if !self.is_alive() || amount <= 0 {
            return false;
        }
        self.hp = (self.hp - amount).max(0);
        self.last_hit_by = Some(attacker);
        self.hp == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_crawler_two_bullets() {
        let mut m = Mob::new(MobId(1), MobKind::Crawler, Vec2::ZERO);
        assert!(!m.take_damage(15, PlayerId(1)));
        assert_eq!(m.hp, 5);
        assert!(m.take_damage(15, PlayerId(1)));
        assert_eq!(m.hp, 0);
        // Already dead: no second kill
        assert!(!m.take_damage(15, PlayerId(2)));
        assert_eq!(m.last_hit_by, Some(PlayerId(1)));
    }

    #[test]
    fn test_roll_distribution_favours_crawlers() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut counts = [0u32; 3];
        for _ in 0..10_000 {
            match MobKind::roll(&mut rng) {
                MobKind::Crawler => counts[0] += 1,
                MobKind::Wraith => counts[1] += 1,
                MobKind::Brute => counts[2] += 1,
            }
        }
        assert!(counts[0] > counts[1]);
        assert!(counts[1] > counts[2]);
        assert!(counts[2] > 0);
    }
}
