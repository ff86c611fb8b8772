//! Bot controller: synthetic players driven by a small state machine.
//!
//! Bots produce the same inputs a client would (`angle`, `moving`, level-up
//! choice, respawn); the room applies them through its normal input path.
//! Decisions are re-evaluated on a short randomized countdown rather than
//! every tick.

use glam::Vec2;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, TAU};

use crate::constants::{
    BOT_CENTER_AVOID_RADIUS, BOT_COLLECT_RADIUS, BOT_DECISION_MAX_SECS, BOT_DECISION_MIN_SECS,
    BOT_EDGE_MARGIN, BOT_FARM_RADIUS, BOT_FLEE_HP_RATIO, BOT_HUNT_ABANDON_RADIUS,
    BOT_HUNT_HP_RATIO, BOT_HUNT_RADIUS, BOT_MELEE_RANGE, BOT_ROAM_MOVE_CHANCE, BOT_THREAT_RADIUS,
};
use crate::entities::{Player, PlayerId};
use crate::geometry::{angle_to, distance, distance_sq};
use crate::progression::LevelUpOption;

/// Seconds a dead bot waits before asking to respawn
pub const BOT_RESPAWN_DELAY: f64 = 3.0;

const BOT_NAMES: [&str; 16] = [
    "Nova", "Vex", "Orbital", "Kite", "Rook", "Pulse", "Ember", "Drift", "Quill", "Static",
    "Halo", "Flux", "Moth", "Cinder", "Glitch", "Sable",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Roam,
    Farm,
    Hunt(PlayerId),
    Flee,
    Collect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    Aggressive,
    Cautious,
    Balanced,
}

impl Personality {
    fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..3) {
            0 => Personality::Aggressive,
            1 => Personality::Cautious,
            _ => Personality::Balanced,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotBrain {
    pub state: BotState,
    pub personality: Personality,
    decision_timer: f32,
    angle: f32,
    moving: bool,
    dead_since: Option<f64>,
}

impl BotBrain {
    pub fn new(personality: Personality) -> Self {
        Self {
            state: BotState::Roam,
            personality,
            decision_timer: 0.0,
            angle: 0.0,
            moving: true,
            dead_since: None,
        }
    }
}

/// What a bot can see of another player.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSight {
    pub id: PlayerId,
    pub pos: Vec2,
    pub hp_ratio: f32,
    pub alive: bool,
}

/// Read-only world slice handed to the controller each tick.
#[derive(Debug, Clone, Default)]
pub struct BotWorld {
    pub players: Vec<PlayerSight>,
    pub mobs: Vec<Vec2>,
    pub orbs: Vec<Vec2>,
    pub map_size: f32,
}

impl BotWorld {
    fn center(&self) -> Vec2 {
        Vec2::splat(self.map_size / 2.0)
    }

    fn nearest_within(points: &[Vec2], from: Vec2, radius: f32) -> Option<Vec2> {
        let r_sq = radius * radius;
        points
            .iter()
            .copied()
            .filter(|p| distance_sq(from, *p) <= r_sq)
            .min_by(|a, b| distance_sq(from, *a).total_cmp(&distance_sq(from, *b)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BotAction {
    Input { angle: f32, moving: bool },
    Respawn,
}

#[derive(Debug, Clone, Default)]
pub struct BotController {
    brains: BTreeMap<PlayerId, BotBrain>,
}

impl BotController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<R: Rng + ?Sized>(&mut self, id: PlayerId, rng: &mut R) {
        self.brains.insert(id, BotBrain::new(Personality::roll(rng)));
    }

    pub fn add_with(&mut self, id: PlayerId, personality: Personality) {
        self.brains.insert(id, BotBrain::new(personality));
    }

    pub fn remove(&mut self, id: PlayerId) {
        self.brains.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }

    pub fn brain(&self, id: PlayerId) -> Option<&BotBrain> {
        self.brains.get(&id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.brains.keys().copied().collect()
    }

    /// Pick a display name not already in use.
    pub fn pick_name<R: Rng + ?Sized>(taken: &[&str], rng: &mut R) -> String {
        let free: Vec<&&str> = BOT_NAMES.iter().filter(|n| !taken.contains(n)).collect();
        match free.choose(rng) {
            Some(name) => name.to_string(),
            None => format!("Bot{}", rng.gen_range(100..1000)),
        }
    }

    /// One decision pass over every bot. Returns the inputs to apply.
    pub fn think<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        now: f64,
        bots: &BTreeMap<PlayerId, Player>,
        world: &BotWorld,
        rng: &mut R,
    ) -> Vec<(PlayerId, BotAction)> {
        let mut actions = Vec::new();
        for (id, brain) in self.brains.iter_mut() {
            let Some(me) = bots.get(id) else {
                continue;
            };
            if !me.alive {
                let since = *brain.dead_since.get_or_insert(now);
                if now - since >= BOT_RESPAWN_DELAY {
                    brain.dead_since = None;
                    actions.push((*id, BotAction::Respawn));
                }
                continue;
            }
            brain.dead_since = None;

            brain.decision_timer -= dt;
            if brain.decision_timer <= 0.0 {
                brain.decision_timer = rng.gen_range(BOT_DECISION_MIN_SECS..=BOT_DECISION_MAX_SECS);
                decide(brain, me, world, rng);
            }
            actions.push((
                *id,
                BotAction::Input {
                    angle: brain.angle,
                    moving: brain.moving,
                },
            ));
        }
        actions
    }
}

/// Re-evaluate state and steering for one bot.
pub fn decide<R: Rng + ?Sized>(brain: &mut BotBrain, me: &Player, world: &BotWorld, rng: &mut R) {
    let pos = me.pos;
    brain.moving = true;

    // Flee
    if me.hp_ratio() < BOT_FLEE_HP_RATIO {
        brain.state = BotState::Flee;
        let threats: Vec<Vec2> = world
            .mobs
            .iter()
            .copied()
            .chain(
                world
                    .players
                    .iter()
                    .filter(|p| p.alive && p.id != me.id)
                    .map(|p| p.pos),
            )
            .collect();
        brain.angle = match BotWorld::nearest_within(&threats, pos, BOT_THREAT_RADIUS) {
            Some(t) => (pos.y - t.y).atan2(pos.x - t.x),
            None => rng.gen_range(0.0..TAU),
        };
        return;
    }

    // Collect
    if let Some(orb) = BotWorld::nearest_within(&world.orbs, pos, BOT_COLLECT_RADIUS) {
        brain.state = BotState::Collect;
        brain.angle = angle_to(pos, orb);
        return;
    }

    // Hunt
    if brain.personality == Personality::Aggressive {
        let current = match brain.state {
            BotState::Hunt(target) => world
                .players
                .iter()
                .find(|p| p.id == target && p.alive && distance(pos, p.pos) <= BOT_HUNT_ABANDON_RADIUS),
            _ => None,
        };
        let prey = current.or_else(|| {
            world
                .players
                .iter()
                .filter(|p| {
                    p.id != me.id
                        && p.alive
                        && p.hp_ratio < BOT_HUNT_HP_RATIO
                        && distance(pos, p.pos) < BOT_HUNT_RADIUS
                })
                .min_by(|a, b| distance_sq(pos, a.pos).total_cmp(&distance_sq(pos, b.pos)))
        });
        if let Some(prey) = prey {
            brain.state = BotState::Hunt(prey.id);
            brain.angle = angle_to(pos, prey.pos);
            return;
        }
    }

    // Farm
    if let Some(mob) = BotWorld::nearest_within(&world.mobs, pos, BOT_FARM_RADIUS) {
        brain.state = BotState::Farm;
        let toward = angle_to(pos, mob);
        brain.angle = if distance(pos, mob) > BOT_MELEE_RANGE {
            toward
        } else {
            toward + FRAC_PI_2
        };
        return;
    }

    // Roam
    brain.state = BotState::Roam;
    let center = world.center();
    let near_edge = pos.x < BOT_EDGE_MARGIN
        || pos.y < BOT_EDGE_MARGIN
        || pos.x > world.map_size - BOT_EDGE_MARGIN
        || pos.y > world.map_size - BOT_EDGE_MARGIN;
    brain.angle = if near_edge {
        angle_to(pos, center)
    } else if distance(pos, center) < BOT_CENTER_AVOID_RADIUS && pos != center {
        angle_to(center, pos)
    } else {
        rng.gen_range(0.0..TAU)
    };
    brain.moving = rng.gen_bool(BOT_ROAM_MOVE_CHANCE);
}

/// Level-up preference: evolution, then a new weapon while under three,
/// then upgrades, then passives, else random.
pub fn choose_option<R: Rng + ?Sized>(options: &[LevelUpOption], me: &Player, rng: &mut R) -> usize {
    let find = |want: fn(&LevelUpOption) -> bool| options.iter().position(|o| want(o));

    if let Some(i) = find(|o| matches!(o, LevelUpOption::Evolve { .. })) {
        return i;
    }
    if me.weapons.len() < 3 {
        if let Some(i) = find(|o| matches!(o, LevelUpOption::NewWeapon { .. })) {
            return i;
        }
    }
    if let Some(i) = find(|o| matches!(o, LevelUpOption::Upgrade { .. })) {
        return i;
    }
    if let Some(i) = find(|o| matches!(o, LevelUpOption::Passive { .. })) {
        return i;
    }
    if options.is_empty() {
        0
    } else {
        rng.gen_range(0..options.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passives::PassiveKind;
    use crate::weapons::WeaponKind;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(5)
    }

    fn bot_at(pos: Vec2) -> Player {
        Player::new(PlayerId(1), "bot", pos, 0.0, true)
    }

    fn world() -> BotWorld {
        BotWorld {
            map_size: 4000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_flee_steers_directly_away() {
        let mut me = bot_at(Vec2::new(1000.0, 1000.0));
        me.hp = 10;
        let threat = Vec2::new(1060.0, 1080.0);
        let w = BotWorld {
            mobs: vec![threat],
            ..world()
        };
        let mut brain = BotBrain::new(Personality::Balanced);
        decide(&mut brain, &me, &w, &mut rng());
        assert_eq!(brain.state, BotState::Flee);
        let expected = (me.pos.y - threat.y).atan2(me.pos.x - threat.x);
        assert!((brain.angle - expected).abs() < 1e-6);
    }

    #[test]
    fn test_collect_beats_farm() {
        let me = bot_at(Vec2::new(1000.0, 1000.0));
        let w = BotWorld {
            mobs: vec![Vec2::new(1100.0, 1000.0)],
            orbs: vec![Vec2::new(1000.0, 1100.0)],
            ..world()
        };
        let mut brain = BotBrain::new(Personality::Balanced);
        decide(&mut brain, &me, &w, &mut rng());
        assert_eq!(brain.state, BotState::Collect);
        assert!((brain.angle - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_aggressive_hunts_weak_player() {
        let me = bot_at(Vec2::new(1000.0, 1000.0));
        let w = BotWorld {
            players: vec![PlayerSight {
                id: PlayerId(9),
                pos: Vec2::new(1200.0, 1000.0),
                hp_ratio: 0.3,
                alive: true,
            }],
            ..world()
        };
        let mut brain = BotBrain::new(Personality::Aggressive);
        decide(&mut brain, &me, &w, &mut rng());
        assert_eq!(brain.state, BotState::Hunt(PlayerId(9)));

        let mut calm = BotBrain::new(Personality::Cautious);
        decide(&mut calm, &me, &w, &mut rng());
        assert_ne!(calm.state, BotState::Hunt(PlayerId(9)));
    }

    #[test]
    fn test_hunt_abandoned_when_far() {
        let me = bot_at(Vec2::new(1000.0, 1000.0));
        let mut brain = BotBrain::new(Personality::Aggressive);
        brain.state = BotState::Hunt(PlayerId(9));
        let w = BotWorld {
            players: vec![PlayerSight {
                id: PlayerId(9),
                pos: Vec2::new(1700.0, 1000.0),
                hp_ratio: 0.3,
                alive: true,
            }],
            ..world()
        };
        decide(&mut brain, &me, &w, &mut rng());
        assert_eq!(brain.state, BotState::Roam);
    }

    #[test]
    fn test_farm_orbits_inside_melee_range() {
        let me = bot_at(Vec2::new(1000.0, 1000.0));
        let w = BotWorld {
            mobs: vec![Vec2::new(1050.0, 1000.0)],
            ..world()
        };
        let mut brain = BotBrain::new(Personality::Balanced);
        decide(&mut brain, &me, &w, &mut rng());
        assert_eq!(brain.state, BotState::Farm);
        assert!((brain.angle - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_roam_turns_inward_at_edge() {
        let me = bot_at(Vec2::new(50.0, 2000.0));
        let mut brain = BotBrain::new(Personality::Balanced);
        decide(&mut brain, &me, &world(), &mut rng());
        assert_eq!(brain.state, BotState::Roam);
        assert!(brain.angle.abs() < 1e-5);
    }

    #[test]
    fn test_roam_leaves_center() {
        let me = bot_at(Vec2::new(2050.0, 2000.0));
        let mut brain = BotBrain::new(Personality::Balanced);
        decide(&mut brain, &me, &world(), &mut rng());
        assert!(brain.angle.abs() < 1e-5);
    }

    #[test]
    fn test_dead_bot_respawns_after_delay() {
        let mut ctl = BotController::new();
        let mut me = bot_at(Vec2::new(1000.0, 1000.0));
        me.alive = false;
        ctl.add_with(me.id, Personality::Balanced);
        let bots: BTreeMap<_, _> = [(me.id, me)].into_iter().collect();
        let mut r = rng();
        assert!(ctl.think(0.1, 10.0, &bots, &world(), &mut r).is_empty());
        let later = ctl.think(0.1, 13.0, &bots, &world(), &mut r);
        assert_eq!(later, vec![(PlayerId(1), BotAction::Respawn)]);
    }

    #[test]
    fn test_choice_priority() {
        let mut r = rng();
        let me = bot_at(Vec2::ZERO);
        let options = [
            LevelUpOption::Passive {
                passive: PassiveKind::Might,
                level: 1,
            },
            LevelUpOption::Upgrade {
                weapon: WeaponKind::Orbit,
                level: 2,
            },
            LevelUpOption::NewWeapon {
                weapon: WeaponKind::Laser,
            },
        ];
        // Two weapons owned: a third is preferred
        assert_eq!(choose_option(&options, &me, &mut r), 2);

        let evo = [
            LevelUpOption::Heal,
            LevelUpOption::Evolve {
                weapon: WeaponKind::Railgun,
            },
        ];
        assert_eq!(choose_option(&evo, &me, &mut r), 1);
        assert_eq!(choose_option(&options[..2], &me, &mut r), 1);
    }

    #[test]
    fn test_pick_name_avoids_taken() {
        let mut r = rng();
        let taken: Vec<&str> = BOT_NAMES[..15].to_vec();
        assert_eq!(BotController::pick_name(&taken, &mut r), "Sable");
    }
}
