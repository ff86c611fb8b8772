//! Mob population and per-mob AI.
//!
//! Mobs chase the nearest living player inside the chase radius and wander
//! otherwise. A timed spawner tops the population back up toward the target
//! count, never placing a mob inside the safe zone or next to a player.

use glam::Vec2;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

use crate::constants::{
    MOB_CHASE_RADIUS, MOB_CONTACT_COOLDOWN, MOB_SPAWN_ATTEMPTS, MOB_SPAWN_BATCH,
    MOB_SPAWN_INTERVAL, MOB_SPAWN_MIN_PLAYER_DIST, MOB_WANDER_MAX_SECS, MOB_WANDER_MIN_SECS,
    TIME_EPSILON,
};
use crate::entities::{IdAllocator, Mob, MobId, MobKind, MobState, PlayerId};
use crate::geometry::{clamp_to_map, distance_sq, heading, in_safe_zone};

/// Wandering mobs move at this fraction of their speed
const WANDER_SPEED_FACTOR: f32 = 0.5;

/// Spawn margin from the map edge
const SPAWN_EDGE_MARGIN: f32 = 50.0;

#[derive(Debug, Clone, Default)]
pub struct MobManager {
    mobs: BTreeMap<MobId, Mob>,
    spawn_timer: f64,
    contact: HashMap<(MobId, PlayerId), f64>,
}

impl MobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mobs.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.mobs.values().filter(|m| m.is_alive()).count()
    }

    pub fn get(&self, id: MobId) -> Option<&Mob> {
        self.mobs.get(&id)
    }

    pub fn get_mut(&mut self, id: MobId) -> Option<&mut Mob> {
        self.mobs.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Mob> {
        self.mobs.values_mut()
    }

    pub fn insert(&mut self, mob: Mob) {
        self.mobs.insert(mob.id, mob);
    }

    /// Steer every live mob. `targets` are the living players' positions.
    pub fn update_ai<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        targets: &[(PlayerId, Vec2)],
        map_size: f32,
        rng: &mut R,
    ) {
        let chase_sq = MOB_CHASE_RADIUS * MOB_CHASE_RADIUS;
        for mob in self.mobs.values_mut().filter(|m| m.is_alive()) {
            let nearest = targets
                .iter()
                .map(|(id, pos)| (*id, *pos, distance_sq(mob.pos, *pos)))
                .filter(|(_, _, d)| *d <= chase_sq)
                .min_by(|a, b| a.2.total_cmp(&b.2));

            match nearest {
                Some((id, pos, _)) => {
                    mob.state = MobState::Chase(id);
                    let dir = (pos - mob.pos).normalize_or_zero();
                    mob.pos += dir * mob.speed * dt;
                }
                None => {
                    mob.state = MobState::Wander;
                    mob.wander_timer -= dt as f64;
                    if mob.wander_timer <= 0.0 {
                        mob.wander_angle = rng.gen_range(0.0..std::f32::consts::TAU);
                        mob.wander_timer = rng.gen_range(MOB_WANDER_MIN_SECS..=MOB_WANDER_MAX_SECS);
                    }
                    mob.pos += heading(mob.wander_angle) * mob.speed * WANDER_SPEED_FACTOR * dt;
                }
            }
            mob.pos = clamp_to_map(mob.pos, map_size, mob.radius);
        }
    }

    /// Run the spawner. Returns the number of mobs created.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        target_count: usize,
        players: &[(PlayerId, Vec2)],
        map_size: f32,
        safe_zone_radius: f32,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> usize {
        self.spawn_timer -= dt;
        if self.spawn_timer > 0.0 {
            return 0;
        }
        self.spawn_timer = MOB_SPAWN_INTERVAL;

        let missing = target_count.saturating_sub(self.live_count());
        let center = Vec2::splat(map_size / 2.0);
        let mut spawned = 0;
        for _ in 0..missing.min(MOB_SPAWN_BATCH) {
            if let Some(pos) = find_spawn_point(players, map_size, center, safe_zone_radius, rng) {
                let kind = MobKind::roll(rng);
                self.insert(Mob::new(ids.mob(), kind, pos));
                spawned += 1;
            }
        }
        spawned
    }

    /// Whether a (mob, player) pair may deal contact damage now; records it if so.
    pub fn contact_ready(&mut self, mob: MobId, player: PlayerId, now: f64) -> bool {
        match self.contact.get(&(mob, player)) {
            Some(t) if now - t + TIME_EPSILON < MOB_CONTACT_COOLDOWN => false,
            _ => {
                self.contact.insert((mob, player), now);
                true
            }
        }
    }

    /// Drop dead mobs and stale contact cooldowns. Returns the removed ids.
    pub fn remove_dead(&mut self, now: f64) -> Vec<MobId> {
        let dead: Vec<MobId> = self
            .mobs
            .values()
            .filter(|m| !m.is_alive())
            .map(|m| m.id)
            .collect();
        for id in &dead {
            self.mobs.remove(id);
        }
        let mobs = &self.mobs;
        self.contact
            .retain(|(m, _), t| mobs.contains_key(m) && now - *t < MOB_CONTACT_COOLDOWN);
        dead
    }

    pub fn forget_player(&mut self, player: PlayerId) {
        self.contact.retain(|(_, p), _| *p != player);
    }
}

fn find_spawn_point<R: Rng + ?Sized>(
    players: &[(PlayerId, Vec2)],
    map_size: f32,
    center: Vec2,
    safe_zone_radius: f32,
    rng: &mut R,
) -> Option<Vec2> {
    let hi = (map_size - SPAWN_EDGE_MARGIN).max(SPAWN_EDGE_MARGIN + 1.0);
    let min_sq = MOB_SPAWN_MIN_PLAYER_DIST * MOB_SPAWN_MIN_PLAYER_DIST;
    for _ in 0..MOB_SPAWN_ATTEMPTS {
        let p = Vec2::new(
            rng.gen_range(SPAWN_EDGE_MARGIN..hi),
            rng.gen_range(SPAWN_EDGE_MARGIN..hi),
        );
        if in_safe_zone(p, center, safe_zone_radius) {
            continue;
        }
        if players.iter().any(|(_, pos)| distance_sq(p, *pos) < min_sq) {
            continue;
        }
        return Some(p);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(11)
    }

    #[test]
    fn test_mob_chases_nearest_player() {
        let mut mgr = MobManager::new();
        let mut ids = IdAllocator::default();
        let id = ids.mob();
        mgr.insert(Mob::new(id, MobKind::Crawler, Vec2::new(1000.0, 1000.0)));
        let players = [
            (PlayerId(1), Vec2::new(1200.0, 1000.0)),
            (PlayerId(2), Vec2::new(1000.0, 1350.0)),
        ];
        mgr.update_ai(1.0, &players, 4000.0, &mut rng());
        let mob = mgr.get(id).unwrap();
        assert_eq!(mob.state, MobState::Chase(PlayerId(1)));
        assert!((mob.pos.x - 1070.0).abs() < 1e-3);
    }

    #[test]
    fn test_mob_wanders_when_alone() {
        let mut mgr = MobManager::new();
        let mut ids = IdAllocator::default();
        let id = ids.mob();
        mgr.insert(Mob::new(id, MobKind::Brute, Vec2::new(1000.0, 1000.0)));
        let far = [(PlayerId(1), Vec2::new(3000.0, 3000.0))];
        mgr.update_ai(1.0, &far, 4000.0, &mut rng());
        let mob = mgr.get(id).unwrap();
        assert_eq!(mob.state, MobState::Wander);
        let moved = mob.pos.distance(Vec2::new(1000.0, 1000.0));
        assert!((moved - 22.5).abs() < 1e-2);
        assert!(mob.wander_timer >= MOB_WANDER_MIN_SECS);
    }

    #[test]
    fn test_spawner_respects_batch_and_distance() {
        let mut mgr = MobManager::new();
        let mut ids = IdAllocator::default();
        let mut r = rng();
        let players = [(PlayerId(1), Vec2::new(500.0, 500.0))];
        let n = mgr.spawn(0.5, 100, &players, 4000.0, 300.0, &mut ids, &mut r);
        assert!(n <= MOB_SPAWN_BATCH);
        assert!(n > 0);
        let center = Vec2::splat(2000.0);
        for m in mgr.iter() {
            assert!(m.pos.distance(players[0].1) >= MOB_SPAWN_MIN_PLAYER_DIST);
            assert!(!in_safe_zone(m.pos, center, 300.0));
        }
        // Timer just reset: nothing until the interval elapses
        assert_eq!(mgr.spawn(0.1, 100, &players, 4000.0, 300.0, &mut ids, &mut r), 0);
    }

    #[test]
    fn test_spawner_stops_at_target() {
        let mut mgr = MobManager::new();
        let mut ids = IdAllocator::default();
        let mut r = rng();
        for _ in 0..10 {
            mgr.spawn(1.0, 4, &[], 4000.0, 300.0, &mut ids, &mut r);
        }
        assert_eq!(mgr.live_count(), 4);
    }

    #[test]
    fn test_contact_cooldown() {
        let mut mgr = MobManager::new();
        let (m, p) = (MobId(1), PlayerId(2));
        assert!(mgr.contact_ready(m, p, 0.0));
        assert!(!mgr.contact_ready(m, p, 0.5));
        assert!(mgr.contact_ready(m, p, 0.6));
    }

    #[test]
    fn test_contact_cooldown_with_tick_drift() {
        let mut mgr = MobManager::new();
        let (m, p) = (MobId(1), PlayerId(2));
        let mut now = 0.1_f64;
        assert!(mgr.contact_ready(m, p, now));
        for _ in 0..17 {
            now += 1.0 / 30.0;
            assert!(!mgr.contact_ready(m, p, now));
        }
        now += 1.0 / 30.0;
        assert!(mgr.contact_ready(m, p, now));
    }

    #[test]
    fn test_remove_dead_clears_contacts() {
        let mut mgr = MobManager::new();
        let mut ids = IdAllocator::default();
        let id = ids.mob();
        mgr.insert(Mob::new(id, MobKind::Crawler, Vec2::ZERO));
        mgr.contact_ready(id, PlayerId(1), 0.0);
        mgr.get_mut(id).unwrap().take_damage(100, PlayerId(1));
        assert_eq!(mgr.remove_dead(0.1), vec![id]);
        assert!(mgr.is_empty());
        // Cooldown entry went with the mob
        assert!(mgr.contact_ready(id, PlayerId(1), 0.2));
    }
}
