//! Room: one self-contained arena simulation.
//!
//! ```text
//! tick(dt)
//!   ├─ leaves            (disconnects removed, XP dropped as orbs)
//!   ├─ bots → inputs     (same path as client input)
//!   ├─ inputs / level-up choices / respawns
//!   ├─ movement, mob AI, mob spawner
//!   ├─ rebuild spatial grids
//!   ├─ weapons → hits    (applied centrally: shields → armor → hp)
//!   ├─ mob contact damage
//!   ├─ orbs: expiry, magnet, pickup → level-up offers
//!   ├─ sanitize, remove dead mobs, bot population
//!   └─ leaderboard / player count
//! ```
//!
//! The room is plain data owned by a single worker; nothing in here blocks or
//! does I/O. Outbound traffic is queued as [`RoomEvent`]s and drained by the
//! owner after each tick.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

pub mod snapshot;

use crate::bots::{self, BotAction, BotController, BotWorld, PlayerSight};
use crate::config::SimConfig;
use crate::constants::{
    DEATH_ORB_COUNT, DEATH_ORB_SCATTER, DEATH_XP_BASE, MAX_CHARACTER_LEVEL, MOB_KILL_SCORE,
    ORB_MAGNET_RADIUS, ORB_MAGNET_SPEED, ORB_MAX_RADIUS, PLAYER_KILL_SCORE, PLAYER_MAX_RADIUS,
    WEAPON_QUERY_RADIUS,
};
use crate::entities::{
    scatter, IdAllocator, Mob, MobId, MobKind, OrbId, Player, PlayerId, TargetRef, XpOrb,
    DEFAULT_COSMETIC,
};
use crate::error::SimError;
use crate::geometry::{circles_overlap, clamp_to_map, distance, heading, in_safe_zone};
use crate::messages::{ClientMessage, DeathStats, LeaderboardEntry, ServerMessage};
use crate::mobs::MobManager;
use crate::progression;
use crate::spatial::SpatialHash;
use crate::weapons::{mitigate, HitEvent, Owner, ProjectileView, PullEvent, Target, WeaponEngine};

use snapshot::{EntityView, GameState, MobView, OrbView, PlayerView, SnapshotEncoder, ViewMap};

/// Longest accepted display name (chars)
pub const MAX_NAME_LEN: usize = 16;

/// Live leaderboard size
pub const LEADERBOARD_SIZE: usize = 10;

/// Scatter radius for orbs dropped by mobs
const MOB_ORB_SCATTER: f32 = 12.0;

/// Keep spawn points this far from the walls
const SPAWN_MARGIN: f32 = 100.0;

/// XP dropped when a player dies or leaves.
pub fn death_drop(total_xp: u32) -> u32 {
    DEATH_XP_BASE + total_xp / 2
}

pub fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if name.is_empty() {
        "Player".to_string()
    } else {
        name
    }
}

// ============================================================================
// Events and reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Player(PlayerId),
}

/// Output queued by the room for its owner to deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Send { to: Recipient, msg: ServerMessage },
    /// Final score for the persistent leaderboard
    RecordScore { name: String, score: u32, level: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSource {
    Player(PlayerId),
    Mob(MobKind),
}

/// Counters for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub dt: f64,
    pub hits: usize,
    pub mob_kills: usize,
    pub player_kills: usize,
    pub mobs_spawned: usize,
    pub players: usize,
    pub bots: usize,
    pub mobs: usize,
    pub orbs: usize,
}

#[derive(Debug, Default)]
struct PendingInputs {
    moves: BTreeMap<PlayerId, (f32, bool)>,
    choices: BTreeMap<PlayerId, usize>,
    respawns: BTreeSet<PlayerId>,
    leaves: Vec<PlayerId>,
}

// ============================================================================
// Room
// ============================================================================

pub struct Room {
    id: String,
    config: SimConfig,
    rng: Xoshiro256PlusPlus,
    ids: IdAllocator,
    now: f64,
    tick_count: u64,

    players: BTreeMap<PlayerId, Player>,
    engines: HashMap<PlayerId, WeaponEngine>,
    mobs: MobManager,
    orbs: BTreeMap<OrbId, XpOrb>,
    bots: BotController,

    target_grid: SpatialHash<TargetRef>,
    orb_grid: SpatialHash<OrbId>,

    pending: PendingInputs,
    events: Vec<RoomEvent>,
    projectiles: Vec<ProjectileView>,
    report: TickReport,

    leaderboard_timer: f64,
    last_player_count: Option<usize>,
    encoder: SnapshotEncoder,
}

impl Room {
    pub fn new(id: impl Into<String>, config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::seed_from_u64(rand::random()),
        };
        let encoder = SnapshotEncoder::new(config.full_snapshot_every);
        Self {
            id: id.into(),
            config,
            rng,
            ids: IdAllocator::default(),
            now: 0.0,
            tick_count: 0,
            players: BTreeMap::new(),
            engines: HashMap::new(),
            mobs: MobManager::new(),
            orbs: BTreeMap::new(),
            bots: BotController::new(),
            target_grid: SpatialHash::default(),
            orb_grid: SpatialHash::default(),
            pending: PendingInputs::default(),
            events: Vec::new(),
            projectiles: Vec::new(),
            report: TickReport::default(),
            leaderboard_timer: 0.0,
            last_player_count: None,
            encoder,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_bot).count()
    }

    pub fn bot_count(&self) -> usize {
        self.players.values().filter(|p| p.is_bot).count()
    }

    pub fn mobs(&self) -> &MobManager {
        &self.mobs
    }

    pub fn orbs(&self) -> impl Iterator<Item = &XpOrb> {
        self.orbs.values()
    }

    pub fn orb_count(&self) -> usize {
        self.orbs.len()
    }

    pub fn engine(&self, id: PlayerId) -> Option<&WeaponEngine> {
        self.engines.get(&id)
    }

    pub fn projectiles(&self) -> &[ProjectileView] {
        &self.projectiles
    }

    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn spawn_mob(&mut self, kind: MobKind, pos: Vec2) -> MobId {
        let id = self.ids.mob();
        self.mobs.insert(Mob::new(id, kind, pos));
        id
    }

    pub fn spawn_orb(&mut self, pos: Vec2, amount: u32) -> OrbId {
        let id = self.ids.orb();
        self.orbs.insert(id, XpOrb::new(id, pos, amount));
        id
    }

    fn center(&self) -> Vec2 {
        self.config.map_center()
    }

    fn random_spawn_point(&mut self) -> Vec2 {
        let hi = (self.config.map_size - SPAWN_MARGIN).max(SPAWN_MARGIN + 1.0);
        Vec2::new(
            self.rng.gen_range(SPAWN_MARGIN..hi),
            self.rng.gen_range(SPAWN_MARGIN..hi),
        )
    }

    // ------------------------------------------------------------------------
    // Input surface
    // ------------------------------------------------------------------------

    /// Add a real player. Cosmetic ownership is resolved by the caller.
    pub fn join(&mut self, name: &str, cosmetic: Option<String>, account_id: Option<String>) -> PlayerId {
        let id = self.add_player(sanitize_name(name), false);
        if let Some(p) = self.players.get_mut(&id) {
            p.cosmetic = cosmetic.unwrap_or_else(|| DEFAULT_COSMETIC.to_string());
            p.account_id = account_id;
        }
        info!(room = %self.id, player = %id, "player joined");
        id
    }

    fn add_player(&mut self, name: String, is_bot: bool) -> PlayerId {
        let id = self.ids.player();
        let pos = self.random_spawn_point();
        self.players
            .insert(id, Player::new(id, name, pos, self.now, is_bot));
        self.engines.insert(id, WeaponEngine::new());
        id
    }

    pub fn joined_message(&self, id: PlayerId) -> ServerMessage {
        ServerMessage::Joined {
            player_id: id,
            room: self.id.clone(),
            map_size: self.config.map_size,
            safe_zone_radius: self.config.safe_zone_radius,
        }
    }

    /// Queue removal for the start of the next tick.
    pub fn leave(&mut self, id: PlayerId) {
        self.pending.leaves.push(id);
    }

    pub fn handle_input(&mut self, id: PlayerId, angle: f32, moving: bool) {
        if !angle.is_finite() {
            debug!(room = %self.id, player = %id, "dropping non-finite input");
            return;
        }
        if self.players.contains_key(&id) {
            self.pending.moves.insert(id, (angle, moving));
        }
    }

    pub fn handle_level_up(&mut self, id: PlayerId, choice_index: usize) {
        if self.players.contains_key(&id) {
            self.pending.choices.insert(id, choice_index);
        }
    }

    pub fn handle_respawn(&mut self, id: PlayerId) {
        if self.players.contains_key(&id) {
            self.pending.respawns.insert(id);
        }
    }

    pub fn handle_message(&mut self, id: PlayerId, msg: ClientMessage) {
        match msg {
            ClientMessage::Input { angle, moving } => self.handle_input(id, angle, moving),
            ClientMessage::LevelUp { choice_index } => self.handle_level_up(id, choice_index),
            ClientMessage::Respawn => self.handle_respawn(id),
            ClientMessage::Join { .. } => {
                debug!(room = %self.id, player = %id, "ignoring join from joined player");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    pub fn tick(&mut self, dt: f64) -> Result<TickReport, SimError> {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.config.max_dt)
        } else {
            0.0
        };
        let dtf = dt as f32;
        self.now += dt;
        self.tick_count += 1;
        self.report = TickReport {
            tick: self.tick_count,
            dt,
            ..TickReport::default()
        };
        self.projectiles.clear();

        self.apply_leaves();
        self.run_bots(dtf);
        self.apply_pending();

        self.move_players(dtf);
        self.update_mobs(dt);
        self.rebuild_grids();
        self.run_weapons(dtf);
        self.resolve_contacts();
        self.update_orbs(dtf);
        self.offer_level_ups();

        let fault = self.sanitize();
        self.mobs.remove_dead(self.now);
        self.maintain_bots();
        self.update_leaderboard(dt);

        self.report.players = self.players.len();
        self.report.bots = self.bot_count();
        self.report.mobs = self.mobs.len();
        self.report.orbs = self.orbs.len();

        match fault {
            Some(entity) => Err(SimError::NonFiniteState { entity }),
            None => Ok(self.report.clone()),
        }
    }

    fn apply_leaves(&mut self) {
        let leaves = std::mem::take(&mut self.pending.leaves);
        for id in leaves {
            if self.remove_player(id) {
                info!(room = %self.id, player = %id, "player left");
            }
        }
    }

    /// Remove a player immediately, dropping their XP if alive.
    fn remove_player(&mut self, id: PlayerId) -> bool {
        let Some(p) = self.players.remove(&id) else {
            return false;
        };
        if p.alive {
            let orbs = scatter(
                &mut self.ids,
                &mut self.rng,
                p.pos,
                death_drop(p.total_xp),
                DEATH_ORB_COUNT,
                DEATH_ORB_SCATTER,
                self.config.map_size,
            );
            for o in orbs {
                self.orbs.insert(o.id, o);
            }
        }
        self.engines.remove(&id);
        self.bots.remove(id);
        self.mobs.forget_player(id);
        self.pending.moves.remove(&id);
        self.pending.choices.remove(&id);
        self.pending.respawns.remove(&id);
        true
    }

    fn run_bots(&mut self, dt: f32) {
        if self.bots.is_empty() {
            return;
        }
        let world = BotWorld {
            players: self
                .players
                .values()
                .map(|p| PlayerSight {
                    id: p.id,
                    pos: p.pos,
                    hp_ratio: p.hp_ratio(),
                    alive: p.alive,
                })
                .collect(),
            mobs: self.mobs.iter().filter(|m| m.is_alive()).map(|m| m.pos).collect(),
            orbs: self.orbs.values().map(|o| o.pos).collect(),
            map_size: self.config.map_size,
        };
        let actions = self
            .bots
            .think(dt, self.now, &self.players, &world, &mut self.rng);
        for (id, action) in actions {
            match action {
                BotAction::Input { angle, moving } => self.handle_input(id, angle, moving),
                BotAction::Respawn => self.handle_respawn(id),
            }
        }
    }

    fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (id, (angle, moving)) in pending.moves {
            if let Some(p) = self.players.get_mut(&id) {
                if p.alive {
                    p.angle = angle;
                    p.moving = moving;
                }
            }
        }
        for (id, index) in pending.choices {
            if let Some(p) = self.players.get_mut(&id) {
                match progression::choose(p, index) {
                    Some(option) => debug!(room = %self.id, player = %id, ?option, "level-up chosen"),
                    None => debug!(room = %self.id, player = %id, index, "ignoring level-up choice"),
                }
            }
        }
        for id in pending.respawns {
            self.respawn_player(id);
        }
    }

    fn respawn_player(&mut self, id: PlayerId) {
        if !self.players.get(&id).is_some_and(|p| !p.alive) {
            return;
        }
        let pos = self.random_spawn_point();
        let now = self.now;
        if let Some(p) = self.players.get_mut(&id) {
            p.respawn(pos, now);
        }
        if let Some(engine) = self.engines.get_mut(&id) {
            engine.reset();
        }
        debug!(room = %self.id, player = %id, "respawned");
    }

    fn move_players(&mut self, dt: f32) {
        let map_size = self.config.map_size;
        for p in self.players.values_mut().filter(|p| p.alive) {
            if p.moving {
                p.pos += heading(p.angle) * p.speed() * dt;
            }
            p.pos = clamp_to_map(p.pos, map_size, p.radius());
        }
    }

    fn living_positions(&self) -> Vec<(PlayerId, Vec2)> {
        self.players
            .values()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.pos))
            .collect()
    }

    fn update_mobs(&mut self, dt: f64) {
        let targets = self.living_positions();
        self.mobs
            .update_ai(dt as f32, &targets, self.config.map_size, &mut self.rng);
        self.report.mobs_spawned = self.mobs.spawn(
            dt,
            self.config.target_mobs,
            &targets,
            self.config.map_size,
            self.config.safe_zone_radius,
            &mut self.ids,
            &mut self.rng,
        );
    }

    fn rebuild_grids(&mut self) {
        self.target_grid.clear();
        for m in self.mobs.iter().filter(|m| m.is_alive()) {
            self.target_grid.insert(TargetRef::Mob(m.id), m.pos);
        }
        for p in self.players.values().filter(|p| p.alive) {
            self.target_grid.insert(TargetRef::Player(p.id), p.pos);
        }
        self.orb_grid.clear();
        for o in self.orbs.values() {
            self.orb_grid.insert(o.id, o.pos);
        }
    }

    // ------------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------------

    fn run_weapons(&mut self, dt: f32) {
        let shooters: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.alive && !p.is_paused())
            .map(|p| p.id)
            .collect();
        let mut near = Vec::new();

        for id in shooters {
            // May have died to an earlier shooter this tick
            let Some(p) = self.players.get(&id).filter(|p| p.alive) else {
                continue;
            };
            let stats = p.stats();
            let owner = Owner {
                id,
                pos: p.pos,
                angle: p.angle,
                radius: p.radius(),
                level: p.level,
                passives: stats,
            };
            let weapons = p.weapons.clone();

            near.clear();
            self.target_grid.query_into(
                owner.pos.x,
                owner.pos.y,
                WEAPON_QUERY_RADIUS * stats.area_mult,
                &mut near,
            );
            let mut mob_targets = Vec::new();
            let mut player_targets = Vec::new();
            for t in &near {
                match *t {
                    TargetRef::Mob(mid) => {
                        if let Some(m) = self.mobs.get(mid).filter(|m| m.is_alive()) {
                            mob_targets.push(Target {
                                target: *t,
                                pos: m.pos,
                                radius: m.radius,
                            });
                        }
                    }
                    TargetRef::Player(pid) if pid != id => {
                        if let Some(o) = self.players.get(&pid).filter(|o| o.alive) {
                            player_targets.push(Target {
                                target: *t,
                                pos: o.pos,
                                radius: o.radius(),
                            });
                        }
                    }
                    TargetRef::Player(_) => {}
                }
            }

            let engine = self.engines.entry(id).or_default();
            let out = engine.update(
                dt,
                &owner,
                &weapons,
                &mob_targets,
                &player_targets,
                self.now,
                &mut self.rng,
            );
            self.projectiles.extend(out.projectiles);
            for hit in &out.hits {
                if self.apply_hit(hit) {
                    self.report.hits += 1;
                }
            }
            for pull in &out.pulls {
                self.apply_pull(pull, dt);
            }
        }
    }

    /// Apply one weapon hit. Returns false if it was dropped (invalid damage,
    /// dead or immune target, safe zone).
    pub fn apply_hit(&mut self, hit: &HitEvent) -> bool {
        if !hit.damage.is_finite() || hit.damage <= 0.0 {
            return false;
        }
        match hit.target {
            TargetRef::Mob(mid) => {
                let Some(mob) = self.mobs.get_mut(mid).filter(|m| m.is_alive()) else {
                    return false;
                };
                if mob.take_damage(mitigate(hit.damage, 0.0), hit.attacker) {
                    self.on_mob_killed(mid, hit.attacker);
                }
                true
            }
            TargetRef::Player(pid) => {
                if pid == hit.attacker {
                    return false;
                }
                let center = self.center();
                let safe = self.config.safe_zone_radius;
                let attacker_safe = self
                    .players
                    .get(&hit.attacker)
                    .is_some_and(|a| in_safe_zone(a.pos, center, safe));
                let Some(victim) = self.players.get(&pid) else {
                    return false;
                };
                if !victim.alive || victim.is_immune(self.now) {
                    return false;
                }
                if attacker_safe || in_safe_zone(victim.pos, center, safe) {
                    return false;
                }
                self.damage_player(pid, hit.damage, KillSource::Player(hit.attacker))
            }
        }
    }

    /// Shields first (evolved, then base), then armor-rounded hp loss.
    fn damage_player(&mut self, pid: PlayerId, damage: f32, source: KillSource) -> bool {
        let Some(victim) = self.players.get_mut(&pid).filter(|p| p.alive) else {
            return false;
        };
        let engine = self.engines.entry(pid).or_default();
        engine.sync(&victim.weapons);
        let overflow = engine.absorb(damage, self.now);
        if overflow <= 0.0 {
            return true;
        }
        let hp_loss = mitigate(overflow, victim.stats().armor_reduction);
        if let KillSource::Player(attacker) = source {
            victim.last_attacker = Some(attacker);
        }
        if victim.take_damage(hp_loss) {
            self.on_player_killed(pid, source);
        }
        true
    }

    fn apply_pull(&mut self, pull: &PullEvent, dt: f32) {
        let step = |pos: Vec2| {
            let d = distance(pos, pull.toward);
            pos + (pull.toward - pos).normalize_or_zero() * (pull.speed * dt).min(d)
        };
        match pull.target {
            TargetRef::Mob(mid) => {
                if let Some(m) = self.mobs.get_mut(mid).filter(|m| m.is_alive()) {
                    m.pos = step(m.pos);
                }
            }
            TargetRef::Player(pid) => {
                let center = self.center();
                let safe = self.config.safe_zone_radius;
                if let Some(p) = self.players.get_mut(&pid).filter(|p| p.alive) {
                    if !p.is_immune(self.now) && !in_safe_zone(p.pos, center, safe) {
                        p.pos = step(p.pos);
                    }
                }
            }
        }
    }

    fn on_mob_killed(&mut self, mid: MobId, killer: PlayerId) {
        let Some(mob) = self.mobs.get(mid) else {
            return;
        };
        let (pos, xp) = (mob.pos, mob.xp);
        let pieces = self.rng.gen_range(1..=3);
        let map_size = self.config.map_size;
        for o in scatter(&mut self.ids, &mut self.rng, pos, xp, pieces, MOB_ORB_SCATTER, map_size) {
            self.orbs.insert(o.id, o);
        }
        if let Some(k) = self.players.get_mut(&killer) {
            k.mob_kills += 1;
            k.score += MOB_KILL_SCORE;
        }
        self.report.mob_kills += 1;
    }

    fn on_player_killed(&mut self, pid: PlayerId, source: KillSource) {
        let killer_name = match source {
            KillSource::Player(k) => match self.players.get_mut(&k) {
                Some(killer) => {
                    killer.kills += 1;
                    killer.score += PLAYER_KILL_SCORE;
                    killer.name.clone()
                }
                None => "unknown".to_string(),
            },
            KillSource::Mob(kind) => kind.name().to_string(),
        };

        let now = self.now;
        let Some(v) = self.players.get_mut(&pid) else {
            return;
        };
        v.alive = false;
        v.hp = 0;
        v.moving = false;
        v.pending_options = None;
        v.queued_level_ups = 0;
        let stats = DeathStats {
            level: v.level,
            score: v.score,
            kills: v.kills,
            survived_secs: (now - v.spawned_at) as f32,
        };
        let (pos, dropped_xp, name, is_bot) = (v.pos, death_drop(v.total_xp), v.name.clone(), v.is_bot);

        for o in scatter(
            &mut self.ids,
            &mut self.rng,
            pos,
            dropped_xp,
            DEATH_ORB_COUNT,
            DEATH_ORB_SCATTER,
            self.config.map_size,
        ) {
            self.orbs.insert(o.id, o);
        }
        if let Some(engine) = self.engines.get_mut(&pid) {
            engine.reset();
        }
        self.report.player_kills += 1;

        info!(room = %self.id, victim = %pid, killer = %killer_name, score = stats.score, "player killed");
        if !is_bot {
            self.events.push(RoomEvent::RecordScore {
                name: name.clone(),
                score: stats.score,
                level: stats.level,
            });
        }
        self.events.push(RoomEvent::Send {
            to: Recipient::Player(pid),
            msg: ServerMessage::Death {
                killer_name: killer_name.clone(),
                stats,
            },
        });
        self.events.push(RoomEvent::Send {
            to: Recipient::All,
            msg: ServerMessage::KillFeed {
                killer: killer_name,
                victim: name,
            },
        });
    }

    fn resolve_contacts(&mut self) {
        let attackers: Vec<(MobId, MobKind, Vec2, f32, i32)> = self
            .mobs
            .iter()
            .filter(|m| m.is_alive())
            .map(|m| (m.id, m.kind, m.pos, m.radius, m.contact_damage))
            .collect();
        let mut near = Vec::new();
        for (mid, kind, pos, radius, damage) in attackers {
            near.clear();
            self.target_grid
                .query_into(pos.x, pos.y, radius + PLAYER_MAX_RADIUS, &mut near);
            for t in &near {
                let TargetRef::Player(pid) = *t else {
                    continue;
                };
                let touching = self.players.get(&pid).is_some_and(|p| {
                    p.alive
                        && !p.is_immune(self.now)
                        && circles_overlap(p.pos, p.radius(), pos, radius)
                });
                if touching && self.mobs.contact_ready(mid, pid, self.now) {
                    self.damage_player(pid, damage as f32, KillSource::Mob(kind));
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Orbs and progression
    // ------------------------------------------------------------------------

    fn update_orbs(&mut self, dt: f32) {
        for o in self.orbs.values_mut() {
            o.ttl -= dt;
        }
        self.orbs.retain(|_, o| o.ttl > 0.0);

        let collectors: Vec<(PlayerId, Vec2, f32, f32)> = self
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| {
                (
                    p.id,
                    p.pos,
                    p.radius(),
                    ORB_MAGNET_RADIUS * p.stats().magnet_mult,
                )
            })
            .collect();

        let mut near = Vec::new();
        for (pid, pos, radius, magnet) in collectors {
            near.clear();
            self.orb_grid
                .query_into(pos.x, pos.y, magnet + ORB_MAX_RADIUS, &mut near);
            let mut gained = 0u32;
            for oid in &near {
                let Some(orb) = self.orbs.get_mut(oid) else {
                    continue;
                };
                if circles_overlap(pos, radius, orb.pos, orb.radius()) {
                    gained += orb.amount;
                    self.orbs.remove(oid);
                    continue;
                }
                let d = distance(pos, orb.pos);
                if d <= magnet {
                    orb.pos += (pos - orb.pos).normalize_or_zero() * (ORB_MAGNET_SPEED * dt).min(d);
                }
            }
            if gained > 0 {
                if let Some(p) = self.players.get_mut(&pid) {
                    p.add_xp(gained);
                }
            }
        }
    }

    fn offer_level_ups(&mut self) {
        for p in self.players.values_mut() {
            if !p.alive || p.is_paused() || p.queued_level_ups == 0 {
                continue;
            }
            if p.is_bot {
                let mut guard = 0;
                while let Some(options) = progression::offer_next(p, &mut self.rng) {
                    let index = bots::choose_option(&options, p, &mut self.rng);
                    progression::choose(p, index);
                    guard += 1;
                    if guard > MAX_CHARACTER_LEVEL {
                        break;
                    }
                }
            } else if let Some(options) = progression::offer_next(p, &mut self.rng) {
                self.events.push(RoomEvent::Send {
                    to: Recipient::Player(p.id),
                    msg: ServerMessage::LevelUp {
                        options: options.into_iter().map(Into::into).collect(),
                    },
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------------

    /// Repair non-finite state. Returns the first offending entity.
    fn sanitize(&mut self) -> Option<String> {
        let center = self.center();
        let mut fault: Option<String> = None;
        for p in self.players.values_mut() {
            if !p.pos.is_finite() || !p.angle.is_finite() {
                p.pos = if p.pos.is_finite() { p.pos } else { center };
                p.angle = if p.angle.is_finite() { p.angle } else { 0.0 };
                fault.get_or_insert_with(|| format!("player {}", p.id));
            }
            p.hp = p.hp.clamp(0, p.max_hp);
        }
        for m in self.mobs.iter_mut() {
            if !m.pos.is_finite() {
                m.hp = 0;
                fault.get_or_insert_with(|| format!("mob {}", m.id));
            }
        }
        let before = self.orbs.len();
        self.orbs.retain(|_, o| o.pos.is_finite());
        if self.orbs.len() != before {
            fault.get_or_insert_with(|| "orb".to_string());
        }
        if let Some(entity) = &fault {
            warn!(room = %self.id, entity = %entity, "repaired non-finite state");
        }
        fault
    }

    /// Keep `min_players` total by adding or removing bots.
    fn maintain_bots(&mut self) {
        let desired = self.config.min_players.saturating_sub(self.human_count());
        let bots: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.is_bot)
            .map(|p| p.id)
            .collect();
        if bots.len() < desired {
            for _ in bots.len()..desired {
                self.add_bot();
            }
        } else if bots.len() > desired {
            for id in bots.iter().rev().take(bots.len() - desired) {
                self.remove_player(*id);
            }
        }
    }

    fn add_bot(&mut self) -> PlayerId {
        let taken: Vec<&str> = self.players.values().map(|p| p.name.as_str()).collect();
        let name = BotController::pick_name(&taken, &mut self.rng);
        let id = self.add_player(name, true);
        self.bots.add(id, &mut self.rng);
        id
    }

    fn update_leaderboard(&mut self, dt: f64) {
        self.leaderboard_timer += dt;
        if self.leaderboard_timer >= self.config.leaderboard_interval {
            self.leaderboard_timer = 0.0;
            self.events.push(RoomEvent::Send {
                to: Recipient::All,
                msg: ServerMessage::Leaderboard {
                    entries: self.leaderboard(),
                },
            });
        }
        let count = self.players.len();
        if self.last_player_count != Some(count) {
            self.last_player_count = Some(count);
            self.events.push(RoomEvent::Send {
                to: Recipient::All,
                msg: ServerMessage::PlayerCount { count },
            });
        }
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        ranked
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .map(|p| LeaderboardEntry {
                name: p.name.clone(),
                score: p.score,
                level: p.level,
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    pub fn entity_views(&self) -> ViewMap {
        let mut views = ViewMap::new();
        for p in self.players.values() {
            let shielded = self.engines.get(&p.id).is_some_and(|e| {
                e.shield().is_some_and(|s| s.is_up()) || e.fortress_shield().is_some_and(|s| s.is_up())
            });
            let v = EntityView::Player(PlayerView {
                id: p.id,
                name: p.name.clone(),
                x: p.pos.x,
                y: p.pos.y,
                angle: p.angle,
                radius: p.radius(),
                hp: p.hp,
                max_hp: p.max_hp,
                level: p.level,
                score: p.score,
                alive: p.alive,
                immune: p.is_immune(self.now),
                shielded,
                is_bot: p.is_bot,
                cosmetic: p.cosmetic.clone(),
                weapons: p.weapons.clone(),
            })
            .quantized();
            views.insert(v.key(), v);
        }
        for m in self.mobs.iter().filter(|m| m.is_alive()) {
            let v = EntityView::Mob(MobView {
                id: m.id,
                kind: m.kind,
                x: m.pos.x,
                y: m.pos.y,
                radius: m.radius,
                hp: m.hp,
                max_hp: m.max_hp,
            })
            .quantized();
            views.insert(v.key(), v);
        }
        for o in self.orbs.values() {
            let v = EntityView::Orb(OrbView {
                id: o.id,
                x: o.pos.x,
                y: o.pos.y,
                r: o.radius(),
                amount: o.amount,
            })
            .quantized();
            views.insert(v.key(), v);
        }
        views
    }

    /// Next shared broadcast frame (full or delta).
    pub fn broadcast_state(&mut self) -> GameState {
        let views = self.entity_views();
        self.encoder
            .encode(views, self.projectiles.clone(), self.tick_count)
    }

    /// Full frame for a newly joined client.
    pub fn full_state(&mut self) -> GameState {
        let views = self.entity_views();
        self.encoder
            .full_frame(&views, self.projectiles.clone(), self.tick_count)
    }
}

#[cfg(test)]
mod tests {
    use super::snapshot::{EntityKey, WorldMirror};
    use super::*;
    use crate::weapons::{WeaponInstance, WeaponKind};

    const DT: f64 = 1.0 / 30.0;

    fn quiet_config() -> SimConfig {
        SimConfig {
            target_mobs: 0,
            min_players: 0,
            seed: Some(1),
            ..SimConfig::default()
        }
    }

    fn room() -> Room {
        Room::new("test", quiet_config())
    }

    fn hit(target: TargetRef, attacker: PlayerId, damage: f32) -> HitEvent {
        HitEvent {
            target,
            damage,
            attacker,
            pos: Vec2::ZERO,
            weapon: WeaponKind::Bullet,
            crit: false,
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  bob  "), "bob");
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("a\u{7}b"), "ab");
        assert_eq!(sanitize_name(&"x".repeat(40)).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_join_and_leave_next_tick() {
        let mut r = room();
        let id = r.join("alice", None, None);
        assert_eq!(r.player(id).map(|p| p.cosmetic.as_str()), Some("default"));
        r.leave(id);
        assert!(r.player(id).is_some());
        r.tick(DT).unwrap();
        assert!(r.player(id).is_none());
        // Alive at disconnect: XP became orbs
        assert!(r.orb_count() > 0);
    }

    #[test]
    fn test_input_last_write_wins() {
        let mut r = room();
        let id = r.join("alice", None, None);
        r.handle_input(id, 1.0, true);
        r.handle_input(id, 2.0, false);
        r.handle_input(id, f32::NAN, true);
        r.tick(DT).unwrap();
        let p = r.player(id).unwrap();
        assert_eq!(p.angle, 2.0);
        assert!(!p.moving);
    }

    #[test]
    fn test_dt_clamped() {
        let mut r = room();
        let report = r.tick(5.0).unwrap();
        assert!((report.dt - 0.1).abs() < 1e-12);
        assert!(r.tick(f64::NAN).is_ok());
    }

    #[test]
    fn test_mob_hit_and_kill_drop_orbs() {
        let mut r = room();
        let shooter = r.join("a", None, None);
        let mid = r.spawn_mob(MobKind::Crawler, Vec2::new(600.0, 600.0));
        assert!(r.apply_hit(&hit(TargetRef::Mob(mid), shooter, 15.0)));
        assert_eq!(r.mobs().get(mid).map(|m| m.hp), Some(5));
        assert!(r.apply_hit(&hit(TargetRef::Mob(mid), shooter, 15.0)));
        assert!(!r.mobs().get(mid).unwrap().is_alive());
        let xp: u32 = r.orbs().map(|o| o.amount).sum();
        assert_eq!(xp, MobKind::Crawler.stats().xp);
        // Dead mob takes no further hits
        assert!(!r.apply_hit(&hit(TargetRef::Mob(mid), shooter, 15.0)));
        assert_eq!(r.player(shooter).unwrap().mob_kills, 1);
    }

    #[test]
    fn test_invalid_damage_dropped() {
        let mut r = room();
        let a = r.join("a", None, None);
        let mid = r.spawn_mob(MobKind::Brute, Vec2::new(600.0, 600.0));
        assert!(!r.apply_hit(&hit(TargetRef::Mob(mid), a, 0.0)));
        assert!(!r.apply_hit(&hit(TargetRef::Mob(mid), a, f32::INFINITY)));
        assert_eq!(r.mobs().get(mid).unwrap().hp, 80);
    }

    #[test]
    fn test_pvp_blocked_by_safe_zone_and_immunity() {
        let mut r = room();
        let a = r.join("a", None, None);
        let b = r.join("b", None, None);
        r.player_mut(a).unwrap().pos = Vec2::new(500.0, 500.0);
        r.player_mut(b).unwrap().pos = Vec2::new(520.0, 500.0);

        // Fresh spawn immunity
        assert!(!r.apply_hit(&hit(TargetRef::Player(b), a, 10.0)));

        r.player_mut(b).unwrap().immune_until = 0.0;
        r.player_mut(b).unwrap().pos = r.config().map_center();
        assert!(!r.apply_hit(&hit(TargetRef::Player(b), a, 10.0)));

        r.player_mut(b).unwrap().pos = Vec2::new(520.0, 500.0);
        assert!(r.apply_hit(&hit(TargetRef::Player(b), a, 10.0)));
        assert_eq!(r.player(b).unwrap().hp, 90);
    }

    #[test]
    fn test_shield_then_armor() {
        let mut r = room();
        let a = r.join("a", None, None);
        let b = r.join("b", None, None);
        {
            let victim = r.player_mut(b).unwrap();
            victim.immune_until = 0.0;
            victim.pos = Vec2::new(500.0, 500.0);
            victim.weapons.push(WeaponInstance::new(WeaponKind::Shield));
        }
        r.player_mut(a).unwrap().pos = Vec2::new(450.0, 500.0);
        assert!(r.apply_hit(&hit(TargetRef::Player(b), a, 25.0)));
        assert_eq!(r.player(b).unwrap().hp, 95);
        let shield = r.engine(b).and_then(|e| e.shield()).unwrap();
        assert!(shield.broken);
    }

    #[test]
    fn test_player_death_events() {
        let mut r = room();
        let a = r.join("killer", None, None);
        let b = r.join("victim", None, None);
        r.player_mut(a).unwrap().pos = Vec2::new(450.0, 500.0);
        {
            let v = r.player_mut(b).unwrap();
            v.immune_until = 0.0;
            v.pos = Vec2::new(500.0, 500.0);
            v.hp = 5;
        }
        r.drain_events();
        assert!(r.apply_hit(&hit(TargetRef::Player(b), a, 50.0)));
        let victim = r.player(b).unwrap();
        assert!(!victim.alive);
        assert_eq!(victim.hp, 0);
        assert_eq!(r.player(a).unwrap().kills, 1);
        assert_eq!(r.player(a).unwrap().score, PLAYER_KILL_SCORE);

        let events = r.drain_events();
        assert!(events.iter().any(|e| matches!(e, RoomEvent::RecordScore { name, .. } if name == "victim")));
        assert!(events.iter().any(|e| matches!(
            e,
            RoomEvent::Send { to: Recipient::Player(p), msg: ServerMessage::Death { killer_name, .. } }
                if *p == b && killer_name == "killer"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RoomEvent::Send { to: Recipient::All, msg: ServerMessage::KillFeed { .. } }
        )));
        let dropped: u32 = r.orbs().map(|o| o.amount).sum();
        assert_eq!(dropped, DEATH_XP_BASE);
    }

    #[test]
    fn test_respawn_only_when_dead() {
        let mut r = room();
        let a = r.join("a", None, None);
        r.player_mut(a).unwrap().add_xp(50);
        r.handle_respawn(a);
        r.tick(DT).unwrap();
        assert!(r.player(a).unwrap().level > 1);

        r.player_mut(a).unwrap().alive = false;
        r.handle_respawn(a);
        r.tick(DT).unwrap();
        let p = r.player(a).unwrap();
        assert!(p.alive);
        assert_eq!(p.level, 1);
    }

    #[test]
    fn test_orb_pickup_triggers_level_up_offer() {
        let mut r = room();
        let a = r.join("a", None, None);
        let pos = r.player(a).unwrap().pos;
        r.spawn_orb(pos, 12);
        r.drain_events();
        r.tick(DT).unwrap();
        let p = r.player(a).unwrap();
        assert_eq!(p.level, 2);
        assert!(p.is_paused());
        let offered = r.drain_events().into_iter().any(|e| {
            matches!(e, RoomEvent::Send { to: Recipient::Player(id), msg: ServerMessage::LevelUp { ref options } }
                if id == a && options.len() == 3)
        });
        assert!(offered);

        r.handle_level_up(a, 0);
        r.tick(DT).unwrap();
        assert!(!r.player(a).unwrap().is_paused());
    }

    #[test]
    fn test_magnet_pulls_orbs() {
        let mut r = room();
        let a = r.join("a", None, None);
        let pos = r.player(a).unwrap().pos;
        let oid = r.spawn_orb(pos + Vec2::new(80.0, 0.0), 1);
        r.tick(DT).unwrap();
        let orb = r.orbs().find(|o| o.id == oid).unwrap();
        assert!(orb.pos.x < pos.x + 80.0);
    }

    #[test]
    fn test_bots_fill_to_min_players() {
        let mut r = Room::new(
            "bots",
            SimConfig {
                min_players: 4,
                target_mobs: 0,
                seed: Some(2),
                ..SimConfig::default()
            },
        );
        r.tick(DT).unwrap();
        assert_eq!(r.bot_count(), 4);
        r.join("human", None, None);
        r.tick(DT).unwrap();
        assert_eq!(r.bot_count(), 3);
        assert_eq!(r.player_count(), 4);
    }

    #[test]
    fn test_contact_damage_respects_cooldown() {
        let mut r = room();
        let a = r.join("a", None, None);
        let pos = Vec2::new(800.0, 800.0);
        {
            let p = r.player_mut(a).unwrap();
            p.pos = pos;
            p.immune_until = 0.0;
            p.weapons.clear();
        }
        r.spawn_mob(MobKind::Brute, pos);
        r.tick(DT).unwrap();
        assert_eq!(r.player(a).unwrap().hp, 88);
        r.tick(DT).unwrap();
        assert_eq!(r.player(a).unwrap().hp, 88);
    }

    #[test]
    fn test_first_broadcast_full_then_delta() {
        let mut r = room();
        r.join("a", None, None);
        r.tick(DT).unwrap();
        let first = r.broadcast_state();
        assert!(first.full);
        assert_eq!(first.entities.len(), 1);
        r.tick(DT).unwrap();
        let second = r.broadcast_state();
        assert!(!second.full);
    }

    #[test]
    fn test_late_joiner_mirror_matches_after_pickup() {
        let mut r = room();
        let a = r.join("a", None, None);
        r.tick(DT).unwrap();
        r.broadcast_state();

        // Orb appears and is collected between two shared broadcasts
        let pos = r.player(a).unwrap().pos;
        let oid = r.spawn_orb(pos, 1);
        r.join("b", None, None);
        let mut mirror = WorldMirror::new();
        mirror.apply(&r.full_state());
        assert!(mirror.entities().contains_key(&EntityKey::Orb(oid)));

        r.tick(DT).unwrap();
        let delta = r.broadcast_state();
        assert!(!delta.full);
        assert!(delta.removed.contains(&EntityKey::Orb(oid)));
        mirror.apply(&delta);
        assert_eq!(mirror.entities(), &r.entity_views());
    }

    #[test]
    fn test_leaderboard_sorted() {
        let mut r = room();
        let a = r.join("a", None, None);
        let b = r.join("b", None, None);
        r.player_mut(a).unwrap().score = 5;
        r.player_mut(b).unwrap().score = 50;
        let board = r.leaderboard();
        assert_eq!(board[0].name, "b");
        assert_eq!(board[1].name, "a");
    }

    #[test]
    fn test_non_finite_position_repaired() {
        let mut r = room();
        let a = r.join("a", None, None);
        {
            let p = r.player_mut(a).unwrap();
            p.pos = Vec2::new(f32::NAN, 0.0);
            // Dead players skip movement, so the NaN survives until sanitize
            p.alive = false;
        }
        let result = r.tick(DT);
        assert!(matches!(result, Err(SimError::NonFiniteState { .. })));
        assert!(r.player(a).unwrap().pos.is_finite());
    }
}
