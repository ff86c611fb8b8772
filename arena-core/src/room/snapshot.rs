//! Full/delta snapshot encoding and client-side reconstruction.
//!
//! Every broadcast compares the current entity views against the previous
//! broadcast. The first broadcast, and every `full_every`-th after it, carries
//! every entity; the rest carry only views that changed plus removal markers
//! for entities that disappeared. Positions are quantised so idle entities
//! compare equal across ticks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{MobId, MobKind, OrbId, PlayerId};
use crate::weapons::{ProjectileView, WeaponInstance};

/// Position/size quantum (world units)
pub const POSITION_QUANTUM: f32 = 0.1;

pub fn quantize(v: f32) -> f32 {
    (v / POSITION_QUANTUM).round() * POSITION_QUANTUM
}

fn quantize_angle(a: f32) -> f32 {
    (a * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKey {
    Player(PlayerId),
    Mob(MobId),
    Orb(OrbId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub radius: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    pub score: u32,
    pub alive: bool,
    pub immune: bool,
    pub shielded: bool,
    pub is_bot: bool,
    pub cosmetic: String,
    pub weapons: Vec<WeaponInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobView {
    pub id: MobId,
    pub kind: MobKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrbView {
    pub id: OrbId,
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityView {
    Player(PlayerView),
    Mob(MobView),
    Orb(OrbView),
}

impl EntityView {
    pub fn key(&self) -> EntityKey {
        match self {
            EntityView::Player(p) => EntityKey::Player(p.id),
            EntityView::Mob(m) => EntityKey::Mob(m.id),
            EntityView::Orb(o) => EntityKey::Orb(o.id),
        }
    }

    /// Snap positions and angles to the broadcast quantum.
    pub fn quantized(mut self) -> Self {
        match &mut self {
            EntityView::Player(p) => {
                p.x = quantize(p.x);
                p.y = quantize(p.y);
                p.radius = quantize(p.radius);
                p.angle = quantize_angle(p.angle);
            }
            EntityView::Mob(m) => {
                m.x = quantize(m.x);
                m.y = quantize(m.y);
            }
            EntityView::Orb(o) => {
                o.x = quantize(o.x);
                o.y = quantize(o.y);
                o.r = quantize(o.r);
            }
        }
        self
    }
}

/// One broadcast frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub full: bool,
    pub seq: u64,
    pub tick: u64,
    pub entities: Vec<EntityView>,
    pub removed: Vec<EntityKey>,
    pub projectiles: Vec<ProjectileView>,
}

pub type ViewMap = BTreeMap<EntityKey, EntityView>;

#[derive(Debug, Clone)]
pub struct SnapshotEncoder {
    last: ViewMap,
    /// Views handed to late joiners since the last shared frame
    sent_privately: ViewMap,
    seq: u64,
    full_every: u64,
}

impl SnapshotEncoder {
    pub fn new(full_every: u32) -> Self {
        Self {
            last: BTreeMap::new(),
            sent_privately: BTreeMap::new(),
            seq: 0,
            full_every: full_every.max(1) as u64,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the next `encode` will produce a full snapshot.
    pub fn next_is_full(&self) -> bool {
        self.seq % self.full_every == 0
    }

    /// Produce the next broadcast frame and remember `current` for the next diff.
    pub fn encode(&mut self, current: ViewMap, projectiles: Vec<ProjectileView>, tick: u64) -> GameState {
        let full = self.next_is_full();
        let state = if full {
            GameState {
                full: true,
                seq: self.seq,
                tick,
                entities: current.values().cloned().collect(),
                removed: Vec::new(),
                projectiles,
            }
        } else {
            let entities = current
                .iter()
                .filter(|(k, v)| {
                    self.last.get(k) != Some(v)
                        || (self.sent_privately.contains_key(k) && self.sent_privately.get(k) != Some(v))
                })
                .map(|(_, v)| v.clone())
                .collect();
            let removed = self
                .last
                .keys()
                .chain(self.sent_privately.keys().filter(|k| !self.last.contains_key(k)))
                .filter(|k| !current.contains_key(k))
                .copied()
                .collect();
            GameState {
                full: false,
                seq: self.seq,
                tick,
                entities,
                removed,
                projectiles,
            }
        };
        self.last = current;
        self.sent_privately.clear();
        self.seq += 1;
        state
    }

    /// Standalone full frame for a late joiner. The shared diff base is kept,
    /// but the next delta also covers whatever this frame showed.
    pub fn full_frame(&mut self, current: &ViewMap, projectiles: Vec<ProjectileView>, tick: u64) -> GameState {
        self.sent_privately
            .extend(current.iter().map(|(k, v)| (*k, v.clone())));
        GameState {
            full: true,
            seq: self.seq,
            tick,
            entities: current.values().cloned().collect(),
            removed: Vec::new(),
            projectiles,
        }
    }
}

/// Client-side state rebuilt from full and delta frames.
#[derive(Debug, Clone, Default)]
pub struct WorldMirror {
    entities: ViewMap,
    pub projectiles: Vec<ProjectileView>,
}

impl WorldMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, state: &GameState) {
        if state.full {
            self.entities.clear();
        }
        for view in &state.entities {
            self.entities.insert(view.key(), view.clone());
        }
        for key in &state.removed {
            self.entities.remove(key);
        }
        self.projectiles = state.projectiles.clone();
    }

    pub fn entities(&self) -> &ViewMap {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
