//! XP orbs dropped on death.

use glam::Vec2;
use rand::Rng;

use super::{IdAllocator, OrbId};
use crate::constants::{ORB_LIFETIME_SECS, ORB_MAX_RADIUS};
use crate::geometry::clamp_to_map;

#[derive(Debug, Clone, PartialEq)]
pub struct XpOrb {
    pub id: OrbId,
    pub pos: Vec2,
    pub amount: u32,
    pub ttl: f32,
}

impl XpOrb {
    pub fn new(id: OrbId, pos: Vec2, amount: u32) -> Self {
        Self {
            id,
            pos,
            amount,
            ttl: ORB_LIFETIME_SECS,
        }
    }

    /// `4 + 1.5·√amount`, capped.
    pub fn radius(&self) -> f32 {
        orb_radius(self.amount)
    }
}

pub fn orb_radius(amount: u32) -> f32 {
    (4.0 + 1.5 * (amount as f32).sqrt()).min(ORB_MAX_RADIUS)
}

/// Split `total` into at most `pieces` positive parts summing exactly to `total`.
pub fn split_xp(total: u32, pieces: u32) -> Vec<u32> {
    let n = pieces.min(total).max(1);
    if total == 0 {
        return Vec::new();
    }
    let base = total / n;
    let extra = total % n;
    (0..n).map(|i| base + u32::from(i < extra)).collect()
}

/// Scatter a batch of orbs worth `total` XP around `center`, kept inside the map.
pub fn scatter<R: Rng + ?Sized>(
    ids: &mut IdAllocator,
    rng: &mut R,
    center: Vec2,
    total: u32,
    pieces: u32,
    spread: f32,
    map_size: f32,
) -> Vec<XpOrb> {
    split_xp(total, pieces)
        .into_iter()
        .map(|amount| {
            let offset = if spread > 0.0 {
                Vec2::new(rng.gen_range(-spread..=spread), rng.gen_range(-spread..=spread))
            } else {
                Vec2::ZERO
            };
            XpOrb::new(ids.orb(), clamp_to_map(center + offset, map_size, 0.0), amount)
        })
        .collect()
}
