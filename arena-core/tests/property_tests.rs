//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - Spatial hash: query is a duplicate-free superset of the true neighbours
//! - Damage: every emitted hit is finite and positive; mitigation never below 1
//! - Room: 0 <= hp <= max_hp after every tick under random input
//! - Snapshots: full + deltas rebuild exactly the current entity set
//! - Orbs: XP split conserves the total

use arena_core::config::SimConfig;
use arena_core::entities::{split_xp, MobId, PlayerId, TargetRef};
use arena_core::messages::ClientMessage;
use arena_core::room::snapshot::WorldMirror;
use arena_core::room::Room;
use arena_core::spatial::SpatialHash;
use arena_core::weapons::{mitigate, Owner, Target, WeaponEngine, WeaponInstance, WeaponKind};
use glam::Vec2;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashSet;

fn small_room(seed: u64) -> Room {
    Room::new(
        "prop",
        SimConfig {
            map_size: 1200.0,
            safe_zone_radius: 100.0,
            target_mobs: 25,
            min_players: 4,
            seed: Some(seed),
            ..SimConfig::default()
        },
    )
}

fn weapon_kind() -> impl Strategy<Value = WeaponKind> {
    prop::sample::select(vec![
        WeaponKind::Orbit,
        WeaponKind::Bullet,
        WeaponKind::Shockwave,
        WeaponKind::Laser,
        WeaponKind::Mines,
        WeaponKind::Shield,
        WeaponKind::PlasmaStorm,
        WeaponKind::Railgun,
        WeaponKind::Fortress,
        WeaponKind::MeteorShower,
        WeaponKind::DeathRay,
        WeaponKind::VoidTraps,
    ])
}

// ============================================================
// Spatial Hash Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_query_is_superset_without_duplicates(
        points in prop::collection::vec((0.0f32..2000.0, 0.0f32..2000.0), 0..120),
        qx in 0.0f32..2000.0,
        qy in 0.0f32..2000.0,
        r in 0.0f32..600.0,
    ) {
        let mut grid = SpatialHash::default();
        for (i, (x, y)) in points.iter().enumerate() {
            grid.insert(i, Vec2::new(*x, *y));
        }
        let found = grid.query(qx, qy, r);
        let unique: HashSet<usize> = found.iter().copied().collect();
        prop_assert_eq!(unique.len(), found.len(), "query returned duplicates");

        let centre = Vec2::new(qx, qy);
        for (i, (x, y)) in points.iter().enumerate() {
            if Vec2::new(*x, *y).distance(centre) <= r {
                prop_assert!(unique.contains(&i), "missed point {} within radius", i);
            }
        }
    }

    #[test]
    fn prop_mitigate_never_below_one(damage in 0.001f32..10_000.0, armor in 0.0f32..0.9) {
        let hp_loss = mitigate(damage, armor);
        prop_assert!(hp_loss >= 1);
        prop_assert!(hp_loss as f32 <= damage.round().max(1.0));
    }

    #[test]
    fn prop_split_xp_conserves_total(total in 0u32..5_000, pieces in 1u32..12) {
        let parts = split_xp(total, pieces);
        prop_assert_eq!(parts.iter().sum::<u32>(), total);
        prop_assert!(parts.iter().all(|p| *p > 0));
        prop_assert!(parts.len() as u32 <= pieces);
    }
}

// ============================================================
// Damage Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_weapon_hits_are_positive(
        kinds in prop::collection::btree_set(weapon_kind(), 1..4),
        level in 1u8..=5,
        char_level in 1u32..40,
        seed in any::<u64>(),
        mobs in prop::collection::vec((-300.0f32..300.0, -300.0f32..300.0), 1..30),
    ) {
        let owner = Owner {
            id: PlayerId(1),
            pos: Vec2::ZERO,
            angle: 0.3,
            radius: 22.0,
            level: char_level,
            passives: Default::default(),
        };
        let weapons: Vec<WeaponInstance> = kinds
            .into_iter()
            .map(|kind| WeaponInstance { kind, level })
            .collect();
        let targets: Vec<Target> = mobs
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Target {
                target: TargetRef::Mob(MobId(i as u32 + 10)),
                pos: Vec2::new(*x, *y),
                radius: 12.0,
            })
            .collect();

        let mut engine = WeaponEngine::new();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let dt = 1.0 / 30.0;
        for step in 0..120 {
            let now = (step + 1) as f64 * dt as f64;
            let out = engine.update(dt, &owner, &weapons, &targets, &[], now, &mut rng);
            for hit in &out.hits {
                prop_assert!(hit.damage.is_finite() && hit.damage > 0.0);
                prop_assert_eq!(hit.attacker, owner.id);
            }
        }
    }
}

// ============================================================
// Room Properties
// ============================================================

#[derive(Debug, Clone)]
enum Action {
    Steer(usize, f32, bool),
    Choose(usize, usize),
    Respawn(usize),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0usize..3, -10.0f32..10.0, any::<bool>()).prop_map(|(p, a, m)| Action::Steer(p, a, m)),
        1 => (0usize..3, 0usize..5).prop_map(|(p, c)| Action::Choose(p, c)),
        1 => (0usize..3).prop_map(Action::Respawn),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_hp_stays_in_bounds(
        seed in any::<u64>(),
        script in prop::collection::vec(action(), 60..180),
    ) {
        let mut room = small_room(seed);
        let humans: Vec<PlayerId> = (0..3).map(|i| room.join(&format!("h{i}"), None, None)).collect();

        for act in script {
            match act {
                Action::Steer(p, angle, moving) => {
                    room.handle_message(humans[p], ClientMessage::Input { angle, moving })
                }
                Action::Choose(p, choice_index) => {
                    room.handle_message(humans[p], ClientMessage::LevelUp { choice_index })
                }
                Action::Respawn(p) => room.handle_message(humans[p], ClientMessage::Respawn),
            }
            prop_assert!(room.tick(1.0 / 30.0).is_ok());
            for p in room.players() {
                prop_assert!(p.hp >= 0 && p.hp <= p.max_hp, "{} has hp {}/{}", p.name, p.hp, p.max_hp);
                prop_assert!(p.pos.is_finite());
            }
            room.drain_events();
        }
    }

    #[test]
    fn prop_snapshots_rebuild_current_state(
        seed in any::<u64>(),
        full_every in 1u32..8,
        ticks_between in prop::collection::vec(1usize..5, 5..25),
    ) {
        let mut room = Room::new(
            "mirror",
            SimConfig {
                full_snapshot_every: full_every,
                ..small_room(seed).config().clone()
            },
        );
        let mut mirror = WorldMirror::new();
        for n in ticks_between {
            for _ in 0..n {
                room.tick(1.0 / 30.0).unwrap();
            }
            let frame = room.broadcast_state();
            mirror.apply(&frame);
            prop_assert_eq!(mirror.entities(), &room.entity_views());
        }
    }
}
