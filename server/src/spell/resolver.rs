//! Implicit-target resolution.
//!
//! Each effect slot declares a specifier pair `(A, B)`: A picks or
//! establishes something (a unit, a destination), B optionally fills an
//! area around what A established. Selection walks the used slots in
//! order, reuses the first selection for later slots with an identical
//! pair, post-filters candidates for eligibility, applies the per-spell
//! override hook, and finally enforces the area target cap by random
//! eviction so pure cap changes never reorder survivors.

use std::collections::HashMap;

use log::warn;

use arcanum_core::constants::{CHAIN_INITIAL_RADIUS, CHAIN_JUMP_RADIUS, CONE_ANGLE};
use arcanum_core::types::{
    ImplicitTarget, ObjectGuid, Position, SpellAttr0, SpellAttr2, SpellEffectTemplate,
    SpellTemplate,
};

use crate::spell::Spell;
use crate::world::World;

/// Everything one effect slot selected.
#[derive(Debug, Default, Clone)]
struct Selection {
    units: Vec<ObjectGuid>,
    game_objects: Vec<ObjectGuid>,
    items: Vec<ObjectGuid>,
}

/// Fill the spell's target lists from its template and payload.
pub fn select_spell_targets(spell: &mut Spell, world: &mut World) {
    let template = spell.template().clone();
    let mut by_pair: HashMap<(ImplicitTarget, ImplicitTarget), Selection> = HashMap::new();

    for (index, effect) in template.effects() {
        let pair = (effect.target_a, effect.target_b);

        // identical pairs re-use the first slot's selection so randomized
        // picks (caps, random points) agree across slots
        let selection = if let Some(prev) = by_pair.get(&pair).filter(|_| !effect.is_area_aura()) {
            prev.clone()
        } else {
            let mut sel = select_for_effect(spell, world, index, effect, &template);

            if let Some(handler) = world.store.override_for(template.id) {
                handler.filter_targets(world, &template, index, &mut sel.units);
            }
            enforce_target_cap(world, &template, &mut sel.units);

            // area auras always reach their own caster
            if effect.is_area_aura() && !sel.units.contains(&spell.caster()) {
                sel.units.push(spell.caster());
            }
            by_pair.insert(pair, sel.clone());
            sel
        };

        for guid in &selection.units {
            spell.add_unit_target(world, *guid, index);
        }
        for guid in &selection.game_objects {
            spell.add_game_object_target(*guid, index);
        }
        for guid in &selection.items {
            spell.add_item_target(*guid, index);
        }
    }
}

fn select_for_effect(
    spell: &mut Spell,
    world: &mut World,
    index: usize,
    effect: &SpellEffectTemplate,
    template: &SpellTemplate,
) -> Selection {
    let mut sel = Selection::default();
    let caster = spell.caster();
    let radius = template.effect_radius(index);
    let positive = effect.is_positive();

    match effect.target_a {
        ImplicitTarget::None => {
            // self-contained effects (auras with no specifier) act on the caster
            if effect.target_b == ImplicitTarget::None {
                sel.units.push(caster);
            } else {
                fill_from_b(spell, world, index, effect, template, &mut sel);
            }
        }
        ImplicitTarget::UnitCaster => sel.units.push(caster),
        ImplicitTarget::UnitPet => {
            if let Some(pet) = world.unit(caster).and_then(|u| u.pet) {
                if eligible(world, caster, pet, positive, template) {
                    sel.units.push(pet);
                }
            }
        }
        ImplicitTarget::UnitTargetEnemy
        | ImplicitTarget::UnitTargetAlly
        | ImplicitTarget::UnitTargetAny
        | ImplicitTarget::UnitChainHealAlly => {
            if let Some(first) = spell.targets().unit_target() {
                if eligible(world, caster, first, positive, template) {
                    if effect.chain_targets > 1 {
                        sel.units = chain_targets(world, caster, first, effect, template, !positive);
                    } else {
                        sel.units.push(first);
                    }
                }
            }
        }
        ImplicitTarget::UnitNearbyEnemy => {
            sel.units
                .extend(nearest_unit(world, caster, radius, false, template));
        }
        ImplicitTarget::UnitNearbyAlly => {
            sel.units
                .extend(nearest_unit(world, caster, radius, true, template));
        }
        ImplicitTarget::UnitNearbyParty => {
            let nearest = nearest_unit(world, caster, radius, true, template)
                .filter(|g| in_same_group(world, caster, *g));
            sel.units.extend(nearest);
        }
        ImplicitTarget::UnitConeEnemy => {
            sel.units = cone_units(world, caster, radius, false, template);
        }
        ImplicitTarget::UnitConeAlly => {
            sel.units = cone_units(world, caster, radius, true, template);
        }
        ImplicitTarget::UnitSrcAreaEnemy => {
            let center = src_center(spell, world, caster);
            sel.units = units_around(world, caster, &center, radius, Some(false), template);
        }
        ImplicitTarget::UnitSrcAreaAlly => {
            let center = src_center(spell, world, caster);
            sel.units = units_around(world, caster, &center, radius, Some(true), template);
        }
        ImplicitTarget::UnitSrcAreaEntry => {
            let center = src_center(spell, world, caster);
            sel.units = script_entry_units(world, caster, &center, radius, template);
        }
        ImplicitTarget::UnitDestAreaEnemy => {
            if let Some(center) = dest_center(spell, world) {
                sel.units = units_around(world, caster, &center, radius, Some(false), template);
            }
        }
        ImplicitTarget::UnitDestAreaAlly => {
            if let Some(center) = dest_center(spell, world) {
                sel.units = units_around(world, caster, &center, radius, Some(true), template);
            }
        }
        ImplicitTarget::UnitDestAreaEntry => {
            if let Some(center) = dest_center(spell, world) {
                sel.units = script_entry_units(world, caster, &center, radius, template);
            }
        }
        ImplicitTarget::UnitPartyCaster | ImplicitTarget::UnitRaidCaster => {
            sel.units = group_around(world, caster, caster, radius, template);
        }
        ImplicitTarget::UnitPartyTarget => {
            if let Some(anchor) = spell.targets().unit_target() {
                sel.units = group_around(world, caster, anchor, radius, template);
            }
        }
        ImplicitTarget::UnitRaidPriority => {
            let cap = effect.chain_targets.max(1) as usize;
            sel.units = raid_priority(world, caster, radius, cap, template);
        }
        ImplicitTarget::DestCaster => {
            if let Some(unit) = world.unit(caster) {
                let pos = unit.position;
                spell.set_dest(pos);
            }
            fill_from_b(spell, world, index, effect, template, &mut sel);
        }
        ImplicitTarget::DestTarget => {
            if let Some(pos) = spell
                .targets()
                .unit_target()
                .and_then(|g| world.unit(g))
                .map(|u| u.position)
            {
                spell.set_dest(pos);
            }
            fill_from_b(spell, world, index, effect, template, &mut sel);
        }
        ImplicitTarget::DestRandom => {
            let center = spell
                .targets()
                .dest()
                .unwrap_or_else(|| src_center(spell, world, caster));
            let angle = world.frand() * std::f32::consts::TAU;
            // area-uniform: without the square root points would bunch at
            // the center
            let dist = radius * world.frand().sqrt();
            spell.set_dest(center.offset_polar(angle, dist));
            fill_from_b(spell, world, index, effect, template, &mut sel);
        }
        ImplicitTarget::DestTraj | ImplicitTarget::DestDb => {
            // destination supplied by the payload; nothing to derive
            fill_from_b(spell, world, index, effect, template, &mut sel);
        }
        ImplicitTarget::GameObjectTarget => {
            if let Some(go) = spell.targets().game_object_target() {
                sel.game_objects.push(go);
            }
        }
        ImplicitTarget::GameObjectDestArea => {
            if let Some(center) = dest_center(spell, world) {
                sel.game_objects = world.game_objects_in_range(&center, radius);
            }
        }
        ImplicitTarget::ItemTarget => {
            if let Some(item) = spell.targets().item_target() {
                sel.items.push(item);
            }
        }
        ImplicitTarget::CorpseEnemy => {
            if let Some(owner) = spell
                .targets()
                .corpse_target()
                .and_then(|c| world.corpse(c))
                .map(|c| c.owner)
            {
                sel.units.push(owner);
            }
        }
        ImplicitTarget::CorpseCaster => {
            sel.units.push(caster);
        }
    }
    sel
}

/// Area fill driven by the B specifier. Dest variants fill around the
/// destination the A specifier established; Src variants fill around the
/// source point regardless of it.
fn fill_from_b(
    spell: &mut Spell,
    world: &mut World,
    index: usize,
    effect: &SpellEffectTemplate,
    template: &SpellTemplate,
    sel: &mut Selection,
) {
    let caster = spell.caster();
    let radius = template.effect_radius(index);
    match effect.target_b {
        ImplicitTarget::UnitSrcAreaEnemy => {
            let center = src_center(spell, world, caster);
            sel.units = units_around(world, caster, &center, radius, Some(false), template);
        }
        ImplicitTarget::UnitSrcAreaAlly => {
            let center = src_center(spell, world, caster);
            sel.units = units_around(world, caster, &center, radius, Some(true), template);
        }
        ImplicitTarget::UnitSrcAreaEntry => {
            let center = src_center(spell, world, caster);
            sel.units = script_entry_units(world, caster, &center, radius, template);
        }
        ImplicitTarget::UnitDestAreaEnemy => {
            if let Some(center) = dest_center(spell, world) {
                sel.units = units_around(world, caster, &center, radius, Some(false), template);
            }
        }
        ImplicitTarget::UnitDestAreaAlly => {
            if let Some(center) = dest_center(spell, world) {
                sel.units = units_around(world, caster, &center, radius, Some(true), template);
            }
        }
        ImplicitTarget::UnitDestAreaEntry => {
            if let Some(center) = dest_center(spell, world) {
                sel.units = script_entry_units(world, caster, &center, radius, template);
            }
        }
        ImplicitTarget::GameObjectDestArea => {
            if let Some(center) = dest_center(spell, world) {
                sel.game_objects = world.game_objects_in_range(&center, radius);
            }
        }
        _ => {}
    }
}

/// The source point: payload source location, else the caster.
fn src_center(spell: &Spell, world: &World, caster: ObjectGuid) -> Position {
    spell
        .targets()
        .src()
        .or_else(|| world.unit(caster).map(|u| u.position))
        .unwrap_or_default()
}

///// The destination point: established dest, else the explicit target's
/// position, else nothing.
fn dest_center(spell: &Spell, world: &World) -> Option<Position> {
    spell.targets().dest().or_else(|| {
        spell
            .targets()
            .unit_target()
            .and_then(|g| world.unit(g))
            .map(|u| u.position)
    })
}

/// Post-selection eligibility. Explicit range/state validation already
/// ran in the cast checks; this keeps area fills honest.
fn eligible(
    world: &World,
    caster: ObjectGuid,
    candidate: ObjectGuid,
    positive: bool,
    template: &SpellTemplate,
) -> bool {
    let Some(unit) = world.unit(candidate) else {
        return false;
    };
    if !unit.is_selectable() {
        return false;
    }
    let want_dead = template.has_attr2(SpellAttr2::ALLOW_DEAD_TARGET);
    if unit.is_alive() == want_dead {
        return false;
    }
    if candidate != caster {
        if let Some(caster_unit) = world.unit(caster) {
            let hostile = caster_unit.is_hostile_to(unit);
            if positive && hostile {
                return false;
            }
            if !positive && !hostile {
                return false;
            }
        }
        if !template.has_attr0(SpellAttr0::IGNORE_LINE_OF_SIGHT)
            && !world.in_line_of_sight(caster, candidate)
        {
            return false;
        }
    }
    true
}

/// Area fill around a point. `friendly` of `Some(false)` selects enemies
/// of the caster, `Some(true)` allies, `None` anything selectable.
fn units_around(
    world: &World,
    caster: ObjectGuid,
    center: &Position,
    radius: f32,
    friendly: Option<bool>,
    template: &SpellTemplate,
) -> Vec<ObjectGuid> {
    world
        .units_in_range(center, radius)
        .into_iter()
        .filter(|g| match friendly {
            Some(f) => (f || *g != caster) && eligible(world, caster, *g, f, template),
            None => world.unit(*g).is_some_and(|u| u.is_selectable()),
        })
        .collect()
}

fn nearest_unit(
    world: &World,
    caster: ObjectGuid,
    radius: f32,
    friendly: bool,
    template: &SpellTemplate,
) -> Option<ObjectGuid> {
    let origin = world.unit(caster)?.position;
    world
        .units_in_range(&origin, radius)
        .into_iter()
        .filter(|g| *g != caster && eligible(world, caster, *g, friendly, template))
        .min_by(|a, b| {
            let da = world.unit(*a).map(|u| u.position.dist_squared(&origin));
            let db = world.unit(*b).map(|u| u.position.dist_squared(&origin));
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn cone_units(
    world: &World,
    caster: ObjectGuid,
    radius: f32,
    friendly: bool,
    template: &SpellTemplate,
) -> Vec<ObjectGuid> {
    let Some(origin) = world.unit(caster).map(|u| u.position) else {
        return Vec::new();
    };
    world
        .units_in_range(&origin, radius)
        .into_iter()
        .filter(|g| *g != caster)
        .filter(|g| eligible(world, caster, *g, friendly, template))
        .filter(|g| {
            world
                .unit(*g)
                .is_some_and(|u| origin.is_within_arc(&u.position, CONE_ANGLE))
        })
        .collect()
}

fn in_same_group(world: &World, a: ObjectGuid, b: ObjectGuid) -> bool {
    match (world.unit(a), world.unit(b)) {
        (Some(x), Some(y)) => x.is_in_same_group(y),
        _ => false,
    }
}

/// Group members within `radius` of an anchor unit, the anchor included.
fn group_around(
    world: &World,
    caster: ObjectGuid,
    anchor: ObjectGuid,
    radius: f32,
    template: &SpellTemplate,
) -> Vec<ObjectGuid> {
    let Some(anchor_unit) = world.unit(anchor) else {
        return Vec::new();
    };
    let center = anchor_unit.position;
    let members = match anchor_unit.group_id {
        Some(group) => world.group_members(group),
        None => vec![anchor],
    };
    members
        .into_iter()
        .filter(|g| eligible(world, caster, *g, true, template))
        .filter(|g| {
            world
                .unit(*g)
                .is_some_and(|u| u.position.is_within_dist(&center, radius))
        })
        .collect()
}

/// The `cap` most injured group members in range, selected through a
/// bounded max-heap so a big raid never sorts fully.
fn raid_priority(
    world: &World,
    caster: ObjectGuid,
    radius: f32,
    cap: usize,
    template: &SpellTemplate,
) -> Vec<ObjectGuid> {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    // health pct in tenths keeps the heap on integer ordering
    let mut heap: BinaryHeap<(u32, Reverse<u64>)> = BinaryHeap::new();
    let mut by_key: HashMap<u64, ObjectGuid> = HashMap::new();
    for guid in group_around(world, caster, caster, radius, template) {
        let Some(unit) = world.unit(guid) else { continue };
        let key = (unit.health_pct() * 10.0) as u32;
        heap.push((key, Reverse(guid.raw())));
        by_key.insert(guid.raw(), guid);
        if heap.len() > cap {
            heap.pop();
        }
    }
    let mut picked: Vec<(u32, u64)> = heap.into_iter().map(|(k, Reverse(r))| (k, r)).collect();
    picked.sort_unstable();
    picked
        .into_iter()
        .filter_map(|(_, raw)| by_key.get(&raw).copied())
        .collect()
}

/// Units restricted by the script target-entry table. An empty table is a
/// data bug; fall back to a plain hostile fill so the spell still works.
fn script_entry_units(
    world: &World,
    caster: ObjectGuid,
    center: &Position,
    radius: f32,
    template: &SpellTemplate,
) -> Vec<ObjectGuid> {
    let rows = world.store.script_targets(template.id);
    if rows.is_empty() {
        warn!(
            "spell {} selects by script entry but has no script target rows",
            template.id
        );
        return units_around(world, caster, center, radius, Some(false), template);
    }
    world
        .units_in_range(center, radius)
        .into_iter()
        .filter(|g| {
            world.unit(*g).is_some_and(|u| {
                rows.iter()
                    .any(|row| row.entry == u.entry && row.require_dead != u.is_alive())
            })
        })
        .collect()
}

/// Greedy chain walk: start from the explicit target, then repeatedly
/// jump to the best next candidate within the per-hop radius. Damage
/// chains jump to the nearest; heal chains jump to the most injured.
fn chain_targets(
    world: &World,
    caster: ObjectGuid,
    first: ObjectGuid,
    effect: &SpellEffectTemplate,
    template: &SpellTemplate,
    harmful: bool,
) -> Vec<ObjectGuid> {
    let mut picked = vec![first];
    let Some(first_pos) = world.unit(first).map(|u| u.position) else {
        return picked;
    };
    let mut pool: Vec<ObjectGuid> = world
        .units_in_range(&first_pos, CHAIN_INITIAL_RADIUS)
        .into_iter()
        .filter(|g| *g != first && *g != caster)
        .filter(|g| eligible(world, caster, *g, !harmful, template))
        .collect();
    let ignore_los = template.has_attr0(SpellAttr0::IGNORE_LINE_OF_SIGHT);

    while picked.len() < effect.chain_targets as usize {
        let Some(last_pos) = picked
            .last()
            .and_then(|g| world.unit(*g))
            .map(|u| u.position)
        else {
            break;
        };
        let candidates = pool.iter().enumerate().filter(|(_, g)| {
            world.unit(**g).is_some_and(|u| {
                u.position.is_within_dist(&last_pos, CHAIN_JUMP_RADIUS)
                    && (ignore_los || world.in_line_of_sight(picked[picked.len() - 1], **g))
            })
        });
        let next = if harmful {
            candidates
                .min_by(|(_, a), (_, b)| {
                    let da = world.unit(**a).map(|u| u.position.dist_squared(&last_pos));
                    let db = world.unit(**b).map(|u| u.position.dist_squared(&last_pos));
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
        } else {
            candidates
                .min_by(|(_, a), (_, b)| {
                    let ha = world.unit(**a).map(|u| u.health_pct());
                    let hb = world.unit(**b).map(|u| u.health_pct());
                    ha.partial_cmp(&hb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
        };
        match next {
            Some(i) => picked.push(pool.swap_remove(i)),
            None => break,
        }
    }
    picked
}

/// Randomly evict candidates beyond the template's target cap. Eviction
/// rather than truncation keeps the survivor set unbiased by selection
/// order.
fn enforce_target_cap(world: &mut World, template: &SpellTemplate, units: &mut Vec<ObjectGuid>) {
    let cap = template.max_affected_targets as usize;
    if cap == 0 || template.has_attr2(SpellAttr2::IGNORE_AREA_TARGET_CAP) {
        return;
    }
    while units.len() > cap {
        let idx = world.irand(0, units.len() as i32 - 1) as usize;
        units.remove(idx);
    }
}
