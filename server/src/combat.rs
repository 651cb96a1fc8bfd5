//! Combat resolution: hit rolls, damage mitigation, healing, threat and
//! proc firing. Everything here works on GUIDs against the world registry
//! so a despawned participant simply short-circuits.

use log::debug;

use arcanum_core::constants::{
    BASE_SPELL_MISS_PCT, HEAL_THREAT_FACTOR, SPELL_MISS_PER_LEVEL_PCT,
};
use arcanum_core::types::{
    AuraKind, ObjectGuid, SpellAttr2, SpellEffectTemplate, SpellMissInfo, SpellSchool,
    SpellTemplate, UnitFlags,
};

use crate::spell::messages;
use crate::world::World;

/// Mitigation breakdown of one damage application.
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageInfo {
    pub initial: u32,
    pub absorbed: u32,
    pub resisted: u32,
    pub blocked: u32,
    pub dealt: u32,
    pub crit: bool,
}

/// Precompute the hit outcome for one target. Runs at target-selection
/// time; delivery later replays the stored result.
pub fn roll_spell_hit(
    world: &mut World,
    caster: ObjectGuid,
    target: ObjectGuid,
    template: &SpellTemplate,
) -> SpellMissInfo {
    if template.has_attr2(SpellAttr2::IGNORE_HIT_RESULT) || caster == target {
        return SpellMissInfo::None;
    }
    let (caster_level, caster_pos) = match world.unit(caster) {
        Some(u) => (u.level, u.position),
        None => return SpellMissInfo::None,
    };
    let Some(victim) = world.unit(target) else {
        return SpellMissInfo::None;
    };
    if victim.flags.contains(UnitFlags::EVADING) {
        return SpellMissInfo::Evade;
    }
    if victim.is_immune_to_school(template.school)
        || victim.is_immune_to_mechanic(template.mechanic)
    {
        return SpellMissInfo::Immune;
    }

    let level_gap = victim.level.saturating_sub(caster_level) as f32;
    let miss_pct =
        (BASE_SPELL_MISS_PCT + level_gap * SPELL_MISS_PER_LEVEL_PCT).clamp(1.0, 99.0);
    let dodge_pct = victim.dodge_pct;
    let parry_pct = victim.parry_pct;
    let faces_caster = victim.position.has_in_front(&caster_pos);
    let resist_roll_pct = full_resist_pct(victim.resistances[template.school as usize]);

    if world.roll_pct(miss_pct) {
        return SpellMissInfo::Miss;
    }
    if template.school == SpellSchool::Physical {
        if world.roll_pct(dodge_pct) {
            return SpellMissInfo::Dodge;
        }
        // parry only applies to attacks from the front
        if faces_caster && world.roll_pct(parry_pct) {
            return SpellMissInfo::Parry;
        }
    } else if world.roll_pct(resist_roll_pct) {
        return SpellMissInfo::Resist;
    }
    SpellMissInfo::None
}

/// Whether a harmful spell bounces off the target's reflect auras.
pub fn roll_reflect(world: &mut World, target: ObjectGuid) -> bool {
    let chance = match world.unit(target) {
        Some(u) => u.reflect_chance(),
        None => 0,
    };
    chance > 0 && world.roll_pct(chance as f32)
}

/// Roll the flat-plus-die amount of one effect slot.
pub fn roll_effect_amount(world: &mut World, effect: &SpellEffectTemplate) -> i32 {
    let die = if effect.die_sides > 0 {
        world.irand(1, effect.die_sides)
    } else {
        0
    };
    effect.base_points + die
}

/// Chance in percent for a binary full resist against one school.
fn full_resist_pct(resistance: i32) -> f32 {
    (resistance.max(0) as f32 * 0.1).min(30.0)
}

/// Fraction of damage shaved off by partial resistance.
fn partial_resist_pct(resistance: i32) -> f32 {
    (resistance.max(0) as f32 * 0.05).min(40.0)
}

/// Run one damage application through mitigation (absorb, resist, block),
/// apply it, generate threat and the combat log message, and fire procs.
#[allow(clippy::too_many_arguments)]
pub fn deal_spell_damage(
    world: &mut World,
    caster: ObjectGuid,
    victim: ObjectGuid,
    school: SpellSchool,
    amount: u32,
    spell_id: u32,
    periodic: bool,
    crit: bool,
) -> DamageInfo {
    let mut info = DamageInfo {
        initial: amount,
        crit,
        ..Default::default()
    };
    let Some(victim_ref) = world.unit(victim) else {
        return info;
    };
    if !victim_ref.is_alive() {
        return info;
    }
    let resistance = victim_ref.resistances[school as usize];
    let block_pct = victim_ref.block_pct;
    let block_value = victim_ref.block_value;

    let mut remaining = amount;

    if let Some(v) = world.unit_mut(victim) {
        info.absorbed = v.consume_absorb(school, remaining);
    }
    remaining -= info.absorbed;

    if school != SpellSchool::Physical {
        info.resisted = (remaining as f32 * partial_resist_pct(resistance) / 100.0) as u32;
        remaining -= info.resisted;
    } else if remaining > 0 && world.roll_pct(block_pct) {
        info.blocked = block_value.min(remaining);
        remaining -= info.blocked;
    }

    let threat_mod = threat_multiplier(world, caster);
    let mut died = false;
    if let Some(v) = world.unit_mut(victim) {
        info.dealt = v.modify_health(-(remaining as i64));
        v.flags.insert(UnitFlags::IN_COMBAT);
        v.add_threat(caster, info.dealt as f32 * threat_mod);
        died = !v.is_alive();
    }
    if let Some(c) = world.unit_mut(caster) {
        c.flags.insert(UnitFlags::IN_COMBAT);
    }

    messages::send_damage_log(world, caster, victim, spell_id, school, &info, periodic);

    if died {
        handle_death(world, victim);
    } else if !periodic {
        fire_procs(world, caster, victim);
    }
    info
}

/// Heal up to the missing health, generate split threat against every
/// enemy engaged with the target, and log it.
pub fn heal(
    world: &mut World,
    caster: ObjectGuid,
    target: ObjectGuid,
    amount: u32,
    spell_id: u32,
    crit: bool,
) -> u32 {
    let effective = match world.unit_mut(target) {
        Some(t) if t.is_alive() => t.modify_health(amount as i64),
        _ => return 0,
    };

    // healing aggro: enemies fighting the target learn to hate the healer
    let engaged: Vec<ObjectGuid> = world
        .unit_guids()
        .into_iter()
        .filter(|g| {
            world
                .unit(*g)
                .is_some_and(|u| u.threat_against(target) > 0.0)
        })
        .collect();
    if !engaged.is_empty() {
        let split = effective as f32 * HEAL_THREAT_FACTOR / engaged.len() as f32;
        for guid in engaged {
            if let Some(u) = world.unit_mut(guid) {
                u.add_threat(caster, split);
            }
        }
    }

    messages::send_heal_log(world, caster, target, spell_id, effective, crit);
    effective
}

/// Fire proc-trigger auras on both sides of a landed hit: the attacker's
/// done-procs at the victim and the victim's taken-procs back at the
/// attacker. The triggered-cast depth guard bounds recursion.
pub fn fire_procs(world: &mut World, attacker: ObjectGuid, victim: ObjectGuid) {
    for (owner, other) in [(attacker, victim), (victim, attacker)] {
        let procs = match world.unit(owner) {
            Some(u) => u.proc_auras(),
            None => continue,
        };
        for (trigger_spell, chance) in procs {
            if world.roll_pct(chance as f32) {
                world.cast_triggered(owner, trigger_spell, other);
            }
        }
    }
}

/// Threat multiplier from the caster's threat-modifying auras.
fn threat_multiplier(world: &World, caster: ObjectGuid) -> f32 {
    match world.unit(caster) {
        Some(u) => (100 + u.aura_amount(AuraKind::ModThreat)).max(0) as f32 / 100.0,
        None => 1.0,
    }
}

fn handle_death(world: &mut World, guid: ObjectGuid) {
    debug!("{guid} died");
    world.interrupt_unit_casts(guid);
    if let Some(u) = world.unit_mut(guid) {
        u.clear_threat();
        u.remove_all_auras();
        u.flags.remove(UnitFlags::IN_COMBAT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SpellStore;
    use crate::unit::{Aura, Unit};
    use arcanum_core::types::{DispelType, Position};

    fn world_with_pair() -> (World, ObjectGuid, ObjectGuid) {
        let mut w = World::new(SpellStore::new(), 7);
        let a = ObjectGuid::player(1);
        let b = ObjectGuid::creature(2);
        w.insert_unit(Unit::new(a, "Caster", 10, 1, Position::default()));
        w.insert_unit(Unit::new(
            b,
            "Victim",
            10,
            14,
            Position::new(5.0, 0.0, 0.0, 0.0),
        ));
        (w, a, b)
    }

    #[test]
    fn test_damage_reduces_health_and_adds_threat() {
        let (mut w, a, b) = world_with_pair();
        let info = deal_spell_damage(&mut w, a, b, SpellSchool::Fire, 250, 133, false, false);
        assert_eq!(info.dealt, 250);
        let victim = w.unit(b).unwrap();
        assert_eq!(victim.health, 750);
        assert_eq!(victim.threat_against(a), 250.0);
        assert!(victim.flags.contains(UnitFlags::IN_COMBAT));
    }

    #[test]
    fn test_absorb_shield_eats_damage_first() {
        let (mut w, a, b) = world_with_pair();
        w.unit_mut(b).unwrap().apply_aura(Aura {
            spell_id: 17,
            effect_index: 0,
            caster: b,
            kind: AuraKind::SchoolAbsorb,
            amount: 100,
            school: SpellSchool::Fire,
            dispel: DispelType::Magic,
            duration_ms: 30_000,
            max_duration_ms: 30_000,
            amplitude_ms: 0,
            tick_timer_ms: 0,
            trigger_spell: 0,
        });
        let info = deal_spell_damage(&mut w, a, b, SpellSchool::Fire, 150, 133, false, false);
        assert_eq!(info.absorbed, 100);
        assert_eq!(info.dealt, 50);
        assert_eq!(w.unit(b).unwrap().health, 950);
    }

    #[test]
    fn test_overheal_is_clamped() {
        let (mut w, a, b) = world_with_pair();
        w.unit_mut(b).unwrap().modify_health(-300);
        let healed = heal(&mut w, a, b, 1_000, 2050, false);
        assert_eq!(healed, 300);
        assert_eq!(w.unit(b).unwrap().health, 1_000);
    }

    #[test]
    fn test_dead_target_takes_nothing() {
        let (mut w, a, b) = world_with_pair();
        w.unit_mut(b).unwrap().modify_health(-10_000);
        let info = deal_spell_damage(&mut w, a, b, SpellSchool::Fire, 100, 133, false, false);
        assert_eq!(info.dealt, 0);
        assert_eq!(heal(&mut w, a, b, 100, 2050, false), 0);
    }

    #[test]
    fn test_school_immunity_rolls_immune() {
        let (mut w, a, b) = world_with_pair();
        w.unit_mut(b).unwrap().school_immunity_mask = SpellSchool::Fire.mask();
        let t = SpellTemplate {
            school: SpellSchool::Fire,
            ..Default::default()
        };
        assert_eq!(roll_spell_hit(&mut w, a, b, &t), SpellMissInfo::Immune);
    }

    #[test]
    fn test_self_cast_never_misses() {
        let (mut w, a, _) = world_with_pair();
        let t = SpellTemplate::default();
        assert_eq!(roll_spell_hit(&mut w, a, a, &t), SpellMissInfo::None);
    }
}
