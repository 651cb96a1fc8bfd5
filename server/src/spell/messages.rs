//! Outbound cast messages.
//!
//! Every optional trailing section is gated by exactly one cast-flag bit
//! and written in a fixed canonical order, so the client can parse the
//! message with a single forward pass. Log messages go to every player
//! involved; the world's packet queue drops anything aimed at an NPC.

use arcanum_core::constants::{
    SMSG_CAST_RESULT, SMSG_SPELL_CHANNEL_START, SMSG_SPELL_CHANNEL_UPDATE, SMSG_SPELL_DAMAGE_LOG,
    SMSG_SPELL_ENERGIZE_LOG, SMSG_SPELL_FAILURE, SMSG_SPELL_GO, SMSG_SPELL_HEAL_LOG,
    SMSG_SPELL_MISS_LOG, SMSG_SPELL_START,
};
use arcanum_core::types::{
    CastFlags, ObjectGuid, PowerType, SpellAttr0, SpellCastResult, SpellEffectKind, SpellMissInfo,
    SpellSchool, SpellTemplate, TargetMask,
};
use arcanum_core::wire::ByteWriter;

use crate::combat::DamageInfo;
use crate::spell::Spell;
use crate::world::World;

/// Extra context some failure codes carry after the result byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastResultContext {
    None,
    /// First missing reagent entry.
    Reagent(u32),
    /// Required equipped item class and subclass mask.
    EquippedItem(i32, u32),
    /// Zone the spell is restricted to.
    Area(u32),
}

/// Report a failed (or, for pending casts, accepted) cast request back to
/// a player caster. Silent codes and hidden-error spells produce nothing.
pub fn send_cast_result(
    world: &mut World,
    caster: ObjectGuid,
    template: &SpellTemplate,
    result: SpellCastResult,
    ctx: CastResultContext,
) {
    if !caster.is_player()
        || !result.is_reportable()
        || template.has_attr0(SpellAttr0::HIDDEN_CAST_ERRORS)
    {
        return;
    }
    let mut w = ByteWriter::new();
    w.write_u32(template.id);
    w.write_u8(result as u8);
    match ctx {
        CastResultContext::None => {}
        CastResultContext::Reagent(entry) => w.write_u32(entry),
        CastResultContext::EquippedItem(class, subclass_mask) => {
            w.write_i32(class);
            w.write_u32(subclass_mask);
        }
        CastResultContext::Area(zone) => w.write_u32(zone),
    }
    world.send(caster, SMSG_CAST_RESULT, w.into_inner());
}

/// Announce that a timed cast began.
pub fn send_spell_start(world: &mut World, spell: &Spell) {
    let template = spell.template();
    let mut flags = CastFlags::PENDING;
    if template.is_ranged() {
        flags |= CastFlags::AMMO;
    }
    let mut w = ByteWriter::new();
    w.write_packed_u64(spell.caster().raw());
    w.write_packed_u64(spell.caster().raw());
    w.write_u32(template.id);
    w.write_u32(flags.bits());
    w.write_u32(template.cast_time_ms);
    spell.targets().write(&mut w);
    if flags.contains(CastFlags::AMMO) {
        write_ammo_section(&mut w, world, spell.caster());
    }
    world.send(spell.caster(), SMSG_SPELL_START, w.into_inner());
}

/// Announce that the cast went off, with the final hit and miss lists.
pub fn send_spell_go(world: &mut World, spell: &Spell) {
    let template = spell.template();
    let caster = spell.caster();

    let mut flags = CastFlags::empty();
    if template.is_ranged() {
        flags |= CastFlags::AMMO;
    }
    if caster.is_player() {
        flags |= CastFlags::POWER_LEFT_SELF;
    }
    if spell.targets().mask().contains(TargetMask::TRAJECTORY) {
        flags |= CastFlags::ADJUST_MISSILE;
    }
    let predicted_heal: i32 = template
        .effects()
        .filter(|(_, e)| e.kind == SpellEffectKind::Heal)
        .map(|(_, e)| e.base_points)
        .sum();
    if predicted_heal > 0 {
        flags |= CastFlags::HEAL_PREDICTION;
    }

    let hits: Vec<ObjectGuid> = spell.hit_targets();
    let misses: Vec<(ObjectGuid, SpellMissInfo)> = spell.miss_targets();

    let mut w = ByteWriter::new();
    w.write_packed_u64(caster.raw());
    w.write_packed_u64(caster.raw());
    w.write_u32(template.id);
    w.write_u32(flags.bits());
    w.write_u32(world.now() as u32);
    // count bytes cap both lists; write only what the counts promise
    let hit_count = hits.len().min(u8::MAX as usize);
    let miss_count = misses.len().min(u8::MAX as usize);
    w.write_u8(hit_count as u8);
    for guid in hits.iter().take(hit_count) {
        w.write_u64(guid.raw());
    }
    w.write_u8(miss_count as u8);
    for (guid, miss) in misses.iter().take(miss_count) {
        w.write_u64(guid.raw());
        w.write_u8(*miss as u8);
    }
    spell.targets().write(&mut w);

    // optional sections, canonical order
    if flags.contains(CastFlags::POWER_LEFT_SELF) {
        let power = world
            .unit(caster)
            .map(|u| u.power(template.power_type))
            .unwrap_or(0);
        w.write_u32(power);
    }
    if flags.contains(CastFlags::ADJUST_MISSILE) {
        w.write_f32(spell.targets().elevation());
        w.write_u32(spell.max_travel_delay() as u32);
    }
    if flags.contains(CastFlags::AMMO) {
        write_ammo_section(&mut w, world, caster);
    }
    if flags.contains(CastFlags::HEAL_PREDICTION) {
        w.write_u32(predicted_heal as u32);
        w.write_u8(0);
    }
    world.send(caster, SMSG_SPELL_GO, w.into_inner());
}

/// Tell the client an in-flight cast broke.
pub fn send_spell_failure(
    world: &mut World,
    caster: ObjectGuid,
    spell_id: u32,
    result: SpellCastResult,
) {
    let mut w = ByteWriter::new();
    w.write_packed_u64(caster.raw());
    w.write_u32(spell_id);
    w.write_u8(result as u8);
    world.send(caster, SMSG_SPELL_FAILURE, w.into_inner());
}

pub fn send_channel_start(world: &mut World, caster: ObjectGuid, spell_id: u32, duration_ms: i32) {
    let mut w = ByteWriter::new();
    w.write_packed_u64(caster.raw());
    w.write_u32(spell_id);
    w.write_i32(duration_ms);
    world.send(caster, SMSG_SPELL_CHANNEL_START, w.into_inner());
}

pub fn send_channel_update(world: &mut World, caster: ObjectGuid, remaining_ms: u32) {
    let mut w = ByteWriter::new();
    w.write_packed_u64(caster.raw());
    w.write_u32(remaining_ms);
    world.send(caster, SMSG_SPELL_CHANNEL_UPDATE, w.into_inner());
}

pub fn send_damage_log(
    world: &mut World,
    attacker: ObjectGuid,
    victim: ObjectGuid,
    spell_id: u32,
    school: SpellSchool,
    info: &DamageInfo,
    periodic: bool,
) {
    let mut w = ByteWriter::new();
    w.write_packed_u64(victim.raw());
    w.write_packed_u64(attacker.raw());
    w.write_u32(spell_id);
    w.write_u32(info.dealt);
    w.write_u8(school as u8);
    w.write_u32(info.absorbed);
    w.write_u32(info.resisted);
    w.write_u32(info.blocked);
    w.write_u8(periodic as u8);
    w.write_u8(info.crit as u8);
    send_to_players(world, &[attacker, victim], SMSG_SPELL_DAMAGE_LOG, w);
}

pub fn send_miss_log(
    world: &mut World,
    attacker: ObjectGuid,
    victim: ObjectGuid,
    spell_id: u32,
    miss: SpellMissInfo,
) {
    let mut w = ByteWriter::new();
    w.write_u32(spell_id);
    w.write_u64(attacker.raw());
    w.write_u64(victim.raw());
    w.write_u8(miss as u8);
    send_to_players(world, &[attacker, victim], SMSG_SPELL_MISS_LOG, w);
}

pub fn send_heal_log(
    world: &mut World,
    caster: ObjectGuid,
    target: ObjectGuid,
    spell_id: u32,
    amount: u32,
    crit: bool,
) {
    let mut w = ByteWriter::new();
    w.write_packed_u64(target.raw());
    w.write_packed_u64(caster.raw());
    w.write_u32(spell_id);
    w.write_u32(amount);
    w.write_u8(crit as u8);
    send_to_players(world, &[caster, target], SMSG_SPELL_HEAL_LOG, w);
}

pub fn send_energize_log(
    world: &mut World,
    caster: ObjectGuid,
    target: ObjectGuid,
    spell_id: u32,
    power: PowerType,
    amount: u32,
) {
    let mut w = ByteWriter::new();
    w.write_packed_u64(target.raw());
    w.write_packed_u64(caster.raw());
    w.write_u32(spell_id);
    w.write_u32(power as u32);
    w.write_u32(amount);
    send_to_players(world, &[caster, target], SMSG_SPELL_ENERGIZE_LOG, w);
}

fn write_ammo_section(w: &mut ByteWriter, world: &World, caster: ObjectGuid) {
    let display_id = world
        .unit(caster)
        .map(|u| u.ammo_display_id)
        .unwrap_or(0);
    w.write_u32(display_id);
    // inventory type: ranged
    w.write_u32(26);
}

/// Send one message to every distinct player among the recipients.
fn send_to_players(world: &mut World, recipients: &[ObjectGuid], opcode: u16, w: ByteWriter) {
    let payload = w.into_inner();
    let mut sent: Vec<ObjectGuid> = Vec::new();
    for &guid in recipients {
        if guid.is_player() && !sent.contains(&guid) {
            world.send(guid, opcode, payload.clone());
            sent.push(guid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spell::{Spell, SpellInstanceId};
    use crate::store::SpellStore;
    use arcanum_core::wire::ByteReader;
    use std::sync::Arc;

    #[test]
    fn test_spell_go_hit_list_matches_its_count_byte() {
        let mut world = World::new(SpellStore::new(), 5);
        let caster = ObjectGuid::creature(1);
        let mut spell = Spell::new(
            SpellInstanceId(1),
            caster,
            Arc::new(SpellTemplate::default()),
            false,
        );
        for counter in 0u64..300 {
            spell.add_unit_target(&mut world, ObjectGuid::creature(100 + counter), 0);
        }

        send_spell_go(&mut world, &spell);
        let packet = &world.packets()[0];
        assert_eq!(packet.opcode, SMSG_SPELL_GO);

        // a single forward pass must consume the whole payload
        let mut r = ByteReader::new(&packet.payload);
        r.read_packed_u64().unwrap();
        r.read_packed_u64().unwrap();
        r.read_u32().unwrap(); // spell id
        r.read_u32().unwrap(); // cast flags
        r.read_u32().unwrap(); // timestamp
        let hit_count = r.read_u8().unwrap();
        assert_eq!(hit_count, u8::MAX);
        for _ in 0..hit_count {
            r.read_u64().unwrap();
        }
        assert_eq!(r.read_u8().unwrap(), 0); // miss count
        r.read_u32().unwrap(); // empty target mask
        assert_eq!(r.remaining(), 0);
    }
}
