//! End-to-end casts driven through a live world: scheduling, travel,
//! avoidance, reflection, diminishing returns and slot bookkeeping.

use arcanum_core::constants::{
    SMSG_SPELL_DAMAGE_LOG, SMSG_SPELL_FAILURE, SMSG_SPELL_MISS_LOG,
};
use arcanum_core::types::{
    AuraKind, CurrentSpellSlot, DiminishingGroup, ImplicitTarget, ObjectGuid, Position, PowerType,
    SpellAttr0, SpellAttr1, SpellAttr2, SpellCastResult, SpellEffectKind, SpellEffectTemplate,
    SpellSchool, SpellTemplate,
};
use arcanum_server::spell::targets::TargetingPayload;
use arcanum_server::store::SpellStore;
use arcanum_server::unit::Unit;
use arcanum_server::world::World;

const CASTER: u64 = 1;

fn world_with_caster() -> (World, ObjectGuid) {
    let mut w = World::new(SpellStore::new(), 1234);
    let caster = ObjectGuid::player(CASTER);
    w.insert_unit(Unit::new(caster, "Caster", 10, 1, Position::default()));
    (w, caster)
}

fn add_enemy(w: &mut World, counter: u64, x: f32, y: f32) -> ObjectGuid {
    let guid = ObjectGuid::creature(counter);
    w.insert_unit(Unit::new(guid, "Grunt", 10, 14, Position::new(x, y, 0.0, 0.0)));
    guid
}

/// Single-target damage spell that always lands.
fn bolt(id: u32) -> SpellTemplate {
    let mut t = SpellTemplate {
        id,
        name: "Bolt".into(),
        school: SpellSchool::Fire,
        power_cost: 30,
        attributes_ex2: SpellAttr2::IGNORE_HIT_RESULT.bits(),
        ..Default::default()
    };
    t.effects[0] = SpellEffectTemplate {
        kind: SpellEffectKind::SchoolDamage,
        target_a: ImplicitTarget::UnitTargetEnemy,
        base_points: 100,
        ..Default::default()
    };
    t
}

fn unit_payload(target: ObjectGuid) -> TargetingPayload {
    let mut p = TargetingPayload::new();
    p.set_unit_target(target);
    p
}

fn dest_payload(pos: Position) -> TargetingPayload {
    let mut p = TargetingPayload::new();
    p.set_dest(pos);
    p
}

fn health_of(w: &World, guid: ObjectGuid) -> u32 {
    w.unit(guid).map(|u| u.health).unwrap_or(0)
}

#[test]
fn test_travel_delay_from_distance_and_speed() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 30.0, 0.0);
    let mut t = bolt(133);
    t.speed = 10.0;
    w.store.insert_template(t);

    let res = w.cast_spell(caster, 133, unit_payload(target));
    assert_eq!(res, SpellCastResult::Success);

    // 30 yd at 10 yd/s: lands exactly at 3000ms
    w.update(1000);
    w.update(1000);
    assert_eq!(health_of(&w, target), 1000);
    w.update(1000);
    assert_eq!(health_of(&w, target), 900);
    assert_eq!(w.active_spell_count(), 0);
}

#[test]
fn test_travel_distance_has_a_floor() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 1.0, 0.0);
    let mut t = bolt(133);
    t.speed = 10.0;
    w.store.insert_template(t);

    w.cast_spell(caster, 133, unit_payload(target));

    // 1 yd is floored to 5 yd of flight: 500ms, not 100ms
    w.update(499);
    assert_eq!(health_of(&w, target), 1000);
    w.update(2);
    assert_eq!(health_of(&w, target), 900);
}

#[test]
fn test_per_target_delivery_is_exactly_once() {
    let (mut w, caster) = world_with_caster();
    let near = add_enemy(&mut w, 2, 10.0, 0.0);
    let far = add_enemy(&mut w, 3, 30.0, 0.0);
    let mut t = bolt(31);
    t.speed = 10.0;
    t.effects[0].target_a = ImplicitTarget::UnitDestAreaEnemy;
    t.effects[0].radius = 40.0;
    w.store.insert_template(t);

    w.cast_spell(caster, 31, dest_payload(Position::default()));

    // near target lands at 1000ms, far at 3000ms
    w.update(1000);
    assert_eq!(health_of(&w, near), 900);
    assert_eq!(health_of(&w, far), 1000);
    w.update(1000);
    w.update(1000);
    assert_eq!(health_of(&w, far), 900);
    // the earlier impact did not replay
    assert_eq!(health_of(&w, near), 900);
    w.update(1000);
    assert_eq!(health_of(&w, near), 900);
    assert_eq!(health_of(&w, far), 900);
}

#[test]
fn test_area_target_cap_limits_victims() {
    let (mut w, caster) = world_with_caster();
    let enemies: Vec<ObjectGuid> = (0..9)
        .map(|i| add_enemy(&mut w, 10 + i, i as f32, 1.0))
        .collect();
    let mut t = bolt(42);
    t.max_affected_targets = 5;
    t.effects[0].target_a = ImplicitTarget::UnitDestAreaEnemy;
    t.effects[0].radius = 20.0;
    w.store.insert_template(t);

    w.cast_spell(caster, 42, dest_payload(Position::default()));

    let struck = enemies
        .iter()
        .filter(|g| health_of(&w, **g) < 1000)
        .count();
    assert_eq!(struck, 5);
}

#[test]
fn test_chain_walks_nearest_and_respects_cap() {
    let (mut w, caster) = world_with_caster();
    let first = add_enemy(&mut w, 2, 5.0, 0.0);
    let second = add_enemy(&mut w, 3, 8.0, 0.0);
    let third = add_enemy(&mut w, 4, 12.0, 0.0);
    let outside = add_enemy(&mut w, 5, 45.0, 0.0);
    let mut t = bolt(421);
    t.effects[0].chain_targets = 3;
    w.store.insert_template(t);

    w.cast_spell(caster, 421, unit_payload(first));

    assert_eq!(health_of(&w, first), 900);
    assert_eq!(health_of(&w, second), 900);
    assert_eq!(health_of(&w, third), 900);
    assert_eq!(health_of(&w, outside), 1000);
}

#[test]
fn test_cooldown_rejects_without_side_effects() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    let mut t = bolt(116);
    t.recovery_ms = 6_000;
    w.store.insert_template(t);

    assert_eq!(
        w.cast_spell(caster, 116, unit_payload(target)),
        SpellCastResult::Success
    );
    assert_eq!(health_of(&w, target), 900);
    let mana_after_first = w.unit(caster).unwrap().power(PowerType::Mana);

    assert_eq!(
        w.cast_spell(caster, 116, unit_payload(target)),
        SpellCastResult::NotReady
    );
    assert_eq!(health_of(&w, target), 900);
    assert_eq!(w.unit(caster).unwrap().power(PowerType::Mana), mana_after_first);
    assert_eq!(w.active_spell_count(), 0);
}

#[test]
fn test_new_cast_evicts_and_interrupts_slot_holder() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    let mut t = bolt(686);
    t.cast_time_ms = 2_000;
    w.store.insert_template(t);

    w.cast_spell(caster, 686, unit_payload(target));
    let first = w.unit(caster).unwrap().current_spell(CurrentSpellSlot::Generic);
    assert!(first.is_some());
    assert_eq!(w.active_spell_count(), 1);

    w.cast_spell(caster, 686, unit_payload(target));
    let second = w.unit(caster).unwrap().current_spell(CurrentSpellSlot::Generic);
    assert!(second.is_some());
    assert_ne!(first, second);
    assert_eq!(w.active_spell_count(), 1);
    assert!(w
        .packets()
        .iter()
        .any(|p| p.opcode == SMSG_SPELL_FAILURE));

    // only the replacement finishes its cast
    w.update(2_000);
    assert_eq!(health_of(&w, target), 900);
}

#[test]
fn test_reflected_reflect_resolves_to_immune() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    for guid in [caster, target] {
        w.unit_mut(guid).unwrap().apply_aura(arcanum_server::unit::Aura {
            spell_id: 23_920,
            effect_index: 0,
            caster: guid,
            kind: AuraKind::ReflectSpells,
            amount: 100,
            school: SpellSchool::Physical,
            dispel: arcanum_core::types::DispelType::Magic,
            duration_ms: -1,
            max_duration_ms: -1,
            amplitude_ms: 0,
            tick_timer_ms: 0,
            trigger_spell: 0,
        });
    }
    w.store.insert_template(bolt(133));

    w.cast_spell(caster, 133, unit_payload(target));

    // bounced, bounced again, fizzled: nobody takes damage
    assert_eq!(health_of(&w, caster), 1000);
    assert_eq!(health_of(&w, target), 1000);
    assert!(!w.packets().iter().any(|p| p.opcode == SMSG_SPELL_DAMAGE_LOG));
    let miss_codes: Vec<u8> = w
        .packets()
        .iter()
        .filter(|p| p.opcode == SMSG_SPELL_MISS_LOG)
        .filter_map(|p| p.payload.last().copied())
        .collect();
    assert!(miss_codes.contains(&(arcanum_core::types::SpellMissInfo::Reflect as u8)));
    assert!(miss_codes.contains(&(arcanum_core::types::SpellMissInfo::Immune as u8)));
}

#[test]
fn test_diminishing_returns_across_casts() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    let mut t = bolt(853);
    t.duration_ms = 10_000;
    t.dr_group = DiminishingGroup::Stun;
    t.effects[0] = SpellEffectTemplate {
        kind: SpellEffectKind::ApplyAura,
        target_a: ImplicitTarget::UnitTargetEnemy,
        aura_kind: AuraKind::ModStun,
        ..Default::default()
    };
    w.store.insert_template(t);

    let stun_duration = |w: &World| {
        w.unit(target)
            .unwrap()
            .auras()
            .iter()
            .find(|a| a.spell_id == 853)
            .map(|a| a.max_duration_ms)
    };

    w.cast_spell(caster, 853, unit_payload(target));
    assert_eq!(stun_duration(&w), Some(10_000));
    w.cast_spell(caster, 853, unit_payload(target));
    assert_eq!(stun_duration(&w), Some(5_000));
    w.cast_spell(caster, 853, unit_payload(target));
    assert_eq!(stun_duration(&w), Some(2_500));

    // fourth application inside the window: immune, aura untouched
    w.cast_spell(caster, 853, unit_payload(target));
    assert_eq!(stun_duration(&w), Some(2_500));

    // a quiet window resets the ladder
    w.update(16_000);
    w.cast_spell(caster, 853, unit_payload(target));
    assert_eq!(stun_duration(&w), Some(10_000));
}

#[test]
fn test_fully_avoided_cast_refunds_most_of_the_rage() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    w.unit_mut(target).unwrap().dodge_pct = 100.0;
    w.unit_mut(caster).unwrap().set_power(PowerType::Rage, 100);

    let mut t = bolt(845);
    t.school = SpellSchool::Physical;
    t.power_type = PowerType::Rage;
    t.power_cost = 50;
    // the whole point is the avoidance roll
    t.attributes_ex2 = 0;
    w.store.insert_template(t);

    assert_eq!(
        w.cast_spell(caster, 845, unit_payload(target)),
        SpellCastResult::Success
    );
    assert_eq!(health_of(&w, target), 1000);
    // 100 - 50 cost + 80% of it back
    assert_eq!(w.unit(caster).unwrap().power(PowerType::Rage), 90);
}

#[test]
fn test_cancelled_channel_strips_its_auras() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    let mut t = bolt(10_911);
    t.attributes_ex = SpellAttr1::CHANNELED.bits();
    t.duration_ms = 9_000;
    t.effects[0] = SpellEffectTemplate {
        kind: SpellEffectKind::ApplyAura,
        target_a: ImplicitTarget::UnitTargetEnemy,
        aura_kind: AuraKind::PeriodicDamage,
        base_points: 50,
        amplitude_ms: 3_000,
        ..Default::default()
    };
    w.store.insert_template(t);

    w.cast_spell(caster, 10_911, unit_payload(target));
    assert!(w.unit(target).unwrap().has_aura_of_spell(10_911));
    assert_eq!(w.active_spell_count(), 1);

    w.interrupt_unit_casts(caster);
    assert!(!w.unit(target).unwrap().has_aura_of_spell(10_911));
    assert_eq!(w.active_spell_count(), 0);
}

#[test]
fn test_triggered_cast_leaves_the_slot_holder_alone() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    let mut slow = bolt(686);
    slow.cast_time_ms = 2_000;
    w.store.insert_template(slow);
    w.store.insert_template(bolt(900));

    w.cast_spell(caster, 686, unit_payload(target));
    let holder = w.unit(caster).unwrap().current_spell(CurrentSpellSlot::Generic);
    assert!(holder.is_some());

    // a proc goes off mid-cast; it lands but claims no slot
    w.cast_triggered(caster, 900, target);
    assert_eq!(health_of(&w, target), 900);
    assert_eq!(
        w.unit(caster).unwrap().current_spell(CurrentSpellSlot::Generic),
        holder
    );
    assert_eq!(w.active_spell_count(), 1);

    // the original cast still finishes
    w.update(2_000);
    assert_eq!(health_of(&w, target), 800);
}

#[test]
fn test_chain_hop_stops_at_blocked_sight() {
    let (mut w, caster) = world_with_caster();
    let first = add_enemy(&mut w, 2, 5.0, 0.0);
    let second = add_enemy(&mut w, 3, 8.0, 0.0);
    w.block_line_of_sight(first, second);
    let mut t = bolt(421);
    t.effects[0].chain_targets = 2;
    w.store.insert_template(t);

    w.cast_spell(caster, 421, unit_payload(first));

    assert_eq!(health_of(&w, first), 900);
    assert_eq!(health_of(&w, second), 1000);
}

#[test]
fn test_chain_hop_through_walls_when_flagged() {
    let (mut w, caster) = world_with_caster();
    let first = add_enemy(&mut w, 2, 5.0, 0.0);
    let second = add_enemy(&mut w, 3, 8.0, 0.0);
    w.block_line_of_sight(first, second);
    let mut t = bolt(512);
    t.attributes = SpellAttr0::IGNORE_LINE_OF_SIGHT.bits();
    t.effects[0].chain_targets = 2;
    w.store.insert_template(t);

    w.cast_spell(caster, 512, unit_payload(first));

    assert_eq!(health_of(&w, first), 900);
    assert_eq!(health_of(&w, second), 900);
}

#[test]
fn test_source_area_rider_bursts_at_the_source() {
    let (mut w, caster) = world_with_caster();
    let near_src = add_enemy(&mut w, 2, 2.0, 0.0);
    let anchor = add_enemy(&mut w, 3, 40.0, 0.0);
    let mut t = bolt(601);
    t.effects[0].target_a = ImplicitTarget::DestTarget;
    t.effects[0].target_b = ImplicitTarget::UnitSrcAreaEnemy;
    t.effects[0].radius = 10.0;
    w.store.insert_template(t);

    // destination sits on the far anchor, source stays at the caster
    let mut p = unit_payload(anchor);
    p.set_src(Position::default());
    w.cast_spell(caster, 601, p);

    assert_eq!(health_of(&w, near_src), 900);
    assert_eq!(health_of(&w, anchor), 1000);
}

#[test]
fn test_dead_caster_cannot_cast() {
    let (mut w, caster) = world_with_caster();
    let target = add_enemy(&mut w, 2, 5.0, 0.0);
    w.store.insert_template(bolt(133));
    w.unit_mut(caster).unwrap().modify_health(-10_000);

    assert_eq!(
        w.cast_spell(caster, 133, unit_payload(target)),
        SpellCastResult::CasterDead
    );
    assert_eq!(health_of(&w, target), 1000);
}
