//! Units: players, creatures and pets.
//!
//! A unit is a plain registry entry owned by the world. Spells never hold
//! a reference to one across a suspension point; they hold the GUID and
//! re-resolve it. The methods here cover the invariant-carrying pieces:
//! aura bookkeeping, cast slots, cooldowns and power accounting.

use std::collections::HashMap;

use arcanum_core::constants::CURRENT_SPELL_SLOTS;
use arcanum_core::types::{
    AuraKind, CurrentSpellSlot, DispelType, Mechanic, ObjectGuid, Position, PowerType, SpellSchool,
    UnitFlags,
};

use crate::events::EventQueue;
use crate::spell::diminishing::DiminishingTracker;
use crate::spell::SpellInstanceId;
use crate::world::Ms;

/// A stack of identical items in a unit's bags.
#[derive(Debug, Clone, Copy)]
pub struct ItemStack {
    pub entry: u32,
    pub count: u32,
}

/// One equipped item, reduced to what cast validation needs.
#[derive(Debug, Clone, Copy)]
pub struct EquippedItem {
    pub class: i32,
    pub subclass: u32,
}

/// A persistent effect applied to a unit by a spell effect slot.
#[derive(Debug, Clone)]
pub struct Aura {
    pub spell_id: u32,
    pub effect_index: usize,
    pub caster: ObjectGuid,
    pub kind: AuraKind,
    pub amount: i32,
    pub school: SpellSchool,
    pub dispel: DispelType,
    /// Remaining duration; negative means permanent.
    pub duration_ms: i32,
    pub max_duration_ms: i32,
    /// Tick interval for periodic auras; zero for non-periodic.
    pub amplitude_ms: u32,
    /// Countdown to the next periodic tick.
    pub tick_timer_ms: i64,
    /// Spell launched by proc-trigger auras.
    pub trigger_spell: u32,
}

/// One pending periodic aura tick, collected by the aura update and
/// executed afterwards through the combat pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTick {
    pub target: ObjectGuid,
    pub caster: ObjectGuid,
    pub kind: AuraKind,
    pub amount: i32,
    pub school: SpellSchool,
    pub spell_id: u32,
}

#[derive(Debug)]
pub struct Unit {
    pub guid: ObjectGuid,
    pub name: String,
    /// Creature template entry; zero for players.
    pub entry: u32,
    pub level: u32,
    pub faction: u32,
    pub position: Position,
    pub zone_id: u32,
    pub health: u32,
    pub max_health: u32,
    pub flags: UnitFlags,
    pub group_id: Option<u32>,
    pub pet: Option<ObjectGuid>,
    /// One bit per school the unit is fully immune to.
    pub school_immunity_mask: u32,
    pub resistances: [i32; 7],
    pub dodge_pct: f32,
    pub parry_pct: f32,
    pub block_pct: f32,
    pub block_value: u32,
    pub spell_crit_pct: f32,
    pub ammo_count: u32,
    pub ammo_display_id: u32,
    pub inventory: Vec<ItemStack>,
    pub equipped: Vec<EquippedItem>,
    /// Items offered in the open trade window, indexed by trade slot.
    pub trade_items: Vec<ObjectGuid>,
    pub events: EventQueue,
    /// Depth of the currently running triggered-cast chain.
    pub cast_depth: u32,
    pub diminishing: DiminishingTracker,
    powers: [u32; 4],
    max_powers: [u32; 4],
    auras: Vec<Aura>,
    threat: HashMap<ObjectGuid, f32>,
    cooldowns: HashMap<u32, Ms>,
    current_spells: [Option<SpellInstanceId>; CURRENT_SPELL_SLOTS],
}

impl Unit {
    pub fn new(guid: ObjectGuid, name: &str, level: u32, faction: u32, position: Position) -> Self {
        let mut max_powers = [0u32; 4];
        max_powers[PowerType::Mana as usize] = 1_000;
        max_powers[PowerType::Energy as usize] = 100;
        max_powers[PowerType::Rage as usize] = 100;
        max_powers[PowerType::Focus as usize] = 100;
        let mut powers = max_powers;
        powers[PowerType::Rage as usize] = 0;
        Self {
            guid,
            name: name.to_string(),
            entry: 0,
            level,
            faction,
            position,
            zone_id: 0,
            health: 1_000,
            max_health: 1_000,
            flags: UnitFlags::empty(),
            group_id: None,
            pet: None,
            school_immunity_mask: 0,
            resistances: [0; 7],
            dodge_pct: 0.0,
            parry_pct: 0.0,
            block_pct: 0.0,
            block_value: 0,
            spell_crit_pct: 0.0,
            ammo_count: 0,
            ammo_display_id: 0,
            inventory: Vec::new(),
            equipped: Vec::new(),
            trade_items: Vec::new(),
            events: EventQueue::new(),
            cast_depth: 0,
            diminishing: DiminishingTracker::new(),
            powers,
            max_powers,
            auras: Vec::new(),
            threat: HashMap::new(),
            cooldowns: HashMap::new(),
            current_spells: [None; CURRENT_SPELL_SLOTS],
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn health_pct(&self) -> f32 {
        if self.max_health == 0 {
            0.0
        } else {
            self.health as f32 * 100.0 / self.max_health as f32
        }
    }

    /// Apply a signed health change, clamped to `[0, max]`. Returns the
    /// magnitude actually applied.
    pub fn modify_health(&mut self, delta: i64) -> u32 {
        let before = self.health;
        let after = (before as i64 + delta).clamp(0, self.max_health as i64) as u32;
        self.health = after;
        before.abs_diff(after)
    }

    pub fn power(&self, pt: PowerType) -> u32 {
        self.powers[pt as usize]
    }

    pub fn max_power(&self, pt: PowerType) -> u32 {
        self.max_powers[pt as usize]
    }

    pub fn set_power(&mut self, pt: PowerType, value: u32) {
        self.powers[pt as usize] = value.min(self.max_powers[pt as usize]);
    }

    pub fn set_max_power(&mut self, pt: PowerType, value: u32) {
        self.max_powers[pt as usize] = value;
        self.powers[pt as usize] = self.powers[pt as usize].min(value);
    }

    pub fn spend_power(&mut self, pt: PowerType, amount: u32) -> bool {
        let cur = self.powers[pt as usize];
        if cur < amount {
            return false;
        }
        self.powers[pt as usize] = cur - amount;
        true
    }

    pub fn give_power(&mut self, pt: PowerType, amount: u32) -> u32 {
        let cur = self.powers[pt as usize];
        let after = (cur + amount).min(self.max_powers[pt as usize]);
        self.powers[pt as usize] = after;
        after - cur
    }

    pub fn is_hostile_to(&self, other: &Unit) -> bool {
        self.faction != other.faction
    }

    pub fn is_friendly_to(&self, other: &Unit) -> bool {
        !self.is_hostile_to(other)
    }

    pub fn is_selectable(&self) -> bool {
        !self.flags.contains(UnitFlags::NOT_SELECTABLE)
    }

    pub fn is_in_same_group(&self, other: &Unit) -> bool {
        match (self.group_id, other.group_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.guid == other.guid,
        }
    }

    // -------------------------------------------------------------------
    // Auras
    // -------------------------------------------------------------------

    /// Attach an aura, replacing any previous application of the same
    /// effect slot by the same caster.
    pub fn apply_aura(&mut self, aura: Aura) {
        self.auras.retain(|a| {
            !(a.spell_id == aura.spell_id
                && a.effect_index == aura.effect_index
                && a.caster == aura.caster)
        });
        self.auras.push(aura);
        self.refresh_control_flags();
    }

    /// Remove every aura a given spell cast by `caster` applied here.
    pub fn remove_auras_of_spell(&mut self, spell_id: u32, caster: ObjectGuid) {
        self.auras
            .retain(|a| !(a.spell_id == spell_id && a.caster == caster));
        self.refresh_control_flags();
    }

    /// Drop every aura, as on death.
    pub fn remove_all_auras(&mut self) {
        self.auras.clear();
        self.refresh_control_flags();
    }

    /// Remove one aura of the given dispel family, newest first.
    pub fn dispel_one(&mut self, dispel: DispelType) -> Option<u32> {
        let idx = self.auras.iter().rposition(|a| a.dispel == dispel)?;
        let removed = self.auras.remove(idx);
        self.refresh_control_flags();
        Some(removed.spell_id)
    }

    pub fn auras(&self) -> &[Aura] {
        &self.auras
    }

    pub fn has_aura_kind(&self, kind: AuraKind) -> bool {
        self.auras.iter().any(|a| a.kind == kind)
    }

    pub fn has_aura_of_spell(&self, spell_id: u32) -> bool {
        self.auras.iter().any(|a| a.spell_id == spell_id)
    }

    /// Sum of amounts over every aura of one kind.
    pub fn aura_amount(&self, kind: AuraKind) -> i32 {
        self.auras
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.amount)
            .sum()
    }

    /// Chance in percent that a harmful spell bounces off this unit.
    pub fn reflect_chance(&self) -> i32 {
        self.aura_amount(AuraKind::ReflectSpells)
    }

    pub fn is_immune_to_mechanic(&self, mechanic: Mechanic) -> bool {
        mechanic != Mechanic::None
            && self
                .auras
                .iter()
                .any(|a| a.kind == AuraKind::ModMechanicImmunity && a.amount == mechanic as i32)
    }

    pub fn is_immune_to_school(&self, school: SpellSchool) -> bool {
        self.school_immunity_mask & school.mask() != 0
    }

    /// Eat incoming damage with absorb shields of a matching school.
    /// Returns the amount absorbed; depleted shields fall off.
    pub fn consume_absorb(&mut self, school: SpellSchool, damage: u32) -> u32 {
        let mut remaining = damage as i64;
        for aura in self.auras.iter_mut() {
            if remaining == 0 {
                break;
            }
            if aura.kind != AuraKind::SchoolAbsorb || aura.school != school {
                continue;
            }
            let eaten = remaining.min(aura.amount as i64).max(0);
            aura.amount -= eaten as i32;
            remaining -= eaten;
        }
        self.auras
            .retain(|a| a.kind != AuraKind::SchoolAbsorb || a.amount > 0);
        (damage as i64 - remaining) as u32
    }

    /// Proc-trigger auras as (trigger spell, chance percent) pairs.
    pub fn proc_auras(&self) -> Vec<(u32, i32)> {
        self.auras
            .iter()
            .filter(|a| a.kind == AuraKind::ProcTriggerSpell && a.trigger_spell != 0)
            .map(|a| (a.trigger_spell, a.amount))
            .collect()
    }

    /// Advance aura timers by one tick, gathering due periodic ticks into
    /// `out` and dropping expired auras.
    pub fn update_auras(&mut self, diff: Ms, out: &mut Vec<PeriodicTick>) {
        let target = self.guid;
        for aura in self.auras.iter_mut() {
            if aura.amplitude_ms > 0 && aura.kind.is_periodic() {
                aura.tick_timer_ms -= diff as i64;
                while aura.tick_timer_ms <= 0 {
                    aura.tick_timer_ms += aura.amplitude_ms as i64;
                    out.push(PeriodicTick {
                        target,
                        caster: aura.caster,
                        kind: aura.kind,
                        amount: aura.amount,
                        school: aura.school,
                        spell_id: aura.spell_id,
                    });
                }
            }
            if aura.duration_ms > 0 {
                aura.duration_ms -= (diff as i64).min(aura.duration_ms as i64) as i32;
            }
        }
        let before = self.auras.len();
        self.auras
            .retain(|a| a.duration_ms != 0 || a.max_duration_ms <= 0);
        if self.auras.len() != before {
            self.refresh_control_flags();
        }
    }

    /// Recompute the control flags derived from auras. Flags set by other
    /// systems (combat, movement) are preserved.
    fn refresh_control_flags(&mut self) {
        let derived = UnitFlags::STUNNED
            | UnitFlags::SILENCED
            | UnitFlags::CONFUSED
            | UnitFlags::FLEEING
            | UnitFlags::ROOTED;
        self.flags.remove(derived);
        for aura in &self.auras {
            match aura.kind {
                AuraKind::ModStun => self.flags.insert(UnitFlags::STUNNED),
                AuraKind::ModSilence => self.flags.insert(UnitFlags::SILENCED),
                AuraKind::ModConfuse => self.flags.insert(UnitFlags::CONFUSED),
                AuraKind::ModFear => self.flags.insert(UnitFlags::FLEEING),
                AuraKind::ModRoot => self.flags.insert(UnitFlags::ROOTED),
                _ => {}
            }
        }
    }

    // -------------------------------------------------------------------
    // Threat
    // -------------------------------------------------------------------

    pub fn add_threat(&mut self, attacker: ObjectGuid, amount: f32) {
        *self.threat.entry(attacker).or_insert(0.0) += amount;
    }

    pub fn threat_against(&self, attacker: ObjectGuid) -> f32 {
        self.threat.get(&attacker).copied().unwrap_or(0.0)
    }

    pub fn has_threat(&self) -> bool {
        !self.threat.is_empty()
    }

    pub fn clear_threat(&mut self) {
        self.threat.clear();
    }

    // -------------------------------------------------------------------
    // Cooldowns
    // -------------------------------------------------------------------

    pub fn spell_ready(&self, spell_id: u32, now: Ms) -> bool {
        match self.cooldowns.get(&spell_id) {
            Some(&ready_at) => now >= ready_at,
            None => true,
        }
    }

    pub fn start_cooldown(&mut self, spell_id: u32, now: Ms, recovery_ms: u32) {
        if recovery_ms > 0 {
            self.cooldowns.insert(spell_id, now + recovery_ms as Ms);
        }
    }

    pub fn cooldown_remaining(&self, spell_id: u32, now: Ms) -> Ms {
        self.cooldowns
            .get(&spell_id)
            .map(|&ready_at| ready_at.saturating_sub(now))
            .unwrap_or(0)
    }

    // -------------------------------------------------------------------
    // Cast slots
    // -------------------------------------------------------------------

    pub fn current_spell(&self, slot: CurrentSpellSlot) -> Option<SpellInstanceId> {
        self.current_spells[slot as usize]
    }

    /// Claim a cast slot, returning the previous occupant for the caller
    /// to interrupt.
    pub fn set_current_spell(
        &mut self,
        slot: CurrentSpellSlot,
        id: SpellInstanceId,
    ) -> Option<SpellInstanceId> {
        self.current_spells[slot as usize].replace(id)
    }

    /// Release whichever slot holds `id`, if any still does.
    pub fn clear_spell_slot(&mut self, id: SpellInstanceId) {
        for slot in self.current_spells.iter_mut() {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    /// Every spell this unit owns: slot occupants plus queued events.
    pub fn owned_spells(&self) -> Vec<SpellInstanceId> {
        let mut out: Vec<SpellInstanceId> = self.current_spells.iter().flatten().copied().collect();
        for id in self.events.spells() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    // -------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------

    pub fn count_items(&self, entry: u32) -> u32 {
        self.inventory
            .iter()
            .filter(|s| s.entry == entry)
            .map(|s| s.count)
            .sum()
    }

    pub fn add_items(&mut self, entry: u32, count: u32) {
        if let Some(stack) = self.inventory.iter_mut().find(|s| s.entry == entry) {
            stack.count += count;
        } else {
            self.inventory.push(ItemStack { entry, count });
        }
    }

    /// Remove `count` items of `entry`; fails without partial removal.
    pub fn remove_items(&mut self, entry: u32, count: u32) -> bool {
        if self.count_items(entry) < count {
            return false;
        }
        let mut left = count;
        for stack in self.inventory.iter_mut() {
            if stack.entry != entry || left == 0 {
                continue;
            }
            let taken = stack.count.min(left);
            stack.count -= taken;
            left -= taken;
        }
        self.inventory.retain(|s| s.count > 0);
        true
    }

    pub fn has_equipped(&self, class: i32, subclass_mask: u32) -> bool {
        self.equipped.iter().any(|e| {
            e.class == class && (subclass_mask == 0 || subclass_mask & (1 << e.subclass) != 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Unit {
        Unit::new(
            ObjectGuid::creature(1),
            "Test Subject",
            10,
            14,
            Position::default(),
        )
    }

    fn stun_aura(caster: ObjectGuid, duration_ms: i32) -> Aura {
        Aura {
            spell_id: 100,
            effect_index: 0,
            caster,
            kind: AuraKind::ModStun,
            amount: 0,
            school: SpellSchool::Physical,
            dispel: DispelType::None,
            duration_ms,
            max_duration_ms: duration_ms,
            amplitude_ms: 0,
            tick_timer_ms: 0,
            trigger_spell: 0,
        }
    }

    #[test]
    fn test_health_clamps() {
        let mut u = unit();
        assert_eq!(u.modify_health(-200), 200);
        assert_eq!(u.health, 800);
        assert_eq!(u.modify_health(5_000), 200);
        assert_eq!(u.health, u.max_health);
        assert_eq!(u.modify_health(-9_999), 1_000);
        assert!(!u.is_alive());
    }

    #[test]
    fn test_stun_aura_sets_and_clears_flag() {
        let mut u = unit();
        let caster = ObjectGuid::player(1);
        u.apply_aura(stun_aura(caster, 2_000));
        assert!(u.flags.contains(UnitFlags::STUNNED));

        let mut ticks = Vec::new();
        u.update_auras(1_999, &mut ticks);
        assert!(u.flags.contains(UnitFlags::STUNNED));
        u.update_auras(1, &mut ticks);
        assert!(!u.flags.contains(UnitFlags::STUNNED));
        assert!(u.auras().is_empty());
    }

    #[test]
    fn test_aura_replaces_same_slot_same_caster() {
        let mut u = unit();
        let caster = ObjectGuid::player(1);
        u.apply_aura(stun_aura(caster, 1_000));
        u.apply_aura(stun_aura(caster, 5_000));
        assert_eq!(u.auras().len(), 1);
        assert_eq!(u.auras()[0].duration_ms, 5_000);

        // a different caster stacks separately
        u.apply_aura(stun_aura(ObjectGuid::player(2), 3_000));
        assert_eq!(u.auras().len(), 2);
    }

    #[test]
    fn test_periodic_ticks_accumulate() {
        let mut u = unit();
        let mut dot = stun_aura(ObjectGuid::player(1), 6_000);
        dot.kind = AuraKind::PeriodicDamage;
        dot.amount = 50;
        dot.amplitude_ms = 1_000;
        dot.tick_timer_ms = 1_000;
        u.apply_aura(dot);

        let mut ticks = Vec::new();
        u.update_auras(2_500, &mut ticks);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].amount, 50);
    }

    #[test]
    fn test_absorb_consumption() {
        let mut u = unit();
        let mut shield = stun_aura(ObjectGuid::player(1), 30_000);
        shield.kind = AuraKind::SchoolAbsorb;
        shield.school = SpellSchool::Shadow;
        shield.amount = 100;
        u.apply_aura(shield);

        assert_eq!(u.consume_absorb(SpellSchool::Fire, 80), 0);
        assert_eq!(u.consume_absorb(SpellSchool::Shadow, 80), 80);
        // 20 left, then the shield falls off
        assert_eq!(u.consume_absorb(SpellSchool::Shadow, 80), 20);
        assert!(u.auras().is_empty());
    }

    #[test]
    fn test_cast_slot_eviction() {
        let mut u = unit();
        let a = SpellInstanceId(1);
        let b = SpellInstanceId(2);
        assert_eq!(u.set_current_spell(CurrentSpellSlot::Generic, a), None);
        assert_eq!(u.set_current_spell(CurrentSpellSlot::Generic, b), Some(a));
        assert_eq!(u.current_spell(CurrentSpellSlot::Generic), Some(b));
        u.clear_spell_slot(b);
        assert_eq!(u.current_spell(CurrentSpellSlot::Generic), None);
    }

    #[test]
    fn test_cooldowns() {
        let mut u = unit();
        assert!(u.spell_ready(133, 0));
        u.start_cooldown(133, 1_000, 8_000);
        assert!(!u.spell_ready(133, 8_999));
        assert!(u.spell_ready(133, 9_000));
        assert_eq!(u.cooldown_remaining(133, 5_000), 4_000);
    }

    #[test]
    fn test_reagent_removal_is_atomic() {
        let mut u = unit();
        u.add_items(17_056, 2);
        assert!(!u.remove_items(17_056, 3));
        assert_eq!(u.count_items(17_056), 2);
        assert!(u.remove_items(17_056, 2));
        assert_eq!(u.count_items(17_056), 0);
    }

    #[test]
    fn test_power_spend_and_refund() {
        let mut u = unit();
        u.set_max_power(PowerType::Energy, 100);
        u.set_power(PowerType::Energy, 100);
        assert!(u.spend_power(PowerType::Energy, 40));
        assert!(!u.spend_power(PowerType::Energy, 61));
        assert_eq!(u.give_power(PowerType::Energy, 32), 32);
        assert_eq!(u.power(PowerType::Energy), 92);
    }
}
