//! Effect execution.
//!
//! Each [`SpellEffectKind`] maps to one stateless handler in a global
//! registry, built once on first use. Handlers run per (effect slot,
//! target) at delivery time and do all their work through the world; the
//! spell itself only contributes read-mostly context (template, rolled
//! multipliers, reflection state).

use std::collections::HashMap;
use std::sync::OnceLock;

use log::{debug, warn};

use arcanum_core::constants::SPELL_CRIT_MULTIPLIER;
use arcanum_core::types::{
    AuraKind, DispelType, ObjectGuid, PowerType, SpellAttr2, SpellEffectKind, SpellSchool,
};

use crate::combat;
use crate::spell::messages;
use crate::spell::Spell;
use crate::unit::Aura;
use crate::world::World;

pub trait EffectHandler: Send + Sync {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid);
}

static HANDLERS: OnceLock<HashMap<SpellEffectKind, Box<dyn EffectHandler>>> = OnceLock::new();

fn handlers() -> &'static HashMap<SpellEffectKind, Box<dyn EffectHandler>> {
    HANDLERS.get_or_init(|| {
        let mut map: HashMap<SpellEffectKind, Box<dyn EffectHandler>> = HashMap::new();
        map.insert(SpellEffectKind::SchoolDamage, Box::new(SchoolDamage));
        map.insert(SpellEffectKind::Heal, Box::new(Heal));
        map.insert(SpellEffectKind::HealMaxHealth, Box::new(HealMaxHealth));
        map.insert(SpellEffectKind::Energize, Box::new(Energize));
        map.insert(SpellEffectKind::PowerDrain, Box::new(PowerDrain));
        map.insert(SpellEffectKind::PowerBurn, Box::new(PowerBurn));
        map.insert(SpellEffectKind::ApplyAura, Box::new(ApplyAura));
        map.insert(SpellEffectKind::ApplyAreaAura, Box::new(ApplyAura));
        map.insert(SpellEffectKind::WeaponDamage, Box::new(WeaponDamage));
        map.insert(SpellEffectKind::TriggerSpell, Box::new(TriggerSpell));
        map.insert(SpellEffectKind::Dispel, Box::new(Dispel));
        map.insert(SpellEffectKind::InterruptCast, Box::new(InterruptCast));
        map.insert(SpellEffectKind::KnockBack, Box::new(KnockBack));
        map.insert(SpellEffectKind::Dummy, Box::new(Dummy));
        map
    })
}

/// Dispatch one effect slot against one target.
pub fn execute(world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
    let kind = spell.template().effects[effect_index].kind;
    match handlers().get(&kind) {
        Some(handler) => handler.execute(world, spell, effect_index, target),
        None => warn!(
            "spell {} effect {effect_index}: no handler for {kind:?}",
            spell.template().id
        ),
    }
}

fn roll_crit(world: &mut World, spell: &Spell) -> bool {
    if spell.template().has_attr2(SpellAttr2::CANT_CRIT) {
        return false;
    }
    let chance = world
        .unit(spell.caster())
        .map(|u| u.spell_crit_pct)
        .unwrap_or(0.0);
    world.roll_pct(chance)
}

struct SchoolDamage;

impl EffectHandler for SchoolDamage {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let mut amount =
            combat::roll_effect_amount(world, &effect).max(0) as f32 * spell.damage_multiplier(effect_index);
        let crit = roll_crit(world, spell);
        if crit {
            amount *= SPELL_CRIT_MULTIPLIER;
        }
        let school = spell.template().school;
        let id = spell.template().id;
        combat::deal_spell_damage(world, spell.caster(), target, school, amount as u32, id, false, crit);
        // chains decay for each target already struck
        spell.decay_damage_multiplier(effect_index);
    }
}

struct Heal;

impl EffectHandler for Heal {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let mut amount =
            combat::roll_effect_amount(world, &effect).max(0) as f32 * spell.damage_multiplier(effect_index);
        let crit = roll_crit(world, spell);
        if crit {
            amount *= SPELL_CRIT_MULTIPLIER;
        }
        let id = spell.template().id;
        combat::heal(world, spell.caster(), target, amount as u32, id, crit);
        spell.decay_damage_multiplier(effect_index);
    }
}

struct HealMaxHealth;

impl EffectHandler for HealMaxHealth {
    fn execute(&self, world: &mut World, spell: &mut Spell, _effect_index: usize, target: ObjectGuid) {
        let missing = match world.unit(target) {
            Some(u) => u.max_health.saturating_sub(u.health),
            None => return,
        };
        let id = spell.template().id;
        combat::heal(world, spell.caster(), target, missing, id, false);
    }
}

struct Energize;

impl EffectHandler for Energize {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let power = power_from_misc(effect.misc_value);
        let amount = combat::roll_effect_amount(world, &effect).max(0) as u32;
        let gained = match world.unit_mut(target) {
            Some(u) => u.give_power(power, amount),
            None => return,
        };
        let id = spell.template().id;
        messages::send_energize_log(world, spell.caster(), target, id, power, gained);
    }
}

struct PowerDrain;

impl EffectHandler for PowerDrain {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let power = power_from_misc(effect.misc_value);
        let amount = combat::roll_effect_amount(world, &effect).max(0) as u32;
        let drained = match world.unit_mut(target) {
            Some(u) => {
                let drained = u.power(power).min(amount);
                u.spend_power(power, drained);
                drained
            }
            None => return,
        };
        let caster = spell.caster();
        if let Some(c) = world.unit_mut(caster) {
            c.give_power(power, drained);
        }
        let id = spell.template().id;
        messages::send_energize_log(world, caster, caster, id, power, drained);
    }
}

struct PowerBurn;

impl EffectHandler for PowerBurn {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let power = power_from_misc(effect.misc_value);
        let amount = combat::roll_effect_amount(world, &effect).max(0) as u32;
        let burned = match world.unit_mut(target) {
            Some(u) => {
                let burned = u.power(power).min(amount);
                u.spend_power(power, burned);
                burned
            }
            None => return,
        };
        // burned power converts to damage through the normal pipeline
        let damage = (burned as f32 * effect.dmg_multiplier) as u32;
        let school = spell.template().school;
        let id = spell.template().id;
        combat::deal_spell_damage(world, spell.caster(), target, school, damage, id, false, false);
    }
}

struct ApplyAura;

impl EffectHandler for ApplyAura {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let template = spell.template().clone();
        let effect = template.effects[effect_index];
        if effect.aura_kind == AuraKind::None {
            return;
        }
        let amount = combat::roll_effect_amount(world, &effect);

        let mut duration = template.duration_ms;
        // reflected casts skip diminishing entirely
        if duration > 0 && !spell.is_reflected() {
            let now = world.now();
            let Some(unit) = world.unit_mut(target) else {
                return;
            };
            duration = unit.diminishing.apply(template.dr_group, now, duration);
            if duration == 0 {
                debug!(
                    "{target} is diminishing-immune to spell {} ({:?})",
                    template.id, template.dr_group
                );
                return;
            }
        }

        let Some(unit) = world.unit_mut(target) else {
            return;
        };
        unit.apply_aura(Aura {
            spell_id: template.id,
            effect_index,
            caster: spell.caster(),
            kind: effect.aura_kind,
            amount,
            school: template.school,
            dispel: template.dispel,
            duration_ms: duration,
            max_duration_ms: duration,
            amplitude_ms: effect.amplitude_ms,
            tick_timer_ms: effect.amplitude_ms as i64,
            trigger_spell: effect.trigger_spell,
        });

        // hard control breaks whatever the victim was casting
        if matches!(
            effect.aura_kind,
            AuraKind::ModStun | AuraKind::ModFear | AuraKind::ModConfuse
        ) {
            world.interrupt_unit_casts(target);
        }
    }
}

struct WeaponDamage;

impl EffectHandler for WeaponDamage {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let amount = combat::roll_effect_amount(world, &effect).max(0) as f32
            * spell.damage_multiplier(effect_index);
        let crit = roll_crit(world, spell);
        let amount = if crit {
            amount * SPELL_CRIT_MULTIPLIER
        } else {
            amount
        };
        let id = spell.template().id;
        combat::deal_spell_damage(
            world,
            spell.caster(),
            target,
            SpellSchool::Physical,
            amount as u32,
            id,
            false,
            crit,
        );
    }
}

struct TriggerSpell;

impl EffectHandler for TriggerSpell {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let trigger = spell.template().effects[effect_index].trigger_spell;
        if trigger == 0 {
            warn!(
                "spell {} effect {effect_index} triggers nothing",
                spell.template().id
            );
            return;
        }
        world.cast_triggered(spell.caster(), trigger, target);
    }
}

struct Dispel;

impl EffectHandler for Dispel {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let effect = spell.template().effects[effect_index];
        let family = dispel_from_misc(effect.misc_value);
        let count = effect.base_points.max(1);
        let Some(unit) = world.unit_mut(target) else {
            return;
        };
        let mut removed = 0;
        for _ in 0..count {
            match unit.dispel_one(family) {
                Some(spell_id) => {
                    removed += 1;
                    debug!("dispelled spell {spell_id} ({family:?}) from {target}");
                }
                None => break,
            }
        }
        if removed == 0 {
            debug!("nothing to dispel on {target} ({family:?})");
        }
    }
}

struct InterruptCast;

impl EffectHandler for InterruptCast {
    fn execute(&self, world: &mut World, _spell: &mut Spell, _effect_index: usize, target: ObjectGuid) {
        world.interrupt_unit_casts(target);
    }
}

struct KnockBack;

impl EffectHandler for KnockBack {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let strength = spell.template().effects[effect_index].misc_value.max(0) as f32 / 10.0;
        let caster_pos = match world.unit(spell.caster()) {
            Some(u) => u.position,
            None => return,
        };
        let Some(unit) = world.unit_mut(target) else {
            return;
        };
        let away = caster_pos.angle_to(&unit.position);
        unit.position = unit.position.offset_polar(away, strength);
    }
}

struct Dummy;

impl EffectHandler for Dummy {
    fn execute(&self, world: &mut World, spell: &mut Spell, effect_index: usize, target: ObjectGuid) {
        let template = spell.template().clone();
        match world.store.override_for(template.id) {
            Some(handler) => {
                handler.dummy_effect(world, spell.caster(), &template, effect_index, target)
            }
            None => debug!(
                "unhandled dummy effect {effect_index} of spell {}",
                template.id
            ),
        }
    }
}

fn power_from_misc(misc: i32) -> PowerType {
    match misc {
        1 => PowerType::Rage,
        2 => PowerType::Focus,
        3 => PowerType::Energy,
        _ => PowerType::Mana,
    }
}

fn dispel_from_misc(misc: i32) -> DispelType {
    match misc {
        1 => DispelType::Magic,
        2 => DispelType::Curse,
        3 => DispelType::Disease,
        4 => DispelType::Poison,
        5 => DispelType::Stealth,
        6 => DispelType::Invisibility,
        9 => DispelType::Enrage,
        _ => DispelType::None,
    }
}
