//! The world: object registries, the spell arena and the tick driver.
//!
//! All game state lives here and is touched only from the world-logic
//! thread. Spells are stored in an arena keyed by instance id; to advance
//! one, the world takes it out of the arena, lets it run against `&mut
//! World`, and puts it back unless it finished. Nothing else ever holds a
//! spell across a tick.

use std::collections::{HashMap, HashSet};

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arcanum_core::constants::{MAX_CAST_DEPTH, TICK_MS};
use arcanum_core::types::{
    AuraKind, CurrentSpellSlot, ObjectGuid, Position, SpellCastResult,
};

use crate::combat;
use crate::object::{Corpse, GameObject, ItemObject};
use crate::spell::targets::TargetingPayload;
use crate::spell::{Spell, SpellEventOutcome, SpellInstanceId};
use crate::store::SpellStore;
use crate::unit::{PeriodicTick, Unit};

/// World-relative time in milliseconds.
pub type Ms = u64;

/// One message queued for a client session. The world has no sockets; it
/// appends packets here and the session layer drains them.
#[derive(Debug, Clone)]
pub struct OutboundPacket {
    pub to: ObjectGuid,
    pub opcode: u16,
    pub payload: Vec<u8>,
}

pub struct World {
    pub store: SpellStore,
    units: HashMap<ObjectGuid, Unit>,
    unit_order: Vec<ObjectGuid>,
    game_objects: HashMap<ObjectGuid, GameObject>,
    items: HashMap<ObjectGuid, ItemObject>,
    corpses: HashMap<ObjectGuid, Corpse>,
    spells: HashMap<SpellInstanceId, Spell>,
    next_spell_serial: u64,
    rng: StdRng,
    now: Ms,
    packets: Vec<OutboundPacket>,
    /// Pairs of units with no line of sight between them. Stands in for
    /// terrain raycasts, which live outside this crate.
    los_blocked: HashSet<(u64, u64)>,
}

impl World {
    pub fn new(store: SpellStore, seed: u64) -> Self {
        Self {
            store,
            units: HashMap::new(),
            unit_order: Vec::new(),
            game_objects: HashMap::new(),
            items: HashMap::new(),
            corpses: HashMap::new(),
            spells: HashMap::new(),
            next_spell_serial: 1,
            rng: StdRng::seed_from_u64(seed),
            now: 0,
            packets: Vec::new(),
            los_blocked: HashSet::new(),
        }
    }

    pub fn now(&self) -> Ms {
        self.now
    }

    // -------------------------------------------------------------------
    // Registries
    // -------------------------------------------------------------------

    pub fn insert_unit(&mut self, unit: Unit) {
        let guid = unit.guid;
        if self.units.insert(guid, unit).is_none() {
            self.unit_order.push(guid);
        }
    }

    /// Tear a unit down: cancel every spell it owns, then drop it from
    /// the registry. Spells cast *at* it keep its GUID and simply find
    /// nothing when they next re-resolve.
    pub fn remove_unit(&mut self, guid: ObjectGuid) {
        let owned = match self.units.get(&guid) {
            Some(u) => u.owned_spells(),
            None => return,
        };
        for id in owned {
            self.interrupt_spell(id);
        }
        self.units.remove(&guid);
        self.unit_order.retain(|g| *g != guid);
        debug!("Removed unit {guid}");
    }

    pub fn unit(&self, guid: ObjectGuid) -> Option<&Unit> {
        self.units.get(&guid)
    }

    pub fn unit_mut(&mut self, guid: ObjectGuid) -> Option<&mut Unit> {
        self.units.get_mut(&guid)
    }

    pub fn insert_game_object(&mut self, go: GameObject) {
        self.game_objects.insert(go.guid, go);
    }

    pub fn game_object(&self, guid: ObjectGuid) -> Option<&GameObject> {
        self.game_objects.get(&guid)
    }

    pub fn insert_item(&mut self, item: ItemObject) {
        self.items.insert(item.guid, item);
    }

    pub fn item(&self, guid: ObjectGuid) -> Option<&ItemObject> {
        self.items.get(&guid)
    }

    pub fn item_mut(&mut self, guid: ObjectGuid) -> Option<&mut ItemObject> {
        self.items.get_mut(&guid)
    }

    pub fn insert_corpse(&mut self, corpse: Corpse) {
        self.corpses.insert(corpse.guid, corpse);
    }

    pub fn corpse(&self, guid: ObjectGuid) -> Option<&Corpse> {
        self.corpses.get(&guid)
    }

    pub fn spell(&self, id: SpellInstanceId) -> Option<&Spell> {
        self.spells.get(&id)
    }

    pub fn active_spell_count(&self) -> usize {
        self.spells.len()
    }

    // -------------------------------------------------------------------
    // Spatial queries
    // -------------------------------------------------------------------

    /// Every unit GUID, in registry insertion order.
    pub fn unit_guids(&self) -> Vec<ObjectGuid> {
        self.unit_order.clone()
    }

    /// Units within `radius` of a point, in registry insertion order.
    pub fn units_in_range(&self, center: &Position, radius: f32) -> Vec<ObjectGuid> {
        self.unit_order
            .iter()
            .filter(|g| {
                self.units
                    .get(g)
                    .is_some_and(|u| u.position.is_within_dist(center, radius))
            })
            .copied()
            .collect()
    }

    pub fn game_objects_in_range(&self, center: &Position, radius: f32) -> Vec<ObjectGuid> {
        self.game_objects
            .values()
            .filter(|go| go.position.is_within_dist(center, radius))
            .map(|go| go.guid)
            .collect()
    }

    pub fn group_members(&self, group_id: u32) -> Vec<ObjectGuid> {
        self.unit_order
            .iter()
            .filter(|g| {
                self.units
                    .get(g)
                    .is_some_and(|u| u.group_id == Some(group_id))
            })
            .copied()
            .collect()
    }

    // -------------------------------------------------------------------
    // Line of sight
    // -------------------------------------------------------------------

    pub fn block_line_of_sight(&mut self, a: ObjectGuid, b: ObjectGuid) {
        self.los_blocked.insert(los_key(a, b));
    }

    pub fn in_line_of_sight(&self, a: ObjectGuid, b: ObjectGuid) -> bool {
        !self.los_blocked.contains(&los_key(a, b))
    }

    // -------------------------------------------------------------------
    // Outbound packets
    // -------------------------------------------------------------------

    pub fn send(&mut self, to: ObjectGuid, opcode: u16, payload: Vec<u8>) {
        trace!("queueing opcode {opcode:#06x} for {to} ({} bytes)", payload.len());
        self.packets.push(OutboundPacket {
            to,
            opcode,
            payload,
        });
    }

    pub fn packets(&self) -> &[OutboundPacket] {
        &self.packets
    }

    pub fn drain_packets(&mut self) -> Vec<OutboundPacket> {
        std::mem::take(&mut self.packets)
    }

    // -------------------------------------------------------------------
    // Randomness
    // -------------------------------------------------------------------

    pub fn roll_pct(&mut self, chance_pct: f32) -> bool {
        self.rng.gen::<f32>() * 100.0 < chance_pct
    }

    pub fn irand(&mut self, lo: i32, hi: i32) -> i32 {
        if lo >= hi {
            lo
        } else {
            self.rng.gen_range(lo..=hi)
        }
    }

    pub fn frand(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    // -------------------------------------------------------------------
    // Casting entry points
    // -------------------------------------------------------------------

    /// Start a player- or AI-initiated cast. The result mirrors what the
    /// cast-result message reports; an async spell that later fails during
    /// execution still returns success here.
    pub fn cast_spell(
        &mut self,
        caster: ObjectGuid,
        spell_id: u32,
        targets: TargetingPayload,
    ) -> SpellCastResult {
        self.cast_spell_inner(caster, spell_id, targets, false)
    }

    /// Launch a triggered cast (proc, trigger effect) at one unit. These
    /// run instantly and silently, guarded against runaway chains.
    pub fn cast_triggered(
        &mut self,
        caster: ObjectGuid,
        spell_id: u32,
        target: ObjectGuid,
    ) -> SpellCastResult {
        {
            let Some(unit) = self.units.get_mut(&caster) else {
                return SpellCastResult::Error;
            };
            if unit.cast_depth >= MAX_CAST_DEPTH {
                warn!(
                    "trigger chain for spell {spell_id} by {caster} exceeded depth {MAX_CAST_DEPTH}, dropping"
                );
                return SpellCastResult::CastDepthExceeded;
            }
            unit.cast_depth += 1;
        }
        let mut targets = TargetingPayload::new();
        targets.set_unit_target(target);
        let result = self.cast_spell_inner(caster, spell_id, targets, true);
        if let Some(unit) = self.units.get_mut(&caster) {
            unit.cast_depth = unit.cast_depth.saturating_sub(1);
        }
        result
    }

    fn cast_spell_inner(
        &mut self,
        caster: ObjectGuid,
        spell_id: u32,
        targets: TargetingPayload,
        triggered: bool,
    ) -> SpellCastResult {
        let Some(template) = self.store.template(spell_id) else {
            debug!("{caster} tried to cast unknown spell {spell_id}");
            return SpellCastResult::NotKnown;
        };
        let id = self.alloc_spell_id();
        let mut spell = Spell::new(id, caster, template, triggered);
        let result = spell.prepare(self, targets);
        if !result.is_success() {
            return result;
        }
        let delay = spell.cast_delay();
        self.spells.insert(id, spell);
        if delay == 0 {
            // instant casts resolve within the current tick
            self.run_spell_event(caster, id);
        } else if let Some(unit) = self.units.get_mut(&caster) {
            unit.events.push(id, self.now + delay);
        }
        result
    }

    /// Cancel one in-flight spell and drop it from the arena.
    pub fn interrupt_spell(&mut self, id: SpellInstanceId) {
        let Some(mut spell) = self.spells.remove(&id) else {
            return;
        };
        spell.cancel(self);
        let caster = spell.caster();
        if let Some(unit) = self.units.get_mut(&caster) {
            unit.events.remove(id);
            unit.clear_spell_slot(id);
        }
    }

    /// Interrupt whatever the unit is actively casting or channeling.
    pub fn interrupt_unit_casts(&mut self, guid: ObjectGuid) {
        let slots = [CurrentSpellSlot::Generic, CurrentSpellSlot::Channeled];
        for slot in slots {
            if let Some(id) = self.units.get(&guid).and_then(|u| u.current_spell(slot)) {
                self.interrupt_spell(id);
            }
        }
    }

    fn alloc_spell_id(&mut self) -> SpellInstanceId {
        let id = SpellInstanceId(self.next_spell_serial);
        self.next_spell_serial += 1;
        id
    }

    // -------------------------------------------------------------------
    // Tick driver
    // -------------------------------------------------------------------

    /// Advance the world by `diff` milliseconds: run every due spell
    /// event, then tick auras.
    pub fn update(&mut self, diff: Ms) {
        self.now += diff;
        let order = self.unit_order.clone();
        for guid in order {
            let due = match self.units.get_mut(&guid) {
                Some(unit) => unit.events.take_due(self.now),
                None => continue,
            };
            for event in due {
                self.run_spell_event(guid, event.spell);
            }
        }
        self.update_auras(diff);
    }

    /// Advance one spell by taking it out of the arena, so it can mutate
    /// the world freely, and reinserting it unless it finished.
    fn run_spell_event(&mut self, caster: ObjectGuid, id: SpellInstanceId) {
        let Some(mut spell) = self.spells.remove(&id) else {
            return;
        };
        match spell.handle_event(self) {
            SpellEventOutcome::Reschedule(delay) => {
                let run_at = self.now + delay.max(TICK_MS);
                self.spells.insert(id, spell);
                if let Some(unit) = self.units.get_mut(&caster) {
                    unit.events.push(id, run_at);
                }
            }
            SpellEventOutcome::Finished => {
                if let Some(unit) = self.units.get_mut(&caster) {
                    unit.clear_spell_slot(id);
                    unit.events.remove(id);
                }
            }
        }
    }

    fn update_auras(&mut self, diff: Ms) {
        let mut ticks: Vec<PeriodicTick> = Vec::new();
        let order = self.unit_order.clone();
        for guid in order {
            if let Some(unit) = self.units.get_mut(&guid) {
                unit.update_auras(diff, &mut ticks);
            }
        }
        for tick in ticks {
            match tick.kind {
                AuraKind::PeriodicDamage => {
                    combat::deal_spell_damage(
                        self,
                        tick.caster,
                        tick.target,
                        tick.school,
                        tick.amount.max(0) as u32,
                        tick.spell_id,
                        true,
                        false,
                    );
                }
                AuraKind::PeriodicHeal => {
                    combat::heal(
                        self,
                        tick.caster,
                        tick.target,
                        tick.amount.max(0) as u32,
                        tick.spell_id,
                        false,
                    );
                }
                _ => {}
            }
        }
    }
}

fn los_key(a: ObjectGuid, b: ObjectGuid) -> (u64, u64) {
    let (x, y) = (a.raw(), b.raw());
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(SpellStore::new(), 42)
    }

    fn unit_at(counter: u64, x: f32, y: f32) -> Unit {
        Unit::new(
            ObjectGuid::creature(counter),
            "Grunt",
            10,
            14,
            Position::new(x, y, 0.0, 0.0),
        )
    }

    #[test]
    fn test_units_in_range() {
        let mut w = world();
        w.insert_unit(unit_at(1, 0.0, 0.0));
        w.insert_unit(unit_at(2, 5.0, 0.0));
        w.insert_unit(unit_at(3, 50.0, 0.0));

        let near = w.units_in_range(&Position::default(), 10.0);
        assert_eq!(near.len(), 2);
    }

    #[test]
    fn test_los_block_is_symmetric() {
        let mut w = world();
        let a = ObjectGuid::creature(1);
        let b = ObjectGuid::creature(2);
        assert!(w.in_line_of_sight(a, b));
        w.block_line_of_sight(b, a);
        assert!(!w.in_line_of_sight(a, b));
        assert!(!w.in_line_of_sight(b, a));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let mut a = world();
        let mut b = world();
        for _ in 0..16 {
            assert_eq!(a.irand(0, 100), b.irand(0, 100));
        }
    }

    #[test]
    fn test_unknown_spell_is_rejected() {
        let mut w = world();
        w.insert_unit(unit_at(1, 0.0, 0.0));
        let res = w.cast_spell(
            ObjectGuid::creature(1),
            999,
            TargetingPayload::new(),
        );
        assert_eq!(res, SpellCastResult::NotKnown);
        assert_eq!(w.active_spell_count(), 0);
    }
}
