//! The cast orchestrator.
//!
//! A [`Spell`] is one in-flight cast: it validates the request, claims a
//! cast slot, resolves targets with precomputed hit rolls, pays costs
//! exactly once, delivers per-target on travel deadlines, and winds down
//! through channeling or straight to finished. It lives in the world's
//! spell arena and is advanced only by its caster's event queue; between
//! advances it holds GUIDs, never references.

pub mod diminishing;
pub mod effects;
pub mod messages;
pub mod overrides;
pub mod resolver;
pub mod targets;

use std::sync::Arc;

use log::{debug, warn};

use arcanum_core::constants::{
    BASE_COMBAT_REACH, MAX_SPELL_EFFECTS, MIN_MISSILE_DIST, POWER_REFUND_PCT, TICK_MS,
};
use arcanum_core::types::{
    CurrentSpellSlot, ImplicitTarget, ObjectGuid, Position, SpellAttr0, SpellAttr1, SpellAttr2,
    SpellCastResult, SpellMissInfo, SpellSchool, SpellState, SpellTemplate, UnitFlags,
};

use crate::combat;
use crate::spell::messages::CastResultContext;
use crate::spell::targets::TargetingPayload;
use crate::world::{Ms, World};

/// Arena key of one in-flight cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpellInstanceId(pub u64);

impl std::fmt::Display for SpellInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spell#{}", self.0)
    }
}

/// What the event queue should do with a spell after one advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellEventOutcome {
    /// Wake the spell again after this many milliseconds.
    Reschedule(Ms),
    /// Drop the spell from the arena.
    Finished,
}

/// One resolved unit target with its precomputed delivery outcome.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedUnitTarget {
    pub guid: ObjectGuid,
    /// Bit per effect slot this target receives.
    pub effect_mask: u8,
    /// Hit outcome rolled at selection time and replayed at delivery.
    pub miss: SpellMissInfo,
    /// When `miss` is `Reflect`: the outcome of the bounced cast.
    pub reflect: SpellMissInfo,
    /// Travel delay from spell-go to impact.
    pub delay_ms: Ms,
    pub processed: bool,
}

#[derive(Debug, Clone, Copy)]
struct ResolvedObjectTarget {
    guid: ObjectGuid,
    effect_mask: u8,
    processed: bool,
}

pub struct Spell {
    id: SpellInstanceId,
    caster: ObjectGuid,
    template: Arc<SpellTemplate>,
    triggered: bool,
    state: SpellState,
    slot: CurrentSpellSlot,
    targets: TargetingPayload,
    unit_targets: Vec<ResolvedUnitTarget>,
    go_targets: Vec<ResolvedObjectTarget>,
    item_targets: Vec<ResolvedObjectTarget>,
    /// Per-effect running multiplier, decayed along chains.
    dmg_multipliers: [f32; MAX_SPELL_EFFECTS],
    cast_timer_ms: u32,
    /// World time the cast went off; travel offsets are relative to this.
    go_time: Ms,
    channel_end: Ms,
    cost_paid: u32,
    /// Set once any target reflected the cast back at us.
    reflected: bool,
}

impl Spell {
    pub fn new(
        id: SpellInstanceId,
        caster: ObjectGuid,
        template: Arc<SpellTemplate>,
        triggered: bool,
    ) -> Self {
        Self {
            id,
            caster,
            template,
            triggered,
            state: SpellState::Created,
            slot: CurrentSpellSlot::Generic,
            targets: TargetingPayload::new(),
            unit_targets: Vec::new(),
            go_targets: Vec::new(),
            item_targets: Vec::new(),
            dmg_multipliers: [1.0; MAX_SPELL_EFFECTS],
            cast_timer_ms: 0,
            go_time: 0,
            channel_end: 0,
            cost_paid: 0,
            reflected: false,
        }
    }

    pub fn id(&self) -> SpellInstanceId {
        self.id
    }

    pub fn caster(&self) -> ObjectGuid {
        self.caster
    }

    pub fn template(&self) -> &Arc<SpellTemplate> {
        &self.template
    }

    pub fn state(&self) -> SpellState {
        self.state
    }

    pub fn targets(&self) -> &TargetingPayload {
        &self.targets
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub(crate) fn is_reflected(&self) -> bool {
        self.reflected
    }

    pub fn unit_targets(&self) -> &[ResolvedUnitTarget] {
        &self.unit_targets
    }

    /// Milliseconds until the cast goes off; zero for instant casts.
    pub fn cast_delay(&self) -> Ms {
        self.cast_timer_ms as Ms
    }

    /// Longest per-target travel delay.
    pub fn max_travel_delay(&self) -> Ms {
        self.unit_targets
            .iter()
            .map(|t| t.delay_ms)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn damage_multiplier(&self, effect_index: usize) -> f32 {
        self.dmg_multipliers[effect_index]
    }

    pub(crate) fn decay_damage_multiplier(&mut self, effect_index: usize) {
        self.dmg_multipliers[effect_index] *= self.template.effects[effect_index].dmg_multiplier;
    }

    pub(crate) fn set_dest(&mut self, pos: Position) {
        self.targets.set_dest(pos);
    }

    pub fn hit_targets(&self) -> Vec<ObjectGuid> {
        let mut out: Vec<ObjectGuid> = self
            .unit_targets
            .iter()
            .filter(|t| t.miss == SpellMissInfo::None)
            .map(|t| t.guid)
            .collect();
        out.extend(self.go_targets.iter().map(|t| t.guid));
        out
    }

    pub fn miss_targets(&self) -> Vec<(ObjectGuid, SpellMissInfo)> {
        self.unit_targets
            .iter()
            .filter(|t| t.miss != SpellMissInfo::None)
            .map(|t| (t.guid, t.miss))
            .collect()
    }

    // -------------------------------------------------------------------
    // Target list construction (resolver entry points)
    // -------------------------------------------------------------------

    /// Add one unit target, merging effect masks if it was already
    /// selected by another slot so it is processed exactly once. The hit
    /// roll, reflection outcome and travel delay are fixed here and
    /// replayed verbatim at delivery.
    pub(crate) fn add_unit_target(
        &mut self,
        world: &mut World,
        guid: ObjectGuid,
        effect_index: usize,
    ) {
        let bit = 1u8 << effect_index;
        if let Some(existing) = self.unit_targets.iter_mut().find(|t| t.guid == guid) {
            existing.effect_mask |= bit;
            return;
        }
        let template = self.template.clone();
        let mut miss = if template.is_positive() {
            SpellMissInfo::None
        } else {
            combat::roll_spell_hit(world, self.caster, guid, &template)
        };
        let mut reflect = SpellMissInfo::None;
        if miss == SpellMissInfo::None
            && guid != self.caster
            && template.is_reflectable()
            && combat::roll_reflect(world, guid)
        {
            miss = SpellMissInfo::Reflect;
            reflect = if combat::roll_reflect(world, self.caster) {
                // second bounce: resolved to immunity at delivery
                SpellMissInfo::Reflect
            } else {
                combat::roll_spell_hit(world, guid, self.caster, &template)
            };
        }
        let delay_ms = self.travel_delay_to(world, guid);
        self.unit_targets.push(ResolvedUnitTarget {
            guid,
            effect_mask: bit,
            miss,
            reflect,
            delay_ms,
            processed: false,
        });
    }

    pub(crate) fn add_game_object_target(&mut self, guid: ObjectGuid, effect_index: usize) {
        let bit = 1u8 << effect_index;
        if let Some(existing) = self.go_targets.iter_mut().find(|t| t.guid == guid) {
            existing.effect_mask |= bit;
        } else {
            self.go_targets.push(ResolvedObjectTarget {
                guid,
                effect_mask: bit,
                processed: false,
            });
        }
    }

    pub(crate) fn add_item_target(&mut self, guid: ObjectGuid, effect_index: usize) {
        let bit = 1u8 << effect_index;
        if let Some(existing) = self.item_targets.iter_mut().find(|t| t.guid == guid) {
            existing.effect_mask |= bit;
        } else {
            self.item_targets.push(ResolvedObjectTarget {
                guid,
                effect_mask: bit,
                processed: false,
            });
        }
    }

    /// Travel time in whole milliseconds: distance (floored at the
    /// minimum missile distance) over projectile speed.
    fn travel_delay_to(&self, world: &World, guid: ObjectGuid) -> Ms {
        if self.template.speed <= 0.0 {
            return 0;
        }
        let (Some(caster), Some(target)) = (world.unit(self.caster), world.unit(guid)) else {
            return 0;
        };
        let dist = caster.position.dist(&target.position).max(MIN_MISSILE_DIST);
        (dist / self.template.speed * 1000.0).floor() as Ms
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// Validate the request and start the cast timer. On success the
    /// spell owns a cast slot and must be scheduled; on failure it has
    /// already reported and can be dropped.
    pub fn prepare(&mut self, world: &mut World, targets: TargetingPayload) -> SpellCastResult {
        self.targets = targets;
        self.targets.update(world, self.caster);
        self.state = SpellState::Targeting;

        let (result, ctx) = self.check_cast(world, true);
        if !result.is_success() {
            if !self.triggered {
                let template = self.template.clone();
                messages::send_cast_result(world, self.caster, &template, result, ctx);
            }
            debug!(
                "{} rejected spell {} for {}: {result:?}",
                self.id, self.template.id, self.caster
            );
            self.state = SpellState::Finished;
            return result;
        }

        // triggered casts run alongside whatever occupies the slots;
        // only a deliberate cast claims one and evicts the occupant
        if !self.triggered {
            let slot = self.pick_slot();
            self.slot = slot;
            let evicted = world
                .unit_mut(self.caster)
                .and_then(|u| u.set_current_spell(slot, self.id));
            if let Some(previous) = evicted.filter(|p| *p != self.id) {
                world.interrupt_spell(previous);
            }
        }

        self.cast_timer_ms = if self.triggered {
            0
        } else {
            self.template.cast_time_ms
        };
        self.state = SpellState::Casting;
        if self.cast_timer_ms > 0 {
            messages::send_spell_start(world, self);
        }
        SpellCastResult::Success
    }

    /// One advance from the caster's event queue.
    pub fn handle_event(&mut self, world: &mut World) -> SpellEventOutcome {
        match self.state {
            SpellState::Casting => self.cast(world),
            SpellState::Traveling => {
                let offset = world.now().saturating_sub(self.go_time);
                let next = self.handle_delayed(world, offset);
                if next == 0 {
                    self.finish_or_channel(world)
                } else {
                    SpellEventOutcome::Reschedule(next - offset)
                }
            }
            SpellState::Channeling => self.update_channel(world),
            SpellState::Finished => SpellEventOutcome::Finished,
            other => {
                warn!("{} advanced in unexpected state {other:?}", self.id);
                SpellEventOutcome::Finished
            }
        }
    }

    /// The cast timer elapsed: revalidate, resolve targets, pay costs,
    /// announce, and deliver (now or on travel deadlines).
    fn cast(&mut self, world: &mut World) -> SpellEventOutcome {
        // conditions may have changed during the cast time; cooldown and
        // movement are deliberately exempt from the re-check
        let (result, ctx) = self.check_cast(world, false);
        if !result.is_success() {
            self.fail(world, result, ctx);
            return SpellEventOutcome::Finished;
        }

        self.targets.update(world, self.caster);
        resolver::select_spell_targets(self, world);
        if self.no_valid_targets() {
            self.fail(world, SpellCastResult::NoValidTargets, CastResultContext::None);
            return SpellEventOutcome::Finished;
        }

        self.take_costs(world);
        if !self.triggered && self.template.recovery_ms > 0 {
            let now = world.now();
            if let Some(unit) = world.unit_mut(self.caster) {
                unit.start_cooldown(self.template.id, now, self.template.recovery_ms);
            }
        }

        messages::send_spell_go(world, self);
        self.go_time = world.now();

        let in_flight = self
            .unit_targets
            .iter()
            .any(|t| !t.processed && t.delay_ms > 0);
        if self.template.speed > 0.0 && in_flight {
            self.state = SpellState::Traveling;
            SpellEventOutcome::Reschedule(self.next_pending_delay(0))
        } else {
            for index in 0..self.unit_targets.len() {
                self.do_hit(world, index);
            }
            self.process_object_targets(world);
            self.finish_or_channel(world)
        }
    }

    /// Deliver every target whose travel delay has elapsed at `offset`
    /// milliseconds after spell-go. Idempotent: already-processed targets
    /// are skipped, so a replayed deadline does nothing. Returns the next
    /// pending delay, or zero when everything landed.
    pub fn handle_delayed(&mut self, world: &mut World, offset: Ms) -> Ms {
        for index in 0..self.unit_targets.len() {
            let target = self.unit_targets[index];
            if !target.processed && target.delay_ms <= offset {
                self.do_hit(world, index);
            }
        }
        let next = self.next_pending_delay(offset);
        if next == 0 {
            self.process_object_targets(world);
        }
        next
    }

    fn next_pending_delay(&self, offset: Ms) -> Ms {
        self.unit_targets
            .iter()
            .filter(|t| !t.processed && t.delay_ms > offset)
            .map(|t| t.delay_ms)
            .min()
            .unwrap_or(0)
    }

    /// Process one unit target exactly once, replaying its precomputed
    /// outcome. A target that despawned mid-flight is consumed silently.
    fn do_hit(&mut self, world: &mut World, index: usize) {
        if self.unit_targets[index].processed {
            return;
        }
        self.unit_targets[index].processed = true;
        let target = self.unit_targets[index];
        if world.unit(target.guid).is_none() {
            debug!("{} target {} despawned before impact", self.id, target.guid);
            return;
        }
        let spell_id = self.template.id;
        match target.miss {
            SpellMissInfo::None => {
                self.apply_effects(world, target.guid, target.effect_mask);
            }
            SpellMissInfo::Reflect => {
                messages::send_miss_log(
                    world,
                    self.caster,
                    target.guid,
                    spell_id,
                    SpellMissInfo::Reflect,
                );
                // a reflected reflect collapses to immunity; there is
                // never a second bounce
                let back = if target.reflect == SpellMissInfo::Reflect {
                    SpellMissInfo::Immune
                } else {
                    target.reflect
                };
                if back == SpellMissInfo::None {
                    self.reflected = true;
                    let caster = self.caster;
                    self.apply_effects(world, caster, target.effect_mask);
                } else {
                    messages::send_miss_log(world, target.guid, self.caster, spell_id, back);
                }
            }
            other => {
                messages::send_miss_log(world, self.caster, target.guid, spell_id, other);
            }
        }
    }

    fn apply_effects(&mut self, world: &mut World, target: ObjectGuid, mask: u8) {
        for index in 0..MAX_SPELL_EFFECTS {
            if mask & (1 << index) != 0 && self.template.effects[index].is_used() {
                effects::execute(world, self, index, target);
            }
        }
    }

    /// Game object and item targets have no travel delay; they land with
    /// the first delivery wave. Only dummy scripts act on them here.
    fn process_object_targets(&mut self, world: &mut World) {
        for index in 0..self.go_targets.len() {
            if self.go_targets[index].processed {
                continue;
            }
            self.go_targets[index].processed = true;
            let target = self.go_targets[index];
            if world.game_object(target.guid).is_none() {
                continue;
            }
            self.run_object_scripts(world, target.effect_mask);
        }
        for index in 0..self.item_targets.len() {
            if self.item_targets[index].processed {
                continue;
            }
            self.item_targets[index].processed = true;
            let target = self.item_targets[index];
            if world.item(target.guid).is_none() {
                continue;
            }
            self.run_object_scripts(world, target.effect_mask);
        }
    }

    fn run_object_scripts(&mut self, world: &mut World, mask: u8) {
        for index in 0..MAX_SPELL_EFFECTS {
            if mask & (1 << index) == 0 {
                continue;
            }
            let kind = self.template.effects[index].kind;
            if kind == arcanum_core::types::SpellEffectKind::Dummy {
                let caster = self.caster;
                effects::execute(world, self, index, caster);
            } else {
                debug!(
                    "spell {} effect {index} ({kind:?}) has no object script",
                    self.template.id
                );
            }
        }
    }

    fn finish_or_channel(&mut self, world: &mut World) -> SpellEventOutcome {
        self.state = SpellState::Landing;
        if self.template.is_channeled() && self.template.duration_ms > 0 {
            let duration = self.template.duration_ms;
            self.state = SpellState::Channeling;
            self.channel_end = world.now() + duration as Ms;
            messages::send_channel_start(world, self.caster, self.template.id, duration);
            return SpellEventOutcome::Reschedule(TICK_MS);
        }
        self.finish(world, true);
        SpellEventOutcome::Finished
    }

    fn update_channel(&mut self, world: &mut World) -> SpellEventOutcome {
        let now = world.now();
        if now >= self.channel_end {
            messages::send_channel_update(world, self.caster, 0);
            self.finish(world, true);
            return SpellEventOutcome::Finished;
        }
        SpellEventOutcome::Reschedule(TICK_MS.min(self.channel_end - now))
    }

    /// Break an in-flight cast: casting sends a failure, channeling
    /// strips the channel auras, traveling abandons unlanded targets.
    pub fn cancel(&mut self, world: &mut World) {
        match self.state {
            SpellState::Finished => return,
            SpellState::Casting => {
                messages::send_spell_failure(
                    world,
                    self.caster,
                    self.template.id,
                    SpellCastResult::Interrupted,
                );
            }
            SpellState::Channeling => {
                messages::send_channel_update(world, self.caster, 0);
                let spell_id = self.template.id;
                let caster = self.caster;
                let landed: Vec<ObjectGuid> = self
                    .unit_targets
                    .iter()
                    .filter(|t| t.processed && t.miss == SpellMissInfo::None)
                    .map(|t| t.guid)
                    .collect();
                for guid in landed {
                    if let Some(unit) = world.unit_mut(guid) {
                        unit.remove_auras_of_spell(spell_id, caster);
                    }
                }
            }
            SpellState::Traveling => {
                for target in self.unit_targets.iter_mut() {
                    target.processed = true;
                }
            }
            _ => {}
        }
        debug!("{} cancelled in state {:?}", self.id, self.state);
        self.finish(world, false);
    }

    fn fail(&mut self, world: &mut World, result: SpellCastResult, ctx: CastResultContext) {
        if !self.triggered {
            let template = self.template.clone();
            messages::send_cast_result(world, self.caster, &template, result, ctx);
            messages::send_spell_failure(world, self.caster, self.template.id, result);
        }
        debug!(
            "{} failed at execution for {}: {result:?}",
            self.id, self.caster
        );
        self.finish(world, false);
    }

    /// Terminal transition; idempotent. Releases the cast slot and, on a
    /// fully-avoided rage/energy cast, refunds most of the cost.
    fn finish(&mut self, world: &mut World, delivered: bool) {
        if self.state == SpellState::Finished {
            return;
        }
        self.state = SpellState::Finished;
        if delivered {
            self.maybe_refund_power(world);
        }
        if let Some(unit) = world.unit_mut(self.caster) {
            unit.clear_spell_slot(self.id);
        }
    }

    fn maybe_refund_power(&self, world: &mut World) {
        if self.cost_paid == 0
            || !self.template.power_type.refundable()
            || self.unit_targets.is_empty()
            || !self.unit_targets.iter().all(|t| t.miss.refunds_power())
        {
            return;
        }
        let refund = self.cost_paid * POWER_REFUND_PCT / 100;
        if let Some(unit) = world.unit_mut(self.caster) {
            unit.give_power(self.template.power_type, refund);
            debug!(
                "refunded {refund} {:?} to {} for fully avoided spell {}",
                self.template.power_type, self.caster, self.template.id
            );
        }
    }

    // -------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------

    fn pick_slot(&self) -> CurrentSpellSlot {
        if self.template.is_channeled() {
            CurrentSpellSlot::Channeled
        } else if self.template.has_attr0(SpellAttr0::ON_NEXT_SWING) {
            CurrentSpellSlot::Melee
        } else {
            CurrentSpellSlot::Generic
        }
    }

    fn needs_explicit_unit(&self) -> bool {
        self.template.effects().any(|(_, e)| {
            matches!(
                e.target_a,
                ImplicitTarget::UnitTargetEnemy
                    | ImplicitTarget::UnitTargetAlly
                    | ImplicitTarget::UnitTargetAny
                    | ImplicitTarget::UnitChainHealAlly
            )
        })
    }

    fn no_valid_targets(&self) -> bool {
        self.unit_targets.is_empty()
            && self.go_targets.is_empty()
            && self.item_targets.is_empty()
            && self.targets.dest().is_none()
            && self.template.effects().any(|(_, e)| {
                e.target_a != ImplicitTarget::None || e.target_b != ImplicitTarget::None
            })
    }

    /// The cast checks. `strict` runs the full set at cast start; the
    /// relaxed re-check at execution time skips cooldown and movement,
    /// which were valid when the cast was accepted. Read-only by
    /// construction: a failed check has mutated nothing.
    fn check_cast(&self, world: &World, strict: bool) -> (SpellCastResult, CastResultContext) {
        use SpellCastResult as R;
        let none = CastResultContext::None;
        let template = &self.template;

        let Some(caster) = world.unit(self.caster) else {
            return (R::Error, none);
        };
        if template.is_passive() {
            return (R::NotKnown, none);
        }
        if !caster.is_alive() && !template.has_attr0(SpellAttr0::CASTABLE_WHILE_DEAD) {
            return (R::CasterDead, none);
        }
        if strict && !self.triggered && !caster.spell_ready(template.id, world.now()) {
            return (R::NotReady, none);
        }

        let flags = caster.flags;
        if flags.contains(UnitFlags::STUNNED)
            && !template.has_attr0(SpellAttr0::CASTABLE_WHILE_STUNNED)
        {
            return (R::Stunned, none);
        }
        if flags.contains(UnitFlags::CONFUSED)
            && !template.has_attr0(SpellAttr0::CASTABLE_WHILE_CONFUSED)
        {
            return (R::Confused, none);
        }
        if flags.contains(UnitFlags::FLEEING)
            && !template.has_attr0(SpellAttr0::CASTABLE_WHILE_CONFUSED)
        {
            return (R::Fleeing, none);
        }
        if flags.contains(UnitFlags::PACIFIED) && template.school == SpellSchool::Physical {
            return (R::Pacified, none);
        }
        if flags.contains(UnitFlags::SILENCED)
            && template.school != SpellSchool::Physical
            && !template.has_attr1(SpellAttr1::ALLOW_WHILE_SILENCED)
        {
            return (R::Silenced, none);
        }
        if strict
            && flags.contains(UnitFlags::MOVING)
            && template.cast_time_ms > 0
            && !template.has_attr0(SpellAttr0::CASTABLE_WHILE_MOVING)
        {
            return (R::Moving, none);
        }

        if self.needs_explicit_unit() {
            let Some(target_guid) = self.targets.unit_target() else {
                return (R::BadImplicitTargets, none);
            };
            let Some(target) = world.unit(target_guid) else {
                return (R::BadTargets, none);
            };
            if !target.is_alive() && !template.has_attr2(SpellAttr2::ALLOW_DEAD_TARGET) {
                return (R::TargetsDead, none);
            }
            if target_guid != self.caster {
                if template.is_positive() && caster.is_hostile_to(target) {
                    return (R::TargetEnemy, none);
                }
                if !template.is_positive() && caster.is_friendly_to(target) {
                    return (R::TargetFriendly, none);
                }
                let dist = caster.position.dist(&target.position);
                if template.range_min > 0.0 && dist < template.range_min {
                    return (R::TooClose, none);
                }
                if dist > template.range_max + BASE_COMBAT_REACH * 2.0 {
                    return (R::OutOfRange, none);
                }
                if !template.has_attr0(SpellAttr0::IGNORE_LINE_OF_SIGHT)
                    && !world.in_line_of_sight(self.caster, target_guid)
                {
                    return (R::LineOfSight, none);
                }
            }
        }

        if !self.triggered {
            let cost = template.calc_power_cost(caster.max_power(template.power_type));
            if caster.power(template.power_type) < cost {
                return (R::NotEnoughPower, none);
            }
            for reagent in &template.reagents {
                if caster.count_items(reagent.entry) < reagent.count {
                    return (R::Reagents, CastResultContext::Reagent(reagent.entry));
                }
            }
            if template.is_ranged() && caster.ammo_count == 0 {
                return (R::NoAmmo, none);
            }
            if template.equipped_item_class >= 0
                && !caster.has_equipped(
                    template.equipped_item_class,
                    template.equipped_item_subclass_mask,
                )
            {
                return (
                    R::EquippedItemClass,
                    CastResultContext::EquippedItem(
                        template.equipped_item_class,
                        template.equipped_item_subclass_mask,
                    ),
                );
            }
            if let Some(area) = template.area_id {
                if caster.zone_id != area {
                    return (R::IncorrectArea, CastResultContext::Area(area));
                }
            }
            // a cast item must still exist and have a charge left
            if let Some(item_guid) = self.targets.item_target() {
                match world.item(item_guid) {
                    None => return (R::ItemNotFound, none),
                    Some(item) if item.charges == 0 => return (R::ItemGone, none),
                    Some(_) => {}
                }
            }
        }
        (R::Success, none)
    }

    /// Pay power, reagents and ammo, exactly once, after the final
    /// validation passed. Triggered casts are free.
    fn take_costs(&mut self, world: &mut World) {
        if self.triggered {
            return;
        }
        let template = self.template.clone();
        let Some(unit) = world.unit_mut(self.caster) else {
            return;
        };
        let cost = template.calc_power_cost(unit.max_power(template.power_type));
        if cost > 0 && unit.spend_power(template.power_type, cost) {
            self.cost_paid = cost;
        }
        for reagent in &template.reagents {
            if !unit.remove_items(reagent.entry, reagent.count) {
                // validated moments ago; only a teardown race gets here
                warn!(
                    "reagent {} vanished mid-cast of spell {}",
                    reagent.entry, template.id
                );
            }
        }
        if template.is_ranged() && unit.ammo_count > 0 {
            unit.ammo_count -= 1;
        }
        // negative charge counts mean an unlimited-use item
        if let Some(item_guid) = self.targets.item_target() {
            if let Some(item) = world.item_mut(item_guid) {
                if item.charges > 0 {
                    item.charges -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcanum_core::types::SpellEffectTemplate;

    fn template_with(attr1: SpellAttr1, attr0: SpellAttr0) -> Arc<SpellTemplate> {
        Arc::new(SpellTemplate {
            attributes: attr0.bits(),
            attributes_ex: attr1.bits(),
            ..Default::default()
        })
    }

    fn spell_for(template: Arc<SpellTemplate>) -> Spell {
        Spell::new(SpellInstanceId(1), ObjectGuid::player(1), template, false)
    }

    #[test]
    fn test_slot_selection() {
        let generic = spell_for(template_with(SpellAttr1::empty(), SpellAttr0::empty()));
        assert_eq!(generic.pick_slot(), CurrentSpellSlot::Generic);

        let channeled = spell_for(template_with(SpellAttr1::CHANNELED, SpellAttr0::empty()));
        assert_eq!(channeled.pick_slot(), CurrentSpellSlot::Channeled);

        let swing = spell_for(template_with(SpellAttr1::empty(), SpellAttr0::ON_NEXT_SWING));
        assert_eq!(swing.pick_slot(), CurrentSpellSlot::Melee);
    }

    #[test]
    fn test_effect_mask_merging() {
        let mut template = SpellTemplate::default();
        template.effects[0] = SpellEffectTemplate {
            kind: arcanum_core::types::SpellEffectKind::SchoolDamage,
            ..Default::default()
        };
        let mut spell = spell_for(Arc::new(template));
        // bypass the rolls by pushing directly
        spell.unit_targets.push(ResolvedUnitTarget {
            guid: ObjectGuid::creature(5),
            effect_mask: 0b001,
            miss: SpellMissInfo::None,
            reflect: SpellMissInfo::None,
            delay_ms: 0,
            processed: false,
        });
        let mut world = World::new(crate::store::SpellStore::new(), 1);
        spell.add_unit_target(&mut world, ObjectGuid::creature(5), 2);
        assert_eq!(spell.unit_targets.len(), 1);
        assert_eq!(spell.unit_targets[0].effect_mask, 0b101);
    }

    #[test]
    fn test_next_pending_delay() {
        let mut spell = spell_for(Arc::new(SpellTemplate::default()));
        for (delay, processed) in [(500u64, false), (300, false), (100, true)] {
            spell.unit_targets.push(ResolvedUnitTarget {
                guid: ObjectGuid::creature(delay),
                effect_mask: 1,
                miss: SpellMissInfo::None,
                reflect: SpellMissInfo::None,
                delay_ms: delay,
                processed,
            });
        }
        assert_eq!(spell.next_pending_delay(0), 300);
        assert_eq!(spell.next_pending_delay(300), 500);
        assert_eq!(spell.next_pending_delay(500), 0);
        assert_eq!(spell.max_travel_delay(), 500);
    }
}
