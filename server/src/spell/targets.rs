//! The client-supplied targeting payload.
//!
//! A cast request names its explicit targets with a presence mask followed
//! by only the fields the mask gates, in a fixed order. The payload stores
//! GUIDs, never object references; [`TargetingPayload::update`] re-resolves
//! them against the live world immediately before they are consulted, so a
//! target that despawned during the cast time silently drops out.

use arcanum_core::types::{ObjectGuid, Position, TargetMask};
use arcanum_core::wire::{ByteReader, ByteWriter, WireError, WireResult};

use crate::world::World;

#[derive(Debug, Clone, Default)]
pub struct TargetingPayload {
    mask: TargetMask,
    unit: ObjectGuid,
    game_object: ObjectGuid,
    item: ObjectGuid,
    corpse: ObjectGuid,
    /// Slot index into the caster's open trade window; resolved to an
    /// item GUID only when consulted, since the trade may still mutate.
    trade_slot: u8,
    src: Option<Position>,
    dest: Option<Position>,
    /// Missile elevation and speed for trajectory casts.
    elevation: f32,
    missile_speed: f32,
    text: String,
    // live bindings, refreshed by update()
    bound_unit: Option<ObjectGuid>,
    bound_game_object: Option<ObjectGuid>,
    bound_item: Option<ObjectGuid>,
    bound_corpse: Option<ObjectGuid>,
}

impl TargetingPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> TargetMask {
        self.mask
    }

    pub fn set_unit_target(&mut self, guid: ObjectGuid) {
        self.unit = guid;
        self.mask.insert(TargetMask::UNIT);
        self.bound_unit = Some(guid);
    }

    pub fn set_game_object_target(&mut self, guid: ObjectGuid) {
        self.game_object = guid;
        self.mask.insert(TargetMask::GAMEOBJECT);
        self.bound_game_object = Some(guid);
    }

    pub fn set_item_target(&mut self, guid: ObjectGuid) {
        self.item = guid;
        self.mask.insert(TargetMask::ITEM);
        self.bound_item = Some(guid);
    }

    pub fn set_src(&mut self, pos: Position) {
        self.src = Some(pos);
        self.mask.insert(TargetMask::SOURCE_LOCATION);
    }

    pub fn set_dest(&mut self, pos: Position) {
        self.dest = Some(pos);
        self.mask.insert(TargetMask::DEST_LOCATION);
    }

    /// The explicit unit target, if it still exists in the world.
    pub fn unit_target(&self) -> Option<ObjectGuid> {
        self.bound_unit
    }

    /// The raw unit GUID as sent, live or not.
    pub fn raw_unit_guid(&self) -> ObjectGuid {
        self.unit
    }

    pub fn game_object_target(&self) -> Option<ObjectGuid> {
        self.bound_game_object
    }

    pub fn item_target(&self) -> Option<ObjectGuid> {
        self.bound_item
    }

    pub fn corpse_target(&self) -> Option<ObjectGuid> {
        self.bound_corpse
    }

    pub fn src(&self) -> Option<Position> {
        self.src
    }

    pub fn dest(&self) -> Option<Position> {
        self.dest
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn missile_speed(&self) -> f32 {
        self.missile_speed
    }

    /// Re-resolve every stored GUID against the live world. An empty mask
    /// means a self-cast and binds the caster. Called at cast start and
    /// again at execution; anything that despawned in between unbinds.
    pub fn update(&mut self, world: &World, caster: ObjectGuid) {
        if self.mask.is_empty() {
            self.unit = caster;
            self.bound_unit = world.unit(caster).map(|u| u.guid);
            return;
        }
        self.bound_unit = if self
            .mask
            .intersects(TargetMask::UNIT | TargetMask::UNIT_MINIPET)
        {
            world.unit(self.unit).map(|u| u.guid)
        } else {
            None
        };
        self.bound_game_object = if self.mask.contains(TargetMask::GAMEOBJECT) {
            world.game_object(self.game_object).map(|g| g.guid)
        } else {
            None
        };
        self.bound_item = if self.mask.contains(TargetMask::ITEM) {
            world.item(self.item).map(|i| i.guid)
        } else if self.mask.contains(TargetMask::TRADE_ITEM) {
            world
                .unit(caster)
                .and_then(|u| u.trade_items.get(self.trade_slot as usize).copied())
                .filter(|g| world.item(*g).is_some())
        } else {
            None
        };
        self.bound_corpse = if self
            .mask
            .intersects(TargetMask::CORPSE_ENEMY | TargetMask::CORPSE_ALLY)
        {
            world.corpse(self.corpse).map(|c| c.guid)
        } else {
            None
        };
    }

    /// Parse a payload off the wire. Truncated buffers and out-of-bounds
    /// coordinates are typed errors, never panics.
    pub fn read(reader: &mut ByteReader<'_>, caster: ObjectGuid) -> WireResult<Self> {
        let mut payload = Self::default();
        payload.mask = TargetMask::from_bits_truncate(reader.read_u32()?);

        if payload.mask.is_empty() {
            payload.unit = caster;
            return Ok(payload);
        }
        if payload
            .mask
            .intersects(TargetMask::UNIT | TargetMask::UNIT_MINIPET)
        {
            payload.unit = ObjectGuid::from_raw(reader.read_packed_u64()?);
        }
        if payload.mask.contains(TargetMask::GAMEOBJECT) {
            payload.game_object = ObjectGuid::from_raw(reader.read_packed_u64()?);
        }
        if payload.mask.contains(TargetMask::ITEM) {
            payload.item = ObjectGuid::from_raw(reader.read_packed_u64()?);
        }
        if payload.mask.contains(TargetMask::TRADE_ITEM) {
            payload.trade_slot = reader.read_u8()?;
        }
        if payload.mask.contains(TargetMask::SOURCE_LOCATION) {
            payload.src = Some(read_coords(reader)?);
        }
        if payload.mask.contains(TargetMask::DEST_LOCATION) {
            payload.dest = Some(read_coords(reader)?);
        }
        if payload.mask.contains(TargetMask::TRAJECTORY) {
            payload.elevation = reader.read_f32()?;
            payload.missile_speed = reader.read_f32()?;
        }
        if payload.mask.contains(TargetMask::STRING) {
            payload.text = reader.read_cstring()?;
        }
        if payload
            .mask
            .intersects(TargetMask::CORPSE_ENEMY | TargetMask::CORPSE_ALLY)
        {
            payload.corpse = ObjectGuid::from_raw(reader.read_packed_u64()?);
        }
        Ok(payload)
    }

    /// Serialize in exactly the order `read` parses.
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_u32(self.mask.bits());
        if self.mask.is_empty() {
            return;
        }
        if self
            .mask
            .intersects(TargetMask::UNIT | TargetMask::UNIT_MINIPET)
        {
            writer.write_packed_u64(self.unit.raw());
        }
        if self.mask.contains(TargetMask::GAMEOBJECT) {
            writer.write_packed_u64(self.game_object.raw());
        }
        if self.mask.contains(TargetMask::ITEM) {
            writer.write_packed_u64(self.item.raw());
        }
        if self.mask.contains(TargetMask::TRADE_ITEM) {
            writer.write_u8(self.trade_slot);
        }
        if let Some(src) = self.src.filter(|_| self.mask.contains(TargetMask::SOURCE_LOCATION)) {
            write_coords(writer, &src);
        }
        if let Some(dest) = self.dest.filter(|_| self.mask.contains(TargetMask::DEST_LOCATION)) {
            write_coords(writer, &dest);
        }
        if self.mask.contains(TargetMask::TRAJECTORY) {
            writer.write_f32(self.elevation);
            writer.write_f32(self.missile_speed);
        }
        if self.mask.contains(TargetMask::STRING) {
            writer.write_cstring(&self.text);
        }
        if self
            .mask
            .intersects(TargetMask::CORPSE_ENEMY | TargetMask::CORPSE_ALLY)
        {
            writer.write_packed_u64(self.corpse.raw());
        }
    }
}

fn read_coords(reader: &mut ByteReader<'_>) -> WireResult<Position> {
    let offset = reader.position();
    let pos = Position::new(
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
        0.0,
    );
    if !pos.is_valid_map_coord() {
        return Err(WireError {
            offset,
            expected: "in-bounds map coordinate",
        });
    }
    Ok(pos)
}

fn write_coords(writer: &mut ByteWriter, pos: &Position) {
    writer.write_f32(pos.x);
    writer.write_f32(pos.y);
    writer.write_f32(pos.z);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SpellStore;
    use crate::unit::Unit;

    fn caster() -> ObjectGuid {
        ObjectGuid::player(9)
    }

    #[test]
    fn test_empty_mask_is_self_cast() {
        let bytes = 0u32.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        let p = TargetingPayload::read(&mut r, caster()).unwrap();
        assert!(p.mask().is_empty());
        assert_eq!(p.raw_unit_guid(), caster());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_round_trip_unit_and_dest() {
        let mut p = TargetingPayload::new();
        p.set_unit_target(ObjectGuid::creature(77));
        p.set_dest(Position::new(12.0, -8.0, 3.0, 0.0));

        let mut w = ByteWriter::new();
        p.write(&mut w);
        let bytes = w.into_inner();

        let mut r = ByteReader::new(&bytes);
        let back = TargetingPayload::read(&mut r, caster()).unwrap();
        assert_eq!(back.raw_unit_guid(), ObjectGuid::creature(77));
        assert_eq!(back.dest().unwrap().x, 12.0);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let mut p = TargetingPayload::new();
        p.set_unit_target(ObjectGuid::creature(77));
        let mut w = ByteWriter::new();
        p.write(&mut w);
        let mut bytes = w.into_inner();
        bytes.truncate(5);

        let mut r = ByteReader::new(&bytes);
        assert!(TargetingPayload::read(&mut r, caster()).is_err());
    }

    #[test]
    fn test_out_of_bounds_dest_is_error() {
        let mut w = ByteWriter::new();
        w.write_u32(TargetMask::DEST_LOCATION.bits());
        w.write_f32(1.0e9);
        w.write_f32(0.0);
        w.write_f32(0.0);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        let err = TargetingPayload::read(&mut r, caster()).unwrap_err();
        assert_eq!(err.expected, "in-bounds map coordinate");
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_rebinding_drops_despawned_target() {
        let mut world = World::new(SpellStore::new(), 1);
        let target = ObjectGuid::creature(5);
        world.insert_unit(Unit::new(target, "Mark", 10, 14, Position::default()));

        let mut p = TargetingPayload::new();
        p.set_unit_target(target);
        p.update(&world, caster());
        assert_eq!(p.unit_target(), Some(target));

        world.remove_unit(target);
        p.update(&world, caster());
        assert_eq!(p.unit_target(), None);
        // the GUID itself is kept for logging
        assert_eq!(p.raw_unit_guid(), target);
    }

    #[test]
    fn test_trajectory_fields() {
        let mut w = ByteWriter::new();
        w.write_u32((TargetMask::DEST_LOCATION | TargetMask::TRAJECTORY).bits());
        w.write_f32(10.0);
        w.write_f32(20.0);
        w.write_f32(0.0);
        w.write_f32(0.9);
        w.write_f32(55.0);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        let p = TargetingPayload::read(&mut r, caster()).unwrap();
        assert_eq!(p.elevation(), 0.9);
        assert_eq!(p.missile_speed(), 55.0);
    }
}
