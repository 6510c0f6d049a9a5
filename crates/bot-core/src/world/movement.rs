//! Movement section of create and movement update blocks.
//!
//! The client never sends these layouts; it only has to step over them byte-exactly to reach
//! the update mask behind them, keeping the position on the way. Flag words drop unnamed bits.

use std::io::{Read, Seek};

use binrw::{BinRead, BinResult, Endian};
use bitflags::bitflags;

/// Guid sent as a presence mask followed by its non-zero bytes, lowest first.
#[derive(Default, PartialEq, Clone, Copy, Eq, Hash, Debug)]
pub struct PackedGuid(pub u64);

impl PackedGuid {
    pub fn low(self) -> u32 {
        self.0 as u32
    }

    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn to_packed_bytes(self) -> Vec<u8> {
        let mut packed = vec![0u8];
        for (i, byte) in self.0.to_le_bytes().into_iter().enumerate() {
            if byte != 0 {
                packed[0] |= 1 << i;
                packed.push(byte);
            }
        }
        packed
    }
}

impl BinRead for PackedGuid {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mask = u8::read_options(reader, endian, ())?;
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *byte = u8::read_options(reader, endian, ())?;
            }
        }
        Ok(Self(u64::from_le_bytes(bytes)))
    }
}

#[derive(BinRead, PartialEq, Copy, Clone, Default, Debug)]
#[br(little)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(BinRead, PartialEq, Debug, Clone, Copy, Default)]
#[br(little)]
pub struct OrientedPoint3D {
    pub point: Point3D,
    pub direction: f32,
}

/// Implements `BinRead` for a bitflags type stored as a plain little-endian word.
macro_rules! flags_word {
    ($flags:ty, $word:ty) => {
        impl BinRead for $flags {
            type Args<'a> = ();

            fn read_options<R: Read + Seek>(
                reader: &mut R,
                endian: Endian,
                _: Self::Args<'_>,
            ) -> BinResult<Self> {
                <$word>::read_options(reader, endian, ()).map(Self::from_bits_truncate)
            }
        }
    };
}

bitflags! {
    /// Movement state of a living object. Only bits that change the block layout, plus the
    /// basic directions, are named.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct MovementFlags: u32 {
        const FORWARD = 0x0000_0001;
        const BACKWARD = 0x0000_0002;
        const STRAFE_LEFT = 0x0000_0004;
        const STRAFE_RIGHT = 0x0000_0008;
        const WALKING = 0x0000_0100;
        const ON_TRANSPORT = 0x0000_0200;
        const FALLING = 0x0000_1000;
        const SWIMMING = 0x0020_0000;
        const FLYING = 0x0200_0000;
        const SPLINE_ELEVATION = 0x0400_0000;
        const SPLINE_ENABLED = 0x0800_0000;
    }
}

flags_word!(MovementFlags, u32);

bitflags! {
    /// Second movement flag word; two bits add optional fields.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct MovementFlags2: u16 {
        const ALWAYS_ALLOW_PITCHING = 0x0020;
        const INTERPOLATED_MOVEMENT = 0x0400;
    }
}

flags_word!(MovementFlags2, u16);

bitflags! {
    /// Leading flags of an update-object movement block.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct UpdateFlags: u16 {
        const SELF = 0x0001;
        const TRANSPORT = 0x0002;
        const HAS_ATTACKING_TARGET = 0x0004;
        const HIGH_GUID = 0x0008;
        const LOW_GUID = 0x0010;
        const LIVING = 0x0020;
        const HAS_POSITION = 0x0040;
        const VEHICLE = 0x0080;
        const POSITION = 0x0100;
        const ROTATION = 0x0200;
    }
}

flags_word!(UpdateFlags, u16);

bitflags! {
    /// Spline flags; the three `FINAL_*` bits pick the facing encoding.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct SplineFlags: u32 {
        const WALK_MODE = 0x0000_1000;
        const FLYING = 0x0000_2000;
        const FINAL_POINT = 0x0000_8000;
        const FINAL_TARGET = 0x0001_0000;
        const FINAL_ANGLE = 0x0002_0000;
        const CYCLIC = 0x0008_0000;
    }
}

flags_word!(SplineFlags, u32);

/// Present while `FALLING` is set.
#[derive(BinRead, PartialEq, Debug, Clone, Copy)]
#[br(little)]
pub struct FallVelocity {
    pub vertical: f32,
    pub sin_angle: f32,
    pub cos_angle: f32,
    pub horizontal: f32,
}

/// Where a passenger sits on its transport.
#[derive(BinRead, PartialEq, Debug, Clone)]
#[br(little, import(flags2: MovementFlags2))]
pub struct TransportSeat {
    pub transport: PackedGuid,
    pub offset: OrientedPoint3D,
    pub time: u32,
    pub seat: u8,
    #[br(if(flags2.contains(MovementFlags2::INTERPOLATED_MOVEMENT)))]
    pub interpolated_time: Option<u32>,
}

/// Flag-gated head of a living block, up to the speed table.
#[derive(BinRead, PartialEq, Debug, Clone)]
#[br(little)]
pub struct LivingState {
    pub flags: MovementFlags,
    pub flags2: MovementFlags2,
    pub time: u32,
    pub position: OrientedPoint3D,
    #[br(if(flags.contains(MovementFlags::ON_TRANSPORT)), args(flags2))]
    pub transport: Option<TransportSeat>,
    #[br(if(
        flags.intersects(MovementFlags::SWIMMING | MovementFlags::FLYING)
            || flags2.contains(MovementFlags2::ALWAYS_ALLOW_PITCHING)
    ))]
    pub pitch: Option<f32>,
    pub fall_time: u32,
    #[br(if(flags.contains(MovementFlags::FALLING)))]
    pub fall: Option<FallVelocity>,
    #[br(if(flags.contains(MovementFlags::SPLINE_ELEVATION)))]
    pub spline_elevation: Option<f32>,
}

/// Nine speeds, always present on living objects.
#[derive(BinRead, PartialEq, Debug, Clone, Copy)]
#[br(little)]
pub struct SpeedTable {
    pub walk: f32,
    pub run: f32,
    pub run_back: f32,
    pub swim: f32,
    pub swim_back: f32,
    pub flight: f32,
    pub flight_back: f32,
    pub turn_rate: f32,
    pub pitch_rate: f32,
}

/// The facing a spline ends on. Only one encoding is present on the wire.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum FinalFacing {
    Angle(f32),
    Target(u64),
    Point(Point3D),
}

#[derive(BinRead, PartialEq, Debug, Clone)]
#[br(little)]
pub struct SplineInfo {
    pub flags: SplineFlags,
    #[br(if(flags.contains(SplineFlags::FINAL_ANGLE)))]
    pub final_angle: Option<f32>,
    #[br(if(
        !flags.contains(SplineFlags::FINAL_ANGLE) && flags.contains(SplineFlags::FINAL_TARGET)
    ))]
    pub final_target: Option<u64>,
    #[br(if(
        !flags.intersects(SplineFlags::FINAL_ANGLE | SplineFlags::FINAL_TARGET)
            && flags.contains(SplineFlags::FINAL_POINT)
    ))]
    pub final_point: Option<Point3D>,
    pub time_passed: u32,
    pub duration: u32,
    pub id: u32,
    pub duration_mod: f32,
    pub duration_mod_next: f32,
    pub vertical_acceleration: f32,
    pub effect_start_time: u32,
    pub node_count: u32,
    #[br(count = node_count)]
    pub nodes: Vec<Point3D>,
    pub mode: u8,
    pub destination: Point3D,
}

impl SplineInfo {
    pub fn final_facing(&self) -> Option<FinalFacing> {
        self.final_angle
            .map(FinalFacing::Angle)
            .or(self.final_target.map(FinalFacing::Target))
            .or(self.final_point.map(FinalFacing::Point))
    }
}

#[derive(BinRead, PartialEq, Debug, Clone)]
#[br(little)]
pub struct LivingBlock {
    pub state: LivingState,
    pub speeds: SpeedTable,
    #[br(if(state.flags.contains(MovementFlags::SPLINE_ENABLED)))]
    pub spline: Option<SplineInfo>,
}

/// `POSITION` layout, used by transports and corpses.
#[derive(BinRead, PartialEq, Debug, Clone)]
#[br(little)]
pub struct TransportPosition {
    pub transport_guid: PackedGuid,
    pub position: Point3D,
    pub transport_offset: Point3D,
    pub orientation: f32,
    pub corpse_orientation: f32,
}

#[derive(BinRead, PartialEq, Debug, Clone, Copy)]
#[br(little)]
pub struct VehicleInfo {
    pub id: u32,
    pub orientation: f32,
}

/// Movement section of a create or movement update-object entry.
///
/// At most one of `living`, `transport_position` and `stationary` is present, selected by the
/// leading flags in that priority order. The trailing sections are independent of it.
#[derive(BinRead, PartialEq, Debug, Clone)]
#[br(little)]
pub struct MovementBlock {
    pub update_flags: UpdateFlags,
    #[br(if(update_flags.contains(UpdateFlags::LIVING)))]
    pub living: Option<LivingBlock>,
    #[br(if(
        !update_flags.contains(UpdateFlags::LIVING) && update_flags.contains(UpdateFlags::POSITION)
    ))]
    pub transport_position: Option<TransportPosition>,
    #[br(if(
        !update_flags.intersects(UpdateFlags::LIVING | UpdateFlags::POSITION)
            && update_flags.contains(UpdateFlags::HAS_POSITION)
    ))]
    pub stationary: Option<OrientedPoint3D>,
    #[br(if(update_flags.contains(UpdateFlags::HIGH_GUID)))]
    pub high_guid: Option<u32>,
    #[br(if(update_flags.contains(UpdateFlags::LOW_GUID)))]
    pub low_guid: Option<u32>,
    #[br(if(update_flags.contains(UpdateFlags::HAS_ATTACKING_TARGET)))]
    pub attacking_target: Option<PackedGuid>,
    #[br(if(update_flags.contains(UpdateFlags::TRANSPORT)))]
    pub transport_time: Option<u32>,
    #[br(if(update_flags.contains(UpdateFlags::VEHICLE)))]
    pub vehicle: Option<VehicleInfo>,
    #[br(if(update_flags.contains(UpdateFlags::ROTATION)))]
    pub rotation: Option<i64>,
}

impl MovementBlock {
    pub fn position(&self) -> Option<OrientedPoint3D> {
        if let Some(living) = &self.living {
            return Some(living.state.position);
        }
        if let Some(tp) = &self.transport_position {
            return Some(OrientedPoint3D {
                point: tp.position,
                direction: tp.orientation,
            });
        }
        self.stationary
    }

    pub fn walk_speed(&self) -> Option<f32> {
        self.living.as_ref().map(|l| l.speeds.walk)
    }

    pub fn run_speed(&self) -> Option<f32> {
        self.living.as_ref().map(|l| l.speeds.run)
    }
}
