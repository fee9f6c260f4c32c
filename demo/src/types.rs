//! Parsed demo bitstream and send-table types

use std::cell::Cell;

/// Width of the integer part of a bit-packed world coordinate.
pub const COORD_INTEGER_BITS: u32 = 14;

/// Width of the fractional part of a bit-packed world coordinate.
///
/// Five fractional bits give world coordinates a resolution of 1/32 of a
/// unit, which is the resolution the engine itself networks at.
pub const COORD_FRACTIONAL_BITS: u32 = 5;

/// A single bit-packed world coordinate.
///
/// The encoded form leads with two presence bits. If either part is
/// present, a sign bit follows, then the integer and fractional fields in
/// that order, each conditional on its presence bit. A coordinate read as
/// part of a [`BitCoordVector`] whose axis bit was clear has `exists`
/// unset and every other field zeroed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitCoord {
    /// Whether this axis was present in the stream at all.
    pub exists: bool,

    /// Whether an integer part was encoded.
    pub has_int: bool,

    /// Whether a fractional part was encoded.
    pub has_frac: bool,

    /// Sign of the coordinate; set means negative.
    pub sign: bool,

    /// Integer magnitude, [`COORD_INTEGER_BITS`] wide.
    pub int_value: u32,

    /// Fractional magnitude in 1/32 units, [`COORD_FRACTIONAL_BITS`] wide.
    pub frac_value: u32,
}

/// A vector of three optionally-present bit-packed coordinates.
///
/// Three axis-presence bits lead, then each present axis is encoded as a
/// [`BitCoord`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitCoordVector {
    pub x: BitCoord,
    pub y: BitCoord,
    pub z: BitCoord,
}

/// A fixed-width angle triple.
///
/// Each axis is an unsigned field of the same width; `bits` records that
/// width so consumers can rescale to degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitAngleVector {
    pub x: u32,
    pub y: u32,
    pub z: u32,

    /// Width of each axis field as read from the stream.
    pub bits: u32,
}

/// The value type a sendprop carries on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendPropType {
    #[default]
    Int,
    Float,
    Vector3,
    Vector2,
    String,
    Array,
    DataTable,
    Int64,
}

bitflags! {
    /// Per-prop encoding flags, matching the `SPROP_*` constants in the
    /// Source SDK's `dt_send.h`.
    ///
    /// Most of these only affect how a leaf value is packed and are
    /// carried through untouched for downstream delta decoding. The
    /// flattener itself cares about [`EXCLUDE`](Self::EXCLUDE),
    /// [`INSIDE_ARRAY`](Self::INSIDE_ARRAY),
    /// [`COLLAPSIBLE`](Self::COLLAPSIBLE) and
    /// [`CHANGES_OFTEN`](Self::CHANGES_OFTEN).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SendPropFlags: u32 {
        /// Encoded unsigned rather than sign-and-magnitude.
        const UNSIGNED = 1 << 0;

        /// Packed with the world-coordinate codec.
        const COORD = 1 << 1;

        /// Floats are sent raw, without low/high rescaling.
        const NO_SCALE = 1 << 2;

        /// Value range rounds down towards its low limit.
        const ROUND_DOWN = 1 << 3;

        /// Value range rounds up towards its high limit.
        const ROUND_UP = 1 << 4;

        /// Treated as a unit normal; fractional bits only.
        const NORMAL = 1 << 5;

        /// This prop removes a prop of the named target table from the
        /// flattened view instead of carrying a value.
        const EXCLUDE = 1 << 6;

        /// Position encoded relative to the entity, not the world.
        const XYZE = 1 << 7;

        /// An element prop owned by an array prop; never flattened on its
        /// own.
        const INSIDE_ARRAY = 1 << 8;

        /// The send proxy always produces a value.
        const PROXY_ALWAYS_YES = 1 << 9;

        /// One scalar component of a vector prop.
        const IS_A_VECTOR_ELEM = 1 << 10;

        /// A datatable prop whose children are inlined into the parent
        /// rather than forming a baseclass boundary.
        const COLLAPSIBLE = 1 << 11;

        /// Multiplayer world-coordinate codec.
        const COORD_MP = 1 << 12;

        /// Multiplayer codec, low-precision fraction.
        const COORD_MP_LOW_PRECISION = 1 << 13;

        /// Multiplayer codec, integral values only.
        const COORD_MP_INTEGRAL = 1 << 14;

        /// Hint that this prop changes often; biases it towards the front
        /// of the flattened order so delta field indices stay small.
        const CHANGES_OFTEN = 1 << 18;
    }
}

/// One property of a sendtable.
///
/// A prop is either a leaf value (int, float, vector, string, array) or a
/// reference to another datatable, in which case `dt_name` names the
/// referenced table. Exclude props carry no value at all; they name a
/// `(table, prop)` pair to remove from the flattened view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendProp {
    /// Network name of the prop.
    pub name: String,

    /// For exclude props, the name of the table the excluded prop lives
    /// in.
    pub exclude_name: Option<String>,

    /// For datatable props, the name of the referenced table.
    pub dt_name: Option<String>,

    /// Index of the referenced table, resolved from `dt_name` on first
    /// use during flattening and memoized here.
    pub baseclass: Cell<Option<u16>>,

    /// Wire type of the prop.
    pub prop_type: SendPropType,

    /// Sort priority; lower values decode earlier.
    pub priority: u8,

    /// Encoding flags.
    pub flags: SendPropFlags,
}

/// A tree-shaped schema of network-serialized properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendTable {
    /// Name the table is referenced by.
    pub name: String,

    /// Props in declaration order.
    pub props: Vec<SendProp>,
}

/// A top-level network entity type, bound to its root datatable by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerClass {
    /// Class name, e.g. `CTFPlayer`.
    pub class_name: String,

    /// Name of the root datatable for this class.
    pub datatable_name: String,
}

/// Game variants whose demos need special-casing.
///
/// Only Left 4 Dead is currently special: it shipped with a demo protocol
/// number of 4 but kept the older changes-often-first prop ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Game {
    HalfLife2,
    OrangeBox,
    Portal2,
    Csgo,
    L4d,
    L4d2,
}

/// Version information from the demo header that alters decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemoVersion {
    /// Demo protocol number from the file header.
    pub demo_protocol: u32,

    /// Which game recorded the demo.
    pub game: Game,
}
