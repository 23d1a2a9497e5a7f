//! Scalar → RGB colormaps.
//!
//! Two families:
//! - **Diverging** (`Colormap::Diverging`): the static base coloring. An
//!   11-stop ramp sampled after mapping a caller-supplied `[lo, hi]` range
//!   onto `[0, 1]`.
//! - **Overlay** (`Warm`, `Cool`, `Accent`): single-hue ramps over an
//!   already-normalized value. Each overlay is bound to one [`Slot`] and is
//!   tuned so that additive sums of all three stay distinguishable.
//!
//! Every colormap clamps its input, so values outside the domain return the
//! boundary color.

/// Control points of the diverging ramp, 0–255 per channel.
const DIVERGING_STOPS: [[f32; 3]; 11] = [
    [68.0, 1.0, 84.0],
    [72.0, 35.0, 116.0],
    [64.0, 67.0, 135.0],
    [52.0, 94.0, 141.0],
    [41.0, 120.0, 142.0],
    [32.0, 144.0, 140.0],
    [34.0, 167.0, 132.0],
    [68.0, 190.0, 112.0],
    [121.0, 209.0, 81.0],
    [189.0, 222.0, 38.0],
    [253.0, 231.0, 37.0],
];

/// Number of interpolation segments between the diverging stops.
const DIVERGING_SEGMENTS: usize = DIVERGING_STOPS.len() - 1;

/// Index of an overlay colormap. Slots are fixed at activation time and
/// decide which of the three overlay ramps a field is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u8);

impl Slot {
    /// Number of overlay slots (and the selection capacity).
    pub const COUNT: usize = 3;

    /// All slots in index order.
    pub const ALL: [Self; Self::COUNT] = [Self(0), Self(1), Self(2)];

    /// Slot for a 0-based index, or `None` past the last slot.
    #[must_use]
    pub fn new(index: usize) -> Option<Self> {
        (index < Self::COUNT).then(|| Self(index as u8))
    }

    /// 0-based slot index.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// A pure scalar → RGB mapping. Output channels are in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Colormap {
    /// Multi-stop ramp over the value range `[lo, hi]`.
    Diverging {
        /// Value mapped to the first stop.
        lo: f32,
        /// Value mapped to the last stop.
        hi: f32,
    },
    /// Red ramp (slot 0).
    Warm,
    /// Blue ramp (slot 1).
    Cool,
    /// Green with a yellow lift at the top (slot 2).
    Accent,
}

impl Colormap {
    /// Overlay colormap bound to `slot`.
    #[must_use]
    pub fn for_slot(slot: Slot) -> Self {
        match slot.index() {
            0 => Self::Warm,
            1 => Self::Cool,
            _ => Self::Accent,
        }
    }

    /// Evaluate the colormap at `value`.
    ///
    /// Overlay variants expect `value` normalized to `[0, 1]`; the diverging
    /// variant normalizes against its own range. Non-finite input is treated
    /// as the domain minimum.
    #[must_use]
    pub fn evaluate(self, value: f32) -> [f32; 3] {
        match self {
            Self::Diverging { lo, hi } => diverging(normalize(value, lo, hi)),
            Self::Warm => {
                let t = unit(value);
                [ramp_fast(t), 0.0, 0.0]
            }
            Self::Cool => {
                let t = unit(value);
                [0.0, 0.0, ramp_fast(t)]
            }
            Self::Accent => {
                let t = unit(value);
                [0.5 * ramp_late(t), ramp_fast(t), 0.0]
            }
        }
    }
}

/// Map `value` from `[lo, hi]` to `[0, 1]`. A collapsed range maps
/// everything to the midpoint.
fn normalize(value: f32, lo: f32, hi: f32) -> f32 {
    let range = hi - lo;
    if range.abs() < f32::EPSILON {
        return 0.5;
    }
    unit((value - lo) / range)
}

fn unit(t: f32) -> f32 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

/// Saturates at half the domain.
fn ramp_fast(t: f32) -> f32 {
    (t * 2.0).min(1.0)
}

/// Starts at a third of the domain and saturates at two thirds.
fn ramp_late(t: f32) -> f32 {
    (t * 3.0 - 1.0).clamp(0.0, 1.0)
}

fn diverging(t: f32) -> [f32; 3] {
    let scaled = t * DIVERGING_SEGMENTS as f32;
    let idx = (scaled.floor() as usize).min(DIVERGING_SEGMENTS - 1);
    let mix = scaled - idx as f32;

    let a = &DIVERGING_STOPS[idx];
    let b = &DIVERGING_STOPS[idx + 1];
    [
        ((1.0 - mix) * a[0] + mix * b[0]) / 255.0,
        ((1.0 - mix) * a[1] + mix * b[1]) / 255.0,
        ((1.0 - mix) * a[2] + mix * b[2]) / 255.0,
    ]
}

/// Format an RGB triple as `#rrggbb`, clamping each channel.
#[must_use]
pub fn to_hex(rgb: [f32; 3]) -> String {
    let byte = |c: f32| (unit(c) * 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x}", byte(rgb[0]), byte(rgb[1]), byte(rgb[2]))
}
