//! Numeric policies for LLR values and trellis metrics
//!
//! Each representation of soft values (floating point, or 64/32/16/8-bit fixed point) implements
//! [`Llr`], which fixes how branch metrics are formed, how state metrics are kept within range,
//! and how the a posteriori difference is scaled back. The combination operator used in the
//! forward-backward recursions is a separate policy, [`MaxOp`], so that any representation can
//! be paired with any operator and the pair is resolved at compile time.

use serde::{Deserialize, Serialize};

/// Threshold beyond which the Log-MAP correction term is negligible
const LOG_MAP_CUTOFF: f64 = 37.0;

/// Soft value representation used for LLRs and trellis metrics
pub trait Llr:
    Copy + Default + PartialEq + PartialOrd + std::fmt::Debug + Send + Sync + 'static
{
    /// Accumulator type for sums of three metrics in the a posteriori computation
    type Wide: Llr;

    /// Zero value
    const ZERO: Self;
    /// Stand-in for minus infinity in state metric initialization
    const NEG_INF: Self;
    /// Largest magnitude of a quantized LLR value
    const SAT: Self;
    /// Number of values held by a 256-bit register
    const REG_LANES: usize;
    /// State metrics are rebased on state `0` at every trellis position that is a multiple of
    /// this interval (`0` means never)
    const NORM_INTERVAL: usize;
    /// Whether rebased state metrics are also saturated to `[-SAT, SAT]`
    const SATURATE_METRICS: bool;

    /// Returns the sum (saturating for fixed point).
    #[must_use]
    fn plus(self, rhs: Self) -> Self;

    /// Returns the difference (saturating for fixed point).
    #[must_use]
    fn minus(self, rhs: Self) -> Self;

    /// Returns the negation (saturating for fixed point).
    #[must_use]
    fn negate(self) -> Self;

    /// Returns the larger of two values.
    #[must_use]
    fn larger(self, rhs: Self) -> Self {
        if self >= rhs {
            self
        } else {
            rhs
        }
    }

    /// Returns the value saturated to `[-SAT, SAT]`.
    #[must_use]
    fn saturate(self) -> Self;

    /// Returns the value in the accumulator type.
    fn widen(self) -> Self::Wide;

    /// Returns the branch metric for a systematic and a parity LLR value.
    fn branch_metric(sys: Self, par: Self) -> Self;

    /// Returns the a posteriori LLR corresponding to the difference of the bit metrics.
    fn post(diff: Self::Wide) -> Self;

    /// Returns the Log-MAP correction term for given difference of operands.
    fn log_correction(diff: Self) -> Self;

    /// Returns the Linear-Log-MAP correction term for given difference of operands.
    fn linear_correction(diff: Self) -> Self;

    /// Returns the representation of a real value (rounded and saturated for fixed point).
    fn from_f64(value: f64) -> Self;

    /// Returns the real value of the representation.
    fn to_f64(self) -> f64;

    /// Returns `true` if the value favors bit `One`.
    fn is_negative(self) -> bool {
        self < Self::ZERO
    }
}

impl Llr for f64 {
    type Wide = f64;

    const ZERO: Self = 0.0;
    const NEG_INF: Self = -f64::MAX;
    const SAT: Self = f64::MAX;
    const REG_LANES: usize = 4;
    const NORM_INTERVAL: usize = 0;
    const SATURATE_METRICS: bool = false;

    fn plus(self, rhs: Self) -> Self {
        self + rhs
    }

    fn minus(self, rhs: Self) -> Self {
        self - rhs
    }

    fn negate(self) -> Self {
        -self
    }

    fn saturate(self) -> Self {
        self
    }

    fn widen(self) -> Self::Wide {
        self
    }

    fn branch_metric(sys: Self, par: Self) -> Self {
        0.5 * (sys + par)
    }

    fn post(diff: Self::Wide) -> Self {
        diff
    }

    fn log_correction(diff: Self) -> Self {
        log_map_correction_term(diff.abs())
    }

    fn linear_correction(diff: Self) -> Self {
        linear_log_map_correction_term(diff.abs())
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

impl Llr for f32 {
    type Wide = f32;

    const ZERO: Self = 0.0;
    const NEG_INF: Self = -f32::MAX;
    const SAT: Self = f32::MAX;
    const REG_LANES: usize = 8;
    const NORM_INTERVAL: usize = 0;
    const SATURATE_METRICS: bool = false;

    fn plus(self, rhs: Self) -> Self {
        self + rhs
    }

    fn minus(self, rhs: Self) -> Self {
        self - rhs
    }

    fn negate(self) -> Self {
        -self
    }

    fn saturate(self) -> Self {
        self
    }

    fn widen(self) -> Self::Wide {
        self
    }

    fn branch_metric(sys: Self, par: Self) -> Self {
        0.5 * (sys + par)
    }

    fn post(diff: Self::Wide) -> Self {
        diff
    }

    fn log_correction(diff: Self) -> Self {
        Self::from_f64(log_map_correction_term(f64::from(diff.abs())))
    }

    fn linear_correction(diff: Self) -> Self {
        Self::from_f64(linear_log_map_correction_term(f64::from(diff.abs())))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Llr for i16 {
    type Wide = i16;

    const ZERO: Self = 0;
    const NEG_INF: Self = -(1 << 14);
    const SAT: Self = 16_382;
    const REG_LANES: usize = 16;
    const NORM_INTERVAL: usize = 8;
    const SATURATE_METRICS: bool = false;

    fn plus(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn minus(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn negate(self) -> Self {
        self.saturating_neg()
    }

    fn saturate(self) -> Self {
        self.clamp(-Self::SAT, Self::SAT)
    }

    fn widen(self) -> Self::Wide {
        self
    }

    // Full precision: the halving is deferred to `post`.
    fn branch_metric(sys: Self, par: Self) -> Self {
        sys.saturating_add(par)
    }

    fn post(diff: Self::Wide) -> Self {
        diff >> 1
    }

    fn log_correction(_diff: Self) -> Self {
        0
    }

    fn linear_correction(_diff: Self) -> Self {
        0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value
            .round()
            .clamp(-f64::from(Self::SAT), f64::from(Self::SAT)) as i16
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Llr for i8 {
    type Wide = i16;

    const ZERO: Self = 0;
    const NEG_INF: Self = -63;
    const SAT: Self = 63;
    const REG_LANES: usize = 32;
    const NORM_INTERVAL: usize = 1;
    const SATURATE_METRICS: bool = true;

    fn plus(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn minus(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn negate(self) -> Self {
        self.saturating_neg()
    }

    fn saturate(self) -> Self {
        self.clamp(-Self::SAT, Self::SAT)
    }

    fn widen(self) -> Self::Wide {
        i16::from(self)
    }

    fn branch_metric(sys: Self, par: Self) -> Self {
        narrow_i8((i16::from(sys) + i16::from(par)) >> 1)
    }

    fn post(diff: Self::Wide) -> Self {
        narrow_i8(diff)
    }

    fn log_correction(_diff: Self) -> Self {
        0
    }

    fn linear_correction(_diff: Self) -> Self {
        0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value
            .round()
            .clamp(-f64::from(Self::SAT), f64::from(Self::SAT)) as i8
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

// Wide fixed point: metrics have enough headroom that neither normalization nor saturation of the
// state metrics is needed.
impl Llr for i32 {
    type Wide = i32;

    const ZERO: Self = 0;
    const NEG_INF: Self = -(i32::MAX / 2);
    const SAT: Self = i32::MAX;
    const REG_LANES: usize = 8;
    const NORM_INTERVAL: usize = 0;
    const SATURATE_METRICS: bool = false;

    fn plus(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn minus(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn negate(self) -> Self {
        self.saturating_neg()
    }

    fn saturate(self) -> Self {
        self
    }

    fn widen(self) -> Self::Wide {
        self
    }

    fn branch_metric(sys: Self, par: Self) -> Self {
        sys.saturating_add(par) >> 1
    }

    fn post(diff: Self::Wide) -> Self {
        diff
    }

    fn log_correction(_diff: Self) -> Self {
        0
    }

    fn linear_correction(_diff: Self) -> Self {
        0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value
            .round()
            .clamp(-f64::from(Self::SAT), f64::from(Self::SAT)) as i32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Llr for i64 {
    type Wide = i64;

    const ZERO: Self = 0;
    const NEG_INF: Self = -(i64::MAX / 2);
    const SAT: Self = i64::MAX;
    const REG_LANES: usize = 4;
    const NORM_INTERVAL: usize = 0;
    const SATURATE_METRICS: bool = false;

    fn plus(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn minus(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn negate(self) -> Self {
        self.saturating_neg()
    }

    fn saturate(self) -> Self {
        self
    }

    fn widen(self) -> Self::Wide {
        self
    }

    fn branch_metric(sys: Self, par: Self) -> Self {
        sys.saturating_add(par) >> 1
    }

    fn post(diff: Self::Wide) -> Self {
        diff
    }

    fn log_correction(_diff: Self) -> Self {
        0
    }

    fn linear_correction(_diff: Self) -> Self {
        0
    }

    // Out-of-range values saturate in the cast.
    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        (value.round() as i64).max(-Self::SAT)
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// Returns 16-bit value saturated into the 8-bit metric range.
#[allow(clippy::cast_possible_truncation)]
fn narrow_i8(value: i16) -> i8 {
    value.clamp(-i16::from(i8::SAT), i16::from(i8::SAT)) as i8
}

/// Operator combining two log-domain metrics
pub trait MaxOp: Copy + Default + std::fmt::Debug + Send + Sync + 'static {
    /// Returns the combination of two metrics.
    fn combine<T: Llr>(x: T, y: T) -> T;
}

/// Plain maximum (Max-Log-MAP)
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Max;

/// Maximum with exact logarithmic correction (Log-MAP)
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MaxStar;

/// Maximum with linear approximation of the correction (Linear-Log-MAP)
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MaxLinear;

impl MaxOp for Max {
    fn combine<T: Llr>(x: T, y: T) -> T {
        x.larger(y)
    }
}

impl MaxOp for MaxStar {
    fn combine<T: Llr>(x: T, y: T) -> T {
        x.larger(y).plus(T::log_correction(x.minus(y)))
    }
}

impl MaxOp for MaxLinear {
    fn combine<T: Llr>(x: T, y: T) -> T {
        x.larger(y).plus(T::linear_correction(x.minus(y)))
    }
}

/// Enumeration of decoding algorithms, with each variant holding the number of turbo iterations
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum DecodingAlgo {
    /// Log-MAP decoding with given number of turbo iterations
    LogMAP(u32),
    /// Max-Log-MAP decoding with given number of turbo iterations
    MaxLogMAP(u32),
    /// Linear-Log-MAP decoding (Valenti & Sun, 2001) with given number of turbo iterations
    LinearLogMAP(u32),
}

impl DecodingAlgo {
    /// Returns the name of the variant.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DecodingAlgo::LogMAP(_) => "Log-MAP",
            DecodingAlgo::MaxLogMAP(_) => "Max-Log-MAP",
            DecodingAlgo::LinearLogMAP(_) => "Linear-Log-MAP",
        }
    }

    /// Returns the number of turbo iterations held in the variant.
    #[must_use]
    pub fn num_iter(self) -> u32 {
        match self {
            DecodingAlgo::LogMAP(n)
            | DecodingAlgo::MaxLogMAP(n)
            | DecodingAlgo::LinearLogMAP(n) => n,
        }
    }
}

impl Default for DecodingAlgo {
    fn default() -> Self {
        DecodingAlgo::MaxLogMAP(6)
    }
}

impl std::fmt::Display for DecodingAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} decoding, {} turbo iterations",
            self.name(),
            self.num_iter()
        )
    }
}

/// Representation selected at run time for a codec
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericFormat {
    /// 64-bit floating point
    F64,
    /// 32-bit floating point
    #[default]
    F32,
    /// 16-bit fixed point
    I16,
    /// 8-bit fixed point
    I8,
    /// 32-bit fixed point
    I32,
    /// 64-bit fixed point
    I64,
}

impl std::fmt::Display for NumericFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NumericFormat::F64 => "f64",
            NumericFormat::F32 => "f32",
            NumericFormat::I16 => "i16",
            NumericFormat::I8 => "i8",
            NumericFormat::I32 => "i32",
            NumericFormat::I64 => "i64",
        };
        write!(f, "{name}")
    }
}

/// Returns the correction term for Linear-Log-MAP decoding algorithm (Valenti & Sun, 2001).
fn linear_log_map_correction_term(abs_diff: f64) -> f64 {
    let thresh = 2.506_816_400_220_01;
    if abs_diff <= thresh {
        let slope = -0.249_041_818_917_1;
        slope * (abs_diff - thresh)
    } else {
        0.0
    }
}

/// Returns the correction term for Log-MAP decoding algorithm.
fn log_map_correction_term(abs_diff: f64) -> f64 {
    // NaN (both operands at minus infinity) falls through to zero.
    if abs_diff < LOG_MAP_CUTOFF {
        (-abs_diff).exp().ln_1p()
    } else {
        0.0
    }
}
