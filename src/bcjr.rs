//! BCJR decoder of the 8-state recursive systematic convolutional code
//!
//! Soft values are processed one wave of `L` frames at a time, packed lane-major. Trellis
//! metrics are stored position-major, then state, then lane: the metric of state `s` at
//! position `i` for lane `l` is at index `(i * 8 + s) * L + l`, and the two branch metrics of
//! position `i` are at `(i * 2 + g) * L + l`.
//!
//! The forward metrics are computed for the whole frame. The backward metrics are either kept for
//! the whole frame ([`Schedule::Standard`]) or computed block by block together with the
//! extrinsic values ([`Schedule::Blocked`]), which needs far less memory; both schedules produce
//! identical outputs.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::{
    common::check_len,
    decoder::{WaveDecoder, Waves},
    Bit, Decoder, Durations, Error, FrameLayout, Llr, MaxOp, SihoDecoder, SisoDecoder, Trellis,
};

/// Number of trellis states
const NUM_STATES: usize = 8;

/// Order in which backward metrics and extrinsic values are computed
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Backward metrics of all positions are kept
    #[default]
    Standard,
    /// Backward metrics are kept for one block of positions at a time (`K` must be a multiple of
    /// the register lane count of the representation)
    Blocked,
}

/// Trellis branch seen from one of its end states
#[derive(Clone, Copy, Debug, Default)]
struct Branch {
    /// State at the other end of the branch
    state: usize,
    /// Whether the systematic bit of the branch is `One`
    bit_one: bool,
    /// Index of the branch metric (XOR of systematic and parity bits)
    gamma: usize,
}

/// Branches entering and leaving each state
#[derive(Clone, Copy, Debug)]
struct Topology {
    /// Branches entering each state, with their origin states
    into: [[Branch; 2]; NUM_STATES],
    /// Branches leaving each state for systematic bits `Zero` and `One`, with their end states
    out_of: [[Branch; 2]; NUM_STATES],
}

impl Topology {
    /// Returns topology described by a trellis interchange table.
    #[allow(clippy::cast_sign_loss)]
    fn from_table(table: &[Vec<i32>]) -> Self {
        let mut topology = Self {
            into: [[Branch::default(); 2]; NUM_STATES],
            out_of: [[Branch::default(); 2]; NUM_STATES],
        };
        for s in 0 .. NUM_STATES {
            for (k, rows) in [0, 3].into_iter().enumerate() {
                topology.into[s][k] = Branch {
                    state: table[rows][s] as usize,
                    bit_one: table[rows + 1][s] < 0,
                    gamma: table[rows + 2][s] as usize,
                };
            }
            for (k, rows) in [6, 8].into_iter().enumerate() {
                topology.out_of[s][k] = Branch {
                    state: table[rows][s] as usize,
                    bit_one: k == 1,
                    gamma: table[rows + 1][s] as usize,
                };
            }
        }
        topology
    }
}

/// Returns metric extended along a branch.
fn weigh<T: Llr>(metric: T, branch: Branch, gamma: T) -> T {
    if branch.bit_one {
        metric.minus(gamma)
    } else {
        metric.plus(gamma)
    }
}

/// Rebases the state metrics of one position on state `0` if the position calls for it.
fn normalize<T: Llr>(metrics: &mut [T], lanes: usize, position: usize) {
    if T::NORM_INTERVAL == 0 || position % T::NORM_INTERVAL != 0 {
        return;
    }
    for l in 0 .. lanes {
        let base = metrics[l];
        for s in 0 .. NUM_STATES {
            let rebased = metrics[s * lanes + l].minus(base);
            metrics[s * lanes + l] = if T::SATURATE_METRICS {
                rebased.saturate()
            } else {
                rebased
            };
        }
    }
}

/// Forward-backward recursions over one wave
#[derive(Debug)]
struct Recursions<T, O> {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of tail positions
    n_ff: usize,
    /// Number of frames per wave
    lanes: usize,
    /// Backward schedule
    schedule: Schedule,
    /// Branch structure of the trellis
    topology: Topology,
    /// Branch metrics of all positions
    gamma: Vec<T>,
    /// Forward metrics of the information positions
    alpha: Vec<T>,
    /// Backward metrics of all positions, or of one block and its right edge
    beta: Vec<T>,
    /// Combination operator
    _op: PhantomData<O>,
}

impl<T: Llr, O: MaxOp> Recursions<T, O> {
    /// Returns recursions with buffers sized for given geometry.
    fn new(
        info_len: usize,
        n_ff: usize,
        lanes: usize,
        schedule: Schedule,
        topology: Topology,
    ) -> Self {
        let stride = NUM_STATES * lanes;
        let beta_positions = match schedule {
            Schedule::Standard => info_len + n_ff + 1,
            Schedule::Blocked => T::REG_LANES + 1,
        };
        Self {
            info_len,
            n_ff,
            lanes,
            schedule,
            topology,
            gamma: vec![T::ZERO; (info_len + n_ff) * 2 * lanes],
            alpha: vec![T::ZERO; info_len * stride],
            beta: vec![T::ZERO; beta_positions * stride],
            _op: PhantomData,
        }
    }

    /// Computes extrinsic values of one wave.
    fn decode(&mut self, sys: &[T], par: &[T], ext: &mut [T]) -> Result<(), Error> {
        let (k, lanes) = (self.info_len, self.lanes);
        let positions = k + self.n_ff;
        check_len("systematic LLR buffer", sys.len(), positions * lanes)?;
        check_len("parity LLR buffer", par.len(), positions * lanes)?;
        check_len("extrinsic LLR buffer", ext.len(), k * lanes)?;
        self.compute_gamma(sys, par);
        self.compute_alpha();
        match self.schedule {
            Schedule::Standard => self.standard_backward(sys, ext),
            Schedule::Blocked => self.blocked_backward(sys, ext),
        }
        Ok(())
    }

    /// Computes the branch metrics for parity bit equal to and differing from the systematic bit.
    fn compute_gamma(&mut self, sys: &[T], par: &[T]) {
        let lanes = self.lanes;
        for (i, gamma) in self.gamma.chunks_exact_mut(2 * lanes).enumerate() {
            for l in 0 .. lanes {
                let (s, p) = (sys[i * lanes + l], par[i * lanes + l]);
                gamma[l] = T::branch_metric(s, p);
                gamma[lanes + l] = T::branch_metric(s, p.negate());
            }
        }
    }

    /// Computes the forward metrics of positions `0 .. K`.
    fn compute_alpha(&mut self) {
        let (lanes, stride) = (self.lanes, NUM_STATES * self.lanes);
        self.alpha[.. lanes].fill(T::ZERO);
        self.alpha[lanes .. stride].fill(T::NEG_INF);
        for i in 1 .. self.info_len {
            let (done, rest) = self.alpha.split_at_mut(i * stride);
            let prev = &done[(i - 1) * stride ..];
            let cur = &mut rest[.. stride];
            let gamma = &self.gamma[(i - 1) * 2 * lanes .. i * 2 * lanes];
            for s in 0 .. NUM_STATES {
                let [b0, b1] = self.topology.into[s];
                for l in 0 .. lanes {
                    cur[s * lanes + l] = O::combine(
                        weigh(prev[b0.state * lanes + l], b0, gamma[b0.gamma * lanes + l]),
                        weigh(prev[b1.state * lanes + l], b1, gamma[b1.gamma * lanes + l]),
                    );
                }
            }
            normalize(cur, lanes, i);
        }
    }

    /// Computes backward metrics at `position` from those at `position + 1`.
    fn beta_step(&self, next: &[T], cur: &mut [T], position: usize) {
        let lanes = self.lanes;
        let gamma = &self.gamma[position * 2 * lanes .. (position + 1) * 2 * lanes];
        for s in 0 .. NUM_STATES {
            let [b0, b1] = self.topology.out_of[s];
            for l in 0 .. lanes {
                cur[s * lanes + l] = O::combine(
                    weigh(next[b0.state * lanes + l], b0, gamma[b0.gamma * lanes + l]),
                    weigh(next[b1.state * lanes + l], b1, gamma[b1.gamma * lanes + l]),
                );
            }
        }
        normalize(cur, lanes, position);
    }

    /// Computes extrinsic values at `position` given the backward metrics at `position + 1`.
    fn extrinsic(&self, beta_next: &[T], sys: &[T], ext: &mut [T], position: usize) {
        let (lanes, stride) = (self.lanes, NUM_STATES * self.lanes);
        let alpha = &self.alpha[position * stride .. (position + 1) * stride];
        let gamma = &self.gamma[position * 2 * lanes .. (position + 1) * 2 * lanes];
        for l in 0 .. lanes {
            let mut max0 = T::Wide::ZERO;
            let mut max1 = T::Wide::ZERO;
            for s in 0 .. NUM_STATES {
                let a = alpha[s * lanes + l].widen();
                let [b0, b1] = self.topology.out_of[s];
                let m0 = weigh(
                    a.plus(beta_next[b0.state * lanes + l].widen()),
                    b0,
                    gamma[b0.gamma * lanes + l].widen(),
                );
                let m1 = weigh(
                    a.plus(beta_next[b1.state * lanes + l].widen()),
                    b1,
                    gamma[b1.gamma * lanes + l].widen(),
                );
                if s == 0 {
                    (max0, max1) = (m0, m1);
                } else {
                    max0 = O::combine(max0, m0);
                    max1 = O::combine(max1, m1);
                }
            }
            let index = position * lanes + l;
            ext[index] = T::post(max0.minus(max1)).minus(sys[index]);
        }
    }

    /// Sets the backward metrics at the end of the trellis.
    fn init_beta(&self, edge: &mut [T]) {
        edge[.. self.lanes].fill(T::ZERO);
        edge[self.lanes ..].fill(T::NEG_INF);
    }

    /// Backward pass keeping the metrics of all positions.
    fn standard_backward(&mut self, sys: &[T], ext: &mut [T]) {
        let stride = NUM_STATES * self.lanes;
        let last = self.info_len + self.n_ff;
        let mut beta = std::mem::take(&mut self.beta);
        self.init_beta(&mut beta[last * stride ..]);
        for i in (1 .. last).rev() {
            let (lo, hi) = beta.split_at_mut((i + 1) * stride);
            self.beta_step(&hi[.. stride], &mut lo[i * stride ..], i);
        }
        for i in 0 .. self.info_len {
            self.extrinsic(&beta[(i + 1) * stride .. (i + 2) * stride], sys, ext, i);
        }
        self.beta = beta;
    }

    /// Backward pass over blocks of `T::REG_LANES` positions, right to left.
    fn blocked_backward(&mut self, sys: &[T], ext: &mut [T]) {
        let stride = NUM_STATES * self.lanes;
        let block = T::REG_LANES;
        let mut beta = std::mem::take(&mut self.beta);
        // Slot `block` holds the metrics at the right edge of the current block.
        let (slots, edge) = beta.split_at_mut(block * stride);
        self.init_beta(edge);
        for i in (self.info_len .. self.info_len + self.n_ff).rev() {
            let slot = &mut slots[(block - 1) * stride ..];
            self.beta_step(edge, slot, i);
            edge.copy_from_slice(slot);
        }
        for start in (0 .. self.info_len).step_by(block).rev() {
            for i in (start .. start + block).rev() {
                let offset = i - start;
                let (lo, hi) = beta.split_at_mut((offset + 1) * stride);
                self.beta_step(&hi[.. stride], &mut lo[offset * stride ..], i);
            }
            for i in start .. start + block {
                let offset = i - start + 1;
                self.extrinsic(&beta[offset * stride .. (offset + 1) * stride], sys, ext, i);
            }
            beta.copy_within(.. stride, block * stride);
        }
        self.beta = beta;
    }
}

/// Hard-output decoding of one wave of RSC codewords
#[derive(Debug)]
struct BcjrCore<T, O> {
    /// Soft-output recursions
    recursions: Recursions<T, O>,
    /// Codeword layout
    layout: FrameLayout,
    /// Systematic values of the wave
    sys: Vec<T>,
    /// Parity values of the wave
    par: Vec<T>,
    /// Extrinsic values of the wave
    ext: Vec<T>,
}

impl<T: Llr, O: MaxOp> WaveDecoder<T> for BcjrCore<T, O> {
    fn decode_wave(&mut self, y: &[T], v: &mut [Bit], _frame_id: usize) -> Result<(), Error> {
        let (k, n_ff, lanes) = (
            self.recursions.info_len,
            self.recursions.n_ff,
            self.recursions.lanes,
        );
        match self.layout {
            FrameLayout::Buffered => {
                let (kl, tl) = (k * lanes, n_ff * lanes);
                self.sys[.. kl].copy_from_slice(&y[.. kl]);
                self.par[.. kl].copy_from_slice(&y[kl .. 2 * kl]);
                self.sys[kl ..].copy_from_slice(&y[2 * kl .. 2 * kl + tl]);
                self.par[kl ..].copy_from_slice(&y[2 * kl + tl .. 2 * kl + 2 * tl]);
            }
            FrameLayout::Standard => {
                let pairs = y.chunks_exact(2 * lanes);
                for ((sys, par), pair) in self
                    .sys
                    .chunks_exact_mut(lanes)
                    .zip(self.par.chunks_exact_mut(lanes))
                    .zip(pairs)
                {
                    sys.copy_from_slice(&pair[.. lanes]);
                    par.copy_from_slice(&pair[lanes ..]);
                }
            }
        }
        self.recursions.decode(&self.sys, &self.par, &mut self.ext)?;
        for ((bit, &s), &e) in v.iter_mut().zip(&self.sys).zip(&self.ext) {
            *bit = if s.plus(e).is_negative() {
                Bit::One
            } else {
                Bit::Zero
            };
        }
        Ok(())
    }
}

/// BCJR decoder, generic in the soft value representation `T` and the combination operator `O`
///
/// Only the 8-state trellis with generator polynomials `{013, 015}` is supported. As a SIHO
/// decoder it takes RSC codewords of `N = 2 * K + 6` values.
#[derive(Debug)]
pub struct BcjrDecoder<T, O> {
    /// Single-wave decoder
    core: BcjrCore<T, O>,
    /// Wave scheduler
    waves: Waves<T>,
}

impl<T: Llr, O: MaxOp> BcjrDecoder<T, O> {
    /// Returns BCJR decoder.
    ///
    /// # Parameters
    ///
    /// - `info_len`: Number of information bits per frame (`K`).
    ///
    /// - `trellis`: Trellis of the code, which must match the reference 8-state trellis.
    ///
    /// - `lanes`: Number of frames decoded together (`L`).
    ///
    /// - `schedule`: Backward schedule.
    ///
    /// - `layout`: Codeword layout used by the SIHO form.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_len` or `lanes` is `0`, if the trellis is not the reference
    /// trellis, or if the blocked schedule is requested and `info_len` is not a multiple of
    /// `T::REG_LANES`.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::{BcjrDecoder, Decoder, FrameLayout, Max, Schedule, Trellis};
    ///
    /// let trellis = Trellis::lte();
    /// let layout = FrameLayout::Buffered;
    /// let decoder = BcjrDecoder::<f32, Max>::new(40, &trellis, 4, Schedule::Blocked, layout)?;
    /// assert_eq!(decoder.codeword_len(), 86);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        info_len: usize,
        trellis: &Trellis,
        lanes: usize,
        schedule: Schedule,
        layout: FrameLayout,
    ) -> Result<Self, Error> {
        if !trellis.is_reference() {
            return Err(Error::InvalidArgument(format!(
                "Only the 8-state trellis {{013, 015}} is supported (found {:#o}/{:#o})",
                trellis.polynomials()[0],
                trellis.polynomials()[1]
            )));
        }
        if schedule == Schedule::Blocked && info_len % T::REG_LANES != 0 {
            return Err(Error::InvalidArgument(format!(
                "'K' must be a multiple of {} for the blocked schedule ('K' = {info_len})",
                T::REG_LANES
            )));
        }
        let n_ff = trellis.memory_len();
        let waves = Waves::new(info_len, 2 * info_len + 2 * n_ff, lanes)?;
        let positions = info_len + n_ff;
        tracing::debug!(
            "Built BCJR decoder (K = {info_len}, {lanes} lane(s), {schedule:?} schedule, \
            {layout:?} layout)"
        );
        Ok(Self {
            core: BcjrCore {
                recursions: Recursions::new(
                    info_len,
                    n_ff,
                    lanes,
                    schedule,
                    Topology::from_table(&trellis.to_table()),
                ),
                layout,
                sys: vec![T::ZERO; positions * lanes],
                par: vec![T::ZERO; positions * lanes],
                ext: vec![T::ZERO; info_len * lanes],
            },
            waves,
        })
    }

    /// Returns backward schedule.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        self.core.recursions.schedule
    }
}

impl<T: Llr, O: MaxOp> Decoder for BcjrDecoder<T, O> {
    fn info_len(&self) -> usize {
        self.core.recursions.info_len
    }

    fn codeword_len(&self) -> usize {
        self.waves.codeword_len()
    }

    fn lanes(&self) -> usize {
        self.waves.lanes()
    }
}

impl<T: Llr, O: MaxOp> SisoDecoder<T> for BcjrDecoder<T, O> {
    fn tail_length(&self) -> usize {
        2 * self.core.recursions.n_ff
    }

    fn decode_siso_wave(&mut self, sys: &[T], par: &[T], ext: &mut [T]) -> Result<(), Error> {
        self.core.recursions.decode(sys, par, ext)
    }
}

impl<T: Llr, O: MaxOp> SihoDecoder<T> for BcjrDecoder<T, O> {
    fn decode_siho(&mut self, y: &[T], v: &mut [Bit], n_frames: usize) -> Result<(), Error> {
        self.waves.run(&mut self.core, y, v, n_frames)
    }

    fn durations(&self) -> Durations {
        self.waves.durations()
    }

    fn reset_durations(&mut self) {
        self.waves.reset_durations();
    }
}
