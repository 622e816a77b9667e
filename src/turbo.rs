//! Turbo encoder and iterative turbo decoder
//!
//! A turbo code is the parallel concatenation of two systematic codes: the first encodes the
//! information bits in natural order, the second encodes them in interleaved order, and only the
//! systematic bits of the first are transmitted. The decoder exchanges extrinsic information
//! between two [`SisoDecoder`]s through the interleaver for a bounded number of iterations.
//!
//! In the buffered layout a codeword is
//! `[sys | par_n | par_i | tail_sys_n | tail_par_n | tail_sys_i | tail_par_i]`; in the standard
//! layout the systematic and both parity bits of each position are adjacent, followed by the
//! tail pairs of the natural-order code and then of the interleaved-order code.

use std::{fmt, sync::Arc};

use itertools::izip;

use crate::{
    common::check_len,
    decoder::{WaveDecoder, Waves},
    encoder::check_geometry,
    Bit, Decoder, Durations, Encoder, Error, FrameLayout, Interleaver, Llr, SihoDecoder,
    SisoDecoder, SystematicEncoder, TurboObserver,
};

/// Returns hard decision on an LLR value.
fn decide<T: Llr>(value: T) -> Bit {
    if value.is_negative() {
        Bit::One
    } else {
        Bit::Zero
    }
}

/// Checks that the codeword length matches `3 K` plus the tail lengths.
fn check_turbo_geometry(
    info_len: usize,
    codeword_len: usize,
    tail_n: usize,
    tail_i: usize,
) -> Result<(), Error> {
    check_geometry(info_len, codeword_len)?;
    if codeword_len != 3 * info_len + tail_n + tail_i {
        return Err(Error::InvalidArgument(format!(
            "'N' must equal 3 * 'K' + {tail_n} + {tail_i} ('K' = {info_len}, \
            'N' = {codeword_len})"
        )));
    }
    Ok(())
}

/// Checks that the interleaver length is `K`.
fn check_interleaver(interleaver: &Interleaver, info_len: usize) -> Result<(), Error> {
    if interleaver.length() != info_len {
        return Err(Error::LengthError(format!(
            "Interleaver length {} does not match 'K' = {info_len}",
            interleaver.length()
        )));
    }
    Ok(())
}

/// Turbo encoder built from two systematic encoders and an interleaver
#[derive(Debug)]
pub struct TurboEncoder<A, B> {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of code bits per frame
    codeword_len: usize,
    /// Encoder of the natural-order information bits
    enc_n: A,
    /// Encoder of the interleaved information bits
    enc_i: B,
    /// Interleaver shared with the decoder
    interleaver: Arc<Interleaver>,
    /// Codeword layout
    layout: FrameLayout,
    /// Number of the next frame to be encoded
    next_frame_id: usize,
    /// Interleaved information bits
    u_i: Vec<Bit>,
    /// Non-systematic bits of the natural-order code
    par_n: Vec<Bit>,
    /// Non-systematic bits of the interleaved-order code
    par_i: Vec<Bit>,
}

impl<A: SystematicEncoder, B: SystematicEncoder> TurboEncoder<A, B> {
    /// Returns turbo encoder.
    ///
    /// # Parameters
    ///
    /// - `info_len`: Number of information bits per frame (`K`).
    ///
    /// - `codeword_len`: Number of code bits per frame (`N`), which must equal `3 * K` plus the
    ///   tail lengths of both encoders.
    ///
    /// - `enc_n`: Encoder of the information bits in natural order.
    ///
    /// - `enc_i`: Encoder of the information bits in interleaved order.
    ///
    /// - `interleaver`: Initialized interleaver of length `K`.
    ///
    /// - `layout`: Codeword layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is invalid, if an encoder is not rate `1/2` with
    /// `K` information bits, or if the interleaver length is not `K`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use turbo_siso::{
    ///     Bit, Encoder, FrameLayout, Interleaver, InterleaverLaw, RscEncoder, Trellis,
    ///     TurboEncoder,
    /// };
    ///
    /// let layout = FrameLayout::Buffered;
    /// let enc_n = RscEncoder::new(40, 86, Trellis::lte(), layout)?;
    /// let enc_i = RscEncoder::new(40, 86, Trellis::lte(), layout)?;
    /// let mut interleaver = Interleaver::with_law(40, InterleaverLaw::Lte, false, 1)?;
    /// interleaver.init()?;
    /// let mut encoder = TurboEncoder::new(40, 132, enc_n, enc_i, Arc::new(interleaver), layout)?;
    /// let mut code_bits = [Bit::One; 132];
    /// encoder.encode_frame(&[Bit::Zero; 40], &mut code_bits)?;
    /// assert_eq!(code_bits, [Bit::Zero; 132]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        info_len: usize,
        codeword_len: usize,
        enc_n: A,
        enc_i: B,
        interleaver: Arc<Interleaver>,
        layout: FrameLayout,
    ) -> Result<Self, Error> {
        for (name, enc_k, enc_len, tail) in [
            ("natural", enc_n.info_len(), enc_n.codeword_len(), enc_n.tail_length()),
            ("interleaved", enc_i.info_len(), enc_i.codeword_len(), enc_i.tail_length()),
        ] {
            if enc_k != info_len || enc_len != 2 * info_len + tail {
                return Err(Error::InvalidArgument(format!(
                    "Encoder of the {name}-order code must have K = {info_len} and \
                    N = {} (found K = {enc_k}, N = {enc_len})",
                    2 * info_len + tail
                )));
            }
        }
        check_turbo_geometry(info_len, codeword_len, enc_n.tail_length(), enc_i.tail_length())?;
        check_interleaver(&interleaver, info_len)?;
        tracing::debug!(
            "Built turbo encoder (K = {info_len}, N = {codeword_len}, layout {layout:?})"
        );
        Ok(Self {
            info_len,
            codeword_len,
            par_n: vec![Bit::Zero; enc_n.codeword_len() - info_len],
            par_i: vec![Bit::Zero; enc_i.codeword_len() - info_len],
            u_i: vec![Bit::Zero; info_len],
            enc_n,
            enc_i,
            interleaver,
            layout,
            next_frame_id: 0,
        })
    }

    /// Returns codeword layout.
    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }
}

impl<A: SystematicEncoder, B: SystematicEncoder> Encoder for TurboEncoder<A, B> {
    fn info_len(&self) -> usize {
        self.info_len
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error> {
        let k = self.info_len;
        check_len("information bits", info_bits.len(), k)?;
        check_len("code bits", code_bits.len(), self.codeword_len)?;
        self.interleaver
            .interleave(info_bits, &mut self.u_i, self.next_frame_id, 1, false)?;
        self.enc_n.encode_sys(info_bits, &mut self.par_n)?;
        self.enc_i.encode_sys(&self.u_i, &mut self.par_i)?;
        let (n_ff_n, n_ff_i) = (self.enc_n.tail_length() / 2, self.enc_i.tail_length() / 2);
        match self.layout {
            FrameLayout::Buffered => {
                code_bits[.. k].copy_from_slice(info_bits);
                code_bits[k .. 2 * k].copy_from_slice(&self.par_n[.. k]);
                code_bits[2 * k .. 3 * k].copy_from_slice(&self.par_i[.. k]);
                let (tail_n, tail_i) = code_bits[3 * k ..].split_at_mut(2 * n_ff_n);
                tail_n.copy_from_slice(&self.par_n[k ..]);
                tail_i.copy_from_slice(&self.par_i[k ..]);
            }
            FrameLayout::Standard => {
                for (i, triple) in code_bits[.. 3 * k].chunks_exact_mut(3).enumerate() {
                    triple[0] = info_bits[i];
                    triple[1] = self.par_n[i];
                    triple[2] = self.par_i[i];
                }
                let (tail_n, tail_i) = code_bits[3 * k ..].split_at_mut(2 * n_ff_n);
                for (j, pair) in tail_n.chunks_exact_mut(2).enumerate() {
                    pair[0] = self.par_n[k + j];
                    pair[1] = self.par_n[k + n_ff_n + j];
                }
                for (j, pair) in tail_i.chunks_exact_mut(2).enumerate() {
                    pair[0] = self.par_i[k + j];
                    pair[1] = self.par_i[k + n_ff_i + j];
                }
            }
        }
        self.next_frame_id += 1;
        Ok(())
    }
}

/// Iterative decoder of a turbo code
pub struct TurboDecoder<T, A, B> {
    /// Decoder of single waves
    core: TurboCore<T, A, B>,
    /// Wave scheduler
    waves: Waves<T>,
}

/// Wave decoder of [`TurboDecoder`]
///
/// All buffers are lane-major. The `l_s*` and `l_p*` buffers hold `K + n_ff` positions (tail
/// included), the extrinsic buffers `K` positions.
struct TurboCore<T, A, B> {
    /// Number of information bits per frame
    info_len: usize,
    /// Maximum number of iterations
    n_ite: usize,
    /// Number of frames per wave
    lanes: usize,
    /// Codeword layout
    layout: FrameLayout,
    /// SISO decoder of the natural-order code
    siso_n: A,
    /// SISO decoder of the interleaved-order code
    siso_i: B,
    /// Interleaver shared with the encoder
    interleaver: Arc<Interleaver>,
    /// Callbacks run after each constituent decoding
    observers: Vec<Box<dyn TurboObserver<T>>>,
    /// Number of iterations performed on the last wave
    last_iterations: usize,
    /// Channel systematic values, natural order
    l_sn: Vec<T>,
    /// Channel parity values of the natural-order code
    l_pn: Vec<T>,
    /// Channel systematic values, interleaved order
    l_si: Vec<T>,
    /// Channel parity values of the interleaved-order code
    l_pi: Vec<T>,
    /// Systematic plus a priori values, natural order
    l_sen: Vec<T>,
    /// Systematic plus a priori values, interleaved order
    l_sei: Vec<T>,
    /// A priori values of the natural-order decoder
    l_e1n: Vec<T>,
    /// Extrinsic values of the natural-order decoder
    l_e2n: Vec<T>,
    /// A priori values of the interleaved-order decoder
    l_e1i: Vec<T>,
    /// Extrinsic values of the interleaved-order decoder
    l_e2i: Vec<T>,
}

impl<T: Llr, A: SisoDecoder<T>, B: SisoDecoder<T>> TurboDecoder<T, A, B> {
    /// Returns turbo decoder.
    ///
    /// # Parameters
    ///
    /// - `info_len`: Number of information bits per frame (`K`).
    ///
    /// - `codeword_len`: Number of code bits per frame (`N`), which must equal `3 * K` plus the
    ///   tail lengths of both SISO decoders.
    ///
    /// - `n_ite`: Maximum number of iterations.
    ///
    /// - `interleaver`: Initialized interleaver of length `K`.
    ///
    /// - `siso_n`: SISO decoder of the natural-order code.
    ///
    /// - `siso_i`: SISO decoder of the interleaved-order code, with the same number of lanes.
    ///
    /// - `layout`: Codeword layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is invalid, if `n_ite` is `0`, if the SISO decoders
    /// disagree on `K` or on the number of lanes, or if the interleaver length is not `K`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use turbo_siso::{
    ///     BcjrDecoder, Bit, FrameLayout, Interleaver, InterleaverLaw, MaxStar, Schedule,
    ///     SihoDecoder, Trellis, TurboDecoder,
    /// };
    ///
    /// let (trellis, schedule) = (Trellis::lte(), Schedule::Standard);
    /// let layout = FrameLayout::Buffered;
    /// let siso_n = BcjrDecoder::<f32, MaxStar>::new(40, &trellis, 1, schedule, layout)?;
    /// let siso_i = BcjrDecoder::<f32, MaxStar>::new(40, &trellis, 1, schedule, layout)?;
    /// let mut interleaver = Interleaver::with_law(40, InterleaverLaw::Lte, false, 1)?;
    /// interleaver.init()?;
    /// let mut decoder =
    ///     TurboDecoder::new(40, 132, 4, Arc::new(interleaver), siso_n, siso_i, layout)?;
    /// let mut v = [Bit::One; 40];
    /// decoder.decode_siho(&[2.0; 132], &mut v, 1)?;
    /// assert_eq!(v, [Bit::Zero; 40]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        info_len: usize,
        codeword_len: usize,
        n_ite: usize,
        interleaver: Arc<Interleaver>,
        siso_n: A,
        siso_i: B,
        layout: FrameLayout,
    ) -> Result<Self, Error> {
        if siso_n.info_len() != info_len || siso_i.info_len() != info_len {
            return Err(Error::InvalidArgument(format!(
                "SISO decoders must have K = {info_len} (found {} and {})",
                siso_n.info_len(),
                siso_i.info_len()
            )));
        }
        if siso_n.lanes() != siso_i.lanes() {
            return Err(Error::InvalidArgument(format!(
                "SISO decoders must have the same number of lanes (found {} and {})",
                siso_n.lanes(),
                siso_i.lanes()
            )));
        }
        if n_ite == 0 {
            return Err(Error::InvalidArgument(
                "Number of turbo iterations must be a positive integer".to_string(),
            ));
        }
        check_turbo_geometry(info_len, codeword_len, siso_n.tail_length(), siso_i.tail_length())?;
        check_interleaver(&interleaver, info_len)?;
        let lanes = siso_n.lanes();
        let (len_n, len_i) = (siso_n.sys_len() * lanes, siso_i.sys_len() * lanes);
        let ext_len = info_len * lanes;
        tracing::debug!(
            "Built turbo decoder (K = {info_len}, N = {codeword_len}, {n_ite} iteration(s), \
            {lanes} lane(s), {layout:?} layout)"
        );
        Ok(Self {
            core: TurboCore {
                info_len,
                n_ite,
                lanes,
                layout,
                siso_n,
                siso_i,
                interleaver,
                observers: Vec::new(),
                last_iterations: 0,
                l_sn: vec![T::ZERO; len_n],
                l_pn: vec![T::ZERO; len_n],
                l_si: vec![T::ZERO; len_i],
                l_pi: vec![T::ZERO; len_i],
                l_sen: vec![T::ZERO; len_n],
                l_sei: vec![T::ZERO; len_i],
                l_e1n: vec![T::ZERO; ext_len],
                l_e2n: vec![T::ZERO; ext_len],
                l_e1i: vec![T::ZERO; ext_len],
                l_e2i: vec![T::ZERO; ext_len],
            },
            waves: Waves::new(info_len, codeword_len, lanes)?,
        })
    }

    /// Adds a callback run after each constituent decoding.
    ///
    /// Observers run in the order they were added. Once an observer asks to stop, the observers
    /// after it are not called for that constituent decoding.
    pub fn add_observer(&mut self, observer: Box<dyn TurboObserver<T>>) {
        self.core.observers.push(observer);
    }

    /// Returns number of iterations performed on the last wave.
    #[must_use]
    pub fn last_iterations(&self) -> usize {
        self.core.last_iterations
    }

    /// Returns maximum number of iterations.
    #[must_use]
    pub fn num_iterations(&self) -> usize {
        self.core.n_ite
    }
}

impl<T, A, B> fmt::Debug for TurboDecoder<T, A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurboDecoder")
            .field("info_len", &self.core.info_len)
            .field("n_ite", &self.core.n_ite)
            .field("lanes", &self.core.lanes)
            .field("layout", &self.core.layout)
            .field("num_observers", &self.core.observers.len())
            .finish_non_exhaustive()
    }
}

impl<T: Llr, A: SisoDecoder<T>, B: SisoDecoder<T>> TurboCore<T, A, B> {
    /// Splits a lane-major wave of codewords into systematic and parity streams.
    fn load(&mut self, y: &[T], frame_id: usize) -> Result<(), Error> {
        let (k, lanes) = (self.info_len, self.lanes);
        let (n_ff_n, n_ff_i) = (self.siso_n.tail_length() / 2, self.siso_i.tail_length() / 2);
        let kl = k * lanes;
        match self.layout {
            FrameLayout::Buffered => {
                self.l_sn[.. kl].copy_from_slice(&y[.. kl]);
                self.l_pn[.. kl].copy_from_slice(&y[kl .. 2 * kl]);
                self.l_pi[.. kl].copy_from_slice(&y[2 * kl .. 3 * kl]);
                let mut offset = 3 * kl;
                for (dst, len) in [
                    (&mut self.l_sn, n_ff_n),
                    (&mut self.l_pn, n_ff_n),
                    (&mut self.l_si, n_ff_i),
                    (&mut self.l_pi, n_ff_i),
                ] {
                    dst[kl ..].copy_from_slice(&y[offset .. offset + len * lanes]);
                    offset += len * lanes;
                }
            }
            FrameLayout::Standard => {
                let position = |p: usize| p * lanes .. (p + 1) * lanes;
                for i in 0 .. k {
                    self.l_sn[position(i)].copy_from_slice(&y[position(3 * i)]);
                    self.l_pn[position(i)].copy_from_slice(&y[position(3 * i + 1)]);
                    self.l_pi[position(i)].copy_from_slice(&y[position(3 * i + 2)]);
                }
                for j in 0 .. n_ff_n {
                    self.l_sn[position(k + j)].copy_from_slice(&y[position(3 * k + 2 * j)]);
                    self.l_pn[position(k + j)].copy_from_slice(&y[position(3 * k + 2 * j + 1)]);
                }
                let base = 3 * k + 2 * n_ff_n;
                for j in 0 .. n_ff_i {
                    self.l_si[position(k + j)].copy_from_slice(&y[position(base + 2 * j)]);
                    self.l_pi[position(k + j)].copy_from_slice(&y[position(base + 2 * j + 1)]);
                }
            }
        }
        self.interleaver.interleave(
            &self.l_sn[.. kl],
            &mut self.l_si[.. kl],
            frame_id,
            lanes,
            lanes > 1,
        )?;
        self.l_e1n.fill(T::ZERO);
        Ok(())
    }
}

impl<T: Llr, A: SisoDecoder<T>, B: SisoDecoder<T>> WaveDecoder<T> for TurboCore<T, A, B> {
    fn decode_wave(&mut self, y: &[T], v: &mut [Bit], frame_id: usize) -> Result<(), Error> {
        self.load(y, frame_id)?;
        let (kl, lanes) = (self.info_len * self.lanes, self.lanes);
        let lane_reordered = lanes > 1;
        let mut iterations = 0;
        for iteration in 1 ..= self.n_ite {
            iterations = iteration;

            // Natural-order code
            for (sen, &sn, &e1n) in izip!(&mut self.l_sen[.. kl], &self.l_sn[.. kl], &self.l_e1n)
            {
                *sen = sn.plus(e1n);
            }
            self.l_sen[kl ..].copy_from_slice(&self.l_sn[kl ..]);
            self.siso_n
                .decode_siso_wave(&self.l_sen, &self.l_pn, &mut self.l_e2n)?;
            let stop = self.observers.iter_mut().any(|observer| {
                observer.after_natural(iteration, &self.l_sen[.. kl], &mut self.l_e2n)
            });
            if stop {
                for (bit, &sen, &e2n) in izip!(v.iter_mut(), &self.l_sen[.. kl], &self.l_e2n) {
                    *bit = decide(sen.plus(e2n));
                }
                break;
            }

            // Interleaved-order code
            self.interleaver.interleave(
                &self.l_e2n,
                &mut self.l_e1i,
                frame_id,
                lanes,
                lane_reordered,
            )?;
            for (sei, &si, &e1i) in izip!(&mut self.l_sei[.. kl], &self.l_si[.. kl], &self.l_e1i)
            {
                *sei = si.plus(e1i);
            }
            self.l_sei[kl ..].copy_from_slice(&self.l_si[kl ..]);
            self.siso_i
                .decode_siso_wave(&self.l_sei, &self.l_pi, &mut self.l_e2i)?;
            let stop = self.observers.iter_mut().any(|observer| {
                observer.after_interleaved(iteration, &self.l_sei[.. kl], &mut self.l_e2i)
            });
            let done = stop || iteration == self.n_ite;
            if done {
                for (e2i, &sei) in self.l_e2i.iter_mut().zip(&self.l_sei[.. kl]) {
                    *e2i = e2i.plus(sei);
                }
            }
            self.interleaver.deinterleave(
                &self.l_e2i,
                &mut self.l_e1n,
                frame_id,
                lanes,
                lane_reordered,
            )?;
            if done {
                for (bit, &post) in v.iter_mut().zip(&self.l_e1n) {
                    *bit = decide(post);
                }
                break;
            }
        }
        for observer in &mut self.observers {
            observer.on_end(iterations);
        }
        self.last_iterations = iterations;
        tracing::trace!(frame_id, iterations, "Turbo wave decoded");
        Ok(())
    }
}

impl<T: Llr, A: SisoDecoder<T>, B: SisoDecoder<T>> Decoder for TurboDecoder<T, A, B> {
    fn info_len(&self) -> usize {
        self.core.info_len
    }

    fn codeword_len(&self) -> usize {
        self.waves.codeword_len()
    }

    fn lanes(&self) -> usize {
        self.waves.lanes()
    }
}

impl<T: Llr, A: SisoDecoder<T>, B: SisoDecoder<T>> SihoDecoder<T> for TurboDecoder<T, A, B> {
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

#[cfg(test)]
mod tests_of_turbo {
    use std::sync::Mutex;

    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rand_distr::StandardNormal;

    use super::*;
    use crate::{
        utils, BcjrDecoder, InterleaverLaw, Max, MaxLinear, MaxOp, MaxStar, NoDecoder, RscEncoder,
        Schedule, StableDecisionStop, Trellis,
    };

    type Bcjr<T, O> = BcjrDecoder<T, O>;

    /// Returns random bits from a seeded generator.
    fn seeded_bits(num_bits: usize, rng: &mut StdRng) -> Vec<Bit> {
        (0 .. num_bits)
            .map(|_| if rng.random_bool(0.5) { Bit::One } else { Bit::Zero })
            .collect()
    }

    /// Returns LLR values of BPSK symbols through an AWGN channel, scaled by `scale`.
    fn noisy<T: Llr>(bits: &[Bit], scale: f64, sigma: f64, rng: &mut StdRng) -> Vec<T> {
        bits.iter()
            .map(|&b| {
                let x = if b == Bit::Zero { 1.0 } else { -1.0 };
                T::from_f64(scale * (x + sigma * rng.sample::<f64, _>(StandardNormal)))
            })
            .collect()
    }

    /// Returns initialized interleaver of length `info_len`.
    fn interleaver(info_len: usize, law: InterleaverLaw, uniform: bool) -> Arc<Interleaver> {
        let mut interleaver = Interleaver::with_law(info_len, law, uniform, 4).unwrap();
        interleaver.init().unwrap();
        Arc::new(interleaver)
    }

    /// Returns turbo encoder of the LTE code.
    fn lte_encoder(
        info_len: usize,
        interleaver: Arc<Interleaver>,
        layout: FrameLayout,
    ) -> TurboEncoder<RscEncoder, RscEncoder> {
        let rsc = || RscEncoder::new(info_len, 2 * info_len + 6, Trellis::lte(), layout).unwrap();
        TurboEncoder::new(info_len, 3 * info_len + 12, rsc(), rsc(), interleaver, layout).unwrap()
    }

    /// Returns turbo decoder of the LTE code.
    fn lte_decoder<T: Llr, O: MaxOp>(
        info_len: usize,
        n_ite: usize,
        lanes: usize,
        interleaver: Arc<Interleaver>,
        layout: FrameLayout,
    ) -> TurboDecoder<T, Bcjr<T, O>, Bcjr<T, O>> {
        let siso = || {
            Bcjr::<T, O>::new(info_len, &Trellis::lte(), lanes, Schedule::Standard, layout)
                .unwrap()
        };
        TurboDecoder::new(
            info_len,
            3 * info_len + 12,
            n_ite,
            interleaver,
            siso(),
            siso(),
            layout,
        )
        .unwrap()
    }

    /// Counts bit errors of the natural-order a posteriori values at each iteration.
    struct ErrorTally {
        /// Information bits of the frame being decoded
        reference: Vec<Bit>,
        /// Bit errors per iteration
        errors: Vec<usize>,
    }

    /// Observer feeding an [`ErrorTally`]
    struct TallyObserver(Arc<Mutex<ErrorTally>>);

    impl TurboObserver<f64> for TallyObserver {
        fn after_natural(&mut self, iteration: usize, sys: &[f64], ext: &mut [f64]) -> bool {
            let mut tally = self.0.lock().unwrap();
            let errors = izip!(sys, ext.iter(), &tally.reference)
                .filter(|&(&s, &e, &bit)| decide(s + e) != bit)
                .count();
            tally.errors[iteration - 1] += errors;
            false
        }
    }

    #[test]
    fn test_encoder_new() {
        let layout = FrameLayout::Buffered;
        let rsc = |k: usize| RscEncoder::new(k, 2 * k + 6, Trellis::lte(), layout).unwrap();
        let pi = interleaver(40, InterleaverLaw::Lte, false);
        assert!(TurboEncoder::new(40, 131, rsc(40), rsc(40), pi.clone(), layout).is_err());
        assert!(TurboEncoder::new(40, 132, rsc(40), rsc(48), pi.clone(), layout).is_err());
        let pi_48 = interleaver(48, InterleaverLaw::Lte, false);
        assert!(matches!(
            TurboEncoder::new(40, 132, rsc(40), rsc(40), pi_48, layout),
            Err(Error::LengthError(_))
        ));
        let encoder = TurboEncoder::new(40, 132, rsc(40), rsc(40), pi, layout).unwrap();
        assert_eq!(encoder.info_len(), 40);
        assert_eq!(encoder.codeword_len(), 132);
        assert_eq!(encoder.layout(), layout);
    }

    #[test]
    fn test_encoder_layouts() {
        let mut rng = StdRng::seed_from_u64(3);
        let (k, n) = (40, 132);
        let pi = interleaver(k, InterleaverLaw::Lte, false);
        let mut buffered = lte_encoder(k, pi.clone(), FrameLayout::Buffered);
        let mut standard = lte_encoder(k, pi.clone(), FrameLayout::Standard);
        let mut rsc = RscEncoder::new(k, 2 * k + 6, Trellis::lte(), FrameLayout::Buffered).unwrap();
        let info_bits = seeded_bits(k, &mut rng);
        let mut code_b = vec![Bit::Zero; n];
        let mut code_s = vec![Bit::Zero; n];
        buffered.encode_frame(&info_bits, &mut code_b).unwrap();
        standard.encode_frame(&info_bits, &mut code_s).unwrap();

        let mut par_n = vec![Bit::Zero; k + 6];
        rsc.encode_sys(&info_bits, &mut par_n).unwrap();
        let mut info_i = vec![Bit::Zero; k];
        pi.interleave(&info_bits, &mut info_i, 0, 1, false).unwrap();
        let mut par_i = vec![Bit::Zero; k + 6];
        rsc.encode_sys(&info_i, &mut par_i).unwrap();

        assert_eq!(code_b[.. k], info_bits);
        assert_eq!(code_b[k .. 2 * k], par_n[.. k]);
        assert_eq!(code_b[2 * k .. 3 * k], par_i[.. k]);
        assert_eq!(code_b[3 * k .. 3 * k + 6], par_n[k ..]);
        assert_eq!(code_b[3 * k + 6 ..], par_i[k ..]);
        for i in 0 .. k {
            assert_eq!(code_s[3 * i .. 3 * i + 3], [info_bits[i], par_n[i], par_i[i]]);
        }
        for j in 0 .. 3 {
            assert_eq!(code_s[3 * k + 2 * j], par_n[k + j]);
            assert_eq!(code_s[3 * k + 1 + 2 * j], par_n[k + 3 + j]);
            assert_eq!(code_s[3 * k + 6 + 2 * j], par_i[k + j]);
            assert_eq!(code_s[3 * k + 7 + 2 * j], par_i[k + 3 + j]);
        }
    }

    #[test]
    fn test_decoder_new() {
        let layout = FrameLayout::Buffered;
        let siso = |k: usize, lanes: usize| {
            Bcjr::<f32, Max>::new(k, &Trellis::lte(), lanes, Schedule::Standard, layout).unwrap()
        };
        let pi = interleaver(40, InterleaverLaw::Lte, false);
        assert!(matches!(
            TurboDecoder::new(40, 132, 4, pi.clone(), siso(40, 1), siso(48, 1), layout),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TurboDecoder::new(40, 132, 4, pi.clone(), siso(40, 1), siso(40, 2), layout),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TurboDecoder::new(40, 132, 0, pi.clone(), siso(40, 1), siso(40, 1), layout),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TurboDecoder::new(40, 130, 4, pi.clone(), siso(40, 1), siso(40, 1), layout),
            Err(Error::InvalidArgument(_))
        ));
        let pi_48 = interleaver(48, InterleaverLaw::Lte, false);
        assert!(matches!(
            TurboDecoder::new(40, 132, 4, pi_48, siso(40, 1), siso(40, 1), layout),
            Err(Error::LengthError(_))
        ));
        // Constituent codes without tail bits
        let no = || NoDecoder::<f32>::new(40, 80, 1).unwrap();
        assert!(TurboDecoder::new(40, 120, 4, pi.clone(), no(), no(), layout).is_ok());
        let decoder =
            TurboDecoder::new(40, 132, 4, pi, siso(40, 2), siso(40, 2), layout).unwrap();
        assert_eq!(decoder.info_len(), 40);
        assert_eq!(decoder.codeword_len(), 132);
        assert_eq!(decoder.lanes(), 2);
        assert_eq!(decoder.num_iterations(), 4);
        assert_eq!(decoder.last_iterations(), 0);
    }

    /// Checks exact recovery of noiseless codewords.
    fn check_noiseless<T: Llr, O: MaxOp>(layout: FrameLayout, lanes: usize) {
        let mut rng = StdRng::seed_from_u64(40);
        let (k, n, n_frames) = (40, 132, 5);
        let pi = interleaver(k, InterleaverLaw::Lte, false);
        let mut encoder = lte_encoder(k, pi.clone(), layout);
        let mut decoder = lte_decoder::<T, O>(k, 4, lanes, pi, layout);
        let info_bits = seeded_bits(k * n_frames, &mut rng);
        let mut code_bits = vec![Bit::Zero; n * n_frames];
        encoder.encode(&info_bits, &mut code_bits).unwrap();
        let y: Vec<T> = code_bits
            .iter()
            .map(|&b| T::from_f64(if b == Bit::Zero { 10.0 } else { -10.0 }))
            .collect();
        let mut v = vec![Bit::Zero; k * n_frames];
        decoder.decode_siho(&y, &mut v, n_frames).unwrap();
        assert_eq!(v, info_bits);
        assert_eq!(decoder.last_iterations(), 4);
    }

    #[test]
    fn test_noiseless_decoding() {
        for layout in [FrameLayout::Buffered, FrameLayout::Standard] {
            check_noiseless::<f64, MaxStar>(layout, 1);
            check_noiseless::<f32, Max>(layout, 2);
            check_noiseless::<i16, Max>(layout, 4);
            check_noiseless::<i8, Max>(layout, 1);
            check_noiseless::<i32, Max>(layout, 2);
            check_noiseless::<i64, MaxLinear>(layout, 1);
        }
    }

    #[test]
    fn test_lanes_match_single_frames() {
        let mut rng = StdRng::seed_from_u64(11);
        let (k, n, lanes, n_frames) = (40, 132, 4, 10);
        let pi = interleaver(k, InterleaverLaw::Lte, false);
        let mut encoder = lte_encoder(k, pi.clone(), FrameLayout::Standard);
        let info_bits = seeded_bits(k * n_frames, &mut rng);
        let mut code_bits = vec![Bit::Zero; n * n_frames];
        encoder.encode(&info_bits, &mut code_bits).unwrap();
        let y = noisy::<i16>(&code_bits, 16.0, 0.9, &mut rng);
        let mut batched = lte_decoder::<i16, Max>(k, 6, lanes, pi.clone(), FrameLayout::Standard);
        let mut single = lte_decoder::<i16, Max>(k, 6, 1, pi, FrameLayout::Standard);
        let mut v_batched = vec![Bit::Zero; k * n_frames];
        batched.decode_siho(&y, &mut v_batched, n_frames).unwrap();
        for f in 0 .. n_frames {
            let mut v = vec![Bit::Zero; k];
            single.decode_siho(&y[f * n .. (f + 1) * n], &mut v, 1).unwrap();
            assert_eq!(v, v_batched[f * k .. (f + 1) * k]);
        }
    }

    #[test]
    fn test_uniform_interleaver() {
        let mut rng = StdRng::seed_from_u64(5);
        let (k, n, n_frames) = (48, 156, 7);
        for law in [InterleaverLaw::Lte, InterleaverLaw::Random { seed: 9 }] {
            let pi = interleaver(k, law, true);
            let mut encoder = lte_encoder(k, pi.clone(), FrameLayout::Buffered);
            let mut decoder = lte_decoder::<f32, Max>(k, 4, 2, pi, FrameLayout::Buffered);
            // Two calls, so that frame numbering continues across calls
            for _ in 0 .. 2 {
                let info_bits = seeded_bits(k * n_frames, &mut rng);
                let mut code_bits = vec![Bit::Zero; n * n_frames];
                encoder.encode(&info_bits, &mut code_bits).unwrap();
                let y = noisy::<f32>(&code_bits, 2.0, 0.1, &mut rng);
                let mut v = vec![Bit::Zero; k * n_frames];
                decoder.decode_siho(&y, &mut v, n_frames).unwrap();
                assert_eq!(v, info_bits);
            }
        }
    }

    #[test]
    fn test_early_stop() {
        let mut rng = StdRng::seed_from_u64(6);
        let (k, n) = (40, 132);
        let pi = interleaver(k, InterleaverLaw::Lte, false);
        let mut encoder = lte_encoder(k, pi.clone(), FrameLayout::Buffered);
        let mut decoder = lte_decoder::<f32, Max>(k, 10, 1, pi, FrameLayout::Buffered);
        decoder.add_observer(Box::new(StableDecisionStop::new(1).unwrap()));
        let info_bits = seeded_bits(k, &mut rng);
        let mut code_bits = vec![Bit::Zero; n];
        encoder.encode_frame(&info_bits, &mut code_bits).unwrap();
        let y = noisy::<f32>(&code_bits, 2.0, 0.05, &mut rng);
        let mut v = vec![Bit::Zero; k];
        decoder.decode_siho(&y, &mut v, 1).unwrap();
        assert_eq!(v, info_bits);
        assert_eq!(decoder.last_iterations(), 2);
    }

    #[test]
    fn test_error_rate_decreases_with_iterations() {
        let mut rng = StdRng::seed_from_u64(1234);
        let (k, n, n_ite, n_frames) = (40, 132, 4, 10_000);
        // Es/N0 of -4 dB, so Eb/N0 close to 0.8 dB
        let es_over_n0 = 10f64.powf(-0.4);
        let sigma = (0.5 / es_over_n0).sqrt();
        let scale = 2.0 / (sigma * sigma);
        let pi = interleaver(k, InterleaverLaw::Lte, false);
        let mut encoder = lte_encoder(k, pi.clone(), FrameLayout::Buffered);
        let mut decoder =
            lte_decoder::<f64, MaxStar>(k, n_ite, 1, pi.clone(), FrameLayout::Buffered);
        let mut decoders_by_ite: Vec<_> = (1 ..= n_ite)
            .map(|ite| lte_decoder::<f64, MaxStar>(k, ite, 1, pi.clone(), FrameLayout::Buffered))
            .collect();
        let mut output_errors = vec![0; n_ite];
        let tally = Arc::new(Mutex::new(ErrorTally {
            reference: Vec::new(),
            errors: vec![0; n_ite],
        }));
        decoder.add_observer(Box::new(TallyObserver(tally.clone())));
        let mut code_bits = vec![Bit::Zero; n];
        let mut v = vec![Bit::Zero; k];
        for _ in 0 .. n_frames {
            let info_bits = seeded_bits(k, &mut rng);
            encoder.encode_frame(&info_bits, &mut code_bits).unwrap();
            let y = noisy::<f64>(&code_bits, scale, sigma, &mut rng);
            for (decoder, errors) in decoders_by_ite.iter_mut().zip(&mut output_errors) {
                decoder.decode_siho(&y, &mut v, 1).unwrap();
                *errors += utils::error_count(&v, &info_bits);
            }
            tally.lock().unwrap().reference = info_bits;
            decoder.decode_siho(&y, &mut v, 1).unwrap();
        }
        let errors = tally.lock().unwrap().errors.clone();
        assert!(errors[0] > 0);
        for pair in errors.windows(2) {
            assert!(pair[1] <= pair[0], "{errors:?}");
        }
        // Decoder output, one decoder per iteration count
        assert!(output_errors[0] > 0);
        for pair in output_errors.windows(2) {
            assert!(pair[1] <= pair[0], "{output_errors:?}");
        }
        assert!(output_errors[n_ite - 1] < output_errors[0]);
    }

    /// Observer asking to stop after the first natural-order decoding
    struct StopNow;

    impl TurboObserver<f32> for StopNow {
        fn after_natural(&mut self, _iteration: usize, _sys: &[f32], _ext: &mut [f32]) -> bool {
            true
        }
    }

    /// Observer counting its calls
    struct CallCounter(Arc<Mutex<usize>>);

    impl TurboObserver<f32> for CallCounter {
        fn after_natural(&mut self, _iteration: usize, _sys: &[f32], _ext: &mut [f32]) -> bool {
            *self.0.lock().unwrap() += 1;
            false
        }

        fn after_interleaved(
            &mut self,
            _iteration: usize,
            _sys: &[f32],
            _ext: &mut [f32],
        ) -> bool {
            *self.0.lock().unwrap() += 1;
            false
        }
    }

    #[test]
    fn test_stop_skips_later_observers() {
        let mut rng = StdRng::seed_from_u64(9);
        let (k, n) = (40, 132);
        let pi = interleaver(k, InterleaverLaw::Lte, false);
        let mut encoder = lte_encoder(k, pi.clone(), FrameLayout::Buffered);
        let mut decoder = lte_decoder::<f32, Max>(k, 6, 1, pi, FrameLayout::Buffered);
        let before = Arc::new(Mutex::new(0));
        let after = Arc::new(Mutex::new(0));
        decoder.add_observer(Box::new(CallCounter(before.clone())));
        decoder.add_observer(Box::new(StopNow));
        decoder.add_observer(Box::new(CallCounter(after.clone())));
        let info_bits = seeded_bits(k, &mut rng);
        let mut code_bits = vec![Bit::Zero; n];
        encoder.encode_frame(&info_bits, &mut code_bits).unwrap();
        let y = noisy::<f32>(&code_bits, 2.0, 0.05, &mut rng);
        let mut v = vec![Bit::Zero; k];
        decoder.decode_siho(&y, &mut v, 1).unwrap();
        assert_eq!(v, info_bits);
        assert_eq!(decoder.last_iterations(), 1);
        assert_eq!(*before.lock().unwrap(), 1);
        assert_eq!(*after.lock().unwrap(), 0);
    }
}
