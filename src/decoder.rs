//! Decoder capabilities and the wave scheduler shared by all decoders
//!
//! A decoder processes `L` frames at a time (a *wave*), packed lane-major so that element `i` of
//! lane `l` is at index `i * L + l`. [`SisoDecoder`] exposes the soft-output form used inside
//! iterative decoders; [`SihoDecoder`] exposes the hard-output form used on received codewords,
//! accepting any number of frames and padding the last wave with zeros when needed.

use std::time::{Duration, Instant};

use crate::{
    common::check_len, encoder::check_geometry, reorderer::DEFAULT_CHUNK_LEN, Bit, Error, Llr,
    Reorderer,
};

/// Frame geometry common to all decoders
pub trait Decoder {
    /// Returns number of information bits per frame (`K`).
    fn info_len(&self) -> usize;

    /// Returns number of code bits per frame (`N`).
    fn codeword_len(&self) -> usize;

    /// Returns number of frames decoded together (`L`).
    fn lanes(&self) -> usize;
}

/// Soft-input soft-output decoder of a systematic code
pub trait SisoDecoder<T: Llr>: Decoder {
    /// Returns number of tail values (systematic and parity) of the code.
    fn tail_length(&self) -> usize;

    /// Returns number of systematic (or parity) values per frame, tail included.
    fn sys_len(&self) -> usize {
        self.info_len() + self.tail_length() / 2
    }

    /// Computes the extrinsic LLR values of one wave.
    ///
    /// # Parameters
    ///
    /// - `sys`: Systematic LLR values (channel plus a priori), `sys_len() * L` values packed
    ///   lane-major, tail included.
    ///
    /// - `par`: Parity LLR values, `sys_len() * L` values packed lane-major, tail included.
    ///
    /// - `ext`: Buffer for the extrinsic LLR values of the information bits, `K * L` values.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer length is wrong.
    fn decode_siso_wave(&mut self, sys: &[T], par: &[T], ext: &mut [T]) -> Result<(), Error>;

    /// Computes the extrinsic LLR values of `n_frames` frames, stored as consecutive waves.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_frames` is not a multiple of the number of lanes, or if a buffer
    /// length is wrong.
    fn decode_siso(
        &mut self,
        sys: &[T],
        par: &[T],
        ext: &mut [T],
        n_frames: usize,
    ) -> Result<(), Error> {
        let lanes = self.lanes();
        if n_frames % lanes != 0 {
            return Err(Error::LengthError(format!(
                "Number of frames {n_frames} is not a multiple of the number of lanes {lanes}"
            )));
        }
        let (sys_wave, ext_wave) = (self.sys_len() * lanes, self.info_len() * lanes);
        let num_waves = n_frames / lanes;
        check_len("systematic LLR buffer", sys.len(), num_waves * sys_wave)?;
        check_len("parity LLR buffer", par.len(), num_waves * sys_wave)?;
        check_len("extrinsic LLR buffer", ext.len(), num_waves * ext_wave)?;
        for ((sys, par), ext) in sys
            .chunks_exact(sys_wave)
            .zip(par.chunks_exact(sys_wave))
            .zip(ext.chunks_exact_mut(ext_wave))
        {
            self.decode_siso_wave(sys, par, ext)?;
        }
        Ok(())
    }
}

/// Soft-input hard-output decoder
pub trait SihoDecoder<T: Llr>: Decoder {
    /// Decodes `n_frames` received frames stored one after the other.
    ///
    /// # Parameters
    ///
    /// - `y`: LLR values of the received codewords (`N * n_frames` values), with positive values
    ///   favoring bit `Zero`.
    ///
    /// - `v`: Buffer for the decoded information bits (`K * n_frames` bits).
    ///
    /// - `n_frames`: Number of frames.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer length is wrong.
    fn decode_siho(&mut self, y: &[T], v: &mut [Bit], n_frames: usize) -> Result<(), Error>;

    /// Returns time spent so far loading, decoding and storing frames.
    fn durations(&self) -> Durations;

    /// Resets the accumulated durations.
    fn reset_durations(&mut self);
}

/// Time spent in each stage of decoding
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Durations {
    /// Reordering received values into waves
    pub load: Duration,
    /// Decoding waves
    pub decode: Duration,
    /// Reordering decoded bits back into frames
    pub store: Duration,
}

/// Decoder of a single wave of lane-major codewords
pub(crate) trait WaveDecoder<T: Llr> {
    /// Decodes one wave.
    ///
    /// `y` holds `N * L` LLR values and `v` receives `K * L` bits, both lane-major; `frame_id` is
    /// the number of the frame in lane `0`.
    fn decode_wave(&mut self, y: &[T], v: &mut [Bit], frame_id: usize) -> Result<(), Error>;
}

/// Splits batches of frames into waves and runs a [`WaveDecoder`] on them
#[derive(Debug)]
pub(crate) struct Waves<T> {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of code bits per frame
    codeword_len: usize,
    /// Number of frames per wave
    lanes: usize,
    /// Reorderer of received values
    llr_reorderer: Reorderer<T>,
    /// Reorderer of decoded bits
    bit_reorderer: Reorderer<Bit>,
    /// Zero-padded copy of the frames of a partial wave
    y_pad: Vec<T>,
    /// Received values of the current wave, lane-major
    y_wave: Vec<T>,
    /// Decoded bits of the current wave, lane-major
    v_wave: Vec<Bit>,
    /// Decoded bits of the current wave, frame after frame
    v_pad: Vec<Bit>,
    /// Number of the next frame to be decoded
    next_frame_id: usize,
    /// Accumulated durations
    durations: Durations,
}

impl<T: Llr> Waves<T> {
    /// Returns wave scheduler for given geometry.
    pub(crate) fn new(info_len: usize, codeword_len: usize, lanes: usize) -> Result<Self, Error> {
        check_geometry(info_len, codeword_len)?;
        Ok(Self {
            info_len,
            codeword_len,
            lanes,
            llr_reorderer: Reorderer::new(lanes, DEFAULT_CHUNK_LEN)?,
            bit_reorderer: Reorderer::new(lanes, DEFAULT_CHUNK_LEN)?,
            y_pad: vec![T::ZERO; codeword_len * lanes],
            y_wave: vec![T::ZERO; codeword_len * lanes],
            v_wave: vec![Bit::Zero; info_len * lanes],
            v_pad: vec![Bit::Zero; info_len * lanes],
            next_frame_id: 0,
            durations: Durations::default(),
        })
    }

    /// Returns number of code bits per frame.
    pub(crate) fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    /// Returns number of frames per wave.
    pub(crate) fn lanes(&self) -> usize {
        self.lanes
    }

    /// Returns accumulated durations.
    pub(crate) fn durations(&self) -> Durations {
        self.durations
    }

    /// Resets accumulated durations.
    pub(crate) fn reset_durations(&mut self) {
        self.durations = Durations::default();
    }

    /// Decodes `n_frames` frames stored one after the other.
    pub(crate) fn run<D: WaveDecoder<T>>(
        &mut self,
        decoder: &mut D,
        y: &[T],
        v: &mut [Bit],
        n_frames: usize,
    ) -> Result<(), Error> {
        let (k, n, lanes) = (self.info_len, self.codeword_len, self.lanes);
        check_len("received LLR buffer", y.len(), n_frames * n)?;
        check_len("decoded bit buffer", v.len(), n_frames * k)?;
        for first in (0 .. n_frames).step_by(lanes) {
            let count = lanes.min(n_frames - first);
            let y_frames = &y[first * n .. (first + count) * n];
            let v_frames = &mut v[first * k .. (first + count) * k];

            let start = Instant::now();
            if count == lanes {
                self.llr_reorderer.pack(y_frames, &mut self.y_wave)?;
            } else {
                self.y_pad[.. count * n].copy_from_slice(y_frames);
                self.y_pad[count * n ..].fill(T::ZERO);
                self.llr_reorderer.pack(&self.y_pad, &mut self.y_wave)?;
            }
            self.durations.load += start.elapsed();

            let start = Instant::now();
            decoder.decode_wave(&self.y_wave, &mut self.v_wave, self.next_frame_id)?;
            self.durations.decode += start.elapsed();

            let start = Instant::now();
            if count == lanes {
                self.bit_reorderer.unpack(&self.v_wave, v_frames)?;
            } else {
                self.bit_reorderer.unpack(&self.v_wave, &mut self.v_pad)?;
                v_frames.copy_from_slice(&self.v_pad[.. count * k]);
            }
            self.durations.store += start.elapsed();

            self.next_frame_id += count;
        }
        Ok(())
    }
}

/// Decoder without redundancy: the SISO form passes the systematic values through, the SIHO
/// form slices the first `K` values of each codeword
#[derive(Debug)]
pub struct NoDecoder<T> {
    /// Slicer of single waves
    core: NoCore,
    /// Wave scheduler
    waves: Waves<T>,
}

/// Wave decoder of [`NoDecoder`]
#[derive(Clone, Copy, Debug)]
struct NoCore {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of frames per wave
    lanes: usize,
}

impl<T: Llr> NoDecoder<T> {
    /// Returns decoder for given geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is invalid or `lanes` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::{Bit, NoDecoder, SihoDecoder};
    ///
    /// let mut decoder = NoDecoder::<f32>::new(2, 3, 1)?;
    /// let mut v = [Bit::Zero; 2];
    /// decoder.decode_siho(&[1.5, -0.5, -2.0], &mut v, 1)?;
    /// assert_eq!(v, [Bit::Zero, Bit::One]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(info_len: usize, codeword_len: usize, lanes: usize) -> Result<Self, Error> {
        Ok(Self {
            core: NoCore { info_len, lanes },
            waves: Waves::new(info_len, codeword_len, lanes)?,
        })
    }
}

impl<T: Llr> WaveDecoder<T> for NoCore {
    fn decode_wave(&mut self, y: &[T], v: &mut [Bit], _frame_id: usize) -> Result<(), Error> {
        let len = self.info_len * self.lanes;
        for (bit, value) in v.iter_mut().zip(&y[.. len]) {
            *bit = if value.is_negative() {
                Bit::One
            } else {
                Bit::Zero
            };
        }
        Ok(())
    }
}

impl<T: Llr> Decoder for NoDecoder<T> {
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

impl<T: Llr> SisoDecoder<T> for NoDecoder<T> {
    fn tail_length(&self) -> usize {
        0
    }

    fn decode_siso_wave(&mut self, sys: &[T], par: &[T], ext: &mut [T]) -> Result<(), Error> {
        let len = self.core.info_len * self.core.lanes;
        check_len("systematic LLR buffer", sys.len(), len)?;
        check_len("parity LLR buffer", par.len(), len)?;
        check_len("extrinsic LLR buffer", ext.len(), len)?;
        ext.copy_from_slice(sys);
        Ok(())
    }
}

impl<T: Llr> SihoDecoder<T> for NoDecoder<T> {
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
