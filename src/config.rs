//! Configuration of a complete turbo codec
//!
//! A [`TurboConfig`] is read from (or written to) JSON and assembles the turbo encoder and the
//! turbo decoder of the code it describes.
//!
//! # Examples
//!
//! ```
//! use turbo_siso::{Bit, Encoder, SihoDecoder, TurboConfig};
//!
//! let config: TurboConfig = serde_json::from_str(
//!     r#"{ "info_len": 48, "decoding_algo": { "LogMAP": 4 }, "lanes": 2 }"#,
//! )?;
//! config.validate()?;
//! let mut encoder = config.build_encoder()?;
//! let mut decoder = config.build_decoder::<f32>()?;
//! let info_bits = [Bit::One; 48];
//! let mut code_bits = vec![Bit::Zero; config.codeword_len()?];
//! encoder.encode_frame(&info_bits, &mut code_bits)?;
//! let y: Vec<f32> = code_bits
//!     .iter()
//!     .map(|&b| if b == Bit::Zero { 4.0 } else { -4.0 })
//!     .collect();
//! let mut v = [Bit::Zero; 48];
//! decoder.decode_siho(&y, &mut v, 1)?;
//! assert_eq!(v, info_bits);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    lte, trellis::LTE_POLYNOMIALS, BcjrDecoder, DecodingAlgo, Error, ExtrinsicScaling,
    FrameLayout, Interleaver, InterleaverLaw, Llr, Max, MaxLinear, MaxOp, MaxStar, NumericFormat,
    RscEncoder, Schedule, SihoDecoder, StableDecisionStop, TraceObserver, Trellis, TurboDecoder,
    TurboEncoder,
};

/// Interleaver of a turbo codec
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InterleaverConfig {
    /// Rule generating the permutation
    pub law: InterleaverLaw,
    /// Whether each frame index has its own permutation
    pub uniform: bool,
    /// Number of permutations of a uniform interleaver
    pub n_frames: usize,
}

impl Default for InterleaverConfig {
    fn default() -> Self {
        Self {
            law: InterleaverLaw::Lte,
            uniform: false,
            n_frames: 1,
        }
    }
}

/// Complete description of a turbo codec
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TurboConfig {
    /// Number of information bits per frame
    pub info_len: usize,
    /// Feedback and feedforward polynomials of both constituent codes
    pub polynomials: Vec<usize>,
    /// Decoding algorithm and number of turbo iterations
    pub decoding_algo: DecodingAlgo,
    /// Representation of LLR values in the decoder
    pub numeric_format: NumericFormat,
    /// Number of frames decoded together
    pub lanes: usize,
    /// Backward schedule of the BCJR decoders
    pub schedule: Schedule,
    /// Codeword layout
    pub layout: FrameLayout,
    /// Interleaver
    pub interleaver: InterleaverConfig,
    /// Factor applied to extrinsic values after each constituent decoding
    pub extrinsic_scaling: Option<f64>,
    /// Number of iterations with unchanged decisions after which decoding stops
    pub early_stop_patience: Option<usize>,
    /// Whether a trace event is emitted per constituent decoding
    pub trace_iterations: bool,
    /// Number of fractional bits of fixed-point LLR values
    pub fractional_bits: u32,
}

impl Default for TurboConfig {
    fn default() -> Self {
        Self {
            info_len: 40,
            polynomials: LTE_POLYNOMIALS.to_vec(),
            decoding_algo: DecodingAlgo::default(),
            numeric_format: NumericFormat::default(),
            lanes: 1,
            schedule: Schedule::default(),
            layout: FrameLayout::default(),
            interleaver: InterleaverConfig::default(),
            extrinsic_scaling: None,
            early_stop_patience: None,
            trace_iterations: false,
            fractional_bits: 2,
        }
    }
}

impl TurboConfig {
    /// Returns configuration read from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let writer = File::create(path)?;
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not describe a codec that can be built.
    pub fn validate(&self) -> Result<(), Error> {
        if self.info_len == 0 {
            return Err(Error::InvalidArgument("'K' must be a positive integer".to_string()));
        }
        if !self.lanes.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "Number of lanes must be a power of two (found {})",
                self.lanes
            )));
        }
        if self.decoding_algo.num_iter() == 0 {
            return Err(Error::InvalidArgument(
                "Number of turbo iterations must be a positive integer".to_string(),
            ));
        }
        if !self.trellis()?.is_reference() {
            return Err(Error::InvalidArgument(format!(
                "Polynomials {:?} are not supported by the BCJR decoder",
                self.polynomials
            )));
        }
        let reg_lanes = self.reg_lanes();
        if self.schedule == Schedule::Blocked && self.info_len % reg_lanes != 0 {
            return Err(Error::InvalidArgument(format!(
                "'K' must be a multiple of {reg_lanes} for the blocked schedule with {} values \
                ('K' = {})",
                self.numeric_format, self.info_len
            )));
        }
        match &self.interleaver.law {
            InterleaverLaw::Lte => {
                lte::qpp_coefficients(self.info_len)?;
            }
            InterleaverLaw::Explicit { perm } if perm.len() != self.info_len => {
                return Err(Error::InvalidArgument(format!(
                    "Explicit permutation has length {} instead of 'K' = {}",
                    perm.len(),
                    self.info_len
                )));
            }
            _ => (),
        }
        if self.interleaver.n_frames == 0 {
            return Err(Error::InvalidArgument(
                "Number of interleaver tables must be a positive integer".to_string(),
            ));
        }
        if let Some(factor) = self.extrinsic_scaling {
            ExtrinsicScaling::new(factor)?;
            if matches!(self.decoding_algo, DecodingAlgo::LogMAP(_)) {
                tracing::warn!("Extrinsic scaling {factor} is applied to Log-MAP decoding");
            }
        }
        if let Some(patience) = self.early_stop_patience {
            StableDecisionStop::new(patience)?;
        }
        if self.fractional_bits > 8 {
            return Err(Error::InvalidArgument(format!(
                "At most 8 fractional bits are supported (found {})",
                self.fractional_bits
            )));
        }
        if matches!(self.numeric_format, NumericFormat::F64 | NumericFormat::F32)
            && self.fractional_bits != TurboConfig::default().fractional_bits
        {
            tracing::warn!(
                "{} fractional bits are ignored with {} values",
                self.fractional_bits,
                self.numeric_format
            );
        }
        Ok(())
    }

    /// Returns trellis of the constituent codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the polynomials are invalid.
    pub fn trellis(&self) -> Result<Trellis, Error> {
        Trellis::new(&self.polynomials)
    }

    /// Returns number of code bits per frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the polynomials are invalid.
    pub fn codeword_len(&self) -> Result<usize, Error> {
        Ok(3 * self.info_len + 2 * self.trellis()?.tail_length())
    }

    /// Returns number of values held by a 256-bit register in the configured representation.
    #[must_use]
    pub fn reg_lanes(&self) -> usize {
        match self.numeric_format {
            NumericFormat::F64 => f64::REG_LANES,
            NumericFormat::F32 => f32::REG_LANES,
            NumericFormat::I16 => i16::REG_LANES,
            NumericFormat::I8 => i8::REG_LANES,
            NumericFormat::I32 => i32::REG_LANES,
            NumericFormat::I64 => i64::REG_LANES,
        }
    }

    /// Returns initialized interleaver.
    ///
    /// Interleavers built from the same configuration hold the same permutations.
    ///
    /// # Errors
    ///
    /// Returns an error if the interleaver configuration is invalid.
    pub fn build_interleaver(&self) -> Result<Arc<Interleaver>, Error> {
        let mut interleaver = Interleaver::with_law(
            self.info_len,
            self.interleaver.law.clone(),
            self.interleaver.uniform,
            self.interleaver.n_frames,
        )?;
        interleaver.init()?;
        Ok(Arc::new(interleaver))
    }

    /// Returns turbo encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build_encoder(&self) -> Result<TurboEncoder<RscEncoder, RscEncoder>, Error> {
        let trellis = self.trellis()?;
        let rsc_len = 2 * self.info_len + trellis.tail_length();
        let rsc = || RscEncoder::new(self.info_len, rsc_len, trellis.clone(), self.layout);
        TurboEncoder::new(
            self.info_len,
            self.codeword_len()?,
            rsc()?,
            rsc()?,
            self.build_interleaver()?,
            self.layout,
        )
    }

    /// Returns turbo decoder with LLR values of type `T`.
    ///
    /// The combination operator of the BCJR decoders follows the decoding algorithm, and the
    /// observers follow the extrinsic scaling, early stop and trace settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build_decoder<T: Llr>(&self) -> Result<Box<dyn SihoDecoder<T> + Send>, Error> {
        match self.decoding_algo {
            DecodingAlgo::LogMAP(_) => self.build_decoder_with::<T, MaxStar>(),
            DecodingAlgo::MaxLogMAP(_) => self.build_decoder_with::<T, Max>(),
            DecodingAlgo::LinearLogMAP(_) => self.build_decoder_with::<T, MaxLinear>(),
        }
    }

    /// Returns turbo decoder with combination operator `O`.
    fn build_decoder_with<T: Llr, O: MaxOp>(
        &self,
    ) -> Result<Box<dyn SihoDecoder<T> + Send>, Error> {
        let trellis = self.trellis()?;
        let siso = || {
            BcjrDecoder::<T, O>::new(
                self.info_len,
                &trellis,
                self.lanes,
                self.schedule,
                self.layout,
            )
        };
        let mut decoder = TurboDecoder::new(
            self.info_len,
            self.codeword_len()?,
            self.decoding_algo.num_iter() as usize,
            self.build_interleaver()?,
            siso()?,
            siso()?,
            self.layout,
        )?;
        if let Some(factor) = self.extrinsic_scaling {
            decoder.add_observer(Box::new(ExtrinsicScaling::new(factor)?));
        }
        if let Some(patience) = self.early_stop_patience {
            decoder.add_observer(Box::new(StableDecisionStop::new(patience)?));
        }
        if self.trace_iterations {
            decoder.add_observer(Box::new(TraceObserver));
        }
        Ok(Box::new(decoder))
    }
}
