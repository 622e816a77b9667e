//! Encoder capabilities and the simple encoders
//!
//! [`Encoder`] maps `K` information bits to an `N`-bit codeword; [`SystematicEncoder`] adds the
//! parity-only form used when two encoders are concatenated in parallel. Which encoder to build is
//! described by the closed [`EncoderConfig`] enumeration.

use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{common::check_len, Bit, Error, FrameLayout, RscEncoder, Trellis};

/// Offset added to the seed of the coset encoder
const COSET_SEED_OFFSET: u64 = 1024;

/// Encoder of `K`-bit frames into `N`-bit codewords
pub trait Encoder {
    /// Returns number of information bits per frame (`K`).
    fn info_len(&self) -> usize;

    /// Returns number of code bits per frame (`N`).
    fn codeword_len(&self) -> usize;

    /// Encodes one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len()` is not `K`, if `code_bits.len()` is not `N`, or if an
    /// internal consistency check fails.
    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error>;

    /// Encodes frames stored one after the other, and returns the number of frames.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_bits.len()` is not a multiple of `K`, if `code_bits.len()` does
    /// not hold the same number of codewords, or if encoding any frame fails.
    fn encode(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<usize, Error> {
        let (k, n) = (self.info_len(), self.codeword_len());
        if info_bits.len() % k != 0 {
            return Err(Error::LengthError(format!(
                "Number of information bits {} is not a multiple of {k}",
                info_bits.len()
            )));
        }
        let num_frames = info_bits.len() / k;
        check_len("code bit buffer", code_bits.len(), num_frames * n)?;
        for (info, code) in info_bits.chunks_exact(k).zip(code_bits.chunks_exact_mut(n)) {
            self.encode_frame(info, code)?;
        }
        Ok(num_frames)
    }
}

/// Encoder whose codeword contains the information bits, with access to the redundancy alone
pub trait SystematicEncoder: Encoder {
    /// Returns number of tail bits (systematic and parity) appended to the codeword.
    fn tail_length(&self) -> usize;

    /// Writes the non-systematic part of the codeword of one frame, laid out as
    /// `[parity | tail_sys | tail_par]`, to `par` (of length `N - K`).
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer lengths are wrong or if an internal consistency check fails.
    fn encode_sys(&mut self, info_bits: &[Bit], par: &mut [Bit]) -> Result<(), Error>;
}

/// Checks a frame geometry.
pub(crate) fn check_geometry(info_len: usize, codeword_len: usize) -> Result<(), Error> {
    if info_len == 0 || codeword_len == 0 {
        return Err(Error::InvalidArgument(format!(
            "'K' and 'N' must be positive ('K' = {info_len}, 'N' = {codeword_len})"
        )));
    }
    if info_len > codeword_len {
        return Err(Error::InvalidArgument(format!(
            "'K' cannot exceed 'N' ('K' = {info_len}, 'N' = {codeword_len})"
        )));
    }
    Ok(())
}

/// Encoder copying the information bits (`K == N`)
#[derive(Clone, Debug)]
pub struct NoEncoder {
    /// Frame length
    len: usize,
}

impl NoEncoder {
    /// Returns identity encoder for frames of given length.
    ///
    /// # Errors
    ///
    /// Returns an error if `info_len` is `0` or differs from `codeword_len`.
    pub fn new(info_len: usize, codeword_len: usize) -> Result<Self, Error> {
        check_geometry(info_len, codeword_len)?;
        if info_len != codeword_len {
            return Err(Error::InvalidArgument(format!(
                "'K' must equal 'N' ('K' = {info_len}, 'N' = {codeword_len})"
            )));
        }
        Ok(Self { len: info_len })
    }
}

impl Encoder for NoEncoder {
    fn info_len(&self) -> usize {
        self.len
    }

    fn codeword_len(&self) -> usize {
        self.len
    }

    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error> {
        check_len("information bits", info_bits.len(), self.len)?;
        check_len("code bits", code_bits.len(), self.len)?;
        code_bits.copy_from_slice(info_bits);
        Ok(())
    }
}

/// Encoder emitting the all-zero codeword whatever the input
#[derive(Clone, Debug)]
pub struct AzcwEncoder {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of code bits per frame
    codeword_len: usize,
}

impl AzcwEncoder {
    /// Returns all-zero-codeword encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is invalid.
    pub fn new(info_len: usize, codeword_len: usize) -> Result<Self, Error> {
        check_geometry(info_len, codeword_len)?;
        Ok(Self {
            info_len,
            codeword_len,
        })
    }
}

impl Encoder for AzcwEncoder {
    fn info_len(&self) -> usize {
        self.info_len
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error> {
        check_len("information bits", info_bits.len(), self.info_len)?;
        check_len("code bits", code_bits.len(), self.codeword_len)?;
        code_bits.fill(Bit::Zero);
        Ok(())
    }
}

/// Encoder copying the information bits and filling the rest of the codeword with random bits
#[derive(Clone, Debug)]
pub struct CosetEncoder {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of code bits per frame
    codeword_len: usize,
    /// Generator of the coset bits
    rng: StdRng,
}

impl CosetEncoder {
    /// Returns coset encoder whose random bits are drawn from a generator seeded with
    /// `seed + 1024`.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is invalid.
    pub fn new(info_len: usize, codeword_len: usize, seed: u64) -> Result<Self, Error> {
        check_geometry(info_len, codeword_len)?;
        Ok(Self {
            info_len,
            codeword_len,
            rng: StdRng::seed_from_u64(seed.wrapping_add(COSET_SEED_OFFSET)),
        })
    }
}

impl Encoder for CosetEncoder {
    fn info_len(&self) -> usize {
        self.info_len
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error> {
        check_len("information bits", info_bits.len(), self.info_len)?;
        check_len("code bits", code_bits.len(), self.codeword_len)?;
        code_bits[.. self.info_len].copy_from_slice(info_bits);
        for bit in &mut code_bits[self.info_len ..] {
            *bit = if self.rng.random_bool(0.5) {
                Bit::One
            } else {
                Bit::Zero
            };
        }
        Ok(())
    }
}

/// Encoder replaying codewords read from a file
///
/// The file holds the header `n_cw cw_size src_size` followed by `n_cw * cw_size` bits, all as
/// whitespace-separated integers. Successive frames receive successive codewords, cycling back to
/// the first one after the last; the information bits are ignored.
#[derive(Clone, Debug)]
pub struct UserEncoder {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of code bits per frame
    codeword_len: usize,
    /// All codewords, one after the other
    codewords: Vec<Bit>,
    /// Index of the next codeword to emit
    next_cw: usize,
}

impl UserEncoder {
    /// Returns encoder replaying the codewords of given file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if its contents are invalid (see
    /// [`UserEncoder::parse`]).
    pub fn from_file(path: &Path, info_len: usize, codeword_len: usize) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::InvalidArgument(format!("Cannot open codeword file {}: {err}", path.display()))
        })?;
        let encoder = Self::parse(&text, info_len, codeword_len)?;
        tracing::debug!(
            "Loaded {} codewords from {}",
            encoder.num_codewords(),
            path.display()
        );
        Ok(encoder)
    }

    /// Returns encoder replaying the codewords described by given text.
    ///
    /// # Errors
    ///
    /// Returns an error if a header value is zero or `cw_size < src_size`, if `src_size` and
    /// `cw_size` differ from `info_len` and `codeword_len`, if a value is not an integer, or if a
    /// bit is neither `0` nor `1`, or if there are too few bits.
    pub fn parse(text: &str, info_len: usize, codeword_len: usize) -> Result<Self, Error> {
        check_geometry(info_len, codeword_len)?;
        let mut values = text.split_whitespace().map(|token| {
            token.parse::<usize>().map_err(|_| {
                Error::InvalidArgument(format!("Invalid value '{token}' in codeword file"))
            })
        });
        let mut header = [0; 3];
        for value in &mut header {
            *value = values.next().ok_or_else(|| {
                Error::Runtime("Codeword file must start with 'n_cw cw_size src_size'".to_string())
            })??;
        }
        let [n_cw, cw_size, src_size] = header;
        if n_cw == 0 || cw_size == 0 || src_size == 0 || cw_size < src_size {
            return Err(Error::Runtime(format!(
                "Invalid codeword file header ('n_cw' = {n_cw}, 'cw_size' = {cw_size}, \
                'src_size' = {src_size})"
            )));
        }
        if src_size != info_len || cw_size != codeword_len {
            return Err(Error::InvalidArgument(format!(
                "Codeword file sizes do not match ('src_size' = {src_size}, 'K' = {info_len}, \
                'cw_size' = {cw_size}, 'N' = {codeword_len})"
            )));
        }
        let codewords = values
            .take(n_cw * cw_size)
            .map(|value| match value? {
                0 => Ok(Bit::Zero),
                1 => Ok(Bit::One),
                other => Err(Error::InvalidArgument(format!(
                    "Codeword bits must be 0 or 1 (found {other})"
                ))),
            })
            .collect::<Result<Vec<Bit>, Error>>()?;
        if codewords.len() != n_cw * cw_size {
            return Err(Error::Runtime(format!(
                "Codeword file holds {} bits instead of {}",
                codewords.len(),
                n_cw * cw_size
            )));
        }
        Ok(Self {
            info_len,
            codeword_len,
            codewords,
            next_cw: 0,
        })
    }

    /// Returns number of codewords available.
    #[must_use]
    pub fn num_codewords(&self) -> usize {
        self.codewords.len() / self.codeword_len
    }
}

impl Encoder for UserEncoder {
    fn info_len(&self) -> usize {
        self.info_len
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error> {
        check_len("information bits", info_bits.len(), self.info_len)?;
        check_len("code bits", code_bits.len(), self.codeword_len)?;
        let start = self.next_cw * self.codeword_len;
        code_bits.copy_from_slice(&self.codewords[start .. start + self.codeword_len]);
        self.next_cw = (self.next_cw + 1) % self.num_codewords();
        Ok(())
    }
}

/// Configuration of an encoder
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EncoderConfig {
    /// Identity encoder
    No,
    /// All-zero codeword
    Azcw,
    /// Information bits followed by seeded random bits
    Coset {
        /// Seed of the random bits
        seed: u64,
    },
    /// Codewords replayed from a file
    User {
        /// Path to the codeword file
        path: PathBuf,
    },
    /// Recursive systematic convolutional encoder
    Rsc {
        /// Feedback and feedforward polynomials
        polynomials: Vec<usize>,
        /// Codeword layout
        layout: FrameLayout,
    },
}

impl EncoderConfig {
    /// Returns encoder for given geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder cannot be built for the geometry.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::{Bit, EncoderConfig};
    ///
    /// let mut encoder = EncoderConfig::Azcw.build(4, 8)?;
    /// let mut code_bits = [Bit::One; 8];
    /// encoder.encode_frame(&[Bit::One; 4], &mut code_bits)?;
    /// assert_eq!(code_bits, [Bit::Zero; 8]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn build(
        &self,
        info_len: usize,
        codeword_len: usize,
    ) -> Result<Box<dyn Encoder + Send>, Error> {
        Ok(match self {
            EncoderConfig::No => Box::new(NoEncoder::new(info_len, codeword_len)?),
            EncoderConfig::Azcw => Box::new(AzcwEncoder::new(info_len, codeword_len)?),
            EncoderConfig::Coset { seed } => {
                Box::new(CosetEncoder::new(info_len, codeword_len, *seed)?)
            }
            EncoderConfig::User { path } => {
                Box::new(UserEncoder::from_file(path, info_len, codeword_len)?)
            }
            EncoderConfig::Rsc { .. } => self.build_systematic(info_len, codeword_len)?,
        })
    }

    /// Returns systematic encoder for given geometry.
    ///
    /// # Errors
    ///
    /// Returns an `Unimplemented` error for encoders without a systematic form, and an error if
    /// the encoder cannot be built for the geometry.
    pub fn build_systematic(
        &self,
        info_len: usize,
        codeword_len: usize,
    ) -> Result<Box<dyn SystematicEncoder + Send>, Error> {
        match self {
            EncoderConfig::Rsc {
                polynomials,
                layout,
            } => Ok(Box::new(RscEncoder::new(
                info_len,
                codeword_len,
                Trellis::new(polynomials)?,
                *layout,
            )?)),
            other => Err(Error::Unimplemented(format!(
                "{} encoder has no systematic form",
                other.name()
            ))),
        }
    }

    /// Returns the name of the variant.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            EncoderConfig::No => "NO",
            EncoderConfig::Azcw => "AZCW",
            EncoderConfig::Coset { .. } => "COSET",
            EncoderConfig::User { .. } => "USER",
            EncoderConfig::Rsc { .. } => "RSC",
        }
    }
}

#[cfg(test)]
mod tests_of_encoders {
    use super::*;
    use Bit::{One, Zero};

    #[test]
    fn test_check_geometry() {
        assert!(check_geometry(0, 4).is_err());
        assert!(check_geometry(4, 0).is_err());
        assert!(check_geometry(5, 4).is_err());
        assert!(check_geometry(4, 4).is_ok());
    }

    #[test]
    fn test_no_encoder() {
        assert!(NoEncoder::new(4, 6).is_err());
        let mut encoder = NoEncoder::new(3, 3).unwrap();
        let mut code_bits = [Zero; 6];
        let num_frames = encoder
            .encode(&[One, Zero, One, Zero, Zero, One], &mut code_bits)
            .unwrap();
        assert_eq!(num_frames, 2);
        assert_eq!(code_bits, [One, Zero, One, Zero, Zero, One]);
    }

    #[test]
    fn test_encode_lengths() {
        let mut encoder = AzcwEncoder::new(2, 4).unwrap();
        let mut code_bits = [One; 8];
        assert!(encoder.encode(&[One; 3], &mut code_bits).is_err());
        assert!(encoder.encode(&[One; 4], &mut code_bits[.. 6]).is_err());
        assert!(encoder.encode_frame(&[One; 3], &mut code_bits[.. 4]).is_err());
        assert_eq!(encoder.encode(&[One; 4], &mut code_bits).unwrap(), 2);
        assert_eq!(code_bits, [Zero; 8]);
    }

    #[test]
    fn test_coset_encoder() {
        let info_bits = [One, One, Zero, One];
        let mut first = CosetEncoder::new(4, 40, 3).unwrap();
        let mut second = CosetEncoder::new(4, 40, 3).unwrap();
        let mut code_a = [Zero; 40];
        let mut code_b = [Zero; 40];
        first.encode_frame(&info_bits, &mut code_a).unwrap();
        second.encode_frame(&info_bits, &mut code_b).unwrap();
        assert_eq!(code_a, code_b);
        assert_eq!(code_a[.. 4], info_bits);
        assert!(code_a[4 ..].contains(&One) && code_a[4 ..].contains(&Zero));
    }

    #[test]
    fn test_user_encoder_parse() {
        let text = "2 4 2\n1 0 1 1\n0 1 1 0\n";
        // Invalid inputs
        assert!(matches!(
            UserEncoder::parse("0 4 2", 2, 4),
            Err(Error::Runtime(_))
        ));
        assert!(matches!(
            UserEncoder::parse("1 2 4 0 0", 2, 4),
            Err(Error::Runtime(_))
        ));
        assert!(matches!(
            UserEncoder::parse(text, 3, 4),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            UserEncoder::parse("1 4 2 1 0 2 1", 2, 4),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            UserEncoder::parse("1 4 2 1 x 0 1", 2, 4),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            UserEncoder::parse("2 4 2 1 0 1 1", 2, 4),
            Err(Error::Runtime(_))
        ));
        assert!(UserEncoder::parse("2 4", 2, 4).is_err());
        // Valid input
        let mut encoder = UserEncoder::parse(text, 2, 4).unwrap();
        assert_eq!(encoder.num_codewords(), 2);
        let mut code_bits = [Zero; 12];
        encoder.encode(&[Zero; 6], &mut code_bits).unwrap();
        assert_eq!(
            code_bits,
            [One, Zero, One, One, Zero, One, One, Zero, One, Zero, One, One]
        );
    }

    #[test]
    fn test_user_encoder_from_file() {
        let path = std::env::temp_dir().join("turbo_siso_user_encoder_test.txt");
        std::fs::write(&path, "1 3 1\n0 1 1\n").unwrap();
        let mut encoder = UserEncoder::from_file(&path, 1, 3).unwrap();
        let mut code_bits = [One; 3];
        encoder.encode_frame(&[One], &mut code_bits).unwrap();
        assert_eq!(code_bits, [Zero, One, One]);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            UserEncoder::from_file(&path, 1, 3),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_encoder_config() {
        assert!(EncoderConfig::No.build(4, 4).is_ok());
        assert!(EncoderConfig::Coset { seed: 1 }.build(4, 12).is_ok());
        assert!(matches!(
            EncoderConfig::Azcw.build_systematic(4, 8),
            Err(Error::Unimplemented(_))
        ));
        let rsc = EncoderConfig::Rsc {
            polynomials: vec![0o13, 0o15],
            layout: FrameLayout::Buffered,
        };
        let encoder = rsc.build_systematic(8, 22).unwrap();
        assert_eq!(encoder.tail_length(), 6);
        assert!(rsc.build(8, 20).is_err());
        let json = r#"{"type":"coset","seed":7}"#;
        assert_eq!(
            serde_json::from_str::<EncoderConfig>(json).unwrap(),
            EncoderConfig::Coset { seed: 7 }
        );
        assert_eq!(EncoderConfig::Azcw.name(), "AZCW");
    }
}
