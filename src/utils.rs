//! # Some useful functions for simulating code performance
//!
//! The [`random_bits`] function returns a given number of random bits; the [`bpsk_awgn_channel`]
//! function returns the LLR values at the output of a BPSK-AWGN channel corresponding to given
//! input bits; the [`quantize`] function converts them to a fixed-point representation; the
//! [`bpsk_slicer`] function slices LLR values to bits; and the [`error_count`] function returns
//! the number of errors in a sequence with respect to a reference sequence.
//!
//! # Examples
//!
//! The code below illustrates the usage of the functions in this module.
//! ```
//! use turbo_siso::utils;
//!
//! let mut rng = rand::rng();
//! let bits = utils::random_bits(40, &mut rng);
//! let bits_llr = utils::bpsk_awgn_channel(&bits, 10.0, &mut rng);
//! let bits_llr_q: Vec<i16> = utils::quantize(&bits_llr, 2);
//! let bits_hat = utils::bpsk_slicer(&bits_llr_q);
//! let err_count = utils::error_count(&bits_hat, &bits);
//! ```

use rand::Rng;
use rand_distr::StandardNormal;

use crate::{Bit, Llr};

/// Returns given number of random bits.
///
/// # Parameters
///
/// - `num_bits`: Number of random bits to be generated.
///
/// - `rng`: Random number generator to be used.
///
/// # Returns
///
/// - `bits`: Random bits.
#[must_use]
pub fn random_bits<R: Rng>(num_bits: usize, rng: &mut R) -> Vec<Bit> {
    (0 .. num_bits)
        .map(|_| {
            if rng.random_bool(0.5) {
                Bit::One
            } else {
                Bit::Zero
            }
        })
        .collect()
}

/// Returns LLR values at BPSK-AWGN channel output corresponding to given input bits.
///
/// # Parameters
///
/// - `bits`: Bits to be transmitted over the BPSK-AWGN channel.
///
/// - `es_over_n0_db`: Ratio (dB) of symbol energy to noise power spectral density at the BPSK-AWGN
///   channel output (if the BPSK symbols are `+1.0` and `-1.0`, then the noise variance is
///   `0.5 / 10f64.powf(0.1 * es_over_n0_db)`).
///
/// - `rng`: Random number generator to be used.
///
/// # Returns
///
/// - `bits_llr`: Log-likelihood-ratio (LLR) values at the BPSK-AWGN channel output corresponding
///   to the transmitted bits, with positive values indicating that `Zero` is more likely.
#[must_use]
pub fn bpsk_awgn_channel<R: Rng>(bits: &[Bit], es_over_n0_db: f64, rng: &mut R) -> Vec<f64> {
    let es_over_n0 = 10f64.powf(0.1 * es_over_n0_db);
    let noise_var = 0.5 / es_over_n0;
    bits.iter()
        .map(|b| match b {
            Bit::Zero => 1f64,
            Bit::One => -1f64,
        })
        .map(|x| 4.0 * es_over_n0 * (x + noise_var.sqrt() * rng.sample::<f64, _>(StandardNormal)))
        .collect()
}

/// Returns LLR values converted to a fixed-point representation.
///
/// # Parameters
///
/// - `llrs`: Real LLR values.
///
/// - `fractional_bits`: Number of fractional bits of the representation: each value is scaled by
///   `2^fractional_bits`, rounded, and saturated to the bound of `T`.
///
/// # Returns
///
/// - `llrs_q`: Quantized LLR values.
///
/// # Examples
///
/// ```
/// use turbo_siso::utils::quantize;
///
/// let llrs_q: Vec<i8> = quantize(&[0.3, -1.2, 100.0], 2);
/// assert_eq!(llrs_q, [1, -5, 63]);
/// ```
#[must_use]
pub fn quantize<T: Llr>(llrs: &[f64], fractional_bits: u32) -> Vec<T> {
    let scale = 2f64.powi(i32::try_from(fractional_bits).unwrap_or(i32::MAX));
    llrs.iter().map(|&x| T::from_f64(scale * x)).collect()
}

/// Returns BPSK slicer output.
///
/// # Parameters
///
/// - `syms`: LLR values to be sliced. Nonnegative values are mapped to `Zero`, and negative values
///   to `One`.
///
/// # Returns
///
/// - `bits_hat`: Bits obtained by slicing the given values.
#[must_use]
pub fn bpsk_slicer<T: Llr>(syms: &[T]) -> Vec<Bit> {
    syms.iter()
        .map(|&x| if x.is_negative() { Bit::One } else { Bit::Zero })
        .collect()
}

/// Returns number of errors in a sequence with respect to a reference sequence.
///
/// # Parameters
///
/// - `seq`: Sequence in which errors must be counted.
///
/// - `ref_seq`: Reference sequence to which the given sequence is compared.
///
/// # Returns
///
/// - `err_count`: Number of positions in which the two sequences differ. If they are of different
///   lengths, then the longer sequence is effectively truncated to the length of the shorter one.
pub fn error_count<T: PartialEq>(seq: &[T], ref_seq: &[T]) -> usize {
    ref_seq
        .iter()
        .zip(seq.iter())
        .filter(|&(x, y)| x != y)
        .count()
}
