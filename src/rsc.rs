//! Recursive systematic convolutional (RSC) encoder

use crate::{
    common::check_len, encoder::check_geometry, Bit, Encoder, Error, FrameLayout,
    SystematicEncoder, Trellis,
};

/// RSC encoder with tail bits terminating the trellis in state `0`
///
/// In the buffered layout the codeword is `[sys | parity | tail_sys | tail_par]`; in the standard
/// layout systematic and parity bits alternate position by position, tail included.
#[derive(Clone, Debug)]
pub struct RscEncoder {
    /// Number of information bits per frame
    info_len: usize,
    /// Number of code bits per frame
    codeword_len: usize,
    /// State machine of the code
    trellis: Trellis,
    /// Codeword layout
    layout: FrameLayout,
    /// Scratch for the non-systematic part of a codeword
    par: Vec<Bit>,
}

impl RscEncoder {
    /// Returns RSC encoder.
    ///
    /// # Parameters
    ///
    /// - `info_len`: Number of information bits per frame (`K`).
    ///
    /// - `codeword_len`: Number of code bits per frame (`N`), which must equal
    ///   `2 * K + trellis.tail_length()`.
    ///
    /// - `trellis`: State machine of the code.
    ///
    /// - `layout`: Codeword layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::{Bit, Encoder, FrameLayout, RscEncoder, Trellis};
    /// use Bit::{One, Zero};
    ///
    /// let mut encoder = RscEncoder::new(4, 14, Trellis::lte(), FrameLayout::Buffered)?;
    /// let mut code_bits = [Zero; 14];
    /// encoder.encode_frame(&[One, One, Zero, One], &mut code_bits)?;
    /// assert_eq!(code_bits[4 .. 8], [One, Zero, Zero, One]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        info_len: usize,
        codeword_len: usize,
        trellis: Trellis,
        layout: FrameLayout,
    ) -> Result<Self, Error> {
        check_geometry(info_len, codeword_len)?;
        let expected = 2 * info_len + trellis.tail_length();
        if codeword_len != expected {
            return Err(Error::InvalidArgument(format!(
                "'N' must equal 2 * 'K' + {} ('K' = {info_len}, 'N' = {codeword_len})",
                trellis.tail_length()
            )));
        }
        tracing::debug!(
            "Built RSC encoder (K = {info_len}, N = {codeword_len}, layout {layout:?})"
        );
        Ok(Self {
            info_len,
            codeword_len,
            trellis,
            layout,
            par: vec![Bit::Zero; codeword_len - info_len],
        })
    }

    /// Returns state machine of the code.
    #[must_use]
    pub fn trellis(&self) -> &Trellis {
        &self.trellis
    }

    /// Returns codeword layout.
    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }
}

impl Encoder for RscEncoder {
    fn info_len(&self) -> usize {
        self.info_len
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }

    fn encode_frame(&mut self, info_bits: &[Bit], code_bits: &mut [Bit]) -> Result<(), Error> {
        check_len("code bits", code_bits.len(), self.codeword_len)?;
        let mut par = std::mem::take(&mut self.par);
        let result = self.encode_sys(info_bits, &mut par);
        self.par = par;
        result?;
        let (k, n_ff) = (self.info_len, self.trellis.memory_len());
        match self.layout {
            FrameLayout::Buffered => {
                code_bits[.. k].copy_from_slice(info_bits);
                code_bits[k ..].copy_from_slice(&self.par);
            }
            FrameLayout::Standard => {
                for (i, pair) in code_bits[.. 2 * k].chunks_exact_mut(2).enumerate() {
                    pair[0] = info_bits[i];
                    pair[1] = self.par[i];
                }
                for (j, pair) in code_bits[2 * k ..].chunks_exact_mut(2).enumerate() {
                    pair[0] = self.par[k + j];
                    pair[1] = self.par[k + n_ff + j];
                }
            }
        }
        Ok(())
    }
}

impl SystematicEncoder for RscEncoder {
    fn tail_length(&self) -> usize {
        self.trellis.tail_length()
    }

    fn encode_sys(&mut self, info_bits: &[Bit], par: &mut [Bit]) -> Result<(), Error> {
        let (k, n_ff) = (self.info_len, self.trellis.memory_len());
        check_len("information bits", info_bits.len(), k)?;
        check_len("parity bits", par.len(), self.codeword_len - k)?;
        let mut state = 0;
        for (&bit, parity) in info_bits.iter().zip(par.iter_mut()) {
            *parity = self.trellis.inner_encode(bit, &mut state);
        }
        for j in 0 .. n_ff {
            let tail_bit = self.trellis.tail_bit_sys(state);
            par[k + j] = tail_bit;
            par[k + n_ff + j] = self.trellis.inner_encode(tail_bit, &mut state);
        }
        if state != 0 {
            return Err(Error::Runtime(format!(
                "Encoder ended in state {state} instead of 0 after the tail bits"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests_of_rsc_encoder {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use Bit::{One, Zero};

    /// Returns random bits from a seeded generator.
    fn seeded_bits(num_bits: usize, rng: &mut StdRng) -> Vec<Bit> {
        (0 .. num_bits)
            .map(|_| if rng.random_bool(0.5) { One } else { Zero })
            .collect()
    }

    #[test]
    fn test_new() {
        assert!(RscEncoder::new(0, 6, Trellis::lte(), FrameLayout::Buffered).is_err());
        assert!(RscEncoder::new(40, 85, Trellis::lte(), FrameLayout::Buffered).is_err());
        let encoder = RscEncoder::new(40, 86, Trellis::lte(), FrameLayout::Standard).unwrap();
        assert_eq!(encoder.tail_length(), 6);
        assert_eq!(encoder.layout(), FrameLayout::Standard);
        assert_eq!(encoder.trellis().num_states(), 8);
    }

    #[test]
    fn test_encode_sys() {
        let mut encoder = RscEncoder::new(4, 14, Trellis::lte(), FrameLayout::Buffered).unwrap();
        let mut par = [Zero; 10];
        encoder.encode_sys(&[One, One, Zero, One], &mut par).unwrap();
        // Parity bits, then tail from state 7: systematic bits 0, 0, 1 with parities 0, 1, 1
        assert_eq!(par, [One, Zero, Zero, One, Zero, Zero, One, Zero, One, One]);
        assert!(encoder.encode_sys(&[One; 3], &mut par).is_err());
        assert!(encoder.encode_sys(&[One; 4], &mut par[.. 9]).is_err());
    }

    #[test]
    fn test_termination() {
        let mut rng = StdRng::seed_from_u64(17);
        for info_len in [1, 2, 7, 40, 333] {
            let trellis = Trellis::lte();
            let n_ff = trellis.memory_len();
            let mut encoder =
                RscEncoder::new(info_len, 2 * info_len + 6, trellis.clone(), FrameLayout::Buffered)
                    .unwrap();
            for _ in 0 .. 20 {
                let info_bits = seeded_bits(info_len, &mut rng);
                let mut code_bits = vec![Zero; 2 * info_len + 6];
                encoder.encode_frame(&info_bits, &mut code_bits).unwrap();
                assert_eq!(code_bits[.. info_len], info_bits);
                // Re-run the state machine over information and tail bits
                let mut state = 0;
                for (i, &bit) in info_bits.iter().enumerate() {
                    let parity = trellis.inner_encode(bit, &mut state);
                    assert_eq!(code_bits[info_len + i], parity);
                }
                for j in 0 .. n_ff {
                    let tail_sys = code_bits[2 * info_len + j];
                    let parity = trellis.inner_encode(tail_sys, &mut state);
                    assert_eq!(code_bits[2 * info_len + n_ff + j], parity);
                }
                assert_eq!(state, 0);
            }
        }
    }

    #[test]
    fn test_standard_layout() {
        let mut rng = StdRng::seed_from_u64(23);
        let info_bits = seeded_bits(40, &mut rng);
        let mut buffered = RscEncoder::new(40, 86, Trellis::lte(), FrameLayout::Buffered).unwrap();
        let mut standard = RscEncoder::new(40, 86, Trellis::lte(), FrameLayout::Standard).unwrap();
        let mut code_b = vec![Zero; 86];
        let mut code_s = vec![Zero; 86];
        buffered.encode_frame(&info_bits, &mut code_b).unwrap();
        standard.encode_frame(&info_bits, &mut code_s).unwrap();
        for i in 0 .. 40 {
            assert_eq!(code_s[2 * i], code_b[i]);
            assert_eq!(code_s[2 * i + 1], code_b[40 + i]);
        }
        for j in 0 .. 3 {
            assert_eq!(code_s[80 + 2 * j], code_b[80 + j]);
            assert_eq!(code_s[81 + 2 * j], code_b[83 + j]);
        }
    }

    #[test]
    fn test_encode_batch() {
        let mut encoder = RscEncoder::new(4, 14, Trellis::lte(), FrameLayout::Buffered).unwrap();
        let info_bits = [One, One, Zero, One, Zero, Zero, Zero, Zero];
        let mut code_bits = [One; 28];
        assert_eq!(encoder.encode(&info_bits, &mut code_bits).unwrap(), 2);
        assert_eq!(code_bits[.. 4], [One, One, Zero, One]);
        assert_eq!(code_bits[14 ..], [Zero; 14]);
    }
}
