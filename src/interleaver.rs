//! Interleaver for frames of a given length
//!
//! The permutation comes from an [`InterleaverLaw`]. A *uniform* interleaver keeps one
//! permutation per frame index of a batch of `n_frames` frames, and successive frames (with
//! frame numbering continuing across calls) cycle through them; otherwise all frames share one
//! permutation. Lookup tables are generated by [`Interleaver::init`] and are read-only afterwards.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{common::check_len, lte, Error};

/// Rule generating the base permutation of an interleaver
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InterleaverLaw {
    /// LTE quadratic permutation polynomial
    Lte,
    /// Seeded random shuffle
    Random {
        /// Seed of the shuffle
        seed: u64,
    },
    /// Given permutation
    Explicit {
        /// Input index for each output index
        perm: Vec<usize>,
    },
}

/// Interleaver for frames of a given length
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Interleaver {
    /// Length of each frame
    length: usize,
    /// Rule generating the permutations
    law: InterleaverLaw,
    /// Whether each frame index of a batch has its own permutation
    uniform: bool,
    /// Number of frames per batch
    n_frames: usize,
    /// Input index for each output index, one table per permutation (needed in interleaving)
    all_in_index_given_out_index: Vec<usize>,
    /// Output index for each input index, one table per permutation (needed in deinterleaving)
    all_out_index_given_in_index: Vec<usize>,
    /// Number of times the tables were regenerated by `refresh`
    epoch: u64,
}

impl Interleaver {
    /// Returns initialized interleaver corresponding to a given permutation.
    ///
    /// # Parameters
    ///
    /// - `perm`: Permutation of integers in `[0, K)` for some positive integer `K`. If the
    ///   interleaver input is the sequence `x[0], x[1], ..., x[K-1]`, then its output is the
    ///   sequence `x[perm[0]], x[perm[1]], ..., x[perm[K-1]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is not a permutation of the integers in `[0, K)` for some
    /// positive integer `K`.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// assert_eq!(interleaver.pi(0)?, perm);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(perm: &[usize]) -> Result<Self, Error> {
        let mut interleaver = Self::with_law(
            perm.len(),
            InterleaverLaw::Explicit {
                perm: perm.to_vec(),
            },
            false,
            1,
        )?;
        interleaver.init()?;
        Ok(interleaver)
    }

    /// Returns uninitialized interleaver.
    ///
    /// # Parameters
    ///
    /// - `length`: Length of each frame (`K`).
    ///
    /// - `law`: Rule generating the base permutation.
    ///
    /// - `uniform`: Whether each frame index of a batch gets its own permutation.
    ///
    /// - `n_frames`: Number of frames per batch (number of permutations if `uniform`).
    ///
    /// # Errors
    ///
    /// Returns an error if `length` or `n_frames` is `0`, or if an explicit permutation does not
    /// have length `length`.
    pub fn with_law(
        length: usize,
        law: InterleaverLaw,
        uniform: bool,
        n_frames: usize,
    ) -> Result<Self, Error> {
        if length == 0 {
            return Err(Error::InvalidArgument(
                "Length of interleaver must be a positive integer".to_string(),
            ));
        }
        if n_frames == 0 {
            return Err(Error::InvalidArgument(
                "Number of frames of interleaver must be a positive integer".to_string(),
            ));
        }
        if let InterleaverLaw::Explicit { perm } = &law {
            if perm.len() != length {
                return Err(Error::InvalidArgument(format!(
                    "Permutation length {} differs from interleaver length {length}",
                    perm.len()
                )));
            }
        }
        Ok(Self {
            length,
            law,
            uniform,
            n_frames,
            all_in_index_given_out_index: Vec::new(),
            all_out_index_given_in_index: Vec::new(),
            epoch: 0,
        })
    }

    /// Returns seeded random interleaver, already initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::Interleaver;
    ///
    /// let interleaver = Interleaver::random(8, 42)?;
    /// assert_eq!(interleaver, Interleaver::random(8, 42)?);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn random(length: usize, seed: u64) -> Result<Self, Error> {
        let mut interleaver =
            Self::with_law(length, InterleaverLaw::Random { seed }, false, 1)?;
        interleaver.init()?;
        Ok(interleaver)
    }

    /// Generates the lookup tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the law cannot produce a permutation of the interleaver length (for
    /// example an LTE interleaver whose length is not in the QPP table), or if an explicit
    /// permutation is invalid.
    pub fn init(&mut self) -> Result<(), Error> {
        let num_tables = self.num_tables();
        let mut in_given_out = Vec::with_capacity(num_tables * self.length);
        let base = match &self.law {
            InterleaverLaw::Lte => lte::qpp_permutation(self.length)?,
            InterleaverLaw::Explicit { perm } => valid_perm(perm)?,
            InterleaverLaw::Random { .. } => Vec::new(),
        };
        for table in 0 .. num_tables {
            if let InterleaverLaw::Random { seed } = self.law {
                let mut perm: Vec<usize> = (0 .. self.length).collect();
                let offset = self.epoch * num_tables as u64 + table as u64;
                perm.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(offset)));
                in_given_out.extend(perm);
            } else {
                in_given_out.extend((0 .. self.length).map(|i| base[(i + table) % self.length]));
            }
        }
        let mut out_given_in = vec![0; in_given_out.len()];
        for (in_table, out_table) in in_given_out
            .chunks_exact(self.length)
            .zip(out_given_in.chunks_exact_mut(self.length))
        {
            for (out_index, &in_index) in in_table.iter().enumerate() {
                out_table[in_index] = out_index;
            }
        }
        self.all_in_index_given_out_index = in_given_out;
        self.all_out_index_given_in_index = out_given_in;
        tracing::debug!(
            "Initialized interleaver of length {} ({num_tables} table(s), epoch {})",
            self.length,
            self.epoch
        );
        Ok(())
    }

    /// Regenerates the lookup tables; the random law moves to a fresh set of seeds.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Interleaver::init`].
    pub fn refresh(&mut self) -> Result<(), Error> {
        self.epoch += 1;
        self.init()
    }

    /// Returns `true` if the lookup tables have been generated.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.all_in_index_given_out_index.is_empty()
    }

    /// Returns length of each frame.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns `true` if each frame index of a batch has its own permutation.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    /// Returns number of frames per batch.
    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Returns interleaving table (input index for each output index) used by given frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the interleaver is not initialized.
    pub fn pi(&self, frame_id: usize) -> Result<&[usize], Error> {
        self.check_initialized()?;
        Ok(self.table(&self.all_in_index_given_out_index, frame_id))
    }

    /// Returns deinterleaving table (output index for each input index) used by given frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the interleaver is not initialized.
    pub fn pi_inv(&self, frame_id: usize) -> Result<&[usize], Error> {
        self.check_initialized()?;
        Ok(self.table(&self.all_out_index_given_in_index, frame_id))
    }

    /// Generates interleaver output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Interleaver input for `n_frames` frames.
    ///
    /// - `output`: Buffer for interleaver output, of the same length as `input`.
    ///
    /// - `frame_id`: Number of the first frame (selects the permutations of uniform
    ///   interleavers).
    ///
    /// - `n_frames`: Number of frames in `input`.
    ///
    /// - `lane_reordered`: Whether the frames are packed lane-major (element `i` of frame `f` at
    ///   index `i * n_frames + f`) rather than stored one after the other.
    ///
    /// # Errors
    ///
    /// Returns an error if the interleaver is not initialized or if `input.len()` or
    /// `output.len()` is not `K * n_frames`.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
    /// let mut output = ['-'; 8];
    /// interleaver.interleave(&input, &mut output, 0, 1, false)?;
    /// assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn interleave<T: Copy>(
        &self,
        input: &[T],
        output: &mut [T],
        frame_id: usize,
        n_frames: usize,
        lane_reordered: bool,
    ) -> Result<(), Error> {
        self.permute(
            &self.all_in_index_given_out_index,
            input,
            output,
            frame_id,
            n_frames,
            lane_reordered,
        )
    }

    /// Generates interleaver input given its output (inverse of [`Interleaver::interleave`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the interleaver is not initialized or if `output.len()` or
    /// `input.len()` is not `K * n_frames`.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
    /// let mut input = ['-'; 8];
    /// interleaver.deinterleave(&output, &mut input, 0, 1, false)?;
    /// assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn deinterleave<T: Copy>(
        &self,
        output: &[T],
        input: &mut [T],
        frame_id: usize,
        n_frames: usize,
        lane_reordered: bool,
    ) -> Result<(), Error> {
        self.permute(
            &self.all_out_index_given_in_index,
            output,
            input,
            frame_id,
            n_frames,
            lane_reordered,
        )
    }

    /// Applies the tables `luts` to `n_frames` frames.
    fn permute<T: Copy>(
        &self,
        luts: &[usize],
        src: &[T],
        dst: &mut [T],
        frame_id: usize,
        n_frames: usize,
        lane_reordered: bool,
    ) -> Result<(), Error> {
        self.check_initialized()?;
        check_len("interleaver input", src.len(), self.length * n_frames)?;
        check_len("interleaver output", dst.len(), self.length * n_frames)?;
        for f in 0 .. n_frames {
            let lut = self.table(luts, frame_id + f);
            if lane_reordered {
                for (i, &j) in lut.iter().enumerate() {
                    dst[i * n_frames + f] = src[j * n_frames + f];
                }
            } else {
                let offset = f * self.length;
                for (i, &j) in lut.iter().enumerate() {
                    dst[offset + i] = src[offset + j];
                }
            }
        }
        Ok(())
    }

    /// Returns the table of `luts` used by given frame.
    fn table<'a>(&self, luts: &'a [usize], frame_id: usize) -> &'a [usize] {
        let index = if self.uniform {
            frame_id % self.n_frames
        } else {
            0
        };
        &luts[index * self.length .. (index + 1) * self.length]
    }

    /// Returns number of permutations kept.
    fn num_tables(&self) -> usize {
        if self.uniform {
            self.n_frames
        } else {
            1
        }
    }

    /// Checks that the tables have been generated.
    fn check_initialized(&self) -> Result<(), Error> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::LengthError(
                "Interleaver used before its tables were generated with 'init'".to_string(),
            ))
        }
    }
}

/// Returns copy of `perm` if it is a permutation of the integers in `[0, perm.len())`.
fn valid_perm(perm: &[usize]) -> Result<Vec<usize>, Error> {
    let mut perm_sorted = perm.to_vec();
    perm_sorted.sort_unstable();
    if perm_sorted.into_iter().eq(0 .. perm.len()) {
        Ok(perm.to_vec())
    } else {
        Err(Error::InvalidArgument(format!(
            "Expected permutation of all integers in the range [0, {}), found {perm:?}",
            perm.len()
        )))
    }
}

#[cfg(test)]
mod tests_of_interleaver {
    use super::*;

    /// Checks that every table of an initialized interleaver is inverted by its inverse table.
    fn assert_inverse_tables(interleaver: &Interleaver) {
        for frame_id in 0 .. interleaver.n_frames() {
            let pi = interleaver.pi(frame_id).unwrap();
            let pi_inv = interleaver.pi_inv(frame_id).unwrap();
            for i in 0 .. interleaver.length() {
                assert_eq!(pi_inv[pi[i]], i);
            }
        }
    }

    #[test]
    fn test_new() {
        // Invalid input
        assert!(Interleaver::new(&[]).is_err());
        assert!(Interleaver::new(&[1, 2, 3, 4]).is_err());
        assert!(Interleaver::new(&[0, 1, 2, 4]).is_err());
        assert!(Interleaver::new(&[0, 0, 1, 2]).is_err());
        // Valid input
        let interleaver = Interleaver::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        assert_eq!(interleaver.length(), 8);
        assert_eq!(interleaver.pi(0).unwrap(), [0, 3, 2, 5, 4, 7, 6, 1]);
        assert_eq!(interleaver.pi_inv(0).unwrap(), [0, 7, 2, 1, 4, 3, 6, 5]);
    }

    #[test]
    fn test_with_law() {
        assert!(Interleaver::with_law(0, InterleaverLaw::Lte, false, 1).is_err());
        assert!(Interleaver::with_law(40, InterleaverLaw::Lte, true, 0).is_err());
        let law = InterleaverLaw::Explicit {
            perm: vec![1, 0, 2],
        };
        assert!(Interleaver::with_law(4, law, false, 1).is_err());
        let mut interleaver = Interleaver::with_law(41, InterleaverLaw::Lte, false, 1).unwrap();
        assert!(interleaver.init().is_err());
    }

    #[test]
    fn test_use_before_init() {
        let interleaver = Interleaver::with_law(40, InterleaverLaw::Lte, false, 1).unwrap();
        assert!(!interleaver.is_initialized());
        let mut output = [0u8; 40];
        assert!(matches!(
            interleaver.interleave(&[0u8; 40], &mut output, 0, 1, false),
            Err(Error::LengthError(_))
        ));
        assert!(matches!(interleaver.pi(0), Err(Error::LengthError(_))));
    }

    #[test]
    fn test_inverse_tables() {
        for law in [
            InterleaverLaw::Lte,
            InterleaverLaw::Random { seed: 5 },
            InterleaverLaw::Explicit {
                perm: (0 .. 40).rev().collect(),
            },
        ] {
            for uniform in [false, true] {
                let mut interleaver = Interleaver::with_law(40, law.clone(), uniform, 3).unwrap();
                interleaver.init().unwrap();
                assert_inverse_tables(&interleaver);
            }
        }
    }

    #[test]
    fn test_random() {
        assert!(Interleaver::random(0, 1).is_err());
        let interleaver = Interleaver::random(64, 1).unwrap();
        assert_eq!(interleaver, Interleaver::random(64, 1).unwrap());
        assert_ne!(interleaver, Interleaver::random(64, 2).unwrap());
        assert_inverse_tables(&interleaver);
    }

    #[test]
    fn test_refresh() {
        let mut interleaver = Interleaver::random(64, 9).unwrap();
        let before = interleaver.pi(0).unwrap().to_vec();
        interleaver.refresh().unwrap();
        assert_ne!(interleaver.pi(0).unwrap(), before);
        assert_inverse_tables(&interleaver);
        let mut lte = Interleaver::with_law(40, InterleaverLaw::Lte, false, 1).unwrap();
        lte.init().unwrap();
        let before = lte.pi(0).unwrap().to_vec();
        lte.refresh().unwrap();
        assert_eq!(lte.pi(0).unwrap(), before);
    }

    #[test]
    fn test_uniform_rotation() {
        let perm = vec![0, 3, 2, 5, 4, 7, 6, 1];
        let mut interleaver =
            Interleaver::with_law(8, InterleaverLaw::Explicit { perm }, true, 3).unwrap();
        interleaver.init().unwrap();
        assert_eq!(interleaver.pi(1).unwrap(), [3, 2, 5, 4, 7, 6, 1, 0]);
        assert_eq!(interleaver.pi(2).unwrap(), [2, 5, 4, 7, 6, 1, 0, 3]);
        assert_eq!(interleaver.pi(3).unwrap(), interleaver.pi(0).unwrap());
        // Frame numbering continues across calls
        let input: Vec<usize> = (0 .. 8).collect();
        let mut output = [0; 8];
        interleaver.interleave(&input, &mut output, 4, 1, false).unwrap();
        assert_eq!(output, [3, 2, 5, 4, 7, 6, 1, 0]);
    }

    #[test]
    fn test_interleave() {
        let interleaver = Interleaver::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut output = ['-'; 8];
        // Invalid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];
        assert!(interleaver.interleave(&input, &mut output, 0, 1, false).is_err());
        // Valid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
        for _ in 0 .. 2 {
            interleaver.interleave(&input, &mut output, 0, 1, false).unwrap();
            assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
        }
    }

    #[test]
    fn test_deinterleave() {
        let interleaver = Interleaver::new(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut input = ['-'; 8];
        // Invalid output
        let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g'];
        assert!(interleaver.deinterleave(&output, &mut input, 0, 1, false).is_err());
        // Valid output
        let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
        for _ in 0 .. 2 {
            interleaver.deinterleave(&output, &mut input, 0, 1, false).unwrap();
            assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
        }
    }

    #[test]
    fn test_round_trip_batches() {
        let n_frames = 4;
        for uniform in [false, true] {
            let mut interleaver =
                Interleaver::with_law(40, InterleaverLaw::Random { seed: 3 }, uniform, 3).unwrap();
            interleaver.init().unwrap();
            let input: Vec<i32> = (0 .. 40 * n_frames as i32).collect();
            let mut output = vec![0; input.len()];
            let mut back = vec![0; input.len()];
            for lane_reordered in [false, true] {
                interleaver
                    .interleave(&input, &mut output, 2, n_frames, lane_reordered)
                    .unwrap();
                assert_ne!(output, input);
                interleaver
                    .deinterleave(&output, &mut back, 2, n_frames, lane_reordered)
                    .unwrap();
                assert_eq!(back, input);
            }
        }
    }

    #[test]
    fn test_lane_reordered_matches_frame_layout() {
        let n_frames = 2;
        let mut interleaver = Interleaver::with_law(40, InterleaverLaw::Lte, true, 2).unwrap();
        interleaver.init().unwrap();
        let frames: Vec<u32> = (0 .. 80).collect();
        let mut packed = vec![0; 80];
        for f in 0 .. n_frames {
            for i in 0 .. 40 {
                packed[i * n_frames + f] = frames[f * 40 + i];
            }
        }
        let mut frames_out = vec![0; 80];
        let mut packed_out = vec![0; 80];
        interleaver.interleave(&frames, &mut frames_out, 1, n_frames, false).unwrap();
        interleaver.interleave(&packed, &mut packed_out, 1, n_frames, true).unwrap();
        for f in 0 .. n_frames {
            for i in 0 .. 40 {
                assert_eq!(packed_out[i * n_frames + f], frames_out[f * 40 + i]);
            }
        }
    }
}
