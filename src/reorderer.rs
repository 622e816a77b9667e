//! Lane reorderer for batches of frames
//!
//! A batch of `P` frames of equal length is packed lane-major: element `i` of frame `f` lands at
//! index `i * P + f`, so that every position of all frames is contiguous and the frames can
//! advance through the decoders in lockstep. `P` must be a power of two: whole chunks of each
//! frame are transposed by `log2(P)` passes of pairwise interleaving, and the elements beyond the
//! last full chunk are handled one by one.

use crate::{common::check_len, Error};

/// Default number of elements of a frame transposed together in one chunk
pub const DEFAULT_CHUNK_LEN: usize = 16;

/// Lane reorderer for a fixed number of frames
#[derive(Debug)]
pub struct Reorderer<T> {
    /// Number of frames packed together
    lanes: usize,
    /// Number of elements of each frame per chunk
    chunk_len: usize,
    /// Chunk arena holding the registers of the current pass
    cur: Vec<T>,
    /// Chunk arena receiving the registers of the next pass
    next: Vec<T>,
}

impl<T: Copy + Default> Reorderer<T> {
    /// Returns reorderer for given number of frames.
    ///
    /// # Parameters
    ///
    /// - `lanes`: Number of frames packed together (a power of two).
    ///
    /// - `chunk_len`: Number of elements of each frame transposed per chunk. Must be even for
    ///   the pairwise passes to apply.
    ///
    /// # Errors
    ///
    /// Returns an error if `lanes` is not a power of two or if `chunk_len` is `0` or odd.
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::Reorderer;
    ///
    /// let mut reorderer = Reorderer::new(2, 4)?;
    /// let frames = [1, 2, 3, 10, 20, 30];
    /// let mut packed = [0; 6];
    /// reorderer.pack(&frames, &mut packed)?;
    /// assert_eq!(packed, [1, 10, 2, 20, 3, 30]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(lanes: usize, chunk_len: usize) -> Result<Self, Error> {
        if !lanes.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "Number of lanes must be a power of two (found {lanes})"
            )));
        }
        if chunk_len == 0 || chunk_len % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "Chunk length must be a positive even integer (found {chunk_len})"
            )));
        }
        let arena_len = if uses_pairwise_passes(lanes) {
            lanes * chunk_len
        } else {
            0
        };
        Ok(Self {
            lanes,
            chunk_len,
            cur: vec![T::default(); arena_len],
            next: vec![T::default(); arena_len],
        })
    }

    /// Returns number of frames packed together.
    #[must_use]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Packs frames into lane-major order.
    ///
    /// # Parameters
    ///
    /// - `frames`: `lanes` frames of equal length, stored one after the other.
    ///
    /// - `packed`: Buffer for the lane-major output, of the same length as `frames`.
    ///
    /// # Errors
    ///
    /// Returns an error if the length of `frames` is not a multiple of `lanes`, or if the
    /// lengths of `frames` and `packed` differ.
    pub fn pack(&mut self, frames: &[T], packed: &mut [T]) -> Result<(), Error> {
        let frame_len = self.frame_len(frames.len())?;
        check_len("packed buffer", packed.len(), frames.len())?;
        let num_full = if uses_pairwise_passes(self.lanes) {
            frame_len / self.chunk_len
        } else {
            0
        };
        let (lanes, chunk_len) = (self.lanes, self.chunk_len);
        for c in 0 .. num_full {
            for f in 0 .. lanes {
                let src = &frames[f * frame_len + c * chunk_len ..][.. chunk_len];
                self.cur[f * chunk_len .. (f + 1) * chunk_len].copy_from_slice(src);
            }
            for _ in 0 .. lanes.trailing_zeros() {
                zip_pass(&self.cur, &mut self.next, lanes, chunk_len);
                std::mem::swap(&mut self.cur, &mut self.next);
            }
            packed[c * chunk_len * lanes .. (c + 1) * chunk_len * lanes].copy_from_slice(&self.cur);
        }
        for i in num_full * chunk_len .. frame_len {
            for f in 0 .. lanes {
                packed[i * lanes + f] = frames[f * frame_len + i];
            }
        }
        Ok(())
    }

    /// Unpacks lane-major values back into frames (inverse of [`Reorderer::pack`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the length of `packed` is not a multiple of `lanes`, or if the
    /// lengths of `packed` and `frames` differ.
    pub fn unpack(&mut self, packed: &[T], frames: &mut [T]) -> Result<(), Error> {
        let frame_len = self.frame_len(packed.len())?;
        check_len("frame buffer", frames.len(), packed.len())?;
        let num_full = if uses_pairwise_passes(self.lanes) {
            frame_len / self.chunk_len
        } else {
            0
        };
        let (lanes, chunk_len) = (self.lanes, self.chunk_len);
        for c in 0 .. num_full {
            self.cur
                .copy_from_slice(&packed[c * chunk_len * lanes .. (c + 1) * chunk_len * lanes]);
            for _ in 0 .. lanes.trailing_zeros() {
                unzip_pass(&self.cur, &mut self.next, lanes, chunk_len);
                std::mem::swap(&mut self.cur, &mut self.next);
            }
            for f in 0 .. lanes {
                frames[f * frame_len + c * chunk_len ..][.. chunk_len]
                    .copy_from_slice(&self.cur[f * chunk_len .. (f + 1) * chunk_len]);
            }
        }
        for i in num_full * chunk_len .. frame_len {
            for f in 0 .. lanes {
                frames[f * frame_len + i] = packed[i * lanes + f];
            }
        }
        Ok(())
    }

    /// Returns frame length for given total length.
    fn frame_len(&self, total_len: usize) -> Result<usize, Error> {
        if total_len % self.lanes == 0 {
            Ok(total_len / self.lanes)
        } else {
            Err(Error::LengthError(format!(
                "Buffer length {total_len} is not a multiple of the number of lanes {}",
                self.lanes
            )))
        }
    }
}

/// Returns `true` if whole chunks are transposed by pairwise passes.
fn uses_pairwise_passes(lanes: usize) -> bool {
    lanes >= 2
}

/// Interleaves register `j` with register `j + lanes/2`, writing the low halves to register
/// `2j` and the high halves to register `2j + 1`.
fn zip_pass<T: Copy>(cur: &[T], next: &mut [T], lanes: usize, chunk_len: usize) {
    let half = chunk_len / 2;
    for j in 0 .. lanes / 2 {
        let a = &cur[j * chunk_len .. (j + 1) * chunk_len];
        let b = &cur[(j + lanes / 2) * chunk_len .. (j + lanes / 2 + 1) * chunk_len];
        let (lo, hi) = next[2 * j * chunk_len .. (2 * j + 2) * chunk_len].split_at_mut(chunk_len);
        for m in 0 .. half {
            lo[2 * m] = a[m];
            lo[2 * m + 1] = b[m];
            hi[2 * m] = a[half + m];
            hi[2 * m + 1] = b[half + m];
        }
    }
}

/// Inverse of [`zip_pass`].
fn unzip_pass<T: Copy>(cur: &[T], next: &mut [T], lanes: usize, chunk_len: usize) {
    let half = chunk_len / 2;
    let (first, second) = next.split_at_mut(lanes / 2 * chunk_len);
    for j in 0 .. lanes / 2 {
        let lo = &cur[2 * j * chunk_len .. (2 * j + 1) * chunk_len];
        let hi = &cur[(2 * j + 1) * chunk_len .. (2 * j + 2) * chunk_len];
        let a = &mut first[j * chunk_len .. (j + 1) * chunk_len];
        let b = &mut second[j * chunk_len .. (j + 1) * chunk_len];
        for m in 0 .. half {
            a[m] = lo[2 * m];
            b[m] = lo[2 * m + 1];
            a[half + m] = hi[2 * m];
            b[half + m] = hi[2 * m + 1];
        }
    }
}

#[cfg(test)]
mod tests_of_reorderer {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    /// Returns lane-major packing computed element by element.
    fn naive_pack(frames: &[u32], lanes: usize) -> Vec<u32> {
        let frame_len = frames.len() / lanes;
        let mut packed = vec![0; frames.len()];
        for f in 0 .. lanes {
            for i in 0 .. frame_len {
                packed[i * lanes + f] = frames[f * frame_len + i];
            }
        }
        packed
    }

    #[test]
    fn test_new() {
        assert!(Reorderer::<u8>::new(0, 16).is_err());
        assert!(matches!(
            Reorderer::<u8>::new(3, 8),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Reorderer::<u8>::new(12, 8).is_err());
        assert!(Reorderer::<u8>::new(4, 0).is_err());
        assert!(Reorderer::<u8>::new(4, 5).is_err());
        let reorderer = Reorderer::<u8>::new(4, 8).unwrap();
        assert_eq!(reorderer.lanes(), 4);
        assert_eq!(reorderer.cur.len(), 32);
        assert!(Reorderer::<u8>::new(1, 8).unwrap().cur.is_empty());
    }

    #[test]
    fn test_pack_matches_definition() {
        let mut rng = StdRng::seed_from_u64(7);
        for lanes in [1, 2, 4, 8, 16, 32] {
            for frame_len in [0, 1, 7, 16, 37, 64] {
                let frames: Vec<u32> = (0 .. lanes * frame_len).map(|_| rng.random()).collect();
                let mut reorderer = Reorderer::new(lanes, 8).unwrap();
                let mut packed = vec![0; frames.len()];
                reorderer.pack(&frames, &mut packed).unwrap();
                assert_eq!(packed, naive_pack(&frames, lanes));
            }
        }
    }

    #[test]
    fn test_unpack_inverts_pack() {
        let mut rng = StdRng::seed_from_u64(11);
        for lanes in [2, 4, 8, 16] {
            for chunk_len in [2, 4, 16] {
                let frame_len = 3 * chunk_len + 5;
                let frames: Vec<i16> = (0 .. lanes * frame_len).map(|_| rng.random()).collect();
                let mut reorderer = Reorderer::new(lanes, chunk_len).unwrap();
                let mut packed = vec![0; frames.len()];
                let mut unpacked = vec![0; frames.len()];
                reorderer.pack(&frames, &mut packed).unwrap();
                reorderer.unpack(&packed, &mut unpacked).unwrap();
                assert_eq!(unpacked, frames);
            }
        }
    }

    #[test]
    fn test_size_mismatch() {
        let mut reorderer = Reorderer::new(4, 2).unwrap();
        let mut out = [0u8; 8];
        assert!(reorderer.pack(&[0u8; 7], &mut out[.. 7]).is_err());
        assert!(reorderer.pack(&[0u8; 8], &mut out[.. 4]).is_err());
        assert!(reorderer.unpack(&[0u8; 6], &mut out).is_err());
    }
}
