//! Trellis of a rate-1/2 recursive systematic convolutional code

use crate::{Bit, Error};

/// Number of rows of the trellis interchange table
pub const TABLE_ROWS: usize = 10;

/// Interchange table of the 8-state trellis with generator polynomials `{013, 015}`
///
/// Rows `0..3` and `3..6` hold, for each state, one predecessor state, the sign with which the
/// branch metric enters (`+1` for systematic bit `Zero`, `-1` for `One`), and the index of the
/// branch metric (XOR of systematic and parity bits). Rows `6, 7` hold the next state and branch
/// metric index for systematic bit `Zero`, and rows `8, 9` the same for `One`.
pub const REFERENCE_TABLE: [[i32; 8]; TABLE_ROWS] = [
    [0, 2, 4, 6, 0, 2, 4, 6],
    [1, -1, 1, -1, -1, 1, -1, 1],
    [0, 1, 1, 0, 0, 1, 1, 0],
    [1, 3, 5, 7, 1, 3, 5, 7],
    [-1, 1, -1, 1, 1, -1, 1, -1],
    [0, 1, 1, 0, 0, 1, 1, 0],
    [0, 4, 5, 1, 2, 6, 7, 3],
    [0, 0, 1, 1, 1, 1, 0, 0],
    [4, 0, 1, 5, 6, 2, 3, 7],
    [0, 0, 1, 1, 1, 1, 0, 0],
];

/// Generator polynomials of the constituent code of the LTE turbo code
pub const LTE_POLYNOMIALS: [usize; 2] = [0o13, 0o15];

/// Largest supported number of memory elements
pub const MAX_MEMORY_LEN: usize = 12;

/// State machine of a rate-1/2 recursive systematic convolutional encoder
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Trellis {
    /// Feedback and feedforward polynomials
    polynomials: [usize; 2],
    /// Number of memory elements
    memory_len: usize,
    /// Number of states
    num_states: usize,
    /// Next state for each (state, systematic bit), at index `2 * state + bit`
    next_state: Vec<usize>,
    /// Parity bit for each (state, systematic bit), at index `2 * state + bit`
    parity: Vec<Bit>,
    /// Systematic bit driving each state towards the zero state
    tail_sys: Vec<Bit>,
}

impl Trellis {
    /// Returns trellis for given generator polynomials.
    ///
    /// # Parameters
    ///
    /// - `polynomials`: Integer representations of the feedback polynomial followed by the
    ///   feedforward polynomial (any further polynomials are ignored). Bit `i` of a polynomial
    ///   applies to bit `i` of the state, and the memory length is `floor(log2(feedback))`.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two polynomials are given, if the feedback polynomial is
    /// smaller than `2`, if the two polynomials are of different degrees, or if their degree
    /// exceeds [`MAX_MEMORY_LEN`].
    ///
    /// # Examples
    ///
    /// ```
    /// use turbo_siso::{Bit, Trellis};
    ///
    /// let trellis = Trellis::new(&[0o13, 0o15])?;
    /// assert_eq!(trellis.num_states(), 8);
    /// let mut state = 0;
    /// assert_eq!(trellis.inner_encode(Bit::One, &mut state), Bit::One);
    /// assert_eq!(state, 4);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(polynomials: &[usize]) -> Result<Self, Error> {
        if polynomials.len() < 2 {
            return Err(Error::LengthError(format!(
                "Expected at least two code polynomials (found {})",
                polynomials.len()
            )));
        }
        let (feedback, feedforward) = (polynomials[0], polynomials[1]);
        if feedback < 2 {
            return Err(Error::InvalidArgument(format!(
                "Feedback polynomial {feedback:#o} must have a positive degree"
            )));
        }
        if feedforward == 0 || degree(feedback) != degree(feedforward) {
            return Err(Error::InvalidArgument(format!(
                "Feedback polynomial {feedback:#o} and feedforward polynomial {feedforward:#o} \
                must be of the same degree"
            )));
        }
        let memory_len = degree(feedback);
        if memory_len > MAX_MEMORY_LEN {
            return Err(Error::InvalidArgument(format!(
                "Polynomial degree {memory_len} exceeds the maximum of {MAX_MEMORY_LEN}"
            )));
        }
        let num_states = 1 << memory_len;
        let mut next_state = Vec::with_capacity(2 * num_states);
        let mut parity = Vec::with_capacity(2 * num_states);
        let mut tail_sys = Vec::with_capacity(num_states);
        for state in 0 .. num_states {
            let low_mask = num_states - 1;
            let feedback_sum = (state & feedback & low_mask).count_ones() as usize;
            let parity_sum = (state & feedforward & low_mask).count_ones() as usize;
            for sys in 0 .. 2 {
                let register_in = (sys ^ feedback_sum) & 1;
                parity.push(Bit::from_lsb(register_in ^ parity_sum));
                next_state.push((state >> 1) | (register_in << (memory_len - 1)));
            }
            tail_sys.push(Bit::from_lsb(feedback_sum));
        }
        tracing::debug!(
            "Built trellis for polynomials {feedback:#o}/{feedforward:#o} ({num_states} states)"
        );
        Ok(Self {
            polynomials: [feedback, feedforward],
            memory_len,
            num_states,
            next_state,
            parity,
            tail_sys,
        })
    }

    /// Returns trellis of the constituent code of the LTE turbo code.
    #[must_use]
    pub fn lte() -> Self {
        // OK to unwrap: The LTE polynomials are valid.
        Self::new(&LTE_POLYNOMIALS).unwrap()
    }

    /// Returns feedback and feedforward polynomials.
    #[must_use]
    pub fn polynomials(&self) -> [usize; 2] {
        self.polynomials
    }

    /// Returns number of memory elements.
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.memory_len
    }

    /// Returns number of states.
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Returns number of tail bits (systematic and parity) needed to terminate the trellis.
    #[must_use]
    pub fn tail_length(&self) -> usize {
        2 * self.memory_len
    }

    /// Returns next state for given state and systematic bit.
    #[must_use]
    pub fn next_state(&self, state: usize, sys: Bit) -> usize {
        self.next_state[2 * state + sys.as_usize()]
    }

    /// Returns parity bit for given state and systematic bit.
    #[must_use]
    pub fn parity(&self, state: usize, sys: Bit) -> Bit {
        self.parity[2 * state + sys.as_usize()]
    }

    /// Returns parity bit for given systematic bit, and moves `state` to the next state.
    pub fn inner_encode(&self, sys: Bit, state: &mut usize) -> Bit {
        let index = 2 * *state + sys.as_usize();
        *state = self.next_state[index];
        self.parity[index]
    }

    /// Returns systematic bit that moves given state towards the zero state.
    #[must_use]
    pub fn tail_bit_sys(&self, state: usize) -> Bit {
        self.tail_sys[state]
    }

    /// Returns the 10-row interchange table describing the trellis (see [`REFERENCE_TABLE`]).
    #[must_use]
    pub fn to_table(&self) -> Vec<Vec<i32>> {
        let mut table = vec![vec![0; self.num_states]; TABLE_ROWS];
        let mut seen = vec![false; self.num_states];
        for state in 0 .. self.num_states {
            for sys in [Bit::Zero, Bit::One] {
                let next = self.next_state(state, sys);
                let gamma_index = i32::from((sys ^ self.parity(state, sys)) == Bit::One);
                let offset = if seen[next] { 3 } else { 0 };
                // OK to unwrap: State count is at most a few thousand.
                table[offset][next] = i32::try_from(state).unwrap();
                table[offset + 1][next] = if sys == Bit::Zero { 1 } else { -1 };
                table[offset + 2][next] = gamma_index;
                let row = if sys == Bit::Zero { 6 } else { 8 };
                table[row][state] = i32::try_from(next).unwrap();
                table[row + 1][state] = gamma_index;
                seen[next] = true;
            }
        }
        table
    }

    /// Returns `true` if the trellis matches [`REFERENCE_TABLE`].
    #[must_use]
    pub fn is_reference(&self) -> bool {
        table_matches_reference(&self.to_table())
    }
}

/// Returns `true` if given interchange table equals [`REFERENCE_TABLE`].
#[must_use]
pub fn table_matches_reference(table: &[Vec<i32>]) -> bool {
    table.len() == TABLE_ROWS
        && table
            .iter()
            .zip(REFERENCE_TABLE.iter())
            .all(|(row, reference)| row.as_slice() == reference.as_slice())
}

/// Returns the degree of a nonzero polynomial.
fn degree(poly: usize) -> usize {
    // OK to cast `u32` to `usize`: Numbers involved will always be small enough.
    (usize::BITS - 1 - poly.leading_zeros()) as usize
}
