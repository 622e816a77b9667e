//! Observers of the turbo decoding iterations
//!
//! An observer is called after each constituent decoding with the systematic input of that
//! decoder and the extrinsic values it produced, all packed lane-major. It may modify the
//! extrinsic values and may ask for the iterations to stop.

use crate::{Error, Llr};

/// Callbacks run by the turbo decoder
pub trait TurboObserver<T: Llr>: Send {
    /// Called after the decoder of the natural-order code, and returns `true` to stop decoding.
    ///
    /// `sys` is the systematic input (channel plus a priori values) of the information bits, and
    /// `ext` the extrinsic values produced; both are in natural order.
    fn after_natural(&mut self, _iteration: usize, _sys: &[T], _ext: &mut [T]) -> bool {
        false
    }

    /// Called after the decoder of the interleaved code, and returns `true` to stop decoding.
    ///
    /// Both `sys` and `ext` are in interleaved order.
    fn after_interleaved(&mut self, _iteration: usize, _sys: &[T], _ext: &mut [T]) -> bool {
        false
    }

    /// Called once per wave with the number of iterations performed.
    fn on_end(&mut self, _iterations: usize) {}
}

/// Multiplies every extrinsic value by a constant factor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtrinsicScaling {
    /// Scaling factor
    factor: f64,
}

impl ExtrinsicScaling {
    /// Returns observer scaling extrinsic values by `factor`.
    ///
    /// # Errors
    ///
    /// Returns an error if `factor` is not in `(0, 1]`.
    pub fn new(factor: f64) -> Result<Self, Error> {
        if factor > 0.0 && factor <= 1.0 {
            Ok(Self { factor })
        } else {
            Err(Error::InvalidArgument(format!(
                "Extrinsic scaling factor must be in (0, 1] (found {factor})"
            )))
        }
    }

    /// Scales values in place.
    fn scale<T: Llr>(&self, ext: &mut [T]) {
        for value in ext {
            *value = T::from_f64(value.to_f64() * self.factor);
        }
    }
}

impl<T: Llr> TurboObserver<T> for ExtrinsicScaling {
    fn after_natural(&mut self, _iteration: usize, _sys: &[T], ext: &mut [T]) -> bool {
        self.scale(ext);
        false
    }

    fn after_interleaved(&mut self, _iteration: usize, _sys: &[T], ext: &mut [T]) -> bool {
        self.scale(ext);
        false
    }
}

/// Stops decoding once the natural-order hard decisions have not changed for a number of
/// consecutive iterations
#[derive(Clone, Debug, PartialEq)]
pub struct StableDecisionStop {
    /// Number of consecutive iterations with unchanged decisions needed to stop
    patience: usize,
    /// Decisions (`true` for bit `One`) of the previous iteration
    previous: Vec<bool>,
    /// Number of consecutive iterations with unchanged decisions so far
    num_stable: usize,
}

impl StableDecisionStop {
    /// Returns observer with given patience.
    ///
    /// # Errors
    ///
    /// Returns an error if `patience` is `0`.
    pub fn new(patience: usize) -> Result<Self, Error> {
        if patience == 0 {
            return Err(Error::InvalidArgument(
                "Early stop patience must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            patience,
            previous: Vec::new(),
            num_stable: 0,
        })
    }
}

impl<T: Llr> TurboObserver<T> for StableDecisionStop {
    fn after_natural(&mut self, _iteration: usize, sys: &[T], ext: &mut [T]) -> bool {
        let decisions = sys.iter().zip(ext.iter()).map(|(s, e)| s.plus(*e).is_negative());
        if self.previous.len() == ext.len() && decisions.clone().eq(self.previous.iter().copied())
        {
            self.num_stable += 1;
        } else {
            self.previous.clear();
            self.previous.extend(decisions);
            self.num_stable = 0;
        }
        self.num_stable >= self.patience
    }

    fn on_end(&mut self, _iterations: usize) {
        self.previous.clear();
        self.num_stable = 0;
    }
}

/// Emits a `tracing` event per constituent decoding with the mean magnitude of the extrinsic
/// values
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TraceObserver;

/// Returns mean magnitude of given values.
#[allow(clippy::cast_precision_loss)]
fn mean_magnitude<T: Llr>(values: &[T]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.to_f64().abs()).sum::<f64>() / values.len() as f64
}

impl<T: Llr> TurboObserver<T> for TraceObserver {
    fn after_natural(&mut self, iteration: usize, _sys: &[T], ext: &mut [T]) -> bool {
        tracing::trace!(
            iteration,
            mean_ext = mean_magnitude(ext),
            "Natural-order decoding done"
        );
        false
    }

    fn after_interleaved(&mut self, iteration: usize, _sys: &[T], ext: &mut [T]) -> bool {
        tracing::trace!(
            iteration,
            mean_ext = mean_magnitude(ext),
            "Interleaved-order decoding done"
        );
        false
    }

    fn on_end(&mut self, iterations: usize) {
        tracing::trace!(iterations, "Turbo decoding done");
    }
}
