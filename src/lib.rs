//! This crate implements soft-decision decoding of convolutional and turbo codes. The core is a
//! soft-input/soft-output (SISO) BCJR decoder of the 8-state recursive systematic convolutional
//! (RSC) code of LTE, used on its own or as a constituent of an iterative turbo decoder that
//! exchanges extrinsic information between two such decoders through an interleaver.
//!
//! Decoders work on log-likelihood-ratio (LLR) values represented as `f64`, `f32`, `i64`, `i32`,
//! `i16` or `i8` (see [`Llr`]), with positive values favoring bit `Zero`. Several frames (*lanes*,
//! a power of two) can be decoded together: they are packed lane-major by a [`Reorderer`] so that
//! every stage processes all lanes with the same index arithmetic.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use turbo_siso::{
//!     utils, BcjrDecoder, Bit, Encoder, FrameLayout, Interleaver, InterleaverLaw, MaxStar,
//!     RscEncoder, Schedule, SihoDecoder, Trellis, TurboDecoder, TurboEncoder,
//! };
//!
//! let (info_len, codeword_len) = (40, 132);
//! let (trellis, layout) = (Trellis::lte(), FrameLayout::Buffered);
//! let mut interleaver = Interleaver::with_law(info_len, InterleaverLaw::Lte, false, 1)?;
//! interleaver.init()?;
//! let interleaver = Arc::new(interleaver);
//!
//! let rsc = || RscEncoder::new(info_len, 2 * info_len + 6, trellis.clone(), layout);
//! let mut encoder =
//!     TurboEncoder::new(info_len, codeword_len, rsc()?, rsc()?, interleaver.clone(), layout)?;
//! let schedule = Schedule::Standard;
//! let bcjr = || BcjrDecoder::<f64, MaxStar>::new(info_len, &trellis, 1, schedule, layout);
//! let mut decoder =
//!     TurboDecoder::new(info_len, codeword_len, 8, interleaver, bcjr()?, bcjr()?, layout)?;
//!
//! let mut rng = rand::rng();
//! let info_bits = utils::random_bits(info_len, &mut rng);
//! let mut code_bits = vec![Bit::Zero; codeword_len];
//! encoder.encode_frame(&info_bits, &mut code_bits)?;
//! let code_bits_llr = utils::bpsk_awgn_channel(&code_bits, 10.0, &mut rng);
//! let mut info_bits_hat = vec![Bit::Zero; info_len];
//! decoder.decode_siho(&code_bits_llr, &mut info_bits_hat, 1)?;
//! assert_eq!(info_bits_hat, info_bits);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

mod bcjr;
mod common;
mod config;
mod decoder;
mod encoder;
mod interleaver;
pub mod logging;
pub mod lte;
mod numeric;
mod observers;
mod reorderer;
mod rsc;
pub mod sim;
pub mod trellis;
mod turbo;
pub mod utils;

pub use bcjr::{BcjrDecoder, Schedule};
pub use common::{Bit, Error, FrameLayout};
pub use config::{InterleaverConfig, TurboConfig};
pub use decoder::{Decoder, Durations, NoDecoder, SihoDecoder, SisoDecoder};
pub use encoder::{
    AzcwEncoder, CosetEncoder, Encoder, EncoderConfig, NoEncoder, SystematicEncoder, UserEncoder,
};
pub use interleaver::{Interleaver, InterleaverLaw};
pub use numeric::{DecodingAlgo, Llr, Max, MaxLinear, MaxOp, MaxStar, NumericFormat};
pub use observers::{ExtrinsicScaling, StableDecisionStop, TraceObserver, TurboObserver};
pub use reorderer::{Reorderer, DEFAULT_CHUNK_LEN};
pub use rsc::RscEncoder;
pub use trellis::Trellis;
pub use turbo::{TurboDecoder, TurboEncoder};
