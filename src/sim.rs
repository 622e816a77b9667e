//! Simulator to evaluate performance of turbo codes over a BPSK-AWGN channel
//!
//! Each run transmits a batch of blocks; the blocks of a run are split among the threads of the
//! `rayon` pool, each thread encoding and decoding its share with its own codec. Runs continue
//! until the desired number of block errors is reached (after a minimum number of runs) or the
//! maximum number of runs has been simulated.

use std::{fs::File, io::BufWriter, time::Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{utils, Bit, Encoder, Error, Llr, NumericFormat, TurboConfig};

/// Parameters for turbo code simulation over BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimParams {
    /// Codec to be simulated
    pub config: TurboConfig,
    /// Ratio (dB) of symbol energy to noise power spectral density at BPSK-AWGN channel output
    pub es_over_n0_db: f64,
    /// Desired minimum number of block errors
    pub num_block_errors_min: u32,
    /// Number of blocks to be transmitted per run
    pub num_blocks_per_run: u32,
    /// Minimum number of runs of blocks to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs of blocks to be simulated
    pub num_runs_max: u32,
}

/// Results from turbo code simulation over BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Number of blocks transmitted
    pub num_blocks: u32,
    /// Number of information bits transmitted
    pub num_info_bits: u64,
    /// Number of blocks in error
    pub num_block_errors: u32,
    /// Number of information bits in error
    pub num_info_bit_errors: u64,
    /// Time (seconds) spent decoding
    pub decoding_time_secs: f64,
}

impl SimResults {
    /// Returns empty results for given parameters.
    fn new(params: &SimParams) -> Self {
        Self {
            params: params.clone(),
            num_blocks: 0,
            num_info_bits: 0,
            num_block_errors: 0,
            num_info_bit_errors: 0,
            decoding_time_secs: 0.0,
        }
    }

    /// Returns block error rate.
    #[must_use]
    pub fn block_error_rate(&self) -> f64 {
        if self.num_blocks > 0 {
            f64::from(self.num_block_errors) / f64::from(self.num_blocks)
        } else {
            0.0
        }
    }

    /// Returns information bit error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn info_bit_error_rate(&self) -> f64 {
        if self.num_info_bits > 0 {
            self.num_info_bit_errors as f64 / self.num_info_bits as f64
        } else {
            0.0
        }
    }

    /// Returns `true` if no more runs are needed after `num_runs` runs.
    fn run_complete(&self, num_runs: u32) -> bool {
        num_runs >= self.params.num_runs_max
            || (num_runs >= self.params.num_runs_min
                && self.num_block_errors >= self.params.num_block_errors_min)
    }

    /// Accumulates the outcome of a share of blocks.
    fn update(&mut self, share: &ShareOutcome) {
        self.num_blocks += share.num_blocks;
        self.num_info_bits += share.num_info_bits;
        self.num_block_errors += share.num_block_errors;
        self.num_info_bit_errors += share.num_info_bit_errors;
        self.decoding_time_secs += share.decoding_time_secs;
    }
}

/// Outcome of the blocks simulated by one thread in a run
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ShareOutcome {
    /// Number of blocks
    num_blocks: u32,
    /// Number of information bits
    num_info_bits: u64,
    /// Number of blocks in error
    num_block_errors: u32,
    /// Number of information bits in error
    num_info_bit_errors: u64,
    /// Time (seconds) spent decoding
    decoding_time_secs: f64,
}

/// Runs simulations of turbo codes over a BPSK-AWGN channel and saves results to a JSON file.
///
/// # Parameters
///
/// - `all_params`: Parameters of the simulations.
///
/// - `json_filename`: Name of the JSON file to which all simulation results must be written.
///
/// # Errors
///
/// Returns an error if any parameters are invalid, if a simulation fails, or if the results
/// cannot be written.
pub fn run_bpsk_awgn_sims(
    all_params: &[SimParams],
    json_filename: &str,
) -> Result<Vec<SimResults>, Error> {
    for params in all_params {
        check_sim_params(params)?;
    }
    let mut all_results = Vec::with_capacity(all_params.len());
    for params in all_params {
        let results = run_bpsk_awgn_sim(params)?;
        tracing::info!(
            es_over_n0_db = params.es_over_n0_db,
            num_blocks = results.num_blocks,
            num_block_errors = results.num_block_errors,
            "Es/N0 = {:.2} dB: BER = {:.4e}, BLER = {:.4e}",
            params.es_over_n0_db,
            results.info_bit_error_rate(),
            results.block_error_rate()
        );
        all_results.push(results);
    }
    let writer = BufWriter::new(File::create(json_filename)?);
    serde_json::to_writer_pretty(writer, &all_results)?;
    tracing::info!("Simulation results saved to {json_filename}");
    Ok(all_results)
}

/// Runs simulation of a turbo code over a BPSK-AWGN channel.
///
/// # Errors
///
/// Returns an error if the parameters are invalid or if a block cannot be encoded or decoded.
pub fn run_bpsk_awgn_sim(params: &SimParams) -> Result<SimResults, Error> {
    check_sim_params(params)?;
    let mut results = SimResults::new(params);
    let share_sizes = share_sizes(params.num_blocks_per_run, rayon::current_num_threads());
    let mut num_runs = 0;
    while !results.run_complete(num_runs) {
        let outcomes = share_sizes
            .par_iter()
            .map(|&num_blocks| simulate_share(params, num_blocks))
            .collect::<Result<Vec<_>, Error>>()?;
        for outcome in &outcomes {
            results.update(outcome);
        }
        num_runs += 1;
        tracing::debug!(
            num_runs,
            num_blocks = results.num_blocks,
            num_block_errors = results.num_block_errors,
            "Run done"
        );
    }
    Ok(results)
}

/// Checks validity of simulation parameters.
fn check_sim_params(params: &SimParams) -> Result<(), Error> {
    params.config.validate()?;
    if params.num_blocks_per_run == 0 {
        return Err(Error::InvalidArgument(
            "Number of blocks per run cannot be zero".to_string(),
        ));
    }
    if params.num_runs_min > params.num_runs_max {
        return Err(Error::InvalidArgument(format!(
            "Minimum number of runs ({}) exceeds maximum number of runs ({})",
            params.num_runs_min, params.num_runs_max
        )));
    }
    if params.num_runs_max == 0 {
        return Err(Error::InvalidArgument(
            "Maximum number of runs cannot be zero".to_string(),
        ));
    }
    Ok(())
}

/// Returns nonzero numbers of blocks, as equal as possible, summing to `num_blocks`.
fn share_sizes(num_blocks: u32, num_threads: usize) -> Vec<u32> {
    let num_shares = u32::try_from(num_threads.max(1))
        .unwrap_or(u32::MAX)
        .min(num_blocks);
    (0 .. num_shares)
        .map(|i| num_blocks / num_shares + u32::from(i < num_blocks % num_shares))
        .collect()
}

/// Simulates given number of blocks with a codec of its own.
fn simulate_share(params: &SimParams, num_blocks: u32) -> Result<ShareOutcome, Error> {
    match params.config.numeric_format {
        NumericFormat::F64 => simulate_blocks::<f64>(params, num_blocks),
        NumericFormat::F32 => simulate_blocks::<f32>(params, num_blocks),
        NumericFormat::I16 => simulate_blocks::<i16>(params, num_blocks),
        NumericFormat::I8 => simulate_blocks::<i8>(params, num_blocks),
        NumericFormat::I32 => simulate_blocks::<i32>(params, num_blocks),
        NumericFormat::I64 => simulate_blocks::<i64>(params, num_blocks),
    }
}

/// Simulates given number of blocks with LLR values of type `T`.
fn simulate_blocks<T: Llr>(params: &SimParams, num_blocks: u32) -> Result<ShareOutcome, Error> {
    let config = &params.config;
    let (k, n) = (config.info_len, config.codeword_len()?);
    let n_frames = num_blocks as usize;
    let mut rng = rand::rng();
    let mut encoder = config.build_encoder()?;
    let mut decoder = config.build_decoder::<T>()?;

    let info_bits = utils::random_bits(k * n_frames, &mut rng);
    let mut code_bits = vec![Bit::Zero; n * n_frames];
    encoder.encode(&info_bits, &mut code_bits)?;
    let code_bits_llr = utils::bpsk_awgn_channel(&code_bits, params.es_over_n0_db, &mut rng);
    let fractional_bits = match config.numeric_format {
        NumericFormat::F64 | NumericFormat::F32 => 0,
        NumericFormat::I16 | NumericFormat::I8 | NumericFormat::I32 | NumericFormat::I64 => {
            config.fractional_bits
        }
    };
    let y: Vec<T> = utils::quantize(&code_bits_llr, fractional_bits);

    let timer = Instant::now();
    let mut info_bits_hat = vec![Bit::Zero; k * n_frames];
    decoder.decode_siho(&y, &mut info_bits_hat, n_frames)?;
    let decoding_time_secs = timer.elapsed().as_secs_f64();
    tracing::trace!(durations = ?decoder.durations(), "Share decoded");

    let mut outcome = ShareOutcome {
        num_blocks,
        num_info_bits: (k * n_frames) as u64,
        decoding_time_secs,
        ..ShareOutcome::default()
    };
    for (block_hat, block) in info_bits_hat.chunks_exact(k).zip(info_bits.chunks_exact(k)) {
        let num_errors = utils::error_count(block_hat, block);
        if num_errors > 0 {
            outcome.num_block_errors += 1;
            outcome.num_info_bit_errors += num_errors as u64;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests_of_sim {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::DecodingAlgo;

    /// Returns parameters of a short simulation.
    fn short_sim(es_over_n0_db: f64) -> SimParams {
        SimParams {
            config: TurboConfig {
                decoding_algo: DecodingAlgo::LinearLogMAP(4),
                lanes: 2,
                ..TurboConfig::default()
            },
            es_over_n0_db,
            num_block_errors_min: 10,
            num_blocks_per_run: 20,
            num_runs_min: 1,
            num_runs_max: 3,
        }
    }

    #[test]
    fn test_check_sim_params() {
        // Invalid input
        let mut params = short_sim(-3.0);
        params.num_blocks_per_run = 0;
        assert!(check_sim_params(&params).is_err());
        let mut params = short_sim(-3.0);
        params.num_runs_min = 2;
        params.num_runs_max = 1;
        assert!(check_sim_params(&params).is_err());
        let mut params = short_sim(-3.0);
        params.num_runs_min = 0;
        params.num_runs_max = 0;
        assert!(check_sim_params(&params).is_err());
        let mut params = short_sim(-3.0);
        params.config.info_len = 41;
        assert!(check_sim_params(&params).is_err());
        // Valid input
        assert!(check_sim_params(&short_sim(-3.0)).is_ok());
    }

    #[test]
    fn test_share_sizes() {
        assert_eq!(share_sizes(10, 4), [3, 3, 2, 2]);
        assert_eq!(share_sizes(3, 8), [1, 1, 1]);
        assert_eq!(share_sizes(5, 0), [5]);
    }

    #[test]
    fn test_run_complete() {
        let mut results = SimResults::new(&short_sim(0.0));
        assert!(!results.run_complete(0));
        assert!(!results.run_complete(1));
        assert!(results.run_complete(3));
        results.num_block_errors = 10;
        assert!(!results.run_complete(0));
        assert!(results.run_complete(1));
    }

    #[test]
    fn test_run_bpsk_awgn_sim() {
        // Noiseless enough for no errors, so all runs are simulated
        let results = run_bpsk_awgn_sim(&short_sim(10.0)).unwrap();
        assert_eq!(results.num_blocks, 60);
        assert_eq!(results.num_info_bits, 2400);
        assert_eq!(results.num_block_errors, 0);
        assert_float_eq!(results.info_bit_error_rate(), 0.0, abs <= 0.0);
        // Noisy enough for errors in the first run
        let mut params = short_sim(-12.0);
        params.config.numeric_format = NumericFormat::I16;
        let results = run_bpsk_awgn_sim(&params).unwrap();
        assert_eq!(results.num_blocks, 20);
        assert!(results.num_block_errors >= 10);
        assert!(results.block_error_rate() > 0.4);
        assert!(results.info_bit_error_rate() > 0.0);
    }

    #[test]
    fn test_run_bpsk_awgn_sims() {
        let path = std::env::temp_dir().join("turbo_siso_test_sims.json");
        let json_filename = path.to_str().unwrap();
        let all_params = [short_sim(10.0), short_sim(-12.0)];
        let all_results = run_bpsk_awgn_sims(&all_params, json_filename).unwrap();
        assert_eq!(all_results.len(), 2);
        let reader = std::io::BufReader::new(File::open(&path).unwrap());
        let saved: Vec<SimResults> = serde_json::from_reader(reader).unwrap();
        assert_eq!(saved.len(), all_results.len());
        for (saved, results) in saved.iter().zip(&all_results) {
            assert_eq!(saved.params, results.params);
            assert_eq!(saved.num_blocks, results.num_blocks);
            assert_eq!(saved.num_info_bits, results.num_info_bits);
            assert_eq!(saved.num_block_errors, results.num_block_errors);
            assert_eq!(saved.num_info_bit_errors, results.num_info_bit_errors);
            assert_float_eq!(
                saved.decoding_time_secs,
                results.decoding_time_secs,
                rmax <= 1e-12
            );
        }
        std::fs::remove_file(&path).unwrap();
        let mut bad = short_sim(0.0);
        bad.num_blocks_per_run = 0;
        assert!(run_bpsk_awgn_sims(&[short_sim(0.0), bad], json_filename).is_err());
        assert!(!path.exists());
    }
}
