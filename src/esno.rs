//! Es/No and SNR estimation (spec §4.7).
//!
//! Grounded on `ofdm.c`'s `ofdm_esno`/`ofdm_snr` pilot-free noise estimate:
//! bucket each payload symbol's smaller-magnitude quadrature component as a
//! zero-mean noise sample whenever the symbol's magnitude exceeds the RMS,
//! then scale by two to recover the full (both-quadrature) noise variance.

use num_complex::Complex64;

const NOISE_VAR_EPSILON: f64 = 1e-12;

/// One packet's raw estimate, prior to the voice-mode smoother.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EsNoEstimate {
    pub esno_db: f64,
    pub snr_db_3khz: f64,
}

/// Estimate Es/No and 3 kHz-referenced SNR from a packet's payload symbols.
pub fn estimate(payload_syms: &[Complex64], nc: usize, rs: f64, ncp: usize, m: usize) -> EsNoEstimate {
    let n = payload_syms.len().max(1) as f64;
    let sig_var: f64 = payload_syms.iter().map(|s| s.norm_sqr()).sum::<f64>() / n;
    let rms = sig_var.sqrt();

    let mut noise_samples = Vec::new();
    for s in payload_syms {
        if s.norm() > rms {
            let sample = if s.re.abs() < s.im.abs() { s.re } else { s.im };
            noise_samples.push(sample);
        }
    }

    let noise_var = if noise_samples.is_empty() {
        0.0
    } else {
        let mean = noise_samples.iter().sum::<f64>() / noise_samples.len() as f64;
        let var = noise_samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / noise_samples.len() as f64;
        2.0 * var
    };

    let esno_db = 10.0 * ((sig_var + NOISE_VAR_EPSILON) / (noise_var + NOISE_VAR_EPSILON)).log10();
    let snr_db_3khz =
        esno_db + 10.0 * ((nc as f64 * rs) / 3000.0).log10() + 10.0 * ((ncp + m) as f64 / m as f64).log10();

    EsNoEstimate { esno_db, snr_db_3khz }
}

/// Fast-attack/slow-decay SNR smoother used for voice modes
/// (`snr <- max(snr_new, 0.9*snr + 0.1*snr_new)`); data modes report the raw
/// per-packet estimate directly and never construct one of these.
#[derive(Debug, Clone, Copy)]
pub struct SnrSmoother {
    value: Option<f64>,
}

impl SnrSmoother {
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Feed one packet's raw SNR estimate, returning the smoothed value.
    /// The first call has no prior state and is seeded directly with the
    /// raw estimate (resolved open question, spec §9) rather than blended
    /// against zero.
    pub fn update(&mut self, snr_new: f64) -> f64 {
        let smoothed = match self.value {
            None => snr_new,
            Some(prev) => snr_new.max(0.9 * prev + 0.1 * snr_new),
        };
        self.value = Some(smoothed);
        smoothed
    }
}

impl Default for SnrSmoother {
    fn default() -> Self {
        Self::new()
    }
}
