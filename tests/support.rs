//! Test-only channel impairment and resampling fixtures, grounded on
//! `chimera-core/src/channel.rs`'s `apply_audio_noise`/`apply_symbol_noise`
//! (determinism via a seeded RNG). Kept test-only per `DESIGN.md`'s
//! dependency note: the modem core itself never synthesizes channel
//! impairments.

#![allow(dead_code)]

use num_complex::Complex64;
use ofdm_modem::collaborators::Crc16;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::TAU;

/// Append a CCITT CRC16 trailer (spec §6) over `data_bits`, producing a
/// payload whose last 16 bits are the checksum of everything before them —
/// the convention `OfdmModem::demodulate`'s burst-mode `crc_pass` checks.
pub fn payload_with_crc16_trailer(data_bits: Vec<u8>) -> Vec<u8> {
    let crc = Crc16::new().compute_bits(&data_bits);
    let mut payload = data_bits;
    for i in (0..16).rev() {
        payload.push(((crc >> i) & 1) as u8);
    }
    payload
}

/// Multiply every sample by a constant-frequency carrier: `x[n] *= e^{-j*2*pi*f*n/fs}`.
pub fn freq_shift(samples: &[Complex64], foff_hz: f64, fs: f64) -> Vec<Complex64> {
    samples
        .iter()
        .enumerate()
        .map(|(n, &s)| s * Complex64::from_polar(1.0, -TAU * foff_hz * n as f64 / fs))
        .collect()
}

/// Additive complex Gaussian noise at the given per-sample standard
/// deviation (split evenly across both quadratures), seeded for
/// determinism.
pub fn add_awgn(samples: &[Complex64], sigma: f64, seed: u64) -> Vec<Complex64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    samples
        .iter()
        .map(|&s| {
            let n_re: f64 = rng.sample(rand_distr::StandardNormal);
            let n_im: f64 = rng.sample(rand_distr::StandardNormal);
            s + Complex64::new(n_re * sigma, n_im * sigma)
        })
        .collect()
}

/// Linear-interpolation resampler at a fixed small ratio (clock drift
/// scenario 5): `out[n] = lerp(in, n * ratio)`. Not a general-purpose
/// resampler — just enough to model a sample-clock offset of a few hundred
/// ppm without pulling in a whole resampling crate (see `DESIGN.md`).
pub fn resample_ratio(samples: &[Complex64], ratio: f64) -> Vec<Complex64> {
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for n in 0..out_len {
        let src_pos = n as f64 * ratio;
        let i0 = src_pos.floor() as usize;
        let frac = src_pos - i0 as f64;
        if i0 + 1 < samples.len() {
            out.push(samples[i0] * (1.0 - frac) + samples[i0 + 1] * frac);
        } else if i0 < samples.len() {
            out.push(samples[i0]);
        }
    }
    out
}

/// A zero-padded silence buffer, used to give acquisition searches room to
/// slide without running off the end of the injected signal.
pub fn silence(n: usize) -> Vec<Complex64> {
    vec![Complex64::new(0.0, 0.0); n]
}
