//! Packet assembly/disassembly, UW extraction, the Octave-compatible LCG,
//! and preamble/postamble payload generation (spec §4.6).
//!
//! Grounded on `ofdm.c`'s UW-index construction loop (consumed from
//! `ModeConfig`), `ofdm_assemble_qpsk_modem_packet`,
//! `ofdm_disassemble_qpsk_modem_packet`, `ofdm_extract_uw`, and
//! `ofdm_rand`/`ofdm_rand_seed`. Symbol mapping for the assembled frame
//! (including UW and text regions) happens uniformly at the mode's own
//! `bps` via [`crate::modulator::map_data_symbols`] / [`crate::symbols::demap_symbol`]
//! in `modem.rs`, not as a separate fixed-QPSK pass.

use num_complex::Complex64;

use crate::config::ModeConfig;
use crate::symbols::{demap_symbol, qpsk_mod};

/// Octave-compatible LCG: `seed_{n+1} = (1103515245*seed_n + 12345) mod
/// 32768`. Returns the raw sequence of `n` successive seed values.
pub fn ofdm_rand_seed(seed: u64, n: usize) -> Vec<u16> {
    let mut s = seed;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        s = (1_103_515_245u64.wrapping_mul(s).wrapping_add(12_345)) % 32_768;
        out.push(s as u16);
    }
    out
}

/// `ofdm_rand` with the reference's fixed default seed of 1.
pub fn ofdm_rand(n: usize) -> Vec<u16> {
    ofdm_rand_seed(1, n)
}

/// Map an `ofdm_rand`-style raw sequence to bits: `bit_i = seed_i > 16384`.
pub fn rand_bits_from_seed(seed: u64, n: usize) -> Vec<u8> {
    ofdm_rand_seed(seed, n).into_iter().map(|v| (v > 16384) as u8).collect()
}

/// Bit-level packet assembly: weave UW bits, payload bits, and text bits
/// into `bits_per_packet` bits in lattice-traversal order.
pub fn assemble_bits(cfg: &ModeConfig, payload: &[u8], txt: &[u8]) -> Vec<u8> {
    let bits_per_packet = cfg.bits_per_packet();
    let mut frame = vec![0u8; bits_per_packet];
    let uw_ind = uw_bit_indices(cfg);
    let mut p = 0usize;
    let mut u = 0usize;
    for s in 0..(bits_per_packet - cfg.txtbits) {
        if u < uw_ind.len() && s == uw_ind[u] {
            frame[s] = cfg.tx_uw[u];
            u += 1;
        } else {
            frame[s] = payload[p];
            p += 1;
        }
    }
    debug_assert_eq!(u, cfg.nuwbits);
    debug_assert_eq!(p, bits_per_packet - cfg.nuwbits - cfg.txtbits);
    frame[bits_per_packet - cfg.txtbits..].copy_from_slice(txt);
    frame
}

/// Bit-level disassembly: inverse of [`assemble_bits`]; returns
/// `(payload, text)`.
pub fn disassemble_bits(cfg: &ModeConfig, frame: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let bits_per_packet = cfg.bits_per_packet();
    let uw_ind = uw_bit_indices(cfg);
    let mut payload = Vec::with_capacity(bits_per_packet - cfg.nuwbits - cfg.txtbits);
    let mut u = 0usize;
    for (s, &bit) in frame.iter().take(bits_per_packet - cfg.txtbits).enumerate() {
        if u < uw_ind.len() && s == uw_ind[u] {
            u += 1;
        } else {
            payload.push(bit);
        }
    }
    let txt = frame[bits_per_packet - cfg.txtbits..].to_vec();
    (payload, txt)
}

/// Each UW symbol position claims `bps` consecutive bit indices.
fn uw_bit_indices(cfg: &ModeConfig) -> Vec<usize> {
    let mut out = Vec::with_capacity(cfg.nuwbits);
    for &sym in cfg.uw_ind_sym() {
        for b in 0..cfg.bps {
            out.push(sym * cfg.bps + b);
        }
    }
    out
}

/// UW extraction: demodulate the first `nuwframes*data_sym_per_frame`
/// received data symbols at the pre-computed UW positions, and compare
/// against `tx_uw`. Demaps at the mode's own `bps` (the shipped pipeline
/// maps UW bits into the payload bitstream at the same density as
/// everything else — see [`uw_bit_indices`] — rather than forcing UW
/// symbols to stay QPSK in higher-order modes). Returns the mismatch count.
pub fn extract_uw(cfg: &ModeConfig, rx_syms: &[Complex64]) -> (Vec<u8>, usize) {
    let window = cfg.data_sym_per_frame() * cfg.nuwframes();
    let mut rx_uw = vec![0u8; cfg.nuwbits];
    let mut u = 0usize;
    for (s, &sym) in rx_syms.iter().take(window).enumerate() {
        if u < cfg.uw_ind_sym().len() && s == cfg.uw_ind_sym()[u] {
            let bits = demap_symbol(sym, cfg.bps);
            for (b, bit) in bits.into_iter().enumerate() {
                rx_uw[cfg.bps * u + b] = bit;
            }
            u += 1;
        }
    }
    let errors = rx_uw.iter().zip(cfg.tx_uw.iter()).filter(|(a, b)| a != b).count();
    (rx_uw, errors)
}
