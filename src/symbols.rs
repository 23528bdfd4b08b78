//! QPSK/16-QAM symbol mapping and soft demapping.
//!
//! Grounded on `ofdm.c`'s `qpsk[]`/`qam16[]` tables and
//! `qpsk_mod`/`qpsk_demod`/`qam16_mod`/`qam16_demod`, including the
//! `ROT45` pre-rotation before QPSK sign decisions.

use num_complex::Complex64;
use std::f64::consts::FRAC_PI_4;

/// Gray-coded QPSK constellation, indexed by `(bit1<<1)|bit0`.
const QPSK: [Complex64; 4] = [
    Complex64::new(1.0, 0.0),
    Complex64::new(0.0, 1.0),
    Complex64::new(0.0, -1.0),
    Complex64::new(-1.0, 0.0),
];

/// 16-QAM constellation (offset table with ±1/±3 rails), indexed by
/// `(b3<<3)|(b2<<2)|(b1<<1)|b0`.
const QAM16: [Complex64; 16] = [
    Complex64::new(1.0, 1.0),
    Complex64::new(1.0, 3.0),
    Complex64::new(3.0, 1.0),
    Complex64::new(3.0, 3.0),
    Complex64::new(1.0, -1.0),
    Complex64::new(1.0, -3.0),
    Complex64::new(3.0, -1.0),
    Complex64::new(3.0, -3.0),
    Complex64::new(-1.0, 1.0),
    Complex64::new(-1.0, 3.0),
    Complex64::new(-3.0, 1.0),
    Complex64::new(-3.0, 3.0),
    Complex64::new(-1.0, -1.0),
    Complex64::new(-1.0, -3.0),
    Complex64::new(-3.0, -1.0),
    Complex64::new(-3.0, -3.0),
];

pub fn qpsk_mod(bits: [u8; 2]) -> Complex64 {
    QPSK[((bits[1] << 1) | bits[0]) as usize]
}

/// `01|00` top row, `11|10` bottom row after a π/4 rotation.
pub fn qpsk_demod(symbol: Complex64) -> [u8; 2] {
    let rotated = symbol * Complex64::from_polar(1.0, FRAC_PI_4);
    [
        (rotated.re <= 0.0) as u8,
        (rotated.im <= 0.0) as u8,
    ]
}

pub fn bpsk_demod(symbol: Complex64) -> u8 {
    (symbol.re <= 0.0) as u8
}

pub fn qam16_mod(bits: [u8; 4]) -> Complex64 {
    let idx = (bits[3] << 3) | (bits[2] << 2) | (bits[1] << 1) | bits[0];
    QAM16[idx as usize]
}

/// Nearest-neighbour hard decision over the 16-entry table.
pub fn qam16_demod(symbol: Complex64) -> [u8; 4] {
    let mut best = 0usize;
    let mut best_dist = f64::MAX;
    for (i, &pt) in QAM16.iter().enumerate() {
        let d = (symbol - pt).norm_sqr();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    [
        (best & 1) as u8,
        ((best >> 1) & 1) as u8,
        ((best >> 2) & 1) as u8,
        ((best >> 3) & 1) as u8,
    ]
}

/// Map `bps` bits (consumed MSB-first from `bits`) to one symbol.
pub fn map_symbol(bits: &[u8], bps: usize) -> Complex64 {
    match bps {
        1 => {
            if bits[0] == 0 {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(-1.0, 0.0)
            }
        }
        2 => qpsk_mod([bits[0], bits[1]]),
        4 => qam16_mod([bits[0], bits[1], bits[2], bits[3]]),
        other => panic!("unsupported bits-per-symbol {other}"),
    }
}

/// Demap one symbol to `bps` hard bits.
pub fn demap_symbol(symbol: Complex64, bps: usize) -> Vec<u8> {
    match bps {
        1 => vec![bpsk_demod(symbol)],
        2 => qpsk_demod(symbol).to_vec(),
        4 => qam16_demod(symbol).to_vec(),
        other => panic!("unsupported bits-per-symbol {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn qpsk_round_trips_all_dibits() {
        for b0 in 0..2u8 {
            for b1 in 0..2u8 {
                let sym = qpsk_mod([b0, b1]);
                let bits = qpsk_demod(sym);
                assert_eq!(bits, [b0, b1], "dibit ({b0},{b1})");
            }
        }
    }

    #[test]
    fn qam16_round_trips_all_nibbles() {
        for n in 0..16u8 {
            let bits = [n & 1, (n >> 1) & 1, (n >> 2) & 1, (n >> 3) & 1];
            let sym = qam16_mod(bits);
            let demod = qam16_demod(sym);
            assert_eq!(demod, bits, "nibble {n}");
        }
    }

    #[test]
    fn qam16_demod_is_robust_to_small_noise() {
        let sym = qam16_mod([1, 0, 1, 1]) + Complex64::new(0.2, -0.15);
        assert_eq!(qam16_demod(sym), [1, 0, 1, 1]);
    }

    #[test]
    fn qpsk_symbols_are_unit_magnitude() {
        for b0 in 0..2u8 {
            for b1 in 0..2u8 {
                assert_relative_eq!(qpsk_mod([b0, b1]).norm(), 1.0);
            }
        }
    }
}
