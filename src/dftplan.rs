//! Sparse per-carrier IDFT/DFT and cyclic-prefix handling.
//!
//! The reference "IDFT/DFT" is not a power-of-two FFT over `M` samples — it
//! is a direct partial sum over only the `Nc+2` active carrier bins
//! (`ofdm.c`'s `idft`/`dft`, a Goertzel-style per-carrier exponential sum).
//! Reproduced directly here rather than reached for `rustfft`, whose API
//! targets full-length transforms and would be an awkward fit for a sparse
//! `Nc+2`-of-`M` transform (see `DESIGN.md`).

use num_complex::Complex64;
use std::f64::consts::TAU;

/// Precomputed per-carrier angular step, cached once per `ModeConfig`.
#[derive(Debug, Clone, Copy)]
pub struct DftPlan {
    pub m: usize,
    pub doc: f64,
    pub tx_nlower: i64,
    pub rx_nlower: i64,
}

impl DftPlan {
    pub fn new(m: usize, rs: f64, fs: f64, tx_nlower: i64, rx_nlower: i64) -> Self {
        Self {
            m,
            doc: TAU / (fs / rs),
            tx_nlower,
            rx_nlower,
        }
    }

    /// Inverse transform: `Nc+2` frequency-domain carrier values -> `M`
    /// time-domain samples.
    pub fn idft(&self, carriers: &[Complex64]) -> Vec<Complex64> {
        let inv_m = 1.0 / self.m as f64;
        let mut result = vec![Complex64::new(0.0, 0.0); self.m];
        result[0] = carriers.iter().sum::<Complex64>() * inv_m;
        for row in 1..self.m {
            let mut c = Complex64::from_polar(1.0, self.tx_nlower as f64 * self.doc * row as f64);
            let delta = Complex64::from_polar(1.0, self.doc * row as f64);
            let mut acc = Complex64::new(0.0, 0.0);
            for &v in carriers {
                acc += v * c;
                c *= delta;
            }
            result[row] = acc * inv_m;
        }
        result
    }

    /// Forward transform: `M` time-domain samples -> `Nc+2` carrier values.
    pub fn dft(&self, samples: &[Complex64], nc_plus_2: usize) -> Vec<Complex64> {
        let mut result = vec![samples[0]; nc_plus_2];
        for col in 0..nc_plus_2 {
            let tval = (self.rx_nlower + col as i64) as f64 * self.doc;
            let mut c = Complex64::from_polar(1.0, -tval);
            let delta = c;
            let mut acc = result[col];
            for &v in samples.iter().take(self.m).skip(1) {
                acc += v * c;
                c *= delta;
            }
            result[col] = acc;
        }
        result
    }
}

/// Prepend the last `ncp` samples of `symbol` to itself (cyclic prefix).
pub fn add_cyclic_prefix(symbol: &[Complex64], ncp: usize) -> Vec<Complex64> {
    let mut out = Vec::with_capacity(symbol.len() + ncp);
    out.extend_from_slice(&symbol[symbol.len() - ncp..]);
    out.extend_from_slice(symbol);
    out
}

/// Strip the cyclic prefix from an `Nss`-sample symbol, returning the `M`
/// data samples.
pub fn strip_cyclic_prefix(symbol: &[Complex64], ncp: usize) -> &[Complex64] {
    &symbol[ncp..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idft_dft_round_trip() {
        let nc = 17usize;
        let m = 144usize;
        let rs = 1.0 / 0.018;
        let fs = 8000.0;
        let tx_nlower = (1500.0 / rs - nc as f64 / 2.0).round() as i64 - 1;
        let plan = DftPlan::new(m, rs, fs, tx_nlower, tx_nlower);

        let mut carriers = vec![Complex64::new(0.0, 0.0); nc + 2];
        for (i, c) in carriers.iter_mut().enumerate() {
            *c = Complex64::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0);
        }

        let time = plan.idft(&carriers);
        assert_eq!(time.len(), m);
        let back = plan.dft(&time, nc + 2);
        for (a, b) in carriers.iter().zip(back.iter()) {
            let scaled = b / m as f64;
            assert!((a - scaled).norm() < 1e-9, "{a} vs {scaled}");
        }
    }

    #[test]
    fn cyclic_prefix_round_trips() {
        let symbol: Vec<Complex64> = (0..8).map(|i| Complex64::new(i as f64, 0.0)).collect();
        let ncp = 3;
        let with_cp = add_cyclic_prefix(&symbol, ncp);
        assert_eq!(with_cp.len(), symbol.len() + ncp);
        let stripped = strip_cyclic_prefix(&with_cp, ncp);
        assert_eq!(stripped, symbol.as_slice());
    }
}
