//! The fixed 64-entry pilot sequence and frame-lattice addressing helpers.
//!
//! Grounded on `ofdm.c`'s `pilotvalues[]` static table, transcribed
//! verbatim, and the lattice construction loops in `ofdm_create`/
//! `ofdm_txframe`.

use num_complex::Complex64;

/// Octave-compatible fixed BPSK pilot pattern; only the first `Nc+2` entries
/// of any mode are ever used.
pub const PILOT_VALUES: [i8; 64] = [
    -1, -1, 1, 1, -1, -1, -1, 1, -1, 1, -1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, 1, -1, 1, -1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, -1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, 1, -1, 1, -1, 1, -1, -1, 1, -1,
    1, 1, 1, 1, -1, 1, -1, 1,
];

/// Build the pilot row for a given carrier width (`Nc+2` columns), zeroing
/// the two edge columns when `edge_pilots` is disabled.
pub fn pilot_row(nc: usize, edge_pilots: bool) -> Vec<Complex64> {
    let width = nc + 2;
    assert!(width <= PILOT_VALUES.len(), "mode carrier count exceeds pilot table");
    let mut row: Vec<Complex64> = PILOT_VALUES[..width]
        .iter()
        .map(|&v| Complex64::new(v as f64, 0.0))
        .collect();
    if !edge_pilots {
        row[0] = Complex64::new(0.0, 0.0);
        row[width - 1] = Complex64::new(0.0, 0.0);
    }
    row
}

/// Addressing helper for a packet-sized symbol lattice: `Np*Ns` rows by
/// `Nc+2` columns, every `Ns`-th row a pilot row.
#[derive(Debug, Clone, Copy)]
pub struct FrameLattice {
    pub nc: usize,
    pub ns: usize,
    pub np: usize,
}

impl FrameLattice {
    pub fn new(nc: usize, ns: usize, np: usize) -> Self {
        Self { nc, ns, np }
    }

    pub fn cols(&self) -> usize {
        self.nc + 2
    }

    pub fn total_rows(&self) -> usize {
        self.ns * self.np
    }

    pub fn is_pilot_row(&self, row: usize) -> bool {
        row % self.ns == 0
    }

    /// Row index within the modem frame (0 = pilot row) for a given global row.
    pub fn row_in_frame(&self, row: usize) -> usize {
        row % self.ns
    }
}
