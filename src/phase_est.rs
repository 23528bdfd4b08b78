//! Pilot phase/amplitude estimation and carrier de-rotation (spec §4.3).
//!
//! Grounded on `ofdm_demod_core`'s phase-estimation block: the low-bandwidth
//! branch averages the pilot phasor over four pilot rows and three
//! neighbouring carriers (12 samples); the high-bandwidth branch uses only
//! the two pilot rows bracketing the current modem frame. Amplitude
//! estimation branches separately on `amp_est_mode`: legacy takes the
//! magnitude of the aggregated phasor, improved takes the mean magnitude of
//! the raw pilot samples in the same neighbourhood.

use num_complex::Complex64;

use crate::config::AmpEstMode;
use crate::sync::PhaseEstBandwidth;

/// One carrier's resolved phase/amplitude reference for a modem frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarrierReference {
    /// Unit-magnitude channel phasor.
    pub phase: Complex64,
    pub amplitude: f64,
}

/// `carrier_col` indexes into `Nc+2`-wide rows (0 and `Nc+1` are the edge
/// pilot columns). Averages `rx_pilot * conj(known_pilot)` over
/// `carrier_col-1..=carrier_col+1` (clamped at the lattice edges) across
/// every row in `near_pilots`.
fn aggregate_phasor(near_pilots: &[&[Complex64]], known_pilot: &[Complex64], carrier_col: usize) -> Complex64 {
    let width = known_pilot.len();
    let lo = carrier_col.saturating_sub(1);
    let hi = (carrier_col + 1).min(width - 1);

    let mut acc = Complex64::new(0.0, 0.0);
    let mut n = 0usize;
    for &row in near_pilots {
        for c in lo..=hi {
            let known = known_pilot[c];
            if known.norm() < 1e-9 {
                continue; // disabled edge-pilot column carries no reference
            }
            acc += row[c] * known.conj() / known.norm_sqr();
            n += 1;
        }
    }
    if n == 0 {
        Complex64::new(1.0, 0.0)
    } else {
        acc / n as f64
    }
}

fn mean_pilot_magnitude(near_pilots: &[&[Complex64]], carrier_col: usize) -> f64 {
    let width = near_pilots.first().map(|r| r.len()).unwrap_or(0);
    if width == 0 {
        return 1.0;
    }
    let lo = carrier_col.saturating_sub(1);
    let hi = (carrier_col + 1).min(width - 1);
    let mut sum = 0.0;
    let mut n = 0usize;
    for &row in near_pilots {
        for c in lo..=hi {
            sum += row[c].norm();
            n += 1;
        }
    }
    if n == 0 {
        1.0
    } else {
        sum / n as f64
    }
}

/// Resolve one carrier's phase/amplitude reference. `near_pilots` must hold
/// exactly two rows (this + next) for [`PhaseEstBandwidth::High`], or up to
/// four (prev, this, next, next-next) for [`PhaseEstBandwidth::Low`] — the
/// caller supplies however many are actually available near a sync
/// boundary, and this function simply averages whatever it is given.
pub fn estimate_carrier(
    _bandwidth: PhaseEstBandwidth,
    near_pilots: &[&[Complex64]],
    known_pilot: &[Complex64],
    amp_mode: AmpEstMode,
    carrier_col: usize,
) -> CarrierReference {
    let phasor = aggregate_phasor(near_pilots, known_pilot, carrier_col);
    let phase_mag = phasor.norm().max(1e-12);
    let phase = phasor / phase_mag;

    let amplitude = match amp_mode {
        AmpEstMode::Legacy => phase_mag,
        AmpEstMode::Improved => mean_pilot_magnitude(near_pilots, carrier_col),
    };

    CarrierReference { phase, amplitude }
}

/// Coherent de-rotation: divide out the estimated channel phasor.
pub fn derotate_coherent(sym: Complex64, reference: CarrierReference) -> Complex64 {
    sym * reference.phase.conj()
}

/// DPSK de-rotation: divide by the previous row's (already-corrected)
/// symbol on the same carrier rather than by a pilot-derived phase
/// reference — mirrors the Tx-side row-to-row multiply in `modulator.rs`.
pub fn derotate_dpsk(sym: Complex64, prev_corrected: Complex64) -> Complex64 {
    let mag = prev_corrected.norm().max(1e-12);
    sym * prev_corrected.conj() / mag
}

/// Fast-attack/slow-decay smoother for the per-carrier amplitude estimate,
/// shared with [`crate::esno::SnrSmoother`]'s "first value is raw" rule:
/// `amp <- 0.9*amp + 0.1*new`.
#[derive(Debug, Clone, Copy)]
pub struct MeanAmpTracker {
    value: Option<f64>,
}

impl MeanAmpTracker {
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn update(&mut self, new_amp: f64) -> f64 {
        let next = match self.value {
            None => new_amp,
            Some(prev) => 0.9 * prev + 0.1 * new_amp,
        };
        self.value = Some(next);
        next
    }

    pub fn current(&self) -> Option<f64> {
        self.value
    }
}

impl Default for MeanAmpTracker {
    fn default() -> Self {
        Self::new()
    }
}
