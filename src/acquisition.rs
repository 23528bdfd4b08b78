//! Timing/frequency acquisition (spec §4.2): the streaming pilot-correlation
//! search, the burst preamble/postamble matched-filter search, and the
//! post-sync fine-timing/frequency-tracker block.
//!
//! Grounded on `est_timing`/`est_freq_offset_pilot_corr` (streaming),
//! `est_timing_and_freq`/`burst_acquisition_detector` (burst), and the
//! timing-update/frequency-tracker block inside `ofdm_demod_core`.

use num_complex::Complex64;
use std::f64::consts::TAU;

/// Result of one coarse/fine timing search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingResult {
    pub t_est: usize,
    pub timing_mx: f32,
    pub timing_valid: bool,
}

/// `est_timing`: normalized sliding correlation of `pilot_samples` (one
/// symbol's worth, CP zeroed by the caller) against `rx`, summing the
/// correlator response at the candidate frame AND one frame later, at a
/// given coarse frequency hypothesis `fcoarse_hz`.
pub fn est_timing(
    rx: &[Complex64],
    pilot_samples: &[Complex64],
    samples_per_frame: usize,
    fs: f64,
    fcoarse_hz: f64,
    step: usize,
    timing_mx_thresh: f32,
) -> TimingResult {
    let nss = pilot_samples.len();
    let ncorr = rx.len().saturating_sub(samples_per_frame + nss);

    let acc: f64 = rx.iter().map(|s| s.norm()).sum();
    let norm = nss as f64 * pilot_samples.iter().map(|p| p.norm_sqr()).sum::<f64>();
    let av_level = 1.0 / (2.0 * (norm * acc / rx.len().max(1) as f64).sqrt() + 1e-12);

    let w = TAU * fcoarse_hz / fs;
    let wvec: Vec<Complex64> = (0..nss)
        .map(|j| (pilot_samples[j] * Complex64::from_polar(1.0, w * j as f64)).conj())
        .collect();

    let mut timing_mx = 0.0f32;
    let mut t_est = 0usize;
    let mut i = 0usize;
    while i < ncorr {
        let mut corr_st = Complex64::new(0.0, 0.0);
        let mut corr_en = Complex64::new(0.0, 0.0);
        for j in 0..nss {
            corr_st += rx[i + j] * wvec[j];
            corr_en += rx[i + j + samples_per_frame] * wvec[j];
        }
        let corr = ((corr_st.norm() + corr_en.norm()) * av_level) as f32;
        if corr > timing_mx {
            timing_mx = corr;
            t_est = i;
        }
        i += step;
    }

    let timing_valid = rx[t_est].norm() > 0.0 && timing_mx > timing_mx_thresh;
    TimingResult { t_est, timing_mx, timing_valid }
}

/// `est_freq_offset_pilot_corr`: refine frequency +/-20 Hz in 1 Hz steps
/// around `fcoarse_hz` by DFT-magnitude peak search at the fixed `t_est`.
pub fn est_freq_offset_pilot_corr(
    rx: &[Complex64],
    pilot_samples: &[Complex64],
    t_est: usize,
    fs: f64,
    fcoarse_hz: f64,
) -> f64 {
    let nss = pilot_samples.len();
    let mut best_mag = 0.0f64;
    let mut best_foff = 0.0f64;
    let mut f = -20i32;
    while f <= 20 {
        let w = TAU * f as f64 / fs;
        let mut corr = Complex64::new(0.0, 0.0);
        for j in 0..nss {
            let ph = Complex64::from_polar(1.0, w * j as f64);
            corr += rx[t_est + j] * (pilot_samples[j] * ph).conj();
        }
        if corr.norm() > best_mag {
            best_mag = corr.norm();
            best_foff = f as f64;
        }
        f += 1;
    }
    best_foff + fcoarse_hz
}

/// Streaming variant (spec §4.2): three coarse frequency hypotheses
/// `{-40, 0, +40}` Hz, refine the winner +/-20 Hz in 1 Hz steps.
pub fn sync_search_stream(
    rx_window: &[Complex64],
    pilot_samples: &[Complex64],
    samples_per_frame: usize,
    fs: f64,
    timing_mx_thresh: f32,
) -> (TimingResult, f64) {
    let mut best = TimingResult { t_est: 0, timing_mx: 0.0, timing_valid: false };
    let mut best_fcoarse = 0.0f64;
    for &fcoarse in &[-40.0, 0.0, 40.0] {
        let r = est_timing(rx_window, pilot_samples, samples_per_frame, fs, fcoarse, 2, timing_mx_thresh);
        if r.timing_mx > best.timing_mx {
            best = r;
            best_fcoarse = fcoarse;
        }
    }
    let foff = est_freq_offset_pilot_corr(rx_window, pilot_samples, best.t_est, fs, best_fcoarse);
    (best, foff)
}

/// `est_timing_and_freq`: joint (t, f) search of `known` against `rx` over
/// `[fmin, fmax]` at step `fstep` Hz and `tstep` samples.
pub fn est_timing_and_freq(
    rx: &[Complex64],
    known: &[Complex64],
    fs: f64,
    tstep: usize,
    fmin: f64,
    fmax: f64,
    fstep: f64,
) -> (usize, f64, f32) {
    let npsam = known.len();
    if rx.len() < npsam {
        return (0, fmin, 0.0);
    }
    let ncorr = rx.len() - npsam + 1;

    let mut max_corr = 0.0f64;
    let mut t_est = 0usize;
    let mut foff_est = 0.0f64;

    let mut f = fmin;
    while f <= fmax + 1e-9 {
        let w = TAU * f / fs;
        let mvec: Vec<Complex64> = (0..npsam).map(|i| known[i] * Complex64::from_polar(1.0, w * i as f64)).collect();
        let mut t = 0usize;
        while t < ncorr {
            let mut corr = Complex64::new(0.0, 0.0);
            for i in 0..npsam {
                corr += rx[i + t] * mvec[i].conj();
            }
            let mag = corr.norm();
            if mag > max_corr {
                max_corr = mag;
                t_est = t;
                foff_est = f;
            }
            t += tstep;
        }
        f += fstep;
    }

    let mag1: f64 = known.iter().map(|k| k.norm_sqr()).sum();
    let mag2: f64 = rx[t_est..t_est + npsam].iter().map(|r| r.norm_sqr()).sum();
    let timing_mx = (max_corr * max_corr / (mag1 * mag2 + 1e-12)) as f32;

    (t_est, foff_est, timing_mx)
}

/// Two-stage burst search: coarse grid (tstep=4, fstep=5Hz) then a +/-1
/// fine grid, against one `known_sequence` (preamble or postamble).
pub fn burst_acquisition_detector(
    rx: &[Complex64],
    n: usize,
    known_sequence: &[Complex64],
    samples_per_frame: usize,
    fs: f64,
    fmin: f64,
    fmax: f64,
) -> (usize, f64, f32) {
    let tstep = 4usize;
    let fstep = 5.0f64;

    let coarse_window = &rx[n..(n + 2 * samples_per_frame).min(rx.len())];
    let (ct_est, foff_est, _mx) = est_timing_and_freq(coarse_window, known_sequence, fs, tstep, fmin, fmax, fstep);

    let fine_fmin = foff_est - (fstep / 2.0).ceil();
    let fine_fmax = foff_est + (fstep / 2.0).ceil();
    let fine_st = (n + ct_est).saturating_sub(tstep / 2);
    let fine_len = (samples_per_frame + tstep).min(rx.len().saturating_sub(fine_st));
    let fine_window = &rx[fine_st..fine_st + fine_len];
    let (fine_ct, fine_foff, fine_mx) = est_timing_and_freq(fine_window, known_sequence, fs, 1, fine_fmin, fine_fmax, 1.0);

    let ct_est_global = fine_ct + fine_st - n;
    (ct_est_global, fine_foff, fine_mx)
}

/// Outcome of the burst sync search: which bracket (preamble/postamble) won
/// and how the caller must adjust `nin`/`rxbufst`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurstAcquisition {
    /// Preamble won: advance `nin` by `samples_per_frame + ct_est - 1` to
    /// land on the first data modem-frame.
    Preamble { ct_est: usize, foff_hz: f64, timing_mx: f32, nin: usize },
    /// Postamble won: `rxbufst` must be rewound by
    /// `np*samples_per_frame - ct_est` and `nin` set to 0 so the next demod
    /// pass replays the packet that preceded the postamble.
    Postamble { ct_est: usize, foff_hz: f64, timing_mx: f32, rxbufst_rewind: i64 },
    /// Neither bracket crossed `timing_mx_thresh`.
    NotFound { nin: usize },
}

#[allow(clippy::too_many_arguments)]
pub fn sync_search_burst(
    rx: &[Complex64],
    rxbufst: usize,
    m: usize,
    ncp: usize,
    samples_per_frame: usize,
    np: usize,
    preamble: &[Complex64],
    postamble: Option<&[Complex64]>,
    fs: f64,
    fmin: f64,
    fmax: f64,
    timing_mx_thresh: f32,
) -> BurstAcquisition {
    let st = rxbufst + m + ncp + samples_per_frame;

    let (pre_ct, pre_foff, pre_mx) = burst_acquisition_detector(rx, st, preamble, samples_per_frame, fs, fmin, fmax);
    let post = postamble.map(|post_seq| burst_acquisition_detector(rx, st, post_seq, samples_per_frame, fs, fmin, fmax));

    let use_post = match post {
        Some((_, _, post_mx)) => post_mx > pre_mx,
        None => false,
    };

    if use_post {
        let (post_ct, post_foff, post_mx) = post.unwrap();
        if post_mx > timing_mx_thresh {
            let rewind = (np * samples_per_frame) as i64 - post_ct as i64;
            BurstAcquisition::Postamble { ct_est: post_ct, foff_hz: post_foff, timing_mx: post_mx, rxbufst_rewind: rewind }
        } else {
            BurstAcquisition::NotFound { nin: samples_per_frame }
        }
    } else if pre_mx > timing_mx_thresh {
        BurstAcquisition::Preamble {
            ct_est: pre_ct,
            foff_hz: pre_foff,
            timing_mx: pre_mx,
            nin: samples_per_frame + pre_ct - 1,
        }
    } else {
        BurstAcquisition::NotFound { nin: samples_per_frame }
    }
}

/// Post-sync fine timing update, run every frame while synced. Returns the
/// updated `(timing_est, sample_point)` pair and the `nin` adjustment for
/// sample-clock drift absorption.
#[allow(clippy::too_many_arguments)]
pub fn fine_timing_update(
    rx: &[Complex64],
    rxbufst: usize,
    samples_per_symbol: usize,
    samples_per_frame: usize,
    ftwindowwidth: usize,
    timing_est: i64,
    sample_point: i64,
    ncp: usize,
    foff_hz: f32,
    fs: f64,
    timing_mx_thresh: f32,
) -> (i64, i64, usize, f32) {
    let half = (ftwindowwidth / 2) as i64;
    let st = rxbufst as i64 + samples_per_symbol as i64 + samples_per_frame as i64 - half + timing_est;
    let en = st + samples_per_frame as i64 - 1 + samples_per_symbol as i64 + ftwindowwidth as i64;

    let woff = TAU * foff_hz as f64 / fs;
    let mut work = Vec::with_capacity((en - st).max(0) as usize);
    let mut i = st;
    while i < en {
        let idx = i as usize;
        if idx < rx.len() {
            work.push(rx[idx] * Complex64::from_polar(1.0, -woff * i as f64));
        } else {
            work.push(Complex64::new(0.0, 0.0));
        }
        i += 1;
    }

    // A single-symbol pilot reference correlated at fcoarse=0 against the
    // window built above (the window already carries the freq correction).
    let pilot_samples = vec![Complex64::new(1.0, 0.0); samples_per_symbol];
    let r = est_timing(&work, &pilot_samples, samples_per_frame, fs, 0.0, 1, timing_mx_thresh);

    let ceil_half = ftwindowwidth.div_ceil(2) as i64;
    let mut new_timing_est = timing_est + r.t_est as i64 - ceil_half + 1;

    let mut new_sample_point = sample_point.max(new_timing_est + 4);
    new_sample_point = new_sample_point.min(new_timing_est + ncp as i64 - 4);

    let thresh = (samples_per_symbol / 8) as i64;
    let tshift = (samples_per_symbol / 4) as i64;
    let mut nin = samples_per_frame;
    if new_timing_est > thresh {
        nin = samples_per_frame + tshift as usize;
        new_timing_est -= tshift;
        new_sample_point -= tshift;
    } else if new_timing_est < -thresh {
        nin = samples_per_frame - tshift as usize;
        new_timing_est += tshift;
        new_sample_point += tshift;
    }

    (new_timing_est, new_sample_point, nin, r.timing_mx)
}

/// Frequency tracker: compares the aggregate pilot phasors at the "this"
/// and "next" pilot rows, scaling the phase of their inner product by
/// `foff_est_gain` and integrating into `foff_hz`.
pub fn track_frequency(this_pilot_sum: Complex64, next_pilot_sum: Complex64, rs: f64, ns: usize, foff_limiter: bool, gain: f64) -> f64 {
    let mut freq_err_rect = this_pilot_sum.conj() * next_pilot_sum;
    freq_err_rect += Complex64::new(1e-6, 0.0);
    let mut freq_err_hz = freq_err_rect.arg() * rs / (TAU * ns as f64);
    if foff_limiter {
        freq_err_hz = freq_err_hz.clamp(-1.0, 1.0);
    }
    gain * freq_err_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pilot(n: usize) -> Vec<Complex64> {
        (0..n).map(|i| Complex64::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0)).collect()
    }

    #[test]
    fn est_timing_finds_injected_pilot_p4() {
        let nss = 32usize;
        let samples_per_frame = 128usize;
        let pilot = make_pilot(nss);
        let mut rx = vec![Complex64::new(0.0, 0.0); samples_per_frame * 3];
        let true_t = 50usize;
        for (i, &p) in pilot.iter().enumerate() {
            rx[true_t + i] = p;
            rx[true_t + i + samples_per_frame] = p;
        }
        let r = est_timing(&rx, &pilot, samples_per_frame, 8000.0, 0.0, 1, 0.05);
        assert_eq!(r.t_est, true_t);
        assert!(r.timing_valid);
    }

    #[test]
    fn freq_offset_refinement_recovers_injected_offset() {
        let nss = 64usize;
        let fs = 8000.0;
        let true_foff = 7.0f64;
        let pilot = make_pilot(nss);
        let w = TAU * true_foff / fs;
        let shifted: Vec<Complex64> = pilot.iter().enumerate().map(|(i, &p)| p * Complex64::from_polar(1.0, w * i as f64)).collect();
        let mut rx = vec![Complex64::new(0.0, 0.0); nss + 10];
        rx[0..nss].copy_from_slice(&shifted);
        let foff = est_freq_offset_pilot_corr(&rx, &pilot, 0, fs, 0.0);
        assert!((foff - true_foff).abs() <= 1.0, "got {foff}");
    }

    #[test]
    fn timing_and_freq_joint_search_p4() {
        let fs = 8000.0;
        let known = make_pilot(160);
        let true_t = 37usize;
        let true_foff = 23.5f64;
        let w = TAU * true_foff / fs;
        let mut rx = vec![Complex64::new(0.0, 0.0); 500];
        for (i, &k) in known.iter().enumerate() {
            rx[true_t + i] = k * Complex64::from_polar(1.0, w * i as f64);
        }
        let (t_est, foff_est, mx) = est_timing_and_freq(&rx, &known, fs, 1, -50.0, 50.0, 1.0);
        assert_eq!(t_est, true_t);
        assert!((foff_est - true_foff).abs() <= 1.0);
        assert!(mx > 0.5);
    }
}
