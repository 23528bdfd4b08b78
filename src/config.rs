//! Mode configuration for the OFDM modem core.
//!
//! `ModeConfig` bundles every tunable the modem needs to construct a
//! consistent frame lattice, acquisition search, and sync state machine. It
//! is immutable after construction: derived quantities (samples-per-symbol,
//! bits-per-packet, the UW index table, ...) are computed once in
//! `ModeConfig::for_mode`/`ModeConfig::custom` and cached alongside the raw
//! fields rather than recomputed per call.

use serde::{Deserialize, Serialize};

use crate::errors::ModemError;

/// `PEAK` Tx sample magnitude the clipper and final hard-limit target.
pub const PEAK: f32 = 16384.0;

/// Which sync state machine variant gates demodulation for a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateMachineKind {
    Voice1,
    Voice2,
    Data,
}

/// Data-burst framing variant, orthogonal to the voice/data state machine split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataMode {
    #[default]
    None,
    Streaming,
    Burst,
}

/// Amplitude-estimation sub-mode used by the high-bandwidth phase estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AmpEstMode {
    /// Magnitude of the pilot-averaged phasor.
    #[default]
    Legacy,
    /// Mean of the pilot-row symbol magnitudes.
    Improved,
}

/// Name of the external LDPC code a mode is paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeName {
    Hra112_112,
    Hra56_56,
    HraB396_504,
    H128_256_5,
    H4096_8192_3d,
    H1024_2048_4f,
}

impl CodeName {
    fn parse(name: &str) -> Result<Self, ModemError> {
        Ok(match name {
            "HRA_112_112" => CodeName::Hra112_112,
            "HRA_56_56" => CodeName::Hra56_56,
            "HRAb_396_504" => CodeName::HraB396_504,
            "H_128_256_5" => CodeName::H128_256_5,
            "H_4096_8192_3d" => CodeName::H4096_8192_3d,
            "H_1024_2048_4f" => CodeName::H1024_2048_4f,
            other => {
                return Err(ModemError::UnknownCodeName {
                    name: other.to_string(),
                })
            }
        })
    }
}

/// Every tunable from spec §3, in full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeConfig {
    pub mode_name: String,

    // carriers / frame geometry
    pub nc: usize,
    pub ns: usize,
    pub np: usize,
    pub bps: usize,
    pub ts: f64,
    pub tcp: f64,
    pub fs: f64,
    pub tx_centre: f64,
    pub rx_centre: f64,

    // UW / text
    pub nuwbits: usize,
    pub tx_uw: Vec<u8>,
    pub bad_uw_errors: usize,
    pub txtbits: usize,

    // acquisition / timing
    pub timing_mx_thresh: f32,
    pub ftwindowwidth: usize,
    pub edge_pilots: bool,
    pub foff_limiter: bool,
    pub fmin_hz: f32,
    pub fmax_hz: f32,

    // state machine / data framing
    pub state_machine: StateMachineKind,
    pub data_mode: DataMode,
    pub amp_est_mode: AmpEstMode,
    pub dpsk_en: bool,

    // FEC
    pub codename: CodeName,

    // Tx shaping
    pub amp_scale: f64,
    pub clip_gain1: f64,
    pub clip_gain2: f64,
    pub clip_en: bool,
    pub tx_bpf_en: bool,

    // cached derived quantities
    derived: Derived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Derived {
    m: usize,
    ncp: usize,
    nss: usize,
    rs: f64,
    bits_per_frame: usize,
    bits_per_packet: usize,
    sym_per_frame: usize,
    data_sym_per_frame: usize,
    uw_ind_sym: Vec<usize>,
    nuwframes: usize,
    tx_nlower: i64,
}

impl ModeConfig {
    /// Construct the mode table entry named `mode`, reproducing
    /// `ofdm_init_mode` bit-exactly.
    pub fn for_mode(mode: &str) -> Result<Self, ModemError> {
        // 700D baseline, overridden per-mode below.
        let mut nc = 17usize;
        let mut ns = 8usize;
        let mut np = 1usize;
        let mut ts = 0.018f64;
        let mut tcp = 0.002f64;
        let tx_centre = 1500.0f64;
        let rx_centre = 1500.0f64;
        let fs = 8000.0f64;
        let mut txtbits = 4usize;
        let bps_base = 2usize;
        let mut bps = bps_base;
        let mut bad_uw_errors = 3usize;
        let mut ftwindowwidth = 32usize;
        let mut timing_mx_thresh = 0.30f32;
        let mut edge_pilots = true;
        let mut state_machine = StateMachineKind::Voice1;
        let mut data_mode = DataMode::None;
        let mut codename = "HRA_112_112".to_string();
        let mut clip_gain1 = 2.5f64;
        let mut clip_gain2 = 0.8f64;
        let mut clip_en = false;
        let mut tx_bpf_en = true;
        let mut amp_scale = 245e3f64;
        let mut foff_limiter = false;
        let mut amp_est_mode = AmpEstMode::Legacy;
        let mut tx_uw: Vec<u8> = Vec::new();

        let mut nuwbits = 5 * bps;

        match mode {
            "700D" => {}
            "700E" => {
                ts = 0.014;
                tcp = 0.006;
                nc = 21;
                ns = 4;
                edge_pilots = false;
                nuwbits = 12;
                bad_uw_errors = 3;
                txtbits = 2;
                state_machine = StateMachineKind::Voice2;
                amp_est_mode = AmpEstMode::Improved;
                ftwindowwidth = 80;
                codename = "HRA_56_56".into();
                tx_bpf_en = false;
                foff_limiter = true;
                amp_scale = 155e3;
                clip_gain1 = 3.0;
                clip_gain2 = 0.8;
            }
            "2020" => {
                ts = 0.0205;
                nc = 31;
                codename = "HRAb_396_504".into();
                tx_bpf_en = false;
                amp_scale = 167e3;
                clip_gain1 = 2.5;
                clip_gain2 = 0.8;
            }
            "2020B" => {
                ts = 0.014;
                tcp = 0.004;
                nc = 29;
                ns = 5;
                codename = "HRA_56_56".into();
                txtbits = 4;
                nuwbits = 8 * 2;
                bad_uw_errors = 5;
                tx_bpf_en = false;
                amp_scale = 130e3;
                clip_gain1 = 2.5;
                clip_gain2 = 0.8;
                edge_pilots = false;
                state_machine = StateMachineKind::Voice2;
                ftwindowwidth = 64;
                foff_limiter = true;
            }
            "qam16" => {
                ns = 5;
                np = 5;
                tcp = 0.004;
                ts = 0.016;
                nc = 33;
                bps = 4;
                txtbits = 0;
                nuwbits = 15 * 4;
                bad_uw_errors = 5;
                ftwindowwidth = 32;
                state_machine = StateMachineKind::Data;
                amp_est_mode = AmpEstMode::Improved;
                tx_bpf_en = false;
                data_mode = DataMode::Streaming;
                // qam16 is a reference/test mode for the 16-QAM mapper; it has
                // no named LDPC code of its own in the reference table. Reuse
                // the 700D code so `for_mode` stays infallible for this entry.
                codename = "HRA_112_112".into();
            }
            "datac0" => {
                ns = 5;
                np = 4;
                tcp = 0.006;
                ts = 0.016;
                nc = 9;
                edge_pilots = false;
                txtbits = 0;
                nuwbits = 32;
                bad_uw_errors = 9;
                state_machine = StateMachineKind::Data;
                amp_est_mode = AmpEstMode::Improved;
                ftwindowwidth = 80;
                codename = "H_128_256_5".into();
                tx_uw = datac0_c1_uw();
                timing_mx_thresh = 0.08;
                data_mode = DataMode::Streaming;
                amp_scale = 300e3;
                clip_gain1 = 2.2;
                clip_gain2 = 0.8;
                tx_bpf_en = true;
                clip_en = true;
            }
            "datac1" => {
                ns = 5;
                np = 38;
                tcp = 0.006;
                ts = 0.016;
                nc = 27;
                edge_pilots = false;
                txtbits = 0;
                nuwbits = 16;
                bad_uw_errors = 6;
                state_machine = StateMachineKind::Data;
                amp_est_mode = AmpEstMode::Improved;
                ftwindowwidth = 80;
                codename = "H_4096_8192_3d".into();
                tx_uw = datac0_c1_uw();
                timing_mx_thresh = 0.10;
                data_mode = DataMode::Streaming;
                tx_bpf_en = false;
                clip_en = false;
            }
            "datac3" => {
                ns = 5;
                np = 29;
                tcp = 0.006;
                ts = 0.016;
                nc = 9;
                edge_pilots = false;
                txtbits = 0;
                state_machine = StateMachineKind::Data;
                ftwindowwidth = 80;
                timing_mx_thresh = 0.10;
                codename = "H_1024_2048_4f".into();
                amp_est_mode = AmpEstMode::Improved;
                nuwbits = 40;
                bad_uw_errors = 10;
                tx_uw = datac3_uw();
                data_mode = DataMode::Streaming;
                amp_scale = 300e3;
                clip_gain1 = 2.2;
                clip_gain2 = 0.8;
                tx_bpf_en = true;
                clip_en = true;
            }
            other => return Err(ModemError::UnknownMode { name: other.to_string() }),
        }

        // Modes that only set part of `tx_uw` (e.g. datac0's 16-bit pattern
        // against its 32-bit nuwbits) rely on the tail being zero, matching
        // the reference's `memset(tx_uw, 0, MAX_UW_BITS)` before the
        // mode-specific `memcpy`.
        if tx_uw.len() < nuwbits {
            tx_uw.resize(nuwbits, 0);
        }

        Self::build(
            mode.to_string(),
            nc,
            ns,
            np,
            bps,
            ts,
            tcp,
            fs,
            tx_centre,
            rx_centre,
            nuwbits,
            tx_uw,
            bad_uw_errors,
            txtbits,
            timing_mx_thresh,
            ftwindowwidth,
            edge_pilots,
            foff_limiter,
            state_machine,
            data_mode,
            amp_est_mode,
            &codename,
            amp_scale,
            clip_gain1,
            clip_gain2,
            clip_en,
            tx_bpf_en,
        )
    }

    /// Build an ad-hoc mode configuration (used for tests and non-tabulated variants).
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        mode_name: String,
        nc: usize,
        ns: usize,
        np: usize,
        bps: usize,
        ts: f64,
        tcp: f64,
        fs: f64,
        tx_centre: f64,
        rx_centre: f64,
        nuwbits: usize,
        tx_uw: Vec<u8>,
        bad_uw_errors: usize,
        txtbits: usize,
        timing_mx_thresh: f32,
        ftwindowwidth: usize,
        edge_pilots: bool,
        foff_limiter: bool,
        state_machine: StateMachineKind,
        data_mode: DataMode,
        amp_est_mode: AmpEstMode,
        codename: &str,
        amp_scale: f64,
        clip_gain1: f64,
        clip_gain2: f64,
        clip_en: bool,
        tx_bpf_en: bool,
    ) -> Result<Self, ModemError> {
        let rs = 1.0 / ts;
        let m_f = fs / rs;
        let m = m_f.round() as usize;
        if (m_f - m as f64).abs() > 1e-6 || m == 0 {
            return Err(ModemError::InconsistentSampleRate { fs, rs });
        }
        let ncp = (tcp * fs).floor() as usize;
        let nss = m + ncp;

        let bits_per_frame = (ns - 1) * nc * bps;
        let bits_per_packet = np * bits_per_frame;
        let sym_per_frame = ns * (nc + 2);
        let data_sym_per_frame = (ns - 1) * nc;

        if nuwbits + txtbits > bits_per_packet {
            return Err(ModemError::UwTextOverflow {
                nuwbits,
                txtbits,
                bits_per_packet,
            });
        }
        if tx_uw.len() != nuwbits {
            return Err(ModemError::UwLengthMismatch {
                expected: nuwbits,
                actual: tx_uw.len(),
            });
        }

        let data_syms_total = np * (ns - 1) * nc;
        let nuw_syms = nuwbits.div_ceil(bps);

        let (uw_ind_sym, nuwframes) = build_uw_index_table(nc, bps, nuw_syms, data_syms_total, data_sym_per_frame)
            .ok_or(ModemError::UwLayoutOverflow { nuwbits, bits_per_packet })?;

        let codename = CodeName::parse(codename)?;

        let tx_nlower = (tx_centre / rs - nc as f64 / 2.0).round() as i64 - 1;

        let fmin_hz = -50.0f32;
        let fmax_hz = 50.0f32;

        Ok(Self {
            mode_name,
            nc,
            ns,
            np,
            bps,
            ts,
            tcp,
            fs,
            tx_centre,
            rx_centre,
            nuwbits,
            tx_uw,
            bad_uw_errors,
            txtbits,
            timing_mx_thresh,
            ftwindowwidth,
            edge_pilots,
            foff_limiter,
            fmin_hz,
            fmax_hz,
            state_machine,
            data_mode,
            amp_est_mode,
            dpsk_en: false,
            codename,
            amp_scale,
            clip_gain1,
            clip_gain2,
            clip_en,
            tx_bpf_en,
            derived: Derived {
                m,
                ncp,
                nss,
                rs,
                bits_per_frame,
                bits_per_packet,
                sym_per_frame,
                data_sym_per_frame,
                uw_ind_sym,
                nuwframes,
                tx_nlower,
            },
        })
    }

    pub fn m(&self) -> usize {
        self.derived.m
    }
    pub fn ncp(&self) -> usize {
        self.derived.ncp
    }
    pub fn samples_per_symbol(&self) -> usize {
        self.derived.nss
    }
    pub fn samples_per_frame(&self) -> usize {
        self.ns * self.derived.nss
    }
    pub fn rs(&self) -> f64 {
        self.derived.rs
    }
    pub fn bits_per_frame(&self) -> usize {
        self.derived.bits_per_frame
    }
    pub fn bits_per_packet(&self) -> usize {
        self.derived.bits_per_packet
    }
    pub fn sym_per_frame(&self) -> usize {
        self.derived.sym_per_frame
    }
    /// Data symbols per modem frame (`(Ns-1)*Nc`), i.e. `bits_per_frame/bps`
    /// — the unit `nuwframes` and UW extraction count in (excludes pilots).
    pub fn data_sym_per_frame(&self) -> usize {
        self.derived.data_sym_per_frame
    }
    pub fn uw_ind_sym(&self) -> &[usize] {
        &self.derived.uw_ind_sym
    }
    pub fn nuwframes(&self) -> usize {
        self.derived.nuwframes
    }
    pub fn tx_nlower(&self) -> i64 {
        self.derived.tx_nlower
    }
    /// Lowest occupied DFT bin for the Rx down-conversion, computed from
    /// `rx_centre` the same way `tx_nlower` is computed from `tx_centre`
    /// (the two coincide whenever `rx_centre == tx_centre`, the case for
    /// every tabulated mode).
    pub fn rx_nlower(&self) -> i64 {
        (self.rx_centre / self.rs() - self.nc as f64 / 2.0).round() as i64 - 1
    }
    pub fn is_burst(&self) -> bool {
        matches!(self.data_mode, DataMode::Burst)
    }
}

/// `uw_ind_sym[i] = floor((i+1)*uw_step/bps)`, falling back from stride `Nc+1`
/// to `Nc-1` when the spread overruns the available data-symbol slots.
fn build_uw_index_table(
    nc: usize,
    bps: usize,
    nuw_syms: usize,
    data_syms_total: usize,
    sym_per_frame: usize,
) -> Option<(Vec<usize>, usize)> {
    let try_stride = |step: i64| -> Option<Vec<usize>> {
        if step <= 0 {
            return None;
        }
        let mut v = Vec::with_capacity(nuw_syms);
        for i in 0..nuw_syms {
            let ind = ((i as i64 + 1) * step) as usize / bps;
            if ind >= data_syms_total {
                return None;
            }
            v.push(ind);
        }
        Some(v)
    };

    let uw_step = nc as i64 + 1;
    let table = try_stride(uw_step).or_else(|| try_stride(nc as i64 - 1))?;
    let last = *table.last()?;
    let nuwframes = last.div_ceil(sym_per_frame).max(1);
    Some((table, nuwframes))
}

fn datac0_c1_uw() -> Vec<u8> {
    vec![1, 1, 0, 0, 1, 0, 1, 0, 1, 1, 1, 1, 0, 0, 0, 0]
}

/// Reproduces the reference's two overlapping `memcpy`s of a 24-bit `uw`
/// array into a 40-bit `tx_uw` buffer: once at offset 0, once at offset 16
/// (the second write clobbers the `[16..24)` overlap region).
fn datac3_uw() -> Vec<u8> {
    let mut half = datac0_c1_uw();
    half.extend_from_slice(&[1, 1, 1, 1, 0, 0, 0, 0]);
    let uw = half; // the reference's 24-bit `uw` array

    let mut tx_uw = vec![0u8; 40];
    tx_uw[0..24].copy_from_slice(&uw);
    tx_uw[16..40].copy_from_slice(&uw);
    tx_uw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_table_reproduces_700d_baseline() {
        let cfg = ModeConfig::for_mode("700D").unwrap();
        assert_eq!(cfg.nc, 17);
        assert_eq!(cfg.ns, 8);
        assert_eq!(cfg.np, 1);
        assert_eq!(cfg.bps, 2);
        assert_eq!(cfg.m(), 144); // m = fs*ts = 8000*0.018
        assert_eq!(cfg.nuwbits, 10);
        assert!(cfg.tx_bpf_en);
        assert!(!cfg.clip_en);
    }

    #[test]
    fn mode_table_datac3_has_repeated_uw() {
        let cfg = ModeConfig::for_mode("datac3").unwrap();
        assert_eq!(cfg.nuwbits, 40);
        // Two copies of the 16-bit datac0/c1 pattern, followed by that
        // pattern's own second half again (the reference's two overlapping
        // 24-bit `memcpy`s into a 40-bit buffer — see `datac3_uw`).
        let pattern16 = [1, 1, 0, 0, 1, 0, 1, 0, 1, 1, 1, 1, 0, 0, 0, 0];
        assert_eq!(&cfg.tx_uw[0..16], &pattern16);
        assert_eq!(&cfg.tx_uw[16..32], &pattern16);
        assert_eq!(&cfg.tx_uw[32..40], &pattern16[8..16]);
    }

    #[test]
    fn every_mode_satisfies_p1() {
        for name in ["700D", "700E", "2020", "2020B", "qam16", "datac0", "datac1", "datac3"] {
            let cfg = ModeConfig::for_mode(name).unwrap();
            assert!(cfg.bits_per_packet() >= cfg.nuwbits + cfg.txtbits, "{name}");
            let mut seen = std::collections::HashSet::new();
            for &ind in cfg.uw_ind_sym() {
                assert!(seen.insert(ind), "{name} duplicate UW index");
                assert!(ind < cfg.np * (cfg.ns - 1) * cfg.nc, "{name} UW index out of range");
            }
        }
    }

    #[test]
    fn unknown_mode_is_fatal() {
        assert!(ModeConfig::for_mode("bogus").is_err());
    }
}
