//! `OfdmModem`: the top-level handle that owns a mode's configuration,
//! sync state machine, Tx shaping filter, and preamble/postamble samples,
//! and exposes the modem's public surface (spec §6): `modulate`,
//! `sync_search`, `demodulate`, `state_machine`, and the runtime setters.
//!
//! Grounded on `ofdm_internal.h`'s `struct OFDM` field list for the
//! ownership/lifecycle model (one instance per mode, constructed once,
//! mutated frame-by-frame) and `ofdm_create`/`ofdm_destroy`. Higher-level
//! call-sequencing (what state a single call advances, what it leaves to
//! the caller) follows `chimera-core/src/processor/mod.rs`'s
//! `ChimeraProcessor`, adapted since this core does not own an end-to-end
//! LDPC/channel pipeline — those stay external collaborators per spec §6.

use num_complex::Complex64;
use std::f64::consts::TAU;

use crate::acquisition::{self, BurstAcquisition, TimingResult};
use crate::collaborators::Crc16;
use crate::config::ModeConfig;
use crate::dftplan::{strip_cyclic_prefix, DftPlan};
use crate::errors::{DemodStatus, ModemError};
use crate::esno::{self, SnrSmoother};
use crate::logging::{LogConfig, SignalLogger};
use crate::modulator::{self, map_data_symbols};
use crate::packet::{assemble_bits, disassemble_bits, extract_uw};
use crate::phase_est::{self, CarrierReference, MeanAmpTracker};
use crate::pilot::pilot_row;
use crate::symbols::demap_symbol;
use crate::sync::{
    DataBurstSync, DataStreamingSync, PhaseEstBandwidth, PhaseEstBandwidthMode, SyncMode, SyncState, SyncUpdate, Voice1Sync,
    Voice2Sync,
};
use crate::txshape::{self, BpfBand, TxBpf};

enum SyncMachine {
    Voice1(Voice1Sync),
    Voice2(Voice2Sync),
    DataStreaming(DataStreamingSync),
    DataBurst(DataBurstSync),
}

impl SyncMachine {
    fn new(cfg: &ModeConfig, phase_bw_mode: PhaseEstBandwidthMode, packetsperburst: u32) -> Self {
        use crate::config::StateMachineKind;
        match (cfg.state_machine, cfg.is_burst()) {
            (StateMachineKind::Voice1, _) => SyncMachine::Voice1(Voice1Sync::new(phase_bw_mode)),
            (StateMachineKind::Voice2, _) => SyncMachine::Voice2(Voice2Sync::new(cfg.bad_uw_errors)),
            (StateMachineKind::Data, true) => SyncMachine::DataBurst(DataBurstSync::new(cfg.nuwframes(), cfg.bad_uw_errors, packetsperburst)),
            (StateMachineKind::Data, false) => {
                SyncMachine::DataStreaming(DataStreamingSync::new(cfg.nuwframes(), cfg.np, cfg.bad_uw_errors, packetsperburst))
            }
        }
    }

    fn state(&self) -> SyncState {
        match self {
            SyncMachine::Voice1(m) => m.state(),
            SyncMachine::Voice2(m) => m.state(),
            SyncMachine::DataStreaming(m) => m.state(),
            SyncMachine::DataBurst(m) => m.state(),
        }
    }

    fn enter_trial(&mut self) {
        match self {
            SyncMachine::Voice1(m) => m.enter_trial(),
            SyncMachine::Voice2(m) => m.enter_trial(),
            SyncMachine::DataStreaming(m) => m.enter_trial(),
            SyncMachine::DataBurst(m) => m.enter_trial(),
        }
    }

    fn update(&mut self, uw_errors: usize, mode: SyncMode) -> SyncUpdate {
        match self {
            SyncMachine::Voice1(m) => m.update(uw_errors, mode),
            SyncMachine::Voice2(m) => m.update(uw_errors, mode),
            SyncMachine::DataStreaming(m) => m.update(uw_errors, mode),
            SyncMachine::DataBurst(m) => m.update(uw_errors, mode),
        }
    }

    fn uw_fails(&self) -> usize {
        match self {
            SyncMachine::DataBurst(m) => m.uw_fails as usize,
            _ => 0,
        }
    }

    /// `set_sync(UN_SYNC)`: unconditional return to `search`. The
    /// frame-counting variants have no public reset, so they are rebuilt
    /// from scratch — equivalent, since `search` always starts with zeroed
    /// counters.
    fn force_unsync(&mut self, cfg: &ModeConfig, phase_bw_mode: PhaseEstBandwidthMode, packetsperburst: u32) -> SyncUpdate {
        match self {
            SyncMachine::DataBurst(m) => m.force_unsync(),
            other => {
                *other = SyncMachine::new(cfg, phase_bw_mode, packetsperburst);
                SyncUpdate {
                    state: SyncState::Search,
                    phase_est_bandwidth: PhaseEstBandwidth::High,
                    wipe_ring: true,
                }
            }
        }
    }
}

/// The OFDM modem core (spec §6). One instance per mode; not reentrant
/// (spec §5) — callers serialize access (e.g. behind a mutex) if shared
/// across threads.
pub struct OfdmModem {
    cfg: ModeConfig,
    plan: DftPlan,
    sync: SyncMachine,
    sync_mode: SyncMode,
    phase_bw_mode: PhaseEstBandwidthMode,
    timing_enable: bool,
    foff_est_enable: bool,
    phase_est_enable: bool,
    tx_bpf: Option<TxBpf>,
    packets_per_burst: u32,
    foff_hz: f64,
    amp_tracker: MeanAmpTracker,
    snr_smoother: Option<SnrSmoother>,
    logger: SignalLogger,
    preamble: Vec<Complex64>,
    postamble: Vec<Complex64>,
    pilot_samples: Vec<Complex64>,
    carry_pilot: Option<Vec<Complex64>>,
    last_timing_valid: bool,
}

impl OfdmModem {
    pub fn new(mode_name: &str) -> Result<Self, ModemError> {
        let cfg = ModeConfig::for_mode(mode_name)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: ModeConfig) -> Result<Self, ModemError> {
        let plan = DftPlan::new(cfg.m(), cfg.rs(), cfg.fs, cfg.tx_nlower(), cfg.rx_nlower());

        let tx_bpf = cfg.tx_bpf_en.then(|| {
            let bandwidth_hz = cfg.nc as f64 * cfg.rs();
            TxBpf::design(cfg.fs, cfg.tx_centre, BpfBand::for_bandwidth_hz(bandwidth_hz))
        });

        let preamble = modulator::generate_preamble(&cfg, &plan, 1);
        let postamble = modulator::generate_preamble(&cfg, &plan, 2);

        let known_pilot = pilot_row(cfg.nc, cfg.edge_pilots);
        let pilot_time = plan.idft(&known_pilot);
        let pilot_samples = crate::dftplan::add_cyclic_prefix(&pilot_time, cfg.ncp());

        let phase_bw_mode = PhaseEstBandwidthMode::Auto;
        let packets_per_burst = 0;
        let sync = SyncMachine::new(&cfg, phase_bw_mode, packets_per_burst);

        let snr_smoother = matches!(cfg.state_machine, crate::config::StateMachineKind::Voice1 | crate::config::StateMachineKind::Voice2)
            .then(SnrSmoother::new);

        Ok(Self {
            cfg,
            plan,
            sync,
            sync_mode: SyncMode::Autosync,
            phase_bw_mode,
            timing_enable: true,
            foff_est_enable: true,
            phase_est_enable: true,
            tx_bpf,
            packets_per_burst,
            foff_hz: 0.0,
            amp_tracker: MeanAmpTracker::new(),
            snr_smoother,
            logger: SignalLogger::new(LogConfig::default()),
            preamble,
            postamble,
            pilot_samples,
            carry_pilot: None,
            last_timing_valid: false,
        })
    }

    pub fn config(&self) -> &ModeConfig {
        &self.cfg
    }

    pub fn preamble(&self) -> &[Complex64] {
        &self.preamble
    }

    pub fn postamble(&self) -> &[Complex64] {
        &self.postamble
    }

    // ---- Tx --------------------------------------------------------

    /// Assemble `payload`/`txt` into one packet and run the full Tx chain
    /// (lattice → IDFT+CP → shaping). Lengths must match
    /// `bits_per_packet() - nuwbits - txtbits` and `txtbits` exactly.
    pub fn modulate(&mut self, payload: &[u8], txt: &[u8]) -> Result<Vec<Complex64>, ModemError> {
        let expected_payload = self.cfg.bits_per_packet() - self.cfg.nuwbits - self.cfg.txtbits;
        if payload.len() != expected_payload {
            return Err(ModemError::PayloadLengthMismatch {
                expected: expected_payload,
                actual: payload.len(),
            });
        }
        if txt.len() != self.cfg.txtbits {
            return Err(ModemError::TextLengthMismatch {
                expected: self.cfg.txtbits,
                actual: txt.len(),
            });
        }

        let frame = assemble_bits(&self.cfg, payload, txt);
        let data_syms = map_data_symbols(&self.cfg, &frame);
        let samples = modulator::modulate_packet(&self.cfg, &self.plan, &data_syms);
        let shaped = txshape::shape_tx(
            &samples,
            self.cfg.amp_scale,
            self.cfg.clip_en,
            self.cfg.clip_gain1,
            self.cfg.clip_gain2,
            self.tx_bpf.as_ref(),
        );

        self.logger.debug("TXSHAPE", format!("modulated packet: {} samples", shaped.len()));
        Ok(shaped)
    }

    // ---- Acquisition -------------------------------------------------

    /// Streaming-mode sync search (spec §4.2): three coarse frequency
    /// hypotheses against `rx_window`, +/-20 Hz refinement. On a valid hit,
    /// seeds the frequency estimate and starts a sync trial.
    pub fn sync_search(&mut self, rx_window: &[Complex64]) -> TimingResult {
        if !self.timing_enable {
            return TimingResult { t_est: 0, timing_mx: 0.0, timing_valid: false };
        }
        let (result, foff) = acquisition::sync_search_stream(
            rx_window,
            &self.pilot_samples,
            self.cfg.samples_per_frame(),
            self.cfg.fs,
            self.cfg.timing_mx_thresh,
        );
        self.last_timing_valid = result.timing_valid;
        if result.timing_valid {
            if self.foff_est_enable {
                self.foff_hz = foff;
            }
            self.sync.enter_trial();
            self.logger.info("ACQUISITION", format!("streaming sync hit at t={}, foff={:.1}Hz", result.t_est, foff));
        }
        result
    }

    /// Burst-mode sync search (spec §4.2): joint preamble/postamble
    /// matched-filter search. Returns the outcome so the caller can apply
    /// the `nin`/`rxbufst` adjustment it carries.
    pub fn sync_search_burst(&mut self, rx: &[Complex64], rxbufst: usize) -> BurstAcquisition {
        let outcome = acquisition::sync_search_burst(
            rx,
            rxbufst,
            self.cfg.m(),
            self.cfg.ncp(),
            self.cfg.samples_per_frame(),
            self.cfg.np,
            &self.preamble,
            Some(&self.postamble),
            self.cfg.fs,
            self.cfg.fmin_hz as f64,
            self.cfg.fmax_hz as f64,
            self.cfg.timing_mx_thresh,
        );
        match outcome {
            BurstAcquisition::Preamble { foff_hz, .. } | BurstAcquisition::Postamble { foff_hz, .. } => {
                if self.foff_est_enable {
                    self.foff_hz = foff_hz;
                }
                self.last_timing_valid = true;
                self.sync.enter_trial();
            }
            BurstAcquisition::NotFound { .. } => {
                self.last_timing_valid = false;
            }
        }
        outcome
    }

    // ---- Rx ------------------------------------------------------------

    /// Demodulate one packet's worth of complex baseband samples
    /// (`np*ns*samples_per_symbol()` long), returning `(payload_bits,
    /// text_bits, status)`.
    pub fn demodulate(&mut self, rx_samples: &[Complex64]) -> (Vec<u8>, Vec<u8>, DemodStatus) {
        let nss = self.cfg.samples_per_symbol();
        let ncp = self.cfg.ncp();
        let ns = self.cfg.ns;
        let np = self.cfg.np;
        let nc = self.cfg.nc;
        let rows_per_packet = np * ns;
        debug_assert_eq!(rx_samples.len(), rows_per_packet * nss);

        let known_pilot = pilot_row(nc, self.cfg.edge_pilots);

        // Phase A: per-row frequency correction, CP strip, DFT.
        let mut lattice: Vec<Vec<Complex64>> = Vec::with_capacity(rows_per_packet);
        for row in 0..rows_per_packet {
            let start = row * nss;
            let corrected: Vec<Complex64> = rx_samples[start..start + nss]
                .iter()
                .enumerate()
                .map(|(i, &s)| {
                    let t = (start + i) as f64;
                    s * Complex64::from_polar(1.0, -TAU * self.foff_hz * t / self.cfg.fs)
                })
                .collect();
            let data = strip_cyclic_prefix(&corrected, ncp);
            lattice.push(self.plan.dft(data, nc + 2));
        }

        let pilot_rows: Vec<Vec<Complex64>> = (0..np).map(|mf| lattice[mf * ns].clone()).collect();

        let bandwidth = match self.phase_bw_mode {
            PhaseEstBandwidthMode::Locked => PhaseEstBandwidth::High,
            PhaseEstBandwidthMode::Auto => match self.sync.state() {
                SyncState::Synced => PhaseEstBandwidth::Low,
                _ => PhaseEstBandwidth::High,
            },
        };

        // Phase B: per-frame, per-carrier phase/amplitude estimation and de-rotation.
        let mut corrected_lattice = lattice.clone();
        let mut amp_sum = 0.0f64;
        let mut amp_n = 0usize;
        for mf in 0..np {
            let this_pilot = &pilot_rows[mf];
            let next_pilot = pilot_rows.get(mf + 1).unwrap_or(this_pilot);
            let prev_pilot = if mf > 0 {
                pilot_rows[mf - 1].clone()
            } else {
                self.carry_pilot.clone().unwrap_or_else(|| this_pilot.clone())
            };
            let next_next_pilot = pilot_rows.get(mf + 2).cloned().unwrap_or_else(|| next_pilot.clone());

            for carrier in 0..nc {
                let col = carrier + 1;
                let near: Vec<&[Complex64]> = if self.phase_est_enable && bandwidth == PhaseEstBandwidth::Low {
                    vec![prev_pilot.as_slice(), this_pilot.as_slice(), next_pilot.as_slice(), next_next_pilot.as_slice()]
                } else {
                    vec![this_pilot.as_slice(), next_pilot.as_slice()]
                };

                let reference: CarrierReference = if self.phase_est_enable {
                    phase_est::estimate_carrier(bandwidth, &near, &known_pilot, self.cfg.amp_est_mode, col)
                } else {
                    CarrierReference { phase: Complex64::new(1.0, 0.0), amplitude: 1.0 }
                };
                amp_sum += reference.amplitude;
                amp_n += 1;

                let mut prev_corrected = this_pilot[col];
                for data_row in 0..ns - 1 {
                    let global_row = mf * ns + 1 + data_row;
                    let raw = lattice[global_row][col];
                    let fixed = if self.cfg.dpsk_en {
                        let out = phase_est::derotate_dpsk(raw, prev_corrected);
                        prev_corrected = raw;
                        out
                    } else {
                        phase_est::derotate_coherent(raw, reference)
                    };
                    corrected_lattice[global_row][col] = fixed;
                }
            }
        }
        if amp_n > 0 {
            self.amp_tracker.update(amp_sum / amp_n as f64);
        }
        self.carry_pilot = Some(pilot_rows.last().unwrap().clone());

        // Phase C: flatten to the same carrier-major order `build_lattice` consumes.
        let ns_minus_1 = ns - 1;
        let mut rx_data_syms = vec![Complex64::new(0.0, 0.0); np * ns_minus_1 * nc];
        for carrier in 0..nc {
            for mf in 0..np {
                for data_row in 0..ns_minus_1 {
                    let global_row = mf * ns + 1 + data_row;
                    let idx = mf * ns_minus_1 * nc + carrier * ns_minus_1 + data_row;
                    rx_data_syms[idx] = corrected_lattice[global_row][carrier + 1];
                }
            }
        }

        // Phase D: hard-demap to bits, in the same order `assemble_bits` produced them.
        let mut frame = Vec::with_capacity(self.cfg.bits_per_packet());
        for &sym in &rx_data_syms {
            frame.extend(demap_symbol(sym, self.cfg.bps));
        }

        // Phase E: UW error count.
        let (_rx_uw, uw_errors) = extract_uw(&self.cfg, &rx_data_syms);

        // Phase F: payload/text split.
        let (payload, txt) = disassemble_bits(&self.cfg, &frame);

        // Phase G: Es/No over non-UW payload symbols.
        let uw_positions: std::collections::HashSet<usize> = self.cfg.uw_ind_sym().iter().copied().collect();
        let payload_syms: Vec<Complex64> = rx_data_syms
            .iter()
            .enumerate()
            .filter(|(i, _)| !uw_positions.contains(i))
            .map(|(_, &s)| s)
            .collect();
        let est = esno::estimate(&payload_syms, nc, self.cfg.rs(), ncp, self.cfg.m());
        let snr_db = match &mut self.snr_smoother {
            Some(sm) => sm.update(est.snr_db_3khz),
            None => est.snr_db_3khz,
        };

        // Phase H: sync state machine update.
        let update = self.sync.update(uw_errors, self.sync_mode);
        self.logger.debug("SYNC", format!("uw_errors={uw_errors} -> {:?}", update.state));

        // Optional CRC check for burst framing: last two payload bytes are a
        // CCITT CRC16 trailer over the rest of the payload.
        let crc_pass = if self.cfg.is_burst() && payload.len() >= 16 {
            let (data_bits, crc_bits) = payload.split_at(payload.len() - 16);
            let crc = Crc16::new();
            let computed = crc.compute_bits(data_bits);
            let received = crc_bits.iter().fold(0u16, |acc, &b| (acc << 1) | b as u16);
            Some(computed == received)
        } else {
            None
        };

        let status = DemodStatus {
            timing_valid: self.last_timing_valid,
            uw_errors,
            uw_fails: self.sync.uw_fails(),
            sync_state: update.state,
            crc_pass,
            esno_db: est.esno_db,
            snr_db,
            foff_hz: self.foff_hz as f32,
        };

        (payload, txt, status)
    }

    pub fn state_machine(&self) -> SyncState {
        self.sync.state()
    }

    // ---- Setters (spec §6) ---------------------------------------------

    pub fn set_verbose(&mut self, verbose: bool) {
        self.logger = SignalLogger::new(if verbose { LogConfig::verbose() } else { LogConfig::default() });
    }

    pub fn set_timing_enable(&mut self, enable: bool) {
        self.timing_enable = enable;
    }

    pub fn set_foff_est_enable(&mut self, enable: bool) {
        self.foff_est_enable = enable;
    }

    pub fn set_phase_est_enable(&mut self, enable: bool) {
        self.phase_est_enable = enable;
    }

    pub fn set_phase_est_bandwidth_mode(&mut self, mode: PhaseEstBandwidthMode) {
        self.phase_bw_mode = mode;
    }

    pub fn set_tx_bpf(&mut self, enable: bool) {
        self.tx_bpf = enable.then(|| {
            let bandwidth_hz = self.cfg.nc as f64 * self.cfg.rs();
            TxBpf::design(self.cfg.fs, self.cfg.tx_centre, BpfBand::for_bandwidth_hz(bandwidth_hz))
        });
    }

    pub fn set_dpsk(&mut self, enable: bool) {
        self.cfg.dpsk_en = enable;
    }

    pub fn set_packets_per_burst(&mut self, n: u32) {
        self.packets_per_burst = n;
        self.sync = SyncMachine::new(&self.cfg, self.phase_bw_mode, n);
    }

    pub fn set_sync(&mut self, mode: SyncMode) {
        self.sync_mode = mode;
        if mode == SyncMode::Unsync {
            self.sync.force_unsync(&self.cfg, self.phase_bw_mode, self.packets_per_burst);
        }
    }

    /// Manually override the current frequency-offset estimate, bypassing
    /// the tracker (used by test harnesses to inject a known channel
    /// offset directly).
    pub fn set_off_est_hz(&mut self, hz: f64) {
        self.foff_hz = hz;
    }

    pub fn foff_hz(&self) -> f64 {
        self.foff_hz
    }

    pub fn logger(&self) -> &SignalLogger {
        &self.logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::rand_bits_from_seed;

    #[test]
    fn modulate_rejects_wrong_length_payload() {
        let mut modem = OfdmModem::new("700D").unwrap();
        let err = modem.modulate(&[0u8; 3], &[0u8; 4]).unwrap_err();
        assert!(matches!(err, ModemError::PayloadLengthMismatch { .. }));
    }

    #[test]
    fn round_trip_recovers_payload_with_zero_uw_errors() {
        let mut modem = OfdmModem::new("datac1").unwrap();
        let npayload = modem.cfg.bits_per_packet() - modem.cfg.nuwbits - modem.cfg.txtbits;
        let payload = rand_bits_from_seed(7, npayload);
        let txt = vec![0u8; modem.cfg.txtbits];

        let tx = modem.modulate(&payload, &txt).unwrap();
        assert_eq!(tx.len(), modem.cfg.np * modem.cfg.ns * modem.cfg.samples_per_symbol());

        let (rx_payload, rx_txt, status) = modem.demodulate(&tx);
        assert_eq!(status.uw_errors, 0);
        assert_eq!(rx_payload, payload);
        assert_eq!(rx_txt, txt);
    }

    #[test]
    fn sync_search_finds_a_clean_streaming_preamble() {
        let mut modem = OfdmModem::new("700D").unwrap();
        let npayload = modem.cfg.bits_per_packet() - modem.cfg.nuwbits - modem.cfg.txtbits;
        let payload = rand_bits_from_seed(3, npayload);
        let txt = vec![0u8; modem.cfg.txtbits];
        let mut tx = modem.modulate(&payload, &txt).unwrap();
        // Pad so a full frame-plus-a-bit correlation window exists either side.
        let mut padded = vec![Complex64::new(0.0, 0.0); modem.cfg.samples_per_frame()];
        padded.append(&mut tx);
        padded.extend(vec![Complex64::new(0.0, 0.0); modem.cfg.samples_per_frame()]);

        let result = modem.sync_search(&padded);
        assert!(result.timing_valid);
    }

    #[test]
    fn force_unsync_returns_to_search() {
        let mut modem = OfdmModem::new("datac0").unwrap();
        modem.sync.enter_trial();
        modem.set_sync(SyncMode::Unsync);
        assert_eq!(modem.state_machine(), SyncState::Search);
    }
}
