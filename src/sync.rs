//! Sync state machines (spec §4.4): four variants sharing the
//! `{search, trial, synced}` shape, driven by the per-frame UW error count.
//!
//! Grounded on the voice1/voice2/data-streaming/data-burst transition
//! tables and "exact semantics" notes in `SPEC_FULL.md` §4.4, themselves
//! distilled from `ofdm_sync_search`/`ofdm_sync_state_machine` in `ofdm.c`.
//! Modeled as a sum type per `DESIGN.md`'s redesign note rather than the
//! reference's single struct with a mode-switched `state_machine` string.

/// Coarse three-state shape shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Search,
    Trial,
    Synced,
}

/// External sync control, settable via `set_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Autosync,
    Manualsync,
    Unsync,
}

/// Phase-estimator bandwidth tri-state (`set_phase_est_bandwidth_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseEstBandwidthMode {
    #[default]
    Auto,
    Locked,
}

/// Resolved bandwidth the phase estimator should use this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEstBandwidth {
    Low,
    High,
}

/// Outcome of feeding one frame's UW error count into a sync machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncUpdate {
    pub state: SyncState,
    pub phase_est_bandwidth: PhaseEstBandwidth,
    /// Set on data-burst transitions that require the caller to wipe the
    /// receive ring buffer and rewind `rxbufst` to `nrxbufhistory`.
    pub wipe_ring: bool,
}

/// `trial`/`synced` frame counting machine for the voice1 variant
/// (700D/2020).
#[derive(Debug, Clone)]
pub struct Voice1Sync {
    state: SyncState,
    frame_count: u32,
    sync_counter: u32,
    phase_est_mode: PhaseEstBandwidthMode,
}

impl Voice1Sync {
    pub fn new(phase_est_mode: PhaseEstBandwidthMode) -> Self {
        Self {
            state: SyncState::Search,
            frame_count: 0,
            sync_counter: 0,
            phase_est_mode,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Call once per frame while in `trial` or `synced`; `search` is
    /// entered externally by the acquisition path.
    pub fn enter_trial(&mut self) {
        self.state = SyncState::Trial;
        self.frame_count = 0;
        self.sync_counter = 0;
    }

    fn bandwidth(&self) -> PhaseEstBandwidth {
        match self.phase_est_mode {
            PhaseEstBandwidthMode::Locked => PhaseEstBandwidth::High,
            PhaseEstBandwidthMode::Auto => match self.state {
                SyncState::Synced => PhaseEstBandwidth::Low,
                _ => PhaseEstBandwidth::High,
            },
        }
    }

    pub fn update(&mut self, uw_errors: usize, sync_mode: SyncMode) -> SyncUpdate {
        match self.state {
            SyncState::Trial => {
                self.frame_count += 1;
                if uw_errors > 2 {
                    self.sync_counter += 1;
                    self.frame_count = 0;
                    if self.sync_counter == 2 {
                        self.state = SyncState::Search;
                    }
                } else if self.frame_count == 4 {
                    self.state = SyncState::Synced;
                    self.sync_counter = 0;
                }
            }
            SyncState::Synced => {
                if uw_errors > 2 {
                    self.sync_counter += 1;
                } else {
                    self.sync_counter = 0;
                }
                if sync_mode == SyncMode::Autosync && self.sync_counter > 6 {
                    self.state = SyncState::Search;
                    self.sync_counter = 0;
                }
            }
            SyncState::Search => {}
        }
        SyncUpdate {
            state: self.state,
            phase_est_bandwidth: self.bandwidth(),
            wipe_ring: false,
        }
    }
}

/// One-shot trial window for the voice2 variant (700E/2020B).
#[derive(Debug, Clone)]
pub struct Voice2Sync {
    state: SyncState,
    sync_counter: u32,
    bad_uw_errors: usize,
}

impl Voice2Sync {
    pub fn new(bad_uw_errors: usize) -> Self {
        Self {
            state: SyncState::Search,
            sync_counter: 0,
            bad_uw_errors,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn enter_trial(&mut self) {
        self.state = SyncState::Trial;
        self.sync_counter = 0;
    }

    pub fn update(&mut self, uw_errors: usize, sync_mode: SyncMode) -> SyncUpdate {
        match self.state {
            SyncState::Trial => {
                self.state = if uw_errors <= self.bad_uw_errors {
                    SyncState::Synced
                } else {
                    SyncState::Search
                };
                self.sync_counter = 0;
            }
            SyncState::Synced => {
                if uw_errors > self.bad_uw_errors {
                    self.sync_counter += 1;
                } else {
                    self.sync_counter = 0;
                }
                if sync_mode == SyncMode::Autosync && self.sync_counter == 6 {
                    self.state = SyncState::Search;
                    self.sync_counter = 0;
                }
            }
            SyncState::Search => {}
        }
        SyncUpdate {
            state: self.state,
            phase_est_bandwidth: PhaseEstBandwidth::High,
            wipe_ring: false,
        }
    }
}

/// Streaming data variant: multi-frame trial window sized to `nuwframes`,
/// packet-count-gated drop back to `search`.
#[derive(Debug, Clone)]
pub struct DataStreamingSync {
    state: SyncState,
    sync_counter: u32,
    packet_count: u32,
    modem_frame: u32,
    nuwframes: u32,
    np: u32,
    bad_uw_errors: usize,
    packetsperburst: u32,
}

impl DataStreamingSync {
    pub fn new(nuwframes: usize, np: usize, bad_uw_errors: usize, packetsperburst: u32) -> Self {
        Self {
            state: SyncState::Search,
            sync_counter: 0,
            packet_count: 0,
            modem_frame: 0,
            nuwframes: nuwframes as u32,
            np: np as u32,
            bad_uw_errors,
            packetsperburst,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn enter_trial(&mut self) {
        self.state = SyncState::Trial;
        self.sync_counter = 0;
    }

    pub fn update(&mut self, uw_errors: usize, sync_mode: SyncMode) -> SyncUpdate {
        match self.state {
            SyncState::Trial => {
                self.sync_counter += 1;
                if self.sync_counter == self.nuwframes {
                    if uw_errors < self.bad_uw_errors {
                        self.state = SyncState::Synced;
                        self.packet_count = 0;
                        self.modem_frame = self.nuwframes;
                    } else if self.sync_counter > self.np {
                        self.state = SyncState::Search;
                    }
                } else if self.sync_counter > self.np {
                    self.state = SyncState::Search;
                }
            }
            SyncState::Synced => {
                self.modem_frame += 1;
                if self.modem_frame > self.np {
                    self.modem_frame = 0;
                    self.packet_count += 1;
                }
                if sync_mode == SyncMode::Autosync
                    && self.packetsperburst != 0
                    && self.packet_count >= self.packetsperburst
                {
                    self.state = SyncState::Search;
                }
            }
            SyncState::Search => {}
        }
        SyncUpdate {
            state: self.state,
            phase_est_bandwidth: PhaseEstBandwidth::High,
            wipe_ring: false,
        }
    }
}

/// Burst data variant: single evaluation at `sync_counter==nuwframes`,
/// failure wipes the ring to guarantee the postamble replay loop never
/// revisits the same samples twice (spec §9).
#[derive(Debug, Clone)]
pub struct DataBurstSync {
    state: SyncState,
    sync_counter: u32,
    packet_count: u32,
    nuwframes: u32,
    bad_uw_errors: usize,
    packetsperburst: u32,
    pub uw_fails: u32,
}

impl DataBurstSync {
    pub fn new(nuwframes: usize, bad_uw_errors: usize, packetsperburst: u32) -> Self {
        Self {
            state: SyncState::Search,
            sync_counter: 0,
            packet_count: 0,
            nuwframes: nuwframes as u32,
            bad_uw_errors,
            packetsperburst,
            uw_fails: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn enter_trial(&mut self) {
        self.state = SyncState::Trial;
        self.sync_counter = 0;
    }

    pub fn update(&mut self, uw_errors: usize, sync_mode: SyncMode) -> SyncUpdate {
        let mut wipe_ring = false;
        match self.state {
            SyncState::Trial => {
                self.sync_counter += 1;
                if self.sync_counter == self.nuwframes {
                    if uw_errors < self.bad_uw_errors {
                        self.state = SyncState::Synced;
                        self.packet_count = 0;
                    } else {
                        self.state = SyncState::Search;
                        self.uw_fails += 1;
                        wipe_ring = true;
                    }
                }
            }
            SyncState::Synced => {
                self.packet_count += 1;
                if sync_mode == SyncMode::Autosync
                    && self.packetsperburst != 0
                    && self.packet_count >= self.packetsperburst
                {
                    self.state = SyncState::Search;
                    wipe_ring = true;
                }
            }
            SyncState::Search => {}
        }
        SyncUpdate {
            state: self.state,
            phase_est_bandwidth: PhaseEstBandwidth::High,
            wipe_ring,
        }
    }

    /// `set_sync(UN_SYNC)`: unconditional return to `search`, ring wiped.
    pub fn force_unsync(&mut self) -> SyncUpdate {
        self.state = SyncState::Search;
        self.sync_counter = 0;
        SyncUpdate {
            state: self.state,
            phase_est_bandwidth: PhaseEstBandwidth::High,
            wipe_ring: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice1_promotes_after_three_consecutive_good_frames() {
        let mut m = Voice1Sync::new(PhaseEstBandwidthMode::Auto);
        m.enter_trial();
        for _ in 0..3 {
            let u = m.update(0, SyncMode::Autosync);
            assert_eq!(u.state, SyncState::Trial);
        }
        let u = m.update(0, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Synced);
        assert_eq!(u.phase_est_bandwidth, PhaseEstBandwidth::Low);
    }

    #[test]
    fn voice1_drops_to_search_after_two_bad_trial_frames() {
        let mut m = Voice1Sync::new(PhaseEstBandwidthMode::Auto);
        m.enter_trial();
        m.update(5, SyncMode::Autosync);
        let u = m.update(5, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Search);
    }

    #[test]
    fn voice1_synced_autosync_drops_after_seven_bad_frames() {
        let mut m = Voice1Sync::new(PhaseEstBandwidthMode::Auto);
        m.enter_trial();
        for _ in 0..4 {
            m.update(0, SyncMode::Autosync);
        }
        for _ in 0..6 {
            let u = m.update(5, SyncMode::Autosync);
            assert_eq!(u.state, SyncState::Synced);
        }
        let u = m.update(5, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Search);
    }

    #[test]
    fn voice2_one_shot_trial() {
        let mut good = Voice2Sync::new(3);
        good.enter_trial();
        assert_eq!(good.update(1, SyncMode::Autosync).state, SyncState::Synced);

        let mut bad = Voice2Sync::new(3);
        bad.enter_trial();
        assert_eq!(bad.update(10, SyncMode::Autosync).state, SyncState::Search);
    }

    #[test]
    fn data_streaming_promotes_after_nuwframes_good() {
        let mut m = DataStreamingSync::new(3, 4, 9, 0);
        m.enter_trial();
        m.update(0, SyncMode::Autosync);
        m.update(0, SyncMode::Autosync);
        let u = m.update(0, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Synced);
    }

    #[test]
    fn data_streaming_never_self_drops_when_packetsperburst_zero() {
        let mut m = DataStreamingSync::new(1, 4, 9, 0);
        m.enter_trial();
        let u = m.update(0, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Synced);
        for _ in 0..50 {
            assert_eq!(m.update(0, SyncMode::Autosync).state, SyncState::Synced);
        }
    }

    #[test]
    fn data_burst_failure_wipes_ring_and_counts_uw_fail() {
        let mut m = DataBurstSync::new(2, 9, 1);
        m.enter_trial();
        m.update(20, SyncMode::Autosync);
        let u = m.update(20, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Search);
        assert!(u.wipe_ring);
        assert_eq!(m.uw_fails, 1);
    }

    #[test]
    fn data_burst_success_then_completes_after_packetsperburst() {
        let mut m = DataBurstSync::new(2, 9, 1);
        m.enter_trial();
        m.update(0, SyncMode::Autosync);
        let u = m.update(0, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Synced);
        let u = m.update(0, SyncMode::Autosync);
        assert_eq!(u.state, SyncState::Search);
        assert!(u.wipe_ring);
    }

    #[test]
    fn manualsync_suppresses_synced_to_search() {
        let mut m = Voice1Sync::new(PhaseEstBandwidthMode::Auto);
        m.enter_trial();
        for _ in 0..4 {
            m.update(0, SyncMode::Manualsync);
        }
        for _ in 0..20 {
            let u = m.update(5, SyncMode::Manualsync);
            assert_eq!(u.state, SyncState::Synced);
        }
    }

    #[test]
    fn force_unsync_wipes_ring_immediately() {
        let mut m = DataBurstSync::new(2, 9, 0);
        m.enter_trial();
        m.update(0, SyncMode::Autosync);
        m.update(0, SyncMode::Autosync);
        let u = m.force_unsync();
        assert_eq!(u.state, SyncState::Search);
        assert!(u.wipe_ring);
    }
}
