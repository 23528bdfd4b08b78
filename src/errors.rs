//! Modem error types: fatal construction errors vs. the non-fatal per-call
//! status struct (spec §7 / SPEC_FULL §10.2).

use thiserror::Error;

use crate::sync::SyncState;

/// Fatal errors, only ever returned from fallible constructors. The core
/// never panics or returns `Err` for a channel-condition failure; those are
/// surfaced through [`DemodStatus`] instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModemError {
    #[error("unknown mode name: {name}")]
    UnknownMode { name: String },

    #[error("unknown LDPC code name: {name}")]
    UnknownCodeName { name: String },

    #[error("inconsistent sample/symbol rate: fs={fs} rs={rs} (fs/rs must be a positive integer)")]
    InconsistentSampleRate { fs: f64, rs: f64 },

    #[error("UW + text bits ({nuwbits}+{txtbits}) exceed bits-per-packet ({bits_per_packet})")]
    UwTextOverflow {
        nuwbits: usize,
        txtbits: usize,
        bits_per_packet: usize,
    },

    #[error("tx_uw length {actual} does not match configured nuwbits {expected}")]
    UwLengthMismatch { expected: usize, actual: usize },

    #[error("UW symbol layout overflows the packet: nuwbits={nuwbits}, bits_per_packet={bits_per_packet}")]
    UwLayoutOverflow {
        nuwbits: usize,
        bits_per_packet: usize,
    },

    #[error("payload length {actual} does not match bits-per-packet {expected}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    #[error("text length {actual} does not match configured txtbits {expected}")]
    TextLengthMismatch { expected: usize, actual: usize },
}

/// Per-call, non-fatal status and statistics. `demodulate`/`sync_search`/
/// `state_machine` always return one of these (or mutate state and return
/// it) — they never fail at runtime for channel-condition reasons.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DemodStatus {
    pub timing_valid: bool,
    pub uw_errors: usize,
    pub uw_fails: usize,
    pub sync_state: SyncState,
    pub crc_pass: Option<bool>,
    pub esno_db: f64,
    pub snr_db: f64,
    pub foff_hz: f32,
}

impl DemodStatus {
    /// Status flag the spec names `RX_BITS` (payload usable, no CRC
    /// failure observed) vs. `RX_BIT_ERRORS` (payload returned anyway, but
    /// the burst-mode CRC check failed).
    pub fn rx_bit_errors(&self) -> bool {
        matches!(self.crc_pass, Some(false))
    }
}
