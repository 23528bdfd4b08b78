//! An OFDM modem core: per-carrier direct DFT/IDFT modulation, joint
//! time/frequency acquisition (streaming and burst variants), pilot-based
//! phase/amplitude estimation, four sync state machine variants, packet
//! assembly with scattered unique-word placement, Tx shaping, and Es/No
//! estimation. External FEC, speech coding, and interleaving are consumed
//! through collaborator traits rather than owned end-to-end.

pub mod acquisition;
pub mod collaborators;
pub mod config;
pub mod dftplan;
pub mod errors;
pub mod esno;
pub mod ldpc;
pub mod logging;
pub mod modem;
pub mod modulator;
pub mod packet;
pub mod phase_est;
pub mod pilot;
pub mod symbols;
pub mod sync;
pub mod txshape;

pub use config::ModeConfig;
pub use errors::{DemodStatus, ModemError};
pub use modem::OfdmModem;
pub use sync::{PhaseEstBandwidthMode, SyncMode, SyncState};
