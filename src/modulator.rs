//! `modulate_packet`: bit-to-symbol mapping, lattice assembly, per-row
//! IDFT+CP, packet concatenation (spec §4.1 Tx contract).
//!
//! Grounded on `ofdm_txframe` (lattice construction loop, the DPSK
//! row-to-row multiply, the cyclic-prefix copy) and `ofdm_mod` (the bits ->
//! symbols -> `ofdm_txframe` -> shaping call sequence).

use ndarray::Array2;
use num_complex::Complex64;

use crate::config::ModeConfig;
use crate::dftplan::{add_cyclic_prefix, DftPlan};
use crate::packet::rand_bits_from_seed;
use crate::pilot::pilot_row;
use crate::symbols::map_symbol;
use crate::txshape::shape_tx;

/// Map `bits_per_packet` payload+UW+text bits (already assembled, §4.6) to
/// one complex symbol per data-lattice position, column-major within each
/// modem frame: for carrier `c`, advance down the `Ns-1` data rows before
/// moving to carrier `c+1` — matching `ofdm_txframe`'s `s++` stepping order.
pub fn map_data_symbols(cfg: &ModeConfig, bits: &[u8]) -> Vec<Complex64> {
    let nsyms = bits.len() / cfg.bps;
    let mut out = Vec::with_capacity(nsyms);
    for s in 0..nsyms {
        let chunk = &bits[s * cfg.bps..s * cfg.bps + cfg.bps];
        out.push(map_symbol(chunk, cfg.bps));
    }
    out
}

/// Build the full `Np*Ns` x `Nc+2` lattice: pilot rows get the fixed pilot
/// sequence, data rows get mapped symbols (column order per
/// [`map_data_symbols`]); optionally DPSK-multiplies each data row by the
/// row directly above it.
pub fn build_lattice(cfg: &ModeConfig, data_syms: &[Complex64]) -> Array2<Complex64> {
    let rows_per_packet = cfg.np * cfg.ns;
    let cols = cfg.nc + 2;
    let pilot = pilot_row(cfg.nc, cfg.edge_pilots);

    let mut lattice = Array2::from_elem((rows_per_packet, cols), Complex64::new(0.0, 0.0));

    // data_syms is column-major across data rows within a modem frame:
    // index = carrier*(Ns-1) + data_row. Walk it out that way while filling
    // the lattice in row-major (lattice) order.
    let ns_minus_1 = cfg.ns - 1;
    for carrier in 0..cfg.nc {
        for modem_frame in 0..cfg.np {
            for data_row in 0..ns_minus_1 {
                let global_row = modem_frame * cfg.ns + 1 + data_row;
                let idx = modem_frame * ns_minus_1 * cfg.nc + carrier * ns_minus_1 + data_row;
                lattice[[global_row, carrier + 1]] = data_syms[idx];
            }
        }
    }

    for row in 0..rows_per_packet {
        if row % cfg.ns == 0 {
            for (c, &p) in pilot.iter().enumerate() {
                lattice[[row, c]] = p;
            }
        }
    }

    if cfg.dpsk_en {
        for row in 1..rows_per_packet {
            if row % cfg.ns != 0 {
                for col in 1..cols - 1 {
                    let above = lattice[[row - 1, col]];
                    lattice[[row, col]] *= above;
                }
            }
        }
    }

    lattice
}

/// Full Tx contract: lattice -> per-row IDFT+CP -> concatenated packet
/// samples (`Np*Ns*Nss` complex samples), unshaped (Tx shaping, §4.5, is
/// applied by the caller over the whole packet).
pub fn modulate_packet(cfg: &ModeConfig, plan: &DftPlan, data_syms: &[Complex64]) -> Vec<Complex64> {
    let lattice = build_lattice(cfg, data_syms);
    let mut out = Vec::with_capacity(lattice.nrows() * cfg.samples_per_symbol());
    for row in lattice.rows() {
        let row_vec: Vec<Complex64> = row.iter().copied().collect();
        let time = plan.idft(&row_vec);
        out.extend(add_cyclic_prefix(&time, cfg.ncp()));
    }
    out
}

/// Generate one modem frame's worth of preamble/postamble Tx samples from
/// pseudo-random bits at `seed` (spec §6: "generated at construct time by
/// running the modem on pseudo-random bits ... for one modem frame with
/// `amp_scale=1.0` and `tx_bpf=false`; then the full shaping chain is
/// applied at transmit time"). Grounded on `ofdm_generate_preamble`, which
/// clones the mode config with `np=1` and otherwise shapes exactly like a
/// normal packet.
pub fn generate_preamble(cfg: &ModeConfig, plan: &DftPlan, seed: u64) -> Vec<Complex64> {
    let bits = rand_bits_from_seed(seed, cfg.bits_per_frame());
    let data_syms = map_data_symbols(cfg, &bits);
    let pilot = pilot_row(cfg.nc, cfg.edge_pilots);
    let cols = cfg.nc + 2;
    let ns_minus_1 = cfg.ns - 1;

    let mut rows: Vec<Vec<Complex64>> = Vec::with_capacity(cfg.ns);
    rows.push(pilot);
    for data_row in 0..ns_minus_1 {
        let mut row = vec![Complex64::new(0.0, 0.0); cols];
        for carrier in 0..cfg.nc {
            row[carrier + 1] = data_syms[carrier * ns_minus_1 + data_row];
        }
        if cfg.dpsk_en {
            let above = rows.last().unwrap().clone();
            for col in 1..cols - 1 {
                row[col] *= above[col];
            }
        }
        rows.push(row);
    }

    let mut samples = Vec::with_capacity(cfg.ns * cfg.samples_per_symbol());
    for row in &rows {
        let time = plan.idft(row);
        samples.extend(add_cyclic_prefix(&time, cfg.ncp()));
    }

    shape_tx(&samples, 1.0, cfg.clip_en, cfg.clip_gain1, cfg.clip_gain2, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::assemble_bits;

    fn plan_for(cfg: &ModeConfig) -> DftPlan {
        DftPlan::new(cfg.m(), cfg.rs(), cfg.fs, cfg.tx_nlower(), cfg.rx_nlower())
    }

    #[test]
    fn lattice_marks_pilot_rows_with_the_fixed_sequence() {
        let cfg = ModeConfig::for_mode("700D").unwrap();
        let npayload = cfg.bits_per_packet() - cfg.nuwbits - cfg.txtbits;
        let payload = rand_bits_from_seed(1, npayload);
        let txt = vec![0u8; cfg.txtbits];
        let frame = assemble_bits(&cfg, &payload, &txt);
        let syms = map_data_symbols(&cfg, &frame);
        let lattice = build_lattice(&cfg, &syms);
        let pilot = pilot_row(cfg.nc, cfg.edge_pilots);
        assert_eq!(lattice.row(0).to_vec(), pilot);
        assert_eq!(lattice.row(cfg.ns).to_vec(), pilot);
    }

    #[test]
    fn modulate_packet_produces_expected_sample_count() {
        let cfg = ModeConfig::for_mode("700D").unwrap();
        let plan = plan_for(&cfg);
        let npayload = cfg.bits_per_packet() - cfg.nuwbits - cfg.txtbits;
        let payload = rand_bits_from_seed(1, npayload);
        let txt = vec![0u8; cfg.txtbits];
        let frame = assemble_bits(&cfg, &payload, &txt);
        let syms = map_data_symbols(&cfg, &frame);
        let samples = modulate_packet(&cfg, &plan, &syms);
        assert_eq!(samples.len(), cfg.np * cfg.ns * cfg.samples_per_symbol());
    }

    #[test]
    fn dpsk_row_is_multiplied_by_the_row_above() {
        let mut cfg = ModeConfig::for_mode("700D").unwrap();
        cfg.dpsk_en = true;
        let npayload = cfg.bits_per_packet() - cfg.nuwbits - cfg.txtbits;
        let payload = rand_bits_from_seed(1, npayload);
        let txt = vec![0u8; cfg.txtbits];
        let frame = assemble_bits(&cfg, &payload, &txt);
        let syms = map_data_symbols(&cfg, &frame);
        let lattice = build_lattice(&cfg, &syms);
        // With DPSK, every data row has unit-magnitude entries (product of
        // two unit-magnitude QPSK symbols) on the data columns.
        for col in 1..cfg.nc + 1 {
            assert!((lattice[[1, col]].norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn preamble_is_one_modem_frame_long() {
        let cfg = ModeConfig::for_mode("datac0").unwrap();
        let plan = plan_for(&cfg);
        let preamble = generate_preamble(&cfg, &plan, 2);
        assert_eq!(preamble.len(), cfg.samples_per_frame());
    }
}
