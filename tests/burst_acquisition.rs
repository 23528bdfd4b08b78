//! Scenarios 2 and 3 (spec §8): burst-mode acquisition. Mode `datac0`/`datac3`
//! reconfigured with `data_mode = DataMode::Burst` so `demodulate`'s CRC check
//! engages, matching how a burst caller would actually run these modes.

mod support;

use ofdm_modem::acquisition::BurstAcquisition;
use ofdm_modem::config::{DataMode, ModeConfig};
use ofdm_modem::packet::rand_bits_from_seed;
use ofdm_modem::OfdmModem;
use support::payload_with_crc16_trailer;

fn burst_mode(name: &str) -> ModeConfig {
    let mut cfg = ModeConfig::for_mode(name).unwrap();
    cfg.data_mode = DataMode::Burst;
    cfg
}

#[test]
fn coarse_preamble_acquisition_recovers_datac0_burst_under_offset() {
    let cfg = burst_mode("datac0");
    let mut modem = OfdmModem::from_config(cfg.clone()).unwrap();

    let npayload = cfg.bits_per_packet() - cfg.nuwbits - cfg.txtbits;
    let data_bits = rand_bits_from_seed(10, npayload - 16);
    let payload = payload_with_crc16_trailer(data_bits);
    let txt = vec![0u8; cfg.txtbits];

    let tx = modem.modulate(&payload, &txt).unwrap();
    let preamble = modem.preamble().to_vec();

    // Search window base (`st` in `sync_search_burst`): history margin of one
    // symbol + one CP + one modem frame ahead of `rxbufst`.
    let st = cfg.m() + cfg.ncp() + cfg.samples_per_frame();

    let mut stream = support::silence(st);
    stream.extend(preamble.iter().copied());
    stream.extend(tx.iter().copied());
    stream.extend(support::silence(2 * cfg.samples_per_frame()));

    let shifted = support::freq_shift(&stream, 23.5, cfg.fs);

    let acquisition = modem.sync_search_burst(&shifted, 0);
    let (ct_est, foff_hz) = match acquisition {
        BurstAcquisition::Preamble { ct_est, foff_hz, .. } => (ct_est, foff_hz),
        other => panic!("expected a preamble hit, got {other:?}"),
    };
    assert!((foff_hz - 23.5).abs() < 1.0, "foff_hz={foff_hz}");

    let packet_start = st + ct_est + preamble.len();
    let rx_packet = &shifted[packet_start..packet_start + tx.len()];
    let (rx_payload, rx_txt, status) = modem.demodulate(rx_packet);

    assert!(status.timing_valid);
    assert_eq!(status.crc_pass, Some(true));
    assert_eq!(rx_payload, payload);
    assert_eq!(rx_txt, txt);
}

#[test]
fn postamble_recovery_finds_datac3_burst_when_preamble_is_missed() {
    let cfg = burst_mode("datac3");
    let mut modem = OfdmModem::from_config(cfg.clone()).unwrap();

    let npayload = cfg.bits_per_packet() - cfg.nuwbits - cfg.txtbits;
    let data_bits = rand_bits_from_seed(11, npayload - 16);
    let payload = payload_with_crc16_trailer(data_bits);
    let txt = vec![0u8; cfg.txtbits];

    let tx = modem.modulate(&payload, &txt).unwrap();
    let preamble = modem.preamble().to_vec();
    let postamble = modem.postamble().to_vec();

    // No leading silence this time: the receiver starts listening 100 samples
    // into the stream, so the first 100 samples of the preamble never arrive.
    let mut full = preamble.clone();
    full.extend(tx.iter().copied());
    full.extend(postamble.iter().copied());
    full.extend(support::silence(2 * cfg.samples_per_frame()));

    const LATE_SAMPLES: usize = 100;
    let rx = full[LATE_SAMPLES..].to_vec();

    let st = cfg.m() + cfg.ncp() + cfg.samples_per_frame();
    let postamble_start_in_rx = preamble.len() + tx.len() - LATE_SAMPLES;
    let rxbufst = postamble_start_in_rx - st;

    let acquisition = modem.sync_search_burst(&rx, rxbufst);
    let (ct_est, foff_hz, rewind) = match acquisition {
        BurstAcquisition::Postamble { ct_est, foff_hz, rxbufst_rewind, .. } => (ct_est, foff_hz, rxbufst_rewind),
        other => panic!("expected a postamble hit (preamble should have been missed), got {other:?}"),
    };
    assert!(foff_hz.abs() < 1.0, "foff_hz={foff_hz}");

    let packet_start = (rxbufst as i64 + st as i64 - rewind) as usize;
    assert_eq!(packet_start, preamble.len() - LATE_SAMPLES);

    let rx_packet = &rx[packet_start..packet_start + tx.len()];
    let (rx_payload, rx_txt, status) = modem.demodulate(rx_packet);

    assert_eq!(status.crc_pass, Some(true));
    assert_eq!(rx_payload, payload);
    assert_eq!(rx_txt, txt);
    let _ = ct_est;
}
