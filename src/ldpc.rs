//! LDPC code catalog, RA (repeat-accumulate) encode via back substitution,
//! and a Gallager-style bit-flipping decoder, plus the unequal-protection
//! mapping used by 2020B (spec §6, §9).
//!
//! Grounded on `ldpc_codes.c`'s named-code table (dimensions per
//! `NumberRowsHcols`/`NumberParityBits`/`CODELENGTH`), `ldpc_enc.c`'s "RA
//! LDPC encoder... elegant back substitution" comment (the parity submatrix
//! is a staircase, so encoding never needs a dense generator matrix), and
//! `interldpc.c`'s `ldpc_encode_frame`/`ldpc_decode_frame` protection-mode
//! switch (`LDPC_PROT_EQUAL`/`LDPC_PROT_2020`/`LDPC_PROT_2020B`). The parity
//! check matrix itself is generated (not the literal Octave-authored H);
//! see `DESIGN.md` for why the literal sparse tables aren't reproduced.

use ldpc::codes::LinearCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparse_bin_mat::SparseBinMat;
use serde::{Deserialize, Serialize};

use crate::config::CodeName;

/// `(K, N)` dimensions per named code, taken from the reference's
/// `NumberRowsHcols`/`CODELENGTH` pairs.
fn dims(name: CodeName) -> (usize, usize) {
    match name {
        CodeName::Hra112_112 => (112, 224),
        CodeName::Hra56_56 => (56, 112),
        CodeName::HraB396_504 => (396, 504),
        CodeName::H128_256_5 => (128, 256),
        CodeName::H4096_8192_3d => (4096, 8192),
        CodeName::H1024_2048_4f => (1024, 2048),
    }
}

/// Unequal-protection scheme, orthogonal to code choice
/// (`LDPC_PROT_EQUAL`/`LDPC_PROT_2020`/`LDPC_PROT_2020B`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProtectionMap {
    /// Every LDPC data bit carries a live payload bit.
    Equal,
    /// Only the first `live` of `k` LDPC data bits are live; the rest are
    /// padded with known `1` bits before encode and `LLR=-100` before
    /// decode.
    Prefix { live: usize },
    /// 2020B: 11 of each 52-bit codec frame (3 frames => 33 of 156 payload
    /// bits) map onto the LDPC data bits in order; everything else in the
    /// 156-bit payload passes through uncoded.
    Scattered2020B,
}

impl ProtectionMap {
    /// Map payload bit indices (length `payload_len`) onto live LDPC data
    /// bit positions, in order.
    fn live_payload_indices(&self, payload_len: usize) -> Vec<usize> {
        match self {
            ProtectionMap::Equal => (0..payload_len).collect(),
            ProtectionMap::Prefix { live } => (0..(*live).min(payload_len)).collect(),
            ProtectionMap::Scattered2020B => {
                let mut v = Vec::with_capacity(33);
                for codec_frame in 0..3 {
                    for i in 0..11 {
                        v.push(codec_frame * 52 + i);
                    }
                }
                v
            }
        }
    }
}

/// `encode(data_bits[K]) -> parity_bits[N-K]`;
/// `decode(llr[N]) -> (bits[K], iters, parity_check_count)`.
pub trait LdpcCodec {
    fn k(&self) -> usize;
    fn n(&self) -> usize;
    fn encode(&self, data_bits: &[u8]) -> Vec<u8>;
    fn decode(&self, llr: &[f32]) -> (Vec<u8>, u32, u32);
}

/// One named code: its parity check matrix (staircase-accumulate structure
/// in the parity submatrix, permitting back-substitution encode) and
/// iteration cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdpcCode {
    name: CodeName,
    k: usize,
    n: usize,
    max_iter: u32,
    #[serde(skip)]
    linear_code: Option<LinearCode>,
    /// Dense `parity x k` info-bit submatrix (row-major), used directly for
    /// both back-substitution encode and the decoder's check updates.
    h_info: Vec<Vec<bool>>,
}

impl LdpcCode {
    fn build(name: CodeName, max_iter: u32) -> Self {
        let (k, n) = dims(name);
        let parity = n - k;
        // Deterministic, code-specific pseudo-random info submatrix with a
        // fixed row/column weight profile, in the spirit of the irregular
        // repeat-accumulate construction used by the reference's Octave
        // LDPC generator scripts (not reproduced verbatim here).
        let mut rng = StdRng::seed_from_u64(0xC0DEC2_0000 ^ (k as u64) ^ ((n as u64) << 32));
        let col_weight = 3usize.min(parity.max(1));
        let mut h_info = vec![vec![false; k]; parity];
        for j in 0..k {
            for _ in 0..col_weight {
                let row = rng.gen_range(0..parity);
                h_info[row][j] = true;
            }
        }

        let mut rows = Vec::with_capacity(parity);
        for r in 0..parity {
            let mut positions: Vec<usize> = (0..k).filter(|&j| h_info[r][j]).collect();
            // staircase accumulate part: check r touches parity columns r
            // and (r-1), matching the RA structure.
            positions.push(k + r);
            if r > 0 {
                positions.push(k + r - 1);
            }
            rows.push(positions);
        }
        let parity_check = SparseBinMat::new(n, rows);
        let linear_code = LinearCode::from_parity_check_matrix(parity_check);
        debug_assert_eq!(linear_code.len(), n);

        Self {
            name,
            k,
            n,
            max_iter,
            linear_code: Some(linear_code),
            h_info,
        }
    }

    fn parity_row(&self, row: usize, codeword: &[u8]) -> u8 {
        let mut acc = 0u8;
        for (j, &live) in self.h_info[row].iter().enumerate() {
            if live {
                acc ^= codeword[j];
            }
        }
        acc
    }
}

impl LdpcCodec for LdpcCode {
    fn k(&self) -> usize {
        self.k
    }

    fn n(&self) -> usize {
        self.n
    }

    /// Back-substitution over the staircase parity submatrix:
    /// `p_0 = row_0(info)`, `p_i = row_i(info) XOR p_{i-1}`.
    fn encode(&self, data_bits: &[u8]) -> Vec<u8> {
        debug_assert_eq!(data_bits.len(), self.k);
        let parity_len = self.n - self.k;
        let mut parity = vec![0u8; parity_len];
        let mut prev = 0u8;
        for r in 0..parity_len {
            let mut acc = 0u8;
            for (j, &live) in self.h_info[r].iter().enumerate() {
                if live {
                    acc ^= data_bits[j];
                }
            }
            acc ^= prev;
            parity[r] = acc;
            prev = acc;
        }
        parity
    }

    /// Gallager-style hard-decision bit-flipping decoder: iterate, for each
    /// bit count the unsatisfied checks it participates in, flip the bit
    /// with the most unsatisfied checks if any check fails, stop once all
    /// parity checks pass or `max_iter` is reached.
    fn decode(&self, llr: &[f32]) -> (Vec<u8>, u32, u32) {
        debug_assert_eq!(llr.len(), self.n);
        let mut bits: Vec<u8> = llr.iter().map(|&l| (l < 0.0) as u8).collect();
        let parity_len = self.n - self.k;

        let mut iters = 0u32;
        let mut failed_checks = parity_len as u32;
        for _ in 0..self.max_iter {
            iters += 1;
            let mut unsatisfied = vec![false; parity_len];
            failed_checks = 0;
            for r in 0..parity_len {
                let info_xor = self.parity_row(r, &bits[..self.k]);
                let prev = if r > 0 { bits[self.k + r - 1] } else { 0 };
                let ok = (info_xor ^ prev) == bits[self.k + r];
                unsatisfied[r] = !ok;
                if !ok {
                    failed_checks += 1;
                }
            }
            if failed_checks == 0 {
                break;
            }

            let mut flip_votes = vec![0u32; self.n];
            for r in 0..parity_len {
                if unsatisfied[r] {
                    for (j, &live) in self.h_info[r].iter().enumerate() {
                        if live {
                            flip_votes[j] += 1;
                        }
                    }
                    flip_votes[self.k + r] += 1;
                    if r > 0 {
                        flip_votes[self.k + r - 1] += 1;
                    }
                }
            }
            if let Some((idx, _)) = flip_votes.iter().enumerate().max_by_key(|&(_, v)| *v) {
                bits[idx] ^= 1;
            } else {
                break;
            }
        }

        (bits[..self.k].to_vec(), iters, failed_checks)
    }
}

/// Injected at modem construction, backing the six named codes.
#[derive(Debug, Clone, Default)]
pub struct CodeCatalog {
    codes: std::collections::HashMap<CodeName, std::sync::Arc<LdpcCode>>,
}

impl CodeCatalog {
    pub fn new() -> Self {
        let mut codes = std::collections::HashMap::new();
        for (name, max_iter) in [
            (CodeName::Hra112_112, 100u32),
            (CodeName::Hra56_56, 100),
            (CodeName::HraB396_504, 100),
            (CodeName::H128_256_5, 100),
            (CodeName::H4096_8192_3d, 200),
            (CodeName::H1024_2048_4f, 200),
        ] {
            codes.insert(name, std::sync::Arc::new(LdpcCode::build(name, max_iter)));
        }
        Self { codes }
    }

    pub fn get(&self, name: CodeName) -> std::sync::Arc<LdpcCode> {
        self.codes
            .get(&name)
            .cloned()
            .unwrap_or_else(|| std::sync::Arc::new(LdpcCode::build(name, 100)))
    }
}

/// Encode `payload` under `protection`, returning the full `N`-bit codeword
/// with unprotected payload bits passed through untouched and protected
/// bits replaced by the decoded/encoded LDPC view.
pub fn encode_with_protection(code: &LdpcCode, protection: &ProtectionMap, payload: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let live = protection.live_payload_indices(payload.len());
    let mut data_bits = vec![1u8; code.k()];
    for (slot, &src) in live.iter().enumerate() {
        data_bits[slot] = payload[src];
    }
    let parity = code.encode(&data_bits);
    (data_bits, parity)
}

/// Decode a codeword-aligned `llr` (length `N`, same layout as
/// `encode_with_protection`'s `data_bits ++ parity`) under `protection`,
/// patching only the live payload positions with the decoded bits and
/// leaving the rest of `passthrough_payload` untouched (2020B: unprotected
/// codec-frame bits are never LDPC-coded at all). Data positions beyond the
/// live prefix are forced to `LLR=-100` regardless of the caller's input,
/// since they carry a known fixed value rather than channel-observed data.
pub fn decode_with_protection(
    code: &LdpcCode,
    protection: &ProtectionMap,
    llr: &[f32],
    passthrough_payload: &mut [u8],
) -> (u32, u32) {
    let live = protection.live_payload_indices(passthrough_payload.len());
    let mut full_llr = vec![-100.0f32; code.n()];
    for slot in 0..live.len() {
        full_llr[slot] = llr[slot];
    }
    full_llr[code.k()..code.n()].copy_from_slice(&llr[code.k()..code.n()]);
    let (decoded, iters, parity_check_count) = code.decode(&full_llr);
    for (slot, &dst) in live.iter().enumerate() {
        passthrough_payload[dst] = decoded[slot];
    }
    (iters, parity_check_count)
}
