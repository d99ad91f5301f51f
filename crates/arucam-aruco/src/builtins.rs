//! Built-in dictionaries.
//!
//! `DICT_4X4_50` and `DICT_4X4_100` are the OpenCV ArUco tables, embedded
//! from `data/DICT_4X4_100.json` (the 50-id table is its prefix). Bit
//! `y * 4 + x` holds inner cell `(x, y)`, black = 1.
//!
//! Generated families are named `GEN_{N}X{N}_{COUNT}` with `N` in `4..=7` and `COUNT`
//! in `{50, 100, 250, 1000}`. Codes are produced by a seeded greedy search
//! that maximizes the rotation-aware Hamming distance: a random candidate is
//! accepted when it is at least `tau` away from every accepted code (and from
//! its own rotations). After a run of unproductive attempts the best candidate
//! seen so far is taken and `tau` drops to its distance.
//!
//! The seed depends only on the marker size, so `GEN_6X6_50` is the first 50
//! codes of `GEN_6X6_250`. Each family is generated once per process.
//!
//! Generated tables are not OpenCV's. Other OpenCV dictionaries load from
//! JSON with [`Dictionary::load_json`].

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dictionary::correction_bits_for;
use crate::matcher::rotate_code_u64;
use crate::{Dictionary, DictionaryFile};

/// Default dictionary used by the live loop and the CLI.
pub const DEFAULT_DICTIONARY: &str = "GEN_6X6_250";

const SIZES: [usize; 4] = [4, 5, 6, 7];
const COUNTS: [usize; 4] = [50, 100, 250, 1000];
const MAX_UNPRODUCTIVE: u32 = 1000;
const SEED_BASE: u64 = 0x4152_5543_414d_0000;

const ARUCO_4X4_JSON: &str = include_str!("../data/DICT_4X4_100.json");

/// Embedded tables as `(name, id count)`, all cut from `ARUCO_4X4_JSON`.
const EMBEDDED: [(&str, usize); 2] = [("DICT_4X4_50", 50), ("DICT_4X4_100", 100)];

/// All built-in dictionary names.
pub const BUILTIN_NAMES: [&str; 18] = [
    "DICT_4X4_50",
    "DICT_4X4_100",
    "GEN_4X4_50",
    "GEN_4X4_100",
    "GEN_4X4_250",
    "GEN_4X4_1000",
    "GEN_5X5_50",
    "GEN_5X5_100",
    "GEN_5X5_250",
    "GEN_5X5_1000",
    "GEN_6X6_50",
    "GEN_6X6_100",
    "GEN_6X6_250",
    "GEN_6X6_1000",
    "GEN_7X7_50",
    "GEN_7X7_100",
    "GEN_7X7_250",
    "GEN_7X7_1000",
];

static TABLES: [OnceLock<Option<Dictionary>>; 2] = [const { OnceLock::new() }; 2];
static FAMILIES: [OnceLock<Dictionary>; 16] = [const { OnceLock::new() }; 16];

/// Look up a built-in dictionary by name (case-insensitive).
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    let slot = BUILTIN_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(name))?;
    match slot.checked_sub(EMBEDDED.len()) {
        None => embedded(slot),
        Some(slot) => Some(generated(slot)),
    }
}

fn embedded(slot: usize) -> Option<Dictionary> {
    let (name, count) = EMBEDDED[slot];
    TABLES[slot]
        .get_or_init(|| {
            let parsed = serde_json::from_str::<DictionaryFile>(ARUCO_4X4_JSON)
                .map_err(crate::DictionaryError::from)
                .and_then(|mut file| {
                    file.name = name.to_string();
                    file.codes.truncate(count);
                    Dictionary::try_from(file)
                });
            match parsed {
                Ok(dict) => Some(dict),
                Err(e) => {
                    log::error!("embedded dictionary {name} is unusable: {e}");
                    None
                }
            }
        })
        .clone()
}

fn generated(slot: usize) -> Dictionary {
    let name = BUILTIN_NAMES[slot + EMBEDDED.len()];
    let marker_size = SIZES[slot / COUNTS.len()];
    let count = COUNTS[slot % COUNTS.len()];
    let dict = FAMILIES[slot].get_or_init(|| {
        let (codes, min_distance) = generate_codes(marker_size, count);
        log::debug!(
            "generated {} ({} codes, min distance {})",
            name,
            codes.len(),
            min_distance
        );
        Dictionary {
            name: name.to_string(),
            marker_size,
            max_correction_bits: correction_bits_for(min_distance),
            codes: codes.into(),
        }
    });
    dict.clone()
}

/// Greedy generation; returns the codes and their rotation-aware minimum
/// Hamming distance.
fn generate_codes(marker_size: usize, count: usize) -> (Vec<u64>, u32) {
    let n = marker_size;
    let bits = n * n;
    let c = (bits / 4) as u32;
    let mut tau = 2 * (c * 4 / 3);

    let mut rng = StdRng::seed_from_u64(SEED_BASE + n as u64);
    let mut accepted: Vec<[u64; 4]> = Vec::with_capacity(count);
    let mut min_distance = u32::MAX;

    let mut unproductive = 0u32;
    let mut best: Option<(u64, u32)> = None;

    while accepted.len() < count {
        let candidate = random_code(&mut rng, bits);
        let d = distance_to_set(candidate, n, &accepted);

        if d >= tau && d > 0 {
            push_rotations(&mut accepted, candidate, n);
            min_distance = min_distance.min(d);
            unproductive = 0;
            best = None;
            continue;
        }

        unproductive += 1;
        if d > best.map_or(0, |(_, bd)| bd) {
            best = Some((candidate, d));
        }
        if unproductive >= MAX_UNPRODUCTIVE {
            unproductive = 0;
            if let Some((code, bd)) = best.take() {
                tau = bd;
                push_rotations(&mut accepted, code, n);
                min_distance = min_distance.min(bd);
            }
        }
    }

    let codes = accepted.iter().map(|r| r[0]).collect();
    (codes, if min_distance == u32::MAX { 0 } else { min_distance })
}

fn random_code(rng: &mut StdRng, bits: usize) -> u64 {
    let raw: u64 = rng.gen();
    if bits >= 64 {
        raw
    } else {
        raw & ((1u64 << bits) - 1)
    }
}

fn push_rotations(accepted: &mut Vec<[u64; 4]>, code: u64, n: usize) {
    accepted.push([
        code,
        rotate_code_u64(code, n, 1),
        rotate_code_u64(code, n, 2),
        rotate_code_u64(code, n, 3),
    ]);
}

fn distance_to_set(code: u64, n: usize, accepted: &[[u64; 4]]) -> u32 {
    let mut d = (1..4)
        .map(|r| (code ^ rotate_code_u64(code, n, r)).count_ones())
        .min()
        .unwrap_or(0);
    for rots in accepted {
        for &other in rots {
            d = d.min((code ^ other).count_ones());
        }
        if d == 0 {
            break;
        }
    }
    d
}
