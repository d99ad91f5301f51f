//! Code matching against a dictionary, in all four rotations.

use std::collections::HashMap;

use crate::Dictionary;

/// Result of looking up one observed code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub id: u32,
    /// Quarter turns with `observed == rotate_code_u64(codes[id], n, rotation)`.
    pub rotation: u8,
    /// Bits that differ after rotation.
    pub hamming: u8,
}

/// Matcher for a fixed dictionary.
///
/// Exact observations hit a hash table of all rotated codes; anything else
/// falls back to a scan over ids and rotations, which for typical dictionary
/// sizes (<=1000) is cheap next to the image work around it.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
    exact: HashMap<u64, (u32, u8)>,
}

impl Matcher {
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated: Vec<[u64; 4]> = dict
            .codes
            .iter()
            .map(|&base| {
                [
                    rotate_code_u64(base, n, 0),
                    rotate_code_u64(base, n, 1),
                    rotate_code_u64(base, n, 2),
                    rotate_code_u64(base, n, 3),
                ]
            })
            .collect();

        let mut exact = HashMap::with_capacity(rotated.len() * 4);
        for (id, rots) in rotated.iter().enumerate() {
            for (rot, &code) in rots.iter().enumerate() {
                // First writer wins so the lowest id / rotation is reported.
                exact.entry(code).or_insert((id as u32, rot as u8));
            }
        }

        Self {
            dict,
            max_hamming,
            rotated,
            exact,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Find the best match within `max_hamming`.
    ///
    /// Ties on distance resolve to the lowest id, then the lowest rotation.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        if let Some(&(id, rotation)) = self.exact.get(&observed) {
            return Some(Match {
                id,
                rotation,
                hamming: 0,
            });
        }
        if self.max_hamming == 0 {
            return None;
        }

        let mut best: Option<Match> = None;
        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.map_or(true, |prev| h < prev.hamming) {
                    best = Some(Match {
                        id: id as u32,
                        rotation: rot as u8,
                        hamming: h,
                    });
                }
            }
        }
        best
    }
}

/// Rotate an `n x n` row-major code (bit `y * n + x`) clockwise by `rot`
/// quarter turns.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    (0..rot & 3).fold(code, |c, _| quarter_turn(c, n))
}

// The cell at (x, y) moves to (n-1-y, x).
fn quarter_turn(code: u64, n: usize) -> u64 {
    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            if (code >> (y * n + x)) & 1 == 1 {
                out |= 1 << (x * n + (n - 1 - y));
            }
        }
    }
    out
}

/// Smallest Hamming distance between `code` and its own non-trivial rotations.
pub fn self_rotation_distance(code: u64, n: usize) -> u32 {
    (1..4)
        .map(|r| (code ^ rotate_code_u64(code, n, r)).count_ones())
        .min()
        .unwrap_or(0)
}

/// Minimum rotation-aware Hamming distance of a code set.
///
/// Covers both the distance between distinct codes (any rotation) and each
/// code against its own rotations.
pub fn min_rotation_distance(codes: &[u64], n: usize) -> u32 {
    let mut min = u32::MAX;
    for (i, &a) in codes.iter().enumerate() {
        min = min.min(self_rotation_distance(a, n));
        for &b in &codes[i + 1..] {
            for r in 0..4 {
                min = min.min((a ^ rotate_code_u64(b, n, r)).count_ones());
            }
        }
    }
    if min == u32::MAX {
        0
    } else {
        min
    }
}
