//! Dictionary metadata and packed marker codes.

use std::{fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::matcher::min_rotation_distance;

/// Largest supported marker side (bits must fit into a `u64`).
pub const MAX_MARKER_SIZE: usize = 8;

/// Errors produced while building or loading a dictionary.
#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown built-in dictionary {name:?}")]
    UnknownBuiltin { name: String },
    #[error("dictionary {name:?} has no codes")]
    Empty { name: String },
    #[error("marker size {marker_size} unsupported (expected 2..={max})", max = MAX_MARKER_SIZE)]
    UnsupportedSize { marker_size: usize },
    #[error("code {code:#x} for id {id} does not fit in {bits} bits")]
    CodeOutOfRange { id: usize, code: u64, bits: usize },
}

/// A fixed ArUco-style dictionary.
///
/// The code table is shared (`Arc`) so cloning a dictionary is cheap and every
/// detector built from it reads the same immutable data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dictionary {
    /// Human-readable name (for logging and reports).
    pub name: String,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Maximum error-correcting Hamming distance supported by the dictionary.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bits are stored in row-major order with **black = 1**.
    pub codes: Arc<[u64]>,
}

/// On-disk JSON form of a dictionary.
///
/// `max_correction_bits` is derived from the codes when omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DictionaryFile {
    pub name: String,
    pub marker_size: usize,
    #[serde(default)]
    pub max_correction_bits: Option<u8>,
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Build a dictionary, deriving `max_correction_bits` from the minimum
    /// rotation-aware Hamming distance between codes.
    pub fn new(
        name: impl Into<String>,
        marker_size: usize,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        let name = name.into();
        validate_codes(&name, marker_size, &codes)?;
        let min_dist = min_rotation_distance(&codes, marker_size);
        Ok(Self {
            name,
            marker_size,
            max_correction_bits: correction_bits_for(min_dist),
            codes: codes.into(),
        })
    }

    /// Build a dictionary with an explicit correction capability.
    pub fn with_correction_bits(
        name: impl Into<String>,
        marker_size: usize,
        max_correction_bits: u8,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        let name = name.into();
        validate_codes(&name, marker_size, &codes)?;
        Ok(Self {
            name,
            marker_size,
            max_correction_bits,
            codes: codes.into(),
        })
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    /// Number of marker ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Load a dictionary from its JSON form.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let raw = fs::read_to_string(path)?;
        let file: DictionaryFile = serde_json::from_str(&raw)?;
        Self::try_from(file)
    }

    /// Write this dictionary to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DictionaryError> {
        let json = serde_json::to_string_pretty(&self.to_file())?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn to_file(&self) -> DictionaryFile {
        DictionaryFile {
            name: self.name.clone(),
            marker_size: self.marker_size,
            max_correction_bits: Some(self.max_correction_bits),
            codes: self.codes.to_vec(),
        }
    }
}

impl TryFrom<DictionaryFile> for Dictionary {
    type Error = DictionaryError;

    fn try_from(file: DictionaryFile) -> Result<Self, Self::Error> {
        match file.max_correction_bits {
            Some(bits) => Self::with_correction_bits(file.name, file.marker_size, bits, file.codes),
            None => Self::new(file.name, file.marker_size, file.codes),
        }
    }
}

/// `(d - 1) / 2` bit errors are always correctable when codes are `d` apart.
pub(crate) fn correction_bits_for(min_distance: u32) -> u8 {
    (min_distance.saturating_sub(1) / 2).min(u8::MAX as u32) as u8
}

fn validate_codes(name: &str, marker_size: usize, codes: &[u64]) -> Result<(), DictionaryError> {
    if !(2..=MAX_MARKER_SIZE).contains(&marker_size) {
        return Err(DictionaryError::UnsupportedSize { marker_size });
    }
    if codes.is_empty() {
        return Err(DictionaryError::Empty {
            name: name.to_string(),
        });
    }
    let bits = marker_size * marker_size;
    if bits < 64 {
        if let Some((id, &code)) = codes.iter().enumerate().find(|(_, &c)| c >> bits != 0) {
            return Err(DictionaryError::CodeOutOfRange { id, code, bits });
        }
    }
    Ok(())
}
