use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core_api::{CoreError, CoreErrorCode};

pub const UID_LEN: usize = 7;

/// ISO14443 cascade tag; never a legal SN3 for a single-size UID.
pub const CASCADE_TAG: u8 = 0x88;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid([u8; UID_LEN]);

impl Uid {
    pub fn new(bytes: [u8; UID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let Some(head) = bytes.get(..UID_LEN) else {
            return Err(CoreError::new(
                CoreErrorCode::InsufficientData,
                format!("UID needs {UID_LEN} bytes, got {}", bytes.len()),
            ));
        };
        let mut out = [0u8; UID_LEN];
        out.copy_from_slice(head);
        Ok(Self(out))
    }

    /// Rebuilds the UID from pages 0 and 1 (`page0[0..3] ++ page1[0..4]`).
    pub fn from_pages(page0: &[u8], page1: &[u8]) -> Result<Self, CoreError> {
        let joined: Vec<u8> = page0
            .iter()
            .take(3)
            .chain(page1.iter().take(4))
            .copied()
            .collect();
        Self::from_slice(&joined)
    }

    pub fn sn(&self, index: usize) -> u8 {
        self.0[index]
    }

    pub fn sn3(&self) -> u8 {
        self.0[3]
    }

    pub fn with_sn3(mut self, sn3: u8) -> Self {
        self.0[3] = sn3;
        self
    }

    pub fn has_cascade_collision(&self) -> bool {
        self.sn3() == CASCADE_TAG
    }

    /// Upper-case hex without separators, the form used by UID declarations.
    pub fn to_compact_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn page0_prefix(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn page1(&self) -> [u8; 4] {
        [self.0[3], self.0[4], self.0[5], self.0[6]]
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&spaced_hex(&self.0))
    }
}

/// `[0x04, 0xAB]` -> `"04 AB"`.
pub fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
