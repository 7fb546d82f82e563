//! Discovered screens and the transitions between them.

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::ActionKind;

/// Arena index of a discovered screen. Ids start at 1.
pub type ScreenId = u64;

/// Perceptual hash of a captured screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub Vec<u8>);

impl Fingerprint {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of hash bits.
    pub fn bits(&self) -> u32 {
        (self.0.len() * 8) as u32
    }

    /// Hamming distance. Bytes present in only one of the hashes count as
    /// fully different.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        let common: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let extra = self.0.len().abs_diff(other.0.len()) as u32 * 8;
        common + extra
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A discovered UI state. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,
    pub fingerprint: Fingerprint,
    /// Structural hint such as the foreground activity name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub first_seen_session: String,
    pub first_seen_step: u32,
}

/// Edge of the screen graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub from: ScreenId,
    pub to: ScreenId,
    pub action: ActionKind,
}

/// Set when the same screen keeps coming back without navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckState {
    pub reason: String,
    pub screen_id: ScreenId,
    pub consecutive_visits: u32,
}

impl StuckState {
    pub fn new(screen_id: ScreenId, consecutive_visits: u32) -> Self {
        Self {
            reason: format!(
                "screen {} visited {} times in a row without navigation",
                screen_id, consecutive_visits
            ),
            screen_id,
            consecutive_visits,
        }
    }
}
