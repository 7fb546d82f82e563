//! Screen fingerprinting and deduplication.
//!
//! Screens are identified by a 64-bit perceptual hash (mean hash over a DCT
//! of the downscaled image). Two captures whose hashes differ by at most
//! [`SIMILARITY_THRESHOLD`] bits are the same screen. The threshold is fixed
//! so dedup behaves identically across sessions.
//!
//! Screens and transitions live in an arena ([`ScreenGraph`]) and reference
//! each other by [`ScreenId`] only.

use std::collections::HashSet;

use image_hasher::{HashAlg, HasherConfig};
use tracing::debug;

use visicrawl_protocols::{ActionKind, Fingerprint, Screen, ScreenId, Screenshot, Transition};

use crate::error::IdentityError;

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

/// Maximum Hamming distance for two fingerprints to denote the same screen.
pub const SIMILARITY_THRESHOLD: u32 = 5;

/// Compute the perceptual fingerprint of an encoded image.
pub fn compute_fingerprint(data: &[u8]) -> Result<Fingerprint, IdentityError> {
    let img = image::load_from_memory(data).map_err(|e| IdentityError::Decode(e.to_string()))?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .hash_size(8, 8)
        .to_hasher();

    let hash = hasher.hash_image(&img);
    Ok(Fingerprint::from_bytes(hash.as_bytes().to_vec()))
}

/// Arena of discovered screens and the transitions between them.
#[derive(Debug, Default)]
pub struct ScreenGraph {
    screens: Vec<Screen>,
    transitions: Vec<Transition>,
    seen_transitions: HashSet<Transition>,
}

impl ScreenGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn get(&self, id: ScreenId) -> Option<&Screen> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.screens.get(index)
    }

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Screens reachable from `id` by one recorded transition.
    pub fn successors(&self, id: ScreenId) -> Vec<ScreenId> {
        let mut out: Vec<ScreenId> = self
            .transitions
            .iter()
            .filter(|t| t.from == id)
            .map(|t| t.to)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Closest known screen and its distance. Ties go to the lowest id.
    pub fn closest(&self, fingerprint: &Fingerprint) -> Option<(ScreenId, u32)> {
        let mut best: Option<(ScreenId, u32)> = None;
        for screen in &self.screens {
            let distance = screen.fingerprint.distance(fingerprint);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((screen.id, distance));
            }
        }
        best
    }

    fn insert(
        &mut self,
        fingerprint: Fingerprint,
        label: Option<String>,
        session_id: &str,
        step: u32,
    ) -> &Screen {
        let id = self.screens.len() as ScreenId + 1;
        self.screens.push(Screen {
            id,
            fingerprint,
            label,
            first_seen_session: session_id.to_string(),
            first_seen_step: step,
        });
        &self.screens[self.screens.len() - 1]
    }

    /// Record an edge. Returns `false` when it was already known.
    fn add_transition(&mut self, transition: Transition) -> bool {
        if !self.seen_transitions.insert(transition) {
            return false;
        }
        self.transitions.push(transition);
        true
    }
}

/// Result of resolving a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub screen: Screen,
    pub is_new: bool,
    /// Distance to the matched screen; 0 for new screens.
    pub distance: u32,
}

/// Screen deduplication over one session's arena.
#[derive(Debug, Default)]
pub struct ScreenIdentity {
    graph: ScreenGraph,
}

impl ScreenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &ScreenGraph {
        &self.graph
    }

    /// Fingerprint a screenshot on the blocking pool.
    pub async fn fingerprint(&self, screenshot: &Screenshot) -> Result<Fingerprint, IdentityError> {
        let data = screenshot.data.clone();
        tokio::task::spawn_blocking(move || compute_fingerprint(&data))
            .await
            .map_err(|e| IdentityError::Task(e.to_string()))?
    }

    /// Return the known screen within tolerance, or register a new one.
    pub fn resolve(
        &mut self,
        fingerprint: Fingerprint,
        label: Option<String>,
        session_id: &str,
        step: u32,
    ) -> Resolution {
        if let Some((id, distance)) = self.graph.closest(&fingerprint) {
            if distance <= SIMILARITY_THRESHOLD {
                if let Some(screen) = self.graph.get(id) {
                    debug!(screen_id = id, distance, "Screen dedup hit");
                    return Resolution {
                        screen: screen.clone(),
                        is_new: false,
                        distance,
                    };
                }
            }
        }

        let screen = self.graph.insert(fingerprint, label, session_id, step).clone();
        debug!(screen_id = screen.id, "New screen registered");
        Resolution {
            screen,
            is_new: true,
            distance: 0,
        }
    }

    /// Record `from -> to` via `action`. Returns `false` for a known edge.
    pub fn record_transition(&mut self, from: ScreenId, to: ScreenId, action: ActionKind) -> bool {
        self.graph.add_transition(Transition { from, to, action })
    }
}
