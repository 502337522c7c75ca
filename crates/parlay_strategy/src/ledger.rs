//! Allocation ledger threaded through one construction pass.

use std::collections::{HashMap, HashSet};

use common::{ConfidenceResult, PropId};

use crate::parlay::signature_of;

/// Props, players and leg sets already committed to emitted parlays.
///
/// Only updated once a candidate is fully assembled, so a discarded partial
/// never consumes anything. One ledger spans every size in a pass, so a leg
/// set emitted at one size is remembered by later builds too.
#[derive(Debug, Clone)]
pub struct AllocationLedger {
    prop_uses: HashMap<PropId, u32>,
    player_uses: HashMap<String, u32>,
    emitted: HashSet<Vec<PropId>>,
    max_player_uses: u32,
    allow_prop_reuse: bool,
}

impl AllocationLedger {
    pub fn new(max_player_uses: u32, allow_prop_reuse: bool) -> Self {
        Self {
            prop_uses: HashMap::new(),
            player_uses: HashMap::new(),
            emitted: HashSet::new(),
            max_player_uses,
            allow_prop_reuse,
        }
    }

    pub fn max_player_uses(&self) -> u32 {
        self.max_player_uses
    }

    pub fn player_uses(&self, player: &str) -> u32 {
        self.player_uses.get(player).copied().unwrap_or(0)
    }

    pub fn prop_uses(&self, id: &PropId) -> u32 {
        self.prop_uses.get(id).copied().unwrap_or(0)
    }

    pub fn is_prop_used(&self, id: &PropId) -> bool {
        self.prop_uses.contains_key(id)
    }

    /// Whether a parlay with this sorted leg signature was already committed.
    pub fn has_emitted(&self, signature: &[PropId]) -> bool {
        self.emitted.contains(signature)
    }

    /// Whether `leg` may go into another parlay under the prop and player caps.
    pub fn is_available(&self, leg: &ConfidenceResult) -> bool {
        if !self.allow_prop_reuse && self.is_prop_used(&leg.prop.id()) {
            return false;
        }
        self.player_uses(&leg.prop.player) < self.max_player_uses
    }

    /// Record an emitted parlay.
    pub fn commit(&mut self, legs: &[ConfidenceResult]) {
        for leg in legs {
            *self.prop_uses.entry(leg.prop.id()).or_insert(0) += 1;
            *self.player_uses.entry(leg.prop.player.clone()).or_insert(0) += 1;
        }
        self.emitted.insert(signature_of(legs));
    }

    pub fn used_prop_count(&self) -> usize {
        self.prop_uses.len()
    }
}
