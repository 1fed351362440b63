use std::collections::HashMap;

use crate::models::{Chain, PositionKind, WalletPosition};

/// Same chain, same kind, same instrument. Identical contracts on two
/// chains are separate holdings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupeKey {
    chain: Chain,
    kind: PositionKind,
    source_id: String,
    symbol: String,
    display_name: String,
}

impl DedupeKey {
    // Internal helper that parses or transforms values for `of`.
    fn of(position: &WalletPosition) -> Self {
        Self {
            chain: position.chain,
            kind: position.position_kind,
            source_id: position.source_id.trim().to_ascii_lowercase(),
            symbol: position.symbol.trim().to_ascii_uppercase(),
            display_name: position.display_name.trim().to_string(),
        }
    }
}

/// Collapses positions that describe the same holding, keeping the one
/// with the larger `valueUsd` (or balance when unpriced). Survivors stay
/// in first-seen order.
pub fn dedupe_positions(positions: Vec<WalletPosition>) -> Vec<WalletPosition> {
    let mut slots: HashMap<DedupeKey, usize> = HashMap::with_capacity(positions.len());
    let mut kept: Vec<WalletPosition> = Vec::with_capacity(positions.len());

    for position in positions {
        let key = DedupeKey::of(&position);
        match slots.get(&key) {
            Some(&index) => {
                if position.weight() > kept[index].weight() {
                    kept[index] = position;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(position);
            }
        }
    }
    kept
}
