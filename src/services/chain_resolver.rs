use thiserror::Error;

use crate::error::AppError;
use crate::models::chain::{alias_members, AddressKind, ALL_CHAINS};
use crate::models::Chain;

/// Which address forms the caller supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressAvailability {
    pub has_evm: bool,
    pub has_platform: bool,
    /// Whether Tron may be scanned through the EVM-derived address.
    pub tron_from_evm: bool,
}

impl AddressAvailability {
    pub fn supports(&self, chain: Chain) -> bool {
        match chain.required_address() {
            AddressKind::Evm => self.has_evm,
            AddressKind::TronFromEvm => self.has_evm && self.tron_from_evm,
            AddressKind::Platform => self.has_platform,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown chain selector '{0}'")]
    UnknownSelector(String),

    #[error("{chain} requires {requirement}")]
    MissingAddress {
        chain: Chain,
        requirement: &'static str,
    },

    #[error("no chain in '{0}' can be scanned with the supplied addresses")]
    NothingScannable(String),
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        AppError::UnsupportedChain(err.to_string())
    }
}

// Internal helper that supports `requirement_label` operations.
fn requirement_label(kind: AddressKind) -> &'static str {
    match kind {
        AddressKind::Evm => "an EVM address",
        AddressKind::TronFromEvm => "an EVM address with Tron derivation enabled",
        AddressKind::Platform => "a P-Chain address",
    }
}

/// Maps a chain selector to the ordered, de-duplicated chains to scan.
///
/// Accepts `auto`/`all`, an explicit chain id or an alias. Chains whose
/// address kind is unavailable are dropped for `auto` and aliases, and
/// rejected for an explicit chain.
pub fn resolve_chains(
    selector: &str,
    availability: AddressAvailability,
) -> Result<Vec<Chain>, ResolveError> {
    let normalized = selector.trim().to_ascii_lowercase();
    let normalized = if normalized.is_empty() {
        "auto".to_string()
    } else {
        normalized
    };

    if normalized == "auto" || normalized == "all" {
        let chains: Vec<Chain> = ALL_CHAINS
            .iter()
            .copied()
            .filter(|chain| availability.supports(*chain))
            .collect();
        if chains.is_empty() {
            return Err(ResolveError::NothingScannable(normalized));
        }
        return Ok(chains);
    }

    if let Some(chain) = Chain::from_id(&normalized) {
        if !availability.supports(chain) {
            return Err(ResolveError::MissingAddress {
                chain,
                requirement: requirement_label(chain.required_address()),
            });
        }
        return Ok(vec![chain]);
    }

    let members = alias_members(&normalized)
        .ok_or_else(|| ResolveError::UnknownSelector(selector.trim().to_string()))?;
    let mut chains: Vec<Chain> = Vec::with_capacity(members.len());
    for chain in members {
        if availability.supports(*chain) && !chains.contains(chain) {
            chains.push(*chain);
        }
    }
    if chains.is_empty() {
        return Err(ResolveError::NothingScannable(normalized));
    }
    Ok(chains)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM_ONLY: AddressAvailability = AddressAvailability {
        has_evm: true,
        has_platform: false,
        tron_from_evm: true,
    };

    const PLATFORM_ONLY: AddressAvailability = AddressAvailability {
        has_evm: false,
        has_platform: true,
        tron_from_evm: true,
    };

    #[test]
    fn auto_with_evm_only_excludes_platform_chain() {
        let chains = resolve_chains("auto", EVM_ONLY).unwrap();
        assert!(!chains.contains(&Chain::AvalancheP));
        assert_eq!(chains.len(), ALL_CHAINS.len() - 1);
        assert!(chains.contains(&Chain::Tron));
    }

    #[test]
    fn auto_with_platform_only_is_p_chain() {
        assert_eq!(resolve_chains("all", PLATFORM_ONLY).unwrap(), vec![Chain::AvalancheP]);
    }

    #[test]
    fn auto_with_both_scans_everything() {
        let both = AddressAvailability {
            has_platform: true,
            ..EVM_ONLY
        };
        assert_eq!(resolve_chains("", both).unwrap(), ALL_CHAINS.to_vec());
    }

    #[test]
    fn explicit_p_chain_without_platform_address_is_unsupported() {
        let err = resolve_chains("avalanche-p", EVM_ONLY).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingAddress {
                chain: Chain::AvalancheP,
                ..
            }
        ));
        assert!(matches!(AppError::from(err), AppError::UnsupportedChain(_)));
    }

    #[test]
    fn alias_members_are_filtered_by_availability() {
        assert_eq!(resolve_chains("AVAX", EVM_ONLY).unwrap(), vec![Chain::AvalancheC]);
        assert_eq!(resolve_chains("p-chain", PLATFORM_ONLY).unwrap(), vec![Chain::AvalancheP]);
        assert!(matches!(
            resolve_chains("evm", PLATFORM_ONLY),
            Err(ResolveError::NothingScannable(_))
        ));
    }

    #[test]
    fn tron_follows_derivation_flag() {
        let no_tron = AddressAvailability {
            tron_from_evm: false,
            ..EVM_ONLY
        };
        assert!(!resolve_chains("auto", no_tron).unwrap().contains(&Chain::Tron));
        assert!(resolve_chains("tron", no_tron).is_err());
        assert_eq!(resolve_chains("trx", EVM_ONLY).unwrap(), vec![Chain::Tron]);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        assert_eq!(
            resolve_chains(" solana ", EVM_ONLY),
            Err(ResolveError::UnknownSelector("solana".to_string()))
        );
    }
}
