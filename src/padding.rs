//! Padding policy
//!
//! Decides the allocated extent of every node axis. Padding changes strides
//! and buffer size only; logical indexing is the same under both policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{config_error, invalid_shape, LayoutError, LayoutResult};

/// How declared extents are rounded when a node block is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Round every extent up to the next power of two
    #[default]
    #[serde(alias = "pow2", alias = "default")]
    PowerOfTwoPad,
    /// Allocate exactly the declared extent
    Packed,
}

impl PaddingPolicy {
    /// Allocated extent for a declared extent
    pub fn padded_extent(self, extent: usize) -> LayoutResult<usize> {
        match self {
            PaddingPolicy::Packed => Ok(extent),
            PaddingPolicy::PowerOfTwoPad => extent.checked_next_power_of_two().ok_or_else(|| {
                invalid_shape(format!("extent {} has no power-of-two padding in usize", extent))
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PaddingPolicy::PowerOfTwoPad => "power_of_two_pad",
            PaddingPolicy::Packed => "packed",
        }
    }
}

impl fmt::Display for PaddingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaddingPolicy {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "power_of_two_pad" | "pow2" | "default" => Ok(PaddingPolicy::PowerOfTwoPad),
            "packed" => Ok(PaddingPolicy::Packed),
            other => Err(config_error(format!("unknown padding policy `{}`", other))),
        }
    }
}

/// Select the padding policy for every tree finalized from now on.
/// Trees that are already finalized keep the policy they were built with.
pub fn set_padding_policy(policy: PaddingPolicy) {
    config::update(|cfg| cfg.padding = policy);
    log::info!("[Padding] Process-wide padding policy set to {}", policy);
}

/// The process-wide padding policy
pub fn padding_policy() -> PaddingPolicy {
    config::active().padding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_rounding() {
        let pad = PaddingPolicy::PowerOfTwoPad;
        assert_eq!(pad.padded_extent(1).unwrap(), 1);
        assert_eq!(pad.padded_extent(18).unwrap(), 32);
        assert_eq!(pad.padded_extent(65).unwrap(), 128);
        assert_eq!(pad.padded_extent(64).unwrap(), 64);
        assert!(pad.padded_extent(usize::MAX).is_err());
    }

    #[test]
    fn test_packed_is_exact() {
        assert_eq!(PaddingPolicy::Packed.padded_extent(18).unwrap(), 18);
        assert_eq!(PaddingPolicy::Packed.padded_extent(65).unwrap(), 65);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("pow2".parse::<PaddingPolicy>().unwrap(), PaddingPolicy::PowerOfTwoPad);
        assert_eq!("Packed".parse::<PaddingPolicy>().unwrap(), PaddingPolicy::Packed);
        assert!("tight".parse::<PaddingPolicy>().is_err());
        assert_eq!(PaddingPolicy::default(), PaddingPolicy::PowerOfTwoPad);
    }
}
