//src/config.rs

use crate::error::{Result, UmiError};

/// Default SAM tag holding the raw UMI of a read.
pub const DEFAULT_UMI_TAG: &str = "RX";

/// Default SAM tag receiving the inferred (consensus) UMI.
pub const DEFAULT_INFERRED_UMI_TAG: &str = "MI";

/// Settings for one UMI-aware pass over a stream of duplicate sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmiConfig {
    /// Largest Hamming distance at which two UMIs are joined into one molecule.
    pub max_edit_distance_to_join: u32,
    /// Tag the observed UMI is read from.
    pub umi_tag: String,
    /// Tag the inferred UMI is written to.
    pub inferred_umi_tag: String,
    /// Keep reads without a UMI (grouped on their own) instead of failing.
    pub allow_missing_umis: bool,
}

impl Default for UmiConfig {
    fn default() -> Self {
        Self {
            max_edit_distance_to_join: 1,
            umi_tag: DEFAULT_UMI_TAG.to_string(),
            inferred_umi_tag: DEFAULT_INFERRED_UMI_TAG.to_string(),
            allow_missing_umis: false,
        }
    }
}

impl UmiConfig {
    pub fn with_max_edit_distance(mut self, distance: u32) -> Self {
        self.max_edit_distance_to_join = distance;
        self
    }

    pub fn with_allow_missing_umis(mut self, allow: bool) -> Self {
        self.allow_missing_umis = allow;
        self
    }

    /// Rejects empty tag names, and an inferred tag that would overwrite the observed one.
    pub fn validate(&self) -> Result<()> {
        if self.umi_tag.is_empty() {
            return Err(UmiError::InvalidParameter {
                parameter: "umi_tag".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.inferred_umi_tag.is_empty() {
            return Err(UmiError::InvalidParameter {
                parameter: "inferred_umi_tag".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.umi_tag == self.inferred_umi_tag {
            return Err(UmiError::InvalidParameter {
                parameter: "inferred_umi_tag".to_string(),
                reason: format!("must differ from the UMI tag '{}'", self.umi_tag),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = UmiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_edit_distance_to_join, 1);
        assert!(!config.allow_missing_umis);
    }

    #[test]
    fn test_same_tags_rejected() {
        let config = UmiConfig { inferred_umi_tag: "RX".to_string(), ..UmiConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            UmiError::InvalidParameter { ref parameter, .. } if parameter == "inferred_umi_tag"
        ));
    }

    #[test]
    fn test_empty_umi_tag_rejected() {
        let config = UmiConfig { umi_tag: String::new(), ..UmiConfig::default() };
        assert!(config.validate().is_err());
    }
}
