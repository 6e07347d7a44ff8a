/*
 * This modules contains the `AgreementConfig` struct, which implements the default trait. This
 * config can be passed to the `*_conf` variants of the agreement functions to simplify their
 * arguments.
*/
use crate::matcher::PropertyFilter;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Display;

/// Minimum IoU used when none is given.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
/// The configuration could not be built.
pub enum ConfigError {
    /// The threshold is not a number in `[0, 1]`.
    InvalidThreshold(f64),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidThreshold(t) => write!(
                f,
                "Invalid overlap threshold: {}. Expected a number between 0 and 1",
                t
            ),
        }
    }
}

impl Error for ConfigError {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Config struct used to simplify the inputs of the agreement functions. It implements the default
/// trait.
pub struct AgreementConfig {
    /// Minimum intersection over union for two spans to be counted as the same annotation. Lower
    /// values tolerate looser selections.
    threshold: f64,
    /// Which properties must agree, on top of the label, for two spans to match.
    property_filter: PropertyFilter,
}

impl AgreementConfig {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
    pub fn property_filter(&self) -> &PropertyFilter {
        &self.property_filter
    }
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            property_filter: PropertyFilter::Ignore,
        }
    }
}

impl Display for AgreementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Overlap threshold: {}\n Properties compared: {}",
            self.threshold, self.property_filter
        )
    }
}

impl TryFrom<AgreementConfigBuilder> for AgreementConfig {
    type Error = ConfigError;
    fn try_from(value: AgreementConfigBuilder) -> Result<Self, Self::Error> {
        let threshold = value.threshold.into_inner();
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            property_filter: value.property_filter,
        })
    }
}

/// This builder can be used to build and customize an `AgreementConfig` structure.
///
/// #Example
/// ```rust
/// use deidrev::{AgreementConfigBuilder, PropertyFilter};
///
/// let config = AgreementConfigBuilder::new()
///     .threshold(0.3)
///     .require_properties(["TYPE"])
///     .build()
///     .unwrap();
/// assert_eq!(config.threshold(), 0.3);
/// assert_eq!(config.property_filter(), &PropertyFilter::only(["TYPE"]));
///
/// assert!(AgreementConfigBuilder::new().threshold(1.5).build().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct AgreementConfigBuilder {
    /// Left when set explicitly, right when still the default.
    threshold: LeftOrRight<f64, f64>,
    property_filter: PropertyFilter,
}

impl Default for AgreementConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgreementConfigBuilder {
    pub fn new() -> Self {
        Self {
            threshold: LeftOrRight::Right(DEFAULT_THRESHOLD),
            property_filter: PropertyFilter::Ignore,
        }
    }
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = LeftOrRight::Left(threshold);
        self
    }
    pub fn property_filter(mut self, property_filter: PropertyFilter) -> Self {
        self.property_filter = property_filter;
        self
    }
    /// Shortcut for `property_filter(PropertyFilter::Only(keys))`.
    pub fn require_properties<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_filter(PropertyFilter::only(keys))
    }
    /// Was the threshold set explicitly?
    pub fn has_explicit_threshold(&self) -> bool {
        self.threshold.is_left()
    }
    pub fn build(self) -> Result<AgreementConfig, ConfigError> {
        AgreementConfig::try_from(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(0.3)]
    #[case(0.5)]
    #[case(1.0)]
    fn test_builder_setters_threshold(#[case] threshold: f64) {
        let builder = AgreementConfigBuilder::default().threshold(threshold);
        assert!(builder.has_explicit_threshold());
        let config = builder.build().unwrap();
        assert_eq!(config.threshold, threshold)
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.01)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_builder_rejects_threshold(#[case] threshold: f64) {
        let err = AgreementConfigBuilder::default()
            .threshold(threshold)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold(_)));
    }

    #[rstest]
    #[case(PropertyFilter::Ignore)]
    #[case(PropertyFilter::All)]
    #[case(PropertyFilter::only(["TYPE", "COMMENT"]))]
    fn test_builder_setters_property_filter(#[case] filter: PropertyFilter) {
        let config = AgreementConfigBuilder::default()
            .property_filter(filter.clone())
            .build()
            .unwrap();
        assert_eq!(config.property_filter, filter)
    }

    #[test]
    fn test_builder_defaults_match_config_default() {
        let builder = AgreementConfigBuilder::new();
        assert!(!builder.has_explicit_threshold());
        assert_eq!(builder.build().unwrap(), AgreementConfig::default());
    }

    #[test]
    fn test_config_display() {
        let config = AgreementConfig::default();
        assert_eq!(
            config.to_string(),
            "Overlap threshold: 0.5\n Properties compared: ignored"
        );
    }
}
