//! Convolution configuration.
//!
//! All fields are checked when the configuration is built or deserialized,
//! so a [`ConvolutionConfig`] value is always within bounds.

use crate::core::error::{ConfigError, ParameterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Smallest accepted layer count.
pub const MIN_LAYERS: u32 = 1;
/// Largest accepted layer count.
pub const MAX_LAYERS: u32 = 1000;
/// Default layer count.
pub const DEFAULT_LAYERS: u32 = 5;
/// Smallest accepted cluster distance.
pub const MIN_CLUSTER: u32 = 1;
/// Largest accepted cluster distance.
pub const MAX_CLUSTER: u32 = 100;
/// Default cluster distance.
pub const DEFAULT_CLUSTER: u32 = 1;

/// Arithmetic used to evaluate a convolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionMode {
    /// Exact convolution with a rounded integer mask
    #[default]
    Integer,
    /// Exact convolution with a floating point mask
    Float,
    /// Layered approximation of a floating point mask
    Approximate,
}

impl PrecisionMode {
    /// All precision modes.
    pub const ALL: [PrecisionMode; 3] = [
        PrecisionMode::Integer,
        PrecisionMode::Float,
        PrecisionMode::Approximate,
    ];

    /// Lowercase name as used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrecisionMode::Integer => "integer",
            PrecisionMode::Float => "float",
            PrecisionMode::Approximate => "approximate",
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrecisionMode {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(PrecisionMode::Integer),
            "float" => Ok(PrecisionMode::Float),
            "approximate" | "approx" => Ok(PrecisionMode::Approximate),
            _ => Err(ParameterError::UnknownPrecision(s.to_string())),
        }
    }
}

/// Tuning for the approximate kernel.
///
/// More layers give a closer approximation at higher cost. A smaller cluster
/// distance keeps lines apart, which is more accurate but slower and uses
/// more memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "RawApproximation")]
pub struct ApproximationParams {
    layers: u32,
    cluster: u32,
}

#[derive(Deserialize)]
struct RawApproximation {
    #[serde(default = "default_layers")]
    layers: u32,
    #[serde(default = "default_cluster")]
    cluster: u32,
}

fn default_layers() -> u32 {
    DEFAULT_LAYERS
}

fn default_cluster() -> u32 {
    DEFAULT_CLUSTER
}

impl TryFrom<RawApproximation> for ApproximationParams {
    type Error = ParameterError;

    fn try_from(raw: RawApproximation) -> Result<Self, Self::Error> {
        Self::new(raw.layers, raw.cluster)
    }
}

impl ApproximationParams {
    /// Create validated parameters.
    pub fn new(layers: u32, cluster: u32) -> Result<Self, ParameterError> {
        if !(MIN_LAYERS..=MAX_LAYERS).contains(&layers) {
            return Err(ParameterError::LayersOutOfRange {
                value: layers,
                min: MIN_LAYERS,
                max: MAX_LAYERS,
            });
        }
        if !(MIN_CLUSTER..=MAX_CLUSTER).contains(&cluster) {
            return Err(ParameterError::ClusterOutOfRange {
                value: cluster,
                min: MIN_CLUSTER,
                max: MAX_CLUSTER,
            });
        }
        Ok(Self { layers, cluster })
    }

    /// Number of quantisation layers.
    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Largest gap merged into one line.
    pub fn cluster(&self) -> u32 {
        self.cluster
    }
}

impl Default for ApproximationParams {
    fn default() -> Self {
        Self {
            layers: DEFAULT_LAYERS,
            cluster: DEFAULT_CLUSTER,
        }
    }
}

/// Complete convolution configuration.
///
/// TOML form:
///
/// ```toml
/// precision = "approximate"
/// layers = 10
/// cluster = 2
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConvolutionConfig {
    /// Arithmetic to use
    #[serde(default)]
    pub precision: PrecisionMode,
    /// Approximation tuning, only used by [`PrecisionMode::Approximate`]
    #[serde(flatten)]
    pub approximation: ApproximationParams,
}

impl ConvolutionConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ConvolutionConfigBuilder {
        ConvolutionConfigBuilder::default()
    }

    /// Create a configuration, validating the approximation parameters.
    pub fn new(precision: PrecisionMode, layers: u32, cluster: u32) -> Result<Self, ParameterError> {
        Ok(Self {
            precision,
            approximation: ApproximationParams::new(layers, cluster)?,
        })
    }

    /// Default configuration with the given precision.
    pub fn with_precision(precision: PrecisionMode) -> Self {
        Self {
            precision,
            approximation: ApproximationParams::default(),
        }
    }

    /// Parse a TOML document.
    ///
    /// Malformed TOML is a [`ConfigError::Toml`]; well-formed values outside
    /// their bounds are a [`ConfigError::Parameter`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        Ok(Self::new(file.precision, file.layers, file.cluster)?)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Unvalidated contents of a configuration file.
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    precision: PrecisionMode,
    #[serde(default = "default_layers")]
    layers: u32,
    #[serde(default = "default_cluster")]
    cluster: u32,
}

/// Builder for [`ConvolutionConfig`]; bounds are checked in [`build`](Self::build).
#[derive(Debug, Clone, Copy)]
pub struct ConvolutionConfigBuilder {
    precision: PrecisionMode,
    layers: u32,
    cluster: u32,
}

impl Default for ConvolutionConfigBuilder {
    fn default() -> Self {
        Self {
            precision: PrecisionMode::default(),
            layers: DEFAULT_LAYERS,
            cluster: DEFAULT_CLUSTER,
        }
    }
}

impl ConvolutionConfigBuilder {
    /// Set the precision.
    pub fn precision(mut self, precision: PrecisionMode) -> Self {
        self.precision = precision;
        self
    }

    /// Set the approximation layer count.
    pub fn layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    /// Set the approximation cluster distance.
    pub fn cluster(mut self, cluster: u32) -> Self {
        self.cluster = cluster;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ConvolutionConfig, ParameterError> {
        ConvolutionConfig::new(self.precision, self.layers, self.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConvolutionConfig::default();
        assert_eq!(config.precision, PrecisionMode::Integer);
        assert_eq!(config.approximation.layers(), 5);
        assert_eq!(config.approximation.cluster(), 1);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(ApproximationParams::new(1, 1).is_ok());
        assert!(ApproximationParams::new(1000, 100).is_ok());
        assert!(matches!(
            ApproximationParams::new(0, 1),
            Err(ParameterError::LayersOutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            ApproximationParams::new(1001, 1),
            Err(ParameterError::LayersOutOfRange { value: 1001, .. })
        ));
        assert!(matches!(
            ApproximationParams::new(5, 0),
            Err(ParameterError::ClusterOutOfRange { .. })
        ));
        assert!(matches!(
            ApproximationParams::new(5, 101),
            Err(ParameterError::ClusterOutOfRange { .. })
        ));
    }

    #[test]
    fn test_precision_parsing() {
        assert_eq!("float".parse::<PrecisionMode>().unwrap(), PrecisionMode::Float);
        assert_eq!("APPROX".parse::<PrecisionMode>().unwrap(), PrecisionMode::Approximate);
        assert!("double".parse::<PrecisionMode>().is_err());
        for mode in PrecisionMode::ALL {
            assert_eq!(mode.as_str().parse::<PrecisionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_builder_validates() {
        let config = ConvolutionConfig::builder()
            .precision(PrecisionMode::Approximate)
            .layers(12)
            .cluster(3)
            .build()
            .unwrap();
        assert_eq!(config.approximation.layers(), 12);
        assert_eq!(config.approximation.cluster(), 3);

        assert!(ConvolutionConfig::builder().layers(0).build().is_err());
    }

    #[test]
    fn test_toml_config() {
        let config = ConvolutionConfig::from_toml_str(
            "precision = \"approximate\"\nlayers = 10\ncluster = 2\n",
        )
        .unwrap();
        assert_eq!(config.precision, PrecisionMode::Approximate);
        assert_eq!(config.approximation.layers(), 10);

        let config = ConvolutionConfig::from_toml_str("precision = \"float\"\n").unwrap();
        assert_eq!(config.approximation, ApproximationParams::default());

        assert!(matches!(
            ConvolutionConfig::from_toml_str("layers = 2000\n"),
            Err(ConfigError::Parameter(ParameterError::LayersOutOfRange { value: 2000, .. }))
        ));
        assert!(matches!(
            ConvolutionConfig::from_toml_str("cluster = 0\n"),
            Err(ConfigError::Parameter(ParameterError::ClusterOutOfRange { value: 0, .. }))
        ));
        assert!(matches!(
            ConvolutionConfig::from_toml_str("precision = \"double\"\n"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            ConvolutionConfig::from_toml_str("layers = \"many\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_json_rejects_out_of_range() {
        assert!(serde_json::from_str::<ConvolutionConfig>(r#"{"layers": 0}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "precision = \"integer\"").unwrap();
        writeln!(file, "cluster = 4").unwrap();

        let config = ConvolutionConfig::load(file.path()).unwrap();
        assert_eq!(config.precision, PrecisionMode::Integer);
        assert_eq!(config.approximation.cluster(), 4);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ConvolutionConfig::new(PrecisionMode::Float, 7, 9).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ConvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    proptest! {
        #[test]
        fn prop_layers_accepted_iff_in_range(layers in 0u32..2000, cluster in 0u32..200) {
            let ok = (1..=1000).contains(&layers) && (1..=100).contains(&cluster);
            prop_assert_eq!(ApproximationParams::new(layers, cluster).is_ok(), ok);
        }
    }
}
