use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{DEFAULT_BIN_WIDTH, DEFAULT_MAX_TOF};
use super::error::ConfigError;
use super::parameters::Overrides;

/// Structure representing the application configuration. Contains pathing, binning and
/// the user overrides of the experiment parameters.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_files: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub mdump_program: String,
    pub bank: String,
    /// TOF bin width in us
    pub bin_width: f64,
    /// Maximum TOF in us. Defaults to the TDC gate width of the run.
    pub max_tof: Option<f64>,
    pub write_dump: bool,
    pub write_positions: bool,
    pub write_sda: bool,
    pub overrides: Overrides,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output_path: PathBuf::from("None"),
            mdump_program: String::from("mdump"),
            bank: String::from("MPET"),
            bin_width: DEFAULT_BIN_WIDTH,
            max_tof: None,
            write_dump: true,
            write_positions: true,
            write_sda: false,
            overrides: Overrides::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Get the path of an output file: the input file stem plus `suffix`, in the output directory
    pub fn get_output_file_name(&self, input: &Path, suffix: &str) -> Result<PathBuf, ConfigError> {
        if !self.is_output_path_valid() {
            return Err(ConfigError::BadFilePath(self.output_path.clone()));
        }
        let stem = input
            .file_stem()
            .ok_or_else(|| ConfigError::BadFilePath(input.to_path_buf()))?;
        Ok(self
            .output_path
            .join(format!("{}{suffix}", stem.to_string_lossy())))
    }

    pub fn is_output_path_valid(&self) -> bool {
        self.output_path.is_dir()
    }

    pub fn is_binning_valid(&self) -> bool {
        self.bin_width > 0.0 && self.max_tof.map_or(true, |tof| tof > 0.0)
    }

    /// The histogram range: the configured maximum, else the TDC gate width, else the default
    pub fn effective_max_tof(&self, tdc_gate_width: Option<f64>) -> f64 {
        self.max_tof
            .or(tdc_gate_width.filter(|w| *w > 0.0))
            .unwrap_or(DEFAULT_MAX_TOF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml() {
        let yaml = "input_files: [run1.mid]\noutput_path: /tmp\nbin_width: 0.05\noverrides:\n  mass: 1K39\n  charge: 2\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.input_files, vec![PathBuf::from("run1.mid")]);
        assert_eq!(config.bin_width, 0.05);
        assert_eq!(config.mdump_program, "mdump");
        assert!(config.write_dump);
        assert!(!config.write_sda);
        assert_eq!(config.overrides.mass.as_deref(), Some("1K39"));
        assert_eq!(config.overrides.charge, Some(2));
        assert_eq!(config.overrides.amplitude, None);

        let round: Config = serde_yaml::from_str(&serde_yaml::to_string(&config).unwrap()).unwrap();
        assert_eq!(round.overrides, config.overrides);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/not/a/config.yaml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_output_names() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(config.is_output_path_valid());
        assert_eq!(
            config
                .get_output_file_name(Path::new("/data/run00042.mid"), "_eva.dat")
                .unwrap(),
            dir.path().join("run00042_eva.dat")
        );
        assert!(Config::default()
            .get_output_file_name(Path::new("run.mid"), "_eva.dat")
            .is_err());
    }

    #[test]
    fn test_max_tof() {
        let mut config = Config::default();
        assert_eq!(config.effective_max_tof(None), 100.0);
        assert_eq!(config.effective_max_tof(Some(50.0)), 50.0);
        config.max_tof = Some(20.0);
        assert_eq!(config.effective_max_tof(Some(50.0)), 20.0);
        assert!(config.is_binning_valid());
        config.bin_width = 0.0;
        assert!(!config.is_binning_valid());
    }
}
