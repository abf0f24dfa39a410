use crate::error::{CliError, Result};
use num_complex::Complex64;
use serde::Deserialize;
use stemsim::core::optics::aberration::Aberration;
use std::path::Path;
use tracing::debug;

/// One aberration term, given either as `magnitude` + `angle-deg` or as
/// `real` + `imag`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileAberration {
    pub name: Option<String>,
    pub n: u32,
    pub m: u32,
    pub magnitude: Option<f64>,
    pub angle_deg: Option<f64>,
    pub real: Option<f64>,
    pub imag: Option<f64>,
}

impl TryFrom<FileAberration> for Aberration {
    type Error = CliError;

    fn try_from(file: FileAberration) -> Result<Self> {
        let label = file
            .name
            .clone()
            .unwrap_or_else(|| format!("C({},{})", file.n, file.m));
        let polar = file.magnitude.is_some() || file.angle_deg.is_some();
        let cartesian = file.real.is_some() || file.imag.is_some();

        let aberration = match (polar, cartesian) {
            (true, true) => {
                return Err(CliError::Config(format!(
                    "aberration '{label}' mixes magnitude/angle-deg with real/imag"
                )));
            }
            (true, false) => Aberration::from_polar(
                file.n,
                file.m,
                file.magnitude.unwrap_or(0.0),
                file.angle_deg.unwrap_or(0.0),
            ),
            (false, _) => Aberration::new(
                file.n,
                file.m,
                Complex64::new(file.real.unwrap_or(0.0), file.imag.unwrap_or(0.0)),
            ),
        };

        Ok(match file.name {
            Some(name) => aberration.named(name),
            None => aberration,
        })
    }
}

/// The config file as written by the user. Every key is optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub voltage_kv: Option<f64>,
    pub max_angle_mrad: Option<f64>,
    pub grid_size: Option<usize>,
    pub aperture_mrad: Option<f64>,
    pub scan_position: Option<[f64; 2]>,
    pub aberrations: Option<Vec<FileAberration>>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn aberrations(&self) -> Result<Option<Vec<Aberration>>> {
        self.aberrations
            .as_ref()
            .map(|list| list.iter().cloned().map(Aberration::try_from).collect())
            .transpose()
    }
}
