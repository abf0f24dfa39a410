use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use crate::cli::ParameterOverrides;
use crate::error::{CliError, Result};
use stemsim::engine::config::SimulationParameters;
use tracing::debug;

/// Resolves every parameter as command line > config file > defaults.
pub fn build_parameters(overrides: &ParameterOverrides) -> Result<SimulationParameters> {
    let file_config = match &overrides.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    merge(overrides, file_config, DefaultsConfig::default())
}

fn merge(
    overrides: &ParameterOverrides,
    file_config: FileConfig,
    defaults: DefaultsConfig,
) -> Result<SimulationParameters> {
    let aberrations = file_config
        .aberrations()?
        .unwrap_or(defaults.aberrations);
    let grid_shape = overrides
        .grid
        .or(file_config.grid_size)
        .map_or(defaults.grid_shape, |n| [n, n]);

    let params = SimulationParameters::builder()
        .voltage_kv(
            overrides
                .voltage
                .or(file_config.voltage_kv)
                .unwrap_or(defaults.voltage_kv),
        )
        .max_angle_mrad(
            overrides
                .max_angle
                .or(file_config.max_angle_mrad)
                .unwrap_or(defaults.max_angle_mrad),
        )
        .grid_shape(grid_shape)
        .aperture_mrad(
            overrides
                .aperture
                .or(file_config.aperture_mrad)
                .unwrap_or(defaults.aperture_mrad),
        )
        .aberrations(aberrations)
        .scan_position(
            overrides
                .scan
                .or(file_config.scan_position)
                .unwrap_or(defaults.scan_position),
        )
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    debug!("Resolved simulation parameters: {:?}", params);
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let params = build_parameters(&ParameterOverrides::default()).unwrap();
        assert_eq!(params, SimulationParameters::default());
    }

    #[test]
    fn command_line_overrides_file_which_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stemsim.toml");
        fs::write(
            &path,
            "voltage-kv = 300.0\ngrid-size = 64\naperture-mrad = 25.0\n",
        )
        .unwrap();

        let overrides = ParameterOverrides {
            config: Some(path),
            aperture: Some(10.0),
            ..Default::default()
        };
        let params = build_parameters(&overrides).unwrap();

        assert_eq!(params.voltage_kv, 300.0);
        assert_eq!(params.grid_shape, [64, 64]);
        assert_eq!(params.aperture_mrad, 10.0);
        assert_eq!(params.max_angle_mrad, 50.0);
        assert_eq!(params.aberrations.len(), 4);
    }

    #[test]
    fn aberrations_from_the_file_replace_the_default_list() {
        let file_config = FileConfig::from_toml(
            "[[aberrations]]\nname = \"Spherical\"\nn = 3\nm = 0\nreal = 1e4\n",
        )
        .unwrap();
        let params = merge(
            &ParameterOverrides::default(),
            file_config,
            DefaultsConfig::default(),
        )
        .unwrap();
        assert_eq!(params.aberrations.len(), 1);
        assert_eq!(params.aberrations[0].label(), "Spherical");
    }

    #[test]
    fn out_of_range_values_are_configuration_errors() {
        let overrides = ParameterOverrides {
            voltage: Some(-5.0),
            ..Default::default()
        };
        let err = build_parameters(&overrides).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("voltage_kv"), "{err}");
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let overrides = ParameterOverrides {
            config: Some("/definitely/not/here.toml".into()),
            ..Default::default()
        };
        assert!(matches!(
            build_parameters(&overrides),
            Err(CliError::Io(_))
        ));
    }
}
