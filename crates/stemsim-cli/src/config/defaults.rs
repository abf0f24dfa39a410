use stemsim::core::optics::aberration::Aberration;
use stemsim::engine::config::SimulationParameters;

/// Values used for every setting that neither the command line nor the
/// config file provides.
pub struct DefaultsConfig {
    pub voltage_kv: f64,
    pub max_angle_mrad: f64,
    pub grid_shape: [usize; 2],
    pub aperture_mrad: f64,
    pub scan_position: [f64; 2],
    pub aberrations: Vec<Aberration>,
}

impl From<SimulationParameters> for DefaultsConfig {
    fn from(params: SimulationParameters) -> Self {
        Self {
            voltage_kv: params.voltage_kv,
            max_angle_mrad: params.max_angle_mrad,
            grid_shape: params.grid_shape,
            aperture_mrad: params.aperture_mrad,
            scan_position: params.scan_position,
            aberrations: params.aberrations,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        SimulationParameters::default().into()
    }
}
