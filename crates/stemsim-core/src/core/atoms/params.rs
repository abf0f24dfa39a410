use phf::{Map, phf_map};

/// `amplitude / (k² + width)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LorentzianTerm {
    pub amplitude: f64,
    pub width: f64,
}

/// `amplitude · exp(-rate · k²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianTerm {
    pub amplitude: f64,
    pub rate: f64,
}

/// Electron scattering factor parameterization of one element, with `k` in 1/Å
/// and the amplitude in Å.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatteringParams {
    pub lorentzian: [LorentzianTerm; 3],
    pub gaussian: [GaussianTerm; 3],
}

impl ScatteringParams {
    /// The amplitude in the forward direction, `Σ a/b + Σ c`.
    pub fn forward_amplitude(&self) -> f64 {
        let lorentzian: f64 = self.lorentzian.iter().map(|t| t.amplitude / t.width).sum();
        let gaussian: f64 = self.gaussian.iter().map(|t| t.amplitude).sum();
        lorentzian + gaussian
    }
}

const fn lorentzian(amplitude: f64, width: f64) -> LorentzianTerm {
    LorentzianTerm { amplitude, width }
}

const fn gaussian(amplitude: f64, rate: f64) -> GaussianTerm {
    GaussianTerm { amplitude, rate }
}

static ELEMENT_PARAMS: Map<u8, ScatteringParams> = phf_map! {
    // S
    16u8 => ScatteringParams {
        lorentzian: [
            lorentzian(1.0164691e+00, 1.6918197e+00),
            lorentzian(4.4176674e-01, 1.7418028e-01),
            lorentzian(1.2150386e-01, 1.6701109e+02),
        ],
        gaussian: [
            gaussian(8.2796669e-01, 2.3034282e+00),
            gaussian(2.3302253e-02, 1.5695415e-01),
            gaussian(1.1830285e+00, 5.8578291e+00),
        ],
    },
    // Mo
    42u8 => ScatteringParams {
        lorentzian: [
            lorentzian(6.1016011e-01, 9.1162808e-02),
            lorentzian(1.2654400e+00, 5.0677603e-01),
            lorentzian(1.9742876e+00, 5.8959036e+00),
        ],
        gaussian: [
            gaussian(6.4802897e-01, 1.4663411e+00),
            gaussian(2.6038082e-03, 7.8433631e-03),
            gaussian(1.1388750e-01, 1.5511434e-01),
        ],
    },
};

pub fn element_params(atomic_number: u8) -> Option<&'static ScatteringParams> {
    ELEMENT_PARAMS.get(&atomic_number)
}

pub fn supported_elements() -> impl Iterator<Item = u8> {
    ELEMENT_PARAMS.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_contains_sulfur_and_molybdenum() {
        assert!(element_params(16).is_some());
        assert!(element_params(42).is_some());
        let mut elements: Vec<u8> = supported_elements().collect();
        elements.sort_unstable();
        assert_eq!(elements, vec![16, 42]);
    }

    #[test]
    fn unknown_atomic_number_has_no_entry() {
        assert!(element_params(99).is_none());
        assert!(element_params(0).is_none());
    }

    #[test]
    fn forward_amplitude_grows_with_atomic_number() {
        let sulfur = element_params(16).unwrap().forward_amplitude();
        let molybdenum = element_params(42).unwrap().forward_amplitude();
        assert!(sulfur > 0.0);
        assert!(molybdenum > sulfur);
    }
}
