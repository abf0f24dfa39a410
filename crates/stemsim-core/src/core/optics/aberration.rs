use num_complex::Complex64;

/// One term of the probe aberration expansion: radial order `n`, azimuthal
/// order `m`, and a complex coefficient (Å) whose real part multiplies
/// `cos(mφ)` and imaginary part `sin(mφ)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aberration {
    pub n: u32,
    pub m: u32,
    pub coefficient: Complex64,
    pub name: Option<String>,
}

impl Aberration {
    pub fn new(n: u32, m: u32, coefficient: Complex64) -> Self {
        Self {
            n,
            m,
            coefficient,
            name: None,
        }
    }

    /// Builds the coefficient from a magnitude (Å) and an orientation angle in
    /// degrees.
    pub fn from_polar(n: u32, m: u32, magnitude: f64, angle_deg: f64) -> Self {
        Self::new(n, m, Complex64::from_polar(magnitude, angle_deg.to_radians()))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn defocus(value: f64) -> Self {
        Self::new(1, 0, Complex64::new(value, 0.0)).named("Defocus")
    }

    pub fn magnitude(&self) -> f64 {
        self.coefficient.norm()
    }

    pub fn angle_deg(&self) -> f64 {
        self.coefficient.arg().to_degrees()
    }

    pub fn with_magnitude(&self, magnitude: f64) -> Self {
        Self {
            coefficient: Complex64::from_polar(magnitude, self.coefficient.arg()),
            ..self.clone()
        }
    }

    pub fn with_angle_deg(&self, angle_deg: f64) -> Self {
        Self {
            coefficient: Complex64::from_polar(self.magnitude(), angle_deg.to_radians()),
            ..self.clone()
        }
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("C({},{})", self.n, self.m),
        }
    }
}

/// The editable aberration set an interactive session starts from.
pub fn default_aberrations() -> Vec<Aberration> {
    vec![
        Aberration::defocus(1000.0),
        Aberration::new(1, 2, Complex64::new(0.0, 0.0)).named("Astigmatism"),
        Aberration::new(2, 1, Complex64::new(0.0, 0.0)).named("Coma"),
        Aberration::new(3, 0, Complex64::new(0.0, 0.0)).named("Spherical"),
    ]
}
