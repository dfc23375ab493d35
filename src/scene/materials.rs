//! Material absorption tables with logarithmic interpolation.
//!
//! Each material carries low-frequency absorption control points at 125 and
//! 250 Hz; values between are interpolated log-log and clamped to the
//! boundary values outside the table. Sources for the coefficients:
//! <https://www.acoustic.ua/st/web_absorption_data_eng.pdf>.

/// A named wall material with frequency-dependent reflection behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedMaterial {
    points: Option<[(f64, f64); 2]>,
}

impl SimulatedMaterial {
    /// Look up a material by name. Unknown names fall back to a flat 0.5.
    pub fn from_name(name: &str) -> Self {
        let points = match name {
            "plaster" => Some([(125.0, 0.29), (250.0, 0.1)]),
            "painted_concrete" => Some([(125.0, 0.01), (250.0, 0.01)]),
            "laminate" => Some([(125.0, 0.04), (250.0, 0.04)]),
            "wood" | "hard_wood" => Some([(125.0, 0.1), (250.0, 0.07)]),
            "carpet" => Some([(125.0, 0.1), (250.0, 0.15)]),
            "cellulose" => Some([(125.0, 0.05), (250.0, 0.16)]),
            "metal" => Some([(125.0, 0.35), (250.0, 0.39)]),
            "glass" => Some([(125.0, 0.15), (250.0, 0.05)]),
            _ => None,
        };
        Self { points }
    }

    /// Interpolated coefficient at `frequency` Hz.
    pub fn beta(&self, frequency: f64) -> f64 {
        let Some([(f_low, b_low), (f_high, b_high)]) = self.points else {
            return 0.5;
        };
        let span = (f_high / f_low).ln();
        let t = ((frequency / f_low).ln() / span).clamp(0.0, 1.0);
        (b_low.ln() + t * (b_high.ln() - b_low.ln())).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_points_are_exact() {
        let plaster = SimulatedMaterial::from_name("plaster");
        assert!((plaster.beta(125.0) - 0.29).abs() < 1e-12);
        assert!((plaster.beta(250.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_is_monotone_between_points() {
        let plaster = SimulatedMaterial::from_name("plaster");
        let mid = plaster.beta(176.0);
        assert!(mid < 0.29 && mid > 0.1, "got {mid}");
    }

    #[test]
    fn test_clamped_outside_table() {
        let glass = SimulatedMaterial::from_name("glass");
        assert!((glass.beta(20.0) - 0.15).abs() < 1e-12);
        assert!((glass.beta(1000.0) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_material_defaults() {
        let unknown = SimulatedMaterial::from_name("unobtainium");
        assert_eq!(unknown.beta(125.0), 0.5);
        assert_eq!(unknown.beta(200.0), 0.5);
    }
}
