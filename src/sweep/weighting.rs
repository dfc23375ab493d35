//! A-weighting curve, normalised to 0 dB at 1 kHz.

/// Unnormalised A-weighting transfer magnitude.
fn reference_a_weighting(frequency: f64) -> f64 {
    let f2 = frequency * frequency;
    let f4 = f2 * f2;
    let numerator = 12194.0f64.powi(2) * f4;
    let sqrt_part = ((f2 + 107.7f64.powi(2)) * (f2 + 737.9f64.powi(2))).sqrt();
    let denominator = (f2 + 20.6f64.powi(2)) * (f2 + 12194.0f64.powi(2)) * sqrt_part;
    numerator / denominator
}

/// A-weighting correction in dB at `frequency` Hz.
pub fn a_weighting(frequency: f64) -> f64 {
    let reference = 20.0 * reference_a_weighting(1000.0).log10();
    20.0 * reference_a_weighting(frequency).log10() - reference
}
