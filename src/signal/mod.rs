//! Signal module - Impulse and steady-state source generators.
//!
//! A generator maps `(time, iteration)` to a scalar pressure sample (Pa).
//! Generators are pure: the same inputs always produce the same sample, so a
//! simulation reset replays identically. A generator may return NaN to mean
//! "no injection this step".

use std::f64::consts::PI;

/// Source signal generator, dispatched over the supported waveform kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalGenerator {
    /// Continuous sine wave at `frequency` Hz.
    Sinusoid { frequency: f64 },
    /// Gaussian-modulated cosine pulse with fractional `bandwidth` and the
    /// envelope level (dB) at which the band edges are defined.
    GaussianModulatedCosine {
        frequency: f64,
        bandwidth: f64,
        cutoff_db: f64,
    },
    /// Single odd-symmetric Gaussian monopulse centred after one envelope
    /// delay.
    GaussianMonopulse { frequency: f64 },
    /// Sine burst shaped by a Hann window of `width` seconds.
    HannSinusoid { frequency: f64, width: f64 },
    /// Unit impulse at the first iteration.
    Dirac,
}

impl SignalGenerator {
    /// Sinusoid at the given frequency.
    pub fn sinusoid(frequency: f64) -> Self {
        Self::Sinusoid { frequency }
    }

    /// Gaussian-modulated cosine with the conventional 50% fractional
    /// bandwidth measured at -6 dB.
    pub fn gaussian_modulated_cosine(frequency: f64) -> Self {
        Self::GaussianModulatedCosine {
            frequency,
            bandwidth: 0.5,
            cutoff_db: -6.0,
        }
    }

    /// Gaussian monopulse at the given centre frequency.
    pub fn gaussian_monopulse(frequency: f64) -> Self {
        Self::GaussianMonopulse { frequency }
    }

    /// Hann-windowed sinusoid; the window spans `width` seconds from t = 0.
    pub fn hann_sinusoid(frequency: f64, width: f64) -> Self {
        Self::HannSinusoid { frequency, width }
    }

    /// Produce the sample for the given simulation time and iteration.
    pub fn generate(&self, time: f64, iteration: u64) -> f64 {
        match *self {
            Self::Sinusoid { frequency } => (2.0 * PI * frequency * time).sin(),
            Self::GaussianModulatedCosine {
                frequency,
                bandwidth,
                cutoff_db,
            } => gaussian_modulated_cosine(time, frequency, bandwidth, cutoff_db),
            Self::GaussianMonopulse { frequency } => gaussian_monopulse(time, frequency),
            Self::HannSinusoid { frequency, width } => {
                if time < 0.0 || time > width {
                    return 0.0;
                }
                let window = 0.5 * (1.0 - (2.0 * PI * time / width).cos());
                (2.0 * PI * frequency * time).sin() * window
            }
            Self::Dirac => {
                if iteration == 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Envelope decay constant for a Gaussian pulse with fractional `bandwidth`
/// measured `cutoff_db` below the peak.
fn gaussian_envelope_decay(frequency: f64, bandwidth: f64, cutoff_db: f64) -> f64 {
    let reference = 10.0f64.powf(cutoff_db / 20.0);
    let half_band = PI * frequency * bandwidth;
    -(half_band * half_band) / (4.0 * reference.ln())
}

fn gaussian_modulated_cosine(time: f64, frequency: f64, bandwidth: f64, cutoff_db: f64) -> f64 {
    let decay = gaussian_envelope_decay(frequency, bandwidth, cutoff_db);
    // Delay so the envelope has fallen to -60 dB at t = 0.
    let tail = 10.0f64.powf(-60.0 / 20.0);
    let delay = (-tail.ln() / decay).sqrt();
    let t = time - delay;
    (-decay * t * t).exp() * (2.0 * PI * frequency * t).cos()
}

fn gaussian_monopulse(time: f64, frequency: f64) -> f64 {
    let t = time - 2.0 / frequency;
    let arg = PI * frequency * t;
    2.0 * 1.0f64.exp().sqrt() * arg * (-2.0 * arg * arg).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinusoid_period() {
        let generator = SignalGenerator::sinusoid(100.0);

        assert!(generator.generate(0.0, 0).abs() < 1e-12);
        assert!((generator.generate(0.0025, 1) - 1.0).abs() < 1e-12);
        assert!(generator.generate(0.005, 2).abs() < 1e-9);
    }

    #[test]
    fn test_dirac_only_first_iteration() {
        let generator = SignalGenerator::Dirac;

        assert_eq!(generator.generate(0.0, 0), 1.0);
        assert_eq!(generator.generate(0.001, 1), 0.0);
        assert_eq!(generator.generate(1.0, 44100), 0.0);
    }

    #[test]
    fn test_gaussian_pulse_starts_quiet_and_peaks() {
        let generator = SignalGenerator::gaussian_modulated_cosine(100.0);

        // Envelope is delayed so injection ramps in from near silence.
        assert!(generator.generate(0.0, 0).abs() < 1.5e-3);

        let mut peak: f64 = 0.0;
        for i in 0..10_000 {
            let t = i as f64 * 1e-5;
            peak = peak.max(generator.generate(t, i).abs());
        }
        assert!(peak > 0.9, "pulse never reached full swing, peak {peak}");
    }

    #[test]
    fn test_monopulse_is_odd_around_centre() {
        let generator = SignalGenerator::gaussian_monopulse(100.0);
        let centre = 2.0 / 100.0;

        assert!(generator.generate(centre, 0).abs() < 1e-12);
        let before = generator.generate(centre - 1e-3, 0);
        let after = generator.generate(centre + 1e-3, 0);
        assert!((before + after).abs() < 1e-9);
        assert!(after > 0.0);
    }

    #[test]
    fn test_hann_burst_bounded_by_window() {
        let generator = SignalGenerator::hann_sinusoid(50.0, 0.1);

        assert_eq!(generator.generate(-0.01, 0), 0.0);
        assert_eq!(generator.generate(0.0, 0), 0.0);
        assert_eq!(generator.generate(0.11, 123), 0.0);
        assert!(generator.generate(0.045, 10).abs() > 0.0);
    }

    #[test]
    fn test_generators_are_pure() {
        let generator = SignalGenerator::gaussian_modulated_cosine(80.0);

        let a = generator.generate(0.0123, 99);
        let b = generator.generate(0.0123, 99);
        assert_eq!(a, b);
    }
}
