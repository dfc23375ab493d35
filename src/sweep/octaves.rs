//! Fractional-octave band centre frequencies.
//!
//! Bands are anchored at 1 kHz with ratio `2^(1/fraction)`, following the
//! standard octave band convention. The default mode covers the requested
//! range, extending at most one band past each edge; `exclusive` keeps all
//! centres strictly inside the range instead.

const CENTRE_FREQUENCY: f64 = 1000.0;

/// Centre frequencies covering `[lower, upper]` Hz at `1/fraction` octave
/// spacing, ascending.
pub fn octave_centre_frequencies(
    lower: f64,
    upper: f64,
    fraction: f64,
    exclusive: bool,
) -> Vec<f64> {
    let factor = 2.0f64.powf(1.0 / fraction);
    let lower_band = fraction * -(lower / CENTRE_FREQUENCY).log2();
    let upper_band = fraction * -(upper / CENTRE_FREQUENCY).log2();
    let start_band = if exclusive {
        lower_band.floor()
    } else {
        lower_band.ceil()
    };
    let end_band = if exclusive {
        upper_band.ceil()
    } else {
        upper_band.floor()
    };

    let count = (start_band - end_band) as i64 + 1;
    let mut current = CENTRE_FREQUENCY * 2.0f64.powf(-start_band / fraction);
    let mut values = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        values.push(current);
        current *= factor;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_and_covering() {
        let fraction = 24.0;
        let factor = 2.0f64.powf(1.0 / fraction);
        let bands = octave_centre_frequencies(20.0, 200.0, fraction, false);

        assert!(!bands.is_empty());
        assert!(bands.windows(2).all(|pair| pair[0] < pair[1]));

        // The edges are covered within one band of slack.
        let first = *bands.first().unwrap();
        let last = *bands.last().unwrap();
        assert!(first <= 20.0 && first * factor > 20.0);
        assert!(last >= 200.0 && last / factor < 200.0);
    }

    #[test]
    fn test_spacing_ratio() {
        let fraction = 24.0;
        let bands = octave_centre_frequencies(20.0, 200.0, fraction, false);
        let factor = 2.0f64.powf(1.0 / fraction);

        for pair in bands.windows(2) {
            assert!((pair[1] / pair[0] - factor).abs() < 1e-9);
        }
    }

    #[test]
    fn test_anchored_at_reference() {
        // 1 kHz itself is a band centre of any fraction covering it.
        let bands = octave_centre_frequencies(500.0, 2000.0, 3.0, false);
        assert!(bands.iter().any(|f| (f - 1000.0).abs() < 1e-9));
    }

    #[test]
    fn test_third_octave_count() {
        // A decade plus the two covering edge bands.
        let bands = octave_centre_frequencies(20.0, 200.0, 3.0, false);
        assert_eq!(bands.len(), 12);
    }

    #[test]
    fn test_exclusive_stays_inside() {
        let inclusive = octave_centre_frequencies(20.0, 200.0, 12.0, false);
        let exclusive = octave_centre_frequencies(20.0, 200.0, 12.0, true);

        assert!(exclusive.len() <= inclusive.len());
        assert!(
            exclusive
                .iter()
                .all(|&f| (20.0..=200.0).contains(&f))
        );
    }
}
