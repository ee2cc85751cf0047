//! Deterministic shape of the seeded history.
//!
//! The ramp and the seasonal wave are pure functions of the sample offset;
//! only the noise term consumes randomness.

use std::f64::consts::PI;

use rand::Rng;

/// Standard deviation of the water level noise, in meters.
pub const NOISE_STD_DEV: f64 = 0.2;

/// Number of full seasonal periods across the history window.
pub const SEASONAL_PERIODS: f64 = 5.0;

/// Position of offset `i` within a window of `len` samples, in [0, 1].
#[inline]
pub fn window_fraction(i: usize, len: usize) -> f64 {
    if len <= 1 {
        0.0
    } else {
        i as f64 / (len - 1) as f64
    }
}

/// Linear ramp from 0 at the first sample down to -1 at the last.
#[inline]
pub fn trend(i: usize, len: usize) -> f64 {
    -window_fraction(i, len)
}

/// `2 * sin(10π * i/(len-1))`: five full periods across the window.
#[inline]
pub fn seasonal(i: usize, len: usize) -> f64 {
    2.0 * (2.0 * PI * SEASONAL_PERIODS * window_fraction(i, len)).sin()
}

/// Baseline water level of the region at `region_index`.
#[inline]
pub fn base_level(region_index: usize) -> f64 {
    10.0 + (region_index % 3) as f64
}

/// Standard normal sample via the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps ln(u1) finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const H: usize = 720;

    #[test]
    fn trend_spans_zero_to_minus_one() {
        assert_eq!(trend(0, H), 0.0);
        assert_eq!(trend(H - 1, H), -1.0);
        assert!((trend(H / 2, H) + 0.5).abs() < 0.01);
    }

    #[test]
    fn single_sample_window_is_flat() {
        assert_eq!(trend(0, 1), 0.0);
        assert_eq!(seasonal(0, 1), 0.0);
    }

    #[test]
    fn seasonal_completes_exactly_five_periods() {
        // Both window edges sit on a zero of the wave.
        assert_eq!(seasonal(0, H), 0.0);
        assert!(seasonal(H - 1, H).abs() < 1e-9);

        // Each period starts with a rising crossing; the first one is the
        // window start itself, the remaining four lie strictly inside.
        let rising = (1..H - 1)
            .filter(|&i| seasonal(i - 1, H) < 0.0 && seasonal(i, H) >= 0.0)
            .count();
        assert_eq!(rising, 4);
        let falling = (1..H)
            .filter(|&i| seasonal(i - 1, H) > 0.0 && seasonal(i, H) <= 0.0)
            .count();
        assert_eq!(falling, 5);
    }

    #[test]
    fn base_level_cycles_every_three_regions() {
        assert_eq!(base_level(0), 10.0);
        assert_eq!(base_level(1), 11.0);
        assert_eq!(base_level(2), 12.0);
        assert_eq!(base_level(3), 10.0);
    }

    #[test]
    fn box_muller_samples_look_standard() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
        assert!(samples.iter().all(|x| x.is_finite()));
    }
}
