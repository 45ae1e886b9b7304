//! Liability-scale correction for binary-trait heritability.
//!
//! Converts an observed-scale estimate to the liability scale using the
//! realized-threshold transformation of Lee et al. (2011):
//!   h2_l = h2_o * K^2 (1-K)^2 / (z^2 * P (1-P))
//! where K is the population prevalence, P the sample ascertainment, and
//! z the standard normal density at the liability threshold.

use anyhow::{ensure, Result};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Correct an observed-scale heritability estimate for prevalence and
/// case/control ascertainment.
pub fn observed_space_correct(h2: f64, prevalence: f64, ascertainment: f64) -> Result<f64> {
    ensure!(
        prevalence > 0.0 && prevalence < 1.0,
        "prevalence must lie in (0, 1), got {prevalence}"
    );
    ensure!(
        ascertainment > 0.0 && ascertainment < 1.0,
        "ascertainment must lie in (0, 1), got {ascertainment}"
    );

    let norm = Normal::new(0.0, 1.0).unwrap();
    // Liability threshold t with P(liability > t) = K
    let t = norm.inverse_cdf(1.0 - prevalence);
    let z = norm.pdf(t);

    let k = prevalence;
    let p = ascertainment;
    let factor = k * k * (1.0 - k) * (1.0 - k) / (z * z * p * (1.0 - p));
    Ok(h2 * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_half_prevalence_factor_is_half_pi() {
        // K = P = 0.5: factor = (1/16) / (phi(0)^2 / 4) = pi/2
        let corrected = observed_space_correct(1.0, 0.5, 0.5).unwrap();
        assert!(
            (corrected - std::f64::consts::FRAC_PI_2).abs() < 1e-10,
            "factor: {}",
            corrected
        );
    }

    #[test]
    fn test_zero_maps_to_zero() {
        let corrected = observed_space_correct(0.0, 0.1, 0.4).unwrap();
        assert_eq!(corrected, 0.0);
    }

    #[test]
    fn test_scales_linearly_in_h2() {
        let a = observed_space_correct(0.2, 0.05, 0.5).unwrap();
        let b = observed_space_correct(0.4, 0.05, 0.5).unwrap();
        assert!((b - 2.0 * a).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_prevalence_rejected() {
        assert!(observed_space_correct(0.5, 0.0, 0.5).is_err());
        assert!(observed_space_correct(0.5, 1.0, 0.5).is_err());
        assert!(observed_space_correct(0.5, 0.1, 0.0).is_err());
    }

    #[test]
    fn test_rare_trait_factor_exceeds_one_without_ascertainment() {
        // P = K = 0.01: factor reduces to K(1-K)/z^2, about 13.9
        let corrected = observed_space_correct(0.1, 0.01, 0.01).unwrap();
        assert!(corrected > 0.1, "corrected: {}", corrected);
    }

    #[test]
    fn test_case_oversampling_shrinks_the_factor() {
        // Enriching cases (P >> K) inflates the observed-scale estimate,
        // so the corrected value must come out smaller.
        let no_ascert = observed_space_correct(0.1, 0.01, 0.01).unwrap();
        let oversampled = observed_space_correct(0.1, 0.01, 0.5).unwrap();
        assert!(oversampled < no_ascert);
    }
}
