//! Heart-rate zone classification and distribution.
//!
//! Zones are Karvonen-style: thresholds are percentages of heart-rate
//! reserve (max minus resting), parameterized by the athlete's profile.
//!
//! ## Example
//! ```rust
//! use track_engine::zones::HrZoneConfig;
//!
//! let config = HrZoneConfig::from_profile(190, 50).unwrap();
//! assert_eq!(config.zone_for(140), 2);
//! ```

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Result, TrackEngineError};

/// Configuration for heart-rate zone classification.
///
/// Thresholds are fractions of heart-rate reserve marking the upper edge of
/// zones 1-4; zone 5 is everything at or above the last threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrZoneConfig {
    /// Maximum heart rate in bpm
    pub max_hr: u16,
    /// Resting heart rate in bpm
    pub resting_hr: u16,
    /// Reserve fractions [Z1 max, Z2 max, Z3 max, Z4 max]
    pub zone_thresholds: [f32; 4],
}

impl HrZoneConfig {
    /// Create a config from an athlete profile using the standard 5-zone
    /// Karvonen thresholds (60/70/80/90% of reserve).
    pub fn from_profile(max_hr: u16, resting_hr: u16) -> Result<Self> {
        Self::with_thresholds(max_hr, resting_hr, [0.60, 0.70, 0.80, 0.90])
    }

    /// Create a config with custom reserve thresholds.
    pub fn with_thresholds(max_hr: u16, resting_hr: u16, thresholds: [f32; 4]) -> Result<Self> {
        if max_hr <= resting_hr {
            return Err(TrackEngineError::InvalidHeartRateProfile { max_hr, resting_hr });
        }
        Ok(Self {
            max_hr,
            resting_hr,
            zone_thresholds: thresholds,
        })
    }

    /// Fraction of heart-rate reserve a reading represents, clamped at 0
    /// for readings below resting.
    pub fn reserve_fraction(&self, hr: u16) -> f32 {
        let reserve = (self.max_hr - self.resting_hr) as f32;
        (hr.saturating_sub(self.resting_hr) as f32 / reserve).max(0.0)
    }

    /// Determine which zone a heart-rate reading falls into (1-5).
    pub fn zone_for(&self, hr: u16) -> u8 {
        let fraction = self.reserve_fraction(hr);
        for (i, &threshold) in self.zone_thresholds.iter().enumerate() {
            if fraction < threshold {
                return (i + 1) as u8;
            }
        }
        5
    }
}

impl Default for HrZoneConfig {
    fn default() -> Self {
        Self {
            max_hr: 185,
            resting_hr: 60,
            zone_thresholds: [0.60, 0.70, 0.80, 0.90],
        }
    }
}

/// Result of heart-rate zone distribution calculation.
///
/// Counts cover measured samples only; sensor dropouts (None readings) are
/// excluded from both counts and averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrZoneDistribution {
    /// Measured (non-null) samples analyzed
    pub total_samples: u32,
    /// Samples in each zone (indexed 0-4 for zones 1-5)
    pub zone_samples: [u32; 5],
    /// Percentage of measured samples in each zone
    pub zone_percentages: [f32; 5],
    /// Average heart rate across measured samples
    pub average_hr: f32,
    /// Peak heart rate
    pub peak_hr: u16,
}

impl HrZoneDistribution {
    /// Get the percentage for a specific zone (1-5).
    pub fn get_zone_percent(&self, zone: u8) -> f32 {
        if (1..=5).contains(&zone) {
            self.zone_percentages[(zone - 1) as usize]
        } else {
            0.0
        }
    }

    fn empty() -> Self {
        Self {
            total_samples: 0,
            zone_samples: [0; 5],
            zone_percentages: [0.0; 5],
            average_hr: 0.0,
            peak_hr: 0,
        }
    }

    fn from_accumulated(zone_samples: [u32; 5], sum: u64, peak: u16, total: u32) -> Self {
        if total == 0 {
            return Self::empty();
        }
        let mut zone_percentages = [0.0f32; 5];
        for i in 0..5 {
            zone_percentages[i] = (zone_samples[i] as f32 / total as f32) * 100.0;
        }
        Self {
            total_samples: total,
            zone_samples,
            zone_percentages,
            average_hr: sum as f32 / total as f32,
            peak_hr: peak,
        }
    }
}

/// Calculate heart-rate zone distribution from a stream of optional readings.
///
/// # Arguments
/// * `samples` - Heart-rate readings in bpm, None where the sensor dropped out
/// * `config` - Zone configuration from the athlete's profile
pub fn calculate_hr_zone_distribution(
    samples: &[Option<u16>],
    config: &HrZoneConfig,
) -> HrZoneDistribution {
    let mut zone_samples = [0u32; 5];
    let mut sum: u64 = 0;
    let mut peak: u16 = 0;
    let mut total: u32 = 0;

    for hr in samples.iter().flatten() {
        let zone = config.zone_for(*hr);
        zone_samples[(zone - 1) as usize] += 1;
        sum += *hr as u64;
        peak = peak.max(*hr);
        total += 1;
    }

    HrZoneDistribution::from_accumulated(zone_samples, sum, peak, total)
}

/// Calculate heart-rate zone distribution using parallel processing.
/// Falls back to the sequential path for small datasets.
#[cfg(feature = "parallel")]
pub fn calculate_hr_zone_distribution_parallel(
    samples: &[Option<u16>],
    config: &HrZoneConfig,
) -> HrZoneDistribution {
    if samples.len() < 10_000 {
        return calculate_hr_zone_distribution(samples, config);
    }

    let (zone_samples, sum, peak, total) = samples
        .par_iter()
        .fold(
            || ([0u32; 5], 0u64, 0u16, 0u32),
            |(mut zones, sum, peak, total), hr| match hr {
                Some(hr) => {
                    let zone = config.zone_for(*hr);
                    zones[(zone - 1) as usize] += 1;
                    (zones, sum + *hr as u64, peak.max(*hr), total + 1)
                }
                None => (zones, sum, peak, total),
            },
        )
        .reduce(
            || ([0u32; 5], 0u64, 0u16, 0u32),
            |(mut z1, s1, p1, t1), (z2, s2, p2, t2)| {
                for i in 0..5 {
                    z1[i] += z2[i];
                }
                (z1, s1 + s2, p1.max(p2), t1 + t2)
            },
        );

    HrZoneDistribution::from_accumulated(zone_samples, sum, peak, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_karvonen_zone_boundaries() {
        // Reserve = 140, resting = 50
        let config = HrZoneConfig::from_profile(190, 50).unwrap();

        assert_eq!(config.zone_for(50), 1); // 0% of reserve
        assert_eq!(config.zone_for(130), 1); // 57% of reserve
        assert_eq!(config.zone_for(140), 2); // 64%
        assert_eq!(config.zone_for(150), 3); // 71%
        assert_eq!(config.zone_for(165), 4); // 82%
        assert_eq!(config.zone_for(176), 5); // 90%, inclusive lower edge
        assert_eq!(config.zone_for(200), 5); // above max still zone 5
    }

    #[test]
    fn test_readings_below_resting_clamp_to_zone_one() {
        let config = HrZoneConfig::from_profile(190, 50).unwrap();
        assert_eq!(config.reserve_fraction(40), 0.0);
        assert_eq!(config.zone_for(40), 1);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        assert!(matches!(
            HrZoneConfig::from_profile(120, 150),
            Err(TrackEngineError::InvalidHeartRateProfile { .. })
        ));
        assert!(HrZoneConfig::from_profile(150, 150).is_err());
    }

    #[test]
    fn test_distribution_excludes_missing_readings() {
        let config = HrZoneConfig::from_profile(190, 50).unwrap();
        let samples = vec![Some(120), None, Some(150), None, Some(180)];
        let dist = calculate_hr_zone_distribution(&samples, &config);

        assert_eq!(dist.total_samples, 3);
        assert_eq!(dist.peak_hr, 180);
        assert!((dist.average_hr - 150.0).abs() < 0.1);
        let percent_sum: f32 = dist.zone_percentages.iter().sum();
        assert!((percent_sum - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_distribution_all_missing() {
        let config = HrZoneConfig::default();
        let samples = vec![None, None, None];
        let dist = calculate_hr_zone_distribution(&samples, &config);
        assert_eq!(dist.total_samples, 0);
        assert_eq!(dist.peak_hr, 0);
        assert_eq!(dist.get_zone_percent(3), 0.0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let config = HrZoneConfig::from_profile(190, 50).unwrap();
        let samples: Vec<Option<u16>> = (0..20_000)
            .map(|i| {
                if i % 7 == 0 {
                    None
                } else {
                    Some(90 + (i % 100) as u16)
                }
            })
            .collect();

        let sequential = calculate_hr_zone_distribution(&samples, &config);
        let parallel = calculate_hr_zone_distribution_parallel(&samples, &config);
        assert_eq!(sequential, parallel);
    }
}
