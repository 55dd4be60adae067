use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::models::{MetricLift, RfmSegment, RoiLevel, RoiProjection, SegmentShare};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    #[error("minimum detectable effect must be a positive number (got {0})")]
    NonPositiveEffect(f64),
    #[error("baseline rate must be a percentage in [0, 100] (got {0})")]
    RateOutOfRange(f64),
    #[error("{name} must lie strictly between 0 and 1 (got {value})")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
    #[error("campaign budget must be a non-negative number (got {0})")]
    InvalidBudget(f64),
    #[error("roi curve is empty")]
    EmptyRoiCurve,
    #[error("sample size is not representable (minimum detectable effect {0} is too small)")]
    SampleSizeOverflow(f64),
}

fn check_inputs(baseline_rate: f64, mde: f64) -> Result<(), MetricsError> {
    if !mde.is_finite() || mde <= 0.0 {
        return Err(MetricsError::NonPositiveEffect(mde));
    }
    if !(0.0..=100.0).contains(&baseline_rate) {
        return Err(MetricsError::RateOutOfRange(baseline_rate));
    }
    Ok(())
}

fn whole_samples(raw: f64, mde: f64) -> Result<u64, MetricsError> {
    let rounded = raw.round();
    if !rounded.is_finite() || rounded >= u64::MAX as f64 {
        return Err(MetricsError::SampleSizeOverflow(mde));
    }
    Ok(rounded as u64)
}

/// Per-variant sample size for a two-proportion test, both inputs in percent.
///
/// The constant 16 bakes in a 5% two-sided significance level and 80% power.
pub fn sample_size(baseline_rate: f64, mde: f64) -> Result<u64, MetricsError> {
    check_inputs(baseline_rate, mde)?;
    whole_samples(
        16.0 * baseline_rate * (100.0 - baseline_rate) / (mde * mde),
        mde,
    )
}

fn check_probability(name: &'static str, value: f64) -> Result<(), MetricsError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(MetricsError::ProbabilityOutOfRange { name, value })
    }
}

fn standard_normal_quantile(p: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// A/B test panel inputs. `power` and `alpha` are fractions, the rates are
/// percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbTestPlan {
    pub baseline_rate: f64,
    pub mde: f64,
    pub power: f64,
    pub alpha: f64,
}

impl Default for AbTestPlan {
    fn default() -> Self {
        AbTestPlan {
            baseline_rate: 15.0,
            mde: 2.0,
            power: 0.8,
            alpha: 0.05,
        }
    }
}

impl AbTestPlan {
    /// Dashboard figure. Ignores `power` and `alpha`.
    pub fn required_sample_size(&self) -> Result<u64, MetricsError> {
        sample_size(self.baseline_rate, self.mde)
    }

    pub fn powered_sample_size(&self) -> Result<u64, MetricsError> {
        check_inputs(self.baseline_rate, self.mde)?;
        check_probability("power", self.power)?;
        check_probability("alpha", self.alpha)?;

        let z_alpha = standard_normal_quantile(1.0 - self.alpha / 2.0);
        let z_power = standard_normal_quantile(self.power);
        let multiplier = 2.0 * (z_alpha + z_power).powi(2);
        let variance = self.baseline_rate * (100.0 - self.baseline_rate);
        whole_samples(multiplier * variance / (self.mde * self.mde), self.mde)
    }
}

/// Marginal ROI of the greatest spend level at or below `spend`; spends under
/// the first level use the first entry.
pub fn marginal_roi_at(curve: &[RoiLevel], spend: f64) -> Result<f64, MetricsError> {
    let first = curve.first().ok_or(MetricsError::EmptyRoiCurve)?;
    let level = curve
        .iter()
        .take_while(|level| level.spend <= spend)
        .last()
        .unwrap_or(first);
    Ok(level.marginal_roi)
}

pub fn simulate_roi(catalog: &Catalog, budget: f64) -> Result<RoiProjection, MetricsError> {
    if !budget.is_finite() || budget < 0.0 {
        return Err(MetricsError::InvalidBudget(budget));
    }

    Ok(RoiProjection {
        budget,
        roi: catalog.campaign_roi,
        revenue: budget * catalog.campaign_roi,
        retained: (budget / catalog.retention_cost).floor() as u64,
        marginal_roi: marginal_roi_at(&catalog.roi_curve, budget)?,
    })
}

/// Shares are taken against `total_active_customers`, which is configured
/// separately from the segment counts; nothing forces them to sum to 100.
pub fn segment_shares(segments: &[RfmSegment], total_active_customers: u64) -> Vec<SegmentShare> {
    segments
        .iter()
        .map(|segment| SegmentShare {
            name: segment.name.clone(),
            count: segment.count,
            share: if total_active_customers == 0 {
                0.0
            } else {
                segment.count as f64 / total_active_customers as f64 * 100.0
            },
            avg_value: average_value(segment),
        })
        .collect()
}

pub fn average_value(segment: &RfmSegment) -> f64 {
    if segment.count == 0 {
        0.0
    } else {
        segment.value as f64 / segment.count as f64
    }
}

/// Configured active customers minus the customers the catalog accounts for.
pub fn catalog_share_gap(catalog: &Catalog) -> i64 {
    let gap = i128::from(catalog.total_active_customers) - i128::from(catalog.segment_count_total());
    i64::try_from(gap).unwrap_or(if gap < 0 { i64::MIN } else { i64::MAX })
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

pub fn simulation_lift(catalog: &Catalog) -> Vec<MetricLift> {
    catalog
        .simulation
        .iter()
        .map(|metric| {
            let incremental = metric.strategy - metric.baseline;
            MetricLift {
                name: metric.name.clone(),
                baseline: metric.baseline,
                strategy: metric.strategy,
                incremental,
                lift_pct: if metric.baseline == 0.0 {
                    0.0
                } else {
                    incremental / metric.baseline * 100.0
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_size_matches_dashboard_formula() {
        assert_eq!(sample_size(15.0, 2.0), Ok(5100));
        assert_eq!(sample_size(50.0, 5.0), Ok(1600));
        assert_eq!(sample_size(0.0, 1.0), Ok(0));
    }

    #[test]
    fn zero_effect_is_an_error_not_a_panic() {
        assert_eq!(sample_size(15.0, 0.0), Err(MetricsError::NonPositiveEffect(0.0)));
        assert!(sample_size(15.0, -1.0).is_err());
        assert!(sample_size(15.0, f64::NAN).is_err());
    }

    #[test]
    fn vanishing_effect_does_not_saturate() {
        assert_eq!(
            sample_size(15.0, 1e-160),
            Err(MetricsError::SampleSizeOverflow(1e-160))
        );
        assert_eq!(
            sample_size(15.0, 1e-9),
            Err(MetricsError::SampleSizeOverflow(1e-9))
        );
        let plan = AbTestPlan {
            mde: 1e-160,
            ..AbTestPlan::default()
        };
        assert_eq!(
            plan.powered_sample_size(),
            Err(MetricsError::SampleSizeOverflow(1e-160))
        );
        assert!(sample_size(15.0, 0.01).is_ok());
    }

    #[test]
    fn baseline_rate_must_be_a_percentage() {
        assert_eq!(sample_size(120.0, 2.0), Err(MetricsError::RateOutOfRange(120.0)));
        assert!(sample_size(-1.0, 2.0).is_err());
    }

    #[test]
    fn required_sample_size_ignores_power() {
        let low = AbTestPlan {
            power: 0.5,
            ..AbTestPlan::default()
        };
        let high = AbTestPlan {
            power: 0.95,
            ..AbTestPlan::default()
        };
        assert_eq!(low.required_sample_size(), high.required_sample_size());
        assert_eq!(low.required_sample_size(), Ok(5100));
    }

    #[test]
    fn powered_sample_size_tracks_the_rule_of_sixteen() {
        let plan = AbTestPlan::default();
        let n = plan.powered_sample_size().unwrap();
        assert!((4950..=5050).contains(&n), "got {n}");
    }

    #[test]
    fn more_power_needs_more_samples() {
        let base = AbTestPlan::default();
        let strong = AbTestPlan {
            power: 0.9,
            ..base
        };
        assert!(strong.powered_sample_size().unwrap() > base.powered_sample_size().unwrap());
    }

    #[test]
    fn powered_sample_size_rejects_degenerate_power() {
        let plan = AbTestPlan {
            power: 1.0,
            ..AbTestPlan::default()
        };
        assert_eq!(
            plan.powered_sample_size(),
            Err(MetricsError::ProbabilityOutOfRange {
                name: "power",
                value: 1.0
            })
        );
    }

    #[test]
    fn roi_projection_uses_fixed_multiplier() {
        let catalog = Catalog::standard();
        let projection = simulate_roi(&catalog, 5000.0).unwrap();
        assert_eq!(projection.revenue, 16_250.0);
        assert_eq!(projection.retained, 100);
        assert_eq!(projection.marginal_roi, 4.1);

        assert_eq!(simulate_roi(&catalog, 5049.0).unwrap().retained, 100);
        assert_eq!(simulate_roi(&catalog, 0.0).unwrap().retained, 0);
        assert!(simulate_roi(&catalog, -10.0).is_err());
    }

    #[test]
    fn marginal_roi_is_a_step_lookup() {
        let curve = Catalog::standard().roi_curve;
        assert_eq!(marginal_roi_at(&curve, 0.0), Ok(4.1));
        assert_eq!(marginal_roi_at(&curve, 10_000.0), Ok(3.6));
        assert_eq!(marginal_roi_at(&curve, 19_999.0), Ok(3.6));
        assert_eq!(marginal_roi_at(&curve, 45_000.0), Ok(1.9));
        assert_eq!(marginal_roi_at(&curve, 90_000.0), Ok(1.5));
        assert_eq!(marginal_roi_at(&[], 10.0), Err(MetricsError::EmptyRoiCurve));
    }

    #[test]
    fn segment_shares_against_configured_total() {
        let catalog = Catalog::standard();
        let shares = segment_shares(&catalog.segments, catalog.total_active_customers);

        let raw_sum: f64 = shares.iter().map(|s| s.share).sum();
        assert!((raw_sum - 100.0).abs() < 1e-9);
        assert_eq!(catalog_share_gap(&catalog), 0);

        // one-decimal display values drift above 100
        let displayed: Vec<f64> = shares.iter().map(|s| round_to(s.share, 1)).collect();
        assert_eq!(displayed, vec![10.0, 19.3, 24.9, 14.5, 17.7, 13.7]);
        let displayed_sum = round_to(displayed.iter().sum(), 1);
        assert_eq!(displayed_sum, 100.1);
    }

    #[test]
    fn share_gap_follows_catalog_edits() {
        let mut catalog = Catalog::standard();
        catalog.segments.pop();
        assert_eq!(catalog_share_gap(&catalog), 1700);

        let shares = segment_shares(&catalog.segments, catalog.total_active_customers);
        let raw_sum: f64 = shares.iter().map(|s| s.share).sum();
        assert!(raw_sum < 100.0);
    }

    #[test]
    fn share_gap_saturates_on_huge_counts() {
        let mut catalog = Catalog::standard();
        catalog.segments[0].count = u64::MAX;
        catalog.segments[1].count = u64::MAX;
        assert_eq!(catalog.segment_count_total(), u64::MAX);
        assert_eq!(catalog_share_gap(&catalog), i64::MIN);

        catalog.segments.truncate(1);
        catalog.segments[0].count = 0;
        catalog.total_active_customers = u64::MAX;
        assert_eq!(catalog_share_gap(&catalog), i64::MAX);
    }

    #[test]
    fn average_value_per_customer() {
        let catalog = Catalog::standard();
        assert_eq!(average_value(&catalog.segments[0]).round(), 360.0);
        let empty = RfmSegment {
            count: 0,
            ..catalog.segments[0].clone()
        };
        assert_eq!(average_value(&empty), 0.0);
        assert!(segment_shares(&catalog.segments, 0).iter().all(|s| s.share == 0.0));
    }

    #[test]
    fn lift_compares_strategy_to_baseline() {
        let lifts = simulation_lift(&Catalog::standard());
        assert_eq!(lifts[0].name, "Revenue");
        assert_eq!(lifts[0].incremental, 25_000.0);
        assert!((lifts[0].lift_pct - 20.833).abs() < 0.01);
        assert_eq!(lifts[2].incremental, 450.0);
    }
}
