use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalog::Catalog;
use crate::models::{ChurnRecord, Kpi, RevenuePoint, RfmScatterPoint, Trend};

pub const CHURN_RECORD_COUNT: usize = 20;
pub const SCATTER_POINT_COUNT: usize = 200;
pub const DEFAULT_TREND_DAYS: i64 = 30;
pub const MAX_TREND_DAYS: i64 = 3660;

pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn kpi(label: &str, value: &str, change: f64, trend: Trend) -> Kpi {
    Kpi {
        label: label.to_string(),
        value: value.to_string(),
        change,
        trend,
        description: "vs. last month".to_string(),
    }
}

pub fn generate_kpi_data() -> Vec<Kpi> {
    vec![
        kpi("Total Revenue (GMV)", "R$ 1,245,390", 12.5, Trend::Up),
        kpi("Active Customers", "12,450", 5.2, Trend::Up),
        // a falling churn rate is the good direction
        kpi("Churn Rate", "4.8%", -1.2, Trend::Down),
        kpi("Avg. Order Value", "R$ 145.20", 2.1, Trend::Up),
    ]
}

/// Growth multiplier applied to the point `elapsed` days into a `days` window.
pub fn trend_factor(elapsed: i64, days: i64) -> f64 {
    if days <= 0 {
        return 1.0;
    }
    1.0 + (elapsed as f64 / days as f64) * 0.2
}

/// Daily revenue series of `days + 1` points ending at `today`, oldest first.
///
/// A `days` outside `0..=MAX_TREND_DAYS` produces an empty series. Days that
/// fall before the earliest representable date are skipped.
pub fn generate_revenue_trend<R: Rng + ?Sized>(
    days: i64,
    today: NaiveDate,
    rng: &mut R,
) -> Vec<RevenuePoint> {
    if !(0..=MAX_TREND_DAYS).contains(&days) {
        return Vec::new();
    }

    let mut data = Vec::with_capacity(days as usize + 1);
    for offset in (0..=days).rev() {
        let Some(date) = today.checked_sub_signed(Duration::days(offset)) else {
            continue;
        };
        let base_revenue = 5000.0 + rng.gen_range(0.0..3000.0);
        let base_orders = 40.0 + rng.gen_range(0.0..20.0);
        let factor = trend_factor(days - offset, days);

        let orders = (base_orders * factor).round() as u64;
        data.push(RevenuePoint {
            date: date.format("%b %d").to_string(),
            revenue: (base_revenue * factor).round() as u64,
            orders,
            new_customers: (orders as f64 * 0.3).round() as u64,
        });
    }
    data
}

pub fn churn_segment_label(index: usize) -> &'static str {
    if index % 3 == 0 {
        "Champions"
    } else if index % 2 == 0 {
        "Loyal Customers"
    } else {
        "At Risk"
    }
}

/// High-risk customer list; every probability lands in `[0.6, 0.95)`.
pub fn generate_churn_risk_data<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<ChurnRecord> {
    (0..count)
        .map(|index| {
            let number = 1000 + index;
            let churn_prob = 0.6 + rng.gen::<f64>() * 0.35;
            let last_purchase_days = (rng.gen::<f64>() * 60.0).floor() as u32 + 30;
            let total_spend = (rng.gen::<f64>() * 2000.0).floor() as u32 + 500;

            ChurnRecord {
                id: format!("USR-{number}"),
                name: format!("Customer {number}"),
                rfm_segment: churn_segment_label(index).to_string(),
                churn_prob,
                last_purchase_days,
                last_purchase: format!("{last_purchase_days} days ago"),
                total_spend,
            }
        })
        .collect()
}

/// R, F and M scores for the segment at `index`, each in `[1, 5)`.
fn rfm_scores<R: Rng + ?Sized>(index: usize, rng: &mut R) -> (f64, f64, f64) {
    match index {
        0 => (
            4.0 + rng.gen::<f64>(),
            4.0 + rng.gen::<f64>(),
            4.0 + rng.gen::<f64>(),
        ),
        1 => (
            3.0 + rng.gen::<f64>(),
            4.0 + rng.gen::<f64>(),
            3.0 + rng.gen::<f64>(),
        ),
        5 => (
            1.0 + rng.gen::<f64>(),
            1.0 + rng.gen::<f64>(),
            1.0 + rng.gen::<f64>(),
        ),
        _ => (
            1.0 + rng.gen::<f64>() * 4.0,
            1.0 + rng.gen::<f64>() * 4.0,
            1.0 + rng.gen::<f64>() * 4.0,
        ),
    }
}

pub fn generate_rfm_scatter<R: Rng + ?Sized>(
    count: usize,
    catalog: &Catalog,
    rng: &mut R,
) -> Vec<RfmScatterPoint> {
    if catalog.segments.is_empty() {
        return Vec::new();
    }

    (0..count)
        .map(|_| {
            let index = rng.gen_range(0..catalog.segments.len());
            let segment = &catalog.segments[index];
            let (r, f, m) = rfm_scores(index, rng);
            RfmScatterPoint {
                x: r * 20.0,
                y: f * 10.0,
                z: m * 100.0,
                segment: segment.name.clone(),
                fill: segment.color.clone(),
            }
        })
        .collect()
}
