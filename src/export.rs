use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::metrics::{self, AbTestPlan};
use crate::mock;
use crate::models::{
    CalibrationPoint, ChurnRecord, FeatureImportance, Kpi, MetricLift, ModelMetrics,
    Recommendation, RevenuePoint, RfmScatterPoint, RfmSegment, RoiLevel, RoiProjection,
    SegmentShare, SentimentDriver, SentimentPoint, TrendTopic,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    Revenue,
    Churn,
    Segments,
    Scatter,
    Sentiment,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 5] = [
        DatasetKind::Revenue,
        DatasetKind::Churn,
        DatasetKind::Segments,
        DatasetKind::Scatter,
        DatasetKind::Sentiment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DatasetKind::Revenue => "revenue",
            DatasetKind::Churn => "churn",
            DatasetKind::Segments => "segments",
            DatasetKind::Scatter => "scatter",
            DatasetKind::Sentiment => "sentiment",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Revenue => &["date", "revenue", "orders", "new_customers"],
            DatasetKind::Churn => &[
                "id",
                "name",
                "rfm_segment",
                "churn_prob",
                "last_purchase_days",
                "last_purchase",
                "total_spend",
            ],
            DatasetKind::Segments => &["name", "count", "value", "description", "color"],
            DatasetKind::Scatter => &["x", "y", "z", "segment", "fill"],
            DatasetKind::Sentiment => &["date", "positive", "neutral", "negative"],
        }
    }
}

pub fn write_csv<W: std::io::Write, T: Serialize>(
    writer: W,
    records: &[T],
) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(records.len())
}

pub struct ExportRequest {
    pub kind: DatasetKind,
    pub days: i64,
    pub count: Option<usize>,
    pub today: NaiveDate,
}

/// Generates the requested dataset and writes it to `writer` as CSV.
pub fn export_dataset<W: std::io::Write, R: Rng + ?Sized>(
    writer: W,
    request: &ExportRequest,
    catalog: &Catalog,
    rng: &mut R,
) -> anyhow::Result<usize> {
    match request.kind {
        DatasetKind::Revenue => write_csv(
            writer,
            &mock::generate_revenue_trend(request.days, request.today, rng),
        ),
        DatasetKind::Churn => write_csv(
            writer,
            &mock::generate_churn_risk_data(
                request.count.unwrap_or(mock::CHURN_RECORD_COUNT),
                rng,
            ),
        ),
        DatasetKind::Segments => write_csv(writer, &catalog.segments),
        DatasetKind::Scatter => write_csv(
            writer,
            &mock::generate_rfm_scatter(
                request.count.unwrap_or(mock::SCATTER_POINT_COUNT),
                catalog,
                rng,
            ),
        ),
        DatasetKind::Sentiment => write_csv(writer, &catalog.sentiment),
    }
}

pub fn export_to_path<R: Rng + ?Sized>(
    path: &Path,
    request: &ExportRequest,
    catalog: &Catalog,
    rng: &mut R,
) -> anyhow::Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    export_dataset(file, request, catalog, rng)
        .with_context(|| format!("failed to export {} dataset", request.kind.name()))
}

#[derive(Debug, Serialize)]
pub struct DashboardSnapshot {
    pub snapshot_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub seed: Option<u64>,
    pub kpis: Vec<Kpi>,
    pub revenue_trend: Vec<RevenuePoint>,
    pub segments: Vec<RfmSegment>,
    pub segment_shares: Vec<SegmentShare>,
    pub segment_share_gap: i64,
    pub rfm_scatter: Vec<RfmScatterPoint>,
    pub churn_risk: Vec<ChurnRecord>,
    pub model_metrics: ModelMetrics,
    pub feature_importance: Vec<FeatureImportance>,
    pub calibration: Vec<CalibrationPoint>,
    pub roi_projection: RoiProjection,
    pub roi_curve: Vec<RoiLevel>,
    pub simulation_lift: Vec<MetricLift>,
    pub sample_size: u64,
    pub sentiment: Vec<SentimentPoint>,
    pub sentiment_drivers: Vec<SentimentDriver>,
    pub trend_topics: Vec<TrendTopic>,
    pub recommendations: Vec<Recommendation>,
}

pub struct SnapshotInputs {
    pub seed: Option<u64>,
    pub days: i64,
    pub today: NaiveDate,
    pub budget: f64,
    pub ab_test: AbTestPlan,
}

pub fn build_snapshot<R: Rng + ?Sized>(
    inputs: &SnapshotInputs,
    catalog: &Catalog,
    rng: &mut R,
) -> anyhow::Result<DashboardSnapshot> {
    let roi_projection =
        metrics::simulate_roi(catalog, inputs.budget).context("failed to simulate campaign ROI")?;
    let sample_size = inputs
        .ab_test
        .required_sample_size()
        .context("failed to size the A/B test")?;

    Ok(DashboardSnapshot {
        snapshot_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        seed: inputs.seed,
        kpis: mock::generate_kpi_data(),
        revenue_trend: mock::generate_revenue_trend(inputs.days, inputs.today, rng),
        segments: catalog.segments.clone(),
        segment_shares: metrics::segment_shares(&catalog.segments, catalog.total_active_customers),
        segment_share_gap: metrics::catalog_share_gap(catalog),
        rfm_scatter: mock::generate_rfm_scatter(mock::SCATTER_POINT_COUNT, catalog, rng),
        churn_risk: mock::generate_churn_risk_data(mock::CHURN_RECORD_COUNT, rng),
        model_metrics: catalog.model_metrics,
        feature_importance: catalog.feature_importance.clone(),
        calibration: catalog.calibration.clone(),
        roi_projection,
        roi_curve: catalog.roi_curve.clone(),
        simulation_lift: metrics::simulation_lift(catalog),
        sample_size,
        sentiment: catalog.sentiment.clone(),
        sentiment_drivers: catalog.sentiment_drivers.clone(),
        trend_topics: catalog.trend_topics.clone(),
        recommendations: catalog.recommendations.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn request(kind: DatasetKind) -> ExportRequest {
        ExportRequest {
            kind,
            days: 5,
            count: None,
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    fn export_string(kind: DatasetKind, seed: u64) -> String {
        let mut buffer = Vec::new();
        let mut rng = StdRng::seed_from_u64(seed);
        export_dataset(&mut buffer, &request(kind), &Catalog::standard(), &mut rng).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn csv_headers_match_declared_columns() {
        for kind in DatasetKind::ALL {
            let output = export_string(kind, 1);
            let header = output.lines().next().unwrap();
            assert_eq!(header, kind.columns().join(","), "{}", kind.name());
        }
    }

    #[test]
    fn revenue_export_has_a_row_per_day() {
        let output = export_string(DatasetKind::Revenue, 2);
        assert_eq!(output.lines().count(), 1 + 6);
        assert!(output.lines().last().unwrap().starts_with("Oct 19,"));
    }

    #[test]
    fn churn_export_honours_count() {
        let mut buffer = Vec::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut req = request(DatasetKind::Churn);
        req.count = Some(3);
        let written = export_dataset(&mut buffer, &req, &Catalog::standard(), &mut rng).unwrap();
        assert_eq!(written, 3);
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("USR-1002,Customer 1002,Loyal Customers,"));
    }

    #[test]
    fn segment_export_is_the_catalog() {
        let output = export_string(DatasetKind::Segments, 4);
        assert!(output.contains("Champions,1250,450000,"));
        assert_eq!(output.lines().count(), 7);
    }

    #[test]
    fn export_to_path_writes_file() {
        let path = std::env::temp_dir().join(format!("export-{}.csv", Uuid::new_v4()));
        let mut rng = StdRng::seed_from_u64(5);
        let written = export_to_path(
            &path,
            &request(DatasetKind::Sentiment),
            &Catalog::standard(),
            &mut rng,
        )
        .unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(written, 4);
        assert!(contents.contains("Week 4,70,20,10"));
    }

    #[test]
    fn snapshot_carries_every_dataset() {
        let inputs = SnapshotInputs {
            seed: Some(7),
            days: 30,
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            budget: 5000.0,
            ab_test: AbTestPlan::default(),
        };
        let mut rng = StdRng::seed_from_u64(7);
        let snapshot = build_snapshot(&inputs, &Catalog::standard(), &mut rng).unwrap();

        assert_eq!(snapshot.kpis.len(), 4);
        assert_eq!(snapshot.revenue_trend.len(), 31);
        assert_eq!(snapshot.churn_risk.len(), 20);
        assert_eq!(snapshot.rfm_scatter.len(), 200);
        assert_eq!(snapshot.sample_size, 5100);
        assert_eq!(snapshot.segment_share_gap, 0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["seed"], 7);
        assert_eq!(json["kpis"][2]["trend"], "down");
        assert_eq!(json["trend_topics"][2]["sentiment"], "negative");
    }

    #[test]
    fn snapshot_ids_are_unique() {
        let inputs = SnapshotInputs {
            seed: None,
            days: 1,
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            budget: 1000.0,
            ab_test: AbTestPlan::default(),
        };
        let mut rng = StdRng::seed_from_u64(8);
        let catalog = Catalog::standard();
        let first = build_snapshot(&inputs, &catalog, &mut rng).unwrap();
        let second = build_snapshot(&inputs, &catalog, &mut rng).unwrap();
        assert_ne!(first.snapshot_id, second.snapshot_id);
    }

    #[test]
    fn snapshot_rejects_zero_effect() {
        let inputs = SnapshotInputs {
            seed: None,
            days: 1,
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            budget: 1000.0,
            ab_test: AbTestPlan {
                mde: 0.0,
                ..AbTestPlan::default()
            },
        };
        let mut rng = StdRng::seed_from_u64(9);
        assert!(build_snapshot(&inputs, &Catalog::standard(), &mut rng).is_err());
    }
}
