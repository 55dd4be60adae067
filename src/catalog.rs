use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    CalibrationPoint, CheckStatus, FeatureImportance, HealthCheck, ModelMetrics, OrderPreview,
    Polarity, Recommendation, RequiredField, RfmSegment, RoiLevel, SentimentDriver,
    SentimentPoint, SimulationMetric, TrendTopic, UploadedFile,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Reference data for every page. A JSON override may set any subset of
/// fields; the rest come from [`Catalog::standard`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub total_active_customers: u64,
    pub segments: Vec<RfmSegment>,
    pub sentiment: Vec<SentimentPoint>,
    pub feature_importance: Vec<FeatureImportance>,
    pub sentiment_drivers: Vec<SentimentDriver>,
    pub trend_topics: Vec<TrendTopic>,
    pub recommendations: Vec<Recommendation>,
    pub calibration: Vec<CalibrationPoint>,
    pub model_metrics: ModelMetrics,
    pub simulation: Vec<SimulationMetric>,
    pub roi_curve: Vec<RoiLevel>,
    pub campaign_roi: f64,
    pub retention_cost: f64,
    pub uploaded_files: Vec<UploadedFile>,
    pub order_preview: Vec<OrderPreview>,
    pub health_checks: Vec<HealthCheck>,
    pub required_fields: Vec<RequiredField>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn segment(name: &str, count: u64, value: u64, description: &str, color: &str) -> RfmSegment {
    RfmSegment {
        name: name.to_string(),
        count,
        value,
        description: description.to_string(),
        color: color.to_string(),
    }
}

fn week(date: &str, positive: u32, neutral: u32, negative: u32) -> SentimentPoint {
    SentimentPoint {
        date: date.to_string(),
        positive,
        neutral,
        negative,
    }
}

impl Catalog {
    pub fn standard() -> Self {
        let segments = vec![
            segment(
                "Champions",
                1250,
                450_000,
                "Bought recently, buy often and spend the most",
                "#10B981",
            ),
            segment(
                "Loyal Customers",
                2400,
                320_000,
                "Buy on a regular basis. Responsive to promotions.",
                "#3B82F6",
            ),
            segment(
                "Potential Loyalist",
                3100,
                210_000,
                "Recent customers with average frequency.",
                "#6366F1",
            ),
            segment(
                "At Risk",
                1800,
                150_000,
                "Spent big money, haven't purchased recently.",
                "#F59E0B",
            ),
            segment(
                "Hibernating",
                2200,
                80_000,
                "Last purchase was long ago and low number of orders.",
                "#EF4444",
            ),
            segment(
                "Lost",
                1700,
                35_000,
                "Lowest recency, frequency and monetary scores.",
                "#64748B",
            ),
        ];

        let feature_importance = [
            ("Days Since Last Order", 0.42),
            ("Order Frequency", 0.28),
            ("Support Tickets", 0.15),
            ("Avg. Order Value", 0.09),
            ("Discount Usage", 0.06),
        ]
        .into_iter()
        .map(|(feature, importance)| FeatureImportance {
            feature: feature.to_string(),
            importance,
        })
        .collect();

        let sentiment_drivers = [
            ("Delivery Speed", 12, 75),
            ("Product Quality", 8, 65),
            ("Packaging", -5, 40),
        ]
        .into_iter()
        .map(|(factor, change, strength)| SentimentDriver {
            factor: factor.to_string(),
            change,
            strength,
        })
        .collect();

        let trend_topics = [
            ("Fast Delivery", 1250, Polarity::Positive),
            ("Product Quality", 980, Polarity::Positive),
            ("Return Process", 450, Polarity::Negative),
            ("Customer Support", 320, Polarity::Neutral),
        ]
        .into_iter()
        .map(|(topic, volume, sentiment)| TrendTopic {
            topic: topic.to_string(),
            volume,
            sentiment,
        })
        .collect();

        let recommendations = [
            ("Smart Watch Series 5", 98, "Matches 'Tech Enthusiast' profile", "Electronics"),
            ("Wireless Earbuds Pro", 95, "Frequently bought with phones", "Audio"),
            ("Ergonomic Office Chair", 88, "High value potential", "Furniture"),
            ("Mechanical Keyboard", 82, "Browsing history match", "Electronics"),
        ]
        .into_iter()
        .map(|(product, score, reason, category)| Recommendation {
            product: product.to_string(),
            score,
            reason: reason.to_string(),
            category: category.to_string(),
        })
        .collect();

        let calibration = [
            (0.1, 0.08),
            (0.2, 0.18),
            (0.3, 0.32),
            (0.4, 0.41),
            (0.5, 0.48),
            (0.6, 0.62),
            (0.7, 0.71),
            (0.8, 0.79),
            (0.9, 0.88),
            (1.0, 0.97),
        ]
        .into_iter()
        .map(|(predicted, actual)| CalibrationPoint { predicted, actual })
        .collect();

        let simulation = [
            ("Revenue", 120_000.0, 145_000.0),
            ("Profit", 36_000.0, 41_500.0),
            ("Active Users", 2_400.0, 2_850.0),
        ]
        .into_iter()
        .map(|(name, baseline, strategy)| SimulationMetric {
            name: name.to_string(),
            baseline,
            strategy,
        })
        .collect();

        let roi_curve = [
            (5_000.0, 4.1),
            (10_000.0, 3.6),
            (20_000.0, 3.0),
            (30_000.0, 2.4),
            (40_000.0, 1.9),
            (50_000.0, 1.5),
        ]
        .into_iter()
        .map(|(spend, marginal_roi)| RoiLevel {
            spend,
            marginal_roi,
        })
        .collect();

        let uploaded_files = [
            ("olist_orders_dataset.csv", "15.4 MB", "uploaded", "99,441"),
            ("olist_customers_dataset.csv", "8.6 MB", "uploaded", "99,441"),
            ("olist_order_items_dataset.csv", "24.1 MB", "uploaded", "112,650"),
            ("olist_order_payments_dataset.csv", "5.2 MB", "processing", "-"),
        ]
        .into_iter()
        .map(|(name, size, status, records)| UploadedFile {
            name: name.to_string(),
            size: size.to_string(),
            status: status.to_string(),
            records: records.to_string(),
        })
        .collect();

        let order_preview = [
            ("ORD-001", "CUST-101", "2023-10-15", 150.50, "delivered"),
            ("ORD-002", "CUST-102", "2023-10-16", 89.90, "shipped"),
            ("ORD-003", "CUST-103", "2023-10-16", 210.00, "processing"),
            ("ORD-004", "CUST-101", "2023-10-17", 45.00, "delivered"),
            ("ORD-005", "CUST-104", "2023-10-18", 120.00, "delivered"),
        ]
        .into_iter()
        .map(|(id, customer_id, date, amount, status)| OrderPreview {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            date: date.to_string(),
            amount,
            status: status.to_string(),
        })
        .collect();

        let health_checks = [
            (
                "Duplicate Customer IDs",
                CheckStatus::Pass,
                "No duplicates found in customer table",
            ),
            (
                "Missing Values",
                CheckStatus::Warning,
                "2.5% missing values in 'customer_state'",
            ),
            ("Date Format", CheckStatus::Pass, "All dates in ISO 8601 format"),
            (
                "Negative Values",
                CheckStatus::Pass,
                "No negative values in 'order_value'",
            ),
        ]
        .into_iter()
        .map(|(check, status, message)| HealthCheck {
            check: check.to_string(),
            status,
            message: message.to_string(),
        })
        .collect();

        let required_fields = [
            ("customer_id", "string"),
            ("order_id", "string"),
            ("order_date", "date"),
            ("order_value", "number"),
        ]
        .into_iter()
        .map(|(name, field_type)| RequiredField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mapped: true,
        })
        .collect();

        Catalog {
            total_active_customers: 12_450,
            segments,
            sentiment: vec![
                week("Week 1", 65, 20, 15),
                week("Week 2", 62, 22, 16),
                week("Week 3", 58, 25, 17),
                week("Week 4", 70, 20, 10),
            ],
            feature_importance,
            sentiment_drivers,
            trend_topics,
            recommendations,
            calibration,
            model_metrics: ModelMetrics {
                auc: 0.87,
                precision: 0.82,
                recall: 0.76,
            },
            simulation,
            roi_curve,
            campaign_roi: 3.25,
            retention_cost: 50.0,
            uploaded_files,
            order_preview,
            health_checks,
            required_fields,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let catalog: Catalog =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.segments.is_empty() {
            return Err(CatalogError::Invalid("segment catalog is empty".to_string()));
        }
        if self.total_active_customers == 0 {
            return Err(CatalogError::Invalid(
                "total_active_customers must be positive".to_string(),
            ));
        }
        if self.roi_curve.is_empty() {
            return Err(CatalogError::Invalid("roi_curve is empty".to_string()));
        }
        if self
            .roi_curve
            .iter()
            .any(|level| !level.spend.is_finite() || !level.marginal_roi.is_finite())
        {
            return Err(CatalogError::Invalid(
                "roi_curve entries must be finite".to_string(),
            ));
        }
        if self
            .roi_curve
            .windows(2)
            .any(|pair| pair[0].spend >= pair[1].spend)
        {
            return Err(CatalogError::Invalid(
                "roi_curve spend levels must be strictly ascending".to_string(),
            ));
        }
        if !self.retention_cost.is_finite()
            || self.retention_cost <= 0.0
            || !self.campaign_roi.is_finite()
        {
            return Err(CatalogError::Invalid(
                "campaign_roi must be finite and retention_cost positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn segment(&self, name: &str) -> Option<&RfmSegment> {
        self.segments
            .iter()
            .find(|segment| segment.name.eq_ignore_ascii_case(name))
    }

    pub fn segment_count_total(&self) -> u64 {
        self.segments
            .iter()
            .fold(0u64, |total, segment| total.saturating_add(segment.count))
    }
}
