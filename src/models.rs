use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Neutral => "●",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: String,
    pub change: f64,
    pub trend: Trend,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub date: String,
    pub revenue: u64,
    pub orders: u64,
    pub new_customers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmSegment {
    pub name: String,
    pub count: u64,
    pub value: u64,
    pub description: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnRecord {
    pub id: String,
    pub name: String,
    pub rfm_segment: String,
    pub churn_prob: f64,
    pub last_purchase_days: u32,
    pub last_purchase: String,
    pub total_spend: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub date: String,
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

impl SentimentPoint {
    /// Not guaranteed to be 100.
    pub fn total(&self) -> u32 {
        self.positive + self.neutral + self.negative
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmScatterPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub segment: String,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentDriver {
    pub factor: String,
    pub change: i32,
    pub strength: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTopic {
    pub topic: String,
    pub volume: u32,
    pub sentiment: Polarity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: String,
    pub score: u32,
    pub reason: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub predicted: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub auc: f64,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetric {
    pub name: String,
    pub baseline: f64,
    pub strategy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiLevel {
    pub spend: f64,
    pub marginal_roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentShare {
    pub name: String,
    pub count: u64,
    pub share: f64,
    pub avg_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiProjection {
    pub budget: f64,
    pub roi: f64,
    pub revenue: f64,
    pub retained: u64,
    pub marginal_roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricLift {
    pub name: String,
    pub baseline: f64,
    pub strategy: f64,
    pub incremental: f64,
    pub lift_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub size: String,
    pub status: String,
    pub records: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPreview {
    pub id: String,
    pub customer_id: String,
    pub date: String,
    pub amount: f64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
}

impl CheckStatus {
    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warning => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub check: String,
    pub status: CheckStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub mapped: bool,
}
