#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    DataManagement,
    RfmAnalysis,
    ChurnPrediction,
    StrategyEngine,
    Insights,
    Documentation,
    NotFound,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Overview,
        Page::DataManagement,
        Page::RfmAnalysis,
        Page::ChurnPrediction,
        Page::StrategyEngine,
        Page::Insights,
        Page::Documentation,
    ];

    pub fn from_path(path: &str) -> Page {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" if trimmed.starts_with('/') => "/",
            other => other,
        };

        match normalized {
            "/" => Page::Overview,
            "/data" => Page::DataManagement,
            "/rfm" => Page::RfmAnalysis,
            "/churn" => Page::ChurnPrediction,
            "/strategy" => Page::StrategyEngine,
            "/insights" => Page::Insights,
            "/docs" => Page::Documentation,
            _ => Page::NotFound,
        }
    }

    pub fn path(self) -> Option<&'static str> {
        match self {
            Page::Overview => Some("/"),
            Page::DataManagement => Some("/data"),
            Page::RfmAnalysis => Some("/rfm"),
            Page::ChurnPrediction => Some("/churn"),
            Page::StrategyEngine => Some("/strategy"),
            Page::Insights => Some("/insights"),
            Page::Documentation => Some("/docs"),
            Page::NotFound => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Page::Overview => "Dashboard Overview",
            Page::DataManagement => "Data Management",
            Page::RfmAnalysis => "RFM Analysis",
            Page::ChurnPrediction => "Churn Prediction",
            Page::StrategyEngine => "Strategy Engine",
            Page::Insights => "Insights & Trends",
            Page::Documentation => "Documentation",
            Page::NotFound => "Page Not Found",
        }
    }
}
