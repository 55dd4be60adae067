use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::Context;
use chrono::NaiveDate;
use rand::Rng;

use crate::catalog::Catalog;
use crate::metrics::{self, AbTestPlan};
use crate::mock;
use crate::models::{Polarity, RevenuePoint, RfmScatterPoint};
use crate::routes::Page;

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignInputs {
    pub segment: String,
    pub discount: u32,
    pub budget: f64,
}

impl Default for CampaignInputs {
    fn default() -> Self {
        CampaignInputs {
            segment: "At Risk".to_string(),
            discount: 15,
            budget: 5000.0,
        }
    }
}

/// Everything a page needs to render. The random source is advanced on every
/// render, so rendering the same page twice shows different mock values.
pub struct RenderContext<'a, R: Rng> {
    pub catalog: &'a Catalog,
    pub today: NaiveDate,
    pub days: i64,
    pub campaign: CampaignInputs,
    pub ab_test: AbTestPlan,
    pub rng: &'a mut R,
}

impl<'a, R: Rng> RenderContext<'a, R> {
    pub fn new(catalog: &'a Catalog, today: NaiveDate, rng: &'a mut R) -> Self {
        RenderContext {
            catalog,
            today,
            days: mock::DEFAULT_TREND_DAYS,
            campaign: CampaignInputs::default(),
            ab_test: AbTestPlan::default(),
            rng,
        }
    }
}

pub fn render_page<R: Rng>(page: Page, ctx: &mut RenderContext<'_, R>) -> anyhow::Result<String> {
    let mut output = String::new();
    let _ = writeln!(output, "# {}", page.title());
    let _ = writeln!(output);

    match page {
        Page::Overview => render_overview(&mut output, ctx),
        Page::DataManagement => render_data(&mut output, ctx.catalog),
        Page::RfmAnalysis => render_rfm(&mut output, ctx),
        Page::ChurnPrediction => render_churn(&mut output, ctx),
        Page::StrategyEngine => render_strategy(&mut output, ctx)?,
        Page::Insights => render_insights(&mut output, ctx.catalog),
        Page::Documentation => render_docs(&mut output, ctx.catalog),
        Page::NotFound => {
            let _ = writeln!(output, "404: the requested page does not exist.");
            let _ = writeln!(output, "Available pages:");
            for page in Page::ALL {
                if let Some(path) = page.path() {
                    let _ = writeln!(output, "- `{}` {}", path, page.title());
                }
            }
        }
    }

    Ok(output)
}

/// Renders `page`, substituting a fallback screen when rendering fails.
pub fn render_with_fallback<R: Rng>(page: Page, ctx: &mut RenderContext<'_, R>) -> String {
    match render_page(page, ctx) {
        Ok(output) => output,
        Err(error) => {
            tracing::error!(page = page.title(), error = %format!("{error:#}"), "page render failed");
            fallback_screen(&error)
        }
    }
}

pub fn fallback_screen(error: &anyhow::Error) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# An unexpected error occurred");
    let _ = writeln!(output);
    let _ = writeln!(output, "```");
    let _ = writeln!(output, "{error:#}");
    let _ = writeln!(output, "```");
    let _ = writeln!(output, "Reload the page to try again.");
    output
}

pub fn build_report<R: Rng>(ctx: &mut RenderContext<'_, R>) -> String {
    let mut output = String::new();
    for page in Page::ALL {
        output.push_str(&render_with_fallback(page, ctx));
        output.push('\n');
    }
    output
}

fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn revenue_events(points: &[RevenuePoint]) -> Vec<(&str, &str)> {
    let mut events = Vec::new();
    if let Some(point) = points.get(points.len() / 2) {
        events.push((point.date.as_str(), "Black Friday Promo"));
    }
    if let Some(point) = points.get(5) {
        events.push((point.date.as_str(), "New Collection"));
    }
    events
}

fn render_overview<R: Rng>(output: &mut String, ctx: &mut RenderContext<'_, R>) {
    let _ = writeln!(output, "## Key Metrics");
    for kpi in mock::generate_kpi_data() {
        let _ = writeln!(
            output,
            "- {}: {} ({} {:+.1}% {})",
            kpi.label,
            kpi.value,
            kpi.trend.arrow(),
            kpi.change,
            kpi.description
        );
    }

    let points = mock::generate_revenue_trend(ctx.days, ctx.today, &mut *ctx.rng);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue Trend (last {} days)", ctx.days.max(0));

    if points.is_empty() {
        let _ = writeln!(output, "No revenue data for this window.");
        return;
    }

    let total_revenue: u64 = points.iter().map(|p| p.revenue).sum();
    let total_orders: u64 = points.iter().map(|p| p.orders).sum();
    let new_customers: u64 = points.iter().map(|p| p.new_customers).sum();
    let _ = writeln!(
        output,
        "Revenue R$ {} across {} orders, {} new customers",
        format_thousands(total_revenue),
        format_thousands(total_orders),
        format_thousands(new_customers)
    );
    for (date, label) in revenue_events(&points) {
        let _ = writeln!(output, "- Event marker {date}: {label}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "| Date | Revenue | Orders | New Customers |");
    let _ = writeln!(output, "|---|---:|---:|---:|");
    for point in &points {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            point.date,
            format_thousands(point.revenue),
            point.orders,
            point.new_customers
        );
    }

    let catalog = ctx.catalog;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Customer Segments");
    for share in metrics::segment_shares(&catalog.segments, catalog.total_active_customers) {
        let color = catalog
            .segment(&share.name)
            .map(|segment| segment.color.as_str())
            .unwrap_or("");
        let _ = writeln!(
            output,
            "- {} ({}): {} customers, {:.1}%",
            share.name,
            color,
            format_thousands(share.count),
            share.share
        );
    }
}

fn render_data(output: &mut String, catalog: &Catalog) {
    let _ = writeln!(output, "## Uploaded Files");
    let _ = writeln!(output, "| File | Size | Status | Records |");
    let _ = writeln!(output, "|---|---:|---|---:|");
    for file in &catalog.uploaded_files {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            file.name, file.size, file.status, file.records
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Preview");
    let _ = writeln!(output, "| Order ID | Customer ID | Date | Amount | Status |");
    let _ = writeln!(output, "|---|---|---|---:|---|");
    for order in &catalog.order_preview {
        let _ = writeln!(
            output,
            "| {} | {} | {} | R$ {:.2} | {} |",
            order.id, order.customer_id, order.date, order.amount, order.status
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Health Check");
    for check in &catalog.health_checks {
        let _ = writeln!(
            output,
            "- [{}] {}: {}",
            check.status.label(),
            check.check,
            check.message
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Field Mapping");
    for field in &catalog.required_fields {
        let mapped = if field.mapped { "mapped" } else { "unmapped" };
        let _ = writeln!(output, "- `{}` ({}): {}", field.name, field.field_type, mapped);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Exportable Datasets");
    for kind in crate::export::DatasetKind::ALL {
        let _ = writeln!(output, "- `{}`: {}", kind.name(), kind.columns().join(", "));
    }
}

fn scatter_summary(points: &[RfmScatterPoint]) -> BTreeMap<&str, (usize, f64, f64, f64)> {
    let mut summary: BTreeMap<&str, (usize, f64, f64, f64)> = BTreeMap::new();
    for point in points {
        let entry = summary
            .entry(point.segment.as_str())
            .or_insert((0, 0.0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += point.x;
        entry.2 += point.y;
        entry.3 += point.z;
    }
    summary
}

fn render_rfm<R: Rng>(output: &mut String, ctx: &mut RenderContext<'_, R>) {
    let catalog = ctx.catalog;
    let shares = metrics::segment_shares(&catalog.segments, catalog.total_active_customers);

    let _ = writeln!(output, "## Segment Distribution");
    let _ = writeln!(output, "| Segment | Customers | Share | Avg. Value |");
    let _ = writeln!(output, "|---|---:|---:|---:|");
    for share in &shares {
        let _ = writeln!(
            output,
            "| {} | {} | {:.1}% | R$ {:.0} |",
            share.name,
            format_thousands(share.count),
            share.share,
            share.avg_value
        );
    }

    let displayed_total: f64 = shares
        .iter()
        .map(|share| metrics::round_to(share.share, 1))
        .sum();
    let _ = writeln!(
        output,
        "Shares shown total {:.1}%.",
        metrics::round_to(displayed_total, 1)
    );

    let gap = metrics::catalog_share_gap(catalog);
    if gap != 0 {
        let _ = writeln!(
            output,
            "Segments account for {} of {} active customers (gap {}).",
            format_thousands(catalog.segment_count_total()),
            format_thousands(catalog.total_active_customers),
            gap
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Segment Details");
    for segment in &catalog.segments {
        let _ = writeln!(
            output,
            "- {} ({}): {}",
            segment.name, segment.color, segment.description
        );
    }

    let points = mock::generate_rfm_scatter(mock::SCATTER_POINT_COUNT, catalog, &mut *ctx.rng);
    let _ = writeln!(output);
    let _ = writeln!(output, "## RFM Scatter ({} customers sampled)", points.len());
    for (segment, (count, x, y, z)) in scatter_summary(&points) {
        let n = count as f64;
        let _ = writeln!(
            output,
            "- {}: {} points, mean recency {:.1}, frequency {:.1}, monetary {:.0}",
            segment,
            count,
            x / n,
            y / n,
            z / n
        );
    }
}

fn render_churn<R: Rng>(output: &mut String, ctx: &mut RenderContext<'_, R>) {
    let catalog = ctx.catalog;
    let _ = writeln!(output, "## Model Performance");
    let _ = writeln!(output, "- AUC Score: {:.2}", catalog.model_metrics.auc);
    let _ = writeln!(output, "- Precision: {:.2}", catalog.model_metrics.precision);
    let _ = writeln!(output, "- Recall: {:.2}", catalog.model_metrics.recall);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feature Importance");
    for feature in &catalog.feature_importance {
        let _ = writeln!(output, "- {}: {:.2}", feature.feature, feature.importance);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Calibration Curve");
    for point in &catalog.calibration {
        let _ = writeln!(
            output,
            "- predicted {:.1} -> observed {:.2}",
            point.predicted, point.actual
        );
    }

    let mut records = mock::generate_churn_risk_data(mock::CHURN_RECORD_COUNT, &mut *ctx.rng);
    records.sort_by(|a, b| {
        b.churn_prob
            .partial_cmp(&a.churn_prob)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## High Risk Customers");
    let _ = writeln!(output, "| ID | Customer | Segment | Churn Risk | Last Purchase | Total Spend |");
    let _ = writeln!(output, "|---|---|---|---:|---|---:|");
    for record in &records {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.0}% | {} | R$ {} |",
            record.id,
            record.name,
            record.rfm_segment,
            record.churn_prob * 100.0,
            record.last_purchase,
            format_thousands(record.total_spend as u64)
        );
    }
}

fn render_strategy<R: Rng>(
    output: &mut String,
    ctx: &mut RenderContext<'_, R>,
) -> anyhow::Result<()> {
    let catalog = ctx.catalog;
    let campaign = &ctx.campaign;
    let target = catalog
        .segment(&campaign.segment)
        .with_context(|| format!("unknown target segment `{}`", campaign.segment))?;

    let projection = metrics::simulate_roi(catalog, campaign.budget)
        .context("failed to simulate campaign ROI")?;

    let _ = writeln!(output, "## Campaign Configuration");
    let _ = writeln!(
        output,
        "- Target segment: {} ({} customers)",
        target.name,
        format_thousands(target.count)
    );
    let _ = writeln!(output, "- Discount: {}%", campaign.discount);
    let _ = writeln!(
        output,
        "- Budget: R$ {}",
        format_thousands(campaign.budget.round() as u64)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Projection");
    let _ = writeln!(
        output,
        "- Projected ROI: {:.0}% (R$ {:.2} return for every R$ 1 spent)",
        projection.roi * 100.0,
        projection.roi
    );
    let _ = writeln!(
        output,
        "- Projected revenue: R$ {}",
        format_thousands(projection.revenue.round() as u64)
    );
    let _ = writeln!(output, "- Saved customers: {}", projection.retained);
    let _ = writeln!(
        output,
        "- Marginal ROI at this spend: {:.1}x",
        projection.marginal_roi
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Baseline vs Strategy (next 30 days)");
    for lift in metrics::simulation_lift(catalog) {
        let _ = writeln!(
            output,
            "- {}: {:.0} -> {:.0} ({:+.0}, {:+.1}%)",
            lift.name, lift.baseline, lift.strategy, lift.incremental, lift.lift_pct
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Marginal ROI Curve");
    for level in &catalog.roi_curve {
        let _ = writeln!(
            output,
            "- R$ {}: {:.1}x",
            format_thousands(level.spend.round() as u64),
            level.marginal_roi
        );
    }

    let plan = ctx.ab_test;
    let required = plan
        .required_sample_size()
        .context("failed to size the A/B test")?;
    let powered = plan
        .powered_sample_size()
        .context("failed to size the A/B test")?;

    let _ = writeln!(output);
    let _ = writeln!(output, "## A/B Test Planner");
    let _ = writeln!(
        output,
        "- Baseline conversion {:.1}%, minimum detectable effect {:.1}%",
        plan.baseline_rate, plan.mde
    );
    let _ = writeln!(
        output,
        "- Required sample size per variant: {}",
        format_thousands(required)
    );
    let _ = writeln!(
        output,
        "- At {:.0}% power and {:.1}% significance: {}",
        plan.power * 100.0,
        plan.alpha * 100.0,
        format_thousands(powered)
    );

    Ok(())
}

fn render_insights(output: &mut String, catalog: &Catalog) {
    let _ = writeln!(output, "## Recommended Products");
    for item in &catalog.recommendations {
        let _ = writeln!(
            output,
            "- {} [{}] score {}: {}",
            item.product, item.category, item.score, item.reason
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sentiment Over Time");
    for week in &catalog.sentiment {
        let _ = writeln!(
            output,
            "- {}: +{} / ~{} / -{} (total {}%)",
            week.date,
            week.positive,
            week.neutral,
            week.negative,
            week.total()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sentiment Drivers");
    for driver in &catalog.sentiment_drivers {
        let _ = writeln!(
            output,
            "- {}: {:+}% (strength {}%)",
            driver.factor, driver.change, driver.strength
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Emerging Topics");
    for topic in &catalog.trend_topics {
        let mood = match topic.sentiment {
            Polarity::Positive => "positive",
            Polarity::Neutral => "neutral",
            Polarity::Negative => "negative",
        };
        let _ = writeln!(
            output,
            "- {}: {} mentions ({})",
            topic.topic,
            format_thousands(topic.volume as u64),
            mood
        );
    }
}

fn render_docs(output: &mut String, catalog: &Catalog) {
    let _ = writeln!(output, "## Methodology");
    let _ = writeln!(
        output,
        "- RFM segmentation scores customers on recency, frequency and monetary value and groups them into {} segments.",
        catalog.segments.len()
    );
    let _ = writeln!(
        output,
        "- Churn risk is a per-customer likelihood of attrition; model quality is summarised by AUC {:.2}.",
        catalog.model_metrics.auc
    );
    let _ = writeln!(
        output,
        "- Campaign ROI assumes R$ {:.2} of revenue per R$ 1 of budget and one saved customer per R$ {:.0}.",
        catalog.campaign_roi, catalog.retention_cost
    );
    let _ = writeln!(
        output,
        "- A/B sample sizes use n = 16 * p * (100 - p) / MDE^2 per variant."
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Glossary");
    let _ = writeln!(output, "- RFM: Recency, Frequency, Monetary.");
    let _ = writeln!(output, "- MDE: minimum detectable effect.");
    let _ = writeln!(output, "- GMV: gross merchandise value.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(12_450), "12,450");
        assert_eq!(format_thousands(1_245_390), "1,245,390");
    }

    #[test]
    fn overview_lists_kpis_and_events() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::Overview, &mut ctx).unwrap();

        assert!(page.starts_with("# Dashboard Overview"));
        assert!(page.contains("Total Revenue (GMV): R$ 1,245,390"));
        assert!(page.contains("Black Friday Promo"));
        assert!(page.contains("| Oct 19 |"));
    }

    #[test]
    fn overview_lists_segments_instead_of_sentiment() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(10);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::Overview, &mut ctx).unwrap();

        assert!(page.contains("## Customer Segments"));
        assert!(page.contains("- Champions (#10B981): 1,250 customers, 10.0%"));
        assert_eq!(page.matches(" customers, ").count(), catalog.segments.len());
        assert!(!page.contains("Customer Sentiment"));
    }

    #[test]
    fn data_page_shows_uploads_preview_and_health() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(11);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::DataManagement, &mut ctx).unwrap();

        assert!(page.contains("| olist_orders_dataset.csv |"));
        assert!(page.contains("| ORD-001 |"));
        assert!(page.contains("R$ 150.50"));
        assert!(page.contains("[WARN]"));
        assert!(page.contains("`customer_id`"));
        assert!(page.contains("## Exportable Datasets"));
        assert!(!page.contains("not applied"));
    }

    #[test]
    fn rfm_page_shows_one_decimal_shares() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::RfmAnalysis, &mut ctx).unwrap();

        assert!(page.contains("| Champions | 1,250 | 10.0% | R$ 360 |"));
        assert!(page.contains("| Potential Loyalist | 3,100 | 24.9% |"));
        assert!(!page.contains("gap"));
        assert!(page.contains("Shares shown total 100.1%."));
        assert!(page.contains("200 customers sampled"));
    }

    #[test]
    fn churn_page_lists_twenty_customers() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::ChurnPrediction, &mut ctx).unwrap();

        assert!(page.contains("AUC Score: 0.87"));
        assert_eq!(page.matches("| USR-").count(), 20);
    }

    #[test]
    fn strategy_page_reports_projection_and_sample_size() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(4);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::StrategyEngine, &mut ctx).unwrap();

        assert!(page.contains("Projected ROI: 325%"));
        assert!(page.contains("Saved customers: 100"));
        assert!(page.contains("Required sample size per variant: 5,100"));
        assert!(page.contains("Revenue: 120000 -> 145000 (+25000, +20.8%)"));
    }

    #[test]
    fn unknown_segment_renders_fallback_screen() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(5);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        ctx.campaign.segment = "Whales".to_string();

        assert!(render_page(Page::StrategyEngine, &mut ctx).is_err());
        let screen = render_with_fallback(Page::StrategyEngine, &mut ctx);
        assert!(screen.starts_with("# An unexpected error occurred"));
        assert!(screen.contains("unknown target segment `Whales`"));
    }

    #[test]
    fn zero_effect_falls_back_instead_of_panicking() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(6);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        ctx.ab_test.mde = 0.0;

        let screen = render_with_fallback(Page::StrategyEngine, &mut ctx);
        assert!(screen.contains("minimum detectable effect must be a positive number"));
    }

    #[test]
    fn not_found_lists_available_pages() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(7);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let page = render_page(Page::from_path("/nope"), &mut ctx).unwrap();
        assert!(page.contains("404"));
        assert!(page.contains("`/insights` Insights & Trends"));
    }

    #[test]
    fn report_contains_every_page() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(8);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let report = build_report(&mut ctx);
        for page in Page::ALL {
            assert!(report.contains(&format!("# {}", page.title())));
        }
    }

    #[test]
    fn rerendering_draws_new_mock_values() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(9);
        let mut ctx = RenderContext::new(&catalog, today(), &mut rng);
        let first = render_page(Page::ChurnPrediction, &mut ctx).unwrap();
        let second = render_page(Page::ChurnPrediction, &mut ctx).unwrap();
        assert_ne!(first, second);
    }
}
