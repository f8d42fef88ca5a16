// src/core/scoring.rs

//! Aggregation of the per-category analyses into the final report.

use crate::config::AggregateScoring;
use crate::core::errors::AnalysisFailure;
use crate::core::models::{
    clamp_score, AnalyzeOptions, Category, CategoryAnalysis, CategoryResults, Grade, ReportFinding, SecurityReport,
    SeverityStats, Severity,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Turns one settled analyzer outcome into a category result. Failures become
/// a zero-score placeholder carrying an `analysis_error` finding.
pub fn settle(category: Category, outcome: Result<CategoryAnalysis, AnalysisFailure>) -> CategoryAnalysis {
    match outcome {
        Ok(analysis) => analysis,
        Err(failure) => {
            warn!(category = %category, reason = %failure.reason, "Analyzer failed, substituting zero score.");
            CategoryAnalysis::failed(category, &failure.reason)
        }
    }
}

fn weight_of(category: Category, weights: &AggregateScoring) -> f64 {
    match category {
        Category::Ssl => weights.ssl_weight,
        Category::Headers => weights.headers_weight,
        Category::Cookies => weights.cookies_weight,
        Category::Html => weights.html_weight,
    }
}

/// Weighted overall score.
///
/// Weights of the categories that ran are re-normalised to sum to one, then
/// `min(cap, penalty * criticals)` and the non-HTTPS penalty are subtracted.
pub fn overall_score(categories: &CategoryResults, is_https: bool, weights: &AggregateScoring) -> u8 {
    let total_weight: f64 = categories.iter().map(|c| weight_of(c.category, weights)).sum();
    let weighted = if total_weight > 0.0 {
        categories
            .iter()
            .map(|c| weight_of(c.category, weights) / total_weight * f64::from(c.score))
            .sum()
    } else {
        0.0
    };

    let criticals = categories
        .iter()
        .flat_map(|c| c.findings.iter())
        .filter(|f| f.severity == Severity::Critical)
        .count();
    let critical_penalty = (weights.critical_penalty * criticals as f64).min(weights.critical_penalty_cap);
    let https_penalty = if is_https { 0.0 } else { weights.non_https_penalty };

    let raw = weighted - critical_penalty - https_penalty;
    debug!(weighted, criticals, critical_penalty, https_penalty, raw, "Overall score computed.");
    clamp_score(raw)
}

/// Everything about the fetch the report needs besides the category results.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub url: String,
    pub final_url: String,
    pub is_https: bool,
    pub status: u16,
    pub redirect_count: u32,
    pub options: AnalyzeOptions,
    pub timestamp: DateTime<Utc>,
}

pub fn build_report(context: ReportContext, categories: CategoryResults, weights: &AggregateScoring) -> SecurityReport {
    let overall = overall_score(&categories, context.is_https, weights);

    let mut findings = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();
    let mut stats = SeverityStats::default();

    for analysis in categories.iter() {
        for finding in &analysis.findings {
            stats.record(finding.severity);
            findings.push(ReportFinding { category: analysis.category, finding: finding.clone() });
        }
        for recommendation in &analysis.recommendations {
            if !recommendations.contains(recommendation) {
                recommendations.push(recommendation.clone());
            }
        }
    }

    let grade = Grade::from_score(overall);
    info!(
        url = context.url.as_str(),
        score = overall,
        grade = %grade,
        findings = stats.total,
        "Report assembled."
    );

    SecurityReport {
        url: context.url,
        final_url: context.final_url,
        is_https: context.is_https,
        status: context.status,
        redirect_count: context.redirect_count,
        overall_score: overall,
        grade,
        categories,
        findings,
        recommendations,
        stats,
        options: context.options,
        timestamp: context.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{CategoryDetails, HtmlDetails, VulnerabilityFinding};

    fn analysis(category: Category, score: f64, findings: Vec<VulnerabilityFinding>) -> CategoryAnalysis {
        CategoryAnalysis::new(category, score, findings, CategoryDetails::Html(HtmlDetails::default()))
    }

    fn all(scores: [f64; 4]) -> CategoryResults {
        let mut results = CategoryResults::default();
        for (category, score) in [Category::Ssl, Category::Headers, Category::Cookies, Category::Html]
            .into_iter()
            .zip(scores)
        {
            results.set(analysis(category, score, Vec::new()));
        }
        results
    }

    fn context(is_https: bool) -> ReportContext {
        ReportContext {
            url: "https://example.com/".to_string(),
            final_url: "https://example.com/".to_string(),
            is_https,
            status: 200,
            redirect_count: 0,
            options: AnalyzeOptions::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_weighted_average() {
        let weights = AggregateScoring::default();
        assert_eq!(overall_score(&all([100.0; 4]), true, &weights), 100);
        // 0.25*80 + 0.35*60 + 0.25*100 + 0.15*40 = 72
        assert_eq!(overall_score(&all([80.0, 60.0, 100.0, 40.0]), true, &weights), 72);
    }

    #[test]
    fn test_penalties() {
        let weights = AggregateScoring::default();
        assert_eq!(overall_score(&all([100.0; 4]), false, &weights), 85);

        let mut results = all([100.0; 4]);
        let criticals = (0..5)
            .map(|i| VulnerabilityFinding::new(&format!("c{i}"), Severity::Critical, "bad"))
            .collect();
        results.set(analysis(Category::Cookies, 100.0, criticals));
        // capped at 30
        assert_eq!(overall_score(&results, true, &weights), 70);
    }

    #[test]
    fn test_score_is_clamped() {
        let weights = AggregateScoring::default();
        let mut results = all([0.0; 4]);
        results.set(analysis(
            Category::Ssl,
            0.0,
            vec![VulnerabilityFinding::new("x", Severity::Critical, "bad")],
        ));
        assert_eq!(overall_score(&results, false, &weights), 0);
    }

    #[test]
    fn test_disabled_categories_renormalise() {
        let weights = AggregateScoring::default();
        let mut results = CategoryResults::default();
        results.set(analysis(Category::Headers, 80.0, Vec::new()));
        assert_eq!(overall_score(&results, true, &weights), 80);
        assert_eq!(overall_score(&CategoryResults::default(), true, &weights), 0);
    }

    #[test]
    fn test_settle_replaces_failure() {
        let settled = settle(Category::Html, Err(AnalysisFailure::new(Category::Html, "panicked")));
        assert_eq!(settled.score, 0);
        assert_eq!(settled.findings[0].kind, "analysis_error");
    }

    #[test]
    fn test_report_flattens_and_deduplicates() {
        let shared = VulnerabilityFinding::new("a", Severity::High, "x").with_remediation("Use HTTPS everywhere");
        let mut results = CategoryResults::default();
        results.set(analysis(Category::Ssl, 50.0, vec![shared.clone()]));
        results.set(analysis(
            Category::Headers,
            50.0,
            vec![shared, VulnerabilityFinding::new("b", Severity::Info, "y")],
        ));

        let report = build_report(context(true), results, &AggregateScoring::default());
        assert_eq!(report.findings.len(), 3);
        assert_eq!(report.findings[0].category, Category::Ssl);
        assert_eq!(report.recommendations, vec!["Use HTTPS everywhere".to_string()]);
        assert_eq!(report.stats.high, 2);
        assert_eq!(report.stats.info, 1);
        assert_eq!(report.stats.total, 3);
        assert_eq!(report.overall_score, 50);
        assert_eq!(report.grade, Grade::D);
    }
}
