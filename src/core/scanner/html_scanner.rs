// src/core/scanner/html_scanner.rs

use tracing::{debug, info};

use crate::config::HtmlScoring;
use crate::core::knowledge_base::finding;
use crate::core::models::{Category, CategoryAnalysis, CategoryDetails, HtmlDetails, Severity, VulnerabilityFinding};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parses `css` and returns every matching element of `doc`.
fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).collect(),
        Err(e) => {
            debug!(selector = css, error = ?e, "Invalid selector.");
            Vec::new()
        }
    }
}

fn has_descendant(element: &ElementRef<'_>, css: &str) -> bool {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

/// Resolves an attribute URL against the page; unparseable values yield `None`.
fn resolve(page: Option<&Url>, reference: &str) -> Option<Url> {
    match page {
        Some(base) => base.join(reference.trim()).ok(),
        None => Url::parse(reference.trim()).ok(),
    }
}

struct HtmlGrader<'a> {
    scoring: &'a HtmlScoring,
    findings: Vec<VulnerabilityFinding>,
    penalty: i32,
}

impl HtmlGrader<'_> {
    fn push(&mut self, code: &str, severity: Severity, message: String) {
        debug!(code, severity = %severity, "HTML finding.");
        self.penalty += self.scoring.penalties.for_severity(severity);
        self.findings.push(finding(code, severity, message));
    }
}

/// Scans the fetched markup for insecure forms, scripts and frames.
///
/// The raw score starts at `scoring.start_score` and is not floored; the
/// published category score is clamped like every other category.
pub fn run_html_scan(body: &str, page_url: &str, scoring: &HtmlScoring) -> CategoryAnalysis {
    info!(target = page_url, bytes = body.len(), "Starting HTML scan.");

    let mut grader = HtmlGrader { scoring, findings: Vec::new(), penalty: 0 };

    if body.trim().is_empty() || !body.contains('<') {
        grader.push("no_html_content", Severity::Info, "The response body contains no HTML markup".to_string());
        let details = HtmlDetails { raw_score: scoring.start_score, ..HtmlDetails::default() };
        return CategoryAnalysis::new(
            Category::Html,
            f64::from(scoring.start_score),
            grader.findings,
            CategoryDetails::Html(details),
        );
    }

    let page = Url::parse(page_url).ok();
    let page_https = page.as_ref().map(|u| u.scheme() == "https").unwrap_or(false);
    let page_host = page.as_ref().and_then(|u| u.host_str()).map(str::to_string);
    let document = Html::parse_document(body);
    let mut details = HtmlDetails::default();

    // Forms
    for form in select_all(&document, "form") {
        details.forms += 1;
        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .and_then(|a| resolve(page.as_ref(), a))
            .or_else(|| page.clone());
        let action_label = action.as_ref().map(Url::to_string).unwrap_or_default();
        let action_https = action.as_ref().map(|u| u.scheme() == "https").unwrap_or(page_https);
        let method = form.value().attr("method").map(|m| m.trim().to_ascii_lowercase());

        if has_descendant(&form, "input[type=password]") {
            details.password_forms += 1;
            if !page_https || !action_https {
                grader.push(
                    "insecure_password_form",
                    Severity::Critical,
                    format!("Password form submits to {} without HTTPS", action_label),
                );
            }
            if method.as_deref() == Some("get") {
                grader.push(
                    "password_form_get",
                    Severity::Critical,
                    "Password form uses method=GET".to_string(),
                );
            }
        } else if page_https && !action_https {
            grader.push(
                "insecure_form_action",
                Severity::Medium,
                format!("Form on an HTTPS page submits to {}", action_label),
            );
        }
    }

    // Scripts
    details.scripts = select_all(&document, "script").len();
    for script in select_all(&document, "script[src]") {
        let Some(src) = script.value().attr("src").and_then(|s| resolve(page.as_ref(), s)) else {
            continue;
        };
        let external = src.host_str().map(str::to_string) != page_host;
        if external {
            details.external_scripts += 1;
        }
        if src.scheme() == "http" && (external || page_https) {
            grader.push(
                "mixed_content_script",
                Severity::High,
                format!("Script loaded over plain HTTP: {}", src),
            );
        }
    }

    // Frames
    for frame in select_all(&document, "iframe[src]") {
        details.iframes += 1;
        if let Some(src) = frame.value().attr("src").and_then(|s| resolve(page.as_ref(), s)) {
            if src.scheme() == "http" {
                grader.push(
                    "mixed_content_iframe",
                    Severity::Medium,
                    format!("Frame loaded over plain HTTP: {}", src),
                );
            }
        }
    }

    // Charset
    details.has_charset = !select_all(&document, "meta[charset]").is_empty()
        || select_all(&document, "meta[http-equiv]").iter().any(|meta| {
            meta.value().attr("http-equiv").is_some_and(|v| v.eq_ignore_ascii_case("content-type"))
                && meta.value().attr("content").is_some_and(|c| c.to_ascii_lowercase().contains("charset"))
        });
    if !details.has_charset {
        grader.push("missing_charset", Severity::Low, "The page does not declare a character set".to_string());
    }

    // Reverse tabnabbing
    let unsafe_links = select_all(&document, "a[target]")
        .iter()
        .filter(|link| {
            let value = link.value();
            let blank = value.attr("target").is_some_and(|t| t.eq_ignore_ascii_case("_blank"));
            let rel = value.attr("rel").unwrap_or_default().to_ascii_lowercase();
            blank && !rel.contains("noopener") && !rel.contains("noreferrer")
        })
        .count();
    if unsafe_links > 0 {
        grader.push(
            "unsafe_target_blank",
            Severity::Low,
            format!("{} links open a new tab without rel=\"noopener\"", unsafe_links),
        );
    }

    details.raw_score = scoring.start_score - grader.penalty;
    debug!(raw_score = details.raw_score, penalty = grader.penalty, "HTML score computed.");

    let analysis = CategoryAnalysis::new(
        Category::Html,
        f64::from(details.raw_score),
        grader.findings,
        CategoryDetails::Html(details),
    );
    info!(score = analysis.score, findings = analysis.findings.len(), "HTML scan finished.");
    analysis
}
