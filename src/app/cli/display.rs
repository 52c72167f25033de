//! CLI display utilities for formatting output

use std::fmt::Write as _;
use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::offlinehttp::RawResponse;
use crate::scheduler::{CostClass, ScanConfig, ScanPlan, ScanStrategy, ScanSummary};

const INDENT: &str = "  ";

fn heading(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().bold().to_string()
    } else {
        text.to_string()
    }
}

fn label(text: &str, use_color: bool) -> String {
    if use_color {
        text.blue().to_string()
    } else {
        text.to_string()
    }
}

/// Enumeration order of a plan, grouped by pool and outer element
pub fn format_plan(plan: &ScanPlan, requested: ScanStrategy, use_color: bool) -> String {
    let mut out = String::new();
    let strategy = if requested == plan.strategy() {
        plan.strategy().to_string()
    } else {
        format!("{} (resolved from {})", plan.strategy(), requested)
    };
    let _ = writeln!(out, "{} {}", heading("Strategy:", use_color), strategy);
    let _ = writeln!(out, "{} {}", heading("Work items:", use_color), plan.total());

    for class in [CostClass::Lightweight, CostClass::Headless] {
        let groups = plan.groups(class);
        if groups.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}", heading(&format!("[{} pool]", class), use_color));
        for group in groups {
            let _ = writeln!(out, "{}{}", INDENT, label(&group.key, use_color));
            for item in &group.items {
                let _ = writeln!(
                    out,
                    "{}{}{:>5}  {} -> {}",
                    INDENT,
                    INDENT,
                    item.sequence,
                    item.template_id(),
                    item.target.raw
                );
            }
        }
    }
    out
}

/// Status line, headers and body of a decoded response
pub fn format_response(response: &RawResponse, use_color: bool) -> String {
    let mut out = String::new();
    let status = format!(
        "{} {} {}",
        response.version, response.status, response.reason
    );
    let _ = writeln!(out, "{}", heading(status.trim_end(), use_color));
    for (name, value) in &response.headers {
        let _ = writeln!(out, "{}: {}", label(name, use_color), value);
    }
    let _ = writeln!(out);
    out.push_str(&response.body);
    out
}

pub fn response_json(response: &RawResponse) -> serde_json::Value {
    let headers: Vec<_> = response
        .headers
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    json!({
        "version": response.version.to_string(),
        "status": response.status,
        "reason": response.reason,
        "headers": headers,
        "body": response.body,
    })
}

/// Effective configuration as `key = value` lines
pub fn format_config(config: &ScanConfig, source: Option<&Path>, use_color: bool) -> String {
    let mut out = String::new();
    let source = source.map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    let _ = writeln!(out, "{} {}", heading("Configuration:", use_color), source);

    let concurrency = config.concurrency();
    let network = config.network();
    let rate_limit = config.rate_limit().map_or_else(
        || "unlimited".to_string(),
        |limit| format!("{} per {:?}", limit.max_tokens, limit.interval),
    );
    let per_host = config.per_host_rate_limit().map_or_else(
        || "off".to_string(),
        |limit| format!("{} per {:?}", limit.max_tokens, limit.interval),
    );
    let track_errors = if network.track_errors.is_empty() {
        "all".to_string()
    } else {
        network.track_errors.join(", ")
    };
    let interactions = config.interactions().map_or_else(
        || "off".to_string(),
        |i| {
            format!(
                "poll {:?}, eviction {:?}, cooldown {:?}",
                i.poll_interval, i.token_timeout, i.cooldown
            )
        },
    );
    let stats = config
        .stats_interval()
        .map_or_else(|| "off".to_string(), |i| format!("{:?}", i));

    let rows: [(&str, String); 17] = [
        ("mode", config.mode().to_string()),
        ("scan-strategy", config.strategy().to_string()),
        ("auto-crossover-ratio", config.auto_crossover_ratio().to_string()),
        ("template-concurrency", concurrency.template.to_string()),
        ("host-concurrency", concurrency.host.to_string()),
        (
            "headless-template-concurrency",
            concurrency.headless_template.to_string(),
        ),
        ("headless-host-concurrency", concurrency.headless_host.to_string()),
        ("rate-limit", rate_limit),
        ("per-host-rate-limit", per_host),
        ("timeout", format!("{:?}", network.timeout)),
        ("retries", network.retries.to_string()),
        ("max-host-error", network.max_host_error.to_string()),
        ("track-error", track_errors),
        ("no-max-host-error", network.disable_max_host_error.to_string()),
        ("interactions", interactions),
        ("stats-interval", stats),
        ("verbose", config.verbose().to_string()),
    ];
    for (key, value) in rows {
        let _ = writeln!(out, "{}{:<30} {}", INDENT, label(key, use_color), value);
    }
    out
}

/// One-paragraph result of a finished scan
pub fn format_summary(summary: &ScanSummary, use_color: bool) -> String {
    let stats = &summary.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({}) in {:.2?}",
        heading("Scan", use_color),
        summary.state,
        summary.strategy,
        summary.elapsed
    );
    let _ = writeln!(
        out,
        "{}{} of {} finished: {} completed, {} matched, {} failed, {} skipped, {} canceled",
        INDENT,
        stats.finished(),
        stats.total,
        stats.completed,
        stats.matched,
        stats.failed,
        stats.host_skipped,
        stats.canceled
    );
    if summary.emitter.failed > 0 {
        let _ = writeln!(out, "{}{} outcomes could not be emitted", INDENT, summary.emitter.failed);
    }
    out
}
