//! Final strategy assembly.

use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};

use crate::chain::ChainReport;

/// Build the consolidated strategy document from a completed chain run.
pub fn assemble_strategy(report: &ChainReport, elapsed: Duration) -> Value {
    let ctx = &report.context;
    json!({
        "startup_name": ctx.get("startupName").cloned().unwrap_or(Value::Null),
        "funding_stage": ctx.get("funding_stage_report").cloned().unwrap_or_else(|| json!({})),
        "raise_amount": ctx.get("raise_amount_report").cloned().unwrap_or_else(|| json!({})),
        "investor_type": ctx.get("investor_type_report").cloned().unwrap_or_else(|| json!({})),
        "runway": ctx.get("runway_report").cloned().unwrap_or_else(|| json!({})),
        "financial_priority": ctx.get("financial_priority_report").cloned().unwrap_or_else(|| json!({})),
        "summary": summary(report),
        "metadata": {
            "execution_time_seconds": elapsed.as_secs_f64(),
            "timestamp": Utc::now().to_rfc3339(),
            "agents_executed": report.executions.len(),
            "execution_log": &report.executions,
            "input_tokens": report.total_input_tokens,
            "output_tokens": report.total_output_tokens,
            "estimated_cost_usd": report.estimated_cost.to_string(),
        }
    })
}

/// Human-readable one-line summary of the analysis.
fn summary(report: &ChainReport) -> String {
    let ctx = &report.context;
    format!(
        "Based on the analysis, {} should target {} stage funding of {} from {}. \
         This will provide approximately {} months of runway to achieve key milestones.",
        ctx.get_str("startupName", "the startup"),
        ctx.get_str("funding_stage", "N/A"),
        ctx.get_str("recommended_amount", "N/A"),
        ctx.get_str("primary_investor_type", "N/A"),
        ctx.get_str("estimated_runway_months", "N/A"),
    )
}
