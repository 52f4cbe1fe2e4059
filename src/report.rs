use anyhow::{Context, Result};
use crate::outcome::ReconcileResult;

pub fn render_text(result: &ReconcileResult) -> String {
    let name_width = result.resources.iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("RESOURCE".len());

    let mut lines = vec![format!("{:<width$}  {:<9}  {}", "RESOURCE", "ACTION", "DETAIL", width = name_width)];

    for r in &result.resources {
        let subject = r.action.error().or(r.action.uuid()).unwrap_or_default();
        let detail = match r.action.deployment_id() {
            Some(deployment_id) => format!("{} (deployment {})", subject, deployment_id),
            None => subject.to_string(),
        };
        lines.push(format!("{:<width$}  {:<9}  {}", r.name, r.action.label(), detail, width = name_width));
    }

    lines.push(String::new());
    lines.push(format!(
        "created: {}, updated: {}, pruned: {}, failed: {}",
        result.total_created, result.total_updated, result.total_pruned, result.total_failed
    ));
    lines.push(if result.success { "Reconcile succeeded".to_string() } else { "Reconcile failed".to_string() });

    lines.join("\n")
}

pub fn render_json(result: &ReconcileResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize reconcile result")
}
