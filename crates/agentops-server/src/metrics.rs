//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;

use agentops_log::LogError;

use crate::state::AppState;

/// Collect all metrics from the log and format as Prometheus text.
pub async fn collect_metrics(state: &AppState) -> Result<String, LogError> {
    let mut output = String::new();

    collect_log_metrics(state, &mut output).await?;
    collect_group_metrics(state, &mut output).await?;

    Ok(output)
}

async fn collect_log_metrics(state: &AppState, output: &mut String) -> Result<(), LogError> {
    let entries = state.log.entry_count().await?;

    writeln!(output, "# HELP agentops_log_entries Number of events in the log").ok();
    writeln!(output, "# TYPE agentops_log_entries gauge").ok();
    writeln!(output, "agentops_log_entries {entries}").ok();
    Ok(())
}

/// Pending (delivered, unacknowledged) entries per group and consumer.
async fn collect_group_metrics(state: &AppState, output: &mut String) -> Result<(), LogError> {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentops_group_pending Entries delivered to a consumer group but not acknowledged"
    )
    .ok();
    writeln!(output, "# TYPE agentops_group_pending gauge").ok();

    let mut per_consumer = String::new();
    for group in state.log.groups().await? {
        let pending = state.log.pending(&group).await?;
        writeln!(
            output,
            "agentops_group_pending{{group=\"{group}\"}} {}",
            pending.count
        )
        .ok();
        for (consumer, count) in &pending.consumers {
            writeln!(
                per_consumer,
                "agentops_consumer_pending{{group=\"{group}\",consumer=\"{consumer}\"}} {count}"
            )
            .ok();
        }
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentops_consumer_pending Pending entries owned by each consumer"
    )
    .ok();
    writeln!(output, "# TYPE agentops_consumer_pending gauge").ok();
    output.push_str(&per_consumer);
    Ok(())
}
