//! Jobs tools: `list_jobs`, `get_job_status`, `get_job_details`.

use crate::db::{DEFAULT_RUN_LIMIT, DatabricksClient};
use crate::error::{DbxError, DbxResult};
use crate::models::{Job, JobRun, MAX_RESULT_ROWS};
use crate::tools::format::{
    NOT_AVAILABLE, format_timestamp, markdown_table, or_na, push_truncation_notice,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

/// Input for tools addressing a single job.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobIdInput {
    /// Numeric job ID, as shown by list_jobs
    pub job_id: i64,
}

/// Reject non-positive job ids before calling the API.
pub fn validate_job_id(job_id: i64) -> DbxResult<i64> {
    if job_id <= 0 {
        return Err(DbxError::invalid_input(format!(
            "job_id must be a positive integer, got {}",
            job_id
        )));
    }
    Ok(job_id)
}

/// Handler for jobs operations.
#[derive(Debug, Clone)]
pub struct JobsToolHandler {
    client: DatabricksClient,
}

impl JobsToolHandler {
    pub fn new(client: DatabricksClient) -> Self {
        Self { client }
    }

    pub async fn list_jobs(&self) -> DbxResult<String> {
        let listing = self.client.list_jobs(MAX_RESULT_ROWS).await?;
        debug!(count = listing.jobs.len(), has_more = listing.has_more, "Listed jobs");
        Ok(render_jobs(&listing.jobs, listing.has_more))
    }

    pub async fn get_job_status(&self, job_id: i64) -> DbxResult<String> {
        let job_id = validate_job_id(job_id)?;
        let runs = self.client.list_job_runs(job_id, DEFAULT_RUN_LIMIT).await?;
        Ok(render_runs(job_id, &runs))
    }

    pub async fn get_job_details(&self, job_id: i64) -> DbxResult<String> {
        let job_id = validate_job_id(job_id)?;
        let job = self.client.get_job(job_id).await?;
        Ok(render_job_details(job_id, &job))
    }
}

/// Job table, at most [`MAX_RESULT_ROWS`] rows, noting when more exist.
pub fn render_jobs(jobs: &[Job], has_more: bool) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_string();
    }
    let rows = jobs.iter().take(MAX_RESULT_ROWS).map(|job| {
        [
            job.job_id.to_string(),
            job.name().to_string(),
            or_na(job.creator_user_name.as_deref()).to_string(),
        ]
    });
    let mut out = markdown_table(&["Job ID", "Job Name", "Created By"], rows);
    if has_more || jobs.len() > MAX_RESULT_ROWS {
        push_truncation_notice(&mut out);
    }
    out
}

pub fn render_runs(job_id: i64, runs: &[JobRun]) -> String {
    if runs.is_empty() {
        return format!("No runs found for job ID {}.", job_id);
    }
    let rows = runs.iter().map(|run| {
        [
            run.run_id.to_string(),
            run.display_state().to_string(),
            format_timestamp(run.started_at()),
            format_timestamp(run.ended_at()),
            run.duration_secs()
                .map(|d| format!("{:.2}s", d))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ]
    });
    markdown_table(
        &["Run ID", "State", "Start Time", "End Time", "Duration"],
        rows,
    )
}

pub fn render_job_details(job_id: i64, job: &Job) -> String {
    let settings = &job.settings;
    let mut out = format!("## Job Details: {}\n\n", job.name());
    out.push_str(&format!("- **Job ID:** {}\n", job_id));
    out.push_str(&format!("- **Created:** {}\n", format_timestamp(job.created_at())));
    out.push_str(&format!(
        "- **Creator:** {}\n",
        or_na(job.creator_user_name.as_deref())
    ));
    if let Some(schedule) = &settings.schedule {
        out.push_str(&format!(
            "- **Schedule:** {} ({}, {})\n",
            or_na(schedule.quartz_cron_expression.as_deref()),
            or_na(schedule.timezone_id.as_deref()),
            or_na(schedule.pause_status.as_deref())
        ));
    }
    if let Some(max_runs) = settings.max_concurrent_runs {
        out.push_str(&format!("- **Max Concurrent Runs:** {}\n", max_runs));
    }
    if let Some(timeout) = settings.timeout_seconds.filter(|t| *t > 0) {
        out.push_str(&format!("- **Timeout:** {}s\n", timeout));
    }
    out.push('\n');

    if !settings.tasks.is_empty() {
        out.push_str("### Tasks:\n\n");
        let rows = settings.tasks.iter().map(|task| {
            [
                or_na(task.task_key.as_deref()).to_string(),
                or_na(task.task_type()).to_string(),
                or_na(task.description.as_deref()).to_string(),
            ]
        });
        out.push_str(&markdown_table(
            &["Task Key", "Task Type", "Description"],
            rows,
        ));
    }
    out
}
