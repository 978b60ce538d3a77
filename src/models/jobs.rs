//! Jobs, runs and cluster models.
//!
//! These mirror the Databricks REST JSON loosely: every field that the API may
//! omit is optional, so partially populated workspaces still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Convert a Databricks epoch-milliseconds timestamp to UTC.
///
/// Zero and negative values mean "not set" in these APIs.
pub fn millis_to_utc(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis
        .filter(|ms| *ms > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub job_id: i64,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub settings: JobSettings,
}

impl Job {
    pub fn name(&self) -> &str {
        self.settings.name.as_deref().unwrap_or("N/A")
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.created_time)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tasks: Vec<JobTask>,
    #[serde(default)]
    pub schedule: Option<JobSchedule>,
    #[serde(default)]
    pub max_concurrent_runs: Option<i64>,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSchedule {
    #[serde(default)]
    pub quartz_cron_expression: Option<String>,
    #[serde(default)]
    pub timezone_id: Option<String>,
    #[serde(default)]
    pub pause_status: Option<String>,
}

/// A task definition. The task payload (`notebook_task`, `spark_python_task`, ...)
/// stays in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobTask {
    #[serde(default)]
    pub task_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl JobTask {
    /// The first `*_task` key of the task object, in key order.
    pub fn task_type(&self) -> Option<&str> {
        self.extra
            .keys()
            .find(|k| k.ends_with("_task"))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: Option<String>,
    #[serde(default)]
    pub result_state: Option<String>,
    #[serde(default)]
    pub state_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRun {
    pub run_id: i64,
    #[serde(default)]
    pub state: RunState,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl JobRun {
    /// Result state once finished, otherwise the life-cycle state.
    pub fn display_state(&self) -> &str {
        self.state
            .result_state
            .as_deref()
            .or(self.state.life_cycle_state.as_deref())
            .unwrap_or("N/A")
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.start_time)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.end_time)
    }

    /// Wall-clock duration in seconds, when both ends are known.
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start > 0 && end >= start => {
                Some((end - start) as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunList {
    #[serde(default)]
    pub runs: Vec<JobRun>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Autoscale {
    pub min_workers: i64,
    pub max_workers: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub node_type_id: Option<String>,
    #[serde(default)]
    pub spark_version: Option<String>,
    #[serde(default)]
    pub num_workers: Option<i64>,
    #[serde(default)]
    pub autoscale: Option<Autoscale>,
}

impl ClusterInfo {
    /// Worker count, or the autoscale range.
    pub fn workers(&self) -> String {
        match (&self.autoscale, self.num_workers) {
            (Some(a), _) => format!("{}-{}", a.min_workers, a.max_workers),
            (None, Some(n)) => n.to_string(),
            (None, None) => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterList {
    #[serde(default)]
    pub clusters: Vec<ClusterInfo>,
}

/// Subset of `GET /api/2.0/sql/warehouses/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl WarehouseInfo {
    /// Deleted warehouses cannot accept statements; stopped ones auto-start.
    pub fn is_usable(&self) -> bool {
        !matches!(self.state.as_deref(), Some("DELETED" | "DELETING"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_tolerates_missing_fields() {
        let job: Job = serde_json::from_value(json!({ "job_id": 7 })).unwrap();
        assert_eq!(job.job_id, 7);
        assert_eq!(job.name(), "N/A");
        assert!(job.created_at().is_none());
        assert!(job.settings.tasks.is_empty());
    }

    #[test]
    fn test_task_type_is_first_task_key() {
        let task: JobTask = serde_json::from_value(json!({
            "task_key": "ingest",
            "depends_on": [],
            "notebook_task": { "notebook_path": "/Repos/etl/ingest" },
            "description": "Load raw files"
        }))
        .unwrap();
        assert_eq!(task.task_key.as_deref(), Some("ingest"));
        assert_eq!(task.task_type(), Some("notebook_task"));
        assert_eq!(task.description.as_deref(), Some("Load raw files"));
    }

    #[test]
    fn test_task_without_payload_has_no_type() {
        let task: JobTask = serde_json::from_value(json!({ "task_key": "noop" })).unwrap();
        assert_eq!(task.task_type(), None);
    }

    #[test]
    fn test_run_state_and_duration() {
        let run: JobRun = serde_json::from_value(json!({
            "run_id": 11,
            "state": { "life_cycle_state": "TERMINATED", "result_state": "SUCCESS" },
            "start_time": 1_700_000_000_000i64,
            "end_time": 1_700_000_012_345i64
        }))
        .unwrap();
        assert_eq!(run.display_state(), "SUCCESS");
        assert_eq!(run.duration_secs(), Some(12.345));
        assert_eq!(
            run.started_at().unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2023-11-14 22:13:20"
        );
    }

    #[test]
    fn test_running_run_uses_life_cycle_state() {
        let run: JobRun = serde_json::from_value(json!({
            "run_id": 12,
            "state": { "life_cycle_state": "RUNNING" },
            "start_time": 1_700_000_000_000i64,
            "end_time": 0
        }))
        .unwrap();
        assert_eq!(run.display_state(), "RUNNING");
        assert!(run.ended_at().is_none());
        assert!(run.duration_secs().is_none());
    }

    #[test]
    fn test_cluster_workers() {
        let fixed: ClusterInfo =
            serde_json::from_value(json!({ "cluster_id": "c1", "num_workers": 4 })).unwrap();
        assert_eq!(fixed.workers(), "4");
        let scaling: ClusterInfo = serde_json::from_value(json!({
            "cluster_id": "c2",
            "autoscale": { "min_workers": 2, "max_workers": 8 }
        }))
        .unwrap();
        assert_eq!(scaling.workers(), "2-8");
    }

    #[test]
    fn test_warehouse_usable() {
        let running = WarehouseInfo {
            id: "w".into(),
            state: Some("RUNNING".into()),
            ..WarehouseInfo::default()
        };
        let deleted = WarehouseInfo {
            state: Some("DELETED".into()),
            ..running.clone()
        };
        assert!(running.is_usable());
        assert!(!deleted.is_usable());
    }
}
