//! Jobs and Clusters REST endpoints.

use crate::db::client::DatabricksClient;
use crate::error::DbxResult;
use crate::models::{ClusterInfo, ClusterList, Job, JobList, JobRun, RunList};
use tracing::{debug, warn};

/// Jobs gathered by `list_jobs`.
#[derive(Debug, Default)]
pub struct JobListing {
    pub jobs: Vec<Job>,
    /// The workspace holds jobs beyond `jobs`
    pub has_more: bool,
}

/// Page size for `jobs/list` (API maximum).
const JOBS_PAGE_SIZE: u32 = 100;

/// Upper bound on pages followed by `list_jobs`.
pub const MAX_JOB_PAGES: usize = 20;

/// Default number of runs returned by `list_job_runs`.
pub const DEFAULT_RUN_LIMIT: u32 = 25;

impl DatabricksClient {
    /// List up to `limit` jobs, following `next_page_token`.
    ///
    /// `has_more` is set when jobs were left unread, whether cut at `limit`
    /// or at the page limit.
    pub async fn list_jobs(&self, limit: usize) -> DbxResult<JobListing> {
        let mut jobs = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..MAX_JOB_PAGES {
            let mut query = vec![("limit", JOBS_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let list: JobList = self.get_json("/api/2.1/jobs/list", &query).await?;
            debug!(page, count = list.jobs.len(), "Fetched jobs page");
            jobs.extend(list.jobs);

            if jobs.len() > limit {
                jobs.truncate(limit);
                return Ok(JobListing {
                    jobs,
                    has_more: true,
                });
            }
            let next = list.next_page_token.filter(|t| !t.is_empty() && list.has_more);
            match next {
                Some(token) if jobs.len() < limit => page_token = Some(token),
                next => {
                    return Ok(JobListing {
                        jobs,
                        has_more: next.is_some(),
                    });
                }
            }
        }

        warn!(
            pages = MAX_JOB_PAGES,
            jobs = jobs.len(),
            "Job listing stopped at page limit"
        );
        Ok(JobListing {
            jobs,
            has_more: true,
        })
    }

    /// Most recent runs of a job, newest first.
    pub async fn list_job_runs(&self, job_id: i64, limit: u32) -> DbxResult<Vec<JobRun>> {
        let query = [
            ("job_id", job_id.to_string()),
            ("limit", limit.clamp(1, 25).to_string()),
        ];
        let list: RunList = self.get_json("/api/2.1/jobs/runs/list", &query).await?;
        Ok(list.runs)
    }

    /// Full definition of one job.
    pub async fn get_job(&self, job_id: i64) -> DbxResult<Job> {
        self.get_json("/api/2.1/jobs/get", &[("job_id", job_id.to_string())])
            .await
    }

    /// All clusters visible to the token.
    pub async fn list_clusters(&self) -> DbxResult<Vec<ClusterInfo>> {
        let list: ClusterList = self.get_json("/api/2.0/clusters/list", &[]).await?;
        Ok(list.clusters)
    }
}
