use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::GitLabConfig;
use crate::gitlab_ops::{enrich, fetch_lists_concurrent};
use crate::gitlab_rest::{fetch_json, Endpoints, Fetcher, Role};
use crate::gitlab_types::{Notification, WorkItem};
use crate::merge::merge_work_items;
use crate::models::Dashboard;

/// Builds a fresh [`Dashboard`] from live GitLab state on every call.
pub struct Aggregator {
    fetcher: Arc<dyn Fetcher>,
    endpoints: Endpoints,
    username: String,
    teammates: Vec<String>,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>, cfg: &GitLabConfig) -> Self {
        Self {
            fetcher,
            endpoints: Endpoints::new(&cfg.url, cfg.per_page),
            username: cfg.username.clone(),
            teammates: cfg.teammates.clone(),
            concurrency: cfg.concurrency,
        }
    }

    pub async fn collect(&self) -> Dashboard {
        let started = Instant::now();

        let (my_items, team_items, notifications) =
            tokio::join!(self.my_items(), self.team_items(), self.notifications());

        info!(
            "Dashboard for {}: {} open MRs, {} team MRs, {} todos in {:?}",
            self.username,
            my_items.len(),
            team_items.len(),
            notifications.len(),
            started.elapsed()
        );

        Dashboard {
            my_items,
            team_items,
            notifications,
        }
    }

    /// Assigned to or awaiting review from the configured user.
    async fn my_items(&self) -> Vec<WorkItem> {
        let urls = vec![
            self.endpoints.merge_requests(Role::Assignee, &self.username),
            self.endpoints.merge_requests(Role::Reviewer, &self.username),
        ];
        self.merged_and_enriched(urls).await
    }

    /// Authored by or assigned to any teammate.
    async fn team_items(&self) -> Vec<WorkItem> {
        if self.teammates.is_empty() {
            return Vec::new();
        }

        let urls: Vec<String> = self
            .teammates
            .iter()
            .flat_map(|user| {
                [Role::Author, Role::Assignee]
                    .map(|role| self.endpoints.merge_requests(role, user))
            })
            .collect();
        self.merged_and_enriched(urls).await
    }

    async fn merged_and_enriched(&self, urls: Vec<String>) -> Vec<WorkItem> {
        let lists: Vec<Vec<WorkItem>> =
            fetch_lists_concurrent(self.fetcher.clone(), urls, self.concurrency).await;
        let merged = merge_work_items(lists);
        enrich(self.fetcher.clone(), &self.endpoints, merged, self.concurrency).await
    }

    async fn notifications(&self) -> Vec<Notification> {
        let url = self.endpoints.todos();
        match fetch_json::<Vec<Notification>>(self.fetcher.as_ref(), &url).await {
            Ok(todos) => todos,
            Err(e) => {
                warn!("GET {} failed, treating as empty: {}", url, e);
                Vec::new()
            }
        }
    }
}
