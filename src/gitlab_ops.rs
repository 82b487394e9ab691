use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::gitlab_rest::{fetch_json, Endpoints, Fetcher};
use crate::gitlab_types::{BuildStatus, WorkItem};

/// Fetch several JSON array listings with at most `concurrency` requests in
/// flight.
///
/// The result has one entry per url, in url order. A failed listing is
/// logged and contributes an empty list. Dropping the returned future
/// aborts every request still running.
pub async fn fetch_lists_concurrent<T>(
    fetcher: Arc<dyn Fetcher>,
    urls: Vec<String>,
    concurrency: usize,
) -> Vec<Vec<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut results: Vec<Vec<T>> = urls.iter().map(|_| Vec::new()).collect();
    let mut join_set: JoinSet<(usize, Vec<T>)> = JoinSet::new();

    for (idx, url) in urls.into_iter().enumerate() {
        let fetcher = fetcher.clone();
        let sem_clone = sem.clone();
        join_set.spawn(async move {
            // held until the request finishes
            let _permit = sem_clone.acquire_owned().await;

            match fetch_json::<Vec<T>>(fetcher.as_ref(), &url).await {
                Ok(items) => (idx, items),
                Err(e) => {
                    warn!("GET {} failed, treating as empty: {}", url, e);
                    (idx, Vec::new())
                }
            }
        });
    }

    while let Some(res) = join_set.join_next().await {
        match res {
            Ok((idx, items)) => results[idx] = items,
            Err(e) => error!("task join error: {}", e),
        }
    }

    results
}

/// Attach the latest pipeline to every merge request that came back
/// without an inline `head_pipeline`.
///
/// Items keep their count and order. A failed or empty lookup leaves the
/// status absent.
pub async fn enrich(
    fetcher: Arc<dyn Fetcher>,
    endpoints: &Endpoints,
    mut items: Vec<WorkItem>,
    concurrency: usize,
) -> Vec<WorkItem> {
    let (indices, urls): (Vec<usize>, Vec<String>) = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.head_pipeline.is_none())
        .map(|(idx, item)| (idx, endpoints.merge_request_pipelines(item.project_id, item.iid)))
        .unzip();

    if urls.is_empty() {
        return items;
    }

    let lookups: Vec<Vec<BuildStatus>> = fetch_lists_concurrent(fetcher, urls, concurrency).await;
    for (idx, pipelines) in indices.into_iter().zip(lookups) {
        items[idx].head_pipeline = pipelines.into_iter().next();
    }

    items
}
