use std::collections::HashSet;

use crate::gitlab_types::WorkItem;

/// Combine overlapping listings into one duplicate-free list, newest first.
///
/// The first occurrence of a `(project_id, iid)` key across the
/// concatenated input wins, even when a later copy is fresher. The sort is
/// stable, so equal timestamps keep their input order.
pub fn merge_work_items<I>(lists: I) -> Vec<WorkItem>
where
    I: IntoIterator<Item = Vec<WorkItem>>,
{
    let mut seen = HashSet::new();
    let mut merged: Vec<WorkItem> = lists
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.key()))
        .collect();

    merged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    merged
}

#[cfg(test)]
pub(crate) fn work_item(project_id: u64, iid: u64, updated_at: &str) -> WorkItem {
    WorkItem {
        id: project_id * 1000 + iid,
        iid,
        project_id,
        title: format!("MR {project_id}!{iid}"),
        web_url: format!("https://gitlab.example.com/p{project_id}/-/merge_requests/{iid}"),
        updated_at: updated_at.parse().unwrap(),
        author: "Bob".to_string(),
        reference: format!("g/p{project_id}!{iid}"),
        head_pipeline: None,
    }
}
