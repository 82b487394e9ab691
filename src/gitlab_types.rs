use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identity of a merge request across endpoints. The global `id` is not
/// reliable for this, `(project_id, iid)` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItemKey {
    pub project_id: u64,
    pub iid: u64,
}

/// One open merge request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkItem {
    pub id: u64,
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    pub web_url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "parse_author")]
    pub author: String,
    #[serde(default, rename(deserialize = "references"), deserialize_with = "parse_reference")]
    pub reference: String,
    #[serde(default)]
    pub head_pipeline: Option<BuildStatus>,
}

impl WorkItem {
    pub fn key(&self) -> WorkItemKey {
        WorkItemKey {
            project_id: self.project_id,
            iid: self.iid,
        }
    }
}

/// Latest pipeline run tied to a merge request. `status` is passed
/// through as GitLab reports it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BuildStatus {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub web_url: String,
}

/// One pending to-do entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub id: u64,
    #[serde(default)]
    pub action_name: String,
    #[serde(default)]
    pub target_type: String,
    #[serde(default, deserialize_with = "parse_target")]
    pub target: TodoTarget,
    #[serde(default, rename(deserialize = "project"), deserialize_with = "parse_project_name")]
    pub project_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TodoTarget {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub web_url: String,
}

#[derive(Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct References {
    #[serde(default)]
    full: Option<String>,
}

/// `author: {"name": ...}` flattened to the display name.
fn parse_author<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let named: Option<NamedRef> = Deserialize::deserialize(deserializer)?;
    Ok(named.and_then(|n| n.name).unwrap_or_default())
}

fn parse_project_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    parse_author(deserializer)
}

fn parse_target<'de, D>(deserializer: D) -> Result<TodoTarget, D::Error>
where
    D: Deserializer<'de>,
{
    let target: Option<TodoTarget> = Deserialize::deserialize(deserializer)?;
    Ok(target.unwrap_or_default())
}

/// `references: {"full": "group/project!12"}` flattened to the full reference.
fn parse_reference<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let refs: Option<References> = Deserialize::deserialize(deserializer)?;
    Ok(refs.and_then(|r| r.full).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_request_with_inline_pipeline() {
        let item: WorkItem = serde_json::from_value(json!({
            "id": 9001,
            "iid": 12,
            "project_id": 7,
            "title": "Add retry budget",
            "web_url": "https://gitlab.example.com/g/p/-/merge_requests/12",
            "updated_at": "2024-01-02T10:00:00.000Z",
            "author": {"name": "Bob", "username": "bob"},
            "references": {"short": "!12", "full": "g/p!12"},
            "head_pipeline": {"id": 55, "status": "running", "web_url": "https://gitlab.example.com/g/p/-/pipelines/55", "sha": "abc"}
        }))
        .unwrap();

        assert_eq!(item.key(), WorkItemKey { project_id: 7, iid: 12 });
        assert_eq!(item.author, "Bob");
        assert_eq!(item.reference, "g/p!12");
        let pipeline = item.head_pipeline.unwrap();
        assert_eq!(pipeline.id, 55);
        assert_eq!(pipeline.status, "running");
    }

    #[test]
    fn null_or_missing_nested_fields() {
        let item: WorkItem = serde_json::from_value(json!({
            "id": 1,
            "iid": 2,
            "project_id": 3,
            "title": "t",
            "web_url": "u",
            "updated_at": "2024-01-01T09:00:00Z",
            "author": null,
            "head_pipeline": null
        }))
        .unwrap();

        assert_eq!(item.author, "");
        assert_eq!(item.reference, "");
        assert!(item.head_pipeline.is_none());
    }

    #[test]
    fn null_target_and_project_keep_the_rest_of_the_todos() {
        let todos: Vec<Notification> = serde_json::from_value(json!([
            {
                "id": 1,
                "action_name": "assigned",
                "target_type": "MergeRequest",
                "target": {"title": "Fix the build", "web_url": "u1"},
                "project": {"name": "p"},
                "created_at": "2024-03-05T08:15:00Z"
            },
            {
                "id": 2,
                "action_name": "mentioned",
                "target_type": "Issue",
                "target": null,
                "project": null,
                "created_at": "2024-03-06T08:15:00Z"
            }
        ]))
        .unwrap();

        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].target.title, "Fix the build");
        assert_eq!(todos[1].target, TodoTarget::default());
        assert_eq!(todos[1].project_name, "");
    }

    #[test]
    fn unknown_pipeline_status_is_kept_verbatim() {
        let status: BuildStatus = serde_json::from_value(json!({
            "id": 4,
            "status": "waiting_for_resource",
            "web_url": "u"
        }))
        .unwrap();

        assert_eq!(status.status, "waiting_for_resource");
    }

    #[test]
    fn todo_entry() {
        let todo: Notification = serde_json::from_value(json!({
            "id": 102,
            "project": {"id": 7, "name": "Gitlab Ce"},
            "action_name": "marked",
            "target_type": "MergeRequest",
            "target": {"id": 34, "title": "Fix the build", "web_url": "https://gitlab.example.com/mr/34"},
            "created_at": "2024-03-05T08:15:00.000Z"
        }))
        .unwrap();

        assert_eq!(todo.project_name, "Gitlab Ce");
        assert_eq!(todo.target.title, "Fix the build");
        assert_eq!(todo.action_name, "marked");
    }
}
