use serde::Serialize;

use crate::gitlab_types::{Notification, WorkItem};

/// Output of one aggregation cycle, consumed as-is by the page and the
/// JSON endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub my_items: Vec<WorkItem>,
    pub team_items: Vec<WorkItem>,
    pub notifications: Vec<Notification>,
}
