//! Client-side browsing state.
//!
//! [`TaskBrowser`] holds the cached task snapshot plus the user's current
//! view settings, and follows a strict invalidate-and-refetch discipline:
//! every successful mutation drops the snapshot and pulls a fresh list, so
//! the browser always reads its own writes on the next render.

use chrono::Local;
use uuid::Uuid;

use super::{ClientError, ListQuery, TasksClient};
use crate::tasks::model::{CreateTask, Task, UpdateTask};
use crate::tasks::query::{Selector, SortKey, TaskQuery};

/// What the editor pane is doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditorState {
    #[default]
    Closed,
    Creating,
    Editing(Task),
}

/// A pending editor submission: either a brand-new task or a patch against
/// an existing one.
#[derive(Debug, Clone)]
pub enum SaveRequest {
    Create(CreateTask),
    Update { id: Uuid, patch: UpdateTask },
}

impl SaveRequest {
    /// Run the same field validation the server would, so obviously broken
    /// input never goes over the wire.
    pub fn validate(&self) -> Result<(), ClientError> {
        match self {
            SaveRequest::Create(req) => req.validate(),
            SaveRequest::Update { patch, .. } => patch.validate(),
        }
        .map_err(|e| ClientError::Invalid(e.to_string()))
    }
}

pub struct TaskBrowser {
    client: TasksClient,
    pub selector: Selector,
    pub search: String,
    pub sort_by: SortKey,
    pub editor: EditorState,
    tasks: Vec<Task>,
}

impl TaskBrowser {
    pub fn new(client: TasksClient) -> Self {
        Self {
            client,
            selector: Selector::All,
            search: String::new(),
            sort_by: SortKey::Created,
            editor: EditorState::Closed,
            tasks: Vec::new(),
        }
    }

    /// Replace the cached snapshot with a fresh unfiltered fetch.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.tasks = self.client.list(&ListQuery::default()).await?;
        Ok(())
    }

    /// The raw cached snapshot, unfiltered.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The snapshot narrowed by the current selector, search text, and sort
    /// key. Runs the same pipeline the server runs, so switching views never
    /// needs a round trip.
    pub fn visible_tasks(&self) -> Vec<Task> {
        let query = TaskQuery {
            selector: self.selector.clone(),
            tag: None,
            search: (!self.search.is_empty()).then(|| self.search.clone()),
            sort_by: self.sort_by,
        };
        query.apply(self.tasks.clone(), Local::now().date_naive())
    }

    /// Every tag in the snapshot, in first-seen order.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for task in &self.tasks {
            for tag in &task.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }

    /// Validate and submit an editor payload, then close the editor and
    /// refetch. A rejected payload leaves the editor open and the cache
    /// untouched.
    pub async fn save(&mut self, request: SaveRequest) -> Result<Task, ClientError> {
        request.validate()?;
        let saved = match &request {
            SaveRequest::Create(req) => self.client.create(req).await?,
            SaveRequest::Update { id, patch } => self.client.update(*id, patch).await?,
        };
        self.editor = EditorState::Closed;
        self.refresh().await?;
        Ok(saved)
    }

    /// Flip the completed flag on a cached task. Returns Ok(false) when the
    /// id is not in the snapshot; nothing is sent in that case.
    pub async fn toggle_completed(&mut self, id: Uuid) -> Result<bool, ClientError> {
        let current = match self.tasks.iter().find(|t| t.id == id) {
            Some(task) => task.completed,
            None => return Ok(false),
        };
        let patch = UpdateTask {
            completed: Some(!current),
            ..Default::default()
        };
        self.client.update(id, &patch).await?;
        self.refresh().await?;
        Ok(true)
    }

    /// Flip the starred flag on a cached task, with the same contract as
    /// [`toggle_completed`](Self::toggle_completed).
    pub async fn toggle_starred(&mut self, id: Uuid) -> Result<bool, ClientError> {
        let current = match self.tasks.iter().find(|t| t.id == id) {
            Some(task) => task.starred,
            None => return Ok(false),
        };
        let patch = UpdateTask {
            starred: Some(!current),
            ..Default::default()
        };
        self.client.update(id, &patch).await?;
        self.refresh().await?;
        Ok(true)
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<(), ClientError> {
        self.client.delete(id).await?;
        self.refresh().await
    }

    /// Open the editor: `None` starts a new task, `Some(id)` edits a cached
    /// one. Returns false when the id is not in the snapshot.
    pub fn open_editor(&mut self, id: Option<Uuid>) -> bool {
        match id {
            None => {
                self.editor = EditorState::Creating;
                true
            }
            Some(id) => match self.tasks.iter().find(|t| t.id == id) {
                Some(task) => {
                    self.editor = EditorState::Editing(task.clone());
                    true
                }
                None => false,
            },
        }
    }

    pub fn close_editor(&mut self) {
        self.editor = EditorState::Closed;
    }
}
