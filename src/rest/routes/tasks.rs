// rest/routes/tasks.rs — Task CRUD routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Error;
use crate::tasks::model::{CreateTask, Task, UpdateTask};
use crate::tasks::query::{Selector, SortKey, TaskQuery};
use crate::AppContext;

/// Query string of `GET /tasks`. Everything is optional; the default is the
/// full list, newest first.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Named view: `all`, `starred`, `today`, `week`, `completed`, `tag:<name>`.
    pub filter: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
}

impl ListParams {
    fn into_query(self) -> Result<TaskQuery, Error> {
        let selector = match self.filter.as_deref() {
            None | Some("") => Selector::All,
            Some(raw) => raw
                .parse::<Selector>()
                .map_err(|e| Error::validation("filter", e))?,
        };
        Ok(TaskQuery {
            selector,
            tag: self.tag.filter(|t| !t.is_empty()),
            search: self.search.filter(|s| !s.is_empty()),
            sort_by: self.sort_by.unwrap_or_default(),
        })
    }
}

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Task>>, Error> {
    let query = params.into_query()?;
    Ok(Json(ctx.store.find_all(&query).await?))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, Error> {
    Ok(Json(ctx.store.find_one(id).await?))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), Error> {
    let task = ctx.store.create(&body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTask>,
) -> Result<Json<Task>, Error> {
    Ok(Json(ctx.store.update(id, &body).await?))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    ctx.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
