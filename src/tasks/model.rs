//! Task data model and the request payloads that mutate it.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ─── Priority ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Numeric rank used by priority sorting (high sorts first).
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Task ─────────────────────────────────────────────────────────────────────

/// A single task, as stored and as served over the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    /// Never empty after validation; whitespace-only titles are rejected.
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub starred: bool,
    /// Due date (`YYYY-MM-DD`). None = unscheduled.
    #[serde(with = "opt_date")]
    pub date: Option<NaiveDate>,
    /// Due time (`HH:MM`, minute precision). None = no specific time.
    #[serde(with = "hhmm")]
    pub time: Option<NaiveTime>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub attachments: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse a wall-clock time at minute precision. Seconds in the input are
/// accepted and dropped (`"14:30:45"` → 14:30).
pub(crate) fn parse_hhmm(s: &str) -> Result<NaiveTime, String> {
    let parsed = NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time (expected HH:MM): {s}"))?;
    Ok(parsed.with_second(0).unwrap_or(parsed))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date (expected YYYY-MM-DD): {s}"))
}

/// (De)serializes `Option<NaiveTime>` as `"HH:MM"`.
///
/// Empty strings in input mean absent — web clients send `""` for a cleared
/// time picker.
mod hhmm {
    use super::{parse_hhmm, NaiveTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse_hhmm(&s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// (De)serializes `Option<NaiveDate>` as `"YYYY-MM-DD"`, with the same
/// empty-string handling as [`hhmm`].
mod opt_date {
    use super::{parse_date, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse_date(&s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// Deserializes an optional text field, mapping `""` to `None`.
fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ─── Request payloads ─────────────────────────────────────────────────────────

/// Body of `POST /tasks`. Everything except `title` is optional; the server
/// fills in defaults and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTask {
    pub title: String,
    #[serde(deserialize_with = "de_opt_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(with = "opt_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<u32>,
}

impl CreateTask {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title", "title must not be empty"));
        }
        Ok(())
    }
}

/// Body of `PATCH /tasks/{id}`. Only the provided fields are changed; an
/// empty body is a valid no-op edit that still refreshes `updatedAt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de_opt_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(with = "opt_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<u32>,
}

impl UpdateTask {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::validation("title", "title must not be empty"));
            }
        }
        Ok(())
    }

    /// Merge the provided fields into `task`. Absent fields keep their
    /// current value; this never clears a field back to None.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(starred) = self.starred {
            task.starred = starred;
        }
        if let Some(date) = self.date {
            task.date = Some(date);
        }
        if let Some(time) = self.time {
            task.time = Some(time);
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(attachments) = self.attachments {
            task.attachments = attachments;
        }
    }
}
