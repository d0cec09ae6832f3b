//! The pure list pipeline: selector filtering, tag narrowing, substring
//! search, and ordering.
//!
//! The REST list handler and the client-side cached view both run this exact
//! code, so a server-filtered list and a locally-filtered snapshot always
//! agree.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use icu_collator::{Collator, CollatorOptions, Strength};
use icu_locid::locale;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::model::Task;

// ─── Selector ─────────────────────────────────────────────────────────────────

/// A named view over the task list. `Tag` matches are exact and
/// case-sensitive; `Work` and `work` are different tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    #[default]
    All,
    Starred,
    Today,
    Week,
    Completed,
    Tag(String),
}

impl Selector {
    /// Whether `task` passes this selector, evaluated against `today`.
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            Selector::All => true,
            Selector::Starred => task.starred,
            Selector::Completed => task.completed,
            Selector::Today => task.date == Some(today),
            Selector::Week => match task.date {
                Some(d) => d >= today && d <= week_end(today),
                None => false,
            },
            Selector::Tag(name) => task.tags.iter().any(|t| t == name),
        }
    }
}

/// Last day of the "week" window: seven days out, inclusive on both ends.
fn week_end(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX)
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Selector::All),
            "starred" => Ok(Selector::Starred),
            "today" => Ok(Selector::Today),
            "week" => Ok(Selector::Week),
            "completed" => Ok(Selector::Completed),
            other => match other.strip_prefix("tag:") {
                Some(name) if !name.is_empty() => Ok(Selector::Tag(name.to_string())),
                _ => Err(format!("unknown filter selector: {other}")),
            },
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Starred => f.write_str("starred"),
            Selector::Today => f.write_str("today"),
            Selector::Week => f.write_str("week"),
            Selector::Completed => f.write_str("completed"),
            Selector::Tag(name) => write!(f, "tag:{name}"),
        }
    }
}

// ─── SortKey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Due date ascending; undated tasks sort last.
    Date,
    /// High before medium before low.
    Priority,
    /// Locale-aware title order.
    Title,
    /// Newest first. The default.
    #[default]
    Created,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Priority => "priority",
            SortKey::Title => "title",
            SortKey::Created => "created",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(SortKey::Date),
            "priority" => Ok(SortKey::Priority),
            "title" => Ok(SortKey::Title),
            "created" => Ok(SortKey::Created),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Sorting ──────────────────────────────────────────────────────────────────

/// Ukrainian-aware collator for title ordering, built once. Falls back to
/// byte order if collation data for the locale is unavailable.
static UK_COLLATOR: Lazy<Option<Collator>> = Lazy::new(|| {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    Collator::try_new(&locale!("uk").into(), options).ok()
});

fn title_cmp(a: &str, b: &str) -> Ordering {
    match UK_COLLATOR.as_ref() {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    }
}

/// Stable sort: tasks that compare equal keep their previous relative order.
pub fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    match key {
        SortKey::Date => tasks.sort_by(|a, b| match (a.date, b.date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKey::Priority => tasks.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank())),
        SortKey::Title => tasks.sort_by(|a, b| title_cmp(&a.title, &b.title)),
        SortKey::Created => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

// ─── Search ───────────────────────────────────────────────────────────────────

/// Case-insensitive substring match against title and description.
/// An empty query matches everything.
pub fn search_matches(task: &Task, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let q = query.to_lowercase();
    task.title.to_lowercase().contains(&q)
        || task
            .description
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
            .contains(&q)
}

// ─── TaskQuery ────────────────────────────────────────────────────────────────

/// A complete list request: selector, optional tag narrowing, search text,
/// and ordering. `tag` is ANDed with the selector, so `starred` plus tag
/// `Work` returns starred tasks carrying the Work tag.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub selector: Selector,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort_by: SortKey,
}

impl TaskQuery {
    /// Run the full pipeline over an owned snapshot: filter, then sort.
    pub fn apply(&self, mut tasks: Vec<Task>, today: NaiveDate) -> Vec<Task> {
        tasks.retain(|t| self.selector.matches(t, today));
        if let Some(tag) = &self.tag {
            tasks.retain(|t| t.tags.iter().any(|x| x == tag));
        }
        if let Some(search) = &self.search {
            tasks.retain(|t| search_matches(t, search));
        }
        sort_tasks(&mut tasks, self.sort_by);
        tasks
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::tasks::model::Priority;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn arb_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Medium),
            Just(Priority::High),
        ]
    }

    fn arb_date() -> impl Strategy<Value = Option<NaiveDate>> {
        prop_oneof![
            Just(None),
            (0u64..30).prop_map(|offset| {
                NaiveDate::from_ymd_opt(2025, 6, 1)
                    .and_then(|base| base.checked_add_days(Days::new(offset)))
            }),
        ]
    }

    fn arb_selector() -> impl Strategy<Value = Selector> {
        prop_oneof![
            Just(Selector::All),
            Just(Selector::Starred),
            Just(Selector::Today),
            Just(Selector::Week),
            Just(Selector::Completed),
            "[A-Z][a-z]{0,4}".prop_map(Selector::Tag),
        ]
    }

    fn arb_sort_key() -> impl Strategy<Value = SortKey> {
        prop_oneof![
            Just(SortKey::Date),
            Just(SortKey::Priority),
            Just(SortKey::Title),
            Just(SortKey::Created),
        ]
    }

    fn arb_task() -> impl Strategy<Value = Task> {
        (
            "[a-zа-їґ ]{0,12}",
            any::<bool>(),
            any::<bool>(),
            arb_date(),
            arb_priority(),
            prop::collection::vec("[A-Z][a-z]{0,4}", 0..3),
            0i64..100_000,
        )
            .prop_map(|(title, completed, starred, date, priority, tags, age)| Task {
                id: Uuid::new_v4(),
                title,
                description: None,
                completed,
                starred,
                date,
                time: None,
                tags,
                priority,
                attachments: 0,
                created_at: Utc.timestamp_opt(1_700_000_000 + age, 0).unwrap(),
                updated_at: Utc.timestamp_opt(1_700_000_000 + age, 0).unwrap(),
            })
    }

    proptest! {
        #[test]
        fn prop_filtering_is_idempotent(
            tasks in prop::collection::vec(arb_task(), 0..20),
            selector in arb_selector(),
        ) {
            let query = TaskQuery { selector, ..Default::default() };
            let once = query.apply(tasks, fixed_today());
            let twice = query.apply(once.clone(), fixed_today());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_filtered_output_is_a_subset_of_the_input(
            tasks in prop::collection::vec(arb_task(), 0..20),
            selector in arb_selector(),
        ) {
            let query = TaskQuery { selector, ..Default::default() };
            let out = query.apply(tasks.clone(), fixed_today());
            prop_assert!(out.len() <= tasks.len());
            prop_assert!(out.iter().all(|t| tasks.contains(t)));
        }

        #[test]
        fn prop_sorting_preserves_the_multiset(
            tasks in prop::collection::vec(arb_task(), 0..20),
            key in arb_sort_key(),
        ) {
            let mut sorted = tasks.clone();
            sort_tasks(&mut sorted, key);
            let mut before: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
            let mut after: Vec<Uuid> = sorted.iter().map(|t| t.id).collect();
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }
}
