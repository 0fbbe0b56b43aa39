//! Search, tag filtering and pagination shared by both stores.

use crate::domain::{ListQuery, Program, WorkoutTemplate};
use chrono::{DateTime, Utc};

/// Fields list operations filter and sort on.
pub trait Listable {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn tags(&self) -> &[String];
    fn modified_date(&self) -> DateTime<Utc>;
}

impl Listable for WorkoutTemplate {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn modified_date(&self) -> DateTime<Utc> {
        self.modified_date
    }
}

impl Listable for Program {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn modified_date(&self) -> DateTime<Utc> {
        self.modified_date
    }
}

/// Case-insensitive substring match on name, description or any tag.
pub fn matches_search<T: Listable>(item: &T, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    item.name().to_lowercase().contains(&needle)
        || item.description().to_lowercase().contains(&needle)
        || item.tags().iter().any(|t| t.to_lowercase().contains(&needle))
}

pub fn matches_tags<T: Listable>(item: &T, tags: &[String]) -> bool {
    tags.is_empty() || item.tags().iter().any(|t| tags.contains(t))
}

/// Filters, sorts by `modified_date` descending (stable) and returns the
/// requested 1-based page. Page 0 is read as page 1.
pub fn apply<T: Listable>(items: Vec<T>, query: &ListQuery) -> Vec<T> {
    let mut hits: Vec<T> = items
        .into_iter()
        .filter(|item| matches_tags(item, &query.tags))
        .filter(|item| match query.search.as_deref() {
            Some(needle) if !needle.trim().is_empty() => matches_search(item, needle.trim()),
            _ => true,
        })
        .collect();
    hits.sort_by(|a, b| b.modified_date().cmp(&a.modified_date()));

    let page = query.page.max(1);
    let start = (page - 1).saturating_mul(query.page_size);
    hits.into_iter().skip(start).take(query.page_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewWorkout;
    use chrono::Duration;

    fn workouts() -> Vec<WorkoutTemplate> {
        let base = Utc::now();
        ["Push Day", "Pull Day", "Leg Day"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let new = NewWorkout {
                    tags: vec![if i == 1 { "back".into() } else { "legs".into() }],
                    ..NewWorkout::new(*name)
                };
                WorkoutTemplate::create(new, base + Duration::seconds(i as i64))
            })
            .collect()
    }

    #[test]
    fn newest_first_with_pagination() {
        let page = apply(workouts(), &ListQuery::page(1, 2));
        let names: Vec<_> = page.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Leg Day", "Pull Day"]);

        let page = apply(workouts(), &ListQuery::page(2, 2));
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Push Day");

        assert!(apply(workouts(), &ListQuery::page(9, 2)).is_empty());
    }

    #[test]
    fn search_and_tags_combine() {
        let hits = apply(workouts(), &ListQuery::all().with_search("DAY"));
        assert_eq!(hits.len(), 3);

        let hits = apply(
            workouts(),
            &ListQuery::all().with_search("day").with_tags(vec!["back".into()]),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Pull Day");
    }
}
