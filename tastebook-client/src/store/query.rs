//! Client-side filtering and sorting
//!
//! Collections are fetched whole and shaped locally: free-text search
//! first, then attribute filters, then the sort.

use serde::{Deserialize, Serialize};
use shared::{RecordId, UserId};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::record::Record;
use crate::error::ClientError;

/// Whose collection a store mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    /// Rows owned by one user
    User(UserId),
    /// Global lookup tables
    Shared,
}

/// Sort order of a collection view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Newest first
    #[default]
    DateAdded,
    /// A to Z
    Name,
    /// Highest first, unrated last
    Rating,
}

impl FromStr for SortKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "").as_str() {
            "dateadded" | "date" | "" => Ok(Self::DateAdded),
            "name" => Ok(Self::Name),
            "rating" => Ok(Self::Rating),
            other => Err(ClientError::validation(format!("unknown sort key '{other}'"))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::DateAdded => write!(f, "dateAdded"),
            SortKey::Name => write!(f, "name"),
            SortKey::Rating => write!(f, "rating"),
        }
    }
}

/// Attribute filters; unset fields do not filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilters {
    pub type_id: Option<RecordId>,
    pub city_id: Option<RecordId>,
    pub price: Option<u8>,
    pub min_rating: Option<f32>,
    pub to_try: Option<bool>,
}

impl AttributeFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn matches<T: Record>(&self, item: &T) -> bool {
        if let Some(type_id) = self.type_id
            && item.type_id() != Some(type_id)
        {
            return false;
        }
        if let Some(city_id) = self.city_id
            && item.city_id() != Some(city_id)
        {
            return false;
        }
        if let Some(price) = self.price
            && item.price() != Some(price)
        {
            return false;
        }
        if let Some(min) = self.min_rating
            && !item.rating().is_some_and(|r| r >= min)
        {
            return false;
        }
        if let Some(to_try) = self.to_try
            && item.to_try() != Some(to_try)
        {
            return false;
        }
        true
    }
}

/// Everything a collection view depends on
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub owner: OwnerKey,
    pub filters: AttributeFilters,
    pub sort: SortKey,
    pub search: Option<String>,
}

impl CollectionQuery {
    pub fn new(owner: OwnerKey) -> Self {
        Self {
            owner,
            filters: AttributeFilters::default(),
            sort: SortKey::default(),
            search: None,
        }
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self::new(OwnerKey::User(user_id))
    }

    pub fn shared() -> Self {
        Self::new(OwnerKey::Shared)
    }

    pub fn with_filters(mut self, filters: AttributeFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Blank text clears the search
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    /// Search, filter, then sort a fetched collection
    pub fn apply<T: Record>(&self, items: Vec<T>) -> Vec<T> {
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut shaped: Vec<T> = items
            .into_iter()
            .filter(|item| needle.as_deref().is_none_or(|n| matches_search(item, n)))
            .filter(|item| self.filters.matches(item))
            .collect();

        sort_items(&mut shaped, self.sort);
        shaped
    }
}

fn matches_search<T: Record>(item: &T, needle: &str) -> bool {
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

fn sort_items<T: Record>(items: &mut [T], sort: SortKey) {
    match sort {
        // None (unknown date) sorts last
        SortKey::DateAdded => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortKey::Name => items.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()))
        }),
        SortKey::Rating => items.sort_by(|a, b| compare_rating_desc(a.rating(), b.rating())),
    }
}

fn compare_rating_desc(a: Option<f32>, b: Option<f32>) -> Ordering {
    let a = a.unwrap_or(f32::NEG_INFINITY);
    let b = b.unwrap_or(f32::NEG_INFINITY);
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use shared::Restaurant;

    fn restaurant(id: i64, name: &str, rating: Option<f32>, created_at: DateTime<Utc>) -> Restaurant {
        Restaurant {
            id,
            user_id: UserId::nil(),
            name: name.to_string(),
            type_id: None,
            city_id: None,
            type_name: None,
            city_name: None,
            price: None,
            rating,
            notes: None,
            address: None,
            latitude: None,
            longitude: None,
            to_try: false,
            visited_at: None,
            created_at,
        }
    }

    fn names(items: &[Restaurant]) -> Vec<&str> {
        items.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_sort_examples() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::minutes(5);
        let items = vec![
            restaurant(1, "B", Some(8.0), t1),
            restaurant(2, "A", Some(9.0), t2),
        ];

        let by_name = CollectionQuery::shared().with_sort(SortKey::Name).apply(items.clone());
        assert_eq!(names(&by_name), vec!["A", "B"]);

        let by_rating = CollectionQuery::shared().with_sort(SortKey::Rating).apply(items.clone());
        assert_eq!(names(&by_rating), vec!["A", "B"]);

        let by_date = CollectionQuery::shared().apply(items);
        assert_eq!(names(&by_date), vec!["A", "B"]);
    }

    #[test]
    fn test_missing_rating_sorts_last() {
        let now = Utc::now();
        let items = vec![
            restaurant(1, "Unrated", None, now),
            restaurant(2, "Low", Some(2.0), now),
            restaurant(3, "Zero", Some(0.0), now),
        ];
        let sorted = CollectionQuery::shared().with_sort(SortKey::Rating).apply(items);
        assert_eq!(names(&sorted), vec!["Low", "Zero", "Unrated"]);
    }

    #[test]
    fn test_name_sort_ignores_case() {
        let now = Utc::now();
        let items = vec![
            restaurant(1, "bistro", None, now),
            restaurant(2, "Alma", None, now),
            restaurant(3, "Casa", None, now),
        ];
        let sorted = CollectionQuery::shared().with_sort(SortKey::Name).apply(items);
        assert_eq!(names(&sorted), vec!["Alma", "bistro", "Casa"]);
    }

    #[test]
    fn test_search_covers_type_and_city() {
        let now = Utc::now();
        let mut ramen = restaurant(1, "Ichiran", Some(7.0), now);
        ramen.type_name = Some("Ramen".into());
        let mut tapas = restaurant(2, "Bar Tomás", Some(8.0), now);
        tapas.city_name = Some("Barcelona".into());
        let items = vec![ramen, tapas];

        let hits = CollectionQuery::shared().with_search("RAMEN").apply(items.clone());
        assert_eq!(names(&hits), vec!["Ichiran"]);

        let hits = CollectionQuery::shared().with_search("barc").apply(items.clone());
        assert_eq!(names(&hits), vec!["Bar Tomás"]);

        let all = CollectionQuery::shared().with_search("   ").apply(items);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_attribute_filters() {
        let now = Utc::now();
        let mut a = restaurant(1, "A", Some(9.0), now);
        a.type_id = Some(1);
        a.price = Some(2);
        let mut b = restaurant(2, "B", Some(6.0), now);
        b.type_id = Some(1);
        b.to_try = true;
        let mut c = restaurant(3, "C", None, now);
        c.city_id = Some(4);
        let items = vec![a, b, c];

        let filters = AttributeFilters {
            type_id: Some(1),
            ..Default::default()
        };
        let hits = CollectionQuery::shared().with_filters(filters).apply(items.clone());
        assert_eq!(hits.len(), 2);

        let filters = AttributeFilters {
            min_rating: Some(7.0),
            ..Default::default()
        };
        let hits = CollectionQuery::shared().with_filters(filters).apply(items.clone());
        assert_eq!(names(&hits), vec!["A"]);

        let filters = AttributeFilters {
            to_try: Some(true),
            ..Default::default()
        };
        let hits = CollectionQuery::shared().with_filters(filters).apply(items.clone());
        assert_eq!(names(&hits), vec!["B"]);

        let filters = AttributeFilters {
            price: Some(2),
            city_id: Some(4),
            ..Default::default()
        };
        assert!(CollectionQuery::shared().with_filters(filters).apply(items).is_empty());
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("dateAdded".parse::<SortKey>().unwrap(), SortKey::DateAdded);
        assert_eq!("date_added".parse::<SortKey>().unwrap(), SortKey::DateAdded);
        assert_eq!("Rating".parse::<SortKey>().unwrap(), SortKey::Rating);
        assert!("price".parse::<SortKey>().is_err());
        assert_eq!(SortKey::Name.to_string(), "name");
    }
}
