pub mod records;
pub mod store;

use crate::errors::{BulletinError, BulletinResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use records::IntoShareable;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub use store::{ContentStore, HttpContentStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentCategory {
    Person,
    News,
    Activity,
    Place,
    Legend,
}

impl ContentCategory {
    pub const ALL: [Self; 5] = [
        Self::Person,
        Self::News,
        Self::Activity,
        Self::Place,
        Self::Legend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::News => "news",
            Self::Activity => "activity",
            Self::Place => "place",
            Self::Legend => "legend",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentCategory {
    type Err = BulletinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" | "persons" => Ok(Self::Person),
            "news" => Ok(Self::News),
            "activity" | "activities" => Ok(Self::Activity),
            "place" | "places" => Ok(Self::Place),
            "legend" | "legends" => Ok(Self::Legend),
            other => Err(BulletinError::validation(format!(
                "unknown content category: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Panorama,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub url: String,
}

/// A value that may be present in English, Arabic, both or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bilingual {
    pub en: Option<String>,
    pub ar: Option<String>,
}

/// Category-specific structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemDetails {
    Person {
        alias: Bilingual,
        date_of_record: Option<String>,
        birth_place: Bilingual,
        place_of_record: Bilingual,
        family_status: Bilingual,
    },
    News {
        published_date: Option<String>,
        source: Bilingual,
    },
    Activity {
        date: Option<String>,
        location: Bilingual,
        organizer: Bilingual,
    },
    Place {
        location: Bilingual,
        coordinates: Option<(f64, f64)>,
    },
    Legend {
        era: Bilingual,
        region: Bilingual,
    },
}

/// Read-only projection of a content record, ready to be formatted and sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareableItem {
    pub id: String,
    pub category: ContentCategory,
    /// Falls back to the English title when the record has no name.
    pub name_en: String,
    pub name_ar: String,
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub icon_url: Option<String>,
    pub media_refs: Vec<MediaRef>,
    pub created_at: Option<DateTime<Utc>>,
    pub details: ItemDetails,
}

impl ShareableItem {
    fn matches_text(&self, needle: &str) -> bool {
        [
            Some(self.name_en.as_str()),
            Some(self.name_ar.as_str()),
            self.title_en.as_deref(),
            self.title_ar.as_deref(),
            self.description_en.as_deref(),
            self.description_ar.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub category: Option<ContentCategory>,
    pub search_text: Option<String>,
}

impl ContentFilter {
    fn includes(&self, category: ContentCategory) -> bool {
        self.category.is_none_or(|c| c == category)
    }

    fn needle(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Merges every content source into one newest-first list of items.
pub struct ContentAggregator {
    store: Arc<dyn ContentStore>,
}

impl ContentAggregator {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Fetch, normalize, filter and sort. A failing source contributes nothing.
    pub async fn fetch_all(&self, filter: &ContentFilter) -> Vec<ShareableItem> {
        let store = &self.store;
        let (persons, news, activities, places, legends) = tokio::join!(
            source(filter, store.persons()),
            source(filter, store.news()),
            source(filter, store.activities()),
            source(filter, store.places()),
            source(filter, store.legends()),
        );

        let mut items: Vec<ShareableItem> = persons
            .into_iter()
            .chain(news)
            .chain(activities)
            .chain(places)
            .chain(legends)
            .collect();

        if let Some(needle) = filter.needle() {
            items.retain(|item| item.matches_text(&needle));
        }
        sort_newest_first(&mut items);
        debug!("aggregated {} content items", items.len());
        items
    }

    pub async fn fetch_item(&self, id: &str) -> BulletinResult<ShareableItem> {
        self.fetch_all(&ContentFilter::default())
            .await
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| BulletinError::not_found("content item", id))
    }
}

async fn source<R, F>(filter: &ContentFilter, fetch: F) -> Vec<ShareableItem>
where
    R: IntoShareable,
    F: Future<Output = Result<Vec<R>>>,
{
    if !filter.includes(R::CATEGORY) {
        return Vec::new();
    }
    match fetch.await {
        Ok(records) => records.into_iter().map(IntoShareable::into_item).collect(),
        Err(e) => {
            warn!("content source '{}' unavailable: {:#}", R::CATEGORY, e);
            Vec::new()
        }
    }
}

/// `created_at` descending, undated items last, ties by id.
pub fn sort_newest_first(items: &mut [ShareableItem]) {
    items.sort_by(|a, b| {
        let by_date = match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.id.cmp(&b.id))
    });
}
