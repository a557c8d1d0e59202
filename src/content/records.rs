//! Raw content documents as served by the content API.

use super::{Bilingual, ContentCategory, ItemDetails, MediaKind, MediaRef, ShareableItem};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// Fields shared by every category of content document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordBase {
    pub id: String,
    #[serde(default, rename = "nameEn")]
    pub name_en: Option<String>,
    #[serde(default, rename = "nameAr")]
    pub name_ar: Option<String>,
    #[serde(default, rename = "titleEn")]
    pub title_en: Option<String>,
    #[serde(default, rename = "titleAr")]
    pub title_ar: Option<String>,
    #[serde(default, rename = "descriptionEn")]
    pub description_en: Option<String>,
    #[serde(default, rename = "descriptionAr")]
    pub description_ar: Option<String>,
    #[serde(default, rename = "iconUrl")]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub panoramas: Vec<String>,
    #[serde(
        default,
        rename = "createdAt",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default, rename = "aliasEn")]
    pub alias_en: Option<String>,
    #[serde(default, rename = "aliasAr")]
    pub alias_ar: Option<String>,
    #[serde(default, rename = "dateOfRecord")]
    pub date_of_record: Option<String>,
    #[serde(default, rename = "birthPlaceEn")]
    pub birth_place_en: Option<String>,
    #[serde(default, rename = "birthPlaceAr")]
    pub birth_place_ar: Option<String>,
    #[serde(default, rename = "placeOfRecordEn")]
    pub place_of_record_en: Option<String>,
    #[serde(default, rename = "placeOfRecordAr")]
    pub place_of_record_ar: Option<String>,
    #[serde(default, rename = "familyStatusEn")]
    pub family_status_en: Option<String>,
    #[serde(default, rename = "familyStatusAr")]
    pub family_status_ar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default, rename = "publishedDate")]
    pub published_date: Option<String>,
    #[serde(default, rename = "sourceEn")]
    pub source_en: Option<String>,
    #[serde(default, rename = "sourceAr")]
    pub source_ar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "locationEn")]
    pub location_en: Option<String>,
    #[serde(default, rename = "locationAr")]
    pub location_ar: Option<String>,
    #[serde(default, rename = "organizerEn")]
    pub organizer_en: Option<String>,
    #[serde(default, rename = "organizerAr")]
    pub organizer_ar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default, rename = "locationEn")]
    pub location_en: Option<String>,
    #[serde(default, rename = "locationAr")]
    pub location_ar: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegendRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default, rename = "eraEn")]
    pub era_en: Option<String>,
    #[serde(default, rename = "eraAr")]
    pub era_ar: Option<String>,
    #[serde(default, rename = "regionEn")]
    pub region_en: Option<String>,
    #[serde(default, rename = "regionAr")]
    pub region_ar: Option<String>,
}

/// Accepts an RFC 3339 string or epoch milliseconds; anything else becomes `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

/// Normalization of a raw document into a [`ShareableItem`].
pub trait IntoShareable {
    const CATEGORY: ContentCategory;

    fn into_item(self) -> ShareableItem;
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bilingual(en: Option<String>, ar: Option<String>) -> Bilingual {
    Bilingual {
        en: non_blank(en),
        ar: non_blank(ar),
    }
}

fn build_item(category: ContentCategory, base: RecordBase, details: ItemDetails) -> ShareableItem {
    let title_en = non_blank(base.title_en);
    let title_ar = non_blank(base.title_ar);
    let name_en = non_blank(base.name_en)
        .or_else(|| title_en.clone())
        .unwrap_or_default();
    let name_ar = non_blank(base.name_ar)
        .or_else(|| title_ar.clone())
        .unwrap_or_default();

    let media_refs = [
        (MediaKind::Image, base.images),
        (MediaKind::Video, base.videos),
        (MediaKind::Panorama, base.panoramas),
    ]
    .into_iter()
    .flat_map(|(kind, urls)| {
        urls.into_iter()
            .filter_map(non_blank_url)
            .map(move |url| MediaRef { kind, url })
    })
    .collect();

    ShareableItem {
        id: base.id,
        category,
        name_en,
        name_ar,
        title_en,
        title_ar,
        description_en: non_blank(base.description_en),
        description_ar: non_blank(base.description_ar),
        icon_url: non_blank(base.icon_url),
        media_refs,
        created_at: base.created_at,
        details,
    }
}

fn non_blank_url(url: String) -> Option<String> {
    non_blank(Some(url))
}

impl IntoShareable for PersonRecord {
    const CATEGORY: ContentCategory = ContentCategory::Person;

    fn into_item(self) -> ShareableItem {
        let details = ItemDetails::Person {
            alias: bilingual(self.alias_en, self.alias_ar),
            date_of_record: non_blank(self.date_of_record),
            birth_place: bilingual(self.birth_place_en, self.birth_place_ar),
            place_of_record: bilingual(self.place_of_record_en, self.place_of_record_ar),
            family_status: bilingual(self.family_status_en, self.family_status_ar),
        };
        build_item(Self::CATEGORY, self.base, details)
    }
}

impl IntoShareable for NewsRecord {
    const CATEGORY: ContentCategory = ContentCategory::News;

    fn into_item(self) -> ShareableItem {
        let details = ItemDetails::News {
            published_date: non_blank(self.published_date),
            source: bilingual(self.source_en, self.source_ar),
        };
        build_item(Self::CATEGORY, self.base, details)
    }
}

impl IntoShareable for ActivityRecord {
    const CATEGORY: ContentCategory = ContentCategory::Activity;

    fn into_item(self) -> ShareableItem {
        let details = ItemDetails::Activity {
            date: non_blank(self.date),
            location: bilingual(self.location_en, self.location_ar),
            organizer: bilingual(self.organizer_en, self.organizer_ar),
        };
        build_item(Self::CATEGORY, self.base, details)
    }
}

impl IntoShareable for PlaceRecord {
    const CATEGORY: ContentCategory = ContentCategory::Place;

    fn into_item(self) -> ShareableItem {
        let coordinates = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        };
        let details = ItemDetails::Place {
            location: bilingual(self.location_en, self.location_ar),
            coordinates,
        };
        build_item(Self::CATEGORY, self.base, details)
    }
}

impl IntoShareable for LegendRecord {
    const CATEGORY: ContentCategory = ContentCategory::Legend;

    fn into_item(self) -> ShareableItem {
        let details = ItemDetails::Legend {
            era: bilingual(self.era_en, self.era_ar),
            region: bilingual(self.region_en, self.region_ar),
        };
        build_item(Self::CATEGORY, self.base, details)
    }
}
