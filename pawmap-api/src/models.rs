//! Entity model and wire records
//!
//! The map endpoints return one record shape per category. Each wire record
//! converts into the category-independent [`Entity`] snapshot used by the
//! sync core.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::Position;

/// Which family of entities a page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Pets,
    Facilities,
    Shelters,
}

impl EntityCategory {
    /// Path segment under `/api/v1/`
    pub fn path(&self) -> &'static str {
        match self {
            EntityCategory::Pets => "pets",
            EntityCategory::Facilities => "facilities",
            EntityCategory::Shelters => "shelters",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Backend identifier of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status shared by all categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Missing,
    Sighted,
    Protecting,
    Sheltered,
    Adopted,
    Returned,
    Open,
    Closed,
    Unknown,
}

impl EntityStatus {
    /// Map a backend status string. Unrecognised values become `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MISSING" | "LOST" => EntityStatus::Missing,
            "SIGHTED" | "FOUND" | "WITNESSED" => EntityStatus::Sighted,
            "PROTECTING" | "PROTECTED" => EntityStatus::Protecting,
            "SHELTERED" => EntityStatus::Sheltered,
            "ADOPTED" => EntityStatus::Adopted,
            "RETURNED" | "REUNITED" => EntityStatus::Returned,
            "OPEN" => EntityStatus::Open,
            "CLOSED" => EntityStatus::Closed,
            _ => EntityStatus::Unknown,
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityStatus::Missing => "missing",
            EntityStatus::Sighted => "sighted",
            EntityStatus::Protecting => "protecting",
            EntityStatus::Sheltered => "sheltered",
            EntityStatus::Adopted => "adopted",
            EntityStatus::Returned => "returned",
            EntityStatus::Open => "open",
            EntityStatus::Closed => "closed",
            EntityStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Animal counts reported by a shelter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnimalCounts {
    pub dogs: u32,
    pub cats: u32,
    pub others: u32,
}

impl AnimalCounts {
    pub fn total(&self) -> u32 {
        self.dogs + self.cats + self.others
    }
}

/// Category-specific payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityDetail {
    Pet {
        breed: Option<String>,
        age: Option<String>,
        gender: Option<String>,
        name: Option<String>,
        description: Option<String>,
    },
    Facility {
        name: String,
        address: Option<String>,
        opening_hours: Option<String>,
        phone: Option<String>,
    },
    ShelterAnimal {
        shelter_name: String,
        address: Option<String>,
        animal_counts: AnimalCounts,
    },
}

/// Immutable snapshot of a backend entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub category: EntityCategory,
    pub position: Position,
    pub status: EntityStatus,
    pub image_url: Option<String>,
    /// Distance from the query center in km, when known
    pub distance_km: Option<f64>,
    pub detail: EntityDetail,
}

impl Entity {
    /// Text shown in place of the marker image when it fails to load
    pub fn fallback_label(&self) -> String {
        match &self.detail {
            EntityDetail::Pet { breed, name, .. } => breed
                .clone()
                .or_else(|| name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            EntityDetail::Facility { name, .. } => name.clone(),
            EntityDetail::ShelterAnimal { shelter_name, .. } => shelter_name.clone(),
        }
    }

    /// Fill in `distance_km` from `center` if the backend left it out
    pub fn with_distance_from(mut self, center: &Position) -> Self {
        if self.distance_km.is_none() {
            self.distance_km = Some(center.distance_km(&self.position));
        }
        self
    }
}

/// Conversion from a category wire record into an [`Entity`]
pub trait WireEntity: DeserializeOwned {
    fn into_entity(self) -> Result<Entity>;
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Pet record from `/api/v1/pets/...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetRecord {
    #[serde(alias = "postId")]
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "thumbnailUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, alias = "petName")]
    pub name: Option<String>,
    #[serde(default, alias = "content")]
    pub description: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl WireEntity for PetRecord {
    fn into_entity(self) -> Result<Entity> {
        Ok(Entity {
            id: EntityId(self.id),
            category: EntityCategory::Pets,
            position: Position::new(self.latitude, self.longitude)?,
            status: self
                .status
                .as_deref()
                .map(EntityStatus::from_wire)
                .unwrap_or(EntityStatus::Unknown),
            image_url: clean(self.image_url),
            distance_km: self.distance,
            detail: EntityDetail::Pet {
                breed: clean(self.breed),
                age: clean(self.age),
                gender: clean(self.gender),
                name: clean(self.name),
                description: clean(self.description),
            },
        })
    }
}

/// Facility record (hospitals, pet shops, ...) from `/api/v1/facilities/...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityRecord {
    #[serde(alias = "facilityId")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "operatingHours")]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl WireEntity for FacilityRecord {
    fn into_entity(self) -> Result<Entity> {
        Ok(Entity {
            id: EntityId(self.id),
            category: EntityCategory::Facilities,
            position: Position::new(self.latitude, self.longitude)?,
            status: self
                .status
                .as_deref()
                .map(EntityStatus::from_wire)
                .unwrap_or(EntityStatus::Open),
            image_url: clean(self.image_url),
            distance_km: self.distance,
            detail: EntityDetail::Facility {
                name: self.name,
                address: clean(self.address),
                opening_hours: clean(self.opening_hours),
                phone: clean(self.phone),
            },
        })
    }
}

/// Shelter record from `/api/v1/shelters/...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelterRecord {
    #[serde(alias = "shelterId")]
    pub id: i64,
    #[serde(alias = "shelterName")]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub dog_count: u32,
    #[serde(default)]
    pub cat_count: u32,
    #[serde(default, alias = "etcCount")]
    pub other_count: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl WireEntity for ShelterRecord {
    fn into_entity(self) -> Result<Entity> {
        Ok(Entity {
            id: EntityId(self.id),
            category: EntityCategory::Shelters,
            position: Position::new(self.latitude, self.longitude)?,
            status: self
                .status
                .as_deref()
                .map(EntityStatus::from_wire)
                .unwrap_or(EntityStatus::Sheltered),
            image_url: clean(self.image_url),
            distance_km: self.distance,
            detail: EntityDetail::ShelterAnimal {
                shelter_name: self.name,
                address: clean(self.address),
                animal_counts: AnimalCounts {
                    dogs: self.dog_count,
                    cats: self.cat_count,
                    others: self.other_count,
                },
            },
        })
    }
}

fn decode_as<T: WireEntity>(value: serde_json::Value) -> Result<Entity> {
    serde_json::from_value::<T>(value)?.into_entity()
}

/// Decode one JSON record according to its category
pub fn decode_entity(category: EntityCategory, value: serde_json::Value) -> Result<Entity> {
    match category {
        EntityCategory::Pets => decode_as::<PetRecord>(value),
        EntityCategory::Facilities => decode_as::<FacilityRecord>(value),
        EntityCategory::Shelters => decode_as::<ShelterRecord>(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_pet_record() {
        let value = json!({
            "postId": 12,
            "latitude": 37.55,
            "longitude": 126.97,
            "status": "missing",
            "thumbnailUrl": "https://img.example/12.jpg",
            "breed": "Maltese",
            "age": "3",
            "gender": "FEMALE",
            "distance": 1.2
        });

        let entity = decode_entity(EntityCategory::Pets, value).unwrap();
        assert_eq!(entity.id, EntityId(12));
        assert_eq!(entity.status, EntityStatus::Missing);
        assert_eq!(entity.image_url.as_deref(), Some("https://img.example/12.jpg"));
        assert_eq!(entity.distance_km, Some(1.2));
        assert_eq!(entity.fallback_label(), "Maltese");
    }

    #[test]
    fn test_decode_shelter_record_counts() {
        let value = json!({
            "shelterId": 3,
            "shelterName": "Mapo Shelter",
            "latitude": 37.56,
            "longitude": 126.90,
            "dogCount": 4,
            "catCount": 2
        });

        let entity = decode_entity(EntityCategory::Shelters, value).unwrap();
        match &entity.detail {
            EntityDetail::ShelterAnimal { animal_counts, .. } => {
                assert_eq!(animal_counts.total(), 6);
            }
            other => panic!("unexpected detail {other:?}"),
        }
        assert_eq!(entity.status, EntityStatus::Sheltered);
        assert_eq!(entity.fallback_label(), "Mapo Shelter");
    }

    #[test]
    fn test_decode_rejects_invalid_coordinates() {
        let value = json!({"id": 1, "name": "Vet", "latitude": 123.0, "longitude": 0.0});
        assert!(decode_entity(EntityCategory::Facilities, value).is_err());
    }

    #[test]
    fn test_unknown_status_maps_to_unknown() {
        assert_eq!(EntityStatus::from_wire("ARCHIVED"), EntityStatus::Unknown);
        assert_eq!(EntityStatus::from_wire(" found "), EntityStatus::Sighted);
    }

    #[test]
    fn test_pet_fallback_label_without_breed() {
        let value = json!({"id": 5, "latitude": 37.0, "longitude": 127.0, "breed": "  ", "petName": "Coco"});
        let entity = decode_entity(EntityCategory::Pets, value).unwrap();
        assert_eq!(entity.fallback_label(), "Coco");
    }

    #[test]
    fn test_with_distance_from_keeps_backend_value() {
        let center = Position::new(37.0, 127.0).unwrap();
        let value = json!({"id": 5, "latitude": 37.01, "longitude": 127.0, "distance": 9.0});
        let entity = decode_entity(EntityCategory::Pets, value)
            .unwrap()
            .with_distance_from(&center);
        assert_eq!(entity.distance_km, Some(9.0));

        let value = json!({"id": 6, "latitude": 37.01, "longitude": 127.0});
        let entity = decode_entity(EntityCategory::Pets, value)
            .unwrap()
            .with_distance_from(&center);
        let d = entity.distance_km.unwrap();
        assert!((1.0..1.2).contains(&d), "distance was {d}");
    }
}
