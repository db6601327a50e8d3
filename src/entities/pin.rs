use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{validation_error, Error};

/// A named point on the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: u64,
    pub name: String,
    pub location: Coordinates,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

/// Latitude/longitude pair, serialized as `[lat, lng]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl From<[f64; 2]> for Coordinates {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(coordinates: Coordinates) -> Self {
        [coordinates.lat, coordinates.lng]
    }
}

/// Validated input for creating a pin. The store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPin {
    name: String,
    location: Coordinates,
    description: String,
}

impl NewPin {
    /// Fails unless `name` is non-empty and `location` is present.
    pub fn new(
        name: Option<String>,
        location: Option<Coordinates>,
        description: Option<String>,
    ) -> Result<Self, Error> {
        match (name, location) {
            (Some(name), Some(location)) if !name.is_empty() => Ok(Self {
                name,
                location,
                description: description.unwrap_or_default(),
            }),
            _ => Err(validation_error("Name and location are required")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_pin(self, id: u64) -> Pin {
        Pin {
            id,
            name: self.name,
            location: self.location,
            description: self.description,
        }
    }
}

/// Sample pins written when no collection has been persisted yet.
pub fn seed_pins() -> Vec<Pin> {
    vec![
        Pin {
            id: 1,
            name: "University of Montana".into(),
            location: Coordinates {
                lat: 46.8619,
                lng: -113.9847,
            },
            description: "Home of the Grizzlies!".into(),
        },
        Pin {
            id: 2,
            name: "Caras Park".into(),
            location: Coordinates {
                lat: 46.8701,
                lng: -113.9957,
            },
            description: "Riverside park with events and a carousel".into(),
        },
        Pin {
            id: 3,
            name: "Mount Sentinel".into(),
            location: Coordinates {
                lat: 46.8574,
                lng: -113.9776,
            },
            description: "Hike to the M for great views!".into(),
        },
    ]
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[test]
fn pin_json_shape_test() {
    let pin = NewPin::new(
        Some("X".into()),
        Some(Coordinates { lat: 1.0, lng: 2.0 }),
        None,
    )
    .unwrap()
    .into_pin(1);

    assert_eq!(
        serde_json::to_value(&pin).unwrap(),
        serde_json::json!({
            "id": 1,
            "name": "X",
            "location": [1.0, 2.0],
            "description": "",
        })
    );
}

#[test]
fn pin_description_defaults_test() {
    let missing: Pin =
        serde_json::from_str(r#"{"id": 4, "name": "Bridge", "location": [46.87, -113.99]}"#)
            .unwrap();
    assert_eq!(missing.description, "");

    let null: Pin = serde_json::from_str(
        r#"{"id": 5, "name": "Bridge", "location": [46.87, -113.99], "description": null}"#,
    )
    .unwrap();
    assert_eq!(null.description, "");
}

#[test]
fn new_pin_requires_name_and_location_test() {
    let here = Coordinates { lat: 1.0, lng: 2.0 };

    assert!(NewPin::new(None, Some(here), None)
        .unwrap_err()
        .is_validation_error());
    assert!(NewPin::new(Some("".into()), Some(here), None)
        .unwrap_err()
        .is_validation_error());
    assert!(NewPin::new(Some("X".into()), None, Some("desc".into()))
        .unwrap_err()
        .is_validation_error());

    let pin = NewPin::new(Some("X".into()), Some(here), Some("desc".into())).unwrap();
    assert_eq!(pin.name(), "X");
}

#[test]
fn coordinates_reject_wrong_arity_test() {
    assert!(serde_json::from_str::<Coordinates>("[1.0]").is_err());
    assert!(serde_json::from_str::<Coordinates>("[1.0, 2.0, 3.0]").is_err());
}

#[test]
fn seed_pins_have_unique_ids_test() {
    let seeds = seed_pins();
    let mut ids: Vec<u64> = seeds.iter().map(|pin| pin.id).collect();
    ids.dedup();

    assert_eq!(ids, vec![1, 2, 3]);
}
