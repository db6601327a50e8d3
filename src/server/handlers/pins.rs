use axum::extract::{rejection::JsonRejection, Extension, Json, Path};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::{DynAPI, PinAPI};
use crate::entities::{Coordinates, NewPin, Pin};
use crate::error::{invalid_input_error, not_found_error, Error};

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    name: Option<String>,
    location: Option<Coordinates>,
    description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    message: String,
}

pub async fn list(Extension(api): Extension<DynAPI>) -> Result<Json<Vec<Pin>>, Error> {
    let pins = api.list_pins().await?;

    Ok(pins.into())
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    params: Result<Json<CreateParams>, JsonRejection>,
) -> Result<(StatusCode, Json<Pin>), Error> {
    let Json(params) = params.map_err(invalid_input_error)?;

    let pin = NewPin::new(params.name, params.location, params.description)?;
    let pin = api.create_pin(pin).await?;

    tracing::info!(id = pin.id, "pin created");

    Ok((StatusCode::CREATED, pin.into()))
}

pub async fn delete(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<String>,
) -> Result<Json<Message>, Error> {
    // ids that are not integers cannot name a stored pin
    let id: u64 = id.parse().map_err(|_| not_found_error())?;

    api.delete_pin(id).await?;

    tracing::info!(id, "pin deleted");

    Ok(Message {
        message: "Pin deleted successfully".into(),
    }
    .into())
}

#[cfg(test)]
fn file_api(dir: &tempfile::TempDir) -> DynAPI {
    use crate::store::FileStore;
    use std::sync::Arc;

    Arc::new(FileStore::new(dir.path().join("pins.json")))
}

#[cfg(test)]
fn body_json(response: axum::response::Response) -> serde_json::Value {
    use crate::error::response_body_bytes;

    let bytes = tokio_test::block_on(response_body_bytes(response));
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn list_returns_seeds_test() {
    use axum::response::IntoResponse;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let response = block_on(list(Extension(file_api(&dir)))).into_response();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["name"], "University of Montana");
}

#[test]
fn create_returns_created_pin_test() {
    use axum::response::IntoResponse;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let params = CreateParams {
        name: Some("Hip Strip".into()),
        location: Some(Coordinates {
            lat: 46.8650,
            lng: -113.9990,
        }),
        description: None,
    };

    let response = block_on(create(Extension(file_api(&dir)), Ok(Json(params)))).into_response();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(response),
        serde_json::json!({
            "id": 4,
            "name": "Hip Strip",
            "location": [46.8650, -113.9990],
            "description": "",
        })
    );
}

#[test]
fn create_missing_fields_is_bad_request_test() {
    use axum::response::IntoResponse;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let api = file_api(&dir);

    let missing_name = CreateParams {
        name: None,
        location: Some(Coordinates { lat: 1.0, lng: 2.0 }),
        description: Some("no name".into()),
    };
    let missing_location = CreateParams {
        name: Some("X".into()),
        location: None,
        description: None,
    };

    for params in [missing_name, missing_location] {
        let response = block_on(create(Extension(api.clone()), Ok(Json(params)))).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response)["error"], "Name and location are required");
    }

    assert_eq!(block_on(api.list_pins()).unwrap().len(), 3);
}

#[test]
fn delete_test() {
    use axum::response::IntoResponse;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let api = file_api(&dir);

    let response = block_on(delete(Extension(api.clone()), Path("2".into()))).into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response),
        serde_json::json!({"message": "Pin deleted successfully"})
    );

    let response = block_on(delete(Extension(api.clone()), Path("2".into()))).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response)["error"], "Pin not found");

    let response = block_on(delete(Extension(api.clone()), Path("abc".into()))).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let ids: Vec<u64> = block_on(api.list_pins())
        .unwrap()
        .iter()
        .map(|pin| pin.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn storage_failure_is_internal_error_test() {
    use axum::response::IntoResponse;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pins.json"), "{").unwrap();

    let response = block_on(list(Extension(file_api(&dir)))).into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response)["error"], "Internal Server Error");
}
