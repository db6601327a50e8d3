use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::next_id;
use crate::{
    api::PinAPI,
    entities::{seed_pins, NewPin, Pin},
    error::{config_error, not_found_error, upstream_error, Error},
};

/// Pin collection kept under `pins/<id>` in a Firebase Realtime Database,
/// accessed through its REST API.
#[derive(Clone, Debug)]
pub struct FirebaseStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

/// The realtime database returns integer-keyed children either as an object
/// or, when the keys are dense enough, as an array with `null` holes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Array(Vec<Option<Pin>>),
    Object(BTreeMap<String, Pin>),
}

impl Snapshot {
    fn into_pins(self) -> Vec<Pin> {
        let mut pins: Vec<Pin> = match self {
            Snapshot::Array(pins) => pins.into_iter().flatten().collect(),
            Snapshot::Object(pins) => pins.into_values().collect(),
        };
        pins.sort_by_key(|pin| pin.id);

        pins
    }
}

impl FirebaseStore {
    pub fn new(database_url: &str, auth_token: Option<String>) -> Result<Self, Error> {
        let base_url = database_url.trim_end_matches('/').to_string();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(config_error(format!(
                "database url must be http(s): {}",
                database_url
            )));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            auth_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let res = self.authorized(request).send().await?;

        let status_code = res.status();
        if !status_code.is_success() {
            return Err(upstream_error(status_code.as_u16()));
        }

        Ok(res)
    }

    /// Reads `path`, mapping a JSON `null` to `None`.
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, Error> {
        let res = self.send(self.client.get(self.url(path))).await?;

        Ok(res.json::<Option<T>>().await?)
    }

    async fn fetch_pins(&self) -> Result<Option<Vec<Pin>>, Error> {
        let snapshot: Option<Snapshot> = self.fetch("pins").await?;

        Ok(snapshot.map(Snapshot::into_pins))
    }
}

#[async_trait]
impl PinAPI for FirebaseStore {
    #[tracing::instrument(skip(self))]
    async fn initialize(&self) -> Result<(), Error> {
        let existing: Option<serde_json::Value> = self.fetch("pins").await?;
        if existing.is_some() {
            return Ok(());
        }

        let pins: BTreeMap<String, Pin> = seed_pins()
            .into_iter()
            .map(|pin| (pin.id.to_string(), pin))
            .collect();

        self.send(self.client.put(self.url("pins")).json(&pins))
            .await?;

        tracing::info!("database initialized with sample pins");

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_pins(&self) -> Result<Vec<Pin>, Error> {
        self.initialize().await?;

        Ok(self.fetch_pins().await?.unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    async fn create_pin(&self, pin: NewPin) -> Result<Pin, Error> {
        self.initialize().await?;

        let pins = self.fetch_pins().await?.unwrap_or_default();
        let pin = pin.into_pin(next_id(pins.iter().map(|pin| pin.id))?);

        self.send(
            self.client
                .put(self.url(&format!("pins/{}", pin.id)))
                .json(&pin),
        )
        .await?;

        Ok(pin)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_pin(&self, id: u64) -> Result<(), Error> {
        self.initialize().await?;

        let path = format!("pins/{}", id);

        // only presence matters, so a malformed record can still be removed
        let existing: Option<serde_json::Value> = self.fetch(&path).await?;
        if existing.is_none() {
            return Err(not_found_error());
        }

        self.send(self.client.delete(self.url(&path))).await?;

        Ok(())
    }
}

#[test]
fn snapshot_array_test() {
    let snapshot: Snapshot = serde_json::from_str(
        r#"[null,
            {"id": 1, "name": "a", "location": [1, 2], "description": "x"},
            null,
            {"id": 3, "name": "c", "location": [3, 4]}]"#,
    )
    .unwrap();

    let ids: Vec<u64> = snapshot.into_pins().iter().map(|pin| pin.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn snapshot_object_test() {
    let snapshot: Snapshot = serde_json::from_str(
        r#"{"12": {"id": 12, "name": "b", "location": [1, 2]},
            "2": {"id": 2, "name": "a", "location": [3, 4], "description": "y"}}"#,
    )
    .unwrap();

    let pins = snapshot.into_pins();
    assert_eq!(pins.iter().map(|pin| pin.id).collect::<Vec<_>>(), vec![2, 12]);
    assert_eq!(pins[0].description, "y");
    assert_eq!(pins[1].description, "");
}

#[test]
fn rejects_non_http_url_test() {
    assert!(FirebaseStore::new("ftp://example.com", None).is_err());

    let store = FirebaseStore::new("https://example.firebaseio.com/", None).unwrap();
    assert_eq!(
        store.url("pins/3"),
        "https://example.firebaseio.com/pins/3.json"
    );
}

#[cfg(test)]
mod fake_database {
    use std::collections::BTreeMap;
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Extension, Path, Query},
        http::StatusCode,
        routing::get,
        Json, Router,
    };
    use serde_json::Value;

    type Tree = Arc<Mutex<Option<BTreeMap<String, Value>>>>;
    type Params = Query<BTreeMap<String, String>>;

    /// Serves the subset of the realtime database REST API the store uses and
    /// returns its base url plus a handle on the stored tree.
    pub fn spawn(required_auth: Option<&'static str>) -> (String, Tree) {
        let tree: Tree = Arc::new(Mutex::new(None));

        let app = Router::new()
            .route("/pins.json", get(get_all).put(put_all))
            .route("/pins/:key", get(get_one).put(put_one).delete(delete_one))
            .layer(Extension(tree.clone()))
            .layer(Extension(required_auth));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);

        (format!("http://{}", addr), tree)
    }

    fn check(auth: Option<&'static str>, params: &Params) -> Result<(), StatusCode> {
        match auth {
            Some(token) if params.get("auth").map(String::as_str) != Some(token) => {
                Err(StatusCode::UNAUTHORIZED)
            }
            _ => Ok(()),
        }
    }

    fn key(raw: &str) -> String {
        raw.trim_end_matches(".json").to_string()
    }

    async fn get_all(
        Extension(tree): Extension<Tree>,
        Extension(auth): Extension<Option<&'static str>>,
        params: Params,
    ) -> Result<Json<Value>, StatusCode> {
        check(auth, &params)?;
        let tree = tree.lock().unwrap();

        Ok(Json(serde_json::to_value(&*tree).unwrap()))
    }

    async fn put_all(
        Extension(tree): Extension<Tree>,
        Extension(auth): Extension<Option<&'static str>>,
        params: Params,
        Json(body): Json<BTreeMap<String, Value>>,
    ) -> Result<Json<Value>, StatusCode> {
        check(auth, &params)?;
        *tree.lock().unwrap() = Some(body.clone());

        Ok(Json(serde_json::to_value(body).unwrap()))
    }

    async fn get_one(
        Extension(tree): Extension<Tree>,
        Extension(auth): Extension<Option<&'static str>>,
        Path(raw): Path<String>,
        params: Params,
    ) -> Result<Json<Value>, StatusCode> {
        check(auth, &params)?;
        let tree = tree.lock().unwrap();
        let value = tree
            .as_ref()
            .and_then(|children| children.get(&key(&raw)).cloned())
            .unwrap_or(Value::Null);

        Ok(Json(value))
    }

    async fn put_one(
        Extension(tree): Extension<Tree>,
        Extension(auth): Extension<Option<&'static str>>,
        Path(raw): Path<String>,
        params: Params,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, StatusCode> {
        check(auth, &params)?;
        tree.lock()
            .unwrap()
            .get_or_insert_with(BTreeMap::new)
            .insert(key(&raw), body.clone());

        Ok(Json(body))
    }

    async fn delete_one(
        Extension(tree): Extension<Tree>,
        Extension(auth): Extension<Option<&'static str>>,
        Path(raw): Path<String>,
        params: Params,
    ) -> Result<Json<Value>, StatusCode> {
        check(auth, &params)?;
        let mut tree = tree.lock().unwrap();
        if let Some(children) = tree.as_mut() {
            children.remove(&key(&raw));
            if children.is_empty() {
                *tree = None;
            }
        }

        Ok(Json(Value::Null))
    }
}

#[tokio::test]
async fn seeds_empty_database_test() {
    let (url, tree) = fake_database::spawn(None);
    let store = FirebaseStore::new(&url, None).unwrap();

    assert_eq!(store.list_pins().await.unwrap(), seed_pins());

    let stored = tree.lock().unwrap().clone().unwrap();
    assert_eq!(stored.keys().cloned().collect::<Vec<_>>(), vec!["1", "2", "3"]);

    store.initialize().await.unwrap();
    assert_eq!(store.list_pins().await.unwrap().len(), 3);
}

#[tokio::test]
async fn create_and_delete_test() {
    let (url, tree) = fake_database::spawn(Some("secret"));
    let store = FirebaseStore::new(&format!("{}/", url), Some("secret".into())).unwrap();

    let here = crate::entities::Coordinates { lat: 46.87, lng: -113.99 };
    let pin = store
        .create_pin(NewPin::new(Some("Bridge".into()), Some(here), None).unwrap())
        .await
        .unwrap();
    assert_eq!(pin.id, 4);
    assert_eq!(
        tree.lock().unwrap().as_ref().unwrap()["4"],
        serde_json::json!({"id": 4, "name": "Bridge", "location": [46.87, -113.99], "description": ""})
    );

    store.delete_pin(2).await.unwrap();
    let ids: Vec<u64> = store
        .list_pins()
        .await
        .unwrap()
        .iter()
        .map(|pin| pin.id)
        .collect();
    assert_eq!(ids, vec![1, 3, 4]);

    assert!(store.delete_pin(2).await.unwrap_err().is_not_found_error());
}

#[tokio::test]
async fn delete_on_fresh_store_matches_file_store_test() {
    use crate::store::FileStore;

    let (url, _tree) = fake_database::spawn(None);
    let firebase = FirebaseStore::new(&url, None).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = FileStore::new(dir.path().join("pins.json"));

    for store in [&firebase as &(dyn PinAPI + Send + Sync), &file] {
        store.delete_pin(2).await.unwrap();

        let ids: Vec<u64> = store
            .list_pins()
            .await
            .unwrap()
            .iter()
            .map(|pin| pin.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(store.delete_pin(2).await.unwrap_err().is_not_found_error());
    }
}

#[tokio::test]
async fn delete_malformed_record_test() {
    let (url, tree) = fake_database::spawn(None);
    let store = FirebaseStore::new(&url, None).unwrap();
    store.initialize().await.unwrap();

    tree.lock()
        .unwrap()
        .as_mut()
        .unwrap()
        .insert("7".into(), serde_json::json!({"name": 12}));

    store.delete_pin(7).await.unwrap();

    assert!(!tree.lock().unwrap().as_ref().unwrap().contains_key("7"));
}

#[tokio::test]
async fn upstream_failure_is_storage_error_test() {
    let (url, _tree) = fake_database::spawn(Some("secret"));
    let store = FirebaseStore::new(&url, Some("wrong".into())).unwrap();

    let err = store.list_pins().await.unwrap_err();
    assert!(err.is_storage_error());
    assert_eq!(err.code, 4);
}

#[tokio::test]
async fn unreachable_database_is_storage_error_test() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = FirebaseStore::new(&url, None).unwrap();

    assert!(store.list_pins().await.unwrap_err().is_storage_error());
}
