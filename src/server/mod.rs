mod handlers;

use std::io;
use std::net::SocketAddr;
use std::path::Path;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{delete, get, get_service},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::api::{DynAPI, PinAPI};
use crate::config::Config;
use crate::error::{server_error, Error};
use crate::server::handlers::pins;

pub fn router(api: DynAPI, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/pins", get(pins::list).post(pins::create))
        .route("/api/pins/:id", delete(pins::delete));

    if let Some(dir) = static_dir {
        app = app.fallback(get_service(ServeDir::new(dir)).handle_error(
            |err: io::Error| async move {
                tracing::error!("static file error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            },
        ));
    }

    app.layer(Extension(api))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(api: DynAPI, config: &Config) -> Result<(), Error> {
    // requests retry initialization, so a failure here is only logged
    if let Err(err) = api.initialize().await {
        tracing::error!("failed to initialize pin store: {}", err);
    }

    let app = router(api, config.static_dir.as_deref());
    let addr: SocketAddr = config.addr;

    tracing::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)
        .map_err(server_error)?
        .serve(app.into_make_service())
        .await
        .map_err(server_error)
}

#[cfg(test)]
fn spawn_router(app: Router) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);

    format!("http://{}", addr)
}

#[tokio::test]
async fn pin_routes_test() {
    use crate::store::FileStore;
    use serde_json::{json, Value};
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let api: DynAPI = Arc::new(FileStore::new(dir.path().join("pins.json")));
    let base = spawn_router(router(api, None));
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/pins", base))
        .json(&json!({"name": "X", "location": [1, 2]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"id": 4, "name": "X", "location": [1.0, 2.0], "description": ""})
    );

    let res = client
        .post(format!("{}/api/pins", base))
        .json(&json!({"location": [1, 2]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let res = client
        .post(format!("{}/api/pins", base))
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(res.json::<Value>().await.unwrap()["code"], 101);

    let res = client
        .delete(format!("{}/api/pins/1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let res = client
        .delete(format!("{}/api/pins/1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);

    let pins: Vec<Value> = client
        .get(format!("{}/api/pins", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<u64> = pins.iter().map(|pin| pin["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![2, 3, 4]);
}

#[tokio::test]
async fn cors_and_static_files_test() {
    use crate::store::FileStore;
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let public = dir.path().join("public");
    std::fs::create_dir(&public).unwrap();
    std::fs::write(public.join("index.html"), "<h1>map</h1>").unwrap();

    let api: DynAPI = Arc::new(FileStore::new(dir.path().join("pins.json")));
    let base = spawn_router(router(api, Some(public.as_path())));
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/index.html", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.text().await.unwrap(), "<h1>map</h1>");

    let res = client
        .get(format!("{}/api/pins", base))
        .header("origin", "http://localhost:8080")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        "*"
    );
}
