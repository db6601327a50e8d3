use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};
use std::io;

#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_validation_error(&self) -> bool {
        self.code == 100 || self.code == 101
    }

    pub fn is_not_found_error(&self) -> bool {
        self.code == 104
    }

    pub fn is_storage_error(&self) -> bool {
        (2..=5).contains(&self.code)
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            104 => StatusCode::NOT_FOUND,
            1..=99 => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        config_error(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        storage_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        serialization_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let error_message = if status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
            "Internal Server Error"
        } else {
            tracing::warn!(code = self.code, "{}", self.message);
            self.message.as_str()
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn validation_error(message: &str) -> Error {
    Error {
        code: 100,
        message: message.into(),
    }
}

pub fn invalid_input_error<T: Display>(err: T) -> Error {
    Error {
        code: 101,
        message: format!("invalid input: {}", err),
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: 104,
        message: "Pin not found".into(),
    }
}

pub fn config_error<T: Display>(err: T) -> Error {
    Error {
        code: 1,
        message: format!("configuration error: {}", err),
    }
}

pub fn storage_error<T: Debug>(err: T) -> Error {
    Error {
        code: 2,
        message: format!("storage error: {:?}", err),
    }
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: format!("reqwest error: {}", err),
    }
}

pub fn upstream_error(status: u16) -> Error {
    Error {
        code: 4,
        message: format!("upstream error: status {}", status),
    }
}

pub fn serialization_error(err: serde_json::Error) -> Error {
    Error {
        code: 5,
        message: format!("serialization error: {}", err),
    }
}

pub fn server_error<T: Debug>(err: T) -> Error {
    Error {
        code: 6,
        message: format!("server error: {:?}", err),
    }
}

#[test]
fn status_mapping_test() {
    assert_eq!(
        validation_error("Name and location are required").status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(invalid_input_error("bad json").status(), StatusCode::BAD_REQUEST);
    assert_eq!(not_found_error().status(), StatusCode::NOT_FOUND);
    assert_eq!(
        storage_error(io::Error::new(io::ErrorKind::Other, "disk")).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(upstream_error(503).status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn error_kind_test() {
    assert!(validation_error("x").is_validation_error());
    assert!(invalid_input_error("x").is_validation_error());
    assert!(not_found_error().is_not_found_error());
    assert!(storage_error("x").is_storage_error());
    assert!(upstream_error(500).is_storage_error());
    assert!(!config_error("x").is_storage_error());
}

#[test]
fn internal_error_body_hides_message_test() {
    use tokio_test::block_on;

    let response = storage_error("secret path").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = block_on(response_body_bytes(response));
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 2);
    assert_eq!(body["error"], "Internal Server Error");
}

#[cfg(test)]
pub(crate) async fn response_body_bytes(response: Response) -> Vec<u8> {
    use axum::body::HttpBody;

    let mut body = response.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    bytes
}
