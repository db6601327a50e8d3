use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::{config_error, Error};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PINS_FILE: &str = "pins.json";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    pub store: StoreConfig,
    pub static_dir: Option<PathBuf>,
}

/// Which backend holds the pin collection.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreConfig {
    File {
        path: PathBuf,
    },
    Firebase {
        url: String,
        auth_token: Option<String>,
    },
}

impl Config {
    /// Reads the process environment. Call `dotenv` first to pick up `.env`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(err.into()),
        })
    }

    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Result<Option<String>, Error>,
    {
        let lookup = |key: &str| -> Result<Option<String>, Error> {
            Ok(lookup(key)?.filter(|value| !value.trim().is_empty()))
        };

        let host: IpAddr = match lookup("HOST")? {
            Some(host) => host.parse().map_err(config_error)?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let port: u16 = match lookup("PORT")? {
            Some(port) => port.parse().map_err(config_error)?,
            None => DEFAULT_PORT,
        };

        let store = match lookup("FIREBASE_DATABASE_URL")? {
            Some(url) => StoreConfig::Firebase {
                url,
                auth_token: lookup("FIREBASE_AUTH_TOKEN")?,
            },
            None => StoreConfig::File {
                path: lookup("PINS_FILE")?
                    .unwrap_or_else(|| DEFAULT_PINS_FILE.into())
                    .into(),
            },
        };

        Ok(Self {
            addr: SocketAddr::new(host, port),
            store,
            static_dir: lookup("STATIC_DIR")?.map(PathBuf::from),
        })
    }
}

#[cfg(test)]
fn lookup_from(
    pairs: &'static [(&'static str, &'static str)],
) -> impl Fn(&str) -> Result<Option<String>, Error> {
    move |key| {
        Ok(pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()))
    }
}

#[test]
fn defaults_test() {
    let config = Config::from_lookup(lookup_from(&[])).unwrap();

    assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 3000)));
    assert_eq!(
        config.store,
        StoreConfig::File {
            path: "pins.json".into()
        }
    );
    assert_eq!(config.static_dir, None);
}

#[test]
fn firebase_selected_by_url_test() {
    let config = Config::from_lookup(lookup_from(&[
        ("FIREBASE_DATABASE_URL", "https://example.firebaseio.com/"),
        ("FIREBASE_AUTH_TOKEN", "secret"),
        ("PINS_FILE", "ignored.json"),
        ("PORT", "8080"),
        ("HOST", "0.0.0.0"),
        ("STATIC_DIR", "public"),
    ]))
    .unwrap();

    assert_eq!(config.addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    assert_eq!(
        config.store,
        StoreConfig::Firebase {
            url: "https://example.firebaseio.com/".into(),
            auth_token: Some("secret".into()),
        }
    );
    assert_eq!(config.static_dir, Some(PathBuf::from("public")));
}

#[test]
fn blank_values_are_unset_test() {
    let config = Config::from_lookup(lookup_from(&[
        ("FIREBASE_DATABASE_URL", "  "),
        ("PINS_FILE", "data/pins.json"),
    ]))
    .unwrap();

    assert_eq!(
        config.store,
        StoreConfig::File {
            path: "data/pins.json".into()
        }
    );
}

#[test]
fn malformed_port_test() {
    let err = Config::from_lookup(lookup_from(&[("PORT", "http")])).unwrap_err();

    assert_eq!(err.code, 1);
}

#[test]
fn non_unicode_value_test() {
    use std::ffi::OsString;

    let err = Config::from_lookup(|key| match key {
        "PINS_FILE" => Err(env::VarError::NotUnicode(OsString::from("pins")).into()),
        _ => Ok(None),
    })
    .unwrap_err();

    assert_eq!(err.code, 1);
    assert!(err.message.contains("unicode"));
}
