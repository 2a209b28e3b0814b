//! Storefront manifest retrieval.

use std::fs;
use std::path::PathBuf;

use pakstore_domain::Catalog;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{PakStoreError, Result};
use crate::net::Transport;

/// Where the catalog is read from. An override beats the network sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSource {
    pub url: String,
    pub backup_url: Option<String>,
    pub override_source: Option<String>,
}

impl CatalogSource {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.storefront_url.clone(),
            backup_url: settings.storefront_backup_url.clone(),
            override_source: settings.storefront_override.clone(),
        }
    }
}

enum Location {
    Remote(String),
    Local(PathBuf),
}

fn classify(raw: &str) -> Result<Location> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(Location::Remote(raw.to_string()));
    }
    if raw.starts_with("file:") {
        let parsed = Url::parse(raw).map_err(|err| PakStoreError::network(raw, err))?;
        let path = parsed
            .to_file_path()
            .map_err(|()| PakStoreError::network(raw, "not a local file URL"))?;
        return Ok(Location::Local(path));
    }
    Ok(Location::Local(PathBuf::from(raw)))
}

fn read_location(transport: &dyn Transport, location: &Location) -> Result<(String, Vec<u8>)> {
    match location {
        Location::Remote(url) => Ok((url.clone(), transport.get(url)?)),
        Location::Local(path) => {
            let bytes = fs::read(path).map_err(PakStoreError::io(path))?;
            Ok((path.display().to_string(), bytes))
        }
    }
}

fn parse(origin: &str, bytes: &[u8]) -> Result<Catalog> {
    Catalog::from_json(bytes).map_err(|err| PakStoreError::Parse {
        origin: origin.to_string(),
        message: err.to_string(),
    })
}

/// Fetch and parse the catalog.
///
/// With no override, a network failure on the primary URL is retried once
/// against the backup URL. Parse failures are never retried.
pub fn fetch_catalog(transport: &dyn Transport, source: &CatalogSource) -> Result<Catalog> {
    if let Some(raw) = source.override_source.as_deref() {
        info!(source = raw, "using catalog override");
        let (origin, bytes) = read_location(transport, &classify(raw)?)?;
        return parse(&origin, &bytes);
    }

    let bytes = match transport.get(&source.url) {
        Ok(bytes) => bytes,
        Err(err @ PakStoreError::Network { .. }) => {
            let Some(backup) = source.backup_url.as_deref() else {
                return Err(err);
            };
            warn!(error = %err, backup, "primary catalog unavailable, trying backup");
            let bytes = transport.get(backup)?;
            return parse(backup, &bytes);
        }
        Err(err) => return Err(err),
    };
    parse(&source.url, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::HttpTransport;

    use httptest::{matchers::request, responders::status_code, Expectation, Server};

    const MANIFEST: &str = r#"{
        "name": "Test Store",
        "paks": [{
            "storefront_name": "Thing",
            "name": "Thing",
            "version": "1.0.0",
            "type": "TOOL",
            "categories": ["Tools"]
        }]
    }"#;

    fn source(url: String, backup: Option<String>, override_source: Option<String>) -> CatalogSource {
        CatalogSource {
            url,
            backup_url: backup,
            override_source,
        }
    }

    #[test]
    fn primary_url_is_parsed() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/storefront.json"))
                .respond_with(status_code(200).body(MANIFEST)),
        );
        let transport = HttpTransport::new()?;
        let catalog = fetch_catalog(
            &transport,
            &source(server.url_str("/storefront.json"), None, None),
        )?;
        assert_eq!(catalog.name, "Test Store");
        assert_eq!(catalog.paks[0].display_name, "Thing");
        Ok(())
    }

    #[test]
    fn backup_is_used_when_primary_fails() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/primary.json"))
                .respond_with(status_code(503)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/backup.json"))
                .respond_with(status_code(200).body(MANIFEST)),
        );
        let transport = HttpTransport::new()?;
        let catalog = fetch_catalog(
            &transport,
            &source(
                server.url_str("/primary.json"),
                Some(server.url_str("/backup.json")),
                None,
            ),
        )?;
        assert_eq!(catalog.paks.len(), 1);
        Ok(())
    }

    #[test]
    fn malformed_manifest_is_a_parse_error() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/storefront.json"))
                .respond_with(status_code(200).body("{ not json")),
        );
        let transport = HttpTransport::new()?;
        let err = fetch_catalog(
            &transport,
            &source(server.url_str("/storefront.json"), None, None),
        )
        .expect_err("parse failure");
        assert!(matches!(err, PakStoreError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn file_override_takes_precedence() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storefront.json");
        fs::write(&path, MANIFEST)?;
        let transport = HttpTransport::new()?;
        let unreachable = "http://127.0.0.1:9/storefront.json".to_string();

        let as_url = Url::from_file_path(&path)
            .map_err(|()| anyhow::anyhow!("file url"))?
            .to_string();
        let by_url = fetch_catalog(&transport, &source(unreachable.clone(), None, Some(as_url)))?;
        assert_eq!(by_url.name, "Test Store");

        let by_path = fetch_catalog(
            &transport,
            &source(unreachable, None, Some(path.display().to_string())),
        )?;
        assert_eq!(by_path, by_url);
        Ok(())
    }
}
