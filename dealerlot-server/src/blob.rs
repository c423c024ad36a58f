//! Blob storage for vehicle images
//!
//! Images live under `{container}/{prefix}{VIN}/`. The container and prefix
//! come from the public image base URL. Uploads and listings go through
//! `object_store`'s Azure client, configured from a storage connection
//! string with either an account key or a shared access signature.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::Serialize;

/// Timeout for image existence checks
pub const IMAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Object written to mark an otherwise empty VIN folder
pub const PLACEHOLDER: &str = ".placeholder";

/// Blob storage error type
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Blob storage configuration error: {0}")]
    Configuration(String),

    #[error("VIN contains no alphanumeric characters")]
    InvalidVin,

    #[error("Blob storage request failed: {0}")]
    Storage(#[from] object_store::Error),
}

/// Minimal blob operations needed for VIN folders
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Names of blobs in `container` starting with `prefix`
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError>;

    /// Upload `body` as a block blob
    async fn put(&self, container: &str, path: &str, body: Vec<u8>) -> Result<(), BlobError>;
}

/// Container and path prefix derived from the public image base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLocation {
    pub base_url: String,
    pub container: String,
    /// Empty, or ends with `/`
    pub prefix: String,
}

impl ImageLocation {
    /// Parse `https://host/{container}/{prefix...}`
    pub fn parse(base_url: &str) -> Result<Self, BlobError> {
        let without_scheme = base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(base_url);

        let path = without_scheme
            .split_once('/')
            .map(|(_, path)| path)
            .unwrap_or("")
            .trim_matches('/');

        let (container, prefix) = match path.split_once('/') {
            Some((container, rest)) => (container, format!("{}/", rest.trim_matches('/'))),
            None => (path, String::new()),
        };

        if container.is_empty() {
            return Err(BlobError::Configuration(format!(
                "image base URL '{}' names no container",
                base_url
            )));
        }

        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url,
            container: container.to_string(),
            prefix,
        })
    }

    /// Folder holding a vehicle's images, e.g. `photos/1HGCM82633A004352/`
    pub fn folder_path(&self, vin: &str) -> String {
        format!("{}{}/", self.prefix, vin)
    }

    /// Public URL of a vehicle's primary image
    pub fn image_url(&self, vin: &str) -> String {
        format!("{}{}/1.jpg", self.base_url, vin)
    }
}

/// Strip everything but ASCII alphanumerics and upper-case the rest.
///
/// Returns `None` when nothing is left.
pub fn sanitize_vin_folder(vin: &str) -> Option<String> {
    let clean: String = vin
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!clean.is_empty()).then_some(clean)
}

/// Result of [`ensure_vin_folder`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderOutcome {
    pub created: bool,
    pub container: String,
    pub path: String,
}

/// Make sure a folder exists for `vin`, uploading a placeholder when it has
/// no blobs yet.
pub async fn ensure_vin_folder(
    store: &dyn BlobStore,
    location: &ImageLocation,
    vin: &str,
) -> Result<FolderOutcome, BlobError> {
    let vin = sanitize_vin_folder(vin).ok_or(BlobError::InvalidVin)?;
    let path = location.folder_path(&vin);

    let existing = store.list(&location.container, &path).await?;
    let created = existing.is_empty();

    if created {
        store
            .put(&location.container, &format!("{path}{PLACEHOLDER}"), Vec::new())
            .await?;
        tracing::info!(container = %location.container, path = %path, "VIN folder created");
    } else {
        tracing::debug!(path = %path, blobs = existing.len(), "VIN folder exists");
    }

    Ok(FolderOutcome {
        created,
        container: location.container.clone(),
        path,
    })
}

/// HEAD `url` and report whether it answered with a success status.
///
/// Every failure, including the timeout, counts as "does not exist".
pub async fn image_exists(client: &reqwest::Client, url: &str) -> bool {
    match client.head(url).timeout(IMAGE_CHECK_TIMEOUT).send().await {
        Ok(response) => response.status().is_success(),
        Err(err) => {
            tracing::debug!(url, error = %err, "Image check failed");
            false
        }
    }
}

/// How to reach the storage account
#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredential {
    AccessKey(String),
    /// Query string without the leading `?`
    SharedAccessSignature(String),
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessKey(_) => f.write_str("AccessKey(..)"),
            Self::SharedAccessSignature(_) => f.write_str("SharedAccessSignature(..)"),
        }
    }
}

/// Parsed `Key=Value;...` storage connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConnection {
    /// `UseDevelopmentStorage=true`
    Emulator,
    Account {
        account: String,
        /// Blob service URL without a trailing slash
        endpoint: String,
        credential: StorageCredential,
    },
}

impl StorageConnection {
    /// Accepts the portal's account-key form as well as SAS strings.
    ///
    /// Without `BlobEndpoint` the endpoint is built from
    /// `DefaultEndpointsProtocol`, `AccountName` and `EndpointSuffix`. With
    /// it, `AccountName` may be left out and is read from the host.
    pub fn parse(connection_string: &str) -> Result<Self, BlobError> {
        let field = |key: &str| {
            connection_string
                .split(';')
                .filter_map(|part| part.trim().split_once('='))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let invalid = |reason: &str| BlobError::Configuration(format!("connection string {reason}"));

        if field("UseDevelopmentStorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self::Emulator);
        }

        let credential = match (field("AccountKey"), field("SharedAccessSignature")) {
            (Some(key), _) => StorageCredential::AccessKey(key),
            (None, Some(sas)) => {
                StorageCredential::SharedAccessSignature(sas.trim_start_matches('?').to_string())
            }
            (None, None) => return Err(invalid("has neither AccountKey nor SharedAccessSignature")),
        };

        let blob_endpoint = field("BlobEndpoint").map(|e| e.trim_end_matches('/').to_string());
        let account = match (field("AccountName"), &blob_endpoint) {
            (Some(account), _) => account,
            (None, Some(endpoint)) => account_from_endpoint(endpoint)
                .ok_or_else(|| invalid("has no AccountName and BlobEndpoint does not name one"))?,
            (None, None) => return Err(invalid("has neither AccountName nor BlobEndpoint")),
        };

        let endpoint = blob_endpoint.unwrap_or_else(|| {
            let protocol = field("DefaultEndpointsProtocol").unwrap_or_else(|| "https".into());
            let suffix = field("EndpointSuffix").unwrap_or_else(|| "core.windows.net".into());
            format!("{protocol}://{account}.blob.{suffix}")
        });

        Ok(Self::Account {
            account,
            endpoint,
            credential,
        })
    }

    fn builder(&self, container: &str) -> MicrosoftAzureBuilder {
        let builder = MicrosoftAzureBuilder::new().with_container_name(container);

        match self {
            Self::Emulator => builder.with_use_emulator(true),
            Self::Account {
                account,
                endpoint,
                credential,
            } => {
                let builder = builder
                    .with_account(account.as_str())
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(endpoint.starts_with("http://"));
                match credential {
                    StorageCredential::AccessKey(key) => builder.with_access_key(key.as_str()),
                    StorageCredential::SharedAccessSignature(sas) => {
                        builder.with_config(AzureConfigKey::SasKey, sas.as_str())
                    }
                }
            }
        }
    }
}

/// First host label of `https://{account}.blob.{suffix}`
fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint.split_once("://")?.1.split(['/', ':']).next()?;
    let (account, rest) = host.split_once('.')?;
    rest.starts_with("blob.").then(|| account.to_string())
}

/// Azure Blob storage through `object_store`, one client per container
#[derive(Debug)]
pub struct AzureBlobStore {
    connection: StorageConnection,
    containers: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl AzureBlobStore {
    pub fn from_connection_string(connection_string: &str) -> Result<Self, BlobError> {
        Ok(Self::new(StorageConnection::parse(connection_string)?))
    }

    pub fn new(connection: StorageConnection) -> Self {
        Self {
            connection,
            containers: Mutex::new(HashMap::new()),
        }
    }

    pub fn connection(&self) -> &StorageConnection {
        &self.connection
    }

    /// Cached client for `container`, built on first use
    fn container(&self, container: &str) -> Result<Arc<dyn ObjectStore>, BlobError> {
        let mut containers = self.containers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = containers.get(container) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = Arc::new(
            self.connection
                .builder(container)
                .build()
                .map_err(|e| BlobError::Configuration(e.to_string()))?,
        );
        tracing::debug!(container, "Blob container client created");
        containers.insert(container.to_string(), store.clone());
        Ok(store)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let store = self.container(container)?;
        let prefix = ObjectPath::from(prefix);

        let objects: Vec<_> = store.list(Some(&prefix)).try_collect().await?;
        Ok(objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }

    async fn put(&self, container: &str, path: &str, body: Vec<u8>) -> Result<(), BlobError> {
        let store = self.container(container)?;
        store
            .put(&ObjectPath::from(path), PutPayload::from(body))
            .await?;
        Ok(())
    }
}

/// In-process blob store, for local runs and tests
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeSet<(String, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, container: &str, path: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(container.to_string(), path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let blobs = self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(blobs
            .iter()
            .filter(|(c, path)| c == container && path.starts_with(prefix))
            .map(|(_, path)| path.clone())
            .collect())
    }

    async fn put(&self, container: &str, path: &str, _body: Vec<u8>) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((container.to_string(), path.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_from_default_url() {
        let location =
            ImageLocation::parse("https://dealerlotimages.blob.core.windows.net/vehicle-images/")
                .unwrap();

        assert_eq!(location.container, "vehicle-images");
        assert_eq!(location.prefix, "");
        assert_eq!(location.folder_path("ABC123"), "ABC123/");
        assert_eq!(
            location.image_url("ABC123"),
            "https://dealerlotimages.blob.core.windows.net/vehicle-images/ABC123/1.jpg"
        );
    }

    #[test]
    fn location_with_prefix() {
        let location = ImageLocation::parse("https://host/images/lots/north").unwrap();

        assert_eq!(location.container, "images");
        assert_eq!(location.prefix, "lots/north/");
        assert_eq!(location.folder_path("VIN1"), "lots/north/VIN1/");
    }

    #[test]
    fn location_without_container_is_rejected() {
        assert!(matches!(
            ImageLocation::parse("https://host/"),
            Err(BlobError::Configuration(_))
        ));
    }

    #[test]
    fn sanitize_strips_and_uppercases() {
        assert_eq!(
            sanitize_vin_folder(" 1hg-cm8/2633a.004352 "),
            Some("1HGCM82633A004352".to_string())
        );
        assert_eq!(sanitize_vin_folder("--/--"), None);
    }

    #[test]
    fn account_key_connection_string() {
        let connection = StorageConnection::parse(
            "DefaultEndpointsProtocol=https;AccountName=lot;AccountKey=a2V5;EndpointSuffix=core.windows.net",
        )
        .unwrap();

        assert_eq!(
            connection,
            StorageConnection::Account {
                account: "lot".into(),
                endpoint: "https://lot.blob.core.windows.net".into(),
                credential: StorageCredential::AccessKey("a2V5".into()),
            }
        );
    }

    #[test]
    fn sas_with_blob_endpoint() {
        let connection = StorageConnection::parse(
            "BlobEndpoint=https://acct.blob.core.windows.net/;SharedAccessSignature=?sv=2022&sig=a%3D",
        )
        .unwrap();

        assert_eq!(
            connection,
            StorageConnection::Account {
                account: "acct".into(),
                endpoint: "https://acct.blob.core.windows.net".into(),
                credential: StorageCredential::SharedAccessSignature("sv=2022&sig=a%3D".into()),
            }
        );
    }

    #[test]
    fn local_endpoint_keeps_account_name() {
        let connection = StorageConnection::parse(
            "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;AccountKey=a2V5;\
             BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;",
        )
        .unwrap();

        let StorageConnection::Account {
            account, endpoint, ..
        } = connection
        else {
            panic!("expected an account connection");
        };
        assert_eq!(account, "devstoreaccount1");
        assert_eq!(endpoint, "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn development_storage_uses_emulator() {
        assert_eq!(
            StorageConnection::parse("UseDevelopmentStorage=true").unwrap(),
            StorageConnection::Emulator
        );
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = StorageConnection::parse("AccountName=lot").unwrap_err();
        assert!(err.to_string().contains("AccountKey"));

        let err = StorageConnection::parse("AccountKey=a2V5").unwrap_err();
        assert!(err.to_string().contains("AccountName"));
    }

    #[test]
    fn credentials_are_redacted_in_debug() {
        let connection = StorageConnection::parse("AccountName=lot;AccountKey=c2VjcmV0").unwrap();
        assert!(!format!("{connection:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn container_clients_are_cached() {
        let store =
            AzureBlobStore::from_connection_string("AccountName=lot;AccountKey=a2V5").unwrap();

        let first = store.container("vehicle-images").unwrap();
        let second = store.container("vehicle-images").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn ensure_creates_placeholder_once() {
        let store = MemoryBlobStore::new();
        let location = ImageLocation::parse("https://host/vehicle-images/").unwrap();

        let first = ensure_vin_folder(&store, &location, "abc-123").await.unwrap();
        assert!(first.created);
        assert_eq!(first.container, "vehicle-images");
        assert_eq!(first.path, "ABC123/");
        assert!(store.contains("vehicle-images", "ABC123/.placeholder"));

        let second = ensure_vin_folder(&store, &location, "ABC123").await.unwrap();
        assert!(!second.created);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn ensure_rejects_empty_vin() {
        let store = MemoryBlobStore::new();
        let location = ImageLocation::parse("https://host/vehicle-images/").unwrap();

        assert!(matches!(
            ensure_vin_folder(&store, &location, "***").await,
            Err(BlobError::InvalidVin)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unreachable_image_does_not_exist() {
        let client = reqwest::Client::new();
        assert!(!image_exists(&client, "http://127.0.0.1:9/missing.jpg").await);
    }
}
