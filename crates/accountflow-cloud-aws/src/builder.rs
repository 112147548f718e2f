//! Client construction for the three credential sources

use crate::client::AwsClient;
use accountflow_cloud::{
    ClientBuilder, CloudClient, CloudError, Result, SecretRef, SessionCredentials,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::config::Credentials;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

const PROVIDER_NAME: &str = "accountflow";

/// Long-lived access keys read from a credential secret
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Resolves a secret reference to access keys
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn access_keys(&self, secret: &SecretRef) -> Result<AccessKeys>;
}

/// Credential secrets held in memory, keyed by reference
#[derive(Debug, Default)]
pub struct StaticCredentials {
    secrets: RwLock<HashMap<SecretRef, AccessKeys>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, secret: SecretRef, keys: AccessKeys) {
        self.secrets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(secret, keys);
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn access_keys(&self, secret: &SecretRef) -> Result<AccessKeys> {
        self.secrets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(secret)
            .cloned()
            .ok_or_else(|| CloudError::Credentials(format!("secret {} not found", secret)))
    }
}

/// Builds `AwsClient`s from the default credential chain, credential
/// secrets, or assumed-role sessions.
pub struct AwsClientBuilder {
    secrets: Arc<dyn CredentialSource>,
}

impl AwsClientBuilder {
    pub fn new(secrets: Arc<dyn CredentialSource>) -> Self {
        Self { secrets }
    }

    async fn load(region: &str, credentials: Option<Credentials>) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(credentials);
        }
        loader.load().await
    }
}

pub(crate) fn session_credentials(session: &SessionCredentials) -> Credentials {
    Credentials::new(
        session.access_key_id.clone(),
        session.secret_access_key.clone(),
        Some(session.session_token.clone()),
        session.expiration.map(SystemTime::from),
        PROVIDER_NAME,
    )
}

#[async_trait]
impl ClientBuilder for AwsClientBuilder {
    async fn operator_client(&self, region: &str) -> Result<Arc<dyn CloudClient>> {
        tracing::debug!("Building operator client for {}", region);
        let config = Self::load(region, None).await;
        Ok(Arc::new(AwsClient::new(&config)))
    }

    async fn client_from_secret(
        &self,
        secret: &SecretRef,
        region: &str,
    ) -> Result<Arc<dyn CloudClient>> {
        let keys = self.secrets.access_keys(secret).await?;
        tracing::debug!("Building client from secret {} for {}", secret, region);
        let credentials = Credentials::new(
            keys.access_key_id,
            keys.secret_access_key,
            None,
            None,
            PROVIDER_NAME,
        );
        let config = Self::load(region, Some(credentials)).await;
        Ok(Arc::new(AwsClient::new(&config)))
    }

    async fn client_from_session(
        &self,
        credentials: &SessionCredentials,
        region: &str,
    ) -> Result<Arc<dyn CloudClient>> {
        let config = Self::load(region, Some(session_credentials(credentials))).await;
        Ok(Arc::new(AwsClient::new(&config)))
    }
}
