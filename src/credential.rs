//! Per-instance connection descriptors with expiry-driven refresh.
//!
//! A [`CredentialCache`] is constructed once and shared by every operation of
//! a [`TableStore`](crate::TableStore). Each logical instance keeps one
//! [`ConnectionDescriptor`]; when it expires the next [`resolve`] performs a
//! fresh authentication and swaps the entry. Refreshes for one instance are
//! serialised behind a per-instance async lock, so concurrent callers wait for
//! the in-flight refresh instead of authenticating again. A token request that
//! outlives the refresh timeout fails and releases the lock.
//!
//! [`resolve`]: CredentialCache::resolve

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_lock::RwLock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockable::{AsyncLimit, LockableHashMap};
use thiserror::Error;

use crate::observability::{log_debug, log_warn};

/// Failures while resolving connection details for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No [`InstanceConfig`] is registered under this name.
    #[error("no instance named {0} is registered")]
    UnknownInstance(String),
    /// The identity provider refused the credential.
    #[error("instance {instance}: token request rejected: {message}")]
    Rejected {
        /// Instance being authenticated.
        instance: String,
        /// Provider's explanation.
        message: String,
    },
    /// The identity provider could not be reached or did not answer in time.
    #[error("instance {instance}: identity provider unavailable: {message}")]
    Unavailable {
        /// Instance being authenticated.
        instance: String,
        /// What went wrong.
        message: String,
    },
}

/// How an instance authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Ambient identity of the host; `client_id` selects a user-assigned identity.
    ManagedIdentity {
        /// User-assigned identity; `None` uses the system identity.
        client_id: Option<String>,
    },
    /// Application registration with a client secret.
    Application {
        /// Application (client) id.
        client_id: String,
        /// Secret issued for the application.
        client_secret: String,
    },
    /// A ready-made connection string; no token round-trip.
    ConnectionString(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
            Credential::Application { client_id, .. } => f
                .debug_struct("Application")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credential::ConnectionString(_) => f.write_str("ConnectionString(<redacted>)"),
        }
    }
}

/// Static description of one logical storage instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Logical name callers resolve by.
    pub name: String,
    /// Storage account name.
    pub account: String,
    /// Table service endpoint of the account.
    pub endpoint: String,
    /// Directory tenant the credential belongs to.
    pub tenant_id: String,
    /// How the instance authenticates.
    pub credential: Credential,
}

impl InstanceConfig {
    /// Instance on the account's default endpoint, using the system managed identity.
    pub fn new(name: impl Into<String>, account: impl Into<String>) -> Self {
        let account = account.into();
        InstanceConfig {
            name: name.into(),
            endpoint: format!("https://{account}.table.core.windows.net"),
            account,
            tenant_id: String::new(),
            credential: Credential::ManagedIdentity { client_id: None },
        }
    }

    /// Overrides the table service endpoint.
    pub fn endpoint(self, endpoint: impl Into<String>) -> Self {
        InstanceConfig {
            endpoint: endpoint.into(),
            ..self
        }
    }

    /// Sets the directory tenant.
    pub fn tenant_id(self, tenant_id: impl Into<String>) -> Self {
        InstanceConfig {
            tenant_id: tenant_id.into(),
            ..self
        }
    }

    /// Sets how the instance authenticates.
    pub fn credential(self, credential: Credential) -> Self {
        InstanceConfig { credential, ..self }
    }
}

/// Bearer token returned by a [`TokenProvider`].
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer token text.
    pub token: String,
    /// Instant after which the token is no longer accepted.
    pub expires_on: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Identity collaborator that exchanges a credential for a token.
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Requests a fresh token for `instance`.
    async fn acquire(&self, instance: &InstanceConfig) -> Result<AccessToken, AuthError>;
}

/// Connection details for one instance, valid until `expiry`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    connection_string: String,
    expiry: Option<DateTime<Utc>>,
}

impl ConnectionDescriptor {
    /// Descriptor valid until `expiry`; `None` never expires.
    pub fn new(connection_string: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            connection_string: connection_string.into(),
            expiry,
        }
    }

    /// Connection string handed to the [`Connector`](crate::Connector).
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// When the descriptor stops being valid.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Whether the descriptor is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map_or(true, |expiry| now < expiry)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("connection_string", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Bound on a single token request when none is configured.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared cache of connection descriptors, one per registered instance.
///
/// Hits are served under a shared read lock. Misses and expired entries take
/// a per-instance refresh lock, so at most one token request per instance is
/// in flight and it is bounded by [`refresh_timeout`](Self::refresh_timeout).
pub struct CredentialCache<P> {
    provider: P,
    instances: HashMap<String, InstanceConfig>,
    descriptors: RwLock<HashMap<String, Arc<ConnectionDescriptor>>>,
    refreshing: LockableHashMap<String, ()>,
    refresh_timeout: Duration,
}

impl<P> CredentialCache<P>
where
    P: TokenProvider,
{
    /// Empty cache that authenticates through `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            instances: HashMap::new(),
            descriptors: RwLock::new(HashMap::new()),
            refreshing: LockableHashMap::new(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Registers an instance under its [`InstanceConfig::name`].
    pub fn with_instance(mut self, instance: InstanceConfig) -> Self {
        self.instances.insert(instance.name.clone(), instance);
        self
    }

    /// Longest a token request may take before it fails with
    /// [`AuthError::Unavailable`].
    pub fn refresh_timeout(self, refresh_timeout: Duration) -> Self {
        Self {
            refresh_timeout,
            ..self
        }
    }

    /// Configuration registered under `name`.
    pub fn instance(&self, name: &str) -> Option<&InstanceConfig> {
        self.instances.get(name)
    }

    /// Returns a live descriptor for `instance`, authenticating when the cached
    /// one is missing or expired.
    pub async fn resolve(&self, instance: &str) -> Result<Arc<ConnectionDescriptor>, AuthError> {
        let config = self
            .instances
            .get(instance)
            .ok_or_else(|| AuthError::UnknownInstance(instance.to_string()))?;

        if let Some(descriptor) = self.live(instance).await {
            return Ok(descriptor);
        }

        let _refresh = self
            .refreshing
            .async_lock(instance.to_string(), AsyncLimit::no_limit())
            .await
            .expect("lock map guards are infallible");

        // another caller may have refreshed while this one waited
        if let Some(descriptor) = self.live(instance).await {
            return Ok(descriptor);
        }
        log_debug!(
            component = "credential",
            event = "descriptor_refresh_started",
            instance = %instance,
        );

        match self.authenticate(config).await {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                self.descriptors
                    .write()
                    .await
                    .insert(instance.to_string(), Arc::clone(&descriptor));
                log_debug!(
                    component = "credential",
                    event = "descriptor_refreshed",
                    instance = %instance,
                    expiry = ?descriptor.expiry(),
                );
                Ok(descriptor)
            }
            Err(err) => {
                self.descriptors.write().await.remove(instance);
                log_warn!(
                    component = "credential",
                    event = "authentication_failed",
                    instance = %instance,
                    error = %err,
                );
                Err(err)
            }
        }
    }

    /// Drops the cached descriptor so the next [`resolve`](Self::resolve)
    /// authenticates again.
    pub async fn invalidate(&self, instance: &str) {
        self.descriptors.write().await.remove(instance);
    }

    async fn live(&self, instance: &str) -> Option<Arc<ConnectionDescriptor>> {
        self.descriptors
            .read()
            .await
            .get(instance)
            .filter(|descriptor| descriptor.is_valid_at(Utc::now()))
            .cloned()
    }

    async fn authenticate(&self, config: &InstanceConfig) -> Result<ConnectionDescriptor, AuthError> {
        if let Credential::ConnectionString(connection_string) = &config.credential {
            return Ok(ConnectionDescriptor::new(connection_string.clone(), None));
        }
        let token = tokio::time::timeout(self.refresh_timeout, self.provider.acquire(config))
            .await
            .map_err(|_| AuthError::Unavailable {
                instance: config.name.clone(),
                message: format!("token request timed out after {:?}", self.refresh_timeout),
            })??;
        let connection_string = format!(
            "TableEndpoint={};AccountName={};BearerToken={}",
            config.endpoint, config.account, token.token
        );
        Ok(ConnectionDescriptor::new(
            connection_string,
            Some(token.expires_on),
        ))
    }
}
