//! Declarative connection configuration
//!
//! Configuration records deserialize from TOML and are materialized into a
//! flat key/value connection property table for the transport provider.
//! Assembly is pure data mapping with one fixed precedence rule for the
//! authentication scheme: explicit auth config > client certificate implied
//! by a key store > basic auth.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Upper bound on TLS trusted common names accepted by the provider.
pub const MAX_TRUSTED_COMMON_NAMES: usize = 16;

/// Connection property keys understood by the transport provider.
pub mod keys {
    pub const PROVIDER_URL: &str = "provider.url";
    pub const VPN_NAME: &str = "vpn.name";
    pub const CLIENT_ID: &str = "client.id";
    pub const CLIENT_DESCRIPTION: &str = "client.description";
    pub const LOCALHOST: &str = "client.localhost";
    pub const CONNECT_TIMEOUT_MS: &str = "connect.timeout-ms";
    pub const READ_TIMEOUT_MS: &str = "read.timeout-ms";
    pub const COMPRESSION_LEVEL: &str = "compression.level";
    pub const DYNAMIC_DURABLES: &str = "durables.dynamic";

    pub const CONNECT_RETRIES: &str = "retry.connect";
    pub const CONNECT_RETRIES_PER_HOST: &str = "retry.connect-per-host";
    pub const RECONNECT_RETRIES: &str = "retry.reconnect";
    pub const RECONNECT_RETRY_WAIT_MS: &str = "retry.reconnect-wait-ms";

    pub const AUTH_SCHEME: &str = "auth.scheme";
    pub const AUTH_USERNAME: &str = "auth.username";
    pub const AUTH_PASSWORD: &str = "auth.password";
    pub const KRB_MUTUAL_AUTH: &str = "auth.krb.mutual";
    pub const KRB_SERVICE_NAME: &str = "auth.krb.service-name";
    pub const KRB_JAAS_CONTEXT: &str = "auth.krb.jaas-context";
    pub const OAUTH_ISSUER: &str = "auth.oauth.issuer";
    pub const OAUTH_ACCESS_TOKEN: &str = "auth.oauth.access-token";
    pub const OAUTH_OIDC_TOKEN: &str = "auth.oauth.oidc-token";

    pub const SSL_TRUST_STORE: &str = "ssl.trust-store";
    pub const SSL_TRUST_STORE_PASSWORD: &str = "ssl.trust-store-password";
    pub const SSL_TRUST_STORE_FORMAT: &str = "ssl.trust-store-format";
    pub const SSL_KEY_STORE: &str = "ssl.key-store";
    pub const SSL_KEY_STORE_PASSWORD: &str = "ssl.key-store-password";
    pub const SSL_KEY_STORE_FORMAT: &str = "ssl.key-store-format";
    pub const SSL_PRIVATE_KEY_PASSWORD: &str = "ssl.private-key-password";
    pub const SSL_PRIVATE_KEY_ALIAS: &str = "ssl.private-key-alias";
    pub const SSL_VALIDATE_CERTIFICATE: &str = "ssl.validate-certificate";
    pub const SSL_VALIDATE_CERTIFICATE_DATE: &str = "ssl.validate-certificate-date";
    pub const SSL_VALIDATE_CERTIFICATE_HOST: &str = "ssl.validate-certificate-host";
    pub const SSL_PROTOCOLS: &str = "ssl.protocols";
    pub const SSL_CIPHER_SUITES: &str = "ssl.cipher-suites";
    pub const SSL_TRUSTED_COMMON_NAMES: &str = "ssl.trusted-common-names";
}

/// Authentication scheme names placed under [`keys::AUTH_SCHEME`].
pub mod schemes {
    pub const BASIC: &str = "basic";
    pub const CLIENT_CERTIFICATE: &str = "client-certificate";
    pub const KERBEROS: &str = "kerberos";
    pub const OAUTH2: &str = "oauth2";
}

/// Broker connection configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Message VPN to join on the broker
    #[serde(default = "default_vpn")]
    pub message_vpn: String,
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_description: String,
    /// Local interface to bind outbound connections to
    pub localhost: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// 0 disables compression; 1-9 trade CPU for bandwidth
    #[serde(default)]
    pub compression_level: u8,
    /// Allow the broker to provision durable endpoints on demand
    #[serde(default)]
    pub dynamic_durables: bool,
    pub auth: Option<AuthConfig>,
    pub retry: Option<RetryConfig>,
    pub secure_socket: Option<SecureSocket>,
}

fn default_vpn() -> String {
    "default".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            message_vpn: default_vpn(),
            client_id: None,
            client_description: String::new(),
            localhost: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            compression_level: 0,
            dynamic_durables: false,
            auth: None,
            retry: None,
            secure_socket: None,
        }
    }
}

/// Authentication configuration, discriminated by field shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthConfig {
    Basic {
        username: String,
        password: Option<String>,
    },
    Kerberos {
        mutual_authentication: bool,
        service_name: String,
        jaas_login_context: Option<String>,
    },
    OAuth2 {
        issuer: String,
        access_token: Option<String>,
        oidc_token: Option<String>,
    },
}

/// Connect/reconnect retry counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub connect_retries: i32,
    #[serde(default)]
    pub connect_retries_per_host: i32,
    #[serde(default)]
    pub reconnect_retries: i32,
    #[serde(default = "default_reconnect_retry_wait_ms")]
    pub reconnect_retry_wait_ms: u64,
}

fn default_reconnect_retry_wait_ms() -> u64 {
    3_000
}

/// TLS options for the broker connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureSocket {
    #[serde(default)]
    pub validation: CertValidation,
    pub trust_store: Option<TrustStore>,
    pub key_store: Option<KeyStore>,
    pub protocols: Option<Vec<String>>,
    pub cipher_suites: Option<Vec<String>>,
    pub trusted_common_names: Option<Vec<String>>,
}

/// Certificate validation toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertValidation {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub validate_date: bool,
    #[serde(default = "default_true")]
    pub validate_host: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CertValidation {
    fn default() -> Self {
        CertValidation {
            enabled: true,
            validate_date: true,
            validate_host: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustStore {
    pub location: String,
    pub password: String,
    #[serde(default = "default_store_format")]
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyStore {
    pub location: String,
    pub password: String,
    pub key_password: Option<String>,
    pub key_alias: Option<String>,
    #[serde(default = "default_store_format")]
    pub format: String,
}

fn default_store_format() -> String {
    "JKS".to_string()
}

/// Receive-loop tuning for an attached subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Bounded-wait receive timeout, milliseconds
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Backoff after a recoverable transport failure, milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_receive_timeout_ms() -> u64 {
    10_000
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            receive_timeout_ms: default_receive_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Load a connection configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConnectionConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
    toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config file: {e}")))
}

/// Map lowercase protocol names to the identifiers the provider expects.
pub fn map_protocol(protocol: &str) -> Result<&'static str> {
    match protocol {
        "sslv3" => Ok("SSLv3"),
        "tlsv1" => Ok("TLSv1"),
        "tlsv11" => Ok("TLSv1.1"),
        "tlsv12" => Ok("TLSv1.2"),
        other => Err(Error::config(format!("Unsupported protocol: {other}"))),
    }
}

/// Assemble the flat connection property table handed to the transport
/// provider. Pure data mapping; the only decision logic is the auth
/// precedence rule.
pub fn build_connection_properties(
    url: &str,
    config: &ConnectionConfig,
) -> Result<HashMap<String, String>> {
    let mut props = HashMap::new();
    props.insert(keys::PROVIDER_URL.into(), url.to_string());
    props.insert(keys::VPN_NAME.into(), config.message_vpn.clone());
    props.insert(
        keys::DYNAMIC_DURABLES.into(),
        config.dynamic_durables.to_string(),
    );

    if let Some(client_id) = &config.client_id {
        props.insert(keys::CLIENT_ID.into(), client_id.clone());
    }
    if !config.client_description.is_empty() {
        props.insert(
            keys::CLIENT_DESCRIPTION.into(),
            config.client_description.clone(),
        );
    }
    if let Some(localhost) = &config.localhost {
        props.insert(keys::LOCALHOST.into(), localhost.clone());
    }

    props.insert(
        keys::CONNECT_TIMEOUT_MS.into(),
        config.connect_timeout_ms.to_string(),
    );
    props.insert(
        keys::READ_TIMEOUT_MS.into(),
        config.read_timeout_ms.to_string(),
    );
    props.insert(
        keys::COMPRESSION_LEVEL.into(),
        config.compression_level.to_string(),
    );

    if let Some(retry) = &config.retry {
        props.insert(
            keys::CONNECT_RETRIES.into(),
            retry.connect_retries.to_string(),
        );
        props.insert(
            keys::CONNECT_RETRIES_PER_HOST.into(),
            retry.connect_retries_per_host.to_string(),
        );
        props.insert(
            keys::RECONNECT_RETRIES.into(),
            retry.reconnect_retries.to_string(),
        );
        props.insert(
            keys::RECONNECT_RETRY_WAIT_MS.into(),
            retry.reconnect_retry_wait_ms.to_string(),
        );
    }

    // Auth precedence: explicit auth config > client certificate implied by
    // a key store > basic auth
    match &config.auth {
        Some(AuthConfig::Basic { username, password }) => {
            props.insert(keys::AUTH_SCHEME.into(), schemes::BASIC.into());
            props.insert(keys::AUTH_USERNAME.into(), username.clone());
            if let Some(password) = password {
                props.insert(keys::AUTH_PASSWORD.into(), password.clone());
            }
        }
        Some(AuthConfig::Kerberos {
            mutual_authentication,
            service_name,
            jaas_login_context,
        }) => {
            props.insert(keys::AUTH_SCHEME.into(), schemes::KERBEROS.into());
            props.insert(
                keys::KRB_MUTUAL_AUTH.into(),
                mutual_authentication.to_string(),
            );
            props.insert(keys::KRB_SERVICE_NAME.into(), service_name.clone());
            if let Some(context) = jaas_login_context {
                props.insert(keys::KRB_JAAS_CONTEXT.into(), context.clone());
            }
        }
        Some(AuthConfig::OAuth2 {
            issuer,
            access_token,
            oidc_token,
        }) => {
            props.insert(keys::AUTH_SCHEME.into(), schemes::OAUTH2.into());
            props.insert(keys::OAUTH_ISSUER.into(), issuer.clone());
            if let Some(token) = access_token {
                props.insert(keys::OAUTH_ACCESS_TOKEN.into(), token.clone());
            }
            if let Some(token) = oidc_token {
                props.insert(keys::OAUTH_OIDC_TOKEN.into(), token.clone());
            }
        }
        None => {
            props.insert(keys::AUTH_SCHEME.into(), schemes::BASIC.into());
        }
    }

    if let Some(ssl) = &config.secure_socket {
        if let Some(trust_store) = &ssl.trust_store {
            props.insert(keys::SSL_TRUST_STORE.into(), trust_store.location.clone());
            props.insert(
                keys::SSL_TRUST_STORE_PASSWORD.into(),
                trust_store.password.clone(),
            );
            props.insert(
                keys::SSL_TRUST_STORE_FORMAT.into(),
                trust_store.format.clone(),
            );
        }

        if let Some(key_store) = &ssl.key_store {
            // A key store without explicit auth config implies certificate auth
            if config.auth.is_none() {
                props.insert(
                    keys::AUTH_SCHEME.into(),
                    schemes::CLIENT_CERTIFICATE.into(),
                );
            }
            props.insert(keys::SSL_KEY_STORE.into(), key_store.location.clone());
            props.insert(
                keys::SSL_KEY_STORE_PASSWORD.into(),
                key_store.password.clone(),
            );
            props.insert(keys::SSL_KEY_STORE_FORMAT.into(), key_store.format.clone());
            if let Some(password) = &key_store.key_password {
                props.insert(keys::SSL_PRIVATE_KEY_PASSWORD.into(), password.clone());
            }
            if let Some(alias) = &key_store.key_alias {
                props.insert(keys::SSL_PRIVATE_KEY_ALIAS.into(), alias.clone());
            }
        }

        props.insert(
            keys::SSL_VALIDATE_CERTIFICATE.into(),
            ssl.validation.enabled.to_string(),
        );
        props.insert(
            keys::SSL_VALIDATE_CERTIFICATE_DATE.into(),
            ssl.validation.validate_date.to_string(),
        );
        props.insert(
            keys::SSL_VALIDATE_CERTIFICATE_HOST.into(),
            ssl.validation.validate_host.to_string(),
        );

        if let Some(protocols) = &ssl.protocols {
            if !protocols.is_empty() {
                let mapped = protocols
                    .iter()
                    .map(|p| map_protocol(p))
                    .collect::<Result<Vec<_>>>()?;
                props.insert(keys::SSL_PROTOCOLS.into(), mapped.join(","));
            }
        }

        if let Some(ciphers) = &ssl.cipher_suites {
            if !ciphers.is_empty() {
                props.insert(keys::SSL_CIPHER_SUITES.into(), ciphers.join(","));
            }
        }

        if let Some(names) = &ssl.trusted_common_names {
            if names.len() > MAX_TRUSTED_COMMON_NAMES {
                return Err(Error::config(format!(
                    "At most {MAX_TRUSTED_COMMON_NAMES} trusted common names are supported, got {}",
                    names.len()
                )));
            }
            if !names.is_empty() {
                props.insert(keys::SSL_TRUSTED_COMMON_NAMES.into(), names.join(","));
            }
        }
    }

    Ok(props)
}
