//! Connection configuration.
//!
//! Options arrive as a loose, case-insensitive bag (the way storage
//! credentials are usually handed around) and are normalized exactly once
//! into a [`ConnectionConfig`]. Every alias (`bucket`/`container`,
//! `endpoint`/`serviceUrl`/`url`, ...) is resolved here and nowhere else.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::transport::TransportSettings;

/// Prefix of the environment variables read by [`ConnectionConfig::from_env`].
pub const ENV_PREFIX: &str = "OSAPI_";

/// Wire protocol family of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Per-request HMAC signature, no session.
    S3,
    /// Token exchange, then bearer-token requests.
    Swift,
}

impl Style {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Swift => "swift",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// S3-compatible service flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    #[default]
    Ceph,
    Aliyun,
    Aws,
}

impl Vendor {
    fn parse(value: &str) -> Result<Self, Error> {
        match value.to_lowercase().as_str() {
            "ceph" => Ok(Self::Ceph),
            "aliyun" => Ok(Self::Aliyun),
            "aws" => Ok(Self::Aws),
            other => Err(Error::Configuration(format!(
                "Invalid vendor: {other}. Must be 'ceph', 'aliyun' or 'aws'"
            ))),
        }
    }

    /// Header-name segment used by this vendor (`x-{code}-meta-...`).
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Aliyun => "oss",
            Self::Ceph | Self::Aws => "amz",
        }
    }
}

/// Secret material. Owned by the connection and never printed.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Access key pair for request signing.
    S3 {
        access_key: String,
        secret_access_key: String,
    },
    /// Swift subuser (`username:subusername`) and its key.
    Swift { subuser: String, key: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { access_key, .. } => f
                .debug_struct("S3")
                .field("access_key", access_key)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            Self::Swift { subuser, .. } => f
                .debug_struct("Swift")
                .field("subuser", subuser)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

/// Normalized connection configuration.
///
/// Built once and never mutated. The style follows from the credentials,
/// so the two can never disagree.
#[derive(Clone)]
pub struct ConnectionConfig {
    endpoint: String,
    credentials: Credentials,
    bucket: Option<String>,
    vendor: Vendor,
    bucket_in_domain: bool,
    temp_url_key: Option<String>,
    settings: TransportSettings,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("bucket", &self.bucket)
            .field("vendor", &self.vendor)
            .field("bucket_in_domain", &self.bucket_in_domain)
            .field("temp_url_key", &self.temp_url_key.as_ref().map(|_| "<redacted>"))
            .field("settings", &self.settings)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create an S3-style configuration.
    #[must_use]
    pub fn s3(endpoint: &str, access_key: &str, secret_access_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials: Credentials::S3 {
                access_key: access_key.to_string(),
                secret_access_key: secret_access_key.to_string(),
            },
            bucket: None,
            vendor: Vendor::Ceph,
            bucket_in_domain: false,
            temp_url_key: None,
            settings: TransportSettings::default(),
        }
    }

    /// Create a Swift-style configuration.
    #[must_use]
    pub fn swift(endpoint: &str, subuser: &str, key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials: Credentials::Swift {
                subuser: subuser.to_string(),
                key: key.to_string(),
            },
            bucket: None,
            vendor: Vendor::Ceph,
            bucket_in_domain: false,
            temp_url_key: None,
            settings: TransportSettings::default(),
        }
    }

    /// Set the default bucket (container).
    #[must_use]
    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self
    }

    /// Set the vendor. Also resets `bucket_in_domain` to the vendor default.
    #[must_use]
    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self.bucket_in_domain = vendor != Vendor::Ceph;
        self
    }

    /// Address buckets as DNS subdomains of the endpoint host.
    #[must_use]
    pub fn with_bucket_in_domain(mut self, enabled: bool) -> Self {
        self.bucket_in_domain = enabled;
        self
    }

    /// Set the key used to sign Swift temp URLs.
    #[must_use]
    pub fn with_temp_url_key(mut self, key: &str) -> Self {
        self.temp_url_key = Some(key.to_string());
        self
    }

    /// Set the HTTP transport settings.
    #[must_use]
    pub fn with_settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Normalize a loose option bag.
    ///
    /// Keys are matched case-insensitively. See the crate documentation for
    /// the recognized aliases.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a required option is absent or an
    /// option has an invalid value.
    pub fn from_options<I, K, V>(options: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let options: HashMap<String, String> = options
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let get = |names: &[&str]| names.iter().find_map(|n| options.get(*n).cloned());

        let style = match get(&["style"]) {
            Some(s) => match s.to_lowercase().as_str() {
                "s3" => Style::S3,
                "swift" => Style::Swift,
                other => {
                    return Err(Error::Configuration(format!(
                        "Invalid style: {other}. Must be 's3' or 'swift'"
                    )))
                }
            },
            None if get(&["username", "subusername", "subuser"]).is_some() => Style::Swift,
            None => Style::S3,
        };

        let endpoint = get(&["endpoint", "serviceurl", "url"])
            .ok_or_else(|| Error::option_absent(&[&["endPoint"]]))?;

        let credentials = match style {
            Style::S3 => {
                let access_key = get(&["accesskey", "key", "awsaccesskeyid"])
                    .ok_or_else(|| Error::option_absent(&[&["accessKey"]]))?;
                let secret_access_key =
                    get(&["secretaccesskey", "awssecretaccesskey", "secretkey"])
                        .ok_or_else(|| Error::option_absent(&[&["secretAccessKey"]]))?;
                Credentials::S3 {
                    access_key,
                    secret_access_key,
                }
            }
            Style::Swift => {
                let subuser = match (get(&["subuser"]), get(&["username"]), get(&["subusername"])) {
                    (Some(subuser), _, _) => subuser,
                    (None, Some(user), Some(sub)) => format!("{user}:{sub}"),
                    _ => {
                        return Err(Error::option_absent(&[
                            &["subuser"],
                            &["username", "subusername"],
                        ]))
                    }
                };
                let key = get(&["key", "password"]).ok_or_else(|| Error::option_absent(&[&["key"]]))?;
                Credentials::Swift { subuser, key }
            }
        };

        let vendor = get(&["vendor"])
            .map(|v| Vendor::parse(&v))
            .transpose()?
            .unwrap_or_default();

        let bucket_in_domain = match get(&["bucketindomain"]) {
            Some(v) => parse_bool("bucketInDomain", &v)?,
            None => vendor != Vendor::Ceph,
        };

        let mut settings = TransportSettings::default();
        if let Some(v) = get(&["rejectunauthorized"]) {
            settings.reject_unauthorized = parse_bool("rejectUnauthorized", &v)?;
        }
        settings.proxy = get(&["proxy"]);
        if let Some(v) = get(&["timeout"]) {
            let secs: u64 = v.parse().map_err(|_| {
                Error::Configuration(format!("Invalid value for timeout: {v}"))
            })?;
            settings.timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
            bucket: get(&["bucket", "container"]),
            vendor,
            bucket_in_domain,
            temp_url_key: get(&["tempurlkey"]),
            settings,
        })
    }

    /// Load configuration from `OSAPI_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `OSAPI_ENDPOINT` - Service endpoint (required)
    /// * `OSAPI_ACCESS_KEY`, `OSAPI_SECRET_ACCESS_KEY` - S3 credentials
    /// * `OSAPI_SUBUSER`, `OSAPI_KEY` - Swift credentials
    /// * `OSAPI_STYLE` - `s3` or `swift` (optional, inferred otherwise)
    /// * `OSAPI_BUCKET`, `OSAPI_VENDOR`, `OSAPI_BUCKET_IN_DOMAIN`,
    ///   `OSAPI_TEMP_URL_KEY`, `OSAPI_PROXY`, `OSAPI_TIMEOUT` - optional
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(env::vars())
    }

    /// Same as [`from_env`](Self::from_env) over an explicit variable list.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::from_options(vars.into_iter().filter_map(|(name, value)| {
            name.strip_prefix(ENV_PREFIX)
                .map(|option| (option.replace('_', ""), value))
        }))
    }

    /// Get the protocol style.
    #[must_use]
    pub fn style(&self) -> Style {
        match self.credentials {
            Credentials::S3 { .. } => Style::S3,
            Credentials::Swift { .. } => Style::Swift,
        }
    }

    /// Get the service endpoint (no trailing slash).
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get the default bucket (container).
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Get the vendor.
    #[must_use]
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Get the vendor code used in header names.
    #[must_use]
    pub fn vendor_code(&self) -> &'static str {
        self.vendor.code()
    }

    /// Whether buckets are addressed as DNS subdomains.
    #[must_use]
    pub fn bucket_in_domain(&self) -> bool {
        self.bucket_in_domain
    }

    /// Get the temp URL key.
    #[must_use]
    pub fn temp_url_key(&self) -> Option<&str> {
        self.temp_url_key.as_deref()
    }

    /// Get the transport settings.
    #[must_use]
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, Error> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "Invalid value for {name}: {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_options_with_aliases() {
        let config = ConnectionConfig::from_options([
            ("EndPoint", "http://storage.local/"),
            ("awsAccessKeyId", "AK"),
            ("SecretKey", "SK"),
            ("Container", "photos"),
        ])
        .expect("valid options");

        assert_eq!(config.style(), Style::S3);
        assert_eq!(config.endpoint(), "http://storage.local");
        assert_eq!(config.bucket(), Some("photos"));
        assert_eq!(config.vendor(), Vendor::Ceph);
        assert!(!config.bucket_in_domain());
        assert_eq!(
            config.credentials(),
            &Credentials::S3 {
                access_key: "AK".to_string(),
                secret_access_key: "SK".to_string(),
            }
        );
    }

    #[test]
    fn test_swift_style_inferred_from_username() {
        let config = ConnectionConfig::from_options([
            ("url", "http://storage.local"),
            ("username", "tester"),
            ("subUsername", "swift"),
            ("password", "secret"),
        ])
        .expect("valid options");

        assert_eq!(config.style(), Style::Swift);
        assert_eq!(
            config.credentials(),
            &Credentials::Swift {
                subuser: "tester:swift".to_string(),
                key: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_swift_requires_subuser() {
        let error = ConnectionConfig::from_options([
            ("style", "swift"),
            ("endpoint", "http://storage.local"),
            ("key", "secret"),
        ])
        .unwrap_err();

        assert!(error.to_string().contains("subuser | (username, subusername)"));
    }

    #[test]
    fn test_swift_requires_key() {
        let error = ConnectionConfig::from_options([
            ("endpoint", "http://storage.local"),
            ("subuser", "tester:swift"),
        ])
        .unwrap_err();

        assert!(matches!(error, Error::Configuration(_)));
    }

    #[test]
    fn test_endpoint_required() {
        let error =
            ConnectionConfig::from_options([("accessKey", "AK"), ("secretAccessKey", "SK")])
                .unwrap_err();
        assert!(error.to_string().contains("endPoint"));
    }

    #[test]
    fn test_non_ceph_vendor_defaults_to_bucket_in_domain() {
        let config = ConnectionConfig::from_options([
            ("endpoint", "https://oss-cn-hangzhou.aliyuncs.com"),
            ("accessKey", "AK"),
            ("secretAccessKey", "SK"),
            ("vendor", "aliyun"),
        ])
        .expect("valid options");

        assert_eq!(config.vendor_code(), "oss");
        assert!(config.bucket_in_domain());
    }

    #[test]
    fn test_explicit_bucket_in_domain_wins() {
        let config = ConnectionConfig::from_options([
            ("endpoint", "https://s3.amazonaws.com"),
            ("accessKey", "AK"),
            ("secretAccessKey", "SK"),
            ("vendor", "aws"),
            ("bucketInDomain", "false"),
        ])
        .expect("valid options");

        assert!(!config.bucket_in_domain());
    }

    #[test]
    fn test_invalid_vendor() {
        let result = ConnectionConfig::from_options([
            ("endpoint", "http://storage.local"),
            ("accessKey", "AK"),
            ("secretAccessKey", "SK"),
            ("vendor", "minio"),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_from_vars() {
        let vars = vec![
            ("OSAPI_ENDPOINT".to_string(), "http://storage.local".to_string()),
            ("OSAPI_SUBUSER".to_string(), "tester:swift".to_string()),
            ("OSAPI_KEY".to_string(), "secret".to_string()),
            ("OSAPI_TEMP_URL_KEY".to_string(), "tk".to_string()),
            ("OSAPI_TIMEOUT".to_string(), "5".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let config = ConnectionConfig::from_vars(vars).expect("valid variables");

        assert_eq!(config.style(), Style::Swift);
        assert_eq!(config.temp_url_key(), Some("tk"));
        assert_eq!(config.settings().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let config = ConnectionConfig::s3("http://storage.local", "AK", "very-secret");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("AK"));
        assert!(!rendered.contains("very-secret"));
    }
}
