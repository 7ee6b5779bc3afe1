//! HTTP Fetcher: a single blocking client used for manifest/catalog GETs
//! and resumable payload downloads, with retry and credential injection.

use crate::credential::{authorization_header_value, CredentialProvider};
use crate::error::GorillaError;
use crate::hash::sha256_file;
use crate::retry::{retry, RetryPolicy, Sleeper};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Fetcher<'a> {
    client: Client,
    credentials: &'a dyn CredentialProvider,
    force_basic_auth: bool,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Fetcher<'a> {
    pub fn new(credentials: &'a dyn CredentialProvider, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("static reqwest client config is always valid"),
            credentials,
            force_basic_auth: false,
            policy: RetryPolicy::default(),
            sleeper,
        }
    }

    pub fn with_force_basic_auth(mut self, force: bool) -> Self {
        self.force_basic_auth = force;
        self
    }

    fn auth_header(&self) -> Result<Option<String>, GorillaError> {
        match self.credentials.fetch() {
            Ok(raw) => Ok(Some(authorization_header_value(&raw))),
            Err(e) if self.force_basic_auth => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Fetches `url` in full, returning the response body as text. Used for
    /// manifests and catalogs.
    pub fn get(&self, url: &str) -> Result<String, GorillaError> {
        let auth = self.auth_header()?;
        retry(self.policy, self.sleeper, |_attempt| {
            let mut req = self.client.get(url);
            if let Some(h) = &auth {
                req = req.header(reqwest::header::AUTHORIZATION, h);
            }
            req.send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.text())
                .map_err(|e| GorillaError::Network {
                    url: url.to_string(),
                    source: e,
                })
        })
    }

    /// Downloads `url` to `dest`, resuming a partial download if `dest`
    /// already exists and is non-empty.
    /// Writes a sibling `.hash` sidecar with the final payload's SHA-256 on
    /// success.
    pub fn download_file(&self, url: &str, dest: &Path) -> Result<(), GorillaError> {
        let auth = self.auth_header()?;
        let local_size = dest.metadata().map(|m| m.len()).unwrap_or(0);

        retry(self.policy, self.sleeper, |_attempt| {
            self.download_once(url, dest, local_size, &auth)
        })?;

        let digest = sha256_file(dest)?;
        fs::write(format!("{}.hash", dest.display()), digest)?;
        Ok(())
    }

    fn download_once(
        &self,
        url: &str,
        dest: &Path,
        local_size: u64,
        auth: &Option<String>,
    ) -> Result<(), GorillaError> {
        let mut req = self.client.get(url);
        if let Some(h) = auth {
            req = req.header(reqwest::header::AUTHORIZATION, h);
        }
        if local_size > 0 {
            req = req.header(reqwest::header::RANGE, format!("bytes={}-", local_size));
        }

        let resp = req.send().map_err(|e| GorillaError::Network {
            url: url.to_string(),
            source: e,
        })?;

        let status = resp.status();
        let (mut file, resuming) = match status {
            StatusCode::PARTIAL_CONTENT => {
                let f = OpenOptions::new().append(true).open(dest)?;
                (f, true)
            }
            StatusCode::OK => {
                // Server ignored our Range (or none was sent): start clean.
                let f = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(dest)?;
                (f, false)
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                // Already fully downloaded.
                return Ok(());
            }
            other => {
                return match resp.error_for_status() {
                    Err(e) => Err(GorillaError::Network {
                        url: url.to_string(),
                        source: e,
                    }),
                    Ok(_) => Err(GorillaError::Io(std::io::Error::other(format!(
                        "unexpected status {} fetching {}",
                        other, url
                    )))),
                };
            }
        };
        let _ = resuming;

        let bytes = resp.bytes().map_err(|e| GorillaError::Network {
            url: url.to_string(),
            source: e,
        })?;
        file.write_all(&bytes)?;
        Ok(())
    }
}
