// Container root locators and resolution of paths against them
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage::constants::{LOCAL_BUCKET, SEPARATOR, SEPARATOR_STR};
use crate::storage::utils::path::{compose, normalize, relativize};

const JSON_API_PREFIX: &str = "/storage/v1/b/";
const JSON_API_HOSTS: &[&str] = &["googleapis.com", "www.googleapis.com"];
const BUCKET_HOSTS: &[&str] = &["storage.googleapis.com", "storage.cloud.google.com"];
const PROJECT_KEY: &str = "project";

/// How a locator spells its bucket, kept so resolved locators print the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LocatorStyle {
    /// `gs://bucket/key` or `s3://bucket/key`
    Bucket,
    /// `https://www.googleapis.com/storage/v1/b/bucket/key`
    JsonApi { host: String },
    /// `https://storage.googleapis.com/bucket/key`
    BucketHost { host: String },
    /// `file:///path` or a bare filesystem path
    File,
}

/// Immutable container root: a bucket plus the key prefix all paths resolve under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUri {
    scheme: String,
    style: LocatorStyle,
    bucket: String,
    key: String,
    query: Option<String>,
}

impl ContainerUri {
    pub fn parse(locator: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        };

        let without_fragment = locator.split('#').next().unwrap_or_default();
        let (body, query) = match without_fragment.split_once('?') {
            Some((body, query)) => (body, Some(query.to_string())),
            None => (without_fragment, None),
        };

        let Some((scheme, rest)) = body.split_once("://") else {
            if body.starts_with(SEPARATOR) || body.starts_with('.') {
                return Ok(Self {
                    scheme: "file".to_string(),
                    style: LocatorStyle::File,
                    bucket: LOCAL_BUCKET.to_string(),
                    key: body.to_string(),
                    query,
                });
            }
            return Err(invalid("Invalid scheme"));
        };

        let scheme = scheme.to_ascii_lowercase();
        let (authority, path) = match rest.find(SEPARATOR) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (style, bucket, key) = match scheme.as_str() {
            "gs" | "s3" => (LocatorStyle::Bucket, authority.to_string(), path.to_string()),
            "file" => (LocatorStyle::File, LOCAL_BUCKET.to_string(), path.to_string()),
            "http" | "https" => {
                let host = authority.to_ascii_lowercase();
                if JSON_API_HOSTS.contains(&host.as_str()) {
                    let prefix_len = JSON_API_PREFIX.len();
                    let matches_api = path
                        .get(..prefix_len)
                        .is_some_and(|p| p.eq_ignore_ascii_case(JSON_API_PREFIX));
                    if !matches_api {
                        return Err(invalid("Not a google cloud storage link"));
                    }
                    let (bucket, key) = split_bucket(&path[prefix_len..]);
                    (LocatorStyle::JsonApi { host }, bucket, key)
                } else if BUCKET_HOSTS.contains(&host.as_str()) {
                    let (bucket, key) = split_bucket(path.trim_start_matches(SEPARATOR));
                    (LocatorStyle::BucketHost { host }, bucket, key)
                } else {
                    return Err(invalid("Not a google cloud storage link"));
                }
            }
            _ => return Err(invalid("Invalid scheme")),
        };

        if bucket.is_empty() {
            return Err(invalid("Missing bucket name"));
        }

        Ok(Self {
            scheme,
            style,
            bucket,
            key,
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Raw path portion of the locator, e.g. `""`, `"/"` or `"/a/b/"`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Normalized key prefix every container path resolves under.
    pub fn key_prefix(&self) -> String {
        normalize(&self.key)
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Value of the `project` query parameter, if present.
    pub fn project(&self) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name.trim() == PROJECT_KEY).then(|| value.trim())
        })
    }

    /// Flat object key for `path` inside this container.
    ///
    /// The container's full key prefix is always kept. An absolute `path` that
    /// already starts with that prefix only contributes the part beyond it.
    pub fn resolve_key(&self, path: &str) -> String {
        let root = self.key_prefix();
        let normal = normalize(path);
        if root.is_empty() {
            return normal;
        }

        let already_resolved = path.starts_with(SEPARATOR)
            && (normal == root || normal.starts_with(&format!("{root}{SEPARATOR}")));
        if already_resolved {
            compose([root.as_str(), relativize(&normal, &root).as_str()])
        } else {
            compose([root.as_str(), normal.as_str()])
        }
    }

    /// Locator of `path` resolved against this container root.
    pub fn resolve(&self, path: &str) -> ContainerUri {
        if normalize(path).is_empty() {
            return self.clone();
        }
        Self {
            key: format!("{SEPARATOR}{}", self.resolve_key(path)),
            query: None,
            ..self.clone()
        }
    }
}

fn split_bucket(path: &str) -> (String, String) {
    match path.find(SEPARATOR) {
        Some(idx) => (path[..idx].to_string(), path[idx..].to_string()),
        None => (path.to_string(), String::new()),
    }
}

impl FromStr for ContainerUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContainerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.style {
            LocatorStyle::Bucket => write!(f, "{}://{}{}", self.scheme, self.bucket, self.key)?,
            LocatorStyle::JsonApi { host } => write!(
                f,
                "{}://{host}{JSON_API_PREFIX}{}{}",
                self.scheme, self.bucket, self.key
            )?,
            LocatorStyle::BucketHost { host } => write!(
                f,
                "{}://{host}{SEPARATOR_STR}{}{}",
                self.scheme, self.bucket, self.key
            )?,
            LocatorStyle::File => write!(f, "file://{}", self.key)?,
        }
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}
