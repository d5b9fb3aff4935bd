use std::env;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage::constants::DEFAULT_FS_ROOT;
use crate::storage::policy::IoPolicy;
use crate::storage::{AccessOptions, StorageConfig, StorageProvider};

/// Load storage configuration from environment variables
pub fn load_storage_config() -> Result<StorageConfig> {
    load_storage_config_from(|key| env::var(key).ok())
}

/// Load storage configuration from any variable lookup.
pub fn load_storage_config_from<F>(lookup: F) -> Result<StorageConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars { lookup };
    let provider_str = vars.get("STORAGE_PROVIDER").unwrap_or_else(|| "gcs".to_string());
    let provider = StorageProvider::from_str(&provider_str)?;

    let mut config = match provider {
        StorageProvider::Gcs => load_gcs_config(&vars)?,
        StorageProvider::S3 => load_s3_config(&vars, &provider_str)?,
        StorageProvider::Fs => load_fs_config(&vars),
    };
    config.options = load_access_options(&vars)?;
    Ok(config)
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn get_either(&self, primary_key: &str, secondary_key: &str) -> Option<String> {
        self.get(primary_key).or_else(|| self.get(secondary_key))
    }

    // Helper function to reduce repetitive environment variable loading logic.
    fn require(&self, primary_key: &str, secondary_key: &str) -> Result<String> {
        self.get_either(primary_key, secondary_key)
            .ok_or_else(|| Error::MissingEnvVar {
                key: format!("{primary_key} or {secondary_key}"),
            })
    }
}

fn load_access_options<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<AccessOptions> {
    let io_policy = match vars.get("STORAGE_IO_POLICY") {
        Some(value) => IoPolicy::from_str(&value).map_err(|_| Error::InvalidConfig {
            key: "STORAGE_IO_POLICY".to_string(),
            value,
        })?,
        None => IoPolicy::default(),
    };

    let create_bucket = match vars.get("STORAGE_CREATE_BUCKET") {
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                return Err(Error::InvalidConfig {
                    key: "STORAGE_CREATE_BUCKET".to_string(),
                    value,
                });
            }
        },
        None => false,
    };

    Ok(AccessOptions {
        io_policy,
        create_bucket,
    })
}

/// Load Google Cloud Storage configuration
fn load_gcs_config<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<StorageConfig> {
    let container = vars.require("STORAGE_CONTAINER", "GCS_CONTAINER")?;
    let credential_path =
        vars.get_either("STORAGE_CREDENTIAL_PATH", "GOOGLE_APPLICATION_CREDENTIALS");

    let mut config = StorageConfig::gcs(container, credential_path);
    config.endpoint = vars.get("STORAGE_ENDPOINT");
    Ok(config)
}

/// Load S3 (AWS) configuration
fn load_s3_config<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
    provider_str: &str,
) -> Result<StorageConfig> {
    let is_minio = provider_str.to_lowercase() == "minio";

    let container = vars.require("STORAGE_CONTAINER", "AWS_S3_CONTAINER")?;
    let (access_key_id, secret_access_key) = if is_minio {
        (
            vars.require("STORAGE_ACCESS_KEY_ID", "MINIO_ACCESS_KEY")?,
            vars.require("STORAGE_ACCESS_KEY_SECRET", "MINIO_SECRET_KEY")?,
        )
    } else {
        (
            vars.require("STORAGE_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID")?,
            vars.require("STORAGE_ACCESS_KEY_SECRET", "AWS_SECRET_ACCESS_KEY")?,
        )
    };

    let region = vars
        .get_either("STORAGE_REGION", "AWS_DEFAULT_REGION")
        .or_else(|| vars.get("MINIO_DEFAULT_REGION"));

    let endpoint = if is_minio {
        Some(
            vars.get_either("STORAGE_ENDPOINT", "MINIO_ENDPOINT")
                .unwrap_or_else(|| "http://localhost:9000".to_string()),
        )
    } else {
        vars.get("STORAGE_ENDPOINT")
    };

    let mut config = StorageConfig::s3(container, access_key_id, secret_access_key, region);
    config.endpoint = endpoint;
    Ok(config)
}

/// Load filesystem configuration (for testing)
fn load_fs_config<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> StorageConfig {
    let root_path = vars
        .get("STORAGE_ROOT_PATH")
        .unwrap_or_else(|| DEFAULT_FS_ROOT.to_string());
    let mut config = StorageConfig::fs(root_path);
    if let Some(container) = vars.get("STORAGE_CONTAINER") {
        config.container = container;
    }
    config
}
