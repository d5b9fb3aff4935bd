use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::io::Write;

use crate::error::{Error, Result};
use crate::storage::StorageClient;
use crate::storage::store::ObjectStore;
use crate::wrap_err;

/// Hierarchical key-value access to object storage buckets
#[derive(Parser, Debug)]
#[command(name = "bucketkv")]
#[command(about = "Groups and datasets on top of flat object storage", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the children of a group
    Ls {
        /// Group path relative to the container root
        #[arg(default_value = "/")]
        path: String,
        /// Only list children that are groups
        #[arg(short = 'd', long)]
        directories: bool,
    },
    /// Create a group and all of its parents
    Mkdir { path: String },
    /// Delete a path and everything below it
    Rm { path: String },
    /// Print the content of an object
    Cat {
        path: String,
        /// First byte to print
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Number of bytes to print (to the end when omitted)
        #[arg(long)]
        length: Option<u64>,
    },
    /// Upload a local file to an object, whole or from an offset
    Put {
        local: String,
        path: String,
        /// Overwrite only the bytes starting here, keeping the rest of the object
        #[arg(long)]
        offset: Option<u64>,
    },
    /// Show whether a path is a file or a group
    Stat {
        path: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(args: Args, client: StorageClient) -> Result<()> {
    match args.command {
        Commands::Ls { path, directories } => {
            for name in client.list_directory(&path, directories).await? {
                println!("{name}");
            }
        }
        Commands::Mkdir { path } => {
            client.create_directories(&path).await?;
            println!("Created directory: {path}");
        }
        Commands::Rm { path } => {
            client.delete_path(&path).await?;
            println!("Deleted: {path}");
        }
        Commands::Cat {
            path,
            offset,
            length,
        } => {
            let content = client.read_range(&path, offset, length).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
        Commands::Put {
            local,
            path,
            offset,
        } => {
            let data = wrap_err!(
                tokio::fs::read(&local).await,
                CommandFailed {
                    command: "read local file".to_string(),
                    path: local.clone()
                }
            )?;
            let size = data.len();
            client.write_at(&path, offset, Bytes::from(data)).await?;
            println!("Uploaded: {local} → {path} ({size} bytes)");
        }
        Commands::Stat { path, json } => {
            let stat = client.stat_path(&path).await?;
            if !stat.exists() {
                return Err(Error::NoSuchKey {
                    bucket: client.access().store().bucket().to_string(),
                    key: stat.key,
                });
            }
            if json {
                let out = serde_json::to_string(&stat).map_err(std::io::Error::from)?;
                println!("{out}");
            } else {
                println!("{stat}");
            }
        }
    }
    Ok(())
}
