//! Command-line interface for kbridge
//!
//! Clusters are named by their config file under `$KBRIDGE_HOME/clusters/`
//! (see [`kbridge::config`]).
//!
//! # Usage Examples
//!
//! ## Replicate
//! ```bash
//! # Copy a topic to another cluster, starting partition 0 at offset 100
//! kbridge replicate --source prod --source-topic orders \
//!   --target staging --target-topic orders --offsets 0=100
//!
//! # Re-encode protobuf values with the source schema on a new topic
//! kbridge replicate --source local --source-topic snacks \
//!   --target local --target-topic snacks-copy --value-format pb --no-keep-timestamps
//! ```
//!
//! ## Download / Upload
//! ```bash
//! kbridge download --cluster local --topic snacks --file snacks.txt \
//!   --value-format pb --key-value-separator /
//! kbridge upload --cluster local --file snacks.txt --topic snacks \
//!   --value-format pb --value-schema snack.proto --key-value-separator /
//! ```
//!
//! ## Cp
//! ```bash
//! # Anything containing a '/' is a file, anything else a topic
//! kbridge cp --cluster local ./snacks.txt snacks --value-format pb --value-schema snack.proto
//! kbridge cp --cluster local snacks ./snacks.txt --value-format pb
//! ```
//!
//! ## Cat
//! ```bash
//! kbridge cat --cluster local --topic snacks --value-format pb -n 10
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kbridge::config::home_dir;
use kbridge::pipeline::{self, Identity};
use kbridge::{
    Cluster, DownloadOptions, Format, PartitionOffsets, ReplicateOptions, RunOptions,
    UploadOptions,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "kbridge")]
#[command(about = "Move and transcode Kafka messages between topics and files")]
#[command(long_about = None)]
struct Cli {
    /// Directory containing clusters/<name>.toml
    #[arg(long, env = "KBRIDGE_HOME", global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options of every command that consumes a topic.
#[derive(Args, Clone)]
struct ConsumeArgs {
    /// Consumer group (default: a new unique group)
    #[arg(long)]
    group: Option<String>,

    /// Starting offsets as partition=offset pairs, e.g. "0=100,1=42"
    #[arg(long, value_parser = parse_offsets)]
    offsets: Option<PartitionOffsets>,

    /// Stop after the batch that reaches this many messages
    #[arg(short = 'n', long)]
    n: Option<usize>,

    /// Messages per consume call
    #[arg(long, default_value = "1")]
    batch_size: usize,
}

impl ConsumeArgs {
    fn run_options(self, key_format: Format, value_format: Format) -> RunOptions {
        RunOptions {
            group: self.group,
            offsets: self.offsets,
            key_format,
            value_format,
            n: self.n,
            batch_size: self.batch_size,
            ..RunOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a topic to another topic, on the same or another cluster
    Replicate {
        /// Source cluster name
        #[arg(long)]
        source: String,

        #[arg(long)]
        source_topic: String,

        /// Target cluster name
        #[arg(long)]
        target: String,

        #[arg(long)]
        target_topic: String,

        #[command(flatten)]
        consume: ConsumeArgs,

        /// Key format (bytes, str, json, pb, avro, jsonschema)
        #[arg(long, default_value = "bytes")]
        key_format: Format,

        /// Value format (bytes, str, json, pb, avro, jsonschema)
        #[arg(long, default_value = "bytes")]
        value_format: Format,

        /// Let the target assign new timestamps
        #[arg(long)]
        no_keep_timestamps: bool,
    },

    /// Write a topic to a file, one record per line
    Download {
        #[arg(long)]
        cluster: String,

        #[arg(long)]
        topic: String,

        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        #[command(flatten)]
        consume: ConsumeArgs,

        #[arg(long, default_value = "str")]
        key_format: Format,

        #[arg(long, default_value = "str")]
        value_format: Format,

        /// Write key<SEP>value instead of the value alone
        #[arg(long, value_name = "SEP")]
        key_value_separator: Option<String>,

        /// Record separator (escapes \n, \t and \r are understood)
        #[arg(long, default_value = "\\n")]
        message_separator: String,

        /// Append to the file instead of overwriting it
        #[arg(long)]
        append: bool,
    },

    /// Produce every record of a file to a topic
    Upload {
        #[arg(long)]
        cluster: String,

        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        #[arg(long)]
        topic: String,

        #[arg(long, default_value = "str")]
        key_format: Format,

        #[arg(long, default_value = "str")]
        value_format: Format,

        /// Schema file for structural key formats
        #[arg(long, value_name = "PATH")]
        key_schema: Option<PathBuf>,

        /// Schema file for structural value formats
        #[arg(long, value_name = "PATH")]
        value_schema: Option<PathBuf>,

        /// Split records into key<SEP>value
        #[arg(long, value_name = "SEP")]
        key_value_separator: Option<String>,

        /// Record separator (escapes \n, \t and \r are understood)
        #[arg(long, default_value = "\\n")]
        message_separator: String,
    },

    /// Upload a file to a topic or download a topic to a file
    ///
    /// An argument containing '/' names a file, anything else a topic.
    Cp {
        #[arg(long)]
        cluster: String,

        source: String,

        target: String,

        #[command(flatten)]
        consume: ConsumeArgs,

        #[arg(long, default_value = "str")]
        key_format: Format,

        #[arg(long, default_value = "str")]
        value_format: Format,

        /// Schema file for structural key formats (upload only)
        #[arg(long, value_name = "PATH")]
        key_schema: Option<PathBuf>,

        /// Schema file for structural value formats (upload only)
        #[arg(long, value_name = "PATH")]
        value_schema: Option<PathBuf>,

        #[arg(long, value_name = "SEP")]
        key_value_separator: Option<String>,

        #[arg(long, default_value = "\\n")]
        message_separator: String,
    },

    /// Print a topic as JSON lines
    Cat {
        #[arg(long)]
        cluster: String,

        #[arg(long)]
        topic: String,

        #[command(flatten)]
        consume: ConsumeArgs,

        #[arg(long, default_value = "str")]
        key_format: Format,

        #[arg(long, default_value = "str")]
        value_format: Format,
    },
}

fn parse_offsets(s: &str) -> Result<PartitionOffsets, String> {
    s.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (partition, offset) = pair
                .split_once('=')
                .ok_or_else(|| format!("Expected partition=offset, got '{pair}'"))?;
            let partition = partition
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("Invalid partition '{partition}': {e}"))?;
            let offset = offset
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("Invalid offset '{offset}': {e}"))?;
            Ok((partition, offset))
        })
        .collect()
}

/// Turn `\n`, `\t`, `\r` and `\\` typed on a command line into the characters.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Debug, PartialEq, Eq)]
enum CopyDirection {
    Upload,
    Download,
}

fn is_file(arg: &str) -> bool {
    arg.contains('/')
}

fn copy_direction(source: &str, target: &str) -> anyhow::Result<CopyDirection> {
    match (is_file(source), is_file(target)) {
        (true, false) => Ok(CopyDirection::Upload),
        (false, true) => Ok(CopyDirection::Download),
        (false, false) => anyhow::bail!(
            "Please prefix files with \"./\"; use replicate to copy topics"
        ),
        (true, true) => anyhow::bail!("Please use your shell or file manager to copy files"),
    }
}

fn connect(home: &Path, name: &str) -> anyhow::Result<Cluster> {
    Cluster::from_home(home, name).with_context(|| format!("Failed to connect to cluster '{name}'"))
}

fn read_schema(path: Option<PathBuf>) -> anyhow::Result<Option<String>> {
    path.map(|path| {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read schema file {}", path.display()))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let home = cli.home.unwrap_or_else(home_dir);

    match cli.command {
        Commands::Replicate {
            source,
            source_topic,
            target,
            target_topic,
            consume,
            key_format,
            value_format,
            no_keep_timestamps,
        } => {
            let mut source_cluster = connect(&home, &source)?;
            let mut target_cluster = connect(&home, &target)?;
            let options = ReplicateOptions {
                run: consume.run_options(key_format, value_format),
                keep_timestamps: !no_keep_timestamps,
            };
            let count = pipeline::replicate(
                &mut source_cluster,
                &source_topic,
                &mut target_cluster,
                &target_topic,
                &mut Identity,
                &options,
            )
            .await
            .with_context(|| format!("Failed to replicate {source}/{source_topic}"))?;
            tracing::info!("Replicated {count} messages to {target}/{target_topic}");
        }
        Commands::Download {
            cluster,
            topic,
            file,
            consume,
            key_format,
            value_format,
            key_value_separator,
            message_separator,
            append,
        } => {
            let mut cluster = connect(&home, &cluster)?;
            let options = DownloadOptions {
                run: consume.run_options(key_format, value_format),
                key_value_separator: key_value_separator.as_deref().map(unescape),
                message_separator: unescape(&message_separator),
                overwrite: !append,
            };
            let count = pipeline::download(&mut cluster, &topic, &file, &options)
                .await
                .with_context(|| format!("Failed to download {topic}"))?;
            tracing::info!("Wrote {count} messages to {}", file.display());
        }
        Commands::Upload {
            cluster,
            file,
            topic,
            key_format,
            value_format,
            key_schema,
            value_schema,
            key_value_separator,
            message_separator,
        } => {
            let mut cluster = connect(&home, &cluster)?;
            let options = UploadOptions {
                key_format,
                value_format,
                key_schema: read_schema(key_schema)?,
                value_schema: read_schema(value_schema)?,
                key_value_separator: key_value_separator.as_deref().map(unescape),
                message_separator: unescape(&message_separator),
            };
            let count = pipeline::upload(&mut cluster, &file, &topic, &options)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            tracing::info!("Uploaded {count} messages to {topic}");
        }
        Commands::Cp {
            cluster,
            source,
            target,
            consume,
            key_format,
            value_format,
            key_schema,
            value_schema,
            key_value_separator,
            message_separator,
        } => {
            let direction = copy_direction(&source, &target)?;
            let mut cluster = connect(&home, &cluster)?;
            let key_value_separator = key_value_separator.as_deref().map(unescape);
            let message_separator = unescape(&message_separator);
            match direction {
                CopyDirection::Upload => {
                    let options = UploadOptions {
                        key_format,
                        value_format,
                        key_schema: read_schema(key_schema)?,
                        value_schema: read_schema(value_schema)?,
                        key_value_separator,
                        message_separator,
                    };
                    let count = pipeline::upload(&mut cluster, Path::new(&source), &target, &options)
                        .await
                        .with_context(|| format!("Failed to upload {source}"))?;
                    tracing::info!("Uploaded {count} messages to {target}");
                }
                CopyDirection::Download => {
                    let options = DownloadOptions {
                        run: consume.run_options(key_format, value_format),
                        key_value_separator,
                        message_separator,
                        overwrite: true,
                    };
                    let count = pipeline::download(&mut cluster, &source, Path::new(&target), &options)
                        .await
                        .with_context(|| format!("Failed to download {source}"))?;
                    tracing::info!("Wrote {count} messages to {target}");
                }
            }
        }
        Commands::Cat {
            cluster,
            topic,
            consume,
            key_format,
            value_format,
        } => {
            let mut cluster = connect(&home, &cluster)?;
            let options = consume.run_options(key_format, value_format);
            pipeline::foreach(
                &mut cluster,
                &topic,
                |record| println!("{}", record.to_json()),
                &options,
            )
            .await
            .with_context(|| format!("Failed to read {topic}"))?;
        }
    }

    Ok(())
}
