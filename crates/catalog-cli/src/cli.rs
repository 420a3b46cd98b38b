use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Catalog maintenance: inspect relations and merge duplicate records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the sample archive database
    Init(InitArgs),
    /// List the relations of an entity type
    Relations(RelationsArgs),
    /// Show fillable fields and conflicting candidates
    Gaps(RecordsArgs),
    /// Show what a merge would fill and move, without writing
    Preview(RecordsArgs),
    /// Merge secondary records into a primary
    Merge(MergeArgs),
    /// Relink many-to-many links from one record to others
    Replace(ReplaceArgs),
}

#[derive(Args)]
pub struct DbArgs {
    /// JSON database file (schema and records)
    #[arg(long, default_value = "catalog.json")]
    pub db: PathBuf,
}

#[derive(Args)]
pub struct InitArgs {
    #[command(flatten)]
    pub db: DbArgs,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct RelationsArgs {
    #[command(flatten)]
    pub db: DbArgs,
    pub entity: String,
    /// Include foreign keys declared on the entity itself
    #[arg(long)]
    pub forward: bool,
    /// Leave out foreign keys declared elsewhere that target the entity
    #[arg(long)]
    pub no_reverse: bool,
}

#[derive(Args)]
pub struct RecordsArgs {
    #[command(flatten)]
    pub db: DbArgs,
    pub entity: String,
    #[arg(long)]
    pub primary: u64,
    /// Records to merge into the primary, in priority order
    #[arg(long, num_args = 0.., value_delimiter = ',')]
    pub secondaries: Vec<u64>,
}

#[derive(Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub records: RecordsArgs,
    /// Do not fill empty fields of the primary
    #[arg(long)]
    pub no_expand: bool,
    /// Pick candidate INDEX for a conflicting FIELD
    #[arg(long, value_name = "FIELD=INDEX")]
    pub choose: Vec<String>,
    /// Resolve remaining conflicts with their first candidate
    #[arg(long)]
    pub first_candidate: bool,
    #[arg(long, default_value = "0")]
    pub actor: u64,
    /// Merge settings (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Append audit entries to this JSON-lines file
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ReplaceArgs {
    #[command(flatten)]
    pub db: DbArgs,
    pub entity: String,
    pub id: u64,
    /// Records that take over the links
    #[arg(long = "with", num_args = 1.., value_delimiter = ',', required = true)]
    pub replacements: Vec<u64>,
    #[arg(long, default_value = "0")]
    pub actor: u64,
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
}
