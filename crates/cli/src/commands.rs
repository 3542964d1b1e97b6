use clap::{Args, Subcommand};
use model::schema::descriptor::LoadTarget;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Load a CSV file into a table or through a procedure
    Load {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long, help = "CSV file to load")]
        input: PathBuf,

        #[arg(long, help = "Load settings file (JSON)")]
        config: Option<PathBuf>,

        #[arg(long, help = "Rows per load call")]
        batch_size: Option<usize>,

        #[arg(long, help = "Failed rows tolerated before the load is aborted")]
        max_errors: Option<u64>,

        #[arg(long, help = "Log progress every N acknowledged rows")]
        report_every: Option<u64>,

        #[arg(long, help = "Field delimiter")]
        delimiter: Option<char>,

        #[arg(long, help = "Skip the first line of the input")]
        header: bool,

        #[arg(long, help = "Writes the raw text of failed rows to this file")]
        rejected_rows: Option<PathBuf>,

        #[arg(
            long,
            help = "If specified, writes the JSON summary to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Print how a target would be loaded, without loading anything
    Schema {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    #[arg(long, help = "Cluster description file (JSON)")]
    pub cluster: PathBuf,

    #[arg(long, conflicts_with = "procedure", help = "Target table")]
    pub table: Option<String>,

    #[arg(long, help = "Procedure called once per row")]
    pub procedure: Option<String>,
}

impl TargetArgs {
    pub fn load_target(&self) -> Option<LoadTarget> {
        match (&self.table, &self.procedure) {
            (Some(table), _) => Some(LoadTarget::Table(table.clone())),
            (None, Some(procedure)) => Some(LoadTarget::Procedure(procedure.clone())),
            (None, None) => None,
        }
    }
}
