mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codegrade-cli")]
#[command(about = "CodeGrade CLI - Inspect harnesses and drive the grading queue", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how test-case input is split into arguments
    Parse {
        /// Raw input_data text
        #[arg(short, long)]
        input: String,
    },

    /// Print the program the harness synthesizer would submit
    Synth {
        /// Task language (python, java)
        #[arg(short, long)]
        language: String,

        /// File holding the student's code
        #[arg(short, long)]
        code_file: PathBuf,

        /// Function the harness should call
        #[arg(short, long)]
        function: Option<String>,

        /// Task template containing the placeholder
        #[arg(short, long)]
        template_file: Option<PathBuf>,

        /// Raw input_data text for one test case
        #[arg(short, long, default_value = "")]
        input: String,
    },

    /// Push a grading job described in a JSON file onto the queue
    Enqueue {
        #[arg(short, long)]
        job_file: PathBuf,
    },

    /// Fetch the stored result of a grading job
    Result {
        #[arg(short = 'i', long)]
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input } => {
            commands::parse_input(&input);
        }
        Commands::Synth {
            language,
            code_file,
            function,
            template_file,
            input,
        } => {
            commands::synth(
                &language,
                &code_file,
                function.as_deref(),
                template_file.as_deref(),
                &input,
            )?;
        }
        Commands::Enqueue { job_file } => {
            commands::enqueue(&job_file).await?;
        }
        Commands::Result { job_id } => {
            commands::fetch_result(&job_id).await?;
        }
    }

    Ok(())
}
