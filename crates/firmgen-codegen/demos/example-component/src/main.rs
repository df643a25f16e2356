use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use firmgen_codegen::Generator;
use firmgen_codegen::components::builtin;

use tracing::error;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(default_value = "config.json")]
    config: PathBuf,

    /// Namespace made visible to the generated code.
    #[arg(long, default_value = "esphome")]
    namespace: String,

    /// Print the schemas of the available components instead of generating
    /// code.
    #[arg(long)]
    describe: bool,

    /// Print the generated code as `json` instead of C++.
    #[arg(long)]
    json: bool,

    /// Log every emitted instance.
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<String, Box<dyn std::error::Error>> {
    let generator = Generator::new(builtin()?).namespace(cli.namespace.as_str());

    if cli.describe {
        let description = generator.components().describe()?;
        return Ok(serde_json::to_string_pretty(&description)?);
    }

    let text = std::fs::read_to_string(&cli.config)?;
    let code = generator.generate_str(&text)?;

    if cli.json {
        Ok(serde_json::to_string_pretty(&code)?)
    } else {
        Ok(generator.render(&code))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
