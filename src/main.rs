use clap::{Parser, Subcommand};
use photo_anonymizer::{config, output, process};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "photo-anonymizer")]
#[command(about = "Strip identifying metadata from a folder of photos")]
#[command(long_about = "\
Strip identifying metadata from a folder of photos

Every JPEG, PNG and HEIF/HEIC file in the input folder is written to the
output folder with its metadata removed (only the orientation tag is kept)
or preserved, optionally converted to JPEG, compressed and renamed to the
SHA-256 of its name.

Behaviour is controlled by a JSON settings file:

  {
    \"SETTINGS\": {
      \"INPUT_FILES_DIR\": \"/photos/INPUT\",
      \"OUTPUT_FILES_DIR\": \"/photos/OUTPUT\",
      \"FILENAME_HASHING\": true,
      \"DELETE_METADATA\": true,
      \"CONVERT_TO_JPEG\": false,
      \"COMPRESS_JPEG\": false,
      \"DELETE_ORIGINAL_IMAGE\": false
    }
  }

A missing or invalid settings file is replaced with these defaults and the
run stops, so the values can be reviewed before anything is processed.

Run 'photo-anonymizer gen-config' to print the default settings.")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = "settings.json", global = true)]
    config: PathBuf,

    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process every supported image in the input folder (default)
    Run,
    /// Validate settings and show where each file would go, without processing
    Check,
    /// Print the default settings file
    GenConfig,
}

fn init_tracing(verbose: bool) {
    // RUST_LOG wins; otherwise warnings only, or debug for this crate with -v
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "photo_anonymizer=debug".to_string()
        } else {
            "photo_anonymizer=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Run => {
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_run_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::run(&cli.config, Some(tx));
            printer.join().ok();
            result?;
        }
        Command::Check => {
            let report = process::check(&cli.config)?;
            output::print_check_report(&report, &cli.config);
        }
        Command::GenConfig => {
            println!("{}", config::default_settings_json(&cli.config)?);
        }
    }
    Ok(())
}
