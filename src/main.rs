//! Purpose: `carve` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::aot::Shell;
use serde_json::json;

mod serve;

use carve::api::{
    ContainerDecoder, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_MAX_RESPONSE_BYTES,
    DEFAULT_MAX_UPLOAD_BYTES, Error, ErrorKind, FileDecoder, Limits, Origin, RawFile, assemble,
    evaluate_fields, to_exit_code,
};
use serve::{ServeConfig, serve};

#[derive(Parser)]
#[command(
    name = "carve",
    version,
    about = "Extract path-selected subtrees from structured binary files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Serve the extraction endpoint over HTTP")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:9314", help = "Socket address to bind")]
        bind: String,
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_UPLOAD_BYTES,
            help = "Ceiling for directly uploaded payloads, in bytes"
        )]
        max_upload_bytes: usize,
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_RESPONSE_BYTES,
            help = "Ceiling for the serialized response, in bytes"
        )]
        max_response_bytes: usize,
        #[arg(
            long,
            default_value_t = DEFAULT_DOWNLOAD_TIMEOUT.as_secs(),
            help = "Outbound download timeout in seconds"
        )]
        download_timeout_secs: u64,
        #[arg(long, help = "Allow binding to a non-loopback address")]
        allow_non_loopback: bool,
    },
    #[command(about = "Extract fields from a local file and print the merged JSON")]
    Extract {
        #[arg(help = "Path to the structured binary file")]
        file: PathBuf,
        #[arg(
            required = true,
            help = "Field expressions, e.g. '$.Ghosts[0].Checkpoints[*].Time'"
        )]
        fields: Vec<String>,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version information as JSON")]
    Version,
}

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            bind,
            max_upload_bytes,
            max_response_bytes,
            download_timeout_secs,
            allow_non_loopback,
        } => {
            let bind: SocketAddr = bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_detail("use a host:port value like 127.0.0.1:9314")
            })?;
            let config = ServeConfig {
                bind,
                limits: Limits {
                    max_upload_bytes,
                    max_response_bytes,
                    download_timeout: Duration::from_secs(download_timeout_secs),
                },
                allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve(config))
        }
        Command::Extract { file, fields } => {
            let bytes = std::fs::read(&file).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read file")
                    .with_detail(file.display().to_string())
                    .with_source(err)
            })?;
            let raw = RawFile {
                bytes: bytes.into(),
                origin: Origin::Uploaded,
            };
            let tree = ContainerDecoder::new().decode(&raw)?;
            let results = evaluate_fields(&tree, &fields);
            let merged = assemble(results, usize::MAX)?;
            let rendered = serde_json::to_string_pretty(&merged).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to render output")
                    .with_source(err)
            })?;
            println!("{rendered}");
            Ok(())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "carve", &mut std::io::stdout());
            Ok(())
        }
        Command::Version => {
            println!("{}", json!({ "version": env!("CARGO_PKG_VERSION") }));
            Ok(())
        }
    }
}

fn emit_error(err: &Error) {
    let envelope = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message().unwrap_or("error"),
            "details": err.details_text(),
        }
    });
    eprintln!("{envelope}");
}
