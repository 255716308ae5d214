//! Command-line front end for the geocodec decoders.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use error::ToolResult;

/// Decode meshoptimizer-encoded buffers and block-compressed payloads.
#[derive(Parser, Debug)]
#[command(name = "geocodec", version)]
struct Cli {
    /// Log decoder details (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a vertex buffer.
    Vertex {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Number of vertices.
        #[arg(long)]
        count: usize,
        /// Vertex stride in bytes (multiple of 4, at most 256).
        #[arg(long)]
        size: usize,
        /// Force the scalar decoder.
        #[arg(long)]
        scalar: bool,
    },
    /// Decode a triangle index buffer.
    Index {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Number of indices (multiple of 3).
        #[arg(long)]
        count: usize,
        /// Index width in bytes (2 or 4).
        #[arg(long, default_value_t = 4)]
        size: usize,
    },
    /// Decode a meshlet into vertex ids followed by triangles.
    Meshlet {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        vertices: usize,
        #[arg(long)]
        triangles: usize,
        /// Vertex id width in bytes (2 or 4).
        #[arg(long, default_value_t = 4)]
        vertex_size: usize,
        /// Triangle width in bytes (3 or 4).
        #[arg(long, default_value_t = 3)]
        triangle_size: usize,
    },
    /// Decompress a sequence of size-prefixed blocks.
    Block {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> ToolResult<()> {
    match command {
        Command::Vertex {
            input,
            output,
            count,
            size,
            scalar,
        } => commands::vertex(&input, &output, count, size, scalar),
        Command::Index {
            input,
            output,
            count,
            size,
        } => commands::index(&input, &output, count, size),
        Command::Meshlet {
            input,
            output,
            vertices,
            triangles,
            vertex_size,
            triangle_size,
        } => commands::meshlet(&input, &output, vertices, triangles, vertex_size, triangle_size),
        Command::Block { input, output } => commands::block(&input, &output),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
