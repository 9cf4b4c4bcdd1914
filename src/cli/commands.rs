//! Command execution

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::args::{Cli, Commands};
use crate::config::Settings;
use crate::domain::Graph;
use crate::errors::{CompileError, CompileResult};
use crate::pipeline::{CompileOptions, Compiler, EnvelopeSink};

pub fn execute_command(cli: &Cli) -> CompileResult<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    if settings.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .build_global()
            .map_err(|e| CompileError::Config(format!("worker pool: {}", e)))?;
    }
    let options = CompileOptions {
        profile: settings.canon_profile()?,
        extractor: None,
        extractor_timeout_ms: settings.extractor_timeout_ms,
    };
    let compiler = Compiler::new(options);

    match &cli.command {
        Commands::Compile {
            input,
            out_dir,
            coalesced,
        } => {
            let text = fs::read_to_string(input).map_err(CompileError::InputRead)?;
            let graph = compiler.compile_all(&text);
            info!(
                "compiled {} nodes, {} edges, {} course sets, {} requirements",
                graph.nodes.len(),
                graph.edges.len(),
                graph.course_sets.len(),
                graph.requirements.len()
            );
            match (out_dir, coalesced) {
                (Some(dir), _) => write_collections(dir, &graph),
                (None, Some(path)) => write_coalesced(path, &graph),
                (None, None) => write_coalesced(Path::new("-"), &graph),
            }
        }
        Commands::Envelopes { input, output } => {
            let text = fs::read_to_string(input).map_err(CompileError::InputRead)?;
            let count = if output == &PathBuf::from("-") {
                // Stdout is used unlocked here; the sink serializes writes
                // itself, and StdoutLock is not Send.
                let sink = EnvelopeSink::new(std::io::stdout());
                compiler.compile_stream(&text, &sink)?
            } else {
                let file = fs::File::create(output).map_err(CompileError::SinkWrite)?;
                let sink = EnvelopeSink::new(file);
                compiler.compile_stream(&text, &sink)?
            };
            info!("wrote {} envelopes", count);
            Ok(())
        }
    }
}

/// DB-loader style output: one JSON object with all collections.
fn write_coalesced(path: &Path, graph: &Graph) -> CompileResult<()> {
    let json = serde_json::to_string_pretty(graph)?;
    if path == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(json.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .map_err(CompileError::SinkWrite)
    } else {
        fs::write(path, json).map_err(CompileError::SinkWrite)
    }
}

/// Graph-renderer style output: one file per collection.
fn write_collections(dir: &Path, graph: &Graph) -> CompileResult<()> {
    fs::create_dir_all(dir).map_err(CompileError::SinkWrite)?;
    write_json(&dir.join("nodes.json"), &graph.nodes)?;
    write_json(&dir.join("edges.json"), &graph.edges)?;
    write_json(&dir.join("constraints.json"), &graph.constraints)?;
    write_json(&dir.join("course_sets.json"), &graph.course_sets)?;
    write_json(&dir.join("requirements.json"), &graph.requirements)?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CompileResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(CompileError::SinkWrite)
}
