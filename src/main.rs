//! Strata CLI - Demand-driven Image Filter Pipelines
//!
//! Lists the built-in filters and runs pipeline description files.

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use std::path::PathBuf;
use strata::prelude::*;

/// Options of the `run` command.
#[derive(Debug, Default)]
struct RunArgs {
    path: PathBuf,
    pieces: Option<usize>,
    parallel: bool,
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("strata");

    if let Err(e) = dispatch(program, &args[1.min(args.len())..]) {
        eprintln!("Error: {}", error_chain(&e));
        std::process::exit(1);
    }
}

/// Join the causes of `error`, skipping a cause its wrapper already prints.
fn error_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let mut previous = message.clone();
    for cause in error.chain().skip(1) {
        let cause = cause.to_string();
        if !previous.ends_with(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
        previous = cause;
    }
    message
}

fn dispatch(program: &str, args: &[String]) -> Result<()> {
    let Some(command) = args.first() else {
        print_usage(program);
        return Ok(());
    };

    match command.as_str() {
        "list" => {
            list_filters();
            Ok(())
        }
        "info" => {
            let id = args.get(1).ok_or_else(|| anyhow!("please specify a filter ID"))?;
            filter_info(id)
        }
        "run" => run(parse_run_args(&args[1..])?),
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            print_usage(program);
            bail!("unknown command: {}", other)
        }
    }
}

fn print_usage(program: &str) {
    println!("Strata v{} - demand-driven image filter pipelines", strata::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                   List all available filters");
    println!("  info <filter>          Show detailed info about a filter");
    println!("  run <pipeline.json>    Load a pipeline description and update its target");
    println!("  help                   Show this help message");
    println!();
    println!("Run options:");
    println!("  --pieces <n>           Produce the target in n streamed pieces");
    println!("  --parallel             Run independent nodes in parallel");
    println!("  --config <file.toml>   Read execution options from a TOML file");
}

fn parse_run_args(args: &[String]) -> Result<RunArgs> {
    let mut run = RunArgs::default();
    let mut path = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--pieces" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("--pieces needs a value"))?;
                let pieces: usize = value
                    .parse()
                    .with_context(|| format!("invalid piece count '{}'", value))?;
                if pieces == 0 {
                    bail!("--pieces must be at least 1");
                }
                run.pieces = Some(pieces);
                i += 2;
            }
            "--parallel" => {
                run.parallel = true;
                i += 1;
            }
            "--config" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("--config needs a file"))?;
                run.config = Some(PathBuf::from(value));
                i += 2;
            }
            option if option.starts_with("--") => bail!("unknown option: {}", option),
            file => {
                if path.replace(PathBuf::from(file)).is_some() {
                    bail!("more than one pipeline file given");
                }
                i += 1;
            }
        }
    }

    run.path = path.ok_or_else(|| anyhow!("please specify a pipeline description file"))?;
    Ok(run)
}

fn list_filters() {
    let registry = FilterRegistry::with_builtins();

    println!("Available filters ({} total):", registry.len());
    println!();

    for (category, filters) in registry.grouped_by_category() {
        println!("  {}", category.display_name());
        for metadata in filters {
            println!("      • {} - {}", metadata.id, metadata.description);
        }
        println!();
    }
}

fn filter_info(filter_id: &str) -> Result<()> {
    let registry = FilterRegistry::with_builtins();
    let metadata = registry.get_metadata(filter_id).ok_or_else(|| {
        anyhow!("filter not found: {} (use 'list' to see available filters)", filter_id)
    })?;

    println!("Filter: {}", metadata.name);
    println!("ID: {}", metadata.id);
    println!("Category: {}", metadata.category.display_name());
    println!("Version: {}", metadata.version);
    println!();
    println!("Description:");
    println!("  {}", metadata.description);
    println!();

    if !metadata.inputs.is_empty() {
        println!("Inputs:");
        for slot in &metadata.inputs {
            let optional = if slot.optional { " (optional)" } else { "" };
            println!("  • {} [{}]{}", slot.name, slot.kind, optional);
            if !slot.description.is_empty() {
                println!("    {}", slot.description);
            }
        }
        println!();
    }

    if !metadata.outputs.is_empty() {
        println!("Outputs:");
        for slot in &metadata.outputs {
            println!("  • {} [{}]", slot.name, slot.kind);
            if !slot.description.is_empty() {
                println!("    {}", slot.description);
            }
        }
        println!();
    }

    if !metadata.parameters.is_empty() {
        println!("Parameters:");
        for param in &metadata.parameters {
            println!("  • {} [{}] = {}", param.name, param.param_type, param.default_value);
            if !param.description.is_empty() {
                println!("    {}", param.description);
            }
        }
    }

    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let mut options = match &args.config {
        Some(path) => ExecutionOptions::from_toml_file(path)
            .with_context(|| format!("cannot read options from {}", path.display()))?,
        None => ExecutionOptions::new(),
    };
    if args.parallel {
        options.parallel = true;
    }
    let options = options.with_progress(|update| match update {
        ProgressUpdate::NodeStarted { node_name, .. } => println!("   • Running: {}", node_name),
        ProgressUpdate::PieceStarted { piece, pieces, region } => {
            println!("   • Piece {}/{}: {}", piece + 1, pieces, region)
        }
        ProgressUpdate::Error { message, .. } => eprintln!("   ✗ {}", message),
        _ => {}
    });

    let json = std::fs::read_to_string(&args.path)
        .with_context(|| format!("cannot read {}", args.path.display()))?;
    let registry = FilterRegistry::with_builtins();
    let loaded = Pipeline::from_json(&json, &registry)
        .with_context(|| format!("cannot load pipeline from {}", args.path.display()))?;
    let mut pipeline = loaded.pipeline;

    let (node, slot, region) = match loaded.target {
        Some(target) => target,
        None => {
            let sinks = pipeline.get_sink_nodes();
            match sinks.as_slice() {
                [only] => (*only, SlotKey::Index(0), None),
                _ => bail!("the description names no target and has {} sink nodes", sinks.len()),
            }
        }
    };
    let output = output_index(&pipeline, node, &slot)?;
    if let Some(region) = region {
        pipeline.set_requested_region(node, output, region)?;
    }

    let name = pipeline.get_node(node)?.display_name();
    info!("Updating output {} of {}", slot, name);
    println!("⚙️  Updating {} ({})", name, slot);

    let engine = UpdateEngine::with_options(options);
    let report = engine.update_streamed(&mut pipeline, node, output, args.pieces)?;
    let stats = &report.stats;
    println!(
        "✅ Done in {}ms: {} executed, {} skipped, {} allocations, {} pieces",
        stats.total_duration.as_millis(),
        stats.nodes_executed(),
        stats.skipped.len(),
        stats.allocations,
        stats.pieces.max(1),
    );

    print_output(&pipeline.output(node, output)?);
    Ok(())
}

fn output_index(pipeline: &Pipeline, node: NodeId, slot: &SlotKey) -> Result<usize> {
    let metadata = pipeline.get_node(node)?.metadata();
    let index = match slot {
        SlotKey::Index(i) => Some(*i).filter(|i| *i < metadata.outputs.len()),
        SlotKey::Name(name) => metadata.output_index(name),
    };
    index.ok_or_else(|| anyhow!("{} has no output {}", metadata.name, slot))
}

fn print_output(handle: &DataHandle) {
    let object = handle.read();
    let Some(information) = object.information() else {
        return;
    };

    if let Some(summary) = object.payload_as::<Summary>() {
        println!();
        println!("Summary:");
        println!("  count   {}", summary.count);
        println!("  sum     {}", summary.sum);
        println!("  mean    {}", summary.mean);
        println!("  sigma   {}", summary.sigma);
        println!("  minimum {}", summary.minimum);
        println!("  maximum {}", summary.maximum);
        return;
    }

    println!();
    println!("Output: {} over {}", information.kind, information.largest_region);
    if let Some(buffered) = object.buffered_region() {
        println!("Buffered: {} ({} bytes)", buffered, object.byte_size());
    }
}
