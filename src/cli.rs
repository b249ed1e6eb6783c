use crate::config::{LayoutOptions, load_config};
use crate::interchange::{graph_from_json, positioned_to_value};
use crate::layout::{LayoutContext, compute_layout_with};
use crate::layout_dump::write_layout_dump;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mmdl",
    version,
    about = "Hierarchical layout for Mermaid flowchart graphs (interchange JSON in, positioned JSON out)"
)]
pub struct Args {
    /// Input graph (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the positioned graph. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Canvas padding
    #[arg(long = "padding")]
    pub padding: Option<f64>,

    /// Spacing between sibling nodes in a layer
    #[arg(long = "node-spacing")]
    pub node_spacing: Option<f64>,

    /// Spacing between layers
    #[arg(long = "layer-spacing")]
    pub layer_spacing: Option<f64>,

    /// Write a debug dump of the layout run to this file
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,
}

impl Args {
    fn options(&self) -> LayoutOptions {
        LayoutOptions {
            padding: self.padding,
            node_spacing: self.node_spacing,
            layer_spacing: self.layer_spacing,
            component_spacing: None,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?.with_options(&args.options());

    let input = read_input(args.input.as_deref())?;
    let graph = graph_from_json(&input).context("input is not a valid graph payload")?;
    let outcome = compute_layout_with(&graph, &config, &LayoutContext::default())?;
    info!(
        nodes = outcome.graph.nodes.len(),
        edges = outcome.graph.edges.len(),
        width = outcome.graph.width,
        height = outcome.graph.height,
        "layout finished"
    );

    if let Some(dump) = args.dump.as_deref() {
        write_layout_dump(dump, &outcome, &graph)?;
    }

    let value = positioned_to_value(&outcome.graph)?;
    write_output(&value, args.output.as_deref())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(value: &serde_json::Value, path: Option<&Path>) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout().write_all(json.as_bytes())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_flags_become_layout_options() {
        let args = Args::parse_from([
            "mmdl",
            "-i",
            "graph.json",
            "--padding",
            "12",
            "--layer-spacing",
            "70",
        ]);
        let options = args.options();
        assert_eq!(options.padding, Some(12.0));
        assert_eq!(options.layer_spacing, Some(70.0));
        assert_eq!(options.node_spacing, None);
        assert_eq!(args.input.as_deref(), Some(Path::new("graph.json")));
    }
}
