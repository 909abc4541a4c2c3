//! Legis CLI - hierarchy extraction and Akoma Ntoso generation.
//!
//! Pipeline: line-numbered text -> LineIndex -> recursive segmentation
//! against the oracle -> review artifact (JSON) -> AKN 3.0 XML.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use legis_akn::{AknOptions, AknSerializer};
use legis_core::{
    count_nodes, find_node_mut, review, DocumentStructure, ExtractionArtifact, HierarchyNode,
    LineIndex, NodeStatus,
};
use legis_oracle::{ClaudeOracle, SegmentOracle};
use legis_segment::{RecursiveSegmenter, SegmenterConfig};

#[derive(Parser)]
#[command(
    name = "legis",
    version,
    about = "Convert line-numbered legal documents into Akoma Ntoso XML via LLM segmentation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a document into a review artifact
    Extract {
        /// Input text file with [PAGE:N] markers
        input: PathBuf,

        /// Comma-separated hierarchy types, outermost first
        /// (e.g. "chapter,section,subsection"); skips classification
        #[arg(long)]
        types: Option<String>,

        /// Maximum hierarchy depth
        #[arg(long, default_value_t = 10)]
        max_depth: usize,

        /// Concurrent oracle calls per wave
        #[arg(long, default_value_t = 3)]
        workers: usize,

        /// Output artifact path (default: <input>.artifact.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the detected document title
        #[arg(long)]
        title: Option<String>,

        /// Override the detected document type (act, regulation, bill, ...)
        #[arg(long)]
        doc_type: Option<String>,

        /// Override the detected jurisdiction
        #[arg(long)]
        jurisdiction: Option<String>,

        /// Override the detected document number
        #[arg(long)]
        number: Option<String>,

        /// Override the detected enactment date
        #[arg(long)]
        date: Option<String>,
    },

    /// Generate AKN XML from a review artifact
    Generate {
        /// Review artifact JSON
        artifact: PathBuf,

        /// Comma-separated statuses to include (e.g. "approved,modified");
        /// default includes every node
        #[arg(long)]
        include: Option<String>,

        /// Output XML path (default: artifact path with .xml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// FRBR country code override (e.g. in, ie, gb)
        #[arg(long)]
        country: Option<String>,

        /// FRBR language code
        #[arg(long, default_value = "eng")]
        language: String,
    },

    /// Inspect or update review statuses in an artifact
    Review {
        /// Review artifact JSON
        artifact: PathBuf,

        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Show the line/page index of a document
    Inspect {
        /// Input text file with [PAGE:N] markers
        input: PathBuf,

        /// Number of lines to preview
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// List nodes with their ids and statuses
    List {
        /// Only show nodes with this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Set a node's review status
    Set {
        node_id: String,
        /// approved, rejected or modified
        status: String,
        /// Attach reviewer notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Extract {
            input,
            types,
            max_depth,
            workers,
            output,
            title,
            doc_type,
            jurisdiction,
            number,
            date,
        } => {
            let overrides = StructureOverrides {
                title,
                doc_type,
                jurisdiction,
                number,
                date,
            };
            extract(input, types, max_depth, workers, output, overrides).await
        }
        Commands::Generate {
            artifact,
            include,
            output,
            country,
            language,
        } => generate(&artifact, include.as_deref(), output, country, language),
        Commands::Review { artifact, action } => review_command(&artifact, action),
        Commands::Inspect { input, lines } => inspect(&input, lines),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

struct StructureOverrides {
    title: Option<String>,
    doc_type: Option<String>,
    jurisdiction: Option<String>,
    number: Option<String>,
    date: Option<String>,
}

impl StructureOverrides {
    fn apply(self, mut structure: DocumentStructure) -> DocumentStructure {
        if let Some(title) = self.title {
            structure.title = title;
        }
        if let Some(doc_type) = self.doc_type {
            structure.document_type = doc_type;
        }
        if let Some(jurisdiction) = self.jurisdiction {
            structure.jurisdiction = jurisdiction;
        }
        if let Some(number) = self.number {
            structure.number = Some(number);
        }
        if let Some(date) = self.date {
            structure.enactment_date = Some(date);
        }
        structure
    }
}

async fn extract(
    input: PathBuf,
    types: Option<String>,
    max_depth: usize,
    workers: usize,
    output: Option<PathBuf>,
    overrides: StructureOverrides,
) -> Result<()> {
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let index = Arc::new(LineIndex::build(&raw).context("indexing failed")?);
    let Some((first, last)) = index.bounds() else {
        bail!("{} has no addressable lines", input.display());
    };
    println!(
        "{} {} lines, pages {}..{}",
        "Indexed:".bold(),
        index.len(),
        index.page_of(first)?,
        index.page_of(last)?
    );

    let oracle: Arc<dyn SegmentOracle> = Arc::new(
        ClaudeOracle::from_env()
            .context("oracle unavailable; set ANTHROPIC_API_KEY (and optionally ANTHROPIC_ENDPOINT, ANTHROPIC_DEPLOYMENT)")?,
    );

    // Classify unless the hierarchy was given on the command line.
    let structure = match &types {
        Some(list) => DocumentStructure {
            document_type: "act".to_string(),
            jurisdiction: "Unknown".to_string(),
            hierarchy_types: list
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            title: input
                .file_stem()
                .map(|s| s.to_string_lossy().replace('_', " "))
                .unwrap_or_else(|| "Untitled".to_string()),
            enactment_date: None,
            number: None,
        },
        None => {
            let spinner = spinner("Analyzing document structure...");
            let sample = index.raw_text(first, last.min(first + 199))?;
            let structure = oracle
                .classify(&sample)
                .await
                .context("structure classification failed")?;
            spinner.finish_and_clear();
            structure
        }
    };
    let mut structure = overrides.apply(structure);
    structure.hierarchy_types.truncate(max_depth);

    if structure.hierarchy_types.is_empty() {
        bail!("no hierarchy types to extract");
    }
    println!(
        "{} {} | {} | {}",
        "Structure:".bold(),
        structure.document_type,
        structure.jurisdiction,
        structure.hierarchy_types.join(" > ")
    );

    let config = SegmenterConfig {
        max_workers: workers,
        ..SegmenterConfig::default()
    };
    let segmenter = RecursiveSegmenter::new(Arc::clone(&index), oracle).with_config(config);

    // Ctrl-C abandons in-flight oracle calls; a partial tree is still
    // written, marked incomplete.
    let cancel = segmenter.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "cancelling...".yellow());
            cancel.cancel();
        }
    });

    let spinner = spinner("Extracting hierarchy...");
    let outcome = segmenter
        .segment_document(&structure.hierarchy_types)
        .await?;
    spinner.finish_and_clear();

    for warning in &outcome.warnings {
        println!("{} {warning}", "warning:".yellow().bold());
    }
    if !outcome.complete {
        println!(
            "{}",
            "extraction cancelled: artifact holds a partial tree".yellow().bold()
        );
    }

    let total = count_nodes(&outcome.nodes);
    println!("{} {} nodes", "Extracted:".bold(), total);
    let artifact = ExtractionArtifact::from_nodes(
        input.display().to_string(),
        structure,
        outcome.nodes,
    );
    for (level, count) in &artifact.statistics.nodes_by_level {
        println!("  level {level}: {count} node(s)");
    }
    println!(
        "  average confidence: {:.2}",
        artifact.statistics.avg_confidence
    );

    let path = output.unwrap_or_else(|| artifact_output_path(&input));
    artifact.save(&path)?;
    println!("{} {}", "Saved:".green().bold(), path.display());
    Ok(())
}

fn generate(
    artifact_path: &Path,
    include: Option<&str>,
    output: Option<PathBuf>,
    country: Option<String>,
    language: String,
) -> Result<()> {
    let artifact = ExtractionArtifact::load(artifact_path)
        .with_context(|| format!("cannot load {}", artifact_path.display()))?;

    let nodes: Vec<HierarchyNode> = match include {
        Some(list) => {
            let statuses = parse_statuses(list)?;
            review::filter(&artifact.nodes, &statuses)
        }
        None => artifact.nodes.clone(),
    };
    if nodes.is_empty() {
        bail!("no nodes to serialize after filtering");
    }

    let serializer = AknSerializer::new().with_options(AknOptions {
        language,
        country,
        ..AknOptions::default()
    });
    let xml = serializer.serialize(&artifact.structure, &nodes)?;

    let path = output.unwrap_or_else(|| artifact_path.with_extension("xml"));
    std::fs::write(&path, &xml)?;
    println!(
        "{} {} ({} nodes)",
        "Generated:".green().bold(),
        path.display(),
        count_nodes(&nodes)
    );
    Ok(())
}

fn review_command(artifact_path: &Path, action: ReviewAction) -> Result<()> {
    let mut artifact = ExtractionArtifact::load(artifact_path)
        .with_context(|| format!("cannot load {}", artifact_path.display()))?;

    match action {
        ReviewAction::List { status } => {
            let filter: Option<NodeStatus> = status
                .map(|s| s.parse().map_err(anyhow::Error::msg))
                .transpose()?;
            print_nodes(&artifact.nodes, 0, filter);
        }
        ReviewAction::Set {
            node_id,
            status,
            notes,
        } => {
            let status: NodeStatus = status.parse().map_err(anyhow::Error::msg)?;
            review::set_status(&mut artifact.nodes, &node_id, status)?;
            if let Some(notes) = notes {
                if let Some(node) = find_node_mut(&mut artifact.nodes, &node_id) {
                    node.reviewer_notes = Some(notes);
                }
            }
            artifact.status = legis_core::ArtifactStatus::InReview;
            artifact.save(artifact_path)?;
            println!("{} {node_id} -> {status}", "Updated:".green().bold());
        }
    }
    Ok(())
}

fn inspect(input: &Path, lines: usize) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let index = LineIndex::build(&raw).context("indexing failed")?;
    let Some((first, last)) = index.bounds() else {
        println!("{} has no addressable lines", input.display());
        return Ok(());
    };
    println!(
        "{} lines, pages {}..{}",
        index.len(),
        index.page_of(first)?,
        index.page_of(last)?
    );
    let preview_end = last.min(first + lines.saturating_sub(1) as u32);
    println!("{}", index.numbered_text(first, preview_end)?);
    Ok(())
}

fn print_nodes(nodes: &[HierarchyNode], depth: usize, filter: Option<NodeStatus>) {
    for node in nodes {
        if filter.map_or(true, |wanted| node.status == wanted) {
            let status = match node.status {
                NodeStatus::Approved => node.status.to_string().green(),
                NodeStatus::Rejected => node.status.to_string().red(),
                NodeStatus::Modified => node.status.to_string().yellow(),
                NodeStatus::Pending => node.status.to_string().normal(),
            };
            let title = node.title.as_deref().unwrap_or("");
            println!(
                "{}{}  [{status}] {} {} {} (lines {}-{}, p.{}, conf {:.2})",
                "  ".repeat(depth),
                node.id,
                node.kind,
                node.number,
                title,
                node.citation.start_line,
                node.citation.end_line,
                node.citation.page,
                node.confidence
            );
        }
        print_nodes(&node.children, depth + 1, filter);
    }
}

fn parse_statuses(list: &str) -> Result<Vec<NodeStatus>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<NodeStatus>().map_err(anyhow::Error::msg))
        .collect()
}

/// Derive "input.artifact.json" next to the input file.
fn artifact_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}.artifact.json"))
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_output_path() {
        let path = artifact_output_path(Path::new("data/dpdp_act.txt"));
        assert_eq!(path, PathBuf::from("data/dpdp_act.artifact.json"));
    }

    #[test]
    fn test_parse_statuses() {
        let statuses = parse_statuses("approved, modified").unwrap();
        assert_eq!(statuses, vec![NodeStatus::Approved, NodeStatus::Modified]);
        assert!(parse_statuses("approved,bogus").is_err());
    }
}
