// src/core/engine.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{bail, Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{Config, LayoutConfig, ParsingConfig};
use crate::error::CanvasError;
use super::call_graph::{collect_endpoints, focus, match_endpoints, CallGraph, Endpoint};
use super::canvas::{CanvasDocument, FlowSynthesizer, StructuralLayout};
use super::llm::{analyze_with_retry, create_analyzer, AnalysisRequest, ContextCompiler, ContextSource};
use super::parser::{CodeParser, ParsedFile};

/// Options for the structural command
#[derive(Debug, Clone, Default)]
pub struct StructuralOptions {
    pub paths: Vec<PathBuf>,
    pub entrypoint: Option<String>,
    pub output: Option<PathBuf>,
    pub show_docstrings: bool,
    pub show_params: bool,
    pub compact: bool,
    pub stdout: bool,
}

/// Options for the flow command
#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    pub file: PathBuf,
    pub entrypoint: Option<String>,
    pub output: Option<PathBuf>,
    pub model: Option<String>,
    pub show_analysis: bool,
    pub dry_run: bool,
    pub compact: bool,
    pub stdout: bool,
}

/// One file after parsing and call resolution
struct AnalyzedFile {
    parsed: ParsedFile,
    graph: CallGraph,
}

/// Main orchestration engine for both canvas commands
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Create a new engine with configuration from `config_path` or the working directory
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path).context("load configuration")?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Draw the structure of one or more files
    pub async fn structural(&self, options: StructuralOptions) -> Result<()> {
        let parser = CodeParser::new(&self.config.parsing).context("initialize parsers")?;
        let files = parser.discover_files(&options.paths).context("discover input files")?;
        if files.is_empty() {
            bail!("no supported source files found in the given paths");
        }

        info!("🔍 Analyzing {} file(s)", files.len());
        let mut analyzed = self.analyze_files(files).await?;

        let endpoints: Vec<Endpoint> = analyzed.iter().flat_map(|f| collect_endpoints(&f.parsed.root)).collect();
        if !endpoints.is_empty() {
            let matched: usize = analyzed.iter_mut().map(|f| match_endpoints(&mut f.graph, &endpoints)).sum();
            info!("🔗 Matched {} API call(s) against {} endpoint(s)", matched, endpoints.len());
        }

        if let Some(entrypoint) = &options.entrypoint {
            analyzed = focus_files(analyzed, entrypoint)?;
        }

        let layout_config = self.layout_config(options.show_docstrings, options.show_params);
        let layout = StructuralLayout::new(&layout_config, &self.config.palette);

        let mut documents = Vec::with_capacity(analyzed.len());
        for file in &analyzed {
            let document = layout
                .build(&file.parsed.root, &file.graph)
                .with_context(|| format!("layout {}", file.parsed.path.display()))?;
            debug!(
                "{}: {} nodes, {} edges",
                file.parsed.path.display(),
                document.nodes.len(),
                document.edges.len()
            );
            documents.push(document);
        }

        let paths: Vec<PathBuf> = analyzed.iter().map(|f| f.parsed.path.clone()).collect();

        // Render everything before touching the filesystem
        let rendered: Vec<(Option<PathBuf>, String)> = if options.stdout || options.output.is_some() {
            let document = if documents.len() == 1 {
                documents.remove(0)
            } else {
                CanvasDocument::merge_horizontal(documents, layout_config.column_gutter)
            };
            let json = document.to_json(options.compact).context("render canvas")?;
            vec![(options.output.as_deref().map(canvas_path), json)]
        } else {
            let outputs = default_structural_outputs(&paths);
            let mut rendered = Vec::with_capacity(documents.len());
            for (document, output) in documents.iter().zip(outputs) {
                rendered.push((Some(output), document.to_json(options.compact).context("render canvas")?));
            }
            rendered
        };

        for (output, json) in rendered {
            match output {
                Some(path) if !options.stdout => {
                    write_atomic(&path, &json)?;
                    info!("✅ Canvas written: {}", path.display());
                }
                _ => println!("{}", json),
            }
        }
        Ok(())
    }

    /// Draw the execution flow of one file or one entrypoint in it
    pub async fn flow(&self, options: FlowOptions) -> Result<()> {
        let path = options.file.as_path();
        let mut parser = CodeParser::new(&self.config.parsing).context("initialize parsers")?;
        let parsed = parser
            .parse_file(path)
            .with_context(|| format!("parse {}", path.display()))?;

        let mut graph = CallGraph::build(&parsed.root);
        let endpoints = collect_endpoints(&parsed.root);
        match_endpoints(&mut graph, &endpoints);

        let (root, graph, entry_id) = match &options.entrypoint {
            Some(entrypoint) => {
                let (root, graph) = focus(&parsed.root, &graph, entrypoint)
                    .with_context(|| format!("resolve {} in {}", entrypoint, path.display()))?;
                let entry_id = root.find_by_path(entrypoint).map(|e| e.id.clone());
                (root, graph, entry_id)
            }
            None => (parsed.root.clone(), graph, None),
        };

        let source = ContextSource {
            path: &parsed.path,
            language: &parsed.language,
            source: &parsed.source,
        };
        let context = ContextCompiler::new(self.config.analysis.max_context_chars).compile(
            &source,
            &root,
            &graph,
            entry_id.as_deref(),
        );
        if context.truncated {
            warn!(
                "Context truncated to {} characters; the flow may be incomplete",
                self.config.analysis.max_context_chars
            );
        }

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.analysis.model.clone());

        if options.dry_run {
            println!("{}", context.text);
            println!(
                "-- {} element(s), {} chars, ~{} tokens, model {}",
                context.elements.len(),
                context.text.len(),
                context.estimate_tokens(),
                model
            );
            return Ok(());
        }

        let analyzer = create_analyzer(&self.config.analysis).context("initialize analyzer")?;
        let request = AnalysisRequest {
            context: context.text,
            entrypoint: options.entrypoint.clone().unwrap_or_else(|| root.name.clone()),
            model,
        };

        info!(
            "🧠 Requesting flow analysis from {} ({}, ~{} tokens)",
            analyzer.provider_name(),
            request.model,
            request.context.len().div_ceil(4)
        );

        let timeout = Duration::from_secs(self.config.analysis.timeout_secs);
        let analysis = tokio::select! {
            result = analyze_with_retry(analyzer.as_ref(), &request, timeout) => {
                result
                    .map_err(CanvasError::from)
                    .with_context(|| format!("analyze {}", path.display()))?
            }
            _ = tokio::signal::ctrl_c() => {
                return Err(CanvasError::Cancelled).with_context(|| format!("analyze {}", path.display()));
            }
        };

        if options.show_analysis {
            println!("{}", serde_json::to_string_pretty(&analysis).context("render analysis")?);
        }

        let layout_config = self.layout_config(true, true);
        let document = FlowSynthesizer::new(&layout_config, &self.config.palette)
            .build(&analysis)
            .with_context(|| format!("layout flow for {}", path.display()))?;
        let json = document.to_json(options.compact).context("render canvas")?;

        if options.stdout {
            println!("{}", json);
            return Ok(());
        }

        let output = match &options.output {
            Some(output) => canvas_path(output),
            None => default_flow_output(path, options.entrypoint.as_deref()),
        };
        write_atomic(&output, &json)?;
        info!("✅ Flow canvas written: {} ({} steps)", output.display(), document.nodes.len());
        Ok(())
    }

    /// Parse and resolve every file on the blocking pool, sorted by path
    async fn analyze_files(&self, files: Vec<PathBuf>) -> Result<Vec<AnalyzedFile>> {
        let mut tasks = JoinSet::new();
        for path in files {
            let parsing = self.config.parsing.clone();
            tasks.spawn_blocking(move || analyze_file(&parsing, &path));
        }

        let mut analyzed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            analyzed.push(joined.context("file pipeline panicked")??);
        }

        analyzed.sort_by(|a, b| a.parsed.path.cmp(&b.parsed.path));
        Ok(analyzed)
    }

    fn layout_config(&self, show_docstrings: bool, show_params: bool) -> LayoutConfig {
        let mut layout = self.config.layout.clone();
        layout.show_docstrings &= show_docstrings;
        layout.show_params &= show_params;
        layout
    }
}

fn analyze_file(parsing: &ParsingConfig, path: &Path) -> Result<AnalyzedFile> {
    let mut parser = CodeParser::new(parsing).context("initialize parsers")?;
    let parsed = parser
        .parse_file(path)
        .with_context(|| format!("parse {}", path.display()))?;
    let graph = CallGraph::build(&parsed.root);

    debug!(
        "{}: {} elements, {} edges, {} unresolved, {} API calls",
        path.display(),
        parsed.root.walk().len(),
        graph.edges.len(),
        graph.unresolved.len(),
        graph.api_call_count()
    );
    Ok(AnalyzedFile { parsed, graph })
}

/// Focus every file that defines `entrypoint`; files without it are left out
fn focus_files(files: Vec<AnalyzedFile>, entrypoint: &str) -> Result<Vec<AnalyzedFile>> {
    let mut focused = Vec::new();

    for file in files {
        match focus(&file.parsed.root, &file.graph, entrypoint) {
            Ok((root, graph)) => focused.push(AnalyzedFile {
                parsed: ParsedFile { root, ..file.parsed },
                graph,
            }),
            Err(CanvasError::EntrypointNotFound(_)) => {
                debug!("{} does not define {}", file.parsed.path.display(), entrypoint);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("resolve {} in {}", entrypoint, file.parsed.path.display()));
            }
        }
    }

    if focused.is_empty() {
        return Err(CanvasError::EntrypointNotFound(entrypoint.to_string())).context("resolve entrypoint");
    }
    Ok(focused)
}

/// Force the `.canvas` extension
fn canvas_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "canvas") {
        path.to_path_buf()
    } else {
        path.with_extension("canvas")
    }
}

/// `<file>.canvas` next to each input; inputs sharing a stem keep their extension in the name
fn default_structural_outputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut counts: HashMap<PathBuf, usize> = HashMap::new();
    for path in paths {
        *counts.entry(path.with_extension("canvas")).or_default() += 1;
    }

    paths
        .iter()
        .map(|path| {
            let output = path.with_extension("canvas");
            if counts[&output] > 1 {
                let mut name = path.as_os_str().to_owned();
                name.push(".canvas");
                PathBuf::from(name)
            } else {
                output
            }
        })
        .collect()
}

/// `<stem>[_<entry>]_flow.canvas` next to the input
fn default_flow_output(path: &Path, entrypoint: Option<&str>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "flow".to_string());
    let name = match entrypoint {
        Some(entry) => format!("{}_{}_flow.canvas", stem, entry.replace('.', "_")),
        None => format!("{}_flow.canvas", stem),
    };
    path.with_file_name(name)
}

/// Write via a sibling temp file so a failed run never leaves a partial canvas
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("write {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content).with_context(|| format!("write {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("write {}", path.display()));
    }
    Ok(())
}
