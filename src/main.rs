use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use netviz::client::{ServiceResponse, DEFAULT_LIMIT, DEFAULT_OPTIMIZE};
use netviz::ui;
use netviz::visualization::escape_markup;
use netviz::{
    apply_style, ClientConfig, CytoscapeDocument, Elements, GradientColorScaler, Layout,
    LinearScaler, QueryClient, QueryRequest, QueryResponse, Route, SizeSource, StyleConfig,
};

/// Title used for generated HTML pages
const DEFAULT_TITLE: &str = "Network";

/// Command-line arguments
#[derive(Parser)]
#[command(
    author,
    version,
    about = "Query a graph network service and render the result",
    long_about = None
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Address of the query service, overrides the configuration file
    #[arg(long, value_name = "URL", global = true)]
    server: Option<String>,

    /// Authorization header forwarded to the SPARQL endpoint
    #[arg(long, value_name = "VALUE", global = true)]
    authorization: Option<String>,

    /// Prompt for the Authorization header instead of passing it on the command line
    #[arg(long, global = true)]
    ask_authorization: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The query form: endpoint, SPARQL snippets and limits
#[derive(Args, Clone)]
struct QueryArgs {
    /// SPARQL endpoint URL (prompted if not provided)
    #[arg(long)]
    endpoint: Option<String>,

    /// PREFIX declarations for both queries
    #[arg(long, conflicts_with = "prefixes_file")]
    prefixes: Option<String>,

    /// File holding the PREFIX declarations
    #[arg(long, value_name = "FILE")]
    prefixes_file: Option<PathBuf>,

    /// Node query; <ID_SET> is replaced by the node ids
    #[arg(long, conflicts_with = "nodes_file")]
    nodes: Option<String>,

    /// File holding the node query
    #[arg(long, value_name = "FILE")]
    nodes_file: Option<PathBuf>,

    /// Link query; <ID> is replaced by the center node(s)
    #[arg(long, conflicts_with = "links_file")]
    links: Option<String>,

    /// File holding the link query
    #[arg(long, value_name = "FILE")]
    links_file: Option<PathBuf>,

    /// Maximum number of links
    #[arg(long, default_value = DEFAULT_LIMIT)]
    limit: String,

    /// Multiplier applied to the limit while collecting links
    #[arg(long, default_value = DEFAULT_OPTIMIZE)]
    optimize: String,

    /// Keep both directions of a reciprocal link
    #[arg(long)]
    keep_multiple_links: bool,
}

/// Display ranges for node size, node color and edge width
#[derive(Args, Clone)]
struct StyleArgs {
    /// Smallest node diameter
    #[arg(long, default_value_t = 10.0)]
    min_size: f64,

    /// Largest node diameter
    #[arg(long, default_value_t = 35.0)]
    max_size: f64,

    /// Node metric mapped onto the diameter range
    #[arg(long, value_enum, default_value_t = SizeBy::OutDegree)]
    size_by: SizeBy,

    /// Color of the nodes closest to the center
    #[arg(long, default_value = "rgb(255, 0, 0)")]
    near_color: String,

    /// Color of the nodes farthest from the center
    #[arg(long, default_value = "rgb(0, 0, 255)")]
    far_color: String,

    /// Thinnest edge width
    #[arg(long, default_value_t = 1.0)]
    min_width: f64,

    /// Thickest edge width
    #[arg(long, default_value_t = 6.0)]
    max_width: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum SizeBy {
    /// Square root of the out-degree
    OutDegree,
    /// Pagerank score
    Pagerank,
}

impl From<SizeBy> for SizeSource {
    fn from(size_by: SizeBy) -> Self {
        match size_by {
            SizeBy::OutDegree => SizeSource::OutDegree,
            SizeBy::Pagerank => SizeSource::Pagerank,
        }
    }
}

impl From<&StyleArgs> for StyleConfig {
    fn from(args: &StyleArgs) -> Self {
        StyleConfig {
            node_size: (args.min_size, args.max_size),
            size_source: args.size_by.into(),
            node_colors: (args.near_color.clone(), args.far_color.clone()),
            edge_width: (args.min_width, args.max_width),
        }
    }
}

/// Where a rendered network goes
#[derive(Args, Clone)]
struct RenderArgs {
    /// Write the Cytoscape JSON document here (stdout if neither this nor --html is given)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a standalone HTML page here
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Title of the HTML page
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,

    /// Node placement: force-directed, or fixed from each node's x/y
    #[arg(long, value_enum, default_value_t = LayoutKind::Cose)]
    layout: LayoutKind,

    /// Multiplier applied to x/y with the preset layout
    #[arg(long, default_value_t = Layout::DEFAULT_PRESET_SCALE)]
    preset_scale: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutKind {
    Cose,
    Preset,
}

impl RenderArgs {
    fn layout(&self) -> Layout {
        match self.layout {
            LayoutKind::Cose => Layout::Cose,
            LayoutKind::Preset => Layout::Preset {
                scale: self.preset_scale,
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Query a network (egocentric if --id is given, sampled otherwise)
    Query {
        #[command(flatten)]
        query: QueryArgs,

        /// Center node(s) of the network, space separated
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        style: StyleArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Query an egocentric network with distances from the center node
    Ego {
        #[command(flatten)]
        query: QueryArgs,

        /// Center node(s) of the network, space separated
        #[arg(long)]
        id: String,

        #[command(flatten)]
        style: StyleArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Fetch the network as GraphML
    Graphml {
        #[command(flatten)]
        query: QueryArgs,

        /// Center node(s) of the network, space separated
        #[arg(long)]
        id: Option<String>,

        /// Output file (if not specified, outputs to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Escape markup so the document can be embedded in HTML
        #[arg(long)]
        escape: bool,
    },

    /// Fetch the network signature
    Signature {
        #[command(flatten)]
        query: QueryArgs,

        /// Center node(s) of the network, space separated
        #[arg(long)]
        id: Option<String>,

        /// Output file (if not specified, outputs to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Escape markup so the text can be embedded in HTML
        #[arg(long)]
        escape: bool,
    },

    /// Style a saved service response or element list without querying
    Style {
        /// JSON file with either a full response or bare {nodes, edges}
        input: PathBuf,

        #[command(flatten)]
        style: StyleArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Rescale a list of numbers onto a range or a color gradient
    Scale {
        /// Values to scale
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,

        /// Low end of the target range
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        low: f64,

        /// High end of the target range
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        high: f64,

        /// Map onto a gradient between two colors instead, e.g. "rgb(255,0,0)" "rgb(0,0,255)"
        #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
        colors: Option<Vec<String>>,
    },

    /// Show the effective configuration
    Config {
        /// Save the effective configuration to the configuration file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => ClientConfig::default_path()
            .context("Could not determine configuration directory for your platform")?,
    };

    let mut config = ClientConfig::load_or_default(&config_path)
        .context(format!("Failed to load configuration from {}", config_path.display()))?;
    let authorization = match cli.authorization {
        Some(auth) => Some(auth),
        None if cli.ask_authorization => ui::prompt_secret("Authorization")?,
        None => None,
    };
    config.merge_overrides(cli.server, authorization);

    match cli.command {
        Commands::Query { query, id, style, render } => {
            let request = build_request(&query, id)?;
            query_network(config, Route::Query, request, &style, &render).await
        }
        Commands::Ego { query, id, style, render } => {
            let request = build_request(&query, Some(id))?;
            query_network(config, Route::QueryEgo, request, &style, &render).await
        }
        Commands::Graphml { query, id, output, escape } => {
            let request = build_request(&query, id)?;
            query_text(config, Route::GraphMl, request, output, escape).await
        }
        Commands::Signature { query, id, output, escape } => {
            let request = build_request(&query, id)?;
            query_text(config, Route::Signature, request, output, escape).await
        }
        Commands::Style { input, style, render } => style_file(&input, &style, &render),
        Commands::Scale { values, low, high, colors } => scale_values(&values, low, high, colors),
        Commands::Config { save } => show_config(&config, &config_path, save),
    }
}

/// Read a query field from its flag or its file
fn field_or_file(value: &Option<String>, file: &Option<PathBuf>) -> Result<Option<String>> {
    match (value, file) {
        (Some(v), _) => Ok(Some(v.clone())),
        (None, Some(path)) => fs::read_to_string(path)
            .map(Some)
            .context(format!("Failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

/// Assemble the request body, prompting for missing required fields
fn build_request(args: &QueryArgs, id: Option<String>) -> Result<QueryRequest> {
    let endpoint = ui::require_field(args.endpoint.clone(), "endpoint", "SPARQL endpoint")?;
    let links = ui::require_field(
        field_or_file(&args.links, &args.links_file)?,
        "links",
        "Link query",
    )?;
    let nodes = field_or_file(&args.nodes, &args.nodes_file)?.unwrap_or_default();
    let prefixes = field_or_file(&args.prefixes, &args.prefixes_file)?.unwrap_or_default();

    let mut request = QueryRequest::new(endpoint, nodes, links)
        .with_prefixes(prefixes)
        .with_limit(&args.limit)
        .with_optimize(&args.optimize);
    if let Some(id) = id {
        request = request.with_id(id);
    }
    if args.keep_multiple_links {
        request = request.with_remove_multiple_links(false);
    }

    request.validate()?;
    Ok(request)
}

/// Send the request with a spinner, reporting failures on the status line
async fn fetch_with_status(
    config: ClientConfig,
    route: Route,
    request: &QueryRequest,
) -> Result<(ServiceResponse, std::time::Duration)> {
    let client = QueryClient::new(config)?;
    let started = Instant::now();

    match ui::with_query_progress("Performing the query", client.fetch(route, request)).await {
        Ok(response) => Ok((response, started.elapsed())),
        Err(e) => {
            ui::report_failure(&e);
            Err(e.into())
        }
    }
}

/// Query a network, style it and render it
async fn query_network(
    config: ClientConfig,
    route: Route,
    request: QueryRequest,
    style: &StyleArgs,
    render: &RenderArgs,
) -> Result<()> {
    let (response, elapsed) = fetch_with_status(config, route, &request).await?;

    let mut response = match response {
        ServiceResponse::Network(response) => response,
        ServiceResponse::Text(_) => {
            return Err(anyhow::anyhow!("{} did not return a network", route.path()))
        }
    };

    apply_style(&mut response.elements, &StyleConfig::from(style))
        .context("Failed to style the network")?;
    ui::report_success(&response.metrics, elapsed, Local::now());

    render_document(CytoscapeDocument::new(response.elements, response.metrics), render)
}

/// Fetch a GraphML or signature document
async fn query_text(
    config: ClientConfig,
    route: Route,
    request: QueryRequest,
    output: Option<PathBuf>,
    escape: bool,
) -> Result<()> {
    let (response, elapsed) = fetch_with_status(config, route, &request).await?;

    let text = match response {
        ServiceResponse::Text(text) => text,
        ServiceResponse::Network(_) => {
            return Err(anyhow::anyhow!("{} did not return text", route.path()))
        }
    };
    ui::report_success(&serde_json::Map::new(), elapsed, Local::now());

    let text = if escape { escape_markup(&text) } else { text };
    write_output(&text, output.as_deref(), "Document")
}

/// Style a saved response and render it
fn style_file(input: &Path, style: &StyleArgs, render: &RenderArgs) -> Result<()> {
    let data = fs::read_to_string(input).context(format!("Failed to read {}", input.display()))?;
    let value: Value = serde_json::from_str(&data)
        .context(format!("{} is not valid JSON", input.display()))?;

    // A full response carries `elements`; otherwise the file is the element list itself.
    let mut response = if value.get("elements").is_some() {
        serde_json::from_value::<QueryResponse>(value)?
    } else {
        QueryResponse {
            elements: serde_json::from_value::<Elements>(value)?,
            ..QueryResponse::default()
        }
    };

    apply_style(&mut response.elements, &StyleConfig::from(style))?;
    println!(
        "Styled {} nodes and {} edges",
        response.elements.nodes.len().to_string().green(),
        response.elements.edges.len().to_string().green()
    );

    render_document(CytoscapeDocument::new(response.elements, response.metrics), render)
}

/// Write the document as JSON and/or HTML
fn render_document(document: CytoscapeDocument, render: &RenderArgs) -> Result<()> {
    let document = document.with_layout(&render.layout());

    if let Some(html_path) = &render.html {
        write_output(&document.to_html(&render.title)?, Some(html_path), "Page")?;
    }

    if render.output.is_some() || render.html.is_none() {
        write_output(&document.to_json()?, render.output.as_deref(), "Network")?;
    }

    Ok(())
}

/// Output to file or stdout
fn write_output(text: &str, output: Option<&Path>, what: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).context(format!("Failed to write {}", path.display()))?;
            eprintln!("{} saved to {}", what, path.display().to_string().blue());
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Rescale numbers given on the command line
fn scale_values(values: &[f64], low: f64, high: f64, colors: Option<Vec<String>>) -> Result<()> {
    match colors.as_deref() {
        Some([near, far]) => {
            let mut scaler = GradientColorScaler::new(near, far);
            for (value, color) in values.iter().zip(scaler.fit_transform(values)?) {
                println!("{:<12} {}", value, color.yellow());
            }
        }
        Some(_) => return Err(anyhow::anyhow!("--colors takes exactly two colors")),
        None => {
            let mut scaler = LinearScaler::new(low, high);
            let scaled = scaler.fit_transform(values)?;
            if let Some(c) = scaler.coefficients() {
                eprintln!(
                    "{}",
                    format!("scale={} offset={}", c.scale, c.offset).dimmed()
                );
            }
            for (value, result) in values.iter().zip(scaled) {
                println!("{:<12} {}", value, result.to_string().green());
            }
        }
    }
    Ok(())
}

/// Show the effective configuration, optionally saving it
fn show_config(config: &ClientConfig, path: &Path, save: bool) -> Result<()> {
    config.validate()?;
    println!("Configuration file: {}", path.display().to_string().blue());
    ui::display_config(config);

    if save {
        config.save_to_file(path)?;
        println!("Configuration saved to {}", path.display().to_string().green());
    }
    Ok(())
}
