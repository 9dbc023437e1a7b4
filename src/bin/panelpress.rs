use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "panelpress", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a page and store the PNG; prints the conversion result as JSON.
    Convert(ConvertArgs),
    /// Convert a page and write the PNG to an explicit path.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Input page markup (SVG).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Known image URL; references are matched against these by file name. Repeatable.
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Base URL for relative image references.
    #[arg(long)]
    base_url: Option<String>,

    /// Fetch distinct images concurrently before drawing.
    #[arg(long)]
    parallel: bool,

    /// Output canvas side in pixels.
    #[arg(long)]
    size: Option<u32>,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Display title, used for the output name.
    #[arg(long)]
    title: Option<String>,

    /// Output directory (default: `PANELPRESS_OUTPUT_DIR` or `./tmp`).
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("panelpress=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn build(
    source: &SourceArgs,
) -> anyhow::Result<(panelpress::Converter, panelpress::ConversionRequest)> {
    let markup = std::fs::read_to_string(&source.in_path)
        .with_context(|| format!("read markup '{}'", source.in_path.display()))?;

    let mut opts = panelpress::ConvertOpts::from_env();
    if source.parallel {
        opts.parallel_fetch = true;
    }
    if let Some(size) = source.size {
        opts.canvas_size = size;
    }

    let fetcher = Arc::new(panelpress::HttpFetcher::new(opts.fetch_timeout));
    let converter = panelpress::Converter::new(opts, fetcher);
    let req = panelpress::ConversionRequest {
        markup,
        title: None,
        known_urls: source.urls.clone(),
        context: panelpress::RequestContext {
            base_url: source.base_url.clone(),
        },
    };
    Ok((converter, req))
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let (converter, mut req) = build(&args.source)?;
    req.title = args.title;

    let out_dir = args
        .out_dir
        .or_else(|| std::env::var_os("PANELPRESS_OUTPUT_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./tmp"));
    let store = panelpress::OutputStore::new(out_dir)?;

    let result = converter.convert(&req, &store)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serialize conversion result")?
    );
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (converter, req) = build(&args.source)?;
    let rendered = converter.render(&req)?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    panelpress::write_png_file(&rendered.composite.surface, &args.out)?;

    for d in &rendered.diagnostics {
        eprintln!("warning: {}", d.message);
    }
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
