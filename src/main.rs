use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use kbview::backlinks::{build_backlinks_index, Backlink};
use kbview::config::KbConfig;
use kbview::html::{RenderEngine, TocEntry};
use kbview::index::{KnowledgeBase, KnowledgeFile, Module};
use kbview::route::Route;
use kbview::{load_knowledge_base, Error};

/// Index and render a markdown knowledge base.
#[derive(Parser)]
#[command(name = "kbview", version, about)]
struct Cli {
    /// Path to kbview.toml (default: discovered from the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at info level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print modules, files and assets as JSON
    Index(RootArgs),
    /// Render one file to HTML
    Render {
        #[command(flatten)]
        root: RootArgs,
        /// Knowledge-relative id of the file, e.g. `java/basics.md`
        file_id: String,
        /// Print `{ html, toc, backlinks }` as JSON instead of bare HTML
        #[arg(long)]
        json: bool,
    },
    /// Resolve a location such as `#/knowledge?module=java`
    Route {
        #[command(flatten)]
        root: RootArgs,
        location: String,
    },
}

#[derive(Args)]
struct RootArgs {
    /// Knowledge root directory (overrides the config file)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(Serialize)]
struct IndexOutput<'a> {
    modules: &'a [Module],
    files: Vec<&'a KnowledgeFile>,
    assets: Vec<AssetOutput<'a>>,
}

#[derive(Serialize)]
struct AssetOutput<'a> {
    path: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct RenderOutput<'a> {
    html: &'a str,
    toc: &'a [TocEntry],
    backlinks: &'a [Backlink],
}

#[derive(Serialize)]
struct RouteOutput<'a> {
    route: &'a Route,
    selected: Option<&'a str>,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = KbConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Index(root) => {
            let kb = open(&config, root)?;
            print_index(&kb)
        }
        Commands::Render {
            root,
            file_id,
            json,
        } => {
            let kb = open(&config, root)?;
            let file = kb
                .file(&file_id)
                .ok_or_else(|| Error::UnknownFile(file_id.clone()))?;
            let rendered = RenderEngine::from_config(&config).render_file(Some(file), &kb);
            if !json {
                print!("{}", rendered.html);
                return Ok(());
            }
            let backlinks = build_backlinks_index(&kb);
            let output = RenderOutput {
                html: &rendered.html,
                toc: &rendered.toc,
                backlinks: backlinks.get(&file.id).map(Vec::as_slice).unwrap_or(&[]),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Route { root, location } => {
            let kb = open(&config, root)?;
            let route = Route::resolve(&location);
            let selected = match &route {
                Route::Knowledge(query) => kb.select(query).map(|f| f.id.as_str()),
                _ => None,
            };
            let output = RouteOutput {
                route: &route,
                selected,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn open(config: &KbConfig, args: RootArgs) -> Result<KnowledgeBase, Error> {
    let root = args.root.unwrap_or_else(|| config.root.clone());
    load_knowledge_base(&root, config)
}

fn print_index(kb: &KnowledgeBase) -> Result<(), Error> {
    let output = IndexOutput {
        modules: kb.modules(),
        files: kb.files().collect(),
        assets: kb
            .assets()
            .into_iter()
            .map(|(path, url)| AssetOutput { path, url })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
