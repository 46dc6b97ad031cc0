use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use rendrit::editor::EditorMode;
use rendrit::options::{preview_style, FileStorage, MemoryStorage, OptionsStore, Storage};
use rendrit::{App, ContentSource, EditorConfig, PreviewMode, PreviewStatus, Viewport};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// rendr.it editor core: preview templates and manage libraries from the terminal
#[derive(Parser, Debug)]
#[command(name = "rendrit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root URL of the rendr.it server
    #[arg(long, env = "RENDRIT_BASE_URL", default_value = "http://localhost:8888", global = true)]
    base_url: String,

    /// Options file (defaults to the platform config directory)
    #[arg(long, env = "RENDRIT_STORAGE", global = true)]
    storage: Option<PathBuf>,

    /// Do not run inline preview scripts
    #[arg(long, global = true)]
    no_scripts: bool,

    /// Preview pane size as WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720", value_parser = parse_viewport, global = true)]
    viewport: Viewport,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a template once and print the preview status
    Preview(PreviewArgs),

    /// Re-render whenever the template files change
    Watch(PreviewArgs),

    /// Create or fetch libraries
    Library {
        #[command(subcommand)]
        command: LibraryCommand,
    },

    /// Fetch or save rendrs
    Rendr {
        #[command(subcommand)]
        command: RendrCommand,
    },

    /// Show or change display options
    Options {
        #[command(subcommand)]
        command: OptionsCommand,
    },
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// HTML body template
    #[arg(long)]
    html: PathBuf,

    /// Stylesheet template
    #[arg(long)]
    css: Option<PathBuf>,

    /// Simulated request path
    #[arg(long, default_value = "")]
    path: String,

    /// Simulated query string
    #[arg(long, default_value = "")]
    query: String,

    /// Also print the document written into the preview frame
    #[arg(long)]
    print_document: bool,
}

#[derive(Args, Debug)]
struct LibraryAuth {
    /// Library id
    #[arg(long)]
    library: String,

    /// Library secret key
    #[arg(long, env = "RENDRIT_LIBRARY_KEY")]
    key: String,
}

#[derive(Subcommand, Debug)]
enum LibraryCommand {
    /// Create a library and print it, key included
    Create {
        #[arg(default_value = "New Library")]
        name: String,
    },
    /// Fetch a library and list its rendrs
    Fetch(LibraryAuth),
}

#[derive(Subcommand, Debug)]
enum RendrCommand {
    /// Fetch a rendr as JSON
    Fetch {
        #[command(flatten)]
        auth: LibraryAuth,
        rendr: String,
        /// Render it with the server-side renderer instead of locally
        #[arg(long)]
        rendered: bool,
    },
    /// Create or overwrite a rendr from template files
    Save {
        #[command(flatten)]
        auth: LibraryAuth,
        rendr: String,
        #[command(flatten)]
        files: PreviewArgs,
    },
}

#[derive(Subcommand, Debug)]
enum OptionsCommand {
    Show,
    Set {
        #[arg(long)]
        theme: Option<String>,
        /// Preview background: a class name or a #rrggbb colour
        #[arg(long)]
        grid: Option<String>,
    },
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
    Ok(Viewport {
        width: w.trim().parse().map_err(|e| format!("bad width: {}", e))?,
        height: h.trim().parse().map_err(|e| format!("bad height: {}", e))?,
    })
}

fn open_options(config: &EditorConfig) -> OptionsStore {
    let storage: Box<dyn Storage> = match config.storage_path.clone().or_else(FileStorage::default_path) {
        Some(path) => Box::new(FileStorage::new(path)),
        None => {
            log::warn!("no config directory available; options will not persist");
            Box::new(MemoryStorage::new())
        }
    };
    OptionsStore::new(storage)
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_templates(args: &PreviewArgs) -> anyhow::Result<(String, String)> {
    let html = read_file(&args.html)?;
    let css = match &args.css {
        Some(path) => read_file(path)?,
        None => String::new(),
    };
    Ok((html, css))
}

fn print_status(mode: PreviewMode, status: &PreviewStatus) {
    match &status.error {
        Some(error) => println!("[{}] broken: {}", mode, error),
        None => {
            let filesize = status
                .filesize
                .map(|f| format!(", {} bytes", f))
                .unwrap_or_default();
            println!(
                "[{}] {}x{}{} in {:.3}s",
                mode, status.width, status.height, filesize, status.rendertime
            );
        }
    }
    for error in &status.script_errors {
        println!("  script error: {}", error);
    }
}

fn load_templates(app: &mut App, args: &PreviewArgs) -> anyhow::Result<()> {
    let (html, css) = read_templates(args)?;
    let editors = app.editors_mut();
    editors.buffer_mut(EditorMode::Html).load(&html);
    editors.buffer_mut(EditorMode::Css).load(&css);
    app.set_test_path(&args.path);
    app.set_test_params(&args.query);
    Ok(())
}

fn modified(paths: &[&Path]) -> Vec<Option<SystemTime>> {
    paths
        .iter()
        .map(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
        .collect()
}

async fn watch(mut app: App, args: PreviewArgs) -> anyhow::Result<()> {
    load_templates(&mut app, &args)?;
    let mut fired = app.watch_changes();
    let status = app.code_change().await;
    print_status(app.preview().mode(), &status);

    let mut paths: Vec<&Path> = vec![&args.html];
    if let Some(css) = &args.css {
        paths.push(css);
    }
    let mut seen = modified(&paths);
    let mut poll = tokio::time::interval(Duration::from_millis(100));

    log::info!("watching {} file(s)", paths.len());
    loop {
        tokio::select! {
            _ = poll.tick() => {
                let now = modified(&paths);
                if now != seen {
                    seen = now;
                    let (html, css) = read_templates(&args)?;
                    app.edit_html(&html)?;
                    app.edit_css(&css)?;
                }
            }
            notification = fired.recv() => {
                if notification.is_none() {
                    return Ok(());
                }
                let status = app.code_change().await;
                print_status(app.preview().mode(), &status);
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EditorConfig {
        base_url: cli.base_url,
        viewport: cli.viewport,
        enable_scripts: !cli.no_scripts,
        storage_path: cli.storage,
        ..Default::default()
    };
    let options = open_options(&config);
    let mut app = App::new(config, options)?;

    match cli.command {
        Command::Preview(args) => {
            load_templates(&mut app, &args)?;
            let status = app.code_change().await;
            if args.print_document {
                if let Some(document) = app.preview().frame().document() {
                    println!("{}", document);
                }
            }
            print_status(app.preview().mode(), &status);
            if status.error.is_some() {
                return Err(anyhow!("preview is broken"));
            }
        }
        Command::Watch(args) => watch(app, args).await?,
        Command::Library { command } => match command {
            LibraryCommand::Create { name } => {
                app.new_library(&name).await?;
                let library = app.library().ok_or_else(|| anyhow!("no library returned"))?;
                println!("{}", serde_json::to_string_pretty(library)?);
            }
            LibraryCommand::Fetch(auth) => {
                app.load_library(&auth.library, &auth.key).await?;
                println!("{}", app.library_name());
                for rendr in app.library_menu() {
                    println!("  {}", rendr);
                }
            }
        },
        Command::Rendr { command } => match command {
            RendrCommand::Fetch { auth, rendr, rendered } => {
                app.load_library(&auth.library, &auth.key).await?;
                app.load_rendr(&rendr).await?;
                if rendered {
                    app.preview_rendered().await;
                }
                let document = app.document().ok_or_else(|| anyhow!("no rendr loaded"))?;
                println!("{}", serde_json::to_string_pretty(document)?);
                if let Some(url) = app.example_url() {
                    println!("example: {}{}", app.config().base_url.trim_end_matches('/'), url);
                }
                print_status(app.preview().mode(), app.preview().status());
            }
            RendrCommand::Save { auth, rendr, files } => {
                app.load_library(&auth.library, &auth.key).await?;
                load_templates(&mut app, &files)?;
                app.new_rendr.rendr_id = rendr;
                app.new_rendr.content_source = ContentSource::Current;
                app.new_rendr().await?;
                println!("saved; library now holds: {}", app.library_menu().join(", "));
                print_status(app.preview().mode(), app.preview().status());
            }
        },
        Command::Options { command } => match command {
            OptionsCommand::Show => {
                let options = app.options();
                let style = preview_style(&options.grid_theme);
                println!("theme: {}", options.theme);
                println!("grid theme: {}", options.grid_theme);
                println!("preview class: {:?}", style.class.trim());
                if let Some(colour) = style.background_color {
                    println!("preview background: {}", colour);
                }
            }
            OptionsCommand::Set { theme, grid } => {
                let current = app.options().clone();
                let saved = app.save_options(
                    theme.as_deref().unwrap_or(&current.theme),
                    grid.as_deref().unwrap_or(&current.grid_theme),
                )?;
                println!("{}", serde_json::to_string_pretty(&saved)?);
            }
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("rendrit: {:#}", e);
        std::process::exit(1);
    }
}
