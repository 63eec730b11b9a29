use clap::{Parser, Subcommand};
use sitewright::config::SiteLayout;
use sitewright::planner::{self, PlanError, PlanOptions};
use sitewright::rebuild::{Coordinator, RebuildError, SiteRebuilder, request_queue};
use sitewright::render::{HandlebarsRenderer, PulldownConverter};
use sitewright::{execute, logging, output, serve, watch};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error>;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            static DEV: OnceLock<String> = OnceLock::new();
            DEV.get_or_init(|| format!("dev@{hash}"))
        }
    }
}

#[derive(Parser)]
#[command(name = "sitewright")]
#[command(about = "Static site build engine")]
#[command(long_about = "\
Static site build engine

Markdown pages and assets in the source tree are rendered through the
theme's Handlebars layouts into the output directory. Every build prints
its plan first; deletes are marked unsafe.

Site structure:

  my-site/
  ├── site.json                   # Optional config (site.toml also accepted)
  ├── source/
  │   ├── index.md                # Listing page when its layout uses `paginator`
  │   ├── about.md                # → _site/about.html
  │   ├── tag/index.md            # Tag listing → _site/tag/<tag>/index.html
  │   ├── _posts/
  │   │   └── 2024-01-02-hello.md # → _site/2024/01/02/hello.html
  │   └── _drafts/                # Rendered only with --testmode and under serve
  ├── themes/default/
  │   ├── _layouts/default.hbs    # Layouts, referenced by front matter `layout:`
  │   └── css/site.css            # Copied unless source has the same file
  └── _site/                      # Output, wiped and rebuilt (.git is kept)

Front matter keys: title, layout, tags, nav, sidebar, paginate, and any
custom key, all available to layouts under `page`.")]
#[command(version = version_string())]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and build the site
    Build {
        /// Site directory
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Execute without asking for confirmation
        #[arg(long)]
        yes: bool,
        /// Include drafts and ignore the URL prefix
        #[arg(long)]
        testmode: bool,
    },
    /// Build, then serve the output and rebuild on changes (test mode)
    Serve {
        /// Site directory
        #[arg(default_value = ".")]
        path: PathBuf,
        /// HTTP port (defaults to the configured `port`)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the resolved configuration as JSON
    Showconfig {
        /// Site directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Print the version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, BoxError> {
    match command {
        Command::Build {
            path,
            yes,
            testmode,
        } => build(&path, yes, PlanOptions { test_mode: testmode }),
        Command::Serve { path, port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve_site(path, port))
        }
        Command::Showconfig { path } => {
            let layout = SiteLayout::load(&path)?;
            println!("{}", serde_json::to_string_pretty(&layout.config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            println!("sitewright {}", version_string());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build(path: &Path, yes: bool, options: PlanOptions) -> Result<ExitCode, BoxError> {
    let layout = SiteLayout::load(path)?;
    let mut plan = match planner::plan(&layout, &options) {
        Ok(plan) => plan,
        Err(PlanError::Validation(errors)) => {
            output::print_validation_errors(&errors);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    output::print_plan(&plan);

    if !yes && !confirm("Proceed?")? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let renderer = HandlebarsRenderer::from_dir(&layout.layouts_dir)?;
    let summary = execute::execute(&mut plan, &layout, &renderer, &PulldownConverter)?;
    output::print_summary(&summary, &layout.site_root);
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is no.
fn confirm(question: &str) -> Result<bool, std::io::Error> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn serve_site(path: PathBuf, port: Option<u16>) -> Result<ExitCode, BoxError> {
    let layout = SiteLayout::load(&path)?;
    let port = port.unwrap_or(layout.config.port);
    let settle = Duration::from_millis(layout.config.settle_ms);
    let rebuilder = Arc::new(SiteRebuilder::new(
        layout.site_root.clone(),
        PlanOptions { test_mode: true },
    ));

    let initial = {
        let rebuilder = Arc::clone(&rebuilder);
        tokio::task::spawn_blocking(move || rebuilder.build()).await?
    };
    match initial {
        Ok(summary) => output::print_summary(&summary, &layout.site_root),
        Err(RebuildError::Plan(PlanError::Validation(errors))) => {
            output::print_validation_errors(&errors);
            return Ok(ExitCode::FAILURE);
        }
        Err(RebuildError::Incomplete(failed)) => {
            warn!(failed, "initial build incomplete, serving anyway");
        }
        Err(e) => return Err(e.into()),
    }

    let shutdown = CancellationToken::new();
    let (sender, queue) = request_queue();
    let _watcher = watch::spawn_watcher(&layout, sender)?;
    let coordinator = tokio::spawn(Coordinator::new(queue, rebuilder, settle).run(shutdown.clone()));

    let listener = serve::bind(port).await?;
    println!("Serving {} at http://{}/", layout.display_path(&layout.output_root), listener.local_addr()?);
    let output_root = layout.output_root.clone();
    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { serve::serve(listener, &output_root, shutdown).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();

    let stats = coordinator.await?;
    server.await??;
    info!(rebuilds = stats.rebuilds, failures = stats.failures, "served");
    Ok(ExitCode::SUCCESS)
}
