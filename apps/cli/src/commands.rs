//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use blogmate_core::{Orchestrator, ProgressReporter, Session};
use blogmate_providers::TitleRequest;
use blogmate_shared::{
    AppConfig, BlogType, Draft, PublishResult, Stage, init_config, load_config,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// BlogMate — generate, illustrate and publish blog posts.
#[derive(Parser)]
#[command(
    name = "blogmate",
    version,
    about = "Generate blog posts from a title or a reference URL and publish them to WordPress.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the finished draft goes.
#[derive(clap::Args, Debug)]
pub(crate) struct Output {
    /// Publish the draft to WordPress once it is ready.
    #[arg(long)]
    pub publish: bool,

    /// Write the HTML body to this file.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate a post (and featured image) from a title.
    Title {
        /// Post title.
        title: String,

        /// Post style: informative-article, persuasive-argument, listicle, how-to-guide.
        #[arg(short = 't', long = "type", default_value = "informative-article")]
        blog_type: BlogType,

        /// Outline or notes to steer the content.
        #[arg(long)]
        outline: Option<String>,

        /// Comma-separated keywords to include.
        #[arg(short, long)]
        keywords: Option<String>,

        #[command(flatten)]
        output: Output,
    },

    /// Generate an original post inspired by a web page.
    Url {
        /// Reference page URL.
        url: String,

        /// Post title (defaults to the page title).
        #[arg(long)]
        title: Option<String>,

        /// Skip fetching the page; the model sees only the URL.
        #[arg(long)]
        no_fetch: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Publish hand-written HTML.
    Write {
        /// Post title.
        #[arg(long)]
        title: String,

        /// HTML file with the post body.
        #[arg(long)]
        file: PathBuf,

        /// Generate a featured image for the title.
        #[arg(long)]
        image: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Fetch a page and print the extracted title, description and text.
    Scrape {
        /// Page URL.
        url: String,

        /// Print JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// WordPress site operations.
    #[command(name = "wp")]
    Wp {
        #[command(subcommand)]
        action: WpAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// WordPress subcommands.
#[derive(Subcommand)]
pub(crate) enum WpAction {
    /// Check that the configured credentials are accepted by the site.
    Check,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "blogmate=info",
        1 => "blogmate=debug",
        _ => "blogmate=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Title {
            title,
            blog_type,
            outline,
            keywords,
            output,
        } => {
            let mut request = TitleRequest::new(title, blog_type);
            request.outline = outline;
            request.keywords = keywords;
            cmd_title(request, &output).await
        }
        Command::Url {
            url,
            title,
            no_fetch,
            output,
        } => cmd_url(&url, title.as_deref(), no_fetch, &output).await,
        Command::Write {
            title,
            file,
            image,
            output,
        } => cmd_write(&title, &file, image, &output).await,
        Command::Scrape { url, json } => cmd_scrape(&url, json).await,
        Command::Wp { action } => match action {
            WpAction::Check => cmd_wp_check().await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load config and wire an orchestrator reporting to a terminal spinner.
fn orchestrator() -> Result<(Orchestrator, Arc<CliProgress>)> {
    let config = load_config()?;
    let session = Session::from_config(&config)?;
    let progress = Arc::new(CliProgress::new());
    let orchestrator = Orchestrator::with_progress(session, progress.clone());
    Ok((orchestrator, progress))
}

// ---------------------------------------------------------------------------
// Drafting commands
// ---------------------------------------------------------------------------

async fn cmd_title(request: TitleRequest, output: &Output) -> Result<()> {
    let (orchestrator, progress) = orchestrator()?;
    info!(title = %request.title, blog_type = %request.blog_type, "generating post from title");

    let outcome = orchestrator.generate_from_title(request).await;
    progress.clear();
    let draft = outcome?;

    deliver(&orchestrator, &progress, draft, output).await
}

async fn cmd_url(url: &str, title: Option<&str>, no_fetch: bool, output: &Output) -> Result<()> {
    let (orchestrator, progress) = orchestrator()?;
    info!(url, fetch = !no_fetch, "generating post from source");

    if !no_fetch {
        let fetched = orchestrator.fetch_source(url).await;
        progress.clear();
        let page = fetched?;
        if page.content.is_empty() {
            println!("  Note: no main content found on the page; generating from the URL only.");
        }
    }

    let title = match title {
        Some(t) => t.to_string(),
        None => orchestrator.draft().await.title,
    };
    if title.trim().is_empty() {
        return Err(eyre!("no title given and none found on the page; pass --title"));
    }

    let outcome = orchestrator.generate_from_url(url, &title).await;
    progress.clear();
    let draft = outcome?;

    deliver(&orchestrator, &progress, draft, output).await
}

async fn cmd_write(title: &str, file: &Path, image: bool, output: &Output) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("cannot read '{}'", file.display()))?;

    let (orchestrator, progress) = orchestrator()?;
    info!(title, file = %file.display(), image, "writing manual post");

    let mut draft = orchestrator.write_manual(title, &html).await?;
    if image {
        let outcome = orchestrator.generate_image(title).await;
        progress.clear();
        outcome?;
        draft = orchestrator.draft().await;
    }

    deliver(&orchestrator, &progress, draft, output).await
}

/// Print or save the ready draft, then publish it when asked.
async fn deliver(
    orchestrator: &Orchestrator,
    progress: &CliProgress,
    draft: Draft,
    output: &Output,
) -> Result<()> {
    print_draft(&draft);

    if let Some(path) = &output.out {
        std::fs::write(path, &draft.body)
            .wrap_err_with(|| format!("cannot write '{}'", path.display()))?;
        println!("  HTML:   {}", path.display());
    }

    if output.publish {
        let outcome = orchestrator.publish().await;
        progress.clear();
        let result = outcome?;
        print_published(&result);
    } else if output.out.is_none() {
        println!();
        println!("{}", draft.body);
    }

    println!();
    Ok(())
}

fn print_draft(draft: &Draft) {
    println!();
    println!("  Draft ready!");
    println!("  Title:  {}", draft.title);
    if let Some(source) = &draft.source_url {
        println!("  Source: {source}");
    }
    println!(
        "  Image:  {}",
        draft.image_url.as_deref().unwrap_or("(none)")
    );
    println!("  Length: {} chars of HTML", draft.body.chars().count());
}

fn print_published(result: &PublishResult) {
    println!();
    println!("  Published!");
    println!("  Post:   {}", result.post_id);
    println!("  URL:    {}", result.post_url);
    println!("  At:     {}", result.published_at.to_rfc3339());
}

// ---------------------------------------------------------------------------
// Utility commands
// ---------------------------------------------------------------------------

async fn cmd_scrape(url: &str, json: bool) -> Result<()> {
    let (orchestrator, progress) = orchestrator()?;

    let outcome = orchestrator.fetch_source(url).await;
    progress.clear();
    let page = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!();
    println!("  Title:       {}", page.title);
    println!("  Description: {}", page.description);
    println!("  Content:     {} chars", page.content.chars().count());
    println!();
    println!("{}", page.content);
    Ok(())
}

async fn cmd_wp_check() -> Result<()> {
    let config = load_config()?;
    let wordpress = config.wordpress_config()?;
    let session = Session::from_config(&config)?.with_wordpress(wordpress.clone());
    let orchestrator = Orchestrator::new(session);

    info!(site = %wordpress.site_url, user = %wordpress.username, "checking WordPress credentials");
    if orchestrator.validate_credentials().await {
        println!("WordPress credentials OK for {}", wordpress.site_url);
        Ok(())
    } else {
        Err(eyre!(
            "WordPress rejected the credentials for {} (or the site is unreachable)",
            wordpress.site_url
        ))
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

const SPINNER_TICK: std::time::Duration = std::time::Duration::from_millis(80);

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(spinner: ProgressBar) -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map(|s| s.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        Self { spinner }
    }

    /// Stop ticking between steps so printed output is not overdrawn.
    fn clear(&self) {
        self.spinner.disable_steady_tick();
        self.spinner.finish_and_clear();
        self.spinner.reset();
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        if stage.is_active() {
            self.spinner.enable_steady_tick(SPINNER_TICK);
        }
        self.spinner.set_message(format!("Draft {stage}"));
    }

    /// Restarts the tick; the image side action reports steps with no stage.
    fn step(&self, message: &str) {
        self.spinner.enable_steady_tick(SPINNER_TICK);
        self.spinner.set_message(message.to_string());
    }

    fn published(&self, _result: &PublishResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_without_stage_keeps_spinner_running() {
        let progress = CliProgress::with_bar(ProgressBar::hidden());

        progress.step("Generating featured image");

        assert_eq!(progress.spinner.message(), "Generating featured image");
        assert!(!progress.spinner.is_finished());
        progress.clear();
    }

    #[test]
    fn spinner_restarts_after_clear() {
        let progress = CliProgress::with_bar(ProgressBar::hidden());
        progress.stage(Stage::Generating);
        progress.clear();

        progress.step("Publishing to WordPress");

        assert_eq!(progress.spinner.message(), "Publishing to WordPress");
        assert!(!progress.spinner.is_finished());
        progress.clear();
    }
}
