/*
newsbot - answer questions about a news article from the command line.
The article is read once; each query is classified and routed to the matching backend.
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsbot::bootstrap;

#[derive(Parser, Debug)]
#[command(name = "newsbot", about = "Ask category, sentiment, entity, topic or summary questions about a news article")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Article to ask about
    #[arg(long, value_name = "FILE", required_unless_present = "intent_only")]
    article: Option<PathBuf>,

    /// Treat the article as HTML and convert it to text first
    #[arg(long)]
    html: bool,

    /// Print the detected intent instead of answering
    #[arg(long)]
    intent_only: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// The question; read one per line from stdin when omitted
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so answers on stdout stay clean
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = load_config(args.config.as_deref()).await?;

    let query = args.query.join(" ");

    if args.intent_only {
        let classifier = bootstrap::intent_classifier(&config)?;
        if query.trim().is_empty() {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                println!("{}", classifier.classify(&line));
            }
        } else {
            println!("{}", classifier.classify(&query));
        }
        return Ok(());
    }

    let article_path = args.article.context("--article is required to answer questions")?;
    let article = read_article(&article_path, args.html).await?;
    info!(path = ?article_path, chars = article.chars().count(), "article loaded");

    let router = match bootstrap::build_router(&config).await {
        Ok(router) => router,
        Err(e) => {
            error!("failed to build query router: {:#}", e);
            return Err(e);
        }
    };

    if query.trim().is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            println!("{}", router.route(&line, &article).await);
        }
    } else {
        println!("{}", router.route(&query, &article).await);
    }

    Ok(())
}

/// `config.default.toml` merged with `--config` (or `config.toml` when present).
async fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = match explicit {
        Some(p) => {
            if !p.exists() {
                error!(path = ?p, "specified config file not found");
                anyhow::bail!("Config file not found: {}", p.display());
            }
            Some(p.to_path_buf())
        }
        None => {
            let p = PathBuf::from("config.toml");
            if p.exists() {
                Some(p)
            } else {
                None
            }
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    info!(default_file = ?default_path, override_file = ?override_path, "configuration loaded");
    Ok(config)
}

async fn read_article(path: &Path, html: bool) -> Result<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read article: {}", path.display()))?;
    if html {
        html2text::from_read(raw.as_bytes(), 80).context("Failed to convert HTML article to text")
    } else {
        Ok(raw)
    }
}
