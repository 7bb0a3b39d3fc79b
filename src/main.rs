use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;

use babelfeed::config::Config;
use babelfeed::feed::{add_feed, import_feeds, opml, refresh_all, refresh_feed, OpmlFeed};
use babelfeed::storage::{Database, DatabaseError, Settings, SettingsUpdate, DEFAULT_CATEGORY};
use babelfeed::translate::{detect_language, ProviderRegistry, Translator};
use babelfeed::util::strip_tags;

/// Get the config directory path (~/.config/babelfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("babelfeed");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "babelfeed", about = "RSS reader with on-demand article translation")]
struct Cli {
    /// Database file to use instead of the default under ~/.config/babelfeed/
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed URL
    Add {
        url: String,
        /// Category to file the feed under
        #[arg(long)]
        category: Option<String>,
    },
    /// List subscribed feeds with unread counts
    List,
    /// List articles in a feed, or recent articles across all feeds
    Articles {
        feed_id: Option<i64>,
        /// Maximum number of articles to show
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print an article
    Show { article_id: i64 },
    /// Refresh one feed, or all feeds when no id is given
    Refresh { feed_id: Option<i64> },
    /// Mark an article as read
    Read { article_id: i64 },
    /// Mark every article in a feed as read
    ReadAll { feed_id: i64 },
    /// Toggle an article's star
    Star { article_id: i64 },
    /// Delete a single article
    DeleteArticle { article_id: i64 },
    /// Unsubscribe from a feed and delete its articles
    DeleteFeed { feed_id: i64 },
    /// Translate an article into a target language
    Translate {
        article_id: i64,
        /// Target language (defaults to the configured target language)
        #[arg(long)]
        lang: Option<String>,
        /// Translation backend (defaults to the configured provider)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Guess the dominant script of an article's text
    Detect { article_id: i64 },
    /// Delete old unstarred articles
    Prune {
        /// Age threshold in days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Import subscriptions from an OPML file
    Import { path: PathBuf },
    /// Export subscriptions to an OPML file
    Export { path: PathBuf },
    /// Show stored settings, or change them with flags
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
struct SettingsArgs {
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    font_size: Option<i64>,
    /// Translation backend name (openai, deepl, google)
    #[arg(long)]
    provider: Option<String>,
    /// Credential for the translation backend
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    auto_mark_read: Option<bool>,
    /// Feed refresh interval in minutes
    #[arg(long)]
    refresh_interval: Option<i64>,
    /// Default target language for translations
    #[arg(long)]
    target_language: Option<String>,
}

impl SettingsArgs {
    fn into_update(self) -> SettingsUpdate {
        SettingsUpdate {
            theme: self.theme,
            font_size: self.font_size,
            provider: self.provider,
            api_key: self.api_key,
            auto_mark_read: self.auto_mark_read,
            refresh_interval: self.refresh_interval,
            target_language: self.target_language,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access: the directory holds the database, and the database
    // holds the provider credential
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml"))?;

    // Open database
    let db_path = cli
        .database
        .unwrap_or_else(|| config_dir.join("babelfeed.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of babelfeed appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    // Config values apply only when the settings row does not exist yet;
    // after first run the database copy is authoritative
    db.seed_settings(&config.as_settings_seed())
        .await
        .context("Failed to initialize settings")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("babelfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    run(cli.command, &db, &client, &config).await
}

async fn run(
    command: Command,
    db: &Database,
    client: &reqwest::Client,
    config: &Config,
) -> Result<()> {
    match command {
        Command::Add { url, category } => {
            let category = category.as_deref().unwrap_or(DEFAULT_CATEGORY);
            let feed = add_feed(db, client, &url, category).await?;
            println!(
                "Subscribed to \"{}\" ({} articles)",
                feed.title, feed.unread_count
            );
        }
        Command::List => {
            let feeds = db.get_feeds().await?;
            if feeds.is_empty() {
                println!("No feeds. Subscribe with: babelfeed add <URL>");
                return Ok(());
            }
            for feed in &feeds {
                println!(
                    "{:>5}  {:>4} unread  {}  [{}]",
                    feed.id, feed.unread_count, feed.title, feed.category
                );
            }
        }
        Command::Articles { feed_id, limit } => {
            let articles = match feed_id {
                Some(feed_id) => {
                    let feed = db
                        .get_feed(feed_id)
                        .await?
                        .with_context(|| format!("No feed with id {}", feed_id))?;
                    let articles = db.get_articles_for_feed(feed_id, limit).await?;
                    println!("{} ({} articles)", feed.title, articles.len());
                    articles
                }
                None => db.get_recent_articles(limit.unwrap_or(50)).await?,
            };
            for article in &articles {
                let unread = if article.read { ' ' } else { '*' };
                let star = if article.starred { '★' } else { ' ' };
                println!(
                    "{:>5}  {}{} {}  {}",
                    article.id,
                    unread,
                    star,
                    format_date(article.published),
                    article.title
                );
            }
        }
        Command::Show { article_id } => {
            show_article(db, article_id).await?;
        }
        Command::Refresh { feed_id } => match feed_id {
            Some(feed_id) => {
                let feed = db
                    .get_feed(feed_id)
                    .await?
                    .with_context(|| format!("No feed with id {}", feed_id))?;
                let new_articles = refresh_feed(db, client, &feed).await;
                println!("{}: {} new articles", feed.title, new_articles);
            }
            None => {
                let outcomes = refresh_all(db, client).await?;
                if outcomes.is_empty() {
                    println!("No feeds to refresh.");
                    return Ok(());
                }
                let mut total = 0;
                for outcome in &outcomes {
                    if outcome.new_articles > 0 {
                        println!("{}: {} new articles", outcome.title, outcome.new_articles);
                    }
                    total += outcome.new_articles;
                }
                println!("Refreshed {} feeds, {} new articles", outcomes.len(), total);
            }
        },
        Command::Read { article_id } => {
            // mark_article_read is a no-op on an already-read article, so
            // existence has to be checked separately
            if db.get_article(article_id).await?.is_none() {
                bail!("No article with id {}", article_id);
            }
            db.mark_article_read(article_id).await?;
            println!("Marked article {} read", article_id);
        }
        Command::ReadAll { feed_id } => {
            let marked = db.mark_all_read(feed_id).await?;
            println!("Marked {} articles read", marked);
        }
        Command::Star { article_id } => match db.toggle_article_starred(article_id).await? {
            Some(true) => println!("Starred article {}", article_id),
            Some(false) => println!("Unstarred article {}", article_id),
            None => bail!("No article with id {}", article_id),
        },
        Command::DeleteArticle { article_id } => {
            if !db.delete_article(article_id).await? {
                bail!("No article with id {}", article_id);
            }
            println!("Deleted article {}", article_id);
        }
        Command::DeleteFeed { feed_id } => {
            if !db.delete_feed(feed_id).await? {
                bail!("No feed with id {}", feed_id);
            }
            println!("Deleted feed {} and its articles", feed_id);
        }
        Command::Translate {
            article_id,
            lang,
            provider,
        } => {
            translate_article(db, client, article_id, lang, provider).await?;
        }
        Command::Detect { article_id } => {
            let article = db
                .get_article(article_id)
                .await?
                .with_context(|| format!("No article with id {}", article_id))?;
            let source = if article.content.trim().is_empty() {
                &article.summary
            } else {
                &article.content
            };
            println!("{}", detect_language(source));
        }
        Command::Prune { days } => {
            let days = days.unwrap_or(config.retention_days);
            let removed = db.prune_articles(days).await?;
            println!(
                "Removed {} unstarred articles older than {} days",
                removed, days
            );
        }
        Command::Import { path } => {
            // Resolve symlinks before reading, and refuse anything that is
            // not a regular file
            let canonical = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve import file: {}", path.display()))?;
            let metadata = std::fs::metadata(&canonical)?;
            if !metadata.is_file() {
                bail!("Import path must be a regular file");
            }
            let path_str = canonical
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in import path"))?;
            let entries = opml::parse(path_str)
                .await
                .context("Failed to parse OPML file")?;
            if entries.is_empty() {
                bail!("No valid feeds found in OPML file");
            }
            let outcome = import_feeds(db, &entries).await?;
            println!(
                "Imported {} feeds ({} already subscribed)",
                outcome.imported, outcome.skipped
            );
        }
        Command::Export { path } => {
            let feeds = db.get_feeds().await?;
            if feeds.is_empty() {
                bail!("No feeds to export");
            }
            let entries: Vec<OpmlFeed> = feeds.iter().map(OpmlFeed::from).collect();
            opml::export_to_file(&entries, &path)?;
            println!("Exported {} feeds to {}", entries.len(), path.display());
        }
        Command::Settings(args) => {
            let update = args.into_update();
            if update.is_empty() {
                print_settings(&db.get_settings().await?);
            } else {
                db.update_settings(&update).await?;
                println!("Settings updated.");
            }
        }
    }

    Ok(())
}

async fn show_article(db: &Database, article_id: i64) -> Result<()> {
    let settings = db.get_settings().await?;
    let article = db
        .get_article(article_id)
        .await?
        .with_context(|| format!("No article with id {}", article_id))?;

    println!("{}", article.title);
    if let Some(author) = &article.author {
        println!("By {}", author);
    }
    println!("Published: {}", format_date(article.published));
    if !article.link.is_empty() {
        println!("Link: {}", article.link);
    }
    println!();

    let body = if article.content.trim().is_empty() {
        &article.summary
    } else {
        &article.content
    };
    println!("{}", strip_tags(body));

    let translations = db.list_translations(article_id).await?;
    if !translations.is_empty() {
        let langs: Vec<&str> = translations
            .iter()
            .map(|t| t.target_lang.as_str())
            .collect();
        println!();
        println!("Cached translations: {}", langs.join(", "));
    }

    if settings.auto_mark_read && !article.read {
        db.mark_article_read(article_id).await?;
    }

    Ok(())
}

async fn translate_article(
    db: &Database,
    client: &reqwest::Client,
    article_id: i64,
    lang: Option<String>,
    provider: Option<String>,
) -> Result<()> {
    let settings = db.get_settings().await?;
    let lang = lang.unwrap_or_else(|| settings.target_language.clone());
    let provider = provider.unwrap_or_else(|| settings.provider.clone());

    if settings.api_key.is_empty() {
        bail!(
            "No API key configured for translation. Set one with: babelfeed settings --api-key <KEY>"
        );
    }
    let credential = SecretString::from(settings.api_key);

    let translator = Translator::new(
        db.clone(),
        client.clone(),
        ProviderRegistry::with_default_providers(),
    );
    let translated = translator
        .translate_article(article_id, &lang, &provider, &credential)
        .await?;
    println!("{}", translated);

    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("theme             {}", settings.theme);
    println!("font_size         {}", settings.font_size);
    println!("provider          {}", settings.provider);
    // The credential itself is never printed
    let key_state = if settings.api_key.is_empty() {
        "(not set)"
    } else {
        "(set)"
    };
    println!("api_key           {}", key_state);
    println!("auto_mark_read    {}", settings.auto_mark_read);
    println!("refresh_interval  {} minutes", settings.refresh_interval);
    println!("target_language   {}", settings.target_language);
}

fn format_date(unix_seconds: i64) -> String {
    chrono::DateTime::from_timestamp(unix_seconds, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| unix_seconds.to_string())
}
