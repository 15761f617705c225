use anyhow::{Context, Result};
use chatter::api::{FeedService, HttpFeedService};
use chatter::config::Config;
use chatter::feed::{Confirm, FeedEvent, FeedViewModel, NotificationKind};
use chatter::model::SortOrder;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

mod render;

/// Get the config file path (~/.config/chatter/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("chatter")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "chatter", about = "Read and post to a record's chatter feed")]
struct Args {
    /// Config file (defaults to ~/.config/chatter/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Record whose feed to use (overrides record_id in config)
    #[arg(long, global = true)]
    record: Option<String>,

    /// Sort order: latest or oldest
    #[arg(long, global = true)]
    sort: Option<SortOrder>,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,

    /// Only show posts whose text or author contains this
    #[arg(long, global = true)]
    search: Option<String>,

    /// Print the feed as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a page of the feed
    List {
        /// Token printed after a previous listing
        #[arg(long)]
        page_token: Option<String>,
    },
    /// Publish a post. Mention users with @[id:name] (see `users`)
    Post { text: String },
    /// Comment on a post
    Comment { feed_element_id: String, text: String },
    /// Like a post
    Like { feed_element_id: String },
    /// Remove your like from a post
    Unlike { feed_element_id: String },
    /// Replace the text of a post
    EditPost { feed_element_id: String, text: String },
    /// Delete a post
    DeletePost { feed_element_id: String },
    /// Replace the text of a comment
    EditComment {
        feed_element_id: String,
        comment_id: String,
        text: String,
    },
    /// Delete a comment
    DeleteComment { comment_id: String },
    /// Find users to mention
    Users { term: String },
}

/// Confirmation prompt on stderr, answered on stdin.
struct TerminalConfirm {
    assume_yes: bool,
}

impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            eprint!("{prompt} [y/N] ");
            let _ = std::io::stderr().flush();
            let mut answer = String::new();
            if std::io::stdin().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}

type Vm = FeedViewModel<HttpFeedService, TerminalConfirm>;

/// Apply events until every spawned call has reported back.
async fn drain<S: FeedService, C: Confirm>(
    vm: &mut FeedViewModel<S, C>,
    rx: &mut mpsc::Receiver<FeedEvent>,
) {
    while !vm.is_idle() {
        match rx.recv().await {
            Some(event) => vm.handle_event(event),
            None => break,
        }
    }
}

async fn load(vm: &mut Vm, rx: &mut mpsc::Receiver<FeedEvent>, page_token: Option<String>) -> Result<()> {
    vm.load_feed(page_token);
    drain(vm, rx).await;
    match vm.error() {
        Some(e) => anyhow::bail!("Failed to load feed: {}", e),
        None => Ok(()),
    }
}

fn post_liked(vm: &Vm, feed_element_id: &str) -> Result<bool> {
    vm.items()
        .iter()
        .find(|e| e.id == feed_element_id)
        .map(|e| e.is_liked())
        .with_context(|| format!("Post {} is not on the first page of the feed", feed_element_id))
}

/// Issue the intent for `command`. Returns false if nothing was sent.
async fn run_command(vm: &mut Vm, rx: &mut mpsc::Receiver<FeedEvent>, command: Command) -> Result<bool> {
    let page_token = match &command {
        Command::List { page_token } => page_token.clone(),
        _ => None,
    };
    load(vm, rx, page_token).await?;

    let sent = match command {
        Command::List { .. } => return Ok(true),
        Command::Users { .. } => false,
        Command::Post { text } => {
            let cursor = text.chars().count();
            vm.update_post_text(text, cursor);
            vm.submit_post().is_ok()
        }
        Command::Comment {
            feed_element_id,
            text,
        } => {
            vm.set_comment_draft(&feed_element_id, text);
            vm.submit_comment(&feed_element_id).is_ok()
        }
        Command::Like { feed_element_id } => {
            if post_liked(vm, &feed_element_id)? {
                println!("Already liked.");
                false
            } else {
                vm.toggle_like(&feed_element_id, false)
            }
        }
        Command::Unlike { feed_element_id } => {
            if post_liked(vm, &feed_element_id)? {
                vm.toggle_like(&feed_element_id, true)
            } else {
                println!("Not liked.");
                false
            }
        }
        Command::EditPost {
            feed_element_id,
            text,
        } => {
            post_liked(vm, &feed_element_id)?;
            vm.begin_edit_post(&feed_element_id);
            vm.set_post_edit_text(&feed_element_id, text);
            vm.save_post_edit(&feed_element_id).is_ok()
        }
        Command::DeletePost { feed_element_id } => vm.delete_post(&feed_element_id).await,
        Command::EditComment {
            feed_element_id,
            comment_id,
            text,
        } => {
            if !vm.begin_edit_comment(&feed_element_id, &comment_id) {
                anyhow::bail!(
                    "Comment {} is not on post {} in the first page of the feed",
                    comment_id,
                    feed_element_id
                );
            }
            vm.set_comment_edit_text(&feed_element_id, &comment_id, text);
            vm.save_comment_edit(&feed_element_id, &comment_id).is_ok()
        }
        Command::DeleteComment { comment_id } => vm.delete_comment(&comment_id).await,
    };

    drain(vm, rx).await;
    Ok(sent)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(?config, "Configuration resolved");

    let record_id = args
        .record
        .clone()
        .or_else(|| config.record_id.clone())
        .context("No record to show: pass --record or set record_id in the config file")?;
    let mut settings = config.feed_settings(record_id);
    if let Some(sort) = args.sort {
        settings.sort = sort;
    }

    let client = reqwest::Client::builder()
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let service = HttpFeedService::new(
        client,
        &config.base_url,
        config.api_token(),
        config.request_timeout(),
    )
    .with_context(|| format!("Invalid base_url '{}'", config.base_url))?;

    let (event_tx, mut event_rx) = mpsc::channel::<FeedEvent>(32);
    let mut vm = FeedViewModel::new(
        Arc::new(service),
        TerminalConfirm {
            assume_yes: args.yes,
        },
        settings,
        event_tx,
    );
    if let Some(term) = &args.search {
        vm.set_search_term(term.clone());
    }

    let width = render::terminal_width();

    if let Command::Users { term } = &args.command {
        let text = format!("@{}", term.trim_start_matches('@'));
        let cursor = text.chars().count();
        vm.update_post_text(text, cursor);
        drain(&mut vm, &mut event_rx).await;
        let users = &vm.mention().suggestions;
        if args.json {
            println!("{}", serde_json::to_string_pretty(users)?);
        } else {
            print!("{}", render::render_users(users, width));
        }
        return Ok(());
    }

    if !run_command(&mut vm, &mut event_rx, args.command).await? {
        tracing::debug!("Command sent no request");
    }

    let view = vm.view(chrono::Utc::now());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render::render_feed(&view, width));
        if let Some(token) = vm.next_page_token() {
            println!();
            println!("More posts: chatter list --page-token {}", token);
        }
    }

    if let Some(notification) = vm.notification() {
        eprintln!("{}", render::render_notification(notification));
        if notification.kind == NotificationKind::Error {
            std::process::exit(1);
        }
    }

    Ok(())
}
