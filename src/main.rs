// Instagram Manager - Main Entry Point
//
// Command-line front end for:
// - Credential setup and status
// - Posting images
// - Direct messages and comments
// - Profile and recent posts
// - The webhook receiver

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use instagram_manager::auth::{self, CredentialStatus};
use instagram_manager::config::{Config, LoggingConfig};
use instagram_manager::graph::{self, InstagramClient, MessengerClient};
use instagram_manager::logging;
use instagram_manager::webhooks::handlers::register_builtin_handlers;
use instagram_manager::webhooks::{shutdown_signal, WebhookServer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Instagram Manager: manage an Instagram business account from the terminal
#[derive(Parser, Debug)]
#[command(name = "instagram-manager")]
#[command(version)]
#[command(about = "Manage Instagram posts, comments and messages, and receive webhooks", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// Post an image to Instagram
    Post {
        /// Publicly accessible image URL
        #[arg(long)]
        image: String,

        /// Caption for the post
        #[arg(long)]
        caption: String,
    },
    /// Direct message commands
    Dm {
        #[command(subcommand)]
        action: DmCommand,
    },
    /// Comment management commands
    Comments {
        #[command(subcommand)]
        action: CommentsCommand,
    },
    /// Profile commands
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Post listing commands
    Posts {
        #[command(subcommand)]
        action: PostsCommand,
    },
    /// Start the webhook server
    Webhook {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Interactive authentication setup
    Setup,
    /// Check authentication status
    Status,
    /// Clear authentication data
    Clear,
}

#[derive(Subcommand, Debug)]
enum DmCommand {
    /// List direct message conversations
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Reply to a conversation
    Reply {
        /// Conversation id
        id: String,

        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CommentsCommand {
    /// List comments on a post
    List {
        post_id: String,

        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    /// Reply to a comment
    Reply {
        comment_id: String,

        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Show profile information
    Info,
}

#[derive(Subcommand, Debug)]
enum PostsCommand {
    /// List recent posts
    List {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let loaded = Config::load_from_path(&config_path);

    // Log with defaults if the config itself is broken, then report it
    let logging_config = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    logging::init_tracing(&logging_config, args.verbose)?;

    let config = loaded?;
    debug!(path = ?config_path, "Configuration loaded");

    match args.command {
        Some(Commands::Auth { action }) => run_auth(action, &config_path, &config)?,
        Some(Commands::Post { image, caption }) => {
            let (instagram, _) = clients(&config)?;
            println!("Creating media container and publishing...");
            let published = instagram
                .post_image(&image, &caption)
                .await
                .context("Error posting image")?;
            println!("✓ Media published successfully! ID: {}", published.id);
        }
        Some(Commands::Dm { action }) => run_dm(action, &config).await?,
        Some(Commands::Comments { action }) => run_comments(action, &config).await?,
        Some(Commands::Profile {
            action: ProfileCommand::Info,
        }) => {
            let (instagram, _) = clients(&config)?;
            let profile = instagram
                .profile_info()
                .await
                .context("Error fetching profile info")?;
            println!("\n👤 Profile Information\n");
            println!("Username:     @{}", profile.username.as_deref().unwrap_or("-"));
            println!("Account ID:   {}", profile.id);
            println!("Account Type: {}", profile.account_type.as_deref().unwrap_or("-"));
            println!("Followers:    {}", profile.followers_count.unwrap_or(0));
            println!("Posts:        {}", profile.media_count.unwrap_or(0));
            if let Some(bio) = profile.biography.as_deref().filter(|b| !b.is_empty()) {
                println!("Bio:          {}", bio);
            }
        }
        Some(Commands::Posts {
            action: PostsCommand::List { limit },
        }) => {
            let (instagram, _) = clients(&config)?;
            let posts = instagram
                .recent_posts(limit)
                .await
                .context("Error fetching posts")?;
            println!("\n📷 Recent Posts ({})\n", posts.data.len());
            for (index, post) in posts.data.iter().enumerate() {
                println!("#{} {} [{}]", index + 1, post.id, post.media_type.as_deref().unwrap_or("-"));
                if let Some(caption) = &post.caption {
                    println!("   {}", caption);
                }
                println!(
                    "   ❤ {}  💬 {}  {}",
                    post.like_count.unwrap_or(0),
                    post.comments_count.unwrap_or(0),
                    post.timestamp.as_deref().unwrap_or("")
                );
            }
        }
        Some(Commands::Webhook { port }) => run_webhook(config, port).await?,
        None => {
            info!("No command specified. Use \"instagram-manager --help\" for usage.");
        }
    }

    Ok(())
}

/// Graph clients for commands that need valid credentials
fn clients(config: &Config) -> Result<(InstagramClient, MessengerClient)> {
    config
        .credentials
        .validate()
        .context("Authentication error. Run \"instagram-manager auth setup\" first")?;
    graph::clients_from_config(config).context("Failed to build Graph API client")
}

fn run_auth(action: AuthCommand, path: &std::path::Path, config: &Config) -> Result<()> {
    match action {
        AuthCommand::Setup => {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            auth::setup(path, &mut input, &mut output).context("Error during setup")?;
        }
        AuthCommand::Status => match auth::status(config) {
            CredentialStatus::Missing => {
                println!("No configuration found. Run \"auth setup\" to get started.");
            }
            CredentialStatus::Valid => println!("✓ Authentication is valid and ready to use."),
            CredentialStatus::Invalid(e) => println!("✗ Authentication error: {}", e),
        },
        AuthCommand::Clear => {
            if auth::clear(path)? {
                println!("✓ Authentication cleared successfully.");
            } else {
                println!("Nothing to clear.");
            }
        }
    }
    Ok(())
}

async fn run_dm(action: DmCommand, config: &Config) -> Result<()> {
    let (_, messenger) = clients(config)?;
    match action {
        DmCommand::List { limit } => {
            let threads = messenger
                .list_direct_messages(limit)
                .await
                .context("Error fetching messages")?;

            println!("\n📬 Direct Messages ({} conversations)\n", threads.len());
            for (index, thread) in threads.iter().enumerate() {
                let conversation = &thread.conversation;
                println!("#{} Conversation ID: {}", index + 1, conversation.id);
                println!(
                    "   Last Activity: {}",
                    conversation.updated_time.as_deref().unwrap_or("-")
                );
                println!("   Unread: {}", conversation.unread_count.unwrap_or(0));
                if let Some(text) = thread.recent_messages.first().and_then(|m| m.message.as_deref()) {
                    println!("   Last Message: {}", text);
                }
                println!();
            }
            println!("Use \"dm reply <CONVERSATION_ID> <MESSAGE>\" to reply to a conversation.");
        }
        DmCommand::Reply { id, message } => {
            messenger
                .reply_to_message(&id, &message.join(" "))
                .await
                .context("Error sending reply")?;
            println!("✓ Reply sent successfully!");
        }
    }
    Ok(())
}

async fn run_comments(action: CommentsCommand, config: &Config) -> Result<()> {
    let (instagram, _) = clients(config)?;
    match action {
        CommentsCommand::List { post_id, limit } => {
            let comments = instagram
                .comments(&post_id, limit)
                .await
                .context("Error fetching comments")?;

            println!("\n💬 Comments ({})\n", comments.data.len());
            for (index, comment) in comments.data.iter().enumerate() {
                println!(
                    "#{} @{} ({})",
                    index + 1,
                    comment.username.as_deref().unwrap_or("unknown"),
                    comment.id
                );
                println!("   {}", comment.text.as_deref().unwrap_or(""));
                println!(
                    "   ❤ {}  {}",
                    comment.like_count.unwrap_or(0),
                    comment.timestamp.as_deref().unwrap_or("")
                );
                println!();
            }
            println!("Use \"comments reply <COMMENT_ID> <MESSAGE>\" to reply to a comment.");
        }
        CommentsCommand::Reply { comment_id, message } => {
            instagram
                .reply_to_comment(&comment_id, &message.join(" "))
                .await
                .context("Error replying to comment")?;
            println!("✓ Reply posted successfully!");
        }
    }
    Ok(())
}

async fn run_webhook(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.webhook.port = port;
    }
    let (instagram, messenger) = clients(&config)?;

    let server = WebhookServer::new(config.webhook_settings());
    register_builtin_handlers(
        &server,
        &config.webhook,
        &config.credentials.business_account_id,
        Arc::new(messenger),
        Arc::new(instagram),
    )
    .await;

    let listener = TcpListener::bind(("0.0.0.0", config.webhook.port))
        .await
        .with_context(|| format!("Failed to bind webhook server on port {}", config.webhook.port))?;

    server.serve(listener, shutdown_signal()).await
}
