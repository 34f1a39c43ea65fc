mod chat_cmd;
mod client;
mod config;
mod output;
mod render_cmd;
mod session_cmd;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use mdchat_config::MdChatConfig;
use mdchat_core::JsonSessionStore;
use mdchat_gateway::{build_provider, parser_strategy, start_server, GatewayState};
use mdchat_markdown::{ParserStrategy, RenderPipeline};

use chat_cmd::{ChatOptions, ReplySource};
use client::GatewayClient;
use render_cmd::RenderOptions;
use session_cmd::HistoryOptions;

#[derive(Parser)]
#[command(name = "mdchat")]
#[command(about = "mdchat: chat with a completion model and render its Markdown safely")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $MDCHAT_CONFIG_DIR/config.yaml or ~/.mdchat/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Render Markdown from a file or stdin to sanitized HTML
    Render {
        /// Read from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Use the fallback parser
        #[arg(long)]
        fallback: bool,
        /// Treat the input as user text (escape only)
        #[arg(long)]
        user: bool,
        /// Apply the post-render enhancer
        #[arg(long)]
        enhance: bool,
        /// Print the parsed block stream as JSON
        #[arg(long)]
        blocks: bool,
    },
    /// Send a message in the current chat
    Chat {
        message: String,
        /// Go through the configured gateway instead of calling the provider
        #[arg(long)]
        server: bool,
        /// Gateway base URL (implies --server)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
        /// Print the reply as it streams in
        #[arg(long)]
        stream: bool,
        /// Start a new chat first
        #[arg(long)]
        new: bool,
        /// Print the rendered HTML instead of the reply text
        #[arg(long)]
        html: bool,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// List local chats, or show, select or delete one
    History {
        /// Print the current chat's transcript
        #[arg(long)]
        show: bool,
        #[arg(long, value_name = "ID")]
        select: Option<Uuid>,
        #[arg(long, value_name = "ID")]
        delete: Option<Uuid>,
    },
    /// Toggle between the light and dark theme
    Theme,
    /// Check whether a gateway is running
    Status {
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref()).await?;

    let logging = config.logging();
    mdchat_logging::init_logger(
        logging.level.as_deref().unwrap_or("info"),
        logging.dir.as_deref().map(Path::new),
        logging.json.unwrap_or(false),
    );

    if let Err(e) = dispatch(cli.command, &config).await {
        output::note_error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(command: Commands, config: &MdChatConfig) -> Result<()> {
    match command {
        Commands::Serve { port } => run_server(config, port).await,
        Commands::Render {
            file,
            fallback,
            user,
            enhance,
            blocks,
        } => {
            let strategy = if fallback {
                ParserStrategy::Fallback
            } else {
                parser_strategy(&config.render())
            };
            render_cmd::run(&RenderOptions {
                file,
                strategy,
                user,
                enhance,
                blocks,
            })
            .await
        }
        Commands::Chat {
            message,
            server,
            url,
            stream,
            new,
            html,
            max_tokens,
        } => {
            let source = match url {
                Some(url) => ReplySource::Gateway(GatewayClient::new(url)),
                None if server => ReplySource::Gateway(GatewayClient::new(config::gateway_url(config)?)),
                None => ReplySource::Provider(build_provider(&config.provider())?),
            };
            let store = JsonSessionStore::new(config::session_path(config));
            let pipeline = RenderPipeline::new(parser_strategy(&config.render()));
            let options = ChatOptions {
                stream,
                html,
                max_tokens,
            };
            chat_cmd::run(&store, &source, pipeline, message, new, &options).await
        }
        Commands::History {
            show,
            select,
            delete,
        } => {
            let store = JsonSessionStore::new(config::session_path(config));
            let options = HistoryOptions {
                show,
                select,
                delete,
            };
            session_cmd::history(&store, &options).await.map(|_| ())
        }
        Commands::Theme => {
            let store = JsonSessionStore::new(config::session_path(config));
            session_cmd::toggle_theme(&store).await.map(|_| ())
        }
        Commands::Status { url } => {
            let url = match url {
                Some(url) => url,
                None => config::gateway_url(config)?,
            };
            let client = GatewayClient::new(url);
            match client.health().await {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(_) => output::note_info(&format!(
                    "mdchat gateway is not running at {}",
                    client.base_url()
                )),
            }
            Ok(())
        }
    }
}

async fn run_server(config: &MdChatConfig, port: Option<u16>) -> Result<()> {
    let addr = config::listen_addr(config, port)?;
    let state = GatewayState::from_config(config).await?;
    info!(
        %addr,
        provider = state.provider.name(),
        parser = ?state.pipeline.strategy(),
        enhance = state.enhance,
        "Starting mdchat gateway"
    );
    start_server(addr, state).await
}
