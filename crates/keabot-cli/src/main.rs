//! Terminal front end for the KeaBot agent backend.

mod observability;
mod render;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use keabot_client::prelude::*;
use tracing::{debug, info};

use crate::render::{ApprovalPolicy, Approver, Printer};

#[derive(Parser, Debug)]
#[command(name = "keabot", version, about = "Chat with the KeaBot agent from a terminal")]
struct Cli {
    /// Backend base URL.
    #[arg(long, global = true, env = "KEABOT_API_URL")]
    api_url: Option<String>,

    /// Default log level when neither KEABOT_LOG_LEVEL nor RUST_LOG is set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message and stream the agent's reply.
    Chat {
        message: String,
        /// Continue an existing session.
        #[arg(long)]
        session_id: Option<String>,
        /// LLM provider (gemini, openai).
        #[arg(long)]
        provider: Option<String>,
        /// Print every event as a JSON line instead of rendering it.
        #[arg(long)]
        json: bool,
        /// How to answer approval requests.
        #[arg(long, value_enum, default_value_t = ApprovalPolicy::Ask)]
        approve: ApprovalPolicy,
    },
    /// Send a message and wait for the whole reply.
    Send {
        message: String,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long)]
        provider: Option<String>,
    },
    /// Approve a pending tool call.
    Approve { approval_id: String },
    /// Reject a pending tool call.
    Reject { approval_id: String },
    /// List recent sessions.
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one session.
    Session { session_id: String },
    /// Show backend settings.
    Settings,
    /// Check backend health.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    observability::init_observability(&cli.log_level);

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.base_url(url);
    }
    let client = KeabotClient::new(config)?;
    debug!(base_url = %client.config().base_url, "client ready");

    match cli.command {
        Command::Chat {
            message,
            session_id,
            provider,
            json,
            approve,
        } => {
            let request = build_request(message, session_id, provider);
            chat(&client, request, json, approve).await
        }
        Command::Send {
            message,
            session_id,
            provider,
        } => {
            let request = build_request(message, session_id, provider);
            let reply = client.chat(request).await?;
            println!("{}", reply.content);
            eprintln!("session: {}", reply.session_id);
            Ok(())
        }
        Command::Approve { approval_id } => {
            client.approvals().approve(&approval_id).await?;
            eprintln!("approved {approval_id}");
            Ok(())
        }
        Command::Reject { approval_id } => {
            client.approvals().reject(&approval_id).await?;
            eprintln!("rejected {approval_id}");
            Ok(())
        }
        Command::Sessions { limit } => {
            print_json(&client.sessions(limit).await?)
        }
        Command::Session { session_id } => print_json(&client.session(&session_id).await?),
        Command::Settings => print_json(&client.settings().await?),
        Command::Health => print_json(&client.health().await?),
    }
}

fn build_request(message: String, session_id: Option<String>, provider: Option<String>) -> ChatRequest {
    let mut request = ChatRequest::new(message);
    request.session_id = session_id;
    request.provider = provider;
    request
}

async fn chat(
    client: &KeabotClient,
    request: ChatRequest,
    json: bool,
    policy: ApprovalPolicy,
) -> anyhow::Result<()> {
    let stream = client.stream_chat(request).await?;
    let abort = stream.abort_handle();
    let stream_id = stream.stream_id();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(%stream_id, "interrupted, cancelling stream");
            abort.abort();
        }
    });

    let approver = Approver::new(client.approvals(), policy);
    let (result, approver) = if json {
        let mut stream = stream;
        let mut approver = approver;
        while let Some(event) = stream.next_event().await {
            println!("{}", serde_json::to_string(&event)?);
            event.dispatch(&mut approver);
        }
        (stream.finish().await, approver)
    } else {
        let mut printer = Printer::new(approver);
        let result = stream.drive(&mut printer).await;
        println!();
        (result, printer.into_approver())
    };
    for approval_id in approver.settle().await {
        eprintln!(
            "approval {approval_id} left unanswered; resolve it with `keabot approve {approval_id}` or `keabot reject {approval_id}`"
        );
    }

    match result {
        Ok(summary) => {
            if json {
                println!("{}", serde_json::to_string(&summary)?);
            } else if let Some(session_id) = summary.session_id() {
                eprintln!("session: {session_id}");
            }
            match summary.error {
                Some(message) => anyhow::bail!("agent stream failed: {message}"),
                None => Ok(()),
            }
        }
        Err(ClientError::Cancelled) => {
            eprintln!("cancelled");
            Ok(())
        }
        Err(err) => Err(err).context("agent stream ended abnormally"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
