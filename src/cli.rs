// src/cli.rs
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;

use crate::core::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::web::start_web_server;

#[derive(Parser)]
#[command(name = "profile-matcher")]
#[command(about = "Extract career criteria from a profile and find similar professionals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP worker (default)
    Serve {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Crawl one profile and print its points of interest
    Analyze { url: String },
    /// Search for professionals matching a goal and three points
    Match {
        #[arg(long)]
        goal: String,
        /// `description[:type]`, repeat three times
        #[arg(long = "point", required = true)]
        points: Vec<String>,
    },
}

/// Split `description[:type]`. A suffix only counts as a type when it is a single
/// alphabetic word.
fn point_argument(raw: &str) -> Value {
    match raw.rsplit_once(':') {
        Some((description, kind))
            if !kind.trim().is_empty() && kind.trim().chars().all(char::is_alphabetic) =>
        {
            json!({"description": description.trim(), "type": kind.trim()})
        }
        _ => json!({"description": raw.trim()}),
    }
}

impl Command {
    fn request_body(&self) -> Option<Value> {
        match self {
            Self::Serve { .. } => None,
            Self::Analyze { url } => Some(json!({"mode": "analyze", "linkedinUrl": url})),
            Self::Match { goal, points } => Some(json!({
                "mode": "match",
                "careerGoal": goal,
                "selectedPoints": points.iter().map(|p| point_argument(p)).collect::<Vec<_>>(),
            })),
        }
    }
}

pub async fn handle_command(cli: Cli, mut config: AppConfig) -> Result<()> {
    let command = cli.command.unwrap_or(Command::Serve { port: None });

    let body = match command.request_body() {
        Some(body) => body,
        None => {
            if let Command::Serve { port: Some(port) } = command {
                config.server.port = port;
            }
            return start_web_server(config).await;
        }
    };

    let dispatcher = Dispatcher::from_config(&config)?;
    let response = dispatcher.dispatch(&body.to_string()).await?;
    info!("One-shot request finished");
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
