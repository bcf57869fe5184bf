use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use calchat_core::types::CalendarAction;

mod session;

use session::ChatSession;

#[derive(Parser)]
#[command(
    name = "calchat",
    version,
    about = "CalChat CLI — talk to the calendar assistant from the terminal"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "CALCHAT_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session with confirmation prompts
    Chat,
    /// Send a single message and print the raw response
    Send {
        /// The message to send
        message: String,
        /// Continuation token from a previous response
        #[arg(long)]
        previous_response_id: Option<String>,
    },
    /// Check API and calendar-broker health
    Health,
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn exit_error(message: &str) -> ! {
    let err = json!({
        "error": "cli_error",
        "message": message
    });
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat => chat(&cli.api_url).await,
        Commands::Send {
            message,
            previous_response_id,
        } => send(&cli.api_url, &message, previous_response_id.as_deref())
            .await
            .map(|body| println!("{}", serde_json::to_string_pretty(&body).unwrap())),
        Commands::Health => health(&cli.api_url).await,
    };

    if let Err(err) = result {
        exit_error(&err);
    }
}

async fn health(api_url: &str) -> Result<(), String> {
    let service: Value = get_json(&format!("{api_url}/health")).await?;
    let confirmation: Value = get_json(&format!("{api_url}/api/calendar/confirm")).await?;

    let combined = json!({
        "service": service,
        "confirmation": confirmation
    });
    println!("{}", serde_json::to_string_pretty(&combined).unwrap());
    Ok(())
}

async fn send(
    api_url: &str,
    message: &str,
    previous_response_id: Option<&str>,
) -> Result<Value, String> {
    let mut body = json!({ "message": message });
    if let Some(prev) = previous_response_id {
        body["previousResponseId"] = json!(prev);
    }

    let resp = client()
        .post(format!("{api_url}/api/chat"))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Connection failed: {e}. Is the API server running?"))?;

    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .map_err(|e| format!("Invalid response: {e}"))?;

    if !status.is_success() {
        let message = body["message"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .unwrap_or("Request failed");
        return Err(message.to_string());
    }
    Ok(body)
}

async fn confirm(api_url: &str, action: &CalendarAction, accept: bool) -> Result<Value, String> {
    let body = json!({
        "confirmationId": action.confirmation_id,
        "action": if accept { "accept" } else { "reject" },
        "calendarAction": action
    });

    let resp = client()
        .post(format!("{api_url}/api/calendar/confirm"))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Connection failed: {e}"))?;

    resp.json()
        .await
        .map_err(|e| format!("Invalid response: {e}"))
}

async fn chat(api_url: &str) -> Result<(), String> {
    let mut session = ChatSession::new();
    let stdin = std::io::stdin();

    println!("CalChat — type a message, or \"exit\" to quit.");

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| e.to_string())?
            == 0
        {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        if let Err(reason) = session.record_user(input) {
            println!("{reason}");
            continue;
        }

        match send(api_url, input, session.previous_response_id()).await {
            Ok(body) => {
                let id = body["id"].as_str().unwrap_or_default().to_string();
                let message = body["message"].as_str().unwrap_or_default().to_string();
                let action: Option<CalendarAction> = body["requiresConfirmation"]
                    .as_bool()
                    .unwrap_or(false)
                    .then(|| serde_json::from_value(body["calendarAction"].clone()).ok())
                    .flatten();

                println!("{message}");
                session.record_assistant(&id, &message, action);
            }
            Err(reason) => {
                println!("{reason}");
                session.record_error(&reason);
                continue;
            }
        }

        // At most one pending action per session: resolve it before
        // accepting further input.
        if let Some(action) = session.take_pending() {
            describe_action(&action);
            print!("Apply this change? [y/N] ");
            std::io::stdout().flush().ok();

            let mut answer = String::new();
            stdin
                .lock()
                .read_line(&mut answer)
                .map_err(|e| e.to_string())?;
            let accept = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");

            match confirm(api_url, &action, accept).await {
                Ok(result) => {
                    println!("{}", result["message"].as_str().unwrap_or("Done"));
                }
                Err(reason) => {
                    println!("{reason}");
                    session.record_error(&reason);
                }
            }
        }
    }

    Ok(())
}

fn describe_action(action: &CalendarAction) {
    println!("--- proposed calendar action ---");
    println!("  type:  {:?}", action.action_type);
    println!("  title: {}", action.event.title);
    if let Some(start) = &action.event.start_time {
        println!("  start: {start}");
    }
    if let Some(end) = &action.event.end_time {
        println!("  end:   {end}");
    }
    if let Some(location) = &action.event.location {
        println!("  where: {location}");
    }
    println!("--------------------------------");
}

async fn get_json(url: &str) -> Result<Value, String> {
    let resp = client()
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Connection failed: {e}. Is the API server running?"))?;
    resp.json()
        .await
        .map_err(|e| format!("Invalid response: {e}"))
}
