use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Smoke-check client for a running card gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Log in and print the backend's answer
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Fetch a public card
    Card {
        #[arg(long)]
        company: String,
        #[arg(long)]
        employee: String,
    },
    /// Download a card's QR image
    Qr {
        #[arg(long)]
        company: String,
        #[arg(long)]
        employee: String,
        #[arg(short, long, default_value = "qr.png")]
        out: PathBuf,
    },
    /// GET a backend path through the generic proxy
    Get {
        #[arg(long)]
        path: String,
        /// Bearer token to send as Authorization
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/healthz", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{}/api/auth/login", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Card { company, employee } => {
            let res = client
                .get(format!("{}/api/card", cli.url))
                .query(&[("company_slug", &company), ("employee_slug", &employee)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Qr {
            company,
            employee,
            out,
        } => {
            let res = client
                .get(format!("{}/api/qrcode", cli.url))
                .query(&[("company_slug", &company), ("employee_slug", &employee)])
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            let bytes = res.bytes().await?;
            tokio::fs::write(&out, &bytes).await?;
            println!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
        Commands::Get { path, token } => {
            let mut headers = HeaderMap::new();
            if let Some(token) = token {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token))?,
                );
            }
            let res = client
                .get(format!("{}/api/proxy", cli.url))
                .query(&[("path", &path)])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }
    Ok(())
}
