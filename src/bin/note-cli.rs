use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "note-cli")]
#[command(about = "Command-line client for a running note-host", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stored note collection
    Notes,
    /// List storage keys
    Keys,
    /// Print the value stored under a key
    Get {
        key: String,
    },
    /// Store a value under a key
    Put {
        key: String,
        value: String,
    },
    /// Delete a key
    Delete {
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Notes => {
            let res = client.get(format!("{}/api/notes", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Keys => {
            let res = client.get(format!("{}/api/storage", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Get { key } => {
            let res = client.get(format!("{}/api/storage/{}", base, key)).send().await?;
            if check_status(&res) {
                println!("{}", res.text().await?);
            } else {
                print_error(res).await;
            }
        }
        Commands::Put { key, value } => {
            let res = client
                .post(format!("{}/api/storage/{}", base, key))
                .body(value)
                .send()
                .await?;
            report(res).await;
        }
        Commands::Delete { key } => {
            let res = client
                .post(format!("{}/api/storage/{}/delete", base, key))
                .send()
                .await?;
            report(res).await;
        }
    }

    Ok(())
}

fn check_status(res: &reqwest::Response) -> bool {
    res.status().is_success()
}

async fn print_error(res: reqwest::Response) {
    eprintln!("Error: host returned status {}", res.status());
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
}

async fn report(res: reqwest::Response) {
    if check_status(&res) {
        println!("OK");
    } else {
        print_error(res).await;
    }
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !check_status(&res) {
        print_error(res).await;
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
