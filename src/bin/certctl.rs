use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "certctl")]
#[command(about = "Client for the certificate provisioner", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CERTCTL_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a certificate for a domain and attach it to a load balancer
    Generate {
        /// Domain the managed certificate should cover
        #[arg(short, long)]
        domain: String,

        /// Name of the backend service fronted by the load balancer
        #[arg(short = 'l', long = "load-balancer")]
        load_balancer: String,
    },
    /// Check service health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Generate { domain, load_balancer } => {
            client
                .post(format!("{}/generate-cert", base))
                .json(&json!({ "domain": domain, "loadBalancerName": load_balancer }))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
