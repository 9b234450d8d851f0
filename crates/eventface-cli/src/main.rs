use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "eventface", about = "eventface face enrolment and event recognition CLI")]
struct Cli {
    /// Base URL of the eventfaced daemon
    #[arg(long, env = "EVENTFACE_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the face in an image under a user id
    Enroll {
        /// User id to enroll the face under
        #[arg(short, long)]
        user: String,
        /// URL of an image showing the user's face
        image_url: String,
    },
    /// Match every face in a set of event photos against enrolled users
    Recognize {
        /// Event id the photos belong to
        #[arg(short, long)]
        event: String,
        /// Photo URLs
        #[arg(required = true)]
        image_urls: Vec<String>,
    },
    /// List stored face matches for an event
    Matches {
        event_id: String,
    },
    /// List stored image outcomes for an event
    Images {
        event_id: String,
    },
    /// Show daemon status
    Status,
}

/// Thin JSON client for the daemon's HTTP API.
struct DaemonClient {
    base: Url,
    http: reqwest::Client,
}

impl DaemonClient {
    fn new(server: &str) -> Result<Self> {
        let base = Url::parse(server).with_context(|| format!("invalid server URL {server}"))?;
        let http = reqwest::Client::builder()
            .build()
            .context("building HTTP client")?;
        Ok(Self { base, http })
    }

    /// Append `segments` to the server URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot be used as a base URL", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, segments: &[&str]) -> Result<Value> {
        let url = self.url(segments)?;
        let resp = self.http.get(url.clone()).send().await;
        self.read(&url, resp).await
    }

    async fn post(&self, segments: &[&str], body: Value) -> Result<Value> {
        let url = self.url(segments)?;
        let resp = self.http.post(url.clone()).json(&body).send().await;
        self.read(&url, resp).await
    }

    async fn read(&self, url: &Url, resp: reqwest::Result<reqwest::Response>) -> Result<Value> {
        let resp = resp.with_context(|| format!("could not reach eventfaced at {}", self.base))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("invalid response from {}", url.path()))?;
        tracing::debug!(path = url.path(), status = status.as_u16(), "response received");

        if !status.is_success() {
            let error = body["error"].as_str().unwrap_or("request failed");
            let details = body["details"].as_str().unwrap_or_default();
            bail!("{error} ({status}): {details}");
        }
        Ok(body)
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = DaemonClient::new(&cli.server)?;

    let response = match cli.command {
        Commands::Enroll { user, image_url } => {
            client
                .post(
                    &["users", "register-face"],
                    json!({ "userId": user, "imageUrl": image_url }),
                )
                .await?
        }
        Commands::Recognize { event, image_urls } => {
            client
                .post(
                    &["api", "events", "recognize"],
                    json!({ "eventId": event, "imageUrls": image_urls }),
                )
                .await?
        }
        Commands::Matches { event_id } => {
            client.get(&["api", "events", event_id.as_str(), "matches"]).await?
        }
        Commands::Images { event_id } => {
            client.get(&["api", "events", event_id.as_str(), "images"]).await?
        }
        Commands::Status => client.get(&["health"]).await?,
    };

    print_json(&response)
}
