use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "director-cli")]
#[command(about = "Management CLI for the Node Director", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "DIRECTOR_URL")]
    url: String,

    /// API secret for write endpoints.
    #[arg(short, long, env = "DIRECTOR_API_SECRET", hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask for the next hot node
    Hotnode,
    /// Look up an enabled node by owner
    Get { owner: String },
    /// List nodes, most recently used first
    List {
        /// Only enabled (true) or disabled (false) nodes
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Create or replace a node
    Upsert {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        ip: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long)]
        disabled: bool,
    },
    /// Change selected fields of a node
    Update {
        owner: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Put a node back into rotation
    Enable { owner: String },
    /// Take a node out of rotation
    Disable { owner: String },
    /// Remove a node
    Delete { owner: String },
    /// Probe a node URL with the director's health settings
    CheckHealth { url: String },
    /// Show recent activity events
    Activity,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = url::Url::parse(&cli.url)?;
    let client = Client::new(base, cli.secret.as_deref())?;

    let request = match cli.command {
        Commands::Hotnode => client.public(Method::GET, "api/hotnode")?,
        Commands::Get { owner } => client.public(Method::GET, &format!("api/node/{}", owner))?,
        Commands::List { enabled } => {
            let request = client.public(Method::GET, "api/nodes")?;
            match enabled {
                Some(enabled) => request.query(&[("enabled", enabled)]),
                None => request,
            }
        }
        Commands::Upsert {
            owner,
            name,
            ip,
            url,
            comments,
            disabled,
        } => client.write(Method::POST, "api/node")?.json(&json!({
            "owner": owner,
            "name": name,
            "ip": ip,
            "url": url,
            "comments": comments,
            "enabled": !disabled,
        })),
        Commands::Update {
            owner,
            name,
            ip,
            url,
            comments,
        } => {
            let mut patch = Map::new();
            for (key, value) in [("name", name), ("ip", ip), ("url", url), ("comments", comments)] {
                if let Some(value) = value {
                    patch.insert(key.into(), Value::String(value));
                }
            }
            if patch.is_empty() {
                return Err("nothing to update: pass at least one of --name, --ip, --url, --comments".into());
            }
            client
                .write(Method::PUT, &format!("api/node/{}", owner))?
                .json(&patch)
        }
        Commands::Enable { owner } => client
            .write(Method::PUT, &format!("api/node/{}", owner))?
            .json(&json!({ "enabled": true })),
        Commands::Disable { owner } => client
            .write(Method::PUT, &format!("api/node/{}", owner))?
            .json(&json!({ "enabled": false })),
        Commands::Delete { owner } => client.write(Method::DELETE, &format!("api/node/{}", owner))?,
        Commands::CheckHealth { url } => client
            .write(Method::POST, "api/check-health")?
            .json(&json!({ "url": url })),
        Commands::Activity => client.write(Method::GET, "api/activity")?,
    };

    print_response(request.send().await?).await
}

struct Client {
    http: reqwest::Client,
    base: url::Url,
    auth: HeaderMap,
}

impl Client {
    fn new(base: url::Url, secret: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut auth = HeaderMap::new();
        if let Some(secret) = secret {
            auth.insert("x-api-secret", HeaderValue::from_str(secret)?);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            auth,
        })
    }

    fn public(&self, method: Method, path: &str) -> Result<RequestBuilder, url::ParseError> {
        Ok(self.http.request(method, self.base.join(path)?))
    }

    fn write(&self, method: Method, path: &str) -> Result<RequestBuilder, url::ParseError> {
        if self.auth.is_empty() {
            eprintln!("Warning: no API secret given, the director will answer 401");
        }
        Ok(self.public(method, path)?.headers(self.auth.clone()))
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = match res.json().await {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error: director returned status {} with an unreadable body: {}", status, e);
            std::process::exit(1);
        }
    };

    if !status.is_success() {
        eprintln!("Error: director returned status {}", status);
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
