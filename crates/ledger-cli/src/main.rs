use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::Block;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Command shell for a running ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a block carrying DATA and broadcast it
    Mine { data: String },
    /// Print the whole chain
    Chain,
    /// Print the chain length
    Length,
    /// Print the latest block
    Latest,
    /// Look up a single block
    Block(BlockQuery),
    /// List known peers
    Peers,
    /// Print this node's id, addresses and protocols
    Profile,
    /// Query the activity log
    #[command(subcommand)]
    Log(LogCommand),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct BlockQuery {
    #[arg(long)]
    index: Option<u64>,
    #[arg(long)]
    hash: Option<String>,
}

#[derive(Subcommand, Debug)]
enum LogCommand {
    /// Peer events of KIND (discovery, connect, disconnect, self-update, or list)
    Event { kind: String },
    /// Exchanges of KIND (latest-block, entire-chain, or list)
    Protocol { kind: String },
}

struct NodeClient {
    base: String,
    http: reqwest::Client,
}

impl NodeClient {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base);
        debug!("GET {url}");
        let res = self.http.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        read(res).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{path}", self.base);
        debug!("POST {url}");
        let res = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        read(res).await
    }
}

async fn read<T: DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or(body);
        bail!("node answered {status}: {message}");
    }
    serde_json::from_str(&body).context("decoding node response")
}

fn print_blocks(blocks: &[Block]) {
    println!("{:>6}  {:<16}  {:>14}  {:>8}  DATA", "INDEX", "HASH", "TIMESTAMP", "NONCE");
    for b in blocks {
        println!(
            "{:>6}  {:<16}  {:>14}  {:>8}  {}",
            b.index,
            &b.hash[..b.hash.len().min(16)],
            b.timestamp,
            b.nonce,
            b.data
        );
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = NodeClient::new(&cli.node);

    match cli.cmd {
        Command::Mine { data } => {
            let block: Block = node.post("/mine", &serde_json::json!({ "data": data })).await?;
            if cli.json {
                print_json(&block)?;
            } else {
                println!("mined block {} ({})", block.index, block.hash);
            }
        }
        Command::Chain => {
            let blocks: Vec<Block> = node.get("/chain").await?;
            if cli.json {
                print_json(&blocks)?;
            } else {
                print_blocks(&blocks);
            }
        }
        Command::Length => {
            let length: Value = node.get("/chain/length").await?;
            println!("{}", length["length"]);
        }
        Command::Latest => {
            let block: Block = node.get("/chain/latest").await?;
            if cli.json {
                print_json(&block)?;
            } else {
                print_blocks(&[block]);
            }
        }
        Command::Block(query) => {
            let path = match (query.index, query.hash) {
                (Some(index), _) => format!("/block/index/{index}"),
                (None, Some(hash)) => format!("/block/hash/{hash}"),
                (None, None) => bail!("pass --index or --hash"),
            };
            let block: Block = node.get(&path).await?;
            if cli.json {
                print_json(&block)?;
            } else {
                print_blocks(&[block]);
            }
        }
        Command::Peers => {
            let peers: Vec<String> = node.get("/peers").await?;
            if cli.json {
                print_json(&peers)?;
            } else if peers.is_empty() {
                println!("no known peers");
            } else {
                peers.iter().for_each(|p| println!("{p}"));
            }
        }
        Command::Profile => {
            let profile: Value = node.get("/profile").await?;
            print_json(&profile)?;
        }
        Command::Log(LogCommand::Event { kind }) => {
            let records: Value = node.get(&format!("/log/event/{kind}")).await?;
            print_json(&records)?;
        }
        Command::Log(LogCommand::Protocol { kind }) => {
            let records: Value = node.get(&format!("/log/protocol/{kind}")).await?;
            print_json(&records)?;
        }
    }
    Ok(())
}
