//! icystream CLI — print what an internet radio station is playing

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use icystream::config::RetrieverConfig;
use icystream::{FailureKind, IcyStreamRetriever, RetrievalResult};

#[derive(Parser)]
#[command(name = "icystream", about = "Show now-playing data of an ICY stream", version)]
struct Cli {
    /// Stream URL
    url: String,

    /// Metadata blocks to read while waiting for a real title
    #[arg(short, long, default_value_t = 100)]
    retries: u32,

    /// Give up on the whole attempt after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = RetrieverConfig::default().with_max_retries(cli.retries);
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let retriever = match IcyStreamRetriever::new(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match retriever.retrieve(&cli.url) {
        Ok(result) => {
            if cli.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_result(&result);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            match e.kind() {
                FailureKind::Transport => ExitCode::from(1),
                FailureKind::UnsupportedStream => ExitCode::from(2),
            }
        }
    }
}

fn print_result(result: &RetrievalResult) {
    let header = &result.header;
    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_string();

    println!("Station:  {}", or_dash(header.name.as_deref()));
    println!("Genre:    {}", or_dash(header.genre.as_deref()));
    println!("URL:      {}", or_dash(header.url.as_deref()));
    match header.bit_rate_kbps() {
        Some(br) => println!("Bitrate:  {} kbps", br),
        None => println!("Bitrate:  -"),
    }
    println!("Metaint:  {}", header.meta_int);
    println!("Artist:   {}", result.artist());
    println!("Title:    {}", result.title());
}
