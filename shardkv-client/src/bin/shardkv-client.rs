//! Interactive CLI client: connects once, then sends each stdin line as one
//! request and prints the reply.

use clap::Parser;
use shardkv_client::Client;
use std::io::{self, BufRead, Write};

#[derive(Parser)]
#[command(name = "shardkv-client")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:3223")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut client = Client::connect(&args.addr).await?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let reply = client.send_line(&line).await?;
        let mut out = stdout.lock();
        writeln!(out, "{reply}")?;
    }
    Ok(())
}
