use std::process;

use clap::Parser;
use guji::LONG_VERSION;
use guji::commands::chat::{self, ChatArgs};

#[derive(Debug, Parser)]
#[command(
    name = "gjchat",
    version = LONG_VERSION,
    about = "Ask the classical Chinese reading assistant"
)]
struct Cli {
    #[command(flatten)]
    chat: ChatArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = chat::run(cli.chat).await {
        eprintln!("{err}");
        process::exit(1);
    }
}
