use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use guji::LONG_VERSION;
use guji::commands::chat::{self, ChatArgs};
use guji::commands::config::{self, ConfigArgs};
use guji::commands::convert::{self, ConvertArgs};
use guji::commands::history::{self, HistoryArgs};
use guji::commands::ocr::{self, OcrArgs};
use guji::commands::settings::{self, SettingsArgs};

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  guji ocr page.jpg --det-mode sp\n  guji chat --record 20240101120000 --action translate\n  echo \"何谓仁？\" | guji chat --provider deepseek\n  guji convert --to traditional \"学而时习之\"\n  guji history list --limit 10\n  guji completion bash > ~/.local/share/bash-completion/completions/guji";

const CHAT_HELP_EXAMPLES: &str = "Examples:\n  guji chat --context \"子曰：学而时习之\" \"这句话是什么意思？\"\n  guji chat --context-file page.txt --action analyze\n  guji chat --interactive --record 20240101120000\n  guji chat --dry-run --json \"解释这段古文\"";

#[derive(Debug, Parser)]
#[command(
    name = "guji",
    version = LONG_VERSION,
    propagate_version = true,
    about = "Classical Chinese OCR and reading assistant",
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Ask the reading assistant about a text", after_help = CHAT_HELP_EXAMPLES)]
    Chat(ChatArgs),
    #[command(about = "Recognize the text of a page image")]
    Ocr(OcrArgs),
    #[command(about = "Convert between simplified and traditional characters")]
    Convert(ConvertArgs),
    #[command(about = "Browse and manage recognition history")]
    History(HistoryArgs),
    #[command(about = "Show or change the backend recognition settings")]
    Settings(SettingsArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "guji", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "guji", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "guji", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => chat::run(args).await,
        Commands::Ocr(args) => ocr::run(args).await,
        Commands::Convert(args) => convert::run(args).await,
        Commands::History(args) => history::run(args).await,
        Commands::Settings(args) => settings::run(args).await,
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
