use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use clap::{Args, ValueEnum};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::assistant::client::resolve_endpoint;
use crate::assistant::prompts::QuickAction;
use crate::assistant::provider::{api_key_env, api_key_from_env, default_model};
use crate::assistant::{AskOptions, AssistantError, ChatClient, Provider, Termination};
use crate::backend::{BACKEND_URL_ENV, BackendClient};
use crate::commands::{Interrupts, write_output_file};
use crate::config::{self, ProfileConfig, env_parsed, env_value};
use crate::logging::{self, LogArgs};
use crate::render::markdown_to_html;
use crate::session::{Session, TurnSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Text,
    Json,
    Html,
}

impl OutputMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    /// Question for the assistant; read from stdin when omitted
    #[arg(conflicts_with = "interactive")]
    pub prompt: Option<String>,
    /// Chat provider: deepseek or openai
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Replace the default system prompt
    #[arg(long)]
    pub system: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(long)]
    pub retries: Option<u32>,
    /// Base retry delay in milliseconds
    #[arg(long)]
    pub retry_delay: Option<u64>,
    /// Profile from the config file
    #[arg(long)]
    pub profile: Option<String>,
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
    /// Shorthand for --output json
    #[arg(long)]
    pub json: bool,
    /// Also write the output to this file
    #[arg(long)]
    pub save: Option<PathBuf>,
    /// Print the request instead of sending it; never contacts a server
    #[arg(long, conflicts_with_all = ["interactive", "record"])]
    pub dry_run: bool,
    /// Print token usage and latency to stderr
    #[arg(long)]
    pub show_usage: bool,
    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
    /// Recognized text to discuss
    #[arg(long, conflicts_with_all = ["context_file", "record"])]
    pub context: Option<String>,
    /// Read the text to discuss from a file
    #[arg(long, conflicts_with = "record")]
    pub context_file: Option<PathBuf>,
    /// Discuss the text of a history record
    #[arg(long)]
    pub record: Option<String>,
    /// Ask a canned question about the text
    #[arg(long, value_enum, conflicts_with_all = ["prompt", "interactive"])]
    pub action: Option<QuickAction>,
    /// Keep a conversation going on stdin
    #[arg(long)]
    pub interactive: bool,
    /// OCR backend URL
    #[arg(long)]
    pub backend: Option<String>,
    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Debug, Clone)]
struct ResolvedChat {
    provider: Provider,
    model: String,
    system: Option<String>,
    options: AskOptions,
    output: OutputMode,
    show_usage: bool,
    stream: bool,
    backend_url: Option<String>,
}

fn parse_provider(value: &str, origin: &str) -> Result<Provider, String> {
    Provider::from_str(value).map_err(|_| {
        format!(
            "Invalid {origin} '{value}'. Supported values: {}.",
            Provider::supported_values()
        )
    })
}

fn parse_profile_output(value: &str) -> Result<OutputMode, String> {
    <OutputMode as ValueEnum>::from_str(value, true).map_err(|_| {
        format!("Invalid profile output '{value}'. Supported values: text, json, html.")
    })
}

fn check_temperature(temperature: f32) -> Result<f32, String> {
    if (0.0..=2.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(format!("Invalid temperature '{temperature}'. Expected 0.0 to 2.0."))
    }
}

/// Flag, then environment, then profile, then built-in default.
fn resolve(args: &ChatArgs) -> Result<ResolvedChat, String> {
    let profile = match &args.profile {
        Some(name) => config::load_profile(name)?,
        None => ProfileConfig::default(),
    };
    let defaults = AskOptions::default();

    let provider = match (&args.provider, env_value("GJ_PROVIDER"), &profile.provider) {
        (Some(value), _, _) => parse_provider(value, "--provider")?,
        (None, Some(value), _) => parse_provider(&value, "GJ_PROVIDER")?,
        (None, None, Some(value)) => parse_provider(value, "profile provider")?,
        (None, None, None) => Provider::Deepseek,
    };

    let model = args
        .model
        .clone()
        .or_else(|| env_value("GJ_MODEL"))
        .or_else(|| profile.model.clone())
        .unwrap_or_else(|| default_model(provider).to_string());

    let temperature = match args.temperature {
        Some(value) => Some(value),
        None => env_parsed::<f32>("GJ_TEMPERATURE", "a number")?.or(profile.temperature),
    }
    .or(defaults.temperature)
    .map(check_temperature)
    .transpose()?;

    let max_tokens = match args.max_tokens {
        Some(value) => Some(value),
        None => env_parsed::<u32>("GJ_MAX_TOKENS", "a positive integer")?.or(profile.max_tokens),
    }
    .or(defaults.max_tokens);

    let timeout_secs = match args.timeout {
        Some(value) => Some(value),
        None => env_parsed::<u64>("GJ_TIMEOUT", "seconds as an integer")?.or(profile.timeout),
    };

    let retries = match args.retries {
        Some(value) => Some(value),
        None => env_parsed::<u32>("GJ_RETRIES", "an integer")?.or(profile.retries),
    }
    .unwrap_or(defaults.retries);

    let retry_delay_ms = match args.retry_delay {
        Some(value) => Some(value),
        None => env_parsed::<u64>("GJ_RETRY_DELAY", "milliseconds as an integer")?
            .or(profile.retry_delay),
    }
    .unwrap_or(defaults.retry_delay_ms);

    let output = if args.json {
        OutputMode::Json
    } else {
        match (args.output, &profile.output) {
            (Some(mode), _) => mode,
            (None, Some(value)) => parse_profile_output(value)?,
            (None, None) => OutputMode::Text,
        }
    };

    let backend_url = args
        .backend
        .clone()
        .or_else(|| env_value(BACKEND_URL_ENV))
        .or_else(|| profile.backend_url.clone());

    Ok(ResolvedChat {
        provider,
        model,
        system: args.system.clone().or_else(|| profile.system.clone()),
        options: AskOptions {
            temperature,
            max_tokens,
            timeout_secs,
            retries,
            retry_delay_ms,
        },
        output,
        show_usage: args.show_usage || profile.show_usage.unwrap_or(false),
        stream: !args.no_stream && profile.stream.unwrap_or(true),
        backend_url,
    })
}

async fn load_context(args: &ChatArgs, backend_url: Option<&str>) -> Result<String, String> {
    if let Some(context) = &args.context {
        return Ok(context.clone());
    }
    if let Some(path) = &args.context_file {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(|err| format!("Failed to read context file '{}': {err}", path.display()));
    }
    if let Some(id) = &args.record {
        let backend = BackendClient::new(config::backend_url(backend_url));
        let record = backend
            .history_record(id)
            .await
            .map_err(|err| format!("Failed to load history record '{id}': {err}"))?;
        log::debug!("using {} characters of record {id} as context", record.ocr_text.chars().count());
        return Ok(record.ocr_text);
    }
    Ok(String::new())
}

async fn read_prompt(args: &ChatArgs) -> Result<String, String> {
    if let Some(action) = args.action {
        return Ok(action.prompt().to_string());
    }
    if let Some(prompt) = &args.prompt {
        return Ok(prompt.clone());
    }
    if io::stdin().is_terminal() {
        return Err("No prompt provided. Pass a question or pipe it on stdin.".to_string());
    }

    let mut prompt = String::new();
    tokio::io::stdin()
        .read_to_string(&mut prompt)
        .await
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;
    Ok(prompt.trim_end_matches(['\r', '\n']).to_string())
}

/// Provider key from the environment, else the one stored by the backend.
async fn build_client(provider: Provider, backend_url: Option<&str>) -> Result<ChatClient, String> {
    if let Some(api_key) = api_key_from_env(provider) {
        return Ok(ChatClient::new(provider, api_key));
    }

    if let (Provider::Deepseek, Some(url)) = (provider, backend_url) {
        match BackendClient::new(url).assistant_api_key().await {
            Ok(Some(api_key)) => {
                log::debug!("using assistant API key provided by backend {url}");
                return Ok(ChatClient::new(provider, api_key));
            }
            Ok(None) => log::debug!("backend {url} has no assistant API key"),
            Err(err) => log::warn!("could not load assistant API key from backend: {err}"),
        }
    }

    Err(AssistantError::MissingApiKey {
        provider,
        key_env: api_key_env(provider),
    }
    .to_string())
}

fn turn_settings(resolved: &ResolvedChat) -> TurnSettings {
    TurnSettings {
        model: resolved.model.clone(),
        system: resolved.system.clone(),
        options: resolved.options,
    }
}

fn request_summary(options: &AskOptions) -> Value {
    json!({
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
        "timeout_secs": options.timeout_secs,
        "retries": options.retries,
        "retry_delay_ms": options.retry_delay_ms,
    })
}

fn emit(body: &str, save: Option<&PathBuf>) -> Result<(), String> {
    println!("{body}");
    if let Some(path) = save {
        write_output_file(path, body)?;
    }
    Ok(())
}

fn dry_run(
    args: &ChatArgs,
    resolved: &ResolvedChat,
    session: &Session,
    prompt: &str,
) -> Result<(), String> {
    if prompt.trim().is_empty() {
        return Err(AssistantError::EmptyMessage.to_string());
    }

    let request = session.preview_request(&turn_settings(resolved), prompt);
    let body = json!({
        "dry_run": true,
        "provider": resolved.provider.as_str(),
        "model": request.model,
        "endpoint": resolve_endpoint(resolved.provider),
        "output": resolved.output.as_str(),
        "stream": resolved.stream,
        "system": request.system,
        "messages": request.messages,
        "request": request_summary(&request.options),
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&body).map_err(|err| err.to_string())?
    );
    if let Some(path) = &args.save {
        let compact = serde_json::to_string(&body).map_err(|err| err.to_string())?;
        write_output_file(path, &compact)?;
    }
    if resolved.show_usage && !args.log.quiet {
        eprintln!("usage: unavailable latency_ms=0 (dry-run)");
    }
    Ok(())
}

struct Reply {
    content: String,
    usage: Option<crate::assistant::provider::Usage>,
    termination: Option<Termination>,
    streamed_live: bool,
}

fn usage_line(reply: &Reply, latency_ms: u128) -> String {
    match &reply.usage {
        Some(usage) => format!(
            "usage: prompt_tokens={} completion_tokens={} total_tokens={} latency_ms={latency_ms}",
            usage.prompt_tokens.map_or("?".to_string(), |n| n.to_string()),
            usage.completion_tokens.map_or("?".to_string(), |n| n.to_string()),
            usage.total_tokens.map_or("?".to_string(), |n| n.to_string()),
        ),
        None => format!("usage: unavailable latency_ms={latency_ms} (stream)"),
    }
}

async fn single_turn(
    args: &ChatArgs,
    resolved: &ResolvedChat,
    client: &ChatClient,
    session: &mut Session,
    prompt: &str,
) -> Result<(), String> {
    let settings = turn_settings(resolved);
    let started = Instant::now();
    let cancel = CancellationToken::new();
    let interrupts = Interrupts::listen();
    let watcher = interrupts.cancel_on_interrupt(cancel.clone());

    let result = if resolved.stream {
        let live = resolved.output == OutputMode::Text;
        let mut stdout = io::stdout();
        session
            .ask_streaming(client, &settings, prompt, &cancel, |delta: &str| {
                if live {
                    let _ = write!(stdout, "{delta}");
                    let _ = stdout.flush();
                }
            })
            .await
            .map(|assembled| Reply {
                content: assembled.content,
                usage: None,
                termination: Some(assembled.termination),
                streamed_live: live,
            })
    } else {
        session
            .ask(client, &settings, prompt)
            .await
            .map(|response| Reply {
                content: response.content,
                usage: response.usage,
                termination: None,
                streamed_live: false,
            })
    };
    watcher.abort();

    let reply = result.map_err(|err| {
        if err.is_cancelled() {
            println!();
            "Reply cancelled.".to_string()
        } else {
            err.to_string()
        }
    })?;
    let latency_ms = started.elapsed().as_millis();

    match resolved.output {
        OutputMode::Text if reply.streamed_live => {
            println!();
            if let Some(path) = &args.save {
                write_output_file(path, &reply.content)?;
            }
        }
        OutputMode::Text => emit(&reply.content, args.save.as_ref())?,
        OutputMode::Html => emit(&markdown_to_html(&reply.content), args.save.as_ref())?,
        OutputMode::Json => {
            let body = json!({
                "provider": resolved.provider.as_str(),
                "model": resolved.model,
                "content": reply.content,
                "stream": resolved.stream,
                "termination": reply.termination.map(Termination::as_str),
                "usage": reply.usage,
                "latency_ms": latency_ms,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&body).map_err(|err| err.to_string())?
            );
            if let Some(path) = &args.save {
                let compact = serde_json::to_string(&body).map_err(|err| err.to_string())?;
                write_output_file(path, &compact)?;
            }
        }
    }

    if resolved.show_usage && !args.log.quiet {
        eprintln!("{}", usage_line(&reply, latency_ms));
    }
    Ok(())
}

async fn interactive(
    args: &ChatArgs,
    resolved: &ResolvedChat,
    client: &ChatClient,
    session: &mut Session,
) -> Result<(), String> {
    let settings = turn_settings(resolved);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let prompt_marker = !args.log.quiet && io::stdin().is_terminal();
    let interrupts = Interrupts::listen();

    loop {
        if prompt_marker {
            eprint!("> ");
            let _ = io::stderr().flush();
        }
        // Ctrl-C at the prompt ends the conversation; during a reply it only
        // cancels the reply.
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|err| format!("Failed to read stdin: {err}"))?,
            _ = interrupts.recv() => {
                eprintln!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let message = match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_chat();
                if !args.log.quiet {
                    eprintln!("conversation cleared");
                }
                continue;
            }
            command if command.starts_with('/') => match QuickAction::from_command(command) {
                Some(action) => action.prompt().to_string(),
                None => {
                    eprintln!("unknown command: {command}");
                    continue;
                }
            },
            text => text.to_string(),
        };

        let cancel = CancellationToken::new();
        let watcher = interrupts.cancel_on_interrupt(cancel.clone());
        let result = if resolved.stream {
            let mut stdout = io::stdout();
            session
                .ask_streaming(client, &settings, &message, &cancel, |delta: &str| {
                    let _ = write!(stdout, "{delta}");
                    let _ = stdout.flush();
                })
                .await
                .map(|_| ())
        } else {
            session
                .ask(client, &settings, &message)
                .await
                .map(|response| print!("{}", response.content))
        };
        watcher.abort();
        println!();

        match result {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => eprintln!("(reply cancelled)"),
            Err(err) => eprintln!("{err}"),
        }
    }

    Ok(())
}

pub async fn run(args: ChatArgs) -> Result<(), String> {
    logging::init(args.log);
    let resolved = resolve(&args)?;

    log::debug!(
        "provider={} model={} stream={} output={} api_key_present={}",
        resolved.provider.as_str(),
        resolved.model,
        resolved.stream,
        resolved.output.as_str(),
        api_key_from_env(resolved.provider).is_some()
    );

    let mut session = Session::new();
    session.set_ocr_text(load_context(&args, resolved.backend_url.as_deref()).await?);

    if args.interactive {
        let client = build_client(resolved.provider, resolved.backend_url.as_deref()).await?;
        return interactive(&args, &resolved, &client, &mut session).await;
    }

    let prompt = read_prompt(&args).await?;
    if args.dry_run {
        return dry_run(&args, &resolved, &session, &prompt);
    }
    if prompt.trim().is_empty() {
        return Err(AssistantError::EmptyMessage.to_string());
    }

    let client = build_client(resolved.provider, resolved.backend_url.as_deref()).await?;
    single_turn(&args, &resolved, &client, &mut session, &prompt).await
}
