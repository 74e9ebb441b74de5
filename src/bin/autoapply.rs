use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::{env, thread};

use anyhow::{anyhow, Context, Result};
use autoapply::ai::build_provider;
use autoapply::notifications::{emit_error, ChannelSink, NotificationSink};
use autoapply::workspace::{
    config_file_path, ensure_workspace_structure, load_or_default, save, ProviderKind,
};
use autoapply::{ControlService, InboundMessage, OutboundMessage};

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = CliArgs::parse()?;
    let paths = ensure_workspace_structure()?;
    let mut config = load_or_default()?;

    if let Some(provider) = args.provider {
        config.ai.provider = provider;
    }
    if let Some(model) = args.model {
        config.ai.model = model;
    }

    if args.write_config {
        save(&config)?;
        println!("Configuration written to {}", config_file_path()?.display());
        return Ok(());
    }

    let (tx, rx) = crossbeam_channel::unbounded::<OutboundMessage>();
    let sink: Arc<dyn NotificationSink> = Arc::new(ChannelSink::new(tx));
    let provider = build_provider(&config.ai);
    let service = ControlService::new(config, &paths, provider, sink.clone());

    let writer = thread::Builder::new()
        .name("autoapply-stdout".into())
        .spawn(move || -> Result<()> {
            let stdout = io::stdout();
            for message in rx {
                let line = serde_json::to_string(&message)?;
                let mut out = stdout.lock();
                writeln!(out, "{line}")?;
                out.flush()?;
            }
            Ok(())
        })
        .context("Failed spawning stdout writer")?;

    log::info!("[CONTROL] Listening on stdin ({:?})", paths.root);
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundMessage>(&line) {
            Ok(message) => {
                service.handle(message);
            }
            Err(err) => emit_error(sink.as_ref(), format!("Unrecognised message: {err}")),
        }
    }

    drop(service);
    drop(sink);
    writer
        .join()
        .map_err(|_| anyhow!("stdout writer panicked"))??;
    Ok(())
}

struct CliArgs {
    provider: Option<ProviderKind>,
    model: Option<String>,
    write_config: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut provider = None;
        let mut model = None;
        let mut write_config = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--provider" => {
                    let value = args
                        .next()
                        .context("Expected a provider name after --provider")?;
                    provider = Some(parse_provider(&value)?);
                }
                "--model" => {
                    let value = args.next().context("Expected a model name after --model")?;
                    model = Some(value);
                }
                "--write-config" => write_config = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument '{other}'. Run with --help for usage instructions."
                    ));
                }
            }
        }
        Ok(Self {
            provider,
            model,
            write_config,
        })
    }
}

fn parse_provider(value: &str) -> Result<ProviderKind> {
    match value.to_ascii_lowercase().as_str() {
        "ollama" => Ok(ProviderKind::Ollama),
        "openai" => Ok(ProviderKind::Openai),
        "anthropic" => Ok(ProviderKind::Anthropic),
        "gemini" => Ok(ProviderKind::Gemini),
        other => Err(anyhow!(
            "Unknown provider '{other}' (expected ollama, openai, anthropic or gemini)"
        )),
    }
}

fn print_usage() {
    println!("AutoApply control channel");
    println!("Reads one JSON message per line on stdin and writes replies to stdout.");
    println!("Usage: cargo run --bin autoapply -- [options]");
    println!("Options:");
    println!("  --provider <name>   Override the AI backend for this run");
    println!("  --model <name>      Override the model for this run");
    println!("  --write-config      Write the effective config.toml and exit");
}
