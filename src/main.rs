// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, OutputFormatArg};
use sven_bootstrap::{AgentBuilder, RuntimeContext, ToolSetProfile};
use sven_core::AgentEvent;
use sven_model::catalog::ModelCatalogEntry;
use sven_tools::events::TodoItem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig => {
                let config = sven_config::load(cli.config.as_deref())?;
                println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
                return Ok(());
            }
            Commands::ListModels {
                provider,
                refresh,
                json,
            } => {
                let config = sven_config::load(cli.config.as_deref())?;
                return list_models_cmd(&config, provider.as_deref(), *refresh, *json).await;
            }
            Commands::ListProviders { verbose, json } => {
                return list_providers_cmd(*verbose, *json);
            }
        }
    }

    let mut config = sven_config::load(cli.config.as_deref())?;
    if let Some(allowed) = &cli.allowed_tools {
        config.tools.allowed_tools = Some(allowed.clone());
    }
    run_turn(cli, Arc::new(config)).await
}

/// Read the initial task from the positional argument, falling back to stdin.
fn read_prompt(cli: &Cli) -> anyhow::Result<String> {
    if let Some(p) = &cli.prompt {
        return Ok(p.clone());
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading prompt from stdin")?;
    anyhow::ensure!(
        !buf.trim().is_empty(),
        "no prompt given: pass one as an argument or pipe it on stdin"
    );
    Ok(buf)
}

/// Build an agent from config, submit one user turn, and stream its events
/// to stdout until the turn completes.
async fn run_turn(cli: Cli, config: Arc<sven_config::Config>) -> anyhow::Result<()> {
    let prompt = read_prompt(&cli)?;

    let model_cfg = match &cli.model {
        Some(name) => sven_model::resolve_model_from_config(&config, name),
        None => config.model.clone(),
    };
    let model: Arc<dyn sven_model::ModelProvider> = Arc::from(sven_model::from_config(&model_cfg)?);

    let mut runtime_ctx = RuntimeContext::auto_detect();
    runtime_ctx.append_system_prompt = cli.append_system_prompt.clone();
    if let Some(path) = &cli.system_prompt_file {
        runtime_ctx.system_prompt_override = Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading system prompt file {}", path.display()))?,
        );
    }

    let todos: Arc<Mutex<Vec<TodoItem>>> = Arc::new(Mutex::new(Vec::new()));
    let task_depth = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let mut agent = AgentBuilder::new(config)
        .with_runtime_context(runtime_ctx)
        .build(
            cli.mode,
            model,
            ToolSetProfile::Full {
                question_tx: None,
                todos,
                task_depth,
            },
        );

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
    let drain = tokio::spawn(async move {
        let mut final_text = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::TextDelta(d) if cli.output_format == OutputFormatArg::Text => {
                    print!("{d}");
                }
                AgentEvent::TextComplete(t) => {
                    final_text = t;
                }
                AgentEvent::Error(e) => {
                    eprintln!("[sven:error] {e}");
                }
                other if cli.output_format == OutputFormatArg::Json => {
                    if let Ok(line) = format_event_json(&other) {
                        println!("{line}");
                    }
                }
                _ => {}
            }
        }
        final_text
    });

    agent.submit(&prompt, tx).await?;
    let final_text = drain.await.unwrap_or_default();

    if cli.output_format == OutputFormatArg::Text {
        println!();
    }
    if let Some(path) = &cli.output_last_message {
        std::fs::write(path, &final_text)
            .with_context(|| format!("writing final response to {}", path.display()))?;
    }
    Ok(())
}

/// Render an `AgentEvent` as a single JSON line (best-effort; events without a
/// meaningful JSON shape are skipped by the caller).
fn format_event_json(event: &AgentEvent) -> anyhow::Result<String> {
    let value = match event {
        AgentEvent::TurnStarted(turn) => serde_json::json!({"type": "turn_started", "turn": turn}),
        AgentEvent::ThinkingDelta(d) => serde_json::json!({"type": "thinking_delta", "text": d}),
        AgentEvent::ToolCallStarted(call) => {
            serde_json::json!({"type": "tool_call", "name": call.name, "args": call.args})
        }
        AgentEvent::ToolCallFinished {
            tool_name,
            output,
            is_error,
            ..
        } => serde_json::json!({
            "type": "tool_result",
            "tool": tool_name,
            "output": output,
            "is_error": is_error,
        }),
        AgentEvent::TokenUsage {
            input,
            output,
            cache_read,
            cache_write,
            ..
        } => serde_json::json!({
            "type": "usage",
            "input": input,
            "output": output,
            "cache_read": cache_read,
            "cache_write": cache_write,
        }),
        AgentEvent::ContextCompacted {
            tokens_before,
            tokens_after,
            ..
        } => serde_json::json!({
            "type": "compacted",
            "tokens_before": tokens_before,
            "tokens_after": tokens_after,
        }),
        AgentEvent::TurnComplete => serde_json::json!({"type": "turn_complete"}),
        _ => return Ok(String::new()),
    };
    Ok(value.to_string())
}

/// List available models, optionally querying the provider API for live data.
async fn list_models_cmd(
    config: &sven_config::Config,
    provider_filter: Option<&str>,
    refresh: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    if let Some(prov) = provider_filter {
        if sven_model::get_driver(prov).is_none() {
            eprintln!("Unknown provider: {prov:?}");
            eprintln!("\nAvailable providers (run `sven list-providers` for details):");
            for d in sven_model::list_drivers() {
                eprintln!("  {:20} {}", d.id, d.name);
            }
            anyhow::bail!("Invalid provider: {prov}");
        }
    }

    let entries: Vec<ModelCatalogEntry> = if refresh {
        let model_cfg = if let Some(prov) = provider_filter {
            let mut c = config.model.clone();
            c.provider = prov.to_string();
            c
        } else {
            config.model.clone()
        };
        let model = sven_model::from_config(&model_cfg)?;
        let mut live = model.list_models().await?;
        if let Some(prov) = provider_filter {
            live.retain(|e| e.provider == prov);
        }
        live
    } else {
        let mut all = sven_model::catalog::static_catalog();
        if let Some(prov) = provider_filter {
            all.retain(|e| e.provider == prov);
        }
        all.sort_by(|a, b| a.provider.cmp(&b.provider).then(a.id.cmp(&b.id)));
        all
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    let id_w = entries.iter().map(|e| e.id.len()).max().unwrap_or(10).max(10);
    let prov_w = entries
        .iter()
        .map(|e| e.provider.len())
        .max()
        .unwrap_or(8)
        .max(8);

    println!(
        "{:<id_w$}  {:<prov_w$}  {:>12}  {:>16}  DESCRIPTION",
        "ID",
        "PROVIDER",
        "CTX WINDOW",
        "MAX OUT TOKENS",
        id_w = id_w,
        prov_w = prov_w,
    );
    println!("{}", "-".repeat(id_w + prov_w + 50));

    for e in &entries {
        let ctx = if e.context_window == 0 {
            "  -".to_string()
        } else {
            format!("{:>12}", e.context_window)
        };
        let max_out = if e.max_output_tokens == 0 {
            "  -".to_string()
        } else {
            format!("{:>16}", e.max_output_tokens)
        };
        println!(
            "{:<id_w$}  {:<prov_w$}  {}  {}  {}",
            e.id,
            e.provider,
            ctx,
            max_out,
            e.description,
            id_w = id_w,
            prov_w = prov_w,
        );
    }
    println!("\nTotal: {} model(s)", entries.len());
    Ok(())
}

/// List all registered model providers.
fn list_providers_cmd(verbose: bool, as_json: bool) -> anyhow::Result<()> {
    let drivers = sven_model::list_drivers();

    if as_json {
        #[derive(serde::Serialize)]
        struct ProviderJson {
            id: &'static str,
            name: &'static str,
            description: &'static str,
            default_api_key_env: Option<&'static str>,
            default_base_url: Option<&'static str>,
            requires_api_key: bool,
        }
        let rows: Vec<ProviderJson> = drivers
            .iter()
            .map(|d| ProviderJson {
                id: d.id,
                name: d.name,
                description: d.description,
                default_api_key_env: d.default_api_key_env,
                default_base_url: d.default_base_url,
                requires_api_key: d.requires_api_key,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Supported Model Providers ({} total)\n", drivers.len());

    if verbose {
        for d in drivers {
            println!("  {} — {}", d.id, d.name);
            println!("    {}", d.description);
            if let Some(env) = d.default_api_key_env {
                println!("    API key env : {env}");
            }
            if let Some(url) = d.default_base_url {
                println!("    Default URL : {url}");
            }
            if !d.requires_api_key {
                println!("    Auth        : none required");
            }
            println!();
        }
    } else {
        let id_w = drivers.iter().map(|d| d.id.len()).max().unwrap_or(10).max(10);
        let name_w = drivers
            .iter()
            .map(|d| d.name.len())
            .max()
            .unwrap_or(8)
            .max(8);
        println!("{:<id_w$}  {:<name_w$}  DESCRIPTION", "ID", "NAME");
        println!("{}", "-".repeat(id_w + name_w + 40));
        for d in drivers {
            println!("{:<id_w$}  {:<name_w$}  {}", d.id, d.name, d.description);
        }
        println!("\nUse `sven list-providers --verbose` for API key and URL details.");
        println!("Use `sven list-models --provider <ID>` to see models for a specific provider.");
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
