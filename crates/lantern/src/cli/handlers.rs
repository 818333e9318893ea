//! Command handlers.

use super::commands::Commands;
use futures_util::StreamExt;
use lantern::{
    ChatMessage, Generation, InferenceService, JobRequestBuilder, JobStatus, TaskCategory,
};
use serde_json::json;
use std::error::Error;
use std::io::Write;
use tracing::debug;

type CliResult = Result<(), Box<dyn Error>>;

/// Run one command against `server`.
pub async fn handle_command(
    service: &InferenceService,
    server: Option<&str>,
    command: Commands,
) -> CliResult {
    match command {
        Commands::Health => health(service).await,
        Commands::Models { registered } => models(service, server, registered).await,
        Commands::Pull { model, if_missing } => pull(service, server, &model, if_missing).await,
        Commands::Generate {
            prompt,
            model,
            system,
            stream,
        } => {
            let client = service.server(server)?.client();
            let (model_id, params) = service
                .resolve_model(server, TaskCategory::TextGeneration, model.as_deref())
                .await?;
            let generation = client
                .generate_with(&model_id, &prompt, system.as_deref(), &params, stream)
                .await?;
            print_generation(generation).await
        }
        Commands::Chat {
            message,
            model,
            system,
            stream,
        } => {
            let client = service.server(server)?.client();
            let (model_id, mut params) = service
                .resolve_model(server, TaskCategory::Chat, model.as_deref())
                .await?;
            if system.is_some() {
                params.system_prompt = system;
            }
            let generation = client
                .chat_with(&model_id, &[ChatMessage::user(message)], &params, stream)
                .await?;
            print_generation(generation).await
        }
        Commands::Embed { text, model } => {
            let client = service.server(server)?.client();
            let (model_id, _) = service
                .resolve_model(server, TaskCategory::Embedding, model.as_deref())
                .await?;
            let result = client.embed(&model_id, &text).await?;
            let embedding = result.metadata.embedding.unwrap_or_default();
            let body = json!({
                "model": result.model,
                "dimensions": embedding.len(),
                "embedding": embedding,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Commands::Submit {
            prompt,
            task,
            priority,
            system,
            name,
            submitted_by,
        } => {
            let mut builder = JobRequestBuilder::default();
            builder
                .task_category(task)
                .prompt(prompt)
                .priority(priority.into())
                .submitted_by(submitted_by);
            if let Some(system) = system {
                builder.system_prompt(system);
            }
            if let Some(name) = name {
                builder.name(name);
            }
            let job = service.submit_and_wait(server, builder.build()?).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
            if *job.status() != JobStatus::Completed {
                return Err(format!(
                    "job {} ended {}: {}",
                    job.id(),
                    job.status(),
                    job.error_message().as_deref().unwrap_or("no error recorded")
                )
                .into());
            }
            Ok(())
        }
    }
}

async fn health(service: &InferenceService) -> CliResult {
    let results = service.check_all_health().await;
    if results.is_empty() {
        println!("No active servers configured");
    }
    for (name, healthy) in &results {
        println!("{:<20} {}", name, if *healthy { "healthy" } else { "unreachable" });
    }
    if results.values().any(|healthy| !healthy) {
        return Err("one or more servers are unreachable".into());
    }
    Ok(())
}

async fn models(service: &InferenceService, server: Option<&str>, registered: bool) -> CliResult {
    if registered {
        let summaries = service.registry().snapshot();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    let mut names = service.server(server)?.client().list_models().await?;
    names.sort();
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn pull(
    service: &InferenceService,
    server: Option<&str>,
    model: &str,
    if_missing: bool,
) -> CliResult {
    if if_missing {
        let pulled = service.ensure_model(server, model).await?;
        println!("{}", if pulled { "pulled" } else { "already loaded" });
        return Ok(());
    }
    let model_id = service
        .registry()
        .get(model)
        .map(|descriptor| descriptor.model_id().clone())
        .unwrap_or_else(|| model.to_string());
    let client = service.server(server)?.client();
    if client.pull_model(&model_id).await? {
        println!("pulled {}", model_id);
        Ok(())
    } else {
        Err(format!("pull of {} did not report success", model_id).into())
    }
}

async fn print_generation(generation: Generation) -> CliResult {
    match generation {
        Generation::Complete(result) => {
            debug!(tokens = result.token_count, "Generation complete");
            println!("{}", result.text);
        }
        Generation::Streaming(mut stream) => {
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                write!(stdout, "{}", chunk.content)?;
                stdout.flush()?;
                if chunk.done {
                    debug!(tokens = ?chunk.token_count, "Stream finished");
                }
            }
            writeln!(stdout)?;
        }
    }
    Ok(())
}
