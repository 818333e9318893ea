//! Turning a job into an inference call.

use lantern_core::{ChatMessage, GenerationParams, GenerationResult, ProcessingJob, TaskCategory};
use lantern_error::{ClientError, JobError, JobErrorKind, JobResult};
use lantern_interface::InferenceDriver;
use lantern_models::ModelDescriptor;
use serde_json::{Value, json};

/// Output of a handled job.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    /// Payload stored on the job
    pub output: Value,
    /// Tokens generated
    pub token_count: u32,
}

/// Inference call used for a task category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskHandler {
    /// Single prompt through `generate`
    Generate,
    /// Message history through `chat`
    Chat,
    /// Text through `embed`
    Embed,
}

impl TaskHandler {
    /// Handler for `category`.
    pub fn for_category(category: TaskCategory) -> Self {
        match category {
            TaskCategory::Chat => TaskHandler::Chat,
            TaskCategory::Embedding => TaskHandler::Embed,
            TaskCategory::TextGeneration
            | TaskCategory::Summarization
            | TaskCategory::Classification
            | TaskCategory::Translation
            | TaskCategory::Extraction => TaskHandler::Generate,
        }
    }

    /// Run `job` against `model` through `driver`.
    ///
    /// Parameters start from the model defaults, overlaid with
    /// `input_data.params`; the job's system prompt wins over both.
    pub async fn run(
        self,
        driver: &dyn InferenceDriver,
        model: &ModelDescriptor,
        job: &ProcessingJob,
    ) -> JobResult<HandlerOutput> {
        let params = job_params(model, job)?;
        match self {
            TaskHandler::Generate => {
                let result = driver
                    .generate(model.model_id(), job.prompt(), None, &params)
                    .await
                    .map_err(inference_error)?;
                Ok(text_output(result))
            }
            TaskHandler::Chat => {
                let messages = chat_history(job)?;
                let result = driver
                    .chat(model.model_id(), &messages, &params)
                    .await
                    .map_err(inference_error)?;
                Ok(text_output(result))
            }
            TaskHandler::Embed => {
                let result = driver
                    .embed(model.model_id(), job.prompt())
                    .await
                    .map_err(inference_error)?;
                let embedding = result.metadata.embedding.unwrap_or_default();
                Ok(HandlerOutput {
                    output: json!({
                        "model": result.model,
                        "dimensions": embedding.len(),
                        "embedding": embedding,
                    }),
                    token_count: 0,
                })
            }
        }
    }
}

fn inference_error(e: ClientError) -> JobError {
    JobError::new(JobErrorKind::Inference(e.kind.to_string()))
}

fn invalid_input(what: &str, e: serde_json::Error) -> JobError {
    JobError::new(JobErrorKind::Inference(format!("invalid {what} in input data: {e}")))
}

fn job_params(model: &ModelDescriptor, job: &ProcessingJob) -> JobResult<GenerationParams> {
    let mut params = match job.input_data().get("params") {
        Some(raw) => {
            let overrides: GenerationParams =
                serde_json::from_value(raw.clone()).map_err(|e| invalid_input("params", e))?;
            model.params().merge(&overrides)
        }
        None => model.params().clone(),
    };
    if let Some(system) = job.system_prompt() {
        params.system_prompt = Some(system.clone());
    }
    Ok(params)
}

/// Prior messages from `input_data.messages`, then the prompt as a user turn.
fn chat_history(job: &ProcessingJob) -> JobResult<Vec<ChatMessage>> {
    let mut messages: Vec<ChatMessage> = match job.input_data().get("messages") {
        Some(raw) => {
            serde_json::from_value(raw.clone()).map_err(|e| invalid_input("messages", e))?
        }
        None => Vec::new(),
    };
    if !job.prompt().is_empty() {
        messages.push(ChatMessage::user(job.prompt().clone()));
    }
    if messages.is_empty() {
        return Err(JobError::new(JobErrorKind::Inference(
            "chat job has no messages".into(),
        )));
    }
    Ok(messages)
}

fn text_output(result: GenerationResult) -> HandlerOutput {
    HandlerOutput {
        token_count: result.token_count,
        output: json!({
            "model": result.model,
            "text": result.text,
            "done_reason": result.metadata.done_reason,
            "prompt_tokens": result.metadata.prompt_tokens,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::{JobRequestBuilder, Role};

    fn chat_job(input: Value, prompt: &str) -> ProcessingJob {
        ProcessingJob::from_request(
            JobRequestBuilder::default()
                .task_category(TaskCategory::Chat)
                .prompt(prompt)
                .input_data(input)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn history_precedes_prompt() {
        let job = chat_job(
            json!({"messages": [
                {"role": "system", "content": "You are a recruiter."},
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello!"}
            ]}),
            "Any openings?",
        );
        let messages = chat_history(&job).unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[3], ChatMessage::user("Any openings?"));
    }

    #[test]
    fn malformed_history_is_rejected() {
        let job = chat_job(json!({"messages": [{"role": "robot", "content": "x"}]}), "hi");
        assert!(chat_history(&job).is_err());

        let job = chat_job(Value::Null, "");
        assert!(chat_history(&job).is_err());
    }

    #[test]
    fn job_overrides_model_params() {
        let model = ModelDescriptor::new("m", "m:1", TaskCategory::Summarization).with_params(
            GenerationParams::default()
                .with_temperature(0.7)
                .with_max_tokens(256)
                .with_system_prompt("Summarize."),
        );
        let job = ProcessingJob::from_request(
            JobRequestBuilder::default()
                .task_category(TaskCategory::Summarization)
                .prompt("text")
                .system_prompt("Summarize in one line.")
                .input_data(json!({"params": {"temperature": 0.1}}))
                .build()
                .unwrap(),
        );
        let params = job_params(&model, &job).unwrap();
        assert_eq!(params.temperature, Some(0.1));
        assert_eq!(params.max_tokens, Some(256));
        assert_eq!(params.system_prompt.as_deref(), Some("Summarize in one line."));
    }
}
