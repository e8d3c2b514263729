//! One-shot commands: `ask` and `models list|pull|rm`.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lc_core::{
    format_size, ChatBackend, ChatChunk, ChatMessage, ChatRequest, InferenceServer,
    InstallProgress, InstalledModel, PullEvent,
};

/// Stream one chat turn to `out`. Returns once the body ends or `cancel`
/// fires.
pub async fn ask(
    backend: &dyn ChatBackend,
    model: &str,
    prompt: &str,
    out: &mut impl Write,
    cancel: CancellationToken,
) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("Prompt is empty");
    }

    let request =
        ChatRequest::new(prompt, model).with_history(vec![ChatMessage::user(prompt)]);
    info!(model, backend = backend.name(), "Sending prompt");

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        stream = backend.stream_chat(request) => stream.context("Chat request failed")?,
    };

    let mut chars = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(chars, "Cancelled");
                break;
            }
            item = stream.next() => match item {
                Some(Ok(ChatChunk::Delta { text })) => {
                    chars += text.len();
                    out.write_all(text.as_bytes())?;
                    out.flush()?;
                }
                Some(Ok(ChatChunk::Done)) | None => break,
                Some(Err(e)) => return Err(e).context("Chat stream failed"),
            },
        }
    }

    writeln!(out)?;
    info!(chars, "Completion finished");
    Ok(())
}

/// Print the installed models as a table.
pub async fn list_models(inference: &dyn InferenceServer, out: &mut impl Write) -> Result<()> {
    let models = inference
        .list_models()
        .await
        .with_context(|| format!("Failed to list models from {}", inference.base_url()))?;
    write_model_table(&models, out)?;
    Ok(())
}

fn write_model_table(models: &[InstalledModel], out: &mut impl Write) -> io::Result<()> {
    if models.is_empty() {
        return writeln!(out, "No models installed");
    }

    let or_na = |value: &str| if value.is_empty() { "N/A".to_string() } else { value.to_string() };
    let rows: Vec<[String; 6]> = models
        .iter()
        .map(|m| {
            [
                m.name.clone(),
                m.size_label(),
                m.families_label(),
                or_na(&m.details.format),
                or_na(&m.details.parameter_size),
                or_na(&m.details.quantization_level),
            ]
        })
        .collect();

    let header = ["Model", "Size", "Family", "Format", "Parameters", "Quantization"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let write_row = |out: &mut dyn Write, cells: &[&str]| -> io::Result<()> {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())
    };

    write_row(out, &header)?;
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        write_row(out, &cells)?;
    }
    Ok(())
}

/// Download `name`, printing each new status line with the overall percentage.
pub async fn pull_model(
    inference: &dyn InferenceServer,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Please enter a valid model name.");
    }

    let mut stream = inference
        .pull(name)
        .await
        .with_context(|| format!("Failed to install model: {}", name))?;

    let mut progress = InstallProgress::new();
    let mut last_status = String::new();
    while let Some(item) = stream.next().await {
        match item.context("Installation failed due to a network issue.")? {
            PullEvent::Status(status) => {
                progress.apply(&status.status);
                if status.status != last_status {
                    writeln!(out, "[{:>3.0}%] {}", progress.percent(), status.status)?;
                    last_status = status.status.clone();
                }
                if let (Some(completed), Some(total)) = (status.completed, status.total) {
                    debug!(
                        completed = %format_size(completed),
                        total = %format_size(total),
                        "Download progress"
                    );
                }
                if progress.is_complete() {
                    writeln!(out, "Model \"{}\" has been successfully installed.", name)?;
                    return Ok(());
                }
            }
            PullEvent::Error { message } => bail!("Failed to install model: {}", message),
        }
    }

    bail!("Installation failed.")
}

pub async fn remove_model(
    inference: &dyn InferenceServer,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    inference
        .delete(name)
        .await
        .with_context(|| format!("Failed to remove model: {}", name))?;
    writeln!(out, "Removed {}", name)?;
    Ok(())
}

/// Ask a yes/no question on stdin. Anything but `y` is no.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_core::testing::{MockChatBackend, MockInferenceServer};
    use lc_core::{Error, ModelDetails};

    #[tokio::test]
    async fn test_ask_streams_deltas() {
        let backend = MockChatBackend::new();
        backend.queue_deltas(&["Hel", "lo"]);

        let mut out = Vec::new();
        ask(&backend, "llama3", " Hi ", &mut out, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Hello\n");
        let request = backend.last_request().unwrap();
        assert_eq!(request.prompt, "Hi");
        assert_eq!(request.history, vec![ChatMessage::user("Hi")]);
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_prompt() {
        let backend = MockChatBackend::new();
        let mut out = Vec::new();
        assert!(ask(&backend, "llama3", "  ", &mut out, CancellationToken::new())
            .await
            .is_err());
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_ask_cancelled() {
        let backend = MockChatBackend::new();
        let _chunks = backend.queue_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut out = Vec::new();
        ask(&backend, "llama3", "Hi", &mut out, cancel).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_ask_failure() {
        let backend = MockChatBackend::new();
        backend.queue_error(Error::network("connection refused"));
        let mut out = Vec::new();
        let err = ask(&backend, "llama3", "Hi", &mut out, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }

    #[tokio::test]
    async fn test_list_models_table() {
        let details = ModelDetails {
            families: Some(vec!["llama".to_string()]),
            format: "gguf".to_string(),
            parameter_size: "8.0B".to_string(),
            quantization_level: "Q4_0".to_string(),
        };
        let server = MockInferenceServer::new().with_models(vec![
            InstalledModel::new("llama3", 4294967296).with_details(details),
            InstalledModel::new("tiny", 524_288_000),
        ]);

        let mut out = Vec::new();
        list_models(&server, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Model   Size"));
        assert!(lines[1].contains("4.00 GB"));
        assert!(lines[1].contains("Q4_0"));
        assert!(lines[2].contains("500.00 MB"));
        assert!(lines[2].contains("N/A"));
    }

    #[tokio::test]
    async fn test_list_models_empty() {
        let mut out = Vec::new();
        list_models(&MockInferenceServer::new(), &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No models installed\n");
    }

    #[tokio::test]
    async fn test_pull_prints_stages() {
        let server = MockInferenceServer::new();
        server.queue_pull_statuses(&[
            "pulling manifest",
            "pulling manifest",
            "verifying sha256 digest",
            "writing manifest",
            "success",
        ]);

        let mut out = Vec::new();
        pull_model(&server, "llama3", &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "[ 25%] pulling manifest\n\
             [ 50%] verifying sha256 digest\n\
             [ 75%] writing manifest\n\
             [100%] success\n\
             Model \"llama3\" has been successfully installed.\n"
        );
    }

    #[tokio::test]
    async fn test_pull_error_fragment() {
        let server = MockInferenceServer::new();
        server.queue_pull_events(vec![Ok(PullEvent::Error {
            message: "file does not exist".to_string(),
        })]);

        let mut out = Vec::new();
        let err = pull_model(&server, "nope", &mut out).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to install model: file does not exist");
    }

    #[tokio::test]
    async fn test_pull_stream_without_success() {
        let server = MockInferenceServer::new();
        server.queue_pull_statuses(&["pulling manifest"]);
        let mut out = Vec::new();
        let err = pull_model(&server, "llama3", &mut out).await.unwrap_err();
        assert_eq!(err.to_string(), "Installation failed.");
    }

    #[tokio::test]
    async fn test_remove_model() {
        let server = MockInferenceServer::new().with_models(vec![InstalledModel::new("llama3", 1)]);
        let mut out = Vec::new();
        remove_model(&server, "llama3", &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Removed llama3\n");
        assert_eq!(server.delete_count(), 1);
    }
}
