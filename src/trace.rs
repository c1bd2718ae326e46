//! Invocation trace capture for comparison runs.

use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::invoker::InvocationResult;

/// One JSONL row per finished invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationTrace {
    pub timestamp_ms: i64,
    /// Position in completion order within the run.
    pub completion_index: usize,
    pub model_id: String,
    pub inference_id: String,
    pub prompt_index: u32,
    pub prompt_hash: String,
    pub is_error: bool,
    pub tokens_used: u32,
    pub response_time_seconds: f64,
    pub cost_units: f64,
    /// Output text for failures only; successes are summarized by length.
    pub error: Option<String>,
    pub output_chars: usize,
}

impl InvocationTrace {
    pub fn from_result(completion_index: usize, result: &InvocationResult) -> Self {
        Self {
            timestamp_ms: now_epoch_ms(),
            completion_index,
            model_id: result.model.id.clone(),
            inference_id: result.model.inference_id.clone(),
            prompt_index: result.prompt_index,
            prompt_hash: blake3::hash(result.prompt_text.as_bytes())
                .to_hex()
                .to_string(),
            is_error: result.is_error,
            tokens_used: result.metrics.tokens_used,
            response_time_seconds: result.metrics.response_time_seconds,
            cost_units: result.metrics.cost_units,
            error: result.is_error.then(|| result.output.clone()),
            output_chars: result.output.chars().count(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: InvocationTrace) -> Result<(), TraceError>;
}

#[derive(Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<InvocationTrace>,
}

pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<(), TraceError>>>,
}

impl TraceWorker {
    /// Wait for the writer to drain. Drop every sender first.
    pub fn join(mut self) -> Result<(), TraceError> {
        let handle = self.handle.take();
        match handle {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TraceError::Join("trace worker panicked".to_string())),
            },
            None => Ok(()),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<InvocationTrace>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: InvocationTrace) -> Result<(), TraceError> {
        self.sender.send(event).map_err(|_| TraceError::Closed)
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<InvocationTrace>,
) -> Result<(), TraceError> {
    let mut writer = BufWriter::new(file);
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
