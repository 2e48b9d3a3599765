//! Remote extraction fallback over Ollama's `POST /api/generate`.
//!
//! The adapter only builds the prompt and returns the model's raw reply. The
//! extraction engine locates the JSON object inside it and validates every
//! value, so nothing here trusts the model's output.

use ekyc_core::{
  CollaboratorError,
  collaborator::{ExtractionFallback, NoFallback},
  identity::Field,
};
use serde::{Deserialize, Serialize};

use super::Endpoint;

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model:   &'a str,
  prompt:  String,
  stream:  bool,
  options: SamplingOptions,
}

/// Low temperature keeps the model close to copying text from the card.
#[derive(Serialize)]
struct SamplingOptions {
  temperature: f32,
  top_p:       f32,
  top_k:       u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
  response: String,
}

// ─── Ollama ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OllamaFallback {
  endpoint: Endpoint,
  model:    String,
}

impl OllamaFallback {
  pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
    Self { endpoint, model: model.into() }
  }
}

impl ExtractionFallback for OllamaFallback {
  async fn infer<'a>(
    &'a self,
    text: &'a str,
    fields: &'a [Field],
  ) -> Result<String, CollaboratorError> {
    let request = GenerateRequest {
      model:   &self.model,
      prompt:  build_prompt(text, fields),
      stream:  false,
      options: SamplingOptions { temperature: 0.1, top_p: 0.9, top_k: 40 },
    };
    let resp: GenerateResponse =
      self.endpoint.post_json("/api/generate", &request).await?;
    Ok(resp.response)
  }
}

/// The extraction prompt: the field list, the transcription, and the reply
/// contract (one JSON object keyed by field name, `null` when unknown).
pub fn build_prompt(text: &str, fields: &[Field]) -> String {
  let mut prompt = String::from(
    "The text below was transcribed from a Vietnamese identity card (CCCD or \
     CMND). Extract the following fields:\n",
  );
  for field in fields {
    prompt.push_str(&format!("- {field}: {}\n", field.description()));
  }
  prompt.push_str("\nText:\n```\n");
  prompt.push_str(text);
  prompt.push_str(
    "\n```\n\nReply with a single JSON object whose keys are exactly the field \
     names above. Use null for any field that does not appear in the text. \
     Copy values as written on the card and do not guess.",
  );
  prompt
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// The fallback selected by configuration.
#[derive(Debug, Clone)]
pub enum Fallback {
  Disabled(NoFallback),
  Ollama(OllamaFallback),
}

impl ExtractionFallback for Fallback {
  async fn infer<'a>(
    &'a self,
    text: &'a str,
    fields: &'a [Field],
  ) -> Result<String, CollaboratorError> {
    match self {
      Self::Disabled(f) => f.infer(text, fields).await,
      Self::Ollama(f) => f.infer(text, fields).await,
    }
  }
}
