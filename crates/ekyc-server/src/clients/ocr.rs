//! Client for the OCR service's `POST /ocr/image/` endpoint.

use bytes::Bytes;
use ekyc_core::{CollaboratorError, collaborator::Transcriber};
use reqwest::multipart::Form;
use serde::Deserialize;

use super::{Endpoint, image_part};

#[derive(Deserialize)]
struct OcrResponse {
  text: String,
}

#[derive(Debug, Clone)]
pub struct HttpOcr {
  endpoint: Endpoint,
}

impl HttpOcr {
  pub fn new(endpoint: Endpoint) -> Self { Self { endpoint } }
}

impl Transcriber for HttpOcr {
  async fn transcribe(&self, image: Bytes) -> Result<String, CollaboratorError> {
    let form = Form::new().part("file", image_part(image, "document.jpg"));
    let resp: OcrResponse = self.endpoint.post_multipart("/ocr/image/", form).await?;
    Ok(resp.text)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::{Json, Router, extract::Multipart, routing::post};
  use serde_json::json;

  use super::*;
  use crate::clients::{http_client, test_server};

  async fn ocr(url: String) -> HttpOcr {
    let client = http_client(Duration::from_secs(2)).unwrap();
    HttpOcr::new(Endpoint::new(client, url, Duration::from_secs(2)))
  }

  #[tokio::test]
  async fn uploads_file_part_and_reads_text() {
    let app = Router::new().route(
      "/ocr/image/",
      post(|mut form: Multipart| async move {
        let field = form.next_field().await.unwrap().unwrap();
        assert_eq!(field.name(), Some("file"));
        let data = field.bytes().await.unwrap();
        Json(json!({ "text": format!("{} bytes", data.len()) }))
      }),
    );
    let url = test_server::spawn(app).await;

    let text = ocr(url).await.transcribe(Bytes::from_static(b"12345")).await.unwrap();
    assert_eq!(text, "5 bytes");
  }

  #[tokio::test]
  async fn missing_text_key_is_invalid_response() {
    let app = Router::new()
      .route("/ocr/image/", post(|| async { Json(json!({ "error": "boom" })) }));
    let url = test_server::spawn(app).await;

    let err = ocr(url).await.transcribe(Bytes::from_static(b"x")).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::InvalidResponse { .. }));
  }
}
