//! Client for the face-comparison service's `POST /compare_faces/` endpoint.
//!
//! The service answers `{"match", "score", "threshold"}` where `score` is the
//! raw face distance. When it cannot find a face it still answers 200, with a
//! `message` and a zero score; that shape is reported as
//! [`CollaboratorError::NoFaceDetected`] so a zero distance is never mistaken
//! for a perfect match.

use bytes::Bytes;
use ekyc_core::{CollaboratorError, collaborator::FaceComparator};
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::debug;

use super::{Endpoint, image_part};

#[derive(Deserialize)]
struct CompareResponse {
  score:     f64,
  #[serde(default)]
  threshold: Option<f64>,
  #[serde(default)]
  message:   Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpFaces {
  endpoint: Endpoint,
}

impl HttpFaces {
  pub fn new(endpoint: Endpoint) -> Self { Self { endpoint } }
}

impl FaceComparator for HttpFaces {
  async fn compare(
    &self,
    selfie: Bytes,
    document: Bytes,
  ) -> Result<f64, CollaboratorError> {
    let form = Form::new()
      .part("file1", image_part(selfie, "selfie.jpg"))
      .part("file2", image_part(document, "document.jpg"));

    let resp: CompareResponse =
      self.endpoint.post_multipart("/compare_faces/", form).await?;

    if let Some(message) = resp.message {
      debug!(%message, "face service found no face");
      return Err(CollaboratorError::NoFaceDetected);
    }
    debug!(distance = resp.score, service_threshold = ?resp.threshold, "faces compared");
    Ok(resp.score)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::{Json, Router, extract::Multipart, routing::post};
  use serde_json::{Value, json};

  use super::*;
  use crate::clients::{http_client, test_server};

  fn faces(url: String) -> HttpFaces {
    let client = http_client(Duration::from_secs(2)).unwrap();
    HttpFaces::new(Endpoint::new(client, url, Duration::from_secs(2)))
  }

  async fn serve(reply: Value) -> String {
    let app = Router::new().route(
      "/compare_faces/",
      post(move |mut form: Multipart| async move {
        let mut names = Vec::new();
        while let Some(field) = form.next_field().await.unwrap() {
          names.push(field.name().unwrap_or_default().to_owned());
        }
        assert_eq!(names, ["file1", "file2"]);
        Json(reply)
      }),
    );
    test_server::spawn(app).await
  }

  #[tokio::test]
  async fn returns_raw_distance() {
    let url = serve(json!({ "match": true, "score": 0.31, "threshold": 0.4 })).await;
    let distance = faces(url)
      .compare(Bytes::from_static(b"selfie"), Bytes::from_static(b"doc"))
      .await
      .unwrap();
    assert!((distance - 0.31).abs() < 1e-9);
  }

  #[tokio::test]
  async fn message_means_no_face() {
    let url = serve(json!({
      "match": false,
      "score": 0.0,
      "threshold": 0.4,
      "message": "no face found in one or both images",
    }))
    .await;
    let err = faces(url)
      .compare(Bytes::from_static(b"selfie"), Bytes::from_static(b"doc"))
      .await
      .unwrap_err();
    assert_eq!(err, CollaboratorError::NoFaceDetected);
  }
}
