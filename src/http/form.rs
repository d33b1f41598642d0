use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Form;
use serde::Deserialize;

use crate::app::forms::PostInput;
use crate::app::media::ImageUpload;
use crate::http::AppError;
use crate::AppState;

/// Checkbox sent by the edit form to drop the current image.
const IMAGE_CLEAR_FIELD: &str = "image-clear";

#[derive(Debug, Deserialize)]
struct UrlencodedPost {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default, rename = "image-clear")]
    image_clear: Option<String>,
}

/// The post form, read from either `multipart/form-data` or a urlencoded body.
#[derive(Debug, Default)]
pub struct PostFormData(pub PostInput);

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
        .unwrap_or(false)
}

#[axum::async_trait]
impl FromRequest<AppState> for PostFormData {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(body) = Form::<UrlencodedPost>::from_request(req, state)
                .await
                .map_err(|err| AppError::bad_request(err.body_text()))?;
            return Ok(PostFormData(PostInput {
                text: body.text,
                group: body.group,
                image: None,
                clear_image: body.image_clear.is_some(),
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;

        let mut input = PostInput::default();
        while let Some(field) = multipart.next_field().await.map_err(|err| {
            tracing::warn!(error = ?err, "failed to read multipart field");
            AppError::bad_request("malformed form data")
        })? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" | "group" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|_| AppError::bad_request("malformed form data"))?;
                    if name == "text" {
                        input.text = Some(value);
                    } else {
                        input.group = Some(value);
                    }
                }
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|_| AppError::bad_request("malformed form data"))?;
                    // browsers send an empty part when no file was picked
                    if !(filename.is_empty() && bytes.is_empty()) {
                        input.image = Some(ImageUpload { filename, bytes });
                    }
                }
                IMAGE_CLEAR_FIELD => input.clear_image = true,
                _ => {}
            }
        }

        Ok(PostFormData(input))
    }
}
