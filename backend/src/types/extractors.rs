//! Custom extractors for webhook requests

use aide::operation::OperationInput;
use axum::{
    extract::{FromRequest, Query, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::types::error::UploadError;

/// Fields the webhook caller may send
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadParams {
    /// URL of the image to mirror
    #[serde(default)]
    pub url: Option<String>,
}

/// The `url` field of an upload request
///
/// Looked up in the query string first, then in a form-encoded or JSON body.
/// A repeated field resolves to its first value. The value is passed on
/// as-is; `None` when the caller did not send it.
pub struct ImageUrl(pub Option<String>);

/// Body encodings the `url` field may arrive in
enum BodyKind {
    Form,
    Json,
}

fn body_kind(req: &Request) -> Option<BodyKind> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)?
        .to_str()
        .ok()?
        .parse::<mime::Mime>()
        .ok()?;

    if content_type.type_() != mime::APPLICATION {
        return None;
    }

    if content_type.subtype() == mime::WWW_FORM_URLENCODED {
        Some(BodyKind::Form)
    } else if content_type.subtype() == mime::JSON {
        Some(BodyKind::Json)
    } else {
        None
    }
}

/// First `url` value among decoded `key=value` pairs
fn first_url(pairs: Vec<(String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .find_map(|(key, value)| (key == "url").then_some(value))
}

impl<S> FromRequest<S> for ImageUrl
where
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.uri().query().is_some() {
            let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
                .map_err(|err| UploadError::InvalidRequest(err.body_text()))?;

            if let Some(url) = first_url(pairs) {
                return Ok(Self(Some(url)));
            }
        }

        let url = match body_kind(&req) {
            Some(BodyKind::Form) => {
                let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                    .await
                    .map_err(|err| UploadError::InvalidRequest(err.body_text()))?;
                first_url(pairs)
            }
            Some(BodyKind::Json) => {
                let Json(params) = Json::<UploadParams>::from_request(req, state)
                    .await
                    .map_err(|err| UploadError::InvalidRequest(err.body_text()))?;
                params.url
            }
            None => None,
        };

        Ok(Self(url))
    }
}

impl OperationInput for ImageUrl {
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        // Document the query form; the same field is accepted in the body
        Query::<UploadParams>::operation_input(ctx, operation);
    }
}
