//! Collection+JSON response envelope.

use crate::collection::{CollectionDocument, MEDIA_TYPE};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// A Collection+JSON document with its status, served as `application/vnd.collection+json`.
pub struct CollectionJson {
    pub status: StatusCode,
    pub document: CollectionDocument,
    /// Set on creation; becomes the `Location` header.
    pub location: Option<String>,
}

impl CollectionJson {
    pub fn new(status: StatusCode, document: CollectionDocument) -> Self {
        CollectionJson {
            status,
            document,
            location: None,
        }
    }
}

pub fn ok(document: CollectionDocument) -> CollectionJson {
    CollectionJson::new(StatusCode::OK, document)
}

pub fn created(document: CollectionDocument, location: String) -> CollectionJson {
    CollectionJson {
        status: StatusCode::CREATED,
        document,
        location: Some(location),
    }
}

impl IntoResponse for CollectionJson {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.document) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize collection");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        let mut res = (self.status, [(header::CONTENT_TYPE, HeaderValue::from_static(MEDIA_TYPE))], body).into_response();
        if let Some(location) = self.location {
            if let Ok(v) = HeaderValue::from_str(&location) {
                res.headers_mut().insert(header::LOCATION, v);
            }
        }
        res
    }
}
