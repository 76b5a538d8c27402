//! File uploads.
//!
//! Uploading is two calls: `POST uploads?type=` returns a pre-signed URL,
//! then the file goes to that URL as a multipart form with a single `data`
//! part. The returned `UploadedInfo` is what `AttachmentRequest::uploaded`
//! references in a new message.

use std::path::Path;

use tracing::debug;

use crate::client::{Client, Endpoint, Query};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::multipart::Form;
use crate::types::{UploadEndpoint, UploadType, UploadedInfo};

/// Facade for the `uploads` endpoint and the upload URLs it hands out.
#[derive(Debug, Clone, Copy)]
pub struct Uploads<'a> {
    client: &'a Client,
}

impl<'a> Uploads<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Requests a URL to upload a file of the given type to.
    pub fn get_upload_url(&self, ctx: &Context, kind: UploadType) -> Result<UploadEndpoint> {
        let mut query = Query::new();
        query.set("type", kind.as_str());
        self.client
            .call(ctx, Endpoint::post("uploads").query(query))
    }

    /// Uploads `data` under `file_name`.
    pub fn upload_bytes(
        &self,
        ctx: &Context,
        kind: UploadType,
        file_name: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<UploadedInfo> {
        let target = self.get_upload_url(ctx, kind)?;
        if target.url.is_empty() {
            return Err(Error::UnexpectedResponse(
                "server returned an empty upload URL".to_string(),
            ));
        }
        let form = Form::new().file("data", file_name, data);
        debug!(kind = kind.as_str(), file_name, "uploading file");

        let endpoint = Endpoint::post(target.url).multipart(form).unauthenticated();
        let mut info: UploadedInfo = self.client.call(ctx, endpoint)?;
        if info.token.is_none() {
            info.token = target.token;
        }
        Ok(info)
    }

    /// Reads the file at `path` and uploads it under its file name.
    pub fn upload_file(
        &self,
        ctx: &Context,
        kind: UploadType,
        path: impl AsRef<Path>,
    ) -> Result<UploadedInfo> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let data = std::fs::read(path)?;
        self.upload_bytes(ctx, kind, &file_name, data)
    }
}
