//! Resource intake: turn an image file into an embeddable `data:` URI.

use std::path::Path;

use base64::Engine as Base64Engine;

use crate::{Error, Result};

/// Encode raw image bytes as a `data:` URI, sniffing the format from the
/// magic bytes.
pub fn bytes_to_embeddable_image(bytes: &[u8]) -> Result<String> {
    let format = image::guess_format(bytes)
        .map_err(|e| Error::Validation(format!("not a recognised image: {e}")))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

/// Read `path` and encode it with [`bytes_to_embeddable_image`].
pub async fn file_to_embeddable_image(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(Error::Validation(format!("{} is empty", path.display())));
    }
    let uri = bytes_to_embeddable_image(&bytes)?;
    log::debug!("ingest: {} -> {} byte data URI", path.display(), uri.len());
    Ok(uri)
}
