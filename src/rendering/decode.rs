/// Image decoding with a per-resource cache
///
/// Each resource id gets one [`OnceCell`]; the first caller decodes the
/// embedded bytes on the blocking pool and every later caller (including
/// concurrent ones) awaits the same result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::Engine as Base64Engine;
use image::RgbaImage;
use tokio::sync::OnceCell;

use crate::{Error, Result};

/// Embedded image payload of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub id: u64,
    pub data: Arc<str>,
}

impl ImageSource {
    pub fn new(id: u64, data: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }
}

/// Split a `data:` URI and return its decoded payload.
pub fn data_uri_bytes(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::Decode("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Decode("data URI has no payload".into()))?;
    if !meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(Error::Decode(format!(
            "unsupported data URI encoding '{meta}'"
        )));
    }
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| Error::Decode(format!("base64: {e}")))
}

/// Decode an embedded image to RGBA8.
pub fn decode_image(uri: &str) -> Result<RgbaImage> {
    let bytes = data_uri_bytes(uri)?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| Error::Decode(format!("image: {e}")))?;
    Ok(img.to_rgba8())
}

type Slot = Arc<OnceCell<Arc<RgbaImage>>>;

/// Shared cache of decoded images, keyed by resource id.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct DecodeCache {
    slots: Arc<Mutex<HashMap<u64, Slot>>>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: u64) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.entry(id).or_default().clone()
    }

    /// Await the decoded image for `source`, decoding it on first use.
    ///
    /// A failed decode is not cached; the next call tries again.
    pub async fn get(&self, source: &ImageSource) -> Result<Arc<RgbaImage>> {
        let slot = self.slot(source.id);
        let data = source.data.clone();
        let id = source.id;
        let image = slot
            .get_or_try_init(|| async move {
                let decoded = tokio::task::spawn_blocking(move || decode_image(&data))
                    .await
                    .map_err(|e| Error::Other(format!("decode task for {id} failed: {e}")))??;
                log::debug!(
                    "decode: resource {id} ready ({}x{})",
                    decoded.width(),
                    decoded.height()
                );
                Ok::<_, Error>(Arc::new(decoded))
            })
            .await?;
        Ok(image.clone())
    }

    /// Start decoding in the background so a later [`DecodeCache::get`]
    /// finds the image ready. Without a tokio runtime this is a no-op.
    pub fn prefetch(&self, source: &ImageSource) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self.is_ready(source.id) {
            return;
        }
        let cache = self.clone();
        let source = source.clone();
        handle.spawn(async move {
            if let Err(e) = cache.get(&source).await {
                log::warn!("decode: prefetch of resource {} failed: {e}", source.id);
            }
        });
    }

    pub fn is_ready(&self, id: u64) -> bool {
        let slots = match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.get(&id).map(|s| s.initialized()).unwrap_or(false)
    }

    /// Drop every entry whose id fails `keep`; returns how many went.
    pub fn retain(&self, keep: impl Fn(u64) -> bool) -> usize {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = slots.len();
        slots.retain(|id, _| keep(*id));
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        match self.slots.lock() {
            Ok(g) => g.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget a resource, e.g. after it was deleted from the store.
    pub fn evict(&self, id: u64) {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_data_uri(w: u32, h: u32, px: [u8; 4]) -> String {
        let img = RgbaImage::from_pixel(w, h, Rgba(px));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
        )
    }

    #[test]
    fn decodes_png_data_uri() {
        let img = decode_image(&png_data_uri(3, 2, [1, 2, 3, 255])).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [1, 2, 3, 255]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(decode_image("http://x/y.png"), Err(Error::Decode(_))));
        assert!(matches!(decode_image("data:image/png,abc"), Err(Error::Decode(_))));
        assert!(matches!(
            decode_image("data:image/png;base64,bm90IGFuIGltYWdl"),
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn cache_decodes_once_and_shares() {
        let cache = DecodeCache::new();
        let src = ImageSource::new(7, png_data_uri(4, 4, [9, 9, 9, 255]));
        assert!(!cache.is_ready(7));
        let a = cache.get(&src).await.unwrap();
        let b = cache.clone().get(&src).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.is_ready(7));
        cache.evict(7);
        assert!(!cache.is_ready(7));
    }

    #[tokio::test]
    async fn retain_keeps_only_listed_ids() {
        let cache = DecodeCache::new();
        for id in 1..=3 {
            cache
                .get(&ImageSource::new(id, png_data_uri(1, 1, [0, 0, 0, 255])))
                .await
                .unwrap();
        }
        assert_eq!(cache.retain(|id| id == 2), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_ready(2));
        assert!(!cache.is_ready(1));
    }

    #[tokio::test]
    async fn failed_decode_is_retried() {
        let cache = DecodeCache::new();
        let bad = ImageSource::new(1, "data:image/png;base64,AAAA");
        assert!(cache.get(&bad).await.is_err());
        assert!(!cache.is_ready(1));
    }
}
