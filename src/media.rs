use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Uploads a binary file to an external media host and returns its public URL.
pub trait MediaUploader: Send + Sync {
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> BoxFuture<'static, anyhow::Result<String>>;
}

#[derive(Clone)]
pub struct MockUploader {
    pub base_url: String,
    pub fail: bool,
}

impl MediaUploader for MockUploader {
    fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> BoxFuture<'static, anyhow::Result<String>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), file_name);
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                anyhow::bail!("mock media host refused the upload");
            }
            Ok(url)
        })
    }
}

/// Unsigned uploads through a Cloudinary upload preset.
#[derive(Clone)]
pub struct CloudinaryUploader {
    pub cloud_name: String,
    pub upload_preset: String,
    client: reqwest::Client,
}

impl CloudinaryUploader {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let cloud_name = std::env::var("CLOUDINARY_CLOUD_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let upload_preset = std::env::var("CLOUDINARY_UPLOAD_PRESET")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        Some(Self::new(cloud_name, upload_preset))
    }

    pub fn endpoint(&self) -> String {
        format!("https://api.cloudinary.com/v1_1/{}/image/upload", self.cloud_name)
    }
}

impl MediaUploader for CloudinaryUploader {
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> BoxFuture<'static, anyhow::Result<String>> {
        let url = self.endpoint();
        let preset = self.upload_preset.clone();
        let client = self.client.clone();
        let file_name = file_name.to_string();

        Box::pin(async move {
            let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
            let form = reqwest::multipart::Form::new()
                .part("file", part)
                .text("upload_preset", preset);
            let resp = client.post(url).multipart(form).send().await?;
            if !resp.status().is_success() {
                anyhow::bail!("media host returned {}", resp.status());
            }
            let body: serde_json::Value = resp.json().await?;
            body.get("secure_url")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("media host response has no secure_url"))
        })
    }
}

/// Where an uploaded image ends up in the form being built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Header,
    Question(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("an upload is already in progress for {0:?}")]
    SlotBusy(ImageSlot),
}

/// Tracks which image slots have an upload in flight.
#[derive(Clone, Default)]
pub struct UploadSlots {
    in_flight: Arc<DashMap<ImageSlot, ()>>,
}

impl UploadSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_uploading(&self, slot: &ImageSlot) -> bool {
        self.in_flight.contains_key(slot)
    }

    /// Marks the slot busy until the returned guard is dropped.
    pub fn claim(&self, slot: &ImageSlot) -> Result<SlotGuard, UploadError> {
        match self.in_flight.entry(slot.clone()) {
            Entry::Occupied(_) => return Err(UploadError::SlotBusy(slot.clone())),
            Entry::Vacant(v) => {
                v.insert(());
            }
        }
        Ok(SlotGuard {
            in_flight: Arc::clone(&self.in_flight),
            slot: slot.clone(),
        })
    }
}

pub struct SlotGuard {
    in_flight: Arc<DashMap<ImageSlot, ()>>,
    slot: ImageSlot,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.slot);
    }
}

/// Uploads an image for `slot`. A failed upload yields `Ok(None)`, which the
/// caller treats as "no image set".
pub async fn upload_image(
    uploader: &dyn MediaUploader,
    slots: &UploadSlots,
    slot: ImageSlot,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Option<String>, UploadError> {
    let _guard = slots.claim(&slot)?;
    match uploader.upload(file_name, bytes).await {
        Ok(url) => Ok(Some(url)),
        Err(err) => {
            warn!("image upload for {:?} failed: {}", slot, err);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock(fail: bool) -> MockUploader {
        MockUploader {
            base_url: "https://media.example/".into(),
            fail,
        }
    }

    #[tokio::test]
    async fn successful_upload_returns_url_and_frees_slot() {
        let slots = UploadSlots::new();
        let url = upload_image(&mock(false), &slots, ImageSlot::Header, "banner.png", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("https://media.example/banner.png"));
        assert!(!slots.is_uploading(&ImageSlot::Header));
    }

    #[tokio::test]
    async fn failed_upload_means_no_image() {
        let slots = UploadSlots::new();
        let slot = ImageSlot::Question("q1".into());
        let url = upload_image(&mock(true), &slots, slot.clone(), "q1.png", Vec::new())
            .await
            .unwrap();
        assert!(url.is_none());
        assert!(!slots.is_uploading(&slot));
    }

    #[tokio::test]
    async fn second_upload_to_busy_slot_is_rejected() {
        let slots = UploadSlots::new();
        let slot = ImageSlot::Question("q1".into());
        let guard = slots.claim(&slot).unwrap();
        let err = upload_image(&mock(false), &slots, slot.clone(), "q1.png", Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, UploadError::SlotBusy(slot.clone()));

        // other slots stay available
        let header = upload_image(&mock(false), &slots, ImageSlot::Header, "h.png", Vec::new())
            .await
            .unwrap();
        assert!(header.is_some());

        drop(guard);
        assert!(!slots.is_uploading(&slot));
    }

    #[test]
    fn cloudinary_endpoint_uses_cloud_name() {
        let uploader = CloudinaryUploader::new("demo", "unsigned");
        assert_eq!(uploader.endpoint(), "https://api.cloudinary.com/v1_1/demo/image/upload");
    }
}
