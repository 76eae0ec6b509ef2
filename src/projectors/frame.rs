//! Video frame projector

use image::ImageFormat;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

use super::Projector;
use crate::types::Envelope;
use crate::{FeedError, Result};

/// Decoded frame as tightly packed RGBA8 pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelSurface {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub rgba: Vec<u8>,
}

impl fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Turns opaque encoded frame bytes into pixels.
pub trait ImageDecoder: Send + 'static {
    fn decode(&self, encoded: &[u8]) -> Result<PixelSurface>;
}

/// JPEG decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl ImageDecoder for JpegDecoder {
    fn decode(&self, encoded: &[u8]) -> Result<PixelSurface> {
        let image = image::load_from_memory_with_format(encoded, ImageFormat::Jpeg)
            .map_err(|e| FeedError::frame_decode(e.to_string()))?;
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(PixelSurface { width, height, rgba: rgba.into_raw() })
    }
}

/// Latest successfully decoded frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameView {
    /// Increments on every newly published frame.
    pub generation: u64,
    pub surface: Option<Arc<PixelSurface>>,
}

/// Decodes each envelope's frame and publishes the result.
///
/// A frame that fails to decode is reported and skipped; the previous frame
/// stays on screen.
///
/// # Cost
///
/// `apply` runs inside the delivery loop on the connection's driver task, so
/// the decode holds up both the next inbound read and the runtime worker that
/// polls the driver. For large frames or a slow decoder, skip this projector
/// and register a listener that forwards [`EncodedFrame`](crate::EncodedFrame)
/// bytes to [`tokio::task::spawn_blocking`] instead; the frame payload is an
/// `Arc` and the clone is cheap.
pub struct FrameProjector<D: ImageDecoder = JpegDecoder> {
    decoder: D,
    view: FrameView,
    decode_failures: u64,
}

impl FrameProjector<JpegDecoder> {
    pub fn new() -> Self {
        Self::with_decoder(JpegDecoder)
    }
}

impl Default for FrameProjector<JpegDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ImageDecoder> FrameProjector<D> {
    pub fn with_decoder(decoder: D) -> Self {
        Self { decoder, view: FrameView::default(), decode_failures: 0 }
    }

    /// Frames dropped because they did not decode.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

impl<D: ImageDecoder> Projector for FrameProjector<D> {
    type View = FrameView;

    fn apply(&mut self, envelope: &Envelope) -> bool {
        let Some(frame) = envelope.frame.as_ref() else {
            return false;
        };

        match self.decoder.decode(frame.as_bytes()) {
            Ok(surface) => {
                self.view.generation += 1;
                trace!(
                    generation = self.view.generation,
                    width = surface.width,
                    height = surface.height,
                    "Frame decoded"
                );
                self.view.surface = Some(Arc::new(surface));
                true
            }
            Err(e) => {
                self.decode_failures += 1;
                warn!(error = %e, bytes = frame.len(), "Keeping previous frame");
                false
            }
        }
    }

    fn view(&self) -> &FrameView {
        &self.view
    }
}

impl<D: ImageDecoder> fmt::Debug for FrameProjector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameProjector")
            .field("generation", &self.view.generation)
            .field("decode_failures", &self.decode_failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{frame_envelope, tiny_jpeg};
    use crate::types::EncodedFrame;

    /// Decoder that accepts anything starting with `OK`.
    struct PrefixDecoder;

    impl ImageDecoder for PrefixDecoder {
        fn decode(&self, encoded: &[u8]) -> Result<PixelSurface> {
            if encoded.starts_with(b"OK") {
                Ok(PixelSurface { width: 1, height: 1, rgba: vec![encoded.len() as u8, 0, 0, 255] })
            } else {
                Err(FeedError::frame_decode("not OK"))
            }
        }
    }

    fn with_frame(bytes: &[u8]) -> Envelope {
        Envelope { frame: Some(EncodedFrame::new(bytes.to_vec())), stats: None }
    }

    #[test]
    fn decodes_real_jpeg() {
        let mut projector = FrameProjector::new();
        let envelope = Envelope::decode(frame_envelope(&tiny_jpeg()).as_bytes()).unwrap();

        assert!(projector.apply(&envelope));
        let surface = projector.view().surface.clone().expect("decoded");
        assert_eq!((surface.width, surface.height), (4, 4));
        assert_eq!(surface.rgba.len(), 4 * 4 * 4);
        assert_eq!(projector.view().generation, 1);
    }

    #[test]
    fn failed_decode_keeps_previous_frame() {
        let mut projector = FrameProjector::with_decoder(PrefixDecoder);
        assert!(projector.apply(&with_frame(b"OK-1")));
        let before = projector.view().clone();

        assert!(!projector.apply(&with_frame(b"garbage")));
        assert_eq!(projector.view(), &before);
        assert_eq!(projector.decode_failures(), 1);

        assert!(projector.apply(&with_frame(b"OK-22")));
        assert_eq!(projector.view().generation, 2);
    }

    #[tokio::test]
    async fn frames_can_be_decoded_off_the_delivery_path() {
        use crate::registry::{ListenerHandle, SubscriberRegistry};
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::unbounded_channel::<EncodedFrame>();
        let registry = SubscriberRegistry::new();
        registry.add(ListenerHandle::new(move |envelope: &Envelope| {
            if let Some(frame) = &envelope.frame {
                let _ = tx.send(frame.clone());
            }
        }));

        let envelope = Envelope::decode(frame_envelope(&tiny_jpeg()).as_bytes()).unwrap();
        assert_eq!(registry.deliver(&envelope).delivered, 1);

        let frame = rx.recv().await.unwrap();
        let surface = tokio::task::spawn_blocking(move || JpegDecoder.decode(frame.as_bytes()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!((surface.width, surface.height), (4, 4));
    }

    #[test]
    fn jpeg_decoder_rejects_non_jpeg() {
        assert!(matches!(JpegDecoder.decode(b"\x89PNG\r\n"), Err(FeedError::FrameDecode { .. })));
    }

    #[test]
    fn stats_only_envelope_is_ignored() {
        let mut projector = FrameProjector::with_decoder(PrefixDecoder);
        assert!(!projector.apply(&Envelope::decode(br#"{"stats":{"TotalVehicles":1}}"#).unwrap()));
        assert_eq!(projector.view().generation, 0);
    }
}
