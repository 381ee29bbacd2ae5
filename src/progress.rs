//! Progress-callback trait for per-image captioning events.
//!
//! Inject an [`Arc<dyn CaptionProgressCallback>`] via
//! [`crate::config::PoseConfigBuilder::progress_callback`] to receive events
//! while [`crate::lookup::describe_all`] captions every image of a document.
//!
//! # Example
//!
//! ```rust
//! use pdf_pose_finder::{CaptionProgressCallback, PoseConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     described: Arc<AtomicUsize>,
//! }
//!
//! impl CaptionProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, caption_len: usize) {
//!         self.described.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("image {}/{} described ({} chars)", index, total, caption_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     described: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PoseConfig::builder()
//!     .progress_callback(counter as Arc<dyn CaptionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::lookup::describe_all`] as it captions each image.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` several
/// images are in flight at once and events may interleave. All methods have
/// no-op defaults.
pub trait CaptionProgressCallback: Send + Sync {
    /// Called once before the first caption request.
    fn on_batch_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before the caption request for an image is sent.
    ///
    /// `index` is 1-based position in the record sequence.
    fn on_image_start(&self, index: usize, total_images: usize) {
        let _ = (index, total_images);
    }

    /// Called when an image was described.
    fn on_image_complete(&self, index: usize, total_images: usize, caption_len: usize) {
        let _ = (index, total_images, caption_len);
    }

    /// Called when the description for an image is unavailable.
    ///
    /// Takes an owned `String` so implementations can move it into a `Send`
    /// future without borrowing from the pipeline.
    fn on_image_error(&self, index: usize, total_images: usize, error: String) {
        let _ = (index, total_images, error);
    }

    /// Called once after every image has been attempted.
    fn on_batch_complete(&self, total_images: usize, described: usize) {
        let _ = (total_images, described);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PoseConfig`].
pub type ProgressCallback = Arc<dyn CaptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<String>>,
        batch_total: AtomicUsize,
        described: AtomicUsize,
    }

    impl CaptionProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_images: usize) {
            self.batch_total.store(total_images, Ordering::SeqCst);
        }

        fn on_image_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _index: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _index: usize, _total: usize, error: String) {
            self.errors.lock().unwrap().push(error);
        }

        fn on_batch_complete(&self, _total: usize, described: usize) {
            self.described.store(described, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_image_start(1, 2);
        cb.on_image_complete(1, 2, 40);
        cb.on_image_error(2, 2, "timed out".to_string());
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(3);
        tracker.on_image_start(1, 3);
        tracker.on_image_complete(1, 3, 120);
        tracker.on_image_start(2, 3);
        tracker.on_image_error(2, 3, "HTTP 503".to_string());
        tracker.on_batch_complete(3, 1);

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.errors.lock().unwrap(), vec!["HTTP 503"]);
        assert_eq!(tracker.described.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn CaptionProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
    }
}
