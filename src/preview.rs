//! Preview-URL resources for uploaded files.
//!
//! A host UI shows the uploaded document next to the converted result, which
//! needs a revocable handle (an object URL in a browser, a temp file or a cache
//! entry elsewhere). The handle is owned by [`crate::pipeline::upload::UploadedFile`]
//! as a [`PreviewUrl`] guard, so it is released exactly once, when the file is
//! superseded or the session is cleared.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Allocates and releases preview handles.
pub trait PreviewAllocator: Send + Sync {
    /// Allocate a handle for a file with the given name and MIME type.
    fn allocate(&self, name: &str, mime_type: &str) -> String;

    /// Release a handle previously returned by [`PreviewAllocator::allocate`].
    fn release(&self, url: &str);
}

/// Owned preview handle; releases itself on drop.
pub struct PreviewUrl {
    url: String,
    allocator: Arc<dyn PreviewAllocator>,
}

impl PreviewUrl {
    /// Allocate a new preview handle from `allocator`.
    pub fn allocate(allocator: &Arc<dyn PreviewAllocator>, name: &str, mime_type: &str) -> Self {
        let url = allocator.allocate(name, mime_type);
        debug!("Allocated preview {} for '{}'", url, name);
        Self {
            url,
            allocator: Arc::clone(allocator),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewUrl {
    fn drop(&mut self) {
        debug!("Releasing preview {}", self.url);
        self.allocator.release(&self.url);
    }
}

impl fmt::Debug for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewUrl").field(&self.url).finish()
    }
}

/// In-process registry handing out `blob:`-style identifiers.
///
/// Tracks which handles are still live so leaks show up in
/// [`ObjectUrlRegistry::live_count`].
#[derive(Default)]
pub struct ObjectUrlRegistry {
    next_id: AtomicU64,
    live: Mutex<HashSet<String>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles allocated and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl PreviewAllocator for ObjectUrlRegistry {
    fn allocate(&self, _name: &str, _mime_type: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("blob:math2word/{id}");
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.clone());
        url
    }

    fn release(&self, url: &str) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(url);
        if !removed {
            warn!("Release of unknown preview handle {}", url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_releases_handle() {
        let registry = Arc::new(ObjectUrlRegistry::new());
        let allocator: Arc<dyn PreviewAllocator> = registry.clone();

        let a = PreviewUrl::allocate(&allocator, "a.png", "image/png");
        let b = PreviewUrl::allocate(&allocator, "b.pdf", "application/pdf");
        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(registry.live_count(), 2);

        drop(a);
        assert_eq!(registry.live_count(), 1);
        drop(b);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn handles_look_like_object_urls() {
        let allocator: Arc<dyn PreviewAllocator> = Arc::new(ObjectUrlRegistry::new());
        let p = PreviewUrl::allocate(&allocator, "scan.png", "image/png");
        assert!(p.as_str().starts_with("blob:math2word/"));
    }
}
