use std::collections::HashMap;
use std::sync::Arc;

use sim_core::model::SlideId;

/// Slide image buffers for one session, keyed by slide.
///
/// Buffers are shared (`Arc`) so views can hold a slide image while it is displayed;
/// the session's own references go away on [`SessionAssets::release`] or drop.
#[derive(Debug, Clone, Default)]
pub struct SessionAssets {
    images: HashMap<SlideId, Arc<[u8]>>,
}

impl SessionAssets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slide: SlideId, bytes: impl Into<Arc<[u8]>>) {
        self.images.insert(slide, bytes.into());
    }

    #[must_use]
    pub fn with_image(mut self, slide: SlideId, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(slide, bytes);
        self
    }

    #[must_use]
    pub fn get(&self, slide: SlideId) -> Option<Arc<[u8]>> {
        self.images.get(&slide).cloned()
    }

    #[must_use]
    pub fn contains(&self, slide: SlideId) -> bool {
        self.images.contains_key(&slide)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.images.values().map(|b| b.len()).sum()
    }

    /// Drop every buffer and report how many bytes were released.
    pub fn release(&mut self) -> usize {
        let released = self.total_bytes();
        self.images.clear();
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_clears_and_reports_bytes() {
        let mut assets = SessionAssets::new()
            .with_image(SlideId::new(1), vec![0_u8; 4])
            .with_image(SlideId::new(2), vec![0_u8; 6]);
        assert_eq!(assets.total_bytes(), 10);
        assert_eq!(assets.release(), 10);
        assert!(assets.is_empty());
        assert_eq!(assets.release(), 0);
    }

    #[test]
    fn shared_buffer_outlives_release() {
        let mut assets = SessionAssets::new().with_image(SlideId::new(1), vec![7_u8; 3]);
        let held = assets.get(SlideId::new(1)).unwrap();
        assets.release();
        assert_eq!(&*held, &[7, 7, 7]);
        assert!(!assets.contains(SlideId::new(1)));
    }
}
