//! Bounded in-memory history of recent captures.

use std::collections::VecDeque;

use crate::capture::{CaptureError, CapturedImage};

/// Number of captures kept for re-selection.
pub const HISTORY_CAPACITY: usize = 5;

/// The most recent captures, newest first. Never holds more than
/// [`HISTORY_CAPACITY`] entries; older ones fall off silently.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    entries: VecDeque<CapturedImage>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Record a capture as the newest entry, evicting the oldest if full.
    pub fn record(&mut self, image: CapturedImage) {
        self.entries.push_front(image);
        if let Some(evicted) = truncate(&mut self.entries) {
            log::debug!("History full, dropped capture {}", evicted.digest());
        }
    }

    /// Copy of the entry at `index` (0 = newest). Order is unchanged.
    pub fn select(&self, index: usize) -> Result<CapturedImage, CaptureError> {
        self.entries
            .get(index)
            .cloned()
            .ok_or(CaptureError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    pub fn latest(&self) -> Option<&CapturedImage> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &CapturedImage> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn truncate(entries: &mut VecDeque<CapturedImage>) -> Option<CapturedImage> {
    if entries.len() > HISTORY_CAPACITY {
        entries.pop_back()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SourceKind, UploadAdapter};
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    /// Distinct tiny PNGs so each has its own digest.
    fn image(seed: u8) -> CapturedImage {
        let img = ImageBuffer::from_pixel(1, 1, Rgb([seed, 0, 0]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        UploadAdapter::default().ingest(buf, "image/png").unwrap()
    }

    #[test]
    fn test_record_newest_first() {
        let mut history = SessionHistory::new();
        let a = image(1);
        let b = image(2);
        history.record(a.clone());
        history.record(b.clone());
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().digest(), b.digest());
        assert_eq!(history.select(1).unwrap().digest(), a.digest());
    }

    #[test]
    fn test_six_records_keep_last_five() {
        let mut history = SessionHistory::new();
        let images: Vec<_> = (0..6).map(image).collect();
        for img in &images {
            history.record(img.clone());
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        let kept: Vec<_> = history.iter().map(|i| i.digest().to_string()).collect();
        let expected: Vec<_> = images[1..]
            .iter()
            .rev()
            .map(|i| i.digest().to_string())
            .collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_len_bounded_for_many_records() {
        let mut history = SessionHistory::new();
        for i in 0..50u8 {
            history.record(image(i));
            assert!(history.len() <= HISTORY_CAPACITY);
        }
        assert_eq!(history.latest().unwrap().digest(), image(49).digest());
    }

    #[test]
    fn test_select_out_of_range() {
        let mut history = SessionHistory::new();
        history.record(image(1));
        assert!(matches!(
            history.select(1),
            Err(CaptureError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_select_does_not_reorder() {
        let mut history = SessionHistory::new();
        for i in 0..3 {
            history.record(image(i));
        }
        let before: Vec<_> = history.iter().map(|i| i.digest().to_string()).collect();
        let picked = history.select(2).unwrap();
        let after: Vec<_> = history.iter().map(|i| i.digest().to_string()).collect();
        assert_eq!(before, after);
        assert_eq!(picked.source(), SourceKind::UploadedFile);
    }

    #[test]
    fn test_clear() {
        let mut history = SessionHistory::new();
        history.record(image(1));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
