use std::collections::BTreeMap;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tracing::debug;

use crate::error::{PreviewError, Result};
use crate::normalize::CanonicalImage;
use crate::settings::{DisplayMode, SubmitMode};

/// One displayable slot: a primary image and, for comparison entries, its
/// paired secondary.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub primary: Arc<CanonicalImage>,
    pub secondary: Option<Arc<CanonicalImage>>,
}

/// Fingerprint of one submission, used to skip byte-identical re-runs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubmissionKey {
    primary: Vec<u64>,
    compare: Vec<u64>,
    display_mode: DisplayMode,
}

/// Index-addressable image sequence shared by all display modes.
///
/// Every accepted entry gets the next 1-based index; indices are never
/// reused within one accumulation run. A comparison pair consumes one
/// index; simple submissions consume one index per image. Navigation
/// operates over the sorted set of assigned indices and wraps at the ends.
#[derive(Debug, Default)]
pub struct ImageQueue {
    entries: BTreeMap<u64, QueueEntry>,
    next_index: u64,
    current: u64,
    last_submission: Option<SubmissionKey>,
}

impl ImageQueue {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_index: 1,
            current: 0,
            last_submission: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accept one submission. Returns false when an `append` was skipped by
    /// the duplicate guard; the queue is unchanged in that case.
    pub fn submit(
        &mut self,
        primaries: Vec<CanonicalImage>,
        compares: Vec<CanonicalImage>,
        display_mode: DisplayMode,
        submit_mode: SubmitMode,
    ) -> bool {
        let key = SubmissionKey {
            primary: primaries.iter().map(CanonicalImage::content_hash).collect(),
            compare: compares.iter().map(CanonicalImage::content_hash).collect(),
            display_mode,
        };

        match submit_mode {
            SubmitMode::New => {
                self.entries.clear();
                self.next_index = 1;
                self.last_submission = None;
            }
            SubmitMode::Append => {
                if self.last_submission.as_ref() == Some(&key) {
                    debug!("duplicate submission detected, skipping append");
                    return false;
                }
            }
        }

        let compares: Vec<Arc<CanonicalImage>> = compares.into_iter().map(Arc::new).collect();
        let pair_compares = display_mode == DisplayMode::Comparison && !compares.is_empty();
        let mut latest = self.current;
        for (i, primary) in primaries.into_iter().enumerate() {
            let secondary = if pair_compares {
                compares.get(i).cloned()
            } else {
                None
            };
            let index = self.next_index;
            self.next_index += 1;
            self.entries.insert(
                index,
                QueueEntry {
                    primary: Arc::new(primary),
                    secondary,
                },
            );
            latest = index;
        }

        // Keep the viewer where it was when that entry still exists;
        // otherwise show the newest content.
        if !self.entries.contains_key(&self.current) {
            self.current = latest;
        }
        self.last_submission = Some(key);
        true
    }

    /// The entry currently displayed, resolving a stale index to the first
    /// assigned one.
    pub fn current_entry(&self) -> Option<(u64, &QueueEntry)> {
        if let Some(entry) = self.entries.get(&self.current) {
            return Some((self.current, entry));
        }
        self.entries.iter().next().map(|(idx, e)| (*idx, e))
    }

    pub fn current_index(&self) -> Option<u64> {
        self.current_entry().map(|(idx, _)| idx)
    }

    /// 1-based position of the current entry and the total count, for the
    /// window title.
    pub fn position(&self) -> (usize, usize) {
        let total = self.entries.len();
        let pos = self
            .current_index()
            .map(|cur| self.entries.range(..=cur).count())
            .unwrap_or(0);
        (pos, total)
    }

    /// Step forward (`1`) or back (`-1`) over the sorted indices, wrapping.
    pub fn advance(&mut self, direction: i32) {
        if self.entries.len() < 2 {
            return;
        }
        let indices: Vec<u64> = self.entries.keys().copied().collect();
        let cur = match self.current_index() {
            Some(c) => c,
            None => return,
        };
        let pos = indices.iter().position(|&i| i == cur).unwrap_or(0);
        let next = if direction >= 0 {
            (pos + 1) % indices.len()
        } else {
            (pos + indices.len() - 1) % indices.len()
        };
        self.current = indices[next];
    }

    /// Jump straight to an assigned index. Unknown indices are ignored.
    pub fn jump(&mut self, index: u64) -> bool {
        if self.entries.contains_key(&index) {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// PNG bytes for the primary image at `index`. This is the read contract
    /// the external HTTP front-end consumes.
    pub fn png_bytes(&self, index: u64) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(&index)
            .ok_or_else(|| PreviewError::RenderFrame(format!("no image at index {index}")))?;
        let img = entry.primary.pixels();
        let mut out = Vec::new();
        PngEncoder::new(&mut out).write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }
}
