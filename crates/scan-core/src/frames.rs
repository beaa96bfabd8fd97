//! Continuous scanning over a stream of frames

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{QRScanner, ScanItem};

/// Shared stop signal, checked between frames
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameScanSummary {
    /// Frames pulled from the source
    pub frames_seen: usize,
    /// Frames actually decoded (see `frame_stride`)
    pub frames_processed: usize,
    pub cancelled: bool,
    /// Distinct results in the order they were first seen
    pub hits: Vec<ScanItem>,
}

pub struct FrameScanner<'a> {
    scanner: &'a QRScanner,
    stop_on_first: bool,
    frame_stride: usize,
}

impl<'a> FrameScanner<'a> {
    pub fn new(scanner: &'a QRScanner) -> Self {
        Self {
            scanner,
            stop_on_first: false,
            frame_stride: 1,
        }
    }

    /// Stop after the first frame that yields a new code
    pub fn stop_on_first(mut self, stop: bool) -> Self {
        self.stop_on_first = stop;
        self
    }

    /// Decode every n-th frame only
    pub fn frame_stride(mut self, stride: usize) -> Self {
        self.frame_stride = stride.max(1);
        self
    }

    /// Decode frames until the source is exhausted, `cancel` is set, or a
    /// code is found with `stop_on_first`. `on_hit` fires once per distinct
    /// content.
    pub fn run<I, F>(&self, frames: I, cancel: &CancelFlag, mut on_hit: F) -> FrameScanSummary
    where
        I: IntoIterator<Item = GrayImage>,
        F: FnMut(&ScanItem),
    {
        let mut summary = FrameScanSummary::default();
        let mut seen = HashSet::new();

        for frame in frames {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.frames_seen += 1;
            if (summary.frames_seen - 1) % self.frame_stride != 0 {
                continue;
            }
            summary.frames_processed += 1;

            let result = match self.scanner.scan_image(&frame) {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("Frame {}: scan failed: {}", summary.frames_seen, e);
                    continue;
                }
            };

            let mut found_new = false;
            for item in result.codes {
                if seen.insert(item.content.clone()) {
                    on_hit(&item);
                    summary.hits.push(item);
                    found_new = true;
                }
            }

            if found_new && self.stop_on_first {
                break;
            }
        }

        log::info!(
            "Frame scan finished: {} seen, {} processed, {} hits{}",
            summary.frames_seen,
            summary.frames_processed,
            summary.hits.len(),
            if summary.cancelled { ", cancelled" } else { "" }
        );
        summary
    }
}
