use async_trait::async_trait;

use crate::error::Error;

/// A decoded frame in packed BGR layout
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of the frame within its source; resets when a file source rewinds
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Frame filled with a single gray level
    pub fn uniform(index: u64, width: u32, height: u32, level: u8) -> Self {
        Self {
            index,
            width,
            height,
            pixels: vec![level; width as usize * height as usize * 3],
        }
    }

    /// Mean luma over the frame using BT.601 weights.
    ///
    /// Returns `None` when the frame carries no complete pixel.
    pub fn mean_brightness(&self) -> Option<f64> {
        let pixel_count = self.pixels.len() / 3;
        if pixel_count == 0 {
            return None;
        }

        let total: f64 = self
            .pixels
            .chunks_exact(3)
            .map(|bgr| 0.114 * bgr[0] as f64 + 0.587 * bgr[1] as f64 + 0.299 * bgr[2] as f64)
            .sum();

        Some(total / pixel_count as f64)
    }
}

/// Capture collaborator feeding the aggregation loop
#[async_trait]
pub trait FrameSource: Send {
    /// Open the underlying device or file. Failure here is fatal for the loop.
    async fn open(&mut self) -> Result<(), Error>;

    /// Next frame, or `None` at end of stream
    async fn read(&mut self) -> Result<Option<Frame>, Error>;

    /// Seek back to the first frame
    async fn rewind(&mut self) -> Result<(), Error>;

    /// Live sources cannot be rewound; read failures end the loop
    fn is_live(&self) -> bool;

    /// Release the device or file handle
    fn release(&mut self);
}
