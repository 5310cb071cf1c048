//! Streaming animation playback
//!
//! **Why**: A 300-frame GIF fully decoded at 1080p is gigabytes. The cache
//! therefore stores only an `AnimatedSource` (path, size, poster frame) and
//! every `load_animated` call gets its own `AnimatedHandle` that streams
//! frames on demand with its own cursor. Two handles never share playback
//! position.
//!
//! **Used by**: Loader (`load_animated`), CacheStore (animated bucket)
//!
//! # Frame pump
//!
//! Each handle owns a small thread that decodes frames ahead into a bounded
//! channel of `PUMP_DEPTH`. The pump blocks when the consumer is not pulling
//! and exits as soon as the handle is dropped (send fails). At end of stream
//! the file is reopened and playback loops.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use image::ImageFormat;
use log::{debug, trace, warn};

use super::decoder;
use super::frame::StillImage;

/// Frames decoded ahead of the consumer
const PUMP_DEPTH: usize = 2;

static NEXT_PUMP_ID: AtomicU64 = AtomicU64::new(0);

/// One displayable animation frame
#[derive(Debug, Clone)]
pub struct AnimFrame {
    pub image: Arc<StillImage>,
    pub delay: Duration,
}

/// Immutable description of a decodable animation. Shared through the cache.
#[derive(Debug)]
pub struct AnimatedSource {
    path: PathBuf,
    format: ImageFormat,
    target_width: Option<u32>,
    poster: Arc<StillImage>,
    first_delay: Duration,
}

impl AnimatedSource {
    pub(crate) fn new(
        path: PathBuf,
        format: ImageFormat,
        target_width: Option<u32>,
        poster: Arc<StillImage>,
        first_delay: Duration,
    ) -> Self {
        Self {
            path,
            format,
            target_width,
            poster,
            first_delay,
        }
    }

    /// Start an independent playback of this animation
    pub fn open(self: &Arc<Self>) -> AnimatedHandle {
        AnimatedHandle::new(Arc::clone(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Width hint the frames are scaled with
    pub fn target_width(&self) -> Option<u32> {
        self.target_width
    }

    /// First frame, decoded eagerly
    pub fn poster(&self) -> &Arc<StillImage> {
        &self.poster
    }

    pub fn first_delay(&self) -> Duration {
        self.first_delay
    }

    /// Size every streamed frame is delivered at
    pub fn dimensions(&self) -> (u32, u32) {
        self.poster.dimensions()
    }

    /// Resident bytes (only the poster stays in memory)
    pub fn mem(&self) -> usize {
        self.poster.mem()
    }
}

/// Exclusive playback cursor over an animation.
///
/// Not `Clone`: call `load_animated` again for a second, independent playback.
#[derive(Debug)]
pub struct AnimatedHandle {
    source: Arc<AnimatedSource>,
    frames: Receiver<AnimFrame>,
    current: Option<AnimFrame>,
    position: u64,
    ended: bool,
}

impl AnimatedHandle {
    fn new(source: Arc<AnimatedSource>) -> Self {
        let frames = spawn_pump(Arc::clone(&source));
        Self {
            source,
            frames,
            current: None,
            position: 0,
            ended: false,
        }
    }

    pub fn source(&self) -> &Arc<AnimatedSource> {
        &self.source
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.source.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// Frame to show before playback starts
    pub fn poster(&self) -> &Arc<StillImage> {
        self.source.poster()
    }

    /// Frame most recently advanced to
    pub fn current(&self) -> Option<&AnimFrame> {
        self.current.as_ref()
    }

    /// Number of frames advanced so far (keeps counting across loops)
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True once the stream broke (decode error mid-file)
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Advance to the next frame, blocking until the pump delivers it.
    /// Returns None once the stream has ended.
    pub fn next_frame(&mut self) -> Option<&AnimFrame> {
        if self.ended {
            return None;
        }
        match self.frames.recv() {
            Ok(frame) => self.advance(frame),
            Err(_) => {
                self.ended = true;
                None
            }
        }
    }

    /// Advance only if the next frame is already decoded
    pub fn try_next_frame(&mut self) -> Option<&AnimFrame> {
        if self.ended {
            return None;
        }
        match self.frames.try_recv() {
            Ok(frame) => self.advance(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.ended = true;
                None
            }
        }
    }

    fn advance(&mut self, frame: AnimFrame) -> Option<&AnimFrame> {
        self.position += 1;
        self.current = Some(frame);
        self.current.as_ref()
    }
}

fn spawn_pump(source: Arc<AnimatedSource>) -> Receiver<AnimFrame> {
    let (tx, rx) = bounded(PUMP_DEPTH);
    let id = NEXT_PUMP_ID.fetch_add(1, Ordering::Relaxed);

    let spawned = thread::Builder::new()
        .name(format!("anim-pump-{}", id))
        .spawn(move || {
            pump_frames(&source, &tx);
            trace!("Frame pump {} exiting", id);
        });

    // On spawn failure the sender is dropped with the closure and the
    // handle simply reports end of stream.
    if let Err(e) = spawned {
        warn!("Failed to start frame pump: {}", e);
    }
    rx
}

fn pump_frames(source: &AnimatedSource, tx: &Sender<AnimFrame>) {
    let (width, height) = source.dimensions();
    let mut loops = 0u64;

    loop {
        let frames = match decoder::open_frames(&source.path, source.format) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Cannot reopen animation {}: {}", source.path.display(), e);
                return;
            }
        };

        let mut sent = 0usize;
        for frame in frames {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Animation {} broke at frame {}: {}", source.path.display(), sent, e);
                    return;
                }
            };

            let delay = decoder::frame_delay(&frame);
            let image = decoder::resize_to(frame.into_buffer(), width, height);
            let frame = AnimFrame {
                image: Arc::new(StillImage::from_rgba(image)),
                delay,
            };

            if tx.send(frame).is_err() {
                return;
            }
            sent += 1;
        }

        if sent == 0 {
            debug!("Animation {} yielded no frames", source.path.display());
            return;
        }
        loops += 1;
        trace!("Animation {} loop {}", source.path.display(), loops);
    }
}
