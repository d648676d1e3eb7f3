//! Pixelwave renders a continuously animating, pixelated, wave-shimmer
//! version of a still image onto a drawing surface.
//!
//! The pipeline: resolve a gravity-based cover-fit of the source over the
//! output region, average the drawn pixels into a coarse block grid, then
//! repaint every frame with a sinusoidal per-block alpha wave and a fade-in
//! intensity ramp.
//!
//! - [`PixelWave`] owns the lifecycle: `setup`, `start`/`stop`, re-layout.
//! - [`Surface`] and [`FrameScheduler`] are the ports to the drawing target
//!   and the animation tick source; [`PixmapSurface`], [`BackgroundSurface`],
//!   [`TimerScheduler`] and [`ManualScheduler`] are the bundled
//!   implementations.
#![forbid(unsafe_code)]

pub mod canvas;
pub mod core;
pub mod error;
pub mod geometry;
pub mod sample;
pub mod scheduler;
pub mod surface;

pub use crate::canvas::{LifecycleState, PixelWave, PixelWaveOpts, RepaintCallback};
pub use crate::core::{FrameRgba, HorizontalGravity, SourceImage, Style, VerticalGravity};
pub use crate::error::{PixelwaveError, PixelwaveResult};
pub use crate::geometry::{DrawGeometry, resolve_geometry};
pub use crate::sample::{BlockColor, BlockGrid, average_blocks};
pub use crate::scheduler::{FrameHandle, FrameScheduler, ManualScheduler, TimerScheduler};
pub use crate::surface::{
    BackgroundSurface, DisplayTarget, PixmapSurface, Surface, generate_surface_id,
};
