use crate::{
    core::{HorizontalGravity, SourceImage, Style, VerticalGravity},
    error::{PixelwaveError, PixelwaveResult},
    geometry::{DrawGeometry, resolve_geometry},
    sample::{BlockGrid, average_blocks},
    scheduler::{FrameHandle, FrameScheduler},
    surface::Surface,
};

/// Where the renderer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Running,
    Stopped,
}

/// Construction-time tunables. Defaults match the shipped effect: 30x30
/// blocks with no border, right/bottom gravity, fade-in from zero at one
/// percent per frame.
#[derive(Clone, Copy, Debug)]
pub struct PixelWaveOpts {
    pub style: Style,
    pub h_gravity: HorizontalGravity,
    pub v_gravity: VerticalGravity,
    /// Starting fade-in intensity, clamped to `[0, 100]`.
    pub initial_intensity: f64,
    /// Intensity added per frame until saturation at 100.
    pub intensity_step: f64,
}

impl Default for PixelWaveOpts {
    fn default() -> Self {
        Self {
            style: Style::default(),
            h_gravity: HorizontalGravity::Right,
            v_gravity: VerticalGravity::Bottom,
            initial_intensity: 0.0,
            intensity_step: 1.0,
        }
    }
}

/// Callback handed the surface after every presented frame.
pub type RepaintCallback = Box<dyn FnMut(&dyn Surface)>;

const PHASE_STEP: f64 = 0.05;
const PHASE_WRAP: f64 = 100.0;
const INTENSITY_MAX: f64 = 100.0;

/// The pixel-wave renderer: owns the source image, the surface, the
/// scheduler, the cached draw geometry and block grid, and the animation
/// state (`phase`, `intensity`).
///
/// All state is confined to the owning thread; callers serialize
/// `stop`/`start`/re-layout with respect to in-flight frames by construction.
pub struct PixelWave {
    source: SourceImage,
    surface: Box<dyn Surface>,
    scheduler: Box<dyn FrameScheduler>,

    style: Style,
    h_gravity: HorizontalGravity,
    v_gravity: VerticalGravity,
    intensity_step: f64,

    state: LifecycleState,
    geometry: Option<DrawGeometry>,
    grid: BlockGrid,
    phase: f64,
    intensity: f64,
    pending: Option<FrameHandle>,
    repaint: Option<RepaintCallback>,
}

impl PixelWave {
    pub fn new(
        source: SourceImage,
        surface: Box<dyn Surface>,
        scheduler: Box<dyn FrameScheduler>,
        opts: PixelWaveOpts,
    ) -> Self {
        Self {
            source,
            surface,
            scheduler,
            style: opts.style,
            h_gravity: opts.h_gravity,
            v_gravity: opts.v_gravity,
            intensity_step: opts.intensity_step,
            state: LifecycleState::Uninitialized,
            geometry: None,
            grid: BlockGrid::default(),
            phase: 0.0,
            intensity: opts.initial_intensity.clamp(0.0, INTENSITY_MAX),
            pending: None,
            repaint: None,
        }
    }

    /// One-time initialisation: validate collaborators, resolve geometry,
    /// sample the block grid, paint one frame synchronously and arm the
    /// frame loop. Idempotent: a second call is a no-op.
    pub fn setup(&mut self) -> PixelwaveResult<()> {
        if self.state != LifecycleState::Uninitialized {
            return Ok(());
        }

        if self.source.width() == 0 || self.source.height() == 0 || self.source.rgba8().is_empty()
        {
            return Err(PixelwaveError::setup("source image is not decoded"));
        }
        if self.surface.width() == 0 || self.surface.height() == 0 {
            return Err(PixelwaveError::setup("output target has no usable size"));
        }

        self.state = LifecycleState::Ready;
        self.recompute_geometry()?;
        self.resample()?;
        self.render_step()?;
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Refresh the cached draw geometry from the current source and surface
    /// dimensions. Part of the re-layout path; the caller decides when.
    pub fn recompute_geometry(&mut self) -> PixelwaveResult<()> {
        self.ensure_initialized()?;
        self.geometry = Some(resolve_geometry(
            self.source.width(),
            self.source.height(),
            self.surface.width(),
            self.surface.height(),
            self.h_gravity,
            self.v_gravity,
        ));
        Ok(())
    }

    /// Refresh the block grid: draw the source under the current geometry,
    /// read the region back and average it into blocks.
    pub fn resample(&mut self) -> PixelwaveResult<()> {
        self.ensure_initialized()?;
        let g = self
            .geometry
            .ok_or_else(|| PixelwaveError::setup("geometry has not been resolved"))?;

        self.surface
            .draw_image(&self.source, g.offset_x, g.offset_y, g.draw_w, g.draw_h)?;
        let (w, h) = (self.surface.width(), self.surface.height());
        let pixels = self.surface.read_pixels(0, 0, w, h)?;
        self.grid = average_blocks(&pixels, w, h, self.style)?;
        Ok(())
    }

    /// Arm the frame loop without recomputing geometry or averages; phase and
    /// intensity resume where they left off.
    pub fn start(&mut self) -> PixelwaveResult<()> {
        self.ensure_initialized()?;
        if self.state != LifecycleState::Running {
            self.pending = Some(self.scheduler.schedule());
            self.state = LifecycleState::Running;
        }
        Ok(())
    }

    /// Cancel the armed frame. Phase and intensity are kept.
    pub fn stop(&mut self) {
        if self.state == LifecycleState::Running {
            if let Some(handle) = self.pending.take() {
                self.scheduler.cancel(handle);
            }
            self.state = LifecycleState::Stopped;
        }
    }

    /// Drive one scheduled tick: wait for the armed frame to come due, then
    /// run the render step (which re-arms the next frame). Returns whether a
    /// frame was rendered. Render errors propagate and leave the loop
    /// un-rearmed; callers wanting resilience call [`PixelWave::start`]
    /// again.
    pub fn run_frame(&mut self) -> PixelwaveResult<bool> {
        if self.state != LifecycleState::Running {
            return Ok(false);
        }
        let Some(due) = self.scheduler.wait_due() else {
            return Ok(false);
        };
        if self.pending != Some(due) {
            return Ok(false);
        }
        self.pending = None;
        self.render_step()?;
        Ok(true)
    }

    /// Replace the repaint callback invoked after each presented frame.
    pub fn set_repaint_callback(&mut self, callback: impl FnMut(&dyn Surface) + 'static) {
        self.repaint = Some(Box::new(callback));
    }

    /// Update block sizing from a JSON object, e.g.
    /// `{"pixelWidth": 40, "borderWidth": 2}`.
    ///
    /// Unknown keys are ignored and zero values keep the current setting. A
    /// present key with a non-numeric value is a config error, raised before
    /// anything is applied so the prior style stays intact. Takes effect on
    /// the next `resample`/frame.
    pub fn set_style(&mut self, style: &serde_json::Value) -> PixelwaveResult<()> {
        let obj = style
            .as_object()
            .ok_or_else(|| PixelwaveError::config("style input must be an object"))?;

        let pixel_width = style_field(obj, "pixelWidth")?;
        let pixel_height = style_field(obj, "pixelHeight")?;
        let border_width = style_field(obj, "borderWidth")?;

        if let Some(v) = pixel_width {
            self.style.pixel_width = v;
        }
        if let Some(v) = pixel_height {
            self.style.pixel_height = v;
        }
        if let Some(v) = border_width {
            self.style.border_width = v;
        }
        Ok(())
    }

    pub fn output_width(&self) -> u32 {
        self.surface.width()
    }

    pub fn output_height(&self) -> u32 {
        self.surface.height()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current wave phase.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Current fade-in intensity in `[0, 100]`.
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// The last computed block grid.
    pub fn blocks(&self) -> &BlockGrid {
        &self.grid
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Mutable surface access for re-layout: resize here, then call
    /// [`PixelWave::recompute_geometry`] and [`PixelWave::resample`].
    pub fn surface_mut(&mut self) -> &mut dyn Surface {
        self.surface.as_mut()
    }

    fn ensure_initialized(&self) -> PixelwaveResult<()> {
        if self.state == LifecycleState::Uninitialized {
            return Err(PixelwaveError::setup("setup() has not completed"));
        }
        Ok(())
    }

    /// One frame: re-draw the scaled source, paint every populated block with
    /// its wave alpha plus the two darker border strips, advance the
    /// animation state, present, and arm the next frame.
    fn render_step(&mut self) -> PixelwaveResult<()> {
        let g = self
            .geometry
            .ok_or_else(|| PixelwaveError::setup("geometry has not been resolved"))?;

        self.surface
            .draw_image(&self.source, g.offset_x, g.offset_y, g.draw_w, g.draw_h)?;

        let output_w = f64::from(self.surface.width());
        let pitch_x = self.style.pitch_x();
        let pitch_y = self.style.pitch_y();

        for (x, y, color) in self.grid.cells() {
            // Linear left-to-right falloff; unclamped on the low end.
            let distance = 1.0 - (x as f64 * f64::from(pitch_x)) / output_w;
            let wave = ((y as f64 / 10.0 + self.phase).sin() + 1.0) * distance + distance / 4.0;
            let alpha = (wave.min(1.0) / 100.0) * self.intensity;

            let origin_x = x as i64 * i64::from(pitch_x);
            let origin_y = y as i64 * i64::from(pitch_y);
            self.surface.fill_rect(
                origin_x,
                origin_y,
                self.style.pixel_width,
                self.style.pixel_height,
                [color.red, color.green, color.blue],
                alpha,
            );

            // Half-brightness gutters to the right of and beneath the block.
            let border_alpha = distance * (alpha * 2.0);
            let dark = [color.red / 2, color.green / 2, color.blue / 2];
            self.surface.fill_rect(
                origin_x + i64::from(self.style.pixel_width),
                origin_y,
                self.style.border_width,
                self.style.pixel_height,
                dark,
                border_alpha,
            );
            self.surface.fill_rect(
                origin_x,
                origin_y + i64::from(self.style.pixel_height),
                self.style.pixel_width + self.style.border_width,
                self.style.border_width,
                dark,
                border_alpha,
            );
        }

        // Wrap is check-then-add: the reset happens one frame after the
        // phase first exceeds the wrap point.
        self.phase = if self.phase > PHASE_WRAP {
            0.0
        } else {
            self.phase + PHASE_STEP
        };

        self.surface.present()?;

        if let Some(callback) = &mut self.repaint {
            callback(self.surface.as_ref());
        }

        if self.intensity < INTENSITY_MAX {
            self.intensity = (self.intensity + self.intensity_step).min(INTENSITY_MAX);
        }

        tracing::trace!(phase = self.phase, intensity = self.intensity, "frame painted");
        self.pending = Some(self.scheduler.schedule());
        Ok(())
    }
}

fn style_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> PixelwaveResult<Option<u32>> {
    let Some(value) = obj.get(key) else {
        return Ok(None);
    };
    let n = value
        .as_u64()
        .filter(|n| *n <= u64::from(u32::MAX))
        .ok_or_else(|| {
            PixelwaveError::config(format!(
                "style field '{key}' must be a non-negative integer"
            ))
        })?;
    // Zero keeps the current value.
    Ok((n != 0).then_some(n as u32))
}
