use std::{cell::RefCell, rc::Rc};

use pixelwave::{
    BackgroundSurface, DisplayTarget, DrawGeometry, HorizontalGravity, ManualScheduler, PixelWave,
    PixelWaveOpts, PixelwaveResult, PixmapSurface, SourceImage, Style, VerticalGravity,
    resolve_geometry,
};

fn red_source(w: u32, h: u32) -> SourceImage {
    SourceImage::from_rgba8(w, h, [255u8, 0, 0, 255].repeat((w * h) as usize)).unwrap()
}

fn wave_over_pixmap(source: SourceImage, out_w: u32, out_h: u32, opts: PixelWaveOpts) -> PixelWave {
    PixelWave::new(
        source,
        Box::new(PixmapSurface::new(out_w, out_h)),
        Box::new(ManualScheduler::new()),
        opts,
    )
}

#[test]
fn red_source_scenario_geometry_blocks_and_ramp() {
    // 100x50 source over a 200x100 region shares the aspect ratio, so the
    // cover-fit is exact with no overflow on either axis.
    let geometry = resolve_geometry(
        100,
        50,
        200,
        100,
        HorizontalGravity::Right,
        VerticalGravity::Bottom,
    );
    assert_eq!(
        geometry,
        DrawGeometry {
            draw_w: 200,
            draw_h: 100,
            offset_x: 0,
            offset_y: 0
        }
    );

    let mut wave = wave_over_pixmap(red_source(100, 50), 200, 100, PixelWaveOpts::default());
    wave.setup().unwrap();

    // Every populated block of a pure red source averages to pure red.
    let mut cells = 0;
    for (_, _, color) in wave.blocks().cells() {
        assert_eq!((color.red, color.green, color.blue), (255, 0, 0));
        cells += 1;
    }
    assert_eq!(cells, 7 * 4);

    // setup() painted frame 1; drive nine more for ten total render calls.
    for _ in 0..9 {
        assert!(wave.run_frame().unwrap());
    }
    assert_eq!(wave.intensity(), 10.0);
    assert!((wave.phase() - 0.5).abs() < 1e-9);
}

#[test]
fn zero_intensity_frames_leave_the_drawn_image_untouched() {
    let mut wave = wave_over_pixmap(red_source(100, 50), 200, 100, PixelWaveOpts {
        intensity_step: 0.0,
        ..PixelWaveOpts::default()
    });
    wave.setup().unwrap();
    wave.run_frame().unwrap();

    // All block alphas are zero while intensity is zero, so the frame is the
    // drawn source verbatim.
    let pixels = wave.surface().read_pixels(0, 0, 200, 100).unwrap();
    assert!(pixels.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
}

#[test]
fn intensity_saturates_at_one_hundred() {
    let mut wave = wave_over_pixmap(red_source(10, 10), 20, 20, PixelWaveOpts::default());
    wave.setup().unwrap();

    for _ in 0..99 {
        wave.run_frame().unwrap();
    }
    assert_eq!(wave.intensity(), 100.0);

    for _ in 0..50 {
        wave.run_frame().unwrap();
    }
    assert_eq!(wave.intensity(), 100.0);
}

#[test]
fn relayout_refreshes_geometry_and_blocks() {
    let mut wave = wave_over_pixmap(red_source(100, 50), 200, 100, PixelWaveOpts::default());
    wave.setup().unwrap();
    assert_eq!((wave.output_width(), wave.output_height()), (200, 100));

    wave.surface_mut().resize(60, 60);
    wave.recompute_geometry().unwrap();
    wave.resample().unwrap();

    assert_eq!((wave.output_width(), wave.output_height()), (60, 60));
    // 60/30 -> block columns and rows 0..=1.
    assert_eq!(wave.blocks().cells().count(), 2 * 2);
    wave.run_frame().unwrap();
}

struct Recording {
    installs: Rc<RefCell<Vec<String>>>,
}

impl DisplayTarget for Recording {
    fn install_background(&mut self, id: &str, png: &[u8]) -> PixelwaveResult<()> {
        assert!(!png.is_empty());
        self.installs.borrow_mut().push(id.to_string());
        Ok(())
    }
}

#[test]
fn background_surface_installs_one_frame_per_tick() {
    let installs = Rc::new(RefCell::new(Vec::new()));
    let surface = BackgroundSurface::new(
        64,
        48,
        Box::new(Recording {
            installs: Rc::clone(&installs),
        }),
    );
    let id = surface.id().to_string();

    let mut wave = PixelWave::new(
        red_source(32, 24),
        Box::new(surface),
        Box::new(ManualScheduler::new()),
        PixelWaveOpts::default(),
    );
    wave.setup().unwrap();
    wave.run_frame().unwrap();
    wave.run_frame().unwrap();

    let installs = installs.borrow();
    assert_eq!(installs.len(), 3);
    assert!(installs.iter().all(|i| i == &id));
}

#[test]
fn stopped_wave_renders_nothing_until_restarted() {
    let mut wave = wave_over_pixmap(
        red_source(10, 10),
        30,
        30,
        PixelWaveOpts {
            style: Style {
                pixel_width: 10,
                pixel_height: 10,
                border_width: 2,
            },
            ..PixelWaveOpts::default()
        },
    );
    wave.setup().unwrap();
    wave.stop();

    let before = wave.intensity();
    assert!(!wave.run_frame().unwrap());
    assert_eq!(wave.intensity(), before);

    wave.start().unwrap();
    assert!(wave.run_frame().unwrap());
    assert_eq!(wave.intensity(), before + 1.0);
}
