//! Offscreen RGBA overlay canvas (spec §4.5).
//!
//! Regenerated whenever the docked/undocked resolution changes; refuses to
//! draw while the guest system isn't running (Property P5).

use image::{ImageFormat, RgbaImage};
use plugin_host_core::EmulatorFacade;

/// The two resolutions the console renders at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockState {
    Docked { width: u32, height: u32 },
    Undocked { width: u32, height: u32 },
}

impl DockState {
    fn dimensions(self) -> (u32, u32) {
        match self {
            DockState::Docked { width, height } | DockState::Undocked { width, height } => {
                (width, height)
            }
        }
    }
}

pub struct OverlaySurface {
    canvas: RgbaImage,
    dock_state: DockState,
}

impl OverlaySurface {
    pub fn new(initial: DockState) -> Self {
        let (width, height) = initial.dimensions();
        Self {
            canvas: RgbaImage::new(width, height),
            dock_state: initial,
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Compare the recorded dock state against `current`; on change,
    /// recreate the canvas, discarding prior contents (spec scenario 6).
    pub fn sync_dock_state(&mut self, current: DockState) {
        if current == self.dock_state {
            return;
        }
        let (width, height) = current.dimensions();
        self.canvas = RgbaImage::new(width, height);
        self.dock_state = current;
    }

    /// Refuse to run `paint` unless the guest is currently running
    /// (Property P5, overlay refusal).
    fn guarded(&mut self, system: &dyn EmulatorFacade, paint: impl FnOnce(&mut RgbaImage)) -> bool {
        if !system.is_running() {
            return false;
        }
        paint(&mut self.canvas);
        true
    }

    pub fn clear(&mut self, system: &dyn EmulatorFacade) -> bool {
        self.guarded(system, |canvas| {
            for pixel in canvas.pixels_mut() {
                *pixel = image::Rgba([0, 0, 0, 0]);
            }
        })
    }

    pub fn draw_pixel(&mut self, system: &dyn EmulatorFacade, x: u32, y: u32, rgba: [u8; 4]) -> bool {
        self.guarded(system, |canvas| {
            if x < canvas.width() && y < canvas.height() {
                canvas.put_pixel(x, y, image::Rgba(rgba));
            }
        })
    }

    /// Invoke the host-supplied present callback with the current canvas
    /// (spec §4.5, render entry).
    pub fn render(&self, system: &dyn EmulatorFacade, present: impl FnOnce(&RgbaImage)) -> bool {
        if !system.is_running() {
            return false;
        }
        present(&self.canvas);
        true
    }

    /// Encode the current canvas and write it to `path`, format inferred
    /// from the extension (spec §4.5, `save_screenshot`).
    pub fn save_to_path(&self, system: &dyn EmulatorFacade, path: &std::path::Path) -> bool {
        if !system.is_running() {
            return false;
        }
        self.canvas.save(path).is_ok()
    }

    /// Load an image from `path` and blit it onto the canvas at `(x, y)`,
    /// clipped to canvas bounds (spec §4.5, `draw_image`).
    pub fn draw_image(&mut self, system: &dyn EmulatorFacade, path: &std::path::Path, x: u32, y: u32) -> bool {
        if !system.is_running() {
            return false;
        }
        let Ok(loaded) = image::open(path) else {
            return false;
        };
        let loaded = loaded.to_rgba8();
        for (ix, iy, pixel) in loaded.enumerate_pixels() {
            let (px, py) = (x + ix, y + iy);
            if px < self.canvas.width() && py < self.canvas.height() {
                self.canvas.put_pixel(px, py, *pixel);
            }
        }
        true
    }

    /// Encode the current canvas itself, optionally re-encoding to a named
    /// image format, returning a freshly allocated byte buffer (spec §4.5,
    /// `raw_screenshot`).
    pub fn raw_screenshot(&self, system: &dyn EmulatorFacade, encode_format: Option<&str>) -> Option<Vec<u8>> {
        if !system.is_running() {
            return None;
        }
        match encode_format {
            None => Some(self.canvas.clone().into_raw()),
            Some(name) => {
                let format = ImageFormat::from_extension(name)?;
                let mut buffer = std::io::Cursor::new(Vec::new());
                self.canvas.write_to(&mut buffer, format).ok()?;
                Some(buffer.into_inner())
            }
        }
    }

    /// Route through a host-supplied raw-pixel producer, optionally
    /// re-encoding to a named image format, returning a freshly allocated
    /// byte buffer (spec §4.5, screenshot entries). Used by the embedding's
    /// own screenshot tooling, which captures the guest framebuffer rather
    /// than the overlay canvas; see [`OverlaySurface::raw_screenshot`] for
    /// the canvas-only variant a plugin reaches through the host API.
    pub fn screenshot(
        &self,
        system: &dyn EmulatorFacade,
        raw_rgba: &[u8],
        width: u32,
        height: u32,
        encode_format: Option<&str>,
    ) -> Option<Vec<u8>> {
        if !system.is_running() {
            return None;
        }
        let image = RgbaImage::from_raw(width, height, raw_rgba.to_vec())?;
        match encode_format {
            None => Some(image.into_raw()),
            Some(name) => {
                let format = ImageFormat::from_extension(name)?;
                let mut buffer = std::io::Cursor::new(Vec::new());
                image.write_to(&mut buffer, format).ok()?;
                Some(buffer.into_inner())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use plugin_host_core::testing::StubEmulator;

    #[test]
    fn draw_is_refused_while_guest_not_running() {
        let mut overlay = OverlaySurface::new(DockState::Docked {
            width: 1280,
            height: 720,
        });
        let system = StubEmulator::new(false);
        assert!(!overlay.draw_pixel(&*system, 0, 0, [255, 0, 0, 255]));
    }

    #[test]
    fn draw_succeeds_once_guest_is_running() {
        let mut overlay = OverlaySurface::new(DockState::Docked {
            width: 1280,
            height: 720,
        });
        let system = StubEmulator::new(true);
        assert!(overlay.draw_pixel(&*system, 10, 10, [1, 2, 3, 255]));
    }

    #[test]
    fn dock_change_resizes_canvas_and_discards_contents() {
        let mut overlay = OverlaySurface::new(DockState::Docked {
            width: 1280,
            height: 720,
        });
        let system = StubEmulator::new(true);
        overlay.draw_pixel(&*system, 5, 5, [9, 9, 9, 255]);

        overlay.sync_dock_state(DockState::Undocked {
            width: 1280,
            height: 800,
        });

        assert_eq!(overlay.height(), 800);
        assert_eq!(*overlay.canvas.get_pixel(5, 5), image::Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn raw_screenshot_is_refused_while_guest_not_running() {
        let overlay = OverlaySurface::new(DockState::Docked { width: 4, height: 4 });
        let system = StubEmulator::new(false);
        assert!(overlay.raw_screenshot(&*system, None).is_none());
    }

    #[test]
    fn raw_screenshot_returns_raw_bytes_without_a_format() {
        let overlay = OverlaySurface::new(DockState::Docked { width: 4, height: 4 });
        let system = StubEmulator::new(true);
        let bytes = overlay.raw_screenshot(&*system, None).expect("running guest");
        assert_eq!(bytes.len(), 4 * 4 * 4);
    }

    #[test]
    fn save_screenshot_is_refused_while_guest_not_running() {
        let overlay = OverlaySurface::new(DockState::Docked { width: 4, height: 4 });
        let system = StubEmulator::new(false);
        let path = std::env::temp_dir().join("plugin-host-overlay-test-not-running.png");
        assert!(!overlay.save_to_path(&*system, &path));
    }

    #[test]
    fn save_screenshot_writes_a_real_png() {
        let overlay = OverlaySurface::new(DockState::Docked { width: 4, height: 4 });
        let system = StubEmulator::new(true);
        let path = std::env::temp_dir().join("plugin-host-overlay-test-save.png");
        assert!(overlay.save_to_path(&*system, &path));
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn draw_image_is_refused_for_a_missing_path() {
        let mut overlay = OverlaySurface::new(DockState::Docked { width: 4, height: 4 });
        let system = StubEmulator::new(true);
        let path = std::env::temp_dir().join("plugin-host-overlay-test-missing.png");
        assert!(!overlay.draw_image(&*system, &path, 0, 0));
    }

    #[test]
    fn draw_image_blits_a_loaded_image_onto_the_canvas() {
        let mut overlay = OverlaySurface::new(DockState::Docked { width: 4, height: 4 });
        let system = StubEmulator::new(true);
        let path = std::env::temp_dir().join("plugin-host-overlay-test-draw.png");
        let mut source = RgbaImage::new(2, 2);
        source.put_pixel(0, 0, image::Rgba([200, 150, 100, 255]));
        source.save(&path).expect("write fixture image");

        assert!(overlay.draw_image(&*system, &path, 1, 1));
        assert_eq!(*overlay.canvas.get_pixel(1, 1), image::Rgba([200, 150, 100, 255]));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn dock_change_to_same_state_is_a_no_op() {
        let mut overlay = OverlaySurface::new(DockState::Docked {
            width: 1280,
            height: 720,
        });
        let system = StubEmulator::new(true);
        overlay.draw_pixel(&*system, 1, 1, [7, 7, 7, 255]);
        overlay.sync_dock_state(DockState::Docked {
            width: 1280,
            height: 720,
        });
        assert_eq!(*overlay.canvas.get_pixel(1, 1), image::Rgba([7, 7, 7, 255]));
    }
}
