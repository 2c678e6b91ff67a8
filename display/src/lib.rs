use anyhow::{anyhow, Result};
use sdl2::pixels::PixelFormatEnum;

use emu8_core::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use emu8_core::FrameBuffer;

/// An RGB colour
pub type Colour = [u8; 3];

pub const GREEN: Colour = [51, 255, 102];
pub const BLACK: Colour = [0, 0, 0];

/// # Display
/// The Chip-8 display is composed of 64x32 pixels black/white pixels.
/// Each pixel is drawn as a `scale` sized square in one of two colours.
/// The display only gets a call to `render` when the Chip-8 FrameBuffer is updated.
pub struct Display {
    canvas: sdl2::render::WindowCanvas,
    foreground: Colour,
    background: Colour,
}

impl Display {
    /// Creates a new display object bound to an sdl2 context.
    ///
    /// # Arguments
    /// * `sdl` an sdl2 context with which to draw
    /// * `scale` the size multiplier for each pixel
    pub fn new(sdl: &sdl2::Sdl, scale: u32) -> Result<Self> {
        let video_subsystem = sdl.video().map_err(|e| anyhow!(e))?;
        let window = video_subsystem
            .window(
                "Emu-8",
                DISPLAY_WIDTH as u32 * scale,
                DISPLAY_HEIGHT as u32 * scale,
            )
            .position_centered()
            .opengl()
            .build()?;
        let canvas = window.into_canvas().build()?;

        Ok(Display {
            canvas,
            foreground: GREEN,
            background: BLACK,
        })
    }

    /// Sets the colours of lit and unlit pixels
    pub fn set_colours(&mut self, foreground: Colour, background: Colour) {
        self.foreground = foreground;
        self.background = background;
    }

    /// Formats a Chip-8 FrameBuffer as an SDL2 RGB24 texture.
    ///
    /// An SDL2 texture is a 1D array of bytes that represent concatenated rows of RGB pixels,
    /// so the frame's rows are flattened and each pixel becomes the three bytes of its colour.
    fn frame_to_sdl_texture(frame: &FrameBuffer, foreground: Colour, background: Colour) -> Vec<u8> {
        frame
            .iter()
            .flat_map(|row| row.iter())
            .flat_map(|&lit| {
                let colour = if lit { foreground } else { background };
                colour.to_vec()
            })
            .collect()
    }

    /// Formats the Chip-8 FrameBuffer as an SDL2 RGB24 texture and renders it.
    ///
    /// # Arguments
    /// * `frame` a Chip-8 FrameBuffer
    pub fn render(&mut self, frame: &FrameBuffer) -> Result<()> {
        let texture_creator = self.canvas.texture_creator();

        let mut texture = texture_creator.create_texture_streaming(
            PixelFormatEnum::RGB24,
            DISPLAY_WIDTH as u32,
            DISPLAY_HEIGHT as u32,
        )?;

        let pixels = Display::frame_to_sdl_texture(frame, self.foreground, self.background);
        texture.update(None, &pixels, DISPLAY_WIDTH * 3)?;

        self.canvas.copy(&texture, None, None).map_err(|e| anyhow!(e))?;
        self.canvas.present();
        Ok(())
    }
}
