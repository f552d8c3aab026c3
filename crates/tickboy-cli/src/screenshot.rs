use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tickboy_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Expand 0x00RRGGBB pixels into packed RGB bytes.
fn frame_to_rgb(frame: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() * 3);
    for &px in frame {
        out.push((px >> 16) as u8);
        out.push((px >> 8) as u8);
        out.push(px as u8);
    }
    out
}

/// Save a 160x144 framebuffer as an 8-bit RGB PNG.
pub fn save_png(path: &Path, frame: &[u32]) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let w = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(w, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame_to_rgb(frame))?;
    writer.finish()?;
    Ok(())
}
