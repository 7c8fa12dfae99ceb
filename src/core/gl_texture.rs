//! OpenGL texture target (glow)
//!
//! One `GlTexture` per sequence. Uploads go straight from the image buffer
//! with `UNPACK_ROW_LENGTH` set to the image width, so sub-rects never need
//! a packed copy.

use std::sync::Arc;

use eframe::glow::{self, HasContext};
use log::error;

use crate::core::image::{ElementType, PixelFormat};
use crate::core::rect::Rect;
use crate::core::texture::{TextureDesc, TextureError, TextureFactory, TextureTarget};

/// Check `gl.get_error()` after a call, logging name, call site and call text.
macro_rules! gl_check {
    ($gl:expr, $call:expr) => {{
        let result = $call;
        let code = $gl.get_error();
        if code != glow::NO_ERROR {
            let name = gl_error_name(code);
            error!("{} at {}:{}: {}", name, file!(), line!(), stringify!($call));
            Err(TextureError::Gl {
                call: stringify!($call).to_string(),
                code,
                name,
            })
        } else {
            Ok(result)
        }
    }};
}

pub fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        _ => "GL_UNKNOWN_ERROR",
    }
}

/// (internal format, format, type)
fn gl_formats(desc: &TextureDesc) -> (i32, u32, u32) {
    let format = match desc.format {
        PixelFormat::R => glow::RED,
        PixelFormat::Rg => glow::RG,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Rgba => glow::RGBA,
    };
    let internal = match (desc.element, desc.format) {
        (ElementType::U8, PixelFormat::R) => glow::R8,
        (ElementType::U8, PixelFormat::Rg) => glow::RG8,
        (ElementType::U8, PixelFormat::Rgb) => glow::RGB8,
        (ElementType::U8, PixelFormat::Rgba) => glow::RGBA8,
        (ElementType::F32, PixelFormat::R) => glow::R32F,
        (ElementType::F32, PixelFormat::Rg) => glow::RG32F,
        (ElementType::F32, PixelFormat::Rgb) => glow::RGB32F,
        (ElementType::F32, PixelFormat::Rgba) => glow::RGBA32F,
    };
    let ty = match desc.element {
        ElementType::U8 => glow::UNSIGNED_BYTE,
        ElementType::F32 => glow::FLOAT,
    };
    (internal as i32, format, ty)
}

pub struct GlTexture {
    gl: Arc<glow::Context>,
    texture: Option<glow::Texture>,
    desc: Option<TextureDesc>,
    smooth: bool,
}

impl GlTexture {
    pub fn new(gl: Arc<glow::Context>, smooth: bool) -> Self {
        Self {
            gl,
            texture: None,
            desc: None,
            smooth,
        }
    }
}

impl TextureTarget for GlTexture {
    fn create(&mut self, desc: &TextureDesc) -> Result<(), TextureError> {
        let gl = &self.gl;
        let (internal, format, ty) = gl_formats(desc);
        let filter = (if self.smooth { glow::LINEAR } else { glow::NEAREST }) as i32;

        unsafe {
            if self.texture.is_none() {
                self.texture = Some(gl.create_texture().map_err(TextureError::Create)?);
            }
            let texture = self.texture.ok_or(TextureError::NotCreated)?;

            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            let allocated = gl_check!(
                gl,
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    internal,
                    desc.width as i32,
                    desc.height as i32,
                    0,
                    format,
                    ty,
                    glow::PixelUnpackData::Slice(None),
                )
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
            allocated?;
        }

        self.desc = Some(*desc);
        Ok(())
    }

    fn upload_sub_region(&mut self, region: Rect, row_pitch: usize, data: &[u8]) -> Result<(), TextureError> {
        let (texture, desc) = match (self.texture, self.desc) {
            (Some(t), Some(d)) => (t, d),
            _ => return Err(TextureError::NotCreated),
        };
        if region.is_empty() {
            return Ok(());
        }
        let expected = ((region.height() as usize - 1) * row_pitch + region.width() as usize) * desc.pixel_size();
        if data.len() < expected {
            return Err(TextureError::ShortData {
                expected,
                actual: data.len(),
            });
        }

        let gl = &self.gl;
        let (_, format, ty) = gl_formats(&desc);
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, row_pitch as i32);
            let uploaded = gl_check!(
                gl,
                gl.tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    region.min.x,
                    region.min.y,
                    region.width(),
                    region.height(),
                    format,
                    ty,
                    glow::PixelUnpackData::Slice(Some(data)),
                )
            );
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            gl.bind_texture(glow::TEXTURE_2D, None);
            uploaded
        }
    }

    fn handle(&self) -> Option<u32> {
        self.texture.map(|t| t.0.get())
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            unsafe { self.gl.delete_texture(texture) };
        }
    }
}

/// Hands out [`GlTexture`]s sharing one GL context
#[derive(Clone)]
pub struct GlTextureFactory {
    gl: Arc<glow::Context>,
    smooth: bool,
}

impl GlTextureFactory {
    pub fn new(gl: Arc<glow::Context>, smooth: bool) -> Self {
        Self { gl, smooth }
    }
}

impl TextureFactory for GlTextureFactory {
    fn create_target(&self) -> Box<dyn TextureTarget> {
        Box::new(GlTexture::new(Arc::clone(&self.gl), self.smooth))
    }
}
