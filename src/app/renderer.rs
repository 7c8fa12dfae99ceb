//! OpenGL quad renderer drawing one sequence texture through its colormap

use std::num::NonZeroU32;

use eframe::glow::{self, HasContext};
use log::{error, info};

use crate::core::colormap::Colormap;
use crate::core::image::ElementType;
use crate::core::view::View;

const VERTEX_SHADER: &str = r#"
#version 330 core

layout (location = 0) in vec2 a_pos;
layout (location = 1) in vec2 a_uv;

uniform vec2 u_image_size;   // image pixels
uniform vec2 u_center;       // image point at the middle of the viewport
uniform float u_zoom;        // viewport points per image pixel
uniform vec2 u_viewport;     // viewport size in points

out vec2 v_uv;

void main() {
    vec2 win = (a_pos * u_image_size - u_center) * u_zoom + u_viewport * 0.5;
    vec2 ndc = win / u_viewport * 2.0 - 1.0;
    gl_Position = vec4(ndc.x, -ndc.y, 0.0, 1.0);
    v_uv = a_uv;
}
"#;

const FRAGMENT_SHADER: &str = r#"
#version 330 core

in vec2 v_uv;
out vec4 FragColor;

uniform sampler2D u_texture;
uniform float u_value_scale; // 255 for 8-bit textures, 1 for float
uniform float u_scale;       // colormap: display = v * scale + bias
uniform float u_bias;
uniform int u_channels;

void main() {
    vec4 c = texture(u_texture, v_uv) * u_value_scale;
    vec3 rgb;
    if (u_channels == 1) {
        rgb = vec3(c.r);
    } else if (u_channels == 2) {
        rgb = vec3(c.r, c.g, 0.0);
    } else {
        rgb = c.rgb;
    }
    FragColor = vec4(clamp(rgb * u_scale + u_bias, 0.0, 1.0), 1.0);
}
"#;

/// Everything one draw needs; copied into the paint callback
#[derive(Debug, Clone, Copy)]
pub struct DrawParams {
    pub texture: u32,
    pub image_size: [f32; 2],
    pub element: ElementType,
    pub channels: usize,
    pub view: View,
    pub colormap: Colormap,
    /// Callback rect size in points
    pub viewport: [f32; 2],
}

pub struct ImageRenderer {
    program: Option<glow::Program>,
    vao: Option<glow::VertexArray>,
    vbo: Option<glow::Buffer>,
    failed: bool,
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRenderer {
    pub fn new() -> Self {
        Self {
            program: None,
            vao: None,
            vbo: None,
            failed: false,
        }
    }

    fn compile(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::Shader, String> {
        unsafe {
            let shader = gl.create_shader(kind)?;
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return Err(log);
            }
            Ok(shader)
        }
    }

    /// Build program and quad buffers
    fn initialize(&mut self, gl: &glow::Context) -> Result<(), String> {
        unsafe {
            let vs = Self::compile(gl, glow::VERTEX_SHADER, VERTEX_SHADER)
                .map_err(|e| format!("Vertex shader compilation failed: {}", e))?;
            let fs = match Self::compile(gl, glow::FRAGMENT_SHADER, FRAGMENT_SHADER) {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(format!("Fragment shader compilation failed: {}", e));
                }
            };

            let program = gl.create_program()?;
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(format!("Shader program linking failed: {}", log));
            }
            self.program = Some(program);

            let vao = gl.create_vertex_array()?;
            gl.bind_vertex_array(Some(vao));
            let vbo = gl.create_buffer()?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));

            // Unit square in image space; uv == pos, row 0 at the top
            #[rustfmt::skip]
            let vertices: [f32; 16] = [
                // pos.x, pos.y, uv.x, uv.y
                0.0, 0.0,  0.0, 0.0,
                1.0, 0.0,  1.0, 0.0,
                1.0, 1.0,  1.0, 1.0,
                0.0, 1.0,  0.0, 1.0,
            ];
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(&vertices), glow::STATIC_DRAW);

            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 16, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 16, 8);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            self.vao = Some(vao);
            self.vbo = Some(vbo);
        }
        info!("ImageRenderer initialized");
        Ok(())
    }

    pub fn render(&mut self, gl: &glow::Context, params: &DrawParams) {
        if self.program.is_none() && !self.failed {
            if let Err(e) = self.initialize(gl) {
                error!("{}", e);
                self.failed = true;
            }
        }
        let (Some(program), Some(vao)) = (self.program, self.vao) else {
            return;
        };
        let Some(texture) = NonZeroU32::new(params.texture).map(glow::NativeTexture) else {
            return;
        };

        let (scale, bias) = params.colormap.scale_bias();
        let value_scale = match params.element {
            ElementType::U8 => 255.0,
            ElementType::F32 => 1.0,
        };

        unsafe {
            gl.use_program(Some(program));

            let set_vec2 = |name: &str, v: [f32; 2]| {
                if let Some(loc) = gl.get_uniform_location(program, name) {
                    gl.uniform_2_f32(Some(&loc), v[0], v[1]);
                }
            };
            set_vec2("u_image_size", params.image_size);
            set_vec2("u_center", params.view.center.to_array());
            set_vec2("u_viewport", params.viewport);

            let set_f32 = |name: &str, v: f32| {
                if let Some(loc) = gl.get_uniform_location(program, name) {
                    gl.uniform_1_f32(Some(&loc), v);
                }
            };
            set_f32("u_zoom", params.view.zoom);
            set_f32("u_value_scale", value_scale);
            set_f32("u_scale", scale);
            set_f32("u_bias", bias);

            if let Some(loc) = gl.get_uniform_location(program, "u_channels") {
                gl.uniform_1_i32(Some(&loc), params.channels as i32);
            }

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            if let Some(loc) = gl.get_uniform_location(program, "u_texture") {
                gl.uniform_1_i32(Some(&loc), 0);
            }

            gl.bind_vertex_array(Some(vao));
            gl.draw_arrays(glow::TRIANGLE_FAN, 0, 4);
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
    }

    /// Release GL objects; call with the context still current.
    pub fn destroy(&mut self, gl: &glow::Context) {
        unsafe {
            if let Some(vbo) = self.vbo.take() {
                gl.delete_buffer(vbo);
            }
            if let Some(vao) = self.vao.take() {
                gl.delete_vertex_array(vao);
            }
            if let Some(program) = self.program.take() {
                gl.delete_program(program);
            }
        }
    }
}
