//! Mesh renderer: one vertex stream drawn with a shared shader and texture.

mod error;
mod layout;

use std::rc::Rc;

use crate::gfx::{BufferId, GraphicsApi, ProgramId, ReleaseQueue, Released, VertexArrayId};
use crate::shader::{ScalarType, ShaderProgram};
use crate::texture::Texture;

pub use error::RenderError;
pub use layout::{VertexAttribute, VertexLayout};

/// Owns a vertex buffer and its layout description, shares a shader and a
/// texture, and issues one draw per `render` call.
///
/// Uniform setup is left to the caller: `render` runs a closure after the
/// program is active and before the draw, so per-instance values (model
/// matrix, time, ...) are captured by the closure rather than known here.
#[derive(Debug)]
pub struct Renderer {
    buffer: BufferId,
    vertex_array: VertexArrayId,
    layout: VertexLayout,
    vertex_count: u32,
    vertices: Rc<[f32]>,
    shader: Rc<ShaderProgram>,
    texture: Rc<Texture>,
    release: ReleaseQueue,
}

impl Renderer {
    pub fn new<G: GraphicsApi>(
        gfx: &mut G,
        vertices: impl Into<Rc<[f32]>>,
        layout: VertexLayout,
        shader: Rc<ShaderProgram>,
        texture: Rc<Texture>,
    ) -> Result<Self, RenderError> {
        let vertices = vertices.into();
        let vertex_count = layout.vertex_count(vertices.len())?;
        check_shader(&layout, &shader)?;

        let buffer = gfx.create_vertex_buffer(&vertices)?;
        let vertex_array = match gfx.create_vertex_array(buffer, &layout) {
            Ok(va) => va,
            Err(e) => {
                gfx.release_queue().push(Released::Buffer(buffer));
                return Err(e.into());
            }
        };

        log::debug!(
            "renderer: {vertex_count} vertices ({}+{} floats) in {buffer}",
            layout.dim(),
            layout.tex_dim()
        );

        Ok(Self {
            buffer,
            vertex_array,
            layout,
            vertex_count,
            vertices,
            shader,
            texture,
            release: gfx.release_queue(),
        })
    }

    /// Takes effect at the next `render`.
    pub fn change_texture(&mut self, texture: Rc<Texture>) {
        self.texture = texture;
    }

    /// Swaps the program. The vertex buffer and layout are left as they are,
    /// so the new program must read only attributes the layout provides.
    pub fn change_shader(&mut self, shader: Rc<ShaderProgram>) -> Result<(), RenderError> {
        check_shader(&self.layout, &shader)?;
        self.shader = shader;
        Ok(())
    }

    /// Replaces the vertex stream, keeping the layout, and re-uploads it.
    pub fn change_object<G: GraphicsApi>(
        &mut self,
        gfx: &mut G,
        vertices: impl Into<Rc<[f32]>>,
    ) -> Result<(), RenderError> {
        let vertices = vertices.into();
        let vertex_count = self.layout.vertex_count(vertices.len())?;
        gfx.write_vertex_buffer(self.buffer, &vertices)?;
        self.vertices = vertices;
        self.vertex_count = vertex_count;
        Ok(())
    }

    /// Binds the texture to unit 0, activates the shader, lets `setup` write
    /// uniforms, then draws every vertex.
    pub fn render<G, F>(&self, gfx: &mut G, setup: F)
    where
        G: GraphicsApi,
        F: FnOnce(&mut G, ProgramId),
    {
        gfx.active_texture(0);
        self.texture.bind(gfx);
        self.shader.activate(gfx);
        setup(gfx, self.shader.id());
        gfx.bind_vertex_array(self.vertex_array);
        gfx.draw_arrays(0, self.vertex_count);
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn shader(&self) -> &Rc<ShaderProgram> {
        &self.shader
    }

    pub fn texture(&self) -> &Rc<Texture> {
        &self.texture
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.release.push(Released::VertexArray(self.vertex_array));
        self.release.push(Released::Buffer(self.buffer));
    }
}

fn check_shader(layout: &VertexLayout, shader: &ShaderProgram) -> Result<(), RenderError> {
    match shader
        .interface()
        .vertex_inputs
        .iter()
        .find(|input| input.scalar != ScalarType::Float || layout.attribute(input.location).is_none())
    {
        Some(missing) => Err(RenderError::IncompatibleShader { location: missing.location }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{Command, HeadlessGraphics, UniformValue};
    use crate::texture::ImageData;
    use glam::Mat4;

    const VS: &str = r#"
struct Globals { model: mat4x4<f32>, time: f32 };
@group(0) @binding(0) var<uniform> globals: Globals;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    return VsOut(globals.model * vec4<f32>(position, 1.0), uv);
}
"#;

    const FS: &str = r#"
@group(1) @binding(0) var tex: texture_2d<f32>;
@group(1) @binding(1) var samp: sampler;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, uv);
}
"#;

    const FLAT_VS: &str = r#"
@vertex
fn main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
"#;

    const FLAT_FS: &str =
        "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0, 0.0, 1.0, 1.0); }";

    struct Fixture {
        gfx: HeadlessGraphics,
        shader: Rc<ShaderProgram>,
        red: Rc<Texture>,
        blue: Rc<Texture>,
    }

    fn fixture() -> Fixture {
        let mut gfx = HeadlessGraphics::new();
        let shader = Rc::new(ShaderProgram::link(&mut gfx, VS, FS).unwrap());
        let solid = |rgb: [u8; 3]| ImageData { width: 1, height: 1, channels: 3, pixels: rgb.to_vec() };
        let red = Rc::new(Texture::from_image(&mut gfx, &solid([255, 0, 0])).unwrap());
        let blue = Rc::new(Texture::from_image(&mut gfx, &solid([0, 0, 255])).unwrap());
        gfx.clear_log();
        Fixture { gfx, shader, red, blue }
    }

    fn triangles(n: usize) -> Vec<f32> {
        (0..n * 3 * 5).map(|i| i as f32).collect()
    }

    fn layout() -> VertexLayout {
        VertexLayout::interleaved(3, 2).unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn vertex_count_is_len_over_floats_per_vertex() {
        let mut f = fixture();
        let r = Renderer::new(&mut f.gfx, triangles(12), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        assert_eq!(r.vertex_count(), 36);
        assert_eq!(r.vertices().len(), 180);
    }

    #[test]
    fn odd_length_fails_before_uploading() {
        let mut f = fixture();
        let mut data = triangles(1);
        data.pop();
        let err = Renderer::new(&mut f.gfx, data, layout(), f.shader.clone(), f.red.clone())
            .unwrap_err();
        assert!(matches!(err, RenderError::Misaligned { len: 14, floats_per_vertex: 5 }));
        assert!(f.gfx.commands().is_empty());
    }

    #[test]
    fn non_triangle_count_fails() {
        let mut f = fixture();
        let err = Renderer::new(&mut f.gfx, vec![0.0; 10], layout(), f.shader.clone(), f.red.clone())
            .unwrap_err();
        assert!(matches!(err, RenderError::NotTriangles { vertex_count: 2 }));
    }

    #[test]
    fn shader_reading_missing_attribute_is_incompatible() {
        let mut f = fixture();
        let positions_only = VertexLayout::interleaved(3, 0).unwrap();
        let err = Renderer::new(&mut f.gfx, vec![0.0; 9], positions_only, f.shader.clone(), f.red.clone())
            .unwrap_err();
        assert!(matches!(err, RenderError::IncompatibleShader { location: 1 }));
    }

    #[test]
    fn integer_vertex_input_is_incompatible_with_float_layout() {
        let mut f = fixture();
        let vs = r#"
@vertex
fn main(@location(0) position: vec3<i32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(vec3<f32>(position), 1.0);
}
"#;
        let shader = Rc::new(ShaderProgram::link(&mut f.gfx, vs, FLAT_FS).unwrap());
        let positions_only = VertexLayout::interleaved(3, 0).unwrap();
        let err = Renderer::new(&mut f.gfx, vec![0.0; 9], positions_only, shader, f.red.clone())
            .unwrap_err();
        assert!(matches!(err, RenderError::IncompatibleShader { location: 0 }));
    }

    #[test]
    fn upload_describes_both_attributes() {
        let mut f = fixture();
        let r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        let Command::CreateVertexBuffer { id: buffer, floats } = f.gfx.commands()[0].clone() else {
            panic!("expected buffer creation first");
        };
        assert_eq!(floats, 15);
        assert_eq!(
            f.gfx.commands()[1],
            Command::CreateVertexArray { id: r.vertex_array, buffer, layout: layout() }
        );
        assert_eq!(layout().tex_coords().map(|a| a.offset), Some(12));
    }

    // ── render ────────────────────────────────────────────────────────────

    #[test]
    fn render_issues_the_documented_sequence() {
        let mut f = fixture();
        let r = Renderer::new(&mut f.gfx, triangles(2), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        f.gfx.clear_log();

        let program = f.shader.id();
        r.render(&mut f.gfx, |gfx, id| {
            assert_eq!(id, program);
            gfx.set_uniform_by_name(id, "time", 0.5f32);
        });

        let loc = f.gfx.uniform_location(program, "time").unwrap();
        assert_eq!(
            f.gfx.commands(),
            &[
                Command::ActiveTexture(0),
                Command::BindTexture(f.red.id()),
                Command::UseProgram(program),
                Command::SetUniform { location: loc, value: UniformValue::Float(0.5) },
                Command::BindVertexArray(r.vertex_array),
                Command::DrawArrays { first: 0, count: 6 },
            ]
        );
        assert_eq!(f.gfx.draws().len(), 1);
        assert_eq!(f.gfx.draws()[0].uniform_f32s(64, 1), Some(vec![0.5]));
    }

    #[test]
    fn change_texture_binds_the_new_texture_next_render() {
        let mut f = fixture();
        let mut r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        f.gfx.clear_log();

        r.change_texture(f.blue.clone());
        assert!(f.gfx.commands().is_empty());

        r.render(&mut f.gfx, |_, _| {});
        assert_eq!(f.gfx.draws()[0].texture, Some(f.blue.id()));
        assert!(!f.gfx.commands().contains(&Command::BindTexture(f.red.id())));
    }

    #[test]
    fn per_instance_uniforms_are_kept_per_draw() {
        let mut f = fixture();
        let r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();

        let models = [Mat4::from_translation(glam::Vec3::X), Mat4::from_scale(glam::Vec3::splat(2.0))];
        for model in models {
            r.render(&mut f.gfx, |gfx, id| {
                gfx.set_uniform_by_name(id, "model", model);
            });
        }

        let drawn: Vec<Mat4> = f
            .gfx
            .draws()
            .iter()
            .map(|d| d.uniform_mat4(0).unwrap())
            .collect();
        assert_eq!(drawn, models.to_vec());
    }

    // ── change_shader / change_object ─────────────────────────────────────

    #[test]
    fn change_shader_leaves_the_buffer_untouched() {
        let mut f = fixture();
        let mut r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        let flat = Rc::new(ShaderProgram::link(&mut f.gfx, FLAT_VS, FLAT_FS).unwrap());
        f.gfx.clear_log();

        r.change_shader(flat.clone()).unwrap();
        assert!(f.gfx.commands().is_empty());
        assert_eq!(f.gfx.buffer_data(r.buffer), Some(&triangles(1)[..]));

        r.render(&mut f.gfx, |_, _| {});
        assert_eq!(f.gfx.draws()[0].program, flat.id());
    }

    #[test]
    fn change_shader_rejects_programs_the_layout_cannot_feed() {
        let mut gfx = HeadlessGraphics::new();
        let flat = Rc::new(ShaderProgram::link(&mut gfx, FLAT_VS, FLAT_FS).unwrap());
        let textured = Rc::new(ShaderProgram::link(&mut gfx, VS, FS).unwrap());
        let img = ImageData { width: 1, height: 1, channels: 4, pixels: vec![0; 4] };
        let tex = Rc::new(Texture::from_image(&mut gfx, &img).unwrap());

        let positions_only = VertexLayout::interleaved(3, 0).unwrap();
        let mut r = Renderer::new(&mut gfx, vec![0.0; 9], positions_only, flat.clone(), tex).unwrap();

        assert!(matches!(
            r.change_shader(textured),
            Err(RenderError::IncompatibleShader { location: 1 })
        ));
        assert_eq!(r.shader().id(), flat.id());
    }

    #[test]
    fn change_object_reuploads_and_updates_count() {
        let mut f = fixture();
        let mut r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        f.gfx.clear_log();

        r.change_object(&mut f.gfx, triangles(4)).unwrap();
        assert_eq!(r.vertex_count(), 12);
        assert_eq!(f.gfx.commands(), &[Command::WriteVertexBuffer { id: r.buffer, floats: 60 }]);
        assert_eq!(f.gfx.buffer_data(r.buffer).map(<[f32]>::len), Some(60));

        r.render(&mut f.gfx, |_, _| {});
        assert_eq!(f.gfx.draws()[0].count, 12);
    }

    #[test]
    fn draws_before_change_object_keep_the_old_stream() {
        let mut f = fixture();
        let mut r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();

        r.render(&mut f.gfx, |_, _| {});
        let grown: Vec<f32> = triangles(2).iter().map(|v| -v).collect();
        r.change_object(&mut f.gfx, grown.clone()).unwrap();
        r.render(&mut f.gfx, |_, _| {});

        let draws = f.gfx.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].vertices, triangles(1));
        assert_eq!(draws[1].vertices, grown);
    }

    #[test]
    fn change_object_rejects_bad_streams_and_keeps_the_old_one() {
        let mut f = fixture();
        let mut r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        assert!(r.change_object(&mut f.gfx, vec![0.0; 7]).is_err());
        assert_eq!(r.vertex_count(), 3);
        assert_eq!(r.vertices(), &triangles(1)[..]);
    }

    // ── sharing ───────────────────────────────────────────────────────────

    #[test]
    fn renderers_share_one_vertex_table() {
        let mut f = fixture();
        let table: Rc<[f32]> = triangles(2).into();
        let a = Renderer::new(&mut f.gfx, table.clone(), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        let b = Renderer::new(&mut f.gfx, table.clone(), layout(), f.shader.clone(), f.blue.clone())
            .unwrap();
        assert_eq!(Rc::strong_count(&table), 3);
        assert_ne!(a.buffer, b.buffer);
    }

    #[test]
    fn drop_releases_buffer_and_vertex_array_but_not_shared_resources() {
        let mut f = fixture();
        let r = Renderer::new(&mut f.gfx, triangles(1), layout(), f.shader.clone(), f.red.clone())
            .unwrap();
        assert_eq!(Rc::strong_count(&f.shader), 2);

        drop(r);
        f.gfx.collect_garbage();
        assert_eq!(f.gfx.live_buffers(), 0);
        assert_eq!(f.gfx.live_vertex_arrays(), 0);
        assert_eq!(f.gfx.live_programs(), 1);
        assert_eq!(f.gfx.live_textures(), 2);
        assert_eq!(Rc::strong_count(&f.shader), 1);
    }
}
