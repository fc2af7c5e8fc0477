use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use cubelab_engine::core::{App, AppControl, FrameCtx, SetupCtx};
use cubelab_engine::gfx::GraphicsApi;
use cubelab_engine::input::{InputFrame, InputState, Key};
use cubelab_engine::{Camera, Projection, Renderer, ShaderProgram, Texture, VertexLayout};
use glam::Mat4;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::event::WindowEvent;

use crate::config::SandboxConfig;
use crate::scene::{model_matrix, CUBE_POSITIONS, CUBE_VERTICES};

/// GPU resources for the cube field: one program, one renderer, and the
/// texture chosen for each instance.
pub struct CubeScene {
    renderer: Renderer,
    instance_textures: Vec<Rc<Texture>>,
}

impl CubeScene {
    pub fn load<G: GraphicsApi>(gfx: &mut G, config: &SandboxConfig, rng: &mut StdRng) -> anyhow::Result<Self> {
        let shader = ShaderProgram::load_from_paths(gfx, config.vertex_shader(), config.fragment_shader())
            .context("failed to build the cube shader")?;

        let mut loaded: Vec<Option<Rc<Texture>>> = vec![None; config.palette.entries().len()];
        let mut instance_textures = Vec::with_capacity(CUBE_POSITIONS.len());
        for _ in CUBE_POSITIONS {
            let index = config
                .palette
                .choose(rng)
                .context("texture palette has no selectable entry")?;
            let texture = match loaded[index].clone() {
                Some(texture) => texture,
                None => {
                    let path = config.texture(&config.palette.entries()[index].file);
                    let texture = Rc::new(Texture::load_from_path(gfx, &path)?);
                    loaded[index] = Some(Rc::clone(&texture));
                    texture
                }
            };
            instance_textures.push(texture);
        }

        let first = instance_textures
            .first()
            .cloned()
            .context("scene has no cube instances")?;
        let layout = VertexLayout::interleaved(3, 2)?;
        let renderer = Renderer::new(gfx, CUBE_VERTICES, layout, Rc::new(shader), first)?;

        log::info!(
            "scene: {} cubes, {} distinct textures",
            instance_textures.len(),
            loaded.iter().flatten().count()
        );

        Ok(Self { renderer, instance_textures })
    }

    /// One draw per instance, each with its own texture and model matrix.
    pub fn draw<G: GraphicsApi>(&mut self, gfx: &mut G, view: Mat4, projection: Mat4, elapsed: f32) {
        for (position, texture) in CUBE_POSITIONS.iter().zip(&self.instance_textures) {
            self.renderer.change_texture(Rc::clone(texture));
            let model = model_matrix(*position, elapsed);
            self.renderer.render(gfx, |gfx, program| {
                gfx.set_uniform_by_name(program, "model", model);
                gfx.set_uniform_by_name(program, "view", view);
                gfx.set_uniform_by_name(program, "projection", projection);
            });
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn instance_textures(&self) -> &[Rc<Texture>] {
        &self.instance_textures
    }
}

pub struct CubeApp {
    config: SandboxConfig,
    camera: Camera,
    projection: Projection,
    scene: Option<CubeScene>,
}

impl CubeApp {
    pub fn new(config: SandboxConfig) -> Self {
        let mut camera = Camera::new(config.camera_start);
        camera.set_speed(config.camera_speed);
        camera.set_sensitivity(config.camera_sensitivity);
        let projection = config.projection;

        Self { config, camera, projection, scene: None }
    }

    fn steer(&mut self, input: &InputState, frame: &InputFrame, dt: f32) {
        let camera = &mut self.camera;
        if input.key_down(Key::W) {
            camera.move_forward(dt);
        }
        if input.key_down(Key::S) {
            camera.move_backward(dt);
        }
        if input.key_down(Key::D) {
            camera.move_right(dt);
        }
        if input.key_down(Key::A) {
            camera.move_left(dt);
        }
        if input.key_down(Key::Space) {
            camera.move_up(dt);
        }
        if input.key_down(Key::Shift) {
            camera.move_down(dt);
        }

        let (dx, dy) = frame.mouse_delta;
        if dx != 0.0 || dy != 0.0 {
            camera.rotate(dx, dy);
        }

        if frame.scroll != 0.0 {
            let speed = (camera.speed() + frame.scroll * self.config.scroll_speed_step).max(0.0);
            camera.set_speed(speed);
            log::debug!("camera speed {speed:.2}");
        }
    }
}

impl App for CubeApp {
    fn init(&mut self, ctx: &mut SetupCtx<'_, '_>) -> anyhow::Result<()> {
        let size = ctx.window.physical_size();
        self.projection.set_aspect(size.width, size.height);

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut rng = StdRng::seed_from_u64(seed);

        self.scene = Some(CubeScene::load(ctx.graphics(), &self.config, &mut rng)?);
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        if let WindowEvent::Resized(size) = event {
            self.projection.set_aspect(size.width, size.height);
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input_frame.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }

        self.steer(ctx.input, ctx.input_frame, ctx.time.dt);

        let view = self.camera.view_matrix();
        let projection = self.projection.matrix();
        let elapsed = ctx.time.elapsed;
        let clear = self.config.clear_color;

        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Continue;
        };
        ctx.render(clear, |gfx| scene.draw(gfx, view, projection, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use cubelab_engine::gfx::{Command, HeadlessGraphics};

    use super::*;

    fn load(seed: u64) -> (HeadlessGraphics, CubeScene) {
        let mut gfx = HeadlessGraphics::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let scene = CubeScene::load(&mut gfx, &SandboxConfig::default(), &mut rng).unwrap();
        (gfx, scene)
    }

    #[test]
    fn loads_one_program_and_only_the_chosen_textures() {
        let (gfx, scene) = load(3);
        assert_eq!(gfx.live_programs(), 1);
        assert_eq!(gfx.live_buffers(), 1);
        assert_eq!(scene.instance_textures().len(), CUBE_POSITIONS.len());
        assert_eq!(scene.renderer().vertex_count(), 36);

        let mut distinct: Vec<_> = scene.instance_textures().iter().map(|t| t.id()).collect();
        distinct.sort_by_key(|id| id.get());
        distinct.dedup();
        assert_eq!(gfx.live_textures(), distinct.len());
    }

    #[test]
    fn draws_every_cube_with_its_texture_and_matrices() {
        let (mut gfx, mut scene) = load(11);
        gfx.clear_log();

        let view = Camera::new(glam::Vec3::new(0.0, 0.0, 3.0)).view_matrix();
        let projection = Projection::default().matrix();
        scene.draw(&mut gfx, view, projection, 0.5);

        let draws = gfx.draws();
        assert_eq!(draws.len(), CUBE_POSITIONS.len());
        for ((draw, texture), position) in draws.iter().zip(scene.instance_textures()).zip(CUBE_POSITIONS) {
            assert_eq!(draw.texture, Some(texture.id()));
            assert_eq!(draw.count, 36);
            assert_eq!(draw.uniform_mat4(0).unwrap(), model_matrix(position, 0.5));
            assert_eq!(draw.uniform_mat4(64).unwrap(), view);
            assert_eq!(draw.uniform_mat4(128).unwrap(), projection);
        }
        assert!(gfx.commands().iter().all(|c| !matches!(c, Command::Release(_))));
    }

    #[test]
    fn dropping_the_scene_frees_everything() {
        let (mut gfx, scene) = load(5);
        drop(scene);
        gfx.collect_garbage();
        assert_eq!(gfx.live_programs(), 0);
        assert_eq!(gfx.live_textures(), 0);
        assert_eq!(gfx.live_buffers(), 0);
        assert_eq!(gfx.live_vertex_arrays(), 0);
    }

    #[test]
    fn missing_asset_root_fails_setup() {
        let config = SandboxConfig {
            asset_root: std::env::temp_dir().join("cubelab-no-assets-here"),
            ..SandboxConfig::default()
        };
        let mut gfx = HeadlessGraphics::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(CubeScene::load(&mut gfx, &config, &mut rng).is_err());
        assert_eq!(gfx.live_programs(), 0);
    }
}
