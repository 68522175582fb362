use std::path::PathBuf;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::error::EventLoopError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::assets::{AssetSource, FileSource};
use crate::context::RenderContext;
use crate::gpu::{GpuContext, GpuError};
use crate::graphics::Graphics;
use crate::input::Input;
use crate::loader::MeshLoader;
use crate::material::MaterialCatalog;
use crate::registry::Resources;
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::wgpu_graphics::WgpuGraphics;

/// Everything a setup function may populate before the first frame.
pub struct SetupContext<'a> {
    pub gfx: &'a mut dyn Graphics,
    pub resources: &'a mut Resources,
    pub materials: &'a mut MaterialCatalog,
    pub loader: &'a mut MeshLoader,
    pub scene: &'a mut Scene,
    pub context: &'a mut RenderContext,
}

/// Configuration for the app window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Directory asset URLs are resolved against.
    pub asset_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Scene Renderer".to_string(),
            width: 1024,
            height: 768,
            asset_root: PathBuf::from("assets"),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }
}

/// Errors that stop the application.
#[derive(Debug)]
pub enum RunError {
    EventLoop(EventLoopError),
    Window(winit::error::OsError),
    Gpu(GpuError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::EventLoop(e) => write!(f, "event loop failed: {}", e),
            RunError::Window(e) => write!(f, "failed to create window: {}", e),
            RunError::Gpu(e) => write!(f, "GPU initialisation failed: {}", e),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::EventLoop(e) => Some(e),
            RunError::Window(e) => Some(e),
            RunError::Gpu(e) => Some(e),
        }
    }
}

impl From<EventLoopError> for RunError {
    fn from(e: EventLoopError) -> Self {
        RunError::EventLoop(e)
    }
}

/// Run the renderer with the default configuration.
pub fn run<S>(setup: S) -> Result<(), RunError>
where
    S: FnOnce(&mut SetupContext) + 'static,
{
    run_with_config(AppConfig::default(), setup)
}

/// Open a window, build the scene with `setup` and render it until closed.
///
/// # Example
/// ```ignore
/// scene_renderer::run_with_config(
///     AppConfig::new().title("Mugs").asset_root("web"),
///     |ctx| {
///         let program = ctx
///             .resources
///             .compile_program(ctx.gfx, "basic", MaterialKind::Basic.shader_source())
///             .unwrap();
///         // define materials, append elements, start mesh batches...
///     },
/// )?;
/// ```
pub fn run_with_config<S>(config: AppConfig, setup: S) -> Result<(), RunError>
where
    S: FnOnce(&mut SetupContext) + 'static,
{
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = SceneApp {
        state: AppState::Pending {
            config,
            setup: Some(Box::new(setup)),
        },
        error: None,
    };

    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

type SetupFn = Box<dyn FnOnce(&mut SetupContext)>;

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    gfx: WgpuGraphics,
    resources: Resources,
    loader: MeshLoader,
    scene: Scene,
    context: RenderContext,
    input: Input,
    renderer: Renderer,
    // Kept alive for the lifetime of the scene.
    _materials: MaterialCatalog,
}

enum AppState {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running(Box<Running>),
    Stopped,
}

struct SceneApp {
    state: AppState,
    error: Option<RunError>,
}

impl SceneApp {
    fn start(
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        setup: SetupFn,
    ) -> Result<Running, RunError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(RunError::Window)?,
        );
        let gpu = GpuContext::new(window.clone()).map_err(RunError::Gpu)?;
        let mut gfx = WgpuGraphics::new(&gpu);

        log::info!("serving assets from {}", config.asset_root.display());
        let source: Arc<dyn AssetSource> = Arc::new(FileSource::new(&config.asset_root));
        let mut resources = Resources::new(Arc::clone(&source));
        let mut loader = MeshLoader::new(source);
        let mut materials = MaterialCatalog::new();
        let mut scene = Scene::new();
        let mut context = RenderContext::new();

        setup(&mut SetupContext {
            gfx: &mut gfx,
            resources: &mut resources,
            materials: &mut materials,
            loader: &mut loader,
            scene: &mut scene,
            context: &mut context,
        });
        log::info!(
            "setup done: {} materials, {} elements, {} textures and {} mesh batches loading",
            materials.len(),
            scene.len(),
            resources.pending(),
            loader.pending()
        );

        Ok(Running {
            window,
            gpu,
            gfx,
            resources,
            loader,
            scene,
            context,
            input: Input::new(),
            renderer: Renderer::new(),
            _materials: materials,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: RunError) {
        log::error!("{}", error);
        self.error = Some(error);
        self.state = AppState::Stopped;
        event_loop.exit();
    }
}

impl ApplicationHandler for SceneApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending { config, setup } = &mut self.state else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };

        match Self::start(event_loop, config, setup) {
            Ok(running) => {
                running.window.request_redraw();
                self.state = AppState::Running(Box::new(running));
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(app) = &mut self.state else {
            return;
        };

        app.input.handle_event(&event);
        for action in app.input.take_actions() {
            app.context.apply(action);
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                app.resources.poll(&mut app.gfx);
                app.loader.poll(&mut app.gfx, &mut app.scene);

                app.renderer
                    .draw_frame(&mut app.gfx, &mut app.context, &app.scene, app.gpu.aspect());
                log::trace!("presenting {} draws", app.gfx.pending_draws());

                match app.gfx.present(&app.gpu) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        app.gpu.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("out of GPU memory, exiting");
                        event_loop.exit();
                        return;
                    }
                    Err(e) => log::warn!("skipped frame: {}", e),
                }

                app.window.request_redraw();
            }
            _ => {}
        }
    }
}
