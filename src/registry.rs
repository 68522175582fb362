//! GPU resources by logical name.
//!
//! [`Resources`] hands out program, texture and mesh handles keyed by the names
//! the scene setup uses. Textures are usable the moment they are created: a 2D
//! texture starts as a single opaque blue texel and a cube map as six black
//! faces. The images themselves are fetched and decoded on worker threads and
//! uploaded on the owning thread by [`Resources::poll`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use image::RgbaImage;

use crate::assets::{AssetSource, FetchError};
use crate::graphics::{Graphics, ProgramId, TextureId, TextureKind};
use crate::mesh::Mesh;
use crate::reflect::ShaderError;
use crate::texture::{self, CUBE_FACE_SIZE, CubeFace, PLACEHOLDER_TEXEL};

/// A decoded image on its way back from a worker.
struct TextureUpdate {
    texture: TextureId,
    layer: u32,
    url: String,
    image: Result<RgbaImage, FetchError>,
}

/// Programs, textures and meshes by name.
pub struct Resources {
    source: Arc<dyn AssetSource>,
    programs: HashMap<String, ProgramId>,
    textures: HashMap<String, TextureId>,
    meshes: HashMap<String, Rc<Mesh>>,
    sender: Sender<TextureUpdate>,
    receiver: Receiver<TextureUpdate>,
    in_flight: usize,
    cube_face_size: u32,
}

impl Resources {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            source,
            programs: HashMap::new(),
            textures: HashMap::new(),
            meshes: HashMap::new(),
            sender,
            receiver,
            in_flight: 0,
            cube_face_size: CUBE_FACE_SIZE,
        }
    }

    /// Overrides the edge length of cube map faces created from now on.
    pub fn with_cube_face_size(mut self, size: u32) -> Self {
        self.cube_face_size = size;
        self
    }

    /// The source textures (and mesh batches sharing it) are fetched from.
    pub fn source(&self) -> &Arc<dyn AssetSource> {
        &self.source
    }

    /// Compiles and registers a program.
    ///
    /// On failure the full diagnostic is logged and nothing is registered.
    pub fn compile_program(
        &mut self,
        gfx: &mut dyn Graphics,
        name: &str,
        source: &str,
    ) -> Result<ProgramId, ShaderError> {
        match gfx.compile_program(name, source) {
            Ok(program) => {
                log::debug!("compiled program '{}'", name);
                self.programs.insert(name.to_string(), program);
                Ok(program)
            }
            Err(e) => {
                log::error!("{}", e);
                Err(e)
            }
        }
    }

    /// Creates a 2D texture showing a placeholder texel until `url` has loaded.
    pub fn create_texture_2d(&mut self, gfx: &mut dyn Graphics, name: &str, url: &str) -> TextureId {
        let texture = gfx.create_texture(TextureKind::Texture2d, 1, 1, PLACEHOLDER_TEXEL, name);
        self.textures.insert(name.to_string(), texture);
        self.spawn_fetch(texture, 0, url.to_string(), None);
        texture
    }

    /// Creates a cube map and starts loading its six faces from `base_dir`.
    ///
    /// Faces complete independently and in any order; each one is scaled to
    /// the face size when the image differs.
    pub fn create_cube_map(&mut self, gfx: &mut dyn Graphics, name: &str, base_dir: &str) -> TextureId {
        let size = self.cube_face_size;
        let texture = gfx.create_texture(TextureKind::CubeMap, size, size, [0; 4], name);
        self.textures.insert(name.to_string(), texture);
        for face in CubeFace::ALL {
            self.spawn_fetch(texture, face.layer(), face.url(base_dir), Some(size));
        }
        texture
    }

    fn spawn_fetch(&mut self, texture: TextureId, layer: u32, url: String, face_size: Option<u32>) {
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        self.in_flight += 1;

        thread::spawn(move || {
            // A panicking fetch still reports back, so `finish` never waits on it.
            let image = panic::catch_unwind(AssertUnwindSafe(|| {
                source.fetch_image(&url).map(|image| match face_size {
                    Some(size) => texture::fit_square(image, size),
                    None => image,
                })
            }))
            .unwrap_or_else(|_| Err(FetchError::WorkerLost(url.clone())));
            // The registry may be gone by the time the fetch completes.
            let _ = sender.send(TextureUpdate {
                texture,
                layer,
                url,
                image,
            });
        });
    }

    /// Uploads every texture image that finished loading. Never blocks.
    ///
    /// Returns the number of images uploaded.
    pub fn poll(&mut self, gfx: &mut dyn Graphics) -> usize {
        let mut uploaded = 0;
        while let Ok(update) = self.receiver.try_recv() {
            if self.apply(gfx, update) {
                uploaded += 1;
            }
        }
        uploaded
    }

    /// Blocks until every pending texture load has completed and been uploaded.
    pub fn finish(&mut self, gfx: &mut dyn Graphics) -> usize {
        let mut uploaded = 0;
        while self.in_flight > 0 {
            let Ok(update) = self.receiver.recv() else {
                break;
            };
            if self.apply(gfx, update) {
                uploaded += 1;
            }
        }
        uploaded
    }

    /// Number of texture images still loading.
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    fn apply(&mut self, gfx: &mut dyn Graphics, update: TextureUpdate) -> bool {
        self.in_flight -= 1;
        match update.image {
            Ok(image) => {
                log::debug!(
                    "loaded '{}' ({}x{}) into layer {}",
                    update.url,
                    image.width(),
                    image.height(),
                    update.layer
                );
                gfx.upload_texture(update.texture, update.layer, &image);
                true
            }
            Err(e) => {
                log::error!("texture load failed, keeping placeholder: {}", e);
                false
            }
        }
    }

    pub fn program(&self, name: &str) -> Option<ProgramId> {
        self.programs.get(name).copied()
    }

    pub fn texture(&self, name: &str) -> Option<TextureId> {
        self.textures.get(name).copied()
    }

    /// Registers a mesh under `name`, replacing any previous one.
    pub fn add_mesh(&mut self, name: &str, mesh: Rc<Mesh>) {
        self.meshes.insert(name.to_string(), mesh);
    }

    pub fn mesh(&self, name: &str) -> Option<Rc<Mesh>> {
        self.meshes.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::graphics::testing::{Call, Recorder};
    use crate::material::MaterialKind;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(texture::solid(width, height, [255, 0, 0, 255]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn uploads(gfx: &Recorder) -> Vec<(u32, u32, u32)> {
        let mut uploads: Vec<_> = gfx
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::UploadTexture {
                    layer,
                    width,
                    height,
                    ..
                } => Some((*layer, *width, *height)),
                _ => None,
            })
            .collect();
        uploads.sort();
        uploads
    }

    struct PanickingSource;

    impl AssetSource for PanickingSource {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            panic!("backend crashed while reading {}", url);
        }
    }

    #[test]
    fn finish_returns_when_a_worker_panics() {
        let mut resources = Resources::new(Arc::new(PanickingSource));
        let mut gfx = Recorder::new();

        resources.create_texture_2d(&mut gfx, "label", "label.png");
        assert_eq!(resources.pending(), 1);
        assert_eq!(resources.finish(&mut gfx), 0);
        assert_eq!(resources.pending(), 0);
        assert!(uploads(&gfx).is_empty());
    }

    #[test]
    fn texture_is_usable_before_it_loads() {
        let source = Arc::new(MemorySource::new().with("label.png", png(4, 2)));
        let mut resources = Resources::new(source);
        let mut gfx = Recorder::new();

        let texture = resources.create_texture_2d(&mut gfx, "label", "label.png");
        assert_eq!(resources.texture("label"), Some(texture));
        assert_eq!(
            gfx.calls[0],
            Call::CreateTexture {
                kind: TextureKind::Texture2d,
                width: 1,
                height: 1,
                fill: PLACEHOLDER_TEXEL,
            }
        );

        assert_eq!(resources.finish(&mut gfx), 1);
        assert_eq!(resources.pending(), 0);
        assert_eq!(uploads(&gfx), vec![(0, 4, 2)]);
    }

    #[test]
    fn failed_texture_keeps_placeholder() {
        let mut resources = Resources::new(Arc::new(MemorySource::new()));
        let mut gfx = Recorder::new();

        resources.create_texture_2d(&mut gfx, "missing", "missing.png");
        assert_eq!(resources.finish(&mut gfx), 0);
        assert!(uploads(&gfx).is_empty());
    }

    #[test]
    fn cube_faces_load_independently() {
        let mut source = MemorySource::new();
        for face in CubeFace::ALL {
            if face != CubeFace::NegativeY {
                source.insert(face.url("sky"), png(8, 8));
            }
        }
        let mut resources = Resources::new(Arc::new(source)).with_cube_face_size(16);
        let mut gfx = Recorder::new();

        resources.create_cube_map(&mut gfx, "sky", "sky");
        assert_eq!(
            gfx.calls[0],
            Call::CreateTexture {
                kind: TextureKind::CubeMap,
                width: 16,
                height: 16,
                fill: [0; 4],
            }
        );
        assert_eq!(resources.pending(), 6);
        assert_eq!(resources.finish(&mut gfx), 5);

        let faces = uploads(&gfx);
        assert_eq!(faces.len(), 5);
        assert!(faces.iter().all(|&(_, w, h)| (w, h) == (16, 16)));
        assert!(!faces.iter().any(|&(layer, ..)| layer == CubeFace::NegativeY.layer()));
    }

    #[test]
    fn broken_program_is_not_registered() {
        let mut resources = Resources::new(Arc::new(MemorySource::new()));
        let mut gfx = Recorder::new();

        assert!(resources.compile_program(&mut gfx, "broken", "fn vs(").is_err());
        assert_eq!(resources.program("broken"), None);

        let phong = MaterialKind::Phong;
        let program = resources
            .compile_program(&mut gfx, "phong", phong.shader_source())
            .unwrap();
        assert_eq!(resources.program("phong"), Some(program));
    }

    #[test]
    fn meshes_are_shared() {
        let mut resources = Resources::new(Arc::new(MemorySource::new()));
        let mut gfx = Recorder::new();

        resources.add_mesh("cube", Rc::new(Mesh::cube(&mut gfx)));
        let a = resources.mesh("cube").unwrap();
        let b = resources.mesh("cube").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(resources.mesh("sphere").is_none());
    }
}
