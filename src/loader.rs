//! Batch loading of external mesh files.
//!
//! A batch is a list of [`MeshRequest`]s plus a `build` closure that turns the
//! finished meshes into scene elements. Every request is fetched and parsed on
//! its own worker thread; the batch resolves once all of them succeeded, or
//! with the first failure in request order.
//!
//! Resolution happens on the owning thread in [`MeshLoader::poll`] (or
//! [`MeshLoader::finish`]): the meshes are uploaded, `build` runs once and its
//! elements are appended to the scene in one step. A failed batch appends
//! nothing, so the renderer never sees half of a batch.
//!
//! ```ignore
//! loader.load_batch(
//!     vec![MeshRequest::obj("obj/mug.obj"), MeshRequest::obj("obj/beer-bottle.obj")],
//!     move |meshes| vec![mug(&meshes[0]), bottle(&meshes[1])],
//! );
//!
//! // once per frame
//! for outcome in loader.poll(&mut gfx, &mut scene) { ... }
//! ```

use std::rc::Rc;
use std::string::FromUtf8Error;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::assets::{AssetSource, FetchError};
use crate::geometry::{self, GeometryData, MeshError};
use crate::graphics::Graphics;
use crate::mesh::Mesh;
use crate::scene::{Scene, SceneElement};

/// File format of an external mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshFormat {
    /// Wavefront OBJ.
    Obj,
    /// JSON with `vertices`, `normals`, `textures` and `indices` arrays.
    Json,
}

impl MeshFormat {
    /// Infers the format from a URL's extension (`.obj` or `.json`).
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = path.rsplit_once('.')?.1;
        if extension.eq_ignore_ascii_case("obj") {
            Some(MeshFormat::Obj)
        } else if extension.eq_ignore_ascii_case("json") {
            Some(MeshFormat::Json)
        } else {
            None
        }
    }

    fn parse(self, text: &str) -> Result<GeometryData, MeshError> {
        match self {
            MeshFormat::Obj => geometry::parse_obj(text),
            MeshFormat::Json => geometry::parse_json(text),
        }
    }
}

/// One mesh file to load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshRequest {
    pub url: String,
    pub format: MeshFormat,
}

impl MeshRequest {
    pub fn new(url: impl Into<String>, format: MeshFormat) -> Self {
        Self {
            url: url.into(),
            format,
        }
    }

    pub fn obj(url: impl Into<String>) -> Self {
        Self::new(url, MeshFormat::Obj)
    }

    pub fn json(url: impl Into<String>) -> Self {
        Self::new(url, MeshFormat::Json)
    }
}

/// Why a batch failed.
#[derive(Debug)]
pub enum LoadError {
    /// A mesh file could not be fetched.
    Fetch(FetchError),
    /// A mesh file is not valid UTF-8.
    Encoding { url: String, source: FromUtf8Error },
    /// A mesh file did not parse or failed validation.
    Parse { url: String, source: MeshError },
    /// A worker thread died before reporting.
    WorkerLost,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Fetch(e) => write!(f, "{}", e),
            LoadError::Encoding { url, source } => {
                write!(f, "mesh '{}' is not UTF-8: {}", url, source)
            }
            LoadError::Parse { url, source } => write!(f, "mesh '{}': {}", url, source),
            LoadError::WorkerLost => write!(f, "mesh loading worker terminated unexpectedly"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Fetch(e) => Some(e),
            LoadError::Encoding { source, .. } => Some(source),
            LoadError::Parse { source, .. } => Some(source),
            LoadError::WorkerLost => None,
        }
    }
}

impl From<FetchError> for LoadError {
    fn from(e: FetchError) -> Self {
        LoadError::Fetch(e)
    }
}

/// A batch that resolved successfully.
#[derive(Debug)]
pub struct BatchReport {
    /// The uploaded meshes with the URL each came from, in request order.
    pub meshes: Vec<(String, Rc<Mesh>)>,
    /// Number of scene elements appended.
    pub appended: usize,
}

/// Result of one resolved batch.
pub type BatchOutcome = Result<BatchReport, LoadError>;

type BuildFn = Box<dyn FnOnce(&[Rc<Mesh>]) -> Vec<SceneElement>>;
type Parsed = Result<Vec<(String, GeometryData)>, LoadError>;

struct PendingBatch {
    receiver: Receiver<Parsed>,
    build: BuildFn,
}

/// Issues batches and merges finished ones into a scene.
pub struct MeshLoader {
    source: Arc<dyn AssetSource>,
    pending: Vec<PendingBatch>,
}

impl MeshLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            pending: Vec::new(),
        }
    }

    /// Starts loading every request of a batch concurrently.
    ///
    /// `build` receives the meshes in request order and runs at most once,
    /// only if the whole batch succeeded.
    pub fn load_batch<F>(&mut self, requests: Vec<MeshRequest>, build: F)
    where
        F: FnOnce(&[Rc<Mesh>]) -> Vec<SceneElement> + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let source = Arc::clone(&self.source);
        log::debug!("loading batch of {} meshes", requests.len());

        thread::spawn(move || {
            let result = fetch_all(source.as_ref(), &requests);
            // The loader may have been dropped meanwhile.
            let _ = sender.send(result);
        });

        self.pending.push(PendingBatch {
            receiver,
            build: Box::new(build),
        });
    }

    /// Resolves every batch whose workers have finished. Never blocks.
    pub fn poll(&mut self, gfx: &mut dyn Graphics, scene: &mut Scene) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::new();
        let mut waiting = Vec::new();

        for batch in self.pending.drain(..) {
            match batch.receiver.try_recv() {
                Ok(parsed) => outcomes.push(resolve(gfx, scene, parsed, batch.build)),
                Err(TryRecvError::Empty) => waiting.push(batch),
                Err(TryRecvError::Disconnected) => {
                    outcomes.push(resolve(gfx, scene, Err(LoadError::WorkerLost), batch.build))
                }
            }
        }

        self.pending = waiting;
        outcomes
    }

    /// Blocks until every pending batch has resolved.
    pub fn finish(&mut self, gfx: &mut dyn Graphics, scene: &mut Scene) -> Vec<BatchOutcome> {
        self.pending
            .drain(..)
            .map(|batch| {
                let parsed = batch.receiver.recv().unwrap_or(Err(LoadError::WorkerLost));
                resolve(gfx, scene, parsed, batch.build)
            })
            .collect()
    }

    /// Number of batches still loading.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Fetches and parses every request on its own thread.
///
/// Reports the first failure in request order, regardless of which worker
/// finished first.
fn fetch_all(source: &dyn AssetSource, requests: &[MeshRequest]) -> Parsed {
    thread::scope(|scope| {
        let workers: Vec<_> = requests
            .iter()
            .map(|request| scope.spawn(move || fetch_one(source, request)))
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or(Err(LoadError::WorkerLost)))
            .collect()
    })
}

fn fetch_one(source: &dyn AssetSource, request: &MeshRequest) -> Result<(String, GeometryData), LoadError> {
    let bytes = source.fetch(&request.url)?;
    let text = String::from_utf8(bytes).map_err(|source| LoadError::Encoding {
        url: request.url.clone(),
        source,
    })?;
    let geometry = request
        .format
        .parse(&text)
        .map_err(|source| LoadError::Parse {
            url: request.url.clone(),
            source,
        })?;
    Ok((request.url.clone(), geometry))
}

fn resolve(gfx: &mut dyn Graphics, scene: &mut Scene, parsed: Parsed, build: BuildFn) -> BatchOutcome {
    let geometries = match parsed {
        Ok(geometries) => geometries,
        Err(e) => {
            log::error!("mesh batch failed, no elements added: {}", e);
            return Err(e);
        }
    };

    let meshes: Vec<(String, Rc<Mesh>)> = geometries
        .iter()
        .map(|(url, geometry)| (url.clone(), Rc::new(Mesh::upload(gfx, geometry, url))))
        .collect();
    let handles: Vec<Rc<Mesh>> = meshes.iter().map(|(_, mesh)| Rc::clone(mesh)).collect();

    let elements = build(&handles);
    let appended = elements.len();
    scene.extend(elements);
    log::info!("mesh batch loaded: {} meshes, {} elements", meshes.len(), appended);

    Ok(BatchReport { meshes, appended })
}
