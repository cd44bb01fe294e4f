use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread::JoinHandle,
};

use anyhow::{bail, Context};
use rayon::prelude::*;

use crate::{config::AssetsConfig, loading::LoadingManager};

/// Cube faces in GPU layer order: +X, -X, +Y, -Y, +Z, -Z.
pub const CUBE_FACE_FILES: [&str; 6] = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"];

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Six square RGBA8 faces of equal size.
pub struct EnvironmentMap {
    pub size: u32,
    pub faces: Vec<Vec<u8>>,
}

impl EnvironmentMap {
    pub fn from_faces(faces: Vec<image::RgbaImage>) -> anyhow::Result<Self> {
        if faces.len() != 6 {
            bail!("Environment map needs 6 faces, got {}", faces.len());
        }

        let size = faces[0].width();
        for (face, file) in faces.iter().zip(CUBE_FACE_FILES) {
            if face.width() != size || face.height() != size {
                bail!(
                    "Environment map face {} is {}x{}, expected {}x{}",
                    file,
                    face.width(),
                    face.height(),
                    size,
                    size
                );
            }
        }

        Ok(Self {
            size,
            faces: faces.into_iter().map(|face| face.into_raw()).collect(),
        })
    }
}

pub struct GltfAsset {
    pub path: PathBuf,
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
    pub images: Vec<gltf::image::Data>,
}

pub enum AssetEvent {
    ItemLoaded { url: String },
    ItemFailed { url: String, error: anyhow::Error },
    EnvironmentMap(EnvironmentMap),
    Model(Box<GltfAsset>),
}

/// Loads the model and environment map on a worker thread.
pub struct AssetLoader {
    receiver: Receiver<AssetEvent>,
    _worker: JoinHandle<()>,
}

impl AssetLoader {
    /// Registers every item with `loading` before any of them can finish.
    pub fn spawn(config: &AssetsConfig, loading: &mut LoadingManager) -> anyhow::Result<Self> {
        let face_paths = CUBE_FACE_FILES
            .iter()
            .map(|file| config.environment_map.join(file))
            .collect::<Vec<_>>();
        let model_path = config.model.clone();

        for path in &face_paths {
            loading.item_start(&path.display().to_string());
        }
        loading.item_start(&model_path.display().to_string());

        let (sender, receiver) = mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("asset loader".to_string())
            .spawn(move || {
                let environment_sender = sender.clone();
                rayon::join(
                    move || load_environment_map(&face_paths, &environment_sender),
                    move || load_model(&model_path, &sender),
                );
            })
            .context("Failed to spawn asset loader thread")?;

        Ok(Self {
            receiver,
            _worker: worker,
        })
    }

    /// Events that arrived since the last call.
    pub fn poll(&self) -> Vec<AssetEvent> {
        self.receiver.try_iter().collect()
    }
}

fn load_environment_map(face_paths: &[PathBuf], sender: &Sender<AssetEvent>) {
    let results = face_paths
        .par_iter()
        .map(|path| decode_face(path))
        .collect::<Vec<_>>();

    let mut faces = Vec::with_capacity(results.len());

    for (path, result) in face_paths.iter().zip(results) {
        let url = path.display().to_string();
        let event = match result {
            Ok(face) => {
                faces.push(face);
                AssetEvent::ItemLoaded { url }
            }
            Err(error) => AssetEvent::ItemFailed { url, error },
        };

        if sender.send(event).is_err() {
            return;
        }
    }

    if faces.len() != face_paths.len() {
        log::warn!("Environment map incomplete, reflections disabled");
        return;
    }

    match EnvironmentMap::from_faces(faces) {
        Ok(environment_map) => {
            let _ = sender.send(AssetEvent::EnvironmentMap(environment_map));
        }
        Err(error) => log::error!("Invalid environment map: {:?}", error),
    }
}

fn decode_face(path: &Path) -> anyhow::Result<image::RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to decode cube face {}", path.display()))?;
    Ok(image.to_rgba8())
}

fn load_model(path: &Path, sender: &Sender<AssetEvent>) {
    let url = path.display().to_string();

    let event = match import_gltf(path) {
        Ok(asset) => {
            if sender.send(AssetEvent::ItemLoaded { url }).is_err() {
                return;
            }
            AssetEvent::Model(Box::new(asset))
        }
        Err(error) => AssetEvent::ItemFailed { url, error },
    };

    let _ = sender.send(event);
}

/// Runs before `gltf::import`, which refuses unknown required extensions with a generic error.
fn reject_compressed_meshes(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let gltf = gltf::Gltf::from_slice_without_validation(bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if gltf
        .extensions_required()
        .any(|extension| extension == DRACO_EXTENSION)
    {
        bail!(
            "{} uses {}, which is not supported; re-export it without mesh compression",
            path.display(),
            DRACO_EXTENSION
        );
    }

    Ok(())
}

fn import_gltf(path: &Path) -> anyhow::Result<GltfAsset> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    reject_compressed_meshes(path, &bytes)?;

    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to import {}", path.display()))?;

    Ok(GltfAsset {
        path: path.to_path_buf(),
        document,
        buffers,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_map_requires_six_equal_square_faces() {
        let face = || image::RgbaImage::new(4, 4);

        let map = EnvironmentMap::from_faces((0..6).map(|_| face()).collect()).unwrap();
        assert_eq!(map.size, 4);
        assert_eq!(map.faces.len(), 6);
        assert_eq!(map.faces[0].len(), 4 * 4 * 4);

        assert!(EnvironmentMap::from_faces((0..5).map(|_| face()).collect()).is_err());

        let mut faces = (0..5).map(|_| face()).collect::<Vec<_>>();
        faces.push(image::RgbaImage::new(4, 2));
        assert!(EnvironmentMap::from_faces(faces).is_err());
    }

    const DRACO_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "extensionsRequired": ["KHR_draco_mesh_compression"]
    }"#;

    #[test]
    fn draco_compressed_models_are_rejected_by_name() {
        let path = std::env::temp_dir().join(format!("draco-{}.gltf", std::process::id()));
        std::fs::write(&path, DRACO_GLTF).unwrap();

        let result = import_gltf(&path);
        std::fs::remove_file(&path).unwrap();

        let error = format!("{:?}", result.err().unwrap());
        assert!(error.contains(DRACO_EXTENSION), "{error}");
        assert!(error.contains("re-export it without mesh compression"), "{error}");
    }

    #[test]
    fn plain_models_pass_the_compression_check() {
        let plain = r#"{ "asset": { "version": "2.0" } }"#;
        assert!(reject_compressed_meshes(Path::new("plain.gltf"), plain.as_bytes()).is_ok());
    }

    #[test]
    fn missing_assets_are_reported_as_failed_items() {
        let config = AssetsConfig {
            model: PathBuf::from("does/not/exist.glb"),
            environment_map: PathBuf::from("does/not/exist"),
            shaders: PathBuf::from("assets/shaders"),
        };
        let mut loading = LoadingManager::new(Default::default());
        let loader = AssetLoader::spawn(&config, &mut loading).unwrap();

        let mut events = Vec::new();
        while events.len() < 7 {
            let event = loader
                .receiver
                .recv_timeout(std::time::Duration::from_secs(10))
                .unwrap();
            events.push(event);
        }

        for event in events {
            match event {
                AssetEvent::ItemFailed { url, error } => loading.item_error(&url, &error),
                _ => panic!("Expected only failures"),
            }
        }

        assert!(loading.is_finished());
        assert_eq!(loading.failed_items(), 7);
    }
}
