use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, channel},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Context};
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt, notify::*, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{naga, PollType, RenderPipeline};

const SHARED_MODULES_FOLDER: &str = "shared";

type PipelineFactory = Box<
    dyn Sync
        + Send
        + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<wgpu::RenderPipeline>,
>;

#[derive(Debug, Clone)]
pub(crate) struct ShaderDefinition {
    pub name: &'static str,
    /// Relative to the shader folder
    pub path: &'static str,
}

pub struct ShaderEntry {
    pipeline_id: PipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type PipelineId = Id<PipelineCacheEntry>;

#[derive(Default)]
pub struct PipelineCacheEntry(Option<wgpu::RenderPipeline>);

pub struct PipelineCacheBuilder {
    shaders: Arena<ShaderEntry>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCacheBuilder {
    pub fn new() -> Self {
        Self {
            shaders: Arena::new(),
            pipelines: Arena::new(),
        }
    }

    pub fn add_shader(
        &mut self,
        shader_def: ShaderDefinition,
        factory: PipelineFactory,
    ) -> PipelineId {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        self.shaders.alloc(ShaderEntry {
            pipeline_id,
            def: shader_def,
            factory,
        });
        pipeline_id
    }

    fn build(self) -> PipelineCache {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache {
    shaders: Arc<Arena<ShaderEntry>>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCache {
    /// `None` only if the pipeline never compiled.
    pub fn get(&self, id: PipelineId) -> Option<&RenderPipeline> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn set(&mut self, id: PipelineId, pipeline: wgpu::RenderPipeline) {
        if let Some(entry) = self.pipelines.get_mut(id) {
            entry.0 = Some(pipeline);
        }
    }
}

/// Where shaders live and how to compose them.
#[derive(Clone)]
struct ShaderSources {
    folder: PathBuf,
    composer: Arc<RwLock<Composer>>,
}

impl ShaderSources {
    fn new(folder: &Path) -> anyhow::Result<Self> {
        let folder = folder
            .canonicalize()
            .with_context(|| format!("Shader folder {} not found", folder.display()))?;
        let composer = create_composer(&folder.join(SHARED_MODULES_FOLDER))?;

        Ok(Self {
            folder,
            composer: Arc::new(RwLock::new(composer)),
        })
    }

    fn reload_shared_modules(&self) -> anyhow::Result<()> {
        let composer = create_composer(&self.folder.join(SHARED_MODULES_FOLDER))?;
        *self
            .composer
            .write()
            .map_err(|_| anyhow!("Shader composer lock poisoned"))? = composer;
        Ok(())
    }

    fn is_shared_module(&self, path: &Path) -> bool {
        path.starts_with(self.folder.join(SHARED_MODULES_FOLDER))
    }
}

type CompiledPipeline = (&'static str, PipelineId, wgpu::RenderPipeline);

/// Compiles every registered shader up front and recompiles them in the
/// watcher thread whenever their file (or a shared module) changes.
pub(crate) struct ShaderLoader {
    pub cache: PipelineCache,
    receiver: mpsc::Receiver<CompiledPipeline>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ShaderLoader {
    pub fn new(
        device: wgpu::Device,
        shader_folder: &Path,
        cache_builder: PipelineCacheBuilder,
    ) -> anyhow::Result<Self> {
        let mut cache = cache_builder.build();
        let sources = ShaderSources::new(shader_folder)?;

        for (_, shader) in cache.shaders.clone().iter() {
            let pipeline = compile_file(&device, shader, &sources)
                .with_context(|| format!("Failed to compile shader: {}", shader.def.name))?;
            cache.set(shader.pipeline_id, pipeline);
        }

        let (send_new_pipelines, recv_new_pipelines) = channel();

        let shaders = cache.shaders.clone();
        let watched_sources = sources.clone();
        let mut debouncer = new_debouncer_opt(
            notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
            move |res: DebounceEventResult| {
                let events = match res {
                    Ok(events) => events,
                    Err(e) => {
                        log::error!("Error watching shaders: {}", e);
                        return;
                    }
                };

                for event in events {
                    if event.kind != DebouncedEventKind::Any {
                        continue;
                    }

                    // A shared module can be imported by anything
                    let affected = if watched_sources.is_shared_module(&event.path) {
                        if let Err(e) = watched_sources.reload_shared_modules() {
                            log::error!("Failed to reload shared shader modules: {:?}", e);
                            continue;
                        }
                        shaders.iter().map(|(_, entry)| entry).collect::<Vec<_>>()
                    } else {
                        shaders
                            .iter()
                            .map(|(_, entry)| entry)
                            .filter(|entry| event.path.ends_with(entry.def.path))
                            .collect()
                    };

                    for entry in affected {
                        match compile_file(&device, entry, &watched_sources) {
                            Ok(pipeline) => {
                                let message = (entry.def.name, entry.pipeline_id, pipeline);
                                if send_new_pipelines.send(message).is_err() {
                                    return;
                                }
                            }
                            Err(e) => log::error!("Failed to reload {}: {:?}", entry.def.name, e),
                        }
                    }
                }
            },
        )
        .context("Failed to create shader watcher")?;

        debouncer
            .watcher()
            .watch(&sources.folder, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", sources.folder.display()))?;

        Ok(Self {
            cache,
            receiver: recv_new_pipelines,
            _debouncer: debouncer,
        })
    }

    pub(crate) fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.receiver.try_recv() {
            log::info!("Shader reloaded: {}", name);
            self.cache.set(pipeline_id, pipeline);
        }
    }
}

fn compile_file(
    device: &wgpu::Device,
    entry: &ShaderEntry,
    sources: &ShaderSources,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let path = sources.folder.join(entry.def.path);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;

    let file_path = path.to_string_lossy().to_string();

    let module = {
        let mut composer = sources
            .composer
            .write()
            .map_err(|_| anyhow!("Shader composer lock poisoned"))?;

        composer
            .make_naga_module(NagaModuleDescriptor {
                file_path: &file_path,
                source: &shader_code,
                ..Default::default()
            })
            .map_err(|e| anyhow!("{}", e.emit_to_string(&composer)))
            .with_context(|| format!("Failed to compose {}", file_path))?
    };

    // wgpu validates again when creating the module
    let info = naga::valid::Validator::new(ValidationFlags::empty(), Capabilities::all())
        .validate(&module)
        .context("Failed to validate Naga module")?;

    let shader_code = naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("Failed to convert Naga module to WGSL string")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = (entry.factory)(device, &entry.def, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation.")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        return Err(anyhow!(
            "Shader compilation failed for {}: {}",
            entry.def.name,
            error
        ));
    }

    pipeline
}

fn create_composer(shared_folder: &Path) -> anyhow::Result<Composer> {
    let shared_files = std::fs::read_dir(shared_folder).with_context(|| {
        format!(
            "Failed to read shared shader modules from {}",
            shared_folder.display()
        )
    })?;

    let mut composer = Composer::default();

    for entry in shared_files {
        let path = entry
            .context("Failed to read entry in shared shader modules directory")?
            .path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_path = path.to_string_lossy().to_string();

        let added = composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .map(|_| ());

        if let Err(e) = added {
            bail!(
                "Failed to add shared shader module {}: {}",
                file_path,
                e.emit_to_string(&composer)
            );
        }
    }

    Ok(composer)
}
