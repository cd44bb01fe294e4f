pub mod environment_map;
pub mod imgui_renderer;
pub mod passes;
pub mod render_common;
pub mod render_material_manager;
pub mod render_model;
pub mod render_object;
pub mod renderer;
pub mod scene_uniform;
pub mod shader_loader;
pub mod texture;
