pub mod overlay_pass;
pub mod pbr_pass;
pub mod shadow_pass;
