use crate::{debug_panel, showroom::Showroom};

pub fn update(showroom: &mut Showroom, delta_time: f32, ui: &mut imgui::Ui) -> anyhow::Result<()> {
    showroom.scene.early_update();
    showroom.update(delta_time);

    if showroom.config.debug.show_panel {
        debug_panel::draw(showroom, ui, delta_time);
    }

    showroom.scene.late_update();

    Ok(())
}
