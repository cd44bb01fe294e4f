use std::f32::consts::PI;

use crate::{doors::HingedDoor, showroom::Showroom};

/// Tweak window for posing the fridge by hand.
pub fn draw(showroom: &mut Showroom, ui: &imgui::Ui, delta_time: f32) {
    ui.window("Showroom")
        .position([0.0, 0.0], imgui::Condition::FirstUseEver)
        .size([320.0, 200.0], imgui::Condition::FirstUseEver)
        .build(|| {
            let fps = if delta_time > 0.0 { 1.0 / delta_time } else { 0.0 };
            ui.text(format!(
                "FPS: {:.0}  uptime {:.1}s",
                fps,
                showroom.start_time.elapsed().as_secs_f32()
            ));
            ui.text(format!(
                "Loading: {:.0}% ({} failed)",
                showroom.loading.progress_ratio() * 100.0,
                showroom.loading.failed_items()
            ));
            ui.separator();

            let mut rotation = showroom.showroom_rotation();
            if ui.slider("Rotation", 0.0, 2.0 * PI, &mut rotation) {
                showroom.set_showroom_rotation(rotation);
            }

            if showroom.doors.is_empty() {
                ui.text_disabled("Fridge not loaded");
                return;
            }

            let Showroom { doors, scene, .. } = showroom;
            for door in doors.iter_mut() {
                let mut angle = door.angle();
                if ui.slider(&door.name, -2.0, 0.0, &mut angle) {
                    door.set_angle(scene, angle);
                }
                ui.same_line();
                ui.text(door_state(door));
            }
        });
}

fn door_state(door: &HingedDoor) -> &'static str {
    match (door.is_animating(), door.is_open()) {
        (true, true) => "opening",
        (true, false) => "closing",
        (false, true) => "open",
        (false, false) => "closed",
    }
}
