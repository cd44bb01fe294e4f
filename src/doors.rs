//! Hinged doors. A door hangs under a pivot node placed on its hinge line, and
//! opening the door is a tween of the pivot's rotation about Y.

use anyhow::Context;
use glam::{Quat, Vec3};

use crate::{
    scene_graph::{ObjectId, Scene},
    tween::{Ease, Tween},
};

pub struct HingedDoor {
    pub name: String,
    pub pivot: ObjectId,
    pub door: ObjectId,
    /// Hit target for toggling
    pub handle: ObjectId,
    pub interactive: bool,
    open_angle: f32,
    duration: f32,
    angle: f32,
    open: bool,
    tween: Option<Tween>,
}

/// Nodes needed to hang one door. `extras` follow the door (handles, decals).
pub struct DoorParts<'a> {
    pub name: &'a str,
    pub pivot: ObjectId,
    pub door: ObjectId,
    pub handle: ObjectId,
    pub extras: &'a [ObjectId],
}

impl HingedDoor {
    /// Moves the door under its pivot and shifts both so the pivot sits on the hinge.
    ///
    /// The pivot takes over the door's local position, then moves `pivot_displacement`
    /// along its own +Z while the door moves back by the same amount along its own -Z.
    pub fn assemble(
        scene: &mut Scene,
        parts: DoorParts,
        pivot_displacement: f32,
        open_angle: f32,
        duration: f32,
    ) -> anyhow::Result<Self> {
        scene
            .attach(parts.door, parts.handle)
            .with_context(|| format!("Failed to attach handle to {}", parts.name))?;

        for &extra in parts.extras {
            scene
                .attach(parts.door, extra)
                .with_context(|| format!("Failed to attach decal to {}", parts.name))?;
        }

        let door_position = scene
            .get_object_transform(parts.door)
            .map(|transform| transform.translation())
            .with_context(|| format!("Door {} is not in the scene", parts.name))?;

        scene.set_object_translation(parts.pivot, door_position);
        scene.set_object_translation(parts.door, Vec3::ZERO);
        scene.set_object_parent(parts.door, Some(parts.pivot))?;

        scene.translate_object_on_axis(parts.pivot, Vec3::Z, pivot_displacement);
        scene.translate_object_on_axis(parts.door, Vec3::Z, -pivot_displacement);

        log::debug!(
            "Hung {} on pivot at {:?}",
            parts.name,
            scene.world_matrix(parts.pivot).transform_point3(Vec3::ZERO)
        );

        Ok(Self {
            name: parts.name.to_string(),
            pivot: parts.pivot,
            door: parts.door,
            handle: parts.handle,
            interactive: true,
            open_angle,
            duration,
            angle: 0.0,
            open: false,
            tween: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Starts swinging towards the other end, from wherever the door is now.
    pub fn toggle(&mut self) {
        self.open = !self.open;
        let target = if self.open { self.open_angle } else { 0.0 };

        log::debug!("{} {}", self.name, if self.open { "opening" } else { "closing" });

        self.tween = Some(Tween::new(self.angle, target, self.duration, Ease::Power1Out));
    }

    /// Sets the angle directly, cancelling any animation.
    pub fn set_angle(&mut self, scene: &mut Scene, angle: f32) {
        self.tween = None;
        self.angle = angle;
        self.open = angle.abs() > f32::EPSILON;
        self.apply(scene);
    }

    pub fn update(&mut self, scene: &mut Scene, delta_time: f32) {
        let Some(tween) = &mut self.tween else {
            return;
        };

        self.angle = tween.advance(delta_time);

        if tween.is_finished() {
            self.tween = None;
        }

        self.apply(scene);
    }

    fn apply(&self, scene: &mut Scene) {
        scene.set_object_rotation(self.pivot, Quat::from_rotation_y(self.angle));
    }
}
