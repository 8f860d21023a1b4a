//! Free-fly camera. Its entity carries [`TerrainViewer`], so wherever the
//! camera goes, streaming follows.

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;

use terrain::streaming::TerrainViewer;

const MOVEMENT_SPEED: f32 = 40.0;
const BOOST_MULTIPLIER: f32 = 3.0;
const LOOK_SENSITIVITY: f32 = 0.0025;
const SPAWN_HEIGHT: f32 = 60.0;
const MIN_PITCH: f32 = -1.54; // just shy of straight down
const MAX_PITCH: f32 = 1.54;

pub fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, SPAWN_HEIGHT, 0.0)
            .looking_at(Vec3::new(60.0, 20.0, 60.0), Vec3::Y),
        TerrainViewer,
    ));
}

/// WASD to move on the view plane, Q/E to descend/ascend, left shift to
/// boost, hold right mouse to look around.
pub fn fly_camera(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut camera: Query<&mut Transform, With<TerrainViewer>>,
) {
    let Ok(mut transform) = camera.get_single_mut() else {
        return;
    };

    if mouse_buttons.pressed(MouseButton::Right) {
        let mut delta = Vec2::ZERO;
        for motion in mouse_motion.read() {
            delta += motion.delta;
        }
        if delta != Vec2::ZERO {
            let (mut yaw, mut pitch, _) = transform.rotation.to_euler(EulerRot::YXZ);
            yaw -= delta.x * LOOK_SENSITIVITY;
            pitch = (pitch - delta.y * LOOK_SENSITIVITY).clamp(MIN_PITCH, MAX_PITCH);
            transform.rotation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0);
        }
    } else {
        mouse_motion.clear();
    }

    let mut direction = Vec3::ZERO;
    if keys.pressed(KeyCode::KeyW) {
        direction += *transform.forward();
    }
    if keys.pressed(KeyCode::KeyS) {
        direction -= *transform.forward();
    }
    if keys.pressed(KeyCode::KeyD) {
        direction += *transform.right();
    }
    if keys.pressed(KeyCode::KeyA) {
        direction -= *transform.right();
    }
    if keys.pressed(KeyCode::KeyE) {
        direction += Vec3::Y;
    }
    if keys.pressed(KeyCode::KeyQ) {
        direction -= Vec3::Y;
    }

    if direction != Vec3::ZERO {
        let speed = if keys.pressed(KeyCode::ShiftLeft) {
            MOVEMENT_SPEED * BOOST_MULTIPLIER
        } else {
            MOVEMENT_SPEED
        };
        transform.translation += direction.normalize() * speed * time.delta_secs();
    }
}
