use bevy::prelude::*;
use bevy::window::PresentMode;

use terrain::config::TerrainSettings;
use terrain::heightmap::{HeightCurve, HeightMapSettings};
use terrain::TerrainPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Landmass".to_string(),
                resolution: (1280.0, 720.0).into(),
                present_mode: PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }))
        .insert_resource(terrain_settings())
        .add_plugins((TerrainPlugin, rendering::RenderingPlugin))
        .add_systems(Startup, setup_environment)
        .run();
}

fn terrain_settings() -> TerrainSettings {
    TerrainSettings {
        height_map: HeightMapSettings {
            height_multiplier: 45.0,
            // Flatten the low range into plains, let the peaks climb.
            height_curve: HeightCurve::from_points(vec![0.0, 0.02, 0.1, 0.35, 0.75, 1.0]),
            ..HeightMapSettings::default()
        },
        ..TerrainSettings::default()
    }
}

fn setup_environment(mut commands: Commands) {
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
    ));
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 250.0,
    });
}
