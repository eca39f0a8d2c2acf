mod config;
mod dispatch;
mod highlight;
mod interaction;
mod link;
mod protocol;
mod queue;
mod runtime;
mod scene;
mod sidekick;
mod telemetry;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use config::load_stage_config;
use runtime::HeadlessMode;

fn main() {
    let headless = std::env::args().any(|a| a == "--headless");
    let config = load_stage_config();
    let mut app = App::new();

    app.insert_resource(HeadlessMode(headless));

    if headless {
        // No window, renderer or audio device: just ECS, the queue and the link
        app.add_plugins((MinimalPlugins, LogPlugin::default()));
        info!("[Stage] Starting in HEADLESS mode");
    } else {
        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: config.window_title.clone(),
                        resolution: (config.window_width, config.window_height).into(),
                        present_mode: bevy::window::PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    file_path: config.assets_dir.clone(),
                    ..default()
                }),
        );
        let [r, g, b] = config.background_color;
        app.insert_resource(ClearColor(Color::srgb(r, g, b)))
            .add_plugins((
                scene::SceneVisualPlugin,
                highlight::HighlightVisualPlugin,
                sidekick::SidekickVoicePlugin,
                interaction::PointerPlugin,
            ));
        if config.assets_dir != "assets" {
            info!("[Stage] Using assets dir: {}", config.assets_dir);
        }
        info!("[Stage] Starting in WINDOWED mode");
    }

    info!("[Stage] Linking to {}", config.websocket_url());
    app.insert_resource(config).add_plugins(link::LinkPlugin);

    app.run();
}
