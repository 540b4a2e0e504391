//! 3D globe viewer with scripted camera flights.
//!
//! Quick location buttons, a place search and JSON tours fly the camera from
//! place to place and leave it slowly orbiting the last arrival. Between
//! flights the mouse turns the camera around whatever it looks at. The
//! `tiles` variant instead rebuilds the tile source around a new world city
//! on a timer.

mod async_runtime;
mod bootstrap;
mod controls;
mod engine;
mod flight;
mod floating_origin;
mod geocoding;
mod launch_params;
mod tiles;
mod ui;

use async_runtime::AsyncRuntimePlugin;
use bevy::prelude::*;
use bootstrap::BootstrapPlugin;
use controls::GlobeControlsPlugin;
use engine::CameraEnginePlugin;
use flight::FlightPlugin;
use floating_origin::FloatingOriginPlugin;
use geocoding::GeocodingPlugin;
use tiles::TilesPlugin;
use ui::ViewerUiPlugin;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            AsyncRuntimePlugin,
            FloatingOriginPlugin,
            CameraEnginePlugin,
            GlobeControlsPlugin,
            FlightPlugin,
            GeocodingPlugin,
            TilesPlugin,
            BootstrapPlugin,
            ViewerUiPlugin,
        ));
    }
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let params = launch_params::parse();
    tracing::info!("Starting {} viewer", params.variant);

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "globe-viewer".to_string(),
        resolution: (1280, 720).into(),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }))
    .insert_resource(params)
    .add_plugins(AppPlugin)
    .run();
}
