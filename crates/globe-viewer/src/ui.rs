//! Viewer UI: loading and error overlays, quick location buttons with a
//! place search, and the tile rotation panel.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use globe_flight::SequencerState;
use globe_flight::locations::{PRESETS, QUICK_LOCATIONS, tour};

use crate::async_runtime::{RunningTasks, TaskSpawner};
use crate::bootstrap::{RetryRequest, ViewerStatus};
use crate::engine::{CameraRig, EngineLink};
use crate::flight::{FlightQueue, Flights, describe_outcome};
use crate::geocoding::{GEOCODING_THROTTLE_SECS, GeocodingState};
use crate::tiles::{TileAnchor, TileRotation};

/// Plugin for the viewer's egui panels.
pub struct ViewerUiPlugin;

impl Plugin for ViewerUiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default()).add_systems(
            EguiPrimaryContextPass,
            (
                status_overlay,
                quick_locations_ui.run_if(resource_exists::<EngineLink>),
                tile_rotation_ui.run_if(resource_exists::<TileRotation>),
            ),
        );
    }
}

/// Loading spinner, or a full-screen error with a retry button.
fn status_overlay(
    mut contexts: EguiContexts,
    status: Res<ViewerStatus>,
    mut retry: ResMut<RetryRequest>,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    match &*status {
        ViewerStatus::Loading => {
            egui::Area::new(egui::Id::new("loading_overlay"))
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading 3D Earth...");
                    });
                });
        }
        ViewerStatus::Failed(message) => {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() / 3.0);
                    ui.heading("Error");
                    ui.colored_label(egui::Color32::RED, message);
                    ui.add_space(8.0);
                    if ui.button("Retry").clicked() {
                        retry.request();
                    }
                });
            });
        }
        ViewerStatus::Ready => {}
    }

    Ok(())
}

/// What the place search needs besides the flight queue.
#[derive(SystemParam)]
struct SearchParams<'w, 's> {
    time: Res<'w, Time>,
    geocoding: ResMut<'w, GeocodingState>,
    spawner: TaskSpawner<'w, 's>,
    running: ResMut<'w, RunningTasks>,
}

/// Buttons that fly the camera, plus the sequencer's status.
#[allow(clippy::needless_pass_by_value)]
fn quick_locations_ui(
    mut contexts: EguiContexts,
    flights: Res<Flights>,
    mut queue: ResMut<FlightQueue>,
    rig: Res<CameraRig>,
    link: Res<EngineLink>,
    mut search: SearchParams,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    egui::Window::new("Quick Locations")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            for preset in QUICK_LOCATIONS {
                if ui.button(preset.name).clicked() {
                    queue.request(vec![preset.coordinate], None);
                }
            }

            ui.collapsing("World", |ui| {
                for preset in PRESETS {
                    if ui.button(preset.name).clicked() {
                        queue.request(vec![preset.coordinate], None);
                    }
                }
                if ui
                    .button("World tour")
                    .on_hover_text("Visit every city in turn")
                    .clicked()
                {
                    let keys: Vec<_> = PRESETS.iter().map(|preset| preset.key).collect();
                    match tour(&keys) {
                        Ok(stops) => queue.request(stops, None),
                        Err(e) => tracing::warn!("Cannot build tour: {e}"),
                    }
                }
            });

            ui.separator();
            search_section(ui, &mut search, &mut queue);
            ui.separator();

            let orbiting = flights.sequencer.is_orbiting();
            if ui
                .add_enabled(orbiting, egui::Button::new("Stop Rotation"))
                .clicked()
            {
                flights.registry.stop_orbit();
            }

            ui.separator();

            match flights.sequencer.state() {
                SequencerState::Idle => {
                    ui.label("Idle");
                }
                SequencerState::Flying { leg } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(format!("Flying to stop {}", leg + 1));
                    });
                    if let Some(progress) = rig.flight_progress() {
                        ui.add(egui::ProgressBar::new(progress).show_percentage());
                    }
                }
                SequencerState::Orbiting { center } => {
                    ui.label(format!(
                        "Orbiting {:.4}, {:.4}",
                        center.latitude, center.longitude
                    ));
                }
            }
            if let Some(outcome) = queue.last_outcome() {
                ui.label(describe_outcome(outcome));
            }
            ui.label(format!(
                "Frame listeners: {}",
                link.engine.listener_count()
            ));
        });

    Ok(())
}

/// Search box and results; clicking a result flies there.
fn search_section(ui: &mut egui::Ui, search: &mut SearchParams, queue: &mut FlightQueue) {
    let current_time = search.time.elapsed_secs_f64();
    let mut start_search = false;

    ui.horizontal(|ui| {
        ui.label("Search:");
        let response = ui.add(
            egui::TextEdit::singleline(&mut search.geocoding.search_text)
                .desired_width(150.0)
                .hint_text("City, address..."),
        );
        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            start_search = true;
        }
        if ui.button("Go").clicked() {
            start_search = true;
        }
    });

    if start_search {
        search
            .geocoding
            .start_request(current_time, &search.spawner, &mut search.running);
    }

    let geocoding = &search.geocoding;
    if geocoding.is_loading {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Searching...");
        });
    } else if let Some(last_time) = geocoding.last_request_time {
        let elapsed = current_time - last_time;
        if elapsed < GEOCODING_THROTTLE_SECS {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let remaining = (GEOCODING_THROTTLE_SECS - elapsed).ceil() as u64;
            ui.label(format!("Wait {remaining}s before next search"));
        }
    }

    if let Some(error) = &geocoding.error {
        ui.colored_label(egui::Color32::RED, error);
    }

    if !geocoding.results.is_empty() {
        egui::ScrollArea::vertical()
            .max_height(150.0)
            .show(ui, |ui| {
                for result in &geocoding.results {
                    if ui
                        .link(result.short_name())
                        .on_hover_text(&result.display_name)
                        .clicked()
                    {
                        queue.request(vec![result.coordinate], None);
                    }
                }
            });
    }

    // Nominatim attribution (required by usage policy).
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 2.0;
        ui.label("Search by");
        ui.hyperlink_to("Nominatim", "https://nominatim.openstreetmap.org/");
        ui.label("© OpenStreetMap");
    });
}

/// Where the tile source is centered and when it moves next.
#[allow(clippy::needless_pass_by_value)]
fn tile_rotation_ui(
    mut contexts: EguiContexts,
    rotation: Res<TileRotation>,
    anchors: Query<&TileAnchor>,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    egui::Window::new("Tile Source")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            let location = rotation.current_location();
            ui.label(format!("Location: {}", location.name));
            ui.label(format!(
                "Next location in {:.1}s",
                rotation.remaining_secs()
            ));
            if let Some(anchor) = anchors.iter().next() {
                ui.separator();
                ui.label(format!("Anchor: {}", anchor.location));
                ui.label(format!("Asset: {}", anchor.config.ion_asset_id));
                if anchor.config.ion_token.is_none() {
                    ui.colored_label(egui::Color32::YELLOW, "No access token set");
                }
            } else {
                ui.colored_label(egui::Color32::RED, "Tile source unavailable");
            }
        });

    Ok(())
}
