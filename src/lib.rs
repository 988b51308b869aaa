pub mod client;
pub mod commands;
pub mod error;
pub mod events;
pub mod markdown;
pub mod models;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod trash;

#[cfg(all(feature = "app", not(test)))]
mod bus_tauri;
#[cfg(any(feature = "app", test))]
mod logging;
#[cfg(test)]
mod testing;
#[cfg(any(feature = "app", test))]
mod tray;
#[cfg(all(feature = "app", not(test)))]
mod windows;

#[cfg(all(feature = "app", not(test)))]
use std::sync::Arc;

#[cfg(all(feature = "app", not(test)))]
use tauri::{Manager, RunEvent, WindowEvent};

#[cfg(all(feature = "app", not(test)))]
use crate::bus_tauri::{SharedBus, TauriBus};
#[cfg(all(feature = "app", not(test)))]
use crate::commands::*;
#[cfg(all(feature = "app", not(test)))]
use crate::logging::init_logging;
#[cfg(all(feature = "app", not(test)))]
use crate::sync::WindowBus;
#[cfg(all(feature = "app", not(test)))]
use crate::tray::init_tray;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
#[cfg(all(feature = "app", not(test)))]
pub fn run() {
    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let data_dir = app.path().app_data_dir()?;
            if let Err(err) = init_logging(&data_dir) {
                eprintln!("failed to initialize logging: {err}");
            }

            let state = bootstrap_app_state(app.handle())?;
            let settings = state.settings();
            app.manage(state);

            let bus: Arc<dyn WindowBus> = Arc::new(TauriBus::new(app.handle().clone()));
            app.manage(SharedBus(bus));

            let restored = restore_app_stickers(app.handle())?;
            log::info!("startup restored={}", restored.len());

            init_tray(app, &settings)?;
            Ok(())
        })
        .on_window_event(|window, event| {
            let scale = match window.scale_factor() {
                Ok(scale) => scale,
                Err(_) => return,
            };
            match event {
                WindowEvent::Moved(position) => {
                    let position = position.to_logical::<f64>(scale);
                    update_sticker_position(window.app_handle(), window.label(), position.x, position.y);
                }
                WindowEvent::Resized(size) => {
                    let size = size.to_logical::<f64>(scale);
                    update_sticker_size(window.app_handle(), window.label(), size.width, size.height);
                }
                _ => {}
            }
        })
        .invoke_handler(tauri::generate_handler![
            new_sticker,
            load_sticker,
            save_sticker_markdown,
            save_sticker_color,
            toggle_sticker_pinned,
            remove_sticker,
            load_trashbox_stickers,
            delete_stickers,
            recover_stickers,
            open_url,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|_app, event| {
        // Closing the last sticker keeps the tray alive; only an explicit exit quits.
        if let RunEvent::ExitRequested { code: None, api, .. } = event {
            api.prevent_exit();
        }
    });
}
