use tauri::{AppHandle, Manager, Runtime, WebviewUrl, WebviewWindow, WebviewWindowBuilder};

use crate::models::{Sticker, WindowBounds};
use crate::trash::TRASHBOX_WINDOW;

const STICKER_PAGE: &str = "index.html";
const TRASHBOX_PAGE: &str = "trashbox.html";

/// Opens the window for `sticker`, or focuses it when it is already open.
pub fn build_sticker_window<R: Runtime>(
    app: &AppHandle<R>,
    sticker: &Sticker,
    default: &WindowBounds,
) -> tauri::Result<WebviewWindow<R>> {
    if let Some(window) = app.get_webview_window(&sticker.id) {
        window.show()?;
        window.set_focus()?;
        return Ok(window);
    }

    let mut builder =
        WebviewWindowBuilder::new(app, sticker.id.as_str(), WebviewUrl::App(STICKER_PAGE.into()))
            .title("mdsticker")
            .decorations(false)
            .skip_taskbar(true)
            .always_on_top(sticker.pinned)
            .min_inner_size(160.0, 120.0);
    builder = match &sticker.bounds {
        Some(bounds) => builder
            .inner_size(bounds.width, bounds.height)
            .position(bounds.x, bounds.y),
        None => builder.inner_size(default.width, default.height),
    };
    let window = builder.build()?;
    let _ = window.set_maximizable(false);
    log::debug!("sticker window opened label={}", sticker.id);
    Ok(window)
}

/// Logical bounds of `window`, in the units stored on a sticker.
pub fn window_bounds<R: Runtime>(window: &WebviewWindow<R>) -> tauri::Result<WindowBounds> {
    let scale = window.scale_factor()?;
    let position = window.outer_position()?.to_logical::<f64>(scale);
    let size = window.inner_size()?.to_logical::<f64>(scale);
    Ok(WindowBounds {
        x: position.x,
        y: position.y,
        width: size.width,
        height: size.height,
    })
}

pub fn show_trashbox_window<R: Runtime>(app: &AppHandle<R>) -> tauri::Result<()> {
    if let Some(window) = app.get_webview_window(TRASHBOX_WINDOW) {
        window.unminimize()?;
        window.show()?;
        window.set_focus()?;
        return Ok(());
    }
    WebviewWindowBuilder::new(app, TRASHBOX_WINDOW, WebviewUrl::App(TRASHBOX_PAGE.into()))
        .title("Trash box")
        .inner_size(420.0, 520.0)
        .min_inner_size(300.0, 200.0)
        .build()?;
    Ok(())
}

/// Closing a window that is already gone succeeds.
pub fn close_window<R: Runtime>(app: &AppHandle<R>, label: &str) -> tauri::Result<()> {
    match app.get_webview_window(label) {
        Some(window) => window.close(),
        None => Ok(()),
    }
}

pub fn set_always_on_top<R: Runtime>(
    app: &AppHandle<R>,
    label: &str,
    on_top: bool,
) -> tauri::Result<()> {
    match app.get_webview_window(label) {
        Some(window) => window.set_always_on_top(on_top),
        None => {
            log::warn!("set_always_on_top: window missing label={label}");
            Ok(())
        }
    }
}
