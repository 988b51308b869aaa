#[cfg(all(feature = "app", not(test)))]
use sys_locale::get_locale;

#[cfg(all(feature = "app", not(test)))]
use crate::bus_tauri::SharedBus;
#[cfg(all(feature = "app", not(test)))]
use crate::commands::create_sticker_from_host;
#[cfg(all(feature = "app", not(test)))]
use crate::events::HOST_SOURCE;
#[cfg(all(feature = "app", not(test)))]
use crate::models::Settings;
#[cfg(all(feature = "app", not(test)))]
use crate::sync::broadcast_reload;
#[cfg(all(feature = "app", not(test)))]
use crate::windows::show_trashbox_window;
#[cfg(all(feature = "app", not(test)))]
use tauri::{
    menu::{Menu, MenuItem},
    tray::TrayIconBuilder,
    App, AppHandle, Manager, Runtime,
};

#[cfg(all(feature = "app", not(test)))]
const TRAY_ID: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrayLanguage {
    En,
    Ja,
    Zh,
}

struct TrayLabels {
    new_sticker: &'static str,
    trashbox: &'static str,
    quit: &'static str,
    tooltip: &'static str,
}

/// `language` is the settings value; `auto` or anything unknown defers to `locale`.
fn resolve_tray_language(language: &str, locale: Option<&str>) -> TrayLanguage {
    match language.trim().to_lowercase().as_str() {
        "en" => TrayLanguage::En,
        "ja" => TrayLanguage::Ja,
        "zh" => TrayLanguage::Zh,
        _ => language_from_locale(locale.unwrap_or_default()),
    }
}

fn language_from_locale(locale: &str) -> TrayLanguage {
    let locale = locale.to_lowercase();
    if locale.starts_with("ja") {
        TrayLanguage::Ja
    } else if locale.starts_with("zh") {
        TrayLanguage::Zh
    } else {
        TrayLanguage::En
    }
}

fn tray_labels(lang: TrayLanguage) -> TrayLabels {
    match lang {
        TrayLanguage::En => TrayLabels {
            new_sticker: "New sticker",
            trashbox: "Trash box",
            quit: "Quit",
            tooltip: "mdsticker",
        },
        TrayLanguage::Ja => TrayLabels {
            new_sticker: "新しい付箋",
            trashbox: "ゴミ箱",
            quit: "終了",
            tooltip: "mdsticker",
        },
        TrayLanguage::Zh => TrayLabels {
            new_sticker: "新建便签",
            trashbox: "回收站",
            quit: "退出",
            tooltip: "mdsticker",
        },
    }
}

#[cfg(all(feature = "app", not(test)))]
fn build_tray_menu<R: Runtime, M: Manager<R>>(
    app: &M,
    labels: &TrayLabels,
) -> Result<Menu<R>, Box<dyn std::error::Error>> {
    let new_sticker = MenuItem::with_id(app, "new_sticker", labels.new_sticker, true, None::<&str>)?;
    let trashbox = MenuItem::with_id(app, "trashbox", labels.trashbox, true, None::<&str>)?;
    let quit = MenuItem::with_id(app, "quit", labels.quit, true, None::<&str>)?;
    Ok(Menu::with_items(app, &[&new_sticker, &trashbox, &quit])?)
}

#[cfg(all(feature = "app", not(test)))]
fn new_sticker_from_tray<R: Runtime>(app: &AppHandle<R>) {
    if let Err(err) = create_sticker_from_host(app) {
        log::warn!("tray: failed to create sticker: {err}");
        return;
    }
    let bus = app.state::<SharedBus>();
    if let Err(err) = broadcast_reload(bus.0.as_ref(), HOST_SOURCE) {
        log::warn!("tray: reload broadcast failed: {err}");
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_tray(app: &mut App, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let icon = app.default_window_icon().cloned().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "default window icon is missing",
        )
    })?;

    let locale = get_locale();
    let lang = resolve_tray_language(&settings.language, locale.as_deref());
    let labels = tray_labels(lang);
    let menu = build_tray_menu(app, &labels)?;

    let _tray = TrayIconBuilder::with_id(TRAY_ID)
        .icon(icon)
        .tooltip(labels.tooltip)
        .menu(&menu)
        .show_menu_on_left_click(true)
        .on_menu_event(|app, event| {
            let id = event.id.as_ref();
            log::info!("tray: menu_event id={id}");

            match id {
                "quit" => app.exit(0),
                "new_sticker" => new_sticker_from_tray(app),
                "trashbox" => {
                    if let Err(err) = show_trashbox_window(app) {
                        log::warn!("tray: failed to show trash box: {err}");
                    }
                }
                _ => {}
            }
        })
        .build(app)?;

    Ok(())
}
