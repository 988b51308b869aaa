use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::client::StickerBackend;
use crate::error::{BackendError, StorageError};
use crate::events::HOST_SOURCE;
use crate::models::{Settings, Sticker, StickerId, WindowBounds};
use crate::state::AppState;
use crate::storage::Storage;

#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Manager, Runtime, WebviewWindow};
#[cfg(all(feature = "app", not(test)))]
use crate::bus_tauri::SharedBus;
#[cfg(all(feature = "app", not(test)))]
use crate::sync::{broadcast_reload, serve_init};
#[cfg(all(feature = "app", not(test)))]
use tauri_plugin_opener::OpenerExt;

const ALLOWED_URL_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> From<Result<T, BackendError>> for CommandResult<T> {
    fn from(value: Result<T, BackendError>) -> Self {
        match value {
            Ok(data) => ok(data),
            Err(error) => err(&error.to_string()),
        }
    }
}

/// Host services the commands need beyond the sticker table: where files live and what
/// happens to windows.
pub trait CommandCtx: Send + Sync {
    fn app_data_dir(&self) -> Result<PathBuf, StorageError>;
    /// Opens the window labelled `sticker.id`, at `sticker.bounds` when present and with
    /// the `default` size otherwise. Returns the bounds the window actually got.
    fn open_sticker_window(
        &self,
        sticker: &Sticker,
        default: &WindowBounds,
    ) -> Result<WindowBounds, String>;
    /// Arms the init handshake for `sticker.id`. Called before the window is opened so an
    /// early init request from the new window is answered.
    fn offer_init(&self, sticker: &Sticker);
    /// Tells every window other than `source` that the sticker set changed.
    fn announce_reload(&self, source: &str);
    fn close_window(&self, label: &str) -> Result<(), String>;
    fn set_always_on_top(&self, label: &str, on_top: bool) -> Result<(), String>;
    fn open_url(&self, url: &str) -> Result<(), String>;
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn persist(ctx: &impl CommandCtx, state: &AppState, with_backup: bool) -> Result<(), StorageError> {
    let storage = Storage::new(ctx.app_data_dir()?);
    storage.ensure_dirs()?;
    storage.save_stickers(&state.stickers_file(), with_backup)?;
    storage.save_settings(&state.settings_file())?;
    Ok(())
}

fn default_bounds(settings: &Settings) -> WindowBounds {
    WindowBounds::sized(settings.window_width, settings.window_height)
}

fn random_color() -> String {
    let (r, g, b): (u8, u8, u8) = rand::random();
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn require_sticker(state: &AppState, id: &str) -> Result<Sticker, BackendError> {
    state
        .get(id)
        .ok_or_else(|| BackendError::NotFound(id.to_string()))
}

/// Loads stickers and settings from disk. A corrupt sticker file is backed up and replaced
/// by an empty table; missing or unreadable settings fall back to defaults. Settings are
/// written back so the file always lists every option.
pub fn bootstrap_state(ctx: &impl CommandCtx) -> Result<AppState, BackendError> {
    let storage = Storage::new(ctx.app_data_dir()?);
    storage.ensure_dirs()?;

    let stickers = match storage.load_stickers() {
        Ok(file) => file.map(|data| data.stickers).unwrap_or_default(),
        Err(error) => {
            log::warn!("sticker file unreadable, starting empty err={error}");
            if let Err(backup_error) = storage.create_backup(&storage.stickers_path()) {
                log::warn!("failed to back up unreadable sticker file err={backup_error}");
            }
            Vec::new()
        }
    };
    let settings = match storage.load_settings() {
        Ok(file) => file.map(|data| data.settings).unwrap_or_default(),
        Err(error) => {
            log::warn!("settings file unreadable, using defaults err={error}");
            Settings::default()
        }
    };

    let state = AppState::new(stickers, settings);
    storage.save_settings(&state.settings_file())?;
    log::info!(
        "state loaded live={} archived={}",
        state.live().len(),
        state.archived().len()
    );
    Ok(state)
}

fn new_sticker_impl(ctx: &impl CommandCtx, state: &AppState) -> Result<Sticker, BackendError> {
    let settings = state.settings();
    let color = if settings.random_color {
        random_color()
    } else {
        String::new()
    };
    let sticker = Sticker::new(uuid::Uuid::new_v4().to_string(), color, now());
    let id = sticker.id.clone();
    // The window may ask for its sticker as soon as it exists.
    state.insert(sticker.clone());
    ctx.offer_init(&sticker);
    match ctx.open_sticker_window(&sticker, &default_bounds(&settings)) {
        Ok(bounds) => {
            state.update_bounds(&id, bounds, now());
        }
        Err(error) => {
            state.remove(&id);
            return Err(BackendError::Command(error));
        }
    }
    persist(ctx, state, false)?;
    log::info!("sticker created id={id}");
    require_sticker(state, &id)
}

fn load_sticker_impl(state: &AppState, window: &str) -> Result<Sticker, BackendError> {
    require_sticker(state, window)
}

fn save_sticker_markdown_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    window: &str,
    markdown: &str,
) -> Result<(), BackendError> {
    if !state.update_markdown(window, markdown, now()) {
        return Err(BackendError::NotFound(window.to_string()));
    }
    persist(ctx, state, false)?;
    Ok(())
}

fn save_sticker_color_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    window: &str,
    color: &str,
) -> Result<(), BackendError> {
    if !state.update_color(window, color, now()) {
        return Err(BackendError::NotFound(window.to_string()));
    }
    persist(ctx, state, false)?;
    Ok(())
}

fn toggle_sticker_pinned_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    window: &str,
) -> Result<bool, BackendError> {
    let pinned = state
        .toggle_pinned(window, now())
        .ok_or_else(|| BackendError::NotFound(window.to_string()))?;
    persist(ctx, state, false)?;
    if let Err(error) = ctx.set_always_on_top(window, pinned) {
        log::warn!("set_always_on_top failed window={window} err={error}");
    }
    Ok(pinned)
}

fn remove_sticker_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    window: &str,
) -> Result<(), BackendError> {
    if !state.archive(window, now()) {
        return Err(BackendError::NotFound(window.to_string()));
    }
    persist(ctx, state, false)?;
    if let Err(error) = ctx.close_window(window) {
        log::warn!("close window failed window={window} err={error}");
    }
    ctx.announce_reload(window);
    log::info!("sticker moved to trash id={window}");
    Ok(())
}

fn load_trashbox_stickers_impl(state: &AppState) -> Vec<Sticker> {
    state.archived()
}

fn delete_stickers_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    ids: &[StickerId],
) -> Result<usize, BackendError> {
    let deleted = state.delete_archived(ids);
    if deleted == 0 {
        return Ok(0);
    }
    persist(ctx, state, state.settings().backup_on_delete)?;
    ctx.announce_reload(HOST_SOURCE);
    log::info!("stickers deleted count={deleted}");
    Ok(deleted)
}

fn recover_stickers_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    ids: &[StickerId],
) -> Result<Vec<StickerId>, BackendError> {
    let recovered = state.recover(ids, now());
    if recovered.is_empty() {
        return Ok(Vec::new());
    }
    persist(ctx, state, false)?;
    let default = default_bounds(&state.settings());
    for sticker in &recovered {
        ctx.offer_init(sticker);
        if let Err(error) = ctx.open_sticker_window(sticker, &default) {
            log::warn!("failed to open recovered sticker id={} err={error}", sticker.id);
        }
    }
    ctx.announce_reload(HOST_SOURCE);
    log::info!("stickers recovered count={}", recovered.len());
    Ok(recovered.into_iter().map(|sticker| sticker.id).collect())
}

/// Window labels that are not stickers (the trash box) are ignored.
fn update_sticker_position_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    window: &str,
    x: f64,
    y: f64,
) -> Result<bool, BackendError> {
    let default = default_bounds(&state.settings());
    if !state.update_position(window, x, y, &default, now()) {
        return Ok(false);
    }
    persist(ctx, state, false)?;
    Ok(true)
}

/// Window labels that are not stickers (the trash box) are ignored.
fn update_sticker_size_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    window: &str,
    width: f64,
    height: f64,
) -> Result<bool, BackendError> {
    let default = default_bounds(&state.settings());
    if !state.update_size(window, width, height, &default, now()) {
        return Ok(false);
    }
    persist(ctx, state, false)?;
    Ok(true)
}

fn validate_external_url(raw: &str) -> Result<url::Url, BackendError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|error| BackendError::Command(format!("invalid url: {error}")))?;
    if !ALLOWED_URL_SCHEMES.contains(&parsed.scheme()) {
        return Err(BackendError::Command(format!(
            "unsupported url scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

fn open_url_impl(ctx: &impl CommandCtx, url: &str) -> Result<(), BackendError> {
    let parsed = validate_external_url(url)?;
    ctx.open_url(parsed.as_str()).map_err(BackendError::Command)
}

/// Reopens a window for every live sticker, creating a fresh sticker when there is none.
/// Returns the stickers whose windows are open.
pub fn restore_stickers_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
) -> Result<Vec<Sticker>, BackendError> {
    let live = state.live();
    if live.is_empty() {
        return Ok(vec![new_sticker_impl(ctx, state)?]);
    }
    let default = default_bounds(&state.settings());
    let mut opened = Vec::with_capacity(live.len());
    for sticker in live {
        ctx.offer_init(&sticker);
        match ctx.open_sticker_window(&sticker, &default) {
            Ok(_) => opened.push(sticker),
            Err(error) => log::warn!("failed to restore sticker id={} err={error}", sticker.id),
        }
    }
    log::info!("stickers restored count={}", opened.len());
    Ok(opened)
}

/// [`StickerBackend`] served from this process: the sticker table plus a host context.
pub struct LocalBackend<C> {
    ctx: C,
    state: AppState,
}

impl<C: CommandCtx> LocalBackend<C> {
    pub fn new(ctx: C, state: AppState) -> Self {
        Self { ctx, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Records where a sticker window moved. Returns `false` for windows that are not
    /// stickers.
    pub fn window_moved(&self, label: &str, x: f64, y: f64) -> Result<bool, BackendError> {
        update_sticker_position_impl(&self.ctx, &self.state, label, x, y)
    }

    /// Records a sticker window's new size. Returns `false` for windows that are not
    /// stickers.
    pub fn window_resized(&self, label: &str, width: f64, height: f64) -> Result<bool, BackendError> {
        update_sticker_size_impl(&self.ctx, &self.state, label, width, height)
    }
}

#[async_trait]
impl<C: CommandCtx> StickerBackend for LocalBackend<C> {
    async fn new_sticker(&self) -> Result<(), BackendError> {
        new_sticker_impl(&self.ctx, &self.state).map(|_| ())
    }

    async fn load_sticker(&self, window: &str) -> Result<Sticker, BackendError> {
        load_sticker_impl(&self.state, window)
    }

    async fn save_sticker_markdown(
        &self,
        window: &str,
        markdown: &str,
    ) -> Result<(), BackendError> {
        save_sticker_markdown_impl(&self.ctx, &self.state, window, markdown)
    }

    async fn save_sticker_color(&self, window: &str, color: &str) -> Result<(), BackendError> {
        save_sticker_color_impl(&self.ctx, &self.state, window, color)
    }

    async fn toggle_sticker_pinned(&self, window: &str) -> Result<(), BackendError> {
        toggle_sticker_pinned_impl(&self.ctx, &self.state, window).map(|_| ())
    }

    async fn remove_sticker(&self, window: &str) -> Result<(), BackendError> {
        remove_sticker_impl(&self.ctx, &self.state, window)
    }

    async fn load_trashbox_stickers(&self) -> Result<Vec<Sticker>, BackendError> {
        Ok(load_trashbox_stickers_impl(&self.state))
    }

    async fn delete_stickers(&self, ids: &[StickerId]) -> Result<(), BackendError> {
        delete_stickers_impl(&self.ctx, &self.state, ids).map(|_| ())
    }

    async fn recover_stickers(&self, ids: &[StickerId]) -> Result<(), BackendError> {
        recover_stickers_impl(&self.ctx, &self.state, ids).map(|_| ())
    }

    async fn open_url(&self, url: &str) -> Result<(), BackendError> {
        open_url_impl(&self.ctx, url)
    }
}

#[cfg(all(feature = "app", not(test)))]
struct TauriCommandCtx<'a, R: Runtime> {
    app: &'a AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> CommandCtx for TauriCommandCtx<'_, R> {
    fn app_data_dir(&self) -> Result<PathBuf, StorageError> {
        self.app
            .path()
            .app_data_dir()
            .map_err(|err| StorageError::Io(std::io::Error::other(err.to_string())))
    }

    fn open_sticker_window(
        &self,
        sticker: &Sticker,
        default: &WindowBounds,
    ) -> Result<WindowBounds, String> {
        let window = crate::windows::build_sticker_window(self.app, sticker, default)
            .map_err(|e| e.to_string())?;
        crate::windows::window_bounds(&window).map_err(|e| e.to_string())
    }

    fn offer_init(&self, sticker: &Sticker) {
        match self.app.try_state::<SharedBus>() {
            Some(bus) => serve_init(&bus.0, &sticker.id, sticker).detach(),
            None => log::warn!("bus not ready, init handshake skipped window={}", sticker.id),
        }
    }

    fn announce_reload(&self, source: &str) {
        let Some(bus) = self.app.try_state::<SharedBus>() else {
            log::warn!("bus not ready, reload skipped source={source}");
            return;
        };
        if let Err(err) = broadcast_reload(bus.0.as_ref(), source) {
            log::warn!("reload broadcast failed source={source} err={err}");
        }
    }

    fn close_window(&self, label: &str) -> Result<(), String> {
        crate::windows::close_window(self.app, label).map_err(|e| e.to_string())
    }

    fn set_always_on_top(&self, label: &str, on_top: bool) -> Result<(), String> {
        crate::windows::set_always_on_top(self.app, label, on_top).map_err(|e| e.to_string())
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        self.app
            .opener()
            .open_url(url, None::<&str>)
            .map_err(|e| e.to_string())
    }
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn new_sticker(app: AppHandle) -> CommandResult<Sticker> {
    let ctx = TauriCommandCtx { app: &app };
    new_sticker_impl(&ctx, app.state::<AppState>().inner()).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn load_sticker(app: AppHandle, window: WebviewWindow) -> CommandResult<Sticker> {
    load_sticker_impl(app.state::<AppState>().inner(), window.label()).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn save_sticker_markdown(
    app: AppHandle,
    window: WebviewWindow,
    markdown: String,
) -> CommandResult<()> {
    let ctx = TauriCommandCtx { app: &app };
    save_sticker_markdown_impl(&ctx, app.state::<AppState>().inner(), window.label(), &markdown)
        .into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn save_sticker_color(
    app: AppHandle,
    window: WebviewWindow,
    color: String,
) -> CommandResult<()> {
    let ctx = TauriCommandCtx { app: &app };
    save_sticker_color_impl(&ctx, app.state::<AppState>().inner(), window.label(), &color).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn toggle_sticker_pinned(app: AppHandle, window: WebviewWindow) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_sticker_pinned_impl(&ctx, app.state::<AppState>().inner(), window.label()).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn remove_sticker(app: AppHandle, window: WebviewWindow) -> CommandResult<()> {
    let ctx = TauriCommandCtx { app: &app };
    remove_sticker_impl(&ctx, app.state::<AppState>().inner(), window.label()).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn load_trashbox_stickers(app: AppHandle) -> CommandResult<Vec<Sticker>> {
    ok(load_trashbox_stickers_impl(app.state::<AppState>().inner()))
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn delete_stickers(app: AppHandle, ids: Vec<StickerId>) -> CommandResult<usize> {
    let ctx = TauriCommandCtx { app: &app };
    delete_stickers_impl(&ctx, app.state::<AppState>().inner(), &ids).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn recover_stickers(app: AppHandle, ids: Vec<StickerId>) -> CommandResult<Vec<StickerId>> {
    let ctx = TauriCommandCtx { app: &app };
    recover_stickers_impl(&ctx, app.state::<AppState>().inner(), &ids).into()
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn open_url(app: AppHandle, url: String) -> CommandResult<()> {
    let ctx = TauriCommandCtx { app: &app };
    open_url_impl(&ctx, &url).into()
}

#[cfg(all(feature = "app", not(test)))]
pub(crate) fn update_sticker_position<R: Runtime>(app: &AppHandle<R>, label: &str, x: f64, y: f64) {
    let ctx = TauriCommandCtx { app };
    if let Err(error) = update_sticker_position_impl(&ctx, app.state::<AppState>().inner(), label, x, y)
    {
        log::warn!("failed to persist position window={label} err={error}");
    }
}

#[cfg(all(feature = "app", not(test)))]
pub(crate) fn update_sticker_size<R: Runtime>(
    app: &AppHandle<R>,
    label: &str,
    width: f64,
    height: f64,
) {
    let ctx = TauriCommandCtx { app };
    if let Err(error) =
        update_sticker_size_impl(&ctx, app.state::<AppState>().inner(), label, width, height)
    {
        log::warn!("failed to persist size window={label} err={error}");
    }
}

#[cfg(all(feature = "app", not(test)))]
pub(crate) fn create_sticker_from_host<R: Runtime>(app: &AppHandle<R>) -> Result<Sticker, BackendError> {
    let ctx = TauriCommandCtx { app };
    new_sticker_impl(&ctx, app.state::<AppState>().inner())
}

#[cfg(all(feature = "app", not(test)))]
pub(crate) fn bootstrap_app_state<R: Runtime>(app: &AppHandle<R>) -> Result<AppState, BackendError> {
    bootstrap_state(&TauriCommandCtx { app })
}

#[cfg(all(feature = "app", not(test)))]
pub(crate) fn restore_app_stickers<R: Runtime>(app: &AppHandle<R>) -> Result<Vec<Sticker>, BackendError> {
    let ctx = TauriCommandCtx { app };
    restore_stickers_impl(&ctx, app.state::<AppState>().inner())
}
