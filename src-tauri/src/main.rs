// Prevents additional console window on Windows in release!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::env;
use std::sync::Arc;

use log::{error, info, warn};
use tauri::{
    AppHandle, CustomMenuItem, Manager, RunEvent, State, SystemTray, SystemTrayEvent,
    SystemTrayMenu, SystemTrayMenuItem,
};
use tauri_plugin_autostart::{MacosLauncher, ManagerExt};
use tauri_plugin_log::LogTarget;

use ctrlai::configuration::settings::Settings;
use ctrlai::configuration::state::{AppState, ControllerAccess};
use ctrlai::configuration::store::SettingsStore;
use ctrlai::controller::queue::{spawn_controller, UiRequest};
use ctrlai::controller::surface::TauriSurface;
use ctrlai::controller::{Notice, SessionSnapshot, SettingsUpdate, WindowController};
use ctrlai::engine::clipboard_engine::TauriClipboard;
use ctrlai::engine::completion_engine::CompletionClient;

#[tokio::main]
async fn main() {
    tauri::async_runtime::set(tokio::runtime::Handle::current());

    let context = tauri::generate_context!();
    let store = SettingsStore::in_dir(tauri::api::path::app_config_dir(context.config()));
    let settings = store.load();
    let start_minimized = env::args().any(|arg| arg == "--minimized");

    let app = tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::default()
                .targets([LogTarget::LogDir, LogTarget::Stdout, LogTarget::Webview])
                .level(settings.log_level())
                .build(),
        )
        .plugin(tauri_plugin_autostart::init(
            MacosLauncher::LaunchAgent,
            Some(vec!["--minimized"]),
        ))
        .plugin(tauri_plugin_positioner::init())
        .system_tray(build_system_tray())
        .on_system_tray_event(|app, event| match event {
            SystemTrayEvent::LeftClick { .. } => show_window(app),
            SystemTrayEvent::MenuItemClick { id, .. } => match id.as_str() {
                "show" => show_window(app),
                "quit" => {
                    info!("Quit requested from tray");
                    app.exit(0);
                }
                _ => {}
            },
            _ => {}
        })
        .invoke_handler(tauri::generate_handler![
            get_session_state,
            paste_from_clipboard,
            update_input,
            update_output,
            send_prompt,
            copy_response,
            clear_session,
            hide_window,
            get_latest_settings,
            update_settings,
            quit_app,
        ])
        .on_window_event(|event| match event.event() {
            tauri::WindowEvent::CloseRequested { api, .. } => {
                api.prevent_close();
                let app_handle = event.window().app_handle();
                if app_handle.submit(UiRequest::Close).is_err() {
                    let _ = event.window().hide();
                }
            }
            _ => {}
        })
        .setup(move |app| {
            let app_handle = app.handle();
            info!("Loaded settings from {}", store.path().display());

            let controller = WindowController::new(
                settings.clone(),
                store,
                Box::new(TauriClipboard::new(app_handle.clone())),
                Box::new(TauriSurface::new(app_handle.clone())),
            );
            let completer = Arc::new(CompletionClient::new()?);
            let handle = spawn_controller(controller, completer);
            app.manage(AppState::new(handle.clone()));

            sync_autostart(&app_handle, settings.auto_start, false);

            let show_now = settings.first_run && !start_minimized;
            if show_now {
                info!("First run detected, showing window immediately");
                handle.request(UiRequest::Activate)?;
                handle.request(UiRequest::CompleteFirstRun)?;
            }

            let state: State<AppState> = app.state();
            match state.bind_hotkey(&app_handle, &settings.launch_hotkey) {
                Ok(()) => info!("Press {} to show the CtrlAI window", settings.launch_hotkey),
                Err(e) => {
                    error!("Hotkey unavailable: {}", e);
                    if !show_now {
                        handle.request(UiRequest::Activate)?;
                    }
                    handle.request(UiRequest::Notify(Notice::warning(format!(
                        "{}. Open CtrlAI from the tray icon or pick another hotkey in settings.",
                        e
                    ))))?;
                }
            }
            Ok(())
        })
        .build(context)
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                state.release_hotkey();
            }
            info!("CtrlAI exiting");
        }
    });
}

fn build_system_tray() -> SystemTray {
    let show = CustomMenuItem::new("show".to_string(), "Show CtrlAI");
    let quit = CustomMenuItem::new("quit".to_string(), "Quit");
    let tray_menu = SystemTrayMenu::new()
        .add_item(show)
        .add_native_item(SystemTrayMenuItem::Separator)
        .add_item(quit);
    SystemTray::new().with_menu(tray_menu)
}

fn show_window(app_handle: &AppHandle) {
    if let Err(e) = app_handle.submit(UiRequest::Activate) {
        warn!("Cannot show window: {}", e);
    }
}

/// Brings the OS login item in line with `enabled`. At startup the entry is
/// only touched when it disagrees with the setting.
fn sync_autostart(app_handle: &AppHandle, enabled: bool, force: bool) {
    let autolaunch = app_handle.autolaunch();
    if !force {
        if let Ok(current) = autolaunch.is_enabled() {
            if current == enabled {
                return;
            }
        }
    }
    let result = if enabled {
        autolaunch.enable()
    } else {
        autolaunch.disable()
    };
    match result {
        Ok(()) => info!("Launch at login {}", if enabled { "enabled" } else { "disabled" }),
        Err(e) => warn!("Could not update launch at login: {}", e),
    }
}

fn submit(app_handle: &AppHandle, request: UiRequest) -> Result<(), String> {
    app_handle.submit(request).map_err(|e| e.to_string())
}

#[tauri::command]
async fn get_session_state(app_handle: AppHandle) -> Result<SessionSnapshot, String> {
    let controller = app_handle.controller().map_err(|e| e.to_string())?;
    controller.snapshot().await.map_err(|e| e.to_string())
}

#[tauri::command]
fn paste_from_clipboard(app_handle: AppHandle) -> Result<(), String> {
    submit(&app_handle, UiRequest::PasteFromClipboard)
}

#[tauri::command]
fn update_input(app_handle: AppHandle, text: String) -> Result<(), String> {
    submit(&app_handle, UiRequest::EditInput(text))
}

#[tauri::command]
fn update_output(app_handle: AppHandle, text: String) -> Result<(), String> {
    submit(&app_handle, UiRequest::EditOutput(text))
}

#[tauri::command]
fn send_prompt(app_handle: AppHandle) -> Result<(), String> {
    submit(&app_handle, UiRequest::Send)
}

#[tauri::command]
fn copy_response(app_handle: AppHandle) -> Result<(), String> {
    submit(&app_handle, UiRequest::CopyResponse)
}

#[tauri::command]
fn clear_session(app_handle: AppHandle) -> Result<(), String> {
    submit(&app_handle, UiRequest::Clear)
}

#[tauri::command]
fn hide_window(app_handle: AppHandle) -> Result<(), String> {
    submit(&app_handle, UiRequest::Close)
}

#[tauri::command]
async fn get_latest_settings(app_handle: AppHandle) -> Result<Settings, String> {
    let controller = app_handle.controller().map_err(|e| e.to_string())?;
    controller.settings().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn update_settings(app_handle: AppHandle, settings: Settings) -> Result<SettingsUpdate, String> {
    info!(
        "update_settings: endpoint={} model={} hotkey={}",
        settings.api_endpoint, settings.model, settings.launch_hotkey
    );
    let controller = app_handle.controller().map_err(|e| e.to_string())?;

    // Rebind before saving so a rejected hotkey never reaches the config file.
    {
        let state: State<AppState> = app_handle.state();
        if let Err(e) = state.bind_hotkey(&app_handle, &settings.launch_hotkey) {
            warn!("Keeping previous hotkey: {}", e);
            controller
                .request(UiRequest::Notify(Notice::error(e.to_string())))
                .map_err(|e| e.to_string())?;
            return Err(e.to_string());
        }
    }

    let auto_start = settings.auto_start;
    let update = controller
        .update_settings(settings)
        .await
        .map_err(|e| e.to_string())?;
    if update.auto_start_changed {
        sync_autostart(&app_handle, auto_start, true);
    }
    Ok(update)
}

#[tauri::command]
fn quit_app(app_handle: AppHandle) {
    info!("Quit requested from window");
    app_handle.exit(0);
}
