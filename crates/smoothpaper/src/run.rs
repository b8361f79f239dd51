//! Daemon bootstrap: resolve configuration and wallpapers, refuse to run
//! twice, bring up the renderer on this thread (which stays the
//! render-owning thread for the process lifetime), and wire the control
//! socket to the playlist manager.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use paperconfig::{EasingSetting, ScaleSetting, Settings};
use playlist::{Manager, ManagerOptions};
use renderer::{EasingMode, RendererOptions, ScaleMode};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::{commands, files, paths};

pub fn initialise_tracing(debug: bool) {
    let default_filter = if debug {
        "debug,wgpu=warn,wgpu_core=warn,wgpu_hal=warn,naga=warn,smithay_client_toolkit=warn"
    } else {
        "warn,smoothpaper=info,renderer=info,playlist=info,control=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    if cli.install_config {
        initialise_tracing(cli.debug);
        let path = paths::install_default_config()?;
        tracing::info!(path = %path.display(), "installed default config file");
        return Ok(());
    }

    let (settings, config_path) = paths::load_settings(cli.config.as_deref())?;
    initialise_tracing(cli.debug || settings.debug);
    tracing::info!(config = %config_path.display(), "using config file");

    if cli.show_config {
        println!(
            "{}",
            toml::to_string_pretty(&settings).context("failed to render settings")?
        );
        return Ok(());
    }

    let socket = control::socket_path();
    if control::is_running(&socket) {
        bail!(
            "smoothpaper is already running (socket {} answered)",
            socket.display()
        );
    }

    let home = paths::home_dir();
    let wallpapers = files::collect_wallpapers(&settings.wallpapers, home.as_deref())?;
    if wallpapers.is_empty() {
        bail!("no wallpapers found in the configured locations");
    }
    tracing::info!(count = wallpapers.len(), "found wallpapers");

    // This thread owns the GL-facing renderer for the process lifetime.
    let renderer = renderer::create_renderer(renderer_options(&settings))
        .context("failed to create wallpaper renderer")?;

    let (manager, handle) = Manager::new(wallpapers, renderer, manager_options(&settings))
        .context("failed to start wallpaper manager")?;

    let mut server = control::ControlServer::spawn(
        Arc::new(handle),
        control::DaemonInfo {
            version: commands::version().to_string(),
            config: config_path,
            socket,
        },
    )
    .context("failed to start control socket")?;

    let result = manager.run();
    server.shutdown();
    result.context("wallpaper manager failed")
}

fn renderer_options(settings: &Settings) -> RendererOptions {
    RendererOptions::new(
        convert_scale(settings.scale_mode),
        convert_easing(settings.easing),
        settings.effective_framerate(),
    )
}

fn manager_options(settings: &Settings) -> ManagerOptions {
    ManagerOptions {
        delay: settings.delay,
        fade: settings.fade_speed,
        shuffle: settings.shuffle,
        ..ManagerOptions::default()
    }
}

fn convert_scale(setting: ScaleSetting) -> ScaleMode {
    match setting {
        ScaleSetting::Center => ScaleMode::Center,
        ScaleSetting::Stretched => ScaleMode::Stretch,
        ScaleSetting::Horizontal => ScaleMode::FitHorizontal,
        ScaleSetting::Vertical => ScaleMode::FitVertical,
    }
}

fn convert_easing(setting: EasingSetting) -> EasingMode {
    match setting {
        EasingSetting::Linear => EasingMode::Linear,
        EasingSetting::EaseIn => EasingMode::EaseIn,
        EasingSetting::EaseOut => EasingMode::EaseOut,
        EasingSetting::EaseInOut => EasingMode::EaseInOut,
    }
}
