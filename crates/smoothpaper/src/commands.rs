//! Client subcommands: short-lived invocations that talk to the running
//! daemon over the control socket and print the result.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use control::{ClientError, Request, Response};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn daemon_gone(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::Io(_) => anyhow!("no smoothpaper daemon is running ({err})"),
        other => anyhow!(other),
    }
}

pub fn status() -> Result<()> {
    let socket = control::socket_path();
    let snapshot = control::status(&socket).map_err(daemon_gone)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("failed to render status")?
    );
    Ok(())
}

pub fn next() -> Result<()> {
    let socket = control::socket_path();
    control::request(&socket, &Request::Next).map_err(daemon_gone)?;
    tracing::info!("fading to the next wallpaper");
    Ok(())
}

pub fn stop() -> Result<()> {
    let socket = control::socket_path();
    control::request(&socket, &Request::Stop).map_err(daemon_gone)?;
    tracing::info!("asked the daemon to stop");
    Ok(())
}

pub fn load(wallpapers: Vec<PathBuf>) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let mut paths = Vec::with_capacity(wallpapers.len());
    for wallpaper in wallpapers {
        let absolute = if wallpaper.is_absolute() {
            wallpaper
        } else {
            cwd.join(wallpaper)
        };
        if !absolute.exists() {
            bail!("wallpaper does not exist: {}", absolute.display());
        }
        paths.push(absolute);
    }

    let socket = control::socket_path();
    let response = control::request(&socket, &Request::Load { paths }).map_err(daemon_gone)?;
    match response {
        Response::Loaded { loaded, .. } => {
            tracing::info!(loaded, "loaded wallpapers into the daemon");
        }
        other => tracing::warn!(?other, "unexpected response to load"),
    }
    Ok(())
}
