use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use renderer::{load_image, RenderError, Renderer};

use crate::command::{command_queue, Command, CommandReceiver, CommandSender, EnqueueError};
use crate::list::WallpaperList;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("wallpaper list may not be empty")]
    EmptyPlaylist,
    #[error("no wallpaper in the playlist could be decoded")]
    NothingDecodable,
    #[error(transparent)]
    Renderer(#[from] RenderError),
}

/// Scheduling knobs, read once at start-up.
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    /// Idle time between scheduled transitions.
    pub delay: Duration,
    /// Cross-fade duration.
    pub fade: Duration,
    /// Shuffle the list after every (re)load.
    pub shuffle: bool,
    /// Command queue capacity; at least 1.
    pub queue_capacity: usize,
    /// Pause between reconnect attempts after display loss.
    pub reconnect_backoff: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(300),
            fade: Duration::from_secs(1),
            shuffle: true,
            queue_capacity: 1,
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

/// The control adapter's view of the manager: enqueue commands, read the
/// current wallpaper. It never touches the renderer or the list order.
#[derive(Clone)]
pub struct ManagerHandle {
    list: Arc<WallpaperList>,
    sender: CommandSender,
}

impl ManagerHandle {
    pub fn enqueue(&self, command: Command) -> Result<(), EnqueueError> {
        self.sender.send(command)
    }

    pub fn current_wallpaper(&self) -> Option<PathBuf> {
        self.list.current()
    }
}

enum State {
    Idle,
    Transitioning,
    Reconnecting,
    Stopping,
}

enum TransitionOutcome {
    Completed,
    DisplayLost,
    NothingDecodable,
}

/// Owns the wallpaper list and the renderer and runs the daemon loop on the
/// render-owning thread.
pub struct Manager {
    list: Arc<WallpaperList>,
    commands: CommandReceiver,
    renderer: Box<dyn Renderer>,
    options: ManagerOptions,
    rng: StdRng,
}

impl Manager {
    pub fn new(
        wallpapers: Vec<PathBuf>,
        renderer: Box<dyn Renderer>,
        options: ManagerOptions,
    ) -> Result<(Self, ManagerHandle), ManagerError> {
        let list =
            Arc::new(WallpaperList::new(wallpapers).map_err(|_| ManagerError::EmptyPlaylist)?);
        let (sender, receiver) = command_queue(options.queue_capacity);
        let handle = ManagerHandle {
            list: Arc::clone(&list),
            sender,
        };
        Ok((
            Self {
                list,
                commands: receiver,
                renderer,
                options,
                rng: StdRng::from_entropy(),
            },
            handle,
        ))
    }

    /// Blocks until a `Stop` command arrives or start-up fails. The
    /// renderer is cleaned up on every exit path.
    pub fn run(mut self) -> Result<(), ManagerError> {
        tracing::info!(
            wallpapers = self.list.len(),
            delay = ?self.options.delay,
            fade = ?self.options.fade,
            "starting wallpaper manager"
        );

        // Starting: put the first image up before entering the loop.
        if self.options.shuffle {
            self.list.shuffle(&mut self.rng);
        }
        if let Err(err) = self.show_initial() {
            tracing::error!(error = %err, "failed to display the initial wallpaper");
            self.renderer.cleanup();
            return Err(err);
        }

        let mut last_change = Instant::now();
        let mut state = State::Idle;

        loop {
            match state {
                State::Idle => {
                    // A pending command preempts the scheduled timer.
                    if let Some(command) = self.commands.try_next() {
                        match command {
                            Command::Stop => {
                                state = State::Stopping;
                            }
                            Command::Next => {
                                tracing::info!("received next command");
                                last_change = Instant::now();
                                state = State::Transitioning;
                            }
                            Command::Load(paths) => match self.list.replace(paths) {
                                Ok(count) => {
                                    tracing::info!(count, "loaded new wallpaper list");
                                    if self.options.shuffle {
                                        self.list.shuffle(&mut self.rng);
                                    }
                                    last_change = Instant::now();
                                    state = State::Transitioning;
                                }
                                Err(err) => {
                                    tracing::error!(error = %err, "ignoring load command");
                                }
                            },
                        }
                        continue;
                    }

                    if last_change.elapsed() >= self.options.delay {
                        tracing::info!(
                            delay = ?self.options.delay,
                            "changing wallpaper after idle delay"
                        );
                        state = State::Transitioning;
                        continue;
                    }

                    if let Err(err) = self.renderer.render() {
                        tracing::warn!(error = %err, "render failed");
                        state = State::Reconnecting;
                        continue;
                    }
                    if !self.renderer.is_display_running() {
                        state = State::Reconnecting;
                    }
                }
                State::Transitioning => match self.transition_to_next() {
                    TransitionOutcome::Completed => {
                        last_change = Instant::now();
                        state = State::Idle;
                    }
                    TransitionOutcome::DisplayLost => {
                        state = State::Reconnecting;
                    }
                    TransitionOutcome::NothingDecodable => {
                        // Stay up with the old image and retry after the
                        // next delay.
                        last_change = Instant::now();
                        state = State::Idle;
                    }
                },
                State::Reconnecting => {
                    if self.reconnect() {
                        last_change = Instant::now();
                        state = State::Idle;
                    } else {
                        state = State::Stopping;
                    }
                }
                State::Stopping => {
                    tracing::info!("stopping wallpaper manager");
                    self.renderer.cleanup();
                    return Ok(());
                }
            }
        }
    }

    /// Decodes list entries until one succeeds and shows it statically.
    fn show_initial(&mut self) -> Result<(), ManagerError> {
        for _ in 0..self.list.len() {
            let path = self.list.advance();
            match load_image(&path) {
                Ok(image) => {
                    tracing::info!(path = %path.display(), "setting initial wallpaper");
                    self.renderer.set_image(&image)?;
                    self.renderer.render()?;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping undecodable wallpaper");
                }
            }
        }
        Err(ManagerError::NothingDecodable)
    }

    /// Advances the list and cross-fades to the first decodable entry.
    fn transition_to_next(&mut self) -> TransitionOutcome {
        for _ in 0..self.list.len() {
            let path = self.list.advance();
            let image = match load_image(&path) {
                Ok(image) => image,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping undecodable wallpaper");
                    continue;
                }
            };

            tracing::info!(path = %path.display(), "transitioning to next wallpaper");
            return match self.renderer.transition(&image, self.options.fade) {
                Ok(()) => TransitionOutcome::Completed,
                Err(err) => {
                    tracing::warn!(error = %err, "transition failed");
                    TransitionOutcome::DisplayLost
                }
            };
        }
        tracing::error!("no wallpaper in the playlist could be decoded; keeping the current image");
        TransitionOutcome::NothingDecodable
    }

    /// Retries `try_reconnect` with back-off until the display returns or a
    /// `Stop` shows up at the head of the queue. Returns false on `Stop`.
    fn reconnect(&mut self) -> bool {
        tracing::info!("display connection lost, attempting to reconnect");
        loop {
            if self.commands.stop_pending() {
                let _ = self.commands.try_next();
                return false;
            }

            std::thread::sleep(self.options.reconnect_backoff);
            match self.renderer.try_reconnect() {
                Ok(()) => {
                    tracing::info!("display connection re-established");
                    self.restore_current();
                    return true;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "reconnect attempt failed");
                }
            }
        }
    }

    /// Re-uploads the wallpaper that was current before the display died.
    fn restore_current(&mut self) {
        let Some(path) = self.list.current() else {
            return;
        };
        match load_image(&path) {
            Ok(image) => {
                if let Err(err) = self.renderer.set_image(&image) {
                    tracing::error!(error = %err, "failed to restore current wallpaper");
                    return;
                }
                if let Err(err) = self.renderer.render() {
                    tracing::warn!(error = %err, "render after reconnect failed");
                }
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "failed to re-decode current wallpaper");
            }
        }
    }
}
