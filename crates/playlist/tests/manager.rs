//! Manager state-machine tests driven by a recording mock renderer.
//!
//! Everything runs on one thread, the way the real daemon drives its
//! renderer; the mock enqueues `Stop` from inside its own callbacks when a
//! scenario needs the loop to end after a later state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use playlist::{Command, Manager, ManagerHandle, ManagerOptions};
use renderer::{ImageData, RenderError, Renderer};

/// What the mock saw, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    /// `set_image` with the image width (images are sized uniquely per path).
    Set(u32),
    /// `transition` with the incoming image width.
    Transition(u32),
    Reconnect,
}

#[derive(Default)]
struct Script {
    /// Fail this many transitions with `DisplayLost` before succeeding.
    failing_transitions: usize,
    /// Fail this many reconnect attempts before succeeding.
    failing_reconnects: usize,
    /// Enqueue `Stop` once `set_image` has been called this many times.
    stop_after_sets: Option<usize>,
}

struct MockRenderer {
    calls: Arc<Mutex<Vec<Call>>>,
    script: Script,
    display_up: bool,
    set_count: usize,
    handle: Arc<Mutex<Option<ManagerHandle>>>,
}

impl MockRenderer {
    fn new(script: Script) -> (Self, Arc<Mutex<Vec<Call>>>, Arc<Mutex<Option<ManagerHandle>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::new(Mutex::new(None));
        (
            Self {
                calls: Arc::clone(&calls),
                script,
                display_up: true,
                set_count: 0,
                handle: Arc::clone(&handle),
            },
            calls,
            handle,
        )
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Renderer for MockRenderer {
    fn set_image(&mut self, image: &ImageData) -> Result<(), RenderError> {
        self.record(Call::Set(image.width()));
        self.set_count += 1;
        if self.script.stop_after_sets == Some(self.set_count) {
            if let Some(handle) = self.handle.lock().unwrap().as_ref() {
                handle.enqueue(Command::Stop).unwrap();
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: &ImageData, _duration: Duration) -> Result<(), RenderError> {
        self.record(Call::Transition(next.width()));
        if self.script.failing_transitions > 0 {
            self.script.failing_transitions -= 1;
            self.display_up = false;
            return Err(RenderError::DisplayLost("mock display went away".into()));
        }
        Ok(())
    }

    fn render(&mut self) -> Result<(), RenderError> {
        if self.display_up {
            // Keep idle ticks from spinning flat out.
            thread::sleep(Duration::from_millis(1));
            Ok(())
        } else {
            Err(RenderError::DisplayLost("mock display is down".into()))
        }
    }

    fn size(&self) -> (u32, u32) {
        (1920, 1080)
    }

    fn is_display_running(&mut self) -> bool {
        self.display_up
    }

    fn try_reconnect(&mut self) -> Result<(), RenderError> {
        self.record(Call::Reconnect);
        if self.script.failing_reconnects > 0 {
            self.script.failing_reconnects -= 1;
            return Err(RenderError::DisplayUnavailable("mock still down".into()));
        }
        self.display_up = true;
        Ok(())
    }

    fn cleanup(&mut self) {}
}

/// Writes PNGs sized `(index + 1) x 1` so widths identify paths in the log.
fn write_playlist(dir: &Path, count: u32) -> Vec<PathBuf> {
    (0..count)
        .map(|index| {
            let path = dir.join(format!("wall-{index}.png"));
            let img = image::RgbaImage::from_pixel(index + 1, 1, image::Rgba([0, 0, 0, 255]));
            img.save(&path).unwrap();
            path
        })
        .collect()
}

fn options() -> ManagerOptions {
    ManagerOptions {
        delay: Duration::from_secs(600),
        fade: Duration::from_millis(10),
        shuffle: false,
        queue_capacity: 8,
        reconnect_backoff: Duration::from_millis(1),
    }
}

#[test]
fn next_commands_rotate_through_the_playlist() {
    let dir = tempfile::tempdir().unwrap();
    let wallpapers = write_playlist(dir.path(), 3);
    let (mock, calls, _slot) = MockRenderer::new(Script::default());

    let (manager, handle) = Manager::new(wallpapers.clone(), Box::new(mock), options()).unwrap();
    handle.enqueue(Command::Next).unwrap();
    handle.enqueue(Command::Next).unwrap();
    handle.enqueue(Command::Next).unwrap();
    handle.enqueue(Command::Stop).unwrap();
    manager.run().unwrap();

    // Initial image is wall-0 (width 1); the three nexts fade through
    // widths 2, 3 and back around to 1.
    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![
            Call::Set(1),
            Call::Transition(2),
            Call::Transition(3),
            Call::Transition(1),
        ]
    );
    assert_eq!(handle.current_wallpaper(), Some(wallpapers[0].clone()));
}

#[test]
fn empty_load_is_rejected_and_state_is_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let wallpapers = write_playlist(dir.path(), 2);
    let (mock, calls, _slot) = MockRenderer::new(Script::default());

    let (manager, handle) = Manager::new(wallpapers.clone(), Box::new(mock), options()).unwrap();
    handle.enqueue(Command::Load(Vec::new())).unwrap();
    handle.enqueue(Command::Stop).unwrap();
    manager.run().unwrap();

    // No transition happened; the current wallpaper is still the first one.
    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec![Call::Set(1)]);
    assert_eq!(handle.current_wallpaper(), Some(wallpapers[0].clone()));
}

#[test]
fn load_replaces_the_list_and_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let wallpapers = write_playlist(dir.path(), 2);
    let replacement = {
        let path = dir.path().join("replacement.png");
        let img = image::RgbaImage::from_pixel(9, 1, image::Rgba([0, 0, 0, 255]));
        img.save(&path).unwrap();
        vec![path]
    };
    let (mock, calls, _slot) = MockRenderer::new(Script::default());

    let (manager, handle) = Manager::new(wallpapers, Box::new(mock), options()).unwrap();
    handle.enqueue(Command::Load(replacement.clone())).unwrap();
    handle.enqueue(Command::Stop).unwrap();
    manager.run().unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec![Call::Set(1), Call::Transition(9)]);
    assert_eq!(handle.current_wallpaper(), Some(replacement[0].clone()));
}

#[test]
fn undecodable_wallpapers_are_skipped_without_crashing() {
    let dir = tempfile::tempdir().unwrap();
    let mut wallpapers = write_playlist(dir.path(), 2);
    let broken = dir.path().join("broken.png");
    std::fs::write(&broken, b"definitely not a png").unwrap();
    // Order: wall-0 (good), broken, wall-1 (good).
    wallpapers.insert(1, broken);

    let (mock, calls, _slot) = MockRenderer::new(Script::default());
    let (manager, handle) = Manager::new(wallpapers, Box::new(mock), options()).unwrap();
    handle.enqueue(Command::Next).unwrap();
    handle.enqueue(Command::Stop).unwrap();
    manager.run().unwrap();

    // The broken entry is skipped; the fade lands on wall-1 (width 2).
    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec![Call::Set(1), Call::Transition(2)]);
}

#[test]
fn display_loss_mid_fade_reconnects_and_restores_the_current_image() {
    let dir = tempfile::tempdir().unwrap();
    let wallpapers = write_playlist(dir.path(), 2);
    let (mock, calls, slot) = MockRenderer::new(Script {
        failing_transitions: 1,
        failing_reconnects: 2,
        // The initial wallpaper is set once; the second set_image is the
        // post-reconnect restore, after which the loop should wind down.
        stop_after_sets: Some(2),
    });

    let (manager, handle) = Manager::new(wallpapers.clone(), Box::new(mock), options()).unwrap();
    *slot.lock().unwrap() = Some(handle.clone());
    handle.enqueue(Command::Next).unwrap();
    manager.run().unwrap();

    let calls = calls.lock().unwrap();
    // Initial set, failed fade to wall-1, two failed reconnects, the
    // successful one, then the restore of the *current* wallpaper (the
    // fade target had already rotated the list head).
    assert_eq!(
        *calls,
        vec![
            Call::Set(1),
            Call::Transition(2),
            Call::Reconnect,
            Call::Reconnect,
            Call::Reconnect,
            Call::Set(2),
        ]
    );
    assert_eq!(handle.current_wallpaper(), Some(wallpapers[1].clone()));
}

#[test]
fn stop_already_queued_aborts_a_reconnect_loop() {
    let dir = tempfile::tempdir().unwrap();
    let wallpapers = write_playlist(dir.path(), 2);
    let (mock, calls, _slot) = MockRenderer::new(Script {
        failing_transitions: 1,
        failing_reconnects: usize::MAX,
        stop_after_sets: None,
    });

    // `Next` triggers the failing fade; the queued `Stop` is found at the
    // head of the queue by the reconnect loop and honoured immediately.
    let (manager, handle) = Manager::new(wallpapers, Box::new(mock), options()).unwrap();
    handle.enqueue(Command::Next).unwrap();
    handle.enqueue(Command::Stop).unwrap();
    manager.run().unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec![Call::Set(1), Call::Transition(2)]);
}
