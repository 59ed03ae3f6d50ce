use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bound on queued events; ticks and file events beyond it are dropped
pub const QUEUE_CAPACITY: usize = 32;

/// Granularity at which sleeping producers notice the stop flag
const STOP_CHECK: Duration = Duration::from_millis(50);

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Terminal key press
    Key(KeyEvent),
    /// Terminal resized to (columns, rows)
    Resize(u16, u16),
    /// Periodic refresh tick
    Refresh,
    /// Working tree changed on disk
    FileChanged,
}

/// Producer threads feeding a single bounded queue
pub struct EventHandler {
    rx: Receiver<AppEvent>,
    tx: SyncSender<AppEvent>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    _watcher: Option<Debouncer<RecommendedWatcher>>,
}

impl EventHandler {
    /// Queue with no producers attached
    pub fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
        Self {
            rx,
            tx,
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            _watcher: None,
        }
    }

    /// Poll the terminal for keys and resizes
    pub fn with_input(mut self, poll_timeout: Duration) -> Self {
        let handle = spawn_input(self.tx.clone(), self.stop.clone(), poll_timeout);
        self.threads.push(handle);
        self
    }

    /// Post a refresh every `interval`, if any
    pub fn with_ticker(mut self, interval: Option<Duration>) -> Self {
        if let Some(interval) = interval {
            let handle = spawn_ticker(self.tx.clone(), self.stop.clone(), interval);
            self.threads.push(handle);
        }
        self
    }

    /// Watch the working tree under `root` for changes
    pub fn with_watcher(mut self, root: &Path) -> Self {
        self._watcher = setup_watcher(root, self.tx.clone());
        self
    }

    /// Get the next event (blocking)
    pub fn next(&self) -> Result<AppEvent> {
        Ok(self.rx.recv()?)
    }

    /// Next queued event, if one is waiting
    pub fn try_next(&self) -> Option<AppEvent> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    pub fn sender(&self) -> SyncSender<AppEvent> {
        self.tx.clone()
    }

    /// Ask every producer to exit
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.stop();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("Event producer panicked");
            }
        }
    }
}

fn spawn_input(tx: SyncSender<AppEvent>, stop: Arc<AtomicBool>, timeout: Duration) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(timeout) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    log::error!("Terminal poll failed: {}", e);
                    break;
                }
            }
            let event = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(Event::Resize(width, height)) => AppEvent::Resize(width, height),
                Ok(_) => continue,
                Err(e) => {
                    log::error!("Terminal read failed: {}", e);
                    break;
                }
            };
            if !send_until_stopped(&tx, &stop, event) {
                break;
            }
        }
        log::debug!("Input poller stopped");
    })
}

/// Input is never dropped: wait for room in the queue, giving up only when
/// stopped or disconnected.
fn send_until_stopped(tx: &SyncSender<AppEvent>, stop: &AtomicBool, mut event: AppEvent) -> bool {
    loop {
        match tx.try_send(event) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if stop.load(Ordering::Relaxed) {
                    return false;
                }
                event = back;
                thread::sleep(Duration::from_millis(5));
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

/// Post `AppEvent::Refresh` every `interval` until stopped. A full queue
/// drops the tick instead of blocking.
pub(crate) fn spawn_ticker(
    tx: SyncSender<AppEvent>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        'ticks: loop {
            let mut waited = Duration::ZERO;
            while waited < interval {
                if stop.load(Ordering::Relaxed) {
                    break 'ticks;
                }
                let step = STOP_CHECK.min(interval - waited);
                thread::sleep(step);
                waited += step;
            }
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match tx.try_send(AppEvent::Refresh) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => log::trace!("Refresh tick dropped, queue full"),
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        log::debug!("Refresh ticker stopped");
    })
}

/// Decides which filesystem changes deserve a refresh
pub struct WatchFilter {
    root: PathBuf,
    gitignore: Option<Gitignore>,
}

impl WatchFilter {
    pub fn new(root: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let gitignore_path = root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!("Bad .gitignore: {}", e);
            }
        }
        Self {
            root: root.to_path_buf(),
            gitignore: builder.build().ok(),
        }
    }

    /// Working tree files outside `.git` that are not ignored, plus the
    /// index and HEAD
    pub fn accepts(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        if let Ok(inside_git) = rel.strip_prefix(".git") {
            return inside_git == Path::new("index") || inside_git == Path::new("HEAD");
        }
        !self
            .gitignore
            .as_ref()
            .is_some_and(|gi| gi.matched_path_or_any_parents(rel, is_dir).is_ignore())
    }
}

fn setup_watcher(root: &Path, tx: SyncSender<AppEvent>) -> Option<Debouncer<RecommendedWatcher>> {
    let filter = WatchFilter::new(root);

    let debouncer = new_debouncer(Duration::from_millis(300), move |res: DebounceEventResult| {
        let events = match res {
            Ok(events) => events,
            Err(e) => {
                log::warn!("File watcher error: {:?}", e);
                return;
            }
        };
        let relevant = events.iter().any(|event| {
            matches!(event.kind, DebouncedEventKind::Any)
                && filter.accepts(&event.path, event.path.is_dir())
        });
        if relevant {
            // coalesced by the consumer, so a full queue loses nothing
            let _ = tx.try_send(AppEvent::FileChanged);
        }
    });

    match debouncer {
        Ok(mut watcher) => match watcher.watcher().watch(root, RecursiveMode::Recursive) {
            Ok(()) => Some(watcher),
            Err(e) => {
                log::warn!("Cannot watch {}: {}", root.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Cannot start file watcher: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_drops_ticks_when_full() {
        let (tx, rx) = mpsc::sync_channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_ticker(tx, stop.clone(), Duration::from_millis(1));
        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        // a blocked ticker would never notice the flag
        handle.join().unwrap();

        assert_eq!(rx.try_recv(), Ok(AppEvent::Refresh));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ticker_exits_when_consumer_is_gone() {
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_ticker(tx, stop, Duration::from_millis(1));
        handle.join().unwrap();
    }

    #[test]
    fn blocked_send_gives_up_on_stop() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(AppEvent::FileChanged).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::spawn(move || send_until_stopped(&tx, &flag, AppEvent::Refresh));
        thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Relaxed);
        assert!(!handle.join().unwrap());
        assert_eq!(rx.try_recv(), Ok(AppEvent::FileChanged));
    }

    #[test]
    fn sender_feeds_queue() {
        let events = EventHandler::new();
        events.sender().send(AppEvent::Resize(80, 24)).unwrap();
        events.sender().send(AppEvent::FileChanged).unwrap();
        assert_eq!(events.next().unwrap(), AppEvent::Resize(80, 24));
        assert_eq!(events.try_next(), Some(AppEvent::FileChanged));
        assert_eq!(events.try_next(), None);
    }

    #[test]
    fn stopping_ends_ticker() {
        let events = EventHandler::new().with_ticker(Some(Duration::from_secs(60)));
        events.stop();
        // Drop joins the ticker; it must notice the flag well before a minute
        drop(events);
    }

    #[test]
    fn watch_filter() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "target/\n*.log\n").unwrap();
        let filter = WatchFilter::new(root);

        assert!(filter.accepts(&root.join("src/main.rs"), false));
        assert!(filter.accepts(&root.join(".git/index"), false));
        assert!(filter.accepts(&root.join(".git/HEAD"), false));
        assert!(!filter.accepts(&root.join(".git/objects/ab/cdef"), false));
        assert!(!filter.accepts(&root.join("debug.log"), false));
        assert!(!filter.accepts(&root.join("target/debug/tigr"), false));
        assert!(!filter.accepts(Path::new("/elsewhere/file"), false));
    }
}
