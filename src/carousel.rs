use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Position {
    index: usize,
    // Bumped on every timer restart; a tick from an older timer is ignored.
    generation: u64,
}

/// Showcase rotation: an index that auto-advances on a timer. The timer is
/// owned by the carousel and restarted on every manual change.
pub struct Carousel {
    len: usize,
    period: Duration,
    position: Arc<Mutex<Position>>,
    timer: Option<JoinHandle<()>>,
}

impl Carousel {
    /// Starts rotating immediately. Must be called from within a Tokio
    /// runtime.
    pub fn start(len: usize, period: Duration) -> Self {
        let mut carousel = Self {
            len,
            period,
            position: Arc::new(Mutex::new(Position::default())),
            timer: None,
        };
        carousel.restart_timer();
        carousel
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn current(&self) -> usize {
        lock(&self.position).index
    }

    /// Jumps to `index` and resets the countdown. Out of range is ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        lock(&self.position).index = index;
        self.restart_timer();
        true
    }

    pub fn next(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.select((self.current() + 1) % self.len)
    }

    pub fn previous(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.select((self.current() + self.len - 1) % self.len)
    }

    pub fn stop(&mut self) {
        lock(&self.position).generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn restart_timer(&mut self) {
        self.stop();
        if self.len < 2 {
            return;
        }
        let position = self.position.clone();
        let generation = lock(&position).generation;
        let len = self.len;
        let period = self.period;
        let first = Instant::now() + period;
        self.timer = Some(tokio::spawn(async move {
            let mut ticks = interval_at(first, period);
            loop {
                ticks.tick().await;
                if !advance(&position, generation, len) {
                    break;
                }
            }
        }));
    }
}

impl Drop for Carousel {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(position: &Mutex<Position>) -> MutexGuard<'_, Position> {
    position.lock().unwrap_or_else(PoisonError::into_inner)
}

fn advance(position: &Mutex<Position>, generation: u64, len: usize) -> bool {
    let mut position = lock(position);
    if position.generation != generation {
        return false;
    }
    position.index = (position.index + 1) % len;
    true
}
