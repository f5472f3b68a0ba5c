//! Cosmetic "thinking" animation shown while a reply is on its way.
//!
//! [`ThinkingMachine`] is the pure state machine (`Idle → Typing →
//! Streaming → Idle`). [`ThinkingHandle`] drives it from wall-clock timers on
//! a tokio task and publishes snapshots through a watch channel.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const MIN_THINKING_TIME: Duration = Duration::from_millis(1500);
pub const MAX_THOUGHTS: usize = 20;
const CHAR_DELAY_MS: std::ops::RangeInclusive<u64> = 20..=70;
const THOUGHT_DELAY_MS: std::ops::RangeInclusive<u64> = 800..=2300;
const PROMPT_EXCERPT_CHARS: usize = 20;

const HEADER_PHRASES: &[&str] = &[
    "Thinking...",
    "Analyzing your question...",
    "Considering the context...",
    "Working through this...",
    "Gathering my thoughts...",
];

const GENERIC_THOUGHTS: &[&str] = &[
    "Analyzing context and user intent...",
    "Evaluating relevant knowledge and sources...",
    "Determining the most accurate response...",
    "Cross-checking for consistency...",
    "Structuring the answer clearly...",
    "Formulating a comprehensive answer...",
];

const TOPICAL_THOUGHTS: &[(&[&str], &str)] = &[
    (&["code", "program"], "Checking code syntax and best practices..."),
    (&["history", "when"], "Reviewing historical timeline and events..."),
    (&["math", "calculate"], "Performing mathematical calculations..."),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThinkingPhase {
    #[default]
    Idle,
    Typing,
    Streaming,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThinkingSnapshot {
    pub phase: ThinkingPhase,
    /// The part of the header phrase revealed so far.
    pub header: String,
    pub thoughts: Vec<String>,
}

/// Lines the simulator rotates through for `prompt`.
///
/// Topical lines triggered by keywords are spliced in at index 2 so they
/// show up early.
pub fn thought_pool(prompt: &str) -> Vec<String> {
    let mut pool: Vec<String> = GENERIC_THOUGHTS.iter().map(|s| s.to_string()).collect();

    let excerpt: String = prompt.chars().take(PROMPT_EXCERPT_CHARS).collect();
    let ellipsis = if prompt.chars().count() > PROMPT_EXCERPT_CHARS {
        "..."
    } else {
        ""
    };
    pool.insert(
        1,
        format!("Researching information about \"{excerpt}{ellipsis}\""),
    );

    let lowered = prompt.to_lowercase();
    for (keywords, line) in TOPICAL_THOUGHTS {
        if keywords.iter().any(|k| lowered.contains(k)) {
            pool.insert(2, line.to_string());
        }
    }
    pool
}

#[derive(Debug, Default)]
pub struct ThinkingMachine {
    phase: ThinkingPhase,
    header: Vec<char>,
    revealed: usize,
    thoughts: Vec<String>,
    pool: Vec<String>,
    next_thought: usize,
}

impl ThinkingMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ThinkingPhase {
        self.phase
    }

    pub fn start<R: Rng + ?Sized>(&mut self, prompt: &str, rng: &mut R) {
        let header = HEADER_PHRASES[rng.gen_range(0..HEADER_PHRASES.len())];
        self.phase = ThinkingPhase::Typing;
        self.header = header.chars().collect();
        self.revealed = 0;
        self.thoughts.clear();
        self.pool = thought_pool(prompt);
        self.next_thought = 0;
    }

    /// Reveal one more header character. Moves to `Streaming` once the whole
    /// header is visible.
    pub fn reveal_next(&mut self) -> bool {
        if self.phase != ThinkingPhase::Typing {
            return false;
        }
        if self.revealed < self.header.len() {
            self.revealed += 1;
        }
        if self.revealed >= self.header.len() {
            self.phase = ThinkingPhase::Streaming;
        }
        true
    }

    pub fn can_push_thought(&self) -> bool {
        self.phase != ThinkingPhase::Idle
            && !self.pool.is_empty()
            && self.thoughts.len() < MAX_THOUGHTS
    }

    /// Append the next line from the rotating pool.
    pub fn push_thought(&mut self) -> bool {
        if !self.can_push_thought() {
            return false;
        }
        let line = self.pool[self.next_thought % self.pool.len()].clone();
        self.next_thought += 1;
        self.thoughts.push(line);
        true
    }

    pub fn finish(&mut self) {
        self.phase = ThinkingPhase::Idle;
    }

    pub fn snapshot(&self) -> ThinkingSnapshot {
        ThinkingSnapshot {
            phase: self.phase,
            header: self.header[..self.revealed].iter().collect(),
            thoughts: self.thoughts.clone(),
        }
    }
}

/// Running simulation. Dropping the handle cancels every pending timer.
pub struct ThinkingHandle {
    updates: watch::Receiver<ThinkingSnapshot>,
    cancel: CancellationToken,
    finish_tx: Option<oneshot::Sender<()>>,
    started_at: Instant,
    min_duration: Duration,
    task: JoinHandle<()>,
}

impl ThinkingHandle {
    pub fn start(prompt: &str) -> Self {
        Self::start_with_rng(prompt, StdRng::from_entropy(), MIN_THINKING_TIME)
    }

    pub fn start_with_rng(prompt: &str, mut rng: StdRng, min_duration: Duration) -> Self {
        let mut machine = ThinkingMachine::new();
        machine.start(prompt, &mut rng);
        let (tx, updates) = watch::channel(machine.snapshot());
        let cancel = CancellationToken::new();
        let (finish_tx, finish_rx) = oneshot::channel();

        let task = tokio::spawn(run_timers(machine, rng, tx, cancel.clone(), finish_rx));

        Self {
            updates,
            cancel,
            finish_tx: Some(finish_tx),
            started_at: Instant::now(),
            min_duration,
            task,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ThinkingSnapshot> {
        self.updates.clone()
    }

    pub fn snapshot(&self) -> ThinkingSnapshot {
        self.updates.borrow().clone()
    }

    /// Stop immediately; nothing is published afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait out the minimum presentation time, then return to `Idle`.
    pub async fn finish(mut self) {
        sleep_until(self.started_at + self.min_duration).await;
        if let Some(finish_tx) = self.finish_tx.take() {
            let _ = finish_tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for ThinkingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_timers(
    mut machine: ThinkingMachine,
    mut rng: StdRng,
    tx: watch::Sender<ThinkingSnapshot>,
    cancel: CancellationToken,
    mut finish_rx: oneshot::Receiver<()>,
) {
    let mut next_char_at = Instant::now() + char_delay(&mut rng);
    let mut next_thought_at = Instant::now() + thought_delay(&mut rng);

    loop {
        let typing = machine.phase() == ThinkingPhase::Typing;
        let thinking = machine.can_push_thought();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("thinking simulation cancelled");
                return;
            }
            result = &mut finish_rx => {
                if result.is_ok() {
                    machine.finish();
                    let _ = tx.send(machine.snapshot());
                }
                return;
            }
            _ = sleep_until(next_char_at), if typing => {
                machine.reveal_next();
                let _ = tx.send(machine.snapshot());
                next_char_at = Instant::now() + char_delay(&mut rng);
            }
            _ = sleep_until(next_thought_at), if thinking => {
                machine.push_thought();
                let _ = tx.send(machine.snapshot());
                next_thought_at = Instant::now() + thought_delay(&mut rng);
            }
        }
    }
}

fn char_delay(rng: &mut StdRng) -> Duration {
    Duration::from_millis(rng.gen_range(CHAR_DELAY_MS))
}

fn thought_delay(rng: &mut StdRng) -> Duration {
    Duration::from_millis(rng.gen_range(THOUGHT_DELAY_MS))
}
