use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::github::types::PullRequests;
use crate::jira::types::Issue;

/// Results of background fetches
#[derive(Debug)]
pub enum DataEvent {
  GitHubLoaded(PullRequests),
  GitHubFailed(String),
  JiraLoaded(Vec<Issue>),
  JiraFailed(String),
}

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// A data section finished loading
  Data(DataEvent),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal polling blocks, keep it off the async workers
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if input_tx.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if input_tx.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Sender for background tasks to report through
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
