// Scripted upstream used by the broker and HTTP tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tutor_voice::live::{LiveConnector, LiveEvent, LiveSession, SessionSetup};

/// What the broker pushed into a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Audio { bytes: usize, sample_rate: u32 },
    TurnComplete,
    Text(String),
    Closed,
}

#[derive(Clone, Default)]
pub struct Script {
    pub events: Vec<LiveEvent>,
    /// Pause before each event
    pub event_delay: Duration,
    /// Never return once the events run out
    pub hang: bool,
    pub fail_open: bool,
    /// `close` never returns
    pub hang_on_close: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Script,
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub setups: Arc<Mutex<Vec<SessionSetup>>>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    pub fn replying(events: Vec<LiveEvent>) -> Self {
        Self::new(Script {
            events,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_instruction(&self) -> Option<String> {
        self.setups
            .lock()
            .unwrap()
            .last()
            .map(|s| s.system_instruction.clone())
    }
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn open(&self, setup: &SessionSetup) -> Result<Box<dyn LiveSession>> {
        if self.script.fail_open {
            bail!("connection refused");
        }
        self.setups.lock().unwrap().push(setup.clone());
        Ok(Box::new(ScriptedSession {
            events: self.script.events.clone().into(),
            event_delay: self.script.event_delay,
            hang: self.script.hang,
            hang_on_close: self.script.hang_on_close,
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct ScriptedSession {
    events: VecDeque<LiveEvent>,
    event_delay: Duration,
    hang: bool,
    hang_on_close: bool,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl ScriptedSession {
    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl LiveSession for ScriptedSession {
    async fn send_realtime_audio(&mut self, pcm: &[u8], sample_rate: u32) -> Result<()> {
        self.record(Sent::Audio {
            bytes: pcm.len(),
            sample_rate,
        });
        Ok(())
    }

    async fn send_turn_complete(&mut self) -> Result<()> {
        self.record(Sent::TurnComplete);
        Ok(())
    }

    async fn send_text_turn(&mut self, text: &str) -> Result<()> {
        self.record(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn next_event(&mut self) -> LiveEvent {
        if !self.event_delay.is_zero() {
            tokio::time::sleep(self.event_delay).await;
        }
        match self.events.pop_front() {
            Some(event) => event,
            None if self.hang => std::future::pending().await,
            None => LiveEvent::Closed,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.record(Sent::Closed);
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
