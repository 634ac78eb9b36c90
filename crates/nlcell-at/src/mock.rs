//! An in-memory [`Port`] for exercising the engine without hardware.
//!
//! A [`ScriptedPort`] holds a queue of inbound bytes and an ordered list of
//! reply rules. When the bytes written since the last fired rule contain the
//! next rule's trigger, that rule's reply is appended to the inbound queue.
//! Clones share state, so a test keeps one handle while the engine owns the
//! other.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::AtResult;
use crate::transport::Port;

/// Longest a read on an empty queue sleeps before reporting no data.
const IDLE_SLEEP: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct Rule {
    trigger: Vec<u8>,
    reply: Vec<u8>,
}

#[derive(Debug)]
struct ScriptState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    /// Written bytes not yet consumed by a rule.
    pending: Vec<u8>,
    rules: VecDeque<Rule>,
    timeout: Duration,
    baud_rate: u32,
    flow_control: bool,
    clears: usize,
}

impl Default for ScriptState {
    fn default() -> Self {
        ScriptState {
            incoming: VecDeque::new(),
            written: Vec::new(),
            pending: Vec::new(),
            rules: VecDeque::new(),
            timeout: Duration::from_secs(5),
            baud_rate: 115_200,
            flow_control: false,
            clears: 0,
        }
    }
}

impl ScriptState {
    fn fire_rules(&mut self) {
        while let Some(rule) = self.rules.front() {
            let Some(pos) = find(&self.pending, &rule.trigger) else {
                break;
            };
            let end = pos + rule.trigger.len();
            self.pending.drain(..end);
            if let Some(rule) = self.rules.pop_front() {
                self.incoming.extend(rule.reply);
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A scripted duplex channel.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPort {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPort {
    /// Create an empty port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the engine to read.
    pub fn push_incoming(&self, data: impl AsRef<[u8]>) {
        self.state.lock().incoming.extend(data.as_ref());
    }

    /// Queue `reply` once the engine writes `trigger`.
    ///
    /// Rules fire in the order they were added.
    pub fn on_write(&self, trigger: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) {
        let mut state = self.state.lock();
        state.rules.push_back(Rule {
            trigger: trigger.as_ref().to_vec(),
            reply: reply.as_ref().to_vec(),
        });
        state.fire_rules();
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Everything written so far, lossily decoded.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    /// Forget the write log.
    pub fn clear_written(&self) {
        let mut state = self.state.lock();
        state.written.clear();
        state.pending.clear();
    }

    /// Inbound bytes not yet read.
    pub fn pending_incoming(&self) -> usize {
        self.state.lock().incoming.len()
    }

    /// Reply rules that have not fired.
    pub fn pending_rules(&self) -> usize {
        self.state.lock().rules.len()
    }

    /// How many times the buffers were reset.
    pub fn clears(&self) -> usize {
        self.state.lock().clears
    }

    /// Whether flow control was last enabled.
    pub fn flow_control(&self) -> bool {
        self.state.lock().flow_control
    }

    fn idle(&self) {
        let timeout = self.state.lock().timeout;
        thread::sleep(timeout.min(IDLE_SLEEP));
    }
}

impl Port for ScriptedPort {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> AtResult<()> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> AtResult<usize> {
        let mut state = self.state.lock();
        state.written.extend_from_slice(data);
        state.pending.extend_from_slice(data);
        state.fire_rules();
        Ok(data.len())
    }

    fn read(&mut self, max: usize) -> AtResult<Vec<u8>> {
        {
            let mut state = self.state.lock();
            if !state.incoming.is_empty() {
                let n = max.min(state.incoming.len());
                return Ok(state.incoming.drain(..n).collect());
            }
        }
        self.idle();
        Ok(Vec::new())
    }

    fn read_line(&mut self) -> AtResult<Vec<u8>> {
        {
            let mut state = self.state.lock();
            if let Some(pos) = state.incoming.iter().position(|&b| b == b'\n') {
                return Ok(state.incoming.drain(..=pos).collect());
            }
        }
        self.idle();
        Ok(self.state.lock().incoming.drain(..).collect())
    }

    fn drain(&mut self) -> AtResult<Vec<u8>> {
        Ok(self.state.lock().incoming.drain(..).collect())
    }

    fn clear(&mut self) -> AtResult<()> {
        let mut state = self.state.lock();
        state.incoming.clear();
        state.clears += 1;
        Ok(())
    }

    fn baud_rate(&self) -> AtResult<u32> {
        Ok(self.state.lock().baud_rate)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> AtResult<()> {
        self.state.lock().baud_rate = baud_rate;
        Ok(())
    }

    fn set_flow_control(&mut self, enabled: bool) -> AtResult<()> {
        self.state.lock().flow_control = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_fire_in_order() {
        let mut port = ScriptedPort::new();
        port.on_write("AT+A\r", "\r\nOK\r\n");
        port.on_write("AT+B\r", "\r\nERROR\r\n");

        port.write(b"AT+B\r").unwrap();
        assert_eq!(port.pending_incoming(), 0);

        port.write(b"AT+A\r").unwrap();
        assert_eq!(port.read(64).unwrap(), b"\r\nOK\r\n");
        assert_eq!(port.pending_rules(), 1);
    }

    #[test]
    fn test_trigger_split_across_writes() {
        let mut port = ScriptedPort::new();
        port.on_write("AT+CGMR\r", "ok\n");

        port.write(b"AT").unwrap();
        port.write(b"+CGMR\r").unwrap();
        assert_eq!(port.read_line().unwrap(), b"ok\n");
    }

    #[test]
    fn test_read_line_returns_partial_on_timeout() {
        let mut port = ScriptedPort::new();
        port.set_timeout(Duration::ZERO).unwrap();
        port.push_incoming("abc");
        assert_eq!(port.read_line().unwrap(), b"abc");
        assert!(port.read_line().unwrap().is_empty());
    }
}
