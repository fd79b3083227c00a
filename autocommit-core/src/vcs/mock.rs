//! Scripted command runner for testing
//!
//! Responses are keyed by a prefix of the joined argument list; the longest
//! matching prefix wins. Queued responses are consumed in order, then the
//! sticky default for that prefix (if any) applies, then an empty success.

#![cfg(test)]

use super::{CommandOutput, CommandRunner, VcsError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedRunner {
    queued: Mutex<HashMap<String, VecDeque<Result<CommandOutput, VcsError>>>>,
    defaults: Mutex<HashMap<String, Result<CommandOutput, VcsError>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot response for commands starting with `prefix`
    pub fn respond(&self, prefix: &str, result: Result<CommandOutput, VcsError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(prefix.to_string())
            .or_default()
            .push_back(result);
    }

    /// Response used whenever the queue for `prefix` is empty
    pub fn respond_always(&self, prefix: &str, result: Result<CommandOutput, VcsError>) {
        self.defaults
            .lock()
            .unwrap()
            .insert(prefix.to_string(), result);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.join(" ").starts_with(prefix))
            .count()
    }

    fn longest_key<'a>(keys: impl Iterator<Item = &'a String>, joined: &str) -> Option<String> {
        keys.filter(|key| joined.starts_with(key.as_str()))
            .max_by_key(|key| key.len())
            .cloned()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: &[&str], _cwd: &Path) -> Result<CommandOutput, VcsError> {
        let joined = args.join(" ");
        let call = args.iter().map(|a| a.to_string()).collect();
        self.calls.lock().unwrap().push(call);

        {
            let mut queued = self.queued.lock().unwrap();
            let non_empty = queued.iter().filter(|(_, q)| !q.is_empty()).map(|(k, _)| k);
            if let Some(key) = Self::longest_key(non_empty, &joined) {
                if let Some(result) = queued.get_mut(&key).and_then(|q| q.pop_front()) {
                    return result;
                }
            }
        }

        let defaults = self.defaults.lock().unwrap();
        match Self::longest_key(defaults.keys(), &joined) {
            Some(key) => defaults[&key].clone(),
            None => Ok(CommandOutput::success("")),
        }
    }
}
