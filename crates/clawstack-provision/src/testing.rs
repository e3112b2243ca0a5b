//! Scripted stand-ins for the host and the operator.

use crate::commands::{ExecOutput, ExecRequest, Host};
use async_trait::async_trait;
use clawstack_core::AppError;
use clawstack_ui::Prompter;
use std::collections::VecDeque;
use std::sync::Mutex;

type Effect = Box<dyn Fn(&ExecRequest) -> ExecOutput + Send + Sync>;

struct Rule {
    needle: String,
    output: ExecOutput,
    effect: Option<Effect>,
}

/// Records every request. Unmatched scripts succeed with empty output;
/// the most recently added matching rule wins.
pub struct FakeHost {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<ExecRequest>>,
    pub privileged: bool,
    pub arch: String,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            privileged: true,
            arch: "x86_64".to_string(),
        }
    }

    pub fn respond(&self, needle: &str, code: i32, stdout: &str, stderr: &str) {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            output: ExecOutput {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
            effect: None,
        });
    }

    /// Answer `needle` from a closure, e.g. to drop a file the real tool would write.
    pub fn on(
        &self,
        needle: &str,
        effect: impl Fn(&ExecRequest) -> ExecOutput + Send + Sync + 'static,
    ) {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            output: ExecOutput::default(),
            effect: Some(Box::new(effect)),
        });
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.script).collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.scripts().iter().filter(|s| s.contains(needle)).count()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn exec(&self, req: &ExecRequest) -> Result<ExecOutput, AppError> {
        self.log.lock().unwrap().push(req.clone());
        let rules = self.rules.lock().unwrap();
        match rules.iter().rev().find(|r| req.script.contains(&r.needle)) {
            Some(rule) => {
                match &rule.effect {
                    Some(effect) => Ok(effect(req)),
                    None => Ok(rule.output.clone()),
                }
            }
            None => Ok(ExecOutput::default()),
        }
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn arch(&self) -> String {
        self.arch.clone()
    }
}

/// Answers prompts from queues; running dry is an error.
#[derive(Default)]
pub struct ScriptedPrompter {
    confirms: Mutex<VecDeque<bool>>,
    inputs: Mutex<VecDeque<String>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(confirms: &[bool], inputs: &[&str]) -> Self {
        Self {
            confirms: Mutex::new(confirms.iter().copied().collect()),
            inputs: Mutex::new(inputs.iter().map(|s| s.to_string()).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, AppError> {
        self.asked.lock().unwrap().push(prompt.to_string());
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Prompt(format!("no scripted answer for: {prompt}")))
    }

    fn input(&self, prompt: &str, _default: Option<&str>) -> Result<String, AppError> {
        self.asked.lock().unwrap().push(prompt.to_string());
        self.inputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Prompt(format!("no scripted answer for: {prompt}")))
    }
}
