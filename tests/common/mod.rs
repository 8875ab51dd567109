//! Recording command runner shared by the integration tests

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use mbg_policy::runner::{CommandOutput, CommandRunner, CommandSpec};
use mbg_policy::AppResult;

type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// What `kubectl config get-contexts -o name` lists on the test host
pub const KIND_CONTEXTS: &str = "kind-mbg1\nkind-mbg2\nkind-mbg3\n";

/// Answers like a healthy kind cluster and records every command it sees.
///
/// Context lookups always list [`KIND_CONTEXTS`]; everything else goes to the
/// responder.
pub struct FakeCluster {
    calls: Mutex<Vec<CommandSpec>>,
    responder: Responder,
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn pod_list(phase: &str) -> String {
    format!(
        r#"{{"apiVersion": "v1", "kind": "List", "items": [{{
            "apiVersion": "v1", "kind": "Pod",
            "metadata": {{"name": "mbgctl-6d4f9"}},
            "status": {{"phase": "{}", "podIP": "10.244.0.7"}}
        }}]}}"#,
        phase
    )
}

impl FakeCluster {
    pub fn healthy() -> Self {
        Self::with(|spec| {
            if spec.args.ends_with(&["-o".to_string(), "name".to_string()]) {
                ok("pod/mbg-5c7d8\npod/mbgctl-6d4f9\n")
            } else {
                ok("")
            }
        })
    }

    pub fn with(
        responder: impl Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands that reached mbgctl, either via kubectl exec or on the host
    pub fn mbgctl_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|spec| {
                if spec.program == "mbgctl" {
                    return Some(spec.args);
                }
                let pos = spec.args.iter().position(|a| a == "--")?;
                Some(spec.args[pos + 2..].to_vec())
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeCluster {
    async fn run(&self, spec: &CommandSpec) -> AppResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        if spec.args.iter().any(|a| a == "get-contexts") {
            return Ok(ok(KIND_CONTEXTS));
        }
        Ok((self.responder)(spec))
    }
}
