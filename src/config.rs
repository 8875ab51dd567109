use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppResult;
use crate::retry::RetryConfig;

/// Where the mbgctl client runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// `kubectl exec` into the discovered mbgctl pod
    Pod,
    /// Run the mbgctl binary on the host
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default = "default_kubectl_bin")]
    pub kubectl_bin: String,

    #[serde(default = "default_mbgctl_bin")]
    pub mbgctl_bin: String,

    #[serde(default = "default_mbgctl_pod_prefix")]
    pub mbgctl_pod_prefix: String,

    #[serde(default = "default_context_prefix")]
    pub context_prefix: String,

    #[serde(default = "default_exec_mode")]
    pub exec_mode: ExecMode,

    #[serde(default = "default_wait_max_attempts")]
    pub wait_max_attempts: u32,

    #[serde(default = "default_wait_initial_delay_ms")]
    pub wait_initial_delay_ms: u64,

    #[serde(default = "default_wait_max_delay_ms")]
    pub wait_max_delay_ms: u64,

    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

fn default_project_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_kubectl_bin() -> String {
    "kubectl".to_string()
}

fn default_mbgctl_bin() -> String {
    "mbgctl".to_string()
}

fn default_mbgctl_pod_prefix() -> String {
    "mbgctl".to_string()
}

fn default_context_prefix() -> String {
    // kind registers cluster "mbg1" as context "kind-mbg1"
    "kind-".to_string()
}

fn default_exec_mode() -> ExecMode {
    // mbgctl on the host, next to the kind clusters
    ExecMode::Local
}

fn default_wait_max_attempts() -> u32 {
    20
}

fn default_wait_initial_delay_ms() -> u64 {
    2000
}

fn default_wait_max_delay_ms() -> u64 {
    15_000
}

fn default_wait_timeout_secs() -> u64 {
    180
}

impl Config {
    /// Load from `.env` and `MBG_POLICY_*` environment variables
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MBG_POLICY").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Backoff policy for pod readiness waits
    pub fn wait_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.wait_max_attempts,
            initial_delay: Duration::from_millis(self.wait_initial_delay_ms),
            max_delay: Duration::from_millis(self.wait_max_delay_ms),
            timeout: Duration::from_secs(self.wait_timeout_secs),
            ..RetryConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            kubeconfig: None,
            kubectl_bin: default_kubectl_bin(),
            mbgctl_bin: default_mbgctl_bin(),
            mbgctl_pod_prefix: default_mbgctl_pod_prefix(),
            context_prefix: default_context_prefix(),
            exec_mode: default_exec_mode(),
            wait_max_attempts: default_wait_max_attempts(),
            wait_initial_delay_ms: default_wait_initial_delay_ms(),
            wait_max_delay_ms: default_wait_max_delay_ms(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}
