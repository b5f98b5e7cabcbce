use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use freshen_fetch::{BearerToken, FetchOptions, ReqwestClient, Session, TransportError};
use freshen_policy::IdempotencyPolicy;
use serde::{Deserialize, Serialize};

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        let names: Vec<_> = Self::ALL.iter().map(|v| v.name()).collect();
                        format!("expected one of: {}", names.join(", "))
                    })
            }
        }
    };
}

named_enum! {
    /// Where jobs execute.
    Backend {
        /// One event loop and one shared HTTP session in this process.
        Single => "single",
        /// One child process per job.
        Workers => "workers",
    }
}

named_enum! {
    /// What a failed job does to the rest of the batch.
    ErrorMode {
        /// Stop at the first failure.
        Raise => "raise",
        /// Report the failure and carry on.
        Yield => "yield",
    }
}

named_enum! {
    /// How paths appear in the progress feed.
    PathDisplay {
        Full => "full",
        Absolute => "absolute",
        Name => "name",
        /// Relative to the deepest directory shared by every job. The whole
        /// job list is collected before the first job starts, so this mode
        /// cannot be used with an unbounded job source.
        Short => "short",
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::Single
    }
}

impl Default for ErrorMode {
    fn default() -> Self {
        Self::Yield
    }
}

impl Default for PathDisplay {
    fn default() -> Self {
        Self::Full
    }
}

/// Network settings shared by every fetch of a batch. Serializable so that
/// worker processes can rebuild the same session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub timeout_ms: Option<u64>,
    pub max_redirects: u32,
    pub headers: BTreeMap<String, String>,
    /// Sent as a bearer token once a request has been refused.
    pub bearer_token: Option<String>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        let options = FetchOptions::default();
        Self {
            max_attempts: options.max_attempts,
            retry_backoff_ms: options.retry_backoff.as_millis() as u64,
            timeout_ms: None,
            max_redirects: options.max_redirects,
            headers: BTreeMap::new(),
            bearer_token: None,
        }
    }
}

impl fmt::Debug for TransferSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSettings")
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_redirects", &self.max_redirects)
            .field("headers", &self.headers)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| ".."))
            .finish()
    }
}

impl TransferSettings {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .max_attempts(self.max_attempts)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .max_redirects(self.max_redirects)
    }

    pub fn session(&self) -> Result<Session<ReqwestClient>, TransportError> {
        let client = ReqwestClient::with_timeout(self.timeout_ms.map(Duration::from_millis))?;
        let mut session = Session::new(client);
        for (name, value) in &self.headers {
            session = session.with_header(name, value);
        }
        if let Some(token) = &self.bearer_token {
            session = session.with_authenticator(BearerToken::new(token));
        }
        Ok(session)
    }
}

/// How the worker backend starts a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// This executable's hidden `worker` subcommand.
    pub fn current() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub backend: Backend,
    /// Jobs in flight at once.
    ///
    /// Default: 4
    pub concurrency: usize,
    /// Replaces every job's own policy for this batch.
    pub policy_override: Option<IdempotencyPolicy>,
    pub on_error: ErrorMode,
    pub path_display: PathDisplay,
    /// Status records buffered between jobs and the renderer before
    /// producers wait.
    ///
    /// Default: 1024
    pub queue_bound: usize,
    pub transfer: TransferSettings,
    /// Default: [`WorkerCommand::current`]
    pub worker_command: Option<WorkerCommand>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            concurrency: 4,
            policy_override: None,
            on_error: ErrorMode::default(),
            path_display: PathDisplay::default(),
            queue_bound: 1024,
            transfer: TransferSettings::default(),
            worker_command: None,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn policy_override(mut self, policy: Option<IdempotencyPolicy>) -> Self {
        self.policy_override = policy;
        self
    }

    #[must_use]
    pub fn on_error(mut self, mode: ErrorMode) -> Self {
        self.on_error = mode;
        self
    }

    #[must_use]
    pub fn path_display(mut self, display: PathDisplay) -> Self {
        self.path_display = display;
        self
    }

    #[must_use]
    pub fn queue_bound(mut self, bound: usize) -> Self {
        self.queue_bound = bound.max(1);
        self
    }

    #[must_use]
    pub fn transfer(mut self, transfer: TransferSettings) -> Self {
        self.transfer = transfer;
        self
    }

    #[must_use]
    pub fn worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = Some(command);
        self
    }
}
