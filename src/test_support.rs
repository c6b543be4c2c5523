//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::command::{CommandError, CommandFuture, CommandOutput, CommandRunner};
use crate::endpoint::Scheme;
use crate::marketplace::{
    InstanceId, InstanceStatus, LaunchRequest, MarketFuture, Marketplace, OfferQuery,
};
use crate::offer::Offer;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Whether the caller asked for live output.
    pub streamed: bool,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|err| panic!("scripted double lock poisoned: {err}"))
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Returns the invocations made to `program`.
    #[must_use]
    pub fn invocations_of(&self, program: &str) -> Vec<CommandInvocation> {
        self.invocations()
            .into_iter()
            .filter(|invocation| invocation.program == program)
            .collect()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl ScriptedRunner {
    fn respond<'a>(
        &'a self,
        program: &'a str,
        args: &'a [OsString],
        streamed: bool,
    ) -> CommandFuture<'a> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            streamed,
        });
        let response = lock(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            });
        Box::pin(async move { response })
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        self.respond(program, args, false)
    }

    fn run_streaming<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        self.respond(program, args, true)
    }
}

/// Errors produced by [`ScriptedMarketplace`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedMarketError {
    /// Offer search failure.
    #[error("search failure")]
    Search,
    /// Offer acceptance failure.
    #[error("create failure")]
    Create,
    /// Status query failure.
    #[error("status failure")]
    Status,
    /// Connection string lookup failure.
    #[error("connection failure")]
    Connection,
    /// Termination failure.
    #[error("terminate failure")]
    Terminate,
}

#[derive(Debug)]
struct MarketState {
    offers: Vec<Offer>,
    statuses: VecDeque<Result<InstanceStatus, ScriptedMarketError>>,
    ssh_uri: String,
    scp_uri: String,
    fail_on_search: bool,
    fail_on_create: bool,
    fail_on_connection: bool,
    fail_on_terminate: bool,
    hang_on_terminate: bool,
    created: Vec<LaunchRequest>,
    status_calls: u32,
    terminated: Vec<InstanceId>,
}

/// Scripted marketplace that records calls and serves queued statuses.
///
/// Once the status queue is drained every further poll reports
/// `Pending("loading")`.
#[derive(Clone, Debug)]
pub struct ScriptedMarketplace {
    state: Arc<Mutex<MarketState>>,
}

/// Instance identifier handed out by [`ScriptedMarketplace::create`].
pub const SCRIPTED_INSTANCE_ID: &str = "4242";

impl Default for ScriptedMarketplace {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedMarketplace {
    /// Creates a marketplace with one eligible offer and working endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MarketState {
                offers: vec![Offer {
                    offer_id: Some(String::from("9001")),
                    machine_id: Some(String::from("77")),
                    price: Some(0.35),
                    disk_gb: Some(128.0),
                    num_gpus: Some(1),
                    gpu_name: Some(String::from("RTX_4090")),
                    geolocation: Some(String::from("Taiwan, TW")),
                }],
                statuses: VecDeque::new(),
                ssh_uri: String::from("ssh://root@10.0.0.5:2222"),
                scp_uri: String::from("scp://root@10.0.0.5:2222"),
                fail_on_search: false,
                fail_on_create: false,
                fail_on_connection: false,
                fail_on_terminate: false,
                hang_on_terminate: false,
                created: Vec::new(),
                status_calls: 0,
                terminated: Vec::new(),
            })),
        }
    }

    /// Replaces the offers returned by search.
    pub fn set_offers(&self, offers: Vec<Offer>) {
        lock(&self.state).offers = offers;
    }

    /// Queues a status response.
    pub fn push_status(&self, status: InstanceStatus) {
        lock(&self.state).statuses.push_back(Ok(status));
    }

    /// Queues a failing status query.
    pub fn push_status_error(&self) {
        lock(&self.state)
            .statuses
            .push_back(Err(ScriptedMarketError::Status));
    }

    /// Overrides the ssh connection string.
    pub fn set_ssh_uri(&self, uri: impl Into<String>) {
        lock(&self.state).ssh_uri = uri.into();
    }

    /// Makes offer search fail.
    pub fn fail_on_search(&self) {
        lock(&self.state).fail_on_search = true;
    }

    /// Makes offer acceptance fail.
    pub fn fail_on_create(&self) {
        lock(&self.state).fail_on_create = true;
    }

    /// Makes connection string lookups fail.
    pub fn fail_on_connection(&self) {
        lock(&self.state).fail_on_connection = true;
    }

    /// Makes termination fail.
    pub fn fail_on_terminate(&self) {
        lock(&self.state).fail_on_terminate = true;
    }

    /// Makes termination never answer.
    pub fn hang_on_terminate(&self) {
        lock(&self.state).hang_on_terminate = true;
    }

    /// Launch requests received so far.
    #[must_use]
    pub fn created(&self) -> Vec<LaunchRequest> {
        lock(&self.state).created.clone()
    }

    /// Number of status queries received so far.
    #[must_use]
    pub fn status_calls(&self) -> u32 {
        lock(&self.state).status_calls
    }

    /// Instances termination was requested for, in order.
    #[must_use]
    pub fn terminated(&self) -> Vec<InstanceId> {
        lock(&self.state).terminated.clone()
    }
}

impl Marketplace for ScriptedMarketplace {
    type Error = ScriptedMarketError;

    fn search<'a>(&'a self, _query: &'a OfferQuery) -> MarketFuture<'a, Vec<Offer>, Self::Error> {
        let state = lock(&self.state);
        let result = if state.fail_on_search {
            Err(ScriptedMarketError::Search)
        } else {
            Ok(state.offers.clone())
        };
        Box::pin(async move { result })
    }

    fn create<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> MarketFuture<'a, InstanceId, Self::Error> {
        let mut state = lock(&self.state);
        state.created.push(request.clone());
        let result = if state.fail_on_create {
            Err(ScriptedMarketError::Create)
        } else {
            Ok(InstanceId::new(SCRIPTED_INSTANCE_ID))
        };
        Box::pin(async move { result })
    }

    fn status<'a>(
        &'a self,
        _instance: &'a InstanceId,
    ) -> MarketFuture<'a, InstanceStatus, Self::Error> {
        let mut state = lock(&self.state);
        state.status_calls += 1;
        let result = state
            .statuses
            .pop_front()
            .unwrap_or_else(|| Ok(InstanceStatus::Pending(String::from("loading"))));
        Box::pin(async move { result })
    }

    fn connection_uri<'a>(
        &'a self,
        _instance: &'a InstanceId,
        scheme: Scheme,
    ) -> MarketFuture<'a, String, Self::Error> {
        let state = lock(&self.state);
        let result = if state.fail_on_connection {
            Err(ScriptedMarketError::Connection)
        } else {
            Ok(match scheme {
                Scheme::Ssh => state.ssh_uri.clone(),
                Scheme::Scp => state.scp_uri.clone(),
            })
        };
        Box::pin(async move { result })
    }

    fn terminate<'a>(&'a self, instance: &'a InstanceId) -> MarketFuture<'a, (), Self::Error> {
        let mut state = lock(&self.state);
        state.terminated.push(instance.clone());
        if state.hang_on_terminate {
            return Box::pin(std::future::pending());
        }
        let result = if state.fail_on_terminate {
            Err(ScriptedMarketError::Terminate)
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// Produces a `vastai show instances --raw` payload from `(id, status)` pairs.
#[must_use]
pub fn json_instances(instances: &[(u64, &str)]) -> String {
    let items = instances
        .iter()
        .map(|(id, status)| format!("{{\"id\":{id},\"actual_status\":\"{status}\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}
