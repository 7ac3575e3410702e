// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and a scripted CommandRunner that records invocations.

use std::sync::Once;

use async_trait::async_trait;
use parking_lot::Mutex;
use stackup::exec::{CommandOutput, CommandRunner, CommandSpec};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("stackup=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

type Handler = Box<dyn Fn(&CommandSpec) -> Option<CommandOutput> + Send + Sync>;

/// A `CommandRunner` answering from scripted handlers.
///
/// Handlers are tried in registration order; the first one returning
/// `Some` wins. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    handlers: Vec<Handler>,
    calls: Mutex<Vec<CommandSpec>>,
}

#[allow(dead_code)]
impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands of `program` whose arguments start with `prefix`.
    pub fn respond(self, program: &str, prefix: &[&str], output: CommandOutput) -> Self {
        let program = program.to_string();
        let prefix: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
        self.handle(move |spec| {
            let prefix: Vec<&str> = prefix.iter().map(String::as_str).collect();
            (spec.get_program() == program && spec.args_start_with(&prefix))
                .then(|| output.clone())
        })
    }

    /// Answer commands of `program` whose arguments contain `needle`.
    pub fn respond_containing(self, program: &str, needle: &str, output: CommandOutput) -> Self {
        let program = program.to_string();
        let needle = needle.to_string();
        self.handle(move |spec| {
            (spec.get_program() == program && spec.get_args().iter().any(|a| *a == needle))
                .then(|| output.clone())
        })
    }

    pub fn handle(
        mut self,
        handler: impl Fn(&CommandSpec) -> Option<CommandOutput> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Every invocation rendered as a command line.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(ToString::to_string).collect()
    }

    /// Invocations of `program` whose arguments start with `prefix`.
    pub fn calls_matching(&self, program: &str, prefix: &[&str]) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .iter()
            .filter(|spec| spec.get_program() == program && spec.args_start_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn execute(&self, spec: &CommandSpec) -> CommandOutput {
        self.calls.lock().push(spec.clone());
        self.handlers
            .iter()
            .find_map(|handler| handler(spec))
            .unwrap_or_else(|| ok(""))
    }
}

#[allow(dead_code)]
pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput::exited(0, stdout.to_string(), String::new())
}

#[allow(dead_code)]
pub fn exit(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput::exited(code, String::new(), stderr.to_string())
}
