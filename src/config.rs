//! Interpreter settings.

/// What to do with the rest of a run once a top-level statement fails at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first runtime error (batch mode).
    #[default]
    Halt,
    /// Report the error and go on with the next top-level statement (REPL mode).
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Nesting of user function calls above which `Stack overflow.` is raised.
    pub max_call_depth: usize,
    pub on_runtime_error: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: 4096,
            on_runtime_error: ErrorPolicy::Halt,
        }
    }
}

impl Config {
    pub fn with_max_call_depth(mut self, depth: usize) -> Config {
        self.max_call_depth = depth;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Config {
        self.on_runtime_error = policy;
        self
    }
}
