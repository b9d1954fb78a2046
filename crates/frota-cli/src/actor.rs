//! Actor identity resolution for CLI commands.
//!
//! The resolution chain: `--actor` flag > `FROTA_ACTOR` env > `USER` env (TTY only).
//! Mutating commands require an actor; read-only commands work without one.

use std::env;

/// Errors from actor resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorResolutionError {
    pub message: String,
}

impl std::fmt::Display for ActorResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActorResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_actor_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(actor) = cli_flag.map(str::trim).filter(|a| !a.is_empty()) {
        return Some(actor.to_string());
    }

    if let Some(val) = env.get("FROTA_ACTOR") {
        return Some(val.trim().to_string());
    }

    // Scripts must name themselves; a login name is only trusted interactively.
    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the actor identity, or `None` if nothing is set.
pub fn resolve_actor(cli_flag: Option<&str>) -> Option<String> {
    resolve_actor_with(cli_flag, &RealEnv)
}

/// Resolve the actor identity, returning an error if not found.
pub fn require_actor(cli_flag: Option<&str>) -> Result<String, ActorResolutionError> {
    resolve_actor(cli_flag).ok_or_else(|| ActorResolutionError {
        message: "Actor identity required for this command. \
                  Set --actor or the FROTA_ACTOR environment variable."
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.trim().is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("FROTA_ACTOR", "env-actor").var("USER", "login").tty();
        assert_eq!(resolve_actor_with(Some("ana"), &env).as_deref(), Some("ana"));
    }

    #[test]
    fn frota_actor_env_fallback() {
        let env = MockEnv::new().var("FROTA_ACTOR", "bia").var("USER", "login").tty();
        assert_eq!(resolve_actor_with(None, &env).as_deref(), Some("bia"));
    }

    #[test]
    fn blank_flag_ignored() {
        let env = MockEnv::new().var("FROTA_ACTOR", "bia");
        assert_eq!(resolve_actor_with(Some("  "), &env).as_deref(), Some("bia"));
    }

    #[test]
    fn user_env_only_in_tty() {
        let env = MockEnv::new().var("USER", "caio");
        assert_eq!(resolve_actor_with(None, &env), None);

        let env = MockEnv::new().var("USER", "caio").tty();
        assert_eq!(resolve_actor_with(None, &env).as_deref(), Some("caio"));
    }

    #[test]
    fn no_identity_returns_none() {
        assert_eq!(resolve_actor_with(None, &MockEnv::new().tty()), None);
    }

    #[test]
    fn require_actor_succeeds_with_flag() {
        assert_eq!(require_actor(Some("ana")).expect("flag is enough"), "ana");
    }
}
