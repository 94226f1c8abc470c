//! Shell resolution
//!
//! Decides which executable a session runs, how it is invoked, and the
//! environment it starts with. Resolution happens once per session; the
//! result is kept for the session's lifetime and reused on restart.

use crate::error::SessionError;
use nix::unistd::{Uid, User};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Shells tried in order when `SHELL` is unset or points nowhere
pub const FALLBACK_SHELLS: &[&str] = &[
    "/bin/zsh",
    "/bin/bash",
    "/usr/bin/zsh",
    "/usr/bin/bash",
    "/bin/sh",
];

/// Used without probing when every other candidate is missing
pub const LAST_RESORT_SHELL: &str = "/bin/sh";

/// `PATH` given to the shell when the host process has none
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

pub const TERM_TYPE: &str = "xterm-256color";

/// Flag requesting a login shell
pub const LOGIN_FLAG: &str = "-l";

/// Environment snapshot handed to the shell; keys are unique and sorted.
///
/// Held as raw OS strings so variables that are not valid UTF-8 pass through
/// untouched.
pub type Environment = BTreeMap<OsString, OsString>;

/// Value of `key`, treating an empty value as unset
fn non_empty<'a>(env: &'a Environment, key: &str) -> Option<&'a OsStr> {
    env.get(OsStr::new(key))
        .map(OsString::as_os_str)
        .filter(|value| !value.is_empty())
}

type Probe = Box<dyn Fn(&Path) -> bool>;

/// Where a shell candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Inherited,
    Fallback,
    LastResort,
}

/// One entry of the ordered preference list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCandidate {
    pub path: PathBuf,
    pub source: CandidateSource,
}

impl ShellCandidate {
    fn is_usable(&self, probe: &dyn Fn(&Path) -> bool) -> bool {
        match self.source {
            CandidateSource::LastResort => true,
            CandidateSource::Inherited | CandidateSource::Fallback => probe(&self.path),
        }
    }
}

/// Identity of the user the shell runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub home: PathBuf,
}

impl UserInfo {
    /// Look up the current user in the passwd database.
    ///
    /// Falls back to `LOGNAME` and `/` when the lookup fails, e.g. inside
    /// containers running under an unmapped uid.
    pub fn current(inherited: &Environment) -> Self {
        match User::from_uid(Uid::current()) {
            Ok(Some(user)) => Self {
                name: user.name,
                home: user.dir,
            },
            Ok(None) | Err(_) => {
                tracing::debug!("no passwd entry for current uid");
                Self {
                    name: non_empty(inherited, "LOGNAME")
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| Uid::current().to_string()),
                    home: PathBuf::from("/"),
                }
            }
        }
    }
}

/// Result of shell resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedShell {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Leading-dash basename, signals login-shell semantics to the shell
    pub exec_name: String,
    pub environment: Environment,
    pub working_directory: PathBuf,
}

impl ResolvedShell {
    /// Base name of the executable, e.g. `zsh`
    pub fn name(&self) -> &str {
        self.executable
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("sh")
    }
}

/// Resolves the shell, arguments and environment for a new session
pub struct ShellResolver {
    inherited: Environment,
    probe: Probe,
    user: Option<UserInfo>,
    last_resort: bool,
    app_name: String,
    app_version: String,
    resolutions: Cell<usize>,
}

impl ShellResolver {
    /// Resolver over the current process environment and filesystem
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            inherited: std::env::vars_os().collect(),
            probe: Box::new(|path: &Path| path.is_file()),
            user: None,
            last_resort: true,
            app_name: app_name.into(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            resolutions: Cell::new(0),
        }
    }

    /// Replace the inherited environment
    pub fn with_inherited(mut self, inherited: Environment) -> Self {
        self.inherited = inherited;
        self
    }

    /// Replace the existence check used for shell candidates
    pub fn with_probe(mut self, probe: impl Fn(&Path) -> bool + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Use a fixed user instead of the passwd lookup
    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }

    /// Fail with `NoShellAvailable` instead of assuming `/bin/sh` exists
    pub fn without_last_resort(mut self) -> Self {
        self.last_resort = false;
        self
    }

    /// Number of `resolve` calls so far, successful or not
    pub fn resolutions(&self) -> usize {
        self.resolutions.get()
    }

    /// Ordered preference list for this environment
    pub fn candidates(&self) -> Vec<ShellCandidate> {
        let mut candidates = Vec::with_capacity(FALLBACK_SHELLS.len() + 2);

        if let Some(shell) = non_empty(&self.inherited, "SHELL") {
            candidates.push(ShellCandidate {
                path: PathBuf::from(shell),
                source: CandidateSource::Inherited,
            });
        }

        candidates.extend(FALLBACK_SHELLS.iter().map(|path| ShellCandidate {
            path: PathBuf::from(path),
            source: CandidateSource::Fallback,
        }));

        if self.last_resort {
            candidates.push(ShellCandidate {
                path: PathBuf::from(LAST_RESORT_SHELL),
                source: CandidateSource::LastResort,
            });
        }

        candidates
    }

    /// Pick the shell and synthesize its environment
    pub fn resolve(&self) -> Result<ResolvedShell, SessionError> {
        self.resolutions.set(self.resolutions.get() + 1);
        let candidates = self.candidates();
        let chosen = candidates
            .iter()
            .find(|candidate| candidate.is_usable(self.probe.as_ref()))
            .ok_or(SessionError::NoShellAvailable {
                tried: candidates.len(),
            })?;

        let environment = self.environment();
        let working_directory = non_empty(&environment, "HOME")
            .map(PathBuf::from)
            .filter(|home| home.is_dir())
            .unwrap_or_else(|| PathBuf::from("/"));

        let executable = chosen.path.clone();
        let base = executable
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("sh");

        tracing::debug!(
            shell = %executable.display(),
            source = ?chosen.source,
            cwd = %working_directory.display(),
            "resolved shell"
        );

        Ok(ResolvedShell {
            exec_name: format!("-{base}"),
            executable,
            args: vec![LOGIN_FLAG.to_string()],
            environment,
            working_directory,
        })
    }

    /// Inherited environment with the session's required variables filled in
    fn environment(&self) -> Environment {
        let mut env = self.inherited.clone();
        let missing = |env: &Environment, key: &str| non_empty(env, key).is_none();

        if missing(&env, "HOME") || missing(&env, "USER") {
            let user = self
                .user
                .clone()
                .unwrap_or_else(|| UserInfo::current(&self.inherited));
            if missing(&env, "HOME") {
                env.insert("HOME".into(), user.home.into_os_string());
            }
            if missing(&env, "USER") {
                env.insert("USER".into(), user.name.into());
            }
        }
        if missing(&env, "PATH") {
            env.insert("PATH".into(), DEFAULT_PATH.into());
        }

        env.insert("TERM".into(), TERM_TYPE.into());
        env.insert("COLORTERM".into(), "truecolor".into());
        env.insert("TERM_PROGRAM".into(), self.app_name.as_str().into());
        env.insert("TERM_PROGRAM_VERSION".into(), self.app_version.as_str().into());
        env
    }
}
