//! Common utilities for integration tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Locate the ks binary next to the test executable
pub fn find_ks_binary() -> PathBuf {
    let mut path = std::env::current_exe().expect("failed to get current exe path");
    path.pop(); // test binary name
    path.pop(); // deps/

    let debug_bin = path.join("ks");
    if debug_bin.exists() {
        return debug_bin;
    }

    path.pop();
    let release_bin = path.join("release").join("ks");
    if release_bin.exists() {
        return release_bin;
    }

    path.join("debug").join("ks")
}

/// CLI command builder pointing `dirs` lookups at an isolated home
pub struct KsCommand {
    binary: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl KsCommand {
    pub fn new(home: &Path) -> Self {
        Self {
            binary: find_ks_binary(),
            args: Vec::new(),
            env: isolated_env(home),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn execute(&self) -> CommandResult {
        let output = Command::new(&self.binary)
            .args(&self.args)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .envs(&self.env)
            .output()
            .expect("failed to execute ks");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }

    pub fn assert_success(&self) -> CommandResult {
        let result = self.execute();
        assert!(
            result.success(),
            "command failed (exit {}):\nargs: {:?}\nstdout: {}\nstderr: {}",
            result.exit_code,
            self.args,
            result.stdout,
            result.stderr
        );
        result
    }

    pub fn assert_failure(&self) -> CommandResult {
        let result = self.execute();
        assert!(
            !result.success(),
            "command should have failed but succeeded:\nargs: {:?}\nstdout: {}",
            self.args,
            result.stdout
        );
        result
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Environment mapping that roots every `dirs` lookup under `home`
pub fn isolated_env(home: &Path) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("HOME".to_string(), home.display().to_string());
    env.insert(
        "XDG_CONFIG_HOME".to_string(),
        home.join(".config").display().to_string(),
    );
    env.insert(
        "XDG_DATA_HOME".to_string(),
        home.join(".local").join("share").display().to_string(),
    );
    env
}

/// Spawn `ks start --foreground` as a child process with an isolated
/// home; the caller owns stopping it
pub fn spawn_daemon(home: &Path, config_path: &Path) -> std::process::Child {
    Command::new(find_ks_binary())
        .arg("--config")
        .arg(config_path)
        .args(["start", "--foreground"])
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .envs(&isolated_env(home))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn daemon")
}

/// Write a minimal configuration file and return its path
pub fn write_config(home: &Path, body: &str) -> PathBuf {
    let config_path = home.join("config.toml");
    std::fs::write(&config_path, body).unwrap();
    config_path
}
