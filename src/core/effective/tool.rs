// ─── Effective POM Tool ───
// Spawns the external flattener (`mvn help:effective-pom`) under hard limits.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::error::{ResolverError, ResolverResult};

/// Something that turns a raw POM file into an effective one.
#[async_trait]
pub trait EffectivePomTool: Send + Sync {
    /// Read `input`, write the flattened document to `output`.
    async fn flatten(&self, input: &Path, output: &Path) -> ResolverResult<()>;
}

/// Limits applied to every tool run.
#[derive(Debug, Clone)]
pub struct ToolLimits {
    pub timeout: Duration,
    /// `nice` increment; 0 runs at normal priority.
    pub niceness: i32,
    /// JVM heap ceiling passed through `MAVEN_OPTS`.
    pub memory_limit_mb: u32,
}

/// Runs Maven's help plugin.
#[derive(Debug, Clone)]
pub struct MavenEffectivePom {
    program: String,
    limits: ToolLimits,
}

impl MavenEffectivePom {
    pub fn new(program: impl Into<String>, limits: ToolLimits) -> Self {
        Self {
            program: program.into(),
            limits,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = if cfg!(unix) && self.limits.niceness > 0 {
            let mut nice = Command::new("nice");
            nice.arg("-n")
                .arg(self.limits.niceness.to_string())
                .arg(&self.program);
            nice
        } else {
            Command::new(&self.program)
        };

        cmd.arg("--batch-mode")
            .arg("--quiet")
            .arg("-f")
            .arg(input)
            .arg("help:effective-pom")
            .arg(format!("-Doutput={}", output.display()));

        if let Some(dir) = input.parent() {
            cmd.current_dir(dir);
        }
        cmd.env("MAVEN_OPTS", format!("-Xmx{}m", self.limits.memory_limit_mb));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl EffectivePomTool for MavenEffectivePom {
    async fn flatten(&self, input: &Path, output: &Path) -> ResolverResult<()> {
        let mut cmd = self.command(input, output);
        debug!("Command: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| ResolverError::Io {
            path: self.program.clone().into(),
            source: e,
        })?;

        let result = tokio::time::timeout(self.limits.timeout, child.wait_with_output())
            .await
            .map_err(|_| ResolverError::ToolTimeout(self.limits.timeout))?
            .map_err(|e| ResolverError::Tool(e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(5)..].join("\n");
            return Err(ResolverError::Tool(format!("{}: {}", result.status, tail)));
        }

        info!("Effective POM written to {:?}", output);
        Ok(())
    }
}
