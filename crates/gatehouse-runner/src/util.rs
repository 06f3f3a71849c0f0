use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Command;

pub fn run_cmd(dir: &Path, program: &str, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir);
    let out = cmd.output().with_context(|| format!("run {} {:?}", program, args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: {} {:?}\nstdout:{}\nstderr:{}",
            program,
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// `None` outside a git checkout or when git is not installed.
pub fn git_commit(dir: &Path) -> Option<String> {
    run_cmd(dir, "git", &["rev-parse", "HEAD"]).ok().filter(|s| !s.is_empty())
}

/// `None` on a detached head as well.
pub fn git_branch(dir: &Path) -> Option<String> {
    run_cmd(dir, "git", &["rev-parse", "--abbrev-ref", "HEAD"])
        .ok()
        .filter(|s| !s.is_empty() && s != "HEAD")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn failing_command_reports_program() {
        let dir = tempdir().unwrap();
        let err = run_cmd(dir.path(), "git", &["definitely-not-a-subcommand"]).unwrap_err();
        assert!(format!("{:#}", err).contains("git"));
    }

    #[test]
    fn plain_directory_has_no_git_coordinates() {
        let dir = tempdir().unwrap();
        assert_eq!(git_commit(dir.path()), None);
        assert_eq!(git_branch(dir.path()), None);
    }
}
