use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// URL scheme handled by the Vesslo host app.
pub const VESSLO_URL_SCHEME: &str = "vesslo://";

/// Status-bar diagnostics get cut to this many bytes.
const DIAGNOSTIC_LIMIT: usize = 100;

/// Outcome of a captured package-manager run.
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeOutcome
{
    /// The upgrade ran; payload is the tool's output for display.
    Updated(String),
    /// The package manager reported there was nothing to do.
    AlreadyUpToDate,
}

/// Runs the package managers and system helpers this front end delegates
/// to. Everything here is a subprocess; nothing mutates app state.
#[derive(Clone)]
pub struct ActionRunner
{
    brew_path: PathBuf,
}

impl ActionRunner
{
    pub fn new() -> Self
    {
        Self { brew_path: detect_brew_path() }
    }

    /// Captured `brew upgrade --cask <cask>` for a single app.
    pub async fn brew_upgrade(&self,
                              cask: &str)
                              -> Result<UpgradeOutcome>
    {
        let mut cmd = Command::new(&self.brew_path);
        cmd.arg("upgrade").arg("--cask").arg(cask);
        run_captured(cmd, "brew upgrade").await
    }

    /// Captured `brew upgrade --cask` for every outdated cask at once.
    pub async fn brew_upgrade_all(&self) -> Result<UpgradeOutcome>
    {
        let mut cmd = Command::new(&self.brew_path);
        cmd.arg("upgrade").arg("--cask");
        run_captured(cmd, "brew upgrade").await
    }

    /// Captured `mas upgrade <id>` for a single App Store app.
    pub async fn mas_upgrade(&self,
                             app_store_id: &str)
                             -> Result<UpgradeOutcome>
    {
        let mut cmd = Command::new("mas");
        cmd.arg("upgrade").arg(app_store_id);
        run_captured(cmd, "mas upgrade").await
    }

    /// Hand a cask upgrade to an interactive Terminal window, so the user
    /// can watch the output and answer sudo/password prompts.
    pub async fn brew_upgrade_in_terminal(&self,
                                          cask: &str)
                                          -> Result<()>
    {
        let command = format!("{} upgrade --cask {}", self.brew_path.display(), cask);
        run_in_terminal(&command).await
    }

    /// Hand a mas upgrade to an interactive Terminal window.
    pub async fn mas_upgrade_in_terminal(&self,
                                         app_store_id: &str)
                                         -> Result<()>
    {
        let command = format!("mas upgrade {}", app_store_id);
        run_in_terminal(&command).await
    }

    /// Launch the app bundle itself.
    pub async fn open_app(&self,
                          path: &str)
                          -> Result<()>
    {
        run_open(&[path]).await
    }

    /// Reveal the bundle in Finder.
    pub async fn reveal_in_finder(&self,
                                  path: &str)
                                  -> Result<()>
    {
        run_open(&["-R", path]).await
    }

    /// Open a URL: a vesslo:// deep link or an App Store page.
    /// Fire-and-forget; no response is awaited from the handler.
    pub async fn open_url(&self,
                          url: &str)
                          -> Result<()>
    {
        run_open(&[url]).await
    }

    /// Put text on the clipboard via pbcopy.
    pub async fn copy_to_clipboard(&self,
                                   text: &str)
                                   -> Result<()>
    {
        let mut child = Command::new("pbcopy").stdin(Stdio::piped())
                                              .spawn()
                                              .context("Failed to run pbcopy")?;

        if let Some(stdin) = child.stdin.as_mut()
        {
            stdin.write_all(text.as_bytes()).await.context("Failed to write to pbcopy")?;
        }
        drop(child.stdin.take());

        let status = child.wait().await.context("Failed to wait for pbcopy")?;
        if !status.success()
        {
            bail!("pbcopy exited with {}", status);
        }
        Ok(())
    }
}

impl Default for ActionRunner
{
    fn default() -> Self
    {
        Self::new()
    }
}

/// Deep link to an app's page inside Vesslo.
pub fn vesslo_app_url(bundle_id: &str) -> String
{
    format!("{}app/{}", VESSLO_URL_SCHEME, bundle_id)
}

/// Deep link asking Vesslo to update one app.
pub fn vesslo_update_url(bundle_id: &str) -> String
{
    format!("{}update/{}", VESSLO_URL_SCHEME, bundle_id)
}

/// Deep link asking Vesslo to update everything it can.
pub fn vesslo_update_all_url() -> String
{
    format!("{}update-all", VESSLO_URL_SCHEME)
}

/// App Store page for a store id.
pub fn app_store_url(app_store_id: &str) -> String
{
    format!("macappstore://apps.apple.com/app/id{}", app_store_id)
}

/// Apple Silicon installs live under /opt/homebrew, Intel under
/// /usr/local. Prefer the Apple Silicon prefix when it exists.
fn detect_brew_path() -> PathBuf
{
    let apple_silicon = Path::new("/opt/homebrew/bin/brew");
    if apple_silicon.exists()
    {
        return apple_silicon.to_path_buf();
    }
    PathBuf::from("/usr/local/bin/brew")
}

/// Run a package-manager command with output captured and classify the
/// result. The "nothing to do" check runs before the status check since
/// some tools exit non-zero for an already-current package.
async fn run_captured(mut cmd: Command,
                      what: &str)
                      -> Result<UpgradeOutcome>
{
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd.output().await.with_context(|| format!("Failed to run {}", what))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if is_already_up_to_date(&stdout) || is_already_up_to_date(&stderr)
    {
        return Ok(UpgradeOutcome::AlreadyUpToDate);
    }

    if !output.status.success()
    {
        bail!("{} failed: {}", what, truncate_diagnostic(&stderr));
    }

    Ok(UpgradeOutcome::Updated(stdout.trim().to_string()))
}

/// Signal strings the package managers print when nothing needs doing.
fn is_already_up_to_date(output: &str) -> bool
{
    output.contains("already installed")
        || output.contains("Not upgrading")
        || output.contains("Nothing found to upgrade")
}

/// Keep status-bar diagnostics to one short line.
pub fn truncate_diagnostic(message: &str) -> String
{
    let message = message.trim();
    let first_line = message.lines().next().unwrap_or("");

    if first_line.len() <= DIAGNOSTIC_LIMIT
    {
        return first_line.to_string();
    }

    let mut end = DIAGNOSTIC_LIMIT;
    while !first_line.is_char_boundary(end)
    {
        end -= 1;
    }
    format!("{}…", &first_line[..end])
}

async fn run_open(args: &[&str]) -> Result<()>
{
    let output = Command::new("/usr/bin/open").args(args)
                                              .stdout(Stdio::piped())
                                              .stderr(Stdio::piped())
                                              .output()
                                              .await
                                              .context("Failed to run open")?;

    if !output.status.success()
    {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("open failed: {}", truncate_diagnostic(&stderr));
    }
    Ok(())
}

/// Activate Terminal and run the command in a new window.
async fn run_in_terminal(command: &str) -> Result<()>
{
    let do_script = format!("do script \"{}\"", command.replace('"', "\\\""));

    let output = Command::new("osascript").arg("-e")
                                          .arg("tell application \"Terminal\"")
                                          .arg("-e")
                                          .arg("activate")
                                          .arg("-e")
                                          .arg(&do_script)
                                          .arg("-e")
                                          .arg("end tell")
                                          .stdout(Stdio::piped())
                                          .stderr(Stdio::piped())
                                          .output()
                                          .await
                                          .context("Failed to run osascript")?;

    if !output.status.success()
    {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Failed to open Terminal: {}", truncate_diagnostic(&stderr));
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn deep_links_match_the_vesslo_scheme()
    {
        assert_eq!(vesslo_app_url("com.acme.Example"), "vesslo://app/com.acme.Example");
        assert_eq!(vesslo_update_url("com.acme.Example"), "vesslo://update/com.acme.Example");
        assert_eq!(vesslo_update_all_url(), "vesslo://update-all");
    }

    #[test]
    fn app_store_url_embeds_the_store_id()
    {
        assert_eq!(app_store_url("123456"), "macappstore://apps.apple.com/app/id123456");
    }

    #[test]
    fn up_to_date_signals_from_both_tools_are_recognized()
    {
        assert!(is_already_up_to_date("Warning: Not upgrading example, the latest version is already installed"));
        assert!(is_already_up_to_date("example 1.2.3 is already installed"));
        assert!(is_already_up_to_date("Nothing found to upgrade"));

        assert!(!is_already_up_to_date("==> Upgrading example 1.2.3 -> 1.3.0"));
        assert!(!is_already_up_to_date(""));
    }

    #[test]
    fn diagnostics_are_cut_to_one_short_line()
    {
        assert_eq!(truncate_diagnostic("  plain error  "), "plain error");
        assert_eq!(truncate_diagnostic("first line\nsecond line"), "first line");

        let long = "x".repeat(300);
        let truncated = truncate_diagnostic(&long);
        assert!(truncated.ends_with('…'));
        assert_eq!(truncated.chars().count(), 101);
    }

    #[test]
    fn diagnostic_truncation_respects_char_boundaries()
    {
        // 'é' is two bytes; a naive byte slice at the limit would panic
        let long = "é".repeat(120);
        let truncated = truncate_diagnostic(&long);
        assert!(truncated.ends_with('…'));
        assert!(truncated.chars().count() <= 101);
    }
}
