//! Start-at-login registration.
//!
//! Cross-platform via the auto-launch crate: registry Run key on Windows,
//! XDG autostart on Linux, login item on macOS. The preference is never
//! persisted by the settings store; the OS registration itself is the
//! record, and callers read it back with [`is_enabled`].

use crate::error::FinbackError;

use auto_launch::{AutoLaunch, AutoLaunchBuilder};

const APP_NAME: &str = "Finback";

/// macOS login items need the `.app` bundle, not the inner executable.
/// `/Applications/Finback.app/Contents/MacOS/finback` becomes
/// `/Applications/Finback.app`.
#[cfg(target_os = "macos")]
fn macos_app_bundle_path(exe_path: &std::path::Path) -> Option<std::path::PathBuf> {
    let path_str = exe_path.to_string_lossy();
    path_str
        .find(".app/Contents/MacOS/")
        .map(|app_pos| std::path::PathBuf::from(&path_str[..app_pos + 4]))
}

fn launcher() -> Result<AutoLaunch, FinbackError> {
    let exe_path = std::env::current_exe()
        .map_err(|e| FinbackError::autostart(format!("Failed to resolve executable path: {e}")))?;

    // A bare executable path would open a terminal window on macOS
    #[cfg(target_os = "macos")]
    let app_path = macos_app_bundle_path(&exe_path).unwrap_or(exe_path);

    #[cfg(not(target_os = "macos"))]
    let app_path = exe_path;

    AutoLaunchBuilder::new()
        .set_app_name(APP_NAME)
        .set_app_path(&app_path.to_string_lossy())
        .build()
        .map_err(|e| FinbackError::autostart(format!("Failed to build login item: {e}")))
}

/// Register the agent to start at login.
pub fn enable() -> Result<(), FinbackError> {
    launcher()?
        .enable()
        .map_err(|e| FinbackError::autostart(format!("Failed to enable start at login: {e}")))?;
    tracing::info!("Start at login enabled");
    Ok(())
}

/// Remove the start-at-login registration.
pub fn disable() -> Result<(), FinbackError> {
    launcher()?
        .disable()
        .map_err(|e| FinbackError::autostart(format!("Failed to disable start at login: {e}")))?;
    tracing::info!("Start at login disabled");
    Ok(())
}

/// Whether the agent is currently registered to start at login.
pub fn is_enabled() -> Result<bool, FinbackError> {
    launcher()?
        .is_enabled()
        .map_err(|e| FinbackError::autostart(format!("Failed to read start at login state: {e}")))
}

#[cfg(test)]
mod tests {
    #[cfg(target_os = "macos")]
    use super::*;

    #[cfg(target_os = "macos")]
    #[test]
    fn test_bundle_path_extracted_from_executable() {
        let exe = std::path::Path::new("/Applications/Finback.app/Contents/MacOS/finback");
        assert_eq!(
            macos_app_bundle_path(exe),
            Some(std::path::PathBuf::from("/Applications/Finback.app"))
        );
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_bundle_path_handles_spaces() {
        let exe =
            std::path::Path::new("/Users/pat/My Tools/Finback.app/Contents/MacOS/finback");
        assert_eq!(
            macos_app_bundle_path(exe),
            Some(std::path::PathBuf::from("/Users/pat/My Tools/Finback.app"))
        );
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_plain_executable_is_not_a_bundle() {
        let exe = std::path::Path::new("/usr/local/bin/finback");
        assert_eq!(macos_app_bundle_path(exe), None);
    }
}
