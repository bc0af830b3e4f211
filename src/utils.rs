use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Fmt subscriber on stdout. `RUST_LOG` narrows or widens the default `info`
/// level; colours are only emitted when the console can render them.
pub fn init_logging() {
    let ansi = ansi_output(std::io::stdout().is_terminal());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .init();
}

/// Redirected output never gets escape codes; the console is only touched
/// when stdout is a terminal.
fn ansi_output(stdout_is_terminal: bool) -> bool {
    stdout_is_terminal && enable_ansi_console()
}

/// Switches the Windows console to UTF-8 and turns on VT escape handling.
/// Returns false when the handle is not a console (redirected output).
#[cfg(windows)]
fn enable_ansi_console() -> bool {
    use windows_sys::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, SetConsoleOutputCP, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
        STD_OUTPUT_HANDLE,
    };
    const UTF8_CODE_PAGE: u32 = 65001;

    // SAFETY: plain Win32 console calls on this process's own stdout handle.
    unsafe {
        SetConsoleOutputCP(UTF8_CODE_PAGE);
        let handle = GetStdHandle(STD_OUTPUT_HANDLE);
        let mut mode = 0;
        if GetConsoleMode(handle, &mut mode) == 0 {
            return false;
        }
        mode & ENABLE_VIRTUAL_TERMINAL_PROCESSING != 0
            || SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING) != 0
    }
}

#[cfg(not(windows))]
fn enable_ansi_console() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirected_output_is_plain() {
        assert!(!ansi_output(false));
    }

    #[cfg(not(windows))]
    #[test]
    fn unix_terminal_gets_colours() {
        assert!(ansi_output(true));
    }
}
