//! The repair arbiter: read-only, automatic, and interactive policies for proposed fixes.
//!
//! Modeled as a capability rather than direct I/O calls scattered through the walker and
//! reconciler, so tests can substitute a scripted decision table (see design notes).

use std::io::Read;
use std::io::Write;
use std::{io, mem};

/// Decides the outcome of a single proposed fix.
pub enum Arbiter {
	/// Never approves anything; used when `-r`/`-a` were not given.
	ReadOnly,
	/// Always approves the caller-supplied default.
	Automatic,
	/// Prompts the operator for each fix, reading raw single keystrokes from stdin.
	Interactive,
	/// Replays a fixed sequence of answers; used by tests. Falls back to `default` once
	/// exhausted.
	Scripted(Vec<bool>),
}

impl Arbiter {
	/// Asks a single yes/no question and returns the raw decision (before the caller updates
	/// `errors_uncorrected`).
	pub fn decide(&mut self, question: &str, default: bool) -> bool {
		match self {
			Self::ReadOnly => {
				println!("{question}?");
				false
			}
			Self::Automatic => {
				let answer = if default { "yes" } else { "no" };
				println!("{question}? {answer}");
				default
			}
			Self::Interactive => prompt_yes_no(question, default),
			Self::Scripted(answers) => {
				if answers.is_empty() {
					default
				} else {
					answers.remove(0)
				}
			}
		}
	}
}

/// Prompts `"<question> (y/n)? "` (or `(n/y)?` when the default is "no"), then reads a single
/// raw keystroke from stdin. The terminal is assumed to already be in raw/no-echo mode (entered
/// once for the whole interactive run, not per question).
fn prompt_yes_no(question: &str, default: bool) -> bool {
	if default {
		print!("{question} (y/n)? ");
	} else {
		print!("{question} (n/y)? ");
	}
	let _ = io::stdout().flush();

	let mut byte = [0u8; 1];
	loop {
		match io::stdin().read(&mut byte) {
			Ok(0) => {
				println!();
				return default;
			}
			Ok(_) => {
				let answer = match byte[0] {
					b'y' | b'Y' => Some(true),
					b'n' | b'N' => Some(false),
					b' ' | b'\n' | b'\r' => Some(default),
					_ => None,
				};
				if let Some(answer) = answer {
					println!();
					return answer;
				}
			}
			Err(_) => return default,
		}
	}
}

/// RAII guard that puts stdin into raw, no-echo mode for the duration of an interactive run and
/// restores the saved `termios` on drop.
///
/// The same saved state is published to a process-wide static so that the fatal-signal handler
/// (which cannot safely call into arbitrary Rust drop glue) can perform the same restoration.
pub struct RawModeGuard {
	active: bool,
}

static mut SAVED_TERMIOS: Option<libc::termios> = None;

impl RawModeGuard {
	/// Enters raw mode. No-op (and restores nothing on drop) unless `interactive` is true.
	pub fn enter(interactive: bool) -> io::Result<Self> {
		if !interactive {
			return Ok(Self { active: false });
		}
		unsafe {
			let mut saved: libc::termios = mem::zeroed();
			if libc::tcgetattr(libc::STDIN_FILENO, &mut saved) != 0 {
				return Err(io::Error::last_os_error());
			}
			SAVED_TERMIOS = Some(saved);

			let mut raw = saved;
			raw.c_lflag &= !(libc::ICANON | libc::ECHO);
			raw.c_cc[libc::VMIN] = 1;
			raw.c_cc[libc::VTIME] = 0;
			if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) != 0 {
				return Err(io::Error::last_os_error());
			}
		}
		install_signal_handlers();
		Ok(Self { active: true })
	}
}

impl Drop for RawModeGuard {
	fn drop(&mut self) {
		if self.active {
			restore_termios();
		}
	}
}

/// Restores the terminal to whatever `RawModeGuard::enter` saved, if anything. Called by the
/// `fatal()` helper so a fatal error during an interactive run doesn't leave the TTY in raw mode.
pub fn restore_before_exit() {
	restore_termios();
}

/// Restores the terminal to the state saved by `RawModeGuard::enter`, if any.
fn restore_termios() {
	unsafe {
		if let Some(saved) = SAVED_TERMIOS {
			libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &saved);
		}
	}
}

/// Installs handlers for SIGINT/SIGQUIT/SIGTERM that restore the terminal, reset the signal's
/// disposition to default, and re-raise — so the process still dies the way it normally would,
/// just with the TTY left sane.
fn install_signal_handlers() {
	unsafe {
		libc::signal(libc::SIGINT, handle_fatal_signal as libc::sighandler_t);
		libc::signal(libc::SIGQUIT, handle_fatal_signal as libc::sighandler_t);
		libc::signal(libc::SIGTERM, handle_fatal_signal as libc::sighandler_t);
	}
}

extern "C" fn handle_fatal_signal(sig: libc::c_int) {
	restore_termios();
	unsafe {
		libc::signal(sig, libc::SIG_DFL);
		libc::raise(sig);
	}
}
