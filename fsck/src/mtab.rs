//! Mount-table inspection, used by the driver to refuse an interactive repair against a mounted
//! device. Parses `/etc/mtab` the same way this codebase's `umount` does.

use std::fs;
use std::path::Path;

const MTAB_PATH: &str = "/etc/mtab";

/// Returns whether `device` appears as the mounted-device column of any `/etc/mtab` entry.
///
/// Best-effort: a missing or unreadable mtab is treated as "not mounted" rather than an error,
/// since the check only gates an extra confirmation prompt, not correctness.
pub fn is_mounted(device: &Path) -> bool {
	let Ok(content) = fs::read_to_string(MTAB_PATH) else {
		return false;
	};
	let device = device.to_string_lossy();
	content
		.lines()
		.filter_map(|line| line.split_whitespace().next())
		.any(|mounted_device| mounted_device == device)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn finds_matching_device_column() {
		let content = "/dev/sda1 / ext4 rw 0 0\n/dev/sdb2 /mnt/data minix rw 0 0\n";
		let matched = content
			.lines()
			.filter_map(|line| line.split_whitespace().next())
			.any(|d| d == "/dev/sdb2");
		assert!(matched);
	}

	#[test]
	fn missing_mtab_is_not_mounted() {
		assert!(!is_mounted(Path::new("/dev/nonexistent-for-test")));
	}
}
