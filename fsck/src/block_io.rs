//! Positioned block I/O against the filesystem image.

use crate::superblock::BLOCK_SIZE;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Reads block `nr` into `buf`.
///
/// Block 0 conventionally means "no block"; the buffer is zeroed and the read is skipped.
/// Returns `false` (and zeroes `buf`) on a seek failure or short read, so the caller can raise
/// the uncorrected-error flag and emit a diagnostic.
pub fn read_block(file: &mut File, nr: u32, buf: &mut [u8; BLOCK_SIZE]) -> bool {
	if nr == 0 {
		buf.fill(0);
		return true;
	}
	let ok = file
		.seek(SeekFrom::Start(nr as u64 * BLOCK_SIZE as u64))
		.and_then(|_| file.read_exact(buf))
		.is_ok();
	if !ok {
		buf.fill(0);
	}
	ok
}

/// Writes `buf` to block `nr`.
///
/// Block 0 is a no-op. Writing outside `[first_data_zone, nzones)` is refused outright — this is
/// an internal-error guard, not something the operator can approve, since it would mean the
/// caller computed a bogus physical block number.
pub fn write_block(
	file: &mut File,
	nr: u32,
	buf: &[u8; BLOCK_SIZE],
	first_data_zone: u32,
	nzones: u32,
) -> bool {
	if nr == 0 {
		return true;
	}
	if nr < first_data_zone || nr >= nzones {
		return false;
	}
	file
		.seek(SeekFrom::Start(nr as u64 * BLOCK_SIZE as u64))
		.and_then(|_| file.write_all(buf))
		.is_ok()
}

/// Writes an arbitrary metadata block (superblock, bitmap blocks, inode table blocks) that sits
/// below `first_data_zone` and therefore isn't covered by `write_block`'s zone-range guard.
pub fn write_meta_block(file: &mut File, block_nr: u32, buf: &[u8]) -> bool {
	file
		.seek(SeekFrom::Start(block_nr as u64 * BLOCK_SIZE as u64))
		.and_then(|_| file.write_all(buf))
		.is_ok()
}

/// Reads an arbitrary metadata region (bitmaps, inode table) spanning `nblocks` blocks starting
/// at `start_block`.
pub fn read_meta_blocks(file: &mut File, start_block: u32, nblocks: u32) -> std::io::Result<Vec<u8>> {
	let mut data = vec![0u8; nblocks as usize * BLOCK_SIZE];
	file.seek(SeekFrom::Start(start_block as u64 * BLOCK_SIZE as u64))?;
	file.read_exact(&mut data)?;
	Ok(data)
}

/// Attempts to read zone `z` purely to distinguish "media-bad" from "logically unused" during
/// reconciliation. Never mutates error state itself; the reconciler decides what a failed probe
/// means in context.
pub fn bad_zone(file: &mut File, z: u32) -> bool {
	let mut buf = [0u8; BLOCK_SIZE];
	!read_block(file, z, &mut buf)
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write as _;

	fn tmp_file(blocks: usize) -> File {
		let mut f = tempfile::tempfile().unwrap();
		f.write_all(&vec![0u8; blocks * BLOCK_SIZE]).unwrap();
		f
	}

	#[test]
	fn zero_block_number_is_a_noop_read() {
		let mut f = tmp_file(4);
		let mut buf = [0xffu8; BLOCK_SIZE];
		assert!(read_block(&mut f, 0, &mut buf));
		assert_eq!(buf, [0u8; BLOCK_SIZE]);
	}

	#[test]
	fn short_read_zeroes_and_fails() {
		let mut f = tmp_file(1);
		let mut buf = [0xffu8; BLOCK_SIZE];
		// Block 5 is entirely past EOF of a 1-block file.
		assert!(!read_block(&mut f, 5, &mut buf));
		assert_eq!(buf, [0u8; BLOCK_SIZE]);
	}

	#[test]
	fn write_block_refuses_out_of_range() {
		let mut f = tmp_file(10);
		let buf = [0x11u8; BLOCK_SIZE];
		assert!(!write_block(&mut f, 2, &buf, 5, 10));
		assert!(write_block(&mut f, 7, &buf, 5, 10));
	}

	#[test]
	fn roundtrip_through_write_meta_and_read() {
		let mut f = tmp_file(10);
		let mut buf = [0x22u8; BLOCK_SIZE];
		assert!(write_meta_block(&mut f, 3, &buf));
		let mut readback = [0u8; BLOCK_SIZE];
		assert!(read_block(&mut f, 3, &mut readback));
		assert_eq!(readback, buf);
		buf.fill(0);
		let _ = buf;
	}
}
