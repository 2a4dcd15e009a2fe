//! The shared, per-run state: superblock, bitmaps, inode table, reconstructed counts, and the
//! flags/arbiter that mediate repairs.
//!
//! Collected into one structure and threaded by mutable reference through the walker and
//! reconciler, rather than reintroduced as process-wide mutable statics (see design notes).

use crate::arbiter::Arbiter;
use crate::bitmap;
use crate::block_io;
use crate::inode::{Inode, Layout};
use crate::superblock::{SuperBlock, BLOCK_SIZE};
use std::fs::File;
use std::path::PathBuf;

/// CLI-derived options that affect reporting and repair policy but aren't themselves part of the
/// filesystem state.
#[derive(Default, Clone, Copy)]
pub struct Options {
	/// `-l`: list every file visited.
	pub list: bool,
	/// `-a` or `-r`: a repair pass was requested (gates the final flush).
	pub repair: bool,
	/// `-v`: print the verbose summary (on by default).
	pub verbose: bool,
	/// `-s`: print superblock info before checking.
	pub show_superblock: bool,
	/// `-m`: warn about allocated-but-cleared inodes retaining a non-zero mode.
	pub warn_mode: bool,
	/// `-f`: force the check even if the filesystem claims to be clean.
	pub force: bool,
}

/// Per-file-type counters accumulated while walking, used for the verbose summary.
#[derive(Default)]
pub struct Stats {
	pub regular: u64,
	pub directories: u64,
	pub chardev: u64,
	pub blockdev: u64,
	pub symlinks: u64,
	pub sockets: u64,
	pub fifos: u64,
	pub unknown: u64,
}

/// Maximum directory nesting depth displayed in `-l` output; deeper entries are still walked.
const MAX_DISPLAY_DEPTH: usize = 50;

pub struct Context {
	file: File,
	pub device_path: PathBuf,
	pub sb: SuperBlock,
	pub layout: Layout,
	pub inode_map: Vec<u8>,
	pub zone_map: Vec<u8>,
	inode_table: Vec<u8>,
	pub inode_count: Vec<u8>,
	pub zone_count: Vec<u8>,
	pub changed: bool,
	pub errors_uncorrected: bool,
	pub arbiter: Arbiter,
	pub options: Options,
	pub stats: Stats,
	path_stack: Vec<String>,
}

impl Context {
	pub fn new(
		file: File,
		device_path: PathBuf,
		sb: SuperBlock,
		inode_map: Vec<u8>,
		zone_map: Vec<u8>,
		inode_table: Vec<u8>,
		arbiter: Arbiter,
		options: Options,
	) -> Self {
		let layout = Layout::for_variant(sb.version2);
		let ninodes = sb.ninodes as usize;
		let nzones = sb.nzones as usize;
		Self {
			file,
			device_path,
			sb,
			layout,
			inode_map,
			zone_map,
			inode_table,
			inode_count: vec![0u8; ninodes + 1],
			zone_count: vec![0u8; nzones],
			changed: false,
			errors_uncorrected: false,
			arbiter,
			options,
			stats: Stats::default(),
			path_stack: Vec::new(),
		}
	}

	/// Asks a single yes/no question through the arbiter, sticking `errors_uncorrected` whenever
	/// the answer ends up "no" (explicit refusal, automatic default-no, or read-only mode).
	pub fn ask(&mut self, question: &str, default: bool) -> bool {
		let answer = self.arbiter.decide(question, default);
		if !answer {
			self.errors_uncorrected = true;
		}
		answer
	}

	/// Reads block `nr`, raising `errors_uncorrected` and emitting a diagnostic on failure.
	pub fn read_block(&mut self, nr: u32, buf: &mut [u8; BLOCK_SIZE]) -> bool {
		let ok = block_io::read_block(&mut self.file, nr, buf);
		if !ok {
			self.errors_uncorrected = true;
			eprintln!("fsck.minix: unable to read block {nr}");
		}
		ok
	}

	/// Writes block `nr` immediately (used for indirect-block repairs, which are zone data and
	/// not part of the batched superblock/bitmap/inode-table flush).
	pub fn write_block(&mut self, nr: u32, buf: &[u8; BLOCK_SIZE]) -> bool {
		let ok = block_io::write_block(
			&mut self.file,
			nr,
			buf,
			self.sb.first_data_zone as u32,
			self.sb.nzones,
		);
		if !ok {
			self.errors_uncorrected = true;
			eprintln!("fsck.minix: unable to write block {nr}");
		} else {
			self.changed = true;
		}
		ok
	}

	/// Probes whether zone `z` is readable, to distinguish media-bad from logically-unused zones
	/// during reconciliation.
	pub fn bad_zone(&mut self, z: u32) -> bool {
		block_io::bad_zone(&mut self.file, z)
	}

	pub fn inode_in_use(&self, ino: u32) -> bool {
		bitmap::bit(&self.inode_map, ino as usize)
	}

	pub fn set_inode_used(&mut self, ino: u32) {
		bitmap::setbit(&mut self.inode_map, ino as usize);
	}

	pub fn clear_inode_used(&mut self, ino: u32) {
		bitmap::clrbit(&mut self.inode_map, ino as usize);
	}

	fn zone_bit(&self, z: u32) -> usize {
		(z - self.sb.first_data_zone as u32 + 1) as usize
	}

	pub fn zone_in_use(&self, z: u32) -> bool {
		bitmap::bit(&self.zone_map, self.zone_bit(z))
	}

	pub fn set_zone_used(&mut self, z: u32) {
		let bit = self.zone_bit(z);
		bitmap::setbit(&mut self.zone_map, bit);
	}

	pub fn clear_zone_used(&mut self, z: u32) {
		let bit = self.zone_bit(z);
		bitmap::clrbit(&mut self.zone_map, bit);
	}

	/// Decodes inode `ino` (1-based) from the in-memory inode table.
	pub fn get_inode(&self, ino: u32) -> Inode {
		let size = self.sb.inode_size();
		let off = crate::inode::inode_table_offset(&self.sb, ino);
		Inode::decode(&self.inode_table[off..off + size], self.sb.version2)
	}

	/// Patches inode `ino` back into the in-memory inode table. Persisted to disk only by the
	/// final flush, alongside the bitmaps and superblock.
	pub fn set_inode(&mut self, ino: u32, inode: &Inode) {
		let size = self.sb.inode_size();
		let off = crate::inode::inode_table_offset(&self.sb, ino);
		inode.encode(&mut self.inode_table[off..off + size], self.sb.version2);
	}

	pub fn push_path(&mut self, name: &str) {
		self.path_stack.push(name.to_owned());
	}

	pub fn pop_path(&mut self) {
		self.path_stack.pop();
	}

	pub fn current_depth(&self) -> usize {
		self.path_stack.len()
	}

	/// Joined path for `-l` output, suppressed past `MAX_DISPLAY_DEPTH`.
	pub fn path_display(&self) -> String {
		if self.path_stack.len() > MAX_DISPLAY_DEPTH {
			return "/...".to_owned();
		}
		format!("/{}", self.path_stack.join("/"))
	}

	/// Writes the superblock, both bitmaps, and the inode table back to the image.
	pub fn flush(&mut self) -> bool {
		let state = if self.errors_uncorrected {
			crate::superblock::STATE_VALID | crate::superblock::STATE_ERROR
		} else {
			crate::superblock::STATE_VALID
		};
		let sb_block = self.sb.write_back(state);
		let mut ok = block_io::write_meta_block(&mut self.file, crate::superblock::SUPERBLOCK_BLOCK, &sb_block);
		ok &= block_io::write_meta_block(&mut self.file, 2, &self.inode_map);
		ok &= block_io::write_meta_block(
			&mut self.file,
			2 + self.sb.imap_blocks as u32,
			&self.zone_map,
		);
		ok &= block_io::write_meta_block(
			&mut self.file,
			2 + self.sb.imap_blocks as u32 + self.sb.zmap_blocks as u32,
			&self.inode_table,
		);
		ok
	}
}
