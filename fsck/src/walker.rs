//! Recursive directory-tree traversal. Reconstructs `inode_count`/`zone_count` by decoding every
//! directory entry reachable from the root and recursing into subdirectories exactly once.

use crate::context::Context;
use crate::inode::{Inode, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFREG, S_IFSOCK};
use crate::pointer::map_zone;
use crate::superblock::BLOCK_SIZE;
use crate::zone::check_zones;

/// Walks directory `ino`, checking every entry in its data blocks and recursing into every
/// subdirectory visited for the first time.
pub fn recursive_check(ctx: &mut Context, ino: u32) {
	let mut dir_inode = ctx.get_inode(ino);
	let dirsize = ctx.sb.dirsize as u64;

	if (dir_inode.size as u64) < 2 * dirsize {
		ctx.errors_uncorrected = true;
		eprintln!("fsck.minix: directory (inode {ino}) is too short");
	}

	let mut offset = 0u64;
	while offset + dirsize <= dir_inode.size as u64 {
		check_file(ctx, ino, &mut dir_inode, offset);
		offset += dirsize;
	}
}

fn check_file(ctx: &mut Context, dir_ino: u32, dir_inode: &mut Inode, offset: u64) {
	let block_index = offset / BLOCK_SIZE as u64;
	let zone = map_zone(ctx, dir_ino, dir_inode, block_index);
	let mut block = [0u8; BLOCK_SIZE];
	if !ctx.read_block(zone, &mut block) {
		return;
	}

	let dirsize = ctx.sb.dirsize;
	let namelen = ctx.sb.namelen;
	let pos = (offset % BLOCK_SIZE as u64) as usize;
	let mut ino = u16::from_le_bytes([block[pos], block[pos + 1]]) as u32;
	let name_off = pos + 2;
	let name = entry_name(&block[name_off..name_off + namelen]);

	if ino > ctx.sb.ninodes {
		if ctx.ask("Directory entry has an inode number out of range, clear it", true) {
			block[pos..pos + 2].fill(0);
			block[name_off..name_off + namelen].fill(0);
			ctx.write_block(zone, &block);
			ino = 0;
		}
	}

	if offset == 0 && name != "." {
		ctx.errors_uncorrected = true;
		eprintln!("fsck.minix: '.' isn't first in directory (inode {dir_ino})");
	}
	if offset == dirsize as u64 && name != ".." {
		ctx.errors_uncorrected = true;
		eprintln!("fsck.minix: '..' isn't second in directory (inode {dir_ino})");
	}

	if ino == 0 || ino > ctx.sb.ninodes {
		return;
	}

	ctx.push_path(&name);

	let first_visit = ctx.inode_count[ino as usize] == 0;
	let mut file_inode = ctx.get_inode(ino);

	if first_visit {
		classify(ctx, &file_inode);
		if !ctx.inode_in_use(ino) {
			if ctx.ask("Inode is marked not in use but is referenced, mark it in use", true) {
				ctx.set_inode_used(ino);
				ctx.changed = true;
			}
		}
	}

	if ctx.inode_count[ino as usize] < u8::MAX {
		ctx.inode_count[ino as usize] += 1;
	} else {
		ctx.errors_uncorrected = true;
	}
	let is_first_reference = ctx.inode_count[ino as usize] == 1;

	let ft = file_inode.file_type();
	if is_first_reference && matches!(ft, S_IFREG | S_IFDIR | S_IFLNK) {
		check_zones(ctx, ino, &mut file_inode);
	}

	if ctx.options.list {
		println!(
			"{:>6} {:>6o} {:>3} {}",
			ino,
			file_inode.mode,
			file_inode.nlinks,
			ctx.path_display()
		);
	}

	if is_first_reference && file_inode.is_dir() {
		recursive_check(ctx, ino);
	}

	ctx.pop_path();
}

/// Tallies `inode` into the verbose-summary stats and warns on an unrecognized file-type bit
/// pattern. Only called on an inode's first visit.
fn classify(ctx: &mut Context, inode: &Inode) {
	match inode.file_type() {
		S_IFREG => ctx.stats.regular += 1,
		S_IFDIR => ctx.stats.directories += 1,
		S_IFCHR => ctx.stats.chardev += 1,
		S_IFBLK => ctx.stats.blockdev += 1,
		S_IFLNK => ctx.stats.symlinks += 1,
		S_IFSOCK => ctx.stats.sockets += 1,
		S_IFIFO => ctx.stats.fifos += 1,
		other => {
			ctx.stats.unknown += 1;
			eprintln!("fsck.minix: warning: unknown file type {other:#o}");
		}
	}
}

fn entry_name(raw: &[u8]) -> String {
	let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
	String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::arbiter::Arbiter;
	use crate::context::Options;
	use crate::inode::S_IFDIR;
	use crate::superblock::{SuperBlock, ROOT_INO};
	use std::io::Write as _;

	fn test_context() -> Context {
		let mut raw = [0u8; BLOCK_SIZE];
		raw[0..2].copy_from_slice(&16u16.to_le_bytes());
		raw[2..4].copy_from_slice(&2000u16.to_le_bytes());
		raw[4..6].copy_from_slice(&1u16.to_le_bytes());
		raw[6..8].copy_from_slice(&1u16.to_le_bytes());
		raw[8..10].copy_from_slice(&20u16.to_le_bytes());
		raw[16..18].copy_from_slice(&0x137fu16.to_le_bytes());
		raw[18..20].copy_from_slice(&1u16.to_le_bytes());
		let sb = SuperBlock::decode(raw).unwrap();
		let mut f = tempfile::tempfile().unwrap();
		f.write_all(&vec![0u8; 2048 * BLOCK_SIZE]).unwrap();
		Context::new(
			f,
			"test".into(),
			sb,
			vec![0u8; BLOCK_SIZE],
			vec![0u8; BLOCK_SIZE],
			vec![0u8; BLOCK_SIZE * 4],
			Arbiter::Automatic,
			Options::default(),
		)
	}

	fn write_dirent(block: &mut [u8], pos: usize, ino: u16, name: &str) {
		block[pos..pos + 2].copy_from_slice(&ino.to_le_bytes());
		let name_bytes = name.as_bytes();
		block[pos + 2..pos + 2 + name_bytes.len()].copy_from_slice(name_bytes);
	}

	#[test]
	fn walks_a_single_level_directory_with_dot_entries() {
		let mut ctx = test_context();
		let mut root = ctx.get_inode(ROOT_INO);
		root.mode = S_IFDIR | 0o755;
		root.size = 3 * 16;
		root.zones[0] = 21;
		ctx.set_inode(ROOT_INO, &root);

		let mut block = [0u8; BLOCK_SIZE];
		write_dirent(&mut block, 0, 1, ".");
		write_dirent(&mut block, 16, 1, "..");
		write_dirent(&mut block, 32, 2, "file.txt");
		ctx.write_block(21, &block);

		let mut child = ctx.get_inode(2);
		child.mode = S_IFREG_TEST;
		ctx.set_inode(2, &child);
		child.zones[0] = 30;
		ctx.set_inode(2, &child);

		ctx.inode_count[ROOT_INO as usize] = 1;
		recursive_check(&mut ctx, ROOT_INO);

		assert_eq!(ctx.inode_count[1], 3); // ".", "..", plus pre-seeded root visit
		assert_eq!(ctx.inode_count[2], 1);
		assert_eq!(ctx.stats.regular, 1);
	}

	const S_IFREG_TEST: u16 = crate::inode::S_IFREG | 0o644;
}
