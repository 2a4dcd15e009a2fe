//! Compares the reconstructed `inode_count`/`zone_count` tables against the on-disk bitmaps and
//! `nlinks`, proposing a fix for every discrepancy through the arbiter.

use crate::context::Context;

/// Runs both sweeps (inodes, then zones) after the walk has populated the count tables.
pub fn reconcile(ctx: &mut Context) {
	reconcile_inodes(ctx);
	reconcile_zones(ctx);
}

fn reconcile_inodes(ctx: &mut Context) {
	for i in 1..=ctx.sb.ninodes {
		let bit_set = ctx.inode_in_use(i);
		let count = ctx.inode_count[i as usize];

		if !bit_set && ctx.options.warn_mode {
			let inode = ctx.get_inode(i);
			if inode.mode != 0 {
				eprintln!("fsck.minix: warning: inode {i} is unused but has mode {:o}", inode.mode);
			}
		}

		if count == 0 && bit_set {
			if ctx.ask(&format!("Inode {i} marked in use but unreferenced, free it"), true) {
				ctx.clear_inode_used(i);
				ctx.changed = true;
			}
		} else if count > 0 && !bit_set {
			if ctx.ask(&format!("Inode {i} in use but not marked in bitmap, mark it"), true) {
				ctx.set_inode_used(i);
				ctx.changed = true;
			}
		}

		if count > 0 {
			let inode = ctx.get_inode(i);
			if inode.nlinks as u32 != count as u32 {
				if ctx.ask(
					&format!("Inode {i} has {} links but {count} entries reference it, correct it", inode.nlinks),
					true,
				) {
					let mut inode = inode;
					inode.nlinks = count as u16;
					ctx.set_inode(i, &inode);
					ctx.changed = true;
				}
			}
		}
	}
}

fn reconcile_zones(ctx: &mut Context) {
	for z in ctx.sb.first_data_zone as u32..ctx.sb.nzones {
		let used = ctx.zone_in_use(z);
		let counted = ctx.zone_count[z as usize] > 0;
		if used == counted {
			continue;
		}

		if !counted && used {
			if ctx.bad_zone(z) {
				// Unreadable: accept silently as media-bad, not a bitmap/accounting defect.
			} else if ctx.ask(&format!("Zone {z} marked in use but not referenced, free it"), true) {
				ctx.clear_zone_used(z);
				ctx.changed = true;
			}
		} else {
			eprintln!("fsck.minix: zone {z} is referenced but the bitmap marks it free");
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::arbiter::Arbiter;
	use crate::context::Options;
	use crate::superblock::{SuperBlock, BLOCK_SIZE};
	use std::io::Write as _;

	fn test_context() -> Context {
		let mut raw = [0u8; BLOCK_SIZE];
		raw[0..2].copy_from_slice(&16u16.to_le_bytes());
		raw[2..4].copy_from_slice(&200u16.to_le_bytes());
		raw[4..6].copy_from_slice(&1u16.to_le_bytes());
		raw[6..8].copy_from_slice(&1u16.to_le_bytes());
		raw[8..10].copy_from_slice(&20u16.to_le_bytes());
		raw[16..18].copy_from_slice(&0x137fu16.to_le_bytes());
		raw[18..20].copy_from_slice(&1u16.to_le_bytes());
		let sb = SuperBlock::decode(raw).unwrap();
		let mut f = tempfile::tempfile().unwrap();
		f.write_all(&vec![0u8; 256 * BLOCK_SIZE]).unwrap();
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

	#[test]
	fn frees_an_unreferenced_but_marked_inode() {
		let mut ctx = test_context();
		ctx.set_inode_used(5);
		reconcile_inodes(&mut ctx);
		assert!(!ctx.inode_in_use(5));
		assert!(ctx.changed);
	}

	#[test]
	fn marks_a_referenced_but_unmarked_inode() {
		let mut ctx = test_context();
		ctx.inode_count[6] = 1;
		reconcile_inodes(&mut ctx);
		assert!(ctx.inode_in_use(6));
		assert!(ctx.changed);
	}

	#[test]
	fn corrects_nlinks_mismatch() {
		let mut ctx = test_context();
		ctx.inode_count[7] = 3;
		ctx.set_inode_used(7);
		reconcile_inodes(&mut ctx);
		assert_eq!(ctx.get_inode(7).nlinks, 3);
	}

	#[test]
	fn frees_an_unreferenced_but_marked_zone() {
		let mut ctx = test_context();
		ctx.set_zone_used(25);
		reconcile_zones(&mut ctx);
		assert!(!ctx.zone_in_use(25));
	}
}
