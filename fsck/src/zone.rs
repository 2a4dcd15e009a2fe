//! Records that a physical zone is referenced by the inode currently under the walker, detecting
//! double-allocation and bitmap desync as it goes.

use crate::context::Context;
use crate::inode::{Inode, DIRECT_ZONES};
use crate::pointer::check_zone_nr;
use crate::superblock::BLOCK_SIZE;

/// Claims `zone` on behalf of the inode being walked. Returns 0 if the slot was empty to begin
/// with; the caller doesn't otherwise act on the return value (unlike `map_zone`, this never
/// needs to report the zone back up, since it's called purely for its side effects on
/// `zone_count`/`zone_map`).
fn add_zone(ctx: &mut Context, zone: u32) -> u32 {
	if zone == 0 {
		return 0;
	}
	let idx = zone as usize;
	if ctx.zone_count[idx] > 0 {
		if ctx.ask("Zone already in use by another file, clear this reference", true) {
			return 0;
		}
	} else if !ctx.zone_in_use(zone) {
		if ctx.ask("Zone in use but not marked in the zone bitmap, mark it", true) {
			ctx.set_zone_used(zone);
			ctx.changed = true;
		}
	}
	if ctx.zone_count[idx] < u8::MAX {
		ctx.zone_count[idx] += 1;
	} else {
		ctx.errors_uncorrected = true;
	}
	zone
}

/// Walks every direct and indirect slot of `inode`, accounting for each zone it claims. Called
/// once per inode, on first visit only (the walker's cycle guard ensures this).
pub fn check_zones(ctx: &mut Context, ino: u32, inode: &mut Inode) {
	for i in 0..DIRECT_ZONES {
		let (zone, bad) = check_zone_nr(ctx, inode.zones[i]);
		if bad {
			inode.zones[i] = 0;
			ctx.set_inode(ino, inode);
		}
		if zone != 0 && add_zone(ctx, zone) == 0 {
			inode.zones[i] = 0;
			ctx.set_inode(ino, inode);
		}
	}

	let layout = ctx.layout;
	for level in 1..=layout.indirect_levels {
		let slot = DIRECT_ZONES + level - 1;
		let (ptr, bad) = check_zone_nr(ctx, inode.zones[slot]);
		if bad {
			inode.zones[slot] = 0;
			ctx.set_inode(ino, inode);
		}
		let claimed = ptr != 0 && add_zone(ctx, ptr) != 0;
		if ptr != 0 && !claimed {
			inode.zones[slot] = 0;
			ctx.set_inode(ino, inode);
		}
		if claimed {
			check_zones_indirect(ctx, ptr, level);
		}
	}
}

/// Recurses one indirection level down from `block_nr`, accounting for every pointer it holds.
/// `level == 1` means the entries are data zones directly; otherwise they're pointers to the
/// next nested indirect block.
fn check_zones_indirect(ctx: &mut Context, block_nr: u32, level: usize) {
	let layout = ctx.layout;
	let mut block = [0u8; BLOCK_SIZE];
	if !ctx.read_block(block_nr, &mut block) {
		return;
	}
	let mut block_changed = false;
	for i in 0..layout.entries_per_block {
		let raw = layout.read_slot(&block, i);
		let (mut val, bad) = check_zone_nr(ctx, raw);
		if bad {
			layout.write_slot(&mut block, i, 0);
			block_changed = true;
		}
		if val != 0 && add_zone(ctx, val) == 0 {
			layout.write_slot(&mut block, i, 0);
			block_changed = true;
			val = 0;
		}
		if level > 1 && val != 0 {
			check_zones_indirect(ctx, val, level - 1);
		}
	}
	if block_changed {
		ctx.write_block(block_nr, &block);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::arbiter::Arbiter;
	use crate::context::Options;
	use crate::superblock::SuperBlock;
	use std::io::Write as _;

	fn test_context() -> Context {
		let mut raw = [0u8; BLOCK_SIZE];
		raw[0..2].copy_from_slice(&16u16.to_le_bytes());
		raw[2..4].copy_from_slice(&2000u16.to_le_bytes());
		raw[4..6].copy_from_slice(&1u16.to_le_bytes());
		raw[6..8].copy_from_slice(&1u16.to_le_bytes());
		raw[8..10].copy_from_slice(&6u16.to_le_bytes());
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

	#[test]
	fn claims_direct_zones_and_marks_bitmap() {
		let mut ctx = test_context();
		let mut inode = ctx.get_inode(2);
		inode.zones[0] = 10;
		inode.zones[1] = 11;
		check_zones(&mut ctx, 2, &mut inode);
		assert_eq!(ctx.zone_count[10], 1);
		assert_eq!(ctx.zone_count[11], 1);
		assert!(ctx.zone_in_use(10));
		assert!(ctx.zone_in_use(11));
	}

	#[test]
	fn double_claim_is_cleared_under_automatic_repair() {
		let mut ctx = test_context();
		let mut a = ctx.get_inode(2);
		a.zones[0] = 42;
		check_zones(&mut ctx, 2, &mut a);
		let mut b = ctx.get_inode(3);
		b.zones[0] = 42;
		check_zones(&mut ctx, 3, &mut b);
		// Automatic arbiter accepts the clear-reference default, so the second claim backs off.
		assert_eq!(ctx.zone_count[42], 1);
	}
}
