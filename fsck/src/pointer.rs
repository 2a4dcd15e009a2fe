//! Maps (inode, logical block #) to a physical zone number, following direct, indirect,
//! double-indirect, and (v2) triple-indirect pointers through one variant-polymorphic walker
//! parameterized by `Layout` rather than duplicated per inode variant.

use crate::context::Context;
use crate::inode::{Inode, DIRECT_ZONES};
use crate::superblock::BLOCK_SIZE;

/// Validates a raw zone-pointer slot. A slot is valid if it's 0 (empty) or falls within
/// `[first_data_zone, nzones)`. Returns `(value_to_use, should_zero_in_backing_storage)`: on an
/// out-of-range slot the caller is asked whether to zero it; declining still treats the slot as
/// empty for this run without touching the disk.
pub fn check_zone_nr(ctx: &mut Context, slot: u32) -> (u32, bool) {
	if slot == 0 {
		return (0, false);
	}
	let first = ctx.sb.first_data_zone as u32;
	if slot >= first && slot < ctx.sb.nzones {
		return (slot, false);
	}
	if ctx.ask("Zone number out of range", true) {
		ctx.changed = true;
		(0, true)
	} else {
		(0, false)
	}
}

/// Resolves logical block `k` of `inode` (inode number `ino`, needed only to patch the inode
/// table in place if a direct slot turns out corrupt) to a physical zone number.
pub fn map_zone(ctx: &mut Context, ino: u32, inode: &mut Inode, k: u64) -> u32 {
	let direct = DIRECT_ZONES as u64;
	if k < direct {
		let i = k as usize;
		let (zone, bad) = check_zone_nr(ctx, inode.zones[i]);
		if bad {
			inode.zones[i] = 0;
			ctx.set_inode(ino, inode);
		}
		return zone;
	}

	let layout = ctx.layout;
	let epb = layout.entries_per_block as u64;
	let mut idx = k - direct;
	let mut level_size = epb;
	let mut level = 1usize;
	while level <= layout.indirect_levels {
		if idx < level_size {
			break;
		}
		idx -= level_size;
		level_size *= epb;
		level += 1;
	}
	if level > layout.indirect_levels {
		return 0;
	}

	let top_slot = DIRECT_ZONES + level - 1;
	let (mut ptr, bad) = check_zone_nr(ctx, inode.zones[top_slot]);
	if bad {
		inode.zones[top_slot] = 0;
		ctx.set_inode(ino, inode);
	}
	if ptr == 0 {
		return 0;
	}

	let mut remaining = level;
	loop {
		let mut block = [0u8; BLOCK_SIZE];
		if !ctx.read_block(ptr, &mut block) {
			return 0;
		}
		let per_child = epb.pow((remaining - 1) as u32);
		let child_index = (idx / per_child) as usize;
		let child_remainder = idx % per_child;
		let raw_child = layout.read_slot(&block, child_index);
		let (child, child_bad) = check_zone_nr(ctx, raw_child);
		if child_bad {
			layout.write_slot(&mut block, child_index, 0);
			ctx.write_block(ptr, &block);
		}
		if remaining == 1 {
			return child;
		}
		if child == 0 {
			return 0;
		}
		ptr = child;
		idx = child_remainder;
		remaining -= 1;
	}
}
