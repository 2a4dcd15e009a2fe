//! A consistency checker for a classic Minix-style on-disk filesystem: superblock, inode/zone
//! bitmaps, inode table, and data zones. Walks the directory tree from the root inode,
//! reconstructs reference counts, and reconciles them against the on-disk bitmaps and `nlinks`,
//! repairing discrepancies under a read-only/automatic/interactive policy.

pub mod arbiter;
pub mod bitmap;
pub mod block_io;
pub mod context;
pub mod driver;
pub mod inode;
pub mod mtab;
pub mod pointer;
pub mod reconcile;
pub mod superblock;
pub mod walker;
pub mod zone;
