//! Sequences the whole run: parse → open → decode superblock → load tables → walk → reconcile →
//! report → flush. The CLI front door (`main.rs`) only turns `env::args_os()` into `Args` and
//! maps the returned code through `process::exit`.

use crate::arbiter::{self, Arbiter, RawModeGuard};
use crate::block_io;
use crate::context::{Context, Options};
use crate::inode::Inode;
use crate::mtab;
use crate::reconcile::reconcile;
use crate::superblock::{SuperBlock, BLOCK_SIZE, ROOT_INO, STATE_ERROR, STATE_VALID, SUPERBLOCK_BLOCK};
use crate::walker::recursive_check;
use crate::zone::check_zones;
use std::ffi::OsString;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process;

pub const BIN_NAME: &str = "fsck.minix";
pub const VERSION: &str = "1.0.0";

pub struct Args {
	pub device: PathBuf,
	pub list: bool,
	pub automatic: bool,
	pub repair: bool,
	pub verbose: bool,
	pub show_superblock: bool,
	pub warn_mode: bool,
	pub force: bool,
}

pub enum ParsedArgs {
	Run(Args),
	Help,
	Version,
}

/// Hand-rolled flag parsing over `env::args_os()`, in the style of this codebase's other
/// utilities rather than an argument-parsing crate.
pub fn parse_args<I: IntoIterator<Item = OsString>>(args: I) -> Result<ParsedArgs, String> {
	let mut list = false;
	let mut automatic = false;
	let mut repair = false;
	let mut verbose = true;
	let mut show_superblock = false;
	let mut warn_mode = false;
	let mut force = false;
	let mut device = None;

	for arg in args {
		let s = arg.to_string_lossy().into_owned();
		match s.as_str() {
			"-h" | "--help" => return Ok(ParsedArgs::Help),
			"-V" | "--version" => return Ok(ParsedArgs::Version),
			"-l" => list = true,
			"-a" => {
				automatic = true;
				repair = true;
			}
			"-r" => repair = true,
			"-v" => verbose = true,
			"-s" => show_superblock = true,
			"-m" => warn_mode = true,
			"-f" => force = true,
			_ if s.starts_with('-') && s.len() > 1 => {
				return Err(format!("unknown option: {s}"));
			}
			_ => {
				if device.is_some() {
					return Err("too many arguments".to_owned());
				}
				device = Some(PathBuf::from(s));
			}
		}
	}

	let device = device.ok_or_else(|| "missing device argument".to_owned())?;
	Ok(ParsedArgs::Run(Args {
		device,
		list,
		automatic,
		repair,
		verbose,
		show_superblock,
		warn_mode,
		force,
	}))
}

pub fn print_usage() {
	eprintln!("usage: {BIN_NAME} [-larvsmfV] device");
}

pub fn print_help() {
	print_usage();
	println!();
	println!("  -l  list every file visited");
	println!("  -a  automatic repair (accepts defaults, no questions asked)");
	println!("  -r  interactive repair (device must not be mounted)");
	println!("  -v  verbose summary (default on)");
	println!("  -s  show superblock info before checking");
	println!("  -m  warn about inodes with a mode but marked unused");
	println!("  -f  force the check even if the filesystem is marked clean");
	println!("  -V, --version  print version and exit");
}

pub fn print_version() {
	println!("{BIN_NAME} {VERSION}");
}

/// Prints `msg` to stderr, restoring the terminal first if an interactive run is in progress,
/// then exits with status 8.
pub fn fatal(msg: impl fmt::Display) -> ! {
	arbiter::restore_before_exit();
	eprintln!("{BIN_NAME}: {msg}");
	process::exit(8);
}

fn both_ttys() -> bool {
	unsafe { libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0 }
}

/// Runs the full check/repair sequence and returns the exit-code contribution from
/// `changed`/`errors_uncorrected` (the base 0/3/4/7 part; fatal paths exit directly with 8).
pub fn run(args: &Args) -> i32 {
	if mtab::is_mounted(&args.device) {
		if !both_ttys() {
			fatal("device is mounted and no tty is available to confirm, aborting");
		}
		print!("{} is mounted; continue anyway (y/n)? ", args.device.display());
		let _ = std::io::stdout().flush();
		let mut line = String::new();
		if std::io::stdin().read_line(&mut line).is_err() || !line.trim().eq_ignore_ascii_case("y") {
			fatal("device is mounted, aborting");
		}
	}

	let mut file = OpenOptions::new()
		.read(true)
		.write(args.repair)
		.open(&args.device)
		.unwrap_or_else(|e| fatal(format!("cannot open {}: {e}", args.device.display())));

	let mut raw = [0u8; BLOCK_SIZE];
	if file
		.seek(SeekFrom::Start(SUPERBLOCK_BLOCK as u64 * BLOCK_SIZE as u64))
		.and_then(|_| file.read_exact(&mut raw))
		.is_err()
	{
		fatal("cannot read superblock");
	}
	let mut sb = SuperBlock::decode(raw).unwrap_or_else(|e| fatal(e));

	if args.show_superblock {
		print_superblock(&sb);
	}

	if !args.force && (sb.state & STATE_VALID != 0) && (sb.state & STATE_ERROR == 0) {
		println!("{}: clean", args.device.display());
		return 0;
	}

	let first_zone_mismatch = sb.norm_first_zone() != sb.first_data_zone as u32;
	if first_zone_mismatch {
		eprintln!(
			"{BIN_NAME}: first_data_zone {} does not match the computed {}",
			sb.first_data_zone,
			sb.norm_first_zone()
		);
	}

	let inode_map_start = 2u32;
	let zone_map_start = inode_map_start + sb.imap_blocks as u32;
	let inode_table_start = zone_map_start + sb.zmap_blocks as u32;

	let inode_map = block_io::read_meta_blocks(&mut file, inode_map_start, sb.imap_blocks as u32)
		.unwrap_or_else(|_| fatal("cannot read inode bitmap"));
	let zone_map = block_io::read_meta_blocks(&mut file, zone_map_start, sb.zmap_blocks as u32)
		.unwrap_or_else(|_| fatal("cannot read zone bitmap"));
	let inode_table = block_io::read_meta_blocks(&mut file, inode_table_start, sb.inode_blocks())
		.unwrap_or_else(|_| fatal("cannot read inode table"));

	let root_size = sb.inode_size();
	let root_off = ROOT_INO as usize * root_size;
	let root_probe = Inode::decode(&inode_table[root_off..root_off + root_size], sb.version2);
	if root_probe.zones[0] != 0 {
		let mut root_block = [0u8; BLOCK_SIZE];
		if block_io::read_block(&mut file, root_probe.zones[0], &mut root_block) {
			sb.probe_dirsize(&root_block);
		}
	}

	let interactive = args.repair && !args.automatic;
	let _raw_guard =
		RawModeGuard::enter(interactive).unwrap_or_else(|e| fatal(format!("cannot enter raw terminal mode: {e}")));

	let arbiter = if !args.repair {
		Arbiter::ReadOnly
	} else if args.automatic {
		Arbiter::Automatic
	} else {
		Arbiter::Interactive
	};

	let options = Options {
		list: args.list,
		repair: args.repair,
		verbose: args.verbose,
		show_superblock: args.show_superblock,
		warn_mode: args.warn_mode,
		force: args.force,
	};

	let mut ctx = Context::new(
		file,
		args.device.clone(),
		sb,
		inode_map,
		zone_map,
		inode_table,
		arbiter,
		options,
	);

	let mut root_inode = ctx.get_inode(ROOT_INO);
	if !root_inode.is_dir() {
		fatal("root inode is not a directory");
	}

	if first_zone_mismatch {
		ctx.errors_uncorrected = true;
	}

	ctx.inode_count[ROOT_INO as usize] = 1;
	ctx.stats.directories = 1;
	check_zones(&mut ctx, ROOT_INO, &mut root_inode);
	recursive_check(&mut ctx, ROOT_INO);
	reconcile(&mut ctx);

	if ctx.options.verbose {
		print_summary(&ctx);
	}

	if ctx.changed || ctx.options.repair {
		if !ctx.flush() {
			eprintln!("{BIN_NAME}: warning: failed to write repairs back to disk");
			ctx.errors_uncorrected = true;
		}
	}

	3 * (ctx.changed as i32) + 4 * (ctx.errors_uncorrected as i32)
}

fn print_superblock(sb: &SuperBlock) {
	println!("ninodes       {}", sb.ninodes);
	println!("nzones        {}", sb.nzones);
	println!("imap_blocks   {}", sb.imap_blocks);
	println!("zmap_blocks   {}", sb.zmap_blocks);
	println!("firstdatazone {}", sb.first_data_zone);
	println!("zonesize      {}", 1u32 << sb.log_zone_size);
	println!("maxsize       {}", utils::util::ByteSize(sb.max_size as u64));
	println!("magic         {:#06x}", sb.magic);
}

fn print_summary(ctx: &Context) {
	let used_inodes = (1..=ctx.sb.ninodes).filter(|&i| ctx.inode_in_use(i)).count() as u64;
	let used_zones = (ctx.sb.first_data_zone as u32..ctx.sb.nzones)
		.filter(|&z| ctx.zone_in_use(z))
		.count() as u64;
	let total_entries: u64 = (1..=ctx.sb.ninodes).map(|i| ctx.inode_count[i as usize] as u64).sum();

	println!(
		"{} inodes used ({:.2}%)",
		used_inodes,
		pct(used_inodes, ctx.sb.ninodes as u64)
	);
	println!(
		"{} zones used ({:.2}%)",
		used_zones,
		pct(used_zones, (ctx.sb.nzones - ctx.sb.first_data_zone as u32) as u64)
	);
	println!(
		"{} regular files, {} directories, {} character devices, {} block devices",
		ctx.stats.regular, ctx.stats.directories, ctx.stats.chardev, ctx.stats.blockdev
	);
	println!(
		"{} symlinks, {} sockets, {} fifos, {} unknown",
		ctx.stats.symlinks, ctx.stats.sockets, ctx.stats.fifos, ctx.stats.unknown
	);
	let discount = 2 * ctx.stats.directories.saturating_sub(1);
	println!("{} links", total_entries.saturating_sub(discount));
}

fn pct(used: u64, total: u64) -> f64 {
	if total == 0 {
		0.0
	} else {
		used as f64 * 100.0 / total as f64
	}
}
