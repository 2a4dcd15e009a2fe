use fsck::driver::{self, ParsedArgs};
use std::env;
use std::process::exit;

fn main() {
	let args: Vec<_> = env::args_os().skip(1).collect();
	match driver::parse_args(args) {
		Ok(ParsedArgs::Help) => {
			driver::print_help();
			exit(0);
		}
		Ok(ParsedArgs::Version) => {
			driver::print_version();
			exit(0);
		}
		Ok(ParsedArgs::Run(parsed)) => {
			let code = driver::run(&parsed);
			exit(code);
		}
		Err(msg) => {
			eprintln!("{}: {msg}", driver::BIN_NAME);
			driver::print_usage();
			exit(16);
		}
	}
}
