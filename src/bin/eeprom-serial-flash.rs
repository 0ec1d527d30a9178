#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate eeprom_serial_flash;
use eeprom_serial_flash::*;

use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::process::exit;
use std::time::Duration;

use eeprom_serial_flash::emulator::Emulator;
use eeprom_serial_flash::protocol::{
	Channel,
	Client,
};
use eeprom_serial_flash::transport::{
	self,
	SerialConfig,
};

const DEMO_TEXT: &[u8] = b"I am a big reasonable sentence.";

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_param_or<T>(matches: &clap::ArgMatches, name: &str, default: T) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	if matches.is_present(name) {
		get_param(matches, name)
	} else {
		Ok(default)
	}
}

// decimal or 0x-prefixed hex
fn get_address(matches: &clap::ArgMatches, name: &str) -> AResult<u16> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => return Ok(0),
	};
	let parsed = if param.starts_with("0x") || param.starts_with("0X") {
		u16::from_str_radix(&param[2..], 16)
	} else {
		param.parse::<u16>()
	};
	parsed.map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid address {:?}: {}", param, e);
		e.context(msg).into()
	})
}

fn serial_config(matches: &clap::ArgMatches) -> AResult<SerialConfig> {
	let defaults = SerialConfig::default();
	let timeout_ms = get_param_or(matches, "timeout", defaults.read_timeout.as_millis() as u64)?;
	Ok(SerialConfig {
		port: matches.value_of("port").map(String::from).unwrap_or(defaults.port),
		baud_rate: get_param_or(matches, "baud", defaults.baud_rate)?,
		read_timeout: Duration::from_millis(timeout_ms),
	})
}

fn print_hex(address: u16, data: &[u8]) {
	for i in 0..data.len() {
		if 0 == i % 16 {
			print!("{:04x} ", address as usize + i);
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", data[i]);
		if 15 == i % 16 {
			println!("");
		}
	}
	if 0 != data.len() % 16 {
		println!("");
	}
}

fn write_page<C: Channel>(client: &mut Client<C>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;
	let payload = if let Some(text) = sub_m.value_of("text") {
		text.as_bytes().to_vec()
	} else if let Some(path) = sub_m.value_of("FILE") {
		with_file_context(path, fs::read(path))?
	} else {
		let mut buf = Vec::new();
		io::stdin().read_to_end(&mut buf)?;
		buf
	};
	ensure!(payload.len() <= MAX_PAGE_LENGTH, "Page too long: {} bytes (at most {})", payload.len(), MAX_PAGE_LENGTH);

	client.write_page(address, &payload)?;
	info!("Wrote {} bytes at 0x{:04x}", payload.len(), address);

	if sub_m.is_present("verify") {
		let data = client.read_data(address, payload.len())?;
		for i in 0..payload.len() {
			ensure!(data[i] == payload[i],
				"Verify failed at {:04x}: expected {:02x}, device has {:02x}", address as usize + i, payload[i], data[i]
			);
		}
		info!("Verified {} bytes at 0x{:04x}", payload.len(), address);
	}

	Ok(())
}

fn with_file_context<T>(path: &str, r: io::Result<T>) -> AResult<T> {
	r.map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("Couldn't read {}: {}", path, e);
		e.context(msg).into()
	})
}

fn read_data<C: Channel>(client: &mut Client<C>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;
	let length: usize = get_param(sub_m, "LENGTH")?;
	ensure!(length <= MAX_PAGE_LENGTH, "Can't read more than {} bytes at once", MAX_PAGE_LENGTH);

	let data = client.read_data(address, length)?;
	if sub_m.is_present("raw") {
		io::stdout().write_all(&data)?;
	} else {
		print_hex(address, &data);
	}

	Ok(())
}

fn demo<C: Channel>(client: &mut Client<C>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;

	client.write_page(address, DEMO_TEXT)?;
	let data = client.read_data(address, DEMO_TEXT.len())?;
	println!("{}", String::from_utf8_lossy(&data));

	Ok(())
}

fn dispatch<C: Channel>(client: &mut Client<C>, matches: &clap::ArgMatches) -> AResult<()> {
	match matches.subcommand() {
		("write", Some(sub_m)) => {
			write_page(client, sub_m)
		},
		("read", Some(sub_m)) => {
			read_data(client, sub_m)
		},
		("demo", Some(sub_m)) => {
			demo(client, sub_m)
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg port: -p --port +takes_value "serial port of the programmer (default: COM4)")
		(@arg baud: -b --baud +takes_value "baud rate (default: 115200)")
		(@arg timeout: -t --timeout +takes_value "read timeout in milliseconds (default: 1000)")
		(@arg emulate: --emulate "talk to an emulated in-memory device instead of a serial port")
		(@subcommand write =>
			(about: "write a page (at most 255 bytes)")
			(@arg text: --text +takes_value "write TEXT instead of FILE contents")
			(@arg verify: --verify "read page back and compare")
			(@arg ADDRESS: +required "start address (decimal or 0x-prefixed hex)")
			(@arg FILE: "file with page data (default: stdin)")
		)
		(@subcommand read =>
			(about: "read bytes and print them as hex dump")
			(@arg raw: --raw "write bytes as binary to stdout")
			(@arg ADDRESS: +required "start address (decimal or 0x-prefixed hex)")
			(@arg LENGTH: +required "number of bytes (at most 255)")
		)
		(@subcommand demo =>
			(about: "write a test sentence, read it back and print it")
			(@arg ADDRESS: "start address (default: 0)")
		)
	).get_matches();

	if matches.is_present("emulate") {
		let mut client = Client::new(Emulator::new());
		return dispatch(&mut client, &matches);
	}

	let config = serial_config(&matches)?;
	let mut channel = transport::open(&config)?;
	let mut client = Client::new(&mut channel);
	dispatch(&mut client, &matches)
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
