//! Command line diagnostics for the border router link.
//!
//! Encodes, decodes, and checksums frames from hex on the command line, for
//! bench work against a live peer or captured byte streams:
//!
//! ```text
//! $ brlink encode "01 7e 7d 02"
//! 7e017d5e7d5d0208137e
//! $ brlink decode 7e017d5e7d5d0208137e
//! 017e7d02
//! $ brlink crc "01 7e 7d 02"
//! 0x1308
//! ```

use std::process;

use brlink_framing::{crc, encode, FrameDecoder};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "brlink", about = "Border router link frame diagnostics", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a payload into its wire frame.
    Encode {
        /// Payload bytes as hex; whitespace is ignored.
        payload: String,
    },
    /// Decode a wire byte stream, printing every recovered payload.
    Decode {
        /// Wire bytes as hex; whitespace is ignored.
        stream: String,
    },
    /// Print the complemented CRC-16/X-25 over a payload.
    Crc {
        /// Payload bytes as hex; whitespace is ignored.
        payload: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Encode { payload } => {
            let payload = parse_hex(&payload)?;
            println!("{}", hex::encode(encode(&payload)));
        }
        Command::Decode { stream } => {
            let stream = parse_hex(&stream)?;
            let mut decoder = FrameDecoder::new();
            let mut count = 0usize;
            for &byte in &stream {
                match decoder.feed(byte) {
                    Ok(Some(frame)) => {
                        count += 1;
                        println!("{}", hex::encode(&frame));
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("discarded frame: {e}"),
                }
            }
            if count == 0 {
                return Err("no complete frame in stream".into());
            }
        }
        Command::Crc { payload } => {
            let payload = parse_hex(&payload)?;
            println!("0x{:04X}", crc::checksum(&payload));
        }
    }
    Ok(())
}

fn parse_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact)
}
