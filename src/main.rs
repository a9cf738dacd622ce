use std::env;
use std::fs;
use std::process;

use base64::prelude::*;
use getopts::Options;

use cipherbreak::{aes, xor};

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] FILE", program);
    print!("{}", opts.usage(&brief));
}

/// Breaks a repeating-key XOR ciphertext (base64 file) and prints the key
/// and the plaintext.
fn xorkey(content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = BASE64_STANDARD.decode(content.lines().collect::<String>())?;
    let key = xor::break_repeating(&raw)?;
    println!("key: {}", String::from_utf8_lossy(&key));
    println!("{}", String::from_utf8_lossy(&xor::repeating_xor(&raw, &key)));
    Ok(())
}

/// Picks the single-byte-XOR line out of a file of hex ciphertexts and
/// prints the recovered key and plaintext.
fn singlexor(content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let lines = content
        .lines()
        .map(hex::decode)
        .collect::<Result<Vec<_>, _>>()?;
    let found = xor::detect_single_byte(&lines)?;
    let key = xor::break_single_byte(found)?;
    println!("key: {:#04x}", key);
    println!("{}", String::from_utf8_lossy(&xor::xor_byte(found, key)));
    Ok(())
}

/// Prints the 1-based line numbers of hex ciphertexts that fingerprint as
/// ECB.
fn ecbscan(content: &str) -> Result<(), Box<dyn std::error::Error>> {
    for (idx, line) in content.lines().enumerate() {
        if aes::detect_ecb(&hex::decode(line)?, aes::BLOCK_SIZE) {
            println!("{}", idx + 1);
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt(
        "c",
        "cmd",
        "Command, one of {xorkey,singlexor,ecbscan}.
                 Defaults to xorkey",
        "CMD",
    );
    opts.optflag("h", "help", "Print this help menu");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    if matches.opt_present("h") || matches.free.is_empty() {
        print_usage(&program, &opts);
        return;
    }

    let cmd = matches.opt_str("c").unwrap_or_else(|| "xorkey".to_string());
    let filename = &matches.free[0];

    let content = match fs::read_to_string(filename) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", filename, e);
            process::exit(1);
        }
    };

    let outcome = match cmd.as_str() {
        "xorkey" => xorkey(&content),
        "singlexor" => singlexor(&content),
        "ecbscan" => ecbscan(&content),
        _ => {
            print_usage(&program, &opts);
            process::exit(1);
        }
    };
    if let Err(e) = outcome {
        eprintln!("{}", e);
        process::exit(1);
    }
}
