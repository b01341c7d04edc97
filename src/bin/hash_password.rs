#![cfg(not(tarpaulin_include))]

use sheetdrive::login::hash_password;
use std::io::{self, BufRead};

/// Read a password from the first line of stdin and print its argon2 hash,
/// ready to paste into `password_hash` in `sheetdrive.toml`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);

    if password.is_empty() {
        return Err("password cannot be empty".into());
    }

    println!("{}", hash_password(password)?);
    Ok(())
}
