//! Turning credential flags into [`Credentials`].

use anyhow::{bail, Context, Result};
use bulkfetch_core::task::Credentials;
use std::io::{self, BufRead};

use super::CredentialArgs;

pub fn resolve(args: &CredentialArgs) -> Result<Credentials> {
    if args.password_stdin {
        let stdin = io::stdin();
        return from_reader(&args.user, stdin.lock());
    }
    match &args.password {
        Some(pw) => Ok(Credentials::new(args.user.clone(), pw.clone())),
        None => bail!("a password is required (--password or --password-stdin)"),
    }
}

/// First line of `reader`, without the line terminator, as the password.
pub(super) fn from_reader<R: BufRead>(user: &str, mut reader: R) -> Result<Credentials> {
    let mut line = String::new();
    reader.read_line(&mut line).context("reading password from stdin")?;
    let password = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if password.is_empty() {
        bail!("empty password on stdin");
    }
    Ok(Credentials::new(user, password))
}
