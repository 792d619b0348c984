//! Password intake.

use crate::cli::credentials::from_reader;
use std::io::Cursor;

#[test]
fn stdin_password_strips_line_ending() {
    let creds = from_reader("u", Cursor::new("s3cret pass\r\nignored\n")).unwrap();
    assert_eq!(creds.username, "u");
    assert_eq!(creds.password, "s3cret pass");
}

#[test]
fn empty_stdin_is_rejected() {
    assert!(from_reader("u", Cursor::new("")).is_err());
    assert!(from_reader("u", Cursor::new("\n")).is_err());
}
