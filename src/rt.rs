//! The C-callable runtime for compiled Tiger programs.
//!
//! Generated code reaches these primitives through their `__`-prefixed
//! symbols; the crate also builds as a static library so objects produced
//! from the emitted IR can link against them.  Strings are NUL-terminated
//! byte strings.  Every string returned here is deliberately leaked: Tiger
//! has no garbage collector.

use std::cmp::Ordering;
use std::ffi::CStr;
use std::io::{Read, Write};
use std::os::raw::c_char;

/// An empty Tiger string.
static EMPTY: &[u8] = b"\0";

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

/// Read the bytes of a NUL-terminated string.
unsafe fn bytes<'a>(s: *const c_char) -> &'a [u8] {
    CStr::from_ptr(s).to_bytes()
}

/// Leak a byte string, returning it NUL-terminated.
fn leak(mut bytes: Vec<u8>) -> *const c_char {
    bytes.push(0);
    Box::leak(bytes.into_boxed_slice()).as_ptr() as *const c_char
}

/// Print a string and a newline to standard error.
#[no_mangle]
pub unsafe extern "C" fn __print_err(s: *const c_char) {
    let mut err = std::io::stderr();
    let _ = err.write_all(bytes(s));
    let _ = err.write_all(b"\n");
}

/// Print a string and a newline to standard output.
#[no_mangle]
pub unsafe extern "C" fn __print(s: *const c_char) {
    let mut out = std::io::stdout();
    let _ = out.write_all(bytes(s));
    let _ = out.write_all(b"\n");
}

/// Print an integer, without a newline.
#[no_mangle]
pub extern "C" fn __print_int(i: i32) {
    print!("{i}");
}

/// Flush standard output.
#[no_mangle]
pub extern "C" fn __flush() {
    let _ = std::io::stdout().flush();
}

/// Read one character from standard input, or `""` at end of input.
#[no_mangle]
pub extern "C" fn __getchar() -> *const c_char {
    let mut byte = [0u8; 1];
    match std::io::stdin().read(&mut byte) {
        Ok(1) if byte[0] != 0 => leak(vec![byte[0]]),
        _ => EMPTY.as_ptr() as *const c_char,
    }
}

/// The code of the first character of a string, or -1 if it is empty.
#[no_mangle]
pub unsafe extern "C" fn __ord(s: *const c_char) -> i32 {
    match bytes(s).first() {
        Some(&byte) => byte as i32,
        None => -1,
    }
}

/// The one-character string of a character code; `0` yields `""`.
#[no_mangle]
pub extern "C" fn __chr(i: i32) -> *const c_char {
    if i == 0 {
        return EMPTY.as_ptr() as *const c_char;
    }
    if !(0..=255).contains(&i) {
        fatal("chr: character code out of range [0;255]");
    }
    leak(vec![i as u8])
}

/// The length of a string.
#[no_mangle]
pub unsafe extern "C" fn __size(s: *const c_char) -> i32 {
    match i32::try_from(bytes(s).len()) {
        Ok(size) => size,
        Err(_) => fatal("size: string too large"),
    }
}

/// The substring of `s` starting at `first` with `length` characters.
#[no_mangle]
pub unsafe extern "C" fn __substring(
    s: *const c_char,
    first: i32,
    length: i32,
) -> *const c_char {
    let s = bytes(s);
    if first < 0 || length < 0
        || i64::from(first) + i64::from(length) > s.len() as i64
    {
        fatal("substring: arguments out of range");
    }

    let first = first as usize;
    let length = length as usize;
    leak(s[first..first + length].to_vec())
}

/// The concatenation of two strings.
#[no_mangle]
pub unsafe extern "C" fn __concat(
    a: *const c_char,
    b: *const c_char,
) -> *const c_char {
    let mut joined = bytes(a).to_vec();
    joined.extend_from_slice(bytes(b));
    leak(joined)
}

/// Compare two strings, normalized to -1, 0 or 1.
#[no_mangle]
pub unsafe extern "C" fn __strcmp(a: *const c_char, b: *const c_char) -> i32 {
    match bytes(a).cmp(bytes(b)) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Whether two strings are equal.
#[no_mangle]
pub unsafe extern "C" fn __streq(a: *const c_char, b: *const c_char) -> i32 {
    (bytes(a) == bytes(b)) as i32
}

/// Logical negation.
#[no_mangle]
pub extern "C" fn __not(i: i32) -> i32 {
    (i == 0) as i32
}

/// Terminate the program with the given exit code.
#[no_mangle]
pub extern "C" fn __exit(code: i32) -> ! {
    std::process::exit(code)
}
