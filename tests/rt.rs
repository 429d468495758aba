//! Tests for the runtime primitives.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use tigerc::rt;

fn tiger(s: &str) -> CString {
    CString::new(s).expect("test strings have no interior NUL")
}

unsafe fn rust(s: *const c_char) -> &'static str {
    CStr::from_ptr(s).to_str().expect("the result is valid UTF-8")
}

#[test]
fn strcmp_normalizes_to_sign() {
    let (a, b) = (tiger("abc"), tiger("abd"));
    unsafe {
        assert_eq!(rt::__strcmp(a.as_ptr(), b.as_ptr()), -1);
        assert_eq!(rt::__strcmp(b.as_ptr(), a.as_ptr()), 1);
        assert_eq!(rt::__strcmp(a.as_ptr(), a.as_ptr()), 0);
    }
}

#[test]
fn streq_is_boolean() {
    let (a, b) = (tiger("x"), tiger("y"));
    unsafe {
        assert_eq!(rt::__streq(a.as_ptr(), a.as_ptr()), 1);
        assert_eq!(rt::__streq(a.as_ptr(), b.as_ptr()), 0);
    }
}

#[test]
fn ord_reads_the_first_byte() {
    let (a, empty) = (tiger("A"), tiger(""));
    unsafe {
        assert_eq!(rt::__ord(a.as_ptr()), 65);
        assert_eq!(rt::__ord(empty.as_ptr()), -1);
    }
}

#[test]
fn chr_zero_is_the_empty_string() {
    unsafe {
        assert_eq!(rust(rt::__chr(0)), "");
    }
}

#[test]
fn chr_builds_one_character_strings() {
    unsafe {
        assert_eq!(rust(rt::__chr(65)), "A");
    }
}

#[test]
fn chr_preserves_high_bytes() {
    // Codes above 127 are stored as-is, not truncated modulo 128.
    let s = rt::__chr(200);
    unsafe {
        assert_eq!(rt::__ord(s), 200);
    }
}

#[test]
fn size_counts_bytes() {
    let (s, empty) = (tiger("hello"), tiger(""));
    unsafe {
        assert_eq!(rt::__size(s.as_ptr()), 5);
        assert_eq!(rt::__size(empty.as_ptr()), 0);
    }
}

#[test]
fn substring_extracts_a_slice() {
    let s = tiger("hello world");
    unsafe {
        assert_eq!(rust(rt::__substring(s.as_ptr(), 6, 5)), "world");
        assert_eq!(rust(rt::__substring(s.as_ptr(), 0, 0)), "");
    }
}

#[test]
fn concat_joins_strings() {
    let (a, b) = (tiger("foo"), tiger("bar"));
    unsafe {
        assert_eq!(rust(rt::__concat(a.as_ptr(), b.as_ptr())), "foobar");
    }
}

#[test]
fn not_negates_logically() {
    assert_eq!(rt::__not(0), 1);
    assert_eq!(rt::__not(1), 0);
    assert_eq!(rt::__not(42), 0);
}
