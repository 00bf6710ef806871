// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key glob patterns, compiled to anchored regexes.
//!
//! Syntax: `*` matches any run of characters excluding `/`, `**` matches
//! any run including `/`, `?` matches exactly one character. Every other
//! character, regex metacharacters included, is literal.

use regex::Regex;

pub(crate) fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() * 2 + 8);
    source.push_str("(?s)^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    source.push_str(".*");
                } else {
                    source.push_str("[^/]*");
                }
            }
            '?' => source.push('.'),
            c => {
                let mut buf = [0u8; 4];
                source.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }
    source.push('$');
    Regex::new(&source)
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
