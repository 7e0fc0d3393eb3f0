// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-token noise filter.
//!
//! Agents emit fixed control replies ("no reply", "heartbeat ok",
//! "announce skip") that must never land in the transcript. Matching is
//! case-insensitive, tolerates underscore/space interchange, and ignores
//! trailing underscores and punctuation.

use std::sync::LazyLock;

use regex::Regex;

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:no[_ ]?reply|heartbeat[_ ]?ok|announce[_ ]?skip)[_.!]*$")
        .unwrap_or_else(|e| panic!("noise pattern: {e}"))
});

/// True when `text` is empty after trimming or matches a control token.
pub fn is_noise(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || NOISE.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_tokens_are_noise() {
        for text in [
            "NO_REPLY",
            "no reply",
            "No_Reply.",
            "noreply",
            "HEARTBEAT_OK_",
            "heartbeat ok!",
            "Announce skip.",
            "announce_skip",
        ] {
            assert!(is_noise(text), "{text:?} should be noise");
        }
    }

    #[test]
    fn blank_is_noise() {
        assert!(is_noise(""));
        assert!(is_noise("   \n"));
    }

    #[test]
    fn real_content_is_not_noise() {
        for text in [
            "Build complete.",
            "no reply yet from the vendor",
            "heartbeat ok, but latency is up",
            "NO_REPLY is what the agent said",
        ] {
            assert!(!is_noise(text), "{text:?} should not be noise");
        }
    }
}
