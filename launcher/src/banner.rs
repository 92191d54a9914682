//! Starknet devnet startup banner parser.
//!
//! The devnet prints its pre-deployed accounts and the seed that reproduces
//! them before it starts serving. This is the only place those credentials
//! are exposed, so they are scraped from stdout. Expected shape (layout
//! around the labels may vary between devnet releases):
//!
//! ```text
//! | Account address |  0x64b4...
//! | Private key     |  0x71d7...
//! | Public key      |  0x39d9...
//! ...
//! Seed to replicate this account sequence: 1234
//! ```
//!
//! Each account block is matched as address, then private key, then public
//! key, possibly across lines. Output may arrive in arbitrary pieces, so
//! lines are accumulated until every expected block and the seed line have
//! been seen; a banner that ends early is an error, never a partial result.

use regex::Regex;
use sandbox_types::AccountInfo;
use std::sync::LazyLock;
use thiserror::Error;

pub const SEED_MESSAGE: &str = "Seed to replicate this account sequence: ";

static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)Account address.*?(0x[a-fA-F0-9]+).*?Private key.*?(0x[a-fA-F0-9]+).*?Public key.*?(0x[a-fA-F0-9]+)",
    )
    .expect("account pattern is valid")
});

static SEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Seed to replicate this account sequence: *(\S+)").expect("seed pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BannerError {
    #[error("expected {expected} account blocks, found {found}")]
    MissingAccounts { expected: usize, found: usize },

    #[error("seed line not found")]
    MissingSeed,

    #[error("devnet closed stdout before printing its banner")]
    Eof,

    #[error("timed out waiting for the banner")]
    Timeout,
}

/// Credentials scraped from a complete banner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevnetBanner {
    pub accounts: Vec<AccountInfo>,
    pub seed: String,
}

/// Incremental banner accumulator.
pub struct BannerParser {
    text: String,
    expected_accounts: usize,
}

impl BannerParser {
    pub fn new(expected_accounts: usize) -> Self {
        Self {
            text: String::new(),
            expected_accounts,
        }
    }

    /// Append one line of output. Returns `true` once the banner is complete.
    pub fn push_line(&mut self, line: &str) -> bool {
        self.text.push_str(line);
        self.text.push('\n');
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        SEED_RE.is_match(&self.text)
            && ACCOUNT_RE.find_iter(&self.text).count() >= self.expected_accounts
    }

    /// Everything consumed so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(&self) -> Result<DevnetBanner, BannerError> {
        parse_banner(&self.text, self.expected_accounts)
    }
}

/// Parse a complete banner. All-or-nothing.
pub fn parse_banner(text: &str, expected_accounts: usize) -> Result<DevnetBanner, BannerError> {
    let accounts: Vec<AccountInfo> = ACCOUNT_RE
        .captures_iter(text)
        .take(expected_accounts)
        .map(|c| AccountInfo::new(&c[1], &c[2], &c[3]))
        .collect();
    if accounts.len() < expected_accounts {
        return Err(BannerError::MissingAccounts {
            expected: expected_accounts,
            found: accounts.len(),
        });
    }
    let seed = SEED_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .ok_or(BannerError::MissingSeed)?;
    Ok(DevnetBanner { accounts, seed })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = "\
Predeployed FeeToken
ETH Address: 0x49D36570D4E46F48E99674BD3FCC84644DDD6B96F7C741B1562B82F9E004DC7
Class Hash: 0x6A22BF63C7BC07EFFA39A25DFBD21523D211DB0100A0AFD054D172B81840EAF

| Account address |  0x64b48806902a367c8598f4f95c305e8c1a1acba5f082d294a43793113115691
| Private key     |  0x71d7bb07b9a64f6f78ac4c816aff4da9
| Public key      |  0x39d9e6ce352ad4530a0ef5d5a18fd3303c3606a7fa6ac5b620020ad681cc33b

| Account address |  0x78662e7352d062084b0010068b99288486c2d8b914f6e2a55ce945f8792c8b1
| Private key     |  0xe1406455b7d66b1690803be066cbe5e
| Public key      |  0x7a1bb2744a7dd29bffd44341dbd78008adb4bc11733601e7eddff322ada9cb

Predeployed accounts using class with hash: 0x61dac032f228abef9c6626f995015233097ae253a7f72d68552db02f2971b8f
Initial balance of each account: 1000000000000000000000 WEI and FRI
Seed to replicate this account sequence: 123
";

    #[test]
    fn parses_complete_banner() {
        let banner = parse_banner(BANNER, 2).unwrap();
        assert_eq!(banner.seed, "123");
        assert_eq!(banner.accounts.len(), 2);
        assert_eq!(
            banner.accounts[0].address,
            "0x64b48806902a367c8598f4f95c305e8c1a1acba5f082d294a43793113115691"
        );
        assert_eq!(banner.accounts[0].private_key, "0x71d7bb07b9a64f6f78ac4c816aff4da9");
        assert_eq!(
            banner.accounts[1].public_key,
            "0x7a1bb2744a7dd29bffd44341dbd78008adb4bc11733601e7eddff322ada9cb"
        );
    }

    #[test]
    fn incremental_lines_complete_only_at_seed() {
        let mut parser = BannerParser::new(2);
        let lines: Vec<&str> = BANNER.lines().collect();
        let (last, rest) = lines.split_last().unwrap();
        for line in rest {
            assert!(!parser.push_line(line));
        }
        assert!(parser.push_line(last));
        assert_eq!(parser.finish().unwrap(), parse_banner(BANNER, 2).unwrap());
    }

    #[test]
    fn seed_without_enough_accounts_is_incomplete() {
        let truncated: String = BANNER
            .lines()
            .filter(|l| !l.contains("0x78662e") && !l.contains("0xe14064") && !l.contains("0x7a1bb2"))
            .map(|l| format!("{l}\n"))
            .collect();
        let mut parser = BannerParser::new(2);
        for line in truncated.lines() {
            parser.push_line(line);
        }
        assert!(!parser.is_complete());
        assert_eq!(
            parser.finish().unwrap_err(),
            BannerError::MissingAccounts { expected: 2, found: 1 }
        );
    }

    #[test]
    fn accounts_without_seed_fail() {
        let without_seed = BANNER.replace(SEED_MESSAGE, "Seed: ");
        assert_eq!(parse_banner(&without_seed, 2).unwrap_err(), BannerError::MissingSeed);
    }

    #[test]
    fn legacy_multiline_layout_parses() {
        let legacy = "\
Account #0
Account address: 0x1
Private key: 0xaa
Public key: 0xbb

Account #1
Account address: 0x2
Private key: 0xcc
Public key: 0xdd

Seed to replicate this account sequence: 42
";
        let banner = parse_banner(legacy, 2).unwrap();
        assert_eq!(banner.accounts[1], AccountInfo::new("0x2", "0xcc", "0xdd"));
        assert_eq!(banner.seed, "42");
    }
}
