//! Minimal Solidity ABI encoding for the handful of calls the client makes.

use anyhow::{anyhow, Result};

use crate::amount::{Amount, MAX_AMOUNT};
use crate::contracts::Address;

pub const WORD: usize = 32;

// Function selectors (first four bytes of keccak256 of the signature)
pub const APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3]; // approve(address,uint256)
pub const ALLOWANCE: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e]; // allowance(address,address)
pub const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31]; // balanceOf(address)
pub const DECIMALS: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67]; // decimals()
pub const SYMBOL: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41]; // symbol()
pub const DONATE: [u8; 4] = [0xf1, 0x4f, 0xaf, 0x6f]; // donate(uint256)
pub const VOTE: [u8; 4] = [0x6a, 0x18, 0xff, 0x7a]; // vote(uint256,uint256,bool)
pub const EXECUTE_PROPOSAL: [u8; 4] = [0x0d, 0x61, 0xb5, 0x19]; // executeProposal(uint256)

/// A single ABI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(Amount),
    Bool(bool),
}

impl Token {
    fn encode_into(&self, out: &mut Vec<u8>) {
        let mut word = [0u8; WORD];
        match self {
            Token::Address(address) => word[12..].copy_from_slice(address.as_bytes()),
            // MAX_AMOUNT stands for uint256 max so "unlimited" approvals look
            // the same on-chain as they do from any other wallet.
            Token::Uint(value) if *value == MAX_AMOUNT => word = [0xff; WORD],
            Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
            Token::Bool(flag) => word[WORD - 1] = u8::from(*flag),
        }
        out.extend_from_slice(&word);
    }
}

/// Selector followed by head-encoded static arguments.
pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD * args.len());
    out.extend_from_slice(&selector);
    for arg in args {
        arg.encode_into(&mut out);
    }
    out
}

/// Decode a uint256 return value, saturating at `MAX_AMOUNT`.
pub fn decode_uint(data: &[u8]) -> Result<Amount> {
    let word = data
        .get(..WORD)
        .ok_or_else(|| anyhow!("return data too short: {} bytes", data.len()))?;
    if word[..16].iter().any(|b| *b != 0) {
        return Ok(MAX_AMOUNT);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(Amount::from_be_bytes(low))
}

/// Decode a dynamic `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String> {
    let offset = usize::try_from(decode_uint(data)?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| anyhow!("string offset {} out of range", offset))?;
    let len_word = data
        .get(offset..start)
        .ok_or_else(|| anyhow!("string offset {} out of range", offset))?;
    let len = usize::try_from(decode_uint(len_word)?)?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| anyhow!("string length {} out of range", len))?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| anyhow!("string length {} out of range", len))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
