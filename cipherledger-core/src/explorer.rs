//! Block explorer links for transactions, addresses and blocks.

use ethers_core::types::{Address, H256};

use crate::address::checksum;

/// Sepolia, also used for chains without a known explorer.
pub const DEFAULT_EXPLORER_CHAIN_ID: u64 = 11_155_111;

/// Base URL of the block explorer for a chain.
pub fn explorer_url(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "https://etherscan.io",
        5 => "https://goerli.etherscan.io",
        137 => "https://polygonscan.com",
        80001 => "https://mumbai.polygonscan.com",
        _ => "https://sepolia.etherscan.io",
    }
}

pub fn explorer_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "Etherscan",
        11_155_111 => "Sepolia Etherscan",
        5 => "Goerli Etherscan",
        137 => "Polygonscan",
        80001 => "Mumbai Polygonscan",
        _ => "Block Explorer",
    }
}

pub fn transaction_url(tx_hash: &H256, chain_id: u64) -> String {
    format!("{}/tx/{:?}", explorer_url(chain_id), tx_hash)
}

pub fn address_url(address: &Address, chain_id: u64) -> String {
    format!("{}/address/{}", explorer_url(chain_id), checksum(address))
}

pub fn block_url(block_number: u64, chain_id: u64) -> String {
    format!("{}/block/{}", explorer_url(chain_id), block_number)
}

/// Shorten a hash or address to `0x` + `chars` leading and `chars` trailing
/// digits.
pub fn shorten_hash(hash: &str, chars: usize) -> String {
    if hash.len() <= chars * 2 + 2 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..chars + 2], &hash[hash.len() - chars..])
}
