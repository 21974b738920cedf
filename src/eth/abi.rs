//! ABI codec for the transfer ledger contract
//!
//! The contract surface is three functions and one event, so the codec is
//! written by hand against their fixed signatures instead of pulling in a
//! full ABI library. Selectors are the first four bytes of the keccak-256
//! of each canonical signature, hardcoded below.
//!
//! Wire layout notes:
//! - `getAllTransactions()` returns `TransferStruct[]`: an offset word, a
//!   length word, one offset per element (relative to the element area),
//!   then each struct as six head words (sender, receiver, amount,
//!   message offset, timestamp, keyword offset) followed by string tails.
//! - Event data carries the same six fields encoded as an in-place tuple
//!   (none of the parameters are indexed).

use crate::error::{Error, Result};

/// Selector for `getAllTransactions()`
pub const SEL_GET_ALL_TRANSACTIONS: [u8; 4] = [0x27, 0x50, 0x6f, 0x53];

/// Selector for `addToBlockchain(address,uint256,string,string)`
pub const SEL_ADD_TO_BLOCKCHAIN: [u8; 4] = [0xcc, 0x2d, 0x7e, 0xad];

/// Selector for `getTransactionCount()`
pub const SEL_GET_TRANSACTION_COUNT: [u8; 4] = [0x2e, 0x77, 0x00, 0xf0];

/// topic0 of `Transfer(address,address,uint256,string,uint256,string)`
pub const TRANSFER_EVENT_TOPIC: &str =
    "0x416cfa4330a4565f45c2fd2dd4826a83a37443aba2ce6f79477c7355afac35fa";

const WORD: usize = 32;

/// One ledger entry as decoded off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    /// Sender address, 0x-prefixed lowercase hex
    pub sender: String,
    /// Receiver address, 0x-prefixed lowercase hex
    pub receiver: String,
    /// Amount in wei
    pub amount_wei: u128,
    /// Attached message
    pub message: String,
    /// Block timestamp, seconds since epoch
    pub timestamp: u64,
    /// Keyword tag
    pub keyword: String,
}

/// Decode a 0x-prefixed hex payload (call return data, log data)
pub fn decode_hex_payload(s: &str) -> Result<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::AbiDecode(format!("payload {s:?} missing 0x prefix")))?;
    hex::decode(digits).map_err(|e| Error::AbiDecode(format!("bad hex payload: {e}")))
}

/// Encode bytes as a 0x-prefixed hex payload
pub fn encode_hex_payload(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Build calldata for `getAllTransactions()`
pub fn encode_get_all_transactions() -> Vec<u8> {
    SEL_GET_ALL_TRANSACTIONS.to_vec()
}

/// Build calldata for `getTransactionCount()`
pub fn encode_get_transaction_count() -> Vec<u8> {
    SEL_GET_TRANSACTION_COUNT.to_vec()
}

/// Build calldata for `addToBlockchain(receiver, amount, message, keyword)`
pub fn encode_add_to_blockchain(
    receiver: &str,
    amount_wei: u128,
    message: &str,
    keyword: &str,
) -> Result<Vec<u8>> {
    let mut data = SEL_ADD_TO_BLOCKCHAIN.to_vec();

    // Head: address, uint256, offset(message), offset(keyword)
    let head_len = 4 * WORD;
    let message_tail = encode_string(message);
    let keyword_offset = head_len + message_tail.len();

    data.extend_from_slice(&encode_address(receiver)?);
    data.extend_from_slice(&encode_u128(amount_wei));
    data.extend_from_slice(&encode_usize(head_len));
    data.extend_from_slice(&encode_usize(keyword_offset));
    data.extend_from_slice(&message_tail);
    data.extend_from_slice(&encode_string(keyword));

    Ok(data)
}

/// Decode the return data of `getTransactionCount()`
pub fn decode_transaction_count(data: &[u8]) -> Result<u64> {
    decode_u64(word(data, 0)?)
}

/// Decode the return data of `getAllTransactions()`
pub fn decode_transaction_list(data: &[u8]) -> Result<Vec<RawTransfer>> {
    let array_offset = decode_usize(word(data, 0)?)?;
    let array = data
        .get(array_offset..)
        .ok_or_else(|| Error::AbiDecode("array offset out of bounds".to_string()))?;

    let len = decode_usize(word(array, 0)?)?;
    // Element offsets are relative to the element area after the length word
    let elements = &array[WORD..];

    // Every element needs at least its offset word; a hostile length word
    // must fail before any allocation happens
    if len > elements.len() / WORD {
        return Err(Error::AbiDecode(format!(
            "array length {len} exceeds the {} byte payload",
            data.len()
        )));
    }

    let mut transfers = Vec::with_capacity(len);
    for i in 0..len {
        let element_offset = decode_usize(word(elements, i)?)?;
        let element = elements
            .get(element_offset..)
            .ok_or_else(|| Error::AbiDecode(format!("element {i} offset out of bounds")))?;
        transfers.push(decode_transfer_tuple(element)?);
    }

    Ok(transfers)
}

/// Decode one Transfer tuple (struct element or event log data)
pub fn decode_transfer_tuple(data: &[u8]) -> Result<RawTransfer> {
    let sender = decode_address(word(data, 0)?)?;
    let receiver = decode_address(word(data, 1)?)?;
    let amount_wei = decode_u128(word(data, 2)?)?;
    let message = decode_string_at(data, decode_usize(word(data, 3)?)?)?;
    let timestamp = decode_u64(word(data, 4)?)?;
    let keyword = decode_string_at(data, decode_usize(word(data, 5)?)?)?;

    Ok(RawTransfer {
        sender,
        receiver,
        amount_wei,
        message,
        timestamp,
        keyword,
    })
}

/// Encode a 0x-prefixed address into a left-padded word
pub fn encode_address(address: &str) -> Result<[u8; 32]> {
    let digits = address
        .strip_prefix("0x")
        .ok_or_else(|| Error::AbiEncode(format!("address {address:?} missing 0x prefix")))?;
    let bytes =
        hex::decode(digits).map_err(|e| Error::AbiEncode(format!("bad address hex: {e}")))?;
    if bytes.len() != 20 {
        return Err(Error::AbiEncode(format!(
            "address {address:?} is {} bytes, expected 20",
            bytes.len()
        )));
    }

    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&bytes);
    Ok(out)
}

fn encode_u128(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

fn encode_usize(value: usize) -> [u8; 32] {
    encode_u128(value as u128)
}

/// Encode a string tail: length word plus zero-padded UTF-8 bytes
fn encode_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = encode_usize(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    let pad = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(pad));
    out
}

fn word(data: &[u8], index: usize) -> Result<&[u8]> {
    data.get(index * WORD..(index + 1) * WORD)
        .ok_or_else(|| Error::AbiDecode(format!("truncated data: word {index} out of bounds")))
}

fn decode_address(word: &[u8]) -> Result<String> {
    if word[..12].iter().any(|&b| b != 0) {
        return Err(Error::AbiDecode("address word has nonzero padding".to_string()));
    }
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn decode_u128(word: &[u8]) -> Result<u128> {
    if word[..16].iter().any(|&b| b != 0) {
        return Err(Error::AbiDecode("uint256 exceeds u128 range".to_string()));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(buf))
}

fn decode_u64(word: &[u8]) -> Result<u64> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(Error::AbiDecode("uint256 exceeds u64 range".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(buf))
}

fn decode_usize(word: &[u8]) -> Result<usize> {
    let value = decode_u64(word)?;
    usize::try_from(value).map_err(|_| Error::AbiDecode("offset exceeds usize".to_string()))
}

fn decode_string_at(data: &[u8], offset: usize) -> Result<String> {
    let tail = data
        .get(offset..)
        .ok_or_else(|| Error::AbiDecode("string offset out of bounds".to_string()))?;
    let len = decode_usize(word(tail, 0)?)?;
    let end = WORD
        .checked_add(len)
        .ok_or_else(|| Error::AbiDecode("string length overflows usize".to_string()))?;
    let bytes = tail
        .get(WORD..end)
        .ok_or_else(|| Error::AbiDecode("string data out of bounds".to_string()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::AbiDecode(format!("bad UTF-8: {e}")))
}
