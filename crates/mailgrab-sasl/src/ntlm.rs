//! NTLM (MS-NLMP).
//!
//! Three-leg exchange: the client opens with a type-1 negotiate message,
//! the server answers with a type-2 challenge, and the client finishes with
//! a type-3 authenticate message carrying NTLMv2 responses. The username
//! may be given as `DOMAIN\user` (or `DOMAIN/user`) to target a domain
//! account.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md4::{Digest, Md4};

use crate::{SaslError, hmac_md5};

const MECHANISM: &str = "NTLM";
const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const FLAGS: u32 = NEGOTIATE_UNICODE | REQUEST_TARGET | NEGOTIATE_NTLM;

/// Seconds between the Windows epoch (1601-01-01) and the Unix epoch.
const EPOCH_DELTA_SECS: u64 = 11_644_473_600;

/// Builds the type-1 negotiate message. Domain and workstation are left
/// empty; servers that need them take the values from the type-3 message.
#[must_use]
pub fn type1_message() -> String {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&FLAGS.to_le_bytes());
    put_buffer(&mut msg, 0, 32);
    put_buffer(&mut msg, 0, 32);
    STANDARD.encode(msg)
}

/// Builds the type-3 authenticate message for a base64 type-2 challenge.
pub fn type3_message(
    type2_b64: &str,
    username: &str,
    password: &str,
) -> Result<String, SaslError> {
    let type2 = parse_type2(type2_b64)?;
    let client_challenge: [u8; 8] = rand::random();
    let timestamp = windows_timestamp(SystemTime::now());
    let msg = build_type3(&type2, username, password, client_challenge, timestamp)?;
    Ok(STANDARD.encode(msg))
}

struct Type2 {
    challenge: [u8; 8],
    target_info: Vec<u8>,
}

fn parse_type2(type2_b64: &str) -> Result<Type2, SaslError> {
    let raw = STANDARD.decode(type2_b64.trim())?;

    if raw.len() < 32 || &raw[..8] != SIGNATURE {
        return Err(SaslError::Challenge {
            mechanism: MECHANISM,
            reason: "missing NTLMSSP signature",
        });
    }
    if read_u32(&raw, 8) != 2 {
        return Err(SaslError::Challenge {
            mechanism: MECHANISM,
            reason: "not a type-2 message",
        });
    }

    let mut challenge = [0u8; 8];
    challenge.copy_from_slice(&raw[24..32]);

    // Target info security buffer, when the message is long enough to
    // carry one.
    let target_info = if raw.len() >= 48 {
        let len = usize::from(read_u16(&raw, 40));
        let offset = usize::try_from(read_u32(&raw, 44)).unwrap_or(usize::MAX);
        raw.get(offset..offset.saturating_add(len))
            .map_or_else(Vec::new, <[u8]>::to_vec)
    } else {
        Vec::new()
    };

    Ok(Type2 {
        challenge,
        target_info,
    })
}

fn build_type3(
    type2: &Type2,
    username: &str,
    password: &str,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Result<Vec<u8>, SaslError> {
    let (domain, user) = split_domain(username);
    let v2_hash = ntlmv2_hash(user, domain, password)?;

    // Temp blob: version, timestamp, client challenge, target info.
    let mut blob = Vec::with_capacity(32 + type2.target_info.len());
    blob.extend_from_slice(&[1, 1, 0, 0]);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&type2.target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let mut proof_input = Vec::with_capacity(8 + blob.len());
    proof_input.extend_from_slice(&type2.challenge);
    proof_input.extend_from_slice(&blob);
    let nt_proof = hmac_md5(&v2_hash, &proof_input)?;

    let mut nt_response = Vec::with_capacity(16 + blob.len());
    nt_response.extend_from_slice(&nt_proof);
    nt_response.extend_from_slice(&blob);

    let mut lm_input = [0u8; 16];
    lm_input[..8].copy_from_slice(&type2.challenge);
    lm_input[8..].copy_from_slice(&client_challenge);
    let mut lm_response = hmac_md5(&v2_hash, &lm_input)?.to_vec();
    lm_response.extend_from_slice(&client_challenge);

    let domain_bytes = utf16le(domain);
    let user_bytes = utf16le(user);
    let workstation_bytes = Vec::new();

    // Fixed 64-byte header, then the payload in declaration order.
    let domain_offset = 64;
    let user_offset = domain_offset + domain_bytes.len();
    let workstation_offset = user_offset + user_bytes.len();
    let lm_offset = workstation_offset + workstation_bytes.len();
    let nt_offset = lm_offset + lm_response.len();
    let session_key_offset = nt_offset + nt_response.len();

    let mut msg = Vec::with_capacity(session_key_offset);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&3u32.to_le_bytes());
    put_buffer(&mut msg, lm_response.len(), lm_offset);
    put_buffer(&mut msg, nt_response.len(), nt_offset);
    put_buffer(&mut msg, domain_bytes.len(), domain_offset);
    put_buffer(&mut msg, user_bytes.len(), user_offset);
    put_buffer(&mut msg, workstation_bytes.len(), workstation_offset);
    put_buffer(&mut msg, 0, session_key_offset);
    msg.extend_from_slice(&FLAGS.to_le_bytes());

    msg.extend_from_slice(&domain_bytes);
    msg.extend_from_slice(&user_bytes);
    msg.extend_from_slice(&workstation_bytes);
    msg.extend_from_slice(&lm_response);
    msg.extend_from_slice(&nt_response);

    Ok(msg)
}

/// NTLMv2 hash: HMAC-MD5 of `UPPER(user) + domain` keyed with the NT hash.
fn ntlmv2_hash(user: &str, domain: &str, password: &str) -> Result<[u8; 16], SaslError> {
    let mut hash = Md4::new();
    hash.update(utf16le(password));
    let nt_hash: [u8; 16] = hash.finalize().into();

    let mut identity = user.to_uppercase();
    identity.push_str(domain);
    hmac_md5(&nt_hash, &utf16le(&identity))
}

fn split_domain(username: &str) -> (&str, &str) {
    username
        .split_once(['\\', '/'])
        .map_or(("", username), |(domain, user)| (domain, user))
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn windows_timestamp(now: SystemTime) -> u64 {
    let unix = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    (unix.as_secs() + EPOCH_DELTA_SECS) * 10_000_000 + u64::from(unix.subsec_nanos() / 100)
}

/// Appends a security buffer descriptor (length, allocated length, offset).
fn put_buffer(out: &mut Vec<u8>, len: usize, offset: usize) {
    let len = u16::try_from(len).unwrap_or(u16::MAX);
    let offset = u32::try_from(offset).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
}

fn read_u16(raw: &[u8], offset: usize) -> u16 {
    raw.get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .map_or(0, u16::from_le_bytes)
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    raw.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map_or(0, u32::from_le_bytes)
}
