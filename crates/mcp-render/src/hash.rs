use mcp_types::{RebootRequirements, RevisionConfig, UnitDesiredState};
use sha2::{Digest, Sha256};

/// Length of the `configHash` hex string (SHA-256, 32 bytes → 64 hex chars).
pub const CONFIG_HASH_HEX_LEN: usize = 64;

/// Length of the `revision` prefix taken from the front of `configHash`.
pub const REVISION_HEX_LEN: usize = 10;

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

fn write_opt_str(buf: &mut Vec<u8>, s: &Option<String>) {
    match s {
        Some(v) => {
            buf.push(1);
            write_str(buf, v);
        }
        None => buf.push(0),
    }
}

fn unit_state_tag(state: UnitDesiredState) -> u8 {
    match state {
        UnitDesiredState::Enabled => 0,
        UnitDesiredState::Disabled => 1,
        UnitDesiredState::Masked => 2,
    }
}

/// Canonicalizes `config`/`reboot_requirements` into the exact byte sequence
/// that gets hashed into `configHash`.
///
/// `policy` deliberately does not feed this: `configHash` identifies the
/// rendered content only (I2 — once a revision exists, its `configHash`
/// never changes), while the reboot policy is stored and patched in place
/// as a field orthogonal to the hash (see `RenderedRevision::reboot` in
/// `mcp-types`). Folding `policy` in here would make a policy-only change
/// mint a new revision name instead of patching the existing one.
///
/// Every variable-length field is length-prefixed with a little-endian u64
/// so no field boundary is ambiguous. `config.files`/`config.units` and the
/// two `reboot_requirements` maps must already be in sorted-key order (the
/// merge step guarantees this) — this function does not sort, it only
/// encodes, so that callers can assert on the exact byte sequence in tests.
pub fn canonical_bytes(config: &RevisionConfig, reboot_requirements: &RebootRequirements) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(&(config.files.len() as u64).to_le_bytes());
    for (path, entry) in &config.files {
        write_str(&mut buf, path);
        write_str(&mut buf, &entry.content);
        buf.extend_from_slice(&entry.mode.to_le_bytes());
        write_opt_str(&mut buf, &entry.owner);
        write_opt_str(&mut buf, &entry.group);
    }

    buf.extend_from_slice(&(config.units.len() as u64).to_le_bytes());
    for (name, entry) in &config.units {
        write_str(&mut buf, name);
        write_str(&mut buf, &entry.content);
        buf.push(unit_state_tag(entry.desired_state));
    }

    buf.extend_from_slice(&(config.kernel_args.len() as u64).to_le_bytes());
    for arg in &config.kernel_args {
        write_str(&mut buf, arg);
    }

    buf.extend_from_slice(&(reboot_requirements.files.len() as u64).to_le_bytes());
    for (path, required) in &reboot_requirements.files {
        write_str(&mut buf, path);
        buf.push(*required as u8);
    }

    buf.extend_from_slice(&(reboot_requirements.units.len() as u64).to_le_bytes());
    for (name, required) in &reboot_requirements.units {
        write_str(&mut buf, name);
        buf.push(*required as u8);
    }

    buf
}

/// SHA-256-hashes `bytes` into a `(configHash, revision)` pair: the full
/// 64-hex digest and its first 10 hex characters.
pub fn hash_config(bytes: &[u8]) -> (String, String) {
    let digest = Sha256::digest(bytes);
    let config_hash = hex::encode(digest);
    debug_assert_eq!(config_hash.len(), CONFIG_HASH_HEX_LEN);
    let revision = config_hash[..REVISION_HEX_LEN].to_string();
    (config_hash, revision)
}
