//! Fixed-width binary agent records.
//!
//! All integers are little-endian. Layout (27 bytes):
//!
//! ```text
//! u8  version      = RECORD_VERSION
//! u64 local_id
//! u32 origin       worker that created the agent
//! u8  group        0 = A, 1 = B
//! f64 threshold    finite, in [0, 1]
//! u8  flags        bit 0 satisfied, bit 1 always_satisfied
//! u32 reserved     = 0
//! ```

use crate::error::MigrationError;
use enclave_core::{Agent, AgentId, Group, WorkerId};
use std::io::Read;

/// Current record version.
pub const RECORD_VERSION: u8 = 1;

/// Encoded size of one record in bytes.
pub const RECORD_LEN: usize = 27;

const FLAG_SATISFIED: u8 = 0b01;
const FLAG_ALWAYS_SATISFIED: u8 = 0b10;

/// A self-contained encoded agent.
///
/// Carries every field needed to rebuild the agent; nothing depends on
/// in-memory identity on either side of the exchange.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentRecord([u8; RECORD_LEN]);

impl AgentRecord {
    /// Encode an agent.
    pub fn serialize(agent: &Agent) -> Self {
        let mut flags = 0u8;
        if agent.satisfied {
            flags |= FLAG_SATISFIED;
        }
        if agent.always_satisfied {
            flags |= FLAG_ALWAYS_SATISFIED;
        }
        let mut buf = Vec::with_capacity(RECORD_LEN);
        buf.push(RECORD_VERSION);
        buf.extend_from_slice(&agent.id.local.to_le_bytes());
        buf.extend_from_slice(&agent.id.origin.0.to_le_bytes());
        buf.push(agent.group.tag());
        buf.extend_from_slice(&agent.threshold.to_le_bytes());
        buf.push(flags);
        buf.extend_from_slice(&0u32.to_le_bytes());

        let mut bytes = [0u8; RECORD_LEN];
        bytes.copy_from_slice(&buf);
        Self(bytes)
    }

    /// Wrap raw bytes received from a peer. Fails on a length mismatch.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MigrationError> {
        let arr: [u8; RECORD_LEN] = bytes.try_into().map_err(|_| {
            MigrationError::corrupt(format!(
                "expected {RECORD_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode back into an agent, validating every field.
    pub fn decode(&self) -> Result<Agent, MigrationError> {
        let mut r: &[u8] = &self.0;

        let version = read_u8(&mut r)?;
        if version != RECORD_VERSION {
            return Err(MigrationError::corrupt(format!(
                "unsupported record version {version}"
            )));
        }
        let local = read_u64_le(&mut r)?;
        let origin = read_u32_le(&mut r)?;
        let tag = read_u8(&mut r)?;
        let group = Group::from_tag(tag)
            .ok_or_else(|| MigrationError::corrupt(format!("unknown group tag {tag}")))?;
        let threshold = read_f64_le(&mut r)?;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(MigrationError::corrupt(format!(
                "threshold {threshold} outside [0, 1]"
            )));
        }
        let flags = read_u8(&mut r)?;
        if flags & !(FLAG_SATISFIED | FLAG_ALWAYS_SATISFIED) != 0 {
            return Err(MigrationError::corrupt(format!(
                "unknown flag bits {flags:#04x}"
            )));
        }
        let reserved = read_u32_le(&mut r)?;
        if reserved != 0 {
            return Err(MigrationError::corrupt(format!(
                "reserved field is {reserved:#x}, expected 0"
            )));
        }

        Ok(Agent {
            id: AgentId::new(WorkerId(origin), local),
            group,
            threshold,
            always_satisfied: flags & FLAG_ALWAYS_SATISFIED != 0,
            satisfied: flags & FLAG_SATISFIED != 0,
        })
    }

    /// Identity without a full decode. Only meaningful for well-formed
    /// records; used for log context.
    pub fn peek_id(&self) -> AgentId {
        let mut local = [0u8; 8];
        local.copy_from_slice(&self.0[1..9]);
        let mut origin = [0u8; 4];
        origin.copy_from_slice(&self.0[9..13]);
        AgentId::new(
            WorkerId(u32::from_le_bytes(origin)),
            u64::from_le_bytes(local),
        )
    }
}

impl std::fmt::Debug for AgentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AgentRecord").field(&self.peek_id()).finish()
    }
}

// ── Primitive readers ───────────────────────────────────────────

fn read_exact<const N: usize>(r: &mut &[u8]) -> Result<[u8; N], MigrationError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)
        .map_err(|_| MigrationError::corrupt("record truncated"))?;
    Ok(buf)
}

fn read_u8(r: &mut &[u8]) -> Result<u8, MigrationError> {
    Ok(read_exact::<1>(r)?[0])
}

fn read_u32_le(r: &mut &[u8]) -> Result<u32, MigrationError> {
    Ok(u32::from_le_bytes(read_exact(r)?))
}

fn read_u64_le(r: &mut &[u8]) -> Result<u64, MigrationError> {
    Ok(u64::from_le_bytes(read_exact(r)?))
}

fn read_f64_le(r: &mut &[u8]) -> Result<f64, MigrationError> {
    Ok(f64::from_le_bytes(read_exact(r)?))
}
