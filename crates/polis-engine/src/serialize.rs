//! Save-file framing: a fixed magic, a format version, and a bitcode body.
//!
//! The body encoding is canonical: identical states always encode to
//! identical bytes, which is what the determinism tests compare.

use thiserror::Error;

use crate::state::GameState;

const MAGIC: [u8; 4] = *b"PLIS";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("not a save file (bad magic)")]
    BadMagic,
    #[error("unsupported save version {0}")]
    UnsupportedVersion(u32),
    #[error("save file truncated")]
    Truncated,
    #[error("codec error: {0}")]
    Codec(String),
}

/// Encode a state into a framed save payload.
pub fn encode(state: &GameState) -> Result<Vec<u8>, SaveError> {
    let body = bitcode::serialize(state).map_err(|e| SaveError::Codec(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a framed save payload back into a state.
pub fn decode(bytes: &[u8]) -> Result<GameState, SaveError> {
    if bytes.len() < HEADER_LEN {
        return Err(SaveError::Truncated);
    }
    if bytes[..4] != MAGIC {
        return Err(SaveError::BadMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(SaveError::UnsupportedVersion(version));
    }
    bitcode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| SaveError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;
    use crate::test_utils::TestWorld;
    use polis_grid::GridPos;

    fn sample_state() -> GameState {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let pos = world.place(&mut state, GridPos::new(1, 2), world.quarry, 3);
        state
            .building_mut(pos)
            .unwrap()
            .credit(world.wood, f64_to_fixed64(12.5));
        state.unlocked_tech.insert(world.masonry);
        state.tick = 42;
        state
    }

    #[test]
    fn round_trip_preserves_state() {
        let state = sample_state();
        let bytes = encode(&state).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.tick, 42);
        assert_eq!(decoded.tiles, state.tiles);
        assert_eq!(decoded.unlocked_tech, state.unlocked_tech);
        // Re-encoding the decoded state is byte-identical.
        assert_eq!(encode(&decoded).unwrap(), bytes);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(SaveError::BadMagic)));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[4] = 99;
        assert!(matches!(
            decode(&bytes),
            Err(SaveError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn rejects_truncation() {
        assert!(matches!(decode(b"PLI"), Err(SaveError::Truncated)));
    }
}
