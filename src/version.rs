//! Version gate: the `(major, minor, patch, stage)` tuple consulted at parse
//! and serialize time, and a small predicate module centralizing every
//! `if version >= ...` branch the connector variants need.

/// Release stage, ordered the same way the on-disk format orders it:
/// `Dev < Alpha < Beta < Release < Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Stage {
    Dev = 0,
    Alpha = 1,
    Beta = 2,
    Release = 3,
    Final = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LvVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub stage: Stage,
}

impl LvVersion {
    pub const fn new(major: u8, minor: u8, patch: u8, stage: Stage) -> Self {
        LvVersion {
            major,
            minor,
            patch,
            stage,
        }
    }
}

impl Default for LvVersion {
    fn default() -> Self {
        // A recent-enough default so that freshly constructed catalogs use
        // the modern (wide) encodings unless the caller says otherwise.
        LvVersion::new(12, 0, 0, Stage::Release)
    }
}

/// `version >= (10, 0, 0, Alpha)`: Function per-client flags are `u32` wide
/// instead of `u16`.
pub fn wide_client_flags(v: LvVersion) -> bool {
    v >= LvVersion::new(10, 0, 0, Stage::Alpha)
}

/// `version >= (8, 0, 0, Beta)`: Function payload carries a `has_thrall`
/// field and per-client thrall-source lists.
pub fn has_thrall_field(v: LvVersion) -> bool {
    v >= LvVersion::new(8, 0, 0, Stage::Beta)
}

/// `version >= (8, 2, 0, Beta)`: thrall-source bytes are offset by one
/// (`source + 1` on disk, `0` reserved as the terminator).
pub fn thrall_offset_by_one(v: LvVersion) -> bool {
    v >= LvVersion::new(8, 2, 0, Stage::Beta)
}

/// `version` falls in `[(8,2,1), (8,2,2)) ∪ [(8,5,1), ∞)`: the Tag variant
/// carries an embedded LVVariant sub-object.
pub fn tag_carries_variant(v: LvVersion) -> bool {
    let lo1 = LvVersion::new(8, 2, 1, Stage::Dev);
    let hi1 = LvVersion::new(8, 2, 2, Stage::Dev);
    let lo2 = LvVersion::new(8, 5, 1, Stage::Dev);
    (v >= lo1 && v < hi1) || v >= lo2
}

/// `version >= (8, 1, 1)`: a `UserDefined` Tag carries a Pascal-string
/// identifier.
pub fn tag_carries_ident(v: LvVersion) -> bool {
    v >= LvVersion::new(8, 1, 1, Stage::Dev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_flag_width_gate() {
        assert!(!wide_client_flags(LvVersion::new(7, 0, 0, Stage::Release)));
        assert!(wide_client_flags(LvVersion::new(10, 0, 0, Stage::Alpha)));
        assert!(wide_client_flags(LvVersion::new(10, 0, 0, Stage::Beta)));
    }

    #[test]
    fn tag_variant_interval_gate() {
        assert!(tag_carries_variant(LvVersion::new(8, 2, 1, Stage::Release)));
        assert!(!tag_carries_variant(LvVersion::new(8, 2, 2, Stage::Dev)));
        assert!(tag_carries_variant(LvVersion::new(8, 5, 1, Stage::Dev)));
        assert!(tag_carries_variant(LvVersion::new(9, 0, 0, Stage::Dev)));
        assert!(!tag_carries_variant(LvVersion::new(8, 3, 0, Stage::Dev)));
    }
}
