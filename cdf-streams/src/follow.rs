//! Decoding of the link `follow` bitmask.

/// Labels tested in order against a mask. An entry matches when all of its
/// required bits are set; the first match wins.
///
/// The zero entry comes first and matches every mask, so every value decodes
/// to `"follow"` and the `nofollow` entries are never reached.
pub const FOLLOW_MASKS: [(i64, &str); 5] = [
    (0, "follow"),
    (8, "config_nofollow"),
    (4, "robots_nofollow"),
    (2, "meta_nofollow"),
    (1, "link_nofollow"),
];

pub fn follow_mask(value: i64) -> &'static str {
    FOLLOW_MASKS
        .iter()
        .find(|(required, _)| required & value == *required)
        .map(|(_, label)| *label)
        .unwrap_or(FOLLOW_MASKS[0].1)
}

/// A decoded `follow` cell. Keeps the raw mask so that encoding writes back
/// exactly what was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowFlags {
    mask: i64,
}

impl FollowFlags {
    pub fn new(mask: i64) -> Self {
        Self { mask }
    }

    pub fn mask(self) -> i64 {
        self.mask
    }

    pub fn label(self) -> &'static str {
        follow_mask(self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mask_is_follow() {
        assert_eq!(follow_mask(0), "follow");
    }

    #[test]
    fn every_mask_is_follow_under_current_order() {
        for mask in [1, 2, 4, 8, 3, 12, 15, 255, -1, i64::MAX] {
            assert_eq!(follow_mask(mask), "follow", "mask {mask}");
        }
    }

    #[test]
    fn flags_keep_raw_mask() {
        let flags = FollowFlags::new(12);
        assert_eq!(flags.mask(), 12);
        assert_eq!(flags.label(), "follow");
    }
}
