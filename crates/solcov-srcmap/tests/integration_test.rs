// SPDX-License-Identifier: AGPL-3.0

#[cfg(test)]
mod tests {
    use solcov_srcmap::{decode, SourceMap, SourceMapEntry};

    // taken from a solc 0.5 runtime map
    const REAL_MAP: &str =
        "-1:-1:-1:;11386:87:2;;;11452:10;;11434:15;:28;11386:87;11081:398;:::o;20850:::-;20960:22;:20;:22::i";

    #[test]
    fn test_canonical_round_trip() {
        let canonical = decode(REAL_MAP).unwrap().to_string();
        let again = decode(&canonical).unwrap().to_string();
        assert_eq!(canonical, again);
    }

    #[test]
    fn test_one_entry_per_element() {
        let m = decode(REAL_MAP).unwrap();
        assert_eq!(m.len(), REAL_MAP.split(';').count());
    }

    #[test]
    fn test_omitted_fields_follow_nearest_predecessor() {
        let m = decode(REAL_MAP).unwrap();
        let entries = m.entries();

        assert_eq!(entries[0], SourceMapEntry::new(-1, -1, -1, ""));
        assert_eq!(entries[1], SourceMapEntry::new(11386, 87, 2, ""));
        assert_eq!(entries[3], entries[1]);
        assert_eq!(entries[4], SourceMapEntry::new(11452, 10, 2, ""));
        assert_eq!(entries[7], SourceMapEntry::new(11434, 28, 2, ""));
        assert_eq!(entries[10], SourceMapEntry::new(11081, 398, 2, "o"));
        assert_eq!(entries[11], SourceMapEntry::new(20850, 398, 2, "-"));
        assert_eq!(entries[14], SourceMapEntry::new(20960, 22, 2, "i"));
    }

    #[test]
    fn test_compress_round_trip() {
        let m = decode(REAL_MAP).unwrap();
        let recompressed: SourceMap = m.compress().parse().unwrap();
        assert_eq!(recompressed, m);
        assert!(m.compress().len() <= m.to_string().len());
    }

    #[test]
    fn test_trailing_separator_repeats_last() {
        let m = decode("5:6:0:-;7:8;").unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(2), m.get(1));
    }
}
