#[cfg(test)]
mod tests {
    use photo_ocr_keeper::text_processing::{
        CandidatePolicy, CandidateSplitter, MatchMode, MatchSettings,
    };

    const RAW: &str = "ABC-123\n  \nXYZ-999";

    #[test]
    fn test_custom_separator_prefix_match() {
        let splitter = CandidateSplitter::with_separators(&['-']).unwrap();
        assert_eq!(splitter.candidates(RAW), vec!["ABC", "123", "XYZ", "999"]);

        let settings = MatchSettings::new(MatchMode::Prefix, "XY");
        assert_eq!(splitter.find_match(RAW, &settings), "XYZ");
    }

    #[test]
    fn test_no_term_returns_first_line() {
        let splitter = CandidateSplitter::new(CandidatePolicy::Lines);
        assert_eq!(splitter.candidates(RAW), vec!["ABC-123", "XYZ-999"]);
        assert_eq!(
            splitter.find_match(RAW, &MatchSettings::default()),
            "ABC-123"
        );
    }

    #[test]
    fn test_first_match_wins() {
        let splitter = CandidateSplitter::new(CandidatePolicy::Lines);
        let raw = "AB-1\nAB-2\nCD-3";

        let prefix = MatchSettings::new(MatchMode::Prefix, "AB");
        assert_eq!(splitter.find_match(raw, &prefix), "AB-1");

        let suffix = MatchSettings::new(MatchMode::Suffix, "-3");
        assert_eq!(splitter.find_match(raw, &suffix), "CD-3");
    }

    #[test]
    fn test_term_is_trimmed() {
        let splitter = CandidateSplitter::new(CandidatePolicy::Lines);
        let settings = MatchSettings::new(MatchMode::Suffix, "  999 ");
        assert_eq!(splitter.find_match(RAW, &settings), "XYZ-999");
    }

    #[test]
    fn test_no_match_is_empty() {
        let splitter = CandidateSplitter::default();
        let settings = MatchSettings::new(MatchMode::Prefix, "QQ");
        assert_eq!(splitter.find_match(RAW, &settings), "");
        assert_eq!(splitter.find_match("", &MatchSettings::default()), "");
        assert_eq!(splitter.find_match(" \n\t\n", &MatchSettings::default()), "");
    }

    #[test]
    fn test_default_tokens_split_full_width_punctuation() {
        let splitter = CandidateSplitter::default();
        assert_eq!(splitter.policy(), CandidatePolicy::Tokens);

        let raw = "品番：A-100、数量 3\n（備考）";
        let candidates = splitter.candidates(raw);
        assert_eq!(candidates, vec!["品番", "A", "100", "数量", "3", "備考"]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let splitter = CandidateSplitter::new(CandidatePolicy::Lines);
        let settings = MatchSettings::new(MatchMode::Prefix, "xy");
        assert_eq!(splitter.find_match(RAW, &settings), "");
    }
}
