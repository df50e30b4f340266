const SNIFF_LEN: usize = 1024;

/// Decides text-vs-binary for a byte buffer using a NUL-byte and
/// non-printable-ratio heuristic on a bounded prefix.
///
/// An empty buffer is classified as text; callers exclude empty files from
/// upload independently of this check.
pub fn is_binary(content: &[u8]) -> bool {
    if content.is_empty() {
        return false;
    }
    let prefix = &content[..content.len().min(SNIFF_LEN)];

    if prefix.contains(&0u8) {
        return true;
    }

    let non_printable = prefix
        .iter()
        .filter(|&&b| b < 32 && b != 9 && b != 10 && b != 13)
        .count();

    (non_printable as f64 / prefix.len() as f64) > 0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_not_binary() {
        assert!(!is_binary(b""));
    }

    #[test]
    fn plain_text_is_not_binary() {
        assert!(!is_binary(b"hello\nworld\t!\r\n"));
    }

    #[test]
    fn nul_byte_marks_binary() {
        let mut buf = b"hello".to_vec();
        buf.push(0);
        buf.extend_from_slice(b"world");
        assert!(is_binary(&buf));
    }

    #[test]
    fn nul_byte_past_sniff_window_is_ignored() {
        let mut buf = vec![b'a'; SNIFF_LEN];
        buf.push(0);
        assert!(!is_binary(&buf));
    }

    #[test]
    fn high_control_byte_ratio_marks_binary() {
        let buf = vec![0x01u8; 100];
        assert!(is_binary(&buf));
    }

    #[test]
    fn low_control_byte_ratio_stays_text() {
        let mut buf = vec![b'a'; 97];
        buf.extend_from_slice(&[0x01, 0x02, 0x03]);
        assert!(!is_binary(&buf));
    }

    #[test]
    fn tab_newline_and_cr_do_not_count_as_control() {
        let buf = vec![9u8; 50]
            .into_iter()
            .chain(vec![10u8; 50])
            .collect::<Vec<_>>();
        assert!(!is_binary(&buf));
    }
}
