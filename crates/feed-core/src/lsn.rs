//! PostgreSQL LSN comparison.

use std::cmp::Ordering;

/// Compare two LSN strings numerically.
///
/// LSNs are rendered by PostgreSQL as `segment/offset` with hexadecimal
/// components (e.g. `"0/1949850"`), so plain string comparison is wrong as
/// soon as the components differ in width (`"0/10"` must sort above `"0/9"`).
///
/// Falls back to string comparison when either side does not parse, so
/// malformed input still yields a total order.
pub fn compare_lsn(a: &str, b: &str) -> Ordering {
    let parse = |lsn: &str| -> Option<(u64, u64)> {
        let (segment, offset) = lsn.split_once('/')?;
        Some((
            u64::from_str_radix(segment, 16).ok()?,
            u64::from_str_radix(offset, 16).ok()?,
        ))
    };

    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(compare_lsn("0/10", "0/9"), Ordering::Greater);
        assert_eq!(compare_lsn("0/9", "0/10"), Ordering::Less);
    }

    #[test]
    fn segment_dominates_offset() {
        assert_eq!(compare_lsn("1/0", "0/FFFFFFFF"), Ordering::Greater);
    }

    #[test]
    fn equal_lsns() {
        assert_eq!(compare_lsn("0/1949850", "0/1949850"), Ordering::Equal);
    }

    #[test]
    fn malformed_falls_back_to_string_order() {
        assert_eq!(compare_lsn("bogus", "bogus"), Ordering::Equal);
        assert_eq!(compare_lsn("a", "b"), Ordering::Less);
    }
}
