use std::cmp::Ordering;

/// Compares two version identifiers oldest-to-newest.
///
/// Published versions are decimal integers assigned in increasing order, so they
/// compare numerically ("10" is newer than "9"). Identifiers that are not
/// numeric rank above every numeric one and compare lexically among themselves.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(left_number), Ok(right_number)) => left_number.cmp(&right_number),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

/// Sorts newest first.
pub fn sort_newest_first(versions: &mut [String]) {
    versions.sort_by(|left, right| compare_versions(right, left));
}
