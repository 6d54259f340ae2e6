//! Instance class ladder used to pick rightsizing targets.
//!
//! Classes are either `family.size` (`"t3.large"`) or a bare size
//! (`"large"`). A step down keeps the family, except for a few general
//! purpose classes whose cheapest downsize is a burstable `t3` class.

/// Sizes from smallest to largest.
const SIZE_LADDER: &[&str] = &[
    "nano", "micro", "small", "medium", "large", "xlarge", "2xlarge", "4xlarge", "8xlarge",
    "12xlarge", "16xlarge", "24xlarge",
];

/// Explicit downsize targets that take precedence over the ladder.
const DOWNSIZE_OVERRIDES: &[(&str, &str)] = &[("m5.large", "t3.medium"), ("c5.large", "t3.medium")];

fn split(class: &str) -> (Option<&str>, &str) {
    match class.rsplit_once('.') {
        Some((family, size)) => (Some(family), size),
        None => (None, class),
    }
}

fn step(class: &str, delta: isize) -> Option<String> {
    let class = class.trim();
    let (family, size) = split(class);
    let idx = SIZE_LADDER
        .iter()
        .position(|s| s.eq_ignore_ascii_case(size))? as isize;
    let target = SIZE_LADDER.get(usize::try_from(idx + delta).ok()?)?;
    Some(match family {
        Some(f) => format!("{f}.{target}"),
        None => (*target).to_string(),
    })
}

/// Next smaller class, or `None` when nothing smaller is known.
pub fn smaller_instance_type(current: &str) -> Option<String> {
    if let Some((_, target)) = DOWNSIZE_OVERRIDES
        .iter()
        .find(|(from, _)| from.eq_ignore_ascii_case(current.trim()))
    {
        return Some((*target).to_string());
    }
    step(current, -1).filter(|t| !t.eq_ignore_ascii_case(current.trim()))
}

/// Next larger class, or `None` when nothing larger is known.
pub fn larger_instance_type(current: &str) -> Option<String> {
    step(current, 1)
}
