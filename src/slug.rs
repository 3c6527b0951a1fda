//! Filename slug rules for the trimmed-output directory and file names.
//!
//! Per spec: lowercase ASCII, spaces and non-alphanumerics replaced by `-`,
//! collapsed (no repeated or trailing/leading `-`).

pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_dash = true; // swallow leading dashes
    for c in input.chars() {
        let lower = c.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(slugify("Team X!!  2024 Season"), "team-x-2024-season");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(slugify("  Leading and trailing  "), "leading-and-trailing");
    }

    #[test]
    fn empty_input() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("---"), "");
    }
}
