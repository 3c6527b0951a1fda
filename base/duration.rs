// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2020 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

//! Parsing and formatting of the `HH:MM:SS`-ish clock offsets used throughout
//! match metadata (`start_time_offset`, `total_duration`) and ffmpeg `-ss`/
//! `-to` arguments.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::map_res;
use nom::sequence::{preceded, tuple};
use nom::IResult;

/// Parses a non-negative integer of any width.
fn num(input: &str) -> IResult<&str, i64> {
    map_res(digit1, |s: &str| s.parse::<i64>())(input)
}

/// Parses `HH:MM:SS`, `MM:SS`, or a bare `SS` into a second count.
fn parse_clock(input: &str) -> IResult<&str, i64> {
    alt((
        nom::combinator::map(
            tuple((num, preceded(tag(":"), num), preceded(tag(":"), num))),
            |(h, m, s)| h * 3600 + m * 60 + s,
        ),
        nom::combinator::map(tuple((num, preceded(tag(":"), num))), |(m, s)| m * 60 + s),
        num,
    ))(input)
}

/// Parses an `HH:MM:SS`-shaped offset into whole seconds.
///
/// Per spec: `"45:00"` parses as 45 minutes, `"01:30:00"` as 90 minutes.
/// Returns `None` if the string cannot be parsed at all (callers fall back
/// to a default, e.g. 90 minutes for `total_duration`).
pub fn parse_hms_seconds(input: &str) -> Option<i64> {
    let (rest, secs) = parse_clock(input.trim()).ok()?;
    if !rest.is_empty() {
        return None;
    }
    Some(secs)
}

/// Formats a non-negative second count as `HH:MM:SS`.
pub fn format_hms(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hh_mm_ss() {
        assert_eq!(parse_hms_seconds("01:30:00"), Some(90 * 60));
    }

    #[test]
    fn parses_mm_ss_as_minutes_seconds() {
        assert_eq!(parse_hms_seconds("45:00"), Some(45 * 60));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_hms_seconds("not-a-time"), None);
        assert_eq!(parse_hms_seconds(""), None);
    }

    #[test]
    fn format_round_trips() {
        assert_eq!(format_hms(5400), "01:30:00");
        assert_eq!(parse_hms_seconds(&format_hms(5400)), Some(5400));
    }
}
