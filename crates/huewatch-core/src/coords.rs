//! Coordinate text parsing.
//!
//! Region text is strict: one bad field invalidates the whole capture
//! area. Point lists are lenient: a bad line must not discard the rest of
//! a long list.

use crate::{Point, Region};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("coordinate text is empty")]
    EmptyInput,
    #[error("malformed region '{text}': expected x/y/width/height")]
    MalformedRegion { text: String },
}

/// Parse a region line: four `/`-separated integers `x/y/width/height`.
/// Fields past the fourth are ignored. No screen-bounds validation here;
/// an impossible size surfaces as a capture failure at sampling time.
pub fn parse_region(text: &str) -> Result<Region, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let mut fields = trimmed.split('/').map(|field| field.trim().parse::<i32>());
    let mut take = || {
        fields
            .next()
            .and_then(|parsed| parsed.ok())
            .ok_or_else(|| ParseError::MalformedRegion {
                text: trimmed.to_string(),
            })
    };

    Ok(Region {
        x: take()?,
        y: take()?,
        width: take()?,
        height: take()?,
    })
}

/// Parse newline-separated `x/y` lines. Lines that do not hold exactly
/// two integers are skipped; the result preserves the order of the lines
/// that parsed. Never fails: empty input gives an empty list.
pub fn parse_points(text: &str) -> Vec<Point> {
    let mut points = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('/').map(|field| field.trim().parse::<i32>());
        match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(x)), Some(Ok(y)), None) => points.push(Point { x, y }),
            _ => debug!(line, "skipping unusable point line"),
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_valid() {
        assert_eq!(
            parse_region("100/200/50/60"),
            Ok(Region {
                x: 100,
                y: 200,
                width: 50,
                height: 60
            })
        );
        // negative origins happen on multi-monitor setups
        assert_eq!(
            parse_region(" -1920/0/1920/1080 "),
            Ok(Region {
                x: -1920,
                y: 0,
                width: 1920,
                height: 1080
            })
        );
    }

    #[test]
    fn test_parse_region_extra_fields_ignored() {
        assert_eq!(
            parse_region("1/2/3/4/5"),
            Ok(Region {
                x: 1,
                y: 2,
                width: 3,
                height: 4
            })
        );
    }

    #[test]
    fn test_parse_region_rejects_short_or_non_integer() {
        assert!(matches!(
            parse_region("1/2/3"),
            Err(ParseError::MalformedRegion { .. })
        ));
        assert!(matches!(
            parse_region("1/2/x/4"),
            Err(ParseError::MalformedRegion { .. })
        ));
        assert_eq!(parse_region(""), Err(ParseError::EmptyInput));
        assert_eq!(parse_region("   \n"), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_parse_points_lenient() {
        let points = parse_points("10/10\nbogus\n20/20\n30/30/40\n\n40/x\n50/60");
        assert_eq!(
            points,
            vec![
                Point { x: 10, y: 10 },
                Point { x: 20, y: 20 },
                Point { x: 50, y: 60 },
            ]
        );
    }

    #[test]
    fn test_parse_points_empty() {
        assert!(parse_points("").is_empty());
        assert!(parse_points("\n\n").is_empty());
    }
}
