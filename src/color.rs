//! Hex colors and RGB distance

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid hex color: {0:?} (expected #RRGGBB)")]
pub struct InvalidHexColor(pub String);

/// Parse `#RRGGBB` or `RRGGBB` (either case).
pub fn parse_hex(value: &str) -> Result<[u8; 3], InvalidHexColor> {
    let digits = value.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Err(InvalidHexColor(value.to_string()));
    }
    let bytes = hex::decode(digits).map_err(|_| InvalidHexColor(value.to_string()))?;
    Ok([bytes[0], bytes[1], bytes[2]])
}

/// Upper-case `#RRGGBB`.
pub fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{}", hex::encode_upper(rgb))
}

pub fn distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Whether two hex colors lie within `tolerance` Euclidean RGB distance.
pub fn color_match(a: &str, b: &str, tolerance: f64) -> Result<bool, InvalidHexColor> {
    Ok(distance(parse_hex(a)?, parse_hex(b)?) <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!(parse_hex("#FF0000").unwrap(), [255, 0, 0]);
        assert_eq!(parse_hex("00ff7f").unwrap(), [0, 255, 127]);
        assert!(parse_hex("#F00").is_err());
        assert!(parse_hex("#GG0000").is_err());
    }

    #[test]
    fn test_roundtrip_uppercase() {
        assert_eq!(to_hex([0x0a, 0xbc, 0xff]), "#0ABCFF");
    }

    #[test]
    fn test_identical_always_match() {
        assert!(color_match("#123456", "#123456", 0.0).unwrap());
        assert!(color_match("#123456", "#123456", 30.0).unwrap());
    }

    #[test]
    fn test_tolerance_edges() {
        // distance between these is exactly 30
        assert!(color_match("#000000", "#1E0000", 30.0).unwrap());
        assert!(!color_match("#000000", "#1F0000", 30.0).unwrap());
        assert!(!color_match("#FF0000", "#00FF00", 30.0).unwrap());
    }

    #[test]
    fn test_malformed_names_value() {
        let err = color_match("#FF0000", "red", 30.0).unwrap_err();
        assert!(err.to_string().contains("red"));
    }
}
