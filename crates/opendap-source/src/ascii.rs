//! DAP2 ASCII response parsing.
//!
//! A constrained `.ascii` request returns each projected array as a header
//! line carrying its shape, followed by rows of comma separated values:
//!
//! ```text
//! pr, [1][2][3]
//! [0][0], 1.0, 2.0, 3.0
//! [0][1], 4.0, 5.0, 6.0
//! ```
//!
//! Some servers qualify the name (`pr.pr`) or print a one-dimensional array
//! inline (`lat, -10.0, -9.5`); both forms are accepted.

use crate::error::{DapError, DapResult};

/// Values of one array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl AsciiArray {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_f32(self) -> Vec<f32> {
        self.values.into_iter().map(|v| v as f32).collect()
    }
}

/// Extract the array called `name` from an ASCII response body.
pub fn parse_array(body: &str, name: &str) -> DapResult<AsciiArray> {
    let mut lines = body.lines().map(str::trim);

    while let Some(line) = lines.next() {
        let Some((label, rest)) = line.split_once(',') else {
            continue;
        };
        if !label_matches(label.trim(), name) {
            continue;
        }

        let rest = rest.trim();
        if rest.starts_with('[') {
            let shape = parse_shape(rest)?;
            let expected: usize = shape.iter().product();
            let values = collect_values(&mut lines, expected, name)?;
            return Ok(AsciiArray { shape, values });
        }

        // Inline one-dimensional form
        let values = parse_row(rest)?;
        return Ok(AsciiArray {
            shape: vec![values.len()],
            values,
        });
    }

    Err(DapError::parse(format!("array `{name}` not present in response")))
}

fn label_matches(label: &str, name: &str) -> bool {
    label == name || label.rsplit('.').next() == Some(name)
}

/// Parse `[1][2][3]` into a shape.
fn parse_shape(text: &str) -> DapResult<Vec<usize>> {
    text.split('[')
        .skip(1)
        .map(|part| {
            part.trim()
                .strip_suffix(']')
                .and_then(|n| n.trim().parse::<usize>().ok())
                .ok_or_else(|| DapError::parse(format!("bad shape `{text}`")))
        })
        .collect()
}

fn collect_values<'a, I>(lines: &mut I, expected: usize, name: &str) -> DapResult<Vec<f64>>
where
    I: Iterator<Item = &'a str>,
{
    let mut values = Vec::with_capacity(expected);
    for line in lines.by_ref() {
        if values.len() >= expected {
            break;
        }
        if line.is_empty() {
            continue;
        }
        values.extend(parse_row(strip_index_prefix(line))?);
    }

    if values.len() != expected {
        return Err(DapError::parse(format!(
            "array `{name}` has {} values, shape needs {expected}",
            values.len()
        )));
    }
    Ok(values)
}

/// Drop a leading `[i][j],` row index.
fn strip_index_prefix(line: &str) -> &str {
    if !line.starts_with('[') {
        return line;
    }
    match line.split_once(',') {
        Some((_, rest)) => rest,
        None => "",
    }
}

fn parse_row(row: &str) -> DapResult<Vec<f64>> {
    row.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| DapError::parse(format!("bad value `{s}`")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLICE: &str = "\
pr, [1][2][3]
[0][0], 1.5e-05, 0, 2.0
[0][1], -9e+33, 3.25, 4


time, [1]
738887
lat, [2]
-10, -9
lon, [3]
100, 101, 102
";

    #[test]
    fn test_parse_hyperslab() {
        let pr = parse_array(SLICE, "pr").unwrap();
        assert_eq!(pr.shape, vec![1, 2, 3]);
        assert_eq!(pr.values, vec![1.5e-5, 0.0, 2.0, -9e33, 3.25, 4.0]);
    }

    #[test]
    fn test_parse_map_vectors() {
        assert_eq!(parse_array(SLICE, "lat").unwrap().values, vec![-10.0, -9.0]);
        assert_eq!(parse_array(SLICE, "lon").unwrap().len(), 3);
    }

    #[test]
    fn test_qualified_and_inline_forms() {
        let body = "Dataset: inarcm\nlat.lat, -10.0, -9.5, -9.0\n";
        let lat = parse_array(body, "lat").unwrap();
        assert_eq!(lat.shape, vec![3]);
        assert_eq!(lat.values[1], -9.5);
    }

    #[test]
    fn test_short_body_is_error() {
        let body = "pr, [1][2][2]\n[0][0], 1, 2\n";
        let err = parse_array(body, "pr").unwrap_err();
        assert!(err.to_string().contains("has 2 values"));
    }

    #[test]
    fn test_missing_array() {
        assert!(parse_array(SLICE, "tas").is_err());
        assert!(parse_array("", "pr").is_err());
    }

    #[test]
    fn test_nan_values() {
        let arr = parse_array("pr, [2]\nNaN, 1\n", "pr").unwrap();
        assert!(arr.values[0].is_nan());
    }
}
