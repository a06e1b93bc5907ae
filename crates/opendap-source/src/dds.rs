//! Dataset Descriptor Structure (DDS) parsing.
//!
//! Only array declarations matter here: a line like
//! `Float32 pr[time = 31][lat = 300][lon = 400];` yields the variable name
//! and its dimension sizes. Grid wrappers and map vectors repeat a variable
//! inside structure blocks; the first declaration of each name wins.

use crate::error::{DapError, DapResult};

/// One array declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDecl {
    pub name: String,
    pub dims: Vec<(String, usize)>,
}

impl ArrayDecl {
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(|(_, n)| *n).collect()
    }
}

/// Parsed DDS document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dds {
    pub arrays: Vec<ArrayDecl>,
}

impl Dds {
    pub fn parse(text: &str) -> DapResult<Self> {
        if !text.trim_start().starts_with("Dataset") {
            return Err(DapError::parse("DDS does not start with a Dataset block"));
        }

        let mut arrays: Vec<ArrayDecl> = Vec::new();
        for line in text.lines() {
            let Some(decl) = parse_declaration(line.trim())? else {
                continue;
            };
            if !arrays.iter().any(|a| a.name == decl.name) {
                arrays.push(decl);
            }
        }
        Ok(Self { arrays })
    }

    pub fn array(&self, name: &str) -> Option<&ArrayDecl> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Length of a named dimension, taken from any array that uses it.
    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.arrays
            .iter()
            .flat_map(|a| a.dims.iter())
            .find(|(dim, _)| dim == name)
            .map(|(_, n)| *n)
    }
}

/// Parse `Type name[dim = n]...;`, returning `None` for non-array lines.
fn parse_declaration(line: &str) -> DapResult<Option<ArrayDecl>> {
    let Some(body) = line.strip_suffix(';') else {
        return Ok(None);
    };
    let Some(open) = body.find('[') else {
        return Ok(None);
    };

    let head = &body[..open];
    let Some(name) = head.split_whitespace().nth(1) else {
        return Ok(None);
    };

    let mut dims = Vec::new();
    for part in body[open..].split('[').skip(1) {
        let inner = part
            .strip_suffix(']')
            .ok_or_else(|| DapError::parse(format!("unterminated dimension in `{line}`")))?;
        let (dim, size) = match inner.split_once('=') {
            Some((dim, size)) => (dim.trim().to_string(), size.trim()),
            None => (String::new(), inner.trim()),
        };
        let size = size
            .parse::<usize>()
            .map_err(|_| DapError::parse(format!("bad dimension size in `{line}`")))?;
        dims.push((dim, size));
    }

    Ok(Some(ArrayDecl {
        name: name.to_string(),
        dims,
    }))
}
