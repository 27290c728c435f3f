use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 1-based cell coordinate inside a worksheet. Serializes in A1 notation, e.g. `"B5"`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef {
    row: u32,
    col: u32,
}

impl CellRef {
    /// Creates a cell reference. Both `row` and `col` start at 1, so `(1, 1)` is `A1`.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    /// The column letters of this cell, e.g. `AB` for column 28.
    pub fn col_letters(&self) -> String {
        let mut n = self.col;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push(char::from(b'A' + rem as u8));
            n = (n - 1) / 26;
        }
        letters.iter().rev().collect()
    }

    /// The cell in A1 notation, e.g. `B5`.
    pub fn a1(&self) -> String {
        format!("{}{}", self.col_letters(), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| anyhow::anyhow!("Cell '{s}' has no row number"))?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() {
            anyhow::bail!("Cell '{s}' has no column letters");
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                anyhow::bail!("Invalid column letter '{c}' in cell '{s}'");
            }
            let value = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
            col = col
                .checked_mul(26)
                .and_then(|v| v.checked_add(value))
                .ok_or_else(|| anyhow::anyhow!("Column of cell '{s}' is out of range"))?;
        }

        let row = digits
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("Invalid row in cell '{s}': {e}"))?;
        if row == 0 {
            anyhow::bail!("Rows start at 1, got cell '{s}'");
        }

        Ok(CellRef::new(row, col))
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.a1())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display() {
        assert_eq!(CellRef::new(1, 1).to_string(), "A1");
        assert_eq!(CellRef::new(5, 2).to_string(), "B5");
        assert_eq!(CellRef::new(3, 26).to_string(), "Z3");
        assert_eq!(CellRef::new(3, 27).to_string(), "AA3");
        assert_eq!(CellRef::new(10, 52).to_string(), "AZ10");
    }

    #[test]
    fn test_cell_from_str() {
        assert_eq!("B5".parse::<CellRef>().unwrap(), CellRef::new(5, 2));
        assert_eq!(" aa12 ".parse::<CellRef>().unwrap(), CellRef::new(12, 27));
        assert_eq!("ZZ1".parse::<CellRef>().unwrap(), CellRef::new(1, 702));
    }

    #[test]
    fn test_cell_from_str_invalid() {
        assert!("5".parse::<CellRef>().is_err());
        assert!("B".parse::<CellRef>().is_err());
        assert!("B0".parse::<CellRef>().is_err());
        assert!("B-1".parse::<CellRef>().is_err());
        assert!("Б5".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_cell_serde() {
        let cell = CellRef::new(26, 2);
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, r#""B26""#);
        let back: CellRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cell);
    }
}
