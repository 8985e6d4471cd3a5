//! Text form of a symbol sequence: one symbol per line, `1` for a high
//! channel and `0` for a low one. Blank lines and `#` comments are skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolParseError {
    #[error("line {line}: unexpected character {found:?}, expected '0' or '1'")]
    InvalidChar { line: usize, found: char },

    #[error("line {line}: symbol has {actual} bits, expected {expected}")]
    WrongLength {
        line: usize,
        expected: usize,
        actual: usize,
    },
}

pub fn parse_symbols(text: &str, bits_per_symbol: usize) -> Result<Vec<Vec<bool>>, SymbolParseError> {
    let mut symbols = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let bits = content
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                found => Err(SymbolParseError::InvalidChar { line, found }),
            })
            .collect::<Result<Vec<bool>, _>>()?;

        if bits.len() != bits_per_symbol {
            return Err(SymbolParseError::WrongLength {
                line,
                expected: bits_per_symbol,
                actual: bits.len(),
            });
        }
        symbols.push(bits);
    }

    Ok(symbols)
}

pub fn format_symbols(symbols: &[Vec<bool>]) -> String {
    let mut out = String::new();
    for symbol in symbols {
        out.extend(symbol.iter().map(|&b| if b { '1' } else { '0' }));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols() {
        let text = "# header\n1010\n\n0 1 1 0  # spaced\n1111\n";
        let symbols = parse_symbols(text, 4).unwrap();
        assert_eq!(
            symbols,
            vec![
                vec![true, false, true, false],
                vec![false, true, true, false],
                vec![true, true, true, true],
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_character() {
        let err = parse_symbols("1010\n10x0\n", 4).unwrap_err();
        assert!(matches!(err, SymbolParseError::InvalidChar { line: 2, found: 'x' }));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = parse_symbols("101\n", 4).unwrap_err();
        assert!(matches!(
            err,
            SymbolParseError::WrongLength { line: 1, expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn test_format_matches_parse() {
        let symbols = vec![vec![true, false, false], vec![false, false, true]];
        let text = format_symbols(&symbols);
        assert_eq!(text, "100\n001\n");
        assert_eq!(parse_symbols(&text, 3).unwrap(), symbols);
    }
}
