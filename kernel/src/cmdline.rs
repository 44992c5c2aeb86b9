//! Tokenizer for the kernel command line.
//!
//! The command line is a whitespace separated list of `flag`s and `key=value`
//! pairs. Keys and values may be quoted to include whitespace or `=`.

/// Zero-copy iterator over the tokens of a command line.
pub struct CmdLine<'a> {
    rest: &'a str,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Token<'a> {
    Flag(&'a str),
    Pair(&'a str, &'a str),
}

impl<'a> CmdLine<'a> {
    pub fn parse(raw: &'a str) -> CmdLine<'a> {
        CmdLine { rest: raw }
    }

    /// Take the next word. A quoted word runs until the closing quote (or the end),
    /// a plain one until whitespace, or until `=` if `stop_at_equals` is set.
    fn word(&mut self, stop_at_equals: bool) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        if let Some(quoted) = self.rest.strip_prefix('"') {
            let (word, rest) = match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            };
            self.rest = rest;
            return Some(word);
        }
        let end = self.rest
            .find(|c: char| c.is_whitespace() || (stop_at_equals && c == '='))
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(word)
    }
}

impl<'a> Iterator for CmdLine<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.rest = self.rest.trim_start();
        let key = self.word(true)?;
        match self.rest.strip_prefix('=') {
            Some(rest) => {
                self.rest = rest;
                Some(Token::Pair(key, self.word(false).unwrap_or("")))
            }
            None => Some(Token::Flag(key)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::vec::Vec;

    fn tokens(input: &str) -> Vec<Token> {
        CmdLine::parse(input).collect()
    }

    #[test]
    fn flags_and_pairs() {
        assert_eq!(tokens("quiet"), [Token::Flag("quiet")]);
        assert_eq!(tokens("mem=64M"), [Token::Pair("mem", "64M")]);
        assert_eq!(tokens("  mem=64M   loglevel=debug quiet "), [
            Token::Pair("mem", "64M"),
            Token::Pair("loglevel", "debug"),
            Token::Flag("quiet"),
        ]);
        assert!(tokens("").is_empty());
        assert!(tokens("   ").is_empty());
    }

    #[test]
    fn values_may_contain_equals() {
        assert_eq!(tokens("root=UUID=1234"), [Token::Pair("root", "UUID=1234")]);
        assert_eq!(tokens("empty="), [Token::Pair("empty", "")]);
    }

    #[test]
    fn quoting() {
        assert_eq!(tokens("\"a b\""), [Token::Flag("a b")]);
        assert_eq!(tokens("\"a=b\"=\"c d\" e"), [Token::Pair("a=b", "c d"), Token::Flag("e")]);
        // unterminated quote runs to the end
        assert_eq!(tokens("title=\"hello world"), [Token::Pair("title", "hello world")]);
    }
}
