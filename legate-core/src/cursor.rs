use std::sync::Arc;

use legate::parameter::Parameter;

/// The dual position tracker used during resolution.
///
/// Tracks the current raw-token index and the current-parameter index
/// independently; they diverge whenever an optional parameter is
/// skipped. Raw indices marked in the flag mask are transparent: the
/// cursor never lands on them, so flag tokens do not shift positional
/// alignment. One cursor lives for one execution.
pub struct Cursor<S> {
    parameters: Arc<Vec<Parameter<S>>>,
    raws: Vec<String>,
    mask: Vec<bool>,
    raw: usize,
    param: usize,
}

impl<S> Cursor<S> {
    pub fn new(parameters: Arc<Vec<Parameter<S>>>, raws: Vec<String>, mask: Vec<bool>) -> Self {
        let mut cursor = Self {
            parameters,
            raws,
            mask,
            raw: 0,
            param: 0,
        };
        cursor.align();
        cursor
    }

    fn align(&mut self) {
        while self.raw < self.raws.len() && self.mask[self.raw] {
            self.raw += 1;
        }
    }

    pub fn parameters(&self) -> &[Parameter<S>] {
        &self.parameters
    }

    pub fn raws(&self) -> &[String] {
        &self.raws
    }

    pub fn current_parameter(&self) -> Option<&Parameter<S>> {
        self.parameters.get(self.param)
    }

    /// The parameter `offset` positions after the current one.
    pub fn peek_parameter(&self, offset: usize) -> Option<&Parameter<S>> {
        self.parameters.get(self.param + offset)
    }

    pub fn current_raw(&self) -> Option<&str> {
        self.raws.get(self.raw).map(String::as_str)
    }

    /// Advances past the current raw token to the next unmasked one.
    pub fn advance_raw(&mut self) {
        if self.raw < self.raws.len() {
            self.raw += 1;
            self.align();
        }
    }

    /// Advances the parameter index only, leaving the raw token in place
    /// for the next parameter.
    pub fn skip_parameter(&mut self) {
        self.param += 1;
    }

    /// Consumes one token for one parameter.
    pub fn advance(&mut self) {
        self.advance_raw();
        self.skip_parameter();
    }

    /// Unmasked tokens remaining strictly after the current one.
    pub fn remaining_raws_after_current(&self) -> usize {
        if self.raw >= self.raws.len() {
            return 0;
        }
        (self.raw + 1..self.raws.len())
            .filter(|&i| !self.mask[i])
            .count()
    }

    /// Required parameters pending after the current one.
    pub fn remaining_required_after_current(&self) -> usize {
        match self.parameters.get(self.param + 1..) {
            Some(rest) => rest.iter().filter(|p| p.is_required()).count(),
            None => 0,
        }
    }

    /// Joins every remaining unmasked token into one value and exhausts
    /// the raw cursor. Used by greedy parameters.
    pub fn join_remaining(&mut self) -> String {
        let mut parts = Vec::new();
        while self.raw < self.raws.len() {
            if !self.mask[self.raw] {
                parts.push(self.raws[self.raw].clone());
            }
            self.raw += 1;
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Cursor;
    use legate::parameter::Parameter;
    use legate::types;

    fn cursor(raws: &[&str], mask: &[bool]) -> Cursor<u64> {
        let parameters = Arc::new(vec![
            Parameter::required("target", types::word()),
            Parameter::optional("duration", types::word()),
            Parameter::optional("reason", types::word()).greedy(),
        ]);

        Cursor::new(
            parameters,
            raws.iter().map(|r| r.to_string()).collect(),
            mask.to_vec(),
        )
    }

    #[test]
    fn test_cursors_diverge() {
        let mut cursor = cursor(&["griefer", "7d"], &[false, false]);

        assert_eq!(cursor.current_raw(), Some("griefer"));
        assert_eq!(cursor.current_parameter().unwrap().name, "target");

        // Skipping the parameter keeps the raw token in place.
        cursor.advance();
        cursor.skip_parameter();
        assert_eq!(cursor.current_raw(), Some("7d"));
        assert_eq!(cursor.current_parameter().unwrap().name, "reason");
    }

    #[test]
    fn test_mask_is_transparent() {
        let mut cursor = cursor(
            &["griefer", "-s", "-ip", "7d", "spawn"],
            &[false, true, true, false, false],
        );

        assert_eq!(cursor.current_raw(), Some("griefer"));
        assert_eq!(cursor.remaining_raws_after_current(), 2);

        cursor.advance();
        assert_eq!(cursor.current_raw(), Some("7d"));

        cursor.advance();
        assert_eq!(cursor.join_remaining(), "spawn");
        assert_eq!(cursor.current_raw(), None);
    }

    #[test]
    fn test_remaining_required() {
        let cursor = cursor(&["a"], &[false]);
        assert_eq!(cursor.remaining_required_after_current(), 0);
    }
}
