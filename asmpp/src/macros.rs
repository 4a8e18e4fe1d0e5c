use std::collections::HashMap;

use crate::error::{Location, PreprocessError};

/// What a second definition of an existing macro does
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Redefinition {
    /// New body lines are appended, so consecutive `#define`s of one name
    /// build a multi-line macro
    #[default]
    Append,
    /// The new body replaces the old one; the macro keeps its place in the
    /// lookup order
    Replace,
}

/// A macro definition
#[derive(Clone, Debug)]
pub struct Macro {
    name: String,
    body: Vec<String>,
    defined_at: Location,
}

impl Macro {
    /// Name the macro is invoked by
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Body lines, never empty
    #[must_use]
    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// Whether expanding the macro inserts new lines
    #[must_use]
    pub fn is_multiline(&self) -> bool {
        self.body.len() > 1
    }

    /// Location of the most recent definition directive
    #[must_use]
    pub const fn defined_at(&self) -> &Location {
        &self.defined_at
    }
}

/// Macros known so far, in definition order
///
/// Lookup during expansion walks the table in the order names were first
/// defined; the first name found on a line wins.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    macros: Vec<Macro>,
    index: HashMap<String, usize>,
    redefinition: Redefinition,
}

impl MacroTable {
    /// Create an empty table
    #[must_use]
    pub fn new(redefinition: Redefinition) -> Self {
        Self {
            macros: Vec::new(),
            index: HashMap::new(),
            redefinition,
        }
    }

    /// Record one `#define NAME VALUE` directive
    ///
    /// # Errors
    /// Returns `PreprocessError::EmptyMacro` if `value` is empty; the table is
    /// left unchanged.
    pub fn define_inline(
        &mut self,
        name: &str,
        value: impl Into<String>,
        at: Location,
    ) -> Result<(), PreprocessError> {
        let value = value.into();
        if value.is_empty() {
            return Err(PreprocessError::EmptyMacro {
                name: name.to_string(),
                location: at,
            });
        }
        self.insert(name, vec![value], at);
        Ok(())
    }

    /// Record a `#macro NAME` … `#endmacro` block
    ///
    /// # Errors
    /// Returns `PreprocessError::EmptyMacro` if `body` is empty; the table is
    /// left unchanged.
    pub fn define_block(
        &mut self,
        name: &str,
        body: Vec<String>,
        at: Location,
    ) -> Result<(), PreprocessError> {
        if body.is_empty() {
            return Err(PreprocessError::EmptyMacro {
                name: name.to_string(),
                location: at,
            });
        }
        self.insert(name, body, at);
        Ok(())
    }

    fn insert(&mut self, name: &str, body: Vec<String>, at: Location) {
        if let Some(&i) = self.index.get(name) {
            let existing = &mut self.macros[i];
            match self.redefinition {
                Redefinition::Append => existing.body.extend(body),
                Redefinition::Replace => existing.body = body,
            }
            existing.defined_at = at;
            return;
        }
        self.index.insert(name.to_string(), self.macros.len());
        self.macros.push(Macro {
            name: name.to_string(),
            body,
            defined_at: at,
        });
    }

    /// Look up a macro by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.index.get(name).map(|&i| &self.macros[i])
    }

    /// Check if a macro is defined
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of macros
    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Whether no macro has been defined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Iterate in definition order
    pub fn iter(&self) -> std::slice::Iter<'_, Macro> {
        self.macros.iter()
    }
}

impl<'a> IntoIterator for &'a MacroTable {
    type Item = &'a Macro;
    type IntoIter = std::slice::Iter<'a, Macro>;

    fn into_iter(self) -> Self::IntoIter {
        self.macros.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize) -> Location {
        Location::new("m.asm", line)
    }

    #[test]
    fn repeated_define_appends_by_default() {
        let mut table = MacroTable::default();
        table.define_inline("INIT", "push 0", at(1)).unwrap();
        table.define_inline("INIT", "pop", at(2)).unwrap();
        let mac = table.get("INIT").unwrap();
        assert_eq!(mac.body(), ["push 0", "pop"]);
        assert!(mac.is_multiline());
        assert_eq!(mac.defined_at().line, 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn replace_policy_overwrites() {
        let mut table = MacroTable::new(Redefinition::Replace);
        table.define_inline("N", "1", at(1)).unwrap();
        table.define_inline("N", "2", at(2)).unwrap();
        assert_eq!(table.get("N").unwrap().body(), ["2"]);
    }

    #[test]
    fn empty_block_is_rejected() {
        let mut table = MacroTable::default();
        let err = table.define_block("EMPTY", Vec::new(), at(4)).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyMacro { ref name, .. } if name == "EMPTY"));
        assert!(!table.contains("EMPTY"));
    }

    #[test]
    fn valueless_define_is_rejected() {
        let mut table = MacroTable::default();
        let err = table.define_inline("FLAG", "", at(3)).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::EmptyMacro { ref name, ref location }
                if name == "FLAG" && location.line == 3
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn iteration_follows_first_definition() {
        let mut table = MacroTable::new(Redefinition::Replace);
        table.define_inline("B", "1", at(1)).unwrap();
        table.define_block("A", vec!["x".into(), "y".into()], at(2)).unwrap();
        table.define_inline("B", "2", at(5)).unwrap();
        let names: Vec<_> = table.iter().map(Macro::name).collect();
        assert_eq!(names, ["B", "A"]);
    }
}
