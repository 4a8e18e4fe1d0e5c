use std::ops::Range;

use crate::config::PreprocessorConfig;
use crate::error::PreprocessError;
use crate::line::{Line, LineStore};
use crate::macros::{Macro, MacroTable};
use crate::scanner::{find_unquoted, is_blank};
use crate::search::{MACRO_DELIMITERS, find_delimited_unquoted};

const DEFINE: &str = "#define";
const MACRO: &str = "#macro";
const ENDMACRO: &str = "#endmacro";

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Define { name: &'a str, value: &'a str },
    MacroStart { name: &'a str },
    EndMacro,
    Ordinary,
}

/// Text after `keyword` if the line starts with it as a whole word
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(is_blank) {
        Some(rest.trim_start_matches(is_blank))
    } else {
        None
    }
}

fn classify(text: &str) -> Result<LineKind<'_>, &'static str> {
    if let Some(rest) = strip_keyword(text, DEFINE) {
        if rest.is_empty() {
            return Err("#define without a name");
        }
        let (name, value) = rest.split_once(is_blank).unwrap_or((rest, ""));
        return Ok(LineKind::Define { name, value });
    }
    if let Some(name) = strip_keyword(text, MACRO) {
        if name.is_empty() {
            return Err("#macro without a name");
        }
        if name.contains(is_blank) {
            return Err("#macro name must be a single word");
        }
        return Ok(LineKind::MacroStart { name });
    }
    if is_endmacro(text) {
        return Ok(LineKind::EndMacro);
    }
    Ok(LineKind::Ordinary)
}

fn is_endmacro(text: &str) -> bool {
    strip_keyword(text, ENDMACRO).is_some_and(str::is_empty)
}

/// `#word` lines that this preprocessor does not handle
fn is_unknown_directive(text: &str) -> bool {
    text.strip_prefix('#')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Text on the current line produced by expanding `macros`, innermost last
#[derive(Debug)]
struct Expansion {
    range: Range<usize>,
    macros: Vec<String>,
}

impl Expansion {
    fn overlaps(&self, other: &Range<usize>) -> bool {
        self.range.start < other.end && other.start < self.range.end
    }

    /// Follow the text after `removed` was replaced by `inserted` bytes
    fn splice(&mut self, removed: &Range<usize>, inserted: usize) {
        let remap = |offset: usize, inside: usize| {
            if offset <= removed.start {
                offset
            } else if offset >= removed.end {
                offset - removed.len() + inserted
            } else {
                inside
            }
        };
        self.range = remap(self.range.start, removed.start)
            ..remap(self.range.end, removed.start + inserted);
    }
}

/// The macro definition and substitution pass
///
/// Walks the line store once from top to bottom. Definition directives are
/// consumed into the macro table; every other line has known macros
/// substituted until none is left, then the cursor moves on. A macro is only
/// visible to lines after its definition.
pub struct Expander<'a> {
    config: &'a PreprocessorConfig,
    macros: &'a mut MacroTable,
}

impl<'a> Expander<'a> {
    /// Create an expander that records definitions in `macros`
    pub fn new(config: &'a PreprocessorConfig, macros: &'a mut MacroTable) -> Self {
        Self { config, macros }
    }

    /// Run the pass over `store`
    ///
    /// # Errors
    /// Returns `PreprocessError::EmptyMacro`,
    /// `PreprocessError::UnterminatedMacroBlock` or
    /// `PreprocessError::MalformedDirective` for bad definitions, and
    /// `PreprocessError::RecursiveMacro` when expansion does not terminate
    /// within the configured limit.
    pub fn run(&mut self, store: &mut LineStore) -> Result<(), PreprocessError> {
        let mut cursor = 0;
        let mut active = Vec::new();

        while cursor < store.len() {
            let line = &store[cursor];
            let kind = classify(line.text())
                .map_err(|message| PreprocessError::malformed(message, line.location()))?;

            match kind {
                LineKind::Define { name, value } => {
                    log::trace!("{}: define {name}", line.location());
                    self.macros.define_inline(name, value, line.location())?;
                    store.remove(cursor);
                    active.clear();
                }
                LineKind::MacroStart { name } => {
                    let name = name.to_string();
                    self.define_block(store, cursor, name)?;
                    active.clear();
                }
                LineKind::EndMacro => {
                    return Err(PreprocessError::malformed(
                        "#endmacro without #macro",
                        line.location(),
                    ));
                }
                LineKind::Ordinary => {
                    if self.substitute(store, cursor, &mut active)? {
                        continue;
                    }
                    let line = &store[cursor];
                    if is_unknown_directive(line.text()) {
                        self.config.warn(&format!(
                            "{}: unrecognised directive passed through: {}",
                            line.location(),
                            line.text()
                        ));
                    }
                    cursor += 1;
                    active.clear();
                }
            }
        }

        log::debug!(
            "expand pass: {} macros, {} lines",
            self.macros.len(),
            store.len()
        );
        Ok(())
    }

    /// Consume the block starting at `start` into the macro table
    fn define_block(
        &mut self,
        store: &mut LineStore,
        start: usize,
        name: String,
    ) -> Result<(), PreprocessError> {
        let location = store[start].location();
        let Some(end) = (start + 1..store.len()).find(|&i| is_endmacro(store[i].text())) else {
            return Err(PreprocessError::UnterminatedMacroBlock { name, location });
        };

        let block = store.remove_range(start..end + 1);
        let body: Vec<String> = block[1..block.len() - 1]
            .iter()
            .map(|line| line.text().to_string())
            .collect();
        log::trace!("{location}: macro {name}, {} lines", body.len());
        self.macros.define_block(&name, body, location)
    }

    /// Substitute the first macro found on the line at `cursor`
    ///
    /// `active` holds the spans of the line produced by earlier substitutions.
    /// Returns `false` if no macro occurs on the line.
    fn substitute(
        &self,
        store: &mut LineStore,
        cursor: usize,
        active: &mut Vec<Expansion>,
    ) -> Result<bool, PreprocessError> {
        let line = &store[cursor];
        let Some((mac, range)) = self.find_invocation(line.text()) else {
            return Ok(false);
        };

        let mut enclosing: Vec<String> = active
            .iter()
            .filter(|expansion| expansion.overlaps(&range))
            .flat_map(|expansion| expansion.macros.iter().cloned())
            .collect();
        let reentered = enclosing.iter().any(|name| name == mac.name());
        let too_deep = mac.is_multiline() && line.expansion_depth() >= self.config.recursion_limit;
        if reentered || too_deep {
            return Err(PreprocessError::RecursiveMacro {
                name: mac.name().to_string(),
                location: line.location(),
            });
        }

        let Some((first, rest)) = mac.body().split_first() else {
            return Err(PreprocessError::EmptyMacro {
                name: mac.name().to_string(),
                location: mac.defined_at().clone(),
            });
        };
        let spawned: Vec<Line> = rest.iter().map(|text| line.spawn(text.as_str())).collect();
        log::trace!("{}: expand {}", line.location(), mac.name());

        for expansion in active.iter_mut() {
            expansion.splice(&range, first.len());
        }
        enclosing.push(mac.name().to_string());
        active.push(Expansion {
            range: range.start..range.start + first.len(),
            macros: enclosing,
        });

        if let Some(line) = store.get_mut(cursor) {
            line.text_mut().replace_range(range, first);
        }
        store.insert_all(cursor + 1, spawned);
        Ok(true)
    }

    /// First macro, in definition order, invoked on `text`
    fn find_invocation(&self, text: &str) -> Option<(&Macro, Range<usize>)> {
        self.macros.iter().find_map(|mac| {
            let name = mac.name();
            if let Some(offset) =
                find_delimited_unquoted(text, name, MACRO_DELIMITERS, self.config.boundary)
            {
                return Some((mac, offset..offset + name.len()));
            }
            let wrapped = format!("#({name})");
            find_unquoted(text, &wrapped, 0).map(|offset| (mac, offset..offset + wrapped.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Origin;
    use crate::macros::Redefinition;
    use crate::search::Boundary;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn run_with(config: &PreprocessorConfig, source: &str) -> Result<Vec<String>, PreprocessError> {
        let mut store = LineStore::from_source(source, &Origin::root(PathBuf::from("t.asm")));
        let mut macros = MacroTable::new(config.redefinition);
        Expander::new(config, &mut macros).run(&mut store)?;
        Ok(store.texts().map(str::to_string).collect())
    }

    fn run(source: &str) -> Vec<String> {
        run_with(&PreprocessorConfig::default(), source).unwrap()
    }

    #[test]
    fn classifies_directives() {
        assert_eq!(
            classify("#define N 5 6"),
            Ok(LineKind::Define {
                name: "N",
                value: "5 6"
            })
        );
        assert_eq!(
            classify("#define EMPTY"),
            Ok(LineKind::Define {
                name: "EMPTY",
                value: ""
            })
        );
        assert_eq!(classify("#macro M"), Ok(LineKind::MacroStart { name: "M" }));
        assert_eq!(classify("#macrogroup G"), Ok(LineKind::Ordinary));
        assert_eq!(classify("#endmacro"), Ok(LineKind::EndMacro));
        assert_eq!(classify("#defined X"), Ok(LineKind::Ordinary));
        assert!(classify("#define").is_err());
        assert!(classify("#macro").is_err());
    }

    #[test]
    fn define_is_consumed_and_substituted() {
        assert_eq!(run("#define N 5\npush N"), ["push 5"]);
    }

    #[test]
    fn substitution_respects_boundaries() {
        assert_eq!(run("#define X 1\nFOOX BAR X"), ["FOOX BAR 1"]);
    }

    #[test]
    fn trailing_boundary_also_matches_identifier_suffix() {
        let config = PreprocessorConfig::default().with_boundary(Boundary::Trailing);
        let out = run_with(&config, "#define X 1\nFOOX BAR X").unwrap();
        assert_eq!(out, ["FOO1 BAR 1"]);
    }

    #[test]
    fn block_macro_expands_to_lines_in_order() {
        let src = "#macro SWAP\nmov a,1\nmov b,2\n#endmacro\nSWAP\nend";
        assert_eq!(run(src), ["mov a,1", "mov b,2", "end"]);
    }

    #[test]
    fn multiline_invocation_mid_line() {
        let src = "#macro M\na\nb\n#endmacro\nx M y";
        assert_eq!(run(src), ["x a y", "b"]);
    }

    #[test]
    fn forward_references_stay_literal() {
        assert_eq!(run("push N\n#define N 5\npush N"), ["push N", "push 5"]);
    }

    #[test]
    fn wrapped_form_splices_inside_a_word() {
        assert_eq!(run("#define R reg\nlabel#(R)x"), ["labelregx"]);
    }

    #[test]
    fn every_invocation_on_a_line_is_replaced() {
        assert_eq!(run("#define A 1\n#define B 2\npush A,B,A"), ["push 1,2,1"]);
    }

    #[test]
    fn expansion_is_rescanned() {
        assert_eq!(run("#define ONE 1\n#define TWO ONE,ONE\npush TWO"), ["push 1,1"]);
    }

    #[test]
    fn consecutive_defines_build_a_multiline_macro() {
        let src = "#define INIT push 0\n#define INIT pop\nINIT";
        assert_eq!(run(src), ["push 0", "pop"]);

        let config = PreprocessorConfig::default().with_redefinition(Redefinition::Replace);
        assert_eq!(run_with(&config, src).unwrap(), ["pop"]);
    }

    #[test]
    fn string_literals_are_not_substituted() {
        assert_eq!(run("#define N 5\nprint \"N\",N"), ["print \"N\",5"]);
    }

    #[test]
    fn expansion_can_produce_a_definition() {
        assert_eq!(run("#define D #define Z 9\nD\npush Z"), ["push 9"]);
    }

    #[test]
    fn block_bodies_are_verbatim() {
        let src = "#macro M\n#define Q 1\n#endmacro\nM\npush Q";
        assert_eq!(run(src), ["push 1"]);
    }

    #[test]
    fn empty_block_is_fatal() {
        let err = run_with(&PreprocessorConfig::default(), "nop\n#macro E\n#endmacro").unwrap_err();
        match err {
            PreprocessError::EmptyMacro { name, location } => {
                assert_eq!(name, "E");
                assert_eq!(location.line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_block_is_fatal() {
        let err = run_with(&PreprocessorConfig::default(), "#macro M\npush 1").unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::UnterminatedMacroBlock { ref name, ref location }
                if name == "M" && location.line == 1
        ));
    }

    #[test]
    fn stray_endmacro_is_fatal() {
        let err = run_with(&PreprocessorConfig::default(), "push 1\n#endmacro").unwrap_err();
        assert!(matches!(err, PreprocessError::MalformedDirective { .. }));
    }

    #[test]
    fn self_reference_is_detected() {
        let err = run_with(&PreprocessorConfig::default(), "#define X X\npush X").unwrap_err();
        assert!(matches!(err, PreprocessError::RecursiveMacro { ref name, .. } if name == "X"));

        let config = PreprocessorConfig::default().with_recursion_limit(8);
        let err = run_with(&config, "#macro M\nnop\nM\n#endmacro\nM").unwrap_err();
        assert!(matches!(err, PreprocessError::RecursiveMacro { ref name, .. } if name == "M"));
    }

    #[test]
    fn mutual_reference_is_detected() {
        let src = "#define A B,1\n#define B A\npush A";
        let err = run_with(&PreprocessorConfig::default(), src).unwrap_err();
        assert!(matches!(err, PreprocessError::RecursiveMacro { ref name, .. } if name == "A"));
    }

    #[test]
    fn repeated_invocations_are_not_recursion() {
        let config = PreprocessorConfig::default().with_recursion_limit(4);
        let line = format!("data {}", vec!["K"; 129].join(","));
        let out = run_with(&config, &format!("#define K 7\n{line}")).unwrap();
        assert_eq!(out, [format!("data {}", vec!["7"; 129].join(","))]);

        let src = "#define ONE 1\n#define PAIR ONE,ONE\npush PAIR,PAIR,ONE";
        assert_eq!(run(src), ["push 1,1,1,1,1"]);
    }

    #[test]
    fn valueless_define_is_fatal() {
        let err = run_with(&PreprocessorConfig::default(), "#define E\npush 1 E").unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::EmptyMacro { ref name, ref location }
                if name == "E" && location.line == 1
        ));
    }

    #[test]
    fn expansion_spans_follow_edits() {
        let mut outer = Expansion {
            range: 5..12,
            macros: vec!["PAIR".to_string()],
        };
        outer.splice(&(5..8), 1);
        assert_eq!(outer.range, 5..10);

        let mut after = Expansion {
            range: 9..10,
            macros: Vec::new(),
        };
        after.splice(&(2..4), 5);
        assert_eq!(after.range, 12..13);
    }

    #[test]
    fn unknown_directives_pass_through_with_warning() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&warnings);
        let config = PreprocessorConfig::default().with_warning_handler(Rc::new(move |msg: &str| {
            sink.borrow_mut().push(msg.to_string());
        }));
        let out = run_with(&config, "#define G grp\n#macrogroup G\npush 1").unwrap();
        assert_eq!(out, ["#macrogroup grp", "push 1"]);
        assert_eq!(warnings.borrow().len(), 1);
        assert!(warnings.borrow()[0].contains("t.asm:2"));
    }

    #[test]
    fn spawned_lines_keep_invocation_location() {
        let mut store = LineStore::from_source(
            "#macro M\na\nb\n#endmacro\nM",
            &Origin::root(PathBuf::from("t.asm")),
        );
        let config = PreprocessorConfig::default();
        let mut macros = MacroTable::default();
        Expander::new(&config, &mut macros).run(&mut store).unwrap();
        assert_eq!(store[1].text(), "b");
        assert_eq!(store[1].number(), 5);
        assert_eq!(store[1].expansion_depth(), 1);
        assert!(macros.contains("M"));
    }
}
