//! Parses the `--generate` override grammar (`spec.md` §4.6) into a tree of
//! rules, and exposes the post-run "every matched rule was used" validation.
//!
//! ```text
//! Program   := Entry ("," Entry)*
//! Entry     := Name ( Rule | "{" Rule ("," Rule)* "}" )
//! Rule      := "=" Value Scope?           -- custom value
//!            | "-=" Value                 -- remove by value
//!            | "#" Range Scope?           -- accept index range
//!            | "-#" Range                 -- remove index range
//!            | "&" Rule Scope?            -- join sibling positive rules sharing one Scope
//! Scope     := "(" Program? ")"
//! Range     := Num | Num ".." | ".." Num | Num ".." Num
//! Value     := bytes up to the next top-level separator in {',','&','('}
//! Name      := identifier
//! ```

mod parser;

use std::cell::Cell;
use std::ops::Range;

pub use parser::parse_program;

/// `Num..Num` with 1-based syntax already converted to a 0-based half-open
/// range; an absent upper bound is `None` (unbounded — "∞").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl IndexRange {
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && self.end.is_none_or(|end| index < end)
    }
}

#[derive(Debug, Clone)]
pub enum RuleAtom {
    Custom(String),
    RemoveValue(String),
    AcceptRange(IndexRange),
    RemoveRange(IndexRange),
}

impl RuleAtom {
    fn is_positive(&self) -> bool {
        matches!(self, RuleAtom::Custom(_) | RuleAtom::AcceptRange(_))
    }
}

/// One or more `&`-joined rules sharing at most one [`Scope`]; a scope may
/// only attach to a group whose members are all positive (`=` or `#`).
#[derive(Debug, Clone)]
pub struct RuleGroup {
    pub members: Vec<RuleAtom>,
    pub scope: Option<Program>,
    pub span: Range<usize>,
    pub was_used: Cell<bool>,
    pub max_index_seen: Cell<Option<u64>>,
}

impl RuleGroup {
    pub fn mark_used(&self) {
        self.was_used.set(true);
    }

    pub fn observe_index(&self, index: u64) {
        let current = self.max_index_seen.get();
        if current.is_none_or(|c| index > c) {
            self.max_index_seen.set(Some(index));
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub groups: Vec<RuleGroup>,
    pub span: Range<usize>,
    pub matched_any_generator: Cell<bool>,
}

/// The default acceptance for natural (non-custom) values is decided by the
/// entry's first rule: if it is `=` or `#`, natural values are rejected by
/// default; otherwise (a `-=`/`-#` first) they are accepted by default.
impl Entry {
    pub fn default_accept(&self) -> bool {
        match self.groups.first().and_then(|g| g.members.first()) {
            Some(RuleAtom::Custom(_)) | Some(RuleAtom::AcceptRange(_)) => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub entries: Vec<Entry>,
}

impl Program {
    pub fn entry_for(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Post-run validation (`spec.md` §4.6): every rule on every entry that
    /// matched at least one generator must have been used, and index ranges
    /// must not claim an upper bound beyond the maximum index actually
    /// observed. Entries that matched nothing at all also fail. Returns the
    /// first violation found, if any.
    pub fn validate(&self) -> Result<(), crate::error::UserError> {
        for entry in &self.entries {
            if !entry.matched_any_generator.get() {
                return Err(crate::error::UserError::UnmatchedOverrideEntry {
                    entry: entry.name.clone(),
                });
            }
            for group in &entry.groups {
                if !group.was_used.get() {
                    return Err(crate::error::UserError::UnusedOverrideRule {
                        entry: entry.name.clone(),
                    });
                }
                for member in &group.members {
                    if let RuleAtom::AcceptRange(range) = member {
                        if let Some(end) = range.end {
                            let max_seen = group.max_index_seen.get().unwrap_or(0);
                            if end > max_seen + 1 {
                                return Err(crate::error::UserError::IndexRangeExceeded {
                                    entry: entry.name.clone(),
                                });
                            }
                        }
                    }
                }
                self.validate_nested(group)?;
            }
        }
        Ok(())
    }

    fn validate_nested(&self, group: &RuleGroup) -> Result<(), crate::error::UserError> {
        if let Some(scope) = &group.scope {
            scope.validate()?;
        }
        Ok(())
    }

    /// Collapses nested scopes into one flat program: a scope's entries
    /// stand in for "what a downstream generator's rules become once this
    /// value has been selected" (`spec.md` §4.6), but this implementation's
    /// overriding listener has no hook into "this particular value is
    /// currently selected" — its generators are each claimed once, up
    /// front. Rather than model the activation window, a scope's entries
    /// are merged permanently over any base entry sharing their name,
    /// document order deciding ties between sibling scopes. A deliberate
    /// simplification; see `DESIGN.md`.
    pub fn flatten(&self) -> Program {
        let mut entries: Vec<Entry> = Vec::new();
        for entry in &self.entries {
            upsert(&mut entries, entry.clone());
        }
        for entry in &self.entries {
            for group in &entry.groups {
                if let Some(scope) = &group.scope {
                    for nested in scope.flatten().entries {
                        upsert(&mut entries, nested);
                    }
                }
            }
        }
        Program { entries }
    }

    /// Combines the programs parsed from a sequence of `--generate` flags
    /// into one, later flags winning over earlier ones entry-by-entry when
    /// both name the same generator.
    pub fn merge_cli_flags(programs: Vec<Program>) -> Program {
        let mut entries: Vec<Entry> = Vec::new();
        for program in programs {
            for entry in program.entries {
                upsert(&mut entries, entry);
            }
        }
        Program { entries }
    }
}

fn upsert(entries: &mut Vec<Entry>, new_entry: Entry) {
    if let Some(existing) = entries.iter_mut().find(|e| e.name == new_entry.name) {
        *existing = new_entry;
    } else {
        entries.push(new_entry);
    }
}
