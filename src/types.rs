use std::{collections::HashMap, fmt};

use crate::ast::Defun;

/// The structural type lattice. `Any` is the supertype of every other type
/// and also stands for "unknown".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Number,
    List,
    Any,
}

impl Type {
    pub fn is_subtype_of(self, other: Type) -> bool {
        self == other || other == Type::Any
    }

    /// Whether a value of this type may be used where `expected` is
    /// required. `Any` is accepted everywhere since it may hold anything.
    pub fn is_compatible_with(self, expected: Type) -> bool {
        self == Type::Any || self.is_subtype_of(expected)
    }

    /// The type of an expression which may evaluate to either operand.
    pub fn join(self, other: Type) -> Type {
        if self == other {
            self
        } else {
            Type::Any
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Type::Number => "Number",
            Type::List => "List",
            Type::Any => "Any",
        })
    }
}

/// Maps each function name to its definition in the syntax tree.
#[derive(Debug, Default)]
pub struct FunctionTable<'ast> {
    map: HashMap<&'ast str, &'ast Defun>,
}

impl<'ast> FunctionTable<'ast> {
    pub fn with_capacity(capacity: usize) -> FunctionTable<'ast> {
        FunctionTable {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'ast Defun> {
        self.map.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Attempts to define the provided function.
    ///
    /// Fails if a function with the same name is already defined, returning
    /// the previous definition. The table is left untouched in that case.
    pub fn define(&mut self, defun: &'ast Defun) -> Result<(), &'ast Defun> {
        if let Some(previous) = self.get(&defun.name.name) {
            return Err(previous);
        }
        self.map.insert(&*defun.name.name, defun);
        Ok(())
    }

    /// Iterates over the definitions sorted by name.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &'ast Defun> {
        let mut defuns: Vec<_> = self.map.values().copied().collect();
        defuns.sort_unstable_by(|a, b| a.name.name.cmp(&b.name.name));
        defuns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::test_utils::parse_program;

    #[test]
    fn lattice() {
        use Type::*;

        assert!(Number.is_subtype_of(Any));
        assert!(List.is_subtype_of(Any));
        assert!(Any.is_subtype_of(Any));
        assert!(!Any.is_subtype_of(Number));
        assert!(!Number.is_subtype_of(List));

        assert!(Any.is_compatible_with(Number));
        assert!(Number.is_compatible_with(Number));
        assert!(!List.is_compatible_with(Number));
        assert!(!Number.is_compatible_with(List));

        assert_eq!(Number.join(Number), Number);
        assert_eq!(List.join(List), List);
        assert_eq!(Number.join(List), Any);
        assert_eq!(Any.join(Number), Any);
    }

    #[test]
    fn define_rejects_duplicates() {
        let program = parse_program("(defun f (x) x) (defun g () 1) (defun f () 2)");
        let defuns: Vec<_> = program.defuns().collect();
        let mut table = FunctionTable::with_capacity(4);

        assert_eq!(table.define(defuns[0]), Ok(()));
        assert_eq!(table.define(defuns[1]), Ok(()));
        assert_eq!(table.define(defuns[2]), Err(defuns[0]));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("f").map(|f| f.params.len()), Some(1));
        let names: Vec<_> = table.iter_sorted().map(|d| &*d.name.name).collect();
        assert_eq!(names, ["f", "g"]);
    }
}
