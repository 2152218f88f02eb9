use crate::common::{compare_optional, StringComparator, Value};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

/// A key in an index tree.
///
/// A single-field index key has one part, a compound key one part per field. `None` stands
/// for an absent field and sorts before every present value. The string comparator of the
/// owning index travels with the key so that the tree ordering honours it.
#[derive(Clone)]
pub struct IndexKey {
    parts: SmallVec<[Option<Value>; 2]>,
    comparator: Option<StringComparator>,
}

impl IndexKey {
    pub(crate) fn new(
        parts: SmallVec<[Option<Value>; 2]>,
        comparator: Option<StringComparator>,
    ) -> IndexKey {
        IndexKey { parts, comparator }
    }

    pub(crate) fn single(value: Option<Value>, comparator: Option<StringComparator>) -> IndexKey {
        let mut parts = SmallVec::new();
        parts.push(value);
        IndexKey { parts, comparator }
    }

    pub fn parts(&self) -> &[Option<Value>] {
        &self.parts
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let comparator = self.comparator.as_ref().or(other.comparator.as_ref());
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            let ordering = compare_optional(a.as_ref(), b.as_ref(), comparator);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.parts.len().cmp(&other.parts.len())
    }
}

impl Display for IndexKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let render = |part: &Option<Value>| match part {
            Some(value) => value.to_string(),
            None => "undefined".to_string(),
        };

        if self.parts.len() == 1 {
            write!(f, "{}", render(&self.parts[0]))
        } else {
            let rendered: Vec<String> = self.parts.iter().map(render).collect();
            write!(f, "[{}]", rendered.join(", "))
        }
    }
}

impl Debug for IndexKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IndexKey({})", self)
    }
}
