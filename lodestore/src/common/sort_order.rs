/// Direction of a cursor sort criterion.
///
/// Sorting follows the datastore's value ordering (absent < null < numbers < strings <
/// booleans < dates < arrays < documents); `Descending` reverses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Maps the `1` / `-1` convention of sort documents onto a direction.
    pub fn from_sign(sign: i64) -> SortOrder {
        if sign < 0 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    pub(crate) fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}
