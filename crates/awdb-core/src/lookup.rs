//! Lookup by name over materialized child lists.

use crate::{Error, Result};

/// Resources that can be looked up by name.
pub trait Named {
    /// Returns the name matched by lookups: the display name of databases and
    /// collections, the schema key of attributes and indexes.
    fn lookup_name(&self) -> &str;
}

/// Returns the only entry whose name equals `name`.
///
/// Fails with [`ErrorKind::NotFoundOrAmbiguous`](crate::ErrorKind::NotFoundOrAmbiguous)
/// when no entry or several entries match.
pub(crate) fn find_unique<'a, T: Named>(
    items: &'a [T],
    name: &str,
    kind: &str,
    scope: &str,
) -> Result<&'a T> {
    let matches: Vec<&T> = items
        .iter()
        .filter(|item| item.lookup_name() == name)
        .collect();

    match matches.as_slice() {
        [item] => Ok(*item),
        _ => Err(Error::not_found_or_ambiguous().with_message(format!(
            "{kind} '{name}' in {scope} matched {} entries, expected exactly one",
            matches.len()
        ))),
    }
}
