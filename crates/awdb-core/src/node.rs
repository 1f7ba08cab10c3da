//! Build state of a resource tree node's child list.

use crate::{Error, Result};

/// Child list of a composite node: absent until `init` completes, then frozen.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeState<T> {
    /// `init` has not completed yet.
    #[default]
    Uninitialized,
    /// Children in remote listing order.
    Ready(Vec<T>),
}

impl<T> NodeState<T> {
    /// Returns `true` once the child list has been built.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the children, or a misuse error naming `node` before init.
    pub fn items(&self, node: &str) -> Result<&[T]> {
        match self {
            Self::Ready(items) => Ok(items),
            Self::Uninitialized => Err(Error::misuse()
                .with_message(format!("{node} is not initialized, call init() first"))),
        }
    }

    /// Rejects a second build of the same node.
    pub(crate) fn ensure_uninitialized(&self, node: &str) -> Result<()> {
        match self {
            Self::Uninitialized => Ok(()),
            Self::Ready(_) => {
                Err(Error::misuse().with_message(format!("{node} is already initialized")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn uninitialized_access_is_misuse() {
        let state = NodeState::<u8>::default();
        assert!(!state.is_ready());
        assert_eq!(state.items("database 'main'").unwrap_err().kind, ErrorKind::Misuse);
        assert!(state.ensure_uninitialized("database 'main'").is_ok());
    }

    #[test]
    fn ready_state_is_frozen() {
        let state = NodeState::Ready(vec![1, 2]);
        assert_eq!(state.items("registry").unwrap(), &[1, 2]);
        let error = state.ensure_uninitialized("registry").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Misuse);
    }
}
