use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GenError;

/// One dereference layer between a handle and concrete storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefTag {
    /// Concrete storage owned by the handle.
    NoRef,
    /// Holds the address of a memory-bank scalar.
    MemoryScalar,
    /// Holds the base address of a struct instance.
    StructInstance,
    /// Holds the heap index of a struct member.
    StructMember,
}

impl fmt::Display for RefTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRef => write!(f, "no_ref"),
            Self::MemoryScalar => write!(f, "memory_scalar"),
            Self::StructInstance => write!(f, "struct_instance"),
            Self::StructMember => write!(f, "struct_member"),
        }
    }
}

/// Ordered reference-tag stack carried by every slot-backed handle.
///
/// The last tag decides ownership: `NoRef` owns its slot, anything else is
/// a view that never frees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefType(Vec<RefTag>);

impl RefType {
    /// The stack of a plain owning handle: `[no_ref]`.
    pub fn owned() -> Self {
        Self(vec![RefTag::NoRef])
    }

    pub fn from_tags(tags: impl IntoIterator<Item = RefTag>) -> Self {
        Self(tags.into_iter().collect())
    }

    pub fn tags(&self) -> &[RefTag] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<RefTag> {
        self.0.last().copied()
    }

    /// Whether a handle with this stack must free its slot on scope exit.
    pub fn owns(&self) -> bool {
        matches!(self.last(), Some(RefTag::NoRef))
    }

    pub fn is_view(&self) -> bool {
        !self.owns()
    }

    /// A copy with one more layer on top.
    pub fn pushed(&self, tag: RefTag) -> Self {
        let mut tags = self.0.clone();
        tags.push(tag);
        Self(tags)
    }

    /// Pop the trailing layer, returning the remaining stack and the popped
    /// tag. Fails when the top is `no_ref` or the stack is empty.
    pub fn popped(&self) -> Result<(Self, RefTag), GenError> {
        match self.0.split_last() {
            Some((&tag, rest)) if tag != RefTag::NoRef => Ok((Self(rest.to_vec()), tag)),
            _ => Err(GenError::CannotDeref(self.to_string())),
        }
    }
}

impl Default for RefType {
    fn default() -> Self {
        Self::owned()
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_stack_owns() {
        let rt = RefType::owned();
        assert!(rt.owns());
        assert_eq!(rt.depth(), 1);
        assert_eq!(rt.to_string(), "(no_ref)");
    }

    #[test]
    fn pushed_stack_is_view() {
        let rt = RefType::owned().pushed(RefTag::MemoryScalar);
        assert!(rt.is_view());
        assert_eq!(rt.last(), Some(RefTag::MemoryScalar));
    }

    #[test]
    fn pop_restores_previous_layer() {
        let rt = RefType::owned()
            .pushed(RefTag::MemoryScalar)
            .pushed(RefTag::StructInstance);
        let (rest, tag) = rt.popped().unwrap();
        assert_eq!(tag, RefTag::StructInstance);
        assert_eq!(rest.tags(), &[RefTag::NoRef, RefTag::MemoryScalar]);
        let (rest, tag) = rest.popped().unwrap();
        assert_eq!(tag, RefTag::MemoryScalar);
        assert!(rest.owns());
    }

    #[test]
    fn pop_on_no_ref_fails() {
        let err = RefType::owned().popped().unwrap_err();
        assert_eq!(err, GenError::CannotDeref("(no_ref)".into()));
        assert!(RefType::from_tags(Vec::<RefTag>::new()).popped().is_err());
    }
}
