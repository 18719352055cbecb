use std::rc::Rc;

use derive_builder::Builder;

#[derive(Debug)]
struct Node {
    position: usize,
    next: Option<Rc<Node>>,
}

/// The object positions of the arrays and structs currently being decoded, innermost first.
///
/// The list is persistent: [`Visited::push`] returns a new list sharing its tail with the old
/// one, so sibling subtrees never observe each other's entries.
#[derive(Debug, Clone, Default)]
pub struct Visited {
    head: Option<Rc<Node>>,
    len: usize,
}

impl Visited {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// A list with `position` in front of this one.
    pub fn push(&self, position: usize) -> Self {
        Visited {
            head: Some(Rc::new(Node { position, next: self.head.clone() })),
            len: self.len + 1,
        }
    }

    /// How many levels up `position` was visited: 0 for the innermost entry.
    pub fn position(&self, position: usize) -> Option<usize> {
        self.iter().position(|visited| visited == position)
    }

    /// Whether `position` is in the list.
    pub fn contains(&self, position: usize) -> bool {
        self.position(position).is_some()
    }

    /// Iterates from the innermost entry outwards.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head.as_deref(), |node| node.next.as_deref())
            .map(|node| node.position)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for Visited {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for Visited {}

/// Builds a list whose innermost entry is the last item yielded.
impl FromIterator<usize> for Visited {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter().fold(Visited::new(), |visited, position| visited.push(position))
    }
}

/// Per-call options threaded through the recursive decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct DecoderOptions {
    /// Positions of the enclosing arrays and structs, used to break cycles.
    pub visited: Visited,

    /// Base against which ABI offsets are resolved. Offsets inside a tuple are relative to the
    /// start of that tuple.
    pub abi_pointer_base: usize,

    /// A length known out-of-band. When set, the pointer addresses the data of a dynamic value
    /// directly rather than its length word.
    pub length_override: Option<usize>,
}

impl DecoderOptions {
    /// Options for a child of the object at `position`: the position is pushed onto the
    /// visited list and any length override is consumed.
    pub(crate) fn visiting(&self, position: usize) -> Self {
        DecoderOptions {
            visited: self.visited.push(position),
            abi_pointer_base: self.abi_pointer_base,
            length_override: None,
        }
    }

    /// Options for a child decoded relative to a new ABI tuple base.
    pub(crate) fn within_tuple(&self, base: usize) -> Self {
        DecoderOptions {
            visited: self.visited.clone(),
            abi_pointer_base: base,
            length_override: None,
        }
    }

    /// These options with the length override consumed.
    pub(crate) fn without_length(&self) -> Self {
        DecoderOptions { length_override: None, ..self.clone() }
    }
}

impl DecoderOptionsBuilder {
    /// Creates a new DecoderOptionsBuilder with default values
    pub fn new() -> Self {
        Self {
            visited: Some(Visited::new()),
            abi_pointer_base: Some(0),
            length_override: Some(None),
        }
    }
}
