//! Build-time class hierarchy analysis for JVM bytecode
//!
//! Reads just enough of each class file to learn its name, superclass and
//! modifiers, resolves which concrete classes descend from a set of base
//! classes, and renders the results as a `.properties` implementation index
//! plus a reflection manifest for ahead-of-time compilers.

pub mod error;
pub mod fingerprint;
pub mod header;
pub mod hierarchy;
pub mod index;
pub mod names;
pub mod reflect;

pub use error::FormatError;
pub use fingerprint::ContentFingerprint;
pub use header::ClassHeader;
pub use hierarchy::{collect_implementations, is_concrete_subclass_of, HeaderIndex, SubclassCache};
pub use index::{format_index, merge_fragments, FragmentMerge, PrecomputedIndex};
pub use reflect::merge_reflect_config;
