//! respack is a crate to author, load, merge, and emit minecraft resource
//! packs.
//!
//! A [`Pack`] maps namespace names to [`Namespace`]s, which in turn hold one
//! ordered container per recognized file type plus auxiliary "extra" files
//! such as `sounds.json`. Packs can be materialized from a directory tree, a
//! zip archive, or an abstract path mapping, merged together under a
//! configurable [`MergePolicy`], and written back out as a directory or a
//! compressed archive.
//!
//! The recognized resource pack asset types live in [`assets`], together
//! with their merge rules and the pack format registry.

pub mod assets;

mod container;
mod error;
mod file;
mod namespace;
mod origin;
mod pack;
mod policy;

pub use container::{ExtraContainer, FileTreeNode, NamespaceContainer};
pub use error::PackError;
pub use file::{BindMeta, FileData, FileFormat, FileType, Merged, PackFile, SoundEvent};
pub use namespace::Namespace;
pub use origin::{Origin, UnveilMapping};
pub use pack::{
    Compression, Destination, Pack, PackLayout, SaveOptions, UnveilOrigin,
};
pub use policy::{MergeCallback, MergePolicy, Ruling};

pub use assets::{ResourceLayout, ResourcePack};
